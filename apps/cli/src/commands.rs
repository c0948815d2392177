//! CLI command definitions, routing, and tracing setup.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use clap::{Parser, Subcommand};
use color_eyre::eyre::{Result, eyre};
use indicatif::{ProgressBar, ProgressStyle};
use tracing::info;
use url::Url;

use ragline_generate::{ApiChatModel, ChatModel};
use ragline_graph::{RunObserver, RunRequest, RunResult};
use ragline_retrieval::{ApiEmbedder, Embedder};
use ragline_shared::{AppConfig, Value, init_config, load_config, validate_api_key};

use crate::builder::{self, BuildMode, ComponentFactory};
use crate::standard::{DocsQa, Mode, RetrieverKind, docs_qa_request};

// ---------------------------------------------------------------------------
// CLI structure
// ---------------------------------------------------------------------------

/// ragline — retrieval-augmented question answering over documentation.
#[derive(Parser)]
#[command(
    name = "ragline",
    version,
    about = "Fetch documentation, index it, and answer questions over it with typed component pipelines.",
    long_about = None,
)]
pub(crate) struct Cli {
    /// Log format: text (default) or json.
    #[arg(long, default_value = "text", global = true)]
    pub log_format: LogFormat,

    /// Verbosity level (-v, -vv, -vvv).
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    #[command(subcommand)]
    pub command: Command,
}

/// Log output format.
#[derive(Clone, Debug, clap::ValueEnum)]
pub(crate) enum LogFormat {
    Text,
    Json,
}

/// Top-level CLI subcommands.
#[derive(Subcommand)]
pub(crate) enum Command {
    /// Ask a question over one or more documentation URLs.
    Ask {
        /// Documentation URLs to fetch and index.
        #[arg(required = true)]
        urls: Vec<String>,

        /// The question to answer.
        #[arg(short, long)]
        query: String,

        /// Answer mode (defaults to config).
        #[arg(short, long)]
        mode: Option<Mode>,

        /// Retriever kind (defaults to config).
        #[arg(short, long)]
        retriever: Option<RetrieverKind>,

        /// Number of documents to retrieve (defaults to config).
        #[arg(short, long)]
        top_k: Option<usize>,
    },

    /// Run a pipeline from a TOML definition file.
    Run {
        /// Pipeline definition file.
        #[arg(long)]
        pipeline: PathBuf,

        /// Input override, component.field=value (repeatable).
        #[arg(long = "input")]
        inputs: Vec<String>,
    },

    /// Validate a pipeline definition without running it.
    Validate {
        /// Pipeline definition file.
        #[arg(long)]
        pipeline: PathBuf,
    },

    /// List built-in component types and their field contracts.
    Components,

    /// Configuration management.
    Config {
        /// Config subcommand.
        #[command(subcommand)]
        action: ConfigAction,
    },
}

/// Config subcommands.
#[derive(Subcommand)]
pub(crate) enum ConfigAction {
    /// Initialize config file with defaults.
    Init,
    /// Show resolved configuration.
    Show,
}

// ---------------------------------------------------------------------------
// Tracing setup
// ---------------------------------------------------------------------------

/// Initialize tracing based on CLI flags.
pub(crate) fn init_tracing(cli: &Cli) {
    use tracing_subscriber::{EnvFilter, fmt};

    let filter = match cli.verbose {
        0 => "ragline=info",
        1 => "ragline=debug",
        _ => "ragline=trace",
    };

    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter));

    match cli.log_format {
        LogFormat::Text => {
            fmt().with_env_filter(env_filter).with_target(false).init();
        }
        LogFormat::Json => {
            fmt().json().with_env_filter(env_filter).init();
        }
    }
}

// ---------------------------------------------------------------------------
// Command dispatch
// ---------------------------------------------------------------------------

/// Run the CLI command.
pub(crate) async fn run(cli: Cli) -> Result<()> {
    match cli.command {
        Command::Ask {
            urls,
            query,
            mode,
            retriever,
            top_k,
        } => cmd_ask(&urls, &query, mode, retriever, top_k).await,
        Command::Run { pipeline, inputs } => cmd_run(&pipeline, &inputs).await,
        Command::Validate { pipeline } => cmd_validate(&pipeline).await,
        Command::Components => cmd_components(),
        Command::Config { action } => match action {
            ConfigAction::Init => cmd_config_init(),
            ConfigAction::Show => cmd_config_show(),
        },
    }
}

// ---------------------------------------------------------------------------
// ask
// ---------------------------------------------------------------------------

async fn cmd_ask(
    urls: &[String],
    query: &str,
    mode: Option<Mode>,
    retriever: Option<RetrieverKind>,
    top_k: Option<usize>,
) -> Result<()> {
    let config = load_config()?;

    let mode = match mode {
        Some(m) => m,
        None => Mode::from_config(&config.defaults.mode)?,
    };
    let retriever = match retriever {
        Some(r) => r,
        None => RetrieverKind::from_config(&config.defaults.retriever)?,
    };
    let top_k = top_k.unwrap_or(config.defaults.top_k);

    let parsed_urls = urls
        .iter()
        .map(|raw| Url::parse(raw).map_err(|e| eyre!("invalid URL '{raw}': {e}")))
        .collect::<Result<Vec<Url>>>()?;

    // Only reach for the remote model when this run actually needs it.
    let needs_model = mode == Mode::Generative || retriever == RetrieverKind::Embedding;
    if needs_model {
        validate_api_key(&config)?;
    }
    let chat: Option<Arc<dyn ChatModel>> = if mode == Mode::Generative {
        Some(Arc::new(ApiChatModel::new(&config.model)?))
    } else {
        None
    };
    let embedder: Option<Arc<dyn Embedder>> = if retriever == RetrieverKind::Embedding {
        Some(Arc::new(ApiEmbedder::new(&config.model)?))
    } else {
        None
    };

    info!(
        urls = parsed_urls.len(),
        query,
        ?mode,
        ?retriever,
        top_k,
        "assembling docs-QA pipeline"
    );

    let pipeline = DocsQa {
        mode,
        retriever,
        top_k,
        chat,
        embedder,
        allow_local_urls: false,
    }
    .build(&config)?;

    let request = docs_qa_request(parsed_urls, query, mode);
    let progress = CliProgress::new();
    let result = run_with_progress(&pipeline, &request, &progress).await?;

    print_answer(&result, mode);
    Ok(())
}

fn print_answer(result: &RunResult, mode: Mode) {
    println!();
    match mode {
        Mode::Generative => {
            if let Some(reply) = result.field("generator", "replies").and_then(Value::as_text) {
                println!("{reply}");
            }
        }
        Mode::Extractive => {
            match result.field("reader", "answers").and_then(Value::as_answers) {
                Some(answers) if !answers.is_empty() => {
                    for (rank, answer) in answers.iter().enumerate() {
                        println!("{}. [{:.2}] {}", rank + 1, answer.score, answer.text);
                    }
                }
                _ => println!("No answer found."),
            }
        }
    }
    println!();
}

// ---------------------------------------------------------------------------
// run / validate
// ---------------------------------------------------------------------------

async fn cmd_run(pipeline_path: &PathBuf, inputs: &[String]) -> Result<()> {
    let config = load_config()?;
    let def = builder::load_pipeline_def(pipeline_path)?;
    let built = builder::build_pipeline(&def, &config, BuildMode::Run)?;

    let mut request = RunRequest::new();
    for raw in inputs {
        let (component, field, value) = builder::parse_input_override(&built, raw)?;
        request.insert(component, field, value);
    }

    info!(
        pipeline = %pipeline_path.display(),
        components = built.pipeline.len(),
        overrides = inputs.len(),
        "running pipeline"
    );

    let progress = CliProgress::new();
    let result = run_with_progress(&built.pipeline, &request, &progress).await?;

    println!();
    for (component, outputs) in result.iter() {
        for (field, value) in outputs {
            println!("  {component}.{field}: {}", describe_value(value));
        }
    }
    println!();
    Ok(())
}

async fn cmd_validate(pipeline_path: &PathBuf) -> Result<()> {
    let config = load_config()?;
    let def = builder::load_pipeline_def(pipeline_path)?;
    let built = builder::build_pipeline(&def, &config, BuildMode::ValidateOnly)?;

    // Structural validation only: required inputs without edges are expected
    // to be covered by --input overrides at run time, so mark every
    // component's declared inputs as provided.
    let mut request = RunRequest::new();
    for (component, specs) in &built.input_specs {
        for spec in specs {
            let placeholder = match spec.ty {
                ragline_shared::FieldType::Text => Value::Text(String::new()),
                ragline_shared::FieldType::Urls => Value::Urls(vec![]),
                ragline_shared::FieldType::Pages => Value::Pages(vec![]),
                ragline_shared::FieldType::Documents => Value::Documents(vec![]),
                ragline_shared::FieldType::Answers => Value::Answers(vec![]),
            };
            request.insert(component.clone(), spec.name.clone(), placeholder);
        }
    }
    built.pipeline.validate(&request)?;

    println!(
        "OK: {} components, {} connections",
        built.pipeline.len(),
        def.connections.len()
    );
    Ok(())
}

/// One-line summary of an output value.
fn describe_value(value: &Value) -> String {
    match value {
        Value::Text(text) => {
            let mut line = text.replace('\n', " ");
            if line.chars().count() > 120 {
                line = line.chars().take(117).collect::<String>() + "...";
            }
            line
        }
        Value::Urls(urls) => format!("{} urls", urls.len()),
        Value::Pages(pages) => format!("{} pages", pages.len()),
        Value::Documents(docs) => format!("{} documents", docs.len()),
        Value::Answers(answers) => match answers.first() {
            Some(best) => format!("{} answers, best [{:.2}] {}", answers.len(), best.score, best.text),
            None => "0 answers".into(),
        },
    }
}

// ---------------------------------------------------------------------------
// components / config
// ---------------------------------------------------------------------------

fn cmd_components() -> Result<()> {
    let config = AppConfig::default();
    let mut factory = ComponentFactory::new(&config, BuildMode::ValidateOnly);

    println!();
    for kind in builder::COMPONENT_KINDS {
        let component = factory.instantiate(kind, &toml::Table::new())?;

        let fmt_specs = |specs: &[ragline_shared::FieldSpec]| {
            if specs.is_empty() {
                return "(none)".to_string();
            }
            specs
                .iter()
                .map(|spec| {
                    if spec.required {
                        format!("{}: {}", spec.name, spec.ty)
                    } else {
                        format!("{}: {} (optional)", spec.name, spec.ty)
                    }
                })
                .collect::<Vec<_>>()
                .join(", ")
        };

        println!("  {kind}");
        println!("    inputs:  {}", fmt_specs(&component.inputs()));
        println!("    outputs: {}", fmt_specs(&component.outputs()));
    }
    println!();
    Ok(())
}

fn cmd_config_init() -> Result<()> {
    let path = init_config()?;
    println!("Config initialized at: {}", path.display());
    Ok(())
}

fn cmd_config_show() -> Result<()> {
    let config: AppConfig = load_config()?;
    let toml_str = toml::to_string_pretty(&config)?;
    println!("{toml_str}");
    Ok(())
}

// ---------------------------------------------------------------------------
// CLI progress reporter
// ---------------------------------------------------------------------------

/// Spinner-based progress via indicatif.
struct CliProgress {
    spinner: ProgressBar,
}

impl CliProgress {
    fn new() -> Self {
        let spinner = ProgressBar::new_spinner();
        spinner.set_style(
            ProgressStyle::with_template("{spinner:.cyan} {msg}")
                .expect("valid template")
                .tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏"]),
        );
        spinner.enable_steady_tick(Duration::from_millis(80));
        Self { spinner }
    }
}

impl RunObserver for CliProgress {
    fn component_started(&self, name: &str, index: usize, total: usize) {
        self.spinner
            .set_message(format!("Running [{}/{total}] {name}", index + 1));
    }

    fn component_finished(&self, name: &str, elapsed: Duration) {
        self.spinner
            .set_message(format!("Finished {name} in {:.1}s", elapsed.as_secs_f64()));
    }

    fn run_finished(&self, _result: &RunResult) {
        self.spinner.finish_and_clear();
    }
}

/// Run with the spinner, clearing it even when the run fails.
async fn run_with_progress(
    pipeline: &ragline_graph::Pipeline,
    request: &RunRequest,
    progress: &CliProgress,
) -> Result<RunResult> {
    let outcome = pipeline.run_with_observer(request, progress).await;
    progress.spinner.finish_and_clear();
    Ok(outcome?)
}
