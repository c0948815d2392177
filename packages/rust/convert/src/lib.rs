//! HTML-to-document conversion.
//!
//! [`HtmlConverter`] turns raw fetched pages into retrievable [`Document`]s:
//! the main content is located via a priority list of known content-container
//! selectors, converted to text with the `htmd` crate, and each HTML
//! `<table>` becomes an additional structured table document so tabular
//! readers can answer over cells instead of flattened prose.

mod splitter;

pub use splitter::DocumentSplitter;

use std::sync::LazyLock;

use futures::future::BoxFuture;
use regex::Regex;
use scraper::{Html, Selector};
use tracing::{debug, instrument};

use ragline_graph::Component;
use ragline_shared::{
    Document, DocumentId, FieldSpec, FieldType, InputMap, OutputMap, Page, RaglineError, Result,
    Table, Value,
};

// ---------------------------------------------------------------------------
// HtmlConverter
// ---------------------------------------------------------------------------

/// Converts fetched pages into documents.
///
/// Inputs: `pages: Pages` (required). Outputs: `documents: Documents`.
///
/// For each page this emits one text document plus one table document per
/// HTML `<table>` in the content. Non-HTML pages pass through as plain-text
/// documents. Document ids are derived from the source URL and content, so
/// converting the same pages twice yields identical documents.
#[derive(Debug, Clone, Default)]
pub struct HtmlConverter;

impl HtmlConverter {
    pub fn new() -> Self {
        Self
    }

    /// Convert a single page into one text document plus its table documents.
    #[instrument(skip_all, fields(url = %page.url))]
    fn convert_page(&self, page: &Page) -> Result<Vec<Document>> {
        let raw = page.text();

        if !looks_like_html(page, &raw) {
            let doc = Document::from_text(raw.trim())
                .with_source_url(&page.url)
                .with_deterministic_id(&page.url, "text");
            return Ok(vec![doc]);
        }

        let parsed = Html::parse_document(&raw);
        let content_html = extract_content_html(&parsed, &raw);
        let title = extract_title(&parsed);

        // Tables come out of the content fragment, not the full page, so
        // navigation/footer tables don't become documents.
        let content = Html::parse_fragment(&content_html);
        let tables = extract_tables(&content);

        // Skip <table> during text conversion: the structured documents
        // carry the cells, and flattened cell soup hurts retrieval.
        let converter = htmd::HtmlToMarkdown::builder()
            .skip_tags(vec![
                "script", "style", "nav", "iframe", "noscript", "svg", "table",
            ])
            .build();

        let text = converter
            .convert(&content_html)
            .map_err(|e| RaglineError::parse(format!("html conversion failed: {e}")))?;
        let text = normalize_whitespace(&text);

        debug!(
            text_len = text.len(),
            tables = tables.len(),
            title = title.as_deref().unwrap_or("<none>"),
            "page converted"
        );

        let mut docs = Vec::with_capacity(1 + tables.len());

        let mut text_doc = Document::from_text(&text)
            .with_source_url(&page.url)
            .with_deterministic_id(&page.url, "text");
        text_doc.title = title.clone();
        docs.push(text_doc);

        for (index, table) in tables.into_iter().enumerate() {
            let mut table_doc = Document::from_table(table)
                .with_source_url(&page.url)
                .with_deterministic_id(&page.url, &format!("table-{index}"));
            table_doc.title = title.clone();
            table_doc
                .meta
                .insert("table_index".into(), serde_json::Value::from(index));
            docs.push(table_doc);
        }

        Ok(docs)
    }
}

impl Component for HtmlConverter {
    fn inputs(&self) -> Vec<FieldSpec> {
        vec![FieldSpec::required("pages", FieldType::Pages)]
    }

    fn outputs(&self) -> Vec<FieldSpec> {
        vec![FieldSpec::required("documents", FieldType::Documents)]
    }

    fn invoke(&self, inputs: InputMap) -> BoxFuture<'_, Result<OutputMap>> {
        Box::pin(async move {
            let pages = inputs
                .get("pages")
                .and_then(Value::as_pages)
                .ok_or_else(|| {
                    RaglineError::validation("converter input 'pages' is not a page list")
                })?;

            let mut documents = Vec::new();
            for page in pages {
                documents.extend(self.convert_page(page)?);
            }

            debug!(pages = pages.len(), documents = documents.len(), "conversion complete");

            let mut out = OutputMap::new();
            out.insert("documents".into(), Value::Documents(documents));
            Ok(out)
        })
    }
}

// Builder-style helper kept local: id derivation needs the page URL, which
// `Document::from_text` doesn't see.
trait WithDeterministicId {
    fn with_deterministic_id(self, url: &str, discriminator: &str) -> Self;
}

impl WithDeterministicId for Document {
    fn with_deterministic_id(mut self, url: &str, discriminator: &str) -> Self {
        self.id = DocumentId::derived(&[url, discriminator, &self.content]);
        self
    }
}

// ---------------------------------------------------------------------------
// Content extraction
// ---------------------------------------------------------------------------

/// Known content containers, tried in priority order.
const CONTENT_SELECTORS: &[&str] = &[
    "article .markdown",  // Docusaurus
    ".vp-doc",            // VitePress
    ".markdown-section",  // GitBook
    "[role=\"main\"]",    // ReadTheDocs / generic
    "article",            // Common
    "main",               // HTML5 semantic
    ".content",           // Generic
];

/// Extract the main content HTML, stripping chrome (nav, header, footer).
fn extract_content_html(doc: &Html, raw: &str) -> String {
    for sel_str in CONTENT_SELECTORS {
        if let Ok(selector) = Selector::parse(sel_str) {
            if let Some(el) = doc.select(&selector).next() {
                return el.inner_html();
            }
        }
    }

    // Fallback: use <body> content
    if let Ok(body_sel) = Selector::parse("body") {
        if let Some(body) = doc.select(&body_sel).next() {
            return body.inner_html();
        }
    }

    raw.to_string()
}

/// Extract the page title: first `<h1>`, falling back to `<title>`.
fn extract_title(doc: &Html) -> Option<String> {
    for sel_str in ["h1", "title"] {
        if let Ok(selector) = Selector::parse(sel_str) {
            if let Some(el) = doc.select(&selector).next() {
                let text = el.text().collect::<String>().trim().to_string();
                if !text.is_empty() {
                    return Some(text);
                }
            }
        }
    }
    None
}

/// Heuristic HTML check: trust the media type when present, sniff otherwise.
fn looks_like_html(page: &Page, raw: &str) -> bool {
    if let Some(media_type) = &page.media_type {
        return media_type == "text/html" || media_type == "application/xhtml+xml";
    }
    let head = raw.trim_start().to_ascii_lowercase();
    head.starts_with("<!doctype html") || head.starts_with("<html")
}

/// Collapse runs of blank lines and trim trailing space left by conversion.
fn normalize_whitespace(text: &str) -> String {
    static BLANK_RUNS: LazyLock<Regex> =
        LazyLock::new(|| Regex::new(r"\n{3,}").expect("valid regex"));

    let collapsed = BLANK_RUNS.replace_all(text, "\n\n");
    collapsed.trim().to_string()
}

// ---------------------------------------------------------------------------
// Table extraction
// ---------------------------------------------------------------------------

/// Extract every `<table>` in the content as a structured [`Table`].
///
/// Empty tables are skipped.
fn extract_tables(content: &Html) -> Vec<Table> {
    let table_sel = Selector::parse("table").expect("valid selector");

    content
        .select(&table_sel)
        .filter_map(|el| html_table_to_struct(&el))
        .collect()
}

/// Convert a single HTML table element to a structured table.
///
/// `<th>` rows become the header; without one, numbered column names are
/// synthesized. Rows are padded to a uniform width so cell offsets stay
/// well-defined.
fn html_table_to_struct(table: &scraper::ElementRef) -> Option<Table> {
    let tr_sel = Selector::parse("tr").expect("valid selector");
    let th_sel = Selector::parse("th").expect("valid selector");
    let td_sel = Selector::parse("td").expect("valid selector");

    let mut headers: Vec<String> = Vec::new();
    let mut rows: Vec<Vec<String>> = Vec::new();

    for tr in table.select(&tr_sel) {
        let ths: Vec<String> = tr
            .select(&th_sel)
            .map(|cell| cell.text().collect::<String>().trim().to_string())
            .collect();

        if !ths.is_empty() && headers.is_empty() && rows.is_empty() {
            headers = ths;
            continue;
        }

        let cells: Vec<String> = tr
            .select(&td_sel)
            .map(|cell| cell.text().collect::<String>().trim().to_string())
            .collect();

        if !cells.is_empty() {
            rows.push(cells);
        }
    }

    if rows.is_empty() {
        return None;
    }

    let col_count = rows
        .iter()
        .map(Vec::len)
        .chain(std::iter::once(headers.len()))
        .max()
        .unwrap_or(0);
    if col_count == 0 {
        return None;
    }

    if headers.is_empty() {
        headers = (1..=col_count).map(|i| format!("column_{i}")).collect();
    }
    while headers.len() < col_count {
        headers.push(String::new());
    }
    for row in &mut rows {
        while row.len() < col_count {
            row.push(String::new());
        }
    }

    Some(Table { headers, rows })
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn page(url: &str, html: &str) -> Page {
        Page {
            url: url.to_string(),
            body: html.as_bytes().to_vec(),
            media_type: Some("text/html".into()),
            status: 200,
        }
    }

    fn convert(html: &str) -> Vec<Document> {
        HtmlConverter::new()
            .convert_page(&page("https://example.com/page", html))
            .unwrap()
    }

    #[test]
    fn converts_simple_html() {
        let docs =
            convert("<html><body><main><h1>Hello World</h1><p>Some text.</p></main></body></html>");

        assert_eq!(docs.len(), 1);
        assert!(docs[0].content.contains("Some text."));
        assert_eq!(docs[0].title.as_deref(), Some("Hello World"));
        assert_eq!(docs[0].source_url.as_deref(), Some("https://example.com/page"));
    }

    #[test]
    fn strips_nav_and_footer() {
        let docs = convert(
            r#"<html><body>
                <nav><a href="/">Home</a></nav>
                <main><h1>Content</h1><p>Important text.</p></main>
                <footer><p>Copyright 2024</p></footer>
            </body></html>"#,
        );

        assert!(docs[0].content.contains("Important text."));
        assert!(!docs[0].content.contains("Copyright 2024"));
    }

    #[test]
    fn prefers_known_content_containers() {
        let docs = convert(
            r#"<html><body>
                <div class="sidebar"><p>Menu entry</p></div>
                <div class="vp-doc"><h1>Guide</h1><p>The real content.</p></div>
            </body></html>"#,
        );

        assert!(docs[0].content.contains("The real content."));
        assert!(!docs[0].content.contains("Menu entry"));
    }

    #[test]
    fn extracts_table_as_separate_document() {
        let docs = convert(
            r#"<html><body><main>
                <h1>Data</h1>
                <p>Prose around the table.</p>
                <table>
                    <thead><tr><th>Name</th><th>City</th></tr></thead>
                    <tbody>
                        <tr><td>Ada</td><td>London</td></tr>
                        <tr><td>Grace</td><td>Arlington</td></tr>
                    </tbody>
                </table>
            </main></body></html>"#,
        );

        assert_eq!(docs.len(), 2);
        assert!(docs[0].content.contains("Prose around the table."));
        assert!(!docs[0].content.contains("Arlington"), "table cells leaked into prose");

        let table = docs[1].table.as_ref().expect("table document");
        assert_eq!(table.headers, vec!["Name", "City"]);
        assert_eq!(table.rows[1], vec!["Grace", "Arlington"]);
        assert_eq!(docs[1].meta["table_index"], serde_json::Value::from(0));
    }

    #[test]
    fn table_without_header_gets_numbered_columns() {
        let docs = convert(
            r#"<html><body><main>
                <table>
                    <tr><td>a</td><td>b</td></tr>
                    <tr><td>c</td></tr>
                </table>
            </main></body></html>"#,
        );

        let table = docs[1].table.as_ref().expect("table document");
        assert_eq!(table.headers, vec!["column_1", "column_2"]);
        // Ragged rows are padded to a uniform width
        assert_eq!(table.rows[1], vec!["c", ""]);
    }

    #[test]
    fn plain_text_page_passes_through() {
        let p = Page {
            url: "https://example.com/notes.txt".into(),
            body: b"just some plain notes".to_vec(),
            media_type: Some("text/plain".into()),
            status: 200,
        };

        let docs = HtmlConverter::new().convert_page(&p).unwrap();
        assert_eq!(docs.len(), 1);
        assert_eq!(docs[0].content, "just some plain notes");
        assert!(docs[0].table.is_none());
    }

    #[test]
    fn conversion_is_deterministic_across_runs() {
        let html = "<html><body><main><h1>Stable</h1><p>Same input.</p></main></body></html>";
        let first = convert(html);
        let second = convert(html);
        assert_eq!(first, second);
    }

    #[test]
    fn empty_body_yields_empty_document() {
        let docs = convert("<html><body></body></html>");
        assert_eq!(docs.len(), 1);
        assert!(docs[0].content.is_empty());
        assert!(docs[0].title.is_none());
    }

    #[tokio::test]
    async fn runs_as_component() {
        let converter = HtmlConverter::new();
        let mut inputs = InputMap::new();
        inputs.insert(
            "pages".into(),
            Value::Pages(vec![page(
                "https://example.com/a",
                "<html><body><main><h1>A</h1><p>alpha</p></main></body></html>",
            )]),
        );

        let out = converter.invoke(inputs).await.unwrap();
        let docs = out.get("documents").and_then(Value::as_documents).unwrap();
        assert_eq!(docs.len(), 1);
        assert!(docs[0].content.contains("alpha"));
    }
}
