//! Per-category HTML comparison pages.

use mteval_core::{CategoryOutcome, Evaluation};

/// Minimal HTML writer. Markup comes only from `&'static str` literals;
/// anything computed at runtime goes through [`HtmlBuilder::text`], which
/// escapes it.
#[derive(Debug, Default)]
pub struct HtmlBuilder {
    out: String,
}

fn escape(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
        .replace('\'', "&#39;")
}

impl HtmlBuilder {
    pub fn new() -> Self {
        Self {
            out: String::with_capacity(16384),
        }
    }

    /// Append fixed markup.
    pub fn raw(&mut self, markup: &'static str) -> &mut Self {
        self.out.push_str(markup);
        self
    }

    /// Append escaped text.
    pub fn text(&mut self, text: &str) -> &mut Self {
        self.out.push_str(&escape(text));
        self
    }

    /// `<tag class="class">`, or `<tag>` without a class.
    pub fn open(&mut self, tag: &'static str, class: Option<&'static str>) -> &mut Self {
        self.out.push('<');
        self.out.push_str(tag);
        if let Some(class) = class {
            self.out.push_str(" class=\"");
            self.out.push_str(class);
            self.out.push('"');
        }
        self.out.push('>');
        self
    }

    pub fn close(&mut self, tag: &'static str) -> &mut Self {
        self.out.push_str("</");
        self.out.push_str(tag);
        self.out.push('>');
        self
    }

    /// `<tag class="class">escaped text</tag>`.
    pub fn element(
        &mut self,
        tag: &'static str,
        class: Option<&'static str>,
        text: &str,
    ) -> &mut Self {
        self.open(tag, class).text(text).close(tag)
    }

    pub fn finish(self) -> String {
        self.out
    }
}

const HEAD: &str = r#"<!DOCTYPE html>
<html lang="en">
<head>
<meta charset="UTF-8">
<meta name="viewport" content="width=device-width, initial-scale=1.0">
<title>Translation comparison</title>
<style>
body {
  font-family: -apple-system, BlinkMacSystemFont, 'Segoe UI', Roboto, sans-serif;
  margin: 2rem;
  line-height: 1.5;
  color: #222;
}
h1 { font-size: 1.5rem; margin-bottom: 0.5rem; }
.meta { color: #666; margin-bottom: 1.5rem; }
.columns { display: flex; gap: 2rem; align-items: flex-start; }
.columns > div { flex: 1; min-width: 0; }
table { border-collapse: collapse; width: 100%; }
th, td { border: 1px solid #ddd; padding: 0.3rem 0.6rem; vertical-align: top; text-align: left; }
th { background: #f4f4f4; }
td.tag { font-weight: bold; width: 3.5rem; color: #555; }
tr.ref td { color: #555; border-bottom: 2px solid #bbb; }
td.score { text-align: right; width: 4.5rem; }
td.failed { color: #c0392b; font-style: italic; }
</style>
</head>
<body>
"#;

/// Comparison page for one category: the source document beside the
/// machine translation, each row paired with its reference.
pub fn export_html(
    evaluation: &Evaluation,
    category: usize,
    source_doc: &str,
    translated_doc: &str,
) -> String {
    let category_id = evaluation
        .categories
        .get(category)
        .map(String::as_str)
        .unwrap_or_default();
    let summary = evaluation.summary();

    let mut h = HtmlBuilder::new();
    h.raw(HEAD);
    h.element("h1", None, &format!("Category {category_id}"));
    h.open("p", Some("meta"))
        .text(&format!("Source: {source_doc} | Reference: {translated_doc}"));
    if let Some(s) = summary.get(category) {
        h.text(&format!(
            " | Sentences: {} | Failed: {} | Mean BLEU: {:.2} | Corpus BLEU: {:.2}",
            s.translated + s.failed,
            s.failed,
            s.mean_sentence_bleu,
            s.corpus_bleu
        ));
    }
    h.close("p");

    h.open("div", Some("columns"));

    // Source document alongside its human translation.
    h.open("div", None);
    h.element("h2", None, source_doc);
    h.open("table", None);
    for row in &evaluation.rows {
        h.open("tr", None)
            .element("td", Some("tag"), "ENU")
            .element("td", None, &row.source)
            .close("tr");
        h.open("tr", Some("ref"))
            .element("td", Some("tag"), "REF")
            .element("td", None, &row.reference)
            .close("tr");
    }
    h.close("table").close("div");

    // Machine translation alongside the same reference.
    h.open("div", None);
    h.element("h2", None, &format!("MT ({category_id})"));
    h.open("table", None);
    for row in &evaluation.rows {
        h.open("tr", None).element("td", Some("tag"), "MT");
        match row.outcomes.get(category) {
            Some(CategoryOutcome::Translated { text, score }) => {
                h.element("td", None, text)
                    .element("td", Some("score"), &format!("{score:.2}"));
            }
            Some(CategoryOutcome::Failed { error }) => {
                h.element("td", Some("failed"), &format!("translation failed: {error}"))
                    .element("td", Some("score"), "");
            }
            None => {
                h.element("td", None, "").element("td", Some("score"), "");
            }
        }
        h.close("tr");
        h.open("tr", Some("ref"))
            .element("td", Some("tag"), "REF")
            .element("td", None, &row.reference)
            .element("td", Some("score"), "")
            .close("tr");
    }
    h.close("table").close("div");

    h.close("div");
    h.raw("\n</body>\n</html>\n");
    h.finish()
}

#[cfg(test)]
mod tests {
    use super::*;
    use mteval_core::ReportRow;

    fn evaluation(source: &str, mt: &str) -> Evaluation {
        Evaluation {
            categories: vec!["cat<1>".into()],
            rows: vec![ReportRow {
                index: 0,
                source: source.into(),
                reference: "Référence".into(),
                outcomes: vec![CategoryOutcome::Translated {
                    text: mt.into(),
                    score: 42.0,
                }],
            }],
        }
    }

    #[test]
    fn builder_escapes_text() {
        let mut h = HtmlBuilder::new();
        h.element("td", Some("x"), "<script>alert('x') & \"y\"</script>");
        assert_eq!(
            h.finish(),
            "<td class=\"x\">&lt;script&gt;alert(&#39;x&#39;) &amp; &quot;y&quot;&lt;/script&gt;</td>"
        );
    }

    #[test]
    fn page_escapes_every_interpolated_value() {
        let html = export_html(
            &evaluation("<b>bold</b>", "a & b"),
            0,
            "src<.pdf",
            "tgt\".pdf",
        );
        assert!(!html.contains("<b>bold</b>"));
        assert!(html.contains("&lt;b&gt;bold&lt;/b&gt;"));
        assert!(html.contains("a &amp; b"));
        assert!(html.contains("cat&lt;1&gt;"));
        assert!(html.contains("src&lt;.pdf"));
        assert!(html.contains("tgt&quot;.pdf"));
    }

    #[test]
    fn page_has_both_tables() {
        let html = export_html(&evaluation("Hello", "Bonjour"), 0, "s.pdf", "t.pdf");
        assert_eq!(html.matches("<table>").count(), 2);
        assert!(html.contains(">ENU<"));
        assert!(html.contains(">MT<"));
        assert_eq!(html.matches(">REF<").count(), 2);
        assert!(html.contains("42.00"));
    }
}
