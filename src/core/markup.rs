// LogTab - core/markup.rs
//
// Markup envelope and sanitizer for rendered log lines.
//
// Allow-list: the `span` element with only its `class` attribute. Every other
// tag, comment and attribute is dropped; the text between tags survives as
// entity-escaped (inert) text. Log content is never trusted, including the
// text this crate produces itself, so every fragment entering a LogBuffer
// passes through `encode`.
//
// Core layer: pure logic, no I/O.

use crate::util::constants::{LOG_TEXT_ATTRIBUTE, LOG_TEXT_TAG};
use regex::{Captures, Regex};
use std::sync::OnceLock;

/// Sanitized markup. Only constructible through `encode`/`Markup::text`, so
/// holding one proves the content went through the sanitizer.
#[derive(Debug, Clone, Default, PartialEq, Eq, serde::Serialize)]
#[serde(transparent)]
pub struct Markup(String);

impl Markup {
    /// Sanitize plain text with no envelope.
    pub fn text(text: &str) -> Self {
        encode(text, None)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_string(self) -> String {
        self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Join sanitized fragments. Each fragment is balanced on its own, so the
    /// concatenation is too.
    pub fn concat<'a>(parts: impl IntoIterator<Item = &'a Markup>) -> Self {
        Self(parts.into_iter().map(Markup::as_str).collect())
    }
}

impl std::fmt::Display for Markup {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Wrap `line` in the markup envelope.
///
/// With a label the sanitized line is wrapped in `<span class="label">`;
/// without one it is emitted as bare sanitized text. The line is sanitized
/// before wrapping, so stray `</span>` in the log cannot close the envelope.
pub fn encode(line: &str, label: Option<&str>) -> Markup {
    let body = sanitize(line);
    match label {
        Some(label) => Markup(format!(
            "<{LOG_TEXT_TAG} {LOG_TEXT_ATTRIBUTE}=\"{}\">{body}</{LOG_TEXT_TAG}>",
            html_escape::encode_double_quoted_attribute(label)
        )),
        None => Markup(body),
    }
}

fn tag_regex() -> &'static Regex {
    static TAG_RE: OnceLock<Regex> = OnceLock::new();
    TAG_RE.get_or_init(|| {
        // Comments, then start/end tags whose attribute text may contain
        // quoted '>' characters.
        Regex::new(
            r#"(?s)<!--.*?-->|<(/?)([A-Za-z][A-Za-z0-9:-]*)((?:[^<>"']|"[^"]*"|'[^']*')*)>"#,
        )
        .expect("tag_regex: invalid regex")
    })
}

fn class_regex() -> &'static Regex {
    static CLASS_RE: OnceLock<Regex> = OnceLock::new();
    CLASS_RE.get_or_init(|| {
        Regex::new(r#"(?i)(?:^|\s)class\s*=\s*(?:"([^"]*)"|'([^']*)'|([^\s"'=<>`]+))"#)
            .expect("class_regex: invalid regex")
    })
}

/// Strip everything outside the allow-list from `input`.
///
/// Text is decoded and re-encoded so existing entities are not double
/// escaped and a bare `<` or `&` becomes inert. Open spans are closed at the
/// end and unmatched closing spans are dropped.
pub fn sanitize(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    let mut open_spans = 0usize;
    let mut last = 0usize;

    for caps in tag_regex().captures_iter(input) {
        let Some(whole) = caps.get(0) else {
            continue;
        };
        push_text(&mut out, &input[last..whole.start()]);
        last = whole.end();

        let Some(name) = caps.get(2) else {
            // Comment.
            continue;
        };
        if !name.as_str().eq_ignore_ascii_case(LOG_TEXT_TAG) {
            continue;
        }

        let closing = caps.get(1).is_some_and(|m| !m.as_str().is_empty());
        if closing {
            if open_spans > 0 {
                open_spans -= 1;
                out.push_str("</");
                out.push_str(LOG_TEXT_TAG);
                out.push('>');
            }
            continue;
        }

        let attrs = caps.get(3).map_or("", |m| m.as_str());
        push_open_span(&mut out, attrs);
        if attrs.trim_end().ends_with('/') {
            out.push_str("</");
            out.push_str(LOG_TEXT_TAG);
            out.push('>');
        } else {
            open_spans += 1;
        }
    }
    push_text(&mut out, &input[last..]);

    for _ in 0..open_spans {
        out.push_str("</");
        out.push_str(LOG_TEXT_TAG);
        out.push('>');
    }
    out
}

fn push_text(out: &mut String, text: &str) {
    if text.is_empty() {
        return;
    }
    let decoded = html_escape::decode_html_entities(text);
    html_escape::encode_text_to_string(decoded, out);
}

fn push_open_span(out: &mut String, attrs: &str) {
    out.push('<');
    out.push_str(LOG_TEXT_TAG);
    if let Some(class) = class_regex().captures(attrs).and_then(|c| class_value(&c)) {
        let decoded = html_escape::decode_html_entities(class);
        out.push(' ');
        out.push_str(LOG_TEXT_ATTRIBUTE);
        out.push_str("=\"");
        html_escape::encode_double_quoted_attribute_to_string(decoded, out);
        out.push('"');
    }
    out.push('>');
}

fn class_value<'a>(caps: &Captures<'a>) -> Option<&'a str> {
    caps.get(1)
        .or_else(|| caps.get(2))
        .or_else(|| caps.get(3))
        .map(|m| m.as_str())
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Every tag left in `markup` must be a bare or class-only span.
    fn assert_only_allowed_tags(markup: &str) {
        let re = Regex::new(r"<[^>]*>").unwrap();
        for tag in re.find_iter(markup) {
            let t = tag.as_str();
            assert!(
                t == "<span>" || t == "</span>" || t.starts_with("<span class=\""),
                "disallowed tag {t:?} in {markup:?}"
            );
            assert!(!t.contains("onclick") && !t.contains("style"), "{t:?}");
        }
    }

    #[test]
    fn test_labelled_line_wrapped() {
        let m = encode("2020-10-16 07:13:04,325 carbon done\n", Some("log-primary"));
        assert_eq!(
            m.as_str(),
            "<span class=\"log-primary\">2020-10-16 07:13:04,325 carbon done\n</span>"
        );
    }

    #[test]
    fn test_unlabelled_line_is_bare_text() {
        assert_eq!(encode("plain line\n", None).as_str(), "plain line\n");
    }

    #[test]
    fn test_script_becomes_inert_text() {
        let m = encode("<script>alert('x')</script> after", Some("log-error"));
        assert_only_allowed_tags(m.as_str());
        assert!(!m.as_str().contains("<script"));
        assert!(m.as_str().contains("alert"));
        assert!(m.as_str().ends_with(" after</span>"));
    }

    #[test]
    fn test_disallowed_attributes_stripped() {
        let m = sanitize(r#"<span class="hi" onclick="evil()" style="x">t</span>"#);
        assert_eq!(m, r#"<span class="hi">t</span>"#);
    }

    #[test]
    fn test_other_elements_stripped() {
        let m = sanitize(r#"<b>bold</b> <a href="javascript:x">link</a><img src=x onerror=y>"#);
        assert_eq!(m, "bold link");
    }

    #[test]
    fn test_comment_removed() {
        assert_eq!(sanitize("a<!-- hidden -->b"), "ab");
    }

    #[test]
    fn test_stray_angle_brackets_escaped() {
        assert_eq!(sanitize("x < y && y > z"), "x &lt; y &amp;&amp; y &gt; z");
    }

    #[test]
    fn test_existing_entities_not_double_escaped() {
        assert_eq!(sanitize("a &amp; b &lt;tag&gt;"), "a &amp; b &lt;tag&gt;");
    }

    #[test]
    fn test_stray_close_cannot_break_envelope() {
        let m = encode("oops</span><script>x()</script>", Some("log-error"));
        assert_eq!(m.as_str(), "<span class=\"log-error\">oopsx()</span>");
    }

    #[test]
    fn test_unclosed_span_is_closed() {
        assert_eq!(sanitize("<SPAN Class='k'>text"), "<span class=\"k\">text</span>");
    }

    #[test]
    fn test_class_value_is_escaped() {
        let m = sanitize(r#"<span class='a"b'>t</span>"#);
        assert_eq!(m, "<span class=\"a&quot;b\">t</span>");
    }

    #[test]
    fn test_concat_preserves_order() {
        let a = encode("A\n", None);
        let b = encode("B\n", Some("log-error"));
        let joined = Markup::concat([&a, &b]);
        assert_eq!(joined.as_str(), "A\n<span class=\"log-error\">B\n</span>");
    }
}
