// LogTab - ui/console.rs
//
// Terminal presenter for a LogBuffer. Consumes the buffer's RenderNotice
// stream and writes each change to an output stream in one of three forms:
// ANSI-coloured plain text, the sanitized markup itself, or one JSON object
// per notice for machine consumers.
//
// A terminal always shows the newest output, so ScrollTarget::Bottom needs no
// action here.

use crate::app::buffer::{BufferChange, RenderNotice};
use crate::ui::theme;
use crate::util::constants::LOG_TEXT_TAG;
use regex::Regex;
use std::io::{self, Write};
use std::sync::mpsc;
use std::sync::OnceLock;

/// How rendered changes are written.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, clap::ValueEnum)]
pub enum OutputFormat {
    /// Plain text, labels coloured with ANSI escapes.
    #[default]
    Ansi,
    /// The sanitized markup, unchanged.
    Markup,
    /// One JSON RenderNotice per line.
    Json,
}

/// Writes buffer changes to a stream as they arrive.
pub struct ConsoleRenderer {
    format: OutputFormat,
    rx: mpsc::Receiver<RenderNotice>,
}

impl ConsoleRenderer {
    pub fn new(format: OutputFormat, rx: mpsc::Receiver<RenderNotice>) -> Self {
        Self { format, rx }
    }

    pub fn format(&self) -> OutputFormat {
        self.format
    }

    /// Write every pending notice to `out` without blocking.
    ///
    /// Returns the number of notices written.
    pub fn drain<W: Write>(&mut self, out: &mut W) -> io::Result<usize> {
        let mut written = 0usize;
        while let Ok(notice) = self.rx.try_recv() {
            self.write_notice(out, &notice)?;
            written += 1;
        }
        if written > 0 {
            out.flush()?;
        }
        Ok(written)
    }

    fn write_notice<W: Write>(&self, out: &mut W, notice: &RenderNotice) -> io::Result<()> {
        match self.format {
            OutputFormat::Json => {
                serde_json::to_writer(&mut *out, notice)?;
                out.write_all(b"\n")
            }
            OutputFormat::Markup => match &notice.change {
                BufferChange::Appended(markup) | BufferChange::Replaced(markup) => {
                    out.write_all(markup.as_str().as_bytes())
                }
            },
            OutputFormat::Ansi => match &notice.change {
                BufferChange::Appended(markup) => {
                    out.write_all(markup_to_ansi(markup.as_str()).as_bytes())
                }
                BufferChange::Replaced(markup) => {
                    out.write_all(theme::CLEAR_SCREEN.as_bytes())?;
                    let text = markup_to_ansi(markup.as_str());
                    out.write_all(text.as_bytes())?;
                    // Placeholders carry no terminator of their own.
                    if !text.is_empty() && !text.ends_with('\n') {
                        out.write_all(b"\n")?;
                    }
                    Ok(())
                }
            },
        }
    }
}

fn span_regex() -> &'static Regex {
    static SPAN_RE: OnceLock<Regex> = OnceLock::new();
    SPAN_RE.get_or_init(|| {
        Regex::new(&format!(
            r#"<{LOG_TEXT_TAG}(?: class="([^"]*)")?>|</{LOG_TEXT_TAG}>"#
        ))
        .expect("span_regex: invalid regex")
    })
}

/// Convert sanitized markup to terminal text.
///
/// Spans become SGR sequences chosen by `theme::label_style`; entities are
/// decoded. Input is expected to come from the sanitizer, so only bare or
/// class-only spans appear.
pub fn markup_to_ansi(markup: &str) -> String {
    let mut out = String::with_capacity(markup.len());
    let mut styles: Vec<Option<&'static str>> = Vec::new();
    let mut last = 0usize;

    for caps in span_regex().captures_iter(markup) {
        let Some(whole) = caps.get(0) else {
            continue;
        };
        out.push_str(&html_escape::decode_html_entities(&markup[last..whole.start()]));
        last = whole.end();

        if whole.as_str().starts_with("</") {
            if styles.pop().flatten().is_some() {
                out.push_str(theme::RESET);
                // Restore the enclosing span's style.
                if let Some(style) = styles.iter().rev().flatten().next() {
                    out.push_str(style);
                }
            }
        } else {
            let style = caps.get(1).map(|class| {
                let label = html_escape::decode_html_entities(class.as_str());
                theme::label_style(&label)
            });
            if let Some(style) = style {
                out.push_str(style);
            }
            styles.push(style);
        }
    }
    out.push_str(&html_escape::decode_html_entities(&markup[last..]));
    if styles.iter().any(Option::is_some) {
        out.push_str(theme::RESET);
    }
    out
}
