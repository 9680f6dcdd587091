use super::{LinkOutput, TagLink};
use std::fmt::Write;

/// Wraps hashtags in markdown link syntax, for hosts that store markdown and
/// render later.
pub struct MarkdownLinkOutput<W: Write> {
    writer: W,
    base_path: String,
}

impl<W: Write> MarkdownLinkOutput<W> {
    pub fn new(writer: W, base_path: impl Into<String>) -> Self {
        Self {
            writer,
            base_path: base_path.into(),
        }
    }

    pub fn into_inner(self) -> W {
        self.writer
    }
}

impl<W: Write> LinkOutput for MarkdownLinkOutput<W> {
    type Error = std::fmt::Error;

    fn write_text(&mut self, text: &str) -> Result<(), Self::Error> {
        self.writer.write_str(text)
    }

    fn start_link(&mut self, _link: &TagLink<'_>) -> Result<(), Self::Error> {
        write!(self.writer, "[")
    }

    fn end_link(&mut self, link: &TagLink<'_>) -> Result<(), Self::Error> {
        write!(self.writer, "]({}/tags/{})", self.base_path, link.tag)
    }
}

pub fn render_markdown_links(
    text: &str,
    links: &[TagLink<'_>],
    base_path: &str,
) -> Result<String, std::fmt::Error> {
    let mut output = MarkdownLinkOutput::new(String::with_capacity(text.len()), base_path);
    super::process_links(text, links, &mut output)?;
    Ok(output.into_inner())
}
