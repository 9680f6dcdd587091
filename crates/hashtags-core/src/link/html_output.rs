use super::{LinkOutput, TagLink};
use std::fmt::Write;

/// Class attribute marking anchors this crate produced.
pub const HASHTAG_CLASS: &str = "hashtag";

/// Splices `<a>` elements into content that is already HTML.
///
/// Text is passed through untouched: it came out of the host's renderer and
/// escaping it again would corrupt existing entities.
pub struct HtmlLinkOutput<W: Write> {
    writer: W,
    base_path: String,
}

impl<W: Write> HtmlLinkOutput<W> {
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

impl<W: Write> LinkOutput for HtmlLinkOutput<W> {
    type Error = std::fmt::Error;

    fn write_text(&mut self, text: &str) -> Result<(), Self::Error> {
        self.writer.write_str(text)
    }

    fn start_link(&mut self, link: &TagLink<'_>) -> Result<(), Self::Error> {
        write!(
            self.writer,
            "<a class=\"{}\" href=\"{}/tags/",
            HASHTAG_CLASS, self.base_path
        )?;
        for c in link.tag.as_str().chars() {
            match c {
                '"' => self.writer.write_str("%22")?,
                _ => self.writer.write_char(c)?,
            }
        }
        write!(self.writer, "\">")
    }

    fn end_link(&mut self, _link: &TagLink<'_>) -> Result<(), Self::Error> {
        write!(self.writer, "</a>")
    }
}

pub fn render_html_links(
    text: &str,
    links: &[TagLink<'_>],
    base_path: &str,
) -> Result<String, std::fmt::Error> {
    let mut output = HtmlLinkOutput::new(String::with_capacity(text.len()), base_path);
    super::process_links(text, links, &mut output)?;
    Ok(output.into_inner())
}
