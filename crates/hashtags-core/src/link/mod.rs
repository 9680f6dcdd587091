//! Span-based link rendering.
//!
//! Links are described by byte ranges into the source text and spliced in a
//! single ordered pass, so inserted markup can never be re-matched by a
//! later replacement.

mod html_output;
mod markdown_output;
mod processor;
mod types;

pub use html_output::{HASHTAG_CLASS, HtmlLinkOutput, render_html_links};
pub use markdown_output::{MarkdownLinkOutput, render_markdown_links};
pub use processor::process_links;
pub use types::{ByteRange, TagLink};

pub trait LinkOutput {
    type Error;

    fn write_text(&mut self, text: &str) -> Result<(), Self::Error>;
    fn start_link(&mut self, link: &TagLink<'_>) -> Result<(), Self::Error>;
    fn end_link(&mut self, link: &TagLink<'_>) -> Result<(), Self::Error>;
}
