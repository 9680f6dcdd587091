use super::LinkOutput;
use super::types::{ByteRange, TagLink};

/// Write `text` to `output`, wrapping each link's range in link markup.
///
/// Links are applied in position order. Empty ranges, ranges outside the text
/// or off a char boundary, and ranges overlapping an earlier link are written
/// as plain text rather than failing the whole render.
pub fn process_links<'a, O: LinkOutput>(
    text: &str,
    links: &[TagLink<'a>],
    output: &mut O,
) -> Result<(), O::Error> {
    let mut ordered: Vec<&TagLink<'a>> = links.iter().filter(|l| !l.index.is_empty()).collect();
    ordered.sort_by_key(|l| (l.index.start(), l.index.end()));

    let mut last_pos = 0;
    let mut previous: Option<ByteRange> = None;

    for link in ordered {
        if previous.is_some_and(|p| p.overlaps(&link.index)) {
            continue;
        }
        let range = link.index.to_range();
        let (Some(before), Some(inner)) = (text.get(last_pos..range.start), text.get(range.clone()))
        else {
            continue;
        };

        output.write_text(before)?;
        output.start_link(link)?;
        output.write_text(inner)?;
        output.end_link(link)?;
        last_pos = range.end;
        previous = Some(link.index);
    }

    if last_pos < text.len() {
        output.write_text(&text[last_pos..])?;
    }

    Ok(())
}
