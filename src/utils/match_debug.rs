// src/utils/match_debug.rs
use std::fs::File;
use std::io::Write;
use std::path::Path;
use crate::extractors::{FieldExtractor, FieldSpan};
use crate::utils::error::AppError;

/// Renders a block with every field match wrapped as `[[Field|text]]`.
/// Spans overlapping an earlier marked span are left unmarked.
pub fn annotate_block(block: &str, spans: &[FieldSpan]) -> String {
    let mut annotated = String::with_capacity(block.len() + spans.len() * 16);

    let mut last_pos = 0;
    let mut sorted_spans = spans.to_vec();
    sorted_spans.sort_by_key(|s| s.start); // Sort by position

    for span in sorted_spans {
        if span.start < last_pos {
            tracing::trace!(
                "Skipping overlapping {} match at {}-{}",
                span.field,
                span.start,
                span.end
            );
            continue;
        }

        // Add content before the match
        annotated.push_str(&block[last_pos..span.start]);

        annotated.push_str("[[");
        annotated.push_str(span.field.as_str());
        annotated.push('|');
        annotated.push_str(&block[span.start..span.end]);
        annotated.push_str("]]");

        last_pos = span.end;
    }

    // Add any remaining content
    annotated.push_str(&block[last_pos..]);
    annotated
}

/// Writes an annotated copy of `document`, block by block, showing where each field matched.
pub fn save_match_report(
    document: &str,
    extractor: &FieldExtractor,
    filename: &Path,
) -> Result<(), AppError> {
    let mut file = File::create(filename)?;

    for (index, block) in extractor.split_blocks(document).into_iter().enumerate() {
        let spans = extractor.field_spans(block);
        writeln!(file, "--- block {} ({} matches) ---", index, spans.len())?;
        writeln!(file, "{}", annotate_block(block, &spans))?;
    }

    tracing::info!("Saved match debug report to {}", filename.display());
    Ok(())
}
