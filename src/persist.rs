use crate::linkify::LinkedReference;
use crate::runtime::types::CrossReferenceStore;
use crate::types::{CrossReferenceEdge, ReferenceType};
use std::collections::HashSet;

/// Bytes of plain text kept on either side of a citation.
pub const CONTEXT_MARGIN: usize = 100;
const ELLIPSIS: &str = "...";

/// Replace the outbound citation edges of `source_id` with one edge per
/// distinct target in `linked`. Returns the number of edges written.
///
/// Nothing is written when `linked` is empty, so a document without
/// citations keeps whatever edges it had.
pub async fn save_cross_references(
    store: &dyn CrossReferenceStore,
    source_id: &str,
    linked: &[LinkedReference],
    plain_text: &str,
) -> Result<usize, String> {
    if linked.is_empty() {
        return Ok(0);
    }

    let edges = build_edges(source_id, linked, plain_text);
    let written = store.replace_references(source_id, &edges).await?;
    tracing::debug!(
        "[Linkify] Stored {} cross references for {}",
        written,
        source_id
    );
    Ok(written)
}

pub fn build_edges(
    source_id: &str,
    linked: &[LinkedReference],
    plain_text: &str,
) -> Vec<CrossReferenceEdge> {
    dedupe_by_target(linked)
        .into_iter()
        .map(|link| CrossReferenceEdge {
            source_document_id: source_id.to_string(),
            target_document_id: link.target_document_id.clone(),
            reference_type: ReferenceType::References,
            context: Some(context_snippet(
                plain_text,
                link.reference.start,
                link.reference.end,
            )),
        })
        .collect()
}

/// First occurrence of every target, in input order.
pub fn dedupe_by_target(linked: &[LinkedReference]) -> Vec<&LinkedReference> {
    let mut seen = HashSet::new();
    linked
        .iter()
        .filter(|link| seen.insert(link.target_document_id.as_str()))
        .collect()
}

/// The text around `start..end`, widened by [`CONTEXT_MARGIN`] on both sides.
/// An ellipsis marks each side where the window stops short of the text.
pub fn context_snippet(text: &str, start: usize, end: usize) -> String {
    let start = floor_char_boundary(text, start.min(text.len()));
    let end = ceil_char_boundary(text, end.clamp(start, text.len()));

    let window_start = floor_char_boundary(text, start.saturating_sub(CONTEXT_MARGIN));
    let window_end = ceil_char_boundary(text, (end + CONTEXT_MARGIN).min(text.len()));

    let mut snippet = String::new();
    if window_start > 0 {
        snippet.push_str(ELLIPSIS);
    }
    snippet.push_str(text[window_start..window_end].trim());
    if window_end < text.len() {
        snippet.push_str(ELLIPSIS);
    }
    snippet
}

fn floor_char_boundary(text: &str, mut index: usize) -> usize {
    while index > 0 && !text.is_char_boundary(index) {
        index -= 1;
    }
    index
}

fn ceil_char_boundary(text: &str, mut index: usize) -> usize {
    while index < text.len() && !text.is_char_boundary(index) {
        index += 1;
    }
    index
}
