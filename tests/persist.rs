mod common;

use common::{default_index, seeded_store, MockReferenceStore};
use legal_xref::linkify::{linkify_html, LinkedReference};
use legal_xref::persist::{context_snippet, dedupe_by_target, save_cross_references, CONTEXT_MARGIN};
use legal_xref::references::{DetectedReference, ReferenceCategory};
use legal_xref::runtime::types::CrossReferenceStore;
use legal_xref::types::{CrossReferenceEdge, ReferenceType};

fn linked(target: &str, start: usize, end: usize) -> LinkedReference {
    LinkedReference {
        reference: DetectedReference {
            matched_text: "x".repeat(end - start),
            identifier: format!("STATUTE {target}"),
            category: ReferenceCategory::Statute,
            court: None,
            chapter: None,
            section: None,
            start,
            end,
        },
        target_document_id: target.to_string(),
    }
}

#[test]
fn dedupes_by_target_keeping_first() {
    let links = vec![linked("a", 0, 3), linked("b", 5, 8), linked("a", 10, 13)];
    let kept = dedupe_by_target(&links);
    assert_eq!(kept.len(), 2);
    assert_eq!(kept[0].reference.start, 0);
    assert_eq!(kept[1].target_document_id, "b");
}

#[test]
fn short_text_has_no_ellipsis() {
    let text = "Se lagen (2012:295) nu.";
    assert_eq!(context_snippet(text, 3, 19), text);
}

#[test]
fn long_text_gets_ellipsis_on_truncated_sides() {
    let text = format!("{}MATCH{}", "a".repeat(150), "b".repeat(150));
    let snippet = context_snippet(&text, 150, 155);
    assert!(snippet.starts_with("..."));
    assert!(snippet.ends_with("..."));
    assert_eq!(
        snippet.len(),
        3 + CONTEXT_MARGIN + 5 + CONTEXT_MARGIN + 3
    );

    let snippet = context_snippet(&text, 10, 15);
    assert!(!snippet.starts_with("..."));
    assert!(snippet.ends_with("..."));

    let snippet = context_snippet(&text, 290, 305);
    assert!(snippet.starts_with("..."));
    assert!(!snippet.ends_with("..."));
}

#[test]
fn window_respects_char_boundaries() {
    let text = "ö".repeat(200);
    let snippet = context_snippet(&text, 201, 203);
    assert!(snippet.starts_with("..."));
    assert!(snippet.trim_matches('.').chars().all(|c| c == 'ö'));
}

#[test]
fn offsets_past_the_text_are_clamped() {
    let snippet = context_snippet("kort text", 500, 520);
    assert_eq!(snippet, "kort text");
}

#[tokio::test]
async fn empty_input_does_not_touch_the_store() {
    let store = MockReferenceStore::new();
    let written = save_cross_references(&store, "doc", &[], "text").await.unwrap();
    assert_eq!(written, 0);
    assert_eq!(store.call_count(), 0);
}

#[tokio::test]
async fn writes_one_edge_per_target() {
    let store = MockReferenceStore::new();
    let text = "Se lagen (1982:673) och igen lagen (1982:673) samt AFS 2001:1.";
    let result = linkify_html(&format!("<p>{text}</p>"), &default_index(), None);
    assert_eq!(result.linked_references.len(), 3);

    let written = save_cross_references(&store, "doc", &result.linked_references, text)
        .await
        .unwrap();
    assert_eq!(written, 2);

    let edges = store.references_from("doc").await.unwrap();
    assert_eq!(edges.len(), 2);
    assert_eq!(edges[0].target_document_id, "id-arbetstidslag-1982-673");
    assert_eq!(edges[0].reference_type, ReferenceType::References);
    assert_eq!(edges[0].context.as_deref(), Some(text));
}

#[tokio::test]
async fn store_failure_propagates() {
    let store = MockReferenceStore::failing();
    let result = save_cross_references(&store, "doc", &[linked("a", 0, 1)], "x").await;
    assert_eq!(result, Err("store unavailable".to_string()));
}

#[tokio::test]
async fn sqlite_replacement_is_atomic_and_keeps_other_types() {
    let store = seeded_store();
    let source = "id-arbetstidslag-1982-673";
    store
        .insert_reference(&CrossReferenceEdge {
            source_document_id: source.to_string(),
            target_document_id: "id-nja-2020-s-45".to_string(),
            reference_type: ReferenceType::Cites,
            context: None,
        })
        .unwrap();

    let text = "AFS 2001:1 och AD 2019 nr 45";
    let first = vec![linked("id-afs-2001-1", 0, 10), linked("id-ad-2019-nr-45", 15, 28)];
    assert_eq!(save_cross_references(&store, source, &first, text).await.unwrap(), 2);

    let second = vec![linked("id-afs-2001-1", 0, 10)];
    assert_eq!(save_cross_references(&store, source, &second, text).await.unwrap(), 1);

    let edges = store.references_from(source).await.unwrap();
    let mut summary: Vec<(&str, ReferenceType)> = edges
        .iter()
        .map(|e| (e.target_document_id.as_str(), e.reference_type))
        .collect();
    summary.sort();
    assert_eq!(
        summary,
        vec![
            ("id-afs-2001-1", ReferenceType::References),
            ("id-nja-2020-s-45", ReferenceType::Cites),
        ]
    );

    // A failing insert rolls the delete back with it.
    let dangling = vec![linked("id-some-law-2012-295", 0, 1), linked("missing", 2, 3)];
    assert!(save_cross_references(&store, source, &dangling, text).await.is_err());
    let edges = store.references_from(source).await.unwrap();
    assert_eq!(edges.len(), 2);
    assert!(edges
        .iter()
        .any(|e| e.target_document_id == "id-afs-2001-1"));
}
