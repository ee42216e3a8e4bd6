use crate::html::{Element, HtmlDocument, HtmlNode};
use crate::index::{document_path, DocumentIndex, DocumentType, SlugMapEntry};
use crate::references::{
    detect_references, normalize_identifier, DetectedReference, ReferenceCategory,
};
use ego_tree::NodeId;
use serde::{Deserialize, Serialize};

/// Elements whose text is never scanned for citations.
const SKIP_TAGS: &[&str] = &["a", "code", "script", "style", "pre"];
/// Class carried by generated citation links.
pub const LINK_CLASS: &str = "legal-ref";
/// Class of the section anchors that must survive de-linking.
const SECTION_ANCHOR_CLASS: &str = "paragraf";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LinkedReference {
    pub reference: DetectedReference,
    pub target_document_id: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LinkifyResult {
    pub html: String,
    pub linked_references: Vec<LinkedReference>,
}

/// What happened to one detected citation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resolution<'a> {
    Linked {
        href: String,
        entry: &'a SlugMapEntry,
    },
    SelfReference,
    Unresolved,
    TypeMismatch {
        found: DocumentType,
    },
}

/// Turn every resolvable citation in `html` into a link.
///
/// Existing links are unwrapped first, so running this on its own output
/// produces the same markup again. Citations of `source_identifier` itself,
/// citations missing from the index and citations whose category does not
/// fit the indexed document type are left as plain text.
pub fn linkify_html(
    html: &str,
    index: &DocumentIndex,
    source_identifier: Option<&str>,
) -> LinkifyResult {
    let mut document = HtmlDocument::parse(html);

    strip_links(&mut document);
    document.merge_adjacent_text();

    let mut linked_references = Vec::new();
    for text_id in document.text_node_ids() {
        if document.has_ancestor_named(text_id, SKIP_TAGS) {
            continue;
        }
        linkify_text_node(
            &mut document,
            text_id,
            index,
            source_identifier,
            &mut linked_references,
        );
    }

    LinkifyResult {
        html: document.to_html(),
        linked_references,
    }
}

fn strip_links(document: &mut HtmlDocument) {
    let links = document.select_elements(|element| {
        element.name == "a" && element.has_attr("href") && !element.has_class(SECTION_ANCHOR_CLASS)
    });

    for id in links {
        // A link nested in an already unwrapped one is gone with its parent.
        if document.is_attached(id) {
            document.unwrap_to_text(id);
        }
    }
}

fn linkify_text_node(
    document: &mut HtmlDocument,
    text_id: NodeId,
    index: &DocumentIndex,
    source_identifier: Option<&str>,
    linked_references: &mut Vec<LinkedReference>,
) {
    let Some(text) = document
        .tree()
        .get(text_id)
        .and_then(|node| node.value().as_text().map(str::to_string))
    else {
        return;
    };
    if text.trim().is_empty() {
        return;
    }

    let mut pieces: Vec<HtmlNode> = Vec::new();
    let mut last_index = 0;

    for reference in detect_references(&text) {
        match resolve_reference(&reference, index, source_identifier) {
            Resolution::Linked { href, entry } => {
                if reference.start > last_index {
                    pieces.push(HtmlNode::Text(text[last_index..reference.start].to_string()));
                }
                pieces.push(HtmlNode::Element(link_element(&href, &entry.title)));
                pieces.push(HtmlNode::Text(reference.matched_text.clone()));
                last_index = reference.end;
                linked_references.push(LinkedReference {
                    target_document_id: entry.id.clone(),
                    reference,
                });
            }
            Resolution::SelfReference => {
                tracing::debug!("[Linkify] Skipping self reference {}", reference.identifier);
            }
            Resolution::Unresolved => {
                tracing::debug!("[Linkify] No document for {}", reference.identifier);
            }
            Resolution::TypeMismatch { found } => {
                tracing::debug!(
                    "[Linkify] {} resolved to incompatible type {}",
                    reference.identifier,
                    found.as_str()
                );
            }
        }
    }

    if pieces.is_empty() {
        return;
    }
    if last_index < text.len() {
        pieces.push(HtmlNode::Text(text[last_index..].to_string()));
    }

    replace_text_node(document, text_id, pieces);
}

/// Insert `pieces` in place of the text node. An element piece takes the
/// text piece following it as its only child.
fn replace_text_node(document: &mut HtmlDocument, text_id: NodeId, pieces: Vec<HtmlNode>) {
    let Some(mut node) = document.tree_mut().get_mut(text_id) else {
        return;
    };

    let mut pieces = pieces.into_iter();
    while let Some(piece) = pieces.next() {
        match piece {
            HtmlNode::Element(element) => {
                let mut link = node.insert_before(HtmlNode::Element(element));
                if let Some(label) = pieces.next() {
                    link.append(label);
                }
            }
            other => {
                node.insert_before(other);
            }
        }
    }
    node.detach();
}

fn link_element(href: &str, title: &str) -> Element {
    Element::new(
        "a",
        format!(
            r#"<a href="{}" class="{LINK_CLASS}" title="{}" target="_blank" rel="noopener">"#,
            escape_attr(href),
            escape_attr(title)
        ),
    )
}

/// Decide whether `reference` becomes a link and where it points.
pub fn resolve_reference<'a>(
    reference: &DetectedReference,
    index: &'a DocumentIndex,
    source_identifier: Option<&str>,
) -> Resolution<'a> {
    if source_identifier
        .is_some_and(|source| normalize_identifier(source) == reference.identifier)
    {
        return Resolution::SelfReference;
    }

    let Some(entry) = index.get(&reference.identifier) else {
        return Resolution::Unresolved;
    };

    if !is_compatible(reference, entry.doc_type) {
        return Resolution::TypeMismatch {
            found: entry.doc_type,
        };
    }

    let mut href = document_path(entry.doc_type, &entry.slug);
    match (&reference.chapter, &reference.section) {
        (Some(chapter), Some(section)) => href.push_str(&format!("#K{chapter}P{section}")),
        (None, Some(section)) => href.push_str(&format!("#P{section}")),
        _ => {}
    }

    Resolution::Linked { href, entry }
}

/// Whether a citation of this category may point at a document of `doc_type`.
pub fn is_compatible(reference: &DetectedReference, doc_type: DocumentType) -> bool {
    match reference.category {
        ReferenceCategory::Statute => matches!(
            doc_type,
            DocumentType::Statute | DocumentType::StatuteAmendment
        ),
        ReferenceCategory::AgencyRegulation => doc_type == DocumentType::AgencyRegulation,
        ReferenceCategory::CourtCase => match reference.court {
            Some(court) => doc_type == DocumentType::court_case(court),
            None => doc_type.court().is_some(),
        },
    }
}

pub fn escape_attr(value: &str) -> String {
    value
        .replace('&', "&amp;")
        .replace('"', "&quot;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
}
