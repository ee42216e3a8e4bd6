//! A forgiving markup tree for rewriting documents in place.
//!
//! Tags are kept verbatim, so any part of a document that is not rewritten
//! serializes back to exactly the bytes it was parsed from. This is not an
//! HTML5 parser: there is no implied-end-tag handling beyond popping to the
//! nearest open element with the same name.

use ego_tree::iter::Edge;
use ego_tree::{NodeId, NodeRef, Tree};
use regex::Regex;
use std::sync::LazyLock;

const VOID_ELEMENTS: &[&str] = &[
    "area", "base", "br", "col", "embed", "hr", "img", "input", "link", "meta", "param", "source",
    "track", "wbr",
];
const RAW_TEXT_ELEMENTS: &[&str] = &["script", "style"];

static ATTR_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"([^\s"'<>/=]+)(?:\s*=\s*(?:"([^"]*)"|'([^']*)'|([^\s"'=<>`]+)))?"#).unwrap()
});

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Element {
    /// Lowercased tag name.
    pub name: String,
    pub open_tag: String,
    /// `None` for void, self-closing and never-closed elements.
    pub close_tag: Option<String>,
}

impl Element {
    pub fn new(name: &str, open_tag: String) -> Self {
        Self {
            name: name.to_string(),
            open_tag,
            close_tag: Some(format!("</{name}>")),
        }
    }

    /// Raw (undecoded) attribute value. Attributes without a value yield `""`.
    pub fn attr(&self, name: &str) -> Option<&str> {
        let body = self.attribute_source();
        ATTR_RE.captures_iter(body).find_map(|caps| {
            let key = caps.get(1)?.as_str();
            if !key.eq_ignore_ascii_case(name) {
                return None;
            }
            let value = caps
                .get(2)
                .or_else(|| caps.get(3))
                .or_else(|| caps.get(4))
                .map_or("", |m| m.as_str());
            Some(value)
        })
    }

    pub fn has_attr(&self, name: &str) -> bool {
        self.attr(name).is_some()
    }

    pub fn has_class(&self, class: &str) -> bool {
        self.attr("class")
            .is_some_and(|value| value.split_whitespace().any(|c| c == class))
    }

    fn attribute_source(&self) -> &str {
        let inner = self.open_tag.trim_start_matches('<');
        let inner = inner.trim_end_matches('>').trim_end_matches('/');
        let name_end = inner
            .find(|c: char| c.is_whitespace() || c == '/')
            .unwrap_or(inner.len());
        &inner[name_end..]
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HtmlNode {
    Fragment,
    Element(Element),
    /// Character data, entities left encoded.
    Text(String),
    /// Comments, doctypes, processing instructions and stray end tags.
    Raw(String),
}

impl HtmlNode {
    pub fn as_element(&self) -> Option<&Element> {
        match self {
            HtmlNode::Element(element) => Some(element),
            _ => None,
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            HtmlNode::Text(text) => Some(text),
            _ => None,
        }
    }
}

pub struct HtmlDocument {
    tree: Tree<HtmlNode>,
}

impl HtmlDocument {
    pub fn parse(html: &str) -> Self {
        let mut builder = TreeBuilder::new();
        builder.consume(html);
        Self { tree: builder.tree }
    }

    pub fn tree(&self) -> &Tree<HtmlNode> {
        &self.tree
    }

    pub fn tree_mut(&mut self) -> &mut Tree<HtmlNode> {
        &mut self.tree
    }

    pub fn root_id(&self) -> NodeId {
        self.tree.root().id()
    }

    pub fn to_html(&self) -> String {
        let mut out = String::new();
        for edge in self.tree.root().traverse() {
            match edge {
                Edge::Open(node) => match node.value() {
                    HtmlNode::Element(element) => out.push_str(&element.open_tag),
                    HtmlNode::Text(text) | HtmlNode::Raw(text) => out.push_str(text),
                    HtmlNode::Fragment => {}
                },
                Edge::Close(node) => {
                    if let HtmlNode::Element(Element {
                        close_tag: Some(close),
                        ..
                    }) = node.value()
                    {
                        out.push_str(close);
                    }
                }
            }
        }
        out
    }

    /// Concatenated raw text of every text node under `id`.
    pub fn text_content(&self, id: NodeId) -> String {
        let Some(node) = self.tree.get(id) else {
            return String::new();
        };
        node.descendants()
            .filter_map(|n| n.value().as_text())
            .collect()
    }

    /// Whether the node is still reachable from the root.
    pub fn is_attached(&self, id: NodeId) -> bool {
        let root = self.root_id();
        match self.tree.get(id) {
            Some(node) => node.id() == root || node.ancestors().any(|a| a.id() == root),
            None => false,
        }
    }

    pub fn has_ancestor_named(&self, id: NodeId, names: &[&str]) -> bool {
        let Some(node) = self.tree.get(id) else {
            return false;
        };
        node.ancestors().any(|ancestor| {
            ancestor
                .value()
                .as_element()
                .is_some_and(|element| names.contains(&element.name.as_str()))
        })
    }

    /// Elements matching `predicate`, in document order.
    pub fn select_elements(&self, predicate: impl Fn(&Element) -> bool) -> Vec<NodeId> {
        self.tree
            .root()
            .descendants()
            .filter(|node| node.value().as_element().is_some_and(&predicate))
            .map(|node| node.id())
            .collect()
    }

    pub fn text_node_ids(&self) -> Vec<NodeId> {
        self.tree
            .root()
            .descendants()
            .filter(|node| matches!(node.value(), HtmlNode::Text(_)))
            .map(|node| node.id())
            .collect()
    }

    /// Replace an element by a single text node holding its text content.
    pub fn unwrap_to_text(&mut self, id: NodeId) {
        let text = self.text_content(id);
        if let Some(mut node) = self.tree.get_mut(id) {
            node.insert_before(HtmlNode::Text(text));
            node.detach();
        }
    }

    /// Merge every run of sibling text nodes into its first node.
    pub fn merge_adjacent_text(&mut self) {
        let parents: Vec<NodeId> = self
            .tree
            .root()
            .descendants()
            .filter(NodeRef::has_children)
            .map(|node| node.id())
            .collect();

        for parent in parents {
            let children: Vec<NodeId> = match self.tree.get(parent) {
                Some(node) => node.children().map(|child| child.id()).collect(),
                None => continue,
            };

            let mut run_head: Option<NodeId> = None;
            for child in children {
                let text = self
                    .tree
                    .get(child)
                    .and_then(|node| node.value().as_text().map(str::to_string));

                match (text, run_head) {
                    (Some(text), Some(head)) => {
                        if let Some(mut head) = self.tree.get_mut(head) {
                            if let HtmlNode::Text(existing) = head.value() {
                                existing.push_str(&text);
                            }
                        }
                        if let Some(mut node) = self.tree.get_mut(child) {
                            node.detach();
                        }
                    }
                    (Some(_), None) => run_head = Some(child),
                    (None, _) => run_head = None,
                }
            }
        }
    }
}

struct TreeBuilder {
    tree: Tree<HtmlNode>,
    open: Vec<NodeId>,
}

impl TreeBuilder {
    fn new() -> Self {
        let tree = Tree::new(HtmlNode::Fragment);
        let root = tree.root().id();
        Self {
            tree,
            open: vec![root],
        }
    }

    fn current(&self) -> NodeId {
        self.open.last().copied().unwrap_or_else(|| self.tree.root().id())
    }

    fn append(&mut self, node: HtmlNode) -> Option<NodeId> {
        let parent = self.current();
        self.tree
            .get_mut(parent)
            .map(|mut parent| parent.append(node).id())
    }

    fn push_text(&mut self, text: &str) {
        if text.is_empty() {
            return;
        }
        let parent = self.current();
        if let Some(mut parent) = self.tree.get_mut(parent) {
            if let Some(mut last) = parent.last_child() {
                if let HtmlNode::Text(existing) = last.value() {
                    existing.push_str(text);
                    return;
                }
            }
        }
        self.append(HtmlNode::Text(text.to_string()));
    }

    fn consume(&mut self, html: &str) {
        let mut pos = 0;
        while pos < html.len() {
            let Some(offset) = html[pos..].find('<') else {
                self.push_text(&html[pos..]);
                break;
            };
            self.push_text(&html[pos..pos + offset]);
            pos += offset;
            pos = self.consume_markup(html, pos);
        }
    }

    /// Handle the construct starting at the `<` at `pos`; returns the
    /// position after it.
    fn consume_markup(&mut self, html: &str, pos: usize) -> usize {
        let rest = &html[pos..];
        let next = rest.as_bytes().get(1).copied();

        if rest.starts_with("<!--") {
            let end = rest.find("-->").map_or(rest.len(), |i| i + 3);
            self.append(HtmlNode::Raw(rest[..end].to_string()));
            return pos + end;
        }

        match next {
            Some(b'/') if rest.as_bytes().get(2).is_some_and(u8::is_ascii_alphabetic) => {
                let Some(end) = rest.find('>') else {
                    self.push_text(rest);
                    return html.len();
                };
                let tag = &rest[..=end];
                self.close_element(&tag_name(&tag[2..]), tag);
                pos + end + 1
            }
            Some(b) if b.is_ascii_alphabetic() => {
                let Some(end) = find_tag_end(rest) else {
                    self.push_text(rest);
                    return html.len();
                };
                let tag = &rest[..=end];
                self.open_element(html, tag, pos + end + 1)
            }
            Some(b'!') | Some(b'?') => {
                let end = rest.find('>').map_or(rest.len(), |i| i + 1);
                self.append(HtmlNode::Raw(rest[..end].to_string()));
                pos + end
            }
            _ => {
                self.push_text("<");
                pos + 1
            }
        }
    }

    fn open_element(&mut self, html: &str, tag: &str, after: usize) -> usize {
        let name = tag_name(&tag[1..]);
        let self_closing = tag.ends_with("/>");
        let element = Element {
            name: name.clone(),
            open_tag: tag.to_string(),
            close_tag: None,
        };
        let Some(id) = self.append(HtmlNode::Element(element)) else {
            return after;
        };

        if self_closing || VOID_ELEMENTS.contains(&name.as_str()) {
            return after;
        }

        if RAW_TEXT_ELEMENTS.contains(&name.as_str()) {
            return self.consume_raw_text(html, id, &name, after);
        }

        self.open.push(id);
        after
    }

    fn consume_raw_text(&mut self, html: &str, id: NodeId, name: &str, after: usize) -> usize {
        let rest = &html[after..];
        let closing = format!("</{name}");
        let content_end = rest
            .to_ascii_lowercase()
            .find(&closing)
            .unwrap_or(rest.len());
        let close_end = rest[content_end..]
            .find('>')
            .map_or(rest.len(), |i| content_end + i + 1);

        if let Some(mut node) = self.tree.get_mut(id) {
            if content_end > 0 {
                node.append(HtmlNode::Text(rest[..content_end].to_string()));
            }
            if let HtmlNode::Element(element) = node.value() {
                if close_end > content_end {
                    element.close_tag = Some(rest[content_end..close_end].to_string());
                }
            }
        }
        after + close_end
    }

    fn close_element(&mut self, name: &str, tag: &str) {
        let matching = self.open.iter().rposition(|id| {
            self.tree
                .get(*id)
                .and_then(|node| node.value().as_element())
                .is_some_and(|element| element.name == name)
        });

        let Some(depth) = matching else {
            self.append(HtmlNode::Raw(tag.to_string()));
            return;
        };

        let id = self.open[depth];
        self.open.truncate(depth);
        if let Some(mut node) = self.tree.get_mut(id) {
            if let HtmlNode::Element(element) = node.value() {
                element.close_tag = Some(tag.to_string());
            }
        }
    }
}

fn tag_name(source: &str) -> String {
    source
        .chars()
        .take_while(|c| c.is_ascii_alphanumeric() || *c == '-' || *c == ':')
        .collect::<String>()
        .to_ascii_lowercase()
}

/// Index of the `>` closing the tag at the start of `source`, skipping
/// quoted attribute values.
fn find_tag_end(source: &str) -> Option<usize> {
    let mut quote: Option<u8> = None;
    for (i, byte) in source.bytes().enumerate() {
        match quote {
            Some(q) if byte == q => quote = None,
            Some(_) => {}
            None => match byte {
                b'"' | b'\'' => quote = Some(byte),
                b'>' => return Some(i),
                _ => {}
            },
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    fn round_trip(html: &str) {
        assert_eq!(HtmlDocument::parse(html).to_html(), html);
    }

    #[test]
    fn serializes_untouched_markup_verbatim() {
        round_trip(r#"<div CLASS='x'><p>Ett &amp; två<br>tre</p><img src="a.png"/></div>"#);
        round_trip("<!DOCTYPE html><!-- note --><p>unclosed <b>bold</p> tail");
        round_trip("a < b and </span> stray");
        round_trip("<script>if (a < b) { x = '</p>'; }</script><style>p{}</style>");
        round_trip(r#"<a title="x > y" href="/a">link</a>"#);
    }

    #[test]
    fn script_content_is_one_text_node() {
        let doc = HtmlDocument::parse("<script>a<b>c</b></script>");
        let texts = doc.text_node_ids();
        assert_eq!(texts.len(), 1);
        assert!(doc.has_ancestor_named(texts[0], &["script"]));
    }

    #[test]
    fn reads_attributes_in_any_quote_style() {
        let doc = HtmlDocument::parse(r#"<a name=P1 class='paragraf' href="/x" hidden>"#);
        let ids = doc.select_elements(|e| e.name == "a");
        let element = doc.tree().get(ids[0]).unwrap().value().as_element().unwrap();
        assert_eq!(element.attr("name"), Some("P1"));
        assert_eq!(element.attr("HREF"), Some("/x"));
        assert_eq!(element.attr("hidden"), Some(""));
        assert!(element.has_class("paragraf"));
        assert!(!element.has_attr("id"));
    }

    #[test]
    fn unwrapping_then_merging_joins_text() {
        let mut doc = HtmlDocument::parse(r#"<p>lagen <a href="/x">(2012:295)</a> gäller</p>"#);
        let links = doc.select_elements(|e| e.name == "a");
        doc.unwrap_to_text(links[0]);
        doc.merge_adjacent_text();
        assert_eq!(doc.to_html(), "<p>lagen (2012:295) gäller</p>");
        assert_eq!(doc.text_node_ids().len(), 1);
    }
}
