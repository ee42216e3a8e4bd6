use regex::Regex;
use std::sync::LazyLock;
use tl::{NodeHandle, Parser, VDom};

static WHITESPACE_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\s+").unwrap());

const BLOCK_TAGS: &[&str] = &[
    "p", "div", "h1", "h2", "h3", "h4", "h5", "h6", "li", "ul", "ol", "table", "tr", "section",
    "article", "blockquote", "dd", "dt", "dl",
];
const SKIPPED_TAGS: &[&str] = &["script", "style", "head"];

/// Render a document's markup as plain text, one block element per line with
/// single blank lines between paragraphs.
pub fn html_to_plain_text(html: &str) -> Result<String, String> {
    let dom = parse_html(html)?;
    let parser = dom.parser();

    let mut parts = Vec::new();
    for handle in dom.children() {
        collect_text(parser, *handle, &mut parts);
    }

    Ok(format_text(&parts))
}

fn parse_html(html: &str) -> Result<VDom<'_>, String> {
    tl::parse(html, tl::ParserOptions::default()).map_err(|e| format!("Failed to parse HTML: {e}"))
}

fn collect_text(parser: &Parser<'_>, handle: NodeHandle, parts: &mut Vec<String>) {
    let Some(node) = handle.get(parser) else {
        return;
    };

    if let Some(raw) = node.as_raw() {
        parts.push(decode_entities(raw.as_utf8_str().as_ref()));
        return;
    }

    let Some(tag) = node.as_tag() else {
        return;
    };
    let name = tag.name().as_utf8_str().to_ascii_lowercase();

    if SKIPPED_TAGS.contains(&name.as_str()) {
        return;
    }
    if name == "br" {
        parts.push("\n".to_string());
        return;
    }

    let is_block = BLOCK_TAGS.contains(&name.as_str());
    if is_block {
        parts.push("\n".to_string());
    }
    for child in tag.children().top().iter() {
        collect_text(parser, *child, parts);
    }
    if is_block {
        parts.push("\n\n".to_string());
    }
}

fn decode_entities(value: &str) -> String {
    value
        .replace("&nbsp;", " ")
        .replace('\u{00A0}', " ")
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&#39;", "'")
        .replace("&sect;", "§")
        .replace("&amp;", "&")
}

fn format_text(parts: &[String]) -> String {
    let raw = parts.join("");
    let mut normalized: Vec<String> = Vec::new();
    let mut previous_blank = true;

    for line in raw.split('\n') {
        let line = WHITESPACE_RE.replace_all(line.trim(), " ").to_string();
        if line.is_empty() {
            if !previous_blank {
                normalized.push(String::new());
            }
            previous_blank = true;
        } else {
            normalized.push(line);
            previous_blank = false;
        }
    }

    normalized.join("\n").trim().to_string()
}
