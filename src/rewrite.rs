use crate::linkify::LINK_CLASS;
use regex::Regex;
use std::sync::LazyLock;

/// Route prefix of the authenticated workspace.
pub const WORKSPACE_PREFIX: &str = "/browse";

static ANCHOR_TAG_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?i)<a\b[^>]*>").unwrap());
static CLASS_ATTR_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"(?i)(?:^|\s)class\s*=\s*"([^"]*)""#).unwrap());
static PUBLIC_HREF_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?i)((?:^|\s)href\s*=\s*")(/(?:lagar|foreskrifter|rattsfall|eu)/)"#).unwrap()
});

/// Point generated citation links at the workspace routes instead of the
/// public ones.
pub fn rewrite_links_for_workspace(html: &str) -> String {
    prefix_reference_links(html, WORKSPACE_PREFIX)
}

/// Insert `prefix` in front of the public path of every citation link.
/// Links that do not carry the citation class, or whose target is not a
/// public document path, are left alone.
pub fn prefix_reference_links(html: &str, prefix: &str) -> String {
    ANCHOR_TAG_RE
        .replace_all(html, |caps: &regex::Captures<'_>| {
            let tag = &caps[0];
            if !is_reference_link(tag) {
                return tag.to_string();
            }
            PUBLIC_HREF_RE
                .replace(tag, |href: &regex::Captures<'_>| {
                    format!("{}{prefix}{}", &href[1], &href[2])
                })
                .into_owned()
        })
        .into_owned()
}

fn is_reference_link(tag: &str) -> bool {
    CLASS_ATTR_RE.captures(tag).is_some_and(|caps| {
        caps[1]
            .split_whitespace()
            .any(|class| class == LINK_CLASS)
    })
}
