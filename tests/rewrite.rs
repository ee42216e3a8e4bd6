mod common;

use common::default_index;
use legal_xref::linkify::linkify_html;
use legal_xref::rewrite::{prefix_reference_links, rewrite_links_for_workspace};

#[test]
fn prefixes_generated_links() {
    let html = r#"<a href="/lagar/x" class="legal-ref" title="X">lagen (2012:295)</a>"#;
    assert_eq!(
        rewrite_links_for_workspace(html),
        r#"<a href="/browse/lagar/x" class="legal-ref" title="X">lagen (2012:295)</a>"#
    );
}

#[test]
fn attribute_order_does_not_matter() {
    let html = r#"<a class="legal-ref" title="X" href="/rattsfall/hd/nja">NJA</a> <a title="Y" class="legal-ref extra" href="/eu/direktiv/d">d</a>"#;
    let rewritten = rewrite_links_for_workspace(html);
    assert!(rewritten.contains(r#"href="/browse/rattsfall/hd/nja""#));
    assert!(rewritten.contains(r#"href="/browse/eu/direktiv/d""#));
}

#[test]
fn leaves_other_links_alone() {
    let html = r#"<a href="/lagar/x">plain</a><a class="paragraf" name="P1"></a><a class="legal-ref" href="https://example.com/lagar/x">ext</a><p class="legal-ref">/lagar/</p>"#;
    assert_eq!(rewrite_links_for_workspace(html), html);
}

#[test]
fn rewriting_twice_changes_nothing() {
    let linked = linkify_html(
        "<p>Se lagen (1982:673) och AFS 2001:1.</p>",
        &default_index(),
        None,
    );
    let once = rewrite_links_for_workspace(&linked.html);
    assert!(once.contains(r#"href="/browse/lagar/arbetstidslag-1982-673""#));
    assert!(once.contains(r#"href="/browse/foreskrifter/afs-2001-1""#));
    assert_eq!(rewrite_links_for_workspace(&once), once);
}

#[test]
fn custom_prefix() {
    let html = r#"<a href="/foreskrifter/afs" class="legal-ref">AFS</a>"#;
    assert_eq!(
        prefix_reference_links(html, "/ws/42"),
        r#"<a href="/ws/42/foreskrifter/afs" class="legal-ref">AFS</a>"#
    );
}

#[test]
fn data_attributes_are_not_hrefs() {
    let html = r#"<a data-href="/lagar/x" data-class="y" class="legal-ref" href="/lagar/x">X</a>"#;
    assert_eq!(
        rewrite_links_for_workspace(html),
        r#"<a data-href="/lagar/x" data-class="y" class="legal-ref" href="/browse/lagar/x">X</a>"#
    );

    let unmarked = r#"<a data-class="legal-ref" href="/lagar/x">X</a>"#;
    assert_eq!(rewrite_links_for_workspace(unmarked), unmarked);
}
