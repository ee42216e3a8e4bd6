use regex::Regex;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::sync::LazyLock;

/// Bytes searched backwards from an anchor for a heading.
const HEADING_LOOKBACK: usize = 500;
/// A heading found in the lookback window must start closer than this.
const HEADING_MAX_DISTANCE: usize = 200;

const TRANSITION_MARKER: &str = r#"<a name="overgang">"#;

static HAS_CHAPTERS_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r#"name="K\d+P"#).unwrap());
static CHAPTER_ANCHOR_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?i)<a\s+class="paragraf"\s+name="K(\d+)P(\d+[a-z]?)""#).unwrap()
});
static SECTION_ANCHOR_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"(?i)<a\s+class="paragraf"\s+name="P(\d+[a-z]?)""#).unwrap());
static FALLBACK_CHAPTER_ANCHOR_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?i)<a\s+name="K(\d+)P(\d+[a-z]?)"\s+class="paragraf""#).unwrap()
});
static FALLBACK_SECTION_ANCHOR_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"(?i)<a\s+name="P(\d+[a-z]?)"\s+class="paragraf""#).unwrap());

static TRAILING_CHAPTER_HEADING_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"(?is)<h3\s+name="K\d+">.*$"#).unwrap());
static TRAILING_MARKER_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"(?i)<p>\s*<a\s+name="S\d+"></a></p>\s*$"#).unwrap());
static TRAILING_EMPTY_P_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)<p>\s*</p>\s*$").unwrap());

static BR_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?i)<br\s*/?>").unwrap());
static BLOCK_END_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?i)</(?:p|div)>").unwrap());
static TAG_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"<[^>]+>").unwrap());
static NUMERIC_ENTITY_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"&#(\d+);").unwrap());
static BLANK_LINES_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\n\s*\n").unwrap());
static INLINE_SPACE_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"[ \t]+").unwrap());
static CHAPTER_HEADING_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"(?i)<h3\s+name="K(\d+)">"#).unwrap());
static H4_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?i)<h4[^>]*>([^<]+)</h4>").unwrap());

static SECTION_MARK_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\s*§\s*").unwrap());
static LETTER_SUFFIX_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)(\d+)([a-z])").unwrap());
static SECTION_NUMBER_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(\d*)(.*)$").unwrap());

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ParsedSection {
    pub chapter: Option<String>,
    pub section: String,
    pub html_content: String,
    pub text_content: String,
    pub heading: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SectionParseResult {
    pub sections: Vec<ParsedSection>,
    pub has_chapters: bool,
    pub total_sections: usize,
    pub errors: Vec<String>,
}

impl SectionParseResult {
    fn failed(error: &str) -> Self {
        Self {
            errors: vec![error.to_string()],
            ..Self::default()
        }
    }
}

#[derive(Debug, Clone)]
struct AnchorMatch {
    chapter: Option<String>,
    section: String,
    index: usize,
}

/// Split a statute's markup into its numbered sections.
///
/// Never fails: empty or anchor-less markup produces an empty result whose
/// `errors` describe what went wrong.
pub fn parse_law_sections(html: &str) -> SectionParseResult {
    if html.trim().is_empty() {
        return SectionParseResult::failed("Empty HTML content");
    }

    let has_chapters = HAS_CHAPTERS_RE.is_match(html);
    let (primary, fallback): (&Regex, &Regex) = if has_chapters {
        (&CHAPTER_ANCHOR_RE, &FALLBACK_CHAPTER_ANCHOR_RE)
    } else {
        (&SECTION_ANCHOR_RE, &FALLBACK_SECTION_ANCHOR_RE)
    };

    let mut anchors = find_anchors(html, primary, has_chapters);
    if anchors.is_empty() {
        anchors = find_anchors(html, fallback, has_chapters);
    }

    if anchors.is_empty() {
        return SectionParseResult::failed("No section anchors found in HTML");
    }

    let mut sections = Vec::with_capacity(anchors.len());
    for (position, current) in anchors.iter().enumerate() {
        let next = anchors.get(position + 1);
        let end_index = match next {
            Some(next) => next.index,
            None => last_section_end(html, current.index),
        };

        let mut html_content = html[current.index..end_index].trim();

        if let Some(next) = next {
            if has_chapters && current.chapter != next.chapter {
                if let Some(next_chapter) = &next.chapter {
                    if let Some(offset) = find_chapter_heading(html_content, next_chapter) {
                        html_content = html_content[..offset].trim();
                    }
                }
            }
        }

        let html_content = clean_trailing_content(html_content);
        let text_content = html_to_text(&html_content);
        let heading = extract_section_heading(html, current.index, &html_content);

        sections.push(ParsedSection {
            chapter: current.chapter.clone(),
            section: current.section.clone(),
            html_content,
            text_content,
            heading,
        });
    }

    sections.sort_by(compare_sections);

    SectionParseResult {
        total_sections: sections.len(),
        sections,
        has_chapters,
        errors: Vec::new(),
    }
}

fn find_anchors(html: &str, pattern: &Regex, has_chapters: bool) -> Vec<AnchorMatch> {
    pattern
        .captures_iter(html)
        .filter_map(|caps| {
            let whole = caps.get(0)?;
            let (chapter, section) = if has_chapters {
                (Some(caps[1].to_string()), caps[2].to_ascii_lowercase())
            } else {
                (None, caps[1].to_ascii_lowercase())
            };
            Some(AnchorMatch {
                chapter,
                section,
                index: whole.start(),
            })
        })
        .collect()
}

fn last_section_end(html: &str, start: usize) -> usize {
    if let Some(offset) = html[start..].find(TRANSITION_MARKER) {
        if offset > 0 {
            return start + offset;
        }
    }

    match html.rfind("</div>") {
        Some(index) if index > start => index,
        _ => html.len(),
    }
}

fn find_chapter_heading(content: &str, chapter: &str) -> Option<usize> {
    CHAPTER_HEADING_RE
        .captures_iter(content)
        .find(|caps| &caps[1] == chapter)
        .and_then(|caps| caps.get(0))
        .map(|m| m.start())
}

fn clean_trailing_content(html: &str) -> String {
    let cleaned = TRAILING_CHAPTER_HEADING_RE.replace(html, "");
    let cleaned = TRAILING_MARKER_RE.replace_all(cleaned.trim(), "");
    let cleaned = TRAILING_EMPTY_P_RE.replace_all(cleaned.trim(), "");
    cleaned.trim().to_string()
}

/// Render a section's markup as plain text.
pub fn html_to_text(html: &str) -> String {
    let text = BR_RE.replace_all(html, "\n");
    let text = BLOCK_END_RE.replace_all(&text, "\n");
    let text = TAG_RE.replace_all(&text, "");

    let text = text
        .replace("&nbsp;", " ")
        .replace("&amp;", "&")
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"");
    let text = NUMERIC_ENTITY_RE.replace_all(&text, |caps: &regex::Captures<'_>| {
        caps[1]
            .parse::<u32>()
            .ok()
            .and_then(char::from_u32)
            .map(String::from)
            .unwrap_or_else(|| caps[0].to_string())
    });

    let text = BLANK_LINES_RE.replace_all(&text, "\n\n");
    let text = INLINE_SPACE_RE.replace_all(&text, " ");
    text.trim().to_string()
}

fn extract_section_heading(full_html: &str, section_start: usize, section_html: &str) -> Option<String> {
    if let Some(caps) = H4_RE.captures(section_html) {
        return Some(caps[1].trim().to_string());
    }

    let context_start = floor_char_boundary(full_html, section_start.saturating_sub(HEADING_LOOKBACK));
    let context = &full_html[context_start..section_start];

    let last = H4_RE.captures_iter(context).last()?;
    let whole = last.get(0)?;
    let distance = section_start - context_start - whole.start();
    if distance < HEADING_MAX_DISTANCE {
        Some(last[1].trim().to_string())
    } else {
        None
    }
}

fn floor_char_boundary(value: &str, mut index: usize) -> usize {
    if index >= value.len() {
        return value.len();
    }
    while !value.is_char_boundary(index) {
        index -= 1;
    }
    index
}

/// Document order of sections: no chapter first, then chapter number,
/// section number and letter suffix.
pub fn compare_sections(a: &ParsedSection, b: &ParsedSection) -> Ordering {
    chapter_number(a.chapter.as_deref())
        .cmp(&chapter_number(b.chapter.as_deref()))
        .then_with(|| compare_section_numbers(&a.section, &b.section))
}

pub fn compare_section_numbers(a: &str, b: &str) -> Ordering {
    let (number_a, suffix_a) = split_section_number(a);
    let (number_b, suffix_b) = split_section_number(b);
    number_a.cmp(&number_b).then_with(|| suffix_a.cmp(suffix_b))
}

fn chapter_number(chapter: Option<&str>) -> u64 {
    chapter.and_then(|value| value.parse().ok()).unwrap_or(0)
}

fn split_section_number(value: &str) -> (u64, &str) {
    match SECTION_NUMBER_RE.captures(value) {
        Some(caps) => {
            let number = caps.get(1).map_or("", |m| m.as_str());
            let suffix = caps.get(2).map_or("", |m| m.as_str());
            (number.parse().unwrap_or(0), suffix)
        }
        None => (0, value),
    }
}

/// "2A §" -> "2a"
pub fn normalize_section_ref(reference: &str) -> String {
    SECTION_MARK_RE
        .replace(reference, "")
        .trim()
        .to_lowercase()
}

/// (Some("3"), "5b") -> "3 kap. 5 b §"
pub fn format_section_ref(chapter: Option<&str>, section: &str) -> String {
    let display = LETTER_SUFFIX_RE.replace(section, "$1 $2");
    match chapter {
        Some(chapter) => format!("{chapter} kap. {display} §"),
        None => format!("{display} §"),
    }
}

pub fn create_section_key(chapter: Option<&str>, section: &str) -> String {
    format!("{}:{section}", chapter.unwrap_or_default())
}
