use crate::references::STATUTE_PREFIX;
use chrono::NaiveDate;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::LazyLock;

/// Characters of section text kept with each amendment.
const SECTION_TEXT_LIMIT: usize = 200;

static UNDERTITEL_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)t\.o\.m\.\s*SFS\s*(\d{4}:\d+)").unwrap());
static CHAPTER_SECTION_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)(\d+)\s*kap\.\s*(\d+\s*[a-z]?)\s*§([^§]*?)Lag\s*\((\d{4}:\d+)\)\.").unwrap()
});
static SECTION_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)(\d+\s*[a-z]?)\s*§([^§]*?)Lag\s*\((\d{4}:\d+)\)\.").unwrap()
});
static CHAPTER_TAIL_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)\d\s*kap\.\s*$").unwrap());
static LAG_NUMBER_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"Lag\s*\((\d{4}:\d+)\)").unwrap());
static TRANSITION_HEADING_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)Övergångsbestämmelser\s*").unwrap());
static EFFECTIVE_DATE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?is)(\d{4}:\d+)\s*\n.*?(?:träder i kraft|tillämpas).*?(?:den\s+)?(\d{1,2})\s*(januari|februari|mars|april|maj|juni|juli|augusti|september|oktober|november|december)\s*(\d{4})",
    )
    .unwrap()
});

const MONTHS: [&str; 12] = [
    "januari",
    "februari",
    "mars",
    "april",
    "maj",
    "juni",
    "juli",
    "augusti",
    "september",
    "oktober",
    "november",
    "december",
];

/// A section and the statute that last amended it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SectionAmendment {
    /// `"7"`, `"7 a"`, or `"3:7"` inside a chapter.
    pub section_number: String,
    pub section_text: String,
    pub amended_by: String,
    pub chapter_number: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ParsedAmendments {
    pub amendments: Vec<SectionAmendment>,
    /// Sorted and deduplicated.
    pub amending_statutes: Vec<String>,
}

fn statute_identifier(number: &str) -> String {
    format!("{STATUTE_PREFIX} {number}")
}

fn truncate_chars(text: &str, limit: usize) -> String {
    text.chars().take(limit).collect()
}

/// The latest amendment named by a statute's subtitle, e.g.
/// `"t.o.m. SFS 2025:732"` gives `STATUTE 2025:732`.
pub fn parse_undertitel(undertitel: &str) -> Option<String> {
    UNDERTITEL_RE
        .captures(undertitel)
        .map(|caps| statute_identifier(&caps[1]))
}

/// Find every section whose text ends with the `Lag (YYYY:N).` marker of
/// the statute that last changed it.
pub fn extract_section_amendments(full_text: &str) -> ParsedAmendments {
    let mut amendments: Vec<SectionAmendment> = Vec::new();
    let mut statutes = BTreeSet::new();

    for caps in CHAPTER_SECTION_RE.captures_iter(full_text) {
        let chapter = caps[1].to_string();
        let amended_by = statute_identifier(&caps[4]);
        statutes.insert(amended_by.clone());
        amendments.push(SectionAmendment {
            section_number: format!("{}:{}", chapter, caps[2].trim()),
            section_text: truncate_chars(caps[3].trim(), SECTION_TEXT_LIMIT),
            amended_by,
            chapter_number: Some(chapter),
        });
    }

    for caps in SECTION_RE.captures_iter(full_text) {
        let Some(whole) = caps.get(0) else {
            continue;
        };
        if CHAPTER_TAIL_RE.is_match(&full_text[..whole.start()]) {
            continue;
        }

        let section = caps[1].trim().to_string();
        let chapter_suffix = format!(":{section}");
        if amendments
            .iter()
            .any(|a| a.section_number == section || a.section_number.ends_with(&chapter_suffix))
        {
            continue;
        }

        let amended_by = statute_identifier(&caps[3]);
        statutes.insert(amended_by.clone());
        amendments.push(SectionAmendment {
            section_number: section,
            section_text: truncate_chars(caps[2].trim(), SECTION_TEXT_LIMIT),
            amended_by,
            chapter_number: None,
        });
    }

    ParsedAmendments {
        amendments,
        amending_statutes: statutes.into_iter().collect(),
    }
}

/// Sections changed by `amending_statute`, formatted as `"7 §"` or `"3:7 §"`.
pub fn find_changed_sections(full_text: &str, amending_statute: &str) -> Vec<String> {
    extract_section_amendments(full_text)
        .amendments
        .into_iter()
        .filter(|a| a.amended_by == amending_statute)
        .map(|a| format!("{} §", a.section_number))
        .collect()
}

/// Every statute named by a `Lag (YYYY:N)` marker, sorted and deduplicated.
pub fn extract_amending_statutes(full_text: &str) -> Vec<String> {
    LAG_NUMBER_RE
        .captures_iter(full_text)
        .map(|caps| statute_identifier(&caps[1]))
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect()
}

/// Entry-into-force dates from the transitional provisions block.
///
/// Only the first paragraph after the heading is read.
pub fn parse_transitional_provisions(full_text: &str) -> HashMap<String, NaiveDate> {
    let mut dates = HashMap::new();

    let Some(heading) = TRANSITION_HEADING_RE.find(full_text) else {
        return dates;
    };
    let block = &full_text[heading.end()..];
    let block = match block.find("\n\n") {
        Some(end) => &block[..end],
        None => block,
    };

    for caps in EFFECTIVE_DATE_RE.captures_iter(block) {
        let month = caps[3].to_lowercase();
        let Some(month) = MONTHS.iter().position(|name| *name == month) else {
            continue;
        };
        let (Ok(day), Ok(year)) = (caps[2].parse::<u32>(), caps[4].parse::<i32>()) else {
            continue;
        };
        // Month index is zero based.
        if let Some(date) = NaiveDate::from_ymd_opt(year, month as u32 + 1, day) {
            dates.insert(statute_identifier(&caps[1]), date);
        }
    }

    dates
}

/// Changed sections grouped by amending statute.
pub fn group_amendments_by_statute(full_text: &str) -> BTreeMap<String, Vec<String>> {
    let mut grouped: BTreeMap<String, Vec<String>> = BTreeMap::new();
    for amendment in extract_section_amendments(full_text).amendments {
        grouped
            .entry(amendment.amended_by)
            .or_default()
            .push(format!("{} §", amendment.section_number));
    }
    grouped
}
