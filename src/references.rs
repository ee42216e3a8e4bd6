use regex::{Captures, Regex};
use serde::{Deserialize, Serialize};
use std::sync::LazyLock;

/// Prefix of the normalized identifier of a statute, e.g. `STATUTE 2012:295`.
pub const STATUTE_PREFIX: &str = "STATUTE";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ReferenceCategory {
    Statute,
    AgencyRegulation,
    CourtCase,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CourtId {
    /// Supreme Court (law reports "NJA").
    Hd,
    /// Supreme Administrative Court ("HFD", formerly "RÅ").
    Hfd,
    /// Labour Court.
    Ad,
    /// Courts of Appeal. No citation grammar, only used as a document type.
    Hovr,
    /// Land and Environment Court of Appeal.
    Mod,
    /// Migration Court of Appeal.
    Mig,
}

impl CourtId {
    pub fn as_str(self) -> &'static str {
        match self {
            CourtId::Hd => "hd",
            CourtId::Hfd => "hfd",
            CourtId::Ad => "ad",
            CourtId::Hovr => "hovr",
            CourtId::Mod => "mod",
            CourtId::Mig => "mig",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DetectedReference {
    pub matched_text: String,
    pub identifier: String,
    pub category: ReferenceCategory,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub court: Option<CourtId>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub chapter: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub section: Option<String>,
    pub start: usize,
    pub end: usize,
}

impl DetectedReference {
    pub fn len(&self) -> usize {
        self.end - self.start
    }

    pub fn is_empty(&self) -> bool {
        self.start >= self.end
    }
}

static STATUTE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?i)(?:(?:(?P<chapter>\d+)\s+kap\.\s+)?(?P<section>\d+(?:\s?[a-z])?)(?:\s*[–-]\s*\d+(?:\s?[a-z])?)?\s*§§?\s+(?:(?:första|andra|tredje|fjärde|femte|sjätte|sjunde|åttonde|nionde|tionde)\s+stycket\s+(?:\d+\s+)?)?)?\b\p{L}*(?:lag|förordning)(?:en)?\s*\((?P<year>\d{4}):(?P<number>\d+)\)",
    )
    .unwrap()
});
static AGENCY_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\b(?P<code>[A-ZÅÄÖ]+(?:-[A-ZÅÄÖ]+)*-?FS)\s+(?P<year>\d{4}):(?P<number>\d+)")
        .unwrap()
});
static WHITESPACE_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\s+").unwrap());

struct CourtGrammar {
    court: CourtId,
    label: &'static str,
    separator: &'static str,
    regex: Regex,
}

static COURT_GRAMMARS: LazyLock<Vec<CourtGrammar>> = LazyLock::new(|| {
    [
        (CourtId::Hd, "NJA", " s. ", r"\bNJA\s+(?P<year>\d{4})\s+s\.\s*(?P<number>\d+)"),
        (CourtId::Hfd, "HFD", " ref. ", r"\bHFD\s+(?P<year>\d{4})\s+ref\.\s*(?P<number>\d+)"),
        (CourtId::Hfd, "RÅ", " ref. ", r"\bRÅ\s+(?P<year>\d{4})\s+ref\.\s*(?P<number>\d+)"),
        (CourtId::Ad, "AD", " nr ", r"\bAD\s+(?P<year>\d{4})\s+nr\.?\s*(?P<number>\d+)"),
        (CourtId::Mod, "MÖD", ":", r"\bMÖD\s+(?P<year>\d{4}):(?P<number>\d+)"),
        (CourtId::Mig, "MIG", ":", r"\bMIG\s+(?P<year>\d{4}):(?P<number>\d+)"),
    ]
    .into_iter()
    .map(|(court, label, separator, pattern)| CourtGrammar {
        court,
        label,
        separator,
        regex: Regex::new(pattern).unwrap(),
    })
    .collect()
});

/// Find every statute, agency regulation and court case citation in `text`.
///
/// Candidates from all pattern families are pooled and passed through
/// [`resolve_overlaps`], so the result is ordered by start offset and no two
/// references overlap.
pub fn detect_references(text: &str) -> Vec<DetectedReference> {
    let mut candidates = Vec::new();
    candidates.extend(scan_statutes(text));
    candidates.extend(scan_agency_regulations(text));
    candidates.extend(scan_court_cases(text));
    resolve_overlaps(candidates)
}

/// Greedy left-to-right overlap resolution. On equal start the longer
/// candidate is seen first; an overlapping candidate only replaces the last
/// kept one when it is strictly longer.
pub fn resolve_overlaps(mut candidates: Vec<DetectedReference>) -> Vec<DetectedReference> {
    candidates.sort_by(|a, b| a.start.cmp(&b.start).then_with(|| b.len().cmp(&a.len())));

    let mut kept: Vec<DetectedReference> = Vec::with_capacity(candidates.len());
    for candidate in candidates {
        let Some(last) = kept.last_mut() else {
            kept.push(candidate);
            continue;
        };

        if candidate.start >= last.end {
            kept.push(candidate);
        } else if candidate.len() > last.len() {
            *last = candidate;
        }
    }

    kept
}

/// Collapse whitespace runs so identifiers from text and from the corpus
/// compare equal.
pub fn normalize_identifier(value: &str) -> String {
    WHITESPACE_RE.replace_all(value.trim(), " ").to_string()
}

fn scan_statutes(text: &str) -> Vec<DetectedReference> {
    STATUTE_RE
        .captures_iter(text)
        .filter_map(|caps| {
            let whole = caps.get(0)?;
            let section = caps
                .name("section")
                .map(|m| m.as_str().split_whitespace().collect::<String>().to_lowercase());
            let chapter = caps.name("chapter").map(|m| m.as_str().to_string());
            Some(DetectedReference {
                matched_text: whole.as_str().to_string(),
                identifier: format!("{STATUTE_PREFIX} {}:{}", &caps["year"], &caps["number"]),
                category: ReferenceCategory::Statute,
                court: None,
                chapter,
                section,
                start: whole.start(),
                end: whole.end(),
            })
        })
        .collect()
}

fn scan_agency_regulations(text: &str) -> Vec<DetectedReference> {
    AGENCY_RE
        .captures_iter(text)
        .filter_map(|caps| {
            let whole = caps.get(0)?;
            Some(DetectedReference {
                matched_text: whole.as_str().to_string(),
                identifier: format!("{} {}:{}", &caps["code"], &caps["year"], &caps["number"]),
                category: ReferenceCategory::AgencyRegulation,
                court: None,
                chapter: None,
                section: None,
                start: whole.start(),
                end: whole.end(),
            })
        })
        .collect()
}

fn scan_court_cases(text: &str) -> Vec<DetectedReference> {
    let mut references = Vec::new();

    for grammar in COURT_GRAMMARS.iter() {
        for caps in grammar.regex.captures_iter(text) {
            if let Some(reference) = court_reference(grammar, &caps) {
                references.push(reference);
            }
        }
    }

    references
}

fn court_reference(grammar: &CourtGrammar, caps: &Captures<'_>) -> Option<DetectedReference> {
    let whole = caps.get(0)?;
    Some(DetectedReference {
        matched_text: whole.as_str().to_string(),
        identifier: format!(
            "{} {}{}{}",
            grammar.label, &caps["year"], grammar.separator, &caps["number"]
        ),
        category: ReferenceCategory::CourtCase,
        court: Some(grammar.court),
        chapter: None,
        section: None,
        start: whole.start(),
        end: whole.end(),
    })
}
