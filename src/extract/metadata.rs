//! Cattle metadata from page text

use regex::Regex;
use std::sync::OnceLock;

const BEEF_KEYWORDS: &[&str] = &[
    "beef",
    "beef cattle",
    "cow-calf",
    "cow calf",
    "feeder cattle",
    "stocker",
    "feedlot",
    "slaughter",
    "meat",
    "steaks",
];

const DAIRY_KEYWORDS: &[&str] = &[
    "dairy",
    "dairy cattle",
    "milk",
    "milking",
    "creamery",
    "dairy farm",
    "dairy cow",
];

const BREED_PATTERNS: &[(&str, &str)] = &[
    ("Angus", r"\b(?:black\s+)?angus\b"),
    ("Red Angus", r"\bred\s+angus\b"),
    ("Hereford", r"\bhereford\b"),
    ("Charolais", r"\bcharolais\b"),
    ("Simmental", r"\bsimmental\b"),
    ("Limousin", r"\blimousin\b"),
    ("Brahman", r"\bbrahman\b"),
    ("Shorthorn", r"\bshorthorn\b"),
    ("Gelbvieh", r"\bgelbvieh\b"),
    ("Maine-Anjou", r"\bmaine[\s-]anjou\b"),
    ("Holstein", r"\bholstein\b"),
    ("Jersey", r"\bjersey\s+(?:cattle|cow|dairy|milk)\b"),
    ("Guernsey", r"\bguernsey\b"),
    ("Brown Swiss", r"\bbrown\s+swiss\b"),
    ("Ayrshire", r"\bayrshire\b"),
    ("Longhorn", r"\blonghorn\b"),
    ("Highland", r"\bhighland\s+(?:cattle|cow)\b"),
    ("Wagyu", r"\bwagyu\b"),
    ("Brangus", r"\bbrangus\b"),
    ("Beefmaster", r"\bbeefmaster\b"),
    ("Santa Gertrudis", r"\bsanta\s+gertrudis\b"),
    ("Corriente", r"\bcorriente\b"),
    ("Dexter", r"\bdexter\s+(?:cattle|cow)\b"),
];

/// Tried in order; the first match of the first pattern with a plausible
/// count wins
const HEAD_COUNT_PATTERNS: &[&str] = &[
    r"(\d[\d,]*)\s*(?:head)\b",
    r"(?:herd\s+(?:of|size)?:?\s*)(\d[\d,]*)",
    r"(\d[\d,]*)\s*(?:cattle|cows|calves|pairs|bulls)\b",
    r"(?:running|raise|raising|run)\s+(\d[\d,]*)\s*(?:head|cattle|cows)",
];

const MAX_HEAD_COUNT: u32 = 500_000;

/// What a page says about the operation
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CattleMetadata {
    /// "beef", "dairy" or "beef/dairy"
    pub cattle_type: Option<String>,
    /// Breed names in catalog order
    pub breeds: Vec<String>,
    pub head_count: Option<u32>,
}

impl CattleMetadata {
    /// Breeds joined for storage ("Angus, Hereford")
    pub fn breed_list(&self) -> Option<String> {
        if self.breeds.is_empty() {
            None
        } else {
            Some(self.breeds.join(", "))
        }
    }
}

/// Keyword and pattern based metadata extractor
#[derive(Debug, Default, Clone, Copy)]
pub struct MetadataExtractor;

impl MetadataExtractor {
    pub fn new() -> Self {
        Self
    }

    /// Extracts cattle type, breeds and head count from visible page text
    pub fn extract(&self, text: &str) -> CattleMetadata {
        let lower = text.to_lowercase();
        CattleMetadata {
            cattle_type: detect_cattle_type(&lower).map(String::from),
            breeds: detect_breeds(&lower),
            head_count: detect_head_count(&lower),
        }
    }
}

fn detect_cattle_type(text: &str) -> Option<&'static str> {
    let beef = BEEF_KEYWORDS.iter().any(|k| text.contains(k));
    let dairy = DAIRY_KEYWORDS.iter().any(|k| text.contains(k));
    match (beef, dairy) {
        (true, true) => Some("beef/dairy"),
        (true, false) => Some("beef"),
        (false, true) => Some("dairy"),
        (false, false) if text.contains("cattle") || text.contains("ranch") => Some("beef"),
        _ => None,
    }
}

fn breed_regexes() -> &'static [(&'static str, Regex)] {
    static BREEDS: OnceLock<Vec<(&'static str, Regex)>> = OnceLock::new();
    BREEDS.get_or_init(|| {
        BREED_PATTERNS
            .iter()
            .map(|(name, pattern)| {
                let re = Regex::new(&format!("(?i){}", pattern))
                    .expect("static breed pattern is valid");
                (*name, re)
            })
            .collect()
    })
}

fn head_count_regexes() -> &'static [Regex] {
    static HEAD_COUNTS: OnceLock<Vec<Regex>> = OnceLock::new();
    HEAD_COUNTS.get_or_init(|| {
        HEAD_COUNT_PATTERNS
            .iter()
            .map(|pattern| {
                Regex::new(&format!("(?i){}", pattern))
                    .expect("static head count pattern is valid")
            })
            .collect()
    })
}

fn detect_breeds(text: &str) -> Vec<String> {
    breed_regexes()
        .iter()
        .filter(|(_, re)| re.is_match(text))
        .map(|(name, _)| name.to_string())
        .collect()
}

fn detect_head_count(text: &str) -> Option<u32> {
    head_count_regexes().iter().find_map(|re| {
        let digits: String = re
            .captures(text)?
            .get(1)?
            .as_str()
            .chars()
            .filter(|c| *c != ',')
            .collect();
        digits
            .parse::<u32>()
            .ok()
            .filter(|n| (1..=MAX_HEAD_COUNT).contains(n))
    })
}
