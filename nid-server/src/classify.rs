//! Classifier: row record -> (technology, category).
//!
//! Pure and total: every row gets a tag from both enums, nothing throws.
//! Technology pattern groups are ordered most-specific-first; 5G/NR codes
//! are checked before the legacy bands because fragments like `N78` would
//! otherwise be misread.
//!
//! Ambiguous rows default to wireless, the dominant category in this
//! domain. That trades recall for a non-empty, actionable default; there is
//! no low-confidence bucket.

use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::{Map, Value};

use nid_common::{Category, Technology};

static NR_5G: Lazy<Regex> = Lazy::new(|| Regex::new(r"\b(N78|N41)\b|5G|NR").unwrap());
static LTE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\b(L18|L1800|L26|L2600|L28|L700|L40|L2300)\b|LTE").unwrap());
static UMTS_3G: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\b(U9|U900|U21|U2100)\b|3G|UMTS|WCDMA|HSPA").unwrap());
static GSM_2G: Lazy<Regex> = Lazy::new(|| Regex::new(r"\b(G9|G900|G1800|L9)\b|2G|GSM").unwrap());

static WIRELINE_KEYWORDS: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"fiber|ftth|fttx|copper|dsl|duct|splice|wired").unwrap());
static TRANSPORT_KEYWORDS: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"transport|mpls|backhaul|microwave|ethernet|ptp|sdh").unwrap());
static RADIO_EQUIPMENT: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"bts|enodeb|gnb|rnc|bbu|rru").unwrap());

/// Classify a row record. Scans every column value; deterministic.
pub fn classify(values: &Map<String, Value>) -> (Technology, Category) {
    let haystack = concat_values(values);
    let technology = detect_technology(&haystack.to_uppercase());
    let category = detect_category(values, &haystack.to_lowercase(), technology);
    (technology, category)
}

/// Technology inference over the upper-cased concatenation of all values.
/// First matching pattern group wins.
pub fn detect_technology(haystack_upper: &str) -> Technology {
    if NR_5G.is_match(haystack_upper) {
        Technology::G5
    } else if LTE.is_match(haystack_upper) {
        Technology::Lte
    } else if UMTS_3G.is_match(haystack_upper) {
        Technology::G3
    } else if GSM_2G.is_match(haystack_upper) {
        Technology::G2
    } else {
        Technology::Other
    }
}

/// Category inference. An explicit, recognized `category` column wins
/// outright; otherwise keyword scans, then the radio-technology default.
pub fn detect_category(
    values: &Map<String, Value>,
    haystack_lower: &str,
    technology: Technology,
) -> Category {
    if let Some(explicit) = explicit_category(values) {
        return explicit;
    }

    if WIRELINE_KEYWORDS.is_match(haystack_lower) {
        return Category::Wireline;
    }
    if TRANSPORT_KEYWORDS.is_match(haystack_lower) {
        return Category::Transport;
    }
    if technology.is_radio() {
        return Category::Wireless;
    }
    if RADIO_EQUIPMENT.is_match(haystack_lower) {
        return Category::Wireless;
    }

    Category::Wireless
}

/// Look for a `category` column (any casing) whose value names a known
/// category. Checked in transport, wireline, wireless order.
fn explicit_category(values: &Map<String, Value>) -> Option<Category> {
    let explicit = values
        .iter()
        .find(|(key, _)| key.eq_ignore_ascii_case("category"))
        .map(|(_, value)| value_text(value).to_lowercase())?;

    if explicit.contains("transport") {
        Some(Category::Transport)
    } else if explicit.contains("wireline") {
        Some(Category::Wireline)
    } else if explicit.contains("wireless") {
        Some(Category::Wireless)
    } else {
        None
    }
}

fn concat_values(values: &Map<String, Value>) -> String {
    let mut haystack = String::new();
    for value in values.values() {
        let text = value_text(value);
        if text.is_empty() {
            continue;
        }
        if !haystack.is_empty() {
            haystack.push(' ');
        }
        haystack.push_str(&text);
    }
    haystack
}

fn value_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Null => String::new(),
        other => other.to_string(),
    }
}
