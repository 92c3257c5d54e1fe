use crate::models::ExtractedInfo;
use crate::normalizer::normalize;
use std::collections::HashSet;

/// Common-name mappings, kept literal: reverse lookups (e.g. `advil`) are intentionally absent.
pub const SYNONYMS: &[(&str, &[&str])] = &[
    ("acetaminophen", &["paracetamol", "tylenol"]),
    ("paracetamol", &["acetaminophen", "tylenol"]),
    ("ibuprofen", &["advil", "motrin"]),
    ("aspirin", &["bayer", "bufferin"]),
];

pub fn synonyms_for(normalized: &str) -> &'static [&'static str] {
    SYNONYMS
        .iter()
        .find(|(name, _)| *name == normalized)
        .map(|(_, synonyms)| *synonyms)
        .unwrap_or(&[])
}

/// Builds the ordered, deduplicated list of search terms for the drug database.
pub fn expand(info: &ExtractedInfo) -> Vec<String> {
    let mut variations = Vec::new();

    for name in [&info.brand_name, &info.generic_name].into_iter().flatten() {
        variations.push(name.clone());
        variations.push(normalize(Some(name.as_str())));
    }

    let snapshot = variations.clone();
    for variation in &snapshot {
        let normalized = normalize(Some(variation.as_str()));
        variations.extend(synonyms_for(&normalized).iter().map(|synonym| synonym.to_string()));
    }

    let mut seen = HashSet::new();
    variations
        .into_iter()
        .filter(|term| term.chars().count() > 2)
        .filter(|term| seen.insert(term.clone()))
        .collect()
}
