use once_cell::sync::Lazy;
use regex::Regex;

static DOSAGE_QUANTITY: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\b\d+\s*(mg|g|ml|mcg|iu|units?)\b").expect("dosage regex"));
static DOSAGE_FORM: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\b(tablet|tab|caps?|capsule|syrup|injection|cream|ointment)\b").expect("dosage form regex")
});
static RELEASE_MODIFIER: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\b(extended|release|er|sr|xl|cr)\b").expect("release modifier regex"));
static PARENTHESIZED: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s*\([^)]*\)").expect("parenthesized regex"));
static TRAILING_NUMBER: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s*-\s*\d+.*$").expect("trailing number regex"));

/// Canonicalizes a medicine name into a search-friendly token.
///
/// Strips dosage quantities, dosage forms, release modifiers, parenthesized
/// notes and a trailing `-<number>` suffix. Removal can expose a new match
/// (`"5 tab mg"` becomes `"5  mg"`), so the rules run until nothing changes.
pub fn normalize(name: Option<&str>) -> String {
    let Some(name) = name else {
        return String::new();
    };

    let mut current = name.to_lowercase();
    loop {
        let next = strip_once(&current);
        if next == current {
            return next;
        }
        current = next;
    }
}

fn strip_once(name: &str) -> String {
    let stripped = DOSAGE_QUANTITY.replace_all(name, "");
    let stripped = DOSAGE_FORM.replace_all(&stripped, "");
    let stripped = RELEASE_MODIFIER.replace_all(&stripped, "");
    let stripped = PARENTHESIZED.replace_all(&stripped, "");
    let stripped = TRAILING_NUMBER.replace_all(&stripped, "");
    stripped.trim().to_string()
}
