use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

/// Identification fields read off a package photo by the vision model.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct ExtractedInfo {
    #[serde(default, deserialize_with = "lenient_string")]
    pub brand_name: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub generic_name: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub dosage: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub manufacturer: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub form: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub purpose: Option<String>,
    #[serde(default, deserialize_with = "lenient_list")]
    pub active_ingredients: Vec<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub text_found: Option<String>,
}

impl ExtractedInfo {
    pub fn from_raw_text(raw_text: impl Into<String>) -> Self {
        Self {
            text_found: Some(raw_text.into()),
            ..Self::default()
        }
    }
}

/// Outcome of parsing the vision model's text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Extraction {
    Structured(ExtractedInfo),
    /// No usable JSON object; the raw model text is kept for diagnostics.
    Degraded { raw_text: String },
}

impl Extraction {
    pub fn is_degraded(&self) -> bool {
        matches!(self, Self::Degraded { .. })
    }

    pub fn into_info(self) -> ExtractedInfo {
        match self {
            Self::Structured(info) => info,
            Self::Degraded { raw_text } => ExtractedInfo::from_raw_text(raw_text),
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum RecordSource {
    Fda,
    Ai,
    AiFallback,
}

impl RecordSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Fda => "fda",
            Self::Ai => "ai",
            Self::AiFallback => "ai_fallback",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Self::Fda => "FDA Database",
            Self::Ai | Self::AiFallback => "AI Analysis",
        }
    }
}

/// The unified result of one analysis run, from whichever source answered.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct MedicineRecord {
    pub brand_name: Option<String>,
    pub generic_name: Option<String>,
    pub manufacturer: Option<String>,
    pub purpose: Option<String>,
    pub dosage: Option<String>,
    pub form: Option<String>,
    pub active_ingredients: Vec<String>,
    pub warnings: Vec<String>,
    pub source: RecordSource,
}

/// Model-authored record body; `source` is assigned by the caller, never read from the model.
#[derive(Debug, Clone, Default, Deserialize)]
pub(crate) struct RecordFields {
    #[serde(default, deserialize_with = "lenient_string")]
    pub brand_name: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub generic_name: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub manufacturer: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub purpose: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub dosage: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub form: Option<String>,
    #[serde(default, deserialize_with = "lenient_list")]
    pub active_ingredients: Vec<String>,
    #[serde(default, deserialize_with = "lenient_list")]
    pub warnings: Vec<String>,
}

impl RecordFields {
    pub fn into_record(self, source: RecordSource) -> MedicineRecord {
        MedicineRecord {
            brand_name: self.brand_name,
            generic_name: self.generic_name,
            manufacturer: self.manufacturer,
            purpose: self.purpose,
            dosage: self.dosage,
            form: self.form,
            active_ingredients: self.active_ingredients,
            warnings: self.warnings,
            source,
        }
    }
}

/// Outcome of the AI fallback call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Synthesis {
    Structured(MedicineRecord),
    /// The model answer was unusable and the record was assembled from the extraction.
    Degraded(MedicineRecord),
}

impl Synthesis {
    pub fn is_degraded(&self) -> bool {
        matches!(self, Self::Degraded(_))
    }

    pub fn into_record(self) -> MedicineRecord {
        match self {
            Self::Structured(record) | Self::Degraded(record) => record,
        }
    }
}

pub(crate) fn scalar_text(value: &Value) -> Option<String> {
    match value {
        Value::String(text) if !text.trim().is_empty() => Some(text.clone()),
        Value::Number(number) => Some(number.to_string()),
        Value::Bool(flag) => Some(flag.to_string()),
        _ => None,
    }
}

pub(crate) fn text_list(value: &Value) -> Vec<String> {
    match value {
        Value::Array(items) => items.iter().filter_map(scalar_text).collect(),
        other => scalar_text(other).into_iter().collect(),
    }
}

fn lenient_string<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Value::deserialize(deserializer)?;
    Ok(scalar_text(&value))
}

fn lenient_list<'de, D>(deserializer: D) -> Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Value::deserialize(deserializer)?;
    Ok(text_list(&value))
}
