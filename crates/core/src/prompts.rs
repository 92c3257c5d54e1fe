//! Prompts sent to the vision and fallback models.

use crate::models::ExtractedInfo;

/// Instruction sent with the package photo to the vision model.
pub const EXTRACTION_PROMPT: &str = r#"Analyze this medicine package image and extract the following information in JSON format:
{
    "brand_name": "Brand name of the medicine",
    "generic_name": "Generic/scientific name",
    "dosage": "Dosage strength (e.g., 500mg)",
    "manufacturer": "Manufacturer name",
    "form": "Form (tablet, capsule, syrup, etc.)",
    "purpose": "What condition it treats",
    "active_ingredients": ["List of active ingredients"],
    "text_found": "All text visible in the image"
}

If you cannot clearly identify any field, set it to null. Focus on accuracy over completeness."#;

/// Fallback prompt carrying the extraction alongside the photo.
pub fn make_synthesis_prompt(info: &ExtractedInfo) -> Result<String, serde_json::Error> {
    let extracted = serde_json::to_string_pretty(info)?;
    Ok(format!(
        r#"Based on this extracted information from a medicine package, provide detailed medicine information in JSON format:

Extracted text: {extracted}

Please respond in this exact JSON format:
{{
    "brand_name": "Brand name of the medicine",
    "generic_name": "Generic/scientific name",
    "manufacturer": "Manufacturer name",
    "purpose": "What condition this medicine treats",
    "active_ingredients": ["List of active ingredients"],
    "warnings": ["List of important warnings or side effects"],
    "dosage": "Typical dosage information",
    "form": "Form (tablet, capsule, syrup, etc.)",
    "source": "ai"
}}

Focus on providing accurate, helpful information especially for medicines that might not be in US FDA database (like Indian or international medicines)."#
    ))
}
