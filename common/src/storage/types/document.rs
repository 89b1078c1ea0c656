
use crate::stored_object;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceKind {
    Url,
    Upload,
    Cloud,
}

/// Removal statistics produced by the chrome stripper (component A). Lives
/// on the data model because it is persisted verbatim on `Document`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChromeRemovalStats {
    pub original_chars: usize,
    /// Signed so `original_chars = chrome_chars + guidance_chars` holds
    /// exactly even when re-serialization expands the cleaned markup
    /// (e.g. unquoted attributes gaining quotes) past the original length.
    pub chrome_chars: i64,
    pub guidance_chars: usize,
    pub chrome_percentage: f64,
    pub patterns_matched: Vec<String>,
}

impl ChromeRemovalStats {
    pub fn zero(original_chars: usize) -> Self {
        Self {
            original_chars,
            chrome_chars: 0,
            guidance_chars: original_chars,
            chrome_percentage: 0.0,
            patterns_matched: Vec::new(),
        }
    }
}

stored_object!(Document, "document", {
    canonical_url: String,
    title: String,
    raw_content: String,
    source_kind: SourceKind,
    processing_success: Option<bool>,
    processing_error: Option<String>,
    chrome_removed: bool,
    chrome_removal_stats: Option<ChromeRemovalStats>,
    #[serde(serialize_with = "serialize_option_datetime", deserialize_with = "deserialize_option_datetime", default)]
    reprocessed_at: Option<DateTime<Utc>>
});

impl Document {
    pub fn new(canonical_url: String, title: String, raw_content: String, source_kind: SourceKind) -> Self {
        let now = chrono::Utc::now();
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            created_at: now,
            updated_at: now,
            canonical_url,
            title,
            raw_content,
            source_kind,
            processing_success: None,
            processing_error: None,
            chrome_removed: false,
            chrome_removal_stats: None,
            reprocessed_at: None,
        }
    }

    /// Whether this document is eligible for the reprocess-failed workflow:
    /// never succeeded (or unknown) and there is content to reprocess.
    pub fn needs_reprocessing(&self) -> bool {
        self.processing_success != Some(true) && !self.raw_content.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn needs_reprocessing_excludes_successful_documents() {
        let mut doc = Document::new("https://www.gov.uk/a".into(), "A".into(), "text".into(), SourceKind::Url);
        doc.processing_success = Some(true);
        assert!(!doc.needs_reprocessing());
    }

    #[test]
    fn needs_reprocessing_includes_unknown_and_failed() {
        let mut doc = Document::new("https://www.gov.uk/a".into(), "A".into(), "text".into(), SourceKind::Url);
        assert!(doc.needs_reprocessing());
        doc.processing_success = Some(false);
        assert!(doc.needs_reprocessing());
    }

    #[test]
    fn needs_reprocessing_excludes_empty_content() {
        let doc = Document::new("https://www.gov.uk/a".into(), "A".into(), String::new(), SourceKind::Url);
        assert!(!doc.needs_reprocessing());
    }
}
