use crate::stored_object;

stored_object!(TranslationCacheEntry, "translation_cache", {
    document_id: String,
    chunk_index: Option<u32>,
    source_hash: String,
    reading_level: String,
    prompt_hash: String,
    model_used: String,
    translated_text: String
});

impl TranslationCacheEntry {
    pub fn new(
        document_id: String,
        chunk_index: Option<u32>,
        source_hash: String,
        reading_level: String,
        prompt_hash: String,
        model_used: String,
        translated_text: String,
    ) -> Self {
        let now = chrono::Utc::now();
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            created_at: now,
            updated_at: now,
            document_id,
            chunk_index,
            source_hash,
            reading_level,
            prompt_hash,
            model_used,
            translated_text,
        }
    }

    /// Whether `self` answers a lookup for the same cache key. Chunked and
    /// monolithic translations of the same document coexist because
    /// `chunk_index` is part of the identity (§9: Open Question resolution).
    pub fn matches_key(
        &self,
        document_id: &str,
        chunk_index: Option<u32>,
        source_hash: &str,
        reading_level: &str,
        prompt_hash: &str,
        model_used: &str,
    ) -> bool {
        self.document_id == document_id
            && self.chunk_index == chunk_index
            && self.source_hash == source_hash
            && self.reading_level == reading_level
            && self.prompt_hash == prompt_hash
            && self.model_used == model_used
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn matches_key_requires_every_field() {
        let entry = TranslationCacheEntry::new(
            "doc1".into(),
            Some(0),
            "hash1".into(),
            "easy".into(),
            "p1".into(),
            "gpt-4o-mini".into(),
            "plain text".into(),
        );
        assert!(entry.matches_key("doc1", Some(0), "hash1", "easy", "p1", "gpt-4o-mini"));
        assert!(!entry.matches_key("doc1", Some(1), "hash1", "easy", "p1", "gpt-4o-mini"));
        assert!(!entry.matches_key("doc1", Some(0), "hash1", "easy", "p1", "gpt-4o"));
    }

    #[test]
    fn monolithic_and_chunked_entries_have_distinct_keys() {
        let monolithic = TranslationCacheEntry::new(
            "doc1".into(),
            None,
            "hash1".into(),
            "easy".into(),
            "p1".into(),
            "gpt-4o-mini".into(),
            "whole doc".into(),
        );
        assert!(!monolithic.matches_key("doc1", Some(0), "hash1", "easy", "p1", "gpt-4o-mini"));
    }
}
