use chrono::Duration;

use crate::stored_object;

pub const SUMMARY_TTL_HOURS: i64 = 24;
pub const SUMMARY_MIN_WORDS: usize = 150;
pub const SUMMARY_MAX_WORDS: usize = 250;

stored_object!(SummaryCacheEntry, "summary_cache", {
    document_id: String,
    source_hash: String,
    summary_text: String,
    word_count: usize,
    #[serde(serialize_with = "serialize_datetime", deserialize_with = "deserialize_datetime", default)]
    expires_at: DateTime<Utc>
});

impl SummaryCacheEntry {
    pub fn new(document_id: String, source_hash: String, summary_text: String) -> Self {
        let now = Utc::now();
        let word_count = summary_text.split_whitespace().count();
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            created_at: now,
            updated_at: now,
            document_id,
            source_hash,
            summary_text,
            word_count,
            expires_at: now + Duration::hours(SUMMARY_TTL_HOURS),
        }
    }

    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now >= self.expires_at
    }

    /// Summaries outside the target band are still cached (generation
    /// succeeded) but flagged as not meeting the length contract, mirroring
    /// the source hash check rather than silently discarding them.
    pub fn is_length_valid(&self) -> bool {
        (SUMMARY_MIN_WORDS..=SUMMARY_MAX_WORDS).contains(&self.word_count)
    }

    pub fn is_stale(&self, current_source_hash: &str) -> bool {
        self.source_hash != current_source_hash
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn expires_after_ttl() {
        let entry = SummaryCacheEntry::new("doc1".into(), "hash1".into(), "word ".repeat(180));
        assert!(!entry.is_expired(Utc::now()));
        assert!(entry.is_expired(entry.expires_at + Duration::seconds(1)));
    }

    #[test]
    fn length_validity_follows_word_band() {
        let short = SummaryCacheEntry::new("doc1".into(), "hash1".into(), "too short".into());
        assert!(!short.is_length_valid());
        let valid = SummaryCacheEntry::new("doc1".into(), "hash1".into(), "word ".repeat(200));
        assert!(valid.is_length_valid());
    }

    #[test]
    fn stale_when_source_hash_changed() {
        let entry = SummaryCacheEntry::new("doc1".into(), "hash1".into(), "word ".repeat(180));
        assert!(!entry.is_stale("hash1"));
        assert!(entry.is_stale("hash2"));
    }
}
