
use crate::stored_object;

stored_object!(Chunk, "chunk", {
    document_id: String,
    document_pk: String,
    url: String,
    chunk_index: u32,
    chunk_text: String,
    start_offset: usize,
    end_offset: usize,
    embedding: Vec<f32>
});

impl Chunk {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        document_id: String,
        document_pk: String,
        url: String,
        chunk_index: u32,
        chunk_text: String,
        start_offset: usize,
        end_offset: usize,
        embedding: Vec<f32>,
    ) -> Self {
        let now = chrono::Utc::now();
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            created_at: now,
            updated_at: now,
            document_id,
            document_pk,
            url,
            chunk_index,
            chunk_text,
            start_offset,
            end_offset,
            embedding,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_assigns_a_fresh_id() {
        let a = Chunk::new("doc-1".into(), "doc-1".into(), "https://www.gov.uk/a".into(), 0, "text".into(), 0, 4, vec![0.0; 3]);
        let b = Chunk::new("doc-1".into(), "doc-1".into(), "https://www.gov.uk/a".into(), 1, "text".into(), 4, 8, vec![0.0; 3]);
        assert_ne!(a.id, b.id);
        assert_eq!(a.chunk_index, 0);
        assert_eq!(b.chunk_index, 1);
    }
}
