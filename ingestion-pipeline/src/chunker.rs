//! Text chunking (component D): splits cleaned text into chunks sized by
//! token count, preferring Markdown section structure, with byte offsets
//! preserved for downstream indexing.

use std::sync::OnceLock;

use text_splitter::{ChunkConfig, MarkdownSplitter};
use tokenizers::Tokenizer;

const TRANSLATION_SAFETY_FACTOR: f64 = 0.8;
const DEFAULT_EXPANSION_FACTOR: f64 = 1.2;
const DEFAULT_MODEL_OUTPUT_LIMIT: u32 = 4096;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TextChunk {
    pub start: usize,
    pub end: usize,
    pub text: String,
}

/// Splits `text` into chunks targeting `chunk_size_tokens`, using Markdown
/// section structure where present and sized with the same tokenizer the
/// embedding pipeline uses. Falls back to a single unsplit chunk if the
/// tokenizer cannot be loaded.
pub fn chunk_text(text: &str, chunk_size_tokens: usize) -> Vec<TextChunk> {
    if text.is_empty() {
        return Vec::new();
    }

    let Ok(tokenizer) = get_tokenizer() else {
        return vec![TextChunk { start: 0, end: text.len(), text: text.to_string() }];
    };

    let config = ChunkConfig::new(chunk_size_tokens.max(1)).with_sizer(tokenizer);
    let splitter = MarkdownSplitter::new(config);

    splitter.chunk_indices(text).map(|(start, chunk)| TextChunk { start, end: start + chunk.len(), text: chunk.to_string() }).collect()
}

fn get_tokenizer() -> Result<&'static Tokenizer, String> {
    static TOKENIZER: OnceLock<Result<Tokenizer, String>> = OnceLock::new();

    TOKENIZER
        .get_or_init(|| Tokenizer::from_pretrained("bert-base-cased", None).map_err(|e| format!("failed to initialize tokenizer: {e}")))
        .as_ref()
        .map_err(Clone::clone)
}

/// Per-model output token limit, used to derive a translation chunk
/// budget; falls back to a conservative default for unlisted models.
fn model_output_limit(model: &str) -> u32 {
    match model {
        "gpt-4o" | "gpt-4o-mini" => 16_384,
        "gpt-4-turbo" => 4096,
        "claude-3-5-sonnet" => 8192,
        _ => DEFAULT_MODEL_OUTPUT_LIMIT,
    }
}

/// Token budget for a single translation chunk: the model's output limit,
/// discounted by a safety factor, divided by the expected output
/// expansion relative to input.
pub fn translation_chunk_budget_tokens(model: &str, expansion_factor: Option<f64>) -> usize {
    let limit = f64::from(model_output_limit(model));
    let expansion = expansion_factor.unwrap_or(DEFAULT_EXPANSION_FACTOR).max(0.01);
    ((limit * TRANSLATION_SAFETY_FACTOR) / expansion) as usize
}

/// A document's text needs chunked translation once its estimated output
/// size would exceed the safety-discounted model output limit.
pub fn needs_chunked_translation(input_tokens: usize, model: &str) -> bool {
    let estimated_output = (input_tokens as f64) * DEFAULT_EXPANSION_FACTOR;
    estimated_output > TRANSLATION_SAFETY_FACTOR * f64::from(model_output_limit(model))
}

/// Recombines independently translated chunks: the first is kept verbatim,
/// later chunks drop everything before their first `##` section header so
/// the combined document has one title but every section.
pub fn combine_translated_chunks(chunks: &[String]) -> String {
    let mut combined = String::new();
    for (index, chunk) in chunks.iter().enumerate() {
        if index == 0 {
            combined.push_str(chunk);
            continue;
        }
        let tail = chunk.find("\n##").map_or(chunk.as_str(), |pos| &chunk[pos + 1..]);
        if !combined.is_empty() && !combined.ends_with('\n') {
            combined.push('\n');
        }
        combined.push_str(tail);
    }
    combined
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn chunk_offsets_match_the_source_text() {
        let text = "First sentence. Second sentence. Third sentence.";
        let chunks = chunk_text(text, 4);
        assert!(!chunks.is_empty());
        for chunk in &chunks {
            assert_eq!(&text[chunk.start..chunk.end], chunk.text);
        }
    }

    #[test]
    fn splits_on_markdown_headers() {
        let text = "Intro text.\n\n## Section One\n\nBody one.\n\n## Section Two\n\nBody two.";
        let chunks = chunk_text(text, 8);
        assert!(chunks.iter().any(|c| c.text.contains("Section One")));
        assert!(chunks.iter().any(|c| c.text.contains("Section Two")));
    }

    #[test]
    fn empty_text_produces_no_chunks() {
        assert!(chunk_text("", 100).is_empty());
    }

    #[test]
    fn translation_budget_scales_with_model_limit_and_expansion() {
        let default_budget = translation_chunk_budget_tokens("gpt-4-turbo", None);
        assert_eq!(default_budget, ((4096.0 * 0.8) / 1.2) as usize);
    }

    #[test]
    fn combine_keeps_first_chunk_verbatim_and_drops_later_headers() {
        let chunks = vec![
            "# Document Title\n\nIntro.\n## Section One\nBody.".to_string(),
            "Title repeated\n## Section Two\nMore body.".to_string(),
        ];
        let combined = combine_translated_chunks(&chunks);
        assert!(combined.starts_with("# Document Title"));
        assert!(combined.contains("## Section Two"));
        assert!(!combined.contains("Title repeated"));
    }

    #[test]
    fn needs_chunked_translation_flags_large_inputs() {
        assert!(needs_chunked_translation(5000, "gpt-4-turbo"));
        assert!(!needs_chunked_translation(10, "gpt-4-turbo"));
    }
}
