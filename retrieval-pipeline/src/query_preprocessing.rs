//! Query preprocessing (component J, stage 1): whole-word, case-insensitive
//! UKVI acronym expansion against a fixed dictionary.

const ACRONYMS: &[(&str, &str)] = &[
    ("BNO", "British National (Overseas)"),
    ("ILR", "Indefinite Leave to Remain"),
    ("EUSS", "EU Settlement Scheme"),
    ("CoS", "Certificate of Sponsorship"),
    ("PBS", "Points-Based System"),
    ("UKVI", "UK Visas and Immigration"),
    ("HO", "Home Office"),
    ("CTA", "Common Travel Area"),
    ("BRP", "Biometric Residence Permit"),
    ("EEA", "European Economic Area"),
];

/// Result of preprocessing a raw query: the original text is preserved
/// alongside the expanded form so the pipeline can report whether any
/// expansion actually happened.
#[derive(Debug, Clone)]
pub struct PreprocessedQuery {
    pub original_query: String,
    pub expanded_query: String,
}

impl PreprocessedQuery {
    pub fn was_expanded(&self) -> bool {
        self.original_query != self.expanded_query
    }
}

/// Expand every whole-word, case-insensitive acronym occurrence in `query`.
pub fn expand_acronyms(query: &str) -> PreprocessedQuery {
    let mut expanded = String::with_capacity(query.len());
    let mut changed = false;

    for (index, word) in split_preserving_boundaries(query).into_iter().enumerate() {
        let _ = index;
        match lookup(&word) {
            Some(expansion) => {
                expanded.push_str(expansion);
                changed = true;
            }
            None => expanded.push_str(&word),
        }
    }

    PreprocessedQuery {
        original_query: query.to_string(),
        expanded_query: if changed { expanded } else { query.to_string() },
    }
}

fn lookup(token: &str) -> Option<&'static str> {
    ACRONYMS
        .iter()
        .find(|(acronym, _)| acronym.eq_ignore_ascii_case(token))
        .map(|(_, expansion)| *expansion)
}

/// Split into alternating word / non-word runs so boundaries (spaces,
/// punctuation) round-trip untouched while words can be matched and
/// individually replaced.
fn split_preserving_boundaries(text: &str) -> Vec<String> {
    let mut tokens = Vec::new();
    let mut current = String::new();
    let mut current_is_word = false;

    for ch in text.chars() {
        let is_word_char = ch.is_alphanumeric();
        if current.is_empty() {
            current_is_word = is_word_char;
        } else if is_word_char != current_is_word {
            tokens.push(std::mem::take(&mut current));
            current_is_word = is_word_char;
        }
        current.push(ch);
    }
    if !current.is_empty() {
        tokens.push(current);
    }
    tokens
}
