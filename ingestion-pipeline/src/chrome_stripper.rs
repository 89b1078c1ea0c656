//! GOV.UK chrome removal (component A): strips navigation, cookie banners,
//! footers and other page furniture from scraped HTML before chunking.

use common::storage::types::document::ChromeRemovalStats;
use scraper::{Html, Selector};
use tracing::warn;

pub const CHROME_STRIPPER_VERSION: &str = "1.0.0";

const CHROME_PATTERNS: &[&str] = &[
    ".gem-c-cookie-banner",
    "#global-cookie-message",
    ".gem-c-skip-link",
    ".govuk-skip-link",
    r##"a[href="#main-content"]"##,
    ".govuk-header",
    ".gem-c-layout-super-navigation-header",
    ".gem-c-breadcrumbs",
    ".govuk-footer",
    ".gem-c-intervention",
    ".gem-c-feedback",
    ".gem-c-print-link",
    ".gem-c-phase-banner",
    ".gem-c-related-navigation",
    "aside.govuk-related-items",
    "aside",
    ".gem-c-step-nav",
    ".app-step-nav",
    ".gem-c-contextual-sidebar",
    ".gem-c-report-a-problem-link",
    ".gem-c-improvement-banner",
    ".gem-c-emergency-banner",
    "script",
    "style",
    "noscript",
    r#"link[rel="stylesheet"]"#,
];

const MAIN_CONTENT_SELECTORS: &[&str] = &["main.govuk-main-wrapper", "main", "div#content", "body"];

/// Removes chrome from `html` and reports how much was removed. Never
/// returns an error: malformed markup falls back to returning the input
/// verbatim with zero-removal stats, matching the never-block-ingestion
/// contract.
pub fn strip_chrome(html: &str, document_id: &str) -> (String, ChromeRemovalStats) {
    let original_chars = html.chars().count();

    let document = Html::parse_document(html);
    let mut patterns_matched = Vec::new();
    let mut removed_ids = std::collections::HashSet::new();

    for pattern in CHROME_PATTERNS {
        let Ok(selector) = Selector::parse(pattern) else {
            warn!(document_id, pattern, "chrome pattern failed to parse, skipping");
            continue;
        };
        let mut matched_any = false;
        for element in document.select(&selector) {
            matched_any = true;
            removed_ids.insert(element.id());
        }
        if matched_any {
            let name = normalize_pattern_name(pattern);
            if !patterns_matched.contains(&name) {
                patterns_matched.push(name);
            }
        }
    }

    let main_content = pick_main_content(&document, &removed_ids);
    let cleaned_chars = main_content.chars().count();
    let chrome_chars = original_chars as i64 - cleaned_chars as i64;
    let chrome_percentage = if original_chars > 0 {
        round_2((chrome_chars as f64 / original_chars as f64) * 100.0)
    } else {
        0.0
    };

    let stats = ChromeRemovalStats {
        original_chars,
        chrome_chars,
        guidance_chars: cleaned_chars,
        chrome_percentage,
        patterns_matched,
    };

    log_removal(document_id, &stats);

    (main_content, stats)
}

/// Re-render the document with chrome elements excluded, preferring a main
/// content wrapper and falling back to the whole body, then the full
/// document, mirroring the original's `find` fallback chain.
fn pick_main_content(document: &Html, removed_ids: &std::collections::HashSet<ego_tree::NodeId>) -> String {
    for selector_text in MAIN_CONTENT_SELECTORS {
        if let Ok(selector) = Selector::parse(selector_text) {
            if let Some(element) = document.select(&selector).next() {
                if !removed_ids.contains(&element.id()) {
                    let mut out = String::new();
                    serialize_excluding(*element, removed_ids, &mut out);
                    return out;
                }
            }
        }
    }
    let mut out = String::new();
    serialize_excluding(document.tree.root(), removed_ids, &mut out);
    out
}

/// Walks the parse tree in document order, skipping any node excluded by
/// id, and re-emits element tags and text verbatim. `scraper`'s tree is
/// read-only, so subtree removal is expressed as a serialization filter
/// rather than a mutation.
fn serialize_excluding(node: ego_tree::NodeRef<scraper::Node>, excluded: &std::collections::HashSet<ego_tree::NodeId>, out: &mut String) {
    if excluded.contains(&node.id()) {
        return;
    }

    match node.value() {
        scraper::Node::Element(element) => {
            out.push('<');
            out.push_str(element.name());
            for (name, value) in element.attrs() {
                out.push(' ');
                out.push_str(name);
                out.push_str("=\"");
                out.push_str(&value.replace('"', "&quot;"));
                out.push('"');
            }
            out.push('>');
            for child in node.children() {
                serialize_excluding(child, excluded, out);
            }
            out.push_str("</");
            out.push_str(element.name());
            out.push('>');
        }
        scraper::Node::Text(text) => {
            out.push_str(text);
        }
        _ => {
            for child in node.children() {
                serialize_excluding(child, excluded, out);
            }
        }
    }
}

fn round_2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

fn log_removal(document_id: &str, stats: &ChromeRemovalStats) {
    tracing::info!(
        event = "chrome_removed",
        document_id,
        chrome_percentage = stats.chrome_percentage,
        original_chars = stats.original_chars,
        chrome_chars = stats.chrome_chars,
        guidance_chars = stats.guidance_chars,
        patterns_matched = ?stats.patterns_matched,
        chrome_stripper_version = CHROME_STRIPPER_VERSION,
        "chrome removed from document"
    );
}

/// Normalizes a CSS selector to a short pattern name for stats tracking,
/// e.g. `.gem-c-cookie-banner` -> `cookie-banner`, `script` -> `script`.
fn normalize_pattern_name(pattern: &str) -> String {
    let mut normalized = pattern.trim_start_matches(['.', '#']).to_string();

    if let Some(bracket) = normalized.find('[') {
        normalized.truncate(bracket);
    }

    if let Some(last) = normalized.split(' ').next_back() {
        normalized = last.to_string();
    }

    normalized.replace("gem-c-", "").replace("govuk-", "")
}

pub fn detect_chrome_percentage(html: &str) -> f64 {
    strip_chrome(html, "chrome-detection").1.chrome_percentage
}
