//! BFS crawler for UK government guidance pages (component C): enforces an
//! SSRF-safe domain allow-list, rate-limits fetches, and filters pages by a
//! content-relevance heuristic before following further links.

use std::collections::{HashSet, VecDeque};
use std::net::{IpAddr, ToSocketAddrs};
use std::time::Duration;

use common::error::AppError;
use common::hash::sha256_hex;
use scraper::{Html, Selector};
use tracing::warn;
use url::Url;

use crate::chrome_stripper;

pub const MAX_CRAWL_DEPTH: u32 = 20;
const FETCH_TIMEOUT_SECS: u64 = 30;

const GUIDANCE_URL_PATTERNS: &[&str] = &["/guidance/", "/how-to", "/apply-"];
const GUIDANCE_KEYWORDS: &[&str] = &[
    "guidance",
    "instruction",
    "application",
    "service",
    "how to",
    "eligibility",
    "apply",
    "rules",
    "regulations",
];

#[derive(Debug, Clone)]
pub struct ScrapedDocument {
    pub url: String,
    pub title: String,
    pub content: String,
    pub content_hash: String,
    pub depth: u32,
}

#[derive(Debug, Default)]
pub struct CrawlReport {
    pub discovered_urls: Vec<String>,
    pub scraped_documents: Vec<ScrapedDocument>,
    pub filtered_count: u32,
    pub max_depth_reached: u32,
    pub stopped_at_depth: bool,
}

pub struct Crawler {
    client: reqwest::Client,
    rate_limit_per_second: f64,
    visited: HashSet<String>,
    seen_content_hashes: HashSet<String>,
}

impl Crawler {
    pub fn new(rate_limit_per_second: f64) -> Self {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(FETCH_TIMEOUT_SECS))
            .build()
            .unwrap_or_default();
        Self {
            client,
            rate_limit_per_second,
            visited: HashSet::new(),
            seen_content_hashes: HashSet::new(),
        }
    }

    pub async fn crawl(&mut self, initial_urls: &[String], max_depth: u32, validate_content: bool) -> CrawlReport {
        let max_depth = max_depth.min(MAX_CRAWL_DEPTH);
        let mut queue: VecDeque<(String, u32)> = VecDeque::new();

        for url in initial_urls {
            if is_valid_gov_url(url).await.is_ok() {
                queue.push_back((url.clone(), 0));
            }
        }

        let mut report = CrawlReport::default();
        let delay = Duration::from_secs_f64(1.0 / self.rate_limit_per_second.max(0.001));

        while let Some((url, depth)) = queue.pop_front() {
            if self.visited.contains(&dedup_key(&url)) || depth > max_depth {
                continue;
            }
            report.max_depth_reached = report.max_depth_reached.max(depth);
            self.visited.insert(dedup_key(&url));

            tokio::time::sleep(delay).await;

            let Ok(response) = self.client.get(&url).send().await else {
                warn!(url, "HTTP error scraping URL, skipping");
                continue;
            };
            let Ok(response) = response.error_for_status() else {
                warn!(url, "HTTP error status scraping URL, skipping");
                continue;
            };
            let Ok(html) = response.text().await else {
                warn!(url, "failed to read response body, skipping");
                continue;
            };

            if validate_content && !is_guidance_content(&url, &html) {
                report.filtered_count += 1;
                continue;
            }

            let document = Html::parse_document(&html);
            let (cleaned_html, _chrome_stats) = chrome_stripper::strip_chrome(&html, &url);
            let text_content = extract_text(&cleaned_html);
            let content_hash = sha256_hex(&text_content);

            if self.seen_content_hashes.insert(content_hash.clone()) {
                let title = extract_title(&document).unwrap_or_else(|| url.clone());
                report.scraped_documents.push(ScrapedDocument {
                    url: url.clone(),
                    title,
                    content: text_content,
                    content_hash,
                    depth,
                });
                report.discovered_urls.push(url.clone());
            }

            if depth < max_depth {
                for link in extract_links(&document, &url) {
                    if !self.visited.contains(&dedup_key(&link)) && is_valid_gov_url(&link).await.is_ok() {
                        queue.push_back((link, depth + 1));
                    }
                }
            }
        }

        report.stopped_at_depth = report.max_depth_reached >= max_depth;
        report
    }
}

/// Strips fragment and query from a URL for dedup-key purposes, keeping
/// scheme/host/path.
fn dedup_key(url: &str) -> String {
    match Url::parse(url) {
        Ok(parsed) => format!("{}://{}{}", parsed.scheme(), parsed.host_str().unwrap_or(""), parsed.path()),
        Err(_) => url.to_string(),
    }
}

/// SSRF-safe gate: scheme must be https, host must be within the gov.uk
/// domain, and DNS resolution must land on a public, non-reserved address.
pub async fn is_valid_gov_url(url: &str) -> Result<(), AppError> {
    let parsed = Url::parse(url).map_err(|err| AppError::Validation(format!("invalid URL {url}: {err}")))?;

    if parsed.scheme() != "https" {
        return Err(AppError::Validation(format!("only HTTPS URLs allowed (got {}): {url}", parsed.scheme())));
    }

    let host = parsed.host_str().unwrap_or_default().to_lowercase();
    if !(host.ends_with(".gov.uk") || host == "www.gov.uk" || host == "gov.uk") {
        return Err(AppError::Validation(format!("URL must be from gov.uk domain (got {host}): {url}")));
    }

    if matches!(host.as_str(), "localhost" | "127.0.0.1" | "::1" | "0.0.0.0") {
        return Err(AppError::Validation(format!("localhost URLs are not allowed: {url}")));
    }

    let addrs = tokio::task::spawn_blocking({
        let host = host.clone();
        move || (host.as_str(), 443).to_socket_addrs()
    })
    .await
    .map_err(|err| AppError::Validation(format!("DNS resolution task failed for {host}: {err}")))?
    .map_err(|_| AppError::Validation(format!("DNS resolution failed for: {host}")))?;

    for addr in addrs {
        if !is_public_address(addr.ip()) {
            return Err(AppError::Validation(format!(
                "private/internal or reserved IP addresses not allowed: {host} resolves to {}",
                addr.ip()
            )));
        }
    }

    Ok(())
}

fn is_public_address(ip: IpAddr) -> bool {
    match ip {
        IpAddr::V4(v4) => {
            !(v4.is_private() || v4.is_loopback() || v4.is_link_local() || v4.is_multicast() || v4.is_broadcast() || v4.is_documentation())
        }
        IpAddr::V6(v6) => !(v6.is_loopback() || v6.is_multicast() || v6.is_unspecified()),
    }
}

fn is_guidance_content(url: &str, html: &str) -> bool {
    let lower_url = url.to_lowercase();
    if GUIDANCE_URL_PATTERNS.iter().any(|pattern| lower_url.contains(pattern)) {
        return true;
    }

    let lower_content = html.to_lowercase();
    let matches = GUIDANCE_KEYWORDS.iter().filter(|keyword| lower_content.contains(*keyword)).count();
    matches >= 3
}

fn extract_text(html: &str) -> String {
    let document = Html::parse_document(html);
    let body_selector = Selector::parse("body").unwrap_or_else(|_| Selector::parse("html").expect("html selector always parses"));
    let text: String = document
        .select(&body_selector)
        .next()
        .map(|el| el.text().collect::<Vec<_>>().join("\n"))
        .unwrap_or_default();

    text.lines().map(str::trim).filter(|line| !line.is_empty()).collect::<Vec<_>>().join("\n")
}

fn extract_title(document: &Html) -> Option<String> {
    let selector = Selector::parse("title").ok()?;
    document.select(&selector).next().map(|el| el.text().collect::<String>())
}

fn extract_links(document: &Html, base_url: &str) -> Vec<String> {
    let Ok(base) = Url::parse(base_url) else {
        return Vec::new();
    };
    let Ok(selector) = Selector::parse("a[href]") else {
        return Vec::new();
    };

    document
        .select(&selector)
        .filter_map(|el| el.value().attr("href"))
        .filter_map(|href| base.join(href).ok())
        .map(|mut absolute| {
            absolute.set_fragment(None);
            absolute.set_query(None);
            absolute.to_string()
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dedup_key_strips_fragment_and_query() {
        assert_eq!(
            dedup_key("https://www.gov.uk/guidance/apply?ref=1#section"),
            "https://www.gov.uk/guidance/apply"
        );
    }

    #[test]
    fn guidance_content_matches_url_pattern() {
        assert!(is_guidance_content("https://www.gov.uk/guidance/apply-for-visa", "irrelevant"));
    }

    #[test]
    fn guidance_content_requires_three_keywords() {
        let html = "this page has guidance and eligibility and application details";
        assert!(is_guidance_content("https://www.gov.uk/somewhere", html));
        assert!(!is_guidance_content("https://www.gov.uk/somewhere", "just one guidance keyword"));
    }

    #[test]
    fn public_address_check_rejects_private_ranges() {
        assert!(!is_public_address("10.0.0.5".parse().expect("valid ip")));
        assert!(!is_public_address("127.0.0.1".parse().expect("valid ip")));
        assert!(is_public_address("93.184.216.34".parse().expect("valid ip")));
    }

    #[tokio::test]
    async fn rejects_non_https_scheme() {
        let err = is_valid_gov_url("http://www.gov.uk/guidance").await.unwrap_err();
        assert!(err.to_string().contains("HTTPS"));
    }

    #[tokio::test]
    async fn rejects_non_gov_uk_domain() {
        let err = is_valid_gov_url("https://example.com/guidance").await.unwrap_err();
        assert!(err.to_string().contains("gov.uk domain"));
    }
}
