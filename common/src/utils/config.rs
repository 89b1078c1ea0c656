use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;

/// Backend used for the promotion-backup object store.
#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StorageKind {
    #[default]
    Local,
    Memory,
}

#[derive(Clone, Debug, Deserialize)]
pub struct AppConfig {
    pub openai_api_key: String,
    #[serde(default = "default_base_url")]
    pub openai_base_url: String,

    pub surrealdb_address: String,
    pub surrealdb_username: String,
    pub surrealdb_password: String,
    pub surrealdb_namespace: String,
    pub surrealdb_database: String,

    #[serde(default = "default_data_dir")]
    pub data_dir: String,
    #[serde(default)]
    pub storage: StorageKind,
    #[serde(default)]
    pub http_port: u16,

    /// Requests per second allowed against a single crawl job's target host.
    #[serde(default = "default_crawler_rate_limit")]
    pub crawler_rate_limit_per_second: f64,
    /// Hard cap on BFS depth regardless of caller-supplied max_depth.
    #[serde(default = "default_crawler_max_depth")]
    pub crawler_max_depth: u32,
    #[serde(default = "default_fetch_timeout_secs")]
    pub crawler_fetch_timeout_secs: u64,

    /// Default chunk size target in tokens when a caller does not override it.
    #[serde(default = "default_chunk_size_tokens")]
    pub chunk_size_tokens: usize,

    #[serde(default = "default_embedding_dimensions")]
    pub embedding_dimensions: usize,
    #[serde(default = "default_embedding_model")]
    pub embedding_model: String,

    #[serde(default = "default_true")]
    pub reranking_enabled: bool,
    #[serde(default = "default_reranking_pool_size")]
    pub reranking_pool_size: usize,

    /// BM25 weight `w` in `rrf(d) = w/(k+bm25_rank) + (1-w)/(k+dense_rank)`.
    #[serde(default = "default_rrf_bm25_weight")]
    pub rrf_bm25_weight: f32,
    #[serde(default = "default_rrf_k")]
    pub rrf_k: u32,

    #[serde(default = "default_retry_attempts")]
    pub retry_max_attempts: usize,
    #[serde(default = "default_retry_min_backoff_ms")]
    pub retry_min_backoff_ms: u64,
    #[serde(default = "default_retry_max_backoff_ms")]
    pub retry_max_backoff_ms: u64,

    #[serde(default = "default_worker_idle_backoff_ms")]
    pub worker_idle_backoff_ms: u64,
    #[serde(default = "default_worker_lease_secs")]
    pub worker_lease_secs: i64,

    /// S3-compatible endpoint used to back up production prompts before promotion.
    #[serde(default)]
    pub prompt_backup_endpoint: Option<String>,
    #[serde(default)]
    pub prompt_backup_key: Option<String>,
    #[serde(default)]
    pub prompt_backup_secret: Option<String>,
    #[serde(default = "default_prompt_backup_region")]
    pub prompt_backup_region: String,
    #[serde(default = "default_prompt_backup_bucket")]
    pub prompt_backup_bucket: String,
    #[serde(default = "default_prompt_backup_prefix")]
    pub prompt_backup_prefix: String,

    #[serde(default = "default_ingest_max_files")]
    pub ingest_max_files: usize,
    #[serde(default = "default_ingest_max_content_bytes")]
    pub ingest_max_content_bytes: usize,
    #[serde(default = "default_ingest_max_context_bytes")]
    pub ingest_max_context_bytes: usize,
    #[serde(default = "default_ingest_max_category_bytes")]
    pub ingest_max_category_bytes: usize,

    #[serde(default)]
    pub fastembed_cache_dir: Option<String>,
    #[serde(default)]
    pub fastembed_show_download_progress: Option<bool>,
    #[serde(default)]
    pub fastembed_max_length: Option<usize>,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            openai_api_key: String::new(),
            openai_base_url: default_base_url(),
            surrealdb_address: "mem://".into(),
            surrealdb_username: String::new(),
            surrealdb_password: String::new(),
            surrealdb_namespace: "guidance".into(),
            surrealdb_database: "guidance".into(),
            data_dir: default_data_dir(),
            storage: StorageKind::default(),
            http_port: 8080,
            crawler_rate_limit_per_second: default_crawler_rate_limit(),
            crawler_max_depth: default_crawler_max_depth(),
            crawler_fetch_timeout_secs: default_fetch_timeout_secs(),
            chunk_size_tokens: default_chunk_size_tokens(),
            embedding_dimensions: default_embedding_dimensions(),
            embedding_model: default_embedding_model(),
            reranking_enabled: true,
            reranking_pool_size: default_reranking_pool_size(),
            rrf_bm25_weight: default_rrf_bm25_weight(),
            rrf_k: default_rrf_k(),
            retry_max_attempts: default_retry_attempts(),
            retry_min_backoff_ms: default_retry_min_backoff_ms(),
            retry_max_backoff_ms: default_retry_max_backoff_ms(),
            worker_idle_backoff_ms: default_worker_idle_backoff_ms(),
            worker_lease_secs: default_worker_lease_secs(),
            prompt_backup_endpoint: None,
            prompt_backup_key: None,
            prompt_backup_secret: None,
            prompt_backup_region: default_prompt_backup_region(),
            prompt_backup_bucket: default_prompt_backup_bucket(),
            prompt_backup_prefix: default_prompt_backup_prefix(),
            ingest_max_files: default_ingest_max_files(),
            ingest_max_content_bytes: default_ingest_max_content_bytes(),
            ingest_max_context_bytes: default_ingest_max_context_bytes(),
            ingest_max_category_bytes: default_ingest_max_category_bytes(),
            fastembed_cache_dir: None,
            fastembed_show_download_progress: None,
            fastembed_max_length: None,
        }
    }
}

fn default_data_dir() -> String {
    "./data".to_string()
}
fn default_base_url() -> String {
    "https://api.openai.com/v1".to_string()
}
fn default_crawler_rate_limit() -> f64 {
    1.0
}
fn default_crawler_max_depth() -> u32 {
    20
}
fn default_fetch_timeout_secs() -> u64 {
    30
}
fn default_chunk_size_tokens() -> usize {
    512
}
fn default_embedding_dimensions() -> usize {
    1536
}
fn default_embedding_model() -> String {
    "text-embedding-3-small".to_string()
}
fn default_true() -> bool {
    true
}
fn default_reranking_pool_size() -> usize {
    1
}
fn default_rrf_bm25_weight() -> f32 {
    0.3
}
fn default_rrf_k() -> u32 {
    60
}
fn default_retry_attempts() -> usize {
    3
}
fn default_retry_min_backoff_ms() -> u64 {
    2_000
}
fn default_retry_max_backoff_ms() -> u64 {
    10_000
}
fn default_worker_idle_backoff_ms() -> u64 {
    500
}
fn default_worker_lease_secs() -> i64 {
    300
}
fn default_prompt_backup_region() -> String {
    "us-east-1".to_string()
}
fn default_prompt_backup_bucket() -> String {
    "gov-ai-vectorization".to_string()
}
fn default_prompt_backup_prefix() -> String {
    "prompt-backups".to_string()
}
fn default_ingest_max_files() -> usize {
    50
}
fn default_ingest_max_content_bytes() -> usize {
    50 * 1024 * 1024
}
fn default_ingest_max_context_bytes() -> usize {
    8 * 1024
}
fn default_ingest_max_category_bytes() -> usize {
    256
}

/// Load configuration from `config.{toml,yaml,...}` (optional) layered with
/// environment variables, matching the teacher's layered-source pattern.
pub fn get_config() -> Result<AppConfig, ConfigError> {
    let config = Config::builder()
        .add_source(File::with_name("config").required(false))
        .add_source(Environment::default())
        .build()?;

    config.try_deserialize()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_internally_consistent() {
        let cfg = AppConfig::default();
        assert_eq!(cfg.crawler_max_depth, 20);
        assert!((cfg.rrf_bm25_weight - 0.3).abs() < f32::EPSILON);
        assert_eq!(cfg.rrf_k, 60);
        assert_eq!(cfg.storage, StorageKind::Local);
    }
}
