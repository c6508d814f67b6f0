use serde::Deserialize;
use serde_json::{Map, Value};

#[derive(Clone, Debug, Deserialize)]
pub struct Config {
	pub service: Service,
	pub storage: Storage,
	pub providers: Providers,
	pub ingest: Ingest,
	pub search: Search,
	pub lifecycle: Lifecycle,
}

#[derive(Clone, Debug, Deserialize)]
pub struct Service {
	pub http_bind: String,
	pub log_level: String,
	/// Upper bound for a single multipart upload request body, in bytes.
	#[serde(default = "default_max_upload_bytes")]
	pub max_upload_bytes: usize,
}

#[derive(Clone, Debug, Deserialize)]
pub struct Storage {
	pub postgres: Postgres,
	pub qdrant: Qdrant,
	pub keyword: Keyword,
}

#[derive(Clone, Debug, Deserialize)]
pub struct Postgres {
	pub dsn: String,
	pub pool_max_conns: u32,
}

#[derive(Clone, Debug, Deserialize)]
pub struct Qdrant {
	pub url: String,
	pub collection: String,
	pub vector_dim: u32,
	pub timeout_ms: u64,
}

/// Elasticsearch-compatible full-text index holding one document per chunk.
#[derive(Clone, Debug, Deserialize)]
pub struct Keyword {
	pub url: String,
	pub index: String,
	/// Index-time analyzer for chunk content. Use `ik_max_word` when the IK plugin is installed.
	#[serde(default = "default_analyzer")]
	pub content_analyzer: String,
	/// Query-time analyzer for chunk content. Use `ik_smart` when the IK plugin is installed.
	#[serde(default = "default_analyzer")]
	pub search_analyzer: String,
	pub timeout_ms: u64,
	pub username: Option<String>,
	pub password: Option<String>,
}

#[derive(Clone, Debug, Deserialize)]
pub struct Providers {
	pub embedding: EmbeddingProviderConfig,
	pub llm: LlmProviderConfig,
}

#[derive(Clone, Debug, Deserialize)]
pub struct EmbeddingProviderConfig {
	pub provider_id: String,
	pub api_base: String,
	pub api_key: String,
	pub path: String,
	pub model: String,
	pub dimensions: u32,
	#[serde(default = "default_embedding_batch_size")]
	pub batch_size: usize,
	pub timeout_ms: u64,
	#[serde(default)]
	pub default_headers: Map<String, Value>,
}

#[derive(Clone, Debug, Deserialize)]
pub struct LlmProviderConfig {
	pub provider_id: String,
	pub api_base: String,
	pub api_key: String,
	pub path: String,
	pub model: String,
	pub temperature: f32,
	pub timeout_ms: u64,
	#[serde(default)]
	pub default_headers: Map<String, Value>,
}

#[derive(Clone, Debug, Deserialize)]
pub struct Ingest {
	/// Number of documents of one upload batch processed at the same time.
	pub max_concurrency: usize,
	#[serde(default = "default_extract_prefix_chars")]
	pub extract_prefix_chars: usize,
	#[serde(default = "default_min_chunk_chars")]
	pub min_chunk_chars: usize,
	#[serde(default = "default_max_chunk_chars")]
	pub max_chunk_chars: usize,
}

#[derive(Clone, Debug, Deserialize)]
pub struct Search {
	#[serde(default = "default_vector_weight")]
	pub vector_weight: f32,
	#[serde(default = "default_keyword_weight")]
	pub keyword_weight: f32,
	#[serde(default = "default_top_k")]
	pub top_k: u32,
	#[serde(default = "default_party_candidate_limit")]
	pub party_candidate_limit: u32,
	/// Restrict hybrid queries to the documents matched by the party lookup.
	#[serde(default)]
	pub chain_party_prefilter: bool,
}

#[derive(Clone, Debug, Deserialize)]
pub struct Lifecycle {
	#[serde(default = "default_expiry_sweep_hour_utc")]
	pub expiry_sweep_hour_utc: u8,
	#[serde(default = "default_expiry_poll_interval_seconds")]
	pub expiry_poll_interval_seconds: u64,
}

fn default_max_upload_bytes() -> usize {
	64 * 1_024 * 1_024
}

fn default_analyzer() -> String {
	"standard".to_string()
}

fn default_embedding_batch_size() -> usize {
	32
}

fn default_extract_prefix_chars() -> usize {
	10_000
}

fn default_min_chunk_chars() -> usize {
	200
}

fn default_max_chunk_chars() -> usize {
	1_200
}

fn default_vector_weight() -> f32 {
	0.6
}

fn default_keyword_weight() -> f32 {
	0.4
}

fn default_top_k() -> u32 {
	10
}

fn default_party_candidate_limit() -> u32 {
	100
}

fn default_expiry_sweep_hour_utc() -> u8 {
	2
}

fn default_expiry_poll_interval_seconds() -> u64 {
	60
}
