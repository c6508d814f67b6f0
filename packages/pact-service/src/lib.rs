pub mod dedup;
pub mod enrich;
pub mod expire;
pub mod extract;
pub mod ingest;
pub mod intent;
pub mod search;
pub mod stores;

mod error;

pub use error::{Error, Result};
pub use ingest::{
	BatchReport, Compensation, DocumentOutcome, SagaStage, UploadedFile, UploadReport,
};
pub use search::{HybridHit, SearchAnswer, SearchRequest, SearchResponse, StructuredHit};
pub use stores::{ContractStore, KeywordIndex, Stores, VectorIndex};

use std::{future::Future, pin::Pin, sync::Arc};

use serde_json::Value;

use pact_config::{Config, EmbeddingProviderConfig, LlmProviderConfig};
use pact_providers::{chat, embedding};

pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Text in, text out. Extraction and intent classification both go through this seam.
pub trait ChatProvider
where
	Self: Send + Sync,
{
	fn complete<'a>(
		&'a self,
		cfg: &'a LlmProviderConfig,
		messages: &'a [Value],
	) -> BoxFuture<'a, Result<String>>;
}

pub trait EmbeddingProvider
where
	Self: Send + Sync,
{
	fn embed<'a>(
		&'a self,
		cfg: &'a EmbeddingProviderConfig,
		texts: &'a [String],
	) -> BoxFuture<'a, Result<Vec<Vec<f32>>>>;
}

#[derive(Clone)]
pub struct Providers {
	pub chat: Arc<dyn ChatProvider>,
	pub embedding: Arc<dyn EmbeddingProvider>,
}
impl Providers {
	pub fn new(chat: Arc<dyn ChatProvider>, embedding: Arc<dyn EmbeddingProvider>) -> Self {
		Self { chat, embedding }
	}
}
impl Default for Providers {
	fn default() -> Self {
		let provider = Arc::new(DefaultProviders);

		Self { chat: provider.clone(), embedding: provider }
	}
}

pub struct PactService {
	pub cfg: Config,
	pub stores: Stores,
	pub providers: Providers,
}
impl PactService {
	pub fn new(cfg: Config, stores: Stores) -> Self {
		Self { cfg, stores, providers: Providers::default() }
	}

	pub fn with_providers(cfg: Config, stores: Stores, providers: Providers) -> Self {
		Self { cfg, stores, providers }
	}
}

struct DefaultProviders;
impl ChatProvider for DefaultProviders {
	fn complete<'a>(
		&'a self,
		cfg: &'a LlmProviderConfig,
		messages: &'a [Value],
	) -> BoxFuture<'a, Result<String>> {
		Box::pin(async move { Ok(chat::complete(cfg, messages).await?) })
	}
}
impl EmbeddingProvider for DefaultProviders {
	fn embed<'a>(
		&'a self,
		cfg: &'a EmbeddingProviderConfig,
		texts: &'a [String],
	) -> BoxFuture<'a, Result<Vec<Vec<f32>>>> {
		Box::pin(async move { Ok(embedding::embed(cfg, texts).await?) })
	}
}
