//! Store capabilities the saga and query paths depend on, with the production backends.

use std::sync::Arc;

use time::OffsetDateTime;
use uuid::Uuid;

use crate::{BoxFuture, Result};
use pact_domain::{Chunk, FilterSet, RetrievedItem};
use pact_storage::{
	contracts, db::Db, keyword::KeywordStore, models::ContractRecord, qdrant::QdrantStore,
};

pub trait ContractStore
where
	Self: Send + Sync,
{
	fn find_by_file_name<'a>(
		&'a self,
		file_name: &'a str,
	) -> BoxFuture<'a, Result<Option<ContractRecord>>>;

	/// Fails with [`crate::Error::Conflict`] when the file name is already taken.
	fn insert<'a>(&'a self, record: &'a ContractRecord) -> BoxFuture<'a, Result<()>>;

	fn get(&self, doc_id: Uuid) -> BoxFuture<'_, Result<Option<ContractRecord>>>;

	fn delete(&self, doc_id: Uuid) -> BoxFuture<'_, Result<bool>>;

	/// Returns the subset of `doc_ids` that still have a record.
	fn existing_ids<'a>(&'a self, doc_ids: &'a [Uuid]) -> BoxFuture<'a, Result<Vec<Uuid>>>;

	/// `candidates` restricts the result to those ids and replaces party matching.
	fn filter_doc_ids<'a>(
		&'a self,
		filters: &'a FilterSet,
		candidates: Option<&'a [Uuid]>,
	) -> BoxFuture<'a, Result<Vec<Uuid>>>;

	/// Flips active records whose end date has passed to expired and returns their ids.
	fn expire_due(&self, now: OffsetDateTime) -> BoxFuture<'_, Result<Vec<Uuid>>>;
}

pub trait KeywordIndex
where
	Self: Send + Sync,
{
	fn index_chunks<'a>(
		&'a self,
		chunks: &'a [Chunk],
		keywords: &'a [String],
	) -> BoxFuture<'a, Result<()>>;

	fn delete_document(&self, doc_id: Uuid) -> BoxFuture<'_, Result<()>>;

	fn doc_ids_by_parties<'a>(
		&'a self,
		parties: &'a [String],
		limit: u32,
	) -> BoxFuture<'a, Result<Vec<Uuid>>>;

	fn search<'a>(
		&'a self,
		query: &'a str,
		filters: &'a FilterSet,
		doc_ids: Option<&'a [Uuid]>,
		top_k: u32,
	) -> BoxFuture<'a, Result<Vec<RetrievedItem>>>;

	fn mark_expired<'a>(&'a self, doc_ids: &'a [Uuid]) -> BoxFuture<'a, Result<()>>;
}

pub trait VectorIndex
where
	Self: Send + Sync,
{
	fn upsert_chunks<'a>(
		&'a self,
		chunks: &'a [Chunk],
		vectors: &'a [Vec<f32>],
	) -> BoxFuture<'a, Result<()>>;

	fn delete_document(&self, doc_id: Uuid) -> BoxFuture<'_, Result<()>>;

	fn search<'a>(
		&'a self,
		vector: &'a [f32],
		filters: &'a FilterSet,
		doc_ids: Option<&'a [Uuid]>,
		top_k: u32,
	) -> BoxFuture<'a, Result<Vec<RetrievedItem>>>;

	fn mark_expired<'a>(&'a self, doc_ids: &'a [Uuid]) -> BoxFuture<'a, Result<()>>;
}

#[derive(Clone)]
pub struct Stores {
	pub contracts: Arc<dyn ContractStore>,
	pub keyword: Arc<dyn KeywordIndex>,
	pub vector: Arc<dyn VectorIndex>,
}
impl Stores {
	pub fn new(db: Db, keyword: KeywordStore, qdrant: QdrantStore) -> Self {
		Self { contracts: Arc::new(db), keyword: Arc::new(keyword), vector: Arc::new(qdrant) }
	}
}

impl ContractStore for Db {
	fn find_by_file_name<'a>(
		&'a self,
		file_name: &'a str,
	) -> BoxFuture<'a, Result<Option<ContractRecord>>> {
		Box::pin(async move { Ok(contracts::find_by_file_name(&self.pool, file_name).await?) })
	}

	fn insert<'a>(&'a self, record: &'a ContractRecord) -> BoxFuture<'a, Result<()>> {
		Box::pin(async move { Ok(contracts::insert_contract(&self.pool, record).await?) })
	}

	fn get(&self, doc_id: Uuid) -> BoxFuture<'_, Result<Option<ContractRecord>>> {
		Box::pin(async move { Ok(contracts::get_contract(&self.pool, doc_id).await?) })
	}

	fn delete(&self, doc_id: Uuid) -> BoxFuture<'_, Result<bool>> {
		Box::pin(async move { Ok(contracts::delete_contract(&self.pool, doc_id).await?) })
	}

	fn existing_ids<'a>(&'a self, doc_ids: &'a [Uuid]) -> BoxFuture<'a, Result<Vec<Uuid>>> {
		Box::pin(async move { Ok(contracts::existing_contract_ids(&self.pool, doc_ids).await?) })
	}

	fn filter_doc_ids<'a>(
		&'a self,
		filters: &'a FilterSet,
		candidates: Option<&'a [Uuid]>,
	) -> BoxFuture<'a, Result<Vec<Uuid>>> {
		Box::pin(async move {
			Ok(contracts::filter_contract_ids(&self.pool, filters, candidates).await?)
		})
	}

	fn expire_due(&self, now: OffsetDateTime) -> BoxFuture<'_, Result<Vec<Uuid>>> {
		Box::pin(async move { Ok(contracts::expire_contracts(&self.pool, now).await?) })
	}
}

impl KeywordIndex for KeywordStore {
	fn index_chunks<'a>(
		&'a self,
		chunks: &'a [Chunk],
		keywords: &'a [String],
	) -> BoxFuture<'a, Result<()>> {
		Box::pin(async move { Ok(KeywordStore::index_chunks(self, chunks, keywords).await?) })
	}

	fn delete_document(&self, doc_id: Uuid) -> BoxFuture<'_, Result<()>> {
		Box::pin(async move {
			let deleted = KeywordStore::delete_document(self, doc_id).await?;

			tracing::debug!(doc_id = %doc_id, deleted, "Deleted keyword entries.");

			Ok(())
		})
	}

	fn doc_ids_by_parties<'a>(
		&'a self,
		parties: &'a [String],
		limit: u32,
	) -> BoxFuture<'a, Result<Vec<Uuid>>> {
		Box::pin(async move { Ok(KeywordStore::doc_ids_by_parties(self, parties, limit).await?) })
	}

	fn search<'a>(
		&'a self,
		query: &'a str,
		filters: &'a FilterSet,
		doc_ids: Option<&'a [Uuid]>,
		top_k: u32,
	) -> BoxFuture<'a, Result<Vec<RetrievedItem>>> {
		Box::pin(async move {
			Ok(KeywordStore::search(self, query, filters, doc_ids, top_k).await?)
		})
	}

	fn mark_expired<'a>(&'a self, doc_ids: &'a [Uuid]) -> BoxFuture<'a, Result<()>> {
		Box::pin(async move {
			let updated = KeywordStore::mark_expired(self, doc_ids).await?;

			tracing::debug!(documents = doc_ids.len(), updated, "Marked keyword entries expired.");

			Ok(())
		})
	}
}

impl VectorIndex for QdrantStore {
	fn upsert_chunks<'a>(
		&'a self,
		chunks: &'a [Chunk],
		vectors: &'a [Vec<f32>],
	) -> BoxFuture<'a, Result<()>> {
		Box::pin(async move { Ok(QdrantStore::upsert_chunks(self, chunks, vectors).await?) })
	}

	fn delete_document(&self, doc_id: Uuid) -> BoxFuture<'_, Result<()>> {
		Box::pin(async move { Ok(QdrantStore::delete_document(self, doc_id).await?) })
	}

	fn search<'a>(
		&'a self,
		vector: &'a [f32],
		filters: &'a FilterSet,
		doc_ids: Option<&'a [Uuid]>,
		top_k: u32,
	) -> BoxFuture<'a, Result<Vec<RetrievedItem>>> {
		Box::pin(async move { Ok(QdrantStore::search(self, vector, filters, doc_ids, top_k).await?) })
	}

	fn mark_expired<'a>(&'a self, doc_ids: &'a [Uuid]) -> BoxFuture<'a, Result<()>> {
		Box::pin(async move { Ok(QdrantStore::mark_expired(self, doc_ids).await?) })
	}
}
