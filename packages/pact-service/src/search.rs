//! Query routing: intent classification, then the structured or the hybrid path.

use std::{collections::BTreeSet, time::Instant};

use serde::{Deserialize, Serialize};
use time::{Date, OffsetDateTime};
use uuid::Uuid;

use crate::{Error, PactService, Result};
use pact_domain::{
	ChunkMetadata, ContractStatus, FilterSet, FusionWeights, Intent, IntentKind, RetrievedItem,
	Source, dates, fusion, placement,
};
use pact_storage::models::ContractRecord;

#[derive(Clone, Debug, Deserialize)]
pub struct SearchRequest {
	pub query: String,
	/// Also return hit ids in primacy/recency order.
	#[serde(default)]
	pub placement: bool,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct SearchResponse {
	pub intent: IntentKind,
	pub summary: String,
	pub answer: SearchAnswer,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum SearchAnswer {
	Structured {
		count: usize,
		contracts: Vec<StructuredHit>,
	},
	Hybrid {
		hits: Vec<HybridHit>,
		#[serde(skip_serializing_if = "Option::is_none")]
		context_order: Option<Vec<String>>,
	},
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct StructuredHit {
	pub doc_id: Uuid,
	pub file_name: String,
	pub party_a: String,
	pub party_b: String,
	pub contract_type: String,
	pub status: ContractStatus,
	#[serde(with = "dates::option")]
	pub sign_date: Option<Date>,
	#[serde(with = "dates::option")]
	pub end_date: Option<Date>,
	pub total_amount: f64,
	pub summary: String,
}
impl From<ContractRecord> for StructuredHit {
	fn from(record: ContractRecord) -> Self {
		Self {
			status: record.status(),
			doc_id: record.doc_id,
			file_name: record.file_name,
			party_a: record.party_a,
			party_b: record.party_b,
			contract_type: record.contract_type,
			sign_date: record.sign_date,
			end_date: record.end_date,
			total_amount: record.total_amount,
			summary: record.summary,
		}
	}
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct HybridHit {
	pub chunk_id: String,
	pub doc_id: Uuid,
	pub content: String,
	pub score: f32,
	pub sources: BTreeSet<Source>,
	pub metadata: ChunkMetadata,
}
impl From<RetrievedItem> for HybridHit {
	fn from(item: RetrievedItem) -> Self {
		Self {
			doc_id: item.metadata.doc_id,
			chunk_id: item.id,
			content: item.content,
			score: item.score,
			sources: item.sources,
			metadata: item.metadata,
		}
	}
}

impl PactService {
	pub async fn search(&self, req: SearchRequest) -> Result<SearchResponse> {
		let query = req.query.trim();

		if query.is_empty() {
			return Err(Error::InvalidRequest { message: "query must not be empty.".to_string() });
		}

		let started = Instant::now();
		let intent = self.analyze_query(query, OffsetDateTime::now_utc()).await?;

		tracing::info!(
			kind = ?intent.kind,
			elapsed_ms = started.elapsed().as_millis() as u64,
			"Analyzed query."
		);

		let response = match intent.kind {
			IntentKind::StructuredOnly => self.structured_search(&intent.filters).await?,
			IntentKind::Hybrid => self.hybrid_search(&intent, query, req.placement).await?,
		};

		tracing::info!(
			kind = ?response.intent,
			elapsed_ms = started.elapsed().as_millis() as u64,
			"Search finished."
		);

		Ok(response)
	}

	/// Party lookup in the keyword index, then relational filtering over those candidates.
	pub async fn structured_search(&self, filters: &FilterSet) -> Result<SearchResponse> {
		let started = Instant::now();
		let candidates = match self.party_candidates(filters).await? {
			Some(ids) if ids.is_empty() => return Ok(empty_structured()),
			other => other,
		};
		let doc_ids =
			self.stores.contracts.filter_doc_ids(filters, candidates.as_deref()).await?;
		let mut contracts = Vec::with_capacity(doc_ids.len());

		for doc_id in doc_ids {
			match self.stores.contracts.get(doc_id).await? {
				Some(record) => contracts.push(StructuredHit::from(record)),
				None => tracing::debug!(doc_id = %doc_id, "Contract vanished before fetch."),
			}
		}

		tracing::info!(
			count = contracts.len(),
			elapsed_ms = started.elapsed().as_millis() as u64,
			"Structured search finished."
		);

		if contracts.is_empty() {
			return Ok(empty_structured());
		}

		Ok(SearchResponse {
			intent: IntentKind::StructuredOnly,
			summary: format!("Found {} matching contracts.", contracts.len()),
			answer: SearchAnswer::Structured { count: contracts.len(), contracts },
		})
	}

	/// Vector and keyword search run concurrently. Either side failing fails the query.
	pub async fn hybrid_search(
		&self,
		intent: &Intent,
		query: &str,
		with_placement: bool,
	) -> Result<SearchResponse> {
		let started = Instant::now();
		let semantic =
			if intent.semantic_query.is_empty() { query } else { intent.semantic_query.as_str() };
		let mut filters = intent.filters.clone();
		let mut candidates = None;

		if self.cfg.search.chain_party_prefilter
			&& let Some(ids) = self.party_candidates(&filters).await?
		{
			if ids.is_empty() {
				return Ok(empty_hybrid(with_placement));
			}

			filters.any_party.clear();

			candidates = Some(ids);
		}

		let keyword_query = keyword_query(semantic, &intent.keywords);
		let top_k = self.cfg.search.top_k;
		let doc_ids = candidates.as_deref();
		let vector_side = async {
			let texts = [semantic.to_string()];
			let vector = self
				.providers
				.embedding
				.embed(&self.cfg.providers.embedding, &texts)
				.await?
				.into_iter()
				.next()
				.ok_or_else(|| Error::Provider {
					message: "Embedding provider returned no vector for the query.".to_string(),
				})?;

			let hits = self.stores.vector.search(&vector, &filters, doc_ids, top_k).await?;

			Ok::<_, Error>(hits)
		};
		let keyword_side = self.stores.keyword.search(&keyword_query, &filters, doc_ids, top_k);
		let (vector_hits, keyword_hits) = tokio::try_join!(vector_side, keyword_side)?;
		let (vector_hits, keyword_hits) = self.retain_recorded(vector_hits, keyword_hits).await?;

		tracing::info!(
			vector_hits = vector_hits.len(),
			keyword_hits = keyword_hits.len(),
			elapsed_ms = started.elapsed().as_millis() as u64,
			"Retrieved hybrid candidates."
		);

		let weights = FusionWeights {
			vector: self.cfg.search.vector_weight,
			keyword: self.cfg.search.keyword_weight,
		};
		let fused = fusion::fuse(&vector_hits, &keyword_hits, weights, top_k as usize);
		let context_order = with_placement.then(|| {
			placement::primacy_recency(fused.iter().collect(), |item| item.score)
				.into_iter()
				.map(|item| item.id.clone())
				.collect::<Vec<_>>()
		});
		let hits: Vec<HybridHit> = fused.into_iter().map(HybridHit::from).collect();

		Ok(SearchResponse {
			intent: IntentKind::Hybrid,
			summary: format!("Fused {} results.", hits.len()),
			answer: SearchAnswer::Hybrid { hits, context_order },
		})
	}

	/// Drops hits whose document has no contract record, such as index entries a failed
	/// compensation left behind.
	async fn retain_recorded(
		&self,
		vector_hits: Vec<RetrievedItem>,
		keyword_hits: Vec<RetrievedItem>,
	) -> Result<(Vec<RetrievedItem>, Vec<RetrievedItem>)> {
		let doc_ids: Vec<Uuid> = vector_hits
			.iter()
			.chain(&keyword_hits)
			.map(|item| item.metadata.doc_id)
			.collect::<BTreeSet<_>>()
			.into_iter()
			.collect();

		if doc_ids.is_empty() {
			return Ok((vector_hits, keyword_hits));
		}

		let existing: BTreeSet<Uuid> =
			self.stores.contracts.existing_ids(&doc_ids).await?.into_iter().collect();

		if existing.len() == doc_ids.len() {
			return Ok((vector_hits, keyword_hits));
		}

		let before = vector_hits.len() + keyword_hits.len();
		let keep = |hits: Vec<RetrievedItem>| -> Vec<RetrievedItem> {
			hits.into_iter().filter(|item| existing.contains(&item.metadata.doc_id)).collect()
		};
		let (vector_hits, keyword_hits) = (keep(vector_hits), keep(keyword_hits));

		tracing::warn!(
			orphaned_documents = doc_ids.len() - existing.len(),
			dropped_hits = before - vector_hits.len() - keyword_hits.len(),
			"Dropped index hits without a contract record."
		);

		Ok((vector_hits, keyword_hits))
	}

	/// `None` when the filters name no party.
	async fn party_candidates(&self, filters: &FilterSet) -> Result<Option<Vec<Uuid>>> {
		if filters.any_party.is_empty() {
			return Ok(None);
		}

		let ids = self
			.stores
			.keyword
			.doc_ids_by_parties(&filters.any_party, self.cfg.search.party_candidate_limit)
			.await?;

		tracing::debug!(parties = filters.any_party.len(), candidates = ids.len(), "Resolved party candidates.");

		Ok(Some(ids))
	}
}

/// Semantic query followed by the extracted keywords, space separated.
pub fn keyword_query(semantic: &str, keywords: &[String]) -> String {
	std::iter::once(semantic)
		.chain(keywords.iter().map(String::as_str))
		.map(str::trim)
		.filter(|part| !part.is_empty())
		.collect::<Vec<_>>()
		.join(" ")
}

fn empty_structured() -> SearchResponse {
	SearchResponse {
		intent: IntentKind::StructuredOnly,
		summary: "No matching contracts.".to_string(),
		answer: SearchAnswer::Structured { count: 0, contracts: Vec::new() },
	}
}

fn empty_hybrid(with_placement: bool) -> SearchResponse {
	SearchResponse {
		intent: IntentKind::Hybrid,
		summary: "No matching contracts.".to_string(),
		answer: SearchAnswer::Hybrid {
			hits: Vec::new(),
			context_order: with_placement.then(Vec::new),
		},
	}
}
