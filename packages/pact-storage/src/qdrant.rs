use std::{
	collections::{BTreeSet, HashMap},
	time::Duration,
};

use qdrant_client::{
	Qdrant,
	client::Payload,
	qdrant::{
		Condition, CreateCollectionBuilder, CreateFieldIndexCollection, DatetimeRange,
		DeletePointsBuilder, Distance, FieldType, Filter, PointId, PointStruct, Query,
		QueryPointsBuilder, Range, ScoredPoint, SetPayloadPointsBuilder, Timestamp,
		UpsertPointsBuilder, Value, Vector, VectorParamsBuilder, VectorsConfigBuilder,
		point_id::PointIdOptions, value::Kind,
	},
};
use time::{Date, OffsetDateTime, format_description::well_known::Rfc3339};
use uuid::Uuid;

use crate::{Error, Result};
use pact_domain::{Chunk, ChunkMetadata, ContractStatus, FilterSet, RetrievedItem, Source};

pub const DENSE_VECTOR_NAME: &str = "dense";

const PAYLOAD_INDEXES: [(&str, FieldType); 6] = [
	("doc_id", FieldType::Keyword),
	("contract_type", FieldType::Keyword),
	("contract_status", FieldType::Integer),
	("sign_date", FieldType::Datetime),
	("end_date", FieldType::Datetime),
	("amount", FieldType::Float),
];

pub struct QdrantStore {
	pub client: Qdrant,
	pub collection: String,
	pub vector_dim: u32,
}
impl QdrantStore {
	pub fn new(cfg: &pact_config::Qdrant) -> Result<Self> {
		let client = Qdrant::from_url(&cfg.url)
			.timeout(Duration::from_millis(cfg.timeout_ms))
			.build()?;

		Ok(Self { client, collection: cfg.collection.clone(), vector_dim: cfg.vector_dim })
	}

	/// Creates the chunk collection and its payload indexes when the collection is missing.
	pub async fn ensure_collection(&self) -> Result<()> {
		if self.client.collection_exists(self.collection.clone()).await? {
			return Ok(());
		}

		let mut vectors_config = VectorsConfigBuilder::default();

		vectors_config.add_named_vector_params(
			DENSE_VECTOR_NAME,
			VectorParamsBuilder::new(self.vector_dim.into(), Distance::Cosine),
		);

		self.client
			.create_collection(
				CreateCollectionBuilder::new(self.collection.clone()).vectors_config(vectors_config),
			)
			.await?;

		for (field_name, field_type) in PAYLOAD_INDEXES {
			self.client
				.create_field_index(CreateFieldIndexCollection {
					collection_name: self.collection.clone(),
					wait: Some(true),
					field_name: field_name.to_string(),
					field_type: Some(field_type as i32),
					field_index_params: None,
					ordering: None,
				})
				.await?;
		}

		tracing::info!(collection = %self.collection, "Created Qdrant collection.");

		Ok(())
	}

	pub async fn upsert_chunks(&self, chunks: &[Chunk], vectors: &[Vec<f32>]) -> Result<()> {
		if chunks.len() != vectors.len() {
			return Err(Error::InvalidArgument(format!(
				"Got {} vectors for {} chunks.",
				vectors.len(),
				chunks.len()
			)));
		}
		if chunks.is_empty() {
			return Ok(());
		}

		let mut points = Vec::with_capacity(chunks.len());

		for (chunk, vec) in chunks.iter().zip(vectors) {
			if vec.len() != self.vector_dim as usize {
				return Err(Error::InvalidArgument(format!(
					"Vector for chunk {} has dimension {}, expected {}.",
					chunk.chunk_id,
					vec.len(),
					self.vector_dim
				)));
			}

			let mut vectors = HashMap::new();

			vectors.insert(DENSE_VECTOR_NAME.to_string(), Vector::from(vec.clone()));
			points.push(PointStruct::new(chunk.chunk_id.to_string(), vectors, chunk_payload(chunk)?));
		}

		self.client
			.upsert_points(UpsertPointsBuilder::new(self.collection.clone(), points).wait(true))
			.await?;

		Ok(())
	}

	pub async fn delete_document(&self, doc_id: Uuid) -> Result<()> {
		self.client
			.delete_points(
				DeletePointsBuilder::new(self.collection.clone())
					.points(Filter::must([Condition::matches("doc_id", doc_id.to_string())]))
					.wait(true),
			)
			.await?;

		Ok(())
	}

	pub async fn search(
		&self,
		vector: &[f32],
		filters: &FilterSet,
		doc_ids: Option<&[Uuid]>,
		top_k: u32,
	) -> Result<Vec<RetrievedItem>> {
		let mut search = QueryPointsBuilder::new(self.collection.clone())
			.query(Query::new_nearest(vector.to_vec()))
			.using(DENSE_VECTOR_NAME)
			.with_payload(true)
			.limit(top_k as u64);

		if let Some(filter) = build_filter(filters, doc_ids)? {
			search = search.filter(filter);
		}

		let response = self.client.query(search).await?;

		Ok(response.result.iter().filter_map(item_from_point).collect())
	}

	/// Sets `contract_status` to expired on every chunk of the given documents.
	pub async fn mark_expired(&self, doc_ids: &[Uuid]) -> Result<()> {
		if doc_ids.is_empty() {
			return Ok(());
		}

		let mut payload = Payload::new();

		payload.insert("contract_status", serde_json::Value::from(ContractStatus::Expired.code()));

		let ids: Vec<String> = doc_ids.iter().map(Uuid::to_string).collect();

		self.client
			.set_payload(
				SetPayloadPointsBuilder::new(self.collection.clone(), payload)
					.points_selector(Filter::must([Condition::matches("doc_id", ids)]))
					.wait(true),
			)
			.await?;

		Ok(())
	}
}

pub fn chunk_payload(chunk: &Chunk) -> Result<Payload> {
	let meta = &chunk.metadata;
	let mut payload = Payload::new();

	payload.insert("doc_id", meta.doc_id.to_string());
	payload.insert("chunk_id", chunk.chunk_id.to_string());
	payload.insert("content", chunk.content.clone());
	payload.insert("party_a", meta.party_a.clone());
	payload.insert("party_b", meta.party_b.clone());
	payload.insert("amount", serde_json::Value::from(meta.amount));
	payload.insert("contract_type", meta.contract_type.clone());
	payload.insert("contract_status", serde_json::Value::from(meta.status.code()));

	if let Some(sign_date) = meta.sign_date {
		payload.insert("sign_date", format_date_time(sign_date)?);
	}
	if let Some(end_date) = meta.end_date {
		payload.insert("end_date", format_date_time(end_date)?);
	}

	Ok(payload)
}

/// Translates structured filters into a Qdrant filter. Kinds are ANDed and the party list is ORed
/// across both party fields. Returns `None` when nothing constrains the search.
pub fn build_filter(filters: &FilterSet, doc_ids: Option<&[Uuid]>) -> Result<Option<Filter>> {
	let mut must = Vec::new();

	if !filters.any_party.is_empty() {
		let should = filters
			.any_party
			.iter()
			.flat_map(|party| {
				[
					Condition::matches_text("party_a", party.as_str()),
					Condition::matches_text("party_b", party.as_str()),
				]
			})
			.collect::<Vec<_>>();

		must.push(Condition::from(Filter::should(should)));
	}
	if let Some(party_a) = &filters.party_a {
		must.push(Condition::matches_text("party_a", party_a.as_str()));
	}
	if let Some(party_b) = &filters.party_b {
		must.push(Condition::matches_text("party_b", party_b.as_str()));
	}
	if let Some(contract_type) = &filters.contract_type {
		must.push(Condition::matches("contract_type", contract_type.clone()));
	}
	if let Some(status) = filters.status {
		must.push(Condition::matches("contract_status", i64::from(status.code())));
	}
	if let Some(range) = &filters.date_range
		&& (range.start.is_some() || range.end.is_some())
	{
		let gte = range.start.map(date_timestamp);
		let lte = range.end.map(|end| Timestamp {
			seconds: date_timestamp(end).seconds + 86_399,
			nanos: 0,
		});

		must.push(Condition::datetime_range(
			"sign_date",
			DatetimeRange { lt: None, gt: None, gte, lte },
		));
	}
	if let Some(range) = &filters.amount_range
		&& (range.min.is_some() || range.max.is_some())
	{
		must.push(Condition::range(
			"amount",
			Range { gte: range.min, lte: range.max, ..Default::default() },
		));
	}
	if let Some(ids) = doc_ids {
		let ids: Vec<String> = ids.iter().map(Uuid::to_string).collect();

		must.push(Condition::matches("doc_id", ids));
	}

	if must.is_empty() {
		return Ok(None);
	}

	Ok(Some(Filter::must(must)))
}

fn item_from_point(point: &ScoredPoint) -> Option<RetrievedItem> {
	let chunk_id = point.id.as_ref().and_then(point_id_to_uuid)?;
	let payload = &point.payload;
	let doc_id = payload_string(payload, "doc_id").and_then(|id| Uuid::parse_str(&id).ok())?;
	let status = payload_i64(payload, "contract_status")
		.and_then(|code| i16::try_from(code).ok())
		.and_then(ContractStatus::from_code)
		.unwrap_or(ContractStatus::Active);

	Some(RetrievedItem {
		id: chunk_id.to_string(),
		content: payload_string(payload, "content").unwrap_or_default(),
		metadata: ChunkMetadata {
			doc_id,
			party_a: payload_string(payload, "party_a").unwrap_or_default(),
			party_b: payload_string(payload, "party_b").unwrap_or_default(),
			amount: payload_f64(payload, "amount").unwrap_or_default(),
			contract_type: payload_string(payload, "contract_type").unwrap_or_default(),
			status,
			sign_date: payload_date(payload, "sign_date"),
			end_date: payload_date(payload, "end_date"),
		},
		score: point.score,
		sources: BTreeSet::from([Source::Vector]),
	})
}

fn point_id_to_uuid(point_id: &PointId) -> Option<Uuid> {
	match &point_id.point_id_options {
		Some(PointIdOptions::Uuid(id)) => Uuid::parse_str(id).ok(),
		_ => None,
	}
}

fn payload_string(payload: &HashMap<String, Value>, key: &str) -> Option<String> {
	match &payload.get(key)?.kind {
		Some(Kind::StringValue(text)) => Some(text.to_string()),
		_ => None,
	}
}

fn payload_i64(payload: &HashMap<String, Value>, key: &str) -> Option<i64> {
	match &payload.get(key)?.kind {
		Some(Kind::IntegerValue(value)) => Some(*value),
		Some(Kind::DoubleValue(value)) if value.fract() == 0.0 => Some(*value as i64),
		_ => None,
	}
}

fn payload_f64(payload: &HashMap<String, Value>, key: &str) -> Option<f64> {
	match &payload.get(key)?.kind {
		Some(Kind::DoubleValue(value)) => Some(*value),
		Some(Kind::IntegerValue(value)) => Some(*value as f64),
		_ => None,
	}
}

fn payload_date(payload: &HashMap<String, Value>, key: &str) -> Option<Date> {
	let text = payload_string(payload, key)?;

	OffsetDateTime::parse(text.as_str(), &Rfc3339).ok().map(|ts| ts.date())
}

fn date_timestamp(date: Date) -> Timestamp {
	Timestamp { seconds: date.midnight().assume_utc().unix_timestamp(), nanos: 0 }
}

fn format_date_time(date: Date) -> Result<String> {
	date.midnight()
		.assume_utc()
		.format(&Rfc3339)
		.map_err(|_| Error::InvalidArgument(format!("Failed to format date {date}.")))
}
