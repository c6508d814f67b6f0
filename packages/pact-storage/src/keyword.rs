//! Chunk-level full-text index on Elasticsearch, spoken to over its REST API.

use std::{collections::BTreeSet, time::Duration};

use reqwest::{Client, Method, RequestBuilder, Response, header::CONTENT_TYPE};
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use time::Date;
use uuid::Uuid;

use crate::{Error, Result};
use pact_domain::{
	Chunk, ChunkMetadata, ContractStatus, FilterSet, RetrievedItem, Source, dates,
};

#[derive(Debug, Serialize, Deserialize)]
struct KeywordDoc {
	doc_id: Uuid,
	chunk_id: Uuid,
	#[serde(default)]
	content: String,
	#[serde(default)]
	keywords: Vec<String>,
	#[serde(default)]
	party_a: String,
	#[serde(default)]
	party_b: String,
	#[serde(default, with = "dates::option", skip_serializing_if = "Option::is_none")]
	sign_date: Option<Date>,
	#[serde(default, with = "dates::option", skip_serializing_if = "Option::is_none")]
	end_date: Option<Date>,
	#[serde(default)]
	amount: f64,
	#[serde(default)]
	contract_type: String,
	#[serde(default = "active_code")]
	contract_status: i16,
}
impl KeywordDoc {
	fn from_chunk(chunk: &Chunk, keywords: &[String]) -> Self {
		let meta = &chunk.metadata;

		Self {
			doc_id: meta.doc_id,
			chunk_id: chunk.chunk_id,
			content: chunk.content.clone(),
			keywords: keywords.to_vec(),
			party_a: meta.party_a.clone(),
			party_b: meta.party_b.clone(),
			sign_date: meta.sign_date,
			end_date: meta.end_date,
			amount: meta.amount,
			contract_type: meta.contract_type.clone(),
			contract_status: meta.status.code(),
		}
	}

	fn into_item(self, score: f32) -> RetrievedItem {
		RetrievedItem {
			id: self.chunk_id.to_string(),
			content: self.content,
			metadata: ChunkMetadata {
				doc_id: self.doc_id,
				party_a: self.party_a,
				party_b: self.party_b,
				amount: self.amount,
				contract_type: self.contract_type,
				status: ContractStatus::from_code(self.contract_status)
					.unwrap_or(ContractStatus::Active),
				sign_date: self.sign_date,
				end_date: self.end_date,
			},
			score,
			sources: BTreeSet::from([Source::Keyword]),
		}
	}
}

pub struct KeywordStore {
	client: Client,
	base_url: String,
	pub index: String,
	content_analyzer: String,
	search_analyzer: String,
	credentials: Option<(String, String)>,
}
impl KeywordStore {
	pub fn new(cfg: &pact_config::Keyword) -> Result<Self> {
		let client = Client::builder().timeout(Duration::from_millis(cfg.timeout_ms)).build()?;
		let credentials = match (&cfg.username, &cfg.password) {
			(Some(username), Some(password)) => Some((username.clone(), password.clone())),
			_ => None,
		};

		Ok(Self {
			client,
			base_url: cfg.url.clone(),
			index: cfg.index.clone(),
			content_analyzer: cfg.content_analyzer.clone(),
			search_analyzer: cfg.search_analyzer.clone(),
			credentials,
		})
	}

	/// Creates the index with the chunk mapping unless it already exists.
	pub async fn ensure_index(&self) -> Result<()> {
		let res = self.request(Method::HEAD, &self.index).send().await?;

		if res.status().is_success() {
			return Ok(());
		}

		let body = index_mapping(&self.content_analyzer, &self.search_analyzer);
		let res = self.request(Method::PUT, &self.index).json(&body).send().await?;

		read_json(res, "Create keyword index").await?;
		tracing::info!(index = %self.index, "Created keyword index.");

		Ok(())
	}

	/// Writes one index document per chunk, keyed by chunk id, and refreshes before returning.
	pub async fn index_chunks(&self, chunks: &[Chunk], keywords: &[String]) -> Result<()> {
		if chunks.is_empty() {
			return Ok(());
		}

		let body = bulk_body(&self.index, chunks, keywords)?;
		let res = self
			.request(Method::POST, "_bulk?refresh=true")
			.header(CONTENT_TYPE, "application/x-ndjson")
			.body(body)
			.send()
			.await?;
		let json = read_json(res, "Bulk index").await?;

		if json.get("errors").and_then(Value::as_bool).unwrap_or(false) {
			return Err(Error::Keyword { message: first_bulk_error(&json) });
		}

		Ok(())
	}

	pub async fn delete_document(&self, doc_id: Uuid) -> Result<u64> {
		let body = json!({ "query": { "term": { "doc_id": doc_id.to_string() } } });
		let path = format!("{}/_delete_by_query?refresh=true&conflicts=proceed", self.index);
		let res = self.request(Method::POST, &path).json(&body).send().await?;
		let json = read_json(res, "Delete by query").await?;

		Ok(json.get("deleted").and_then(Value::as_u64).unwrap_or(0))
	}

	/// Resolves documents whose party A or party B contains any of `parties`, one id per document.
	pub async fn doc_ids_by_parties(&self, parties: &[String], limit: u32) -> Result<Vec<Uuid>> {
		if parties.is_empty() {
			return Ok(Vec::new());
		}

		let body = party_lookup_body(parties, limit);
		let res =
			self.request(Method::POST, &format!("{}/_search", self.index)).json(&body).send().await?;
		let json = read_json(res, "Party lookup").await?;
		let mut ids = Vec::new();

		for hit in hits(&json) {
			let Some(doc_id) = hit
				.pointer("/_source/doc_id")
				.and_then(Value::as_str)
				.and_then(|raw| Uuid::parse_str(raw).ok())
			else {
				continue;
			};

			if !ids.contains(&doc_id) {
				ids.push(doc_id);
			}
		}

		Ok(ids)
	}

	pub async fn search(
		&self,
		query: &str,
		filters: &FilterSet,
		doc_ids: Option<&[Uuid]>,
		top_k: u32,
	) -> Result<Vec<RetrievedItem>> {
		let body = search_body(query, filters, doc_ids, top_k);
		let res =
			self.request(Method::POST, &format!("{}/_search", self.index)).json(&body).send().await?;
		let json = read_json(res, "Keyword search").await?;

		Ok(parse_hits(&json))
	}

	/// Sets `contract_status` to expired on every chunk of the given documents.
	pub async fn mark_expired(&self, doc_ids: &[Uuid]) -> Result<u64> {
		if doc_ids.is_empty() {
			return Ok(0);
		}

		let ids: Vec<String> = doc_ids.iter().map(Uuid::to_string).collect();
		let body = json!({
			"script": {
				"source": "ctx._source.contract_status = params.status",
				"lang": "painless",
				"params": { "status": ContractStatus::Expired.code() },
			},
			"query": { "terms": { "doc_id": ids } },
		});
		let path = format!("{}/_update_by_query?refresh=true&conflicts=proceed", self.index);
		let res = self.request(Method::POST, &path).json(&body).send().await?;
		let json = read_json(res, "Update by query").await?;

		Ok(json.get("updated").and_then(Value::as_u64).unwrap_or(0))
	}

	fn request(&self, method: Method, path: &str) -> RequestBuilder {
		let builder = self.client.request(method, format!("{}/{path}", self.base_url));

		match &self.credentials {
			Some((username, password)) => builder.basic_auth(username, Some(password)),
			None => builder,
		}
	}
}

fn active_code() -> i16 {
	ContractStatus::Active.code()
}

async fn read_json(res: Response, action: &str) -> Result<Value> {
	let status = res.status();

	if !status.is_success() {
		let body = res.text().await.unwrap_or_default();

		return Err(Error::Keyword { message: format!("{action} failed with {status}: {body}") });
	}

	Ok(res.json().await?)
}

fn index_mapping(content_analyzer: &str, search_analyzer: &str) -> Value {
	let party = json!({
		"type": "text",
		"analyzer": content_analyzer,
		"search_analyzer": search_analyzer,
		"fields": { "keyword": { "type": "keyword" } },
	});

	json!({
		"settings": { "number_of_shards": 1, "number_of_replicas": 0 },
		"mappings": {
			"properties": {
				"doc_id": { "type": "keyword" },
				"chunk_id": { "type": "keyword" },
				"content": {
					"type": "text",
					"analyzer": content_analyzer,
					"search_analyzer": search_analyzer,
				},
				"keywords": { "type": "keyword" },
				"party_a": party,
				"party_b": party,
				"sign_date": { "type": "date", "format": "yyyy-MM-dd" },
				"end_date": { "type": "date", "format": "yyyy-MM-dd" },
				"amount": { "type": "double" },
				"contract_type": { "type": "keyword" },
				"contract_status": { "type": "short" },
			},
		},
	})
}

fn bulk_body(index: &str, chunks: &[Chunk], keywords: &[String]) -> Result<String> {
	let mut body = String::new();

	for chunk in chunks {
		let action = json!({ "index": { "_index": index, "_id": chunk.chunk_id.to_string() } });
		let doc = serde_json::to_string(&KeywordDoc::from_chunk(chunk, keywords))
			.map_err(|err| Error::Keyword { message: err.to_string() })?;

		body.push_str(&action.to_string());
		body.push('\n');
		body.push_str(&doc);
		body.push('\n');
	}

	Ok(body)
}

fn first_bulk_error(json: &Value) -> String {
	let items = json.get("items").and_then(Value::as_array).into_iter().flatten();

	for item in items {
		if let Some(error) = item.pointer("/index/error") {
			let reason = error.get("reason").and_then(Value::as_str).unwrap_or("unknown reason");

			return format!("Bulk index rejected a chunk: {reason}.");
		}
	}

	"Bulk index reported errors.".to_string()
}

fn party_clause(parties: &[String]) -> Value {
	let should: Vec<Value> = parties
		.iter()
		.flat_map(|party| {
			[
				json!({ "match_phrase": { "party_a": party } }),
				json!({ "match_phrase": { "party_b": party } }),
			]
		})
		.collect();

	json!({ "bool": { "should": should, "minimum_should_match": 1 } })
}

fn party_lookup_body(parties: &[String], limit: u32) -> Value {
	json!({
		"size": limit,
		"_source": ["doc_id"],
		"query": party_clause(parties),
		"collapse": { "field": "doc_id" },
	})
}

/// Translates structured filters into Elasticsearch filter clauses. Every clause must hold.
fn filter_clauses(filters: &FilterSet, doc_ids: Option<&[Uuid]>) -> Vec<Value> {
	let mut clauses = Vec::new();

	if !filters.any_party.is_empty() {
		clauses.push(party_clause(&filters.any_party));
	}
	if let Some(party_a) = &filters.party_a {
		clauses.push(json!({ "match_phrase": { "party_a": party_a } }));
	}
	if let Some(party_b) = &filters.party_b {
		clauses.push(json!({ "match_phrase": { "party_b": party_b } }));
	}
	if let Some(contract_type) = &filters.contract_type {
		clauses.push(json!({ "term": { "contract_type": contract_type } }));
	}
	if let Some(status) = filters.status {
		clauses.push(json!({ "term": { "contract_status": status.code() } }));
	}
	if let Some(range) = &filters.date_range {
		let mut bounds = serde_json::Map::new();

		if let Some(start) = range.start {
			bounds.insert("gte".to_string(), Value::from(dates::format_date(start)));
		}
		if let Some(end) = range.end {
			bounds.insert("lte".to_string(), Value::from(dates::format_date(end)));
		}
		if !bounds.is_empty() {
			clauses.push(json!({ "range": { "sign_date": bounds } }));
		}
	}
	if let Some(range) = &filters.amount_range {
		let mut bounds = serde_json::Map::new();

		if let Some(min) = range.min {
			bounds.insert("gte".to_string(), Value::from(min));
		}
		if let Some(max) = range.max {
			bounds.insert("lte".to_string(), Value::from(max));
		}
		if !bounds.is_empty() {
			clauses.push(json!({ "range": { "amount": bounds } }));
		}
	}
	if let Some(ids) = doc_ids {
		let ids: Vec<String> = ids.iter().map(Uuid::to_string).collect();

		clauses.push(json!({ "terms": { "doc_id": ids } }));
	}

	clauses
}

fn search_body(query: &str, filters: &FilterSet, doc_ids: Option<&[Uuid]>, top_k: u32) -> Value {
	let must = if query.trim().is_empty() {
		json!({ "match_all": {} })
	} else {
		json!({ "match": { "content": query } })
	};

	json!({
		"size": top_k,
		"query": {
			"bool": {
				"must": [must],
				"filter": filter_clauses(filters, doc_ids),
			},
		},
	})
}

fn hits(json: &Value) -> impl Iterator<Item = &Value> {
	json.pointer("/hits/hits").and_then(Value::as_array).into_iter().flatten()
}

fn parse_hits(json: &Value) -> Vec<RetrievedItem> {
	hits(json)
		.filter_map(|hit| {
			let source = hit.get("_source")?;
			let doc = KeywordDoc::deserialize(source).ok()?;
			let score = hit.get("_score").and_then(Value::as_f64).unwrap_or(0.0) as f32;

			Some(doc.into_item(score))
		})
		.collect()
}
