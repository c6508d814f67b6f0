use serde::Serialize;
use time::Date;
use uuid::Uuid;

use crate::{dates, status::ContractStatus};

/// Document-level fields copied onto every chunk so both indexes can filter without a join.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct ChunkMetadata {
	pub doc_id: Uuid,
	pub party_a: String,
	pub party_b: String,
	pub amount: f64,
	pub contract_type: String,
	pub status: ContractStatus,
	#[serde(with = "dates::option")]
	pub sign_date: Option<Date>,
	#[serde(with = "dates::option")]
	pub end_date: Option<Date>,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct Chunk {
	pub chunk_id: Uuid,
	pub content: String,
	pub metadata: ChunkMetadata,
}
