use uuid::Uuid;

use crate::{PactService, Result};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DedupDecision {
	Proceed,
	/// The file name is already ingested under `doc_id`.
	Duplicate { doc_id: Uuid },
}

impl PactService {
	/// File names are the dedup key. A hit is a skip, never an error.
	pub async fn check_duplicate(&self, file_name: &str) -> Result<DedupDecision> {
		match self.stores.contracts.find_by_file_name(file_name).await? {
			Some(record) => Ok(DedupDecision::Duplicate { doc_id: record.doc_id }),
			None => Ok(DedupDecision::Proceed),
		}
	}
}
