use uuid::Uuid;

use pact_chunking::ChunkingConfig;
use pact_domain::{Chunk, ChunkMetadata, ContractFields, text};

/// Splits document text into chunks, cleans each one and stamps it with the document metadata.
/// Chunks that are empty after cleaning are dropped. Every chunk gets a fresh id.
pub fn enrich_chunks(
	doc_id: Uuid,
	content: &str,
	fields: &ContractFields,
	cfg: &ChunkingConfig,
) -> Vec<Chunk> {
	let metadata = ChunkMetadata {
		doc_id,
		party_a: fields.party_a.clone(),
		party_b: fields.party_b.clone(),
		amount: fields.total_amount,
		contract_type: fields.contract_type.clone(),
		status: fields.status,
		sign_date: fields.sign_date,
		end_date: fields.end_date,
	};

	pact_chunking::split_text(content, cfg)
		.into_iter()
		.filter_map(|segment| {
			let content = text::clean_chunk_text(&segment.text);

			if content.is_empty() {
				return None;
			}

			Some(Chunk { chunk_id: Uuid::new_v4(), content, metadata: metadata.clone() })
		})
		.collect()
}

#[cfg(test)]
mod tests {
	use std::collections::HashSet;

	use super::*;
	use pact_domain::ContractStatus;

	fn fields() -> ContractFields {
		ContractFields {
			party_a: "甲方集团".to_string(),
			party_b: "乙方个人".to_string(),
			contract_type: "借款合同".to_string(),
			status: ContractStatus::Active,
			sign_date: None,
			end_date: None,
			total_amount: 8_000.0,
			summary: String::new(),
			keywords: Vec::new(),
		}
	}

	#[test]
	fn stamps_metadata_and_drops_blank_chunks() {
		let doc_id = Uuid::new_v4();
		let cfg = ChunkingConfig { min_chars: 1, max_chars: 12 };
		let content = "第一条 借款金额。\u{0007}\u{0008}甲甲甲甲甲甲。第二条 还款期限。";
		let chunks = enrich_chunks(doc_id, content, &fields(), &cfg);

		assert!(!chunks.is_empty());
		assert!(chunks.iter().all(|chunk| !chunk.content.is_empty()));
		assert!(chunks.iter().all(|chunk| !chunk.content.contains("甲甲甲")));
		assert!(chunks.iter().all(|chunk| chunk.metadata.doc_id == doc_id));
		assert!(chunks.iter().all(|chunk| chunk.metadata.amount == 8_000.0));

		let ids: HashSet<_> = chunks.iter().map(|chunk| chunk.chunk_id).collect();

		assert_eq!(ids.len(), chunks.len());
	}

	#[test]
	fn whitespace_only_text_yields_nothing() {
		let cfg = ChunkingConfig { min_chars: 1, max_chars: 50 };

		assert!(enrich_chunks(Uuid::new_v4(), " \n\t ", &fields(), &cfg).is_empty());
	}
}
