use std::sync::atomic::Ordering;

use time::macros::datetime;

use super::{Harness, contract_text, harness, upload};
use pact_domain::ContractStatus;
use pact_service::DocumentOutcome;

async fn ingest_short_contract(h: &Harness) -> uuid::Uuid {
	*h.chat.extraction.lock().expect("extraction lock") = r#"{
		"party_a": "星河物业",
		"party_b": "赵六",
		"contract_type": "运维服务合同",
		"sign_date": "2024-02-01",
		"end_date": "2025-01-31",
		"total_amount": 50000,
		"summary": "星河物业委托赵六提供运维服务。",
		"keywords": ["运维"]
	}"#
	.to_string();

	let outcome = h
		.service
		.ingest_document(&upload("运维合同.txt", &contract_text("运维服务")), datetime!(2025-01-10 08:00 UTC))
		.await;

	match outcome {
		DocumentOutcome::Ingested { doc_id, .. } => doc_id,
		other => panic!("Expected an ingested outcome, got {other:?}."),
	}
}

#[tokio::test]
async fn sweep_expires_overdue_contracts_everywhere() {
	let h = harness();
	let doc_id = ingest_short_contract(&h).await;

	assert_eq!(
		h.service.expire_contracts(datetime!(2025-01-30 23:00 UTC)).await.expect("Sweep failed."),
		0
	);
	assert_eq!(
		h.service.expire_contracts(datetime!(2025-01-31 00:00:01 UTC)).await.expect("Sweep failed."),
		1
	);

	let record = h.contracts.by_file_name("运维合同.txt").expect("Expected a record.");

	assert_eq!(record.status(), ContractStatus::Expired);
	assert!(h.keyword.chunks_for(doc_id).iter().all(|chunk| chunk.metadata.status == ContractStatus::Expired));
	assert!(
		h.vector
			.points
			.lock()
			.expect("points lock")
			.iter()
			.all(|(chunk, _)| chunk.metadata.status == ContractStatus::Expired)
	);
	assert_eq!(
		h.service.expire_contracts(datetime!(2025-02-01 00:00 UTC)).await.expect("Sweep failed."),
		0
	);
}

#[tokio::test]
async fn index_mirror_failures_do_not_fail_the_sweep() {
	let h = harness();

	ingest_short_contract(&h).await;
	h.keyword.fail_mark_expired.store(true, Ordering::SeqCst);

	let flipped =
		h.service.expire_contracts(datetime!(2025-03-01 00:00 UTC)).await.expect("Sweep failed.");

	assert_eq!(flipped, 1);
	assert!(
		h.vector
			.points
			.lock()
			.expect("points lock")
			.iter()
			.all(|(chunk, _)| chunk.metadata.status == ContractStatus::Expired)
	);
}
