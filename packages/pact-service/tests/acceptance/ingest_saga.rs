use std::sync::atomic::Ordering;

use time::OffsetDateTime;

use super::{contract_text, harness, upload};
use pact_domain::ContractStatus;
use pact_service::{DocumentOutcome, Error, SagaStage};

fn failed_stage(outcome: &DocumentOutcome) -> Option<SagaStage> {
	match outcome {
		DocumentOutcome::Failed { stage, .. } => Some(*stage),
		_ => None,
	}
}

#[tokio::test]
async fn ingests_document_into_every_store() {
	let h = harness();
	let report = h
		.service
		.ingest_batch(&[upload("采购合同.txt", &contract_text("服务器"))])
		.await
		.expect("Failed to ingest batch.");
	let doc_ids = report.doc_ids();

	assert_eq!(doc_ids.len(), 1);

	let record = h.contracts.by_file_name("采购合同.txt").expect("Expected a contract record.");

	assert_eq!(record.doc_id, doc_ids[0]);
	assert_eq!(record.party_a, "腾讯科技有限公司");
	assert_eq!(record.total_amount, 120_000.0);
	assert_eq!(record.status(), ContractStatus::Active);

	let chunks = h.keyword.chunks_for(record.doc_id);

	assert!(!chunks.is_empty());
	assert_eq!(h.vector.len(), chunks.len());
	assert!(chunks.iter().all(|chunk| chunk.metadata.contract_type == "物资采购合同"));
}

#[tokio::test]
async fn second_upload_of_a_file_name_is_skipped() {
	let h = harness();
	let file = upload("租赁合同.txt", &contract_text("办公场地"));

	h.service.ingest_batch(std::slice::from_ref(&file)).await.expect("Failed to ingest batch.");

	let chunks_before = h.keyword.len();
	let report =
		h.service.ingest_batch(std::slice::from_ref(&file)).await.expect("Failed to ingest batch.");

	assert!(report.doc_ids().is_empty());
	assert_eq!(report.skipped_files(), vec!["租赁合同.txt".to_string()]);
	assert!(report.failed_files().is_empty());
	assert_eq!(h.contracts.len(), 1);
	assert_eq!(h.keyword.len(), chunks_before);
	assert_eq!(h.chat.calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn vector_failure_removes_record_and_keyword_entries() {
	let h = harness();

	h.vector.fail_upsert.store(true, Ordering::SeqCst);

	let outcome = h
		.service
		.ingest_document(&upload("a.txt", &contract_text("交换机")), OffsetDateTime::now_utc())
		.await;

	assert_eq!(failed_stage(&outcome), Some(SagaStage::IndexVector));
	assert_eq!(h.contracts.len(), 0);
	assert_eq!(h.keyword.len(), 0);
	assert_eq!(h.vector.len(), 0);
}

#[tokio::test]
async fn embedding_failure_is_a_vector_stage_failure() {
	let h = harness();

	h.embedding.fail.store(true, Ordering::SeqCst);

	let outcome = h
		.service
		.ingest_document(&upload("a.txt", &contract_text("路由器")), OffsetDateTime::now_utc())
		.await;

	assert_eq!(failed_stage(&outcome), Some(SagaStage::IndexVector));
	assert_eq!(h.contracts.len(), 0);
	assert_eq!(h.keyword.len(), 0);
}

#[tokio::test]
async fn keyword_failure_removes_record_and_partial_entries() {
	let h = harness();

	h.keyword.fail_index.store(true, Ordering::SeqCst);

	let outcome = h
		.service
		.ingest_document(&upload("a.txt", &contract_text("存储设备")), OffsetDateTime::now_utc())
		.await;

	assert_eq!(failed_stage(&outcome), Some(SagaStage::IndexKeyword));
	assert_eq!(h.contracts.len(), 0);
	assert_eq!(h.keyword.len(), 0);
	assert_eq!(h.vector.len(), 0);
}

#[tokio::test]
async fn document_without_usable_chunks_is_compensated() {
	let h = harness();
	let outcome = h
		.service
		.ingest_document(&upload("blank-form.txt", "□□□□□□ □□□□"), OffsetDateTime::now_utc())
		.await;

	assert_eq!(failed_stage(&outcome), Some(SagaStage::Chunk));
	assert_eq!(h.contracts.len(), 0);
	assert_eq!(h.keyword.len(), 0);
}

#[tokio::test]
async fn blank_upload_fails_before_extraction() {
	let h = harness();
	let outcome = h.service.ingest_document(&upload("empty.txt", " \n "), OffsetDateTime::now_utc()).await;

	assert_eq!(failed_stage(&outcome), Some(SagaStage::Extract));
	assert_eq!(h.chat.calls.load(Ordering::SeqCst), 0);
	assert_eq!(h.contracts.len(), 0);
}

#[tokio::test]
async fn malformed_extraction_fails_the_document_only() {
	let h = harness();
	let report = h
		.service
		.ingest_batch(&[
			upload("good.txt", &contract_text("服务器")),
			upload("broken.txt", "BROKEN 第一条 本合同无法识别。"),
		])
		.await
		.expect("Failed to ingest batch.");

	assert_eq!(report.doc_ids().len(), 1);
	assert_eq!(report.failed_files(), vec!["broken.txt".to_string()]);
	assert!(h.contracts.by_file_name("broken.txt").is_none());

	match &report.outcomes[1] {
		DocumentOutcome::Failed { stage, error, .. } => {
			assert_eq!(*stage, SagaStage::Extract);
			assert!(error.contains("malformed"), "unexpected error: {error}");
		},
		other => panic!("Expected a failed outcome, got {other:?}."),
	}
}

#[tokio::test]
async fn batch_fails_when_every_document_fails() {
	let h = harness();

	h.keyword.fail_index.store(true, Ordering::SeqCst);

	let err = h
		.service
		.ingest_batch(&[upload("a.txt", &contract_text("甲")), upload("b.txt", &contract_text("乙"))])
		.await
		.expect_err("Expected the batch to fail.");

	match err {
		Error::AllDocumentsFailed { failed } =>
			assert_eq!(failed, vec!["a.txt".to_string(), "b.txt".to_string()]),
		other => panic!("Unexpected error: {other:?}."),
	}
}

#[tokio::test]
async fn empty_batch_is_rejected() {
	let h = harness();

	assert!(matches!(h.service.ingest_batch(&[]).await, Err(Error::InvalidRequest { .. })));
}

#[tokio::test]
async fn outcomes_follow_upload_order() {
	let h = harness();
	let files: Vec<_> =
		(0..6).map(|i| upload(&format!("contract-{i}.txt"), &contract_text(&format!("设备{i}")))).collect();
	let report = h.service.ingest_batch(&files).await.expect("Failed to ingest batch.");
	let names: Vec<&str> = report.outcomes.iter().map(DocumentOutcome::file_name).collect();

	assert_eq!(names, files.iter().map(|file| file.file_name.as_str()).collect::<Vec<_>>());

	for (doc_id, file) in report.doc_ids().iter().zip(&files) {
		let record = h.contracts.by_file_name(&file.file_name).expect("Expected a record.");

		assert_eq!(record.doc_id, *doc_id);
	}
}

#[tokio::test]
async fn failed_rollback_step_does_not_stop_later_compensations() {
	let h = harness();

	h.service
		.ingest_batch(&[upload("existing.txt", &contract_text("路由器"))])
		.await
		.expect("Failed to ingest batch.");
	h.vector.fail_upsert.store(true, Ordering::SeqCst);
	h.contracts.fail_delete.store(true, Ordering::SeqCst);

	let report = h
		.service
		.ingest_batch(&[
			upload("a.txt", &contract_text("交换机")),
			upload("existing.txt", &contract_text("路由器")),
		])
		.await
		.expect("Failed to ingest batch.");

	match &report.outcomes[0] {
		DocumentOutcome::Failed { stage, error, .. } => {
			assert_eq!(*stage, SagaStage::IndexVector);
			assert!(error.contains("vector upsert"), "unexpected error: {error}");
		},
		other => panic!("Expected a failed outcome, got {other:?}."),
	}

	assert_eq!(report.skipped_files(), vec!["existing.txt".to_string()]);

	// The record delete failed and is left behind; keyword cleanup still ran.
	let orphan = h.contracts.by_file_name("a.txt").expect("Expected the undeleted record.");

	assert!(h.keyword.chunks_for(orphan.doc_id).is_empty());
}

#[tokio::test]
async fn concurrent_uploads_of_one_file_name_ingest_once() {
	let h = harness();

	h.contracts.blind_lookup.store(true, Ordering::SeqCst);

	let file = upload("重复合同.txt", &contract_text("服务器"));
	let report =
		h.service.ingest_batch(&[file.clone(), file]).await.expect("Failed to ingest batch.");
	let doc_ids = report.doc_ids();

	assert_eq!(doc_ids.len(), 1);
	assert_eq!(report.skipped_files(), vec!["重复合同.txt".to_string()]);
	assert!(report.failed_files().is_empty());
	assert_eq!(h.contracts.len(), 1);
	assert_eq!(h.keyword.len(), h.keyword.chunks_for(doc_ids[0]).len());
	assert!(report.outcomes.iter().any(|outcome| matches!(
		outcome,
		DocumentOutcome::Skipped { existing_doc_id: None, .. }
	)));
}

#[tokio::test]
async fn part_without_file_name_fails_alone() {
	let h = harness();
	let report = h
		.service
		.ingest_batch(&[upload("named.txt", &contract_text("服务器")), upload(" ", &contract_text("网关"))])
		.await
		.expect("Failed to ingest batch.");

	assert_eq!(report.doc_ids().len(), 1);
	assert_eq!(failed_stage(&report.outcomes[1]), Some(SagaStage::Dedup));
	assert_eq!(h.contracts.len(), 1);
	assert_eq!(h.chat.calls.load(Ordering::SeqCst), 1);
}
