use std::sync::atomic::Ordering;

use super::{Harness, contract_text, harness, harness_with, test_config, upload};
use pact_domain::{IntentKind, Source};
use pact_service::{Error, SearchAnswer, SearchRequest};

fn request(query: &str) -> SearchRequest {
	SearchRequest { query: query.to_string(), placement: false }
}

async fn ingest_pair(h: &Harness) {
	h.service
		.ingest_batch(&[upload("服务器采购.txt", &contract_text("服务器"))])
		.await
		.expect("Failed to ingest first contract.");

	*h.chat.extraction.lock().expect("extraction lock") = r#"{
		"party_a": "阿里巴巴集团",
		"party_b": "李四",
		"contract_type": "房屋租赁合同",
		"sign_date": "2023-06-01",
		"end_date": "2099-05-31",
		"total_amount": 36000,
		"summary": "阿里巴巴向李四租赁办公室。",
		"keywords": ["租赁", "押金"]
	}"#
	.to_string();

	h.service
		.ingest_batch(&[upload("办公室租赁.txt", &contract_text("办公室"))])
		.await
		.expect("Failed to ingest second contract.");
}

#[tokio::test]
async fn structured_path_lists_contracts_for_a_party() {
	let h = harness();

	ingest_pair(&h).await;
	h.chat.set_intent(r#"{"intent": "structured_only", "filters": {"any_party": ["张三"]}}"#);

	let response = h.service.search(request("张三签了多少份合同?")).await.expect("Search failed.");

	assert_eq!(response.intent, IntentKind::StructuredOnly);

	match response.answer {
		SearchAnswer::Structured { count, contracts } => {
			assert_eq!(count, 1);
			assert_eq!(contracts[0].file_name, "服务器采购.txt");
			assert_eq!(contracts[0].party_b, "张三");
		},
		other => panic!("Expected a structured answer, got {other:?}."),
	}
	assert_eq!(response.summary, "Found 1 matching contracts.");
}

#[tokio::test]
async fn structured_path_with_unknown_party_is_empty() {
	let h = harness();

	ingest_pair(&h).await;
	h.chat.set_intent(r#"{"intent": "structured_only", "filters": {"any_party": ["王五"]}}"#);

	let response = h.service.search(request("王五的合同")).await.expect("Search failed.");

	assert_eq!(response.summary, "No matching contracts.");
	assert!(matches!(response.answer, SearchAnswer::Structured { count: 0, .. }));
}

#[tokio::test]
async fn structured_path_without_party_filters_relationally() {
	let h = harness();

	ingest_pair(&h).await;
	h.chat.set_intent(r#"{"intent": "structured_only", "filters": {"contract_type": "房屋租赁合同"}}"#);

	let response = h.service.search(request("列出所有租赁合同")).await.expect("Search failed.");

	match response.answer {
		SearchAnswer::Structured { count, contracts } => {
			assert_eq!(count, 1);
			assert_eq!(contracts[0].party_a, "阿里巴巴集团");
		},
		other => panic!("Expected a structured answer, got {other:?}."),
	}
}

#[tokio::test]
async fn hybrid_path_fuses_vector_and_keyword_hits() {
	let h = harness();

	ingest_pair(&h).await;
	h.chat.set_intent(
		r#"{"intent": "hybrid", "filters": {}, "semantic_query": "验收条款", "keywords": ["验收"]}"#,
	);

	let response = h.service.search(request("验收怎么规定的")).await.expect("Search failed.");

	assert_eq!(response.intent, IntentKind::Hybrid);

	let SearchAnswer::Hybrid { hits, context_order } = response.answer else {
		panic!("Expected a hybrid answer.");
	};

	assert!(!hits.is_empty());
	assert!(hits.len() <= 10);
	assert!(context_order.is_none());
	assert!(hits.iter().any(|hit| hit.sources.contains(&Source::Keyword)));
	assert!(hits.iter().any(|hit| hit.sources.len() == 2 && hit.content.contains("验收")));

	for pair in hits.windows(2) {
		assert!(pair[0].score >= pair[1].score);
	}
	assert_eq!(response.summary, format!("Fused {} results.", hits.len()));
}

#[tokio::test]
async fn placement_orders_context_from_both_ends() {
	let h = harness();

	ingest_pair(&h).await;
	h.chat.set_intent(r#"{"intent": "hybrid", "semantic_query": "违约金", "keywords": ["违约金"]}"#);

	let req = SearchRequest { query: "违约金怎么定".to_string(), placement: true };
	let response = h.service.search(req).await.expect("Search failed.");
	let SearchAnswer::Hybrid { hits, context_order } = response.answer else {
		panic!("Expected a hybrid answer.");
	};
	let order = context_order.expect("Expected a context order.");

	assert_eq!(order.len(), hits.len());
	assert_eq!(order.first(), hits.first().map(|hit| &hit.chunk_id));

	if hits.len() > 1 {
		assert_eq!(order.last(), Some(&hits[1].chunk_id));
	}
}

#[tokio::test]
async fn hybrid_path_hides_index_entries_without_a_record() {
	let h = harness();

	ingest_pair(&h).await;

	let orphan = h.contracts.by_file_name("服务器采购.txt").expect("Expected a record.").doc_id;
	let kept = h.contracts.by_file_name("办公室租赁.txt").expect("Expected a record.").doc_id;

	// Record and keyword entries are gone while vector points survive, as after a vector-stage
	// failure whose vector cleanup also failed.
	h.contracts.records.lock().expect("records lock").remove(&orphan);
	h.keyword.chunks.lock().expect("chunks lock").retain(|chunk| chunk.metadata.doc_id != orphan);
	h.chat.set_intent(r#"{"intent": "hybrid", "semantic_query": "验收条款", "keywords": ["验收"]}"#);

	let response = h.service.search(request("验收怎么规定的")).await.expect("Search failed.");
	let SearchAnswer::Hybrid { hits, .. } = response.answer else {
		panic!("Expected a hybrid answer.");
	};

	assert!(!hits.is_empty());
	assert!(hits.iter().all(|hit| hit.doc_id != orphan));
	assert!(hits.iter().any(|hit| hit.doc_id == kept));
}

#[tokio::test]
async fn keyword_failure_aborts_hybrid_query() {
	let h = harness();

	ingest_pair(&h).await;
	h.keyword.fail_search.store(true, Ordering::SeqCst);
	h.chat.set_intent(r#"{"intent": "hybrid", "semantic_query": "验收条款"}"#);

	let err = h.service.search(request("验收怎么规定的")).await.expect_err("Expected failure.");

	assert!(matches!(err, Error::Keyword { .. }));
}

#[tokio::test]
async fn vector_failure_aborts_hybrid_query() {
	let h = harness();

	ingest_pair(&h).await;
	h.vector.fail_search.store(true, Ordering::SeqCst);
	h.chat.set_intent(r#"{"intent": "hybrid", "semantic_query": "验收条款"}"#);

	assert!(h.service.search(request("验收怎么规定的")).await.is_err());
}

#[tokio::test]
async fn undecodable_intent_falls_back_to_hybrid_search() {
	let h = harness();

	ingest_pair(&h).await;
	h.chat.set_intent("Sorry, I cannot help with that.");

	let response = h.service.search(request("违约金")).await.expect("Search failed.");

	assert_eq!(response.intent, IntentKind::Hybrid);
	assert_eq!(h.vector.search_calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn chained_party_prefilter_short_circuits_without_candidates() {
	let mut cfg = test_config();

	cfg.search.chain_party_prefilter = true;

	let h = harness_with(cfg);

	ingest_pair(&h).await;
	h.chat.set_intent(
		r#"{"intent": "hybrid", "filters": {"any_party": ["不存在的公司"]}, "semantic_query": "验收"}"#,
	);

	let response = h.service.search(request("不存在的公司的验收条款")).await.expect("Search failed.");

	assert!(matches!(response.answer, SearchAnswer::Hybrid { ref hits, .. } if hits.is_empty()));
	assert_eq!(h.vector.search_calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn chained_party_prefilter_restricts_hits_to_candidates() {
	let mut cfg = test_config();

	cfg.search.chain_party_prefilter = true;

	let h = harness_with(cfg);

	ingest_pair(&h).await;
	h.chat.set_intent(
		r#"{"intent": "hybrid", "filters": {"any_party": ["李四"]}, "semantic_query": "验收", "keywords": ["违约金"]}"#,
	);

	let response = h.service.search(request("李四合同的验收条款")).await.expect("Search failed.");
	let SearchAnswer::Hybrid { hits, .. } = response.answer else {
		panic!("Expected a hybrid answer.");
	};
	let record = h.contracts.by_file_name("办公室租赁.txt").expect("Expected a record.");

	assert!(!hits.is_empty());
	assert!(hits.iter().all(|hit| hit.doc_id == record.doc_id));
}

#[tokio::test]
async fn blank_query_is_rejected() {
	let h = harness();

	assert!(matches!(h.service.search(request("  ")).await, Err(Error::InvalidRequest { .. })));
	assert_eq!(h.chat.calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn chat_failure_propagates_from_intent_analysis() {
	let h = harness();

	h.chat.fail.store(true, Ordering::SeqCst);

	assert!(matches!(h.service.search(request("违约金")).await, Err(Error::Provider { .. })));
}
