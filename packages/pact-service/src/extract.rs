//! Metadata extraction through the chat provider.

use serde_json::Value;
use time::OffsetDateTime;

use crate::{Error, PactService, Result};
use pact_domain::{ContractFields, RawMetadata, dates, text};

const EXTRACTION_PROMPT: &str = r#"You are a contract data-entry specialist. Extract the key structured fields from the contract text below.
Today is {current_date}. Use it to resolve relative periods such as "valid for one year".

Return one JSON object with exactly these fields:

1. "party_a": full name of party A (the buyer, client, lessor or employer).
2. "party_b": full name of party B (the supplier, contractor, lessee or employee).
3. "contract_type": prefer one of these standard categories so the value can be indexed:
   物资采购合同, 销售合同, 房屋租赁合同, 劳动合同, 劳务派遣合同, 保密协议,
   软件开发合同, 技术服务合同, 居间服务合同, 咨询服务合同, 运维服务合同,
   借款合同, 担保合同, 股权转让协议, 投融资协议,
   建设工程合同, 装修工程合同, 品牌加盟合同, 框架合作协议, 补充协议.
   If none fits, give the shortest common legal name for it, at most six characters (for example 赠与合同).
4. "sign_date": signing date as YYYY-MM-DD. Leave it empty when the text gives no date.
5. "end_date": expiry date as YYYY-MM-DD, derived from the signing or effective date plus the validity period.
   Leave it empty for permanent or open-ended contracts, or when no period is stated.
6. "total_amount": total contract value as a plain number in yuan (RMB).
   Convert 万元, 亿元 and foreign currencies to yuan. Use 0 when there is no fixed amount, such as for
   confidentiality or framework agreements. When several amounts appear, take the total or the cap.
7. "summary": one sentence of at most 100 characters naming both parties, the subject, the total amount and the expiry date.
8. "keywords": 3 to 5 core keywords for full-text search, such as product names, project sites or key clauses.

Contract text:
{content}

Output JSON only:"#;

/// Builds the single user message sent to the model. The content is cut to `prefix_chars`
/// characters first.
pub fn extraction_messages(content: &str, now: OffsetDateTime, prefix_chars: usize) -> Vec<Value> {
	let prompt = EXTRACTION_PROMPT
		.replace("{current_date}", &dates::format_date(now.date()))
		.replace("{content}", text::truncate_chars(content, prefix_chars));

	vec![serde_json::json!({ "role": "user", "content": prompt })]
}

/// Decodes the model reply, tolerating a Markdown code fence, and canonicalizes the fields.
pub fn decode_extraction(raw: &str, now: OffsetDateTime) -> Result<ContractFields> {
	let json = text::strip_code_fence(raw);
	let metadata: RawMetadata = serde_json::from_str(json).map_err(|err| {
		Error::ExtractionMalformed { message: format!("{err}; raw reply: {}", preview(raw)) }
	})?;

	Ok(metadata.canonicalize(now))
}

impl PactService {
	pub async fn extract_metadata(
		&self,
		content: &str,
		now: OffsetDateTime,
	) -> Result<ContractFields> {
		let messages = extraction_messages(content, now, self.cfg.ingest.extract_prefix_chars);
		let raw = self
			.providers
			.chat
			.complete(&self.cfg.providers.llm, &messages)
			.await
			.map_err(|err| Error::ExtractionFailed { message: err.to_string() })?;

		decode_extraction(&raw, now)
	}
}

fn preview(raw: &str) -> &str {
	text::truncate_chars(raw.trim(), 200)
}

#[cfg(test)]
mod tests {
	use time::macros::{date, datetime};

	use super::*;
	use pact_domain::ContractStatus;

	#[test]
	fn prompt_carries_date_and_truncated_content() {
		let content = "甲".repeat(50);
		let messages = extraction_messages(&content, datetime!(2025-03-09 08:00 UTC), 10);
		let prompt = messages[0]["content"].as_str().expect("Expected prompt text.");

		assert_eq!(messages.len(), 1);
		assert_eq!(messages[0]["role"], "user");
		assert!(prompt.contains("Today is 2025-03-09."));
		assert!(prompt.contains(&format!("Contract text:\n{}\n", "甲".repeat(10))));
		assert!(!prompt.contains(&"甲".repeat(11)));
	}

	#[test]
	fn decodes_fenced_reply() {
		let raw = "```json\n{\"party_a\": \"星辰科技\", \"party_b\": \"王五\", \"sign_date\": \"2022-01-01\", \"end_date\": \"2023-01-01\", \"contract_type\": \"劳动合同\", \"total_amount\": \"12万\", \"summary\": \"劳动合同\", \"keywords\": [\"劳动\"]}\n```";
		let fields =
			decode_extraction(raw, datetime!(2024-01-01 00:00 UTC)).expect("Failed to decode.");

		assert_eq!(fields.party_a, "星辰科技");
		assert_eq!(fields.total_amount, 120_000.0);
		assert_eq!(fields.end_date, Some(date!(2023 - 01 - 01)));
		assert_eq!(fields.status, ContractStatus::Expired);
	}

	#[test]
	fn prose_reply_is_malformed() {
		let err = decode_extraction("Sorry, I cannot read this contract.", OffsetDateTime::UNIX_EPOCH)
			.expect_err("Expected malformed extraction.");

		assert!(matches!(err, Error::ExtractionMalformed { .. }));
	}
}
