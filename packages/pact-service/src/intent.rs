//! Query intent classification through the chat provider.

use serde_json::Value;
use time::OffsetDateTime;

use crate::{PactService, Result};
use pact_domain::{Intent, dates, intent};

const INTENT_PROMPT: &str = r#"You are a contract search assistant. Today is {current_date}.
Analyze the user's query and return its filters as one JSON object.

Rules:
1. "intent":
   - "structured_only": the user only counts or lists contracts and needs no clause text.
     Examples: "张三签了多少份合同?", "列出所有2024年的合同", "金额大于10万的合同有哪些", "乙方是陈七的合同".
   - "hybrid": the user asks about the content of clauses.
     Examples: "2023年张三的服务器采购合同中关于验收的规定", "违约金一般怎么定", "不可抗力条款怎么处理".
     A clause question without any filter is still "hybrid" with empty filters.

2. "filters" is an object, never an array:
   - "any_party": an array of person or company names. Split names joined by 和, 与 or 及 into separate
     elements. "张三和腾讯签署的合同" gives ["张三", "腾讯"]. A single name is still an array: ["张三"].
   - "party_a" / "party_b": only when the query names the role explicitly, as in "张三作为甲方".
   - "contract_type": the contract category, such as 采购, 租赁 or 保密.
   - "date_range": {"start": "YYYY-MM-DD", "end": "YYYY-MM-DD"}. Fill only the bound the query gives.
   - "amount_range": {"min": number, "max": number} in yuan. "大于30000" gives {"min": 30000},
     "小于100000" gives {"max": 100000}, "30000到100000之间" gives {"min": 30000, "max": 100000}.
   - "status": "active" or "expired" when the query asks about contracts in force or already expired.
   - Without any filter return {}, not [].

3. "semantic_query": the query rewritten for vector search. Remove names, companies, dates and amounts
   already captured in filters. Keep the business question and clause content, in concise written form.
   "张三2023年签的服务器采购合同怎么退款" gives "服务器采购合同退款条款".
   "给我看看关于腾讯的那个合同里的违约责任" gives "违约责任条款".

4. "keywords": an array of keywords for BM25 full-text search.

Output examples:
{"intent": "structured_only", "filters": {"amount_range": {"min": 30000}}, "semantic_query": "", "keywords": ["金额", "合同"]}
{"intent": "hybrid", "filters": {"any_party": ["张三", "腾讯"], "date_range": {"start": "2023-01-01", "end": "2023-12-31"}}, "semantic_query": "服务器采购合同验收条款", "keywords": ["服务器", "采购", "验收"]}

Output JSON only."#;

/// System prompt with today's date, then the raw query as the user message.
pub fn intent_messages(query: &str, now: OffsetDateTime) -> Vec<Value> {
	let system = INTENT_PROMPT.replace("{current_date}", &dates::format_date(now.date()));

	vec![
		serde_json::json!({ "role": "system", "content": system }),
		serde_json::json!({ "role": "user", "content": query }),
	]
}

impl PactService {
	/// Provider failures propagate. A reply that cannot be decoded falls back to a hybrid intent
	/// over the raw query.
	pub async fn analyze_query(&self, query: &str, now: OffsetDateTime) -> Result<Intent> {
		let messages = intent_messages(query, now);
		let raw = self.providers.chat.complete(&self.cfg.providers.llm, &messages).await?;
		let (intent, err) = intent::decode_intent_or_fallback(&raw, query);

		if let Some(err) = err {
			tracing::warn!(error = %err.message, "Intent reply was not valid JSON. Falling back to hybrid search.");
		}

		tracing::debug!(kind = ?intent.kind, filters_empty = intent.filters.is_empty(), "Classified query intent.");

		Ok(intent)
	}
}
