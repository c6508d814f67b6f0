use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::{contract::null_as_default, filter::FilterSet};

static EMPTY_FILTER_ARRAY: LazyLock<Option<Regex>> =
	LazyLock::new(|| Regex::new(r#""filters"\s*:\s*\[\s*\]"#).ok());

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum IntentKind {
	/// Counting or listing contracts; answered from structured fields alone.
	StructuredOnly,
	/// Needs clause-level content; answered by vector and keyword search.
	Hybrid,
}
impl IntentKind {
	/// `structured_only` is the only label with its own path. Missing, unknown and
	/// `semantic_only` labels route to hybrid search.
	pub fn from_label(label: Option<&str>) -> Self {
		match label.map(str::trim) {
			Some(label) if label.eq_ignore_ascii_case("structured_only") => Self::StructuredOnly,
			_ => Self::Hybrid,
		}
	}
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct Intent {
	pub kind: IntentKind,
	pub filters: FilterSet,
	pub semantic_query: String,
	pub keywords: Vec<String>,
}
impl Intent {
	pub fn fallback(query: &str) -> Self {
		Self {
			kind: IntentKind::Hybrid,
			filters: FilterSet::default(),
			semantic_query: query.to_string(),
			keywords: Vec::new(),
		}
	}
}

#[derive(Debug)]
pub struct IntentDecodeError {
	pub message: String,
}

#[derive(Deserialize)]
struct WireIntent {
	#[serde(default)]
	intent: Option<String>,
	#[serde(default, deserialize_with = "null_as_default")]
	filters: FilterSet,
	#[serde(default, deserialize_with = "null_as_default")]
	semantic_query: String,
	#[serde(default, deserialize_with = "null_as_default")]
	keywords: Vec<String>,
}

/// Cuts the span from the first `{` to the last `}` so prose or Markdown around the object is
/// ignored. Returns the input unchanged when no such span exists.
pub fn recover_json_object(raw: &str) -> &str {
	match (raw.find('{'), raw.rfind('}')) {
		(Some(start), Some(end)) if end > start => &raw[start..=end],
		_ => raw,
	}
}

/// Rewrites `"filters": []` to `"filters": {}`.
pub fn repair_empty_filters(json: &str) -> String {
	match &*EMPTY_FILTER_ARRAY {
		Some(re) => re.replace_all(json, r#""filters": {}"#).into_owned(),
		None => json.replace(r#""filters": []"#, r#""filters": {}"#),
	}
}

pub fn decode_intent(raw: &str) -> Result<Intent, IntentDecodeError> {
	let repaired = repair_empty_filters(recover_json_object(raw));
	let wire: WireIntent = serde_json::from_str(&repaired)
		.map_err(|err| IntentDecodeError { message: err.to_string() })?;
	let keywords = wire
		.keywords
		.into_iter()
		.map(|keyword| keyword.trim().to_string())
		.filter(|keyword| !keyword.is_empty())
		.collect();

	Ok(Intent {
		kind: IntentKind::from_label(wire.intent.as_deref()),
		filters: wire.filters.normalized(),
		semantic_query: wire.semantic_query.trim().to_string(),
		keywords,
	})
}

/// Never fails: undecodable model output degrades to a plain hybrid search over the query.
pub fn decode_intent_or_fallback(raw: &str, query: &str) -> (Intent, Option<IntentDecodeError>) {
	match decode_intent(raw) {
		Ok(intent) => (intent, None),
		Err(err) => (Intent::fallback(query), Some(err)),
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn recovers_object_from_prose_and_fences() {
		let raw = "Sure! Here you go:\n```json\n{\"intent\": \"structured_only\", \"filters\": {\"any_party\": [\"张三\"]}}\n```\nDone.";
		let intent = decode_intent(raw).expect("Failed to decode intent.");

		assert_eq!(intent.kind, IntentKind::StructuredOnly);
		assert_eq!(intent.filters.any_party, vec!["张三".to_string()]);
	}

	#[test]
	fn repairs_filters_array() {
		let intent = decode_intent(r#"{"intent": "hybrid", "filters": [ ], "semantic_query": "违约责任"}"#)
			.expect("Failed to decode intent.");

		assert!(intent.filters.is_empty());
		assert_eq!(intent.semantic_query, "违约责任");
	}

	#[test]
	fn missing_or_unknown_kind_is_hybrid() {
		let missing = decode_intent(r#"{"semantic_query": "q"}"#).expect("Failed to decode intent.");
		let semantic =
			decode_intent(r#"{"intent": "semantic_only"}"#).expect("Failed to decode intent.");

		assert_eq!(missing.kind, IntentKind::Hybrid);
		assert_eq!(semantic.kind, IntentKind::Hybrid);
	}

	#[test]
	fn garbage_falls_back_to_hybrid_over_query() {
		let (intent, err) = decode_intent_or_fallback("I cannot help with that.", "违约金怎么定");

		assert!(err.is_some());
		assert_eq!(intent, Intent::fallback("违约金怎么定"));
		assert_eq!(intent.kind, IntentKind::Hybrid);
		assert!(intent.filters.is_empty());
		assert!(intent.keywords.is_empty());
	}
}
