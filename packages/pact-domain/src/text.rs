use std::sync::LazyLock;

use regex::Regex;

static CONTROL_CHARS: LazyLock<Option<Regex>> =
	LazyLock::new(|| Regex::new(r"[\x00-\x08\x0B\x0C\x0E-\x1F\x7F]").ok());
// PDF extraction renders blank signature fields as long runs of these characters.
static PLACEHOLDER_RUNS: LazyLock<Option<Regex>> =
	LazyLock::new(|| Regex::new(r"甲{3,}|乙{3,}|丙{3,}|□{3,}").ok());
static WHITESPACE_RUNS: LazyLock<Option<Regex>> = LazyLock::new(|| Regex::new(r"\s+").ok());

/// Strips extraction artifacts from chunk text. An empty result means the chunk should be dropped.
pub fn clean_chunk_text(text: &str) -> String {
	let text = replace_all(&CONTROL_CHARS, text, "");
	let text = replace_all(&PLACEHOLDER_RUNS, &text, "");
	let text = replace_all(&WHITESPACE_RUNS, &text, " ");

	text.trim().to_string()
}

/// Removes a surrounding Markdown code fence, with or without a `json` tag.
pub fn strip_code_fence(raw: &str) -> &str {
	let trimmed = raw.trim();
	let trimmed = trimmed
		.strip_prefix("```json")
		.or_else(|| trimmed.strip_prefix("```"))
		.unwrap_or(trimmed);
	let trimmed = trimmed.strip_suffix("```").unwrap_or(trimmed);

	trimmed.trim()
}

/// Returns at most `max_chars` leading characters without splitting a code point.
pub fn truncate_chars(text: &str, max_chars: usize) -> &str {
	match text.char_indices().nth(max_chars) {
		Some((idx, _)) => &text[..idx],
		None => text,
	}
}

fn replace_all(pattern: &LazyLock<Option<Regex>>, text: &str, replacement: &str) -> String {
	match &**pattern {
		Some(re) => re.replace_all(text, replacement).into_owned(),
		None => text.to_string(),
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn cleans_control_chars_placeholders_and_whitespace() {
		let cleaned = clean_chunk_text("  甲方：\u{0007}腾讯甲甲甲甲\n\n  签字：□□□□  \t日期 ");

		assert_eq!(cleaned, "甲方：腾讯 签字： 日期");
	}

	#[test]
	fn keeps_short_placeholder_runs() {
		assert_eq!(clean_chunk_text("甲甲 乙"), "甲甲 乙");
	}

	#[test]
	fn blank_chunks_clean_to_empty() {
		assert!(clean_chunk_text("\u{0001}\n\t 甲甲甲 ").is_empty());
	}

	#[test]
	fn strips_fences() {
		assert_eq!(strip_code_fence("```json\n{\"a\":1}\n```"), "{\"a\":1}");
		assert_eq!(strip_code_fence("```{\"a\":1}```"), "{\"a\":1}");
		assert_eq!(strip_code_fence(" {\"a\":1} "), "{\"a\":1}");
	}

	#[test]
	fn truncates_on_char_boundaries() {
		assert_eq!(truncate_chars("合同文本", 2), "合同");
		assert_eq!(truncate_chars("abc", 10), "abc");
	}
}
