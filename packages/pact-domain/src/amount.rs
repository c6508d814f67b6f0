use serde_json::Value;

const TEN_THOUSAND: f64 = 10_000.0;

/// Canonical contract amount in yuan. Unparsable input yields zero.
pub fn parse_amount(value: &Value) -> f64 {
	parse_amount_opt(value).unwrap_or(0.0)
}

pub fn parse_amount_opt(value: &Value) -> Option<f64> {
	let amount = match value {
		Value::Number(number) => number.as_f64(),
		Value::String(text) => parse_amount_text(text),
		_ => None,
	}?;

	amount.is_finite().then_some(amount)
}

/// Accepts `"1,200,000"`, `"120万"`, `"120万元"` and plain decimals.
pub fn parse_amount_text(text: &str) -> Option<f64> {
	let cleaned = text.trim().replace([',', '，', ' '], "");
	let cleaned = cleaned.strip_suffix('元').unwrap_or(&cleaned);
	let (digits, multiplier) = match cleaned.strip_suffix('万') {
		Some(rest) => (rest, TEN_THOUSAND),
		None => (cleaned, 1.0),
	};

	digits.parse::<f64>().ok().map(|value| value * multiplier)
}
