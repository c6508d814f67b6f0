use time::{Date, format_description::BorrowedFormatItem, macros::format_description};

pub const DATE_FORMAT: &[BorrowedFormatItem<'static>] = format_description!("[year]-[month]-[day]");

/// Parses a `YYYY-MM-DD` date. Empty or malformed input yields `None`.
pub fn parse_date(raw: Option<&str>) -> Option<Date> {
	let raw = raw?.trim();

	if raw.is_empty() {
		return None;
	}

	Date::parse(raw, DATE_FORMAT).ok()
}

pub fn format_date(date: Date) -> String {
	date.format(DATE_FORMAT).unwrap_or_else(|_| date.to_string())
}

/// Serde adapter for `Option<Date>` encoded as `YYYY-MM-DD`. Unparsable strings decode as `None`.
pub mod option {
	use serde::{Deserialize, Deserializer, Serializer};
	use time::Date;

	pub fn serialize<S>(value: &Option<Date>, serializer: S) -> Result<S::Ok, S::Error>
	where
		S: Serializer,
	{
		match value {
			Some(date) => serializer.serialize_str(&super::format_date(*date)),
			None => serializer.serialize_none(),
		}
	}

	pub fn deserialize<'de, D>(deserializer: D) -> Result<Option<Date>, D::Error>
	where
		D: Deserializer<'de>,
	{
		let raw = Option::<String>::deserialize(deserializer)?;

		Ok(super::parse_date(raw.as_deref()))
	}
}
