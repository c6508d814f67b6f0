use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use time::Date;

use crate::{amount, dates, status::ContractStatus};

/// Structured constraints extracted from a query. Every field is optional; an empty set matches
/// everything.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct FilterSet {
	/// OR-matched against both `party_a` and `party_b`.
	#[serde(default, deserialize_with = "lenient::string_list")]
	pub any_party: Vec<String>,
	#[serde(default, deserialize_with = "lenient::non_empty_string")]
	pub party_a: Option<String>,
	#[serde(default, deserialize_with = "lenient::non_empty_string")]
	pub party_b: Option<String>,
	#[serde(default, deserialize_with = "lenient::non_empty_string")]
	pub contract_type: Option<String>,
	#[serde(default, deserialize_with = "lenient::status")]
	pub status: Option<ContractStatus>,
	#[serde(default, deserialize_with = "lenient::date_range")]
	pub date_range: Option<DateRange>,
	#[serde(default, deserialize_with = "lenient::amount_range")]
	pub amount_range: Option<AmountRange>,
}
impl FilterSet {
	pub fn is_empty(&self) -> bool {
		self.any_party.is_empty()
			&& self.party_a.is_none()
			&& self.party_b.is_none()
			&& self.contract_type.is_none()
			&& self.status.is_none()
			&& self.date_range.is_none()
			&& self.amount_range.is_none()
	}

	/// Trims party names and drops blanks and repeats, keeping first-seen order.
	pub fn normalized(mut self) -> Self {
		let mut parties: Vec<String> = Vec::with_capacity(self.any_party.len());

		for party in self.any_party.drain(..) {
			let party = party.trim().to_string();

			if !party.is_empty() && !parties.contains(&party) {
				parties.push(party);
			}
		}

		self.any_party = parties;

		self
	}
}

/// Inclusive sign-date bounds.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct DateRange {
	#[serde(default, with = "dates::option")]
	pub start: Option<Date>,
	#[serde(default, with = "dates::option")]
	pub end: Option<Date>,
}

/// Inclusive total-amount bounds in yuan.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct AmountRange {
	#[serde(default, deserialize_with = "lenient::amount")]
	pub min: Option<f64>,
	#[serde(default, deserialize_with = "lenient::amount")]
	pub max: Option<f64>,
}

mod lenient {
	use super::*;

	pub fn string_list<'de, D>(deserializer: D) -> Result<Vec<String>, D::Error>
	where
		D: Deserializer<'de>,
	{
		let value = Value::deserialize(deserializer)?;
		let list = match value {
			Value::String(single) => vec![single],
			Value::Array(items) => items
				.into_iter()
				.filter_map(|item| match item {
					Value::String(text) => Some(text),
					_ => None,
				})
				.collect(),
			_ => Vec::new(),
		};

		Ok(list)
	}

	pub fn non_empty_string<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
	where
		D: Deserializer<'de>,
	{
		let raw = Option::<String>::deserialize(deserializer)?;

		Ok(raw.map(|text| text.trim().to_string()).filter(|text| !text.is_empty()))
	}

	pub fn status<'de, D>(deserializer: D) -> Result<Option<ContractStatus>, D::Error>
	where
		D: Deserializer<'de>,
	{
		let status = match Value::deserialize(deserializer)? {
			Value::String(label) if !label.trim().is_empty() =>
				Some(ContractStatus::from_label(&label)),
			Value::Number(code) =>
				code.as_i64().and_then(|code| i16::try_from(code).ok()).and_then(ContractStatus::from_code),
			_ => None,
		};

		Ok(status)
	}

	pub fn date_range<'de, D>(deserializer: D) -> Result<Option<DateRange>, D::Error>
	where
		D: Deserializer<'de>,
	{
		let range = Option::<DateRange>::deserialize(deserializer)?;

		Ok(range.filter(|range| range.start.is_some() || range.end.is_some()))
	}

	pub fn amount_range<'de, D>(deserializer: D) -> Result<Option<AmountRange>, D::Error>
	where
		D: Deserializer<'de>,
	{
		let range = Option::<AmountRange>::deserialize(deserializer)?;

		Ok(range.filter(|range| range.min.is_some() || range.max.is_some()))
	}

	pub fn amount<'de, D>(deserializer: D) -> Result<Option<f64>, D::Error>
	where
		D: Deserializer<'de>,
	{
		Ok(amount::parse_amount_opt(&Value::deserialize(deserializer)?))
	}
}
