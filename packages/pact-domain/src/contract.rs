use serde::{Deserialize, Deserializer};
use serde_json::Value;
use time::{Date, OffsetDateTime};

use crate::{amount, dates, status::ContractStatus};

/// Loosely typed metadata as emitted by the extraction model.
#[derive(Clone, Debug, Default, Deserialize)]
pub struct RawMetadata {
	#[serde(default, deserialize_with = "null_as_default")]
	pub party_a: String,
	#[serde(default, deserialize_with = "null_as_default")]
	pub party_b: String,
	#[serde(default)]
	pub sign_date: Option<String>,
	#[serde(default)]
	pub end_date: Option<String>,
	#[serde(default, deserialize_with = "null_as_default")]
	pub contract_type: String,
	/// Either a number or text such as `"120万"`.
	#[serde(default)]
	pub total_amount: Value,
	#[serde(default, deserialize_with = "null_as_default")]
	pub summary: String,
	#[serde(default, deserialize_with = "null_as_default")]
	pub keywords: Vec<String>,
}
impl RawMetadata {
	pub fn canonicalize(self, now: OffsetDateTime) -> ContractFields {
		let sign_date = dates::parse_date(self.sign_date.as_deref());
		let end_date = dates::parse_date(self.end_date.as_deref());
		let keywords = self
			.keywords
			.into_iter()
			.map(|keyword| keyword.trim().to_string())
			.filter(|keyword| !keyword.is_empty())
			.collect();

		ContractFields {
			party_a: self.party_a.trim().to_string(),
			party_b: self.party_b.trim().to_string(),
			contract_type: self.contract_type.trim().to_string(),
			status: ContractStatus::at(end_date, now),
			sign_date,
			end_date,
			total_amount: amount::parse_amount(&self.total_amount),
			summary: self.summary.trim().to_string(),
			keywords,
		}
	}
}

/// Canonical contract fields, ready for the relational record and chunk metadata.
#[derive(Clone, Debug, PartialEq)]
pub struct ContractFields {
	pub party_a: String,
	pub party_b: String,
	pub contract_type: String,
	pub status: ContractStatus,
	pub sign_date: Option<Date>,
	pub end_date: Option<Date>,
	pub total_amount: f64,
	pub summary: String,
	pub keywords: Vec<String>,
}

pub(crate) fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
	D: Deserializer<'de>,
	T: Default + Deserialize<'de>,
{
	Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}
