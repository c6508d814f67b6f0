use serde::{Deserialize, Serialize};
use time::{Date, OffsetDateTime};

/// Lifecycle state of a contract. Stored as a small integer in every store.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ContractStatus {
	Active,
	Expired,
}
impl ContractStatus {
	pub const fn code(self) -> i16 {
		match self {
			Self::Active => 1,
			Self::Expired => 2,
		}
	}

	pub const fn from_code(code: i16) -> Option<Self> {
		match code {
			1 => Some(Self::Active),
			2 => Some(Self::Expired),
			_ => None,
		}
	}

	/// Maps free-form status text produced by the language model. Anything that does not name
	/// the expired state is treated as active.
	pub fn from_label(label: &str) -> Self {
		let label = label.trim();

		if label.eq_ignore_ascii_case("expired") || label == "已过期" || label == "过期" {
			Self::Expired
		} else {
			Self::Active
		}
	}

	/// An end date counts as passed from midnight UTC of that day.
	pub fn at(end_date: Option<Date>, now: OffsetDateTime) -> Self {
		match end_date {
			Some(end) if end.midnight().assume_utc() < now => Self::Expired,
			_ => Self::Active,
		}
	}

	pub const fn as_str(self) -> &'static str {
		match self {
			Self::Active => "active",
			Self::Expired => "expired",
		}
	}
}

#[cfg(test)]
mod tests {
	use time::macros::{date, datetime};

	use super::*;

	#[test]
	fn codes_round_trip() {
		for status in [ContractStatus::Active, ContractStatus::Expired] {
			assert_eq!(ContractStatus::from_code(status.code()), Some(status));
		}

		assert_eq!(ContractStatus::from_code(0), None);
	}

	#[test]
	fn labels_default_to_active() {
		assert_eq!(ContractStatus::from_label("已过期"), ContractStatus::Expired);
		assert_eq!(ContractStatus::from_label(" Expired "), ContractStatus::Expired);
		assert_eq!(ContractStatus::from_label("生效中"), ContractStatus::Active);
		assert_eq!(ContractStatus::from_label(""), ContractStatus::Active);
	}

	#[test]
	fn end_date_before_now_expires() {
		let now = datetime!(2025-06-01 08:00 UTC);

		assert_eq!(ContractStatus::at(Some(date!(2025 - 05 - 31)), now), ContractStatus::Expired);
		assert_eq!(ContractStatus::at(Some(date!(2025 - 06 - 02)), now), ContractStatus::Active);
		assert_eq!(ContractStatus::at(None, now), ContractStatus::Active);
	}
}
