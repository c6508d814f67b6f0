use time::{Date, OffsetDateTime};
use uuid::Uuid;

use pact_domain::{ContractFields, ContractStatus};

#[derive(Clone, Debug, PartialEq, sqlx::FromRow)]
pub struct ContractRecord {
	pub doc_id: Uuid,
	pub file_name: String,
	pub party_a: String,
	pub party_b: String,
	pub contract_type: String,
	pub contract_status: i16,
	pub sign_date: Option<Date>,
	pub end_date: Option<Date>,
	pub total_amount: f64,
	pub summary: String,
	pub keywords: Vec<String>,
	pub created_at: OffsetDateTime,
	pub updated_at: OffsetDateTime,
}
impl ContractRecord {
	pub fn new(doc_id: Uuid, file_name: &str, fields: &ContractFields, now: OffsetDateTime) -> Self {
		Self {
			doc_id,
			file_name: file_name.to_string(),
			party_a: fields.party_a.clone(),
			party_b: fields.party_b.clone(),
			contract_type: fields.contract_type.clone(),
			contract_status: fields.status.code(),
			sign_date: fields.sign_date,
			end_date: fields.end_date,
			total_amount: fields.total_amount,
			summary: fields.summary.clone(),
			keywords: fields.keywords.clone(),
			created_at: now,
			updated_at: now,
		}
	}

	/// Unknown codes read back as active.
	pub fn status(&self) -> ContractStatus {
		ContractStatus::from_code(self.contract_status).unwrap_or(ContractStatus::Active)
	}
}
