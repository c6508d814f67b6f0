use sqlx::{PgExecutor, Postgres, QueryBuilder};
use time::OffsetDateTime;
use uuid::Uuid;

use crate::{Error, Result, models::ContractRecord};
use pact_domain::{ContractStatus, FilterSet};

const CONTRACT_COLUMNS: &str = "\
\tdoc_id,
\tfile_name,
\tparty_a,
\tparty_b,
\tcontract_type,
\tcontract_status,
\tsign_date,
\tend_date,
\ttotal_amount::float8 AS total_amount,
\tsummary,
\tkeywords,
\tcreated_at,
\tupdated_at";

pub async fn find_by_file_name<'e, E>(executor: E, file_name: &str) -> Result<Option<ContractRecord>>
where
	E: PgExecutor<'e>,
{
	let sql = format!("SELECT\n{CONTRACT_COLUMNS}\nFROM contracts\nWHERE file_name = $1\nLIMIT 1");
	let row = sqlx::query_as::<_, ContractRecord>(&sql)
		.bind(file_name)
		.fetch_optional(executor)
		.await?;

	Ok(row)
}

pub async fn get_contract<'e, E>(executor: E, doc_id: Uuid) -> Result<Option<ContractRecord>>
where
	E: PgExecutor<'e>,
{
	let sql = format!("SELECT\n{CONTRACT_COLUMNS}\nFROM contracts\nWHERE doc_id = $1\nLIMIT 1");
	let row =
		sqlx::query_as::<_, ContractRecord>(&sql).bind(doc_id).fetch_optional(executor).await?;

	Ok(row)
}

/// Inserts a new contract. A second record with the same file name is a [`Error::Conflict`].
pub async fn insert_contract<'e, E>(executor: E, record: &ContractRecord) -> Result<()>
where
	E: PgExecutor<'e>,
{
	let result = sqlx::query(
		"\
INSERT INTO contracts (
\tdoc_id,
\tfile_name,
\tparty_a,
\tparty_b,
\tcontract_type,
\tcontract_status,
\tsign_date,
\tend_date,
\ttotal_amount,
\tsummary,
\tkeywords,
\tcreated_at,
\tupdated_at
)
VALUES ($1,$2,$3,$4,$5,$6,$7,$8,$9::float8::numeric,$10,$11,$12,$13)",
	)
	.bind(record.doc_id)
	.bind(record.file_name.as_str())
	.bind(record.party_a.as_str())
	.bind(record.party_b.as_str())
	.bind(record.contract_type.as_str())
	.bind(record.contract_status)
	.bind(record.sign_date)
	.bind(record.end_date)
	.bind(record.total_amount)
	.bind(record.summary.as_str())
	.bind(&record.keywords)
	.bind(record.created_at)
	.bind(record.updated_at)
	.execute(executor)
	.await;

	match result {
		Ok(_) => Ok(()),
		Err(sqlx::Error::Database(err)) if err.is_unique_violation() =>
			Err(Error::Conflict(format!("Contract file {} already exists.", record.file_name))),
		Err(err) => Err(err.into()),
	}
}

/// Returns whether a row was removed.
pub async fn delete_contract<'e, E>(executor: E, doc_id: Uuid) -> Result<bool>
where
	E: PgExecutor<'e>,
{
	let result = sqlx::query("DELETE FROM contracts WHERE doc_id = $1")
		.bind(doc_id)
		.execute(executor)
		.await?;

	Ok(result.rows_affected() > 0)
}

/// Returns the subset of `doc_ids` that still have a contract record.
pub async fn existing_contract_ids<'e, E>(executor: E, doc_ids: &[Uuid]) -> Result<Vec<Uuid>>
where
	E: PgExecutor<'e>,
{
	if doc_ids.is_empty() {
		return Ok(Vec::new());
	}

	let ids = sqlx::query_scalar::<_, Uuid>("SELECT doc_id FROM contracts WHERE doc_id = ANY($1)")
		.bind(doc_ids)
		.fetch_all(executor)
		.await?;

	Ok(ids)
}

/// Applies the structured filters and returns matching ids, newest signature first.
///
/// With `candidates`, the search is restricted to those ids and `any_party` is assumed to be
/// resolved already. Without them, `any_party` becomes a substring match on either party column.
pub async fn filter_contract_ids<'e, E>(
	executor: E,
	filters: &FilterSet,
	candidates: Option<&[Uuid]>,
) -> Result<Vec<Uuid>>
where
	E: PgExecutor<'e>,
{
	let mut builder = build_filter_query(filters, candidates);
	let ids = builder.build_query_scalar::<Uuid>().fetch_all(executor).await?;

	Ok(ids)
}

/// Flips active contracts whose end date has passed to expired and returns their ids.
pub async fn expire_contracts<'e, E>(executor: E, now: OffsetDateTime) -> Result<Vec<Uuid>>
where
	E: PgExecutor<'e>,
{
	let ids = sqlx::query_scalar::<_, Uuid>(
		"\
UPDATE contracts
SET contract_status = $1, updated_at = $2
WHERE contract_status = $3
\tAND end_date IS NOT NULL
\tAND (end_date::timestamp AT TIME ZONE 'UTC') < $2
RETURNING doc_id",
	)
	.bind(ContractStatus::Expired.code())
	.bind(now)
	.bind(ContractStatus::Active.code())
	.fetch_all(executor)
	.await?;

	Ok(ids)
}

fn build_filter_query<'a>(
	filters: &'a FilterSet,
	candidates: Option<&'a [Uuid]>,
) -> QueryBuilder<'a, Postgres> {
	let mut builder = QueryBuilder::new("SELECT doc_id FROM contracts WHERE TRUE");

	match candidates {
		Some(ids) => {
			builder.push(" AND doc_id = ANY(").push_bind(ids).push(")");
		},
		None if !filters.any_party.is_empty() => {
			builder.push(" AND (");

			for (idx, party) in filters.any_party.iter().enumerate() {
				let pattern = contains_pattern(party);

				if idx > 0 {
					builder.push(" OR ");
				}

				builder
					.push("party_a ILIKE ")
					.push_bind(pattern.clone())
					.push(" OR party_b ILIKE ")
					.push_bind(pattern);
			}

			builder.push(")");
		},
		None => {},
	}

	if let Some(party_a) = &filters.party_a {
		builder.push(" AND party_a ILIKE ").push_bind(contains_pattern(party_a));
	}
	if let Some(party_b) = &filters.party_b {
		builder.push(" AND party_b ILIKE ").push_bind(contains_pattern(party_b));
	}
	if let Some(contract_type) = &filters.contract_type {
		builder
			.push(" AND (contract_type = ")
			.push_bind(contract_type.as_str())
			.push(" OR file_name ILIKE ")
			.push_bind(contains_pattern(contract_type))
			.push(")");
	}
	if let Some(status) = filters.status {
		builder.push(" AND contract_status = ").push_bind(status.code());
	}
	if let Some(range) = &filters.date_range {
		if let Some(start) = range.start {
			builder.push(" AND sign_date >= ").push_bind(start);
		}
		if let Some(end) = range.end {
			builder.push(" AND sign_date <= ").push_bind(end);
		}
	}
	if let Some(range) = &filters.amount_range {
		if let Some(min) = range.min {
			builder.push(" AND total_amount >= ").push_bind(min).push("::float8::numeric");
		}
		if let Some(max) = range.max {
			builder.push(" AND total_amount <= ").push_bind(max).push("::float8::numeric");
		}
	}

	builder.push(" ORDER BY sign_date DESC NULLS LAST, created_at DESC");

	builder
}

fn contains_pattern(raw: &str) -> String {
	let escaped = raw.replace('\\', "\\\\").replace('%', "\\%").replace('_', "\\_");

	format!("%{escaped}%")
}

#[cfg(test)]
mod tests {
	use time::macros::date;

	use super::*;
	use pact_domain::{AmountRange, DateRange};

	#[test]
	fn escapes_like_wildcards() {
		assert_eq!(contains_pattern("100%_a\\b"), "%100\\%\\_a\\\\b%");
		assert_eq!(contains_pattern("腾讯"), "%腾讯%");
	}

	#[test]
	fn any_party_expands_to_or_group_without_candidates() {
		let filters = FilterSet {
			any_party: vec!["张三".to_string(), "李四".to_string()],
			..FilterSet::default()
		};
		let builder = build_filter_query(&filters, None);
		let sql = builder.sql();

		assert!(sql.contains(
			"AND (party_a ILIKE $1 OR party_b ILIKE $2 OR party_a ILIKE $3 OR party_b ILIKE $4)"
		));
	}

	#[test]
	fn candidates_replace_party_matching() {
		let filters = FilterSet {
			any_party: vec!["张三".to_string()],
			status: Some(ContractStatus::Expired),
			date_range: Some(DateRange { start: Some(date!(2023 - 01 - 01)), end: None }),
			amount_range: Some(AmountRange { min: None, max: Some(50_000.0) }),
			..FilterSet::default()
		};
		let ids = [Uuid::nil()];
		let builder = build_filter_query(&filters, Some(ids.as_slice()));
		let sql = builder.sql();

		assert!(sql.contains("doc_id = ANY($1)"));
		assert!(!sql.contains("party_a ILIKE"));
		assert!(sql.contains("contract_status = $2"));
		assert!(sql.contains("sign_date >= $3"));
		assert!(sql.contains("total_amount <= $4::float8::numeric"));
	}

	#[test]
	fn contract_type_also_matches_file_name() {
		let filters =
			FilterSet { contract_type: Some("租赁".to_string()), ..FilterSet::default() };
		let builder = build_filter_query(&filters, None);
		let sql = builder.sql();

		assert!(sql.contains("(contract_type = $1 OR file_name ILIKE $2)"));
	}
}
