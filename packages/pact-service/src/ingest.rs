//! Per-document ingestion saga and the bounded batch runner around it.
//!
//! A document moves through named stages in a fixed order. When a stage fails, the compensations
//! listed for that stage run in order and the document is reported as failed. Compensation
//! failures are logged and swallowed so the original error survives.

use std::time::Instant;

use futures::{StreamExt, stream};
use serde::Serialize;
use time::OffsetDateTime;
use uuid::Uuid;

use crate::{Error, PactService, Result, dedup::DedupDecision, enrich};
use pact_chunking::{ChunkingConfig, loader};
use pact_storage::models::ContractRecord;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SagaStage {
	Dedup,
	Extract,
	PersistRelational,
	Chunk,
	IndexKeyword,
	IndexVector,
	Done,
}
impl SagaStage {
	/// Undo steps for a failure at this stage, run in the listed order.
	pub const fn compensations(self) -> &'static [Compensation] {
		match self {
			Self::Dedup | Self::Extract | Self::PersistRelational | Self::Done => &[],
			Self::Chunk => &[Compensation::DeleteContract],
			Self::IndexKeyword =>
				&[Compensation::DeleteContract, Compensation::DeleteKeywordEntries],
			// Vector cleanup is best effort. Orphaned points stay unreachable once the record and
			// keyword entries are gone.
			Self::IndexVector => &[
				Compensation::DeleteContract,
				Compensation::DeleteKeywordEntries,
				Compensation::DeleteVectorEntries,
			],
		}
	}
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Compensation {
	DeleteContract,
	DeleteKeywordEntries,
	DeleteVectorEntries,
}

#[derive(Clone, Debug)]
pub struct UploadedFile {
	pub file_name: String,
	pub bytes: Vec<u8>,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum DocumentOutcome {
	Ingested { file_name: String, doc_id: Uuid, chunk_count: usize },
	Skipped { file_name: String, existing_doc_id: Option<Uuid> },
	Failed { file_name: String, stage: SagaStage, error: String },
}
impl DocumentOutcome {
	pub fn file_name(&self) -> &str {
		match self {
			Self::Ingested { file_name, .. }
			| Self::Skipped { file_name, .. }
			| Self::Failed { file_name, .. } => file_name,
		}
	}
}

/// Outcomes in upload order.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct BatchReport {
	pub outcomes: Vec<DocumentOutcome>,
}
impl BatchReport {
	pub fn doc_ids(&self) -> Vec<Uuid> {
		self.outcomes
			.iter()
			.filter_map(|outcome| match outcome {
				DocumentOutcome::Ingested { doc_id, .. } => Some(*doc_id),
				_ => None,
			})
			.collect()
	}

	pub fn failed_files(&self) -> Vec<String> {
		self.file_names(|outcome| matches!(outcome, DocumentOutcome::Failed { .. }))
	}

	pub fn skipped_files(&self) -> Vec<String> {
		self.file_names(|outcome| matches!(outcome, DocumentOutcome::Skipped { .. }))
	}

	fn file_names(&self, keep: impl Fn(&DocumentOutcome) -> bool) -> Vec<String> {
		self.outcomes
			.iter()
			.filter(|outcome| keep(outcome))
			.map(|outcome| outcome.file_name().to_string())
			.collect()
	}
}

/// Upload response body.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct UploadReport {
	pub doc_ids: Vec<Uuid>,
	pub total_count: usize,
	pub fail_files: Vec<String>,
	pub skipped_files: Vec<String>,
	pub status: &'static str,
}
impl From<&BatchReport> for UploadReport {
	fn from(report: &BatchReport) -> Self {
		let doc_ids = report.doc_ids();

		Self {
			total_count: doc_ids.len(),
			doc_ids,
			fail_files: report.failed_files(),
			skipped_files: report.skipped_files(),
			status: "indexed",
		}
	}
}

struct StageFailure {
	stage: SagaStage,
	error: Error,
}

trait AtStage<T> {
	fn at(self, stage: SagaStage) -> Result<T, StageFailure>;
}
impl<T, E> AtStage<T> for Result<T, E>
where
	E: Into<Error>,
{
	fn at(self, stage: SagaStage) -> Result<T, StageFailure> {
		self.map_err(|err| StageFailure { stage, error: err.into() })
	}
}

impl PactService {
	/// Runs every file through the saga on a pool of `ingest.max_concurrency` workers.
	///
	/// A document failure, including a part without a file name, never aborts the batch. The call
	/// itself fails only for an empty request or when every document failed.
	pub async fn ingest_batch(&self, files: &[UploadedFile]) -> Result<BatchReport> {
		if files.is_empty() {
			return Err(Error::InvalidRequest { message: "No files were uploaded.".to_string() });
		}

		let started = Instant::now();
		let now = OffsetDateTime::now_utc();
		let outcomes: Vec<DocumentOutcome> = stream::iter(files)
			.map(|file| self.ingest_document(file, now))
			.buffered(self.cfg.ingest.max_concurrency.max(1))
			.boxed()
			.collect()
			.await;
		let report = BatchReport { outcomes };
		let failed = report.failed_files();

		tracing::info!(
			files = files.len(),
			ingested = report.doc_ids().len(),
			failed = failed.len(),
			elapsed_ms = started.elapsed().as_millis() as u64,
			"Ingested upload batch."
		);

		if failed.len() == files.len() {
			return Err(Error::AllDocumentsFailed { failed });
		}

		Ok(report)
	}

	/// Runs one document through the saga. Failures are compensated and reported, not returned.
	pub async fn ingest_document(&self, file: &UploadedFile, now: OffsetDateTime) -> DocumentOutcome {
		let doc_id = Uuid::new_v4();

		match self.run_saga(file, doc_id, now).await {
			Ok(outcome) => outcome,
			Err(StageFailure { stage, error }) => {
				tracing::warn!(
					file_name = %file.file_name,
					doc_id = %doc_id,
					stage = ?stage,
					error = %error,
					"Saga stage failed."
				);

				self.compensate(doc_id, stage).await;

				DocumentOutcome::Failed {
					file_name: file.file_name.clone(),
					stage,
					error: error.to_string(),
				}
			},
		}
	}

	async fn run_saga(
		&self,
		file: &UploadedFile,
		doc_id: Uuid,
		now: OffsetDateTime,
	) -> Result<DocumentOutcome, StageFailure> {
		let file_name = file.file_name.as_str();

		if file_name.trim().is_empty() {
			return Err(Error::InvalidRequest {
				message: "Uploaded file has no file name.".to_string(),
			})
			.at(SagaStage::Dedup);
		}
		if let DedupDecision::Duplicate { doc_id: existing } =
			self.check_duplicate(file_name).await.at(SagaStage::Dedup)?
		{
			tracing::info!(file_name, existing_doc_id = %existing, "Skipped duplicate upload.");

			return Ok(DocumentOutcome::Skipped {
				file_name: file_name.to_string(),
				existing_doc_id: Some(existing),
			});
		}

		tracing::debug!(file_name, doc_id = %doc_id, "Saga entered extract stage.");

		let content = load_content(file).await.at(SagaStage::Extract)?;
		let fields = self.extract_metadata(&content, now).await.at(SagaStage::Extract)?;

		tracing::debug!(file_name, doc_id = %doc_id, "Saga entered persist stage.");

		let record = ContractRecord::new(doc_id, file_name, &fields, now);

		match self.stores.contracts.insert(&record).await {
			Ok(()) => {},
			// Another worker won the race for this file name.
			Err(Error::Conflict { .. }) => {
				tracing::info!(file_name, "Skipped duplicate upload.");

				return Ok(DocumentOutcome::Skipped {
					file_name: file_name.to_string(),
					existing_doc_id: None,
				});
			},
			Err(err) => return Err(StageFailure { stage: SagaStage::PersistRelational, error: err }),
		}

		let chunking = ChunkingConfig {
			min_chars: self.cfg.ingest.min_chunk_chars,
			max_chars: self.cfg.ingest.max_chunk_chars,
		};
		let chunks = enrich::enrich_chunks(doc_id, &content, &fields, &chunking);

		if chunks.is_empty() {
			return Err(Error::EmptyDocument { file_name: file_name.to_string() })
				.at(SagaStage::Chunk);
		}

		tracing::debug!(doc_id = %doc_id, chunks = chunks.len(), "Saga entered keyword stage.");

		self.stores.keyword.index_chunks(&chunks, &fields.keywords).await.at(SagaStage::IndexKeyword)?;

		tracing::debug!(doc_id = %doc_id, "Saga entered vector stage.");

		let texts: Vec<String> = chunks.iter().map(|chunk| chunk.content.clone()).collect();
		let vectors = self
			.providers
			.embedding
			.embed(&self.cfg.providers.embedding, &texts)
			.await
			.at(SagaStage::IndexVector)?;

		self.stores.vector.upsert_chunks(&chunks, &vectors).await.at(SagaStage::IndexVector)?;

		tracing::info!(file_name, doc_id = %doc_id, chunks = chunks.len(), "Ingested document.");

		Ok(DocumentOutcome::Ingested {
			file_name: file_name.to_string(),
			doc_id,
			chunk_count: chunks.len(),
		})
	}

	async fn compensate(&self, doc_id: Uuid, failed: SagaStage) {
		for compensation in failed.compensations() {
			let result = match compensation {
				Compensation::DeleteContract =>
					self.stores.contracts.delete(doc_id).await.map(|_| ()),
				Compensation::DeleteKeywordEntries =>
					self.stores.keyword.delete_document(doc_id).await,
				Compensation::DeleteVectorEntries =>
					self.stores.vector.delete_document(doc_id).await,
			};

			match result {
				Ok(()) => tracing::debug!(doc_id = %doc_id, compensation = ?compensation, "Compensated."),
				Err(err) => tracing::error!(
					doc_id = %doc_id,
					compensation = ?compensation,
					error = %err,
					"Compensation failed."
				),
			}
		}
	}
}

/// PDF parsing is CPU-bound, so loading runs on the blocking pool.
async fn load_content(file: &UploadedFile) -> Result<String> {
	let file_name = file.file_name.clone();
	let bytes = file.bytes.clone();
	let loaded = tokio::task::spawn_blocking(move || loader::load_text(&file_name, &bytes))
		.await
		.map_err(|err| Error::ExtractionFailed {
			message: format!("Text loading task failed: {err}."),
		})?;

	Ok(loaded?)
}
