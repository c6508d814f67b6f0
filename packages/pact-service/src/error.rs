pub type Result<T, E = Error> = std::result::Result<T, E>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
	#[error("Invalid request: {message}")]
	InvalidRequest { message: String },
	#[error("Extraction failed: {message}")]
	ExtractionFailed { message: String },
	#[error("Extraction returned malformed metadata: {message}")]
	ExtractionMalformed { message: String },
	#[error("Document {file_name:?} produced no usable text.")]
	EmptyDocument { file_name: String },
	#[error("Every document in the batch failed: {failed:?}.")]
	AllDocumentsFailed { failed: Vec<String> },
	#[error("Not found: {message}")]
	NotFound { message: String },
	#[error("Conflict: {message}")]
	Conflict { message: String },
	#[error("Provider error: {message}")]
	Provider { message: String },
	#[error("Storage error: {message}")]
	Storage { message: String },
	#[error("Qdrant error: {message}")]
	Qdrant { message: String },
	#[error("Keyword index error: {message}")]
	Keyword { message: String },
}
impl From<pact_storage::Error> for Error {
	fn from(err: pact_storage::Error) -> Self {
		match err {
			pact_storage::Error::Sqlx(inner) => Self::Storage { message: inner.to_string() },
			pact_storage::Error::InvalidArgument(message) => Self::InvalidRequest { message },
			pact_storage::Error::NotFound(message) => Self::NotFound { message },
			pact_storage::Error::Conflict(message) => Self::Conflict { message },
			pact_storage::Error::Qdrant(inner) => Self::Qdrant { message: inner.to_string() },
			pact_storage::Error::Reqwest(inner) => Self::Keyword { message: inner.to_string() },
			pact_storage::Error::Keyword { message } => Self::Keyword { message },
		}
	}
}

impl From<pact_providers::Error> for Error {
	fn from(err: pact_providers::Error) -> Self {
		Self::Provider { message: err.to_string() }
	}
}

impl From<pact_chunking::Error> for Error {
	fn from(err: pact_chunking::Error) -> Self {
		match err {
			pact_chunking::Error::Empty { file_name } => Self::EmptyDocument { file_name },
			pact_chunking::Error::Pdf { .. } => Self::ExtractionFailed { message: err.to_string() },
		}
	}
}
