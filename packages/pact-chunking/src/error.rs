pub type Result<T, E = Error> = std::result::Result<T, E>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
	#[error("Failed to extract text from PDF {file_name:?}: {message}")]
	Pdf { file_name: String, message: String },
	#[error("Document {file_name:?} contains no text.")]
	Empty { file_name: String },
}
