use crate::{Error, Result};

/// Turns uploaded bytes into plain text. PDFs are parsed; anything else is read as UTF-8, with
/// invalid sequences replaced.
pub fn load_text(file_name: &str, bytes: &[u8]) -> Result<String> {
	let text = if is_pdf(file_name, bytes) {
		pdf_extract::extract_text_from_mem(bytes).map_err(|err| Error::Pdf {
			file_name: file_name.to_string(),
			message: err.to_string(),
		})?
	} else {
		String::from_utf8_lossy(bytes).into_owned()
	};

	if text.trim().is_empty() {
		return Err(Error::Empty { file_name: file_name.to_string() });
	}

	Ok(text)
}

fn is_pdf(file_name: &str, bytes: &[u8]) -> bool {
	bytes.starts_with(b"%PDF-")
		|| file_name.rsplit_once('.').is_some_and(|(_, ext)| ext.eq_ignore_ascii_case("pdf"))
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn reads_plain_text() {
		let text = load_text("contract.txt", "甲方：腾讯".as_bytes()).expect("Failed to load text.");

		assert_eq!(text, "甲方：腾讯");
	}

	#[test]
	fn rejects_blank_documents() {
		assert!(matches!(load_text("blank.txt", b" \n\t"), Err(Error::Empty { .. })));
	}

	#[test]
	fn detects_pdf_by_extension_or_magic() {
		assert!(is_pdf("A.PDF", b""));
		assert!(is_pdf("upload.bin", b"%PDF-1.7"));
		assert!(!is_pdf("notes.md", b"# title"));
	}
}
