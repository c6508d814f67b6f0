pub mod loader;

mod error;

pub use error::{Error, Result};

use unicode_segmentation::UnicodeSegmentation;

#[derive(Clone, Debug)]
pub struct ChunkingConfig {
	pub min_chars: usize,
	pub max_chars: usize,
}

#[derive(Clone, Debug)]
pub struct Segment {
	pub chunk_index: i32,
	pub start_offset: usize,
	pub end_offset: usize,
	pub text: String,
}

/// Packs whole sentences into segments of at most `max_chars` characters. A segment is only closed
/// once it holds `min_chars`, and a short tail is folded into the previous segment. Sentences longer
/// than `max_chars` are cut at character boundaries.
pub fn split_text(text: &str, cfg: &ChunkingConfig) -> Vec<Segment> {
	let max_chars = cfg.max_chars.max(1);
	let mut segments: Vec<Segment> = Vec::new();
	let mut current = String::new();
	let mut current_chars = 0_usize;
	let mut current_start = 0_usize;
	let mut last_end = 0_usize;

	for (idx, sentence) in text.split_sentence_bound_indices() {
		for (offset, piece) in hard_split(sentence, max_chars) {
			let piece_chars = piece.chars().count();

			if !current.is_empty()
				&& current_chars + piece_chars > max_chars
				&& current_chars >= cfg.min_chars
			{
				push_segment(&mut segments, current_start, last_end, &mut current);

				current_chars = 0;
			}
			if current.is_empty() {
				current_start = idx + offset;
			}

			current.push_str(piece);

			current_chars += piece_chars;
			last_end = idx + offset + piece.len();
		}
	}

	if !current.is_empty() {
		if current_chars < cfg.min_chars
			&& let Some(previous) = segments.last_mut()
		{
			previous.text.push_str(&current);
			previous.end_offset = last_end;
		} else {
			push_segment(&mut segments, current_start, last_end, &mut current);
		}
	}

	tracing::debug!(segments = segments.len(), bytes = text.len(), "Split document text.");

	segments
}

fn push_segment(segments: &mut Vec<Segment>, start: usize, end: usize, current: &mut String) {
	segments.push(Segment {
		chunk_index: segments.len() as i32,
		start_offset: start,
		end_offset: end,
		text: std::mem::take(current),
	});
}

fn hard_split(sentence: &str, max_chars: usize) -> Vec<(usize, &str)> {
	let mut pieces = Vec::new();
	let mut start = 0_usize;
	let mut count = 0_usize;

	for (idx, _) in sentence.char_indices() {
		if count == max_chars {
			pieces.push((start, &sentence[start..idx]));

			start = idx;
			count = 0;
		}

		count += 1;
	}

	if start < sentence.len() {
		pieces.push((start, &sentence[start..]));
	}

	pieces
}
