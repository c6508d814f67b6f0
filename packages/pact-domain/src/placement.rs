use crate::fusion;

/// Reorders scored items so the strongest sit at both ends and the weakest in the middle.
///
/// Items are sorted by score descending. Even ranks fill the front left to right and odd ranks
/// fill the back right to left, so `[a, b, c, d, e]` becomes `[a, c, e, d, b]`.
pub fn primacy_recency<T, F>(mut items: Vec<T>, score: F) -> Vec<T>
where
	F: Fn(&T) -> f32,
{
	items.sort_by(|a, b| fusion::cmp_score_desc(score(a), score(b)));

	let mut front = Vec::with_capacity(items.len().div_ceil(2));
	let mut back = Vec::with_capacity(items.len() / 2);

	for (rank, item) in items.into_iter().enumerate() {
		if rank % 2 == 0 {
			front.push(item);
		} else {
			back.push(item);
		}
	}

	front.extend(back.into_iter().rev());

	front
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn small_lists_are_unchanged() {
		assert_eq!(primacy_recency(Vec::<(char, f32)>::new(), |x| x.1), vec![]);
		assert_eq!(primacy_recency(vec![('a', 1.0)], |x| x.1), vec![('a', 1.0)]);
		assert_eq!(primacy_recency(vec![('b', 0.1), ('a', 0.9)], |x| x.1), vec![('a', 0.9), ('b', 0.1)]);
	}

	#[test]
	fn even_length_alternates_ends() {
		let items = vec![('a', 4.0), ('b', 3.0), ('c', 2.0), ('d', 1.0)];
		let placed: Vec<char> = primacy_recency(items, |x| x.1).into_iter().map(|x| x.0).collect();

		assert_eq!(placed, vec!['a', 'c', 'd', 'b']);
	}
}
