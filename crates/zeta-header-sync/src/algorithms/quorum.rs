//! # Response Voting
//!
//! Pick the answer most sources agree on.

/// Tally identical responses, preserving first-seen order.
pub fn count_responses<T: Clone + PartialEq>(responses: &[T]) -> Vec<(T, usize)> {
    let mut counts: Vec<(T, usize)> = Vec::new();
    for response in responses {
        match counts.iter_mut().find(|(r, _)| r == response) {
            Some((_, count)) => *count += 1,
            None => counts.push((response.clone(), 1)),
        }
    }
    counts
}

/// Most frequent response; ties go to the one seen first.
///
/// Returns `None` for an empty slice.
pub fn select_most_common<T: Clone + PartialEq>(responses: &[T]) -> Option<T> {
    let mut best: Option<(T, usize)> = None;
    for (response, count) in count_responses(responses) {
        // Strictly greater keeps the earlier entry on a tie
        if best.as_ref().map_or(true, |(_, c)| count > *c) {
            best = Some((response, count));
        }
    }
    best.map(|(response, _)| response)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_select_all_agree() {
        assert_eq!(select_most_common(&[42, 42, 42]), Some(42));
    }

    #[test]
    fn test_select_majority() {
        assert_eq!(select_most_common(&[1, 2, 2]), Some(2));
    }

    #[test]
    fn test_select_tie_first_seen() {
        assert_eq!(select_most_common(&[3, 1, 1, 3]), Some(3));
        assert_eq!(select_most_common(&[1, 2, 3]), Some(1));
    }

    #[test]
    fn test_select_empty() {
        let responses: Vec<i32> = vec![];
        assert_eq!(select_most_common(&responses), None);
    }

    #[test]
    fn test_count_responses_order() {
        let counts = count_responses(&["b", "a", "b"]);
        assert_eq!(counts, vec![("b", 2), ("a", 1)]);
    }
}
