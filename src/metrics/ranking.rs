use std::cmp::Ordering;

/// Competition ranks for `values`, highest value first.
///
/// Each rank is one plus the number of strictly greater values, so ties share
/// a rank and the next rank skips by the size of the tie group:
/// `[90, 90, 80]` ranks as `[1, 1, 3]`. Ranks are returned in input order.
pub fn rank_descending(values: &[f64]) -> Vec<u32> {
    let mut order: Vec<usize> = (0..values.len()).collect();
    order.sort_by(|&a, &b| {
        values[b]
            .partial_cmp(&values[a])
            .unwrap_or(Ordering::Equal)
    });

    let mut ranks = vec![0u32; values.len()];
    let mut current = 0u32;
    for (pos, &idx) in order.iter().enumerate() {
        if pos == 0 || values[idx] != values[order[pos - 1]] {
            current = pos as u32 + 1;
        }
        ranks[idx] = current;
    }
    ranks
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rank_ties_share_rank() {
        assert_eq!(rank_descending(&[90.0, 90.0, 80.0]), vec![1, 1, 3]);
    }

    #[test]
    fn test_rank_preserves_input_order() {
        assert_eq!(rank_descending(&[1.0, 3.0, 2.0, 3.0]), vec![4, 1, 3, 1]);
    }

    #[test]
    fn test_rank_empty_and_single() {
        assert!(rank_descending(&[]).is_empty());
        assert_eq!(rank_descending(&[5.0]), vec![1]);
    }

    #[test]
    fn test_rank_matches_definition() {
        let values = [4.0, 7.0, 7.0, 1.0, 4.0, 4.0, 9.0];
        let ranks = rank_descending(&values);
        for (i, v) in values.iter().enumerate() {
            let greater = values.iter().filter(|&&o| o > *v).count() as u32;
            assert_eq!(ranks[i], greater + 1, "value {v}");
        }
    }
}
