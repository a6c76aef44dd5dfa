//! Classification metrics
//!
//! Walk-forward folds on direction labels are routinely imbalanced, so the
//! evaluation metric is the area under the precision-recall curve rather
//! than accuracy or ROC AUC.

/// Area under the precision-recall curve (average precision).
///
/// Computed as the step-wise sum `Σ (R_i − R_{i−1})·P_i` over predictions
/// sorted by descending score. Returns 0.0 when the window holds no
/// positive labels at all.
pub fn average_precision(y_true: &[f64], y_score: &[f64]) -> f64 {
    debug_assert_eq!(y_true.len(), y_score.len());

    let n_pos = y_true.iter().filter(|&&y| y == 1.0).count();
    if n_pos == 0 {
        return 0.0;
    }

    let mut order: Vec<usize> = (0..y_true.len()).collect();
    order.sort_by(|&a, &b| {
        y_score[b]
            .partial_cmp(&y_score[a])
            .unwrap_or(std::cmp::Ordering::Equal)
    });

    let mut true_positives = 0.0;
    let mut ap = 0.0;
    for (rank, &i) in order.iter().enumerate() {
        if y_true[i] == 1.0 {
            true_positives += 1.0;
            let precision = true_positives / (rank + 1) as f64;
            ap += precision / n_pos as f64;
        }
    }
    ap
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_perfect_ranking() {
        let y_true = vec![1.0, 1.0, 0.0, 0.0];
        let y_score = vec![0.9, 0.8, 0.3, 0.1];
        assert!((average_precision(&y_true, &y_score) - 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_inverted_ranking_is_poor() {
        let y_true = vec![0.0, 0.0, 1.0, 1.0];
        let y_score = vec![0.9, 0.8, 0.3, 0.1];
        let ap = average_precision(&y_true, &y_score);
        assert!(ap < 0.6);
        assert!(ap > 0.0);
    }

    #[test]
    fn test_known_mixed_ranking() {
        // Order by score: 1, 0, 1, 0 -> precisions 1/1 and 2/3
        let y_true = vec![1.0, 0.0, 1.0, 0.0];
        let y_score = vec![0.9, 0.8, 0.7, 0.1];
        let expected = (1.0 + 2.0 / 3.0) / 2.0;
        assert!((average_precision(&y_true, &y_score) - expected).abs() < 1e-12);
    }

    #[test]
    fn test_no_positives_scores_zero() {
        let y_true = vec![0.0, 0.0, 0.0];
        let y_score = vec![0.9, 0.5, 0.1];
        assert_eq!(average_precision(&y_true, &y_score), 0.0);
    }
}
