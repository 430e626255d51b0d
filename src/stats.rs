use crate::error::HotspotError;

/// Median of a sample. Even-length samples average the two middle values.
pub fn median(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    let mut sorted = values.to_vec();
    sorted.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));
    let mid = sorted.len() / 2;
    if sorted.len() % 2 == 1 {
        Some(sorted[mid])
    } else {
        Some((sorted[mid - 1] + sorted[mid]) / 2.0)
    }
}

/// Rank-based quantile binning: assigns each value a bin index in
/// `0..bins` so the bins hold (near-)equal numbers of values. Ties keep
/// their stable input order, so equal values can straddle a bin edge.
pub fn quantile_bins(values: &[f64], bins: usize) -> Result<Vec<usize>, HotspotError> {
    if bins == 0 {
        return Err(HotspotError::InvalidParameter(
            "quantile bin count must be positive".to_string(),
        ));
    }
    if values.is_empty() {
        return Ok(Vec::new());
    }
    let mut order: Vec<usize> = (0..values.len()).collect();
    order.sort_by(|&a, &b| {
        values[a]
            .partial_cmp(&values[b])
            .unwrap_or(std::cmp::Ordering::Equal)
    });
    let mut assigned = vec![0usize; values.len()];
    for (rank, &index) in order.iter().enumerate() {
        let bin = rank * bins / values.len();
        assigned[index] = bin.min(bins - 1);
    }
    Ok(assigned)
}

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;

    use super::*;

    #[test]
    fn median_of_empty_is_none() {
        assert_eq!(median(&[]), None);
    }

    #[test]
    fn median_odd_and_even() {
        assert_eq!(median(&[3.0, 1.0, 2.0]), Some(2.0));
        assert_eq!(median(&[4.0, 1.0, 3.0, 2.0]), Some(2.5));
    }

    #[test]
    fn quantile_bins_split_by_rank() {
        let bins = quantile_bins(&[10.0, 1.0, 5.0, 7.0], 2).unwrap();
        assert_eq!(bins, vec![1, 0, 0, 1]);
    }

    #[test]
    fn quantile_bins_reject_zero_bins() {
        let err = quantile_bins(&[1.0], 0).unwrap_err();
        assert_matches!(err, HotspotError::InvalidParameter(_));
    }

    #[test]
    fn quantile_bins_cap_at_last_bin() {
        let bins = quantile_bins(&[1.0, 2.0, 3.0], 10).unwrap();
        assert!(bins.iter().all(|&b| b < 10));
    }
}
