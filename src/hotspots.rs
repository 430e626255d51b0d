use std::cmp::Ordering;

use serde::Serialize;

use crate::domain::NullPolicy;
use crate::error::HotspotError;

/// Result of one hotspot selection: the chosen row indices in descending
/// richness order, plus the counts that produced them.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HotspotSelection {
    pub selected: Vec<usize>,
    pub effective_count: usize,
    pub hotspot_count: usize,
}

impl HotspotSelection {
    /// Per-row hotspot flags for a table of `len` rows. Unselected rows are
    /// simply false; there is no third state.
    pub fn flags(&self, len: usize) -> Vec<bool> {
        let mut flags = vec![false; len];
        for &index in &self.selected {
            flags[index] = true;
        }
        flags
    }
}

/// Ranks rows by richness (stable descending sort, nulls last) and selects
/// the top `ceil(fraction * effective_count)`. Under `NullPolicy::Strict`
/// the effective count is the full row count; under `ExcludeNulls` the
/// null-richness rows are removed from the denominator so empty cells never
/// count toward the percentile nor appear as hotspots. Ties at the
/// percentile boundary follow the stable sort order and are not broken.
pub fn select_hotspots<T, F>(
    rows: &[T],
    richness: F,
    policy: NullPolicy,
    fraction: f64,
) -> Result<HotspotSelection, HotspotError>
where
    F: Fn(&T) -> Option<f64>,
{
    if !(fraction > 0.0 && fraction <= 1.0) {
        return Err(HotspotError::InvalidParameter(format!(
            "hotspot fraction must be in (0, 1], got {fraction}"
        )));
    }

    let values: Vec<Option<f64>> = rows.iter().map(&richness).collect();
    let mut order: Vec<usize> = (0..rows.len()).collect();
    order.sort_by(|&a, &b| match (values[a], values[b]) {
        (Some(x), Some(y)) => y.partial_cmp(&x).unwrap_or(Ordering::Equal),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    });

    let non_null = values.iter().filter(|v| v.is_some()).count();
    let effective_count = match policy {
        NullPolicy::Strict => rows.len(),
        NullPolicy::ExcludeNulls => non_null,
    };
    // Null rows are never selectable even when Strict counts them.
    let hotspot_count = ((fraction * effective_count as f64).ceil() as usize).min(non_null);

    Ok(HotspotSelection {
        selected: order[..hotspot_count].to_vec(),
        effective_count,
        hotspot_count,
    })
}
