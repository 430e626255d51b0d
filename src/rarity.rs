use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};

use crate::domain::{SiteId, SpeciesArea, SpeciesId};
use crate::stats;

/// Fraction of all distinct sites at which one species occurs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SpeciesProportion {
    pub species: SpeciesId,
    pub proportion: f64,
}

/// Computes each species' occurrence proportion: distinct sites holding the
/// species over total distinct sites in the dataset.
pub fn rarity_proportions<'a, I>(occurrences: I) -> Vec<SpeciesProportion>
where
    I: IntoIterator<Item = (&'a SpeciesId, &'a SiteId)>,
{
    let mut sites_by_species: BTreeMap<&'a SpeciesId, BTreeSet<&'a SiteId>> = BTreeMap::new();
    let mut all_sites: BTreeSet<&'a SiteId> = BTreeSet::new();
    for (species, site) in occurrences {
        sites_by_species.entry(species).or_default().insert(site);
        all_sites.insert(site);
    }
    let total = all_sites.len();
    if total == 0 {
        return Vec::new();
    }
    sites_by_species
        .into_iter()
        .map(|(species, sites)| SpeciesProportion {
            species: species.clone(),
            proportion: sites.len() as f64 / total as f64,
        })
        .collect()
}

/// Median over the per-species proportions. With one proportion per species
/// the per-species mean reduces to the proportion itself.
pub fn median_proportion(proportions: &[SpeciesProportion]) -> Option<f64> {
    let values: Vec<f64> = proportions.iter().map(|p| p.proportion).collect();
    stats::median(&values)
}

/// The rare set: species whose proportion is strictly below the median.
/// A proportion equal to the median is not rare. The threshold is
/// dataset-relative and must be recomputed per dataset.
pub fn rare_species(proportions: &[SpeciesProportion]) -> BTreeSet<SpeciesId> {
    let Some(median) = median_proportion(proportions) else {
        return BTreeSet::new();
    };
    proportions
        .iter()
        .filter(|p| p.proportion < median)
        .map(|p| p.species.clone())
        .collect()
}

/// Range-area rarity: sums `shape_area` per species, then marks species
/// whose summed area falls strictly below the median of the distinct
/// summed areas.
pub fn rare_by_range_area(areas: &[SpeciesArea]) -> BTreeSet<SpeciesId> {
    let mut summed: BTreeMap<&SpeciesId, f64> = BTreeMap::new();
    for area in areas {
        *summed.entry(&area.species).or_insert(0.0) += area.shape_area;
    }

    let mut distinct: Vec<f64> = summed.values().copied().collect();
    distinct.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));
    distinct.dedup();
    let Some(median) = stats::median(&distinct) else {
        return BTreeSet::new();
    };

    summed
        .into_iter()
        .filter(|&(_, total)| total < median)
        .map(|(species, _)| species.clone())
        .collect()
}
