use std::collections::{BTreeMap, BTreeSet};

use crate::domain::{CellId, CellRichness, SitePoint, SiteRichness, SpeciesId};

/// Counts distinct species per (site, lat, long) key. Keys with zero rows
/// simply do not appear; the caller left-joins against a reference key list
/// when absent keys must surface as nulls.
pub fn richness_in_group<'a, I>(rows: I) -> Vec<SiteRichness>
where
    I: IntoIterator<Item = (&'a SitePoint, &'a SpeciesId)>,
{
    let mut groups: BTreeMap<(&'a str, u64, u64), (&'a SitePoint, BTreeSet<&'a SpeciesId>)> =
        BTreeMap::new();
    for (point, species) in rows {
        let key = (point.site.as_str(), point.lat.to_bits(), point.long.to_bits());
        groups
            .entry(key)
            .or_insert_with(|| (point, BTreeSet::new()))
            .1
            .insert(species);
    }
    groups
        .into_values()
        .map(|(point, species)| SiteRichness {
            site: point.site.clone(),
            lat: point.lat,
            long: point.long,
            richness: species.len() as u32,
        })
        .collect()
}

/// Distinct-species counts per cell, left-joined against the full cell list
/// so cells without qualifying records appear with null richness. Counts of
/// one are excluded before the join (single-occurrence artifacts do not
/// qualify as cell richness).
pub fn unique_cell_richness<'a, I>(
    rows: I,
    cells: &[(CellId, f64, f64)],
) -> Vec<CellRichness>
where
    I: IntoIterator<Item = (CellId, &'a SpeciesId)>,
{
    let mut groups: BTreeMap<CellId, BTreeSet<&'a SpeciesId>> = BTreeMap::new();
    for (cell, species) in rows {
        groups.entry(cell).or_default().insert(species);
    }
    let counts: BTreeMap<CellId, u32> = groups
        .into_iter()
        .map(|(cell, species)| (cell, species.len() as u32))
        .filter(|&(_, count)| count > 1)
        .collect();

    cells
        .iter()
        .map(|&(cell, cent_lat, cent_long)| CellRichness {
            cell,
            cent_lat,
            cent_long,
            richness: counts.get(&cell).map(|&count| f64::from(count)),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn point(site: &str, lat: f64, long: f64) -> SitePoint {
        SitePoint {
            site: site.parse().unwrap(),
            lat,
            long,
        }
    }

    fn species(id: &str) -> SpeciesId {
        id.parse().unwrap()
    }

    #[test]
    fn counts_distinct_species_per_site() {
        let a = point("a", 1.0, 2.0);
        let b = point("b", 3.0, 4.0);
        let (s1, s2, s3) = (species("s1"), species("s2"), species("s3"));
        let rows = vec![(&a, &s1), (&a, &s2), (&a, &s2), (&b, &s3)];

        let richness = richness_in_group(rows);
        assert_eq!(richness.len(), 2);
        let by_site: BTreeMap<&str, u32> = richness
            .iter()
            .map(|r| (r.site.as_str(), r.richness))
            .collect();
        assert_eq!(by_site["a"], 2);
        assert_eq!(by_site["b"], 1);
    }

    #[test]
    fn richness_is_monotone_in_added_species() {
        let a = point("a", 1.0, 2.0);
        let (s1, s2) = (species("s1"), species("s2"));
        let before = richness_in_group(vec![(&a, &s1)]);
        let after = richness_in_group(vec![(&a, &s1), (&a, &s2)]);
        assert!(after[0].richness >= before[0].richness);
    }

    #[test]
    fn cell_richness_left_join_keeps_empty_cells_null() {
        let cells = vec![
            (CellId::new(1), 0.45, 0.45),
            (CellId::new(2), 0.45, 1.35),
        ];
        let (s1, s2) = (species("s1"), species("s2"));
        let rows = vec![
            (CellId::new(1), &s1),
            (CellId::new(1), &s2),
        ];

        let richness = unique_cell_richness(rows, &cells);
        assert_eq!(richness.len(), 2);
        assert_eq!(richness[0].richness, Some(2.0));
        assert_eq!(richness[1].richness, None);
    }

    #[test]
    fn single_species_cells_do_not_qualify() {
        let cells = vec![(CellId::new(1), 0.45, 0.45)];
        let s1 = species("s1");
        let rows = vec![(CellId::new(1), &s1), (CellId::new(1), &s1)];

        let richness = unique_cell_richness(rows, &cells);
        assert_eq!(richness[0].richness, None);
    }

    #[test]
    fn empty_group_is_null_never_zero() {
        let cells = vec![(CellId::new(9), 1.0, 1.0)];
        let richness = unique_cell_richness(Vec::<(CellId, &SpeciesId)>::new(), &cells);
        assert_eq!(richness[0].richness, None);
    }
}
