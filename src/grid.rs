use std::collections::BTreeMap;

use rand::Rng;
use rand::seq::index;
use serde::{Deserialize, Serialize};

use crate::domain::{CellId, SiteId, SitePoint};
use crate::error::HotspotError;

/// Fixed-radius circumference used to convert a physical band width into a
/// degree span. A documented approximation: longitude bands are not scaled
/// by latitude, so cells are not narrowed toward the poles.
pub const EARTH_CIRCUMFERENCE_KM: f64 = 40_000.0;

/// Offset subtracted from the minimum observed coordinate so the first
/// cell's lower edge sits strictly below every input point.
pub const GRID_EDGE_EPSILON: f64 = 0.001;

pub fn band_degrees(band_width_km: f64) -> f64 {
    band_width_km / EARTH_CIRCUMFERENCE_KM * 360.0
}

/// One rectangular cell of the lattice. Membership is strict-interior on
/// both axes: points exactly on a shared edge belong to neither neighbor.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CellBounds {
    pub id: CellId,
    pub lat_start: f64,
    pub lat_end: f64,
    pub long_start: f64,
    pub long_end: f64,
}

impl CellBounds {
    pub fn contains(&self, lat: f64, long: f64) -> bool {
        lat > self.lat_start && lat < self.lat_end && long > self.long_start && long < self.long_end
    }

    /// Arithmetic mean of the four corner coordinates.
    pub fn centroid(&self) -> (f64, f64) {
        let corners = [
            (self.lat_start, self.long_start),
            (self.lat_start, self.long_end),
            (self.lat_end, self.long_start),
            (self.lat_end, self.long_end),
        ];
        let cent_lat = corners.iter().map(|c| c.0).sum::<f64>() / corners.len() as f64;
        let cent_long = corners.iter().map(|c| c.1).sum::<f64>() / corners.len() as f64;
        (cent_lat, cent_long)
    }
}

/// One cell of the grid selection: always carries its centroid; carries
/// exactly `sites_in_cell` sampled sites, or none if the cell was dropped.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CellSelection {
    pub id: CellId,
    pub cent_lat: f64,
    pub cent_long: f64,
    pub sites: Vec<SitePoint>,
}

/// The bias-corrected sample of sites, grouped per cell in raster order.
/// Every lattice cell is present; under-populated cells keep an empty site
/// list rather than a partial sample.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct GridSelection {
    pub cells: Vec<CellSelection>,
}

impl GridSelection {
    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }

    /// One (cellid, cent_lat, cent_long) tuple per lattice cell.
    pub fn centroids(&self) -> Vec<(CellId, f64, f64)> {
        self.cells
            .iter()
            .map(|cell| (cell.id, cell.cent_lat, cell.cent_long))
            .collect()
    }

    /// All selected sites with the cell they were drawn for.
    pub fn selected_sites(&self) -> impl Iterator<Item = (&CellSelection, &SitePoint)> {
        self.cells
            .iter()
            .flat_map(|cell| cell.sites.iter().map(move |site| (cell, site)))
    }

    pub fn selected_site_count(&self) -> usize {
        self.cells.iter().map(|cell| cell.sites.len()).sum()
    }

    /// Lookup from selected site id to its cell.
    pub fn site_cells(&self) -> BTreeMap<SiteId, CellId> {
        self.selected_sites()
            .map(|(cell, site)| (site.site.clone(), cell.id))
            .collect()
    }
}

/// Builds the lattice over the given bounding box. Cells abut without gaps
/// or overlap; ids increase in raster order (latitude bands from the
/// minimum upward, longitude left to right within each band). A sweep ends
/// once the band's lower edge reaches the observed maximum.
pub fn build_lattice(
    min_lat: f64,
    max_lat: f64,
    min_long: f64,
    max_long: f64,
    band: f64,
) -> Vec<CellBounds> {
    let mut cells = Vec::new();
    let mut next_id = 0u32;
    let mut lat_start = min_lat - GRID_EDGE_EPSILON;
    let mut lat_end = lat_start;
    while lat_end < max_lat {
        lat_end = lat_start + band;
        let mut long_start = min_long - GRID_EDGE_EPSILON;
        let mut long_end = long_start;
        while long_end < max_long {
            long_end = long_start + band;
            next_id += 1;
            cells.push(CellBounds {
                id: CellId::new(next_id),
                lat_start,
                lat_end,
                long_start,
                long_end,
            });
            long_start = long_end;
        }
        lat_start = lat_end;
    }
    cells
}

/// Deduplicates (site, lat, long) tuples, keeping first occurrence order.
pub fn dedup_site_points(points: &[SitePoint]) -> Vec<SitePoint> {
    let mut seen = std::collections::BTreeSet::new();
    let mut unique = Vec::new();
    for point in points {
        let key = (
            point.site.clone(),
            point.lat.to_bits(),
            point.long.to_bits(),
        );
        if seen.insert(key) {
            unique.push(point.clone());
        }
    }
    unique
}

/// Partitions the deduplicated site tuples into a lattice of
/// `band_width_km`-sized cells and draws exactly `sites_in_cell` sites
/// uniformly without replacement from every cell holding at least that
/// many. Cells with fewer sites contribute no sites to the selection but
/// their centroids are still recorded.
pub fn sample_sites_by_grid<R: Rng>(
    points: &[SitePoint],
    band_width_km: f64,
    sites_in_cell: usize,
    rng: &mut R,
) -> Result<GridSelection, HotspotError> {
    if sites_in_cell == 0 {
        return Err(HotspotError::InvalidParameter(
            "sites_in_cell must be positive".to_string(),
        ));
    }
    if !(band_width_km > 0.0) {
        return Err(HotspotError::InvalidParameter(
            "band width must be positive".to_string(),
        ));
    }

    let points = dedup_site_points(points);
    if points.is_empty() {
        return Ok(GridSelection::default());
    }

    let min_lat = points.iter().map(|p| p.lat).fold(f64::INFINITY, f64::min);
    let max_lat = points
        .iter()
        .map(|p| p.lat)
        .fold(f64::NEG_INFINITY, f64::max);
    let min_long = points.iter().map(|p| p.long).fold(f64::INFINITY, f64::min);
    let max_long = points
        .iter()
        .map(|p| p.long)
        .fold(f64::NEG_INFINITY, f64::max);

    let band = band_degrees(band_width_km);
    let lattice = build_lattice(min_lat, max_lat, min_long, max_long, band);

    let mut cells = Vec::with_capacity(lattice.len());
    for bounds in &lattice {
        let candidates: Vec<&SitePoint> = points
            .iter()
            .filter(|p| bounds.contains(p.lat, p.long))
            .collect();
        let (cent_lat, cent_long) = bounds.centroid();
        let sites = if candidates.len() >= sites_in_cell {
            index::sample(rng, candidates.len(), sites_in_cell)
                .iter()
                .map(|i| candidates[i].clone())
                .collect()
        } else {
            Vec::new()
        };
        cells.push(CellSelection {
            id: bounds.id,
            cent_lat,
            cent_long,
            sites,
        });
    }

    Ok(GridSelection { cells })
}

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    use super::*;

    fn point(site: &str, lat: f64, long: f64) -> SitePoint {
        SitePoint {
            site: site.parse().unwrap(),
            lat,
            long,
        }
    }

    #[test]
    fn band_width_100km_is_point_nine_degrees() {
        assert!((band_degrees(100.0) - 0.9).abs() < 1e-12);
    }

    #[test]
    fn lattice_tiles_without_gaps_or_overlap() {
        let cells = build_lattice(10.0, 12.0, 20.0, 22.0, 0.9);
        assert!(!cells.is_empty());

        for window in cells.windows(2) {
            assert!(window[0].id < window[1].id);
        }
        // Bands abut exactly.
        for (a, b) in cells.iter().zip(cells.iter().skip(1)) {
            if (a.lat_start - b.lat_start).abs() < 1e-12 {
                assert!((a.long_end - b.long_start).abs() < 1e-12);
            }
        }
        // Union covers the bounding box of the inputs.
        let max_lat_edge = cells.iter().map(|c| c.lat_end).fold(f64::MIN, f64::max);
        let max_long_edge = cells.iter().map(|c| c.long_end).fold(f64::MIN, f64::max);
        assert!(max_lat_edge >= 12.0);
        assert!(max_long_edge >= 22.0);
    }

    #[test]
    fn boundary_points_belong_to_no_cell() {
        let cell = CellBounds {
            id: CellId::new(1),
            lat_start: 0.0,
            lat_end: 1.0,
            long_start: 0.0,
            long_end: 1.0,
        };
        assert!(cell.contains(0.5, 0.5));
        assert!(!cell.contains(0.0, 0.5));
        assert!(!cell.contains(1.0, 0.5));
        assert!(!cell.contains(0.5, 1.0));
    }

    #[test]
    fn centroid_is_mean_of_corners() {
        let cell = CellBounds {
            id: CellId::new(1),
            lat_start: 10.0,
            lat_end: 10.9,
            long_start: -5.0,
            long_end: -4.1,
        };
        let (lat, long) = cell.centroid();
        assert!((lat - 10.45).abs() < 1e-12);
        assert!((long + 4.55).abs() < 1e-12);
    }

    #[test]
    fn selection_draws_exact_count_or_nothing() {
        let points = vec![
            point("a", 10.1, 20.1),
            point("b", 10.2, 20.2),
            point("c", 10.3, 20.3),
            // far away, alone in its cell
            point("d", 11.9, 21.9),
        ];
        let mut rng = StdRng::seed_from_u64(7);
        let selection = sample_sites_by_grid(&points, 100.0, 2, &mut rng).unwrap();

        for cell in &selection.cells {
            assert!(cell.sites.is_empty() || cell.sites.len() == 2);
        }
        assert_eq!(selection.selected_site_count(), 2);
    }

    #[test]
    fn every_retained_site_is_inside_exactly_one_cell() {
        let points = vec![
            point("a", 10.1, 20.1),
            point("b", 10.2, 20.2),
            point("c", 11.5, 21.5),
            point("d", 11.6, 21.6),
        ];
        let mut rng = StdRng::seed_from_u64(3);
        let selection = sample_sites_by_grid(&points, 100.0, 2, &mut rng).unwrap();

        let band = band_degrees(100.0);
        let lattice = build_lattice(10.1, 11.6, 20.1, 21.6, band);
        for (_, site) in selection.selected_sites() {
            let holding: Vec<_> = lattice
                .iter()
                .filter(|c| c.contains(site.lat, site.long))
                .collect();
            assert_eq!(holding.len(), 1);
        }
    }

    #[test]
    fn duplicate_site_tuples_collapse_before_sampling() {
        let points = vec![
            point("a", 10.1, 20.1),
            point("a", 10.1, 20.1),
            point("b", 10.2, 20.2),
        ];
        assert_eq!(dedup_site_points(&points).len(), 2);
    }

    #[test]
    fn empty_input_yields_no_cells() {
        let mut rng = StdRng::seed_from_u64(1);
        let selection = sample_sites_by_grid(&[], 100.0, 3, &mut rng).unwrap();
        assert!(selection.is_empty());
    }

    #[test]
    fn zero_sites_in_cell_is_rejected() {
        let mut rng = StdRng::seed_from_u64(1);
        let err = sample_sites_by_grid(&[point("a", 1.0, 1.0)], 100.0, 0, &mut rng).unwrap_err();
        assert_matches!(err, HotspotError::InvalidParameter(_));
    }

    #[test]
    fn seeded_sampling_is_reproducible() {
        let points: Vec<SitePoint> = (0..20)
            .map(|i| point(&format!("s{i}"), 10.0 + 0.01 * i as f64, 20.0 + 0.01 * i as f64))
            .collect();
        let mut rng_a = StdRng::seed_from_u64(42);
        let mut rng_b = StdRng::seed_from_u64(42);
        let a = sample_sites_by_grid(&points, 100.0, 3, &mut rng_a).unwrap();
        let b = sample_sites_by_grid(&points, 100.0, 3, &mut rng_b).unwrap();
        assert_eq!(a, b);
    }
}
