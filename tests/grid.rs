use rand::SeedableRng;
use rand::rngs::StdRng;

use hotspot_mapper::domain::SitePoint;
use hotspot_mapper::grid::{band_degrees, build_lattice, sample_sites_by_grid};

fn point(site: &str, lat: f64, long: f64) -> SitePoint {
    SitePoint {
        site: site.parse().unwrap(),
        lat,
        long,
    }
}

// A 100 km band over four points spanning 2 degrees on each axis produces
// one cell per 0.9-degree subregion, and cells holding fewer than
// `sites_in_cell` points contribute nothing to the selection.
#[test]
fn two_degree_extent_with_100km_bands() {
    let points = vec![
        point("p1", 10.0, 20.0),
        point("p2", 10.1, 20.1),
        point("p3", 11.9, 21.9),
        point("p4", 11.95, 21.95),
    ];

    let band = band_degrees(100.0);
    assert!((band - 0.9).abs() < 1e-12);

    let lattice = build_lattice(10.0, 11.95, 20.0, 21.95, band);
    // Three 0.9-degree bands per axis cover the 2-degree extent.
    assert_eq!(lattice.len(), 9);

    let mut rng = StdRng::seed_from_u64(1);
    let selection = sample_sites_by_grid(&points, 100.0, 2, &mut rng).unwrap();

    // Every lattice cell keeps a centroid row.
    assert_eq!(selection.cells.len(), 9);
    // Only the two corner cells hold two points; each yields exactly two.
    let populated: Vec<_> = selection
        .cells
        .iter()
        .filter(|cell| !cell.sites.is_empty())
        .collect();
    assert_eq!(populated.len(), 2);
    for cell in populated {
        assert_eq!(cell.sites.len(), 2);
    }
    assert_eq!(selection.selected_site_count(), 4);
}

#[test]
fn centroids_are_recorded_even_for_dropped_cells() {
    let points = vec![point("lonely", 10.0, 20.0)];
    let mut rng = StdRng::seed_from_u64(5);
    let selection = sample_sites_by_grid(&points, 100.0, 3, &mut rng).unwrap();

    assert_eq!(selection.cells.len(), 1);
    assert!(selection.cells[0].sites.is_empty());
    let (_, cent_lat, cent_long) = selection.centroids()[0];
    // Centroid of the single cell around the lone point.
    assert!((cent_lat - (10.0 - 0.001 + 0.45)).abs() < 1e-9);
    assert!((cent_long - (20.0 - 0.001 + 0.45)).abs() < 1e-9);
}
