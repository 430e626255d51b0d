use std::collections::BTreeMap;

use rand::SeedableRng;
use rand::rngs::StdRng;
use serde::Serialize;
use tracing::{debug, info};

use crate::cache::SelectionCache;
use crate::config::ResolvedConfig;
use crate::domain::{
    CellId, CellRichness, NullPolicy, RangeRecord, Record, SitePoint, SiteRichness,
};
use crate::error::HotspotError;
use crate::grid;
use crate::hotspots;
use crate::loader;
use crate::rarity;
use crate::render::{CellLayer, CellLayerRow, MapRenderer, SiteLayer, SiteLayerRow};
use crate::richness;
use crate::stats;

/// Row counts and hotspot statistics for one emitted map layer.
#[derive(Debug, Clone, Serialize)]
pub struct LayerSummary {
    pub name: String,
    pub kind: String,
    pub rows: usize,
    pub non_null: usize,
    pub effective_count: usize,
    pub hotspots: usize,
}

/// Per-cell survey-vs-range richness pairing (the one-to-one comparison).
#[derive(Debug, Clone, Serialize)]
pub struct RichnessComparison {
    pub cell: CellId,
    pub cent_lat: f64,
    pub cent_long: f64,
    pub survey_richness: Option<f64>,
    pub range_richness: Option<f64>,
}

#[derive(Debug, Clone, Serialize)]
pub struct RunSummary {
    pub generated_at: String,
    pub band_width_km: f64,
    pub sites_in_cell: usize,
    pub hotspot_fraction: f64,
    pub selection_cached: bool,
    pub cells: usize,
    pub selected_sites: usize,
    pub layers: Vec<LayerSummary>,
    pub comparison: Vec<RichnessComparison>,
}

/// Sequences the full analysis: survey richness, rarity-adjusted richness,
/// range-map richness, range-area rarity, and the per-cell layers, handing
/// each layer to the renderer and returning the run summary.
pub struct Pipeline {
    config: ResolvedConfig,
}

impl Pipeline {
    pub fn new(config: ResolvedConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &ResolvedConfig {
        &self.config
    }

    pub fn run(&self, renderer: &dyn MapRenderer) -> Result<RunSummary, HotspotError> {
        let mut layers = Vec::new();

        // Survey data, site level.
        info!(path = %self.config.inputs.survey, "loading survey records");
        let survey = loader::read_survey(&self.config.inputs.survey)?;
        let survey_points: Vec<SitePoint> = survey.iter().map(Record::site_point).collect();

        let survey_rich = richness::richness_in_group(
            survey_points.iter().zip(survey.iter().map(|r| &r.species)),
        );
        self.emit_site_richness_layer(
            "survey_richness",
            &survey_rich,
            self.config.richness_bins,
            renderer,
            &mut layers,
        )?;

        // Rarity over the raw survey, before any bias correction.
        let raw_props =
            rarity::rarity_proportions(survey.iter().map(|r| (&r.species, &r.site)));
        let raw_rare = rarity::rare_species(&raw_props);
        debug!(species = raw_rare.len(), "rare species in unadjusted survey");
        let raw_rare_points: Vec<SitePoint> = survey
            .iter()
            .filter(|r| raw_rare.contains(&r.species))
            .map(Record::site_point)
            .collect();
        self.emit_point_layer(
            "survey_rare_sites",
            &grid::dedup_site_points(&raw_rare_points),
            renderer,
            &mut layers,
        );

        // Grid selection: cached once, reused on later runs.
        let cache = SelectionCache::new(self.config.inputs.selection_cache.clone());
        let (selection, selection_cached) = cache.load_or_build(|| {
            info!(
                band_width_km = self.config.band_width_km,
                sites_in_cell = self.config.sites_in_cell,
                "sampling sites by grid"
            );
            let mut rng = match self.config.seed {
                Some(seed) => StdRng::seed_from_u64(seed),
                None => StdRng::from_os_rng(),
            };
            grid::sample_sites_by_grid(
                &survey_points,
                self.config.band_width_km,
                self.config.sites_in_cell,
                &mut rng,
            )
        })?;
        info!(
            cells = selection.cells.len(),
            sites = selection.selected_site_count(),
            cached = selection_cached,
            "grid selection ready"
        );
        let site_cells = selection.site_cells();

        // Rarity over the bias-corrected selection.
        let selected_records: Vec<&Record> = survey
            .iter()
            .filter(|r| site_cells.contains_key(&r.site))
            .collect();
        let sel_props = rarity::rarity_proportions(
            selected_records.iter().map(|r| (&r.species, &r.site)),
        );
        let sel_rare = rarity::rare_species(&sel_props);
        let rare_records: Vec<&Record> = selected_records
            .iter()
            .filter(|r| sel_rare.contains(&r.species))
            .copied()
            .collect();
        let rare_points: Vec<SitePoint> =
            rare_records.iter().map(|r| r.site_point()).collect();
        let rare_rich = richness::richness_in_group(
            rare_points
                .iter()
                .zip(rare_records.iter().map(|r| &r.species)),
        );
        self.emit_site_richness_layer(
            "survey_rarity_richness",
            &rare_rich,
            self.config.rarity_bins,
            renderer,
            &mut layers,
        )?;

        // Range-map data, site level.
        info!(path = %self.config.inputs.range_map, "loading range-map records");
        let range = loader::read_range_map(&self.config.inputs.range_map)?;
        let range_points: Vec<SitePoint> = range.iter().map(|r| r.site_point()).collect();
        let range_rich = richness::richness_in_group(
            range_points.iter().zip(range.iter().map(|r| &r.sisid)),
        );
        self.emit_site_richness_layer(
            "range_richness",
            &range_rich,
            self.config.richness_bins,
            renderer,
            &mut layers,
        )?;

        let range_selected: Vec<&RangeRecord> = range
            .iter()
            .filter(|r| site_cells.contains_key(&r.site))
            .collect();
        let range_props = rarity::rarity_proportions(
            range_selected.iter().map(|r| (&r.sisid, &r.site)),
        );
        let range_rare_set = rarity::rare_species(&range_props);
        let range_rare: Vec<&RangeRecord> = range_selected
            .iter()
            .filter(|r| range_rare_set.contains(&r.sisid))
            .copied()
            .collect();
        let range_rare_points: Vec<SitePoint> =
            range_rare.iter().map(|r| r.site_point()).collect();
        let range_rare_rich = richness::richness_in_group(
            range_rare_points
                .iter()
                .zip(range_rare.iter().map(|r| &r.sisid)),
        );
        self.emit_site_richness_layer(
            "range_rarity_richness",
            &range_rare_rich,
            self.config.rarity_bins,
            renderer,
            &mut layers,
        )?;

        // Range-area rarity: species with small summed range polygons.
        info!(path = %self.config.inputs.species_area, "loading species areas");
        let areas = loader::read_species_areas(&self.config.inputs.species_area)?;
        let small_ranged = rarity::rare_by_range_area(&areas);
        let range_rich_by_site: BTreeMap<&str, f64> = range_rich
            .iter()
            .map(|r| (r.site.as_str(), f64::from(r.richness)))
            .collect();
        let small_range_points: Vec<SitePoint> = range
            .iter()
            .filter(|r| small_ranged.contains(&r.sisid))
            .map(|r| r.site_point())
            .collect();
        let small_range_sites: Vec<SiteRichness> =
            grid::dedup_site_points(&small_range_points)
                .into_iter()
                .filter_map(|point| {
                    range_rich_by_site.get(point.site.as_str()).map(|&value| {
                        SiteRichness {
                            site: point.site.clone(),
                            lat: point.lat,
                            long: point.long,
                            richness: value as u32,
                        }
                    })
                })
                .collect();
        self.emit_binned_site_layer(
            "small_range_richness",
            &small_range_sites,
            self.config.richness_bins,
            renderer,
            &mut layers,
        )?;

        // Cell layers over the selection lattice.
        let cells = selection.centroids();

        let survey_cell_rows = survey.iter().filter_map(|r| {
            site_cells.get(&r.site).map(|&cell| (cell, &r.species))
        });
        let survey_cells = richness::unique_cell_richness(survey_cell_rows, &cells);
        self.emit_cell_layer("survey_cell_richness", &survey_cells, renderer, &mut layers)?;

        info!(path = %self.config.inputs.cell_estimates, "loading cell richness estimates");
        let estimates = loader::read_cell_estimates(
            &self.config.inputs.cell_estimates,
            &self.config.estimate_column,
        )?;
        let estimate_by_cell: BTreeMap<CellId, f64> = estimates
            .iter()
            .map(|e| (e.cell, e.estimate))
            .collect();
        let estimated_cells: Vec<CellRichness> = cells
            .iter()
            .map(|&(cell, cent_lat, cent_long)| CellRichness {
                cell,
                cent_lat,
                cent_long,
                richness: estimate_by_cell.get(&cell).copied(),
            })
            .collect();
        self.emit_cell_layer(
            "estimated_cell_richness",
            &estimated_cells,
            renderer,
            &mut layers,
        )?;

        let range_cell_rows = range.iter().filter_map(|r| {
            site_cells.get(&r.site).map(|&cell| (cell, &r.spid))
        });
        let range_cells = richness::unique_cell_richness(range_cell_rows, &cells);
        self.emit_cell_layer("range_cell_richness", &range_cells, renderer, &mut layers)?;

        let rare_survey_rows = rare_records.iter().filter_map(|r| {
            site_cells.get(&r.site).map(|&cell| (cell, &r.species))
        });
        let rare_survey_cells = richness::unique_cell_richness(rare_survey_rows, &cells);
        self.emit_cell_layer(
            "rare_survey_cell_richness",
            &rare_survey_cells,
            renderer,
            &mut layers,
        )?;

        let rare_range_rows = range_rare.iter().filter_map(|r| {
            site_cells.get(&r.site).map(|&cell| (cell, &r.sisid))
        });
        let rare_range_cells = richness::unique_cell_richness(rare_range_rows, &cells);
        self.emit_cell_layer(
            "rare_range_cell_richness",
            &rare_range_cells,
            renderer,
            &mut layers,
        )?;

        // One-to-one comparison between the two cell richness measures.
        let comparison: Vec<RichnessComparison> = survey_cells
            .iter()
            .zip(range_cells.iter())
            .map(|(survey_cell, range_cell)| RichnessComparison {
                cell: survey_cell.cell,
                cent_lat: survey_cell.cent_lat,
                cent_long: survey_cell.cent_long,
                survey_richness: survey_cell.richness,
                range_richness: range_cell.richness,
            })
            .collect();

        Ok(RunSummary {
            generated_at: chrono::Utc::now().to_rfc3339(),
            band_width_km: self.config.band_width_km,
            sites_in_cell: self.config.sites_in_cell,
            hotspot_fraction: self.config.hotspot_fraction,
            selection_cached,
            cells: selection.cells.len(),
            selected_sites: selection.selected_site_count(),
            layers,
            comparison,
        })
    }

    /// Site layer with Strict hotspot selection and quantile color bins.
    fn emit_site_richness_layer(
        &self,
        name: &str,
        rich: &[SiteRichness],
        bins: usize,
        renderer: &dyn MapRenderer,
        layers: &mut Vec<LayerSummary>,
    ) -> Result<(), HotspotError> {
        let selection = hotspots::select_hotspots(
            rich,
            |r| Some(f64::from(r.richness)),
            NullPolicy::Strict,
            self.config.hotspot_fraction,
        )?;
        let layer = self.binned_layer(rich, bins, Some(&selection))?;
        renderer.site_layer(name, &layer);
        layers.push(LayerSummary {
            name: name.to_string(),
            kind: "site".to_string(),
            rows: layer.rows.len(),
            non_null: layer.rows.len(),
            effective_count: selection.effective_count,
            hotspots: selection.hotspot_count,
        });
        Ok(())
    }

    /// Site layer shaded by richness without hotspot selection.
    fn emit_binned_site_layer(
        &self,
        name: &str,
        rich: &[SiteRichness],
        bins: usize,
        renderer: &dyn MapRenderer,
        layers: &mut Vec<LayerSummary>,
    ) -> Result<(), HotspotError> {
        let layer = self.binned_layer(rich, bins, None)?;
        renderer.site_layer(name, &layer);
        layers.push(LayerSummary {
            name: name.to_string(),
            kind: "site".to_string(),
            rows: layer.rows.len(),
            non_null: layer.rows.len(),
            effective_count: layer.rows.len(),
            hotspots: 0,
        });
        Ok(())
    }

    fn binned_layer(
        &self,
        rich: &[SiteRichness],
        bins: usize,
        selection: Option<&hotspots::HotspotSelection>,
    ) -> Result<SiteLayer, HotspotError> {
        let values: Vec<f64> = rich.iter().map(|r| f64::from(r.richness)).collect();
        let assigned = stats::quantile_bins(&values, bins)?;
        let flags = selection
            .map(|s| s.flags(rich.len()))
            .unwrap_or_else(|| vec![false; rich.len()]);
        Ok(SiteLayer {
            rows: rich
                .iter()
                .enumerate()
                .map(|(index, r)| SiteLayerRow {
                    site: r.site.clone(),
                    lat: r.lat,
                    long: r.long,
                    richness: Some(f64::from(r.richness)),
                    bin: Some(assigned[index]),
                    hotspot: flags[index],
                })
                .collect(),
        })
    }

    /// Bare site points (rare-occurrence maps carry no richness value).
    fn emit_point_layer(
        &self,
        name: &str,
        points: &[SitePoint],
        renderer: &dyn MapRenderer,
        layers: &mut Vec<LayerSummary>,
    ) {
        let layer = SiteLayer {
            rows: points
                .iter()
                .map(|point| SiteLayerRow {
                    site: point.site.clone(),
                    lat: point.lat,
                    long: point.long,
                    richness: None,
                    bin: None,
                    hotspot: false,
                })
                .collect(),
        };
        renderer.site_layer(name, &layer);
        layers.push(LayerSummary {
            name: name.to_string(),
            kind: "site".to_string(),
            rows: layer.rows.len(),
            non_null: 0,
            effective_count: layer.rows.len(),
            hotspots: 0,
        });
    }

    /// Cell layer with ExcludeNulls hotspot selection: empty cells stay on
    /// the map as nulls but never enter the percentile denominator.
    fn emit_cell_layer(
        &self,
        name: &str,
        cells: &[CellRichness],
        renderer: &dyn MapRenderer,
        layers: &mut Vec<LayerSummary>,
    ) -> Result<(), HotspotError> {
        let selection = hotspots::select_hotspots(
            cells,
            |c| c.richness,
            NullPolicy::ExcludeNulls,
            self.config.hotspot_fraction,
        )?;
        let flags = selection.flags(cells.len());
        let layer = CellLayer {
            rows: cells
                .iter()
                .enumerate()
                .map(|(index, cell)| CellLayerRow {
                    cell: cell.cell,
                    cent_lat: cell.cent_lat,
                    cent_long: cell.cent_long,
                    richness: cell.richness,
                    hotspot: flags[index],
                })
                .collect(),
        };
        renderer.cell_layer(name, &layer);
        layers.push(LayerSummary {
            name: name.to_string(),
            kind: "cell".to_string(),
            rows: cells.len(),
            non_null: cells.iter().filter(|c| c.richness.is_some()).count(),
            effective_count: selection.effective_count,
            hotspots: selection.hotspot_count,
        });
        Ok(())
    }
}
