use std::fs;

use camino::Utf8PathBuf;
use serde::{Deserialize, Serialize};

use crate::error::HotspotError;

pub const DEFAULT_BAND_WIDTH_KM: f64 = 100.0;
pub const DEFAULT_SITES_IN_CELL: usize = 3;
pub const DEFAULT_HOTSPOT_FRACTION: f64 = 0.05;
pub const DEFAULT_RICHNESS_BINS: usize = 10;
pub const DEFAULT_RARITY_BINS: usize = 2;
pub const DEFAULT_ESTIMATE_COLUMN: &str = "Jack1ab";

pub const DEFAULT_SURVEY_FILE: &str = "bbs_abundances_by_site.csv";
pub const DEFAULT_RANGE_MAP_FILE: &str = "rangemap_species.csv";
pub const DEFAULT_SPECIES_AREA_FILE: &str = "species_area.csv";
pub const DEFAULT_CELL_ESTIMATES_FILE: &str = "cell_estimates.csv";
pub const DEFAULT_SELECTION_CACHE_FILE: &str = "selected_sites.csv";

#[derive(Debug, Default, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub inputs: Option<InputsEntry>,
    #[serde(default)]
    pub band_width_km: Option<f64>,
    #[serde(default)]
    pub sites_in_cell: Option<i64>,
    #[serde(default)]
    pub hotspot_fraction: Option<f64>,
    #[serde(default)]
    pub richness_bins: Option<usize>,
    #[serde(default)]
    pub rarity_bins: Option<usize>,
    #[serde(default)]
    pub estimate_column: Option<String>,
    #[serde(default)]
    pub seed: Option<u64>,
}

#[derive(Debug, Default, Deserialize, Serialize)]
pub struct InputsEntry {
    #[serde(default)]
    pub survey: Option<String>,
    #[serde(default)]
    pub range_map: Option<String>,
    #[serde(default)]
    pub species_area: Option<String>,
    #[serde(default)]
    pub cell_estimates: Option<String>,
    #[serde(default)]
    pub selection_cache: Option<String>,
}

#[derive(Debug, Clone)]
pub struct InputPaths {
    pub survey: Utf8PathBuf,
    pub range_map: Utf8PathBuf,
    pub species_area: Utf8PathBuf,
    pub cell_estimates: Utf8PathBuf,
    pub selection_cache: Utf8PathBuf,
}

#[derive(Debug, Clone)]
pub struct ResolvedConfig {
    pub inputs: InputPaths,
    pub band_width_km: f64,
    pub sites_in_cell: usize,
    pub hotspot_fraction: f64,
    pub richness_bins: usize,
    pub rarity_bins: usize,
    pub estimate_column: String,
    pub seed: Option<u64>,
}

impl Default for ResolvedConfig {
    fn default() -> Self {
        Self {
            inputs: InputPaths {
                survey: Utf8PathBuf::from(DEFAULT_SURVEY_FILE),
                range_map: Utf8PathBuf::from(DEFAULT_RANGE_MAP_FILE),
                species_area: Utf8PathBuf::from(DEFAULT_SPECIES_AREA_FILE),
                cell_estimates: Utf8PathBuf::from(DEFAULT_CELL_ESTIMATES_FILE),
                selection_cache: Utf8PathBuf::from(DEFAULT_SELECTION_CACHE_FILE),
            },
            band_width_km: DEFAULT_BAND_WIDTH_KM,
            sites_in_cell: DEFAULT_SITES_IN_CELL,
            hotspot_fraction: DEFAULT_HOTSPOT_FRACTION,
            richness_bins: DEFAULT_RICHNESS_BINS,
            rarity_bins: DEFAULT_RARITY_BINS,
            estimate_column: DEFAULT_ESTIMATE_COLUMN.to_string(),
            seed: None,
        }
    }
}

pub struct ConfigLoader;

impl ConfigLoader {
    /// Resolves the run configuration. Without an explicit path the
    /// compiled-in defaults apply; with one, the JSON file overrides any
    /// field it names and everything else stays at the defaults.
    pub fn resolve(path: Option<&str>) -> Result<ResolvedConfig, HotspotError> {
        let Some(path) = path else {
            return Ok(ResolvedConfig::default());
        };
        let config_path = Utf8PathBuf::from(path);
        let content = fs::read_to_string(config_path.as_std_path())
            .map_err(|_| HotspotError::ConfigRead(config_path.clone()))?;
        let config: Config = serde_json::from_str(&content)
            .map_err(|err| HotspotError::ConfigParse(err.to_string()))?;
        Self::resolve_config(config)
    }

    pub fn resolve_config(config: Config) -> Result<ResolvedConfig, HotspotError> {
        let defaults = ResolvedConfig::default();
        let inputs = config.inputs.unwrap_or_default();

        let sites_in_cell = match config.sites_in_cell {
            Some(value) if value <= 0 => {
                return Err(HotspotError::InvalidParameter(format!(
                    "sites_in_cell must be positive, got {value}"
                )));
            }
            Some(value) => value as usize,
            None => defaults.sites_in_cell,
        };

        let band_width_km = config.band_width_km.unwrap_or(defaults.band_width_km);
        if !(band_width_km > 0.0) {
            return Err(HotspotError::InvalidParameter(format!(
                "band_width_km must be positive, got {band_width_km}"
            )));
        }

        let hotspot_fraction = config
            .hotspot_fraction
            .unwrap_or(defaults.hotspot_fraction);
        if !(hotspot_fraction > 0.0 && hotspot_fraction <= 1.0) {
            return Err(HotspotError::InvalidParameter(format!(
                "hotspot_fraction must be in (0, 1], got {hotspot_fraction}"
            )));
        }

        let richness_bins = config.richness_bins.unwrap_or(defaults.richness_bins);
        let rarity_bins = config.rarity_bins.unwrap_or(defaults.rarity_bins);
        if richness_bins == 0 || rarity_bins == 0 {
            return Err(HotspotError::InvalidParameter(
                "bin counts must be positive".to_string(),
            ));
        }

        Ok(ResolvedConfig {
            inputs: InputPaths {
                survey: inputs
                    .survey
                    .map(Utf8PathBuf::from)
                    .unwrap_or(defaults.inputs.survey),
                range_map: inputs
                    .range_map
                    .map(Utf8PathBuf::from)
                    .unwrap_or(defaults.inputs.range_map),
                species_area: inputs
                    .species_area
                    .map(Utf8PathBuf::from)
                    .unwrap_or(defaults.inputs.species_area),
                cell_estimates: inputs
                    .cell_estimates
                    .map(Utf8PathBuf::from)
                    .unwrap_or(defaults.inputs.cell_estimates),
                selection_cache: inputs
                    .selection_cache
                    .map(Utf8PathBuf::from)
                    .unwrap_or(defaults.inputs.selection_cache),
            },
            band_width_km,
            sites_in_cell,
            hotspot_fraction,
            richness_bins,
            rarity_bins,
            estimate_column: config
                .estimate_column
                .unwrap_or(defaults.estimate_column),
            seed: config.seed,
        })
    }
}

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;

    use super::*;

    #[test]
    fn defaults_match_the_analysis_constants() {
        let resolved = ConfigLoader::resolve(None).unwrap();
        assert_eq!(resolved.band_width_km, 100.0);
        assert_eq!(resolved.sites_in_cell, 3);
        assert_eq!(resolved.hotspot_fraction, 0.05);
        assert_eq!(resolved.estimate_column, "Jack1ab");
        assert_eq!(resolved.inputs.selection_cache.as_str(), "selected_sites.csv");
    }

    #[test]
    fn partial_config_overrides_only_named_fields() {
        let config = Config {
            sites_in_cell: Some(5),
            seed: Some(11),
            ..Config::default()
        };
        let resolved = ConfigLoader::resolve_config(config).unwrap();
        assert_eq!(resolved.sites_in_cell, 5);
        assert_eq!(resolved.seed, Some(11));
        assert_eq!(resolved.band_width_km, 100.0);
    }

    #[test]
    fn non_positive_sites_in_cell_is_rejected() {
        let config = Config {
            sites_in_cell: Some(0),
            ..Config::default()
        };
        let err = ConfigLoader::resolve_config(config).unwrap_err();
        assert_matches!(err, HotspotError::InvalidParameter(_));

        let config = Config {
            sites_in_cell: Some(-3),
            ..Config::default()
        };
        let err = ConfigLoader::resolve_config(config).unwrap_err();
        assert_matches!(err, HotspotError::InvalidParameter(_));
    }

    #[test]
    fn out_of_range_fraction_is_rejected() {
        let config = Config {
            hotspot_fraction: Some(1.5),
            ..Config::default()
        };
        let err = ConfigLoader::resolve_config(config).unwrap_err();
        assert_matches!(err, HotspotError::InvalidParameter(_));
    }
}
