use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::HotspotError;

/// Survey site identifier. Sites are the unit of spatial sampling; the full
/// site key is the (site, lat, long) tuple carried by [`SitePoint`].
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct SiteId(String);

impl SiteId {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SiteId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for SiteId {
    type Err = HotspotError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let normalized = value.trim().to_string();
        if normalized.is_empty() {
            return Err(HotspotError::InvalidSiteId(value.to_string()));
        }
        Ok(Self(normalized))
    }
}

/// Species identifier. Input tables name species under several conventions
/// (`species`, `sisid`, `_spid`); all are carried as this one type.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct SpeciesId(String);

impl SpeciesId {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SpeciesId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for SpeciesId {
    type Err = HotspotError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let normalized = value.trim().to_string();
        if normalized.is_empty() {
            return Err(HotspotError::InvalidSpeciesId(value.to_string()));
        }
        Ok(Self(normalized))
    }
}

/// Grid cell identifier, assigned in raster scan order starting at 1.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
pub struct CellId(u32);

impl CellId {
    pub fn new(value: u32) -> Self {
        Self(value)
    }

    pub fn get(self) -> u32 {
        self.0
    }
}

impl fmt::Display for CellId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// One occurrence observation from the survey table. Immutable input; the
/// pipeline only filters and joins these.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Record {
    pub site: SiteId,
    pub lat: f64,
    pub long: f64,
    pub species: SpeciesId,
    pub count: Option<f64>,
}

impl Record {
    pub fn site_point(&self) -> SitePoint {
        SitePoint {
            site: self.site.clone(),
            lat: self.lat,
            long: self.long,
        }
    }
}

/// One occurrence from the range-map table. Species appear under two naming
/// conventions; both identifiers are kept.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RangeRecord {
    pub site: SiteId,
    pub lat: f64,
    pub long: f64,
    pub sisid: SpeciesId,
    pub spid: SpeciesId,
}

impl RangeRecord {
    pub fn site_point(&self) -> SitePoint {
        SitePoint {
            site: self.site.clone(),
            lat: self.lat,
            long: self.long,
        }
    }
}

/// Range polygon area for one species.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SpeciesArea {
    pub species: SpeciesId,
    pub shape_area: f64,
}

/// Externally computed richness estimator value for one cell.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CellEstimate {
    pub cell: CellId,
    pub estimate: f64,
}

/// Deduplicated (site, lat, long) tuple; the grouping key for site-level
/// aggregation and the unit fed to the grid partitioner.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SitePoint {
    pub site: SiteId,
    pub lat: f64,
    pub long: f64,
}

/// Distinct-species count for one site key.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SiteRichness {
    pub site: SiteId,
    pub lat: f64,
    pub long: f64,
    pub richness: u32,
}

/// Richness value for one grid cell. `None` means the cell had no qualifying
/// records after the left join from the full cell list; downstream stages
/// treat that as null, never as zero.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CellRichness {
    pub cell: CellId,
    pub cent_lat: f64,
    pub cent_long: f64,
    pub richness: Option<f64>,
}

/// Null handling for hotspot selection. `Strict` counts every row toward the
/// percentile denominator; `ExcludeNulls` removes null-richness rows from it
/// so empty cells neither dilute the 5% nor surface as false hotspots.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NullPolicy {
    Strict,
    ExcludeNulls,
}
