use serde::Serialize;

use crate::domain::{CellId, SiteId};

/// One point of a site-level map layer. `bin` is the quantile color class
/// the renderer should shade with, when the layer is binned.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SiteLayerRow {
    pub site: SiteId,
    pub lat: f64,
    pub long: f64,
    pub richness: Option<f64>,
    pub bin: Option<usize>,
    pub hotspot: bool,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize)]
pub struct SiteLayer {
    pub rows: Vec<SiteLayerRow>,
}

/// One cell of a choropleth layer. Null richness means the cell had no
/// qualifying data; renderers mask such cells rather than shading zero.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CellLayerRow {
    pub cell: CellId,
    pub cent_lat: f64,
    pub cent_long: f64,
    pub richness: Option<f64>,
    pub hotspot: bool,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize)]
pub struct CellLayer {
    pub rows: Vec<CellLayerRow>,
}

/// The external map renderer seam. The pipeline computes rows and columns;
/// projection, basemaps, and palettes live on the other side of this trait.
pub trait MapRenderer {
    fn site_layer(&self, name: &str, layer: &SiteLayer);
    fn cell_layer(&self, name: &str, layer: &CellLayer);
}

/// Discards every layer. Used when only the run summary is wanted.
pub struct NullRenderer;

impl MapRenderer for NullRenderer {
    fn site_layer(&self, _name: &str, _layer: &SiteLayer) {}

    fn cell_layer(&self, _name: &str, _layer: &CellLayer) {}
}
