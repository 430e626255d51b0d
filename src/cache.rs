use std::fs;
use std::io::Write;

use camino::{Utf8Path, Utf8PathBuf};

use crate::domain::{CellId, SitePoint};
use crate::error::HotspotError;
use crate::grid::{CellSelection, GridSelection};

/// The one persisted artifact of a run: the grid selection, cached so the
/// random sample stays stable across repeated analyses. Shape:
/// `cent_lat, cent_long, cellid, site, lat, long`, one row per selected
/// site, and a single blank-site row for cells whose sites were dropped.
#[derive(Debug, Clone)]
pub struct SelectionCache {
    path: Utf8PathBuf,
}

impl SelectionCache {
    pub fn new(path: Utf8PathBuf) -> Self {
        Self { path }
    }

    pub fn path(&self) -> &Utf8Path {
        &self.path
    }

    pub fn exists(&self) -> bool {
        self.path.as_std_path().exists()
    }

    /// Reads the cache if present, otherwise builds the selection and
    /// writes it before returning. Concurrent invocations racing on the
    /// file are an accepted out-of-scope hazard.
    pub fn load_or_build<F>(&self, build: F) -> Result<(GridSelection, bool), HotspotError>
    where
        F: FnOnce() -> Result<GridSelection, HotspotError>,
    {
        if self.exists() {
            return Ok((self.load()?, true));
        }
        let selection = build()?;
        self.store(&selection)?;
        Ok((selection, false))
    }

    pub fn load(&self) -> Result<GridSelection, HotspotError> {
        if !self.exists() {
            return Err(HotspotError::FileNotFound(self.path.clone()));
        }
        let mut reader = csv::ReaderBuilder::new()
            .has_headers(true)
            .from_path(self.path.as_std_path())
            .map_err(|err| HotspotError::CsvRead {
                path: self.path.clone(),
                message: err.to_string(),
            })?;

        let mut cells: Vec<CellSelection> = Vec::new();
        for row in reader.records() {
            let row = row.map_err(|err| HotspotError::CsvRead {
                path: self.path.clone(),
                message: err.to_string(),
            })?;
            let parse = |index: usize| -> Result<f64, HotspotError> {
                row.get(index)
                    .and_then(|raw| raw.trim().parse().ok())
                    .ok_or_else(|| HotspotError::CsvParse {
                        path: self.path.clone(),
                        line: row.position().map(|pos| pos.line()).unwrap_or(0),
                        message: "malformed selection row".to_string(),
                    })
            };
            let cent_lat = parse(0)?;
            let cent_long = parse(1)?;
            let cell = CellId::new(parse(2)? as u32);
            let site_raw = row.get(3).unwrap_or("").trim();

            if cells.last().map(|c| c.id) != Some(cell) {
                cells.push(CellSelection {
                    id: cell,
                    cent_lat,
                    cent_long,
                    sites: Vec::new(),
                });
            }
            if !site_raw.is_empty() {
                let site = SitePoint {
                    site: site_raw.parse().map_err(|_: HotspotError| {
                        HotspotError::CsvParse {
                            path: self.path.clone(),
                            line: row.position().map(|pos| pos.line()).unwrap_or(0),
                            message: "invalid site identifier".to_string(),
                        }
                    })?,
                    lat: parse(4)?,
                    long: parse(5)?,
                };
                if let Some(last) = cells.last_mut() {
                    last.sites.push(site);
                }
            }
        }
        Ok(GridSelection { cells })
    }

    /// Writes the selection atomically: temp file in the target directory,
    /// then persist over the final path.
    pub fn store(&self, selection: &GridSelection) -> Result<(), HotspotError> {
        let parent = self
            .path
            .parent()
            .map(Utf8Path::to_owned)
            .unwrap_or_else(|| Utf8PathBuf::from("."));
        fs::create_dir_all(parent.as_std_path())
            .map_err(|err| HotspotError::Filesystem(err.to_string()))?;

        let mut writer = csv::Writer::from_writer(Vec::new());
        writer
            .write_record(["cent_lat", "cent_long", "cellid", "site", "lat", "long"])
            .map_err(|err| HotspotError::Filesystem(err.to_string()))?;
        for cell in &selection.cells {
            if cell.sites.is_empty() {
                writer
                    .write_record([
                        cell.cent_lat.to_string(),
                        cell.cent_long.to_string(),
                        cell.id.to_string(),
                        String::new(),
                        String::new(),
                        String::new(),
                    ])
                    .map_err(|err| HotspotError::Filesystem(err.to_string()))?;
                continue;
            }
            for site in &cell.sites {
                writer
                    .write_record([
                        cell.cent_lat.to_string(),
                        cell.cent_long.to_string(),
                        cell.id.to_string(),
                        site.site.to_string(),
                        site.lat.to_string(),
                        site.long.to_string(),
                    ])
                    .map_err(|err| HotspotError::Filesystem(err.to_string()))?;
            }
        }
        let content = writer
            .into_inner()
            .map_err(|err| HotspotError::Filesystem(err.to_string()))?;

        let mut temp = tempfile::Builder::new()
            .prefix("hotspot-map-selection")
            .tempfile_in(parent.as_std_path())
            .map_err(|err| HotspotError::Filesystem(err.to_string()))?;
        temp.write_all(&content)
            .map_err(|err| HotspotError::Filesystem(err.to_string()))?;
        if self.path.as_std_path().exists() {
            fs::remove_file(self.path.as_std_path())
                .map_err(|err| HotspotError::Filesystem(err.to_string()))?;
        }
        temp.persist(self.path.as_std_path())
            .map_err(|err| HotspotError::Filesystem(err.to_string()))?;
        Ok(())
    }

    /// Removes the cached selection. Returns whether a file was removed.
    pub fn clear(&self) -> Result<bool, HotspotError> {
        if !self.exists() {
            return Ok(false);
        }
        fs::remove_file(self.path.as_std_path())
            .map_err(|err| HotspotError::Filesystem(err.to_string()))?;
        Ok(true)
    }
}
