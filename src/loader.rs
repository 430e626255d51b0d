use std::fs::File;

use camino::Utf8Path;
use csv::StringRecord;

use crate::domain::{CellEstimate, CellId, Record, RangeRecord, SpeciesArea};
use crate::error::HotspotError;

/// Opens a comma-delimited CSV with a required header row.
fn open_reader(path: &Utf8Path) -> Result<csv::Reader<File>, HotspotError> {
    if !path.as_std_path().exists() {
        return Err(HotspotError::FileNotFound(path.to_owned()));
    }
    csv::ReaderBuilder::new()
        .has_headers(true)
        .from_path(path.as_std_path())
        .map_err(|err| HotspotError::CsvRead {
            path: path.to_owned(),
            message: err.to_string(),
        })
}

fn column_index(
    headers: &StringRecord,
    column: &str,
    path: &Utf8Path,
) -> Result<usize, HotspotError> {
    headers
        .iter()
        .position(|name| name.trim() == column)
        .ok_or_else(|| HotspotError::MissingColumn {
            column: column.to_string(),
            path: path.to_owned(),
        })
}

fn record_line(record: &StringRecord) -> u64 {
    record.position().map(|pos| pos.line()).unwrap_or(0)
}

fn field<'a>(
    record: &'a StringRecord,
    index: usize,
    path: &Utf8Path,
) -> Result<&'a str, HotspotError> {
    record.get(index).ok_or_else(|| HotspotError::CsvParse {
        path: path.to_owned(),
        line: record_line(record),
        message: "row has fewer fields than the header".to_string(),
    })
}

fn parse_f64(record: &StringRecord, index: usize, path: &Utf8Path) -> Result<f64, HotspotError> {
    let raw = field(record, index, path)?;
    raw.trim().parse().map_err(|_| HotspotError::CsvParse {
        path: path.to_owned(),
        line: record_line(record),
        message: format!("expected a number, got {raw:?}"),
    })
}

fn parse_id<T>(record: &StringRecord, index: usize, path: &Utf8Path) -> Result<T, HotspotError>
where
    T: std::str::FromStr<Err = HotspotError>,
{
    let raw = field(record, index, path)?;
    raw.parse().map_err(|_: HotspotError| HotspotError::CsvParse {
        path: path.to_owned(),
        line: record_line(record),
        message: format!("invalid identifier {raw:?}"),
    })
}

/// Reads the survey abundance table: `site, lat, long, species` plus an
/// optional `count` column; incidental columns are ignored.
pub fn read_survey(path: &Utf8Path) -> Result<Vec<Record>, HotspotError> {
    let mut reader = open_reader(path)?;
    let headers = reader
        .headers()
        .map_err(|err| HotspotError::CsvRead {
            path: path.to_owned(),
            message: err.to_string(),
        })?
        .clone();
    let site = column_index(&headers, "site", path)?;
    let lat = column_index(&headers, "lat", path)?;
    let long = column_index(&headers, "long", path)?;
    let species = column_index(&headers, "species", path)?;
    let count = headers.iter().position(|name| name.trim() == "count");

    let mut records = Vec::new();
    for row in reader.records() {
        let row = row.map_err(|err| HotspotError::CsvRead {
            path: path.to_owned(),
            message: err.to_string(),
        })?;
        let count = match count {
            Some(index) => {
                let raw = field(&row, index, path)?.trim();
                if raw.is_empty() {
                    None
                } else {
                    Some(parse_f64(&row, index, path)?)
                }
            }
            None => None,
        };
        records.push(Record {
            site: parse_id(&row, site, path)?,
            lat: parse_f64(&row, lat, path)?,
            long: parse_f64(&row, long, path)?,
            species: parse_id(&row, species, path)?,
            count,
        });
    }
    Ok(records)
}

/// Reads the range-map table: `site, lat, long, sisid, _spid`.
pub fn read_range_map(path: &Utf8Path) -> Result<Vec<RangeRecord>, HotspotError> {
    let mut reader = open_reader(path)?;
    let headers = reader
        .headers()
        .map_err(|err| HotspotError::CsvRead {
            path: path.to_owned(),
            message: err.to_string(),
        })?
        .clone();
    let site = column_index(&headers, "site", path)?;
    let lat = column_index(&headers, "lat", path)?;
    let long = column_index(&headers, "long", path)?;
    let sisid = column_index(&headers, "sisid", path)?;
    let spid = column_index(&headers, "_spid", path)?;

    let mut records = Vec::new();
    for row in reader.records() {
        let row = row.map_err(|err| HotspotError::CsvRead {
            path: path.to_owned(),
            message: err.to_string(),
        })?;
        records.push(RangeRecord {
            site: parse_id(&row, site, path)?,
            lat: parse_f64(&row, lat, path)?,
            long: parse_f64(&row, long, path)?,
            sisid: parse_id(&row, sisid, path)?,
            spid: parse_id(&row, spid, path)?,
        });
    }
    Ok(records)
}

/// Reads the species-area table: `sisid, shape_area`. One species may span
/// several rows (range fragments); summing is the rarity classifier's job.
pub fn read_species_areas(path: &Utf8Path) -> Result<Vec<SpeciesArea>, HotspotError> {
    let mut reader = open_reader(path)?;
    let headers = reader
        .headers()
        .map_err(|err| HotspotError::CsvRead {
            path: path.to_owned(),
            message: err.to_string(),
        })?
        .clone();
    let sisid = column_index(&headers, "sisid", path)?;
    let shape_area = column_index(&headers, "shape_area", path)?;

    let mut areas = Vec::new();
    for row in reader.records() {
        let row = row.map_err(|err| HotspotError::CsvRead {
            path: path.to_owned(),
            message: err.to_string(),
        })?;
        areas.push(SpeciesArea {
            species: parse_id(&row, sisid, path)?,
            shape_area: parse_f64(&row, shape_area, path)?,
        });
    }
    Ok(areas)
}

/// Reads the externally computed per-cell richness estimates, keeping the
/// requested estimator column (`Jack1ab` by default). Blank estimate fields
/// are preserved as missing cells.
pub fn read_cell_estimates(
    path: &Utf8Path,
    estimate_column: &str,
) -> Result<Vec<CellEstimate>, HotspotError> {
    let mut reader = open_reader(path)?;
    let headers = reader
        .headers()
        .map_err(|err| HotspotError::CsvRead {
            path: path.to_owned(),
            message: err.to_string(),
        })?
        .clone();
    let cellid = column_index(&headers, "cellid", path)?;
    let estimate = column_index(&headers, estimate_column, path)?;

    let mut estimates = Vec::new();
    for row in reader.records() {
        let row = row.map_err(|err| HotspotError::CsvRead {
            path: path.to_owned(),
            message: err.to_string(),
        })?;
        let raw = field(&row, estimate, path)?.trim();
        if raw.is_empty() {
            continue;
        }
        let cell = parse_f64(&row, cellid, path)? as u32;
        estimates.push(CellEstimate {
            cell: CellId::new(cell),
            estimate: parse_f64(&row, estimate, path)?,
        });
    }
    Ok(estimates)
}

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;
    use camino::Utf8PathBuf;

    use super::*;

    fn write_csv(dir: &tempfile::TempDir, name: &str, content: &str) -> Utf8PathBuf {
        let path = dir.path().join(name);
        std::fs::write(&path, content).unwrap();
        Utf8PathBuf::from_path_buf(path).unwrap()
    }

    #[test]
    fn reads_survey_with_incidental_columns() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_csv(
            &dir,
            "survey.csv",
            "site,lat,long,species,count,observer\ns1,40.1,-100.2,robin,3,xy\ns1,40.1,-100.2,wren,,zz\n",
        );
        let records = read_survey(&path).unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].species.as_str(), "robin");
        assert_eq!(records[0].count, Some(3.0));
        assert_eq!(records[1].count, None);
    }

    #[test]
    fn missing_file_is_explicit() {
        let err = read_survey(Utf8Path::new("/nonexistent/survey.csv")).unwrap_err();
        assert_matches!(err, HotspotError::FileNotFound(_));
    }

    #[test]
    fn missing_column_names_the_column() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_csv(&dir, "survey.csv", "site,lat,long\ns1,1.0,2.0\n");
        let err = read_survey(&path).unwrap_err();
        assert_matches!(err, HotspotError::MissingColumn { ref column, .. } if column == "species");
    }

    #[test]
    fn bad_coordinate_reports_line() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_csv(
            &dir,
            "survey.csv",
            "site,lat,long,species\ns1,40.0,-100.0,robin\ns2,oops,-100.0,wren\n",
        );
        let err = read_survey(&path).unwrap_err();
        assert_matches!(err, HotspotError::CsvParse { line: 3, .. });
    }

    #[test]
    fn reads_range_map_dual_species_ids() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_csv(
            &dir,
            "range.csv",
            "site,lat,long,sisid,_spid\ns1,40.0,-100.0,101,sp101\n",
        );
        let records = read_range_map(&path).unwrap();
        assert_eq!(records[0].sisid.as_str(), "101");
        assert_eq!(records[0].spid.as_str(), "sp101");
    }

    #[test]
    fn reads_cell_estimates_by_named_column() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_csv(
            &dir,
            "estimates.csv",
            "cellid,Jack1ab,Chao1\n1,12.5,11.0\n2,,9.0\n3,4.0,3.0\n",
        );
        let estimates = read_cell_estimates(&path, "Jack1ab").unwrap();
        assert_eq!(estimates.len(), 2);
        assert_eq!(estimates[0].cell, CellId::new(1));
        assert_eq!(estimates[0].estimate, 12.5);
    }

    #[test]
    fn missing_estimator_column_is_explicit() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_csv(&dir, "estimates.csv", "cellid,Chao1\n1,2.0\n");
        let err = read_cell_estimates(&path, "Jack1ab").unwrap_err();
        assert_matches!(err, HotspotError::MissingColumn { ref column, .. } if column == "Jack1ab");
    }
}
