use csv::StringRecord;
use std::collections::BTreeSet;
use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use thiserror::Error;
use tracing::{debug, info};

use super::record::{ImageRecord, REQUIRED_COLUMNS};

/// File name of the per-image table inside a dataset root
pub const AUX_TABLE_FILE: &str = "aux_data.csv";

pub type DatasetResult<T> = Result<T, DatasetError>;

#[derive(Debug, Error)]
pub enum DatasetError {
    #[error("failed to open table {path:?}: {source}")]
    Open {
        path: PathBuf,
        #[source]
        source: csv::Error,
    },
    #[error("failed to read header of {path:?}: {source}")]
    Header {
        path: PathBuf,
        #[source]
        source: csv::Error,
    },
    #[error("table {path:?} is missing required column '{column}'")]
    MissingColumn { path: PathBuf, column: &'static str },
    #[error("malformed CSV in {path:?} at row {row}: {source}")]
    Row {
        path: PathBuf,
        row: usize,
        #[source]
        source: csv::Error,
    },
    #[error("row {row} of {path:?}: column '{column}' has invalid value '{value}'")]
    InvalidField {
        path: PathBuf,
        row: usize,
        column: &'static str,
        value: String,
    },
    #[error("failed to write table {path:?}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: csv::Error,
    },
    #[error("I/O error on {path:?}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Positions of the required columns within the header row
#[derive(Debug, Clone, Copy)]
struct ColumnLayout {
    id: usize,
    year: usize,
    month: usize,
    day: usize,
    hour: usize,
    grade: usize,
    image_path: usize,
}

impl ColumnLayout {
    fn resolve(headers: &StringRecord, path: &Path) -> DatasetResult<Self> {
        let find = |column: &'static str| {
            headers
                .iter()
                .position(|h| h.trim() == column)
                .ok_or_else(|| DatasetError::MissingColumn {
                    path: path.to_path_buf(),
                    column,
                })
        };
        let [id, year, month, day, hour, grade, image_path] = REQUIRED_COLUMNS;
        Ok(Self {
            id: find(id)?,
            year: find(year)?,
            month: find(month)?,
            day: find(day)?,
            hour: find(hour)?,
            grade: find(grade)?,
            image_path: find(image_path)?,
        })
    }
}

/// The full per-image table: header row plus parsed records in file order
#[derive(Debug, Clone, PartialEq)]
pub struct AuxTable {
    headers: StringRecord,
    records: Vec<ImageRecord>,
}

impl AuxTable {
    #[cfg(test)]
    pub fn headers(&self) -> &StringRecord {
        &self.headers
    }

    pub fn records(&self) -> &[ImageRecord] {
        &self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Same header, different rows
    pub fn with_records(&self, records: Vec<ImageRecord>) -> Self {
        Self {
            headers: self.headers.clone(),
            records,
        }
    }

    pub fn typhoon_ids(&self) -> BTreeSet<i64> {
        self.records.iter().map(|r| r.typhoon_id).collect()
    }

    pub fn typhoon_count(&self) -> usize {
        self.typhoon_ids().len()
    }

    /// Load `aux_data.csv` from a dataset root
    pub fn load_from_root(root: &Path) -> DatasetResult<Self> {
        Self::load(&root.join(AUX_TABLE_FILE))
    }

    /// Read a table from a CSV file. Required columns are looked up by name,
    /// so their position in the file does not matter.
    pub fn load(path: &Path) -> DatasetResult<Self> {
        info!("Loading aux table from: {:?}", path);

        let mut reader = csv::Reader::from_path(path).map_err(|source| DatasetError::Open {
            path: path.to_path_buf(),
            source,
        })?;
        let headers = reader
            .headers()
            .map_err(|source| DatasetError::Header {
                path: path.to_path_buf(),
                source,
            })?
            .clone();
        let layout = ColumnLayout::resolve(&headers, path)?;

        let mut records = Vec::new();
        for (index, result) in reader.records().enumerate() {
            // +2: one for the header line, one for 1-based numbering
            let row_no = index + 2;
            let row = result.map_err(|source| DatasetError::Row {
                path: path.to_path_buf(),
                row: row_no,
                source,
            })?;
            records.push(parse_record(row, &layout, path, row_no)?);
        }

        info!("Loaded {} records from {:?}", records.len(), path);
        Ok(Self { headers, records })
    }

    /// Write the table as CSV: original header, original column order, no index column
    pub fn write(&self, path: &Path) -> DatasetResult<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(|source| DatasetError::Io {
                path: parent.to_path_buf(),
                source,
            })?;
        }

        let write_err = |source| DatasetError::Write {
            path: path.to_path_buf(),
            source,
        };
        let mut writer = csv::Writer::from_path(path).map_err(write_err)?;
        writer.write_record(&self.headers).map_err(write_err)?;
        for record in &self.records {
            writer.write_record(record.row()).map_err(write_err)?;
        }
        writer.flush().map_err(|source| DatasetError::Io {
            path: path.to_path_buf(),
            source,
        })?;

        debug!("Wrote {} records to {:?}", self.records.len(), path);
        Ok(())
    }
}

fn parse_field<T: FromStr>(
    row: &StringRecord,
    index: usize,
    column: &'static str,
    path: &Path,
    row_no: usize,
) -> DatasetResult<T> {
    let raw = row.get(index).unwrap_or("").trim();
    parse_number(raw).ok_or_else(|| DatasetError::InvalidField {
        path: path.to_path_buf(),
        row: row_no,
        column,
        value: raw.to_string(),
    })
}

/// Integers written by float-typed table writers come out as `"2019.0"`;
/// accept those as long as there is no fractional part.
fn parse_number<T: FromStr>(raw: &str) -> Option<T> {
    if let Ok(value) = raw.parse::<T>() {
        return Some(value);
    }
    let whole = raw.strip_suffix(".0")?;
    whole.parse::<T>().ok()
}

fn parse_record(
    row: StringRecord,
    layout: &ColumnLayout,
    path: &Path,
    row_no: usize,
) -> DatasetResult<ImageRecord> {
    let typhoon_id = parse_field(&row, layout.id, "id", path, row_no)?;
    let year = parse_field(&row, layout.year, "year", path, row_no)?;
    let month = parse_field(&row, layout.month, "month", path, row_no)?;
    let day = parse_field(&row, layout.day, "day", path, row_no)?;
    let hour = parse_field(&row, layout.hour, "hour", path, row_no)?;
    let grade = parse_field(&row, layout.grade, "grade", path, row_no)?;
    let image_path = row.get(layout.image_path).unwrap_or("").trim().to_string();

    if image_path.is_empty() {
        return Err(DatasetError::InvalidField {
            path: path.to_path_buf(),
            row: row_no,
            column: "image_path",
            value: String::new(),
        });
    }

    Ok(ImageRecord::from_parts(
        typhoon_id, year, month, day, hour, grade, image_path, row,
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    const SAMPLE_CSV: &str = "\
id,year,month,day,hour,grade,image_path,wind,pressure
197830,1978,7,1,0,2,197830-1978070100-GMS1-1.h5,35.0,1000.0
197830,1978,7,1,6,3,197830-1978070106-GMS1-1.h5,45.0,992.0
197901,1979,1,2,12,4,197901-1979010212-GMS1-1.h5,,980.0
";

    fn write_sample(dir: &TempDir, contents: &str) -> PathBuf {
        let path = dir.path().join(AUX_TABLE_FILE);
        fs::write(&path, contents).unwrap();
        path
    }

    #[test]
    fn test_load_parses_required_columns() {
        let dir = TempDir::new().unwrap();
        let path = write_sample(&dir, SAMPLE_CSV);

        let table = AuxTable::load(&path).unwrap();

        assert_eq!(table.len(), 3);
        assert_eq!(table.typhoon_count(), 2);
        let third = &table.records()[2];
        assert_eq!(third.typhoon_id, 197901);
        assert_eq!(third.timestamp_key(), (1979, 1, 2, 12));
        assert_eq!(third.grade, 4);
        assert_eq!(third.image_path, "197901-1979010212-GMS1-1.h5");
    }

    #[test]
    fn test_write_then_load_recovers_identical_rows() {
        let dir = TempDir::new().unwrap();
        let path = write_sample(&dir, SAMPLE_CSV);
        let table = AuxTable::load(&path).unwrap();

        let out_path = dir.path().join("out").join(AUX_TABLE_FILE);
        table.write(&out_path).unwrap();
        let reloaded = AuxTable::load(&out_path).unwrap();

        assert_eq!(reloaded, table);
        assert_eq!(fs::read_to_string(&out_path).unwrap(), SAMPLE_CSV);
    }

    #[test]
    fn test_columns_found_by_name_in_any_order() {
        let dir = TempDir::new().unwrap();
        let path = write_sample(
            &dir,
            "image_path,grade,hour,day,month,year,id\na.h5,5,18,3,9,2004,2004\n",
        );

        let table = AuxTable::load(&path).unwrap();
        let record = &table.records()[0];

        assert_eq!(record.typhoon_id, 2004);
        assert_eq!(record.timestamp_key(), (2004, 9, 3, 18));
        assert_eq!(record.grade, 5);
    }

    #[test]
    fn test_missing_column_is_reported() {
        let dir = TempDir::new().unwrap();
        let path = write_sample(&dir, "id,year,month,day,hour,image_path\n1,2000,1,1,0,a.h5\n");

        let err = AuxTable::load(&path).unwrap_err();
        assert!(matches!(err, DatasetError::MissingColumn { column: "grade", .. }));
    }

    #[test]
    fn test_invalid_integer_reports_row_and_column() {
        let dir = TempDir::new().unwrap();
        let path = write_sample(
            &dir,
            "id,year,month,day,hour,grade,image_path\n1,2000,1,1,0,2,a.h5\n1,2000,1,x,0,2,b.h5\n",
        );

        let err = AuxTable::load(&path).unwrap_err();
        match err {
            DatasetError::InvalidField { row, column, value, .. } => {
                assert_eq!(row, 3);
                assert_eq!(column, "day");
                assert_eq!(value, "x");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_float_formatted_integers_are_accepted() {
        assert_eq!(parse_number::<i32>("2019.0"), Some(2019));
        assert_eq!(parse_number::<i32>("2019.5"), None);
        assert_eq!(parse_number::<u32>("-1"), None);
    }

    #[test]
    fn test_missing_table_fails_to_open() {
        let dir = TempDir::new().unwrap();
        let err = AuxTable::load_from_root(dir.path()).unwrap_err();
        assert!(matches!(err, DatasetError::Open { .. }));
    }
}
