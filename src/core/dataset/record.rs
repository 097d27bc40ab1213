use csv::StringRecord;
use std::cmp::Ordering;

/// Columns every aux table must carry. Any other columns are passed through.
pub const REQUIRED_COLUMNS: [&str; 7] = ["id", "year", "month", "day", "hour", "grade", "image_path"];

/// One observed image of a typhoon, parsed from a row of `aux_data.csv`.
///
/// The raw row is kept alongside the parsed fields so extra columns survive
/// the round trip untouched.
#[derive(Debug, Clone, PartialEq)]
pub struct ImageRecord {
    pub typhoon_id: i64,
    pub year: i32,
    pub month: u32,
    pub day: u32,
    pub hour: u32,
    pub grade: i32,
    pub image_path: String,
    row: StringRecord,
}

impl ImageRecord {
    #[allow(clippy::too_many_arguments)]
    pub(crate) fn from_parts(
        typhoon_id: i64,
        year: i32,
        month: u32,
        day: u32,
        hour: u32,
        grade: i32,
        image_path: String,
        row: StringRecord,
    ) -> Self {
        Self {
            typhoon_id,
            year,
            month,
            day,
            hour,
            grade,
            image_path,
            row,
        }
    }

    /// The CSV row this record was read from, in original column order
    pub fn row(&self) -> &StringRecord {
        &self.row
    }

    /// (year, month, day, hour) key used for chronological ordering
    pub fn timestamp_key(&self) -> (i32, u32, u32, u32) {
        (self.year, self.month, self.day, self.hour)
    }

    pub fn cmp_chronological(&self, other: &Self) -> Ordering {
        self.timestamp_key().cmp(&other.timestamp_key())
    }
}

/// Per-typhoon view used for selection
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TyphoonGroup {
    pub typhoon_id: i64,
    /// Earliest year any record of this typhoon was observed in
    pub first_year: i32,
}

impl TyphoonGroup {
    fn from_record(record: &ImageRecord) -> Self {
        Self {
            typhoon_id: record.typhoon_id,
            first_year: record.year,
        }
    }

    fn absorb(&mut self, record: &ImageRecord) {
        self.first_year = self.first_year.min(record.year);
    }
}

/// Group records by typhoon id. Groups come back sorted by ascending id.
pub fn group_by_typhoon(records: &[ImageRecord]) -> Vec<TyphoonGroup> {
    let mut groups: std::collections::BTreeMap<i64, TyphoonGroup> = std::collections::BTreeMap::new();
    for record in records {
        groups
            .entry(record.typhoon_id)
            .and_modify(|g| g.absorb(record))
            .or_insert_with(|| TyphoonGroup::from_record(record));
    }
    groups.into_values().collect()
}

#[cfg(test)]
pub(crate) mod test_support {
    use super::*;

    /// Build a record with the standard seven columns and no extras
    pub fn record(typhoon_id: i64, year: i32, month: u32, day: u32, hour: u32, grade: i32) -> ImageRecord {
        let image_path = format!("{}-{:04}{:02}{:02}{:02}.h5", typhoon_id, year, month, day, hour);
        let row = StringRecord::from(vec![
            typhoon_id.to_string(),
            year.to_string(),
            month.to_string(),
            day.to_string(),
            hour.to_string(),
            grade.to_string(),
            image_path.clone(),
        ]);
        ImageRecord::from_parts(typhoon_id, year, month, day, hour, grade, image_path, row)
    }

    /// `count` hourly records for one typhoon starting at the given year
    pub fn typhoon_records(typhoon_id: i64, year: i32, count: usize) -> Vec<ImageRecord> {
        (0..count)
            .map(|i| {
                let day = 1 + (i / 24) as u32;
                let hour = (i % 24) as u32;
                record(typhoon_id, year, 1, day, hour, 2)
            })
            .collect()
    }
}
