use csv::{ReaderBuilder, StringRecord, WriterBuilder};
use serde::Serialize;

use crate::error::{CleanError, Result};

/// Column holding the nightly price; rows outside the configured bounds are
/// dropped, as are rows where this value is missing or unparseable.
const PRICE_COLUMN: &str = "price";

/// Column holding the review date; values are coerced to ISO dates, with
/// unparseable values replaced by an empty field rather than failing the run.
const LAST_REVIEW_COLUMN: &str = "last_review";

/// Inclusive price bounds for the row filter. `min > max` is not an error;
/// it simply keeps nothing.
#[derive(Debug, Clone, Copy)]
pub struct CleanOptions {
    pub min_price: f64,
    pub max_price: f64,
}

/// Row and coercion counts for the run summary and provenance record.
#[derive(Debug, Clone, Copy, Default, Serialize)]
pub struct CleanStats {
    pub rows_in: u64,
    pub rows_kept: u64,
    pub dates_coerced: u64,
    pub dates_missing: u64,
}

impl CleanStats {
    pub fn rows_dropped(&self) -> u64 {
        self.rows_in - self.rows_kept
    }
}

/// The cleaned table, serialized back to CSV with the original header.
#[derive(Debug)]
pub struct CleanedTable {
    pub bytes: Vec<u8>,
    pub stats: CleanStats,
}

/// Applies the cleaning transform to a CSV payload: keeps rows whose `price`
/// lies within the inclusive bounds, rewrites `last_review` as a parsed date
/// or the missing marker, and preserves every column and the relative order
/// of surviving rows.
pub fn clean_csv(input: &[u8], options: &CleanOptions) -> Result<CleanedTable> {
    let mut reader = ReaderBuilder::new().from_reader(input);

    let headers = reader.headers()?.clone();
    let price_idx = column_index(&headers, PRICE_COLUMN)?;
    let review_idx = column_index(&headers, LAST_REVIEW_COLUMN)?;

    let mut writer = WriterBuilder::new().from_writer(Vec::new());
    writer.write_record(&headers)?;

    let mut stats = CleanStats::default();
    for record in reader.records() {
        let record = record?;
        stats.rows_in += 1;

        let price = match record.get(price_idx).and_then(|v| v.trim().parse::<f64>().ok()) {
            Some(p) => p,
            None => continue,
        };
        // Inclusion test rather than exclusion: NaN prices must fall out of
        // the mask, and NaN compares false on both sides.
        if !(price >= options.min_price && price <= options.max_price) {
            continue;
        }
        stats.rows_kept += 1;

        let raw_review = record.get(review_idx).unwrap_or("");
        let coerced = coerce_date(raw_review);
        match coerced {
            Some(_) => stats.dates_coerced += 1,
            None => stats.dates_missing += 1,
        }

        let mut out = StringRecord::with_capacity(record.as_slice().len(), record.len());
        for (idx, field) in record.iter().enumerate() {
            if idx == review_idx {
                out.push_field(coerced.as_deref().unwrap_or(""));
            } else {
                out.push_field(field);
            }
        }
        writer.write_record(&out)?;
    }

    let bytes = writer
        .into_inner()
        .map_err(|e| CleanError::Store(format!("failed to flush cleaned CSV: {}", e)))?;
    Ok(CleanedTable { bytes, stats })
}

fn column_index(headers: &StringRecord, name: &str) -> Result<usize> {
    headers
        .iter()
        .position(|h| h == name)
        .ok_or_else(|| CleanError::MissingColumn(name.to_string()))
}

/// Best-effort date parsing. Returns the ISO rendering of the parsed value,
/// or `None` when the value is empty or unparseable.
fn coerce_date(raw: &str) -> Option<String> {
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }

    if let Ok(date) = chrono::NaiveDate::parse_from_str(raw, "%Y-%m-%d") {
        return Some(date.format("%Y-%m-%d").to_string());
    }
    if let Ok(dt) = chrono::NaiveDateTime::parse_from_str(raw, "%Y-%m-%d %H:%M:%S") {
        return Some(dt.format("%Y-%m-%d %H:%M:%S").to_string());
    }
    if let Ok(dt) = chrono::DateTime::parse_from_rfc3339(raw) {
        return Some(dt.naive_utc().format("%Y-%m-%d %H:%M:%S").to_string());
    }
    if let Ok(date) = chrono::NaiveDate::parse_from_str(raw, "%m/%d/%Y") {
        return Some(date.format("%Y-%m-%d").to_string());
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = "id,price,last_review,neighbourhood\n\
        1,50,2019-01-01,Queens\n\
        2,5,not-a-date,Bronx\n\
        3,1000,2019-06-01,Manhattan\n";

    fn options(min: f64, max: f64) -> CleanOptions {
        CleanOptions {
            min_price: min,
            max_price: max,
        }
    }

    fn rows(table: &CleanedTable) -> Vec<String> {
        String::from_utf8(table.bytes.clone())
            .unwrap()
            .lines()
            .map(|l| l.to_string())
            .collect()
    }

    #[test]
    fn filters_rows_outside_price_bounds() {
        let table = clean_csv(SAMPLE.as_bytes(), &options(10.0, 500.0)).unwrap();
        let lines = rows(&table);
        assert_eq!(lines.len(), 2); // header + one surviving row
        assert_eq!(lines[0], "id,price,last_review,neighbourhood");
        assert_eq!(lines[1], "1,50,2019-01-01,Queens");
        assert_eq!(table.stats.rows_in, 3);
        assert_eq!(table.stats.rows_kept, 1);
        assert_eq!(table.stats.rows_dropped(), 2);
    }

    #[test]
    fn bounds_are_inclusive_on_both_ends() {
        let input = "price,last_review\n10,2019-01-01\n500,2019-01-02\n9.99,2019-01-03\n500.01,2019-01-04\n";
        let table = clean_csv(input.as_bytes(), &options(10.0, 500.0)).unwrap();
        let lines = rows(&table);
        assert_eq!(lines[1], "10,2019-01-01");
        assert_eq!(lines[2], "500,2019-01-02");
        assert_eq!(lines.len(), 3);
    }

    #[test]
    fn missing_or_unparseable_price_drops_the_row() {
        let input = "price,last_review\n,2019-01-01\nabc,2019-01-02\n42,2019-01-03\n";
        let table = clean_csv(input.as_bytes(), &options(0.0, 100.0)).unwrap();
        assert_eq!(table.stats.rows_kept, 1);
        assert_eq!(rows(&table)[1], "42,2019-01-03");
    }

    #[test]
    fn nan_price_is_excluded_by_the_mask() {
        let input = "price,last_review\nNaN,2019-01-01\nnan,2019-01-02\n50,2019-02-01\n";
        let table = clean_csv(input.as_bytes(), &options(0.0, 100.0)).unwrap();
        assert_eq!(table.stats.rows_kept, 1);
        assert_eq!(rows(&table)[1], "50,2019-02-01");
    }

    #[test]
    fn preserves_column_set_and_row_order() {
        let input = "a,price,last_review,z\n1,30,2019-01-01,x\n2,20,2019-02-01,y\n3,40,2019-03-01,w\n";
        let table = clean_csv(input.as_bytes(), &options(0.0, 100.0)).unwrap();
        let lines = rows(&table);
        assert_eq!(lines[0], "a,price,last_review,z");
        assert_eq!(lines[1], "1,30,2019-01-01,x");
        assert_eq!(lines[2], "2,20,2019-02-01,y");
        assert_eq!(lines[3], "3,40,2019-03-01,w");
    }

    #[test]
    fn unparseable_dates_become_missing_marker_not_errors() {
        let input = "price,last_review\n50,not-a-date\n60,2019-05-05\n";
        let table = clean_csv(input.as_bytes(), &options(0.0, 100.0)).unwrap();
        let lines = rows(&table);
        assert_eq!(lines[1], "50,");
        assert_eq!(lines[2], "60,2019-05-05");
        assert_eq!(table.stats.dates_missing, 1);
        assert_eq!(table.stats.dates_coerced, 1);
    }

    #[test]
    fn coerces_datetime_and_slash_formats() {
        let input = "price,last_review\n10,2019-01-01 12:30:00\n20,06/01/2019\n";
        let table = clean_csv(input.as_bytes(), &options(0.0, 100.0)).unwrap();
        let lines = rows(&table);
        assert_eq!(lines[1], "10,2019-01-01 12:30:00");
        assert_eq!(lines[2], "20,2019-06-01");
    }

    #[test]
    fn empty_result_keeps_the_header() {
        let table = clean_csv(SAMPLE.as_bytes(), &options(0.0, 0.0)).unwrap();
        let lines = rows(&table);
        assert_eq!(lines.len(), 1);
        assert_eq!(lines[0], "id,price,last_review,neighbourhood");
        assert_eq!(table.stats.rows_kept, 0);
    }

    #[test]
    fn inverted_bounds_yield_empty_result_not_error() {
        let table = clean_csv(SAMPLE.as_bytes(), &options(500.0, 10.0)).unwrap();
        assert_eq!(table.stats.rows_kept, 0);
    }

    #[test]
    fn missing_price_column_is_a_schema_error() {
        let input = "id,cost,last_review\n1,50,2019-01-01\n";
        let err = clean_csv(input.as_bytes(), &options(0.0, 100.0)).unwrap_err();
        assert!(matches!(err, CleanError::MissingColumn(c) if c == "price"));
    }

    #[test]
    fn missing_last_review_column_is_a_schema_error() {
        let input = "id,price\n1,50\n";
        let err = clean_csv(input.as_bytes(), &options(0.0, 100.0)).unwrap_err();
        assert!(matches!(err, CleanError::MissingColumn(c) if c == "last_review"));
    }

    #[test]
    fn cleaning_is_deterministic() {
        let a = clean_csv(SAMPLE.as_bytes(), &options(10.0, 500.0)).unwrap();
        let b = clean_csv(SAMPLE.as_bytes(), &options(10.0, 500.0)).unwrap();
        assert_eq!(a.bytes, b.bytes);
    }
}
