//! Header-driven tabular feed reader.
//!
//! Price CSV feeds open with a free-form preamble (disclaimer,
//! publication date, version) before the real header row. The reader
//! discards records until it recognizes the header, then maps the
//! header cells to canonical field names and streams typed rows.
//! Columns the mapping does not know are dropped. Reaching the end of
//! the stream without a header is a hard error: it means the feed
//! format moved under us.

use std::collections::HashMap;
use std::io::Read;
use std::marker::PhantomData;

use csv::StringRecord;
use tracing::warn;

use pricebook_common::{PricebookError, Result};

/// First cell of the header row in every tabular price feed.
pub const HEADER_MARKER: &str = "SKU";

/// Canonical field names shared by all tabular feeds.
pub mod field {
    pub const SKU: &str = "sku";
    pub const TERM_CODE: &str = "term_code";
    pub const TERM_TYPE: &str = "term_type";
    pub const PRICE_UNIT: &str = "price_unit";
    pub const PRICE_PER_UNIT: &str = "price_per_unit";
    pub const LEASE_LENGTH: &str = "lease_length";
    pub const PURCHASE_OPTION: &str = "purchase_option";
    pub const OFFERING_CLASS: &str = "offering_class";
    pub const LOCATION: &str = "location";
    pub const FAMILY: &str = "family";
    pub const TYPE: &str = "type";
    pub const CPU: &str = "cpu";
    pub const MEMORY: &str = "memory";
    pub const PROCESSOR: &str = "processor";
    pub const NETWORK: &str = "network";
    pub const GENERATION: &str = "generation";
    pub const STORAGE: &str = "storage";
    pub const TENANCY: &str = "tenancy";
    pub const OS: &str = "os";
    pub const SOFTWARE: &str = "software";
    pub const LICENSE: &str = "license";
    pub const CAPACITY_STATUS: &str = "capacity_status";
    pub const ENGINE: &str = "engine";
    pub const EDITION: &str = "edition";
    pub const DEPLOYMENT: &str = "deployment";
    pub const VOLUME_TYPE: &str = "volume_type";
    pub const STORAGE_CLASS: &str = "storage_class";
    pub const AVAILABILITY: &str = "availability";
    pub const DURABILITY: &str = "durability";
    pub const SIZE_MIN: &str = "size_min";
    pub const SIZE_MAX: &str = "size_max";
    pub const GROUP: &str = "group";
}

/// Header labels every tabular feed shares, mapped to canonical
/// fields. Offering-specific readers extend this map.
pub fn base_mapping() -> HashMap<&'static str, &'static str> {
    HashMap::from([
        ("SKU", field::SKU),
        ("OfferTermCode", field::TERM_CODE),
        ("TermType", field::TERM_TYPE),
        ("Unit", field::PRICE_UNIT),
        ("PricePerUnit", field::PRICE_PER_UNIT),
        ("LeaseContractLength", field::LEASE_LENGTH),
        ("PurchaseOption", field::PURCHASE_OPTION),
        ("OfferingClass", field::OFFERING_CLASS),
        ("Location", field::LOCATION),
        ("Product Family", field::FAMILY),
    ])
}

/// Resolved positions of canonical fields in a feed's header.
#[derive(Debug, Clone)]
pub struct ColumnMap {
    index: HashMap<&'static str, usize>,
}

impl ColumnMap {
    fn from_header(header: &StringRecord, mapping: &HashMap<&'static str, &'static str>) -> Self {
        let mut index = HashMap::new();
        for (position, label) in header.iter().enumerate() {
            // Unmapped columns are dropped.
            if let Some(field) = mapping.get(label.trim()) {
                index.insert(*field, position);
            }
        }
        ColumnMap { index }
    }

    /// Raw cell for a canonical field, `None` when the feed does not
    /// carry the column or the row is too short.
    pub fn get<'r>(&self, record: &'r StringRecord, field: &str) -> Option<&'r str> {
        self.index.get(field).and_then(|&i| record.get(i))
    }

    /// Trimmed cell content, empty when absent.
    pub fn text(&self, record: &StringRecord, field: &str) -> String {
        self.get(record, field).unwrap_or("").trim().to_string()
    }

    /// Mandatory numeric cell.
    pub fn number(&self, record: &StringRecord, field: &str) -> Result<f64> {
        let raw = self.text(record, field);
        raw.parse::<f64>().map_err(|_| {
            PricebookError::FeedRow(format!("field '{field}' is not a number: '{raw}'"))
        })
    }

    /// Numeric cell tolerating absence and decorations such as
    /// `8 GiB` or `Up to 64`, yielding `0` when nothing parses.
    pub fn lenient_number(&self, record: &StringRecord, field: &str) -> f64 {
        let raw = self.text(record, field);
        raw.replace(',', "")
            .split_whitespace()
            .find_map(|token| token.parse::<f64>().ok())
            .unwrap_or(0.0)
    }
}

/// A typed row decodable from a mapped tabular record.
pub trait FeedRecord: Sized {
    fn from_record(columns: &ColumnMap, record: &StringRecord) -> Result<Self>;
}

/// Streaming reader over one tabular feed.
pub struct TabularReader<R: Read, T: FeedRecord> {
    records: csv::StringRecordsIntoIter<R>,
    columns: ColumnMap,
    valid: Box<dyn Fn(&ColumnMap, &StringRecord) -> bool + Send>,
    skipped: usize,
    _marker: PhantomData<T>,
}

impl<R: Read, T: FeedRecord> std::fmt::Debug for TabularReader<R, T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TabularReader")
            .field("columns", &self.columns)
            .field("skipped", &self.skipped)
            .finish_non_exhaustive()
    }
}

impl<R: Read, T: FeedRecord> TabularReader<R, T> {
    /// Open a reader, locating the header by its `SKU` first cell.
    pub fn new(
        reader: R,
        mapping: HashMap<&'static str, &'static str>,
        valid: impl Fn(&ColumnMap, &StringRecord) -> bool + Send + 'static,
    ) -> Result<Self> {
        Self::with_header_predicate(reader, mapping, valid, |record| {
            record.get(0).map(str::trim) == Some(HEADER_MARKER)
        })
    }

    /// Open a reader with a custom header detection predicate, for
    /// feeds whose header does not start with the standard marker.
    pub fn with_header_predicate(
        reader: R,
        mapping: HashMap<&'static str, &'static str>,
        valid: impl Fn(&ColumnMap, &StringRecord) -> bool + Send + 'static,
        is_header: impl Fn(&StringRecord) -> bool,
    ) -> Result<Self> {
        // Preamble rows have arbitrary widths, hence flexible.
        let mut records = csv::ReaderBuilder::new()
            .has_headers(false)
            .flexible(true)
            .from_reader(reader)
            .into_records();
        let columns = loop {
            match records.next() {
                Some(record) => {
                    let record = record.map_err(|e| {
                        PricebookError::Parse(format!("unreadable feed record: {e}"))
                    })?;
                    if is_header(&record) {
                        break ColumnMap::from_header(&record, &mapping);
                    }
                }
                None => return Err(PricebookError::HeaderNotFound),
            }
        };
        Ok(TabularReader {
            records,
            columns,
            valid: Box::new(valid),
            skipped: 0,
            _marker: PhantomData,
        })
    }

    pub fn columns(&self) -> &ColumnMap {
        &self.columns
    }

    /// Rows skipped so far, either rejected by the validity predicate
    /// or malformed.
    pub fn skipped(&self) -> usize {
        self.skipped
    }

    /// Next valid row, `None` at end of stream. Rows failing the
    /// validity predicate are skipped silently; rows failing to
    /// decode are logged and skipped.
    pub fn read(&mut self) -> Result<Option<T>> {
        loop {
            let record = match self.records.next() {
                Some(record) => record
                    .map_err(|e| PricebookError::Parse(format!("unreadable feed record: {e}")))?,
                None => return Ok(None),
            };
            if !(self.valid)(&self.columns, &record) {
                self.skipped += 1;
                continue;
            }
            match T::from_record(&self.columns, &record) {
                Ok(row) => return Ok(Some(row)),
                Err(e) => {
                    self.skipped += 1;
                    warn!(error = %e, "skipping malformed feed row");
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Row {
        sku: String,
        amount: f64,
    }

    impl FeedRecord for Row {
        fn from_record(columns: &ColumnMap, record: &StringRecord) -> Result<Self> {
            Ok(Row {
                sku: columns.text(record, field::SKU),
                amount: columns.number(record, field::PRICE_PER_UNIT)?,
            })
        }
    }

    fn reader(content: &str) -> Result<TabularReader<&[u8], Row>> {
        TabularReader::new(content.as_bytes(), base_mapping(), |_, _| true)
    }

    const FEED: &str = "\
\"Disclaimer: prices may change\"
\"Publication Date\",\"2026-08-01\"
\"Version\",\"20260801\"
SKU,OfferTermCode,TermType,PricePerUnit,Unit,UnknownColumn
AAA,JRTCKXETXF,OnDemand,0.25,Hrs,noise
BBB,JRTCKXETXF,OnDemand,0.50,Hrs,noise
";

    #[test]
    fn test_preamble_is_skipped() {
        let mut r = reader(FEED).unwrap();
        let row = r.read().unwrap().unwrap();
        assert_eq!(row.sku, "AAA");
        assert_eq!(row.amount, 0.25);
        assert_eq!(r.read().unwrap().unwrap().sku, "BBB");
        assert!(r.read().unwrap().is_none());
    }

    #[test]
    fn test_marker_requires_exact_first_cell() {
        // A preamble line mentioning SKU in a longer cell must not be
        // mistaken for the header.
        let content = "\
\"SKU definitions follow\",\"x\"
SKU,PricePerUnit
AAA,1.5
";
        let mut r = reader(content).unwrap();
        let row = r.read().unwrap().unwrap();
        assert_eq!(row.sku, "AAA");
    }

    #[test]
    fn test_missing_header_is_fatal() {
        let err = reader("\"only\",\"preamble\"\n\"rows\",\"here\"\n").unwrap_err();
        assert!(matches!(err, PricebookError::HeaderNotFound));
    }

    #[test]
    fn test_unknown_columns_are_dropped() {
        let mut r = reader(FEED).unwrap();
        let _ = r.read().unwrap();
        // No canonical field maps to UnknownColumn.
        assert!(r.columns().index.values().all(|&i| i != 5));
    }

    #[test]
    fn test_validity_predicate_skips_rows() {
        let mut r: TabularReader<&[u8], Row> =
            TabularReader::new(FEED.as_bytes(), base_mapping(), |columns, record| {
                columns.text(record, field::SKU) == "BBB"
            })
            .unwrap();
        assert_eq!(r.read().unwrap().unwrap().sku, "BBB");
        assert!(r.read().unwrap().is_none());
        assert_eq!(r.skipped(), 1);
    }

    #[test]
    fn test_malformed_row_is_skipped_with_count() {
        let content = "\
SKU,PricePerUnit
AAA,not-a-number
BBB,2.0
";
        let mut r = reader(content).unwrap();
        let row = r.read().unwrap().unwrap();
        assert_eq!(row.sku, "BBB");
        assert_eq!(r.skipped(), 1);
    }

    #[test]
    fn test_lenient_number() {
        let content = "SKU,PricePerUnit\nAAA,1.0\n";
        let r = reader(content).unwrap();
        let record = StringRecord::from(vec!["AAA", "1.0"]);
        assert_eq!(r.columns().lenient_number(&record, field::PRICE_PER_UNIT), 1.0);
        let record = StringRecord::from(vec!["AAA", "8 GiB"]);
        assert_eq!(r.columns().lenient_number(&record, field::PRICE_PER_UNIT), 8.0);
        let record = StringRecord::from(vec!["AAA", "EBS only"]);
        assert_eq!(r.columns().lenient_number(&record, field::PRICE_PER_UNIT), 0.0);
    }

    #[test]
    fn test_custom_header_predicate() {
        let content = "\
\"preamble\"
RateCode,PricePerUnit
";
        let mapping = HashMap::from([("RateCode", field::SKU), ("PricePerUnit", field::PRICE_PER_UNIT)]);
        let r: TabularReader<&[u8], Row> = TabularReader::with_header_predicate(
            content.as_bytes(),
            mapping,
            |_, _| true,
            |record| record.get(0) == Some("RateCode"),
        )
        .unwrap();
        assert!(r.columns().index.contains_key(field::SKU));
    }
}
