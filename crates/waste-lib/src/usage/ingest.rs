//! Usage row ingestion
//!
//! Reads billing exports in either the full cost-and-usage-report column
//! layout (`lineItem/ResourceId`, ...) or the simplified layout
//! (`ResourceId`, ...). A bad row is skipped with a warning and never
//! aborts the batch.

use std::io::Read;
use std::path::Path;

use chrono::{DateTime, Utc};
use csv::StringRecord;
use serde_json::Value;
use tracing::{debug, info, warn};

use crate::error::IngestError;
use crate::models::{
    UsageRecord, DEFAULT_AVAILABILITY_ZONE, DEFAULT_INSTANCE_TYPE, DEFAULT_SERVICE_TYPE,
};

const RESOURCE_ID: &[&str] = &["lineItem/ResourceId", "ResourceId"];
const SERVICE_TYPE: &[&str] = &["product/ProductName", "ProductName"];
const USAGE_AMOUNT: &[&str] = &["lineItem/UsageAmount", "UsageAmount"];
const COST: &[&str] = &["lineItem/UnblendedCost", "UnblendedCost"];
const AVAILABILITY_ZONE: &[&str] = &["lineItem/AvailabilityZone", "AvailabilityZone"];
const INSTANCE_TYPE: &[&str] = &["product/instanceType", "instanceType"];
const USAGE_START: &[&str] = &["lineItem/UsageStartDate", "UsageStartDate"];
const USAGE_TYPE: &[&str] = &["lineItem/UsageType", "UsageType"];
const OPERATION: &[&str] = &["lineItem/Operation", "Operation"];
const REGION: &[&str] = &["product/region", "region"];

/// A row that was dropped during ingestion
#[derive(Debug)]
pub struct SkippedRow {
    /// 1-based data row number (header excluded)
    pub row: usize,
    pub error: IngestError,
}

/// Result of ingesting one batch of usage rows
#[derive(Debug, Default)]
pub struct IngestReport {
    pub records: Vec<UsageRecord>,
    pub skipped: Vec<SkippedRow>,
    /// Rows with zero usage and zero cost
    pub zero_rows: usize,
}

impl IngestReport {
    pub fn total_rows(&self) -> usize {
        self.records.len() + self.skipped.len() + self.zero_rows
    }
}

/// Header positions resolved once per file
struct ColumnMap {
    resource_id: Option<usize>,
    service_type: Option<usize>,
    usage_amount: Option<usize>,
    cost: Option<usize>,
    availability_zone: Option<usize>,
    instance_type: Option<usize>,
    usage_start: Option<usize>,
    usage_type: Option<usize>,
    operation: Option<usize>,
    region: Option<usize>,
}

impl ColumnMap {
    fn from_headers(headers: &StringRecord) -> Self {
        let find = |names: &[&str]| {
            names
                .iter()
                .find_map(|name| headers.iter().position(|h| h == *name))
        };

        Self {
            resource_id: find(RESOURCE_ID),
            service_type: find(SERVICE_TYPE),
            usage_amount: find(USAGE_AMOUNT),
            cost: find(COST),
            availability_zone: find(AVAILABILITY_ZONE),
            instance_type: find(INSTANCE_TYPE),
            usage_start: find(USAGE_START),
            usage_type: find(USAGE_TYPE),
            operation: find(OPERATION),
            region: find(REGION),
        }
    }

    fn parse_row(
        &self,
        row: &StringRecord,
        ingested_at: DateTime<Utc>,
    ) -> Result<UsageRecord, IngestError> {
        let resource_id = field(row, self.resource_id)
            .ok_or(IngestError::MissingField { field: "resource_id" })?;
        let usage_amount = parse_amount("usage_amount", field(row, self.usage_amount))?;
        let cost = parse_amount("cost", field(row, self.cost))?;

        let timestamp = field(row, self.usage_start)
            .and_then(|s| DateTime::parse_from_rfc3339(s).ok())
            .map(|dt| dt.with_timezone(&Utc))
            .unwrap_or(ingested_at);

        Ok(UsageRecord {
            resource_id: resource_id.to_string(),
            service_type: field(row, self.service_type)
                .unwrap_or(DEFAULT_SERVICE_TYPE)
                .to_string(),
            usage_amount,
            cost,
            availability_zone: field(row, self.availability_zone)
                .unwrap_or(DEFAULT_AVAILABILITY_ZONE)
                .to_string(),
            instance_type: field(row, self.instance_type)
                .unwrap_or(DEFAULT_INSTANCE_TYPE)
                .to_string(),
            timestamp,
            usage_type: field(row, self.usage_type).map(str::to_string),
            operation: field(row, self.operation).map(str::to_string),
            region: field(row, self.region).map(str::to_string),
        })
    }
}

/// Non-empty trimmed cell value
fn field(row: &StringRecord, idx: Option<usize>) -> Option<&str> {
    idx.and_then(|i| row.get(i))
        .map(str::trim)
        .filter(|s| !s.is_empty())
}

fn parse_amount(name: &'static str, raw: Option<&str>) -> Result<f64, IngestError> {
    let raw = raw.ok_or(IngestError::MissingField { field: name })?;
    let value: f64 = raw.parse().map_err(|_| IngestError::InvalidNumber {
        field: name,
        value: raw.to_string(),
    })?;
    check_amount(name, value)
}

fn check_amount(name: &'static str, value: f64) -> Result<f64, IngestError> {
    if !value.is_finite() || value < 0.0 {
        return Err(IngestError::NegativeValue { field: name, value });
    }
    Ok(value)
}

/// Read usage rows from any CSV source with a header line
///
/// Only an unreadable header is fatal; every other failure is recorded in
/// the report's `skipped` list.
pub fn read_usage<R: Read>(reader: R) -> Result<IngestReport, IngestError> {
    let mut rdr = csv::ReaderBuilder::new()
        .flexible(true)
        .trim(csv::Trim::All)
        .from_reader(reader);

    let columns = ColumnMap::from_headers(rdr.headers()?);
    let ingested_at = Utc::now();
    let mut report = IngestReport::default();

    for (idx, result) in rdr.records().enumerate() {
        let row_num = idx + 1;
        let parsed = result
            .map_err(IngestError::from)
            .and_then(|row| columns.parse_row(&row, ingested_at));

        match parsed {
            Ok(record) if record.is_empty_signal() => {
                debug!(row = row_num, resource_id = %record.resource_id, "Dropping zero usage row");
                report.zero_rows += 1;
            }
            Ok(record) => report.records.push(record),
            Err(error) => {
                warn!(row = row_num, error = %error, "Skipping malformed usage row");
                report.skipped.push(SkippedRow { row: row_num, error });
            }
        }
    }

    info!(
        records = report.records.len(),
        skipped = report.skipped.len(),
        zero_rows = report.zero_rows,
        "Usage ingestion completed"
    );

    Ok(report)
}

/// Read a usage CSV file from disk
pub fn read_usage_file(path: &Path) -> Result<IngestReport, IngestError> {
    let file = std::fs::File::open(path)?;
    read_usage(file)
}

/// Check a record that arrived already structured (e.g. as JSON)
pub fn validate_record(record: &UsageRecord) -> Result<(), IngestError> {
    if record.resource_id.trim().is_empty() {
        return Err(IngestError::MissingField { field: "resource_id" });
    }
    check_amount("usage_amount", record.usage_amount)?;
    check_amount("cost", record.cost)?;
    Ok(())
}

/// Split structured records into valid ones and skipped ones
pub fn partition_valid(records: Vec<UsageRecord>) -> (Vec<UsageRecord>, Vec<SkippedRow>) {
    let mut valid = Vec::with_capacity(records.len());
    let mut skipped = Vec::new();

    for (idx, record) in records.into_iter().enumerate() {
        match validate_record(&record) {
            Ok(()) => valid.push(record),
            Err(error) => {
                warn!(row = idx + 1, resource_id = %record.resource_id, error = %error, "Skipping invalid usage record");
                skipped.push(SkippedRow { row: idx + 1, error });
            }
        }
    }

    (valid, skipped)
}

/// Decode loosely-typed records one by one, then validate the survivors
///
/// An element that does not decode (wrong field type, missing amount) is
/// skipped like any other malformed row; row numbers are 1-based positions
/// in `values`.
pub fn decode_records(values: Vec<Value>) -> (Vec<UsageRecord>, Vec<SkippedRow>) {
    let mut decoded = Vec::with_capacity(values.len());
    let mut skipped = Vec::new();

    for (idx, value) in values.into_iter().enumerate() {
        let row = idx + 1;
        let record = serde_json::from_value::<UsageRecord>(value)
            .map_err(IngestError::from)
            .and_then(|record| validate_record(&record).map(|()| record));

        match record {
            Ok(record) => decoded.push(record),
            Err(error) => {
                warn!(row, error = %error, "Skipping undecodable usage record");
                skipped.push(SkippedRow { row, error });
            }
        }
    }

    (decoded, skipped)
}
