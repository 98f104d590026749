//! Export service - write joined records to CSV or JSON

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

use anyhow::{Context, Result};
use serde::Serialize;

use crate::domain::JoinedRecord;

/// Flat CSV row; `None` renders as an empty cell
#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct CsvRow<'a> {
    asset: &'a str,
    network: &'a str,
    address: &'a str,
    tag: Option<&'a str>,
    deposit_enabled: Option<bool>,
    withdraw_enabled: Option<bool>,
    confirmations_required: Option<u32>,
    contract_address: Option<&'a str>,
}

impl<'a> From<&'a JoinedRecord> for CsvRow<'a> {
    fn from(r: &'a JoinedRecord) -> Self {
        Self {
            asset: &r.asset,
            network: &r.network,
            address: &r.address,
            tag: r.tag.as_deref(),
            deposit_enabled: r.deposit_enabled,
            withdraw_enabled: r.withdraw_enabled,
            confirmations_required: r.confirmations_required,
            contract_address: r.contract_address.as_deref(),
        }
    }
}

/// Export format, chosen from the output file extension by default
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExportFormat {
    Csv,
    Json,
}

impl ExportFormat {
    pub fn from_path(path: &Path) -> Option<Self> {
        match path.extension()?.to_str()?.to_ascii_lowercase().as_str() {
            "csv" => Some(Self::Csv),
            "json" => Some(Self::Json),
            _ => None,
        }
    }
}

pub struct ExportService;

impl ExportService {
    pub fn new() -> Self {
        Self
    }

    pub fn write(&self, path: &Path, format: ExportFormat, records: &[JoinedRecord]) -> Result<()> {
        match format {
            ExportFormat::Csv => self.write_csv(path, records),
            ExportFormat::Json => self.write_json(path, records),
        }
    }

    pub fn write_csv(&self, path: &Path, records: &[JoinedRecord]) -> Result<()> {
        let file = File::create(path)
            .with_context(|| format!("Failed to create {}", path.display()))?;
        self.write_csv_to(file, records)?;
        tracing::info!(path = %path.display(), records = records.len(), "Wrote CSV export");
        Ok(())
    }

    /// CSV to any writer; the header row is written even with no records
    pub fn write_csv_to<W: Write>(&self, writer: W, records: &[JoinedRecord]) -> Result<()> {
        let mut csv = csv::WriterBuilder::new()
            .has_headers(false)
            .from_writer(writer);

        csv.write_record([
            "asset",
            "network",
            "address",
            "tag",
            "depositEnabled",
            "withdrawEnabled",
            "confirmationsRequired",
            "contractAddress",
        ])?;
        for record in records {
            csv.serialize(CsvRow::from(record))?;
        }
        csv.flush().context("Failed to flush CSV export")?;
        Ok(())
    }

    pub fn write_json(&self, path: &Path, records: &[JoinedRecord]) -> Result<()> {
        let file = File::create(path)
            .with_context(|| format!("Failed to create {}", path.display()))?;
        let mut writer = BufWriter::new(file);
        serde_json::to_writer_pretty(&mut writer, records).context("Failed to write JSON export")?;
        writer.write_all(b"\n")?;
        writer.flush()?;
        tracing::info!(path = %path.display(), records = records.len(), "Wrote JSON export");
        Ok(())
    }
}

impl Default for ExportService {
    fn default() -> Self {
        Self::new()
    }
}
