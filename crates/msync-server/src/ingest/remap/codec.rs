//! CSV row codec
//!
//! Reading binds columns by header name (headers are trimmed, unknown
//! columns ignored, missing columns and empty fields become `None`).
//! Writing always emits the header row and never quotes a field.

use crate::error::RemapError;
use crate::ingest::remap::models::{IherbManifestEntry, StagedRecord, UniversalManifestEntry};
use csv::{QuoteStyle, ReaderBuilder, Trim, WriterBuilder};
use std::fs::File;
use std::io::{Read, Write};
use std::path::Path;

/// Parse every row of a source manifest
pub fn read_manifest_entries(
    path: &Path,
    delimiter: u8,
) -> Result<Vec<IherbManifestEntry>, RemapError> {
    let file = File::open(path)?;
    read_manifest_entries_from(file, delimiter).map_err(|e| match e {
        RemapError::Csv(err) => RemapError::Parse {
            file: path.to_path_buf(),
            message: err.to_string(),
        },
        other => other,
    })
}

/// Parse source manifest rows from any reader
pub fn read_manifest_entries_from<R: Read>(
    reader: R,
    delimiter: u8,
) -> Result<Vec<IherbManifestEntry>, RemapError> {
    let mut reader = ReaderBuilder::new()
        .delimiter(delimiter)
        .trim(Trim::Headers)
        .from_reader(reader);

    let mut entries = Vec::new();
    for record in reader.deserialize() {
        entries.push(record?);
    }
    Ok(entries)
}

/// Write canonical rows, header first
pub fn write_universal_entries<W: Write>(
    writer: W,
    rows: &[UniversalManifestEntry],
    delimiter: u8,
) -> Result<(), RemapError> {
    let mut writer = WriterBuilder::new()
        .delimiter(delimiter)
        .quote_style(QuoteStyle::Never)
        .has_headers(false)
        .from_writer(writer);

    writer.write_record(UniversalManifestEntry::HEADERS)?;
    for row in rows {
        writer.serialize(row)?;
    }
    writer.flush()?;
    Ok(())
}
