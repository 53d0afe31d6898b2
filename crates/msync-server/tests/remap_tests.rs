//! Canonical artifact output through full sync runs

mod common;

use anyhow::Result;
use common::{iherb_manifest, Harness};
use msync_server::ingest::remap::{StagedRecord, UniversalManifestEntry};

fn created_artifact(h: &Harness) -> Result<String> {
    let created = h.stage_files("05_created")?;
    assert_eq!(created.len(), 1, "expected exactly one artifact: {:?}", created);
    Ok(std::fs::read_to_string(h.root().join("05_created").join(&created[0]))?)
}

/// Canonical line with only the pass-through columns filled in
fn canonical_line(separator: char, barcode: &str, order_code: &str) -> String {
    let mut fields = vec![""; UniversalManifestEntry::HEADERS.len()];
    fields[0] = "iHerb";
    fields[1] = barcode;
    fields[4] = "USD";
    fields[20] = order_code;
    fields.join(&separator.to_string())
}

#[tokio::test]
async fn test_every_row_is_written_in_order() -> Result<()> {
    common::init_tracing();
    let h = Harness::new().await?;
    let rows = [("RA1", "LO-1"), ("RA2", "LO-2"), ("RA3", "LO-3")];
    h.remote.upload("batch.csv", &iherb_manifest(',', &rows), 100)?;

    let summary = h.pipeline.run().await?;
    assert_eq!(summary.remap.rows_written, 3);

    let artifact = created_artifact(&h)?;
    let lines: Vec<&str> = artifact.lines().collect();
    assert_eq!(lines.len(), 4);
    assert_eq!(lines[0], UniversalManifestEntry::HEADERS.join(","));
    for (line, (barcode, order_code)) in lines[1..].iter().zip(rows) {
        assert_eq!(*line, canonical_line(',', barcode, order_code));
    }
    assert!(!artifact.contains('"'));

    Ok(())
}

#[tokio::test]
async fn test_separator_applies_to_input_and_output() -> Result<()> {
    common::init_tracing();
    let h = Harness::with_separator(b';').await?;
    h.remote.upload("semi.csv", &iherb_manifest(';', &[("RA1", "LO-1")]), 100)?;

    h.pipeline.run().await?;

    let artifact = created_artifact(&h)?;
    let lines: Vec<&str> = artifact.lines().collect();
    assert_eq!(lines[0], UniversalManifestEntry::HEADERS.join(";"));
    assert_eq!(lines[1], canonical_line(';', "RA1", "LO-1"));

    Ok(())
}

#[tokio::test]
async fn test_header_only_manifest_yields_header_only_artifact() -> Result<()> {
    common::init_tracing();
    let h = Harness::new().await?;
    h.remote.upload("empty.csv", &iherb_manifest(',', &[]), 100)?;

    let summary = h.pipeline.run().await?;

    assert_eq!(summary.remap.remapped, 1);
    assert_eq!(summary.remap.rows_written, 0);
    assert_eq!(created_artifact(&h)?.lines().count(), 1);

    Ok(())
}

#[tokio::test]
async fn test_unparseable_file_does_not_block_others() -> Result<()> {
    common::init_tracing();
    let h = Harness::new().await?;
    h.remote.upload(
        "a_bad.csv",
        "barcode,weight_of_the_parcel_kg\nRA1,heavy\n",
        100,
    )?;
    h.remote.upload("b_good.csv", &iherb_manifest(',', &[("RB1", "LO-1")]), 100)?;

    let summary = h.pipeline.run().await?;

    assert_eq!(summary.remap.failed, 1);
    assert_eq!(summary.remap.remapped, 1);
    assert_eq!(summary.errors.len(), 1);
    assert!(summary.errors[0].starts_with("a_bad_"));

    // The bad file waits in the changed stage for the next run
    let changed = h.stage_files("02_changed")?;
    assert_eq!(changed.len(), 1);
    assert!(changed[0].starts_with("a_bad_"));
    assert!(h.stage_files("04_remapped")?[0].starts_with("b_good_"));

    let artifact = created_artifact(&h)?;
    assert_eq!(artifact.lines().nth(1), Some(canonical_line(',', "RB1", "LO-1").as_str()));

    Ok(())
}
