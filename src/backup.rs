use crate::exchange;
use crate::rows::Row;
use anyhow::{anyhow, Context};
use serde_json::json;
use sha2::{Digest, Sha256};
use std::fs::File;
use std::io::{Read, Write};
use std::path::Path;
use zip::write::FileOptions;
use zip::{CompressionMethod, ZipArchive, ZipWriter};

const MANIFEST_ENTRY: &str = "manifest.json";
const ROWS_ENTRY: &str = "rows.csv";
pub const BUNDLE_FORMAT_V1: &str = "gradetreed-rows-v1";
pub const PLAIN_CSV_FORMAT: &str = "plain-csv";

#[derive(Debug, Clone)]
pub struct ExportSummary {
    pub bundle_format: String,
    pub row_count: usize,
    pub rows_sha256: String,
}

#[derive(Debug, Clone)]
pub struct ImportSummary {
    pub bundle_format_detected: String,
    pub rows: Vec<Row>,
}

fn sha256_hex(bytes: &[u8]) -> String {
    format!("{:x}", Sha256::digest(bytes))
}

pub fn export_rows_bundle(rows: &[Row], out_path: &Path) -> anyhow::Result<ExportSummary> {
    if let Some(parent) = out_path.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("failed to create directory {}", parent.to_string_lossy()))?;
    }

    let out_file = File::create(out_path).with_context(|| {
        format!(
            "failed to create output file {}",
            out_path.to_string_lossy()
        )
    })?;
    let mut zip = ZipWriter::new(out_file);
    let opts = FileOptions::default().compression_method(CompressionMethod::Deflated);

    let csv = exchange::rows_to_csv(rows);
    let digest = sha256_hex(csv.as_bytes());
    let manifest = json!({
        "format": BUNDLE_FORMAT_V1,
        "version": 1,
        "appVersion": env!("CARGO_PKG_VERSION"),
        "exportedAt": chrono::Utc::now().to_rfc3339(),
        "rowCount": rows.len(),
        "rowsSha256": digest,
    });
    zip.start_file(MANIFEST_ENTRY, opts)
        .context("failed to start manifest entry")?;
    zip.write_all(
        serde_json::to_string_pretty(&manifest)
            .context("failed to serialize manifest")?
            .as_bytes(),
    )
    .context("failed to write manifest entry")?;

    zip.start_file(ROWS_ENTRY, opts)
        .context("failed to start rows entry")?;
    zip.write_all(csv.as_bytes())
        .context("failed to write rows entry")?;

    zip.finish().context("failed to finalize zip bundle")?;

    Ok(ExportSummary {
        bundle_format: BUNDLE_FORMAT_V1.to_string(),
        row_count: rows.len(),
        rows_sha256: digest,
    })
}

/// Read rows back from a bundle. A non-zip input is taken as a plain CSV export.
pub fn import_rows_bundle(in_path: &Path) -> anyhow::Result<ImportSummary> {
    if !is_zip_file(in_path)? {
        let rows = exchange::read_rows_csv(in_path)?;
        return Ok(ImportSummary {
            bundle_format_detected: PLAIN_CSV_FORMAT.to_string(),
            rows,
        });
    }

    let in_file = File::open(in_path)
        .with_context(|| format!("failed to open bundle {}", in_path.to_string_lossy()))?;
    let mut archive = ZipArchive::new(in_file).context("invalid zip archive")?;

    let mut manifest_text = String::new();
    archive
        .by_name(MANIFEST_ENTRY)
        .context("bundle missing manifest.json")?
        .read_to_string(&mut manifest_text)
        .context("failed to read manifest.json")?;
    let manifest: serde_json::Value =
        serde_json::from_str(&manifest_text).context("manifest.json is invalid JSON")?;
    let format = manifest
        .get("format")
        .and_then(|v| v.as_str())
        .unwrap_or("");
    if format != BUNDLE_FORMAT_V1 {
        return Err(anyhow!("unsupported bundle format: {}", format));
    }

    let mut csv = String::new();
    archive
        .by_name(ROWS_ENTRY)
        .context("bundle missing rows.csv")?
        .read_to_string(&mut csv)
        .context("failed to read rows.csv")?;

    if let Some(expected) = manifest.get("rowsSha256").and_then(|v| v.as_str()) {
        let actual = sha256_hex(csv.as_bytes());
        if !actual.eq_ignore_ascii_case(expected) {
            return Err(anyhow!(
                "rows.csv checksum mismatch: expected {}, got {}",
                expected,
                actual
            ));
        }
    }

    let rows = exchange::parse_rows_csv(&csv).context("failed to parse rows.csv")?;
    Ok(ImportSummary {
        bundle_format_detected: BUNDLE_FORMAT_V1.to_string(),
        rows,
    })
}

fn is_zip_file(path: &Path) -> anyhow::Result<bool> {
    let mut f = File::open(path)
        .with_context(|| format!("failed to open input file {}", path.to_string_lossy()))?;
    let mut sig = [0u8; 4];
    let read = f.read(&mut sig).context("failed to read file signature")?;
    if read < 4 {
        return Ok(false);
    }
    Ok(sig == [0x50, 0x4B, 0x03, 0x04])
}
