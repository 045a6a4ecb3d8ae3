use anyhow::{anyhow, Context};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::json;
use sha2::{Digest, Sha256};
use std::fs::File;
use std::io::{Read, Write};
use std::path::Path;
use zip::write::FileOptions;
use zip::{CompressionMethod, ZipArchive, ZipWriter};

const MANIFEST_ENTRY: &str = "manifest.json";
const RECORDS_ENTRY: &str = "data/submissions.json";
pub const BUNDLE_FORMAT_V1: &str = "submissions-bundle-v1";
pub const LEGACY_JSON_FORMAT: &str = "legacy-json";

#[derive(Debug, Clone)]
pub struct ExportSummary {
    pub bundle_format: String,
    pub entry_count: usize,
    pub record_count: usize,
    pub sha256: String,
}

#[derive(Debug, Clone)]
pub struct ImportSummary {
    pub bundle_format_detected: String,
    pub record_count: usize,
}

fn sha256_hex(bytes: &[u8]) -> String {
    format!("{:x}", Sha256::digest(bytes))
}

/// Writes `records` as a zip bundle: a manifest carrying the SHA-256 of the
/// payload, and the payload itself as a JSON array.
pub fn export_bundle<T: Serialize>(records: &[T], out_path: &Path) -> anyhow::Result<ExportSummary> {
    if let Some(parent) = out_path.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("failed to create directory {}", parent.to_string_lossy()))?;
    }

    let payload = serde_json::to_vec_pretty(records).context("failed to serialize records")?;
    let checksum = sha256_hex(&payload);

    let out_file = File::create(out_path).with_context(|| {
        format!(
            "failed to create output file {}",
            out_path.to_string_lossy()
        )
    })?;
    let mut zip = ZipWriter::new(out_file);
    let opts = FileOptions::default().compression_method(CompressionMethod::Deflated);

    let manifest = json!({
        "format": BUNDLE_FORMAT_V1,
        "version": 1,
        "appVersion": env!("CARGO_PKG_VERSION"),
        "exportedAt": chrono::Utc::now().to_rfc3339(),
        "recordCount": records.len(),
        "payloadSha256": checksum,
    });
    zip.start_file(MANIFEST_ENTRY, opts)
        .context("failed to start manifest entry")?;
    zip.write_all(
        serde_json::to_string_pretty(&manifest)
            .context("failed to serialize manifest")?
            .as_bytes(),
    )
    .context("failed to write manifest entry")?;

    zip.start_file(RECORDS_ENTRY, opts)
        .context("failed to start records entry")?;
    zip.write_all(&payload)
        .context("failed to write records entry")?;

    zip.finish().context("failed to finalize zip bundle")?;

    Ok(ExportSummary {
        bundle_format: BUNDLE_FORMAT_V1.to_string(),
        entry_count: 2,
        record_count: records.len(),
        sha256: checksum,
    })
}

/// Reads a bundle written by [`export_bundle`]. A plain JSON array file (the
/// raw `submissions` store value) is accepted as a legacy export.
pub fn import_bundle<T: DeserializeOwned>(in_path: &Path) -> anyhow::Result<(Vec<T>, ImportSummary)> {
    if !is_zip_file(in_path)? {
        let text = std::fs::read_to_string(in_path)
            .with_context(|| format!("failed to read {}", in_path.to_string_lossy()))?;
        let records: Vec<T> =
            serde_json::from_str(&text).context("legacy export is not a JSON array of records")?;
        let summary = ImportSummary {
            bundle_format_detected: LEGACY_JSON_FORMAT.to_string(),
            record_count: records.len(),
        };
        return Ok((records, summary));
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

    let mut payload = Vec::new();
    archive
        .by_name(RECORDS_ENTRY)
        .context("bundle missing data/submissions.json")?
        .read_to_end(&mut payload)
        .context("failed to extract records entry")?;

    let expected = manifest
        .get("payloadSha256")
        .and_then(|v| v.as_str())
        .unwrap_or("");
    let actual = sha256_hex(&payload);
    if expected != actual {
        return Err(anyhow!(
            "records checksum mismatch: manifest {} vs payload {}",
            expected,
            actual
        ));
    }

    let records: Vec<T> = serde_json::from_slice(&payload).context("records entry is invalid")?;
    let summary = ImportSummary {
        bundle_format_detected: BUNDLE_FORMAT_V1.to_string(),
        record_count: records.len(),
    };
    Ok((records, summary))
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
