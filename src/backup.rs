use crate::store::{ATTENDANCE_FILE, ROSTER_FILE};
use anyhow::{anyhow, Context};
use serde_json::json;
use sha2::{Digest, Sha256};
use std::fs::File;
use std::io::{Read, Write};
use std::path::Path;
use std::time::{SystemTime, UNIX_EPOCH};
use zip::write::FileOptions;
use zip::{CompressionMethod, ZipArchive, ZipWriter};

const MANIFEST_ENTRY: &str = "manifest.json";
const TABLES: [&str; 2] = [ROSTER_FILE, ATTENDANCE_FILE];
pub const BUNDLE_FORMAT_V1: &str = "attendance-workspace-v1";

#[derive(Debug, Clone)]
pub struct ExportSummary {
    pub bundle_format: String,
    pub entry_count: usize,
}

#[derive(Debug, Clone)]
pub struct ImportSummary {
    pub bundle_format_detected: String,
    pub tables_restored: usize,
}

fn table_entry(file_name: &str) -> String {
    format!("tables/{file_name}")
}

fn sha256_hex(bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    format!("{:x}", hasher.finalize())
}

pub fn export_workspace_bundle(
    workspace_path: &Path,
    out_path: &Path,
) -> anyhow::Result<ExportSummary> {
    let mut tables: Vec<(&str, Vec<u8>)> = Vec::new();
    for name in TABLES {
        let p = workspace_path.join(name);
        let bytes = std::fs::read(&p)
            .with_context(|| format!("failed to read table {}", p.to_string_lossy()))?;
        tables.push((name, bytes));
    }

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

    let exported_at = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs();
    let checksums: serde_json::Map<String, serde_json::Value> = tables
        .iter()
        .map(|(name, bytes)| (table_entry(name), json!(sha256_hex(bytes))))
        .collect();
    let manifest = json!({
        "format": BUNDLE_FORMAT_V1,
        "version": 1,
        "appVersion": env!("CARGO_PKG_VERSION"),
        "exportedAt": exported_at,
        "sha256": checksums,
    });
    zip.start_file(MANIFEST_ENTRY, opts)
        .context("failed to start manifest entry")?;
    zip.write_all(
        serde_json::to_string_pretty(&manifest)
            .context("failed to serialize manifest")?
            .as_bytes(),
    )
    .context("failed to write manifest entry")?;

    for (name, bytes) in &tables {
        let entry = table_entry(name);
        zip.start_file(entry.as_str(), opts)
            .with_context(|| format!("failed to start {entry}"))?;
        zip.write_all(bytes)
            .with_context(|| format!("failed to write {entry}"))?;
    }

    zip.finish().context("failed to finalize zip bundle")?;
    tracing::info!(path = %out_path.display(), "workspace bundle exported");

    Ok(ExportSummary {
        bundle_format: BUNDLE_FORMAT_V1.to_string(),
        entry_count: 1 + tables.len(),
    })
}

/// Restores both tables from a bundle into `workspace_path`. Every checksum is
/// verified before any table is replaced.
pub fn import_workspace_bundle(
    in_path: &Path,
    workspace_path: &Path,
) -> anyhow::Result<ImportSummary> {
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

    let mut tables: Vec<(&str, Vec<u8>)> = Vec::new();
    for name in TABLES {
        let entry = table_entry(name);
        let mut bytes = Vec::new();
        archive
            .by_name(&entry)
            .with_context(|| format!("bundle missing {entry}"))?
            .read_to_end(&mut bytes)
            .with_context(|| format!("failed to read {entry}"))?;
        let expected = manifest
            .get("sha256")
            .and_then(|m| m.get(&entry))
            .and_then(|v| v.as_str())
            .ok_or_else(|| anyhow!("manifest has no checksum for {entry}"))?;
        let actual = sha256_hex(&bytes);
        if actual != expected {
            return Err(anyhow!(
                "checksum mismatch for {entry}: expected {expected}, got {actual}"
            ));
        }
        tables.push((name, bytes));
    }

    std::fs::create_dir_all(workspace_path).with_context(|| {
        format!(
            "failed to create workspace {}",
            workspace_path.to_string_lossy()
        )
    })?;
    for (name, bytes) in &tables {
        let dst = workspace_path.join(name);
        let tmp_dst = workspace_path.join(format!("{name}.importing"));
        let mut out = File::create(&tmp_dst).with_context(|| {
            format!("failed to create temp table {}", tmp_dst.to_string_lossy())
        })?;
        out.write_all(bytes)
            .and_then(|_| out.flush())
            .with_context(|| format!("failed to write {}", tmp_dst.to_string_lossy()))?;
        std::fs::rename(&tmp_dst, &dst).with_context(|| {
            format!("failed to move extracted table to {}", dst.to_string_lossy())
        })?;
    }
    tracing::info!(path = %in_path.display(), workspace = %workspace_path.display(), "workspace bundle imported");

    Ok(ImportSummary {
        bundle_format_detected: BUNDLE_FORMAT_V1.to_string(),
        tables_restored: tables.len(),
    })
}
