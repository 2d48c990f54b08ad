use crate::export;
use crate::ipc::error::{ok, HandlerErr};
use crate::ipc::helpers::{get_month_year, require_store};
use crate::ipc::types::{AppState, Request};
use crate::ledger::Ledger;
use crate::store::RecordStore;
use serde_json::json;
use std::path::PathBuf;

fn reports_month(
    store: &RecordStore,
    params: &serde_json::Value,
) -> Result<serde_json::Value, HandlerErr> {
    let (month, year) = get_month_year(params)?;
    let report = Ledger::new(store).month_report(month, year)?;
    serde_json::to_value(&report).map_err(|e| HandlerErr {
        code: "serialize_failed",
        message: e.to_string(),
        details: None,
    })
}

/// Writes the month CSV to `outPath`, or to the default file name inside the
/// workspace when `outPath` is absent.
fn reports_export_csv(
    store: &RecordStore,
    params: &serde_json::Value,
) -> Result<serde_json::Value, HandlerErr> {
    let (month, year) = get_month_year(params)?;
    let out = params
        .get("outPath")
        .and_then(|v| v.as_str())
        .map(|s| s.trim())
        .filter(|s| !s.is_empty())
        .map(PathBuf::from)
        .unwrap_or_else(|| store.workspace().join(export::default_file_name(month, year)));

    let io_failed = |e: std::io::Error| HandlerErr {
        code: "io_failed",
        message: e.to_string(),
        details: Some(json!({ "path": out.to_string_lossy() })),
    };

    let report = Ledger::new(store).month_report(month, year)?;
    let csv = export::render_month_csv(&report).map_err(|e| io_failed(e.into()))?;
    if let Some(parent) = out.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent).map_err(io_failed)?;
    }
    std::fs::write(&out, csv).map_err(io_failed)?;
    tracing::info!(path = %out.display(), month, year, "month csv exported");

    Ok(json!({
        "path": out.to_string_lossy(),
        "fileName": export::default_file_name(month, year),
        "summaryRows": report.summary.len(),
        "detailRows": report.details.len()
    }))
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    let result = match req.method.as_str() {
        "reports.month" => require_store(state).and_then(|s| reports_month(s, &req.params)),
        "reports.exportCsv" => {
            require_store(state).and_then(|s| reports_export_csv(s, &req.params))
        }
        _ => return None,
    };
    Some(match result {
        Ok(result) => ok(&req.id, result),
        Err(error) => error.response(&req.id),
    })
}
