use crate::ipc::error::HandlerErr;
use crate::ipc::types::AppState;
use crate::store::RecordStore;
use chrono::{Datelike, NaiveDate};

pub fn today() -> NaiveDate {
    chrono::Local::now().date_naive()
}

pub fn require_store(state: &AppState) -> Result<&RecordStore, HandlerErr> {
    state.store.as_ref().ok_or_else(|| HandlerErr {
        code: "no_workspace",
        message: "select a workspace first".to_string(),
        details: None,
    })
}

pub fn get_required_str(params: &serde_json::Value, key: &str) -> Result<String, HandlerErr> {
    params
        .get(key)
        .and_then(|v| v.as_str())
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .ok_or_else(|| HandlerErr::bad_params(format!("missing {}", key)))
}

/// `YYYY-MM-DD` from `params[key]`, or today when absent. Returned in
/// zero-padded form so ledger keys stay comparable.
pub fn get_date_or_today(params: &serde_json::Value, key: &str) -> Result<String, HandlerErr> {
    let date = match params.get(key) {
        None | Some(serde_json::Value::Null) => today(),
        Some(v) => {
            let raw = v
                .as_str()
                .ok_or_else(|| HandlerErr::bad_params(format!("{} must be a string", key)))?;
            NaiveDate::parse_from_str(raw.trim(), "%Y-%m-%d")
                .map_err(|_| HandlerErr::bad_params(format!("{} must be YYYY-MM-DD", key)))?
        }
    };
    Ok(date.format("%Y-%m-%d").to_string())
}

/// `(month, year)` from params, each defaulting to the current one.
pub fn get_month_year(params: &serde_json::Value) -> Result<(u32, i32), HandlerErr> {
    let now = today();
    let month = match params.get("month").filter(|v| !v.is_null()) {
        None => now.month(),
        Some(v) => v
            .as_u64()
            .filter(|m| (1..=12).contains(m))
            .map(|m| m as u32)
            .ok_or_else(|| HandlerErr::bad_params("month must be between 1 and 12"))?,
    };
    let year = match params.get("year").filter(|v| !v.is_null()) {
        None => now.year(),
        Some(v) => v
            .as_i64()
            .and_then(|y| i32::try_from(y).ok())
            .filter(|y| *y > 0)
            .ok_or_else(|| HandlerErr::bad_params("year must be a positive number"))?,
    };
    Ok((month, year))
}
