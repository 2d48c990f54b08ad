use crate::ipc::error::{ok, HandlerErr};
use crate::ipc::helpers::{get_date_or_today, get_required_str, require_store};
use crate::ipc::types::{AppState, Request};
use crate::ledger::Ledger;
use crate::store::{RecordStore, Status};
use serde_json::json;

fn attendance_mark(
    store: &RecordStore,
    params: &serde_json::Value,
) -> Result<serde_json::Value, HandlerErr> {
    let roll_no = get_required_str(params, "rollNo")?;
    let raw_status = get_required_str(params, "status")?;
    let status = Status::parse_markable(&raw_status)
        .ok_or_else(|| HandlerErr::bad_params("status must be Present, Absent or Unclear"))?;
    let date = get_date_or_today(params, "date")?;

    let outcome = Ledger::new(store).mark(&date, &roll_no, status.clone())?;
    let message = format!(
        "✅ Attendance marked as {} for RollNo {}",
        status.as_str(),
        roll_no
    );
    Ok(json!({
        "date": date,
        "rollNo": roll_no,
        "status": status,
        "recorded": outcome.recorded(),
        "message": message
    }))
}

fn attendance_day(
    store: &RecordStore,
    params: &serde_json::Value,
) -> Result<serde_json::Value, HandlerErr> {
    let date = get_date_or_today(params, "date")?;
    let rows = Ledger::new(store).day_view(&date)?;
    Ok(json!({ "date": date, "rows": rows }))
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    let result = match req.method.as_str() {
        "attendance.mark" => require_store(state).and_then(|s| attendance_mark(s, &req.params)),
        "attendance.day" => require_store(state).and_then(|s| attendance_day(s, &req.params)),
        _ => return None,
    };
    Some(match result {
        Ok(result) => ok(&req.id, result),
        Err(error) => error.response(&req.id),
    })
}
