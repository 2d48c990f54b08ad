use crate::ipc::error::{ok, HandlerErr};
use crate::ipc::helpers::{get_required_str, require_store};
use crate::ipc::types::{AppState, Request};
use crate::ledger::Ledger;
use crate::store::{RecordStore, Student};
use serde_json::json;

fn students_list(store: &RecordStore) -> Result<serde_json::Value, HandlerErr> {
    let students = Ledger::new(store).students()?;
    Ok(json!({ "students": students }))
}

/// Form-style add: fields are stored as given, without case normalization.
fn students_create(
    store: &RecordStore,
    params: &serde_json::Value,
) -> Result<serde_json::Value, HandlerErr> {
    let student = Student {
        name: get_required_str(params, "name")?,
        class_id: get_required_str(params, "classId")?,
        roll_no: get_required_str(params, "rollNo")?,
    };
    Ledger::new(store).add_student(&student)?;
    let message = format!("✅ Student {} added successfully!", student.name);
    Ok(json!({ "student": student, "message": message }))
}

fn students_delete(
    store: &RecordStore,
    params: &serde_json::Value,
) -> Result<serde_json::Value, HandlerErr> {
    let roll_no = get_required_str(params, "rollNo")?;
    let removed = Ledger::new(store).remove_by_roll(&roll_no)?;
    if removed == 0 {
        return Err(HandlerErr {
            code: "not_found",
            message: format!("Student RollNo {} not found", roll_no),
            details: Some(json!({ "rollNo": roll_no })),
        });
    }
    Ok(json!({
        "removed": removed,
        "message": format!("🗑️ Student RollNo {} deleted", roll_no)
    }))
}

fn students_clear(store: &RecordStore) -> Result<serde_json::Value, HandlerErr> {
    Ledger::new(store).clear_roster()?;
    Ok(json!({ "message": "🗑️ All students have been removed." }))
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    let result = match req.method.as_str() {
        "students.list" => require_store(state).and_then(students_list),
        "students.create" => require_store(state).and_then(|s| students_create(s, &req.params)),
        "students.delete" => require_store(state).and_then(|s| students_delete(s, &req.params)),
        "students.clear" => require_store(state).and_then(students_clear),
        _ => return None,
    };
    Some(match result {
        Ok(result) => ok(&req.id, result),
        Err(error) => error.response(&req.id),
    })
}
