//! Free-text commands, typed or transcribed from voice.
//!
//! Input is lowercased and tried against an ordered recognizer list; the first
//! pattern found anywhere in the text wins. Order matters: `mark ann present
//! on 2024-03-01` is a mark command, not a date lookup.

use crate::ledger::{parse_month_name, Ledger, MonthReport};
use crate::store::{AttendanceEntry, RecordStore, Status, StoreError, Student};
use chrono::{Datelike, NaiveDate};
use once_cell::sync::Lazy;
use regex::{Captures, Regex};
use serde::Serialize;

const NOT_UNDERSTOOD: &str = "❌ Sorry, I could not understand your command";

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StatusMessage {
    pub ok: bool,
    pub message: String,
}

impl StatusMessage {
    fn success(message: impl Into<String>) -> StatusMessage {
        StatusMessage {
            ok: true,
            message: format!("✅ {}", message.into()),
        }
    }

    fn removed(message: impl Into<String>) -> StatusMessage {
        StatusMessage {
            ok: true,
            message: format!("🗑️ {}", message.into()),
        }
    }

    fn failure(message: impl Into<String>) -> StatusMessage {
        StatusMessage {
            ok: false,
            message: format!("❌ {}", message.into()),
        }
    }
}

/// Query results that the presentation layer renders in place instead of
/// flashing a status line.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum Fragment {
    MonthReport(MonthReport),
    #[serde(rename_all = "camelCase")]
    StudentList { students: Vec<Student> },
    #[serde(rename_all = "camelCase")]
    DayView {
        date: String,
        rows: Vec<AttendanceEntry>,
    },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    Status(StatusMessage),
    Fragment(Fragment),
}

impl Outcome {
    fn success(message: impl Into<String>) -> Outcome {
        Outcome::Status(StatusMessage::success(message))
    }

    fn removed(message: impl Into<String>) -> Outcome {
        Outcome::Status(StatusMessage::removed(message))
    }

    fn failure(message: impl Into<String>) -> Outcome {
        Outcome::Status(StatusMessage::failure(message))
    }
}

type Handler = fn(&Interpreter<'_>, &Captures<'_>) -> Result<Outcome, StoreError>;

struct Recognizer {
    name: &'static str,
    pattern: Regex,
    handler: Handler,
}

fn recognizer(name: &'static str, pattern: &str, handler: Handler) -> Recognizer {
    Recognizer {
        name,
        pattern: Regex::new(pattern).expect("recognizer pattern"),
        handler,
    }
}

static RECOGNIZERS: Lazy<Vec<Recognizer>> = Lazy::new(|| {
    vec![
        recognizer(
            "add_student",
            r"add student (\w+) class (\w+) roll (\d+)",
            add_student,
        ),
        recognizer("mark", r"mark (\w+) (present|absent|unclear)", mark),
        recognizer("month_report", r"show report for (\w+)", month_report),
        recognizer("show_students", r"^show students$", show_students),
        recognizer("date_lookup", r" (\d{4}-\d{2}-\d{2})", date_lookup),
        recognizer("delete_student", r"delete student (\w+)", delete_student),
        recognizer("remove_all", r"^remove all students$", remove_all),
        recognizer("add_class", r"add class (\w+)", add_class),
    ]
});

pub struct Interpreter<'a> {
    ledger: Ledger<'a>,
    today: NaiveDate,
}

impl<'a> Interpreter<'a> {
    /// `today` is the date attendance is marked against and the year month
    /// reports are drawn from.
    pub fn new(store: &'a RecordStore, today: NaiveDate) -> Interpreter<'a> {
        Interpreter {
            ledger: Ledger::new(store),
            today,
        }
    }

    pub fn run(&self, text: &str) -> Result<Outcome, StoreError> {
        let query = text.to_lowercase();
        for r in RECOGNIZERS.iter() {
            if let Some(caps) = r.pattern.captures(&query) {
                tracing::debug!(recognizer = r.name, "command matched");
                return (r.handler)(self, &caps);
            }
        }
        tracing::debug!(text = %query, "command not understood");
        Ok(Outcome::Status(StatusMessage {
            ok: false,
            message: NOT_UNDERSTOOD.to_string(),
        }))
    }
}

fn capitalize(s: &str) -> String {
    let mut chars = s.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars.flat_map(|c| c.to_lowercase())).collect(),
        None => String::new(),
    }
}

fn add_student(it: &Interpreter<'_>, caps: &Captures<'_>) -> Result<Outcome, StoreError> {
    let name = &caps[1];
    let student = Student {
        name: capitalize(name),
        class_id: caps[2].to_uppercase(),
        roll_no: caps[3].to_string(),
    };
    it.ledger.add_student(&student)?;
    Ok(Outcome::success(format!("Student {name} added successfully!")))
}

fn mark(it: &Interpreter<'_>, caps: &Captures<'_>) -> Result<Outcome, StoreError> {
    let name = &caps[1];
    let status_word = &caps[2];
    let Some(student) = it.ledger.find_by_name(name)? else {
        return Ok(Outcome::failure(format!("Student {name} not found")));
    };
    let status = match status_word {
        "present" => Status::Present,
        "absent" => Status::Absent,
        _ => Status::Unclear,
    };
    let today = it.today.format("%Y-%m-%d").to_string();
    it.ledger.mark(&today, &student.roll_no, status)?;
    Ok(Outcome::success(format!(
        "Attendance marked for {name} ({status_word})"
    )))
}

fn month_report(it: &Interpreter<'_>, caps: &Captures<'_>) -> Result<Outcome, StoreError> {
    let Some(month) = parse_month_name(&caps[1]) else {
        return Ok(Outcome::failure("Could not understand month in report query"));
    };
    let report = it.ledger.month_report(month, it.today.year())?;
    Ok(Outcome::Fragment(Fragment::MonthReport(report)))
}

fn show_students(it: &Interpreter<'_>, _caps: &Captures<'_>) -> Result<Outcome, StoreError> {
    let students = it.ledger.students()?;
    if students.is_empty() {
        return Ok(Outcome::failure("No students found."));
    }
    Ok(Outcome::Fragment(Fragment::StudentList { students }))
}

fn date_lookup(it: &Interpreter<'_>, caps: &Captures<'_>) -> Result<Outcome, StoreError> {
    let date = &caps[1];
    if NaiveDate::parse_from_str(date, "%Y-%m-%d").is_err() {
        return Ok(Outcome::failure(format!("Could not understand date {date}")));
    }
    let rows = it.ledger.day_view(date)?;
    Ok(Outcome::Fragment(Fragment::DayView {
        date: date.to_string(),
        rows,
    }))
}

fn delete_student(it: &Interpreter<'_>, caps: &Captures<'_>) -> Result<Outcome, StoreError> {
    let name = &caps[1];
    if it.ledger.remove_by_name(name)? == 0 {
        return Ok(Outcome::failure(format!("Student {name} not found.")));
    }
    Ok(Outcome::removed(format!("Student {name} deleted successfully!")))
}

fn remove_all(it: &Interpreter<'_>, _caps: &Captures<'_>) -> Result<Outcome, StoreError> {
    it.ledger.clear_roster()?;
    Ok(Outcome::removed("All students have been removed."))
}

fn add_class(it: &Interpreter<'_>, caps: &Captures<'_>) -> Result<Outcome, StoreError> {
    let class_name = &caps[1];
    match it.ledger.import_class(class_name)? {
        Some(_) => Ok(Outcome::success(format!(
            "Students from class '{class_name}' added successfully!"
        ))),
        None => Ok(Outcome::failure(format!(
            "CSV file '{class_name}.csv' not found."
        ))),
    }
}
