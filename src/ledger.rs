use crate::store::{AttendanceEntry, RecordStore, Status, StoreError, Student};
use chrono::Datelike;
use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MarkOutcome {
    Updated,
    Inserted,
    /// No roster student carries the roll number; nothing was written.
    UnknownStudent,
}

impl MarkOutcome {
    pub fn recorded(self) -> bool {
        !matches!(self, MarkOutcome::UnknownStudent)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MonthlyAggregate {
    pub name: String,
    pub class_id: String,
    pub present: u32,
    pub absent: u32,
    pub unclear: u32,
}

/// Per-student counts for one month, in the order students were first seen.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct MonthSummary {
    rows: Vec<MonthlyAggregate>,
}

impl MonthSummary {
    pub fn get(&self, name: &str, class_id: &str) -> Option<&MonthlyAggregate> {
        self.rows
            .iter()
            .find(|r| r.name == name && r.class_id == class_id)
    }

    pub fn rows(&self) -> &[MonthlyAggregate] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    fn record(&mut self, entry: &AttendanceEntry) {
        let idx = match self
            .rows
            .iter()
            .position(|r| r.name == entry.name && r.class_id == entry.class_id)
        {
            Some(i) => i,
            None => {
                self.rows.push(MonthlyAggregate {
                    name: entry.name.clone(),
                    class_id: entry.class_id.clone(),
                    present: 0,
                    absent: 0,
                    unclear: 0,
                });
                self.rows.len() - 1
            }
        };
        let bucket = &mut self.rows[idx];
        match entry.status {
            Status::Present => bucket.present += 1,
            Status::Absent => bucket.absent += 1,
            _ => bucket.unclear += 1,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MonthReport {
    pub month_name: String,
    pub month: u32,
    pub year: i32,
    pub summary: MonthSummary,
    pub details: Vec<AttendanceEntry>,
}

pub fn month_name(month: u32) -> Option<&'static str> {
    u8::try_from(month)
        .ok()
        .and_then(|m| chrono::Month::try_from(m).ok())
        .map(|m| m.name())
}

/// Full English month names only, any letter case.
pub fn parse_month_name(raw: &str) -> Option<u32> {
    let t = raw.trim();
    (1..=12).find(|m| month_name(*m).is_some_and(|name| name.eq_ignore_ascii_case(t)))
}

fn in_month(entry: &AttendanceEntry, month: u32, year: i32) -> bool {
    match entry.parsed_date() {
        Some(d) => d.month() == month && d.year() == year,
        None => {
            tracing::debug!(date = %entry.date, roll_no = %entry.roll_no, "skipping row with unparsable date");
            false
        }
    }
}

/// Attendance and roster operations over a [`RecordStore`].
pub struct Ledger<'a> {
    store: &'a RecordStore,
}

impl<'a> Ledger<'a> {
    pub fn new(store: &'a RecordStore) -> Ledger<'a> {
        Ledger { store }
    }

    /// Upserts the status for `(date, roll_no)`. Name and class are copied from
    /// the roster only when a new row is inserted. Extra rows for the same key
    /// left by hand edits are dropped so exactly one remains.
    pub fn mark(&self, date: &str, roll_no: &str, status: Status) -> Result<MarkOutcome, StoreError> {
        let mut entries = self.store.load_attendance()?;
        let mut seen = false;
        entries.retain_mut(|e| {
            if e.date != date || e.roll_no != roll_no {
                return true;
            }
            if seen {
                return false;
            }
            seen = true;
            e.status = status.clone();
            true
        });

        let outcome = if seen {
            MarkOutcome::Updated
        } else {
            let students = self.store.load_students()?;
            let Some(s) = students.iter().find(|s| s.roll_no == roll_no) else {
                tracing::debug!(%date, %roll_no, "mark ignored, roll number not on roster");
                return Ok(MarkOutcome::UnknownStudent);
            };
            entries.push(AttendanceEntry {
                date: date.to_string(),
                name: s.name.clone(),
                class_id: s.class_id.clone(),
                roll_no: s.roll_no.clone(),
                status: status.clone(),
            });
            MarkOutcome::Inserted
        };

        self.store.save_attendance(&entries)?;
        tracing::info!(%date, %roll_no, status = status.as_str(), ?outcome, "attendance marked");
        Ok(outcome)
    }

    /// One row per roster student, roster order. Students without a stored
    /// row for `date` get a synthesized `NotMarked` row.
    pub fn day_view(&self, date: &str) -> Result<Vec<AttendanceEntry>, StoreError> {
        let students = self.store.load_students()?;
        let entries = self.store.load_attendance()?;
        Ok(students
            .into_iter()
            .map(|s| {
                entries
                    .iter()
                    .find(|e| e.date == date && e.roll_no == s.roll_no)
                    .cloned()
                    .unwrap_or(AttendanceEntry {
                        date: date.to_string(),
                        name: s.name,
                        class_id: s.class_id,
                        roll_no: s.roll_no,
                        status: Status::NotMarked,
                    })
            })
            .collect())
    }

    /// Aggregates are keyed by the name and class stored on each row, not by
    /// the current roster.
    pub fn month_summary(&self, month: u32, year: i32) -> Result<MonthSummary, StoreError> {
        let mut summary = MonthSummary::default();
        for entry in self.store.load_attendance()? {
            if in_month(&entry, month, year) {
                summary.record(&entry);
            }
        }
        Ok(summary)
    }

    pub fn month_details(&self, month: u32, year: i32) -> Result<Vec<AttendanceEntry>, StoreError> {
        Ok(self
            .store
            .load_attendance()?
            .into_iter()
            .filter(|e| in_month(e, month, year))
            .collect())
    }

    pub fn month_report(&self, month: u32, year: i32) -> Result<MonthReport, StoreError> {
        Ok(MonthReport {
            month_name: month_name(month).unwrap_or_default().to_string(),
            month,
            year,
            summary: self.month_summary(month, year)?,
            details: self.month_details(month, year)?,
        })
    }

    pub fn students(&self) -> Result<Vec<Student>, StoreError> {
        self.store.load_students()
    }

    pub fn add_student(&self, student: &Student) -> Result<(), StoreError> {
        self.store.append_student(student)?;
        tracing::info!(name = %student.name, class_id = %student.class_id, roll_no = %student.roll_no, "student added");
        Ok(())
    }

    /// First roster student whose name matches, ignoring case.
    pub fn find_by_name(&self, name: &str) -> Result<Option<Student>, StoreError> {
        let needle = name.to_lowercase();
        Ok(self
            .store
            .load_students()?
            .into_iter()
            .find(|s| s.name.to_lowercase() == needle))
    }

    /// Removes every student with the given roll number. Attendance rows are
    /// kept. Returns how many roster rows were removed.
    pub fn remove_by_roll(&self, roll_no: &str) -> Result<usize, StoreError> {
        self.remove_where(|s| s.roll_no == roll_no)
    }

    /// Removes every student whose name matches, ignoring case.
    pub fn remove_by_name(&self, name: &str) -> Result<usize, StoreError> {
        let needle = name.to_lowercase();
        self.remove_where(|s| s.name.to_lowercase() == needle)
    }

    fn remove_where(&self, pred: impl Fn(&Student) -> bool) -> Result<usize, StoreError> {
        let students = self.store.load_students()?;
        let before = students.len();
        let kept: Vec<Student> = students.into_iter().filter(|s| !pred(s)).collect();
        let removed = before - kept.len();
        if removed > 0 {
            self.store.save_students(&kept)?;
            tracing::info!(removed, "students removed");
        }
        Ok(removed)
    }

    pub fn clear_roster(&self) -> Result<(), StoreError> {
        self.store.save_students(&[])?;
        tracing::info!("roster cleared");
        Ok(())
    }

    /// Appends every row of `<class_name>.csv` to the roster as-is. `None` when
    /// the class file does not exist.
    pub fn import_class(&self, class_name: &str) -> Result<Option<usize>, StoreError> {
        let Some(rows) = self.store.read_class_file(class_name)? else {
            return Ok(None);
        };
        self.store.append_roster_rows(&rows)?;
        tracing::info!(class = %class_name, rows = rows.len(), "class imported");
        Ok(Some(rows.len()))
    }
}
