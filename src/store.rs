use serde::{Serialize, Serializer};
use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};

pub const ROSTER_FILE: &str = "students.csv";
pub const ATTENDANCE_FILE: &str = "attendance.csv";

pub const ROSTER_HEADER: [&str; 3] = ["Name", "Class", "RollNo"];
pub const ATTENDANCE_HEADER: [&str; 5] = ["Date", "Name", "Class", "RollNo", "Status"];

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("failed to access {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("{} line {line} is not readable as a table: {reason}", .path.display())]
    Malformed {
        path: PathBuf,
        line: u64,
        reason: String,
    },
}

fn io_err(path: &Path) -> impl FnOnce(std::io::Error) -> StoreError + '_ {
    move |source| StoreError::Io {
        path: path.to_path_buf(),
        source,
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Student {
    pub name: String,
    pub class_id: String,
    pub roll_no: String,
}

/// Attendance status as stored in the `Status` column.
///
/// `NotMarked` only ever appears in day views. Strings outside the known set
/// are kept verbatim so a rewrite never loses hand-edited rows.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Status {
    Present,
    Absent,
    Unclear,
    NotMarked,
    Other(String),
}

impl Status {
    pub fn as_str(&self) -> &str {
        match self {
            Status::Present => "Present",
            Status::Absent => "Absent",
            Status::Unclear => "Unclear",
            Status::NotMarked => "Not Marked",
            Status::Other(s) => s,
        }
    }

    pub fn from_stored(raw: &str) -> Status {
        match raw {
            "Present" => Status::Present,
            "Absent" => Status::Absent,
            "Unclear" => Status::Unclear,
            "Not Marked" => Status::NotMarked,
            other => Status::Other(other.to_string()),
        }
    }

    /// Parses a user-supplied status word. Only markable statuses are accepted.
    pub fn parse_markable(raw: &str) -> Option<Status> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "present" => Some(Status::Present),
            "absent" => Some(Status::Absent),
            "unclear" => Some(Status::Unclear),
            _ => None,
        }
    }
}

impl Serialize for Status {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AttendanceEntry {
    pub date: String,
    pub name: String,
    pub class_id: String,
    pub roll_no: String,
    pub status: Status,
}

impl AttendanceEntry {
    pub fn parsed_date(&self) -> Option<chrono::NaiveDate> {
        chrono::NaiveDate::parse_from_str(self.date.trim(), "%Y-%m-%d").ok()
    }
}

/// Renders rows as comma separated text, quoting fields only where needed.
/// Rows may differ in width.
pub(crate) fn csv_text<R, F>(rows: R) -> Result<String, csv::Error>
where
    R: IntoIterator,
    R::Item: IntoIterator<Item = F>,
    F: AsRef<[u8]>,
{
    let mut writer = csv::WriterBuilder::new()
        .flexible(true)
        .from_writer(Vec::new());
    for row in rows {
        writer.write_record(row)?;
    }
    let bytes = writer
        .into_inner()
        .map_err(|e| csv::Error::from(e.into_error()))?;
    Ok(String::from_utf8_lossy(&bytes).into_owned())
}

fn malformed(path: &Path, e: csv::Error) -> StoreError {
    StoreError::Malformed {
        path: path.to_path_buf(),
        line: e.position().map_or(0, |p| p.line()),
        reason: e.to_string(),
    }
}

/// Non-blank records of a comma separated file, header included. Quoted
/// fields may span lines.
pub(crate) fn read_records(path: &Path) -> Result<Vec<Vec<String>>, StoreError> {
    let bytes = std::fs::read(path).map_err(io_err(path))?;
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .from_reader(bytes.as_slice());
    let mut out = Vec::new();
    for record in reader.records() {
        let record = record.map_err(|e| malformed(path, e))?;
        if record.iter().all(|f| f.trim().is_empty()) {
            continue;
        }
        out.push(record.iter().map(str::to_string).collect());
    }
    Ok(out)
}

/// Resolves named columns against a header row. Columns the header does not
/// name fall back to their conventional position.
struct ColumnMap {
    idx: Vec<usize>,
}

impl ColumnMap {
    fn resolve(header: &[String], names: &[&str]) -> ColumnMap {
        let idx = names
            .iter()
            .enumerate()
            .map(|(pos, name)| {
                header
                    .iter()
                    .position(|h| h.trim().eq_ignore_ascii_case(name))
                    .unwrap_or(pos)
            })
            .collect();
        ColumnMap { idx }
    }

    fn get(&self, row: &[String], col: usize) -> String {
        self.idx
            .get(col)
            .and_then(|i| row.get(*i))
            .cloned()
            .unwrap_or_default()
    }
}

/// The two flat tables of a workspace. Every mutation is a full read followed
/// by a full rewrite; there is no locking, callers are expected to be the
/// single writer.
#[derive(Debug)]
pub struct RecordStore {
    workspace: PathBuf,
    roster_path: PathBuf,
    attendance_path: PathBuf,
}

impl RecordStore {
    /// Opens a workspace directory, creating it and any missing table with
    /// its header row.
    pub fn open(workspace: &Path) -> Result<RecordStore, StoreError> {
        std::fs::create_dir_all(workspace).map_err(io_err(workspace))?;
        let store = RecordStore {
            workspace: workspace.to_path_buf(),
            roster_path: workspace.join(ROSTER_FILE),
            attendance_path: workspace.join(ATTENDANCE_FILE),
        };
        if !store.roster_path.is_file() {
            write_table(&store.roster_path, &ROSTER_HEADER, std::iter::empty::<Vec<&str>>())?;
            tracing::info!(path = %store.roster_path.display(), "created roster table");
        }
        if !store.attendance_path.is_file() {
            write_table(
                &store.attendance_path,
                &ATTENDANCE_HEADER,
                std::iter::empty::<Vec<&str>>(),
            )?;
            tracing::info!(path = %store.attendance_path.display(), "created attendance table");
        }
        Ok(store)
    }

    pub fn workspace(&self) -> &Path {
        &self.workspace
    }

    pub fn load_students(&self) -> Result<Vec<Student>, StoreError> {
        let mut records = read_records(&self.roster_path)?.into_iter();
        let Some(header) = records.next() else {
            return Ok(Vec::new());
        };
        let cols = ColumnMap::resolve(&header, &ROSTER_HEADER);
        Ok(records
            .map(|row| Student {
                name: cols.get(&row, 0),
                class_id: cols.get(&row, 1),
                roll_no: cols.get(&row, 2),
            })
            .collect())
    }

    pub fn save_students(&self, students: &[Student]) -> Result<(), StoreError> {
        write_table(
            &self.roster_path,
            &ROSTER_HEADER,
            students
                .iter()
                .map(|s| vec![s.name.as_str(), s.class_id.as_str(), s.roll_no.as_str()]),
        )
    }

    pub fn append_student(&self, student: &Student) -> Result<(), StoreError> {
        self.append_roster_rows(&[vec![
            student.name.clone(),
            student.class_id.clone(),
            student.roll_no.clone(),
        ]])
    }

    /// Appends raw rows to the roster without rewriting it. Rows are written
    /// as given; no header or width check is made.
    pub fn append_roster_rows(&self, rows: &[Vec<String>]) -> Result<(), StoreError> {
        let path = &self.roster_path;
        let needs_newline = match std::fs::read(path) {
            Ok(bytes) => !bytes.is_empty() && !bytes.ends_with(b"\n"),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => false,
            Err(e) => return Err(io_err(path)(e)),
        };
        let mut text = String::new();
        if needs_newline {
            text.push('\n');
        }
        text.push_str(&csv_text(rows).map_err(|e| io_err(path)(e.into()))?);
        let mut f = OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .map_err(io_err(path))?;
        f.write_all(text.as_bytes()).map_err(io_err(path))
    }

    pub fn load_attendance(&self) -> Result<Vec<AttendanceEntry>, StoreError> {
        let mut records = read_records(&self.attendance_path)?.into_iter();
        let Some(header) = records.next() else {
            return Ok(Vec::new());
        };
        let cols = ColumnMap::resolve(&header, &ATTENDANCE_HEADER);
        Ok(records
            .map(|row| AttendanceEntry {
                date: cols.get(&row, 0),
                name: cols.get(&row, 1),
                class_id: cols.get(&row, 2),
                roll_no: cols.get(&row, 3),
                status: Status::from_stored(&cols.get(&row, 4)),
            })
            .collect())
    }

    pub fn save_attendance(&self, entries: &[AttendanceEntry]) -> Result<(), StoreError> {
        write_table(
            &self.attendance_path,
            &ATTENDANCE_HEADER,
            entries.iter().map(|e| {
                vec![
                    e.date.as_str(),
                    e.name.as_str(),
                    e.class_id.as_str(),
                    e.roll_no.as_str(),
                    e.status.as_str(),
                ]
            }),
        )
    }

    /// Reads `<class_name>.csv` from the workspace. `None` when the file does
    /// not exist.
    pub fn read_class_file(&self, class_name: &str) -> Result<Option<Vec<Vec<String>>>, StoreError> {
        let path = self.class_file_path(class_name);
        if !path.is_file() {
            return Ok(None);
        }
        read_records(&path).map(Some)
    }

    pub fn class_file_path(&self, class_name: &str) -> PathBuf {
        self.workspace.join(format!("{class_name}.csv"))
    }
}

/// Writes header and rows to a sibling temp file, then renames it over `path`.
fn write_table<R, F>(path: &Path, header: &[&str], rows: R) -> Result<(), StoreError>
where
    R: IntoIterator<Item = Vec<F>>,
    F: AsRef<[u8]>,
{
    let mut tmp_name = path.as_os_str().to_owned();
    tmp_name.push(".writing");
    let tmp = PathBuf::from(tmp_name);
    let csv_err = |e: csv::Error| io_err(&tmp)(e.into());

    let mut writer = csv::WriterBuilder::new().from_path(&tmp).map_err(csv_err)?;
    writer.write_record(header).map_err(csv_err)?;
    for row in rows {
        writer.write_record(&row).map_err(csv_err)?;
    }
    writer.flush().map_err(io_err(&tmp))?;
    drop(writer);
    std::fs::rename(&tmp, path).map_err(io_err(path))
}
