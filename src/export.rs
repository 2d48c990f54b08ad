use crate::ledger::MonthReport;
use crate::store::{csv_text, ATTENDANCE_HEADER};

pub fn default_file_name(month: u32, year: i32) -> String {
    format!("attendance_{year}_{month:02}.csv")
}

fn owned(fields: &[&str]) -> Vec<String> {
    fields.iter().map(|f| f.to_string()).collect()
}

/// Summary block, a blank line, then the raw rows for the month.
pub fn render_month_csv(report: &MonthReport) -> Result<String, csv::Error> {
    let title = format!("{} {}", report.month_name, report.year);
    let mut summary = vec![
        vec!["Summary for".to_string(), title],
        owned(&["Name", "Class", "Present", "Absent", "Unclear"]),
    ];
    summary.extend(report.summary.rows().iter().map(|r| {
        vec![
            r.name.clone(),
            r.class_id.clone(),
            r.present.to_string(),
            r.absent.to_string(),
            r.unclear.to_string(),
        ]
    }));

    let mut details = vec![owned(&["Detailed Records"]), owned(&ATTENDANCE_HEADER)];
    details.extend(report.details.iter().map(|d| {
        vec![
            d.date.clone(),
            d.name.clone(),
            d.class_id.clone(),
            d.roll_no.clone(),
            d.status.as_str().to_string(),
        ]
    }));

    Ok(format!("{}\n{}", csv_text(summary)?, csv_text(details)?))
}
