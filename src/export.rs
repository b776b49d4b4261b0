use std::fs;
use std::path::Path;
use crate::common::Result;
use crate::storage::Student;

pub const CSV_HEADER: [&str; 8] = [
    "Date",
    "Section",
    "Group",
    "Subject",
    "Student Name",
    "Status",
    "Phone Number",
    "Notification Sent",
];

/// Names of the class a summary is written for.
#[derive(Debug, Clone)]
pub struct ClassNames<'a> {
    pub section: &'a str,
    pub group: &'a str,
    pub subject: &'a str,
}

/// Writes one day's attendance for a class into `csv_dir` and returns the
/// file name (not the full path).
pub fn export_attendance(
    csv_dir: &Path,
    class: &ClassNames<'_>,
    present: &[Student],
    absent: &[Student],
) -> Result<String> {
    fs::create_dir_all(csv_dir)?;

    let now = chrono::Local::now();
    let filename = format!(
        "attendance_{}_{}_{}_{}.csv",
        class.section,
        class.group,
        class.subject,
        now.format("%Y%m%d_%H%M%S")
    );
    let date = now.format("%Y-%m-%d").to_string();

    let mut writer = csv::Writer::from_path(csv_dir.join(&filename))?;
    writer.write_record(CSV_HEADER)?;

    for student in present {
        let phone = student.phone_number.as_deref().unwrap_or("N/A");
        writer.write_record([
            date.as_str(), class.section, class.group, class.subject,
            student.name.as_str(), "Present", phone,
            // Present students are never notified
            "N/A",
        ])?;
    }

    for student in absent {
        let phone = student.phone_number.as_deref().unwrap_or("N/A");
        let notified = if student.phone_number.is_some() { "Yes" } else { "No" };
        writer.write_record([
            date.as_str(), class.section, class.group, class.subject,
            student.name.as_str(), "Absent", phone, notified,
        ])?;
    }

    writer.flush()?;
    tracing::info!(
        "Exported attendance to {} ({} present, {} absent)",
        filename, present.len(), absent.len()
    );

    Ok(filename)
}
