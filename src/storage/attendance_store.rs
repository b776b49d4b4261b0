use chrono::{Local, NaiveDate};
use rusqlite::{params, Connection, OptionalExtension, Row};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;
use std::str::FromStr;
use crate::common::{AttendanceError, Result};
use crate::storage::credentials::{hash_password, verify_password};

pub const ADMIN_USERNAME: &str = "Lachoo";
const ADMIN_PASSWORD: &str = "Lachoo";
const SEED_SECTIONS: [&str; 3] = ["J", "K", "L"];
const GROUPS_PER_SECTION: usize = 3;
const SEED_SUBJECTS: [&str; 3] = ["Python", "Java", "Software Engineering"];
const SEED_PHONES: [(&str, &str); 5] = [
    ("Tanish", "+919876543201"),
    ("Yuvraj", "+919876543202"),
    ("Vishal", "+919876543203"),
    ("Suraj", "+919876543204"),
    ("Sanyam", "+919876543205"),
];

const DATE_FORMAT: &str = "%Y-%m-%d";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Status {
    Present,
    Absent,
}

impl Status {
    pub fn as_str(&self) -> &'static str {
        match self {
            Status::Present => "present",
            Status::Absent => "absent",
        }
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Status {
    type Err = AttendanceError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "present" => Ok(Status::Present),
            "absent" => Ok(Status::Absent),
            other => Err(AttendanceError::InvalidInput(format!("Invalid status: {}", other))),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Section {
    pub id: i64,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Group {
    pub id: i64,
    pub name: String,
    pub section_id: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Subject {
    pub id: i64,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Student {
    pub id: i64,
    pub name: String,
    pub phone_number: Option<String>,
    pub email: Option<String>,
}

/// Which class an attendance mark belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClassSelection {
    pub section_id: i64,
    pub group_id: i64,
    pub subject_id: i64,
}

#[derive(Debug, Clone)]
pub struct NewAttendance {
    pub student_id: i64,
    pub class: ClassSelection,
    pub status: Status,
    pub date: NaiveDate,
    pub notification_sent: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AttendanceRecord {
    pub id: i64,
    pub student_id: i64,
    pub section_id: i64,
    pub group_id: i64,
    pub subject_id: i64,
    pub status: Status,
    pub date: NaiveDate,
    pub timestamp: String,
    pub notification_sent: bool,
}

/// Present and absent students for one class on one day, in marking order.
#[derive(Debug, Clone, Default, Serialize)]
pub struct DailyRoll {
    pub present: Vec<Student>,
    pub absent: Vec<Student>,
}

pub struct AttendanceStore {
    conn: Connection,
}

impl AttendanceStore {
    pub fn open(path: &Path, reset: bool) -> Result<Self> {
        let conn = Connection::open(path)?;
        let store = Self { conn };
        if reset {
            tracing::warn!("Dropping all attendance tables in {:?}", path);
            store.drop_schema()?;
        }
        store.init_schema()?;
        Ok(store)
    }

    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        let store = Self { conn };
        store.init_schema()?;
        Ok(store)
    }

    fn init_schema(&self) -> Result<()> {
        self.conn.execute_batch(
            "
            PRAGMA foreign_keys = ON;

            CREATE TABLE IF NOT EXISTS users (
                id INTEGER PRIMARY KEY,
                username TEXT NOT NULL UNIQUE,
                password_hash TEXT NOT NULL
            );

            CREATE TABLE IF NOT EXISTS sections (
                id INTEGER PRIMARY KEY,
                name TEXT NOT NULL UNIQUE
            );

            CREATE TABLE IF NOT EXISTS class_groups (
                id INTEGER PRIMARY KEY,
                name TEXT NOT NULL UNIQUE,
                section_id INTEGER NOT NULL REFERENCES sections(id)
            );

            CREATE TABLE IF NOT EXISTS subjects (
                id INTEGER PRIMARY KEY,
                name TEXT NOT NULL UNIQUE
            );

            CREATE TABLE IF NOT EXISTS students (
                id INTEGER PRIMARY KEY,
                name TEXT NOT NULL,
                phone_number TEXT,
                email TEXT
            );

            CREATE TABLE IF NOT EXISTS attendance (
                id INTEGER PRIMARY KEY,
                student_id INTEGER NOT NULL REFERENCES students(id),
                section_id INTEGER NOT NULL REFERENCES sections(id),
                group_id INTEGER NOT NULL REFERENCES class_groups(id),
                subject_id INTEGER NOT NULL REFERENCES subjects(id),
                status TEXT NOT NULL,
                date TEXT NOT NULL,
                timestamp TEXT NOT NULL,
                notification_sent INTEGER NOT NULL DEFAULT 0
            );

            CREATE INDEX IF NOT EXISTS idx_attendance_class_date
                ON attendance(section_id, group_id, subject_id, date);
            ",
        )?;
        Ok(())
    }

    fn drop_schema(&self) -> Result<()> {
        self.conn.execute_batch(
            "
            DROP TABLE IF EXISTS attendance;
            DROP TABLE IF EXISTS students;
            DROP TABLE IF EXISTS subjects;
            DROP TABLE IF EXISTS class_groups;
            DROP TABLE IF EXISTS sections;
            DROP TABLE IF EXISTS users;
            ",
        )?;
        Ok(())
    }

    /// Populates the admin account, classes and the roster's students.
    /// Does nothing once the admin exists.
    pub fn seed_defaults(&mut self, roster: &[String]) -> Result<bool> {
        if self.user_id(ADMIN_USERNAME)?.is_some() {
            return Ok(false);
        }

        let password_hash = hash_password(ADMIN_PASSWORD)?;
        let tx = self.conn.transaction()?;

        tx.execute(
            "INSERT INTO users (username, password_hash) VALUES (?1, ?2)",
            params![ADMIN_USERNAME, password_hash],
        )?;

        for section in SEED_SECTIONS {
            tx.execute("INSERT INTO sections (name) VALUES (?1)", params![section])?;
            let section_id = tx.last_insert_rowid();
            for i in 1..=GROUPS_PER_SECTION {
                tx.execute(
                    "INSERT INTO class_groups (name, section_id) VALUES (?1, ?2)",
                    params![format!("{}{}", section, i), section_id],
                )?;
            }
        }

        for subject in SEED_SUBJECTS {
            tx.execute("INSERT INTO subjects (name) VALUES (?1)", params![subject])?;
        }

        for name in roster {
            let phone = SEED_PHONES
                .iter()
                .find(|(seed_name, _)| *seed_name == name.as_str())
                .map(|(_, phone)| *phone);
            tx.execute(
                "INSERT INTO students (name, phone_number) VALUES (?1, ?2)",
                params![name, phone],
            )?;
        }

        tx.commit()?;
        tracing::info!("Seeded attendance database with {} students", roster.len());
        Ok(true)
    }

    fn user_id(&self, username: &str) -> Result<Option<i64>> {
        Ok(self
            .conn
            .query_row("SELECT id FROM users WHERE username = ?1", params![username], |row| row.get(0))
            .optional()?)
    }

    /// User id when the credentials match.
    pub fn verify_login(&self, username: &str, password: &str) -> Result<Option<i64>> {
        let user: Option<(i64, String)> = self
            .conn
            .query_row(
                "SELECT id, password_hash FROM users WHERE username = ?1",
                params![username],
                |row| Ok((row.get(0)?, row.get(1)?)),
            )
            .optional()?;

        Ok(user.and_then(|(id, hash)| verify_password(&hash, password).then_some(id)))
    }

    pub fn sections(&self) -> Result<Vec<Section>> {
        let mut stmt = self.conn.prepare("SELECT id, name FROM sections ORDER BY id")?;
        let rows = stmt.query_map([], |row| Ok(Section { id: row.get(0)?, name: row.get(1)? }))?;
        Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
    }

    pub fn section(&self, id: i64) -> Result<Option<Section>> {
        Ok(self
            .conn
            .query_row("SELECT id, name FROM sections WHERE id = ?1", params![id], |row| {
                Ok(Section { id: row.get(0)?, name: row.get(1)? })
            })
            .optional()?)
    }

    pub fn groups_for_section(&self, section_id: i64) -> Result<Vec<Group>> {
        let mut stmt = self.conn.prepare(
            "SELECT id, name, section_id FROM class_groups WHERE section_id = ?1 ORDER BY id",
        )?;
        let rows = stmt.query_map(params![section_id], group_from_row)?;
        Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
    }

    pub fn group(&self, id: i64) -> Result<Option<Group>> {
        Ok(self
            .conn
            .query_row(
                "SELECT id, name, section_id FROM class_groups WHERE id = ?1",
                params![id],
                group_from_row,
            )
            .optional()?)
    }

    pub fn subjects(&self) -> Result<Vec<Subject>> {
        let mut stmt = self.conn.prepare("SELECT id, name FROM subjects ORDER BY id")?;
        let rows = stmt.query_map([], |row| Ok(Subject { id: row.get(0)?, name: row.get(1)? }))?;
        Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
    }

    pub fn subject(&self, id: i64) -> Result<Option<Subject>> {
        Ok(self
            .conn
            .query_row("SELECT id, name FROM subjects WHERE id = ?1", params![id], |row| {
                Ok(Subject { id: row.get(0)?, name: row.get(1)? })
            })
            .optional()?)
    }

    pub fn students(&self) -> Result<Vec<Student>> {
        let mut stmt = self
            .conn
            .prepare("SELECT id, name, phone_number, email FROM students ORDER BY id")?;
        let rows = stmt.query_map([], student_from_row)?;
        Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
    }

    pub fn student(&self, id: i64) -> Result<Option<Student>> {
        Ok(self
            .conn
            .query_row(
                "SELECT id, name, phone_number, email FROM students WHERE id = ?1",
                params![id],
                student_from_row,
            )
            .optional()?)
    }

    pub fn record_attendance(&self, entry: &NewAttendance) -> Result<i64> {
        self.conn.execute(
            "INSERT INTO attendance
                (student_id, section_id, group_id, subject_id, status, date, timestamp, notification_sent)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
            params![
                entry.student_id,
                entry.class.section_id,
                entry.class.group_id,
                entry.class.subject_id,
                entry.status.as_str(),
                entry.date.format(DATE_FORMAT).to_string(),
                Local::now().to_rfc3339(),
                entry.notification_sent,
            ],
        )?;
        Ok(self.conn.last_insert_rowid())
    }

    pub fn attendance_for(&self, class: ClassSelection, date: NaiveDate) -> Result<Vec<AttendanceRecord>> {
        let mut stmt = self.conn.prepare(
            "SELECT id, student_id, section_id, group_id, subject_id, status, date, timestamp, notification_sent
             FROM attendance
             WHERE section_id = ?1 AND group_id = ?2 AND subject_id = ?3 AND date = ?4
             ORDER BY id",
        )?;
        let rows = stmt.query_map(
            params![
                class.section_id,
                class.group_id,
                class.subject_id,
                date.format(DATE_FORMAT).to_string()
            ],
            |row| {
                Ok(RawAttendance {
                    id: row.get(0)?,
                    student_id: row.get(1)?,
                    section_id: row.get(2)?,
                    group_id: row.get(3)?,
                    subject_id: row.get(4)?,
                    status: row.get(5)?,
                    date: row.get(6)?,
                    timestamp: row.get(7)?,
                    notification_sent: row.get(8)?,
                })
            },
        )?;

        let records = rows
            .map(|raw| AttendanceRecord::try_from(raw?))
            .collect::<Result<Vec<_>>>()?;
        Ok(records)
    }

    /// Splits the day's marks into present and absent students.
    pub fn daily_roll(&self, class: ClassSelection, date: NaiveDate) -> Result<DailyRoll> {
        let mut roll = DailyRoll::default();

        for record in self.attendance_for(class, date)? {
            let student = self
                .student(record.student_id)?
                .ok_or_else(|| AttendanceError::NotFound(format!("student {}", record.student_id)))?;
            match record.status {
                Status::Present => roll.present.push(student),
                Status::Absent => roll.absent.push(student),
            }
        }

        Ok(roll)
    }
}

/// Row as stored, before status and date are parsed.
struct RawAttendance {
    id: i64,
    student_id: i64,
    section_id: i64,
    group_id: i64,
    subject_id: i64,
    status: String,
    date: String,
    timestamp: String,
    notification_sent: bool,
}

impl TryFrom<RawAttendance> for AttendanceRecord {
    type Error = AttendanceError;

    fn try_from(raw: RawAttendance) -> Result<Self> {
        let date = NaiveDate::parse_from_str(&raw.date, DATE_FORMAT).map_err(|e| {
            AttendanceError::DecodeFailure(format!("Bad attendance date {}: {}", raw.date, e))
        })?;

        Ok(AttendanceRecord {
            id: raw.id,
            student_id: raw.student_id,
            section_id: raw.section_id,
            group_id: raw.group_id,
            subject_id: raw.subject_id,
            status: raw.status.parse()?,
            date,
            timestamp: raw.timestamp,
            notification_sent: raw.notification_sent,
        })
    }
}

fn group_from_row(row: &Row<'_>) -> rusqlite::Result<Group> {
    Ok(Group {
        id: row.get(0)?,
        name: row.get(1)?,
        section_id: row.get(2)?,
    })
}

fn student_from_row(row: &Row<'_>) -> rusqlite::Result<Student> {
    Ok(Student {
        id: row.get(0)?,
        name: row.get(1)?,
        phone_number: row.get(2)?,
        email: row.get(3)?,
    })
}
