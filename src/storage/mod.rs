pub mod attendance_store;
pub mod credentials;

pub use attendance_store::{
    AttendanceRecord, AttendanceStore, ClassSelection, DailyRoll, Group, NewAttendance, Section,
    Status, Student, Subject,
};
