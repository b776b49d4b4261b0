pub mod sms;

pub use sms::{AbsenceNotice, AbsenceNotifier, NotificationOutcome, TwilioNotifier};
