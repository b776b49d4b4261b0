use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use crate::common::config::SmsConfig;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

/// Everything an absence message needs to name.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AbsenceNotice {
    pub student_name: String,
    pub phone_number: Option<String>,
    pub subject_name: String,
    pub section_name: String,
    pub group_name: String,
    /// `YYYY-MM-DD`
    pub date: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NotificationOutcome {
    pub success: bool,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sid: Option<String>,
}

impl NotificationOutcome {
    pub fn failed(message: impl Into<String>) -> Self {
        Self {
            success: false,
            message: message.into(),
            sid: None,
        }
    }
}

/// Delivery of absence notices. Implementations report failures in the
/// outcome instead of returning errors.
#[async_trait]
pub trait AbsenceNotifier: Send + Sync {
    async fn send_absence(&self, notice: &AbsenceNotice) -> NotificationOutcome;
}

pub fn compose_message(institution: &str, notice: &AbsenceNotice) -> String {
    format!(
        "Dear {}, this is an automated message from {}.\n\n\
         You were marked absent for {} in section {}, group {} on {}.\n\n\
         Please contact the faculty for more information.",
        notice.student_name,
        institution,
        notice.subject_name,
        notice.section_name,
        notice.group_name,
        notice.date,
    )
}

#[derive(Deserialize)]
struct MessageResource {
    sid: String,
}

/// Twilio Programmable Messaging over its REST API.
pub struct TwilioNotifier {
    client: reqwest::Client,
    config: SmsConfig,
}

impl TwilioNotifier {
    pub fn new(config: SmsConfig) -> Self {
        let client = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .unwrap_or_else(|e| {
                tracing::warn!("Falling back to default HTTP client: {}", e);
                reqwest::Client::new()
            });

        Self { client, config }
    }

    fn credentials(&self) -> Option<(&str, &str, &str)> {
        let sid = self.config.account_sid.as_deref().filter(|s| !s.is_empty())?;
        let token = self.config.auth_token.as_deref().filter(|s| !s.is_empty())?;
        let from = self.config.from_number.as_deref().filter(|s| !s.is_empty())?;
        Some((sid, token, from))
    }

    async fn post_message(&self, sid: &str, token: &str, from: &str, to: &str, body: &str)
        -> Result<String, reqwest::Error>
    {
        let url = format!(
            "{}/2010-04-01/Accounts/{}/Messages.json",
            self.config.api_base.trim_end_matches('/'),
            sid
        );

        let resource: MessageResource = self
            .client
            .post(url)
            .basic_auth(sid, Some(token))
            .form(&[("To", to), ("From", from), ("Body", body)])
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;

        Ok(resource.sid)
    }
}

#[async_trait]
impl AbsenceNotifier for TwilioNotifier {
    async fn send_absence(&self, notice: &AbsenceNotice) -> NotificationOutcome {
        let Some(phone) = notice.phone_number.as_deref().filter(|p| !p.is_empty()) else {
            tracing::warn!(
                "No phone number available for {}. SMS notification not sent.",
                notice.student_name
            );
            return NotificationOutcome::failed(format!(
                "No phone number available for {}", notice.student_name
            ));
        };

        let Some((sid, token, from)) = self.credentials() else {
            tracing::error!("Twilio credentials not found in configuration or environment");
            return NotificationOutcome::failed("Twilio credentials not configured");
        };

        let body = compose_message(&self.config.institution, notice);
        match self.post_message(sid, token, from, phone, &body).await {
            Ok(message_sid) => {
                tracing::info!(
                    "SMS notification sent to {} at {}: {}",
                    notice.student_name, phone, message_sid
                );
                NotificationOutcome {
                    success: true,
                    message: format!("SMS notification sent to {}", notice.student_name),
                    sid: Some(message_sid),
                }
            }
            Err(e) => {
                tracing::error!("Twilio error while sending SMS to {}: {}", notice.student_name, e);
                NotificationOutcome::failed(format!("Error sending SMS: {}", e))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn notice(phone: Option<&str>) -> AbsenceNotice {
        AbsenceNotice {
            student_name: "Tanish".into(),
            phone_number: phone.map(String::from),
            subject_name: "Java".into(),
            section_name: "J".into(),
            group_name: "J2".into(),
            date: "2026-10-17".into(),
        }
    }

    #[test]
    fn message_names_class_and_date() {
        let text = compose_message("Lachoo College", &notice(None));
        assert!(text.starts_with("Dear Tanish, this is an automated message from Lachoo College."));
        assert!(text.contains("You were marked absent for Java in section J, group J2 on 2026-10-17."));
        assert!(text.ends_with("Please contact the faculty for more information."));
    }

    #[tokio::test]
    async fn missing_phone_fails_without_network() {
        let notifier = TwilioNotifier::new(SmsConfig::default());
        let outcome = notifier.send_absence(&notice(None)).await;
        assert!(!outcome.success);
        assert_eq!(outcome.message, "No phone number available for Tanish");
    }

    #[tokio::test]
    async fn missing_credentials_fail_without_network() {
        let notifier = TwilioNotifier::new(SmsConfig::default());
        let outcome = notifier.send_absence(&notice(Some("+911234567890"))).await;
        assert!(!outcome.success);
        assert_eq!(outcome.message, "Twilio credentials not configured");
        assert!(outcome.sid.is_none());
    }
}
