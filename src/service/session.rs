use axum::http::{header, HeaderMap, HeaderValue};
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine as _;
use hmac::{Hmac, Mac};
use serde::{Deserialize, Serialize};
use sha2::Sha256;
use crate::storage::ClassSelection;

type HmacSha256 = Hmac<Sha256>;

pub const SESSION_COOKIE: &str = "attendance_session";

/// State carried between requests in the signed cookie.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Session {
    pub user_id: i64,
    #[serde(default)]
    pub selection: Option<ClassSelection>,
}

impl Session {
    pub fn new(user_id: i64) -> Self {
        Self { user_id, selection: None }
    }
}

/// Signs and checks session cookies as `<payload>.<tag>`, both base64url.
#[derive(Clone)]
pub struct SessionKeys {
    secret: Vec<u8>,
}

impl SessionKeys {
    pub fn new(secret: &str) -> Self {
        Self { secret: secret.as_bytes().to_vec() }
    }

    fn mac(&self) -> Option<HmacSha256> {
        HmacSha256::new_from_slice(&self.secret).ok()
    }

    pub fn encode(&self, session: &Session) -> Option<String> {
        let payload = URL_SAFE_NO_PAD.encode(serde_json::to_vec(session).ok()?);
        let mut mac = self.mac()?;
        mac.update(payload.as_bytes());
        let tag = URL_SAFE_NO_PAD.encode(mac.finalize().into_bytes());
        Some(format!("{}.{}", payload, tag))
    }

    /// `None` for anything unsigned, tampered with, or malformed.
    pub fn decode(&self, value: &str) -> Option<Session> {
        let (payload, tag) = value.split_once('.')?;
        let tag = URL_SAFE_NO_PAD.decode(tag).ok()?;

        let mut mac = self.mac()?;
        mac.update(payload.as_bytes());
        mac.verify_slice(&tag).ok()?;

        let json = URL_SAFE_NO_PAD.decode(payload).ok()?;
        serde_json::from_slice(&json).ok()
    }

    pub fn from_headers(&self, headers: &HeaderMap) -> Option<Session> {
        cookie_value(headers, SESSION_COOKIE).and_then(|value| self.decode(&value))
    }

    pub fn set_cookie(&self, session: &Session) -> Option<HeaderValue> {
        let value = self.encode(session)?;
        HeaderValue::from_str(&format!(
            "{}={}; Path=/; HttpOnly; SameSite=Lax",
            SESSION_COOKIE, value
        ))
        .ok()
    }

    pub fn clear_cookie() -> Option<HeaderValue> {
        HeaderValue::from_str(&format!("{}=; Path=/; HttpOnly; Max-Age=0", SESSION_COOKIE)).ok()
    }
}

/// Value of the first cookie called `name` across all `Cookie` headers.
pub fn cookie_value(headers: &HeaderMap, name: &str) -> Option<String> {
    headers
        .get_all(header::COOKIE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .flat_map(|value| value.split(';'))
        .filter_map(|pair| pair.trim().split_once('='))
        .find(|(key, _)| *key == name)
        .map(|(_, value)| value.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn selection() -> ClassSelection {
        ClassSelection { section_id: 1, group_id: 2, subject_id: 3 }
    }

    #[test]
    fn signed_session_round_trips() {
        let keys = SessionKeys::new("secret");
        let session = Session { user_id: 7, selection: Some(selection()) };

        let cookie = keys.encode(&session).unwrap();
        assert_eq!(keys.decode(&cookie), Some(session));
    }

    #[test]
    fn tampered_or_foreign_cookies_are_rejected() {
        let keys = SessionKeys::new("secret");
        let cookie = keys.encode(&Session::new(1)).unwrap();

        let (_, tag) = cookie.split_once('.').unwrap();
        let forged_payload = URL_SAFE_NO_PAD.encode(br#"{"user_id":99}"#);
        assert!(keys.decode(&format!("{}.{}", forged_payload, tag)).is_none());

        assert!(SessionKeys::new("other").decode(&cookie).is_none());
        assert!(keys.decode("garbage").is_none());
    }

    #[test]
    fn finds_cookie_among_others() {
        let keys = SessionKeys::new("secret");
        let cookie = keys.encode(&Session::new(3)).unwrap();

        let mut headers = HeaderMap::new();
        headers.insert(
            header::COOKIE,
            HeaderValue::from_str(&format!("theme=dark; {}={}", SESSION_COOKIE, cookie)).unwrap(),
        );

        assert_eq!(keys.from_headers(&headers), Some(Session::new(3)));
        assert_eq!(cookie_value(&headers, "theme").as_deref(), Some("dark"));
        assert!(cookie_value(&headers, "missing").is_none());
    }

    #[test]
    fn clearing_targets_the_session_cookie() {
        let cleared = SessionKeys::clear_cookie().unwrap();
        let cleared = cleared.to_str().unwrap();
        assert!(cleared.starts_with(&format!("{}=;", SESSION_COOKIE)));
        assert!(cleared.contains("Max-Age=0"));
    }
}
