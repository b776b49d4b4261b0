use base64::prelude::{Engine as _, BASE64_STANDARD};
use serde::Serialize;
use std::fs;
use std::path::{Path, PathBuf};
use crate::common::{sibling_faces_dir, AttendanceError, Result};
use crate::core::fingerprint::{content_hash, FingerprintStore};
use crate::core::scorer::{Decision, MatchScorer, ScoreDraw, SeededDraw};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Verdict {
    pub accepted: bool,
    pub message: String,
    /// Where the accepted copy was written.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub saved_path: Option<PathBuf>,
}

impl Verdict {
    fn rejected(message: impl Into<String>) -> Self {
        Self {
            accepted: false,
            message: message.into(),
            saved_path: None,
        }
    }
}

/// Runs a submitted sample through the fingerprint store and scorer, and
/// keeps a copy of every accepted image.
#[derive(Debug, Clone)]
pub struct Verifier<D = SeededDraw> {
    roster: Vec<String>,
    reference_dir: PathBuf,
    recognized_dir: PathBuf,
    scorer: MatchScorer<D>,
}

impl Verifier<SeededDraw> {
    pub fn new(roster: Vec<String>, reference_dir: PathBuf, recognized_dir: PathBuf) -> Self {
        Self::with_scorer(roster, reference_dir, recognized_dir, MatchScorer::new())
    }

    /// Reference images are looked up in the `faces` sibling of `recognized_dir`.
    pub fn for_recognized_dir(roster: Vec<String>, recognized_dir: PathBuf) -> Self {
        let reference_dir = sibling_faces_dir(&recognized_dir);
        Self::new(roster, reference_dir, recognized_dir)
    }
}

impl<D: ScoreDraw> Verifier<D> {
    pub fn with_scorer(
        roster: Vec<String>,
        reference_dir: PathBuf,
        recognized_dir: PathBuf,
        scorer: MatchScorer<D>,
    ) -> Self {
        Self {
            roster,
            reference_dir,
            recognized_dir,
            scorer,
        }
    }

    pub fn reference_dir(&self) -> &Path {
        &self.reference_dir
    }

    /// Fresh fingerprint load; nothing is cached between calls.
    pub fn load_store(&self) -> FingerprintStore {
        FingerprintStore::load(&self.roster, &self.reference_dir)
    }

    /// Never fails: every error becomes a rejecting verdict.
    pub fn verify(&self, image_data: &str, claimed: &str) -> Verdict {
        match self.try_verify(image_data, claimed) {
            Ok(verdict) => verdict,
            Err(AttendanceError::InvalidInput(message)) => {
                tracing::warn!("Rejected sample for {}: {}", claimed, message);
                Verdict::rejected(message)
            }
            Err(e) => {
                tracing::error!("Error in face recognition for {}: {}", claimed, e);
                Verdict::rejected(format!("Error processing image: {}", e))
            }
        }
    }

    pub fn try_verify(&self, image_data: &str, claimed: &str) -> Result<Verdict> {
        let payload = strip_data_url(image_data);
        if payload.is_empty() {
            return Err(AttendanceError::InvalidInput("No image data provided".into()));
        }

        let image_bytes = decode_payload(payload)?;
        let decision = self.decide_bytes(&image_bytes, claimed);
        if !decision.accepted {
            return Ok(Verdict::rejected(decision.message));
        }

        let saved = self.save_accepted(claimed, &image_bytes)?;
        tracing::info!("Saved recognized face for {} to {:?}", claimed, saved);

        Ok(Verdict {
            accepted: true,
            message: decision.message,
            saved_path: Some(saved),
        })
    }

    pub fn decide_bytes(&self, image_bytes: &[u8], claimed: &str) -> Decision {
        let store = self.load_store();
        self.scorer.decide(&content_hash(image_bytes), claimed, &store)
    }

    /// Same-second writes for one identity land on the same file name.
    fn save_accepted(&self, claimed: &str, image_bytes: &[u8]) -> Result<PathBuf> {
        let identity_dir = self.recognized_dir.join(claimed);
        fs::create_dir_all(&identity_dir)?;

        let timestamp = chrono::Local::now().format("%Y%m%d%H%M%S");
        let path = identity_dir.join(format!("{}_{}.jpg", claimed, timestamp));
        fs::write(&path, image_bytes)?;
        Ok(path)
    }
}

/// Drops a `data:...;base64,` header if present.
pub fn strip_data_url(image_data: &str) -> &str {
    let trimmed = image_data.trim();
    match trimmed.split_once(',') {
        Some((_, payload)) => payload.trim(),
        None => trimmed,
    }
}

/// Line breaks and other ASCII whitespace inside the payload are ignored.
pub fn decode_payload(payload: &str) -> Result<Vec<u8>> {
    let compact: String = payload.chars().filter(|c| !c.is_ascii_whitespace()).collect();
    let bytes = BASE64_STANDARD.decode(compact)?;
    if bytes.is_empty() {
        return Err(AttendanceError::InvalidInput("No image data provided".into()));
    }
    Ok(bytes)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strips_data_url_header() {
        assert_eq!(strip_data_url("data:image/jpeg;base64,QUJD"), "QUJD");
        assert_eq!(strip_data_url("QUJD"), "QUJD");
        assert_eq!(strip_data_url("  data:image/png;base64,  "), "");
    }

    #[test]
    fn decode_rejects_bad_base64() {
        assert!(matches!(decode_payload("not base64!!"), Err(AttendanceError::DecodeFailure(_))));
        assert_eq!(decode_payload("QUJD").unwrap(), b"ABC");
    }

    #[test]
    fn decode_accepts_line_wrapped_base64() {
        assert_eq!(decode_payload("QUJD\r\nREVG\n").unwrap(), b"ABCDEF");
        assert_eq!(decode_payload(" QU JD ").unwrap(), b"ABC");
    }
}
