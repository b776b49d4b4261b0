pub mod fingerprint;
pub mod scorer;
pub mod verifier;

pub use fingerprint::{content_hash, FingerprintStore, IdentityPrints, Fingerprint};
pub use scorer::{Decision, IdentityScore, MatchScorer, ScoreDraw, SeededDraw, MATCH_THRESHOLD};
pub use verifier::{Verdict, Verifier};
