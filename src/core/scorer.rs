use rand::{RngCore, SeedableRng};
use rand_chacha::ChaCha8Rng;
use serde::Serialize;
use crate::core::fingerprint::{name_seed, seed_from_hash, FingerprintStore};

/// Scores must be strictly above this for an acceptance.
pub const MATCH_THRESHOLD: u8 = 70;
pub const MAX_SCORE: u8 = 100;

/// Source of the per-identity score for a combined seed.
pub trait ScoreDraw {
    fn draw(&self, seed: u64) -> u8;
}

/// First output of ChaCha8 seeded with `seed`, scaled onto `0..=100`.
///
/// The stream and the scaling are fixed so a sample scores the same across
/// builds and `rand` upgrades.
#[derive(Debug, Clone, Copy, Default)]
pub struct SeededDraw;

impl ScoreDraw for SeededDraw {
    fn draw(&self, seed: u64) -> u8 {
        let mut rng = ChaCha8Rng::seed_from_u64(seed);
        ((rng.next_u32() as u64 * (MAX_SCORE as u64 + 1)) >> 32) as u8
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct IdentityScore {
    pub name: String,
    pub score: u8,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Decision {
    pub accepted: bool,
    pub claimed: String,
    /// Highest scorer, `None` only for an empty roster.
    pub best: Option<IdentityScore>,
    pub scores: Vec<IdentityScore>,
    pub message: String,
}

#[derive(Debug, Clone, Default)]
pub struct MatchScorer<D = SeededDraw> {
    draw: D,
}

impl MatchScorer<SeededDraw> {
    pub fn new() -> Self {
        Self { draw: SeededDraw }
    }
}

impl<D: ScoreDraw> MatchScorer<D> {
    pub fn with_draw(draw: D) -> Self {
        Self { draw }
    }

    /// One score per roster identity, in roster order.
    pub fn score(&self, sample_hash: &str, store: &FingerprintStore) -> Vec<IdentityScore> {
        let sample_seed = seed_from_hash(sample_hash);

        store
            .names()
            .map(|name| {
                let combined = sample_seed ^ name_seed(name);
                IdentityScore {
                    name: name.to_string(),
                    score: self.draw.draw(combined as u64),
                }
            })
            .collect()
    }

    pub fn decide(&self, sample_hash: &str, claimed: &str, store: &FingerprintStore) -> Decision {
        if !store.contains(claimed) {
            tracing::error!("No reference images found for {}", claimed);
            return Decision {
                accepted: false,
                claimed: claimed.to_string(),
                best: None,
                scores: Vec::new(),
                message: format!("No reference images found for {}", claimed),
            };
        }

        let scores = self.score(sample_hash, store);
        let best = best_of(&scores).cloned();

        let accepted = best
            .as_ref()
            .map(|b| b.name == claimed && b.score > MATCH_THRESHOLD)
            .unwrap_or(false);

        tracing::info!(
            "Face comparison for {}: {}",
            claimed,
            if accepted { "Match" } else { "No match" }
        );
        tracing::debug!("Identity scores: {:?}, best: {:?}", scores, best);

        let message = if accepted {
            format!("Face recognized for {}", claimed)
        } else {
            format!("Face does not match {}. Please try again.", claimed)
        };

        Decision {
            accepted,
            claimed: claimed.to_string(),
            best,
            scores,
            message,
        }
    }
}

/// First maximal entry wins ties.
fn best_of(scores: &[IdentityScore]) -> Option<&IdentityScore> {
    scores.iter().fold(None, |best, candidate| match best {
        Some(b) if b.score >= candidate.score => Some(b),
        _ => Some(candidate),
    })
}
