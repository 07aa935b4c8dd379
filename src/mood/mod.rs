//! Mood derivation from price changes
//!
//! The derivation is short-circuited in a fixed order, so `happy` (any gain) always
//! wins over `energetic` (any gain above 1) even when both hold.
//!
//! `Motivated` has a category pool but no branch of `derive_mood` produces it, and
//! `Energetic` is shadowed the same way: any change above 1 is already a gain.

use crate::models::PriceObservation;
use rand::seq::SliceRandom;
use rand::Rng;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Mood {
    Happy,
    Sad,
    Energetic,
    Relaxed,
    Nostalgic,
    Motivated,
}

impl Mood {
    pub const ALL: [Mood; 6] = [
        Mood::Happy,
        Mood::Sad,
        Mood::Energetic,
        Mood::Relaxed,
        Mood::Nostalgic,
        Mood::Motivated,
    ];

    /// Fixed category pool for this mood
    pub fn categories(self) -> &'static [&'static str] {
        match self {
            Mood::Happy => &["Pop", "Dance", "Rock", "Electronic", "K-pop"],
            Mood::Sad => &["Chill", "Acoustic", "Classical", "Indie", "R&B"],
            Mood::Energetic => &["Hip-hop", "Punk", "Metal", "Alternative", "Rap"],
            Mood::Relaxed => &["Jazz", "Country", "Chill", "Fall", "Acoustic"],
            Mood::Nostalgic => &["Indie", "Alternative", "Classic Rock", "R&B", "Jazz"],
            Mood::Motivated => &["Electronic", "Rock", "Pop", "Hip-hop", "Metal"],
        }
    }
}

impl fmt::Display for Mood {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Mood::Happy => "happy",
            Mood::Sad => "sad",
            Mood::Energetic => "energetic",
            Mood::Relaxed => "relaxed",
            Mood::Nostalgic => "nostalgic",
            Mood::Motivated => "motivated",
        };
        write!(f, "{}", label)
    }
}

/// Derive the mood of a set of observations. `None` for an empty set.
pub fn derive_mood(observations: &[PriceObservation]) -> Option<Mood> {
    if observations.is_empty() {
        return None;
    }

    let changes = || observations.iter().map(|o| o.price_change);

    let mood = if changes().any(|c| c > Decimal::ZERO) {
        Mood::Happy
    } else if changes().all(|c| c < Decimal::ZERO) {
        Mood::Sad
    } else if changes().any(|c| c > Decimal::ONE) {
        Mood::Energetic
    } else if changes().all(|c| c.is_zero()) {
        Mood::Relaxed
    } else {
        Mood::Nostalgic
    };

    Some(mood)
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MoodSelection {
    pub mood: Mood,
    pub category: &'static str,
}

/// Derive the mood and draw one category uniformly from its pool
pub fn select<R: Rng + ?Sized>(
    observations: &[PriceObservation],
    rng: &mut R,
) -> Option<MoodSelection> {
    let mood = derive_mood(observations)?;
    let category = *mood.categories().choose(rng)?;
    Some(MoodSelection { mood, category })
}
