//! The substance a user is moderating.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::ValidationError;

/// Chosen once during onboarding. Changing it wipes all state.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SubstanceProfile {
    #[default]
    Snus,
    Cigarette,
}

const SNUS_MESSAGES: [&str; 8] = [
    "Snus time!",
    "Well done!",
    "Enjoy a snus!",
    "It's time now!",
    "Take one now!",
    "Done!",
    "Ready to enjoy!",
    "Perfect timing!",
];

const CIGARETTE_MESSAGES: [&str; 8] = [
    "Cigarette time!",
    "Well done!",
    "Enjoy a cigarette!",
    "It's time now!",
    "Take one now!",
    "Done!",
    "Ready to enjoy!",
    "Perfect timing!",
];

impl SubstanceProfile {
    /// Persisted identifier (`substanceId`).
    pub fn id(&self) -> &'static str {
        match self {
            SubstanceProfile::Snus => "snus",
            SubstanceProfile::Cigarette => "cigarette",
        }
    }

    /// Lowercase display label sent to the companion.
    pub fn label(&self) -> &'static str {
        self.id()
    }

    /// Fixed table the notifier picks celebration text from.
    pub fn celebration_messages(&self) -> &'static [&'static str] {
        match self {
            SubstanceProfile::Snus => &SNUS_MESSAGES,
            SubstanceProfile::Cigarette => &CIGARETTE_MESSAGES,
        }
    }
}

impl fmt::Display for SubstanceProfile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.id())
    }
}

impl FromStr for SubstanceProfile {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "snus" | "a" => Ok(SubstanceProfile::Snus),
            "cigarette" | "cigarettes" | "b" => Ok(SubstanceProfile::Cigarette),
            other => Err(ValidationError::UnknownSubstance(other.to_string())),
        }
    }
}
