//! Authorization tiers.
//!
//! Tiers are checked from the top down: a tier-3 keyword wins even when
//! tier-2 keywords are also present. Tier 2 and above never run without a
//! human approving them.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::config::TierConfig;
use crate::domain::{Metadata, keys};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Tier {
    /// Standard task processing
    Standard,
    /// Planning or skill-definition artifacts
    Planning,
    /// System-modifying actions
    SystemChange,
    /// External-facing or financial actions
    External,
}

impl Tier {
    pub fn level(&self) -> u8 {
        match self {
            Tier::Standard => 0,
            Tier::Planning => 1,
            Tier::SystemChange => 2,
            Tier::External => 3,
        }
    }

    pub fn requires_approval(&self) -> bool {
        *self >= Tier::SystemChange
    }
}

impl fmt::Display for Tier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Tier {}", self.level())
    }
}

/// Keyword policy built once from configuration
#[derive(Debug, Clone)]
pub struct TierPolicy {
    tier3: Vec<String>,
    tier2: Vec<String>,
    tier1_classifications: Vec<String>,
}

impl TierPolicy {
    pub fn new(config: &TierConfig) -> Self {
        fn lowered(words: &[String]) -> Vec<String> {
            words
                .iter()
                .map(|w| w.trim().to_lowercase())
                .filter(|w| !w.is_empty())
                .collect()
        }
        Self {
            tier3: lowered(&config.tier3_keywords),
            tier2: lowered(&config.tier2_keywords),
            tier1_classifications: lowered(&config.tier1_classifications),
        }
    }

    /// Compute the tier for a task. Pure; the title counts as content.
    pub fn classify(&self, metadata: &Metadata, content: &str) -> Tier {
        let mut haystack = content.to_lowercase();
        if let Some(title) = metadata.get(keys::TITLE) {
            haystack.push('\n');
            haystack.push_str(&title.to_lowercase());
        }

        if self.tier3.iter().any(|k| haystack.contains(k.as_str())) {
            return Tier::External;
        }

        if self.tier2.iter().any(|k| haystack.contains(k.as_str())) {
            return Tier::SystemChange;
        }

        let classification = metadata
            .get(keys::CLASSIFICATION)
            .map(|c| c.trim().to_lowercase())
            .unwrap_or_default();
        if self.tier1_classifications.contains(&classification) {
            return Tier::Planning;
        }

        Tier::Standard
    }

    /// Keyword that pushed the content into tier 2 or 3, for audit trails
    pub fn matched_keyword(&self, content: &str) -> Option<&str> {
        let lower = content.to_lowercase();
        self.tier3
            .iter()
            .chain(self.tier2.iter())
            .find(|k| lower.contains(k.as_str()))
            .map(String::as_str)
    }
}

impl Default for TierPolicy {
    fn default() -> Self {
        Self::new(&TierConfig::default())
    }
}
