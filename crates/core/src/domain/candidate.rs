use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Factor {
    ThemeMatch,
    PastFrequency,
    #[serde(rename = "description_sim")]
    DescriptionSimilarity,
    SectorTrend,
    SignalMatch,
    CycleTendency,
}

impl Factor {
    pub const ALL: [Factor; 6] = [
        Factor::ThemeMatch,
        Factor::PastFrequency,
        Factor::DescriptionSimilarity,
        Factor::SectorTrend,
        Factor::SignalMatch,
        Factor::CycleTendency,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Factor::ThemeMatch => "theme_match",
            Factor::PastFrequency => "past_frequency",
            Factor::DescriptionSimilarity => "description_sim",
            Factor::SectorTrend => "sector_trend",
            Factor::SignalMatch => "signal_match",
            Factor::CycleTendency => "cycle_tendency",
        }
    }
}

impl fmt::Display for Factor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Confidence {
    Low,
    Medium,
    High,
}

impl Confidence {
    pub const HIGH_THRESHOLD: f64 = 0.5;
    pub const MEDIUM_THRESHOLD: f64 = 0.3;

    pub fn from_score(total_score: f64) -> Self {
        if total_score >= Self::HIGH_THRESHOLD {
            Confidence::High
        } else if total_score >= Self::MEDIUM_THRESHOLD {
            Confidence::Medium
        } else {
            Confidence::Low
        }
    }
}

/// One scored stock for the period after the cutoff month.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Candidate {
    pub name: String,
    pub total_score: f64,
    pub confidence: Confidence,
    /// Held in the cutoff month; a pick for this name is a continuation, not a new entry.
    pub is_current_holding: bool,
    pub score_breakdown: BTreeMap<Factor, f64>,
    /// Never empty.
    pub explanations: Vec<String>,
}

impl Candidate {
    pub fn factor(&self, factor: Factor) -> f64 {
        self.score_breakdown.get(&factor).copied().unwrap_or(0.0)
    }
}
