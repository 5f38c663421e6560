use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

pub fn top_k_key(k: usize) -> String {
    format!("top_{k}")
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TopKMetrics {
    /// Top-K non-held candidates in ranking order.
    pub predicted: Vec<String>,
    pub hits: Vec<String>,
    pub hit_count: usize,
    pub precision: f64,
    pub recall: f64,
    pub hit_rate: u8,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PredictionOutcome {
    /// Predicted and genuinely new in the target month.
    Hit,
    /// Predicted and present in the target month, but not a new addition.
    Continuation,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PredictionTrail {
    pub name: String,
    #[serde(rename = "type")]
    pub outcome: PredictionOutcome,
    pub score: f64,
    pub reason: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BacktestPeriodResult {
    pub train_until: String,
    pub predicted_month: String,
    pub actual_new_entries: Vec<String>,
    pub metrics: BTreeMap<String, TopKMetrics>,
    pub explanations: Vec<PredictionTrail>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TopKSummary {
    pub avg_hit_rate: f64,
    pub avg_precision: f64,
    pub avg_recall: f64,
    pub total_periods: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum BacktestReport {
    Completed {
        summary: BTreeMap<String, TopKSummary>,
        results: Vec<BacktestPeriodResult>,
    },
    InsufficientData {
        required_reports: usize,
        available_reports: usize,
        message: String,
    },
}

impl BacktestReport {
    pub fn summary_for(&self, k: usize) -> Option<&TopKSummary> {
        match self {
            BacktestReport::Completed { summary, .. } => summary.get(&top_k_key(k)),
            BacktestReport::InsufficientData { .. } => None,
        }
    }

    pub fn periods(&self) -> &[BacktestPeriodResult] {
        match self {
            BacktestReport::Completed { results, .. } => results,
            BacktestReport::InsufficientData { .. } => &[],
        }
    }
}
