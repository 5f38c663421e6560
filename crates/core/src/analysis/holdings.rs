use crate::analysis::round_dp;
use crate::domain::report::Report;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoryPoint {
    pub month: String,
    pub rank: u32,
    pub weight: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StockHistoryEntry {
    pub name: String,
    pub total_appearances: usize,
    /// Percent of reports the stock appeared in, 1 decimal.
    pub appearance_rate: f64,
    pub avg_rank: f64,
    pub best_rank: u32,
    /// Unbroken presence ending at the most recent report.
    pub consecutive_months: usize,
    /// Mean absolute rank move between successive appearances.
    pub rank_volatility: f64,
    pub history: Vec<HistoryPoint>,
}

pub type HoldingsAnalysis = BTreeMap<String, StockHistoryEntry>;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RankMove {
    pub name: String,
    /// Previous rank minus current rank; positive means the stock moved up.
    pub change: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HoldingChangeRecord {
    pub month: String,
    pub new_entries: Vec<String>,
    pub removed: Vec<String>,
    pub rank_up: Vec<RankMove>,
    pub rank_down: Vec<RankMove>,
}

pub fn analyze_holdings_history(reports: &[Report]) -> HoldingsAnalysis {
    // name -> (report indices, history points)
    let mut seen: BTreeMap<&str, (Vec<usize>, Vec<HistoryPoint>)> = BTreeMap::new();
    for (idx, report) in reports.iter().enumerate() {
        for holding in report.holdings.iter().filter(|h| !h.name.is_empty()) {
            let (indices, points) = seen.entry(holding.name.as_str()).or_default();
            indices.push(idx);
            points.push(HistoryPoint {
                month: report.report_month.clone(),
                rank: holding.rank,
                weight: holding.weight.clone(),
            });
        }
    }

    let total_reports = reports.len().max(1);
    seen.into_iter()
        .map(|(name, (indices, history))| {
            let appearances = history.len();
            let ranks: Vec<u32> = history.iter().map(|p| p.rank).collect();

            let consecutive = (0..reports.len())
                .rev()
                .take_while(|i| indices.contains(i))
                .count();

            let rank_moves: Vec<i64> = ranks
                .windows(2)
                .map(|w| (w[1] as i64 - w[0] as i64).abs())
                .collect();
            let volatility =
                rank_moves.iter().sum::<i64>() as f64 / rank_moves.len().max(1) as f64;

            let entry = StockHistoryEntry {
                name: name.to_string(),
                total_appearances: appearances,
                appearance_rate: round_dp(appearances as f64 / total_reports as f64 * 100.0, 1),
                avg_rank: round_dp(
                    ranks.iter().map(|r| *r as f64).sum::<f64>() / appearances as f64,
                    1,
                ),
                best_rank: ranks.iter().copied().min().unwrap_or(0),
                consecutive_months: consecutive,
                rank_volatility: round_dp(volatility, 2),
                history,
            };
            (name.to_string(), entry)
        })
        .collect()
}

/// Month-over-month diff of each report's holdings against the previous report.
pub fn detect_holding_changes(reports: &[Report]) -> Vec<HoldingChangeRecord> {
    let mut changes = Vec::with_capacity(reports.len());
    let mut previous: Option<Vec<(&str, u32)>> = None;

    for report in reports {
        let current = ranked_names(report);
        let record = match &previous {
            None => HoldingChangeRecord {
                month: report.report_month.clone(),
                new_entries: current.iter().map(|(n, _)| n.to_string()).collect(),
                removed: Vec::new(),
                rank_up: Vec::new(),
                rank_down: Vec::new(),
            },
            Some(prev) => diff_holdings(&report.report_month, prev, &current),
        };
        changes.push(record);
        previous = Some(current);
    }

    changes
}

fn diff_holdings(
    month: &str,
    previous: &[(&str, u32)],
    current: &[(&str, u32)],
) -> HoldingChangeRecord {
    let prev_ranks: HashMap<&str, u32> = previous.iter().copied().collect();
    let curr_ranks: HashMap<&str, u32> = current.iter().copied().collect();

    let mut record = HoldingChangeRecord {
        month: month.to_string(),
        new_entries: Vec::new(),
        removed: previous
            .iter()
            .filter(|(n, _)| !curr_ranks.contains_key(n))
            .map(|(n, _)| n.to_string())
            .collect(),
        rank_up: Vec::new(),
        rank_down: Vec::new(),
    };

    for (name, rank) in current {
        let Some(prev_rank) = prev_ranks.get(name) else {
            record.new_entries.push(name.to_string());
            continue;
        };
        let change = *prev_rank as i64 - *rank as i64;
        let mv = RankMove {
            name: name.to_string(),
            change,
        };
        if change > 0 {
            record.rank_up.push(mv);
        } else if change < 0 {
            record.rank_down.push(mv);
        }
    }

    record
}

/// Named holdings in first-seen order; a repeated name keeps its last rank.
fn ranked_names(report: &Report) -> Vec<(&str, u32)> {
    let mut out: Vec<(&str, u32)> = Vec::with_capacity(report.holdings.len());
    for h in report.holdings.iter().filter(|h| !h.name.is_empty()) {
        match out.iter_mut().find(|(n, _)| *n == h.name) {
            Some(slot) => slot.1 = h.rank,
            None => out.push((h.name.as_str(), h.rank)),
        }
    }
    out
}
