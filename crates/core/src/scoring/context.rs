use crate::analysis::holdings::{HoldingChangeRecord, HoldingsAnalysis};
use crate::analysis::theme::{values_for_month, ThemeTrends};
use crate::domain::report::{Report, SECTION_FUTURE_POLICY};
use crate::params::AnalysisParams;
use std::collections::{BTreeMap, HashMap, HashSet};

/// Sector holding counts of the last two train reports.
#[derive(Debug, Clone, Default)]
pub(crate) struct SectorShift<'a> {
    pub previous: HashMap<&'a str, usize>,
    pub current: HashMap<&'a str, usize>,
}

/// Everything a factor may look at, derived once per `estimate` call from the train
/// prefix only.
#[derive(Debug)]
pub(crate) struct ScoringContext<'a> {
    pub params: &'a AnalysisParams,
    pub cutoff_month: &'a str,
    pub train_months: usize,
    /// theme -> intensity value in the cutoff month.
    pub latest_theme_values: BTreeMap<String, f64>,
    pub current_holdings: HashSet<&'a str>,
    pub appearances: HashMap<&'a str, usize>,
    pub policy_text: &'a str,
    /// `None` with fewer than two train reports.
    pub sector_shift: Option<SectorShift<'a>>,
    pub positive_signals: usize,
    pub cautious_signals: usize,
    pub holdings_analysis: &'a HoldingsAnalysis,
    pub latest_change: Option<&'a HoldingChangeRecord>,
}

impl<'a> ScoringContext<'a> {
    /// `train` must be non-empty.
    pub fn build(
        params: &'a AnalysisParams,
        train: &'a [Report],
        theme_trends: &ThemeTrends,
        holdings_analysis: &'a HoldingsAnalysis,
        holding_changes: &'a [HoldingChangeRecord],
    ) -> Option<Self> {
        let latest = train.last()?;
        let cutoff_month = latest.report_month.as_str();

        let mut appearances: HashMap<&str, usize> = HashMap::new();
        for name in train.iter().flat_map(|r| r.holding_names()) {
            *appearances.entry(name).or_default() += 1;
        }

        let sector_shift = match train {
            [.., previous, current] => Some(SectorShift {
                previous: sector_counts(previous),
                current: sector_counts(current),
            }),
            _ => None,
        };

        Some(Self {
            params,
            cutoff_month,
            train_months: train.len(),
            latest_theme_values: values_for_month(theme_trends, cutoff_month),
            current_holdings: latest.holding_names().collect(),
            appearances,
            policy_text: latest.section(SECTION_FUTURE_POLICY),
            sector_shift,
            positive_signals: latest.signals.positive.len(),
            cautious_signals: latest.signals.cautious.len(),
            holdings_analysis,
            latest_change: holding_changes.iter().rev().find(|c| c.month == cutoff_month),
        })
    }

    pub fn theme_value(&self, theme: &str) -> f64 {
        self.latest_theme_values.get(theme).copied().unwrap_or(0.0)
    }
}

fn sector_counts(report: &Report) -> HashMap<&str, usize> {
    let mut out: HashMap<&str, usize> = HashMap::new();
    for h in report.holdings.iter().filter(|h| !h.sector.is_empty()) {
        *out.entry(h.sector.as_str()).or_default() += 1;
    }
    out
}

/// A stock in the candidate universe.
#[derive(Debug, Clone)]
pub(crate) struct CandidateProfile<'a> {
    pub name: &'a str,
    /// Sectors from the reference universe; empty for stocks only seen in holdings.
    pub sectors: Vec<&'a str>,
}

impl CandidateProfile<'_> {
    /// Whether `keyword` occurs in the name or any reference sector.
    pub fn mentions(&self, keyword: &str) -> bool {
        self.name.contains(keyword) || self.sectors.iter().any(|s| s.contains(keyword))
    }
}
