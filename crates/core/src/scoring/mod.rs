mod context;
mod factors;

use crate::analysis::holdings::{
    analyze_holdings_history, detect_holding_changes, HoldingChangeRecord, HoldingsAnalysis,
};
use crate::analysis::round_dp;
use crate::analysis::theme::{compute_theme_intensity, compute_theme_trend, ThemeTrends};
use crate::domain::candidate::{Candidate, Confidence};
use crate::domain::report::Report;
use crate::params::AnalysisParams;
use context::{CandidateProfile, ScoringContext};
use factors::FACTOR_TABLE;
use std::collections::{BTreeMap, BTreeSet};

pub const NO_FEATURE_EXPLANATION: &str = "no matching features";

pub struct CandidateScorer<'a> {
    params: &'a AnalysisParams,
}

impl<'a> CandidateScorer<'a> {
    pub fn new(params: &'a AnalysisParams) -> Self {
        Self { params }
    }

    /// Ranks the candidate universe for the month after `reports[cutoff_index]`.
    ///
    /// Only `reports[..=cutoff_index]` is read. The derived inputs must themselves come
    /// from that prefix; `estimate_as_of` builds them that way. An out-of-range cutoff
    /// yields an empty ranking.
    pub fn estimate(
        &self,
        reports: &[Report],
        cutoff_index: usize,
        theme_trends: &ThemeTrends,
        holdings_analysis: &HoldingsAnalysis,
        holding_changes: &[HoldingChangeRecord],
    ) -> Vec<Candidate> {
        if cutoff_index >= reports.len() {
            tracing::debug!(cutoff_index, reports = reports.len(), "cutoff out of range");
            return Vec::new();
        }
        let train = &reports[..=cutoff_index];

        let Some(ctx) = ScoringContext::build(
            self.params,
            train,
            theme_trends,
            holdings_analysis,
            holding_changes,
        ) else {
            return Vec::new();
        };

        let universe = self.universe(train);
        let mut ranked: Vec<Candidate> = universe
            .into_iter()
            .map(|name| {
                let profile = CandidateProfile {
                    name,
                    sectors: self.params.reference_sectors(name),
                };
                self.score_candidate(&profile, &ctx)
            })
            .collect();

        // Stable: equal scores keep the universe's lexical order.
        ranked.sort_by(|a, b| {
            b.total_score
                .partial_cmp(&a.total_score)
                .unwrap_or(std::cmp::Ordering::Equal)
        });

        tracing::debug!(
            cutoff_month = ctx.cutoff_month,
            candidates = ranked.len(),
            "scored candidate universe"
        );
        ranked
    }

    /// Derives every input from `reports[..=cutoff_index]` and ranks.
    pub fn estimate_as_of(&self, reports: &[Report], cutoff_index: usize) -> Vec<Candidate> {
        if cutoff_index >= reports.len() {
            return Vec::new();
        }
        let train = &reports[..=cutoff_index];
        let intensity = compute_theme_intensity(train);
        let trends = compute_theme_trend(&intensity, self.params.trend_window);
        let history = analyze_holdings_history(train);
        let changes = detect_holding_changes(train);
        self.estimate(train, cutoff_index, &trends, &history, &changes)
    }

    /// Every stock held in the train prefix plus the reference list, lexically ordered.
    fn universe<'r>(&'r self, train: &'r [Report]) -> BTreeSet<&'r str> {
        train
            .iter()
            .flat_map(|r| r.holding_names())
            .chain(self.params.candidate_universe.iter().map(|s| s.name.as_str()))
            .collect()
    }

    fn score_candidate(
        &self,
        profile: &CandidateProfile<'_>,
        ctx: &ScoringContext<'_>,
    ) -> Candidate {
        let mut breakdown = BTreeMap::new();
        let mut explanations = Vec::new();
        for (factor, score_fn) in FACTOR_TABLE {
            let outcome = score_fn(profile, ctx);
            breakdown.insert(factor, round_dp(outcome.score.clamp(0.0, 1.0), 3));
            explanations.extend(outcome.explanations);
        }

        let total: f64 = self
            .params
            .score_weights
            .iter()
            .map(|(factor, weight)| weight * breakdown.get(factor).copied().unwrap_or(0.0))
            .sum();
        let total_score = round_dp(total, 3);

        if let Some(change) = ctx.latest_change {
            if change.removed.iter().any(|n| n == profile.name) {
                explanations.push(format!("dropped from top holdings in {}", change.month));
            }
        }
        if explanations.is_empty() {
            explanations.push(NO_FEATURE_EXPLANATION.to_string());
        }

        Candidate {
            name: profile.name.to_string(),
            total_score,
            confidence: Confidence::from_score(total_score),
            is_current_holding: ctx.current_holdings.contains(profile.name),
            score_breakdown: breakdown,
            explanations,
        }
    }
}
