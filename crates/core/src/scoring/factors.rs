use crate::domain::candidate::Factor;
use crate::scoring::context::{CandidateProfile, ScoringContext};

#[derive(Debug, Clone, Default, PartialEq)]
pub(crate) struct FactorOutcome {
    pub score: f64,
    pub explanations: Vec<String>,
}

impl FactorOutcome {
    fn silent(score: f64) -> Self {
        Self {
            score,
            explanations: Vec::new(),
        }
    }

    fn explained(score: f64, explanation: String) -> Self {
        Self {
            score,
            explanations: vec![explanation],
        }
    }
}

pub(crate) type FactorFn = fn(&CandidateProfile<'_>, &ScoringContext<'_>) -> FactorOutcome;

/// Evaluation order is also the order explanations appear in.
pub(crate) const FACTOR_TABLE: [(Factor, FactorFn); 6] = [
    (Factor::ThemeMatch, theme_match),
    (Factor::PastFrequency, past_frequency),
    (Factor::DescriptionSimilarity, description_similarity),
    (Factor::SectorTrend, sector_trend),
    (Factor::SignalMatch, signal_match),
    (Factor::CycleTendency, cycle_tendency),
];

pub(crate) fn theme_match(cand: &CandidateProfile<'_>, ctx: &ScoringContext<'_>) -> FactorOutcome {
    let mut score = 0.0;
    let mut matched = Vec::new();
    for (theme, keywords) in &ctx.params.theme_keywords {
        if keywords.iter().any(|kw| cand.mentions(kw)) {
            score += ctx.theme_value(theme) / 100.0;
            matched.push(theme.as_str());
        }
    }

    if matched.is_empty() {
        return FactorOutcome::silent(score);
    }
    FactorOutcome::explained(score.min(1.0), format!("theme match: {}", matched.join(", ")))
}

pub(crate) fn past_frequency(
    cand: &CandidateProfile<'_>,
    ctx: &ScoringContext<'_>,
) -> FactorOutcome {
    let count = ctx.appearances.get(cand.name).copied().unwrap_or(0);
    if count == 0 {
        return FactorOutcome::silent(0.0);
    }

    let freq = count as f64 / ctx.train_months.max(1) as f64;
    if ctx.current_holdings.contains(cand.name) {
        FactorOutcome::explained(freq.min(1.0), format!("held in {count} past reports"))
    } else {
        let boosted = freq * ctx.params.constants.reentry_multiplier;
        FactorOutcome::explained(
            boosted.min(1.0),
            format!("held in {count} past reports (re-entry candidate)"),
        )
    }
}

pub(crate) fn description_similarity(
    cand: &CandidateProfile<'_>,
    ctx: &ScoringContext<'_>,
) -> FactorOutcome {
    let step = ctx.params.constants.description_step;
    let hits = ctx
        .params
        .evaluation_aspects
        .values()
        .filter(|keywords| {
            keywords
                .iter()
                .any(|kw| cand.mentions(kw) && ctx.policy_text.contains(kw.as_str()))
        })
        .count();

    let score = (hits as f64 * step).min(1.0);
    if score > 0.3 {
        FactorOutcome::explained(score, "strong overlap with the latest policy text".to_string())
    } else {
        FactorOutcome::silent(score)
    }
}

pub(crate) fn sector_trend(cand: &CandidateProfile<'_>, ctx: &ScoringContext<'_>) -> FactorOutcome {
    let Some(shift) = &ctx.sector_shift else {
        return FactorOutcome::silent(0.0);
    };
    let constants = &ctx.params.constants;

    for sector in &cand.sectors {
        let current = shift.current.get(sector).copied().unwrap_or(0);
        let previous = shift.previous.get(sector).copied().unwrap_or(0);
        if current > previous {
            return FactorOutcome::explained(
                constants.sector_increase_score,
                format!("allocation to sector {sector} is increasing"),
            );
        }
        if current == previous && current > 0 {
            return FactorOutcome::silent(constants.sector_steady_score);
        }
    }
    FactorOutcome::silent(0.0)
}

pub(crate) fn signal_match(cand: &CandidateProfile<'_>, ctx: &ScoringContext<'_>) -> FactorOutcome {
    let constants = &ctx.params.constants;
    let mut score = if ctx.positive_signals > ctx.cautious_signals {
        constants.signal_majority_score
    } else if ctx.positive_signals > 0 {
        constants.signal_present_score
    } else {
        0.0
    };

    // At most one bonus per sector: the first strong theme it belongs to.
    for sector in &cand.sectors {
        let strong_theme = ctx.params.theme_keywords.iter().any(|(theme, keywords)| {
            keywords.iter().any(|kw| sector.contains(kw.as_str()))
                && ctx.theme_value(theme) > constants.signal_theme_threshold
        });
        if strong_theme {
            score = (score + constants.signal_theme_bonus).min(1.0);
        }
    }

    if score > 0.5 {
        FactorOutcome::explained(score, "positive signals in the latest report".to_string())
    } else {
        FactorOutcome::silent(score)
    }
}

pub(crate) fn cycle_tendency(
    cand: &CandidateProfile<'_>,
    ctx: &ScoringContext<'_>,
) -> FactorOutcome {
    let Some(entry) = ctx.holdings_analysis.get(cand.name) else {
        return FactorOutcome::silent(0.0);
    };
    let constants = &ctx.params.constants;

    if entry.consecutive_months == 0 && entry.total_appearances > 1 {
        FactorOutcome::explained(
            constants.cycle_reentry_score,
            format!(
                "rotation cycle: {} past appearances, re-entry pattern",
                entry.total_appearances
            ),
        )
    } else if entry.rank_volatility > constants.cycle_volatility_threshold {
        FactorOutcome::silent(constants.cycle_volatile_score)
    } else {
        FactorOutcome::silent(0.0)
    }
}
