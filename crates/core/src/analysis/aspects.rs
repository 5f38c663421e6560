use crate::analysis::round_dp;
use crate::domain::report::{Report, SECTION_FUTURE_POLICY, SECTION_OPERATION_REVIEW};
use std::collections::BTreeMap;

pub type AspectScores = BTreeMap<String, BTreeMap<String, f64>>;

/// For every held stock, counts aspect keywords in the policy and review text of the
/// months it was held, scaled so the strongest aspect is 1.0.
pub fn compute_aspect_scores(
    reports: &[Report],
    aspects: &BTreeMap<String, Vec<String>>,
) -> AspectScores {
    let mut texts: BTreeMap<&str, String> = BTreeMap::new();
    for report in reports {
        let combined = format!(
            "{} {}",
            report.section(SECTION_FUTURE_POLICY),
            report.section(SECTION_OPERATION_REVIEW)
        );
        for name in report.holding_names() {
            let text = texts.entry(name).or_default();
            text.push(' ');
            text.push_str(&combined);
        }
    }

    texts
        .into_iter()
        .map(|(name, text)| {
            let counts: BTreeMap<String, usize> = aspects
                .iter()
                .map(|(aspect, keywords)| {
                    let count: usize = keywords
                        .iter()
                        .map(|kw| text.matches(kw.as_str()).count())
                        .sum();
                    (aspect.clone(), count)
                })
                .collect();

            let max = counts.values().copied().max().unwrap_or(0);
            let scores = counts
                .into_iter()
                .map(|(aspect, count)| {
                    let v = if max > 0 {
                        round_dp(count as f64 / max as f64, 2)
                    } else {
                        count as f64
                    };
                    (aspect, v)
                })
                .collect();
            (name.to_string(), scores)
        })
        .collect()
}
