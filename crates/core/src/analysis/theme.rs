use crate::analysis::round_dp;
use crate::domain::report::Report;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

/// Moving-average deltas beyond this magnitude count as a directional move.
const DIRECTION_THRESHOLD: f64 = 0.5;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ThemeIntensityRecord {
    pub month: String,
    /// theme -> share of the month's keyword hits, in [0, 100].
    pub scores: BTreeMap<String, f64>,
    /// Denominator used for `scores` (1 when the month had no hits).
    pub total_keywords: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TrendDirection {
    Up,
    Down,
    Stable,
}

impl TrendDirection {
    fn from_delta(delta: f64) -> Self {
        if delta > DIRECTION_THRESHOLD {
            TrendDirection::Up
        } else if delta < -DIRECTION_THRESHOLD {
            TrendDirection::Down
        } else {
            TrendDirection::Stable
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ThemeTrendPoint {
    pub month: String,
    pub value: f64,
    #[serde(rename = "ma")]
    pub moving_average: f64,
    pub delta: f64,
    pub direction: TrendDirection,
}

pub type ThemeTrends = BTreeMap<String, Vec<ThemeTrendPoint>>;

/// Normalizes each report's keyword counts into per-theme percentages.
pub fn compute_theme_intensity(reports: &[Report]) -> Vec<ThemeIntensityRecord> {
    reports
        .iter()
        .map(|report| {
            let total: u64 = report.theme_keywords.values().map(|hit| hit.count).sum();
            let denominator = total.max(1);

            let scores = report
                .theme_keywords
                .iter()
                .map(|(theme, hit)| {
                    let share = hit.count as f64 / denominator as f64 * 100.0;
                    (theme.clone(), round_dp(share, 2))
                })
                .collect();

            ThemeIntensityRecord {
                month: report.report_month.clone(),
                scores,
                total_keywords: denominator,
            }
        })
        .collect()
}

/// Trailing moving average and month-over-month delta per theme.
///
/// The average at index `i` covers `[i - window + 1, i]` clipped at 0 and never looks
/// ahead, so a point only depends on months up to its own.
pub fn compute_theme_trend(intensity: &[ThemeIntensityRecord], window: usize) -> ThemeTrends {
    let window = window.max(1);
    let themes: BTreeSet<&str> = intensity
        .iter()
        .flat_map(|record| record.scores.keys().map(String::as_str))
        .collect();

    let mut trends = ThemeTrends::new();
    for theme in themes {
        let values: Vec<f64> = intensity
            .iter()
            .map(|record| record.scores.get(theme).copied().unwrap_or(0.0))
            .collect();

        let moving_average: Vec<f64> = (0..values.len())
            .map(|i| {
                let start = (i + 1).saturating_sub(window);
                let slice = &values[start..=i];
                slice.iter().sum::<f64>() / slice.len() as f64
            })
            .collect();

        let points = intensity
            .iter()
            .enumerate()
            .map(|(i, record)| {
                let delta = if i == 0 {
                    0.0
                } else {
                    moving_average[i] - moving_average[i - 1]
                };
                ThemeTrendPoint {
                    month: record.month.clone(),
                    value: round_dp(values[i], 2),
                    moving_average: round_dp(moving_average[i], 2),
                    delta: round_dp(delta, 2),
                    direction: TrendDirection::from_delta(delta),
                }
            })
            .collect();

        trends.insert(theme.to_string(), points);
    }

    trends
}

/// Each theme's value in `month`, skipping themes with no point for it.
pub fn values_for_month(trends: &ThemeTrends, month: &str) -> BTreeMap<String, f64> {
    trends
        .iter()
        .filter_map(|(theme, points)| {
            points
                .iter()
                .find(|p| p.month == month)
                .map(|p| (theme.clone(), p.value))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn report(month: &str, counts: serde_json::Value) -> Report {
        serde_json::from_value(json!({
            "report_month": month,
            "theme_keywords": counts,
        }))
        .unwrap()
    }

    #[test]
    fn intensity_is_share_of_total() {
        let reports = vec![report(
            "2024-01",
            json!({"AI": {"count": 1}, "EV": {"count": 2}}),
        )];
        let out = compute_theme_intensity(&reports);
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].month, "2024-01");
        assert_eq!(out[0].scores["AI"], 33.33);
        assert_eq!(out[0].scores["EV"], 66.67);
        assert_eq!(out[0].total_keywords, 3);
    }

    #[test]
    fn zero_counts_yield_zero_scores_not_nan() {
        let reports = vec![
            report("2024-01", json!({"AI": {"count": 0}, "EV": {}})),
            report("2024-02", json!({})),
        ];
        let out = compute_theme_intensity(&reports);
        assert_eq!(out[0].scores["AI"], 0.0);
        assert_eq!(out[0].scores["EV"], 0.0);
        assert_eq!(out[0].total_keywords, 1);
        assert!(out[1].scores.is_empty());
    }

    #[test]
    fn intensity_scores_stay_in_range() {
        let reports = vec![
            report("2024-01", json!({"A": {"count": 7}, "B": {"count": 3}, "C": {"count": 1}})),
            report("2024-02", json!({"A": {"count": 1000}})),
        ];
        for record in compute_theme_intensity(&reports) {
            for v in record.scores.values() {
                assert!((0.0..=100.0).contains(v));
            }
        }
    }

    fn intensity(month: &str, pairs: &[(&str, f64)]) -> ThemeIntensityRecord {
        ThemeIntensityRecord {
            month: month.to_string(),
            scores: pairs.iter().map(|(k, v)| (k.to_string(), *v)).collect(),
            total_keywords: 1,
        }
    }

    #[test]
    fn trend_uses_left_truncated_window() {
        let series = vec![
            intensity("2024-01", &[("AI", 10.0)]),
            intensity("2024-02", &[("AI", 20.0)]),
            intensity("2024-03", &[("AI", 30.0)]),
            intensity("2024-04", &[("AI", 40.0)]),
        ];
        let trends = compute_theme_trend(&series, 3);
        let ai = &trends["AI"];
        assert_eq!(ai.len(), 4);
        assert_eq!(ai[0].moving_average, 10.0);
        assert_eq!(ai[1].moving_average, 15.0);
        assert_eq!(ai[2].moving_average, 20.0);
        assert_eq!(ai[3].moving_average, 30.0);
        assert_eq!(ai[3].delta, 10.0);
        assert_eq!(ai[3].direction, TrendDirection::Up);
    }

    #[test]
    fn first_point_is_always_stable() {
        let series = vec![
            intensity("2024-01", &[("AI", 90.0)]),
            intensity("2024-02", &[("AI", 0.0)]),
        ];
        let trends = compute_theme_trend(&series, 3);
        assert_eq!(trends["AI"][0].delta, 0.0);
        assert_eq!(trends["AI"][0].direction, TrendDirection::Stable);
        assert_eq!(trends["AI"][1].direction, TrendDirection::Down);
    }

    #[test]
    fn missing_theme_counts_as_zero_and_thresholds_are_strict() {
        let series = vec![
            intensity("2024-01", &[("AI", 1.0)]),
            intensity("2024-02", &[("EV", 5.0)]),
            intensity("2024-03", &[("AI", 1.5), ("EV", 5.0)]),
        ];
        let trends = compute_theme_trend(&series, 1);
        assert_eq!(trends["EV"][0].value, 0.0);
        assert_eq!(trends["AI"][1].value, 0.0);
        assert_eq!(trends["AI"][2].delta, 1.5);
        assert_eq!(trends["AI"][2].direction, TrendDirection::Up);

        let flat = vec![
            intensity("2024-01", &[("X", 1.0)]),
            intensity("2024-02", &[("X", 1.5)]),
        ];
        let t = compute_theme_trend(&flat, 1);
        // exactly +0.5 is not a move
        assert_eq!(t["X"][1].delta, 0.5);
        assert_eq!(t["X"][1].direction, TrendDirection::Stable);
    }

    #[test]
    fn trend_point_does_not_depend_on_later_months() {
        let prefix = vec![
            intensity("2024-01", &[("AI", 10.0)]),
            intensity("2024-02", &[("AI", 12.0)]),
        ];
        let mut full = prefix.clone();
        full.push(intensity("2024-03", &[("AI", 99.0)]));

        let a = compute_theme_trend(&prefix, 3);
        let b = compute_theme_trend(&full, 3);
        assert_eq!(a["AI"][..], b["AI"][..2]);
    }

    #[test]
    fn values_for_month_picks_matching_point() {
        let series = vec![
            intensity("2024-01", &[("AI", 10.0)]),
            intensity("2024-02", &[("AI", 20.0)]),
        ];
        let trends = compute_theme_trend(&series, 3);
        let v = values_for_month(&trends, "2024-02");
        assert_eq!(v["AI"], 20.0);
        assert!(values_for_month(&trends, "2030-01").is_empty());
    }
}
