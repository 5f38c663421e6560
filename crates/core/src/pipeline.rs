use crate::analysis::aspects::{compute_aspect_scores, AspectScores};
use crate::analysis::holdings::{
    analyze_holdings_history, detect_holding_changes, HistoryPoint, HoldingChangeRecord,
};
use crate::analysis::theme::{
    compute_theme_intensity, compute_theme_trend, ThemeIntensityRecord, ThemeTrends,
};
use crate::backtest::run_backtest;
use crate::domain::backtest::BacktestReport;
use crate::domain::candidate::Candidate;
use crate::domain::report::{
    ExtractionQuality, Holding, Performance, Report, ReportCorpus, Signals, ThemeKeywordHit,
};
use crate::params::AnalysisParams;
use crate::scoring::CandidateScorer;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use uuid::Uuid;

pub const DISCLAIMER: &str = "This tool is research support, not investment advice. \
It does not guarantee future fund performance. Predictions are hypotheses derived from \
past reports and must not be used as the basis for actual investment decisions.";

const TOP_THEMES: usize = 5;
const KPI_TOP_K: usize = 5;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DataPeriod {
    pub start: String,
    pub end: String,
    pub total_months: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ThemeScore {
    pub theme: String,
    pub score: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SummaryKpi {
    pub total_reports: usize,
    pub top_themes: Vec<ThemeScore>,
    /// New entries plus removals in the latest month.
    pub recent_change_count: usize,
    pub backtest_top5_hit_rate: f64,
}

/// `StockHistoryEntry` without its per-month history.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HoldingStats {
    pub total_appearances: usize,
    pub appearance_rate: f64,
    pub avg_rank: f64,
    pub best_rank: u32,
    pub consecutive_months: usize,
    pub rank_volatility: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReportQuality {
    pub month: String,
    pub success: bool,
    pub extracted_fields: Vec<String>,
    pub missing_fields: Vec<String>,
    pub issues: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QualitySummary {
    pub total_reports: usize,
    pub successful_extractions: usize,
    pub reports_with_holdings: usize,
    pub per_report: Vec<ReportQuality>,
}

/// The report's own content, passed through for display.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReportText {
    pub month: String,
    pub sections: BTreeMap<String, String>,
    pub signals: Signals,
    pub theme_keywords: BTreeMap<String, ThemeKeywordHit>,
    pub holdings: Vec<Holding>,
    pub performance: Performance,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisOutput {
    pub run_id: Uuid,
    pub fund_name: String,
    pub management_company: String,
    pub analyzed_at: DateTime<Utc>,
    pub params_version: String,
    pub data_period: DataPeriod,
    pub summary_kpi: SummaryKpi,
    pub theme_intensity: Vec<ThemeIntensityRecord>,
    pub theme_trends: ThemeTrends,
    pub holdings_analysis: BTreeMap<String, HoldingStats>,
    pub holdings_history: BTreeMap<String, Vec<HistoryPoint>>,
    pub holding_changes: Vec<HoldingChangeRecord>,
    pub aspect_scores: AspectScores,
    pub candidates: Vec<Candidate>,
    pub backtest: BacktestReport,
    pub quality: QualitySummary,
    pub reports_text: Vec<ReportText>,
    pub disclaimer: String,
}

pub fn run_analysis(
    corpus: &ReportCorpus,
    params: &AnalysisParams,
    analyzed_at: DateTime<Utc>,
) -> AnalysisOutput {
    let reports = corpus.reports.as_slice();
    tracing::info!(reports = reports.len(), "running analysis pipeline");

    let theme_intensity = compute_theme_intensity(reports);
    let theme_trends = compute_theme_trend(&theme_intensity, params.trend_window);
    let history = analyze_holdings_history(reports);
    let holding_changes = detect_holding_changes(reports);
    let aspect_scores = compute_aspect_scores(reports, &params.evaluation_aspects);

    let candidates: Vec<Candidate> = match reports.len().checked_sub(1) {
        Some(latest) => CandidateScorer::new(params)
            .estimate(reports, latest, &theme_trends, &history, &holding_changes)
            .into_iter()
            .take(params.max_candidates)
            .collect(),
        None => Vec::new(),
    };

    let backtest = run_backtest(reports, params);

    let summary_kpi = SummaryKpi {
        total_reports: reports.len(),
        top_themes: top_themes(theme_intensity.last()),
        recent_change_count: holding_changes
            .last()
            .map(|c| c.new_entries.len() + c.removed.len())
            .unwrap_or(0),
        backtest_top5_hit_rate: backtest
            .summary_for(KPI_TOP_K)
            .map(|s| s.avg_hit_rate)
            .unwrap_or(0.0),
    };

    let mut holdings_analysis = BTreeMap::new();
    let mut holdings_history = BTreeMap::new();
    for (name, entry) in history {
        holdings_analysis.insert(
            name.clone(),
            HoldingStats {
                total_appearances: entry.total_appearances,
                appearance_rate: entry.appearance_rate,
                avg_rank: entry.avg_rank,
                best_rank: entry.best_rank,
                consecutive_months: entry.consecutive_months,
                rank_volatility: entry.rank_volatility,
            },
        );
        holdings_history.insert(name, entry.history);
    }

    AnalysisOutput {
        run_id: Uuid::new_v4(),
        fund_name: corpus.fund_name.clone(),
        management_company: corpus.management_company.clone(),
        analyzed_at,
        params_version: params.constants.version.clone(),
        data_period: data_period(corpus),
        summary_kpi,
        theme_intensity,
        theme_trends,
        holdings_analysis,
        holdings_history,
        holding_changes,
        aspect_scores,
        candidates,
        backtest,
        quality: quality_summary(corpus),
        reports_text: reports.iter().map(report_text).collect(),
        disclaimer: DISCLAIMER.to_string(),
    }
}

fn top_themes(latest: Option<&ThemeIntensityRecord>) -> Vec<ThemeScore> {
    let Some(latest) = latest else {
        return Vec::new();
    };
    let mut themes: Vec<ThemeScore> = latest
        .scores
        .iter()
        .map(|(theme, score)| ThemeScore {
            theme: theme.clone(),
            score: *score,
        })
        .collect();
    themes.sort_by(|a, b| {
        b.score
            .partial_cmp(&a.score)
            .unwrap_or(std::cmp::Ordering::Equal)
    });
    themes.truncate(TOP_THEMES);
    themes
}

fn report_text(report: &Report) -> ReportText {
    ReportText {
        month: report.report_month.clone(),
        sections: report.sections.clone(),
        signals: report.signals.clone(),
        theme_keywords: report.theme_keywords.clone(),
        holdings: report.holdings.clone(),
        performance: report.performance.clone(),
    }
}

fn data_period(corpus: &ReportCorpus) -> DataPeriod {
    let months: Vec<&str> = corpus
        .reports
        .iter()
        .map(|r| r.report_month.as_str())
        .filter(|m| !m.is_empty())
        .collect();
    DataPeriod {
        start: months.iter().min().map(|m| m.to_string()).unwrap_or_default(),
        end: months.iter().max().map(|m| m.to_string()).unwrap_or_default(),
        total_months: months.len(),
    }
}

fn quality_summary(corpus: &ReportCorpus) -> QualitySummary {
    let reports = &corpus.reports;
    QualitySummary {
        total_reports: reports.len(),
        successful_extractions: reports
            .iter()
            .filter(|r| r.quality.extraction_success)
            .count(),
        reports_with_holdings: reports.iter().filter(|r| !r.holdings.is_empty()).count(),
        per_report: reports
            .iter()
            .map(|r| {
                let ExtractionQuality {
                    extraction_success,
                    issues,
                    extracted_fields,
                    missing_fields,
                } = r.quality.clone();
                ReportQuality {
                    month: r.report_month.clone(),
                    success: extraction_success,
                    extracted_fields,
                    missing_fields,
                    issues,
                }
            })
            .collect(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use serde_json::json;

    fn corpus() -> ReportCorpus {
        let months = ["2024-01", "2024-02", "2024-03", "2024-04", "2024-05"];
        let holdings = [
            vec!["東京エレクトロン", "アドバンテスト", "デンソー"],
            vec!["東京エレクトロン", "アドバンテスト", "ローム"],
            vec!["東京エレクトロン", "ディスコ", "ローム"],
            vec!["東京エレクトロン", "アドバンテスト", "デンソー"],
            vec!["東京エレクトロン", "アドバンテスト", "ディスコ"],
        ];
        let reports: Vec<_> = months
            .iter()
            .zip(holdings.iter())
            .enumerate()
            .map(|(i, (m, names))| {
                let hs: Vec<_> = names
                    .iter()
                    .enumerate()
                    .map(|(r, n)| json!({"rank": r + 1, "name": n, "weight": "9.0", "sector": "半導体製造装置"}))
                    .collect();
                let issues: Vec<&str> = if i == 2 { vec!["table fallback"] } else { Vec::new() };
                json!({
                    "report_month": m,
                    "sections": {"future_policy": "半導体の需要拡大に注目", "operation_review": "業績は堅調"},
                    "signals": {"positive": ["拡大", "注目"], "cautious": ["懸念"]},
                    "theme_keywords": {
                        "半導体": {"count": 10 + i},
                        "AI・データセンター": {"count": 5},
                        "車載・電装": {"count": 2}
                    },
                    "holdings": hs,
                    "quality": {"extraction_success": i != 2, "issues": issues}
                })
            })
            .collect();
        serde_json::from_value(json!({
            "fund_name": "情報エレクトロニクスファンド",
            "management_company": "Example AM",
            "reports": reports
        }))
        .unwrap()
    }

    fn params() -> AnalysisParams {
        let mut p = AnalysisParams::default();
        p.backtest.min_training_months = 3;
        p.backtest.top_k_values = vec![3, 5];
        p
    }

    #[test]
    fn assembles_full_output() {
        let at = Utc.with_ymd_and_hms(2024, 6, 1, 0, 0, 0).unwrap();
        let out = run_analysis(&corpus(), &params(), at);

        assert_eq!(out.analyzed_at, at);
        assert_eq!(out.disclaimer, DISCLAIMER);
        assert_eq!(out.params_version, "v1");
        assert_eq!(
            out.data_period,
            DataPeriod {
                start: "2024-01".into(),
                end: "2024-05".into(),
                total_months: 5
            }
        );
        assert_eq!(out.summary_kpi.total_reports, 5);
        assert_eq!(out.summary_kpi.top_themes[0].theme, "半導体");
        assert_eq!(out.summary_kpi.top_themes.len(), 3);
        // 2024-05 adds ディスコ and drops デンソー
        assert_eq!(out.summary_kpi.recent_change_count, 2);
        assert_eq!(out.theme_intensity.len(), 5);
        assert_eq!(out.holding_changes.len(), 5);
        assert_eq!(out.holdings_history["東京エレクトロン"].len(), 5);
        assert_eq!(out.holdings_analysis["東京エレクトロン"].consecutive_months, 5);
        assert!(out.aspect_scores.contains_key("ディスコ"));

        assert!(!out.candidates.is_empty());
        assert!(out.candidates.len() <= params().max_candidates);
        assert_eq!(out.backtest.summary_for(5).unwrap().total_periods, 1);

        assert_eq!(out.quality.total_reports, 5);
        assert_eq!(out.quality.successful_extractions, 4);
        assert_eq!(out.quality.reports_with_holdings, 5);
        assert_eq!(out.quality.per_report[2].issues, vec!["table fallback"]);

        assert_eq!(out.reports_text.len(), 5);
        let first = &out.reports_text[0];
        assert_eq!(first.month, "2024-01");
        assert_eq!(first.sections["operation_review"], "業績は堅調");
        assert_eq!(first.signals.cautious, vec!["懸念"]);
        assert_eq!(first.theme_keywords["半導体"].count, 10);
        assert_eq!(first.holdings[2].name, "デンソー");
    }

    #[test]
    fn empty_corpus_is_not_an_error() {
        let at = Utc.with_ymd_and_hms(2024, 6, 1, 0, 0, 0).unwrap();
        let out = run_analysis(&ReportCorpus::default(), &params(), at);
        assert!(out.candidates.is_empty());
        assert!(out.theme_intensity.is_empty());
        assert!(out.reports_text.is_empty());
        assert_eq!(out.fund_name, crate::domain::report::DEFAULT_FUND_NAME);
        assert_eq!(out.data_period.total_months, 0);
        assert_eq!(out.summary_kpi.backtest_top5_hit_rate, 0.0);
        assert!(matches!(out.backtest, BacktestReport::InsufficientData { .. }));
    }

    #[test]
    fn output_serializes_with_expected_keys() {
        let at = Utc.with_ymd_and_hms(2024, 6, 1, 0, 0, 0).unwrap();
        let out = run_analysis(&corpus(), &params(), at);
        let v = serde_json::to_value(&out).unwrap();
        assert_eq!(v["backtest"]["status"], "completed");
        assert!(v["backtest"]["summary"]["top_5"]["avg_hit_rate"].is_number());
        assert!(v["candidates"][0]["score_breakdown"]["theme_match"].is_number());
        assert!(v["theme_trends"]["半導体"][0]["ma"].is_number());
        assert_eq!(v["theme_trends"]["半導体"][0]["direction"], "stable");
        assert!(v["disclaimer"].as_str().unwrap().contains("not investment advice"));
    }
}
