use crate::domain::candidate::Factor;
use anyhow::{ensure, Context};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

pub const DEFAULT_TREND_WINDOW: usize = 3;
pub const DEFAULT_MAX_CANDIDATES: usize = 20;
/// A century of monthly reports.
pub const MAX_TRAINING_MONTHS: usize = 1200;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReferenceStock {
    pub name: String,
    pub sector: String,
}

impl ReferenceStock {
    fn new(name: &str, sector: &str) -> Self {
        Self {
            name: name.to_string(),
            sector: sector.to_string(),
        }
    }
}

/// Empirically chosen scoring constants. Changing any value is a new `version`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScoringConstants {
    pub version: String,
    /// Applied to past frequency when a stock was held before but not in the cutoff month.
    pub reentry_multiplier: f64,
    /// Per matching evaluation aspect found in the latest policy text.
    pub description_step: f64,
    pub sector_increase_score: f64,
    pub sector_steady_score: f64,
    pub signal_majority_score: f64,
    pub signal_present_score: f64,
    pub signal_theme_bonus: f64,
    /// Latest theme intensity above which a sector's theme adds `signal_theme_bonus`.
    pub signal_theme_threshold: f64,
    pub cycle_reentry_score: f64,
    pub cycle_volatile_score: f64,
    pub cycle_volatility_threshold: f64,
}

impl Default for ScoringConstants {
    fn default() -> Self {
        Self {
            version: "v1".to_string(),
            reentry_multiplier: 1.3,
            description_step: 0.2,
            sector_increase_score: 0.7,
            sector_steady_score: 0.4,
            signal_majority_score: 0.6,
            signal_present_score: 0.3,
            signal_theme_bonus: 0.2,
            signal_theme_threshold: 15.0,
            cycle_reentry_score: 0.7,
            cycle_volatile_score: 0.4,
            cycle_volatility_threshold: 2.0,
        }
    }
}

impl ScoringConstants {
    fn values(&self) -> [(&'static str, f64); 11] {
        [
            ("reentry_multiplier", self.reentry_multiplier),
            ("description_step", self.description_step),
            ("sector_increase_score", self.sector_increase_score),
            ("sector_steady_score", self.sector_steady_score),
            ("signal_majority_score", self.signal_majority_score),
            ("signal_present_score", self.signal_present_score),
            ("signal_theme_bonus", self.signal_theme_bonus),
            ("signal_theme_threshold", self.signal_theme_threshold),
            ("cycle_reentry_score", self.cycle_reentry_score),
            ("cycle_volatile_score", self.cycle_volatile_score),
            ("cycle_volatility_threshold", self.cycle_volatility_threshold),
        ]
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BacktestConfig {
    pub min_training_months: usize,
    pub top_k_values: Vec<usize>,
    /// Fan cutoffs out over the rayon pool. Output is identical either way.
    pub parallel: bool,
}

impl Default for BacktestConfig {
    fn default() -> Self {
        Self {
            min_training_months: 6,
            top_k_values: vec![3, 5, 10],
            parallel: false,
        }
    }
}

impl BacktestConfig {
    pub fn max_k(&self) -> usize {
        self.top_k_values.iter().copied().max().unwrap_or(0)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalysisParams {
    /// theme -> literal match strings.
    pub theme_keywords: BTreeMap<String, Vec<String>>,
    /// evaluation aspect -> literal match strings.
    pub evaluation_aspects: BTreeMap<String, Vec<String>>,
    pub candidate_universe: Vec<ReferenceStock>,
    pub score_weights: BTreeMap<Factor, f64>,
    pub constants: ScoringConstants,
    pub backtest: BacktestConfig,
    pub trend_window: usize,
    pub max_candidates: usize,
}

impl Default for AnalysisParams {
    fn default() -> Self {
        Self {
            theme_keywords: default_theme_keywords(),
            evaluation_aspects: default_evaluation_aspects(),
            candidate_universe: default_candidate_universe(),
            score_weights: default_score_weights(),
            constants: ScoringConstants::default(),
            backtest: BacktestConfig::default(),
            trend_window: DEFAULT_TREND_WINDOW,
            max_candidates: DEFAULT_MAX_CANDIDATES,
        }
    }
}

impl AnalysisParams {
    /// Parses a parameter file; absent fields keep their defaults.
    pub fn from_json_str(s: &str) -> anyhow::Result<Self> {
        let params: Self =
            serde_json::from_str(s).context("analysis params file is not valid JSON")?;
        params.validate()?;
        Ok(params)
    }

    pub fn validate(&self) -> anyhow::Result<()> {
        ensure!(
            !self.theme_keywords.is_empty(),
            "theme_keywords must contain at least one theme"
        );
        for (theme, keywords) in &self.theme_keywords {
            ensure!(
                keywords.iter().all(|k| !k.is_empty()),
                "theme {theme:?} has an empty keyword"
            );
        }
        for (aspect, keywords) in &self.evaluation_aspects {
            ensure!(
                keywords.iter().all(|k| !k.is_empty()),
                "evaluation aspect {aspect:?} has an empty keyword"
            );
        }
        for stock in &self.candidate_universe {
            ensure!(
                !stock.name.trim().is_empty(),
                "candidate_universe entries must have a name"
            );
        }
        for (factor, weight) in &self.score_weights {
            ensure!(
                weight.is_finite() && *weight >= 0.0,
                "score weight for {factor} must be a finite non-negative number (got {weight})"
            );
        }
        for (name, value) in self.constants.values() {
            ensure!(value.is_finite(), "scoring constant {name} must be finite");
        }
        ensure!(
            !self.backtest.top_k_values.is_empty(),
            "backtest.top_k_values must be non-empty"
        );
        ensure!(
            self.backtest.top_k_values.iter().all(|k| *k >= 1),
            "backtest.top_k_values must all be >= 1"
        );
        ensure!(
            self.backtest.min_training_months <= MAX_TRAINING_MONTHS,
            "backtest.min_training_months must be <= {MAX_TRAINING_MONTHS} (got {})",
            self.backtest.min_training_months
        );
        ensure!(self.trend_window >= 1, "trend_window must be >= 1");
        Ok(())
    }

    pub fn weight(&self, factor: Factor) -> f64 {
        self.score_weights.get(&factor).copied().unwrap_or(0.0)
    }

    /// Sectors the reference universe lists for `name` (a name may appear more than once).
    pub fn reference_sectors(&self, name: &str) -> Vec<&str> {
        self.candidate_universe
            .iter()
            .filter(|s| s.name == name)
            .map(|s| s.sector.as_str())
            .collect()
    }
}

fn lexicon(entries: &[(&str, &[&str])]) -> BTreeMap<String, Vec<String>> {
    entries
        .iter()
        .map(|(k, kws)| (k.to_string(), kws.iter().map(|s| s.to_string()).collect()))
        .collect()
}

fn default_theme_keywords() -> BTreeMap<String, Vec<String>> {
    lexicon(&[
        (
            "半導体",
            &["半導体", "ウエハー", "製造装置", "EUV", "後工程", "パワー半導体"],
        ),
        (
            "AI・データセンター",
            &["生成AI", "AI", "データセンター", "GPU", "AIサーバー"],
        ),
        ("通信インフラ", &["通信", "5G", "ネットワーク", "光ファイバー"]),
        ("車載・電装", &["車載", "EV", "電動化", "ADAS", "自動運転"]),
        (
            "コンテンツ・エンタメ×テクノロジー",
            &["ゲーム", "コンテンツ", "エンタメ"],
        ),
        ("セキュリティ・防衛", &["セキュリティ", "防衛", "サイバー"]),
        ("設備投資・FA", &["設備投資", "FA", "自動化", "ロボット"]),
        (
            "電子部品・デバイス",
            &["電子部品", "デバイス", "コンデンサ", "センサー", "光学"],
        ),
    ])
}

fn default_evaluation_aspects() -> BTreeMap<String, Vec<String>> {
    lexicon(&[
        ("成長性", &["成長", "拡大", "需要"]),
        ("収益性", &["利益", "業績", "収益"]),
        ("技術力", &["技術", "半導体", "先端"]),
        ("競争優位", &["シェア", "競争力", "製造装置"]),
        ("バリュエーション", &["バリュエーション", "割安"]),
        ("テーマ性", &["AI", "EV", "データセンター", "電子部品"]),
    ])
}

fn default_candidate_universe() -> Vec<ReferenceStock> {
    [
        ("東京エレクトロン", "半導体製造装置"),
        ("アドバンテスト", "半導体製造装置"),
        ("ディスコ", "半導体製造装置"),
        ("レーザーテック", "半導体製造装置"),
        ("SCREEN", "半導体製造装置"),
        ("KOKUSAI ELECTRIC", "半導体製造装置"),
        ("ルネサスエレクトロニクス", "半導体"),
        ("ソシオネクスト", "半導体"),
        ("ローム", "半導体"),
        ("信越化学工業", "半導体材料"),
        ("SUMCO", "半導体材料"),
        ("東京応化工業", "半導体材料"),
        ("村田製作所", "電子部品"),
        ("TDK", "電子部品"),
        ("太陽誘電", "電子部品"),
        ("京セラ", "電子部品"),
        ("イビデン", "電子部品"),
        ("日東電工", "電子部品"),
        ("NTTデータグループ", "IT・通信"),
        ("富士通", "IT・通信"),
        ("日本電気", "IT・通信"),
        ("野村総合研究所", "IT・通信"),
        ("ソニーグループ", "エレクトロニクス"),
        ("日立製作所", "エレクトロニクス"),
        ("キーエンス", "FA"),
        ("HOYA", "光学"),
        ("任天堂", "ゲーム・コンテンツ"),
        ("カプコン", "ゲーム・コンテンツ"),
        ("デンソー", "車載"),
        ("日本電産", "車載"),
    ]
    .iter()
    .map(|(n, s)| ReferenceStock::new(n, s))
    .collect()
}

fn default_score_weights() -> BTreeMap<Factor, f64> {
    BTreeMap::from([
        (Factor::ThemeMatch, 0.25),
        (Factor::PastFrequency, 0.20),
        (Factor::DescriptionSimilarity, 0.10),
        (Factor::SectorTrend, 0.15),
        (Factor::SignalMatch, 0.10),
        (Factor::CycleTendency, 0.20),
    ])
}
