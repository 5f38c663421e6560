use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

pub const SECTION_FUTURE_POLICY: &str = "future_policy";
pub const SECTION_OPERATION_REVIEW: &str = "operation_review";

/// A fund's extracted monthly report as delivered by the ingestion side.
///
/// Extraction quality varies, so every field defaults when absent: a report with no
/// holdings or no keyword counts is still a valid member of the corpus.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Report {
    #[serde(default)]
    pub source_file: String,
    /// Sortable `YYYY-MM` key.
    #[serde(default)]
    pub report_month: String,
    #[serde(default)]
    pub meta: ReportMeta,
    #[serde(default)]
    pub sections: BTreeMap<String, String>,
    #[serde(default)]
    pub signals: Signals,
    #[serde(default)]
    pub theme_keywords: BTreeMap<String, ThemeKeywordHit>,
    /// Ordered by ascending rank.
    #[serde(default)]
    pub holdings: Vec<Holding>,
    #[serde(default)]
    pub performance: Performance,
    #[serde(default)]
    pub quality: ExtractionQuality,
}

impl Report {
    pub fn section(&self, key: &str) -> &str {
        self.sections.get(key).map(String::as_str).unwrap_or("")
    }

    /// Holding names in rank order, skipping rows whose name could not be extracted.
    pub fn holding_names(&self) -> impl Iterator<Item = &str> {
        self.holdings
            .iter()
            .map(|h| h.name.as_str())
            .filter(|n| !n.is_empty())
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ReportMeta {
    #[serde(default)]
    pub report_date: String,
    #[serde(default)]
    pub nav_date: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Signals {
    #[serde(default)]
    pub positive: Vec<String>,
    #[serde(default)]
    pub cautious: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ThemeKeywordHit {
    #[serde(default)]
    pub count: u64,
    #[serde(default)]
    pub found_keywords: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Holding {
    #[serde(default)]
    pub rank: u32,
    /// Normalized canonical name.
    #[serde(default)]
    pub name: String,
    /// Portfolio weight as printed in the report (e.g. `"8.2"`).
    #[serde(default)]
    pub weight: String,
    #[serde(default)]
    pub sector: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Performance {
    #[serde(default)]
    pub monthly_return: String,
    #[serde(default)]
    pub nav: String,
    #[serde(default)]
    pub benchmark_info: String,
}

/// Extraction diagnostics; carried through untouched.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ExtractionQuality {
    #[serde(default)]
    pub extraction_success: bool,
    #[serde(default)]
    pub issues: Vec<String>,
    #[serde(default)]
    pub extracted_fields: Vec<String>,
    #[serde(default)]
    pub missing_fields: Vec<String>,
}

pub const DEFAULT_FUND_NAME: &str = "情報エレクトロニクスファンド";
pub const DEFAULT_MANAGEMENT_COMPANY: &str = "野村アセットマネジメント";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReportCorpus {
    #[serde(default = "default_fund_name")]
    pub fund_name: String,
    #[serde(default = "default_management_company")]
    pub management_company: String,
    #[serde(default)]
    pub reports: Vec<Report>,
}

impl Default for ReportCorpus {
    fn default() -> Self {
        Self {
            fund_name: default_fund_name(),
            management_company: default_management_company(),
            reports: Vec::new(),
        }
    }
}

fn default_fund_name() -> String {
    DEFAULT_FUND_NAME.to_string()
}

fn default_management_company() -> String {
    DEFAULT_MANAGEMENT_COMPANY.to_string()
}
