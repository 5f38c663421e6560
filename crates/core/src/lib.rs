pub mod analysis;
pub mod backtest;
pub mod domain;
pub mod ingest;
pub mod params;
pub mod pipeline;
pub mod scoring;
pub mod time;

pub mod config {
    use anyhow::Context;

    #[derive(Debug, Clone)]
    pub struct Settings {
        pub reports_path: Option<String>,
        pub analysis_params_path: Option<String>,
        pub analysis_output_path: Option<String>,
        pub sentry_dsn: Option<String>,
    }

    impl Settings {
        pub fn from_env() -> anyhow::Result<Self> {
            Ok(Self {
                reports_path: non_empty_var("REPORTS_PATH"),
                analysis_params_path: non_empty_var("ANALYSIS_PARAMS_PATH"),
                analysis_output_path: non_empty_var("ANALYSIS_OUTPUT_PATH"),
                sentry_dsn: non_empty_var("SENTRY_DSN"),
            })
        }

        pub fn require_reports_path(&self) -> anyhow::Result<&str> {
            self.reports_path
                .as_deref()
                .context("REPORTS_PATH (or --reports) is required")
        }
    }

    fn non_empty_var(key: &str) -> Option<String> {
        std::env::var(key).ok().filter(|v| !v.trim().is_empty())
    }
}
