use anyhow::Context;
use clap::Parser;
use fundscope_core::domain::backtest::BacktestReport;
use fundscope_core::params::AnalysisParams;
use tokio::io::AsyncWriteExt;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Debug, Parser)]
#[command(name = "fundscope_worker")]
struct Args {
    /// Report corpus JSON. Falls back to REPORTS_PATH.
    #[arg(long)]
    reports: Option<String>,

    /// Analysis parameter overrides (JSON). Falls back to ANALYSIS_PARAMS_PATH, then built-in defaults.
    #[arg(long)]
    params: Option<String>,

    /// Output path for the analysis JSON. Falls back to ANALYSIS_OUTPUT_PATH, then stdout.
    #[arg(long)]
    output: Option<String>,

    /// Evaluate backtest cutoffs in parallel.
    #[arg(long)]
    parallel: bool,

    /// Run the full analysis but do not write the result.
    #[arg(long)]
    dry_run: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    let settings = fundscope_core::config::Settings::from_env()?;
    let _sentry_guard = init_sentry(&settings);

    tracing_subscriber::registry()
        .with(EnvFilter::from_default_env())
        .with(tracing_subscriber::fmt::layer())
        .with(sentry_tracing::layer())
        .init();

    let args = Args::parse();

    if let Err(err) = run(&settings, args).await {
        sentry_anyhow::capture_anyhow(&err);
        tracing::error!(error = %err, "analysis run failed");
        return Err(err);
    }
    Ok(())
}

async fn run(settings: &fundscope_core::config::Settings, args: Args) -> anyhow::Result<()> {
    let reports_path = match args.reports.as_deref() {
        Some(p) => p,
        None => settings.require_reports_path()?,
    };

    let mut params = match args.params.as_deref().or(settings.analysis_params_path.as_deref()) {
        Some(path) => {
            let raw = tokio::fs::read_to_string(path)
                .await
                .with_context(|| format!("read analysis params {path} failed"))?;
            AnalysisParams::from_json_str(&raw)
                .with_context(|| format!("invalid analysis params in {path}"))?
        }
        None => AnalysisParams::default(),
    };
    if args.parallel {
        params.backtest.parallel = true;
    }
    params.validate()?;

    let raw = tokio::fs::read_to_string(reports_path)
        .await
        .with_context(|| format!("read report corpus {reports_path} failed"))?;
    let corpus = fundscope_core::ingest::corpus::parse_corpus(&raw)
        .with_context(|| format!("invalid report corpus in {reports_path}"))?;

    tracing::info!(
        reports = corpus.reports.len(),
        fund = %corpus.fund_name,
        params_version = %params.constants.version,
        "loaded report corpus"
    );

    let output = fundscope_core::pipeline::run_analysis(&corpus, &params, chrono::Utc::now());

    for candidate in output.candidates.iter().take(5) {
        tracing::info!(
            name = %candidate.name,
            score = candidate.total_score,
            confidence = ?candidate.confidence,
            held = candidate.is_current_holding,
            "top candidate"
        );
    }
    match &output.backtest {
        BacktestReport::Completed { summary, .. } => {
            for (key, s) in summary {
                tracing::info!(
                    k = %key,
                    hit_rate = s.avg_hit_rate,
                    precision = s.avg_precision,
                    recall = s.avg_recall,
                    periods = s.total_periods,
                    "backtest summary"
                );
            }
        }
        BacktestReport::InsufficientData { message, .. } => {
            tracing::warn!(%message, "backtest skipped");
        }
    }

    if args.dry_run {
        tracing::info!(run_id = %output.run_id, dry_run = true, "analysis complete (dry-run)");
        return Ok(());
    }

    let json = serde_json::to_string_pretty(&output).context("serialize analysis output failed")?;
    match args.output.as_deref().or(settings.analysis_output_path.as_deref()) {
        Some(path) => {
            tokio::fs::write(path, json.as_bytes())
                .await
                .with_context(|| format!("write analysis output {path} failed"))?;
            tracing::info!(run_id = %output.run_id, %path, "wrote analysis output");
        }
        None => {
            let mut stdout = tokio::io::stdout();
            stdout.write_all(json.as_bytes()).await?;
            stdout.write_all(b"\n").await?;
            stdout.flush().await?;
        }
    }

    Ok(())
}

fn init_sentry(settings: &fundscope_core::config::Settings) -> Option<sentry::ClientInitGuard> {
    let dsn = settings.sentry_dsn.as_deref()?;
    Some(sentry::init((
        dsn,
        sentry::ClientOptions {
            release: sentry::release_name!(),
            ..Default::default()
        },
    )))
}
