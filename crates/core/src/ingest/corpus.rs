use crate::domain::report::{Report, ReportCorpus};
use crate::time::report_month::{months_between, parse_report_month};
use anyhow::Context;

/// Parses a corpus document and puts its reports in month order.
///
/// Missing fields read as empty; only malformed JSON is an error.
pub fn parse_corpus(json: &str) -> anyhow::Result<ReportCorpus> {
    let mut corpus: ReportCorpus =
        serde_json::from_str(json).context("report corpus is not valid JSON")?;
    ensure_chronological(&mut corpus.reports);
    Ok(corpus)
}

/// Stably sorts reports by `report_month` if needed and logs anomalies (unparseable
/// months, duplicates, gaps). Never fails.
pub fn ensure_chronological(reports: &mut [Report]) {
    let sorted = reports
        .windows(2)
        .all(|w| w[0].report_month <= w[1].report_month);
    if !sorted {
        tracing::warn!(reports = reports.len(), "reports out of month order; sorting");
        reports.sort_by(|a, b| a.report_month.cmp(&b.report_month));
    }

    let mut previous = None;
    for report in reports.iter() {
        let month = match parse_report_month(&report.report_month) {
            Ok(m) => m,
            Err(err) => {
                tracing::warn!(
                    source_file = %report.source_file,
                    error = %err,
                    "report has no usable month"
                );
                continue;
            }
        };
        if let Some(prev) = previous {
            match months_between(prev, month) {
                0 => tracing::warn!(month = %report.report_month, "duplicate report month"),
                1 => {}
                gap => tracing::warn!(month = %report.report_month, gap, "gap in report months"),
            }
        }
        previous = Some(month);
    }
}
