use std::fmt::Write as _;

use anyhow::{Context, Result};
use clap::ValueEnum;

use pagerepro_container::DockerRuntime;
use pagerepro_cql::ScyllaConnector;
use pagerepro_engine::{NoPause, ReproductionDriver, RunReport, TeardownStatus};

use crate::prompt::ConsolePrompt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    Text,
    Json,
}

/// Execute the `run` command: reproduce, print the report, and fail the
/// process on any fatal error.
pub async fn execute(no_pause: bool, format: OutputFormat) -> Result<()> {
    let runtime = DockerRuntime::connect_local().context("Failed to connect to Docker")?;

    let result = if no_pause {
        ReproductionDriver::from_env(ScyllaConnector, runtime, NoPause)?
            .run()
            .await
    } else {
        ReproductionDriver::from_env(ScyllaConnector, runtime, ConsolePrompt)?
            .run()
            .await
    };

    match result {
        Ok(report) => print_report(&report, format),
        Err(failure) => {
            print_report(&failure.report, format)?;
            Err(anyhow::Error::new(failure.error).context("Reproduction failed"))
        }
    }
}

fn print_report(report: &RunReport, format: OutputFormat) -> Result<()> {
    match format {
        OutputFormat::Text => print!("{}", render_text(report)),
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(report)?),
    }
    Ok(())
}

fn render_text(report: &RunReport) -> String {
    let mut out = String::new();
    let outcome = report
        .outcome
        .map_or_else(|| "failed".to_string(), |o| o.to_string());
    let _ = writeln!(out, "Reproduction {outcome}.");
    let port = report
        .host_port
        .map_or_else(|| "unassigned".to_string(), |p| p.to_string());
    let _ = writeln!(
        out,
        "  Container:       {} (host port {port})",
        report.container_name
    );
    let _ = writeln!(out, "  Keyspace:        {}", report.keyspace);
    let _ = writeln!(out, "  Rows seeded:     {}", report.seeded.len());

    if !report.full_scan.is_empty() {
        let _ = writeln!(out, "  Query all:       {} rows", report.full_scan.len());
        for record in &report.full_scan {
            let _ = writeln!(out, "    {record}");
        }
    }
    if !report.single_row.is_empty() {
        let _ = writeln!(
            out,
            "  Query 1:         {} (continuation {} bytes)",
            report.single_row[0], report.continuation_len
        );
    }
    if let Some(count) = report.repeat_scan_count {
        let _ = writeln!(out, "  Query all again: {count} rows");
    }
    if let Some(defect) = &report.defect {
        let _ = writeln!(out, "  Query next 5:    {}", defect.message);
        let _ = writeln!(out, "  Server logs:     {}", defect.logs_hint);
    } else if !report.resumed.is_empty() {
        let _ = writeln!(out, "  Query next 5:    {} rows", report.resumed.len());
        for record in &report.resumed {
            let _ = writeln!(out, "    {record}");
        }
    }

    let teardown = match &report.teardown {
        TeardownStatus::NotRun => "not run".to_string(),
        TeardownStatus::NothingToRemove => "nothing to remove".to_string(),
        TeardownStatus::Removed { id } => format!("removed {}", short_id(id)),
        TeardownStatus::Failed { message } => format!("FAILED ({message})"),
    };
    let _ = writeln!(out, "  Teardown:        {teardown}");
    out
}

fn short_id(id: &str) -> &str {
    id.get(..12).unwrap_or(id)
}

#[cfg(test)]
mod tests {
    use pagerepro_engine::{DefectNotice, EnvironmentConfig, Outcome};
    use pagerepro_types::UserRecord;

    use super::*;

    fn report() -> RunReport {
        let mut report = RunReport::new(&EnvironmentConfig::default());
        report.host_port = Some(40123);
        report.outcome = Some(Outcome::DefectReproduced);
        report.full_scan = vec![
            UserRecord::new("allie", "smith", 22),
            UserRecord::new("bill", "smith", 31),
        ];
        report.single_row = vec![UserRecord::new("allie", "smith", 22)];
        report.continuation_len = 18;
        report.repeat_scan_count = Some(2);
        report.defect = Some(DefectNotice::new(
            "recreation",
            "server error: java.lang.NullPointerException",
        ));
        report.teardown = TeardownStatus::Removed {
            id: "0123456789abcdef".into(),
        };
        report
    }

    #[test]
    fn text_report_lists_scans_and_defect() {
        let text = render_text(&report());
        assert!(text.starts_with("Reproduction defect reproduced."));
        assert!(text.contains("recreation (host port 40123)"));
        assert!(text.contains("    bill smith, 31"));
        assert!(text.contains("allie smith, 22 (continuation 18 bytes)"));
        assert!(text.contains("java.lang.NullPointerException"));
        assert!(text.contains("docker logs recreation"));
        assert!(text.contains("removed 0123456789ab"));
    }

    #[test]
    fn failed_report_says_failed() {
        let mut report = RunReport::new(&EnvironmentConfig::default());
        report.teardown = TeardownStatus::NothingToRemove;
        let text = render_text(&report);
        assert!(text.starts_with("Reproduction failed."));
        assert!(text.contains("host port unassigned"));
        assert!(text.contains("nothing to remove"));
    }
}
