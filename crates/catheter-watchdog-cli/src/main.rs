//! `catheter-watchdog`: discover catheter patients and monitor their
//! change schedule.

use std::path::PathBuf;

use anyhow::Context;
use catheter_watchdog_core::{
    CatheterDataSource, ConsoleNotifier, MockDataSource, MonitoringMode, SystemClock, Watchdog,
    WatchdogConfig, WatchdogResult,
};
use catheter_watchdog_fhir::FhirClient;
use clap::Parser;
use tokio::sync::watch;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Debug, Parser)]
#[command(name = "catheter-watchdog", version, about = "Flag patients overdue for a catheter change")]
struct Cli {
    /// TOML configuration file
    #[arg(long, short)]
    config: Option<PathBuf>,

    /// FHIR R4 base URL
    #[arg(long)]
    fhir_server: Option<String>,

    /// Protocol change interval in hours
    #[arg(long)]
    interval_hours: Option<f64>,

    /// Borderline warning window in hours (0 disables)
    #[arg(long)]
    borderline_hours: Option<f64>,

    /// Hours between checks of the same patient
    #[arg(long)]
    reschedule_hours: Option<u64>,

    /// SNOMED CT code device types must carry (e.g. 303620002)
    #[arg(long)]
    device_code: Option<String>,

    /// Check every patient once and exit
    #[arg(long, conflicts_with = "continuous")]
    once: bool,

    /// Keep monitoring until interrupted
    #[arg(long)]
    continuous: bool,

    /// Use built-in demo patients instead of a FHIR server
    #[arg(long)]
    mock: bool,

    /// Log filter when RUST_LOG is unset
    #[arg(long, default_value = "info")]
    log_level: String,
}

impl Cli {
    fn apply(&self, config: &mut WatchdogConfig) {
        if let Some(server) = &self.fhir_server {
            config.fhir.server = server.clone();
        }
        if let Some(hours) = self.interval_hours {
            config.change_interval_hours = hours;
        }
        if let Some(hours) = self.borderline_hours {
            config.borderline_window_hours = hours;
        }
        if let Some(hours) = self.reschedule_hours {
            config.reschedule_interval_hours = hours;
        }
        if let Some(code) = &self.device_code {
            config.fhir.device_code = Some(code.clone());
        }
        if self.once {
            config.mode = MonitoringMode::SinglePass;
        } else if self.continuous {
            config.mode = MonitoringMode::Continuous;
        }
    }
}

fn load_config(cli: &Cli) -> WatchdogResult<WatchdogConfig> {
    let mut config = match &cli.config {
        Some(path) => WatchdogConfig::load(path)?,
        None => WatchdogConfig::default(),
    };
    config.apply_env()?;
    cli.apply(&mut config);
    config.validate()?;
    Ok(config)
}

fn init_logging(default_filter: &str) -> anyhow::Result<()> {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(default_filter))
        .context("invalid log filter")?;

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init()
        .map_err(|e| anyhow::anyhow!(e))
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_logging(&cli.log_level)?;

    let config = load_config(&cli).context("failed to load configuration")?;
    info!(
        server = %config.fhir.server,
        interval_hours = config.change_interval_hours,
        mode = ?config.mode,
        "starting catheter watchdog"
    );

    let source: Box<dyn CatheterDataSource> = if cli.mock {
        Box::new(MockDataSource::ward_demo(chrono::Utc::now()))
    } else {
        Box::new(FhirClient::new(&config.fhir).context("failed to create FHIR client")?)
    };

    let (stop_tx, stop_rx) = watch::channel(false);
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("interrupt received, finishing current check");
            let _ = stop_tx.send(true);
        }
    });

    let notifier = ConsoleNotifier;
    let clock = SystemClock;
    let watchdog = Watchdog::new(source.as_ref(), &notifier, &clock, config.workflow_settings());

    let report = watchdog.run(stop_rx).await;
    if report.discovered == 0 {
        println!("No patients with catheter data found.");
    }

    info!(
        patients = report.discovered,
        cycles = report.cycles,
        cancelled = report.cancelled,
        "watchdog finished"
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_no_required_arguments() {
        let cli = Cli::try_parse_from(["catheter-watchdog"]).unwrap();
        assert!(!cli.once);
        assert!(!cli.mock);
        assert_eq!(cli.log_level, "info");
    }

    #[test]
    fn test_flags_override_config() {
        let cli = Cli::try_parse_from([
            "catheter-watchdog",
            "--fhir-server",
            "http://localhost:8080/fhir",
            "--interval-hours",
            "48",
            "--borderline-hours",
            "0",
            "--device-code",
            "303620002",
            "--once",
        ])
        .unwrap();

        let mut config = WatchdogConfig::default();
        cli.apply(&mut config);

        assert_eq!(config.fhir.server, "http://localhost:8080/fhir");
        assert_eq!(config.change_interval_hours, 48.0);
        assert_eq!(config.borderline_window_hours, 0.0);
        assert_eq!(config.fhir.device_code.as_deref(), Some("303620002"));
        assert_eq!(config.mode, MonitoringMode::SinglePass);
    }

    #[test]
    fn test_once_conflicts_with_continuous() {
        assert!(Cli::try_parse_from(["catheter-watchdog", "--once", "--continuous"]).is_err());
    }
}
