//! UCS Reconcile
//!
//! Correlates UCS Manager hardware with UCS Performance Manager devices by
//! hardware UUID and writes the results to disk.
//!
//! ```text
//! ucs-reconcile --config config.yaml --mode full
//! ucs-reconcile --mode devices            # device inventory only
//! ucs-reconcile --mode hardware           # reuse a saved device inventory
//! ucs-reconcile --report-month November   # also export CPU utilisation
//! ```

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use clap::Parser;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn, Level};
use tracing_subscriber::filter::Directive;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use ucs_reconcile::monitor::{self, CollectorConfig, ReportPeriod};
use ucs_reconcile::ucs::{FleetConfig, SessionConfig};
use ucs_reconcile::{
    DeviceCollector, PerformanceExporter, Pipeline, ReconcileOptions, Reconciler, ReportWriter,
    RouterClient, RunConfig, RunMode, UcsFleet,
};

// =============================================================================
// CLI Arguments
// =============================================================================

/// UCS Reconcile - match UCS Manager servers to UCS Performance Manager hosts
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Run file listing domains, the monitor and outputs
    #[arg(long, env = "RECONCILE_CONFIG", default_value = "config.yaml")]
    config: PathBuf,

    /// Run mode (full, devices, hardware)
    #[arg(long, env = "RECONCILE_MODE", default_value = "full")]
    mode: RunMode,

    /// UCS domains collected at the same time
    #[arg(long, env = "MAX_CONCURRENT_DOMAINS", default_value = "4")]
    max_concurrent_domains: usize,

    /// Device identity lookups in flight at once
    #[arg(long, env = "MAX_CONCURRENT_DEVICES", default_value = "8")]
    max_concurrent_devices: usize,

    /// Per-request timeout in seconds
    #[arg(long, env = "REQUEST_TIMEOUT_SECS", default_value = "30")]
    request_timeout_secs: u64,

    /// Overall deadline in seconds, after which collection stops
    #[arg(long, env = "RECONCILE_TIMEOUT_SECS")]
    timeout_secs: Option<u64>,

    /// Also report monitored hosts with no UCS counterpart
    #[arg(long, env = "INCLUDE_UNMANAGED")]
    include_unmanaged: bool,

    /// Export CPU utilisation for this month (name or number)
    #[arg(long, env = "REPORT_MONTH")]
    report_month: Option<String>,

    /// Year of the exported month (defaults to the current year)
    #[arg(long, env = "REPORT_YEAR")]
    report_year: Option<i32>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, env = "LOG_LEVEL", default_value = "info")]
    log_level: String,

    /// Output logs as JSON
    #[arg(long, env = "LOG_JSON")]
    log_json: bool,
}

// =============================================================================
// Main
// =============================================================================

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    init_logging(&args);

    info!("Starting UCS Reconcile");
    info!("  Config: {}", args.config.display());
    info!("  Mode: {}", args.mode);
    info!("  Max concurrent domains: {}", args.max_concurrent_domains);
    info!("  Max concurrent devices: {}", args.max_concurrent_devices);
    info!("  Include unmanaged: {}", args.include_unmanaged);

    let config = RunConfig::load(&args.config)
        .await
        .with_context(|| format!("loading {}", args.config.display()))?;

    let period = args
        .report_month
        .as_deref()
        .map(|month| ReportPeriod::parse(month, args.report_year))
        .transpose()?;

    let cancel = CancellationToken::new();
    spawn_cancellation(cancel.clone(), args.timeout_secs);

    let request_timeout = Duration::from_secs(args.request_timeout_secs);
    let reconciler = Reconciler::new(ReconcileOptions {
        include_unmanaged: args.include_unmanaged,
    });
    let writer = ReportWriter::new(config.output.clone());
    let mut pipeline = Pipeline::new(reconciler, writer, cancel.clone());

    let needs_monitor = args.mode != RunMode::Hardware;
    let needs_domains = args.mode != RunMode::Devices;

    let router = if needs_monitor {
        let credential = config.monitor_credential()?;
        let client = monitor::build_client(request_timeout)?;
        Some(Arc::new(RouterClient::new(client, &credential)))
    } else {
        None
    };

    let fleet = if needs_domains {
        let credentials = config.domain_credentials()?;
        info!("  Domains: {}", credentials.len());
        let fleet_config = FleetConfig {
            max_concurrent_domains: args.max_concurrent_domains,
            session: SessionConfig {
                request_timeout,
                ..Default::default()
            },
        };
        Some(UcsFleet::new(credentials, fleet_config)?)
    } else {
        None
    };

    if let Some(period) = period {
        match (&router, needs_domains) {
            (Some(router), true) => {
                info!("  Performance export: {} {}", period.month_name(), period.year);
                pipeline = pipeline.with_performance(PerformanceExporter::new(router.clone(), period));
            }
            _ => warn!("Performance export needs a full run, ignoring --report-month"),
        }
    }

    let collector = router.map(|router| {
        DeviceCollector::new(
            router,
            CollectorConfig {
                max_concurrent_details: args.max_concurrent_devices,
            },
        )
    });

    let summary = match (args.mode, collector, fleet) {
        (RunMode::Full, Some(collector), Some(fleet)) => {
            pipeline.run_full(&collector, &fleet).await?
        }
        (RunMode::Devices, Some(collector), _) => pipeline.run_devices_only(&collector).await?,
        (RunMode::Hardware, _, Some(fleet)) => pipeline.run_hardware_only(&fleet).await?,
        (mode, _, _) => anyhow::bail!("run mode {} is missing a collector", mode),
    };

    if cancel.is_cancelled() {
        warn!("Run was cancelled, reports may be partial");
    }
    info!(
        matched = summary.matched,
        unmatched = summary.unmatched,
        "UCS Reconcile finished"
    );
    Ok(())
}

/// Cancel the run on Ctrl-C or when the deadline passes.
fn spawn_cancellation(cancel: CancellationToken, timeout_secs: Option<u64>) {
    let on_signal = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Interrupt received, cancelling run");
            on_signal.cancel();
        }
    });

    if let Some(secs) = timeout_secs {
        tokio::spawn(async move {
            tokio::select! {
                _ = cancel.cancelled() => {}
                _ = tokio::time::sleep(Duration::from_secs(secs)) => {
                    warn!(timeout_secs = secs, "Deadline reached, cancelling run");
                    cancel.cancel();
                }
            }
        });
    }
}

// =============================================================================
// Logging Setup
// =============================================================================

fn init_logging(args: &Args) {
    let level = match args.log_level.to_lowercase().as_str() {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "info" => Level::INFO,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::INFO,
    };

    let mut filter = EnvFilter::from_default_env().add_directive(level.into());
    for directive in ["hyper=warn", "reqwest=warn", "rustls=warn"] {
        if let Ok(directive) = directive.parse::<Directive>() {
            filter = filter.add_directive(directive);
        }
    }

    if args.log_json {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().json())
            .init();
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().with_target(true))
            .init();
    }
}
