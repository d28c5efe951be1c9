//! gate-zones binary entry point.

use clap::Parser;
use gate_zones::service::shutdown_on_signals;
use gate_zones::{telemetry, Config, PathsConfig, SpecSource, Watchdog, WatchdogError};
use std::path::PathBuf;
use tracing::{error, info};

/// Generate BIND zones from a pattern-based zone specification.
#[derive(Parser, Debug)]
#[command(name = "gate-zones")]
#[command(version, about, long_about = None)]
struct Args {
    /// Optional settings file (TOML).
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Read and write everything in a working directory instead of the
    /// system BIND layout. Implies --skip-refresh.
    #[arg(long)]
    cwd: bool,

    /// Working directory used with --cwd (defaults to the current directory).
    #[arg(long, requires = "cwd")]
    dir: Option<PathBuf>,

    /// Fetch the zone specification from an HTTP(S) URL.
    #[arg(long)]
    remote: Option<String>,

    /// Keep running and regenerate whenever the zone specification changes.
    #[arg(long)]
    watchdog: bool,

    /// Do not reload the nameserver after regenerating.
    #[arg(long)]
    skip_refresh: bool,
}

fn load_config(args: &Args) -> Result<Config, Box<dyn std::error::Error>> {
    let mut builder = config::Config::builder();
    for (key, value) in gate_zones::config::legacy_env_defaults(|name| std::env::var(name).ok()) {
        builder = builder.set_default(key, value)?;
    }
    if let Some(path) = &args.config {
        builder = builder.add_source(config::File::from(path.clone()));
    }
    let mut config: Config = builder
        .add_source(
            config::Environment::with_prefix("GATE_ZONES")
                .separator("__")
                .try_parsing(true),
        )
        .build()?
        .try_deserialize()?;

    if args.cwd {
        let dir = match &args.dir {
            Some(dir) => dir.clone(),
            None => std::env::current_dir()?,
        };
        config.paths = PathsConfig {
            registered_zone_dir: config.paths.registered_zone_dir.take(),
            ..PathsConfig::working_dir(&dir)
        };
        config.reload.skip = true;
    }
    if args.skip_refresh {
        config.reload.skip = true;
    }

    Ok(config)
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    if args.watchdog && args.remote.is_some() {
        return Err(WatchdogError::Config("cannot watch a remote zone specification".into()).into());
    }

    // Load configuration
    let config = load_config(&args)?;

    // Initialize telemetry
    telemetry::init(&config.telemetry).map_err(|e| e as Box<dyn std::error::Error>)?;

    let source = match &args.remote {
        Some(url) => SpecSource::remote(url)?,
        None => SpecSource::File(config.paths.zones_file.clone()),
    };

    info!(
        source = %source,
        zone_dir = %config.paths.zone_dir.display(),
        conf_file = %config.paths.conf_file.display(),
        watch = args.watchdog,
        reload = !config.reload.skip,
        "Starting gate-zones"
    );

    let service = Watchdog::with_route_discovery(config);

    if args.watchdog {
        let shutdown = shutdown_on_signals();
        if let Err(e) = service.watch(shutdown).await {
            error!("Watcher error: {}", e);
            return Err(e.into());
        }
        info!("gate-zones shutdown complete");
        return Ok(());
    }

    match service.run_once(&source).await {
        Ok(report) => {
            info!(
                zones = report.zones_written,
                blocked = report.blocked_roots,
                "Zone generation complete"
            );
            Ok(())
        }
        Err(e) => {
            error!("Zone generation failed: {}", e);
            Err(e.into())
        }
    }
}
