//! One-shot and watch-mode entry points.

use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::address::{AddressDiscovery, ResolvedAddresses, RouteDiscovery};
use crate::config::Config;
use crate::error::WatchdogError;
use crate::generator::{GenerationReport, OutputLayout, ZoneSetGenerator};
use crate::metrics;
use crate::reload::{self, ReloadTrigger};
use crate::source::SpecSource;
use crate::watcher::ChangeWatcher;

/// Zone generator service.
pub struct Watchdog {
    config: Config,
    addresses: ResolvedAddresses,
    reload: Box<dyn ReloadTrigger>,
}

impl Watchdog {
    /// Create a service with already-resolved addresses and reload trigger.
    pub fn new(config: Config, addresses: ResolvedAddresses, reload: Box<dyn ReloadTrigger>) -> Self {
        Self {
            config,
            addresses,
            reload,
        }
    }

    /// Resolve addresses through `discovery` and build the reload trigger
    /// from configuration.
    pub fn from_config(config: Config, discovery: &dyn AddressDiscovery) -> Self {
        let addresses = ResolvedAddresses::resolve(&config.addresses, discovery);
        let reload = reload::from_config(&config.reload);
        Self::new(config, addresses, reload)
    }

    /// [`Watchdog::from_config`] with routing-table discovery.
    pub fn with_route_discovery(config: Config) -> Self {
        Self::from_config(config, &RouteDiscovery)
    }

    /// Configuration in use.
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Resolved addresses shared by every regeneration.
    pub fn addresses(&self) -> &ResolvedAddresses {
        &self.addresses
    }

    fn generator(&self) -> ZoneSetGenerator {
        ZoneSetGenerator::new(OutputLayout::from(&self.config.paths), self.addresses.clone())
    }

    /// Load `source`, regenerate once, then trigger a reload.
    ///
    /// A reload failure is returned after the zone set has been written.
    pub async fn run_once(&self, source: &SpecSource) -> Result<GenerationReport, WatchdogError> {
        info!(%source, "Generating zone set");
        let timer = metrics::Timer::start();
        let spec = source.load().await.inspect_err(|e| {
            metrics::record_regeneration_error(e, timer.elapsed());
        })?;
        let report = self.generator().generate_today(&spec)?;
        reload::run(self.reload.as_ref())?;
        Ok(report)
    }

    /// Watch the configured zones file until `shutdown` is cancelled.
    pub async fn watch(self, shutdown: CancellationToken) -> Result<(), WatchdogError> {
        let generator = self.generator();
        let watcher = ChangeWatcher::new(&self.config.paths.zones_file, generator, self.reload);
        watcher.run(shutdown).await
    }
}

/// Token cancelled on Ctrl-C or SIGTERM.
pub fn shutdown_on_signals() -> CancellationToken {
    let token = CancellationToken::new();
    let trigger = token.clone();

    tokio::spawn(async move {
        wait_for_signal().await;
        info!("Shutdown signal received");
        trigger.cancel();
    });

    token
}

#[cfg(unix)]
async fn wait_for_signal() {
    use tokio::signal::unix::{signal, SignalKind};

    let mut term = match signal(SignalKind::terminate()) {
        Ok(term) => term,
        Err(e) => {
            warn!("Could not install SIGTERM handler: {}", e);
            let _ = tokio::signal::ctrl_c().await;
            return;
        }
    };

    tokio::select! {
        _ = tokio::signal::ctrl_c() => {}
        _ = term.recv() => {}
    }
}

#[cfg(not(unix))]
async fn wait_for_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!("Could not listen for Ctrl-C: {}", e);
    }
}
