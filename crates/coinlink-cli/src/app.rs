//! Startup and shutdown of the kiosk.

use std::sync::Arc;

use anyhow::Context;
use coinlink_core::{CommandRunner, SystemRunner};
use coinlink_engine::{
    AccessController, Collaborators, CoinListener, ConnectivityMonitor, NotificationHub,
    RebootCommand, TimeManager, Workers,
};
use coinlink_hardware::{GpioLine, GpioRelayBank, PulseDecoder};
use coinlink_network::{Enforcer, EnforcerConfig};
use coinlink_storage::{Database, FileSettingsStore, SqlitePersistence};
use tracing::{info, warn};

use crate::cli::Cli;
use crate::shutdown::wait_for_shutdown_signal;

pub struct Kiosk {
    db: Database,
    controller: Arc<AccessController>,
    workers: Workers,
}

impl Kiosk {
    /// Bring everything up in dependency order: storage, sessions, packet
    /// filter, notifications, GPIO, workers.
    pub async fn start(cli: &Cli) -> anyhow::Result<Self> {
        let db = Database::open(&cli.database)
            .await
            .with_context(|| format!("opening database {}", cli.database.display()))?;
        let persistence = Arc::new(SqlitePersistence::new(&db)?);
        let settings_store = Arc::new(FileSettingsStore::new(&cli.settings));

        let runner: Arc<dyn CommandRunner> = Arc::new(SystemRunner);
        let config = EnforcerConfig::default()
            .with_interfaces(&cli.lan, &cli.wan)
            .with_portal_ip(cli.portal_ip);
        let enforcer = Arc::new(Enforcer::new(runner.clone(), config));
        if cli.skip_firewall_init {
            warn!("skipping packet filter bootstrap, stale rules stay until devices are re-enforced");
        } else {
            enforcer
                .initialize()
                .context("bootstrapping packet filter")?;
        }

        let mut gate = GpioRelayBank::new(runner.clone(), cli.relay_pins.clone());
        if let Err(e) = gate.setup() {
            warn!(error = %e, "slot gate unavailable");
        }

        let (notifier, hub) = NotificationHub::channel();
        tokio::spawn(hub.run());

        let controller = AccessController::start(Collaborators {
            persistence,
            settings_store,
            enforcer,
            notifier: Arc::new(notifier),
            gate: Box::new(gate),
            system: Arc::new(RebootCommand::new(runner.clone())),
        })
        .context("loading sessions and settings")?;
        let controller = Arc::new(controller);
        controller.suspend_connected_on_startup();

        let workers = spawn_workers(&controller, runner, &cli.coin_pin)?;
        info!(sessions = controller.store().len(), workers = workers.len(), "kiosk running");

        Ok(Self {
            db,
            controller,
            workers,
        })
    }

    /// Run until a shutdown signal, then stop workers and flush state.
    pub async fn run(self) -> anyhow::Result<()> {
        wait_for_shutdown_signal().await?;

        let Self {
            db,
            controller,
            workers,
        } = self;
        tokio::task::spawn_blocking(move || workers.stop()).await?;

        let flushed = controller.store().persist_connected();
        controller.slot().release();
        info!(flushed, "sessions flushed");

        drop(controller);
        db.close().await;
        Ok(())
    }
}

fn spawn_workers(
    controller: &Arc<AccessController>,
    runner: Arc<dyn CommandRunner>,
    coin_pin: &str,
) -> anyhow::Result<Workers> {
    let mut workers = Workers::new();

    let line = GpioLine::new(runner, coin_pin);
    match line.setup() {
        Ok(()) => {
            let decoder = PulseDecoder::new(line).with_cancel(workers.shutdown_flag());
            let listener = CoinListener::new(decoder, controller.clone());
            workers.spawn("coin-listener", move |shutdown| listener.run(shutdown))?;
        }
        Err(e) => warn!(pin = coin_pin, error = %e, "coin line unavailable, not accepting coins"),
    }

    let time = TimeManager::new(controller.clone());
    workers.spawn("time-manager", move |shutdown| time.run(shutdown))?;

    let monitor = ConnectivityMonitor::new(controller.clone());
    workers.spawn("connectivity-monitor", move |shutdown| monitor.run(shutdown))?;

    Ok(workers)
}
