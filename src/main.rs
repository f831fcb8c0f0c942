//! controlhub - controller manager demo and diagnostics

use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::{debug, info, warn};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use controlhub::backend::{ControllerBackend, DeviceDescriptor, GamepadAxis, GamepadButton, QueuedBackend, VirtualPads};
use controlhub::controller::RumbleChannel;
use controlhub::diagnostics;
use controlhub::hid::{HidDevice, HidIdentifier};
use controlhub::paths::AppPaths;
use controlhub::persistence::ControllerConfigStore;
use controlhub::{BackendKind, ControllerEvent, ControllerManager, ManagerConfig};

/// Controller discovery and input normalization
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path to configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Device backend (virtual, gilrs, xinput); overrides the config
    #[arg(short, long)]
    backend: Option<BackendKind>,

    /// Log level (error, warn, info, debug, trace)
    #[arg(short, long, env = "LOG_LEVEL", default_value = "info")]
    log_level: String,

    /// Print connected controllers after discovery and exit
    #[arg(long)]
    diagnostics: bool,

    /// Print the config JSON schema and exit
    #[arg(long)]
    print_schema: bool,

    /// Stop after this many ticks (runs until Ctrl+C otherwise)
    #[arg(long)]
    ticks: Option<u64>,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load environment variables
    dotenvy::dotenv().ok();

    let args = Args::parse();

    if args.print_schema {
        println!("{}", ManagerConfig::json_schema()?);
        return Ok(());
    }

    let mut paths = AppPaths::detect();
    if let Some(config) = &args.config {
        paths = paths.with_config(config);
    }
    paths.ensure_directories()?;

    let _log_guard = init_logging(&args.log_level, &paths)?;

    info!("Starting controlhub v{}...", env!("CARGO_PKG_VERSION"));
    info!("Configuration file: {}", paths.config.display());

    let mut config = if paths.config.exists() {
        ManagerConfig::load(&paths.config).await?
    } else {
        info!("No config file, using defaults");
        ManagerConfig::default()
    };
    if let Some(backend) = args.backend {
        config.backend = backend;
    }

    let store_path = paths.store_path(&config);
    let store = ControllerConfigStore::load_or_default(&store_path).await?;
    info!("Controller store: {} ({} saved)", store_path.display(), store.len());

    let store = match config.backend {
        BackendKind::Virtual => {
            let pads = VirtualPads::new();
            let backend = QueuedBackend::from_source(pads);
            let demo = VirtualDemo::new(backend.inner());
            run(backend, config, store, &args, Some(demo)).await?
        },
        BackendKind::Gilrs => run_gilrs(config, store, &args).await?,
        BackendKind::Xinput => run_xinput(config, store, &args).await?,
    };

    store.save_to_file(&store_path).await?;
    info!("controlhub shutdown complete");
    Ok(())
}

#[cfg(feature = "gilrs")]
async fn run_gilrs(config: ManagerConfig, store: ControllerConfigStore, args: &Args) -> Result<ControllerConfigStore> {
    use controlhub::backend::gilrs_source::GilrsSource;

    let backend = QueuedBackend::from_source(GilrsSource::new()?);
    run(backend, config, store, args, None).await
}

#[cfg(not(feature = "gilrs"))]
async fn run_gilrs(_: ManagerConfig, _: ControllerConfigStore, _: &Args) -> Result<ControllerConfigStore> {
    anyhow::bail!("gilrs backend not compiled in (build with --features gilrs)")
}

#[cfg(feature = "xinput")]
async fn run_xinput(config: ManagerConfig, store: ControllerConfigStore, args: &Args) -> Result<ControllerConfigStore> {
    use controlhub::backend::xinput_source::XInputSource;
    use controlhub::backend::PolledBackend;

    let backend = PolledBackend::from_source(XInputSource::new()?);
    run(backend, config, store, args, None).await
}

#[cfg(not(feature = "xinput"))]
async fn run_xinput(_: ManagerConfig, _: ControllerConfigStore, _: &Args) -> Result<ControllerConfigStore> {
    anyhow::bail!("xinput backend not compiled in (build with --features xinput)")
}

/// Drive the manager at the configured tick rate; returns the updated store
async fn run<B: ControllerBackend>(
    backend: B,
    config: ManagerConfig,
    store: ControllerConfigStore,
    args: &Args,
    mut demo: Option<VirtualDemo>,
) -> Result<ControllerConfigStore> {
    let tick_rate = config.tick_rate_hz;
    let mut manager = ControllerManager::new(backend, config).with_store(store);

    manager.add_listener(|event, controller| match event {
        ControllerEvent::Connected {
            hotplug, new_controller, ..
        } => info!(
            "🎮 {} connected (hotplug: {}, first time: {})",
            controller.name(),
            hotplug,
            new_controller
        ),
        ControllerEvent::Disconnected { .. } => info!("🔌 {} disconnected", controller.name()),
        ControllerEvent::StateUpdated { .. } => {},
    });

    if let Some(demo) = demo.as_mut() {
        demo.plug_in();
    }
    manager.discover_controllers();
    info!("Discovered {} controller(s)", manager.controller_count());

    if args.diagnostics {
        diagnostics::print_controllers(&manager);
        manager.close();
        return Ok(manager.store().clone());
    }

    let mut interval = tokio::time::interval(Duration::from_secs_f64(1.0 / f64::from(tick_rate)));
    let shutdown = shutdown_signal();
    tokio::pin!(shutdown);

    let mut tick: u64 = 0;
    loop {
        if args.ticks.is_some_and(|limit| tick >= limit) {
            debug!("Tick limit reached");
            break;
        }

        tokio::select! {
            _ = interval.tick() => {
                if let Some(demo) = demo.as_mut() {
                    demo.step(tick);
                }
                manager.tick(false);
                tick += 1;
            }
            _ = &mut shutdown => {
                info!("Shutdown signal received, stopping tick loop");
                break;
            }
        }
    }

    info!("Shutting down after {} ticks...", tick);
    manager.close();
    Ok(manager.store().clone())
}

/// Scripted devices so the binary does something without hardware
struct VirtualDemo {
    pads: std::sync::Arc<parking_lot::Mutex<VirtualPads>>,
    dualsense: Option<u64>,
    stick: Option<u64>,
}

impl VirtualDemo {
    fn new(pads: std::sync::Arc<parking_lot::Mutex<VirtualPads>>) -> Self {
        Self {
            pads,
            dualsense: None,
            stick: None,
        }
    }

    fn plug_in(&mut self) {
        let mut pads = self.pads.lock();
        self.dualsense = Some(
            pads.connect(
                DeviceDescriptor::gamepad("DualSense Wireless Controller")
                    .with_hid(HidDevice::new(HidIdentifier::new(0x054C, 0x0CE6)))
                    .with_gyro()
                    .with_battery()
                    .with_rumble([RumbleChannel::Main, RumbleChannel::Triggers])
                    .with_touchpad(2),
            ),
        );
        self.stick = Some(pads.connect(DeviceDescriptor::joystick("Arcade Stick", 10, 2, 1)));
    }

    /// Sweep the trigger, tap south every second, replug the stick every ten
    fn step(&mut self, tick: u64) {
        let mut pads = self.pads.lock();

        if let Some(key) = self.dualsense {
            let phase = (tick % 120) as f32 / 120.0;
            pads.update_report(key, |report| {
                report.set_axis(GamepadAxis::RightTrigger, phase);
                report.set_button(GamepadButton::South, tick % 60 < 5);
            });
        }

        if tick > 0 && tick % 600 == 0 {
            match self.stick.take() {
                Some(key) => {
                    pads.disconnect(key);
                },
                None => {
                    self.stick = Some(pads.connect(DeviceDescriptor::joystick("Arcade Stick", 10, 2, 1)));
                },
            }
        }
    }
}

fn init_logging(level: &str, paths: &AppPaths) -> Result<WorkerGuard> {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(level));

    let file_appender = tracing_appender::rolling::daily(&paths.logs_dir, "controlhub.log");
    let (file_writer, guard) = tracing_appender::non_blocking(file_appender);

    tracing_subscriber::registry()
        .with(filter)
        .with(
            tracing_subscriber::fmt::layer()
                .with_target(false)
                .with_thread_ids(false)
                .with_thread_names(false),
        )
        .with(
            tracing_subscriber::fmt::layer()
                .json()
                .with_writer(file_writer),
        )
        .try_init()
        .context("Failed to initialize logging")?;

    Ok(guard)
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!("Failed to listen for Ctrl+C: {}", e);
        std::future::pending::<()>().await;
    }
}
