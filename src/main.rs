use color_eyre::{eyre::eyre, Result};
use modepilot::config::{Config, PlatformBackend, LOG_LEVEL_ENV};
use modepilot::device::{DevicePlatform, GilrsPlatform, SimulatedPlatform, SimulatedPlatformHandle};
use modepilot::host::{HostCommand, SimulatedHost, TracingNotificationSink};
use modepilot::runtime::{spawn_command_reader, HostLoop};
use modepilot::session::ControllerSession;
use std::rc::Rc;
use std::io::BufReader;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn, Level};
use tracing_subscriber::FmtSubscriber;

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    setup()?;

    let path = Config::default_path();
    let config = Config::ensure_default(&path)
        .await
        .map_err(|e| eyre!("Failed to load configuration from {}: {}", path.display(), e))?;
    let override_level = std::env::var(LOG_LEVEL_ENV).ok();
    setup_logging_env(config.logging.effective_level(override_level.as_deref()));
    info!("Configuration loaded from {}", path.display());

    let (platform, devices) = build_platform(&config);
    let host = Rc::new(SimulatedHost::default());
    let cancel = CancellationToken::new();
    let commands = spawn_command_reader(BufReader::new(std::io::stdin()));
    spawn_ctrl_c_handler(cancel.clone());

    let session = ControllerSession::create(
        &config.session_settings(),
        platform,
        host.clone(),
        Rc::new(TracingNotificationSink),
    );

    match session.start() {
        Ok(session) => {
            let host_loop = HostLoop::new(&session, &host, devices, config.runtime.clone());
            let exit = host_loop.run(commands, cancel.clone()).await;
            debug!("Host loop exited: {:?}", exit);
            session.shutdown();
        }
        Err(e) => {
            error!("{}; controller support disabled for this run", e);
            run_inert(&host, commands, cancel.clone()).await;
        }
    }

    cancel.cancel();
    info!("Goodbye");
    Ok(())
}

fn setup() -> Result<()> {
    if std::env::var("RUST_LIB_BACKTRACE").is_err() {
        std::env::set_var("RUST_LIB_BACKTRACE", "0")
    }
    color_eyre::install()?;
    Ok(())
}

fn setup_logging_env(level: Level) {
    FmtSubscriber::builder()
        .with_max_level(level)
        .with_target(false)
        .with_thread_ids(true)
        .with_file(true)
        .with_line_number(true)
        .pretty()
        .init();
}

fn build_platform(config: &Config) -> (Box<dyn DevicePlatform>, Option<SimulatedPlatformHandle>) {
    let configurations = config.platform.configuration_handles();
    match config.platform.backend {
        PlatformBackend::Gilrs => {
            info!("Using gilrs controller backend");
            (Box::new(GilrsPlatform::new(configurations)), None)
        }
        PlatformBackend::Simulated => {
            info!("Using simulated controller backend");
            let platform = SimulatedPlatform::new(configurations);
            let handle = platform.handle();
            (Box::new(platform), Some(handle))
        }
    }
}

fn spawn_ctrl_c_handler(cancel: CancellationToken) {
    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => {
                info!("Ctrl-C received, shutting down");
                cancel.cancel();
            }
            Err(e) => warn!("Unable to listen for Ctrl-C: {}", e),
        }
    });
}

// Host keeps running without controller support
async fn run_inert(
    host: &SimulatedHost,
    mut commands: mpsc::Receiver<HostCommand>,
    cancel: CancellationToken,
) {
    loop {
        let command = tokio::select! {
            _ = cancel.cancelled() => return,
            command = commands.recv() => command,
        };
        match command {
            Some(HostCommand::Quit) => return,
            Some(command) => {
                if let Some(event) = host.apply(command) {
                    debug!("Ignoring {:?}, controller support disabled", event);
                }
            }
            None => cancel.cancelled().await,
        }
    }
}
