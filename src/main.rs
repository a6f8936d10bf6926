use std::process::ExitCode;
use std::sync::Arc;

use config_file::HeraldConfig;
use report::Reporter;
use report::http::HttpTransport;
use report::transport::{LogTransport, Transport};
use runtime::RuntimeSource;
use runtime::listener::EventListener;
use runtime::reconciler::Reconciler;
use state::Registry;
use tokio::sync::watch;

mod cli;
mod config_file;
mod report;
mod runtime;
mod signals;
mod state;

#[tokio::main]
async fn main() -> ExitCode {
    env_logger::init();

    let config = match HeraldConfig::try_init() {
        Ok(config) => config,
        Err(e) => {
            log::error!("Unable to read config: {e}");
            return ExitCode::FAILURE;
        }
    };

    if cli::get_cli_args().check {
        println!("{config:#?}");
        return ExitCode::SUCCESS;
    }

    let transport: Arc<dyn Transport> = match &config.control_plane {
        Some(control_plane) => match HttpTransport::new(control_plane, &config.cluster) {
            Ok(transport) => {
                log::info!("Reporting to {}", control_plane.endpoint);
                Arc::new(transport)
            }
            Err(e) => {
                log::error!("Unable to set up the control plane client: {e}");
                return ExitCode::FAILURE;
            }
        },
        None => {
            log::warn!("No control plane configured, state changes are only logged");
            Arc::new(LogTransport)
        }
    };

    let docker = match runtime::docker::connect() {
        Ok(docker) => docker,
        Err(e) => {
            log::error!("Unable to connect to the container runtime: {e}");
            return ExitCode::FAILURE;
        }
    };

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    if let Err(e) = signals::handle_shutdown(shutdown_tx) {
        log::error!("Unable to register signal handlers: {e}");
        return ExitCode::FAILURE;
    }

    let registry = Arc::new(Registry::new());
    let source = RuntimeSource::new(Arc::clone(&registry), config.labels.clone());

    let listener = EventListener::new(docker.clone(), source.clone());
    let reconciler = Reconciler::new(docker, source, config.reconcile_interval());
    let reporter = Reporter::new(registry, transport, config.report_interval());

    let listener = tokio::spawn(listener.run(shutdown_rx.clone()));
    let reconciler = tokio::spawn(reconciler.run(shutdown_rx.clone()));
    let reporter = tokio::spawn(reporter.run(shutdown_rx));

    let _ = sd_notify::notify(true, &[sd_notify::NotifyState::Ready]);
    log::info!("herald started for cluster {}", config.cluster);

    let (listener, reconciler, reporter) = tokio::join!(listener, reconciler, reporter);
    for result in [listener, reconciler, reporter] {
        if let Err(e) = result {
            log::error!("Background task failed: {e}");
            return ExitCode::FAILURE;
        }
    }
    ExitCode::SUCCESS
}
