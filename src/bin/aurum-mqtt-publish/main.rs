mod config;
mod logging;
mod rumqttc_wrapper;

use std::process::ExitCode;
use std::sync::mpsc::{self, Sender};
use std::thread;

use aurum2mqtt::home_assistant::HomeAssistant;
use aurum2mqtt::meter::Meetstekker;
use aurum2mqtt::pipeline::Pipeline;
use aurum2mqtt::scheduler::CycleScheduler;
use config::Config;
use rumqttc_wrapper::RumqttcWrapper;

use log::{error, info, warn};

/// Resolves once ctrl-c (SIGINT) or, on unix, SIGTERM arrives.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!("unable to listen for ctrl-c: {e}");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                warn!("unable to listen for SIGTERM: {e}");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("received ctrl-c"),
        _ = terminate => info!("received SIGTERM"),
    }
}

/// Forwards the process shutdown signals to the scheduler.
fn spawn_shutdown_listener(shutdown: Sender<()>) {
    thread::spawn(move || {
        let runtime = match tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
        {
            Ok(runtime) => runtime,
            Err(e) => {
                warn!("unable to install shutdown handler: {e}");
                return;
            }
        };
        runtime.block_on(shutdown_signal());
        let _ = shutdown.send(());
    });
}

fn run() -> anyhow::Result<()> {
    info!("Running revision: {}", env!("GIT_HASH"));
    if std::env::args().len() > 1 {
        error!("Arguments passed. Tool is configured by config.toml in its path");
    }

    let config = Config::load()?;
    config.validate()?;
    // resolve before touching the network: a bad selection must never start the bridge
    let selection = config.selection()?;
    let interval = config.update_interval();
    let topics = config.topics();

    info!("Meetstekker host: {}", config.device_host);
    info!("update interval of {:.2}s", interval.as_secs_f64());
    info!(
        "bridging {} measurements: {}",
        selection.len(),
        selection
            .fields()
            .iter()
            .map(|f| f.key)
            .collect::<Vec<_>>()
            .join(", ")
    );
    info!(
        "Publishing to Home Assistant, state topic {}",
        topics.state_topic
    );

    let meter = Meetstekker::new(&config.device_host)?;
    let home_assistant = HomeAssistant::<RumqttcWrapper>::start(&config.mqtt, topics);
    let mut pipeline = Pipeline::new(meter, home_assistant, selection);

    let (shutdown_tx, shutdown_rx) = mpsc::channel();
    spawn_shutdown_listener(shutdown_tx);

    CycleScheduler::new(interval).run(&shutdown_rx, || {
        pipeline.run_cycle();
    });

    pipeline.stop()?;
    Ok(())
}

fn main() -> ExitCode {
    logging::init_logger();
    match run() {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{e:#}");
            ExitCode::FAILURE
        }
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use std::process::Command;
    use std::time::Duration;
    use tokio::signal::unix::{signal, SignalKind};

    #[test]
    fn sigterm_stops_the_scheduler() {
        // keep a SIGTERM handler installed so the signal never hits the default action
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .unwrap();
        let _guard = runtime
            .block_on(async { signal(SignalKind::terminate()) })
            .unwrap();

        let (tx, rx) = mpsc::channel();
        spawn_shutdown_listener(tx);

        let pid = std::process::id().to_string();
        let mut stopped = false;
        for _ in 0..50 {
            Command::new("kill")
                .args(["-TERM", &pid])
                .status()
                .unwrap();
            if rx.recv_timeout(Duration::from_millis(100)).is_ok() {
                stopped = true;
                break;
            }
        }
        assert!(stopped, "SIGTERM did not reach the shutdown channel");
    }
}
