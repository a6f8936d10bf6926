use signal_hook::{
    consts::{SIGINT, SIGTERM},
    iterator::Signals,
};
use tokio::sync::watch;

/// Flips `shutdown` to `true` on the first SIGINT or SIGTERM. Every loop
/// holding a receiver winds down on its own.
pub fn handle_shutdown(shutdown: watch::Sender<bool>) -> std::io::Result<()> {
    let mut signals = Signals::new([SIGINT, SIGTERM])?;

    std::thread::spawn(move || {
        if let Some(signal) = signals.forever().next() {
            log::info!("Received signal {signal}, shutting down");
            let _ = sd_notify::notify(true, &[sd_notify::NotifyState::Stopping]);
            let _ = shutdown.send(true);
        }
    });
    Ok(())
}
