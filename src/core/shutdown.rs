//! Termination signal helper for binaries embedding the orchestrator.

/// Completes once the process is asked to terminate.
///
/// Listens for SIGINT, SIGTERM, and SIGQUIT alongside the portable Ctrl-C
/// handler. Pair it with [`Orchestrator::stop_all`](crate::Orchestrator::stop_all),
/// or use [`Orchestrator::run_until_signal`](crate::Orchestrator::run_until_signal)
/// which wires the two together.
#[cfg(unix)]
pub async fn wait_for_stop_signal() -> std::io::Result<()> {
    use tokio::signal::unix::{signal, SignalKind};

    let mut sigint = signal(SignalKind::interrupt())?;
    let mut sigterm = signal(SignalKind::terminate())?;
    let mut sigquit = signal(SignalKind::quit())?;

    tokio::select! {
        _ = tokio::signal::ctrl_c() => {},
        _ = sigint.recv()  => {},
        _ = sigterm.recv() => {},
        _ = sigquit.recv() => {},
    }
    Ok(())
}

/// Completes once the process is asked to terminate.
///
/// Non-Unix targets have no signal set to subscribe to; only Ctrl-C is
/// awaited.
#[cfg(not(unix))]
pub async fn wait_for_stop_signal() -> std::io::Result<()> {
    tokio::signal::ctrl_c().await
}
