use std::time::Duration;

use anyhow::Result;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;

use crate::core::context::PassContext;
use crate::core::orchestrator::Suspender;
use crate::core::traits::{TimeSource, WorkloadApi};
use crate::core::types::PassSummary;
use crate::k8s::types::KubernetesError;

/// Run a single suspend pass and report its outcome.
pub async fn run_once<A: WorkloadApi, T: TimeSource>(
    suspender: &Suspender<A, T>,
) -> Result<PassSummary> {
    let ctx = PassContext::new(CancellationToken::new());
    suspender
        .run_suspend_pass(&ctx)
        .await
        .map_err(|e| anyhow::anyhow!("Suspend pass {} failed: {e:?}", ctx.request_id))
}

/// Run suspend passes every `interval` until SIGINT or SIGTERM.
pub async fn run_daemon<A: WorkloadApi, T: TimeSource>(
    suspender: &Suspender<A, T>,
    interval: Duration,
) -> Result<()> {
    let cancellation_token = CancellationToken::new();
    let signal_handler = spawn_signal_handler(cancellation_token.clone())?;

    let passes = run_periodic(suspender, interval, cancellation_token).await;
    signal_handler.abort();

    tracing::info!(passes, "Suspend loop stopped");
    Ok(())
}

/// Drive passes until `cancellation_token` fires and return how many were started.
///
/// A failed pass is logged and retried on the next tick. Cancelling the token
/// also aborts the pass in flight.
pub async fn run_periodic<A: WorkloadApi, T: TimeSource>(
    suspender: &Suspender<A, T>,
    interval: Duration,
    cancellation_token: CancellationToken,
) -> u64 {
    let mut ticker = tokio::time::interval(interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    let mut passes = 0;

    loop {
        tokio::select! {
            biased;
            _ = cancellation_token.cancelled() => break,
            _ = ticker.tick() => {}
        }

        passes += 1;
        let ctx = PassContext::new(cancellation_token.child_token());
        match suspender.run_suspend_pass(&ctx).await {
            Ok(summary) => {
                tracing::debug!(request_id = %ctx.request_id, ?summary, "Suspend pass succeeded");
            }
            Err(e) if matches!(e.current_context(), KubernetesError::Cancelled) => {
                tracing::info!(request_id = %ctx.request_id, "Suspend pass cancelled");
                break;
            }
            Err(e) => {
                tracing::error!(
                    request_id = %ctx.request_id,
                    "Suspend pass failed, retrying in {}s: {e:?}",
                    interval.as_secs()
                );
            }
        }
    }

    passes
}

fn spawn_signal_handler(
    cancellation_token: CancellationToken,
) -> Result<tokio::task::JoinHandle<()>> {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};
        let mut sigterm = signal(SignalKind::terminate())?;
        let mut sigint = signal(SignalKind::interrupt())?;

        Ok(tokio::spawn(async move {
            tokio::select! {
                _ = sigterm.recv() => {
                    tracing::info!("Received SIGTERM, initiating graceful shutdown");
                }
                _ = sigint.recv() => {
                    tracing::info!("Received SIGINT, initiating graceful shutdown");
                }
            }
            cancellation_token.cancel();
        }))
    }
    #[cfg(not(unix))]
    {
        Ok(tokio::spawn(async move {
            if let Err(e) = tokio::signal::ctrl_c().await {
                tracing::error!("Failed to listen for Ctrl+C: {e}");
                return;
            }
            tracing::info!("Received Ctrl+C, initiating graceful shutdown");
            cancellation_token.cancel();
        }))
    }
}
