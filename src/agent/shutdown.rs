use tokio::select;
use tokio_util::sync::CancellationToken;

/// Detects signals sent to the process and cancels the token. Also returns when the token is
/// cancelled from elsewhere, so the agent can stop itself.
///
/// On Windows detached processes can't detect signals sent to them, there `dalos stop` kills the
/// process instead.
pub async fn detect_shutdown(cancelation: CancellationToken) {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};

        let mut terminate = match signal(SignalKind::terminate()) {
            Ok(v) => v,
            Err(e) => {
                tracing::error!("Can't listen for SIGTERM {e:?}");
                return wait_ctrl_c(cancelation).await;
            }
        };
        select! {
            _ = tokio::signal::ctrl_c() => cancelation.cancel(),
            _ = terminate.recv() => cancelation.cancel(),
            _ = cancelation.cancelled() => (),
        };
    }
    #[cfg(not(unix))]
    {
        wait_ctrl_c(cancelation).await;
    }
}

async fn wait_ctrl_c(cancelation: CancellationToken) {
    select! {
        _ = tokio::signal::ctrl_c() => {
            cancelation.cancel();
        },
        _ = cancelation.cancelled() => (),
    };
}
