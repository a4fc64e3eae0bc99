//! Demonstrates retry strategies, hooks and cancellation with tracing output
//!
//! Run with: cargo run --example retry_demo

use std::sync::atomic::{AtomicU32, Ordering};
use std::time::Duration;

use exponent::{retry_with_cancel, Backoff, RetryEvent, Strategy};
use tokio_util::sync::CancellationToken;

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_max_level(tracing::Level::DEBUG)
        .init();

    flaky_service().await;
    manual_loop().await;
    cancelled_run().await;
}

/// A service that needs a few tries before it answers.
async fn flaky_service() {
    let calls = AtomicU32::new(0);
    let mut backoff = Backoff::new(6).with_strategy(
        Strategy::full_jitter().with_minimum(Duration::from_millis(20)),
    );

    let result = backoff
        .run_with_hooks(
            || async {
                match calls.fetch_add(1, Ordering::SeqCst) {
                    n if n < 3 => Err(format!("service unavailable (call {})", n + 1)),
                    n => Ok(n + 1),
                }
            },
            |event: &RetryEvent<'_, String>| {
                tracing::info!(
                    attempt = event.attempt,
                    error = %event.error,
                    next_delay = ?event.next_delay,
                    "retrying"
                );
            },
        )
        .await;

    tracing::info!(?result, state = ?backoff.state(), "flaky service finished");
}

/// Driving the controller by hand, switching strategy half way through.
async fn manual_loop() {
    let mut backoff = Backoff::new(5).with_strategy(Strategy::linear());

    while backoff.next_attempt() {
        if backoff.attempts() == 3 {
            backoff.set_strategy(Strategy::exponential());
        }
        let waited = backoff.wait().await;
        tracing::info!(attempt = backoff.attempts(), ?waited, "manual attempt");
    }

    tracing::info!(failed = backoff.has_failed(), "manual loop finished");
}

/// Cancelling from another task cuts the current wait short.
async fn cancelled_run() {
    let token = CancellationToken::new();
    let canceller = token.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(400)).await;
        canceller.cancel();
    });

    let result = retry_with_cancel(20, token, || async { Err::<(), _>("still down") }).await;
    tracing::info!(?result, "cancelled run finished");
}
