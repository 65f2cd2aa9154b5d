//! Two small usage sketches: a synchronous flaky-operation retry, and the
//! async driver wired up with a custom backoff/termination/monitor stack.

use std::fmt;
use std::time::Duration;

use atmos::{
    retry, retry_async, BackoffPolicy, ErrorClassification, RetryPolicy, TerminationPolicy,
};

#[derive(Debug)]
struct FlakyUpstream(String);

impl fmt::Display for FlakyUpstream {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "upstream error: {}", self.0)
    }
}

fn sync_example() {
    let mut remaining_failures = 2;
    let policy: RetryPolicy<FlakyUpstream> = RetryPolicy::default()
        .with_termination(TerminationPolicy::limit_attempts(5))
        .with_backoff(BackoffPolicy::Exponential(Duration::from_millis(50)));

    let result = retry(&policy, || {
        if remaining_failures > 0 {
            remaining_failures -= 1;
            Err(FlakyUpstream("connection reset".into()))
        } else {
            Ok("payload".to_string())
        }
    });

    match result {
        Ok(payload) => println!("sync: got {payload:?}"),
        Err(e) => println!("sync: gave up: {e}"),
    }
}

async fn async_example() {
    let policy: RetryPolicy<FlakyUpstream> = RetryPolicy::default()
        .with_termination(
            TerminationPolicy::limit_attempts(4) & TerminationPolicy::limit_time(Duration::from_secs(2)),
        )
        .with_backoff(
            BackoffPolicy::Fibonacci(Duration::from_millis(20))
                .randomized_bound(Duration::from_millis(10), false),
        )
        .with_classifier(atmos::classification::partial(|e: &FlakyUpstream| {
            if e.0.contains("unauthorized") {
                Some(ErrorClassification::Fatal)
            } else {
                None
            }
        }))
        .with_monitor(atmos::monitor::LogEventsWithTracing::new());

    let mut attempt = 0;
    let result = retry_async(&policy, || {
        attempt += 1;
        async move {
            if attempt < 3 {
                Err(FlakyUpstream("timeout".into()))
            } else {
                Ok(attempt)
            }
        }
    })
    .await;

    match result {
        Ok(n) => println!("async: succeeded after {n} attempts"),
        Err(e) => println!("async: gave up: {e}"),
    }
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt::init();
    sync_example();
    async_example().await;
}
