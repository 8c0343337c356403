//! Polling for asynchronous state transitions.
//!
//! VPCs, transit gateways, attachments and instances are created in a
//! pending state. Instead of sleeping for a fixed time, provisioning polls
//! the provider until the resource reports the wanted state.

use std::future::Future;
use std::time::Duration;

use tokio::time::Instant;
use tracing::debug;

use crate::error::{ProviderError, ProviderResult, TransitNetError, TransitNetResult};

/// States after which a resource will never become anything else.
const TERMINAL_STATES: &[&str] = &["failed", "rejected", "deleted", "terminated"];

/// Pseudo state reported while a new resource is not yet visible to describe
/// calls.
const NOT_VISIBLE: &str = "not-visible";

/// How often and how long to poll.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollSettings {
    /// Delay between two status checks.
    pub interval: Duration,
    /// Give up after this long.
    pub timeout: Duration,
}

impl Default for PollSettings {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(10),
            timeout: Duration::from_secs(600),
        }
    }
}

/// Poll `describe` until it reports one of `wanted`.
///
/// Returns the state that matched. Fails with
/// [`TransitNetError::UnexpectedState`] as soon as a terminal state that is
/// not wanted shows up, and with [`TransitNetError::Timeout`] once
/// `settings.timeout` has elapsed.
pub async fn wait_for_state<F, Fut>(
    what: &str,
    id: &str,
    wanted: &[&str],
    settings: PollSettings,
    mut describe: F,
) -> TransitNetResult<String>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = ProviderResult<String>>,
{
    let started = Instant::now();
    loop {
        let state = describe().await?;
        if wanted.contains(&state.as_str()) {
            debug!(what, id, state = %state, "reached wanted state");
            return Ok(state);
        }
        if TERMINAL_STATES.contains(&state.as_str()) {
            return Err(TransitNetError::UnexpectedState {
                what: what.to_owned(),
                id: id.to_owned(),
                state,
                wanted: wanted.join("|"),
            });
        }
        let waited = started.elapsed();
        if waited >= settings.timeout {
            return Err(TransitNetError::Timeout {
                what: what.to_owned(),
                id: id.to_owned(),
                wanted: wanted.join("|"),
                waited,
            });
        }
        debug!(what, id, state = %state, "waiting for state transition");
        tokio::time::sleep(settings.interval).await;
    }
}

/// [`wait_for_state`] for a resource that was just created.
///
/// Describe calls are eventually consistent: right after a create they can
/// answer `*.NotFound`. Such answers count as "not visible yet" and polling
/// continues until the deadline. Any other describe error still aborts.
pub async fn wait_for_created<F, Fut>(
    what: &str,
    id: &str,
    wanted: &[&str],
    settings: PollSettings,
    mut describe: F,
) -> TransitNetResult<String>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = ProviderResult<String>>,
{
    wait_for_state(what, id, wanted, settings, move || {
        let described = describe();
        async move {
            match described.await {
                Err(ProviderError::NotFound(message)) => {
                    debug!(what, id, %message, "not visible yet");
                    Ok(NOT_VISIBLE.to_owned())
                }
                other => other,
            }
        }
    })
    .await
}
