//! Races a lookup task against the caller's cancellation signal.

use std::future::Future;

use tracing::debug;

use crate::context::LookupContext;
use crate::errors::MatchError;

/// Run `work` as its own tokio task and wait for whichever comes first: the
/// task finishing or `ctx` being cancelled.
///
/// When cancellation wins the task is aborted, which stops any in-flight
/// request or quota-reset sleep at its next await point. A task that already
/// finished is always preferred over a cancellation that fired at the same
/// time.
pub async fn race_cancellation<T, F>(ctx: &LookupContext, work: F) -> Result<T, MatchError>
where
    T: Send + 'static,
    F: Future<Output = Result<T, MatchError>> + Send + 'static,
{
    if ctx.is_cancelled() {
        return Err(MatchError::Canceled);
    }

    let mut task = tokio::spawn(work);
    tokio::select! {
        biased;
        joined = &mut task => match joined {
            Ok(result) => result,
            Err(e) => Err(MatchError::TaskFailed(e.to_string())),
        },
        _ = ctx.cancelled() => {
            task.abort();
            debug!("lookup canceled, background task aborted");
            Err(MatchError::Canceled)
        }
    }
}
