use std::future::Future;
use std::time::Duration;

use log::{debug, info};
use tokio_util::sync::CancellationToken;

use vaultmux_backend::{Status, StatusKind};

pub const RETRY_DELAY: Duration = Duration::from_secs(1);

pub const DEFAULT_ATTEMPTS: u32 = 5;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UnmountOutcome {
    Done(Status),
    /// Cancelled while waiting between attempts.
    Cancelled,
}

impl UnmountOutcome {
    #[must_use]
    pub fn into_status(self) -> Status {
        match self {
            Self::Done(status) => status,
            Self::Cancelled => Status::with_message(StatusKind::FailedToUnMount, "Unmount cancelled"),
        }
    }
}

/// A budget of 0 is treated as 1.
pub async fn unmount_with_retry<Op, Fut>(
    budget: u32,
    cancel: &CancellationToken,
    mut attempt: Op,
) -> UnmountOutcome
where
    Op: FnMut() -> Fut,
    Fut: Future<Output = Result<(), String>>,
{
    let budget = budget.max(1);
    let mut last_error = String::new();

    for number in 1..=budget {
        if number > 1 {
            tokio::select! {
                () = cancel.cancelled() => {
                    info!("Unmount cancelled after {} attempt(s)", number - 1);
                    return UnmountOutcome::Cancelled;
                }
                () = tokio::time::sleep(RETRY_DELAY) => {}
            }
        }

        match attempt().await {
            Ok(()) => {
                debug!("Unmount succeeded on attempt {number}/{budget}");
                return UnmountOutcome::Done(Status::new(StatusKind::Success));
            }
            Err(error) => {
                debug!("Unmount attempt {number}/{budget} failed: {error}");
                last_error = error;
            }
        }
    }

    UnmountOutcome::Done(Status::with_message(StatusKind::FailedToUnMount, &last_error))
}
