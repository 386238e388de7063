// src/services/relay.rs
use std::{sync::Arc, time::Duration};

use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use super::assistant::{AssistantError, AssistantService};

pub const STILL_PROCESSING: &str =
    "I'm still processing your request. Please try again in a few seconds.";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RelayOutcome {
    Reply(String),
    /// The deadline passed before the assistant answered.
    StillProcessing,
}

impl RelayOutcome {
    pub fn into_text(self) -> String {
        match self {
            RelayOutcome::Reply(text) => text,
            RelayOutcome::StillProcessing => STILL_PROCESSING.to_string(),
        }
    }
}

/// Forwards one user turn to the assistant and waits for its answer, bounded by a deadline.
#[derive(Clone)]
pub struct ChatRelay {
    assistant: Arc<dyn AssistantService>,
    timeout: Duration,
}

impl ChatRelay {
    pub fn new(assistant: Arc<dyn AssistantService>, timeout: Duration) -> Self {
        Self { assistant, timeout }
    }

    /// Races the remote exchange against the deadline.
    ///
    /// The exchange runs on its own task. If the deadline wins, the task is
    /// signalled to stop and cancels its remote run in the background; the
    /// caller gets [`RelayOutcome::StillProcessing`] without waiting for that.
    /// Dropping the returned future (client went away) stops the task too.
    pub async fn relay(&self, thread_id: &str, message: &str) -> Result<RelayOutcome, AssistantError> {
        let cancel = CancellationToken::new();
        let _guard = cancel.clone().drop_guard();
        let mut task = tokio::spawn(exchange(
            Arc::clone(&self.assistant),
            thread_id.to_string(),
            message.to_string(),
            cancel.clone(),
        ));

        tokio::select! {
            joined = &mut task => match joined {
                Ok(result) => result.map(RelayOutcome::Reply),
                Err(e) => Err(AssistantError::TaskFailed(e)),
            },
            _ = tokio::time::sleep(self.timeout) => {
                warn!(thread_id, timeout_ms = self.timeout.as_millis() as u64, "assistant did not answer before deadline");
                cancel.cancel();
                Ok(RelayOutcome::StillProcessing)
            }
        }
    }
}

async fn exchange(
    assistant: Arc<dyn AssistantService>,
    thread_id: String,
    message: String,
    cancel: CancellationToken,
) -> Result<String, AssistantError> {
    tokio::select! {
        _ = cancel.cancelled() => return Err(AssistantError::Cancelled),
        appended = assistant.append_user_message(&thread_id, &message) => appended?,
    }

    if cancel.is_cancelled() {
        return Err(AssistantError::Cancelled);
    }
    let run = assistant.run_to_completion(&thread_id, &cancel).await;
    let run = match run {
        Ok(run) => run,
        Err(AssistantError::Cancelled) => {
            debug!(%thread_id, "assistant run abandoned after deadline");
            return Err(AssistantError::Cancelled);
        }
        Err(e) => return Err(e),
    };

    tokio::select! {
        _ = cancel.cancelled() => Err(AssistantError::Cancelled),
        reply = assistant.latest_reply(&run.thread_id) => reply,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::assistant::{Run, RunStatus};
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicBool, Ordering};

    struct SlowAssistant {
        delay: Duration,
        saw_cancel: AtomicBool,
    }

    #[async_trait]
    impl AssistantService for SlowAssistant {
        async fn create_thread(&self) -> Result<String, AssistantError> {
            Ok("thread".into())
        }

        async fn append_user_message(&self, _: &str, _: &str) -> Result<(), AssistantError> {
            Ok(())
        }

        async fn run_to_completion(
            &self,
            thread_id: &str,
            cancel: &CancellationToken,
        ) -> Result<Run, AssistantError> {
            tokio::select! {
                _ = cancel.cancelled() => {
                    self.saw_cancel.store(true, Ordering::SeqCst);
                    Err(AssistantError::Cancelled)
                }
                _ = tokio::time::sleep(self.delay) => Ok(Run {
                    id: "run".into(),
                    thread_id: thread_id.into(),
                    status: RunStatus::Completed,
                }),
            }
        }

        async fn latest_reply(&self, _: &str) -> Result<String, AssistantError> {
            Ok("done".into())
        }
    }

    struct PanickingAssistant;

    #[async_trait]
    impl AssistantService for PanickingAssistant {
        async fn create_thread(&self) -> Result<String, AssistantError> {
            Ok("thread".into())
        }

        async fn append_user_message(&self, _: &str, _: &str) -> Result<(), AssistantError> {
            panic!("append blew up");
        }

        async fn run_to_completion(
            &self,
            _: &str,
            _: &CancellationToken,
        ) -> Result<Run, AssistantError> {
            unreachable!()
        }

        async fn latest_reply(&self, _: &str) -> Result<String, AssistantError> {
            unreachable!()
        }
    }

    #[tokio::test]
    async fn panicking_exchange_is_task_failure() {
        let relay = ChatRelay::new(Arc::new(PanickingAssistant), Duration::from_secs(9));
        let err = relay.relay("thread", "hi").await.unwrap_err();
        assert!(matches!(err, AssistantError::TaskFailed(_)), "got {err:?}");
    }

    #[tokio::test(start_paused = true)]
    async fn fast_run_returns_reply() {
        let assistant = Arc::new(SlowAssistant {
            delay: Duration::from_secs(1),
            saw_cancel: AtomicBool::new(false),
        });
        let relay = ChatRelay::new(assistant, Duration::from_secs(9));
        let outcome = relay.relay("thread", "hi").await.unwrap();
        assert_eq!(outcome, RelayOutcome::Reply("done".into()));
    }

    #[tokio::test(start_paused = true)]
    async fn deadline_cancels_run() {
        let assistant = Arc::new(SlowAssistant {
            delay: Duration::from_secs(30),
            saw_cancel: AtomicBool::new(false),
        });
        let relay = ChatRelay::new(assistant.clone(), Duration::from_secs(9));
        let outcome = relay.relay("thread", "hi").await.unwrap();
        assert_eq!(outcome, RelayOutcome::StillProcessing);

        // Let the background task observe the signal.
        tokio::time::sleep(Duration::from_millis(10)).await;
        assert!(assistant.saw_cancel.load(Ordering::SeqCst));
    }

    #[tokio::test(start_paused = true)]
    async fn dropped_caller_cancels_run() {
        let assistant = Arc::new(SlowAssistant {
            delay: Duration::from_secs(5),
            saw_cancel: AtomicBool::new(false),
        });
        let relay = ChatRelay::new(assistant.clone(), Duration::from_secs(9));

        // The caller gives up after one second, long before the deadline.
        let gave_up = tokio::time::timeout(Duration::from_secs(1), relay.relay("thread", "hi")).await;
        assert!(gave_up.is_err());

        tokio::time::sleep(Duration::from_secs(10)).await;
        assert!(assistant.saw_cancel.load(Ordering::SeqCst));
    }

    #[test]
    fn still_processing_renders_placeholder() {
        assert_eq!(RelayOutcome::StillProcessing.into_text(), STILL_PROCESSING);
    }
}
