use super::agent::VoiceAgentClient;
use super::capture::CaptureState;
use super::handler::{HandlerOutcome, ResponseHandler};
use super::protocol::{VoiceAgentCredentials, VoiceAgentRequest};
use crate::components::local_store::Task;
use crate::error::Error;
use crate::events::{EventBus, Toast, ToastAction, ToastSeverity};
use chrono::Utc;
use serde::Serialize;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;
use tokio::sync::Mutex;
use tracing::{error, info, warn};

const NOT_CONFIGURED_TOAST: Duration = Duration::from_secs(4);
const TRANSPORT_ERROR_TOAST: Duration = Duration::from_secs(6);
const PROTOCOL_ERROR_TOAST: Duration = Duration::from_secs(8);

/// Result of one voice command
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "outcome", rename_all = "camelCase")]
pub enum CommandOutcome {
    /// Blank text, or auto-processing was not due
    Skipped,
    NotConfigured,
    Failed { retryable: bool },
    TaskCreated { task: Task },
    RefreshRequested,
    Notified,
}

impl From<HandlerOutcome> for CommandOutcome {
    fn from(outcome: HandlerOutcome) -> Self {
        match outcome {
            HandlerOutcome::TaskCreated(task) => Self::TaskCreated { task },
            HandlerOutcome::RefreshRequested => Self::RefreshRequested,
            HandlerOutcome::Notified => Self::Notified,
        }
    }
}

/// Counts one command as in flight until dropped
struct InFlight<'a>(&'a AtomicUsize);

impl<'a> InFlight<'a> {
    fn enter(counter: &'a AtomicUsize) -> Self {
        counter.fetch_add(1, Ordering::SeqCst);
        Self(counter)
    }
}

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

#[derive(Debug, Default)]
struct SessionFlags {
    stopped_manually: bool,
    processed: bool,
}

/// Runs voice commands end to end: agent call, response handling, and the
/// toasts for everything that can go wrong on the way.
pub struct VoiceSession {
    agent: VoiceAgentClient,
    handler: ResponseHandler,
    bus: EventBus,
    quiescence: Duration,
    /// Commands currently waiting on the agent
    in_flight: AtomicUsize,
    flags: Mutex<SessionFlags>,
}

impl VoiceSession {
    pub fn new(agent: VoiceAgentClient, handler: ResponseHandler, bus: EventBus, quiescence: Duration) -> Self {
        Self {
            agent,
            handler,
            bus,
            quiescence,
            in_flight: AtomicUsize::new(0),
            flags: Mutex::new(SessionFlags::default()),
        }
    }

    pub fn is_processing(&self) -> bool {
        self.in_flight.load(Ordering::SeqCst) > 0
    }

    /// Send `text` to the agent and apply the answer.
    ///
    /// Commands may overlap (a retry while another command runs);
    /// `is_processing` stays set until the last one finishes. There is no
    /// timeout: a hung webhook keeps it set until it answers.
    pub async fn process_command(&self, text: &str) -> CommandOutcome {
        let text = text.trim();
        if text.is_empty() {
            return CommandOutcome::Skipped;
        }

        let credentials = match self.agent.credentials().await {
            Ok(Some(credentials)) if credentials.is_configured() => credentials,
            Ok(_) => {
                self.bus.toast(Toast::new(
                    ToastSeverity::Error,
                    t!("agent_not_configured"),
                    Some(NOT_CONFIGURED_TOAST),
                    ToastAction::Close,
                ));
                return CommandOutcome::NotConfigured;
            }
            Err(e) => {
                error!("Failed to read voice agent credentials: {}", e);
                self.generic_error_toast();
                return CommandOutcome::Failed { retryable: false };
            }
        };

        let _guard = InFlight::enter(&self.in_flight);
        self.run(&credentials, text).await
    }

    async fn run(&self, credentials: &VoiceAgentCredentials, text: &str) -> CommandOutcome {
        let request = VoiceAgentRequest::new(text, Utc::now());

        let response = match self.agent.send_with(credentials, &request).await {
            Ok(response) => response,
            Err(Error::Transport(reason)) => {
                warn!("Voice agent call failed: {}", reason);
                self.bus.toast(Toast::new(
                    ToastSeverity::Error,
                    t!("voice_processing_error"),
                    Some(TRANSPORT_ERROR_TOAST),
                    ToastAction::Retry {
                        text: text.to_string(),
                    },
                ));
                return CommandOutcome::Failed { retryable: true };
            }
            Err(e) => {
                warn!("Voice agent response rejected: {}", e);
                self.generic_error_toast();
                return CommandOutcome::Failed { retryable: false };
            }
        };

        match self.handler.handle(&response, text).await {
            Ok(outcome) => outcome.into(),
            Err(e) => {
                error!("Failed to apply voice agent response: {}", e);
                self.generic_error_toast();
                CommandOutcome::Failed { retryable: false }
            }
        }
    }

    fn generic_error_toast(&self) {
        self.bus.toast(Toast::new(
            ToastSeverity::Error,
            t!("agent_invalid_response"),
            Some(PROTOCOL_ERROR_TOAST),
            ToastAction::Close,
        ));
    }

    /// A new capture is starting
    pub async fn begin_listening(&self) {
        let mut flags = self.flags.lock().await;
        flags.stopped_manually = false;
        flags.processed = false;
    }

    /// The user pressed stop. Whatever was captured so far is sent right
    /// away, and the automatic post-capture processing is suppressed.
    pub async fn stop_manually(&self, transcript: &str) -> CommandOutcome {
        {
            let mut flags = self.flags.lock().await;
            flags.stopped_manually = true;
            if flags.processed || transcript.trim().is_empty() {
                return CommandOutcome::Skipped;
            }
        }

        let outcome = self.process_command(transcript).await;
        self.flags.lock().await.processed = true;
        outcome
    }

    /// Capture ended on its own. After the quiescence delay the transcript is
    /// processed, unless something already took care of it.
    pub async fn finish_capture(&self, snapshot: &CaptureState) -> CommandOutcome {
        tokio::time::sleep(self.quiescence).await;

        {
            let flags = self.flags.lock().await;
            let due = !snapshot.is_listening
                && !snapshot.transcript.trim().is_empty()
                && !self.is_processing()
                && !flags.processed
                && !flags.stopped_manually;
            if !due {
                return CommandOutcome::Skipped;
            }
        }

        info!("Processing captured speech");
        let outcome = self.process_command(&snapshot.transcript).await;
        self.flags.lock().await.processed = true;
        outcome
    }
}
