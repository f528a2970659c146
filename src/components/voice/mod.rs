pub mod agent;
pub mod capture;
pub mod handler;
pub mod protocol;
pub mod session;

pub use agent::VoiceAgentClient;
pub use capture::{CaptureState, RecognitionEvent, RecognitionSettings, SpeechBackend, VoiceCapture};
pub use handler::{HandlerOutcome, ResponseHandler};
pub use protocol::{VoiceAgentCredentials, VoiceAgentRequest, VoiceAgentResponse};
pub use session::{CommandOutcome, VoiceSession};

use super::AppContext;
use crate::error::AppResult;
use crate::events::AppEvent;
use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast::error::RecvError;
use tokio::sync::RwLock;
use tracing::{info, warn};

/// Voice assistant component: builds the session and replays commands when
/// a toast's retry action fires
#[derive(Default)]
pub struct VoiceAssistant {
    session: RwLock<Option<Arc<VoiceSession>>>,
}

impl VoiceAssistant {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn get_session(&self) -> Option<Arc<VoiceSession>> {
        self.session.read().await.clone()
    }
}

fn spawn_retry_listener(ctx: &AppContext, session: Arc<VoiceSession>) {
    let mut events = ctx.bus.subscribe();
    let shutdown = ctx.shutdown.clone();

    tokio::spawn(async move {
        loop {
            let event = tokio::select! {
                _ = shutdown.cancelled() => break,
                event = events.recv() => event,
            };

            match event {
                Ok(AppEvent::RetryRequested { text }) => {
                    info!("Retrying voice command");
                    let session = Arc::clone(&session);
                    // Keep listening while the agent call is in flight
                    tokio::spawn(async move {
                        session.process_command(&text).await;
                    });
                }
                Ok(_) => {}
                Err(RecvError::Lagged(skipped)) => warn!("Voice listener skipped {} events", skipped),
                Err(RecvError::Closed) => break,
            }
        }
    });
}

#[async_trait]
impl super::Component for VoiceAssistant {
    fn name(&self) -> &'static str {
        "voice_assistant"
    }

    async fn init(&self, ctx: &AppContext) -> AppResult<()> {
        let mut session_lock = self.session.write().await;
        if session_lock.is_some() {
            return Ok(());
        }

        let (tz, quiescence) = {
            let config = ctx.config.read().await;
            (config.tz(), Duration::from_millis(config.speech_quiescence_ms))
        };

        let agent = VoiceAgentClient::new(ctx.store.clone(), ctx.http.clone(), tz);
        if agent.credentials().await?.filter(VoiceAgentCredentials::is_configured).is_none() {
            info!("Voice agent endpoint not configured yet");
        }

        let handler = ResponseHandler::new(ctx.store.clone(), ctx.bus.clone());
        let session = Arc::new(VoiceSession::new(agent, handler, ctx.bus.clone(), quiescence));

        spawn_retry_listener(ctx, Arc::clone(&session));
        *session_lock = Some(session);
        Ok(())
    }

    async fn shutdown(&self) -> AppResult<()> {
        // Pending agent calls are not abortable; the listener stops with the
        // process shutdown token
        self.session.write().await.take();
        Ok(())
    }

    fn as_any(&self) -> &dyn std::any::Any {
        self
    }
}
