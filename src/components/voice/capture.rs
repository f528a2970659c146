//! Speech capture state machine.
//!
//! The recogniser itself lives behind [`SpeechBackend`]; this type only
//! tracks `idle -> listening -> idle`, accumulates transcripts and maps
//! recogniser error codes to user-facing messages. It never interprets
//! what was said.

use crate::error::AppResult;
use serde::Serialize;
use tracing::{debug, warn};

/// Fixed recogniser settings, also served to clients that run their own
/// recogniser
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RecognitionSettings {
    pub continuous: bool,
    pub interim_results: bool,
    pub lang: String,
    pub max_alternatives: u32,
}

impl RecognitionSettings {
    pub fn for_locale(lang: impl Into<String>) -> Self {
        Self {
            continuous: false,
            interim_results: true,
            lang: lang.into(),
            max_alternatives: 1,
        }
    }
}

/// A speech-to-text engine
pub trait SpeechBackend: Send {
    fn is_supported(&self) -> bool;
    fn configure(&mut self, settings: &RecognitionSettings);
    fn start(&mut self) -> AppResult<()>;
    fn stop(&mut self);
    /// Stop without delivering pending results
    fn abort(&mut self);
}

/// Backend for hosts without a recogniser
#[derive(Debug, Default)]
pub struct UnsupportedBackend;

impl SpeechBackend for UnsupportedBackend {
    fn is_supported(&self) -> bool {
        false
    }

    fn configure(&mut self, _settings: &RecognitionSettings) {}

    fn start(&mut self) -> AppResult<()> {
        Err(crate::error::component_error("No speech recogniser available"))
    }

    fn stop(&mut self) {}

    fn abort(&mut self) {}
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecognitionAlternative {
    pub transcript: String,
    pub is_final: bool,
}

/// Events delivered by a backend
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RecognitionEvent {
    Started,
    /// Results from `result_index` on are new since the previous event
    Result {
        result_index: usize,
        results: Vec<RecognitionAlternative>,
    },
    Error(String),
    Ended,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CaptureState {
    pub is_listening: bool,
    pub is_supported: bool,
    pub transcript: String,
    pub interim_transcript: String,
    pub error: Option<String>,
}

pub struct VoiceCapture<B: SpeechBackend> {
    backend: B,
    state: CaptureState,
}

impl<B: SpeechBackend> VoiceCapture<B> {
    pub fn new(mut backend: B, lang: &str) -> Self {
        let mut state = CaptureState::default();

        if backend.is_supported() {
            backend.configure(&RecognitionSettings::for_locale(lang));
            state.is_supported = true;
        } else {
            state.error = Some(t!("speech_unsupported").to_string());
        }

        Self { backend, state }
    }

    pub fn state(&self) -> &CaptureState {
        &self.state
    }

    pub fn snapshot(&self) -> CaptureState {
        self.state.clone()
    }

    pub fn is_supported(&self) -> bool {
        self.state.is_supported
    }

    pub fn start(&mut self) {
        if !self.state.is_supported {
            self.state.error = Some(t!("speech_unsupported").to_string());
            return;
        }
        if self.state.is_listening {
            return;
        }

        self.state.error = None;
        self.state.transcript.clear();
        self.state.interim_transcript.clear();

        if let Err(e) = self.backend.start() {
            warn!("Speech recogniser failed to start: {}", e);
            self.state.error = Some(t!("speech_start_failed").to_string());
        }
    }

    pub fn stop(&mut self) {
        if !self.state.is_listening {
            return;
        }
        self.backend.stop();
    }

    pub fn reset_transcript(&mut self) {
        self.state.transcript.clear();
        self.state.interim_transcript.clear();
        self.state.error = None;
    }

    pub fn handle_event(&mut self, event: RecognitionEvent) {
        match event {
            RecognitionEvent::Started => {
                self.state.is_listening = true;
                self.state.error = None;
                self.state.transcript.clear();
                self.state.interim_transcript.clear();
            }
            RecognitionEvent::Ended => {
                self.state.is_listening = false;
                self.state.interim_transcript.clear();
            }
            RecognitionEvent::Result { result_index, results } => {
                let mut finals = String::new();
                let mut interim = String::new();
                for result in results.iter().skip(result_index) {
                    if result.is_final {
                        finals.push_str(&result.transcript);
                    } else {
                        interim.push_str(&result.transcript);
                    }
                }
                self.state.transcript.push_str(&finals);
                self.state.interim_transcript = interim;
            }
            RecognitionEvent::Error(code) => {
                debug!("Speech recogniser error: {}", code);
                self.state.error = Some(error_message(&code));
                self.state.is_listening = false;
            }
        }
    }
}

impl<B: SpeechBackend> Drop for VoiceCapture<B> {
    fn drop(&mut self) {
        self.backend.abort();
    }
}

/// User-facing message for a recogniser error code
pub fn error_message(code: &str) -> String {
    match code {
        "no-speech" => t!("speech_no_speech").to_string(),
        "audio-capture" => t!("speech_audio_capture").to_string(),
        "not-allowed" => t!("speech_not_allowed").to_string(),
        "network" => t!("speech_network").to_string(),
        other => t!("speech_generic", code = other).to_string(),
    }
}
