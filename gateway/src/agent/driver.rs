//! Realtime conversation driver.
//!
//! Runs one realtime model conversation for a room: configure the session,
//! greet the caller, then wait until cancelled or the provider fails.

use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};
use zeroize::Zeroize;

use crate::config::ServerConfig;
use crate::core::realtime::{
    BoxedRealtime, InputTranscriptionConfig, RealtimeConfig, RealtimeError, RealtimeFactory,
    TurnDetectionConfig,
};
use crate::videosdk::RoomId;

/// Upper bound for the farewell utterance on shutdown.
const FAREWELL_TIMEOUT: Duration = Duration::from_secs(3);

/// Identity of the conversation being driven.
#[derive(Clone)]
pub struct DriverContext {
    pub room_id: RoomId,
    pub display_name: String,
    /// Meeting credential of the agent participant
    pub credential: String,
}

impl std::fmt::Debug for DriverContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DriverContext")
            .field("room_id", &self.room_id)
            .field("display_name", &self.display_name)
            .finish_non_exhaustive()
    }
}

#[derive(Debug, Error)]
pub enum DriverError {
    #[error("Invalid driver context: {0}")]
    InvalidContext(String),

    #[error("OpenAI API key is not configured")]
    MissingCredential,

    #[error(transparent)]
    Realtime(#[from] RealtimeError),

    #[error("Driver task panicked: {0}")]
    Panicked(String),

    #[error("Driver did not stop within {0:?}")]
    StopTimeout(Duration),
}

/// Model and persona settings for every conversation.
#[derive(Clone)]
pub struct DriverSettings {
    pub api_key: Option<String>,
    pub model: String,
    pub voice: Option<String>,
    pub instructions: String,
    pub transcription_model: String,
    pub turn_detection: TurnDetectionConfig,
    pub tool_choice: String,
    pub greeting: String,
    pub farewell: String,
    pub farewell_timeout: Duration,
}

impl DriverSettings {
    pub fn from_config(config: &ServerConfig) -> Self {
        let realtime = &config.realtime;
        Self {
            api_key: config.get_openai_api_key().ok(),
            model: realtime.model.clone(),
            voice: realtime.voice.clone(),
            instructions: config.agent.instructions.clone(),
            transcription_model: realtime.transcription_model.clone(),
            turn_detection: TurnDetectionConfig::ServerVad {
                threshold: Some(realtime.vad_threshold),
                prefix_padding_ms: Some(realtime.vad_prefix_padding_ms),
                silence_duration_ms: Some(realtime.vad_silence_duration_ms),
            },
            tool_choice: realtime.tool_choice.clone(),
            greeting: config.agent.greeting.clone(),
            farewell: config.agent.farewell.clone(),
            farewell_timeout: FAREWELL_TIMEOUT,
        }
    }
}

impl Drop for DriverSettings {
    fn drop(&mut self) {
        if let Some(ref mut key) = self.api_key {
            key.zeroize();
        }
    }
}

/// Starts realtime conversations from a provider factory.
#[derive(Clone)]
pub struct ConversationDriver {
    factory: Arc<dyn RealtimeFactory>,
    settings: Arc<DriverSettings>,
}

impl ConversationDriver {
    pub fn new(factory: Arc<dyn RealtimeFactory>, settings: DriverSettings) -> Self {
        Self {
            factory,
            settings: Arc::new(settings),
        }
    }

    fn realtime_config(&self) -> Result<RealtimeConfig, DriverError> {
        let settings = &self.settings;
        let api_key = settings
            .api_key
            .clone()
            .filter(|k| !k.is_empty())
            .ok_or(DriverError::MissingCredential)?;

        Ok(RealtimeConfig {
            api_key,
            model: settings.model.clone(),
            voice: settings.voice.clone(),
            instructions: Some(settings.instructions.clone()),
            input_audio_transcription: Some(InputTranscriptionConfig {
                model: settings.transcription_model.clone(),
            }),
            turn_detection: Some(settings.turn_detection.clone()),
            tool_choice: Some(settings.tool_choice.clone()),
            modalities: Some(vec!["text".to_string(), "audio".to_string()]),
            ..Default::default()
        })
    }

    /// Run the conversation until `cancel` fires or the provider fails.
    ///
    /// Cancellation is a clean exit: the farewell is spoken (bounded by a
    /// short timeout), the provider disconnected and `Ok(())` returned.
    /// A fatal provider error disconnects and is returned to the caller.
    pub async fn run(
        &self,
        ctx: DriverContext,
        cancel: CancellationToken,
    ) -> Result<(), DriverError> {
        if ctx.credential.trim().is_empty() {
            return Err(DriverError::InvalidContext(
                "meeting credential is empty".to_string(),
            ));
        }

        let config = self.realtime_config()?;
        let mut realtime = self.factory.create(config)?;

        let (err_tx, mut err_rx) = mpsc::unbounded_channel::<RealtimeError>();
        realtime.on_error(Arc::new(move |err| {
            let err_tx = err_tx.clone();
            Box::pin(async move {
                let _ = err_tx.send(err);
            })
        }))?;

        let room = ctx.room_id.to_string();
        realtime.on_transcript(Arc::new(move |transcript| {
            let room = room.clone();
            Box::pin(async move {
                if transcript.is_final {
                    info!(
                        room_id = %room,
                        role = %transcript.role,
                        text = %transcript.text,
                        "Conversation transcript"
                    );
                }
            })
        }))?;

        let connected = tokio::select! {
            _ = cancel.cancelled() => None,
            result = realtime.connect() => Some(result),
        };
        match connected {
            None => {
                info!(room_id = %ctx.room_id, "Driver cancelled while connecting");
                close(&mut realtime, &ctx).await;
                return Ok(());
            }
            Some(Err(e)) => {
                error!(room_id = %ctx.room_id, error = %e, "Realtime connection failed");
                close(&mut realtime, &ctx).await;
                return Err(e.into());
            }
            Some(Ok(())) => {}
        }

        info!(
            room_id = %ctx.room_id,
            agent = %ctx.display_name,
            "Realtime conversation started"
        );

        if let Err(e) = realtime.say(&self.settings.greeting).await {
            if e.is_fatal() {
                close(&mut realtime, &ctx).await;
                return Err(e.into());
            }
            warn!(room_id = %ctx.room_id, error = %e, "Greeting failed");
        }

        let outcome = loop {
            tokio::select! {
                _ = cancel.cancelled() => break Ok(()),
                err = err_rx.recv() => match err {
                    Some(err) if err.is_fatal() => break Err(DriverError::from(err)),
                    Some(err) => {
                        warn!(room_id = %ctx.room_id, error = %err, "Realtime provider error");
                    }
                    None => {
                        cancel.cancelled().await;
                        break Ok(());
                    }
                },
            }
        };

        match outcome {
            Ok(()) => {
                debug!(room_id = %ctx.room_id, "Driver cancelled, saying farewell");
                match tokio::time::timeout(
                    self.settings.farewell_timeout,
                    realtime.say(&self.settings.farewell),
                )
                .await
                {
                    Ok(Ok(())) => {}
                    Ok(Err(e)) => warn!(room_id = %ctx.room_id, error = %e, "Farewell failed"),
                    Err(_) => warn!(room_id = %ctx.room_id, "Farewell timed out"),
                }
                close(&mut realtime, &ctx).await;
                info!(room_id = %ctx.room_id, "Realtime conversation ended");
                Ok(())
            }
            Err(e) => {
                error!(room_id = %ctx.room_id, error = %e, "Realtime conversation failed");
                close(&mut realtime, &ctx).await;
                Err(e)
            }
        }
    }
}

async fn close(realtime: &mut BoxedRealtime, ctx: &DriverContext) {
    if let Err(e) = realtime.disconnect().await {
        warn!(room_id = %ctx.room_id, error = %e, "Realtime disconnect failed");
    }
}

/// A running driver and its cancellation handle.
pub struct DriverTask {
    cancel: CancellationToken,
    handle: JoinHandle<Result<(), DriverError>>,
}

impl DriverTask {
    pub fn spawn(driver: ConversationDriver, ctx: DriverContext) -> Self {
        let cancel = CancellationToken::new();
        let token = cancel.clone();
        let handle = tokio::spawn(async move {
            let room_id = ctx.room_id.clone();
            let result = driver.run(ctx, token).await;
            if let Err(ref e) = result {
                error!(room_id = %room_id, error = %e, "Conversation driver exited with error");
            }
            result
        });
        Self { cancel, handle }
    }

    pub fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }

    /// Cancel the driver and wait for it to wind down.
    ///
    /// Cancellation itself is not an error; a driver failure or panic is.
    pub async fn stop(self, timeout: Duration) -> Result<(), DriverError> {
        self.cancel.cancel();
        let mut handle = self.handle;
        match tokio::time::timeout(timeout, &mut handle).await {
            Ok(Ok(result)) => result,
            Ok(Err(e)) if e.is_cancelled() => Ok(()),
            Ok(Err(e)) => Err(DriverError::Panicked(e.to_string())),
            Err(_) => {
                handle.abort();
                Err(DriverError::StopTimeout(timeout))
            }
        }
    }
}
