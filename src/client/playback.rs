use std::collections::HashMap;
use std::path::Path;
use std::sync::{Arc, Mutex};

use bytes::Bytes;
use uuid::Uuid;

pub const DOWNLOAD_FILE_NAME: &str = "voice.mp3";

#[derive(thiserror::Error, Debug)]
pub enum PlaybackError {
    #[error("Playback handle {0} has been revoked")]
    Revoked(String),

    #[error("Playback blocked: {0}")]
    Blocked(String),

    #[error("Audio decoding failed: {0}")]
    Decode(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Local store behind playback handles, the equivalent of a browser's
/// object-URL table.
#[derive(Clone, Default)]
pub struct HandleRegistry {
    entries: Arc<Mutex<HashMap<String, Bytes>>>,
}

impl HandleRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn create(&self, audio: Bytes) -> PlaybackHandle {
        let url = format!("blob:voice-proxy/{}", Uuid::new_v4());
        tracing::debug!("Created playback handle {} ({} bytes)", url, audio.len());
        self.entries.lock().unwrap().insert(url.clone(), audio);
        PlaybackHandle {
            url,
            registry: self.clone(),
        }
    }

    pub fn resolve(&self, url: &str) -> Option<Bytes> {
        self.entries.lock().unwrap().get(url).cloned()
    }

    /// Number of handles whose backing audio is still held.
    pub fn live_count(&self) -> usize {
        self.entries.lock().unwrap().len()
    }

    fn revoke(&self, url: &str) {
        if self.entries.lock().unwrap().remove(url).is_some() {
            tracing::debug!("Revoked playback handle {}", url);
        }
    }
}

/// Revocable reference to synthesized audio. Dropping it releases the
/// backing bytes.
pub struct PlaybackHandle {
    url: String,
    registry: HandleRegistry,
}

impl PlaybackHandle {
    pub fn url(&self) -> &str {
        &self.url
    }

    pub fn audio(&self) -> Result<Bytes, PlaybackError> {
        self.registry
            .resolve(&self.url)
            .ok_or_else(|| PlaybackError::Revoked(self.url.clone()))
    }

    /// The download action: writes the audio to `path`.
    pub async fn save_to(&self, path: impl AsRef<Path>) -> Result<(), PlaybackError> {
        let audio = self.audio()?;
        tokio::fs::write(path.as_ref(), &audio).await?;
        tracing::info!("Saved {} bytes to {}", audio.len(), path.as_ref().display());
        Ok(())
    }

    /// Releases the audio now instead of at drop.
    pub fn revoke(self) {
        drop(self)
    }
}

impl Drop for PlaybackHandle {
    fn drop(&mut self) {
        self.registry.revoke(&self.url);
    }
}

impl std::fmt::Debug for PlaybackHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_tuple("PlaybackHandle").field(&self.url).finish()
    }
}

/// Attempt playback, report success or failure.
pub trait Player {
    fn play(&self, audio: &PlaybackHandle) -> Result<(), PlaybackError>;
}

/// For environments without an audio device: every attempt is blocked.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullPlayer;

impl Player for NullPlayer {
    fn play(&self, _audio: &PlaybackHandle) -> Result<(), PlaybackError> {
        Err(PlaybackError::Blocked("no audio output available".into()))
    }
}

#[cfg(feature = "audio-playback")]
pub use rodio_player::RodioPlayer;

#[cfg(feature = "audio-playback")]
mod rodio_player {
    use std::io::Cursor;
    use std::sync::Mutex;

    use rodio::{Decoder, OutputStream, OutputStreamHandle, Sink};

    use super::{PlaybackError, PlaybackHandle, Player};

    /// Plays through the default output device. A new `play` stops whatever
    /// was playing before.
    pub struct RodioPlayer {
        _stream: OutputStream,
        handle: OutputStreamHandle,
        current: Mutex<Option<Sink>>,
    }

    impl RodioPlayer {
        pub fn try_default() -> Result<Self, PlaybackError> {
            let (stream, handle) = OutputStream::try_default()
                .map_err(|e| PlaybackError::Blocked(e.to_string()))?;
            Ok(Self {
                _stream: stream,
                handle,
                current: Mutex::new(None),
            })
        }

        /// Blocks until the current audio has finished.
        pub fn wait_until_end(&self) {
            if let Some(sink) = self.current.lock().unwrap().as_ref() {
                sink.sleep_until_end();
            }
        }
    }

    impl Player for RodioPlayer {
        fn play(&self, audio: &PlaybackHandle) -> Result<(), PlaybackError> {
            let bytes = audio.audio()?;
            let source =
                Decoder::new(Cursor::new(bytes)).map_err(|e| PlaybackError::Decode(e.to_string()))?;
            let sink =
                Sink::try_new(&self.handle).map_err(|e| PlaybackError::Blocked(e.to_string()))?;
            sink.append(source);

            if let Some(previous) = self.current.lock().unwrap().replace(sink) {
                previous.stop();
            }
            Ok(())
        }
    }
}
