//! Front-end side of the proxy: the calls a UI makes, the playback handles it
//! holds, and the state machine tying them together.

pub mod api;
pub mod console;
pub mod playback;

pub use api::{ProxyClient, SpeechApi, SynthesisReply, VoiceListing};
pub use console::{LoadTicket, UiState, VoiceConsole};
pub use playback::{HandleRegistry, NullPlayer, PlaybackError, PlaybackHandle, Player};

#[cfg(feature = "audio-playback")]
pub use playback::RodioPlayer;

#[derive(thiserror::Error, Debug)]
pub enum ClientError {
    #[error("Invalid server URL: {0}")]
    InvalidUrl(String),

    #[error("{0}")]
    Network(#[from] reqwest::Error),

    #[error("Unexpected response: {0}")]
    UnexpectedPayload(String),
}
