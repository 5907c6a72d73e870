use super::api::{SpeechApi, SynthesisReply, VoiceListing};
use super::playback::{HandleRegistry, PlaybackHandle, Player};
use super::ClientError;
use crate::upstream::Voice;

pub const GENERATE_FAILED: &str = "Failed to generate audio.";

/// Mutually exclusive phases of the front-end.
#[derive(Debug, Default)]
pub enum UiState {
    #[default]
    Idle,
    LoadingVoices,
    VoicesReady,
    /// The last result stays alive until the new one replaces it.
    Generating { previous: Option<PlaybackHandle> },
    PlaybackReady(PlaybackHandle),
    Error(String),
}

/// Identifies one voice load so a stale or orphaned response can be ignored.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LoadTicket(u64);

/// Voice picker, text box and player, driven by explicit transitions.
pub struct VoiceConsole<P: Player> {
    text: String,
    voices: Vec<Voice>,
    selected: Option<String>,
    state: UiState,
    registry: HandleRegistry,
    player: P,
    mounted: bool,
    load_epoch: u64,
}

impl<P: Player> VoiceConsole<P> {
    pub fn new(player: P) -> Self {
        Self {
            text: String::new(),
            voices: Vec::new(),
            selected: None,
            state: UiState::Idle,
            registry: HandleRegistry::new(),
            player,
            mounted: false,
            load_epoch: 0,
        }
    }

    pub fn state(&self) -> &UiState {
        &self.state
    }

    pub fn voices(&self) -> &[Voice] {
        &self.voices
    }

    pub fn selected_voice(&self) -> Option<&str> {
        self.selected.as_deref()
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn player(&self) -> &P {
        &self.player
    }

    pub fn registry(&self) -> &HandleRegistry {
        &self.registry
    }

    pub fn error(&self) -> Option<&str> {
        match &self.state {
            UiState::Error(message) => Some(message),
            _ => None,
        }
    }

    pub fn playback(&self) -> Option<&PlaybackHandle> {
        match &self.state {
            UiState::PlaybackReady(handle) => Some(handle),
            _ => None,
        }
    }

    pub fn is_generating(&self) -> bool {
        matches!(self.state, UiState::Generating { .. })
    }

    /// Whether the generate action is currently enabled.
    pub fn can_generate(&self) -> bool {
        !self.is_generating() && !self.text.trim().is_empty() && self.selected.is_some()
    }

    pub fn set_text(&mut self, text: impl Into<String>) {
        self.text = text.into();
    }

    /// Selects a voice from the loaded list. Unknown ids are ignored.
    pub fn select_voice(&mut self, id: &str) -> bool {
        if self.voices.iter().any(|v| v.id == id) {
            self.selected = Some(id.to_string());
            true
        } else {
            tracing::warn!("Ignoring unknown voice '{}'", id);
            false
        }
    }

    /// Mounts the console and starts a voice load.
    pub fn begin_voice_load(&mut self) -> LoadTicket {
        self.mounted = true;
        self.load_epoch += 1;
        self.state = UiState::LoadingVoices;
        LoadTicket(self.load_epoch)
    }

    /// Applies a voice load result. Returns `false` when the result was
    /// discarded because the console was unmounted or a newer load started.
    pub fn finish_voice_load(
        &mut self,
        ticket: LoadTicket,
        result: Result<VoiceListing, ClientError>,
    ) -> bool {
        if !self.mounted || ticket.0 != self.load_epoch {
            tracing::debug!("Discarding stale voice list response");
            return false;
        }

        match result {
            Ok(VoiceListing::Voices(voices)) => {
                tracing::info!("Loaded {} voices", voices.len());
                self.selected = voices.first().map(|v| v.id.clone());
                self.voices = voices;
                self.state = UiState::VoicesReady;
            }
            Ok(VoiceListing::Failed(message)) => {
                self.fail(format!("Failed to load voices: {}", message));
            }
            Err(e) => {
                self.fail(format!("Network error while loading voices: {}", e));
            }
        }
        true
    }

    pub async fn load_voices<A: SpeechApi + ?Sized>(&mut self, api: &A) -> bool {
        let ticket = self.begin_voice_load();
        let result = api.fetch_voices().await;
        self.finish_voice_load(ticket, result)
    }

    pub async fn generate<A: SpeechApi + ?Sized>(&mut self, api: &A) {
        if self.text.trim().is_empty() {
            self.fail("Enter some text");
            return;
        }
        let Some(voice) = self.selected.clone() else {
            self.fail("Select a voice");
            return;
        };

        let previous = match std::mem::take(&mut self.state) {
            UiState::PlaybackReady(handle) => Some(handle),
            UiState::Generating { previous } => previous,
            _ => None,
        };
        self.state = UiState::Generating { previous };

        match api.synthesize(&self.text, &voice).await {
            Ok(SynthesisReply::Audio(audio)) => self.install(audio),
            Ok(SynthesisReply::Rejected(detail)) => {
                let message = match detail {
                    Some(detail) => format!("{} {}", GENERATE_FAILED, detail),
                    None => GENERATE_FAILED.to_string(),
                };
                self.fail(message);
            }
            Err(e) => self.fail(format!("{} {}", GENERATE_FAILED, e)),
        }
    }

    /// Tears the console down, releasing any held audio.
    pub fn unmount(&mut self) {
        self.mounted = false;
        self.state = UiState::Idle;
    }

    fn install(&mut self, audio: bytes::Bytes) {
        // Release the superseded audio before the new handle exists
        if let UiState::Generating { previous: Some(old) } = std::mem::take(&mut self.state) {
            old.revoke();
        }

        let handle = self.registry.create(audio);
        if let Err(e) = self.player.play(&handle) {
            tracing::warn!("Autoplay blocked: {}", e);
        }
        self.state = UiState::PlaybackReady(handle);
    }

    fn fail(&mut self, message: impl Into<String>) {
        let message = message.into();
        tracing::warn!("{}", message);
        self.state = UiState::Error(message);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::playback::PlaybackError;
    use async_trait::async_trait;
    use bytes::Bytes;
    use std::cell::Cell;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    struct FakeApi {
        listing: Mutex<Option<Result<VoiceListing, ClientError>>>,
        replies: Mutex<Vec<SynthesisReply>>,
        synth_calls: AtomicUsize,
    }

    impl FakeApi {
        fn with_voices(voices: &[(&str, &str)]) -> Self {
            let voices = voices
                .iter()
                .map(|(id, name)| Voice {
                    id: id.to_string(),
                    name: name.to_string(),
                })
                .collect();
            Self {
                listing: Mutex::new(Some(Ok(VoiceListing::Voices(voices)))),
                replies: Mutex::new(Vec::new()),
                synth_calls: AtomicUsize::new(0),
            }
        }

        fn reply_with(self, reply: SynthesisReply) -> Self {
            self.replies.lock().unwrap().push(reply);
            self
        }

        fn calls(&self) -> usize {
            self.synth_calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl SpeechApi for FakeApi {
        async fn fetch_voices(&self) -> Result<VoiceListing, ClientError> {
            self.listing
                .lock()
                .unwrap()
                .take()
                .unwrap_or(Ok(VoiceListing::Voices(Vec::new())))
        }

        async fn synthesize(&self, _text: &str, _voice: &str) -> Result<SynthesisReply, ClientError> {
            self.synth_calls.fetch_add(1, Ordering::SeqCst);
            let mut replies = self.replies.lock().unwrap();
            Ok(if replies.is_empty() {
                SynthesisReply::Rejected(None)
            } else {
                replies.remove(0)
            })
        }
    }

    #[derive(Default)]
    struct CountingPlayer {
        plays: Cell<usize>,
        blocked: bool,
    }

    impl Player for CountingPlayer {
        fn play(&self, audio: &PlaybackHandle) -> Result<(), PlaybackError> {
            audio.audio()?;
            self.plays.set(self.plays.get() + 1);
            if self.blocked {
                Err(PlaybackError::Blocked("autoplay policy".into()))
            } else {
                Ok(())
            }
        }
    }

    fn audio(bytes: &'static [u8]) -> SynthesisReply {
        SynthesisReply::Audio(Bytes::from_static(bytes))
    }

    async fn ready_console(api: &FakeApi) -> VoiceConsole<CountingPlayer> {
        let mut console = VoiceConsole::new(CountingPlayer::default());
        assert!(console.load_voices(api).await);
        console.set_text("hello");
        console
    }

    #[tokio::test]
    async fn mount_selects_first_voice() {
        let api = FakeApi::with_voices(&[("v1", "Alice"), ("v2", "Bob")]);
        let console = ready_console(&api).await;

        assert!(matches!(console.state(), UiState::VoicesReady));
        assert_eq!(console.voices().len(), 2);
        assert_eq!(console.selected_voice(), Some("v1"));
        assert!(console.can_generate());
    }

    #[tokio::test]
    async fn voice_error_payload_becomes_error_state() {
        let api = FakeApi::with_voices(&[]);
        *api.listing.lock().unwrap() = Some(Ok(VoiceListing::Failed("ELEVENLABS_API_KEY is not set".into())));

        let mut console = VoiceConsole::new(CountingPlayer::default());
        console.load_voices(&api).await;
        assert_eq!(
            console.error(),
            Some("Failed to load voices: ELEVENLABS_API_KEY is not set")
        );
    }

    #[test]
    fn response_after_unmount_is_discarded() {
        let mut console = VoiceConsole::new(CountingPlayer::default());
        let ticket = console.begin_voice_load();
        assert!(matches!(console.state(), UiState::LoadingVoices));

        console.unmount();
        let applied = console.finish_voice_load(
            ticket,
            Ok(VoiceListing::Voices(vec![Voice {
                id: "v1".into(),
                name: "Alice".into(),
            }])),
        );

        assert!(!applied);
        assert!(console.voices().is_empty());
        assert!(matches!(console.state(), UiState::Idle));
    }

    #[test]
    fn superseded_load_is_discarded() {
        let mut console = VoiceConsole::new(CountingPlayer::default());
        let stale = console.begin_voice_load();
        let fresh = console.begin_voice_load();

        assert!(!console.finish_voice_load(stale, Ok(VoiceListing::Failed("old".into()))));
        assert!(console.finish_voice_load(fresh, Ok(VoiceListing::Voices(Vec::new()))));
        assert!(matches!(console.state(), UiState::VoicesReady));
        assert_eq!(console.selected_voice(), None);
    }

    #[tokio::test]
    async fn blank_text_fails_without_request() {
        let api = FakeApi::with_voices(&[("v1", "Alice")]);
        let mut console = ready_console(&api).await;
        console.set_text("   \n");

        assert!(!console.can_generate());
        console.generate(&api).await;
        assert_eq!(console.error(), Some("Enter some text"));
        assert_eq!(api.calls(), 0);
    }

    #[tokio::test]
    async fn missing_voice_fails_without_request() {
        let api = FakeApi::with_voices(&[]);
        let mut console = ready_console(&api).await;

        assert!(!console.select_voice("ghost"));
        console.generate(&api).await;
        assert_eq!(console.error(), Some("Select a voice"));
        assert_eq!(api.calls(), 0);
    }

    #[tokio::test]
    async fn audio_reply_becomes_playable_handle() {
        let api = FakeApi::with_voices(&[("v1", "Alice")]).reply_with(audio(b"mp3-one"));
        let mut console = ready_console(&api).await;

        console.generate(&api).await;
        let handle = console.playback().expect("playback ready");
        assert_eq!(handle.audio().unwrap(), Bytes::from_static(b"mp3-one"));
        assert_eq!(console.player().plays.get(), 1);
        assert_eq!(console.registry().live_count(), 1);
    }

    #[tokio::test]
    async fn new_audio_releases_previous_handle() {
        let api = FakeApi::with_voices(&[("v1", "Alice"), ("v2", "Bob")])
            .reply_with(audio(b"first"))
            .reply_with(audio(b"second"));
        let mut console = ready_console(&api).await;

        console.generate(&api).await;
        let first_url = console.playback().unwrap().url().to_string();

        assert!(console.select_voice("v2"));
        console.generate(&api).await;
        let second = console.playback().unwrap();

        assert_ne!(second.url(), first_url);
        assert!(console.registry().resolve(&first_url).is_none());
        assert_eq!(console.registry().live_count(), 1);
        assert_eq!(second.audio().unwrap(), Bytes::from_static(b"second"));
    }

    #[tokio::test]
    async fn server_error_is_shown_without_playback() {
        let api = FakeApi::with_voices(&[("v1", "Alice")])
            .reply_with(SynthesisReply::Rejected(Some("rate limited".into())));
        let mut console = ready_console(&api).await;

        console.generate(&api).await;
        assert!(console.error().unwrap().contains("rate limited"));
        assert!(console.playback().is_none());
        assert_eq!(console.player().plays.get(), 0);
        assert_eq!(console.registry().live_count(), 0);
    }

    #[tokio::test]
    async fn empty_rejection_gets_generic_message() {
        let api = FakeApi::with_voices(&[("v1", "Alice")]);
        let mut console = ready_console(&api).await;

        console.generate(&api).await;
        assert_eq!(console.error(), Some(GENERATE_FAILED));
    }

    #[tokio::test]
    async fn blocked_autoplay_still_offers_playback() {
        let api = FakeApi::with_voices(&[("v1", "Alice")]).reply_with(audio(b"mp3"));
        let mut console = VoiceConsole::new(CountingPlayer {
            blocked: true,
            ..Default::default()
        });
        console.load_voices(&api).await;
        console.set_text("hello");

        console.generate(&api).await;
        assert!(console.playback().is_some());
        assert!(console.error().is_none());
        assert_eq!(console.player().plays.get(), 1);
    }

    #[tokio::test]
    async fn success_clears_previous_error() {
        let api = FakeApi::with_voices(&[("v1", "Alice")]).reply_with(audio(b"mp3"));
        let mut console = ready_console(&api).await;

        console.set_text("");
        console.generate(&api).await;
        assert!(console.error().is_some());

        console.set_text("hello again");
        console.generate(&api).await;
        assert!(console.error().is_none());
        assert!(console.playback().is_some());
    }

    #[tokio::test]
    async fn unmount_releases_audio() {
        let api = FakeApi::with_voices(&[("v1", "Alice")]).reply_with(audio(b"mp3"));
        let mut console = ready_console(&api).await;
        console.generate(&api).await;
        assert_eq!(console.registry().live_count(), 1);

        console.unmount();
        assert_eq!(console.registry().live_count(), 0);
        assert!(matches!(console.state(), UiState::Idle));
    }
}
