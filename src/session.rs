use std::path::Path;
use std::sync::{Arc, Mutex};
use std::thread::JoinHandle;

use tracing::info;

use crate::error::MacroError;
use crate::event::Event;
use crate::lock;
use crate::player::{Injector, PlaybackReport, Player, Repeat, SystemInjector};
use crate::recorder::{self, CaptureStarter, Recorder, SharedEvents};

/// What the session is doing right now. Recording and playback are mutually
/// exclusive; every state change goes through [`Session`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Idle,
    Recording,
    Playing,
}

/// Owns the macro buffer and coordinates the recorder and player behind a
/// single front door shared by the CLI and the GUI.
pub struct Session {
    events: SharedEvents,
    recorder: Recorder,
    player: Arc<Player>,
    playback: Option<JoinHandle<()>>,
    last_report: Arc<Mutex<Option<PlaybackReport>>>,
}

impl Default for Session {
    fn default() -> Self {
        Self::new()
    }
}

impl Session {
    pub fn new() -> Self {
        let events: SharedEvents = Arc::new(Mutex::new(Vec::new()));
        Self {
            recorder: Recorder::new(Arc::clone(&events)),
            events,
            player: Arc::new(Player::new()),
            playback: None,
            last_report: Arc::new(Mutex::new(None)),
        }
    }

    /// Session with a swapped-in capture backend, for tests.
    pub fn with_starter(starter: CaptureStarter) -> Self {
        let events: SharedEvents = Arc::new(Mutex::new(Vec::new()));
        Self {
            recorder: Recorder::with_starter(Arc::clone(&events), starter),
            events,
            player: Arc::new(Player::new()),
            playback: None,
            last_report: Arc::new(Mutex::new(None)),
        }
    }

    pub fn phase(&self) -> Phase {
        if self.recorder.is_recording() {
            Phase::Recording
        } else if self.player.is_playing() {
            Phase::Playing
        } else {
            Phase::Idle
        }
    }

    pub fn start_recording(&mut self) -> Result<(), MacroError> {
        match self.phase() {
            Phase::Recording => Err(MacroError::AlreadyRecording),
            Phase::Playing => Err(MacroError::PlaybackInProgress),
            Phase::Idle => self.recorder.start_recording(),
        }
    }

    /// Stops the active recording and returns how many events it captured.
    pub fn stop_recording(&mut self) -> usize {
        self.recorder.stop_recording().len()
    }

    /// True once the stop hotkey was seen or the capture backend died.
    pub fn stop_requested(&self) -> bool {
        self.recorder.stop_requested()
    }

    /// The capture failure that cut the recording short, if any.
    pub fn recording_failure(&self) -> Option<String> {
        self.recorder.failure()
    }

    /// Launches playback of the buffered macro on a background thread.
    pub fn start_playback(&mut self, repeat: Repeat, speed: f64) -> Result<(), MacroError> {
        self.start_playback_with(SystemInjector, repeat, speed)
    }

    pub fn start_playback_with<I>(
        &mut self,
        mut injector: I,
        repeat: Repeat,
        speed: f64,
    ) -> Result<(), MacroError>
    where
        I: Injector + Send + 'static,
    {
        match self.phase() {
            Phase::Recording => return Err(MacroError::RecordingInProgress),
            Phase::Playing => return Err(MacroError::PlaybackInProgress),
            Phase::Idle => {}
        }
        if !(speed > 0.0) {
            return Err(MacroError::InvalidSpeed(speed));
        }

        // Playback runs off a snapshot; later edits to the buffer do not
        // affect a run already in flight.
        let events: Vec<Event> = lock(&self.events).clone();
        if !events.iter().any(|event| !event.is_control()) {
            return Err(MacroError::EmptyMacro);
        }

        if let Some(done) = self.playback.take() {
            let _ = done.join();
        }

        // Claim the playing flag before spawning so the phase flips to
        // Playing before this call returns; a start_recording issued right
        // after cannot slip in while the worker is still warming up.
        self.player.admit()?;

        let player = Arc::clone(&self.player);
        let last_report = Arc::clone(&self.last_report);
        let handle = std::thread::Builder::new()
            .name("playback".into())
            .spawn(move || {
                let report = player.run(&mut injector, &events, repeat, speed);
                *lock(&last_report) = Some(report);
            })
            .map_err(|source| {
                self.player.release();
                MacroError::Spawn {
                    name: "playback",
                    source,
                }
            })?;
        self.playback = Some(handle);
        info!(?repeat, speed, "playback started");
        Ok(())
    }

    /// Requests the in-flight playback to stop at its next event boundary.
    pub fn stop_playback(&self) {
        self.player.stop();
    }

    /// Report from the most recently finished playback run.
    pub fn last_report(&self) -> Option<PlaybackReport> {
        *lock(&self.last_report)
    }

    /// Writes the buffered macro to `path`. Rejected while recording, since
    /// the buffer is still growing.
    pub fn save(&self, path: &Path) -> Result<usize, MacroError> {
        if self.recorder.is_recording() {
            return Err(MacroError::RecordingInProgress);
        }
        let events = lock(&self.events).clone();
        recorder::save_macro(path, &events)?;
        Ok(events.iter().filter(|event| !event.is_control()).count())
    }

    /// Replaces the buffer with the macro at `path`. Only allowed while
    /// idle, and the buffer is untouched when the file fails to parse.
    pub fn load(&mut self, path: &Path) -> Result<usize, MacroError> {
        match self.phase() {
            Phase::Recording => return Err(MacroError::RecordingInProgress),
            Phase::Playing => return Err(MacroError::PlaybackInProgress),
            Phase::Idle => {}
        }
        let events = recorder::load_macro(path)?;
        let count = events.len();
        *lock(&self.events) = events;
        Ok(count)
    }

    /// Shared handle to the event buffer, used by the GUI log view.
    pub fn events_handle(&self) -> SharedEvents {
        Arc::clone(&self.events)
    }

    pub fn event_count(&self) -> usize {
        lock(&self.events).len()
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        self.player.stop();
        if let Some(playback) = self.playback.take() {
            let _ = playback.join();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capture::CaptureControl;
    use rdev::{EventType, SimulateError};
    use std::thread;
    use std::time::Duration;

    type Callback = Box<dyn FnMut(Event) + Send>;

    struct FakeCapture;

    impl CaptureControl for FakeCapture {
        fn stop(&mut self) {}
    }

    fn fake_starter(slot: Arc<Mutex<Option<Callback>>>) -> CaptureStarter {
        Box::new(move |callback| {
            *slot.lock().unwrap() = Some(callback);
            Ok(Box::new(FakeCapture))
        })
    }

    struct NullInjector;

    impl Injector for NullInjector {
        fn inject(&mut self, _action: &EventType) -> Result<(), SimulateError> {
            Ok(())
        }
    }

    fn key_press(key: &str, time: f64) -> Event {
        Event::KeyPress {
            key: key.into(),
            time,
        }
    }

    fn session_with_macro(events: Vec<Event>) -> (Session, Arc<Mutex<Option<Callback>>>) {
        let slot = Arc::new(Mutex::new(None));
        let session = Session::with_starter(fake_starter(Arc::clone(&slot)));
        *session.events_handle().lock().unwrap() = events;
        (session, slot)
    }

    fn wait_until_idle(session: &Session) {
        while session.phase() != Phase::Idle {
            thread::sleep(Duration::from_millis(5));
        }
    }

    #[test]
    fn recording_blocks_playback_and_vice_versa() {
        let (mut session, slot) = session_with_macro(vec![key_press("KeyA", 0.0)]);

        session.start_recording().unwrap();
        assert_eq!(session.phase(), Phase::Recording);
        assert!(matches!(
            session.start_playback_with(NullInjector, Repeat::Times(1), 1.0),
            Err(MacroError::RecordingInProgress)
        ));
        session.stop_recording();

        // Buffer was cleared by the recording; refill it through the
        // capture callback so there is something to play.
        slot.lock().unwrap().as_mut().unwrap()(key_press("KeyA", 0.0));
        slot.lock().unwrap().as_mut().unwrap()(key_press("KeyB", 0.3));

        session
            .start_playback_with(NullInjector, Repeat::Times(50), 1.0)
            .unwrap();
        while session.phase() != Phase::Playing {
            thread::sleep(Duration::from_millis(2));
        }
        assert!(matches!(
            session.start_recording(),
            Err(MacroError::PlaybackInProgress)
        ));

        session.stop_playback();
        wait_until_idle(&session);
    }

    #[test]
    fn phase_is_playing_before_start_playback_returns() {
        struct SlowInjector;

        impl Injector for SlowInjector {
            fn inject(&mut self, _action: &EventType) -> Result<(), SimulateError> {
                thread::sleep(Duration::from_millis(20));
                Ok(())
            }
        }

        let (mut session, _slot) =
            session_with_macro(vec![key_press("KeyA", 0.0), key_press("KeyB", 0.0)]);
        session
            .start_playback_with(SlowInjector, Repeat::Times(1), 1.0)
            .unwrap();

        // No waiting: the claim must be visible the moment the call returns,
        // even though the worker thread may not have run yet.
        assert_eq!(session.phase(), Phase::Playing);
        assert!(matches!(
            session.start_recording(),
            Err(MacroError::PlaybackInProgress)
        ));
        assert!(matches!(
            session.start_playback_with(NullInjector, Repeat::Times(1), 1.0),
            Err(MacroError::PlaybackInProgress)
        ));

        wait_until_idle(&session);
    }

    #[test]
    fn playback_of_empty_buffer_is_rejected() {
        let (mut session, _slot) = session_with_macro(Vec::new());
        assert!(matches!(
            session.start_playback_with(NullInjector, Repeat::Times(1), 1.0),
            Err(MacroError::EmptyMacro)
        ));

        // Control-only buffers count as empty too.
        *session.events_handle().lock().unwrap() = vec![Event::StopRequest { time: 0.0 }];
        assert!(matches!(
            session.start_playback_with(NullInjector, Repeat::Times(1), 1.0),
            Err(MacroError::EmptyMacro)
        ));
    }

    #[test]
    fn playback_finishes_and_reports() {
        let (mut session, _slot) =
            session_with_macro(vec![key_press("KeyA", 0.0), key_press("KeyB", 0.0)]);
        session
            .start_playback_with(NullInjector, Repeat::Times(2), 1.0)
            .unwrap();
        let report = loop {
            if let Some(report) = session.last_report() {
                break report;
            }
            thread::sleep(Duration::from_millis(5));
        };
        assert_eq!(report.iterations, 2);
        assert_eq!(report.injected, 4);
    }

    #[test]
    fn load_is_rejected_while_busy() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("macro.json");
        recorder::save_macro(&path, &[key_press("KeyA", 0.0)]).unwrap();

        let (mut session, _slot) = session_with_macro(vec![key_press("KeyB", 0.0)]);
        session.start_recording().unwrap();
        assert!(matches!(
            session.load(&path),
            Err(MacroError::RecordingInProgress)
        ));
        session.stop_recording();
    }

    #[test]
    fn failed_load_leaves_buffer_untouched() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("broken.json");
        std::fs::write(&path, "[{]").unwrap();

        let original = vec![key_press("KeyA", 0.0)];
        let (mut session, _slot) = session_with_macro(original.clone());
        assert!(session.load(&path).is_err());
        assert_eq!(*session.events_handle().lock().unwrap(), original);
    }

    #[test]
    fn save_then_load_preserves_the_buffer() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("macro.json");

        let events = vec![key_press("KeyA", 0.0), key_press("KeyB", 0.7)];
        let (mut session, _slot) = session_with_macro(events.clone());
        assert_eq!(session.save(&path).unwrap(), 2);

        *session.events_handle().lock().unwrap() = Vec::new();
        assert_eq!(session.load(&path).unwrap(), 2);
        assert_eq!(*session.events_handle().lock().unwrap(), events);
    }
}
