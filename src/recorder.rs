use std::fs;
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use tracing::{error, info, warn};

use crate::capture::{self, CaptureControl};
use crate::error::MacroError;
use crate::event::Event;
use crate::lock;

/// The session event buffer, shared with the capture consumer while a
/// recording is live and with the GUI log view for display.
pub type SharedEvents = Arc<Mutex<Vec<Event>>>;

/// Starts a capture session delivering events to the given callback.
/// Swappable so the recorder can be exercised without real OS hooks.
pub type CaptureStarter =
    Box<dyn FnMut(Box<dyn FnMut(Event) + Send>) -> Result<Box<dyn CaptureControl>, MacroError> + Send>;

/// Accumulates captured events into an ordered buffer with relative
/// timestamps. Control events are not buffered; they flip recorder state
/// instead (stop requested, capture failed).
pub struct Recorder {
    events: SharedEvents,
    starter: CaptureStarter,
    capture: Option<Box<dyn CaptureControl>>,
    recording: bool,
    stop_requested: Arc<AtomicBool>,
    failure: Arc<Mutex<Option<String>>>,
}

impl Recorder {
    pub fn new(events: SharedEvents) -> Self {
        Self::with_starter(events, Box::new(capture::start_boxed))
    }

    pub fn with_starter(events: SharedEvents, starter: CaptureStarter) -> Self {
        Self {
            events,
            starter,
            capture: None,
            recording: false,
            stop_requested: Arc::new(AtomicBool::new(false)),
            failure: Arc::new(Mutex::new(None)),
        }
    }

    /// Clears the buffer and starts the capture backend. Fails if already
    /// recording or the input hook cannot be engaged.
    pub fn start_recording(&mut self) -> Result<(), MacroError> {
        if self.recording {
            return Err(MacroError::AlreadyRecording);
        }

        lock(&self.events).clear();
        self.stop_requested.store(false, Ordering::SeqCst);
        lock(&self.failure).take();

        let events = Arc::clone(&self.events);
        let stop_requested = Arc::clone(&self.stop_requested);
        let failure = Arc::clone(&self.failure);
        let handle = (self.starter)(Box::new(move |event| {
            ingest(&events, &stop_requested, &failure, event)
        }))?;

        self.capture = Some(handle);
        self.recording = true;
        info!("recording started");
        Ok(())
    }

    /// Stops the capture backend and returns a snapshot of the frozen buffer.
    pub fn stop_recording(&mut self) -> Vec<Event> {
        if let Some(mut capture) = self.capture.take() {
            capture.stop();
        }
        self.recording = false;
        let events = lock(&self.events).clone();
        info!(count = events.len(), "recording stopped");
        events
    }

    pub fn is_recording(&self) -> bool {
        self.recording
    }

    /// True once a stop was requested in-stream (stop hotkey) or the capture
    /// backend died. The host loop observes this and calls `stop_recording`.
    pub fn stop_requested(&self) -> bool {
        self.stop_requested.load(Ordering::SeqCst)
    }

    /// The capture failure that ended the session early, if any. Events
    /// captured before the failure remain in the buffer.
    pub fn failure(&self) -> Option<String> {
        lock(&self.failure).clone()
    }
}

fn ingest(
    events: &SharedEvents,
    stop_requested: &AtomicBool,
    failure: &Mutex<Option<String>>,
    event: Event,
) {
    match event {
        Event::StopRequest { .. } => stop_requested.store(true, Ordering::SeqCst),
        Event::CaptureError { message } => {
            error!(%message, "capture backend reported an error");
            lock(failure).get_or_insert(message);
        }
        Event::ListenerExit => {
            warn!("capture listener exited while recording");
            lock(failure).get_or_insert_with(|| "input listener exited unexpectedly".into());
            stop_requested.store(true, Ordering::SeqCst);
        }
        event => lock(events).push(event),
    }
}

/// Serializes the events as a JSON array at `path`, skipping internal
/// control events. The file is exactly the in-memory shape, hand-editable.
pub fn save_macro(path: &Path, events: &[Event]) -> Result<(), MacroError> {
    let persisted: Vec<&Event> = events.iter().filter(|event| !event.is_control()).collect();
    let json =
        serde_json::to_string_pretty(&persisted).map_err(|source| MacroError::MalformedMacro {
            path: path.to_path_buf(),
            source,
        })?;
    fs::write(path, json).map_err(|source| MacroError::WriteFile {
        path: path.to_path_buf(),
        source,
    })
}

/// Parses a macro file back into an event list. Anything other than a
/// well-formed array of event objects is rejected; the caller's buffer is
/// only replaced on success.
pub fn load_macro(path: &Path) -> Result<Vec<Event>, MacroError> {
    let text = fs::read_to_string(path).map_err(|source| MacroError::ReadFile {
        path: path.to_path_buf(),
        source,
    })?;
    serde_json::from_str(&text).map_err(|source| MacroError::MalformedMacro {
        path: path.to_path_buf(),
        source,
    })
}
