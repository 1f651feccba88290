//! Capture backend over the OS-level global input hook.
//!
//! The hook itself (`rdev::listen`) blocks its thread for the life of the
//! process and cannot be torn down portably, so it is spawned lazily at most
//! once and kept isolated on its own thread. Capture sessions communicate
//! with it one-directionally: the hook thread converts raw events and pushes
//! them onto a bounded queue, and a per-session consumer thread drains the
//! queue and invokes the session callback. Downstream code never touches the
//! hook directly.
//!
//! Control markers (`StopRequest`, `CaptureError`, `ListenerExit`) travel on
//! the same queue as input events so a consumer observes hook loss in-stream
//! instead of hanging on a silent channel.

use std::sync::mpsc::{sync_channel, Receiver, SyncSender, TrySendError};
use std::sync::Mutex;
use std::thread::{self, JoinHandle};
use std::time::Instant;

use once_cell::sync::OnceCell;
use rdev::{EventType, Key};
use tracing::{debug, warn};

use crate::error::MacroError;
use crate::event::Event;
use crate::keycodes::{button_to_string, key_to_string};
use crate::lock;

/// Matches the original recorder's inter-process queue bound.
pub const QUEUE_CAPACITY: usize = 10_000;

/// Pressing this during a recording emits a `StopRequest` control event.
pub const STOP_HOTKEY: Key = Key::F2;

type HotkeyHandler = Box<dyn FnMut(Key, bool) + Send>;

struct Subscription {
    tx: SyncSender<Event>,
    started: Instant,
    pointer: (f64, f64),
}

static HOOK: OnceCell<()> = OnceCell::new();
static HOOK_FAILURE: Mutex<Option<String>> = Mutex::new(None);
static SUBSCRIPTION: Mutex<Option<Subscription>> = Mutex::new(None);
static HOTKEY_HANDLER: Mutex<Option<HotkeyHandler>> = Mutex::new(None);

/// Anything that can tear down an active capture session. The recorder holds
/// sessions through this trait so it can be driven by a fake in tests.
pub trait CaptureControl: Send {
    fn stop(&mut self);
}

/// Handle to an active capture session; dropping it stops the session.
pub struct CaptureHandle {
    consumer: Option<JoinHandle<()>>,
}

/// Starts delivering global input events to `callback` on a dedicated
/// consumer thread. Fails if another session is active or the hook is gone.
pub fn start<F>(callback: F) -> Result<CaptureHandle, MacroError>
where
    F: FnMut(Event) + Send + 'static,
{
    ensure_hook()?;

    let (tx, rx) = sync_channel(QUEUE_CAPACITY);
    {
        let mut slot = lock(&SUBSCRIPTION);
        if slot.is_some() {
            return Err(MacroError::AlreadyRecording);
        }
        *slot = Some(Subscription {
            tx,
            started: Instant::now(),
            pointer: (0.0, 0.0),
        });
    }

    let consumer = thread::Builder::new()
        .name("capture-consumer".into())
        .spawn(move || consume(rx, callback))
        .map_err(|source| {
            lock(&SUBSCRIPTION).take();
            MacroError::Spawn {
                name: "capture-consumer",
                source,
            }
        })?;

    Ok(CaptureHandle {
        consumer: Some(consumer),
    })
}

/// Boxed form of [`start`] for callers that hold a [`CaptureControl`].
pub fn start_boxed(
    callback: Box<dyn FnMut(Event) + Send>,
) -> Result<Box<dyn CaptureControl>, MacroError> {
    Ok(Box::new(start(callback)?))
}

/// Routes every global key press/release through `handler`, used by the CLI
/// for its F1..F5 bindings. The GUI never installs one; its window shortcuts
/// would otherwise double-dispatch.
pub fn set_hotkey_handler<F>(handler: F) -> Result<(), MacroError>
where
    F: FnMut(Key, bool) + Send + 'static,
{
    ensure_hook()?;
    *lock(&HOTKEY_HANDLER) = Some(Box::new(handler));
    Ok(())
}

pub fn clear_hotkey_handler() {
    lock(&HOTKEY_HANDLER).take();
}

impl CaptureControl for CaptureHandle {
    fn stop(&mut self) {
        // Dropping the sender lets the consumer drain the tail and exit on
        // channel disconnect.
        lock(&SUBSCRIPTION).take();
        if let Some(consumer) = self.consumer.take() {
            let _ = consumer.join();
        }
    }
}

impl Drop for CaptureHandle {
    fn drop(&mut self) {
        self.stop();
    }
}

fn ensure_hook() -> Result<(), MacroError> {
    if let Some(message) = lock(&HOOK_FAILURE).clone() {
        return Err(MacroError::HookUnavailable(message));
    }

    HOOK.get_or_try_init(|| {
        thread::Builder::new()
            .name("input-hook".into())
            .spawn(run_hook)
            .map(|_| ())
            .map_err(|source| MacroError::Spawn {
                name: "input-hook",
                source,
            })
    })?;
    Ok(())
}

/// Body of the hook thread. `rdev::listen` blocks until the hook is lost;
/// returning at all means capture is dead for the rest of the process.
fn run_hook() {
    let result = rdev::listen(dispatch);

    let message = match result {
        Ok(()) => "global input hook terminated".to_string(),
        Err(err) => format!("global input hook failed: {err:?}"),
    };
    warn!(%message, "input hook thread exiting");
    *lock(&HOOK_FAILURE) = Some(message.clone());

    // Surface the loss to any active session, then cut it off.
    let mut slot = lock(&SUBSCRIPTION);
    if let Some(sub) = slot.as_mut() {
        let _ = sub.tx.try_send(Event::CaptureError { message });
        let _ = sub.tx.try_send(Event::ListenerExit);
    }
    slot.take();
}

/// Hook-thread callback for every global input event.
fn dispatch(event: rdev::Event) {
    match event.event_type {
        EventType::KeyPress(key) | EventType::KeyRelease(key) => {
            let pressed = matches!(event.event_type, EventType::KeyPress(_));
            if let Some(handler) = lock(&HOTKEY_HANDLER).as_mut() {
                handler(key, pressed);
            }
        }
        _ => {}
    }

    let mut slot = lock(&SUBSCRIPTION);
    let Some(sub) = slot.as_mut() else {
        return;
    };
    let time = sub.started.elapsed().as_secs_f64();

    let mut disconnected = false;
    // The stop hotkey ends the recording; its own press and release are
    // kept out of the buffer so replays do not re-inject it.
    match event.event_type {
        EventType::KeyPress(key) if key == STOP_HOTKEY => {
            push(&sub.tx, Event::StopRequest { time }, &mut disconnected);
        }
        EventType::KeyRelease(key) if key == STOP_HOTKEY => {}
        _ => {
            if let Some(converted) = convert(&event.event_type, time, &mut sub.pointer) {
                push(&sub.tx, converted, &mut disconnected);
            }
        }
    }
    if disconnected {
        debug!("capture consumer went away; clearing subscription");
        slot.take();
    }
}

fn push(tx: &SyncSender<Event>, event: Event, disconnected: &mut bool) {
    match tx.try_send(event) {
        Ok(()) => {}
        Err(TrySendError::Full(event)) => {
            warn!(?event, "capture queue full; dropping event");
        }
        Err(TrySendError::Disconnected(_)) => *disconnected = true,
    }
}

/// Converts a raw hook event into the recorded form, stamping the relative
/// timestamp and tracking the pointer so clicks and scrolls carry
/// coordinates (the hook only reports positions on moves).
fn convert(event_type: &EventType, time: f64, pointer: &mut (f64, f64)) -> Option<Event> {
    let event = match *event_type {
        EventType::MouseMove { x, y } => {
            *pointer = (x, y);
            Event::MouseMove { x, y, time }
        }
        EventType::ButtonPress(button) => Event::MouseClick {
            x: pointer.0,
            y: pointer.1,
            button: button_to_string(button),
            pressed: true,
            time,
        },
        EventType::ButtonRelease(button) => Event::MouseClick {
            x: pointer.0,
            y: pointer.1,
            button: button_to_string(button),
            pressed: false,
            time,
        },
        EventType::Wheel { delta_x, delta_y } => Event::MouseScroll {
            x: pointer.0,
            y: pointer.1,
            dx: delta_x,
            dy: delta_y,
            time,
        },
        EventType::KeyPress(key) => Event::KeyPress {
            key: key_to_string(key),
            time,
        },
        EventType::KeyRelease(key) => Event::KeyRelease {
            key: key_to_string(key),
            time,
        },
    };
    Some(event)
}

/// Consumer loop: forwards everything to the callback, ending on channel
/// disconnect (normal stop) or after delivering `ListenerExit` (hook loss).
fn consume<F: FnMut(Event)>(rx: Receiver<Event>, mut callback: F) {
    while let Ok(event) = rx.recv() {
        let exit = matches!(event, Event::ListenerExit);
        callback(event);
        if exit {
            break;
        }
    }
}
