//! Record and replay global keyboard and mouse macros.
//!
//! [`Session`] is the front door: it owns the event buffer and keeps
//! recording and playback mutually exclusive. The [`cli`] and [`gui`]
//! modules are thin front ends over it.

use std::sync::{Mutex, MutexGuard, PoisonError};

pub mod capture;
pub mod cli;
pub mod error;
pub mod event;
pub mod gui;
pub mod keycodes;
pub mod player;
pub mod recorder;
pub mod session;

pub use error::MacroError;
pub use event::Event;
pub use player::{PlaybackReport, Player, Repeat};
pub use recorder::{load_macro, save_macro, Recorder};
pub use session::{Phase, Session};

/// Locks a mutex, continuing through poisoning. Every guarded value here
/// stays consistent even if a holder panicked mid-update.
pub(crate) fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}
