//! Hotkey-driven console front end. Bindings are global, so they work while
//! another application has focus:
//!
//!   F1  start recording        F4  play on repeat
//!   F2  stop recording         F5  stop playback
//!   F3  play once              Esc quit
//!
//! Ctrl+Shift+S saves the buffered macro, Ctrl+Shift+L loads one.

use std::io::{self, BufRead, Write};
use std::path::PathBuf;
use std::sync::mpsc::{self, RecvTimeoutError};
use std::time::Duration;

use chrono::Local;
use rdev::Key;
use tracing::warn;

use crate::capture;
use crate::player::Repeat;
use crate::session::{Phase, Session};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Command {
    StartRecording,
    StopRecording,
    PlayOnce,
    PlayForever,
    StopPlayback,
    Save,
    Load,
    Exit,
}

fn command_for(key: Key, ctrl: bool, shift: bool) -> Option<Command> {
    let command = match key {
        Key::F1 => Command::StartRecording,
        Key::F2 => Command::StopRecording,
        Key::F3 => Command::PlayOnce,
        Key::F4 => Command::PlayForever,
        Key::F5 => Command::StopPlayback,
        Key::KeyS if ctrl && shift => Command::Save,
        Key::KeyL if ctrl && shift => Command::Load,
        Key::Escape => Command::Exit,
        _ => return None,
    };
    Some(command)
}

pub fn run() -> anyhow::Result<()> {
    let mut session = Session::new();

    let (tx, rx) = mpsc::channel();
    let mut ctrl = false;
    let mut shift = false;
    capture::set_hotkey_handler(move |key, pressed| {
        match key {
            Key::ControlLeft | Key::ControlRight => ctrl = pressed,
            Key::ShiftLeft | Key::ShiftRight => shift = pressed,
            _ => {}
        }
        if pressed {
            if let Some(command) = command_for(key, ctrl, shift) {
                let _ = tx.send(command);
            }
        }
    })?;

    println!("macroplay");
    println!("  F1  start recording      F4  play on repeat");
    println!("  F2  stop recording       F5  stop playback");
    println!("  F3  play once            Esc quit");
    println!("  Ctrl+Shift+S save        Ctrl+Shift+L load");
    println!();

    loop {
        let command = match rx.recv_timeout(Duration::from_millis(200)) {
            Ok(command) => command,
            Err(RecvTimeoutError::Timeout) => {
                // The stop hotkey and capture failures both surface through
                // the stop flag; fold them into a stop command.
                if session.stop_requested() {
                    Command::StopRecording
                } else {
                    continue;
                }
            }
            Err(RecvTimeoutError::Disconnected) => break,
        };

        match command {
            Command::StartRecording => match session.start_recording() {
                Ok(()) => println!("recording... press F2 to stop"),
                Err(err) => println!("cannot record: {err}"),
            },
            Command::StopRecording => {
                if session.phase() == Phase::Recording {
                    let count = session.stop_recording();
                    match session.recording_failure() {
                        Some(message) => {
                            println!("recording ended early ({message}); kept {count} events")
                        }
                        None => println!("recorded {count} events"),
                    }
                }
            }
            Command::PlayOnce => start_playback(&mut session, Repeat::Times(1)),
            Command::PlayForever => start_playback(&mut session, Repeat::Forever),
            Command::StopPlayback => {
                session.stop_playback();
                println!("stopping playback");
            }
            Command::Save => save(&session),
            Command::Load => load(&mut session),
            Command::Exit => break,
        }
    }

    capture::clear_hotkey_handler();
    if session.phase() == Phase::Recording {
        session.stop_recording();
    }
    session.stop_playback();
    println!("bye");
    Ok(())
}

fn start_playback(session: &mut Session, repeat: Repeat) {
    match session.start_playback(repeat, 1.0) {
        Ok(()) => match repeat {
            Repeat::Times(n) => println!("playing {n}x..."),
            Repeat::Forever => println!("playing on repeat, press F5 to stop"),
        },
        Err(err) => println!("cannot play: {err}"),
    }
}

fn save(session: &Session) {
    let default = format!("macro_{}.json", Local::now().format("%Y%m%d_%H%M%S"));
    let path = match prompt(&format!("save to [{default}]: ")) {
        Ok(answer) if answer.is_empty() => PathBuf::from(default),
        Ok(answer) => PathBuf::from(answer),
        Err(err) => {
            warn!(%err, "could not read file name");
            return;
        }
    };
    match session.save(&path) {
        Ok(count) => println!("saved {count} events to {}", path.display()),
        Err(err) => println!("save failed: {err}"),
    }
}

fn load(session: &mut Session) {
    let path = match prompt("load from: ") {
        Ok(answer) if answer.is_empty() => {
            println!("no file given");
            return;
        }
        Ok(answer) => PathBuf::from(answer),
        Err(err) => {
            warn!(%err, "could not read file name");
            return;
        }
    };
    match session.load(&path) {
        Ok(count) => println!("loaded {count} events from {}", path.display()),
        Err(err) => println!("load failed: {err}"),
    }
}

fn prompt(label: &str) -> io::Result<String> {
    print!("{label}");
    io::stdout().flush()?;
    let mut answer = String::new();
    io::stdin().lock().read_line(&mut answer)?;
    Ok(answer.trim().to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn function_keys_map_without_modifiers() {
        assert_eq!(command_for(Key::F1, false, false), Some(Command::StartRecording));
        assert_eq!(command_for(Key::F2, false, false), Some(Command::StopRecording));
        assert_eq!(command_for(Key::F3, false, false), Some(Command::PlayOnce));
        assert_eq!(command_for(Key::F4, false, false), Some(Command::PlayForever));
        assert_eq!(command_for(Key::F5, false, false), Some(Command::StopPlayback));
        assert_eq!(command_for(Key::Escape, false, false), Some(Command::Exit));
    }

    #[test]
    fn file_shortcuts_need_both_modifiers() {
        assert_eq!(command_for(Key::KeyS, true, true), Some(Command::Save));
        assert_eq!(command_for(Key::KeyL, true, true), Some(Command::Load));
        assert_eq!(command_for(Key::KeyS, true, false), None);
        assert_eq!(command_for(Key::KeyS, false, true), None);
        assert_eq!(command_for(Key::KeyL, false, false), None);
    }

    #[test]
    fn other_keys_are_ignored() {
        assert_eq!(command_for(Key::KeyA, false, false), None);
        assert_eq!(command_for(Key::Space, true, true), None);
    }
}
