use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use rdev::{EventType, SimulateError};
use tracing::{info, warn};

use crate::error::MacroError;
use crate::event::Event;
use crate::keycodes::{parse_button, parse_key};

/// How many times to run the macro through.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Repeat {
    Times(u32),
    Forever,
}

impl Repeat {
    /// Maps a user-facing loop count to a repeat mode; zero means forever.
    pub fn from_loops(loops: u32) -> Self {
        if loops == 0 {
            Repeat::Forever
        } else {
            Repeat::Times(loops)
        }
    }
}

/// Synthesizes input events on the host. Behind a trait so playback timing
/// and skip behavior can be tested without moving the real cursor.
pub trait Injector {
    fn inject(&mut self, action: &EventType) -> Result<(), SimulateError>;
}

/// Injector backed by the OS synthesis API.
pub struct SystemInjector;

impl Injector for SystemInjector {
    fn inject(&mut self, action: &EventType) -> Result<(), SimulateError> {
        rdev::simulate(action)
    }
}

/// Outcome of a finished playback run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PlaybackReport {
    /// Completed iterations, including a partial one cut short by stop.
    pub iterations: u32,
    /// Events successfully injected.
    pub injected: usize,
    /// Events dropped for unparseable tokens or injection failures.
    pub skipped: usize,
}

/// Replays a recorded event sequence, reproducing the captured inter-event
/// gaps scaled by a speed factor. A single player replays one macro at a
/// time; stop requests take effect at the next event boundary.
pub struct Player {
    playing: Arc<AtomicBool>,
    stop: Arc<AtomicBool>,
}

impl Default for Player {
    fn default() -> Self {
        Self::new()
    }
}

impl Player {
    pub fn new() -> Self {
        Self {
            playing: Arc::new(AtomicBool::new(false)),
            stop: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn is_playing(&self) -> bool {
        self.playing.load(Ordering::SeqCst)
    }

    /// Requests a cooperative stop of the in-flight playback, if any.
    pub fn stop(&self) {
        self.stop.store(true, Ordering::SeqCst);
    }

    /// Replays `events` on the host, blocking until done or stopped.
    pub fn play(
        &self,
        events: &[Event],
        repeat: Repeat,
        speed: f64,
    ) -> Result<PlaybackReport, MacroError> {
        self.play_with(&mut SystemInjector, events, repeat, speed)
    }

    /// Replay driven by an arbitrary injector.
    pub fn play_with<I: Injector>(
        &self,
        injector: &mut I,
        events: &[Event],
        repeat: Repeat,
        speed: f64,
    ) -> Result<PlaybackReport, MacroError> {
        if !(speed > 0.0) {
            return Err(MacroError::InvalidSpeed(speed));
        }
        self.admit()?;
        Ok(self.run(injector, events, repeat, speed))
    }

    /// Claims the playing flag. Callers that spawn a playback thread admit
    /// here first so `is_playing` is true before they return, then hand the
    /// claim to [`run`](Self::run) on the worker.
    pub(crate) fn admit(&self) -> Result<(), MacroError> {
        if self
            .playing
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            return Err(MacroError::PlaybackInProgress);
        }
        self.stop.store(false, Ordering::SeqCst);
        Ok(())
    }

    /// Gives back a claim from [`admit`](Self::admit) without playing.
    pub(crate) fn release(&self) {
        self.playing.store(false, Ordering::SeqCst);
    }

    /// Runs an already-admitted playback; clears the playing flag when done.
    pub(crate) fn run<I: Injector>(
        &self,
        injector: &mut I,
        events: &[Event],
        repeat: Repeat,
        speed: f64,
    ) -> PlaybackReport {
        let mut report = PlaybackReport::default();
        'run: loop {
            let mut last_time = 0.0;
            for event in events {
                if self.stop.load(Ordering::SeqCst) {
                    report.iterations += 1;
                    break 'run;
                }
                if event.is_control() {
                    continue;
                }
                let time = event.time().unwrap_or(last_time);
                let gap = (time - last_time).max(0.0) / speed;
                last_time = time;
                if gap > 0.0 {
                    thread::sleep(Duration::from_secs_f64(gap));
                }

                match action_for(event) {
                    Ok(action) => match injector.inject(&action) {
                        Ok(()) => report.injected += 1,
                        Err(SimulateError) => {
                            warn!(?action, "failed to inject event; skipping");
                            report.skipped += 1;
                        }
                    },
                    Err(token) => {
                        warn!(token, "unrecognized input token; skipping event");
                        report.skipped += 1;
                    }
                }
            }
            report.iterations += 1;

            match repeat {
                Repeat::Times(n) if report.iterations >= n => break,
                _ if self.stop.load(Ordering::SeqCst) => break,
                _ => {}
            }
        }

        self.playing.store(false, Ordering::SeqCst);
        info!(
            iterations = report.iterations,
            injected = report.injected,
            skipped = report.skipped,
            "playback finished"
        );
        report
    }
}

/// Maps a recorded event onto the synthesis action for this machine.
/// `Err` carries the token that failed to parse.
fn action_for(event: &Event) -> Result<EventType, &str> {
    match event {
        Event::MouseMove { x, y, .. } => Ok(EventType::MouseMove { x: *x, y: *y }),
        Event::MouseClick {
            button, pressed, ..
        } => {
            let button = parse_button(button).ok_or(button.as_str())?;
            Ok(if *pressed {
                EventType::ButtonPress(button)
            } else {
                EventType::ButtonRelease(button)
            })
        }
        Event::MouseScroll { dx, dy, .. } => Ok(EventType::Wheel {
            delta_x: *dx,
            delta_y: *dy,
        }),
        Event::KeyPress { key, .. } => {
            Ok(EventType::KeyPress(parse_key(key).ok_or(key.as_str())?))
        }
        Event::KeyRelease { key, .. } => {
            Ok(EventType::KeyRelease(parse_key(key).ok_or(key.as_str())?))
        }
        Event::StopRequest { .. } | Event::CaptureError { .. } | Event::ListenerExit => {
            unreachable!("control events are filtered before dispatch")
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;
    use std::time::Instant;

    /// Records the wall-clock instant of each injection.
    #[derive(Default)]
    struct TimingInjector {
        instants: Vec<Instant>,
    }

    impl Injector for TimingInjector {
        fn inject(&mut self, _action: &EventType) -> Result<(), SimulateError> {
            self.instants.push(Instant::now());
            Ok(())
        }
    }

    struct CountingInjector {
        count: Arc<Mutex<usize>>,
    }

    impl Injector for CountingInjector {
        fn inject(&mut self, _action: &EventType) -> Result<(), SimulateError> {
            *self.count.lock().unwrap() += 1;
            Ok(())
        }
    }

    fn key_press(key: &str, time: f64) -> Event {
        Event::KeyPress {
            key: key.into(),
            time,
        }
    }

    fn timed_sequence() -> Vec<Event> {
        vec![
            key_press("KeyA", 0.0),
            key_press("KeyB", 0.5),
            key_press("KeyC", 0.5),
            key_press("KeyD", 1.2),
        ]
    }

    fn gaps(instants: &[Instant]) -> Vec<f64> {
        instants
            .windows(2)
            .map(|pair| pair[1].duration_since(pair[0]).as_secs_f64())
            .collect()
    }

    #[test]
    fn playback_reproduces_recorded_gaps() {
        let player = Player::new();
        let mut injector = TimingInjector::default();
        let report = player
            .play_with(&mut injector, &timed_sequence(), Repeat::Times(1), 1.0)
            .unwrap();

        assert_eq!(report.injected, 4);
        assert_eq!(report.skipped, 0);

        let gaps = gaps(&injector.instants);
        assert!((gaps[0] - 0.5).abs() < 0.1, "gap was {}", gaps[0]);
        assert!(gaps[1] < 0.1, "gap was {}", gaps[1]);
        assert!((gaps[2] - 0.7).abs() < 0.1, "gap was {}", gaps[2]);
    }

    #[test]
    fn speed_factor_scales_gaps() {
        let player = Player::new();
        let mut injector = TimingInjector::default();
        player
            .play_with(&mut injector, &timed_sequence(), Repeat::Times(1), 2.0)
            .unwrap();

        let gaps = gaps(&injector.instants);
        assert!((gaps[0] - 0.25).abs() < 0.1, "gap was {}", gaps[0]);
        assert!((gaps[2] - 0.35).abs() < 0.1, "gap was {}", gaps[2]);
    }

    #[test]
    fn finite_repeat_runs_each_iteration() {
        let player = Player::new();
        let mut injector = TimingInjector::default();
        let events = vec![key_press("KeyA", 0.0), key_press("KeyB", 0.0)];
        let report = player
            .play_with(&mut injector, &events, Repeat::Times(3), 1.0)
            .unwrap();

        assert_eq!(report.iterations, 3);
        assert_eq!(report.injected, 6);
    }

    #[test]
    fn zero_loops_means_forever() {
        assert_eq!(Repeat::from_loops(0), Repeat::Forever);
        assert_eq!(Repeat::from_loops(1), Repeat::Times(1));
        assert_eq!(Repeat::from_loops(7), Repeat::Times(7));
    }

    #[test]
    fn stop_halts_infinite_playback() {
        let player = Arc::new(Player::new());
        let count = Arc::new(Mutex::new(0));
        let events = vec![key_press("KeyA", 0.0), key_press("KeyB", 0.01)];

        let worker = {
            let player = Arc::clone(&player);
            let count = Arc::clone(&count);
            thread::spawn(move || {
                let mut injector = CountingInjector { count };
                player.play_with(&mut injector, &events, Repeat::Forever, 1.0)
            })
        };

        while *count.lock().unwrap() < 4 {
            thread::sleep(Duration::from_millis(5));
        }
        player.stop();

        let report = worker.join().unwrap().unwrap();
        assert!(report.iterations >= 2);
        assert!(!player.is_playing());
    }

    #[test]
    fn bad_tokens_are_skipped_not_fatal() {
        let player = Player::new();
        let mut injector = TimingInjector::default();
        let events = vec![
            key_press("KeyA", 0.0),
            key_press("Key.space", 0.0),
            Event::MouseClick {
                x: 1.0,
                y: 2.0,
                button: "Button.left".into(),
                pressed: true,
                time: 0.0,
            },
            key_press("KeyB", 0.0),
        ];
        let report = player
            .play_with(&mut injector, &events, Repeat::Times(1), 1.0)
            .unwrap();

        assert_eq!(report.injected, 2);
        assert_eq!(report.skipped, 2);
    }

    #[test]
    fn control_events_are_never_replayed() {
        let player = Player::new();
        let mut injector = TimingInjector::default();
        let events = vec![
            key_press("KeyA", 0.0),
            Event::StopRequest { time: 0.1 },
            key_press("KeyB", 0.1),
        ];
        let report = player
            .play_with(&mut injector, &events, Repeat::Times(1), 1.0)
            .unwrap();

        assert_eq!(report.injected, 2);
        assert_eq!(report.skipped, 0);
    }

    #[test]
    fn non_positive_speed_is_rejected() {
        let player = Player::new();
        let mut injector = TimingInjector::default();
        assert!(matches!(
            player.play_with(&mut injector, &[], Repeat::Times(1), 0.0),
            Err(MacroError::InvalidSpeed(_))
        ));
        assert!(matches!(
            player.play_with(&mut injector, &[], Repeat::Times(1), -1.5),
            Err(MacroError::InvalidSpeed(_))
        ));
    }

    #[test]
    fn concurrent_playback_is_rejected() {
        let player = Arc::new(Player::new());
        let count = Arc::new(Mutex::new(0));
        let events = vec![key_press("KeyA", 0.0), key_press("KeyB", 0.05)];

        let worker = {
            let player = Arc::clone(&player);
            let count = Arc::clone(&count);
            let events = events.clone();
            thread::spawn(move || {
                let mut injector = CountingInjector { count };
                player.play_with(&mut injector, &events, Repeat::Forever, 1.0)
            })
        };

        while *count.lock().unwrap() == 0 {
            thread::sleep(Duration::from_millis(5));
        }

        let mut injector = TimingInjector::default();
        assert!(matches!(
            player.play_with(&mut injector, &events, Repeat::Times(1), 1.0),
            Err(MacroError::PlaybackInProgress)
        ));

        player.stop();
        worker.join().unwrap().unwrap();
    }
}
