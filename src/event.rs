use serde::{Deserialize, Serialize};

/// One captured input occurrence.
///
/// Serialized as a JSON object with a `"type"` tag so macro files stay
/// hand-editable; a saved macro is a plain JSON array of these objects with
/// no envelope or version header. `time` is seconds elapsed since capture
/// start and is non-decreasing across a recorded sequence.
///
/// The `__`-prefixed variants are control markers that travel on the same
/// channel as real input events (stop request, capture error, listener exit).
/// They drive recorder state but are never persisted or replayed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum Event {
    #[serde(rename = "mouse_move")]
    MouseMove { x: f64, y: f64, time: f64 },
    #[serde(rename = "mouse_click")]
    MouseClick {
        x: f64,
        y: f64,
        button: String,
        pressed: bool,
        time: f64,
    },
    #[serde(rename = "mouse_scroll")]
    MouseScroll {
        x: f64,
        y: f64,
        dx: i64,
        dy: i64,
        time: f64,
    },
    #[serde(rename = "key_press")]
    KeyPress { key: String, time: f64 },
    #[serde(rename = "key_release")]
    KeyRelease { key: String, time: f64 },
    #[serde(rename = "__stop_request__")]
    StopRequest {
        #[serde(default)]
        time: f64,
    },
    #[serde(rename = "__error__")]
    CaptureError { message: String },
    #[serde(rename = "__listener_exit__")]
    ListenerExit,
}

impl Event {
    /// True for internal control markers, which are never saved or replayed.
    pub fn is_control(&self) -> bool {
        matches!(
            self,
            Event::StopRequest { .. } | Event::CaptureError { .. } | Event::ListenerExit
        )
    }

    /// Capture timestamp in seconds, for events that carry one.
    pub fn time(&self) -> Option<f64> {
        match self {
            Event::MouseMove { time, .. }
            | Event::MouseClick { time, .. }
            | Event::MouseScroll { time, .. }
            | Event::KeyPress { time, .. }
            | Event::KeyRelease { time, .. }
            | Event::StopRequest { time } => Some(*time),
            Event::CaptureError { .. } | Event::ListenerExit => None,
        }
    }

    /// One-line description for the GUI event log.
    pub fn label(&self) -> String {
        match self {
            Event::MouseMove { x, y, time } => {
                format!("[{time:8.3}s] mouse move    ({x:.0}, {y:.0})")
            }
            Event::MouseClick {
                x,
                y,
                button,
                pressed,
                time,
            } => {
                let action = if *pressed { "press  " } else { "release" };
                format!("[{time:8.3}s] mouse {action} {button} at ({x:.0}, {y:.0})")
            }
            Event::MouseScroll {
                x, y, dx, dy, time, ..
            } => {
                format!("[{time:8.3}s] mouse scroll  ({dx}, {dy}) at ({x:.0}, {y:.0})")
            }
            Event::KeyPress { key, time } => format!("[{time:8.3}s] key press     {key}"),
            Event::KeyRelease { key, time } => format!("[{time:8.3}s] key release   {key}"),
            Event::StopRequest { time } => format!("[{time:8.3}s] stop requested"),
            Event::CaptureError { message } => format!("capture error: {message}"),
            Event::ListenerExit => "capture listener exited".into(),
        }
    }
}
