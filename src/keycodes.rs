//! Conversion between `rdev` key/button identifiers and the string form used
//! in macro files.
//!
//! The string form is the identifier's debug name (`"KeyA"`, `"Space"`,
//! `"Left"`, `"Unknown(42)"`), so a saved file written on one machine parses
//! on another as long as the identifier exists there. Parsing is fallible on
//! purpose: a recording made on a different keyboard layout may contain
//! tokens this machine cannot produce, and the player skips those.

use rdev::{Button, Key};

pub fn key_to_string(key: Key) -> String {
    format!("{key:?}")
}

pub fn button_to_string(button: Button) -> String {
    format!("{button:?}")
}

pub fn parse_key(name: &str) -> Option<Key> {
    let key = match name {
        "Alt" => Key::Alt,
        "AltGr" => Key::AltGr,
        "Backspace" => Key::Backspace,
        "CapsLock" => Key::CapsLock,
        "ControlLeft" => Key::ControlLeft,
        "ControlRight" => Key::ControlRight,
        "Delete" => Key::Delete,
        "DownArrow" => Key::DownArrow,
        "End" => Key::End,
        "Escape" => Key::Escape,
        "F1" => Key::F1,
        "F2" => Key::F2,
        "F3" => Key::F3,
        "F4" => Key::F4,
        "F5" => Key::F5,
        "F6" => Key::F6,
        "F7" => Key::F7,
        "F8" => Key::F8,
        "F9" => Key::F9,
        "F10" => Key::F10,
        "F11" => Key::F11,
        "F12" => Key::F12,
        "Home" => Key::Home,
        "LeftArrow" => Key::LeftArrow,
        "MetaLeft" => Key::MetaLeft,
        "MetaRight" => Key::MetaRight,
        "PageDown" => Key::PageDown,
        "PageUp" => Key::PageUp,
        "Return" => Key::Return,
        "RightArrow" => Key::RightArrow,
        "ShiftLeft" => Key::ShiftLeft,
        "ShiftRight" => Key::ShiftRight,
        "Space" => Key::Space,
        "Tab" => Key::Tab,
        "UpArrow" => Key::UpArrow,
        "PrintScreen" => Key::PrintScreen,
        "ScrollLock" => Key::ScrollLock,
        "Pause" => Key::Pause,
        "NumLock" => Key::NumLock,
        "BackQuote" => Key::BackQuote,
        "Num1" => Key::Num1,
        "Num2" => Key::Num2,
        "Num3" => Key::Num3,
        "Num4" => Key::Num4,
        "Num5" => Key::Num5,
        "Num6" => Key::Num6,
        "Num7" => Key::Num7,
        "Num8" => Key::Num8,
        "Num9" => Key::Num9,
        "Num0" => Key::Num0,
        "Minus" => Key::Minus,
        "Equal" => Key::Equal,
        "KeyQ" => Key::KeyQ,
        "KeyW" => Key::KeyW,
        "KeyE" => Key::KeyE,
        "KeyR" => Key::KeyR,
        "KeyT" => Key::KeyT,
        "KeyY" => Key::KeyY,
        "KeyU" => Key::KeyU,
        "KeyI" => Key::KeyI,
        "KeyO" => Key::KeyO,
        "KeyP" => Key::KeyP,
        "LeftBracket" => Key::LeftBracket,
        "RightBracket" => Key::RightBracket,
        "KeyA" => Key::KeyA,
        "KeyS" => Key::KeyS,
        "KeyD" => Key::KeyD,
        "KeyF" => Key::KeyF,
        "KeyG" => Key::KeyG,
        "KeyH" => Key::KeyH,
        "KeyJ" => Key::KeyJ,
        "KeyK" => Key::KeyK,
        "KeyL" => Key::KeyL,
        "SemiColon" => Key::SemiColon,
        "Quote" => Key::Quote,
        "BackSlash" => Key::BackSlash,
        "IntlBackslash" => Key::IntlBackslash,
        "KeyZ" => Key::KeyZ,
        "KeyX" => Key::KeyX,
        "KeyC" => Key::KeyC,
        "KeyV" => Key::KeyV,
        "KeyB" => Key::KeyB,
        "KeyN" => Key::KeyN,
        "KeyM" => Key::KeyM,
        "Comma" => Key::Comma,
        "Dot" => Key::Dot,
        "Slash" => Key::Slash,
        "Insert" => Key::Insert,
        "KpReturn" => Key::KpReturn,
        "KpMinus" => Key::KpMinus,
        "KpPlus" => Key::KpPlus,
        "KpMultiply" => Key::KpMultiply,
        "KpDivide" => Key::KpDivide,
        "Kp0" => Key::Kp0,
        "Kp1" => Key::Kp1,
        "Kp2" => Key::Kp2,
        "Kp3" => Key::Kp3,
        "Kp4" => Key::Kp4,
        "Kp5" => Key::Kp5,
        "Kp6" => Key::Kp6,
        "Kp7" => Key::Kp7,
        "Kp8" => Key::Kp8,
        "Kp9" => Key::Kp9,
        "KpDelete" => Key::KpDelete,
        "Function" => Key::Function,
        other => return parse_unknown(other).map(Key::Unknown),
    };
    Some(key)
}

pub fn parse_button(name: &str) -> Option<Button> {
    let button = match name {
        "Left" => Button::Left,
        "Right" => Button::Right,
        "Middle" => Button::Middle,
        other => return parse_unknown(other).map(Button::Unknown),
    };
    Some(button)
}

fn parse_unknown<T: std::str::FromStr>(name: &str) -> Option<T> {
    name.strip_prefix("Unknown(")?
        .strip_suffix(')')?
        .parse()
        .ok()
}
