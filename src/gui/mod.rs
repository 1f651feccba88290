use eframe::{egui::*, *};

use std::path::PathBuf;

use crate::session::{Phase, Session};

pub mod app;
pub mod controls;
pub mod log_view;

/// Action deferred by one frame so the window is actually hidden before the
/// capture hook starts seeing events.
#[derive(PartialEq, Eq, Clone, Copy)]
pub enum PendingAction {
    Record,
}

/// Desktop front end. Global hotkeys stay uninstalled while the GUI runs;
/// everything goes through the buttons here.
pub struct MacroGui {
    pub session: Session,
    pub loops: u32,
    pub speed: f32,
    pub current_macro_path: Option<PathBuf>,
    pub status: String,
    pub error: Option<String>,
    pub pending: Option<PendingAction>,
}

impl MacroGui {
    pub fn new(cc: &CreationContext) -> Self {
        use FontFamily::*;
        cc.egui_ctx.set_visuals(Visuals::light());

        let mut style = (*cc.egui_ctx.style()).clone();
        style.text_styles = [
            (TextStyle::Heading, FontId::new(24.0, Proportional)),
            (TextStyle::Body, FontId::new(16.0, Proportional)),
            (TextStyle::Monospace, FontId::new(13.0, Monospace)),
            (TextStyle::Button, FontId::new(16.0, Proportional)),
            (TextStyle::Small, FontId::new(10.0, Proportional)),
        ]
        .into();
        cc.egui_ctx.set_style(style);

        Self {
            session: Session::new(),
            loops: 1,
            speed: 1.0,
            current_macro_path: None,
            status: "ready".into(),
            error: None,
            pending: None,
        }
    }

    pub fn phase(&self) -> Phase {
        self.session.phase()
    }

    fn set_error(&mut self, error: impl ToString) {
        self.error = Some(error.to_string());
    }

    fn update_title(&self, frame: &mut eframe::Frame) {
        match &self.current_macro_path {
            Some(path) => frame.set_window_title(&format!("Macroplay - {}", path.display())),
            None => frame.set_window_title("Macroplay"),
        }
    }
}
