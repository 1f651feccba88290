use super::*;

use rfd::FileDialog;

use crate::player::Repeat;

impl MacroGui {
    pub fn controls(&mut self, ui: &mut Ui, frame: &mut eframe::Frame) {
        let phase = self.phase();
        let idle = phase == Phase::Idle;
        let has_macro = self.session.event_count() > 0;

        ui.horizontal(|ui| {
            if ui.add_enabled(idle, Button::new("Record")).clicked() {
                self.error = None;
                frame.set_visible(false);
                self.pending = Some(PendingAction::Record);
            }
            if ui
                .add_enabled(phase == Phase::Recording, Button::new("Stop recording"))
                .clicked()
            {
                let count = self.session.stop_recording();
                self.status = format!("recorded {count} events");
            }

            ui.add_space(12.0);

            if ui
                .add_enabled(idle && has_macro, Button::new("Play"))
                .clicked()
            {
                self.start_playback(Repeat::from_loops(self.loops));
            }
            if ui
                .add_enabled(idle && has_macro, Button::new("Play forever"))
                .clicked()
            {
                self.start_playback(Repeat::Forever);
            }
            if ui
                .add_enabled(phase == Phase::Playing, Button::new("Stop"))
                .clicked()
            {
                self.session.stop_playback();
                self.status = "stopping playback".into();
            }
        });

        ui.add_space(4.0);

        ui.horizontal(|ui| {
            ui.label("Loops:");
            ui.add_enabled(
                idle,
                DragValue::new(&mut self.loops).clamp_range(1..=1000),
            );
            ui.add_space(12.0);
            ui.label("Speed:");
            ui.add_enabled(
                idle,
                Slider::new(&mut self.speed, 0.1..=5.0).logarithmic(true),
            );
        });

        ui.add_space(4.0);

        ui.horizontal(|ui| {
            if ui
                .add_enabled(idle && has_macro, Button::new("Save"))
                .clicked()
            {
                let mut dialog = FileDialog::new().add_filter("macro", &["json"]);
                if let Some(path) = &self.current_macro_path {
                    if let Some(parent) = path.parent() {
                        dialog = dialog.set_directory(parent);
                    }
                }
                if let Some(path) = dialog.save_file() {
                    self.error = None;
                    match self.session.save(&path) {
                        Ok(count) => {
                            self.status = format!("saved {count} events");
                            self.current_macro_path = Some(path);
                            self.update_title(frame);
                        }
                        Err(error) => self.set_error(error),
                    }
                }
            }
            if ui.add_enabled(idle, Button::new("Load")).clicked() {
                if let Some(path) = FileDialog::new().add_filter("macro", &["json"]).pick_file() {
                    self.error = None;
                    match self.session.load(&path) {
                        Ok(count) => {
                            self.status = format!("loaded {count} events");
                            self.current_macro_path = Some(path);
                            self.update_title(frame);
                        }
                        Err(error) => self.set_error(error),
                    }
                }
            }

            ui.add_space(12.0);
            ui.label(&self.status);
        });
    }

    fn start_playback(&mut self, repeat: Repeat) {
        self.error = None;
        match self.session.start_playback(repeat, self.speed as f64) {
            Ok(()) => {
                self.status = match repeat {
                    Repeat::Times(1) => "playing".into(),
                    Repeat::Times(n) => format!("playing {n}x"),
                    Repeat::Forever => "playing on repeat".into(),
                }
            }
            Err(error) => self.set_error(error),
        }
    }
}
