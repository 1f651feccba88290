use super::*;

impl App for MacroGui {
    fn update(&mut self, ctx: &Context, frame: &mut eframe::Frame) {
        // Runs one frame after the hide so the window is gone before the
        // hook starts delivering events.
        if let Some(PendingAction::Record) = self.pending.take() {
            match self.session.start_recording() {
                Ok(()) => self.status = "recording...".into(),
                Err(error) => {
                    frame.set_visible(true);
                    self.set_error(error);
                }
            }
        }

        if self.phase() == Phase::Recording && self.session.stop_requested() {
            let count = self.session.stop_recording();
            frame.set_visible(true);
            match self.session.recording_failure() {
                Some(message) => {
                    self.set_error(format!("recording ended early: {message}"));
                    self.status = format!("kept {count} events");
                }
                None => self.status = format!("recorded {count} events"),
            }
        }

        CentralPanel::default().show(ctx, |ui| {
            self.controls(ui, frame);
            ui.separator();
            self.log_view(ui);

            if let Some(error) = &self.error {
                ui.add_space(4.0);
                ui.colored_label(Color32::RED, error);
            }
        });

        // The event buffer changes from capture and playback threads.
        ctx.request_repaint();
    }
}
