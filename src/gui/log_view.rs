use super::*;

impl MacroGui {
    /// Virtualized event log; only the visible rows are laid out, so long
    /// recordings stay cheap to display.
    pub fn log_view(&mut self, ui: &mut Ui) {
        let events = self.session.events_handle();
        let events = crate::lock(&events);

        let row_height = ui.spacing().interact_size.y;
        ScrollArea::vertical()
            .auto_shrink([false, false])
            .show_rows(ui, row_height, events.len(), |ui, row_range| {
                for row in row_range {
                    ui.monospace(events[row].label());
                }
            });
    }
}
