use clap::Parser;
use eframe::*;
use egui::vec2;
use macroplay::*;

#[derive(Parser)]
#[command(name = "macroplay", about = "Record and replay global input macros")]
struct Args {
    /// Run the hotkey-driven console interface instead of the window.
    #[arg(long)]
    cli: bool,
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "macroplay=info".into()),
        )
        .init();

    let args = Args::parse();
    if args.cli {
        return cli::run();
    }

    let mut options = NativeOptions::default();
    options.initial_window_size = Some(vec2(560.0, 480.0));
    options.min_window_size = Some(vec2(480.0, 360.0));
    run_native(
        "Macroplay",
        options,
        Box::new(|cc| Box::new(gui::MacroGui::new(cc))),
    );
    Ok(())
}
