mod app;
mod markdown;
mod slash;
#[cfg(test)]
mod testing;
mod theme;
mod views;

pub use app::{PendingAttachment, UiState};
pub use markdown::{LOADING_STEPS, parse_inline_markdown, reasoning_steps, render_markdown};
pub use slash::{HELP_LINES, SlashCommand};
pub use theme::TuiTheme;
pub use views::draw;

use anyhow::Result;
use crossterm::event::{self, Event};
use crossterm::terminal::{
    EnterAlternateScreen, LeaveAlternateScreen, disable_raw_mode, enable_raw_mode,
};
use mentor_core::StudyHost;
use ratatui::Terminal;
use ratatui::backend::CrosstermBackend;
use std::io;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

const POLL_INTERVAL: Duration = Duration::from_millis(100);

#[derive(Debug, Clone, Copy)]
pub struct UiOptions {
    pub show_reasoning: bool,
}

impl Default for UiOptions {
    fn default() -> Self {
        Self {
            show_reasoning: true,
        }
    }
}

/// RAII guard that restores the terminal on drop (including panics).
struct TerminalGuard;

impl Drop for TerminalGuard {
    fn drop(&mut self) {
        let _ = disable_raw_mode();
        let _ = crossterm::execute!(io::stdout(), LeaveAlternateScreen, crossterm::cursor::Show);
    }
}

/// Runs the full-screen study shell until the user quits or SIGINT/SIGTERM arrives.
pub fn run_tui(host: &mut dyn StudyHost, options: UiOptions) -> Result<()> {
    let stop_flag = Arc::new(AtomicBool::new(false));
    #[cfg(unix)]
    {
        signal_hook::flag::register(signal_hook::consts::SIGINT, Arc::clone(&stop_flag))?;
        signal_hook::flag::register(signal_hook::consts::SIGTERM, Arc::clone(&stop_flag))?;
    }

    let prev_hook = std::panic::take_hook();
    std::panic::set_hook(Box::new(move |info| {
        let _ = disable_raw_mode();
        let _ = crossterm::execute!(io::stdout(), LeaveAlternateScreen, crossterm::cursor::Show);
        prev_hook(info);
    }));

    enable_raw_mode()?;
    let _guard = TerminalGuard;
    crossterm::execute!(io::stdout(), EnterAlternateScreen)?;
    let mut terminal = Terminal::new(CrosstermBackend::new(io::stdout()))?;
    terminal.clear()?;

    let mut ui = UiState::new(options.show_reasoning);
    loop {
        let finished = host.poll();
        ui.absorb(finished);
        terminal.draw(|frame| draw(frame, &*host, &ui))?;
        if ui.should_quit || stop_flag.load(Ordering::Relaxed) {
            break;
        }
        if event::poll(POLL_INTERVAL)?
            && let Event::Key(key) = event::read()?
        {
            ui.handle_key(host, key);
        }
        ui.tick = ui.tick.wrapping_add(1);
    }
    Ok(())
}
