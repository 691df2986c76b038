use cigfinder_tui::{
    api::backend_from_config,
    app::App,
    config::Config,
    events::EventHandler,
    location::provider_from_config,
    logging, ui,
};
use color_eyre::Result;
use crossterm::event::{DisableMouseCapture, EnableMouseCapture};
use ratatui::{backend::CrosstermBackend, Terminal};
use std::{io, time::Instant};
use tracing::info;

#[tokio::main]
async fn main() -> Result<()> {
    let _log_guard = logging::initialize_logging();
    install_panic_hook();
    color_eyre::install()?;

    let config = Config::load();
    let backend = backend_from_config(&config.api)?;
    let provider = provider_from_config(&config.location);

    let mut event_handler = EventHandler::new(config.ui.tick_rate_ms);
    let mut app = App::new(config, backend, provider, event_handler.tx.clone());
    app.load_places();

    let mut terminal = setup_terminal()?;
    info!("cigfinder started");

    while !app.should_quit {
        app.frame_area = terminal.size()?;
        terminal.draw(|f| ui::render(f, &app))?;

        match event_handler.next().await {
            Some(event) => app.handle_event(event, Instant::now()),
            None => break,
        }
    }

    app.shutdown();
    restore_terminal(terminal)?;
    info!("cigfinder stopped");
    Ok(())
}

fn setup_terminal() -> Result<Terminal<CrosstermBackend<io::Stdout>>> {
    crossterm::terminal::enable_raw_mode()?;
    let mut stdout = io::stdout();
    crossterm::execute!(
        stdout,
        crossterm::terminal::EnterAlternateScreen,
        EnableMouseCapture,
        crossterm::cursor::Hide
    )?;
    Ok(Terminal::new(CrosstermBackend::new(stdout))?)
}

fn restore_terminal(mut terminal: Terminal<CrosstermBackend<io::Stdout>>) -> Result<()> {
    crossterm::terminal::disable_raw_mode()?;
    crossterm::execute!(
        terminal.backend_mut(),
        DisableMouseCapture,
        crossterm::terminal::LeaveAlternateScreen,
        crossterm::cursor::Show
    )?;
    Ok(())
}

fn install_panic_hook() {
    let original_hook = std::panic::take_hook();
    std::panic::set_hook(Box::new(move |panic_info| {
        // Force terminal cleanup!
        crossterm::terminal::disable_raw_mode().ok();
        crossterm::execute!(
            std::io::stdout(),
            DisableMouseCapture,
            crossterm::terminal::LeaveAlternateScreen,
            crossterm::cursor::Show
        )
        .ok();
        original_hook(panic_info);
    }));
}
