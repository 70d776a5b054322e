use std::fs::OpenOptions;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use anyhow::{bail, Context, Result};
use clap::Parser;
use crossterm::{
    event::Event,
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use ratatui::{
    backend::CrosstermBackend,
    layout::{Constraint, Layout},
    Terminal,
};
use tracing::info;
use tracing_subscriber::EnvFilter;

use vitalwatch::auth::{AuthProvider, FileAuthStore};
use vitalwatch::{
    events, ui, App, ConnectionManager, Dashboard, ExitLock, Settings, SubjectId, View,
    WsConnector,
};

#[derive(Parser, Debug)]
#[command(name = "vitalwatch")]
#[command(about = "Terminal dashboard for live vital-sign monitoring")]
struct Args {
    /// Settings file (TOML, YAML or JSON)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Session file written by the web login (overrides auth.session_file)
    #[arg(short, long)]
    session: Option<PathBuf>,

    /// Backend base URL, e.g. http://127.0.0.1:8000 (overrides gateway.api_base)
    #[arg(long)]
    api_base: Option<String>,

    /// Patient a doctor can select; repeat for more
    #[arg(short, long = "patient")]
    patients: Vec<u64>,

    /// Log file (overrides log.file)
    #[arg(long)]
    log_file: Option<PathBuf>,
}

fn main() -> Result<()> {
    let args = Args::parse();

    let mut settings = Settings::load(args.config.as_deref())?;
    if let Some(session) = args.session {
        settings.auth.session_file = session;
    }
    if let Some(api_base) = args.api_base {
        settings.gateway.api_base = api_base;
        settings.validate()?;
    }
    if let Some(log_file) = args.log_file {
        settings.log.file = log_file;
    }

    init_logging(&settings.log.file, &settings.log.filter)?;

    let auth = Arc::new(FileAuthStore::load(&settings.auth.session_file));
    let Some(user) = auth.current_user().filter(|u| u.id.is_some()) else {
        bail!(
            "No logged-in user in {}. Log in through the web client first.",
            auth.path().display()
        );
    };

    let url = settings.gateway_url()?;
    let policy = settings.reconnect_policy()?;
    let options = settings.dashboard_options()?;
    info!(%url, user = ?user.id, role = ?user.role, "starting vitalwatch");

    // The connection driver runs on this runtime while the TUI owns the main thread
    let rt = tokio::runtime::Runtime::new()?;
    let _guard = rt.enter();

    let (connection, inbound) =
        ConnectionManager::new(url, Arc::new(WsConnector), auth.clone(), policy);
    let exit_lock = ExitLock::new();
    let dashboard = Dashboard::new(
        user,
        connection,
        inbound,
        options,
        Box::new(exit_lock.clone()),
    )?;

    let mut patients: Vec<SubjectId> = settings.session.patients.clone();
    patients.extend(args.patients.into_iter().map(SubjectId));
    patients.sort();
    patients.dedup();

    let mut app = App::new(dashboard, exit_lock, patients);
    app.connect();

    let result = run_tui(&mut app);
    app.teardown();
    result
}

/// Send tracing output to `path`; the terminal belongs to the TUI.
fn init_logging(path: &Path, default_filter: &str) -> Result<()> {
    let file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .with_context(|| format!("Failed to open log file {}", path.display()))?;

    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(default_filter))
        .context("Invalid log filter")?;

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(Mutex::new(file))
        .with_ansi(false)
        .init();
    Ok(())
}

/// Run the TUI until the user quits
fn run_tui(app: &mut App) -> Result<()> {
    // Setup terminal
    enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen)?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;

    // Setup panic hook to restore terminal
    let original_hook = std::panic::take_hook();
    std::panic::set_hook(Box::new(move |panic| {
        let _ = disable_raw_mode();
        let _ = execute!(io::stdout(), LeaveAlternateScreen);
        original_hook(panic);
    }));

    let result = run_app(&mut terminal, app);

    // Restore terminal
    disable_raw_mode()?;
    execute!(terminal.backend_mut(), LeaveAlternateScreen)?;
    terminal.show_cursor()?;

    result
}

fn run_app(terminal: &mut Terminal<CrosstermBackend<io::Stdout>>, app: &mut App) -> Result<()> {
    // Minimum terminal size for usable display
    const MIN_WIDTH: u16 = 60;
    const MIN_HEIGHT: u16 = 16;

    while app.running {
        app.tick(Instant::now());

        terminal.draw(|frame| {
            let area = frame.area();

            // Check for minimum terminal size
            if area.width < MIN_WIDTH || area.height < MIN_HEIGHT {
                let msg = format!(
                    "Terminal too small: {}x{}\nMinimum: {}x{}\n\nResize to continue",
                    area.width, area.height, MIN_WIDTH, MIN_HEIGHT
                );
                let paragraph = ratatui::widgets::Paragraph::new(msg)
                    .alignment(ratatui::layout::Alignment::Center)
                    .style(ratatui::style::Style::default().fg(ratatui::style::Color::Yellow));
                let centered = ratatui::layout::Rect::new(
                    0,
                    (area.height / 2).saturating_sub(2),
                    area.width,
                    5u16.min(area.height),
                );
                frame.render_widget(paragraph, centered);
                return;
            }

            let chunks = Layout::vertical([
                Constraint::Length(1), // Header bar
                Constraint::Length(1), // Tabs
                Constraint::Min(12),   // Content
                Constraint::Length(1), // Status bar
            ])
            .split(area);

            ui::common::render_header(frame, app, chunks[0]);
            ui::common::render_tabs(frame, app, chunks[1]);

            match app.current_view {
                View::Vitals => ui::vitals::render(frame, app, chunks[2]),
                View::Alerts => ui::alerts::render(frame, app, chunks[2]),
                View::Records => ui::records::render(frame, app, chunks[2]),
            }

            ui::common::render_status_bar(frame, app, chunks[3]);

            if app.show_help {
                ui::common::render_help(frame, app, area);
            }

            if let Some(warning) = app.quit_prompt() {
                ui::common::render_quit_prompt(frame, app, area, warning);
            }
        })?;

        // Poll for events with a short timeout
        if let Some(Event::Key(key)) = events::poll_event(Duration::from_millis(100))? {
            events::handle_key_event(app, key);
        }
    }

    Ok(())
}
