use anyhow::{Context, Result};
use clap::Parser;
use crossterm::{
    event::{self, Event, KeyEventKind},
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use log::{error, info};
use ratatui::prelude::*;
use ratatui_image::picker::Picker;
use simplelog::{ConfigBuilder, LevelFilter, WriteLogger};
use std::{fs::File, io, path::PathBuf, time::{Duration, Instant}};
use tokio::sync::mpsc;

use rmanga::api::ApiClient;
use rmanga::app::App;
use rmanga::config::Config;
use rmanga::models::Credentials;
use rmanga::network::{run_config_watcher, run_network_loop, Action};
use rmanga::terminal::{cells_to_viewport, measure_viewport};
use rmanga::ui::ui;

/// Terminal manga reader for the manga REST API.
#[derive(Parser, Debug)]
#[command(version, about)]
struct Args {
    /// Base URL of the API server
    #[arg(long)]
    api_url: Option<String>,

    /// Bearer token of an existing session
    #[arg(long)]
    token: Option<String>,

    /// Sign in with this user at startup
    #[arg(long, requires = "password")]
    username: Option<String>,

    #[arg(long, requires = "username")]
    password: Option<String>,

    /// Log file location
    #[arg(long)]
    log_file: Option<PathBuf>,

    /// Log at debug level
    #[arg(long)]
    debug: bool,
}

fn init_logging(args: &Args) -> Result<PathBuf> {
    let path = match &args.log_file {
        Some(path) => path.clone(),
        None => {
            let dir = dirs::cache_dir()
                .unwrap_or_else(std::env::temp_dir)
                .join("rmanga");
            std::fs::create_dir_all(&dir)
                .with_context(|| format!("creating {}", dir.display()))?;
            dir.join("rmanga.log")
        }
    };

    let default_level = if args.debug { LevelFilter::Debug } else { LevelFilter::Info };
    let level = std::env::var("RUST_LOG")
        .ok()
        .and_then(|v| v.parse::<LevelFilter>().ok())
        .unwrap_or(default_level);

    let config = ConfigBuilder::new()
        .set_time_format_rfc3339()
        .build();
    let file = File::create(&path).with_context(|| format!("creating {}", path.display()))?;
    WriteLogger::init(level, config, file)?;
    Ok(path)
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    let log_path = init_logging(&args)?;

    let mut config = Config::load();
    if let Some(url) = &args.api_url {
        config.api_url = url.clone();
    }
    if let Some(token) = &args.token {
        config.token = Some(token.clone());
    }
    info!("rmanga starting against {}, logging to {}", config.api_url, log_path.display());

    let client = ApiClient::new(&config.api_url, config.token.clone());
    let (action_tx, action_rx) = mpsc::unbounded_channel();
    let (event_tx, mut event_rx) = mpsc::unbounded_channel();
    tokio::spawn(run_network_loop(client, action_rx, event_tx.clone()));
    tokio::spawn(run_config_watcher(Config::path(), event_tx));

    match (args.username, args.password) {
        (Some(username), Some(password)) => {
            let _ = action_tx.send(Action::SignIn(Credentials { username, password }));
        }
        _ if config.token.is_some() => {
            let _ = action_tx.send(Action::RestoreSession);
        }
        _ => {}
    }

    enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen)?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;

    let picker = Picker::from_query_stdio().unwrap_or_else(|_| Picker::from_fontsize((8, 12)));
    let viewport = measure_viewport(picker.font_size()).unwrap_or_else(|_| {
        let size = terminal.size().unwrap_or_default();
        cells_to_viewport(size.width, size.height, picker.font_size())
    });
    let mut app = App::new(config, picker, viewport, action_tx).with_mouse_capture();

    let result = run(&mut terminal, &mut app, &mut event_rx);

    drop(app);
    disable_raw_mode()?;
    execute!(terminal.backend_mut(), LeaveAlternateScreen)?;
    terminal.show_cursor()?;
    if let Err(e) = &result {
        error!("exiting with error: {e:#}");
    }
    result
}

fn run<B: Backend>(
    terminal: &mut Terminal<B>,
    app: &mut App,
    event_rx: &mut mpsc::UnboundedReceiver<rmanga::network::NetworkEvent>,
) -> Result<()> {
    let tick_rate = Duration::from_millis(100);
    let mut last_tick = Instant::now();

    loop {
        terminal.draw(|f| ui(f, app))?;

        let now = Instant::now();
        let mut timeout = tick_rate.checked_sub(last_tick.elapsed()).unwrap_or(Duration::from_secs(0));
        if let Some(reader_due) = app.reader.as_ref().and_then(|r| r.controller.next_timeout(now)) {
            timeout = timeout.min(reader_due);
        }

        if event::poll(timeout)? {
            let now = Instant::now();
            match event::read()? {
                Event::Key(key) => {
                    if key.kind == KeyEventKind::Press && app.handle_key(key.code, now) {
                        break;
                    }
                }
                Event::Mouse(mouse) => app.handle_mouse(mouse, now),
                Event::Resize(cols, rows) => {
                    let font = app.image_picker.font_size();
                    let viewport = measure_viewport(font)
                        .unwrap_or_else(|_| cells_to_viewport(cols, rows, font));
                    app.on_resize(viewport, now);
                }
                _ => {}
            }
        }
        while let Ok(e) = event_rx.try_recv() {
            app.on_network_event(e, Instant::now());
        }
        app.on_tick(Instant::now());
        if last_tick.elapsed() >= tick_rate {
            last_tick = Instant::now();
        }
    }
    Ok(())
}
