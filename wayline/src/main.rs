//! Branching media presentation TUI.
//!
//! Plays an `order.json` presentation against a content backend:
//!
//! ```bash
//! cargo run -p wayline -- --manifest order.json --base-url http://localhost:8000
//! ```
//!
//! With `--offline` media is read from a `contents/` directory next to
//! the manifest and answers stay local.

mod app;
mod events;
mod ui;

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use crossterm::{
    event,
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use ratatui::{backend::CrosstermBackend, Terminal};
use tracing_subscriber::EnvFilter;

use wayline_assets::{FsAssets, HttpAnswerSink, HttpAssets};
use wayline_core::{
    DeviceClass, FetchMedia, NullSink, Presentation, PresentationConfig,
};

use app::App;
use events::{handle_event, EventResult};
use ui::render::render;

struct Args {
    manifest: PathBuf,
    base_url: String,
    answers: Option<PathBuf>,
    mobile: bool,
    offline: bool,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Load .env file if present
    dotenvy::dotenv().ok();
    init_logging()?;

    let argv: Vec<String> = std::env::args().collect();
    if argv.iter().any(|a| a == "--help" || a == "-h") {
        print_help();
        return Ok(());
    }
    let args = parse_args(&argv)?;

    let device = if args.mobile {
        DeviceClass::Mobile
    } else {
        DeviceClass::Desktop
    };
    let config = PresentationConfig::for_device(device);

    let session = if args.offline {
        let root = args
            .manifest
            .parent()
            .unwrap_or_else(|| std::path::Path::new("."))
            .join("contents");
        let fetcher: Arc<dyn FetchMedia> = Arc::new(FsAssets::new(root));
        Presentation::load(&args.manifest, fetcher, Arc::new(NullSink), config).await
    } else {
        let fetcher: Arc<dyn FetchMedia> = Arc::new(HttpAssets::new(args.base_url.as_str())?);
        let sink = Arc::new(HttpAnswerSink::new(args.base_url.as_str())?);
        Presentation::load(&args.manifest, fetcher, sink, config).await
    };

    let mut session = match session {
        Ok(s) => s,
        Err(e) => {
            eprintln!("Failed to load presentation: {e}");
            std::process::exit(1);
        }
    };

    // Replay previously saved answers, if any.
    if let Some(path) = &args.answers {
        if path.exists() {
            if let Err(e) = session.load_answers(path).await {
                eprintln!("Failed to load answers from {}: {e}", path.display());
            }
        }
    }

    // Setup terminal
    enable_raw_mode()?;
    let mut stdout = std::io::stdout();
    execute!(stdout, EnterAlternateScreen)?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;

    let result = run_app(&mut terminal, App::new(session, args.answers)).await;

    // Restore terminal
    disable_raw_mode()?;
    execute!(terminal.backend_mut(), LeaveAlternateScreen)?;

    if let Err(e) = result {
        eprintln!("Error: {e}");
    }
    Ok(())
}

async fn run_app<B: ratatui::backend::Backend>(
    terminal: &mut Terminal<B>,
    mut app: App,
) -> std::io::Result<()> {
    loop {
        terminal.draw(|f| render(f, &app))?;

        if let Some(path) = app.take_dirty_answers() {
            if let Err(e) = app.session.save_answers(&path).await {
                app.set_status(format!("Save failed: {e}"));
            }
        }

        if event::poll(Duration::from_millis(100))? {
            let ev = event::read()?;
            match handle_event(&mut app, ev) {
                EventResult::Quit => app.should_quit = true,
                EventResult::NeedsRedraw | EventResult::Continue => {}
            }
        }

        // Timer-driven transitions (quiz auto-advance, crossroad unlock)
        app.tick();

        if app.should_quit {
            // Flush any answer recorded since the last draw.
            if let Some(path) = app.take_dirty_answers() {
                app.session
                    .save_answers(&path)
                    .await
                    .map_err(std::io::Error::other)?;
            }
            return Ok(());
        }
    }
}

fn parse_args(argv: &[String]) -> Result<Args, Box<dyn std::error::Error>> {
    let mut args = Args {
        manifest: PathBuf::from("order.json"),
        base_url: std::env::var("WAYLINE_BASE_URL")
            .unwrap_or_else(|_| "http://localhost:8000".to_string()),
        answers: None,
        mobile: false,
        offline: false,
    };

    let mut iter = argv.iter().skip(1);
    while let Some(arg) = iter.next() {
        match arg.as_str() {
            "--manifest" => {
                args.manifest = PathBuf::from(
                    iter.next().ok_or("--manifest requires a path")?,
                );
            }
            "--base-url" => {
                args.base_url = iter.next().ok_or("--base-url requires a url")?.clone();
            }
            "--answers" => {
                args.answers = Some(PathBuf::from(
                    iter.next().ok_or("--answers requires a path")?,
                ));
            }
            "--mobile" => args.mobile = true,
            "--offline" => args.offline = true,
            other => return Err(format!("unknown argument: {other}").into()),
        }
    }
    Ok(args)
}

fn init_logging() -> Result<(), Box<dyn std::error::Error>> {
    // Logging goes to a file so it never fights the terminal UI.
    let Ok(path) = std::env::var("WAYLINE_LOG") else {
        return Ok(());
    };
    let file = std::fs::File::create(path)?;
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(Arc::new(file))
        .with_ansi(false)
        .init();
    Ok(())
}

fn print_help() {
    println!("wayline - branching media presentation player");
    println!();
    println!("Usage: wayline [OPTIONS]");
    println!();
    println!("Options:");
    println!("  --manifest <PATH>   Presentation manifest (default: order.json)");
    println!("  --base-url <URL>    Content backend (default: $WAYLINE_BASE_URL or http://localhost:8000)");
    println!("  --answers <PATH>    Persist recorded answers to this file and replay them on start");
    println!("  --mobile            Mobile profile: fewer workers, reduced quality, no video prefetch");
    println!("  --offline           Read media from a contents/ directory next to the manifest");
    println!("  -h, --help          Show this help");
    println!();
    println!("Environment:");
    println!("  WAYLINE_BASE_URL    Default content backend");
    println!("  WAYLINE_LOG         Write logs to this file (RUST_LOG controls the filter)");
}
