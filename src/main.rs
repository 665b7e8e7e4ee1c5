//! Vista - analyst dashboard for one entity at a time.
//!
//! Opens an entity page in the terminal: its header, the saved-view toolbar
//! and every widget the backend configures for it.
//!
//! ## Usage
//!
//! ```bash
//! # Open a stock page on its Default view
//! vista stock AAPL
//!
//! # Start on a saved view
//! vista stock AAPL --view 3f2a9c
//!
//! # Custom config file and verbose logging
//! vista stock AAPL --config ./vista.yaml -v
//!
//! # With custom log directory
//! vista stock AAPL --log-dir /path/to/logs/
//! ```

use std::io::Write;
use std::panic;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use clap::Parser;
use tracing::{error, info};
use vista_client::BackendClient;
use vista_config::VistaConfig;
use vista_core::{LogGuard, init_logging};
use vista_tui::App;
use vista_views::{DisplayZone, ViewController};

/// Vista entity dashboard
///
/// Browse an entity's tables and charts, and save the way you arranged them
/// as named views.
#[derive(Parser, Debug)]
#[command(name = "vista")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Entity type, e.g. `stock`
    entity_type: String,

    /// Entity identifier, e.g. `AAPL`
    entity_id: String,

    /// Saved view to open instead of Default
    #[arg(long)]
    view: Option<String>,

    /// Config file (defaults to ~/.vista/config.yaml)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Enable verbose logging (increases log level)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Directory for log files (defaults to ~/.vista/logs/)
    #[arg(long)]
    log_dir: Option<PathBuf>,
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    // Initialize logging
    let _guard = match setup_logging(&cli) {
        Ok(guard) => guard,
        Err(e) => {
            eprintln!("Failed to initialize logging: {e}");
            return ExitCode::from(1);
        }
    };

    // Install panic hook to ensure terminal cleanup
    install_panic_hook();

    info!(entity_type = %cli.entity_type, entity_id = %cli.entity_id, "Starting Vista");

    match run(&cli) {
        Ok(()) => {
            info!("Vista exited normally");
            ExitCode::SUCCESS
        }
        Err(e) => {
            error!("Vista error: {e:#}");
            eprintln!("Error: {e:#}");
            ExitCode::from(1)
        }
    }
}

/// Install a panic hook that restores the terminal before printing the panic message.
fn install_panic_hook() {
    let original_hook = panic::take_hook();

    panic::set_hook(Box::new(move |panic_info| {
        let _ = restore_terminal();
        original_hook(panic_info);
    }));
}

/// Restore terminal to its normal state.
fn restore_terminal() -> std::io::Result<()> {
    let mut stdout = std::io::stdout();

    let _ = crossterm::terminal::disable_raw_mode();
    crossterm::execute!(
        stdout,
        crossterm::terminal::LeaveAlternateScreen,
        crossterm::event::DisableMouseCapture
    )?;
    crossterm::execute!(stdout, crossterm::cursor::Show)?;
    stdout.flush()?;

    Ok(())
}

/// Set up logging based on CLI arguments.
fn setup_logging(cli: &Cli) -> vista_core::Result<LogGuard> {
    let debug = cli.verbose > 0;
    init_logging(cli.log_dir.clone(), debug)
}

fn load_config(cli: &Cli) -> vista_core::Result<VistaConfig> {
    match &cli.config {
        Some(path) => VistaConfig::load(path),
        None => VistaConfig::load_default(),
    }
}

/// Load the entity page, then hand the terminal to the app.
fn run(cli: &Cli) -> anyhow::Result<()> {
    let config = load_config(cli).context("loading configuration")?;
    info!(
        base_url = %config.backend.base_url,
        username = %config.session.username,
        "configuration ready"
    );

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .context("starting async runtime")?;

    let backend = Arc::new(BackendClient::from_config(&config.backend).context("creating backend client")?);
    let controller = ViewController::new(
        cli.entity_type.clone(),
        cli.entity_id.clone(),
        config.session.username.clone(),
        backend.clone(),
        backend.clone(),
    )
    .with_initial_view(cli.view.clone());

    let zone = DisplayZone::new(config.display.utc_offset_hours, config.display.zone_label.clone());
    let mut app = App::new(controller, backend.clone(), runtime.handle().clone())
        .with_search_delay(Duration::from_millis(config.search.debounce_ms))
        .with_schedules(backend, zone);
    app.start()
        .with_context(|| format!("loading {} {}", cli.entity_type, cli.entity_id))?;

    app.run().map_err(|e| anyhow::anyhow!("terminal error: {e}"))
}
