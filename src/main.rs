mod app;
mod clipboard;
mod command;
mod config;
mod error;
mod geocode;
mod input;
mod lookup;
mod mode;
mod model;
mod persist;
mod route;
mod state;
mod storage;
mod ui;

use std::fs::{self, File, OpenOptions};
use std::io;
use std::panic;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use tracing::{error, info, warn, Level};
use tracing_subscriber::fmt::writer::BoxMakeWriter;

use crossterm::{
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use ratatui::{backend::CrosstermBackend, Terminal};

use app::App;
use config::{Config, GeocoderConfig};
use geocode::{Geocoder, NominatimGeocoder, OfflineGeocoder};
use storage::{FileStore, KeyValueStore, MemoryStore};

#[derive(Debug, Default)]
struct Args {
    data: Option<PathBuf>,
    config: Option<PathBuf>,
    offline: bool,
    ephemeral: bool,
    verbose: bool,
}

/// Parse command line arguments
fn parse_args() -> Args {
    let args: Vec<String> = std::env::args().collect();
    let mut parsed = Args::default();

    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "--data" | "--config" => {
                let Some(value) = args.get(i + 1) else {
                    eprintln!("Error: {} requires a path", args[i]);
                    std::process::exit(1);
                };
                if args[i] == "--data" {
                    parsed.data = Some(PathBuf::from(value));
                } else {
                    parsed.config = Some(PathBuf::from(value));
                }
                i += 2;
            }
            "--offline" => {
                parsed.offline = true;
                i += 1;
            }
            "--ephemeral" => {
                parsed.ephemeral = true;
                i += 1;
            }
            "-v" | "--verbose" => {
                parsed.verbose = true;
                i += 1;
            }
            "-h" | "--help" => {
                print_help();
                std::process::exit(0);
            }
            arg => {
                eprintln!("Unknown option: {}", arg);
                std::process::exit(1);
            }
        }
    }

    parsed
}

fn print_help() {
    eprintln!("roadtrip - plan a road trip in the terminal: legs, meals, sights and hotels");
    eprintln!();
    eprintln!("USAGE:");
    eprintln!("    roadtrip [OPTIONS]");
    eprintln!();
    eprintln!("OPTIONS:");
    eprintln!("    --data <PATH>    Store file (default: <data dir>/roadtrip/store.json)");
    eprintln!("    --config <PATH>  Config file (default: <config dir>/roadtrip/config.toml)");
    eprintln!("    --offline        Do not look up places; legs are stored without map locations");
    eprintln!("    --ephemeral      Keep everything in memory; nothing is written");
    eprintln!("    -v, --verbose    Debug logging");
    eprintln!("    -h, --help       Print this help message");
    eprintln!();
    eprintln!("Add entries from the command line, e.g. :leg 2024-06-01 | NYC | Boston | 4.5");
}

/// Handle panics gracefully
fn install_panic_hook() {
    let default_hook = panic::take_hook();

    panic::set_hook(Box::new(move |info| {
        let _ = disable_raw_mode();
        let _ = execute!(io::stdout(), LeaveAlternateScreen);

        if let Some(location) = info.location() {
            error!(
                file = location.file(),
                line = location.line(),
                "panic occured"
            );
        } else {
            error!("panic occured");
        }

        if let Some(s) = info.payload().downcast_ref::<&str>() {
            error!(message = %s);
        } else if let Some(s) = info.payload().downcast_ref::<String>() {
            error!(message = %s);
        }

        default_hook(info);
    }));
}

fn open_log(path: &Path) -> io::Result<File> {
    if let Some(dir) = path.parent() {
        fs::create_dir_all(dir)?;
    }
    OpenOptions::new().create(true).append(true).open(path)
}

/// The terminal belongs to the UI, so logs go to a file
fn init_logging(path: &Path, verbose: bool) {
    let writer = match open_log(path) {
        Ok(file) => BoxMakeWriter::new(Mutex::new(file)),
        Err(e) => {
            eprintln!("Warning: cannot open log file {}: {}", path.display(), e);
            BoxMakeWriter::new(io::sink)
        }
    };
    let level = if verbose { Level::DEBUG } else { Level::INFO };

    tracing_subscriber::fmt()
        .with_writer(writer)
        .with_ansi(false)
        .with_max_level(level)
        .init();
}

fn build_geocoder(config: &GeocoderConfig) -> Box<dyn Geocoder> {
    if !config.enabled {
        info!("geocoding disabled");
        return Box::new(OfflineGeocoder);
    }
    match NominatimGeocoder::new(&config.base_url, &config.user_agent, config.timeout()) {
        Ok(geocoder) => Box::new(geocoder),
        Err(e) => {
            warn!(error = %e, "failed to build geocoding client, continuing offline");
            Box::new(OfflineGeocoder)
        }
    }
}

fn open_store(config: &Config, ephemeral: bool) -> io::Result<(Box<dyn KeyValueStore>, Vec<String>)> {
    if ephemeral {
        info!("ephemeral session, nothing will be written");
        return Ok((Box::new(MemoryStore::new()), vec!["Ephemeral session: nothing is saved".to_string()]));
    }
    let path = config.store_path();
    let store = FileStore::open(&path).map_err(|e| {
        error!(error = %e, path = %path.display(), "failed to open store");
        io::Error::other(e)
    })?;
    let warnings = store.warnings.clone();
    Ok((Box::new(store), warnings))
}

fn main() -> io::Result<()> {
    let args = parse_args();

    let mut config = match Config::load(args.config.as_deref()) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Error: {}", e);
            std::process::exit(1);
        }
    };
    if let Some(path) = args.data {
        config.storage.path = Some(path);
    }
    if args.offline {
        config.geocoder.enabled = false;
    }

    init_logging(&config.log_path(), args.verbose);
    info!(version = env!("CARGO_PKG_VERSION"), store = %config.store_path().display(), "roadtrip started");

    install_panic_hook();

    let (store, mut messages) = open_store(&config, args.ephemeral)?;
    let mut app = App::new(&config, store, build_geocoder(&config.geocoder));

    // Show any warnings from opening and loading (e.g., "New store", dropped history)
    if let Some(msg) = app.message.take() {
        messages.push(msg);
    }
    if !messages.is_empty() {
        app.message = Some(messages.join("; "));
    }

    enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen)?;

    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;

    let result = app.run(&mut terminal);

    disable_raw_mode()?;
    execute!(terminal.backend_mut(), LeaveAlternateScreen)?;

    info!("roadtrip stopped");
    result
}
