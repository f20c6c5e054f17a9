use clap::Parser;
use color_eyre::Result;
use eyre::WrapErr;
use keystroke_events::listener::DEFAULT_WAKE_INTERVAL;
use keystroke_events::{
    default_backend, KeyEvent, KeyTables, Listener, ListenerConfig, RawModeKind, TerminalType,
};
use owo_colors::OwoColorize;
use std::io::{self, Write};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing_appender::rolling;
use tracing_subscriber::{self, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Poll interval of the decoder in microseconds
    #[arg(short, long, default_value_t = 100)]
    delay_us: u64,

    /// Key (or key combination, e.g. "Ctrl-c", "Alt-x", "Esc") that ends the session
    #[arg(short, long, default_value = "q")]
    stop_key: String,

    /// Use full raw mode instead of cbreak (signal keys are delivered as input)
    #[arg(long)]
    raw: bool,

    /// Hold incomplete escape sequences across poll windows
    #[arg(long)]
    carry_escapes: bool,

    /// Timeout in seconds before exiting (0 waits for the stop key only)
    #[arg(short, long, default_value_t = 0)]
    timeout: u64,

    /// Block on every read instead of waking periodically to check for shutdown
    #[arg(long)]
    blocking: bool,
}

fn main() -> Result<()> {
    // Install color-eyre for enhanced error reporting
    color_eyre::install()?;

    let _logger_guard = init_logger().wrap_err("Failed to initialize logger")?;

    let hook = std::panic::take_hook();
    std::panic::set_hook(Box::new(move |panic_info| {
        tracing::error!("panic: {}", panic_info);
        hook(panic_info);
    }));

    tracing::info!("Keystroke listener starting");

    let args = Args::parse();

    let result = run(args);

    if let Err(ref e) = result {
        tracing::error!("Application error: {}", e);
    }

    tracing::info!("Keystroke listener shutting down");
    result
}

fn run(args: Args) -> Result<()> {
    let terminal = TerminalType::detect().wrap_err("Cannot decode keys for this terminal")?;
    let tables = Arc::new(KeyTables::for_terminal(terminal));

    let config = ListenerConfig::new()
        .poll_interval(Duration::from_micros(args.delay_us))
        .carry_partial_escape(args.carry_escapes)
        .raw_mode(if args.raw {
            RawModeKind::Raw
        } else {
            RawModeKind::Cbreak
        })
        .wake_interval((!args.blocking).then_some(DEFAULT_WAKE_INTERVAL));

    let mut out = io::stdout();
    write!(
        out,
        "starting the listening process, press {} to exit\r\n",
        format!("\"{}\"", args.stop_key).yellow()
    )?;
    out.flush()?;

    let backend =
        default_backend(config.wake_interval_duration()).wrap_err("Failed to open the terminal")?;
    let listener =
        Listener::spawn(backend, tables, config).wrap_err("Failed to start the listener")?;
    let events = listener.events();

    let deadline = (args.timeout > 0).then(|| Instant::now() + Duration::from_secs(args.timeout));
    let mut pressed = 0usize;

    loop {
        if deadline.is_some_and(|at| Instant::now() >= at) {
            tracing::info!(pressed, "timeout reached");
            break;
        }
        if listener.reader_finished() {
            tracing::warn!(pressed, "input ended before the stop key");
            break;
        }

        let Some(event) = events.get() else {
            std::thread::sleep(Duration::from_millis(1));
            continue;
        };
        pressed += 1;
        tracing::debug!(?event, "key event");
        write!(out, "You pressed {}\r\n", describe(&event))?;
        out.flush()?;

        if event.matches(&args.stop_key) {
            break;
        }
    }

    if args.blocking {
        write!(out, "stopping the process, press any key\r\n")?;
    } else {
        write!(out, "stopping the process\r\n")?;
    }
    out.flush()?;

    listener.stop().wrap_err("Listener failed")?;

    write!(out, "{}\r\n", "bye!".green())?;
    out.flush()?;
    Ok(())
}

fn describe(event: &KeyEvent) -> String {
    match event {
        KeyEvent::Char(ch) => format!("{}", ch.bold()),
        KeyEvent::Key(name) => format!("{}", name.cyan()),
        KeyEvent::Control(code) => format!("{} ({})", event.magenta(), code.name().dimmed()),
    }
}

/// Logger guard
struct LoggerGuard {
    _guard: tracing_appender::non_blocking::WorkerGuard,
}

/// Initialize logger
fn init_logger() -> Result<LoggerGuard> {
    let log_dir = get_log_directory();

    std::fs::create_dir_all(&log_dir).wrap_err("Failed to create log directory")?;

    let log_file = rolling::daily(&log_dir, "keystrokes.log");
    let (non_blocking_log_file, guard) = tracing_appender::non_blocking(log_file);

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    // File only: a stderr layer would interleave with the key echo.
    let file_layer = tracing_subscriber::fmt::layer()
        .with_writer(non_blocking_log_file)
        .with_ansi(false)
        .with_thread_ids(true)
        .with_thread_names(true)
        .with_file(true)
        .with_line_number(true)
        .with_target(true);

    tracing_subscriber::registry()
        .with(filter)
        .with(file_layer)
        .try_init()
        .wrap_err("Failed to initialize tracing subscriber")?;

    tracing::info!("Logger initialized to: {}", log_dir.display());
    Ok(LoggerGuard { _guard: guard })
}

fn get_log_directory() -> PathBuf {
    if let Ok(dir) = std::env::var("KEYSTROKES_LOG_DIR") {
        PathBuf::from(dir)
    } else if let Some(home) = dirs::home_dir() {
        home.join(".keystrokes").join("logs")
    } else {
        PathBuf::from("/tmp/keystrokes")
    }
}
