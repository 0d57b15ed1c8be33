//! Eventline - live event timelines at the terminal
//!
//! CLI entry point for rendering guest lists and day timelines from a
//! mirrored event scope.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use chrono::{Local, NaiveDate, NaiveDateTime};
use clap::Parser;
use colored::*;
use eyre::{Context, Result};
use tokio::sync::broadcast::error::RecvError;
use tracing::{debug, info, warn};

use eventline::cli::{Cli, Command, OutputFormat};
use eventline::config::Config;
use eventline::domain::{Guest, RsvpStatus, ScopeKey};
use eventline::fixture::Fixture;
use eventline::sync::{LiveCollection, LoadState};
use eventline::timeline::{
    ClockTicker, EngineEvent, EntryStatus, PositionedEntry, TimelineEngine, TimelineView,
};

/// How long the initial fetch may take before rendering whatever is there
const SETTLE_TIMEOUT: Duration = Duration::from_secs(2);

fn setup_logging(cli_log_level: Option<&str>, config_log_level: Option<&str>) -> Result<()> {
    // Priority: CLI --log-level > config file > default (info)
    let level = match cli_log_level.or(config_log_level) {
        Some(s) => match s.to_lowercase().as_str() {
            "trace" => tracing::Level::TRACE,
            "debug" => tracing::Level::DEBUG,
            "info" => tracing::Level::INFO,
            "warn" | "warning" => tracing::Level::WARN,
            "error" => tracing::Level::ERROR,
            _ => {
                eprintln!("Warning: Unknown log-level '{}', defaulting to info", s);
                tracing::Level::INFO
            }
        },
        None => tracing::Level::INFO,
    };

    // Logs go to stderr so rendered output stays pipeable
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env().add_directive(level.into()),
        )
        .init();

    debug!("Logging initialized (level: {:?})", level);
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Load log level from config file early (before full config load)
    let config_log_level = Config::load_log_level(cli.config.as_ref());

    // Setup logging with priority: CLI > config > info default
    setup_logging(cli.log_level.as_deref(), config_log_level.as_deref())
        .context("Failed to setup logging")?;

    // Load configuration
    let config = Config::load(cli.config.as_ref()).context("Failed to load configuration")?;
    config.validate()?;

    debug!(command = ?cli.command, "main: dispatching command");
    match cli.command {
        Command::Timeline {
            date,
            at,
            fixture,
            company,
            event,
            watch,
            format,
        } => {
            cmd_timeline(
                &config,
                date,
                at,
                fixture.as_ref(),
                company,
                event,
                watch,
                format,
            )
            .await
        }
        Command::Guests {
            fixture,
            company,
            event,
            watch,
            format,
        } => cmd_guests(&config, fixture.as_ref(), company, event, watch, format).await,
    }
}

/// Load the named fixture, or fall back to the bundled sample event
fn load_fixture(path: Option<&PathBuf>) -> Result<Fixture> {
    match path {
        Some(path) => Fixture::load(path),
        None => {
            info!("No fixture given, serving the bundled sample event");
            Fixture::sample()
        }
    }
}

/// Resolve the scope to mirror: CLI flags, then config, then the fixture
fn resolve_scope(
    company: Option<String>,
    event: Option<String>,
    config: &Config,
    fixture: &Fixture,
) -> Option<ScopeKey> {
    match (company, event) {
        (Some(company), Some(event)) => ScopeKey::new(company, event),
        (None, None) => config
            .scope
            .scope_key()
            .or_else(|| fixture.scope.scope_key()),
        _ => {
            warn!("resolve_scope: --company and --event must be given together; ignoring");
            config
                .scope
                .scope_key()
                .or_else(|| fixture.scope.scope_key())
        }
    }
}

fn print_no_scope_notice() {
    println!(
        "{}",
        "No event selected. Pass --company and --event, or set scope in the config.".dimmed()
    );
}

#[allow(clippy::too_many_arguments)]
async fn cmd_timeline(
    config: &Config,
    date: Option<NaiveDate>,
    at: Option<NaiveDateTime>,
    fixture_path: Option<&PathBuf>,
    company: Option<String>,
    event: Option<String>,
    watch: bool,
    format: OutputFormat,
) -> Result<()> {
    let fixture = load_fixture(fixture_path)?;
    let Some(scope) = resolve_scope(company, event, config, &fixture) else {
        print_no_scope_notice();
        return Ok(());
    };

    // A fixed --at implies viewing that instant's day unless --date says otherwise
    let now = at.unwrap_or_else(|| Local::now().naive_local());
    let date = date
        .or(at.map(|t| t.date()))
        .unwrap_or_else(|| Local::now().date_naive());

    info!(%scope, %date, "Starting timeline for scope");
    let backend = fixture.into_backend(config.sync.feed_capacity);
    let engine = TimelineEngine::for_scope(backend, scope, date, now);

    let view = settle_view(&engine).await?;
    render_timeline(&view, format)?;

    if watch {
        // Only follow the wall clock when no instant was pinned
        if at.is_none() {
            let ticker = ClockTicker::new(engine.clone(), config.clock.tick_interval());
            tokio::spawn(ticker.run());
        }
        watch_timeline(&engine, format).await?;
    }

    engine.dispose().await;
    Ok(())
}

/// Poll until both mirrors have settled out of Loading, or the timeout passes
async fn settle_view(engine: &TimelineEngine) -> Result<TimelineView> {
    let deadline = tokio::time::Instant::now() + SETTLE_TIMEOUT;
    loop {
        let view = engine.view().await?;
        let loading = matches!(view.items_state, LoadState::Loading)
            || matches!(view.modules_state, LoadState::Loading);
        if !loading || tokio::time::Instant::now() >= deadline {
            return Ok(view);
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
}

/// Re-render on every engine recompute until Ctrl-C
async fn watch_timeline(engine: &TimelineEngine, format: OutputFormat) -> Result<()> {
    let mut events = engine.subscribe_events();
    eprintln!("{}", "Watching; Ctrl-C to stop".dimmed());

    loop {
        tokio::select! {
            event = events.recv() => match event {
                Ok(EngineEvent::Recomputed { view }) => {
                    println!();
                    render_timeline(&view, format)?;
                }
                Err(RecvError::Lagged(missed)) => {
                    debug!(missed, "watch_timeline: lagged, waiting for next view");
                }
                Err(RecvError::Closed) => break,
            },
            _ = tokio::signal::ctrl_c() => {
                println!();
                break;
            }
        }
    }
    Ok(())
}

fn render_timeline(view: &TimelineView, format: OutputFormat) -> Result<()> {
    match format {
        OutputFormat::Json => {
            println!("{}", serde_json::to_string_pretty(view)?);
        }
        OutputFormat::Text => {
            println!(
                "{} {}  {}",
                "Timeline".bold(),
                view.date.to_string().cyan(),
                format!("as of {}", view.now.format("%H:%M")).dimmed()
            );
            print_state_notice("itinerary", &view.items_state);
            print_state_notice("modules", &view.modules_state);

            if view.entries.is_empty() {
                println!("  {}", "Nothing scheduled for this day".dimmed());
            }
            for entry in &view.entries {
                println!("{}", timeline_line(entry));
            }
            if let Some(position) = view.now_position {
                println!("{}", format!("now at {:.1}% of the day", position).dimmed());
            }
        }
    }
    Ok(())
}

fn timeline_line(entry: &PositionedEntry) -> String {
    let glyph = match entry.status {
        EntryStatus::Current => "●".green(),
        EntryStatus::Upcoming => "○".cyan(),
        EntryStatus::Past => "·".dimmed(),
    };

    let span = if entry.entry.is_module() {
        entry.entry.start.format("%H:%M").to_string()
    } else {
        format!(
            "{}-{}",
            entry.entry.start.format("%H:%M"),
            entry.entry.end.format("%H:%M")
        )
    };

    let title = format!("{:<28}", entry.entry.title);
    let title = match entry.status {
        EntryStatus::Current => title.green().bold(),
        EntryStatus::Past => title.dimmed(),
        EntryStatus::Upcoming => title.normal(),
    };

    let mut meta = String::new();
    if let Some(location) = &entry.entry.location {
        meta.push_str(location);
        meta.push(' ');
    }
    meta.push_str(&format!("[{}]", entry.status));

    format!("  {} {:<12} {} {}", glyph, span, title, meta.dimmed())
}

fn print_state_notice(label: &str, state: &LoadState) {
    match state {
        LoadState::Failed(reason) => {
            println!(
                "  {} {}",
                format!("{} fetch failed:", label).red(),
                reason.red()
            );
        }
        LoadState::Stale => {
            println!(
                "  {}",
                format!("{} feed is stale; showing last known data", label).yellow()
            );
        }
        _ => {}
    }
}

async fn cmd_guests(
    config: &Config,
    fixture_path: Option<&PathBuf>,
    company: Option<String>,
    event: Option<String>,
    watch: bool,
    format: OutputFormat,
) -> Result<()> {
    let fixture = load_fixture(fixture_path)?;
    let Some(scope) = resolve_scope(company, event, config, &fixture) else {
        print_no_scope_notice();
        return Ok(());
    };

    info!(%scope, "Starting guest list for scope");
    let backend = fixture.into_backend(config.sync.feed_capacity);
    let collection = LiveCollection::<Guest>::spawn(backend, scope);

    let (guests, state) = settle_guests(&collection).await?;
    render_guests(&guests, &state, format)?;

    if watch {
        watch_guests(&collection, format).await?;
    }

    collection.dispose().await;
    Ok(())
}

/// Poll until the mirror settles out of Loading, or the timeout passes
async fn settle_guests(collection: &LiveCollection<Guest>) -> Result<(Vec<Guest>, LoadState)> {
    let deadline = tokio::time::Instant::now() + SETTLE_TIMEOUT;
    loop {
        let state = collection.load_state().await?;
        if !matches!(state, LoadState::Loading) || tokio::time::Instant::now() >= deadline {
            let guests = collection.snapshot().await?;
            return Ok((guests, state));
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
}

/// Re-render on every mirror change until Ctrl-C
async fn watch_guests(collection: &LiveCollection<Guest>, format: OutputFormat) -> Result<()> {
    let mut events = collection.subscribe_events();
    eprintln!("{}", "Watching; Ctrl-C to stop".dimmed());

    loop {
        tokio::select! {
            event = events.recv() => match event {
                Ok(_) => {
                    let guests = collection.snapshot().await?;
                    let state = collection.load_state().await?;
                    println!();
                    render_guests(&guests, &state, format)?;
                }
                Err(RecvError::Lagged(missed)) => {
                    debug!(missed, "watch_guests: lagged, waiting for next change");
                }
                Err(RecvError::Closed) => break,
            },
            _ = tokio::signal::ctrl_c() => {
                println!();
                break;
            }
        }
    }
    Ok(())
}

fn render_guests(guests: &[Guest], state: &LoadState, format: OutputFormat) -> Result<()> {
    match format {
        OutputFormat::Json => {
            let output = serde_json::json!({ "state": state, "guests": guests });
            println!("{}", serde_json::to_string_pretty(&output)?);
        }
        OutputFormat::Text => {
            println!("{} ({})", "Guests".bold(), guests.len());
            print_state_notice("guest list", state);

            if guests.is_empty() {
                println!("  {}", "No guests yet".dimmed());
            }
            for guest in guests {
                let glyph = match guest.rsvp {
                    RsvpStatus::Confirmed => "✓".green(),
                    RsvpStatus::Declined => "✗".red(),
                    RsvpStatus::Invited => "·".dimmed(),
                };
                let email = guest.email.as_deref().unwrap_or("");
                println!(
                    "  {} {:<24} {:<28} {}",
                    glyph,
                    guest.display_name(),
                    email,
                    guest.rsvp.to_string().dimmed()
                );
            }
        }
    }
    Ok(())
}
