// Lullabox - Bedtime Stories & Songs
// Terminal front end over the playback session: a line-based command loop
// plus a status printer driven by the published snapshots

use anyhow::Result;
use clap::Parser;
use lullabox::catalog::{Catalog, ContentType};
use lullabox::config::Config;
use lullabox::favorites::FavoritesStore;
use lullabox::session::{
    PlaybackEngine, SessionContext, SessionEvent, SessionHandle, SessionManager, SessionState,
    SoftwareVolume, SoloFocus,
};
use std::path::PathBuf;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::mpsc;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "lullabox")]
#[command(about = "Bedtime stories and songs with a sleep timer")]
struct Args {
    /// Use this config file instead of the platform default
    #[arg(long)]
    config: Option<PathBuf>,

    /// Enable developer logging (stderr + debug output)
    #[arg(long)]
    dev: bool,
}

fn init_logging(dev: bool) -> Result<()> {
    // Create logs directory in project root
    let log_dir = PathBuf::from("logs");
    std::fs::create_dir_all(&log_dir)?;

    // Daily rotating file appender
    let file_appender = tracing_appender::rolling::daily(&log_dir, "lullabox.log");
    let (file_writer, _guard) = tracing_appender::non_blocking(file_appender);

    let base_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,lullabox=debug"));

    let subscriber = tracing_subscriber::fmt()
        .with_writer(file_writer)
        .with_target(true)
        .with_level(true)
        .with_ansi(false)
        .with_env_filter(base_filter)
        .finish();

    tracing::subscriber::set_global_default(subscriber)?;

    if dev {
        eprintln!("🔧 Dev mode: debug output in logs/lullabox.log");
    }

    // Prevent the guard from being dropped
    std::mem::forget(_guard);

    Ok(())
}

#[cfg(feature = "audio")]
fn build_engine(
    events: &mpsc::UnboundedSender<SessionEvent>,
    volume: &SoftwareVolume,
) -> Result<Box<dyn PlaybackEngine>> {
    use lullabox::session::RodioEngine;
    Ok(Box::new(RodioEngine::new(events.clone(), volume.shared())?))
}

#[cfg(not(feature = "audio"))]
fn build_engine(
    events: &mpsc::UnboundedSender<SessionEvent>,
    _volume: &SoftwareVolume,
) -> Result<Box<dyn PlaybackEngine>> {
    use lullabox::session::ScriptedEngine;
    warn!("Built without audio support; playback is simulated");
    Ok(Box::new(ScriptedEngine::new(events.clone()).0))
}

fn open_favorites() -> FavoritesStore {
    if let Some(data_dir) = dirs::data_dir() {
        let path = data_dir.join("lullabox").join("favorites.db");
        if let Some(parent) = path.parent() {
            let _ = std::fs::create_dir_all(parent);
        }
        match FavoritesStore::open(&path) {
            Ok(store) => return store,
            Err(e) => warn!("Favorites database unavailable ({e:#}); keeping favorites in memory"),
        }
    } else {
        warn!("No data directory on this platform; keeping favorites in memory");
    }
    FavoritesStore::in_memory()
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    init_logging(args.dev)?;

    info!("🌙 Lullabox starting up");

    let config = match &args.config {
        Some(path) => Config::load_from(path)?,
        None => Config::load()?,
    };

    let catalog = Catalog::builtin();
    let favorites = open_favorites();
    let volume = SoftwareVolume::new(config.max_volume_level.min(100));

    let (events_tx, events_rx) = mpsc::unbounded_channel();
    let engine = build_engine(&events_tx, &volume)?;

    let default_timer = config.timer_duration_minutes;
    let default_sleep_mode = config.enable_sleep_mode;

    let session = SessionManager::spawn(
        SessionContext {
            engine,
            focus: Box::new(SoloFocus::new()),
            volume: Box::new(volume.clone()),
            favorites: favorites.clone(),
            config,
        },
        events_tx,
        events_rx,
    );

    println!("🌙 Lullabox - Bedtime Stories & Songs");
    println!("=====================================");
    print_help();

    // One status line per published snapshot
    let mut watcher = session.subscribe();
    tokio::spawn(async move {
        while watcher.changed().await.is_ok() {
            let state = watcher.borrow_and_update().clone();
            print_status(&state);
        }
    });

    run_repl(&session, &catalog, &favorites, default_timer, default_sleep_mode).await;

    session.shutdown();
    // Give the session task a moment to tear down in order
    tokio::time::sleep(std::time::Duration::from_millis(100)).await;
    info!("🌙 Lullabox shut down");

    Ok(())
}

async fn run_repl(
    session: &SessionHandle,
    catalog: &Catalog,
    favorites: &FavoritesStore,
    default_timer: u32,
    default_sleep_mode: bool,
) {
    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    while let Ok(Some(line)) = lines.next_line().await {
        let parts: Vec<&str> = line.split_whitespace().collect();
        match parts.as_slice() {
            [] => {}
            ["quit"] | ["q"] | ["exit"] => break,
            ["help"] | ["h"] => print_help(),
            ["list"] => {
                print_tracks("Stories", catalog.all(ContentType::Story));
                print_tracks("Songs", catalog.all(ContentType::Song));
            }
            ["list", "stories"] => print_tracks("Stories", catalog.all(ContentType::Story)),
            ["list", "songs"] => print_tracks("Songs", catalog.all(ContentType::Song)),
            ["recommend"] => {
                print_tracks("Tonight's stories", catalog.recommended(ContentType::Story));
                print_tracks("Tonight's songs", catalog.recommended(ContentType::Song));
            }
            ["play", kind, id] => match (parse_kind(kind), id.parse::<i64>()) {
                (Some(content_type), Ok(id)) => match catalog.get(content_type, id) {
                    Some(track) => session.play_track(track.clone()),
                    None => println!("No {kind} with id {id}"),
                },
                _ => println!("Usage: play <story|song> <id>"),
            },
            ["pause"] | ["p"] => session.toggle_play_pause(),
            ["stop"] => session.stop(),
            ["seek", secs] => match secs.parse::<u64>() {
                Ok(secs) => session.seek_to(secs * 1000),
                Err(_) => println!("Usage: seek <seconds>"),
            },
            ["timer"] => session.set_timer(default_timer, default_sleep_mode),
            ["timer", "off"] => session.cancel_timer(),
            ["timer", minutes] => match minutes.parse::<u32>() {
                Ok(minutes) => session.set_timer(minutes, true),
                Err(_) => println!("Usage: timer <minutes> [nosleep] | timer off"),
            },
            ["timer", minutes, "nosleep"] => match minutes.parse::<u32>() {
                Ok(minutes) => session.set_timer(minutes, false),
                Err(_) => println!("Usage: timer <minutes> [nosleep] | timer off"),
            },
            ["fav"] => session.toggle_favorite(),
            ["favs"] => {
                print_tracks(
                    "Favorite stories",
                    favorites
                        .list_favorites(catalog, ContentType::Story)
                        .iter()
                        .collect(),
                );
                print_tracks(
                    "Favorite songs",
                    favorites
                        .list_favorites(catalog, ContentType::Song)
                        .iter()
                        .collect(),
                );
            }
            _ => println!("Unknown command; type 'help'"),
        }
    }
}

fn parse_kind(kind: &str) -> Option<ContentType> {
    match kind {
        "story" => Some(ContentType::Story),
        "song" => Some(ContentType::Song),
        _ => None,
    }
}

fn print_help() {
    println!("Commands:");
    println!("  list [stories|songs]       show the catalog");
    println!("  recommend                  a random picks list for tonight");
    println!("  play <story|song> <id>     start playback");
    println!("  pause                      toggle play/pause");
    println!("  stop                       stop playback");
    println!("  seek <seconds>             jump to a position");
    println!("  timer [minutes] [nosleep]  start the sleep timer (fades in the last minute)");
    println!("  timer off                  cancel the sleep timer");
    println!("  fav                        toggle favorite for the loaded track");
    println!("  favs                       list favorites");
    println!("  quit                       exit");
}

fn print_tracks(heading: &str, tracks: Vec<&lullabox::catalog::Track>) {
    println!("{heading}:");
    if tracks.is_empty() {
        println!("  (none)");
        return;
    }
    for track in tracks {
        println!(
            "  {:>3}  {} [{}] ({})",
            track.id,
            track.title,
            fmt_clock(track.duration_ms()),
            track.category
        );
    }
}

fn print_status(state: &SessionState) {
    if !state.playback.has_content() && !state.timer.is_active {
        return;
    }

    let mut line = String::new();
    if state.playback.has_content() {
        let marker = if state.playback.is_buffering {
            "⏳"
        } else if state.playback.is_playing {
            "▶"
        } else if state.playback.is_ended {
            "⏹"
        } else {
            "⏸"
        };
        line.push_str(&format!(
            "{} {} [{}/{}]",
            marker,
            state.playback.title,
            fmt_clock(state.playback.position_ms),
            fmt_clock(state.playback.duration_ms)
        ));
        if let Some(kind) = state.playback.error {
            line.push_str(&format!("  ⚠ {kind}"));
        }
    }
    if state.timer.is_active {
        if !line.is_empty() {
            line.push_str("  ");
        }
        line.push_str(&format!("⏰ {}", fmt_clock(state.timer.remaining_ms)));
    }
    println!("{line}");
}

fn fmt_clock(ms: u64) -> String {
    let total_secs = ms / 1000;
    format!("{:02}:{:02}", total_secs / 60, total_secs % 60)
}
