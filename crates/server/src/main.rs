mod config;
mod events;
mod heartbeat;
mod server;
mod tui;

use std::io;
use std::path::PathBuf;
use std::sync::atomic::Ordering;
use std::time::Duration;

use anyhow::Result;
use clap::Parser;
use crossterm::event::{self, Event, KeyCode, KeyEventKind};
use crossterm::terminal::{self, EnterAlternateScreen, LeaveAlternateScreen};
use crossterm::{cursor, execute};
use ratatui::Terminal;
use ratatui::backend::CrosstermBackend;

use freeroam::{
    Allowlist, Blocklist, DEFAULT_TICK_RATE, HandshakeValidator, ScriptCatalog, ScriptHost,
    compatible_version_display,
};

use config::Settings;
use events::ServerEvent;
use server::RelayServer;
use tui::TuiState;

#[derive(Parser)]
#[command(name = "freeroam-server")]
#[command(about = "Co-op freeroam relay server")]
struct Args {
    #[arg(short, long, default_value = "0.0.0.0")]
    bind: String,

    #[arg(short, long, help = "Overrides the port from the settings file")]
    port: Option<u16>,

    #[arg(short, long, default_value = "Settings.toml")]
    settings: PathBuf,

    #[arg(long, default_value = "Allowlist.toml")]
    allowlist: PathBuf,

    #[arg(long, default_value = "Blocklist.toml")]
    blocklist: PathBuf,

    #[arg(short, long, default_value_t = DEFAULT_TICK_RATE)]
    tick_rate: u32,

    #[arg(short, long, help = "Overrides max players from the settings file")]
    max_players: Option<usize>,

    #[arg(long)]
    headless: bool,
}

fn main() -> Result<()> {
    let args = Args::parse();

    if args.headless {
        env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    }

    let mut settings: Settings = config::load_toml(&args.settings)?;
    if let Some(port) = args.port {
        settings.port = port;
    }
    if let Some(max_players) = args.max_players {
        settings.max_players = max_players;
    }

    let allowlist: Allowlist = config::load_toml(&args.allowlist)?;
    let blocklist: Blocklist = config::load_toml(&args.blocklist)?;
    let validator = HandshakeValidator {
        allowlist_enabled: settings.allowlist,
        allowlist,
        blocklist,
    };

    let catalog = ScriptCatalog::new();
    let script = if settings.extension.is_empty() {
        ScriptHost::none()
    } else {
        ScriptHost::load(&catalog, &settings.extension)
    };

    let bind_addr = format!("{}:{}", args.bind, settings.port);
    let mut server = RelayServer::new(&bind_addr, settings.clone(), validator, script, args.tick_rate)?;

    if settings.announce {
        let _announcer = heartbeat::spawn(settings.clone(), server.registry());
    }

    if args.headless {
        log::info!("compatible client versions: {}.x", compatible_version_display());
        log::info!("server listening on {}", server.local_addr());
        server.run();
        log::info!("server shutting down");
    } else {
        run_with_tui(&mut server)?;
    }

    Ok(())
}

fn run_with_tui(server: &mut RelayServer) -> io::Result<()> {
    terminal::enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen, cursor::Hide)?;

    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;

    let running = server.running();
    let mut tui_state = TuiState::new();

    tui_state.log_info(format!("Server listening on {}", server.local_addr()));
    tui_state.log_info(format!(
        "Compatible client versions: {}.x",
        compatible_version_display()
    ));

    while running.load(Ordering::SeqCst) {
        server.tick_once();

        for event in server.drain_events() {
            match event {
                ServerEvent::Connecting { addr } => {
                    tui_state.log_info(format!("Connection request from {}", addr));
                }
                ServerEvent::HandshakeRejected { addr, reason } => {
                    tui_state.log_warn(format!("Rejected {}: {}", addr, reason));
                }
                ServerEvent::PlayerJoined { id, username } => {
                    tui_state.log_info(format!("{} joined (id {})", username, id));
                }
                ServerEvent::PlayerLeft {
                    id,
                    username,
                    reason,
                } => {
                    tui_state.log_info(format!("{} left (id {}): {}", username, id, reason));
                }
                ServerEvent::Chat { username, message } => {
                    tui_state.log_info(format!("{}: {}", username, message));
                }
                ServerEvent::Error { message } => {
                    tui_state.log_error(message);
                }
            }
        }

        let players = server.player_infos();
        tui_state.clamp_selection(players.len());

        if let Some(index) = tui_state.take_pending_kick() {
            if let Some(player) = players.get(index) {
                server.kick(player.id);
            }
        }

        if event::poll(Duration::from_millis(16))? {
            if let Event::Key(key) = event::read()? {
                if key.kind == KeyEventKind::Press {
                    match key.code {
                        KeyCode::Char('q') | KeyCode::Esc => {
                            running.store(false, Ordering::SeqCst);
                        }
                        KeyCode::Up => tui_state.select_prev(),
                        KeyCode::Down => tui_state.select_next(players.len()),
                        KeyCode::Char('k') | KeyCode::Char('K') => {
                            tui_state.request_kick(players.len());
                        }
                        _ => {}
                    }
                }
            }
        }

        let stats = server.stats();
        terminal.draw(|frame| {
            tui::render(frame, &tui_state, &stats, &players);
        })?;
    }

    tui_state.log_info("Shutting down...");
    server.shutdown_connections();

    terminal::disable_raw_mode()?;
    execute!(terminal.backend_mut(), LeaveAlternateScreen, cursor::Show)?;

    Ok(())
}
