mod ui;

use clap::{error::ErrorKind, CommandFactory, Parser};
use crossterm::{
    event::{
        DisableMouseCapture, EnableMouseCapture, KeyCode, KeyEvent, KeyEventKind, KeyModifiers,
        MouseButton, MouseEvent, MouseEventKind,
    },
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
    tty::IsTty,
};
use launch_control::{
    config::{Config, ConfigStore, FileConfigStore},
    history::HistoryLog,
    records::{MemoryRecordStore, RecordStore, Records, SqliteRecordStore},
    runtime::{
        CrosstermEventSource, FixedTicker, GameEvent, GameEventSource, Runner, Ticker, TimedEvent,
    },
    LaunchControl, Reaction,
};
use ratatui::{
    backend::{Backend, CrosstermBackend},
    layout::Rect,
    Terminal,
};
use std::{
    error::Error,
    fs::OpenOptions,
    io::{self, stdin},
    path::{Path, PathBuf},
    time::{Duration, Instant},
};

use crate::ui::{
    charting::format_ms,
    layout::{GameLayout, Hit},
};

/// start-light reaction game with false start detection and persisted records
#[derive(Parser, Debug, Clone)]
#[clap(
    version,
    about,
    long_about = "Arm the start lights, wait for green and react as fast as you can. Five trials per session; best single reaction and best session average are kept across sessions."
)]
pub struct Cli {
    /// key that counts as a reaction (default: space)
    #[clap(short = 'k', long)]
    key: Option<char>,

    /// seed for the random delay before the red light
    #[clap(long)]
    seed: Option<u64>,

    /// record database to use instead of the default location
    #[clap(long, value_name = "PATH")]
    db: Option<PathBuf>,

    /// print the stored records and exit
    #[clap(long)]
    records: bool,

    /// delete the stored records and exit
    #[clap(long)]
    reset_records: bool,

    /// print the last N completed sessions and exit
    #[clap(long, value_name = "N", num_args = 0..=1, default_missing_value = "10")]
    history: Option<usize>,

    /// write logs to this file (filter with RUST_LOG)
    #[clap(long, value_name = "PATH")]
    log: Option<PathBuf>,
}

/// Effective settings after merging the config file with CLI flags
#[derive(Debug, Clone, PartialEq)]
pub struct Settings {
    pub reaction_key: char,
    pub tick_rate: Duration,
    pub db_path: Option<PathBuf>,
    pub seed: Option<u64>,
}

/// Keys that already arm and restart
const RESERVED_KEYS: [char; 2] = ['a', 'r'];

impl Settings {
    fn resolve(cli: &Cli, config: &Config) -> Self {
        let mut reaction_key = cli.key.unwrap_or(config.reaction_key);
        if RESERVED_KEYS.contains(&reaction_key) || reaction_key.is_control() {
            let fallback = Config::default().reaction_key;
            log::warn!(
                "reaction key {:?} is reserved, using {:?} instead",
                reaction_key,
                fallback
            );
            reaction_key = fallback;
        }

        Self {
            reaction_key,
            tick_rate: Duration::from_millis(config.tick_rate_ms.max(1)),
            db_path: cli.db.clone().or_else(|| config.records_path.clone()),
            seed: cli.seed,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AppAction {
    Continue,
    Quit,
}

#[derive(Debug)]
pub struct App {
    pub game: LaunchControl<Box<dyn RecordStore>>,
    pub reaction_key: char,
    pub history: Option<HistoryLog>,
    /// Last drawn terminal area, used to hit-test mouse clicks
    pub area: Rect,
}

impl App {
    pub fn new(settings: &Settings, store: Box<dyn RecordStore>, history: Option<HistoryLog>) -> Self {
        let game = match settings.seed {
            Some(seed) => LaunchControl::with_seed(store, seed),
            None => LaunchControl::new(store),
        };
        Self {
            game,
            reaction_key: settings.reaction_key,
            history,
            area: Rect::default(),
        }
    }

    pub fn handle_key(&mut self, key: KeyEvent, now: Instant) -> AppAction {
        if key.kind != KeyEventKind::Press {
            return AppAction::Continue;
        }

        match key.code {
            KeyCode::Esc => return AppAction::Quit,
            // ctrl+c to quit
            KeyCode::Char('c') if key.modifiers.contains(KeyModifiers::CONTROL) => {
                return AppAction::Quit
            }
            KeyCode::Char(c) if c == self.reaction_key => self.react(now),
            KeyCode::Char('a') => self.arm(now),
            KeyCode::Char('r') => self.reset(),
            _ => {}
        }
        AppAction::Continue
    }

    pub fn handle_mouse(&mut self, mouse: MouseEvent, now: Instant) {
        if mouse.kind != MouseEventKind::Down(MouseButton::Left) {
            return;
        }

        match GameLayout::new(self.area).hit(mouse.column, mouse.row) {
            Hit::Arm => self.arm(now),
            Hit::Reset => self.reset(),
            Hit::Panel => self.react(now),
            Hit::Outside => {}
        }
    }

    fn arm(&mut self, now: Instant) {
        if self.game.controls().arm {
            self.game.arm(now);
        }
    }

    fn reset(&mut self) {
        if self.game.controls().reset {
            self.game.reset();
        }
    }

    fn react(&mut self, now: Instant) {
        if let Reaction::Finished(summary) = self.game.handle_reaction(now) {
            if let Some(history) = &self.history {
                if let Err(e) = history.append(&summary, chrono::Local::now()) {
                    log::warn!("could not append to {}: {}", history.path().display(), e);
                }
            }
        }
    }
}

fn init_logging(path: Option<&Path>) -> io::Result<()> {
    // logging to the terminal would corrupt the TUI, so it is file-only
    if let Some(path) = path {
        let file = OpenOptions::new().create(true).append(true).open(path)?;
        env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
            .target(env_logger::Target::Pipe(Box::new(file)))
            .init();
    }
    Ok(())
}

fn open_sqlite(settings: &Settings) -> launch_control::Result<SqliteRecordStore> {
    match &settings.db_path {
        Some(path) => SqliteRecordStore::open(path),
        None => SqliteRecordStore::new(),
    }
}

fn open_store(settings: &Settings) -> Box<dyn RecordStore> {
    match open_sqlite(settings) {
        Ok(store) => Box::new(store),
        Err(e) => {
            log::warn!("record store unavailable, records will not persist: {}", e);
            Box::new(MemoryRecordStore::new())
        }
    }
}

/// Session history lives next to the records database in use
fn open_history(settings: &Settings) -> launch_control::Result<HistoryLog> {
    match &settings.db_path {
        Some(path) => Ok(HistoryLog::beside(path)),
        None => HistoryLog::new(),
    }
}

/// Non-interactive commands. Returns true if one ran.
fn run_command(cli: &Cli, settings: &Settings) -> Result<bool, Box<dyn Error>> {
    if cli.reset_records {
        open_sqlite(settings)?.clear()?;
        println!("records cleared");
        return Ok(true);
    }

    if cli.records {
        let records = Records::load(&open_sqlite(settings)?);
        println!("best single:  {}", format_ms(records.best_single));
        println!("best average: {}", format_ms(records.best_average));
        return Ok(true);
    }

    if let Some(n) = cli.history {
        let entries = open_history(settings)?.last(n)?;
        if entries.is_empty() {
            println!("no completed sessions yet");
        }
        for entry in entries {
            println!(
                "{}  avg {:>4} ms  best {:>4} ms  [{}]  {}",
                entry.date, entry.average, entry.best, entry.times, entry.verdict
            );
        }
        return Ok(true);
    }

    Ok(false)
}

fn main() -> Result<(), Box<dyn Error>> {
    let cli = Cli::parse();
    init_logging(cli.log.as_deref())?;

    let config = FileConfigStore::new().load();
    let settings = Settings::resolve(&cli, &config);

    if run_command(&cli, &settings)? {
        return Ok(());
    }

    if !stdin().is_tty() {
        let mut cmd = Cli::command();
        cmd.error(ErrorKind::Io, "stdin must be a tty").exit();
    }

    let history = open_history(&settings)
        .map_err(|e| log::warn!("session history disabled: {}", e))
        .ok();
    let mut app = App::new(&settings, open_store(&settings), history);

    enable_raw_mode()?;

    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen, EnableMouseCapture)?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;

    let runner = Runner::new(
        CrosstermEventSource::new(),
        FixedTicker::new(settings.tick_rate),
    );
    let result = start_tui(&mut terminal, &mut app, &runner);

    disable_raw_mode()?;
    execute!(
        terminal.backend_mut(),
        LeaveAlternateScreen,
        DisableMouseCapture
    )?;
    terminal.show_cursor()?;

    result
}

fn start_tui<B: Backend, E: GameEventSource, T: Ticker>(
    terminal: &mut Terminal<B>,
    app: &mut App,
    runner: &Runner<E, T>,
) -> Result<(), Box<dyn Error>> {
    loop {
        terminal.draw(|f| {
            app.area = f.area();
            f.render_widget(&*app, f.area());
        })?;

        let TimedEvent { event, at } = runner.step_until(app.game.next_deadline());
        // only transitions due by the time the input was read may fire before it
        app.game.poll_timers(at);

        match event {
            GameEvent::Tick | GameEvent::Resize => {}
            GameEvent::Key(key) => {
                if app.handle_key(key, at) == AppAction::Quit {
                    break;
                }
            }
            GameEvent::Mouse(mouse) => app.handle_mouse(mouse, at),
        }
    }

    Ok(())
}
