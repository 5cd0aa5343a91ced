pub mod ui;

use clap::{error::ErrorKind, CommandFactory, Parser};
use crossterm::{
    event::{KeyCode, KeyEvent, KeyModifiers},
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
    tty::IsTty,
};
use posecheck::{
    api::{HttpInferenceApi, InferenceApi},
    app_dirs::AppDirs,
    config::{Config, ConfigStore, FileConfigStore},
    controller::Controller,
    exercise::{Exercise, ExerciseCatalog},
    history::HistoryLog,
    logging,
    runtime::{spawn_terminal_events, AppEvent, ChannelEventSource, FixedTicker, Runner},
    session::TimeBudget,
};
use ratatui::{
    backend::{Backend, CrosstermBackend},
    Terminal,
};
use std::{
    error::Error,
    io::{self, stdin},
    sync::{mpsc, Arc},
    time::Duration,
};
use tracing::{info, warn};

const TICK_RATE_MS: u64 = 100;

/// guided rehab exercise sessions scored by a remote posture classifier
#[derive(Parser, Debug, Clone)]
#[clap(
    version,
    about,
    long_about = "Pick a rehabilitation exercise, check that its body sensors are online and watch a remote posture classifier score the session live."
)]
pub struct Cli {
    /// base url of the inference service
    #[clap(long)]
    base_url: Option<String>,

    /// exercise to preselect (see --list-exercises)
    #[clap(short = 'e', long)]
    exercise: Option<String>,

    /// number of seconds to sample for
    #[clap(short = 't', long = "time")]
    time_budget_secs: Option<u32>,

    /// milliseconds to wait after the start request before polling for readiness
    #[clap(long)]
    grace_ms: Option<u64>,

    /// poll for readiness only once the start request has been answered
    #[clap(long)]
    await_start_ack: bool,

    /// print the service's usage message and exit
    #[clap(long)]
    ping: bool,

    /// list the supported exercises and exit
    #[clap(long)]
    list_exercises: bool,

    /// print the recorded session results and exit
    #[clap(long)]
    history: bool,
}

impl Cli {
    /// Flags win over the stored configuration
    fn apply_to(&self, config: &mut Config) {
        if let Some(url) = &self.base_url {
            config.base_url = url.clone();
        }
        if let Some(id) = &self.exercise {
            config.last_exercise = Some(id.clone());
        }
        if let Some(secs) = self.time_budget_secs {
            config.time_budget_secs = secs;
        }
        if let Some(ms) = self.grace_ms {
            config.readiness_grace_ms = ms;
        }
        if self.await_start_ack {
            config.await_start_ack = true;
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum AppState {
    Setup,
    Notifications,
}

/// Which setup control receives typed keys
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Focus {
    Exercises,
    TimeBudget,
}

#[derive(Debug, Default)]
pub struct NotificationsState {
    pub selected: usize,
    pub scroll_offset: usize,
}

#[derive(Debug, PartialEq)]
pub enum KeyOutcome {
    Continue,
    Quit,
}

pub struct App {
    pub controller: Controller<HttpInferenceApi>,
    pub config: Config,
    pub store: Option<FileConfigStore>,
    pub state: AppState,
    pub focus: Focus,
    pub selected: usize,
    pub time_input: String,
    pub notifications_state: NotificationsState,
}

impl App {
    pub fn new(controller: Controller<HttpInferenceApi>, config: Config) -> Self {
        let selected = config
            .last_exercise
            .as_deref()
            .and_then(|id| controller.catalog.index_of(id))
            .unwrap_or(0);
        Self {
            time_input: config.time_budget_secs.to_string(),
            controller,
            config,
            store: None,
            state: AppState::Setup,
            focus: Focus::Exercises,
            selected,
            notifications_state: NotificationsState::default(),
        }
    }

    pub fn with_store(mut self, store: FileConfigStore) -> Self {
        self.store = Some(store);
        self
    }

    pub fn selected_exercise(&self) -> Option<&Exercise> {
        self.controller.catalog.all().get(self.selected)
    }

    pub fn start_enabled(&self) -> bool {
        self.controller.orchestrator().start_enabled()
    }

    fn start(&mut self) {
        if !self.start_enabled() {
            return;
        }
        let Some(id) = self.selected_exercise().map(|e| e.id.clone()) else {
            return;
        };
        if self.controller.start(&id, &self.time_input).is_err() {
            // Already posted to the notification log
            return;
        }
        self.config.last_exercise = Some(id);
        if let Ok(budget) = TimeBudget::parse(&self.time_input) {
            self.config.time_budget_secs = budget.secs();
        }
        if let Some(store) = &self.store {
            if let Err(err) = store.save(&self.config) {
                warn!(path = %store.path().display(), %err, "unable to save config");
            }
        }
    }

    pub fn on_key(&mut self, key: KeyEvent) -> KeyOutcome {
        // ctrl+c to quit
        if key.modifiers.contains(KeyModifiers::CONTROL) && key.code == KeyCode::Char('c') {
            return KeyOutcome::Quit;
        }

        match self.state {
            AppState::Setup => match (self.focus, key.code) {
                (_, KeyCode::Esc) => return KeyOutcome::Quit,
                (_, KeyCode::Tab) | (_, KeyCode::BackTab) => {
                    self.focus = match self.focus {
                        Focus::Exercises => Focus::TimeBudget,
                        Focus::TimeBudget => Focus::Exercises,
                    };
                }
                (_, KeyCode::Enter) => self.start(),
                (Focus::TimeBudget, KeyCode::Backspace) => {
                    self.time_input.pop();
                }
                (Focus::TimeBudget, KeyCode::Char(c)) => {
                    if self.time_input.len() < 12 {
                        self.time_input.push(c);
                    }
                }
                (Focus::Exercises, KeyCode::Up) => {
                    self.selected = self.selected.saturating_sub(1);
                }
                (Focus::Exercises, KeyCode::Down) => {
                    let last = self.controller.catalog.len().saturating_sub(1);
                    self.selected = (self.selected + 1).min(last);
                }
                (Focus::Exercises, KeyCode::Char('s')) => self.controller.rescan(),
                (Focus::Exercises, KeyCode::Char('r')) => self.controller.refresh_devices(),
                (Focus::Exercises, KeyCode::Char('x')) => self.controller.stop(),
                (Focus::Exercises, KeyCode::Char('n')) => {
                    self.notifications_state = NotificationsState::default();
                    self.state = AppState::Notifications;
                }
                _ => {}
            },
            AppState::Notifications => {
                let count = self.controller.notifications.len();
                let view = &mut self.notifications_state;
                match key.code {
                    KeyCode::Esc | KeyCode::Backspace | KeyCode::Char('b') => {
                        self.state = AppState::Setup;
                    }
                    KeyCode::Up => view.selected = view.selected.saturating_sub(1),
                    KeyCode::Down => {
                        view.selected = (view.selected + 1).min(count.saturating_sub(1));
                    }
                    KeyCode::Home => view.selected = 0,
                    KeyCode::Char('d') | KeyCode::Delete => {
                        let id = self
                            .controller
                            .notifications
                            .entries()
                            .get(view.selected)
                            .map(|n| n.id);
                        if let Some(id) = id {
                            self.controller.notifications.dismiss(id);
                        }
                        let remaining = self.controller.notifications.len();
                        view.selected = view.selected.min(remaining.saturating_sub(1));
                    }
                    KeyCode::Char('c') => {
                        self.controller.notifications.dismiss_all();
                        *view = NotificationsState::default();
                    }
                    _ => {}
                }
            }
        }
        KeyOutcome::Continue
    }
}

fn print_exercises(catalog: &ExerciseCatalog) {
    for exercise in catalog.all() {
        println!(
            "{:<10} {:<28} {:<12} {}",
            exercise.id,
            exercise.title,
            exercise.model_family.to_string(),
            exercise.required_sensors.join(",")
        );
    }
}

fn print_history() -> Result<(), Box<dyn Error>> {
    let Some(path) = AppDirs::history_path() else {
        return Ok(());
    };
    for record in HistoryLog::new(path).read_all()? {
        println!(
            "{}  {:<10} {:>5}s  {}",
            record.finished_at, record.exercise, record.time_budget_secs, record.result
        );
    }
    Ok(())
}

fn main() -> Result<(), Box<dyn Error>> {
    let cli = Cli::parse();
    let store = FileConfigStore::new();
    let mut config = store.load();
    cli.apply_to(&mut config);
    let catalog = ExerciseCatalog::load()?;

    if let Some(id) = &cli.exercise {
        if catalog.get(id).is_none() {
            let mut cmd = Cli::command();
            cmd.error(ErrorKind::InvalidValue, format!("unknown exercise `{id}`"))
                .exit();
        }
    }

    if cli.list_exercises {
        print_exercises(&catalog);
        return Ok(());
    }
    if cli.history {
        logging::init_stderr();
        return print_history();
    }

    let api = HttpInferenceApi::new(&config.base_url, config.connect_timeout())?;
    if cli.ping {
        logging::init_stderr();
        let reply = api.usage()?;
        println!("{}", reply.message.unwrap_or(reply.kind));
        return Ok(());
    }

    if !stdin().is_tty() {
        let mut cmd = Cli::command();
        cmd.error(ErrorKind::Io, "stdin must be a tty").exit();
    }

    if let Some(path) = AppDirs::log_path() {
        logging::init_file(&path)?;
    }
    info!(base_url = %config.base_url, "starting");

    let (tx, rx) = mpsc::channel();
    let mut controller = Controller::new(
        catalog,
        Arc::new(api),
        tx.clone(),
        config.orchestrator_config(),
    );
    if let Some(path) = AppDirs::history_path() {
        controller = controller.with_history(HistoryLog::new(path));
    }
    spawn_terminal_events(tx);
    let runner = Runner::new(
        ChannelEventSource::new(rx),
        FixedTicker::new(Duration::from_millis(TICK_RATE_MS)),
    );

    let mut app = App::new(controller, config).with_store(store);
    app.controller.refresh_devices();

    enable_raw_mode()?;

    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen)?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;

    let result = start_tui(&mut terminal, &mut app, &runner);
    app.controller.stop();

    disable_raw_mode()?;
    execute!(terminal.backend_mut(), LeaveAlternateScreen,)?;
    terminal.show_cursor()?;

    result
}

fn start_tui<B: Backend>(
    terminal: &mut Terminal<B>,
    app: &mut App,
    runner: &Runner<ChannelEventSource, FixedTicker>,
) -> Result<(), Box<dyn Error>> {
    terminal.draw(|f| ui::draw(app, f))?;

    loop {
        let redraw = match runner.step() {
            AppEvent::Key(key) => match app.on_key(key) {
                KeyOutcome::Quit => break,
                KeyOutcome::Continue => true,
            },
            AppEvent::Resize => true,
            event => app.controller.handle(event),
        };
        if redraw {
            terminal.draw(|f| ui::draw(app, f))?;
        }
    }

    Ok(())
}
