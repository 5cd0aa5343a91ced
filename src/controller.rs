//! Application state shared by the TUI and the headless tests.
//!
//! Owns the collaborators, feeds non-key events into them and hands the
//! resulting effects to the driver. Keyboard handling stays in the binary.

use std::sync::mpsc::Sender;
use std::sync::Arc;

use itertools::Itertools;
use tracing::{info, warn};

use crate::api::{ApiError, InferenceApi};
use crate::devices::DeviceRegistry;
use crate::driver::EffectRunner;
use crate::error::SessionError;
use crate::exercise::ExerciseCatalog;
use crate::history::HistoryLog;
use crate::notify::{NotificationKind, NotificationLog};
use crate::orchestrator::{Effect, Orchestrator, OrchestratorConfig, Outcome};
use crate::protocol::Reply;
use crate::runtime::AppEvent;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeviceStatus {
    Unknown,
    Listing,
    Scanning,
    Ready,
    Unavailable(String),
}

pub struct Controller<A: InferenceApi> {
    pub catalog: ExerciseCatalog,
    pub registry: DeviceRegistry,
    pub notifications: NotificationLog,
    orchestrator: Orchestrator,
    runner: EffectRunner<A>,
    history: Option<HistoryLog>,
    device_status: DeviceStatus,
    listed_once: bool,
}

impl<A: InferenceApi> Controller<A> {
    pub fn new(
        catalog: ExerciseCatalog,
        api: Arc<A>,
        events: Sender<AppEvent>,
        config: OrchestratorConfig,
    ) -> Self {
        Self {
            catalog,
            registry: DeviceRegistry::new(),
            notifications: NotificationLog::new(),
            orchestrator: Orchestrator::new(config),
            runner: EffectRunner::new(api, events),
            history: None,
            device_status: DeviceStatus::Unknown,
            listed_once: false,
        }
    }

    pub fn with_history(mut self, history: HistoryLog) -> Self {
        self.history = Some(history);
        self
    }

    pub fn orchestrator(&self) -> &Orchestrator {
        &self.orchestrator
    }

    pub fn device_status(&self) -> &DeviceStatus {
        &self.device_status
    }

    pub fn has_timers(&self) -> bool {
        self.runner.has_timers()
    }

    /// Ask the service for its known sensors
    pub fn refresh_devices(&mut self) {
        self.device_status = DeviceStatus::Listing;
        self.runner.fetch_devices();
    }

    /// Re-check which known sensors are online
    pub fn rescan(&mut self) {
        if self.registry.is_empty() {
            self.notifications
                .post(NotificationKind::Message, "No sensors known yet, refresh the device list first");
            return;
        }
        self.device_status = DeviceStatus::Scanning;
        self.notifications
            .post(NotificationKind::Message, "Scanning sensors");
        self.runner.scan(self.registry.addresses());
    }

    pub fn start(&mut self, exercise_id: &str, budget_input: &str) -> Result<(), SessionError> {
        let effects = self.orchestrator.start_exercise(
            &self.catalog,
            exercise_id,
            budget_input,
            &self.registry,
            &mut self.notifications,
        )?;
        self.runner.apply(effects);
        Ok(())
    }

    pub fn stop(&mut self) {
        let effects = self.orchestrator.stop(&mut self.notifications);
        self.runner.apply(effects);
    }

    /// Apply one event. Returns whether anything visible may have changed.
    pub fn handle(&mut self, event: AppEvent) -> bool {
        match event {
            AppEvent::Session(event) => {
                let effects = self.orchestrator.handle(event, &mut self.notifications);
                let finished = effects.contains(&Effect::StopTimers);
                self.runner.apply(effects);
                if finished {
                    self.record_outcome();
                }
                true
            }
            AppEvent::Devices(reply) => {
                self.on_listing(reply);
                true
            }
            AppEvent::Scan { addresses, reply } => {
                self.on_scan(&addresses, reply);
                true
            }
            AppEvent::Tick => self.orchestrator.is_active(),
            AppEvent::Key(_) | AppEvent::Resize => false,
        }
    }

    fn on_listing(&mut self, reply: Result<Reply, ApiError>) {
        let listing = reply
            .map_err(SessionError::from)
            .and_then(|r| r.device_listing().map_err(SessionError::from));
        match listing {
            Ok(sensors) => {
                info!(count = sensors.len(), "device listing");
                self.notifications.post(
                    NotificationKind::Data,
                    format!(
                        "Known sensors: {}",
                        sensors.iter().map(|s| s.name.as_str()).join(", ")
                    ),
                );
                self.registry.replace(sensors);
                self.device_status = DeviceStatus::Ready;
                if !self.listed_once {
                    self.listed_once = true;
                    self.rescan();
                }
            }
            Err(err) => {
                warn!(%err, "device listing failed");
                self.device_status = DeviceStatus::Unavailable(err.to_string());
                self.notifications
                    .post(NotificationKind::Exception, err.to_string());
            }
        }
    }

    fn on_scan(&mut self, addresses: &[String], reply: Result<Reply, ApiError>) {
        let results = reply
            .map_err(SessionError::from)
            .and_then(|r| r.scan_results(addresses).map_err(SessionError::from));
        match results {
            Ok(results) => {
                self.registry.apply_scan(&results);
                let online = self.registry.online_names();
                info!(online = ?online, "scan");
                let message = if online.is_empty() {
                    "No sensors online".to_string()
                } else {
                    format!("Online: {}", online.iter().join(", "))
                };
                self.notifications.post(NotificationKind::Complete, message);
                self.device_status = DeviceStatus::Ready;
            }
            Err(err) => {
                warn!(%err, "scan failed");
                self.device_status = DeviceStatus::Unavailable(err.to_string());
                self.notifications
                    .post(NotificationKind::Exception, err.to_string());
            }
        }
    }

    fn record_outcome(&mut self) {
        let (Some(history), Some(Outcome::Completed(summary))) =
            (&self.history, self.orchestrator.last_outcome())
        else {
            return;
        };
        if let Err(err) = history.append(summary) {
            warn!(path = %history.path().display(), %err, "unable to record session");
            self.notifications.post(
                NotificationKind::Exception,
                format!("Unable to save result: {err}"),
            );
        }
    }
}
