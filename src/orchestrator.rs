//! Session orchestration.
//!
//! The orchestrator is a plain state machine: it never performs I/O itself.
//! Operations return the [`Effect`]s the caller must carry out (requests and
//! timers), and the results come back later as [`SessionEvent`]s tagged with
//! the session they belong to. Events for any other session, or that arrive in
//! a state that does not expect them, are dropped.

use std::time::Duration;

use chrono::{DateTime, Local};
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::api::ApiError;
use crate::devices::DeviceRegistry;
use crate::error::SessionError;
use crate::exercise::{Exercise, ExerciseCatalog};
use crate::notify::{NotificationKind, NotificationLog};
use crate::protocol::{DeviceRequest, Reply};
use crate::scoring::ModelFamily;
use crate::session::{Session, SessionId, SessionState, TimeBudget};

pub const DEFAULT_READINESS_GRACE: Duration = Duration::from_secs(2);
pub const SAMPLE_PERIOD: Duration = Duration::from_millis(500);

/// Shown in place of a result when a session fails mid-way
pub const GENERIC_FAILURE: &str =
    "Something went wrong, posture inference did not complete properly.";

/// When to send the readiness poll after the start request went out
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReadinessGate {
    /// Fixed grace period after sending the start request
    Delay(Duration),
    /// Wait for the start request's reply
    StartAck,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OrchestratorConfig {
    pub readiness: ReadinessGate,
    /// Wall-clock period of the sample timer. Session time always advances
    /// by half a second per tick regardless of this value.
    pub sample_period: Duration,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            readiness: ReadinessGate::Delay(DEFAULT_READINESS_GRACE),
            sample_period: SAMPLE_PERIOD,
        }
    }
}

/// I/O requested by the orchestrator
#[derive(Debug, Clone, PartialEq)]
pub enum Effect {
    SendStart {
        session: SessionId,
        request: DeviceRequest,
    },
    ScheduleReadinessPoll {
        session: SessionId,
        delay: Duration,
    },
    SendReadinessPoll {
        session: SessionId,
    },
    StartSampleTimer {
        session: SessionId,
        period: Duration,
    },
    /// `poll` is the elapsed tick that issued the request
    SendSamplePoll {
        session: SessionId,
        poll: u32,
    },
    /// Release every timer belonging to the session
    StopTimers,
}

/// Replies and timer firings fed back into the orchestrator
#[derive(Debug)]
pub enum SessionEvent {
    StartReply {
        session: SessionId,
        reply: Result<Reply, ApiError>,
    },
    ReadinessDue {
        session: SessionId,
    },
    ReadinessReply {
        session: SessionId,
        reply: Result<Reply, ApiError>,
    },
    SampleTick {
        session: SessionId,
    },
    SampleReply {
        session: SessionId,
        poll: u32,
        reply: Result<Reply, ApiError>,
    },
}

impl SessionEvent {
    pub fn session(&self) -> SessionId {
        match self {
            SessionEvent::StartReply { session, .. }
            | SessionEvent::ReadinessDue { session }
            | SessionEvent::ReadinessReply { session, .. }
            | SessionEvent::SampleTick { session }
            | SessionEvent::SampleReply { session, .. } => *session,
        }
    }
}

/// What is kept of a session that ran to the end of its budget
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SessionSummary {
    pub finished_at: DateTime<Local>,
    pub exercise: String,
    pub family: ModelFamily,
    pub time_budget_secs: u32,
    pub score: u32,
    pub result: String,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Outcome {
    Completed(SessionSummary),
    Failed {
        exercise: String,
        error: SessionError,
        /// Sampling was under way when the service stopped answering usefully
        interrupted: bool,
    },
}

#[derive(Debug, Default)]
pub struct Orchestrator {
    config: OrchestratorConfig,
    session: Option<Session>,
    next_id: u64,
    last_outcome: Option<Outcome>,
}

impl Orchestrator {
    pub fn new(config: OrchestratorConfig) -> Self {
        Self {
            config,
            ..Self::default()
        }
    }

    pub fn config(&self) -> &OrchestratorConfig {
        &self.config
    }

    pub fn session(&self) -> Option<&Session> {
        self.session.as_ref()
    }

    pub fn last_outcome(&self) -> Option<&Outcome> {
        self.last_outcome.as_ref()
    }

    pub fn is_active(&self) -> bool {
        self.session.as_ref().is_some_and(|s| s.state.is_active())
    }

    /// The start control is enabled whenever no session holds the slot
    pub fn start_enabled(&self) -> bool {
        !self.is_active()
    }

    pub fn state(&self) -> SessionState {
        match (&self.session, &self.last_outcome) {
            (Some(session), _) => session.state,
            (None, Some(Outcome::Completed(_))) => SessionState::Completed,
            (None, Some(Outcome::Failed { .. })) => SessionState::Failed,
            (None, None) => SessionState::Idle,
        }
    }

    /// Look the exercise up by id, then start it
    pub fn start_exercise(
        &mut self,
        catalog: &ExerciseCatalog,
        exercise_id: &str,
        budget_input: &str,
        registry: &DeviceRegistry,
        log: &mut NotificationLog,
    ) -> Result<Vec<Effect>, SessionError> {
        let Some(exercise) = catalog.get(exercise_id) else {
            let err = SessionError::UnknownExercise(exercise_id.to_string());
            log.post(NotificationKind::Exception, err.to_string());
            return Err(err);
        };
        self.start_session(exercise, budget_input, registry, log)
    }

    /// Validate the request and, if everything is in place, start a session.
    ///
    /// Input errors and a busy slot leave no trace besides a notification.
    /// Missing sensors fail the freshly created session before any request
    /// is sent.
    pub fn start_session(
        &mut self,
        exercise: &Exercise,
        budget_input: &str,
        registry: &DeviceRegistry,
        log: &mut NotificationLog,
    ) -> Result<Vec<Effect>, SessionError> {
        let budget = match TimeBudget::parse(budget_input) {
            Ok(budget) => budget,
            Err(err) => {
                log.post(NotificationKind::Exception, err.to_string());
                return Err(err.into());
            }
        };

        if self.is_active() {
            log.post(NotificationKind::Message, SessionError::SessionActive.to_string());
            return Err(SessionError::SessionActive);
        }

        self.next_id += 1;
        let id = SessionId(self.next_id);
        let mut session = Session::new(id, exercise.clone(), budget);

        match registry.resolve(&exercise.required_sensors) {
            Ok(addresses) => session.connected_addresses = addresses,
            Err(missing) => {
                let err = SessionError::MissingSensors(missing);
                warn!(session = %id, exercise = %exercise.id, %err, "validation failed");
                log.post(NotificationKind::Exception, err.to_string());
                self.last_outcome = Some(Outcome::Failed {
                    exercise: exercise.id.clone(),
                    error: err.clone(),
                    interrupted: false,
                });
                return Err(err);
            }
        }

        session.state = SessionState::Starting;
        info!(
            session = %id,
            exercise = %exercise.id,
            budget_secs = budget.secs(),
            "starting session"
        );
        log.post(
            NotificationKind::Message,
            format!("Connecting sensors for {}", exercise.title),
        );

        let mut effects = vec![Effect::SendStart {
            session: id,
            request: DeviceRequest::predict(
                session.connected_addresses.clone(),
                &exercise.id,
                budget.secs(),
            ),
        }];
        if let ReadinessGate::Delay(delay) = self.config.readiness {
            effects.push(Effect::ScheduleReadinessPoll { session: id, delay });
        }

        self.session = Some(session);
        self.last_outcome = None;
        Ok(effects)
    }

    /// Operator-initiated stop. The service is not told; its replies are ignored from now on.
    pub fn stop(&mut self, log: &mut NotificationLog) -> Vec<Effect> {
        if !self.is_active() {
            return Vec::new();
        }
        self.end_failed(
            SessionError::UnknownFailure("stopped by operator".to_string()),
            false,
            log,
        )
    }

    pub fn handle(&mut self, event: SessionEvent, log: &mut NotificationLog) -> Vec<Effect> {
        match event {
            SessionEvent::StartReply { session, reply } => self.on_start_reply(session, reply, log),
            SessionEvent::ReadinessDue { session } => {
                match self.expecting(session, SessionState::Starting) {
                    Some(active) => {
                        active.state = SessionState::AwaitingReady;
                        vec![Effect::SendReadinessPoll { session }]
                    }
                    None => Vec::new(),
                }
            }
            SessionEvent::ReadinessReply { session, reply } => {
                self.on_readiness_reply(session, reply, log)
            }
            SessionEvent::SampleTick { session } => {
                match self.expecting(session, SessionState::Sampling) {
                    Some(active) => {
                        active.tick();
                        vec![Effect::SendSamplePoll {
                            session,
                            poll: active.elapsed_ticks(),
                        }]
                    }
                    None => Vec::new(),
                }
            }
            SessionEvent::SampleReply {
                session,
                poll,
                reply,
            } => self.on_sample_reply(session, poll, reply, log),
        }
    }

    /// The active session, if `id` is it and it sits in `state`
    fn expecting(&mut self, id: SessionId, state: SessionState) -> Option<&mut Session> {
        let matches = self
            .session
            .as_ref()
            .is_some_and(|s| s.id == id && s.state == state);
        if !matches {
            debug!(
                session = %id,
                expected = %state,
                current = %self.state(),
                "ignoring stale event"
            );
            return None;
        }
        self.session.as_mut()
    }

    fn on_start_reply(
        &mut self,
        id: SessionId,
        reply: Result<Reply, ApiError>,
        log: &mut NotificationLog,
    ) -> Vec<Effect> {
        // Informational whatever the session's fate.
        match &reply {
            Ok(r) => {
                let message = r
                    .message
                    .clone()
                    .unwrap_or_else(|| format!("start request answered with `{}`", r.kind));
                log.post(NotificationKind::from_wire(&r.kind), message);
            }
            Err(err) => {
                log.post(
                    NotificationKind::Exception,
                    format!("start request failed: {err}"),
                );
            }
        }

        if self.config.readiness != ReadinessGate::StartAck {
            return Vec::new();
        }
        let Some(active) = self.expecting(id, SessionState::Starting) else {
            return Vec::new();
        };
        match reply {
            Ok(_) => {
                active.state = SessionState::AwaitingReady;
                vec![Effect::SendReadinessPoll { session: id }]
            }
            Err(err) => self.fail(err.into(), log),
        }
    }

    fn on_readiness_reply(
        &mut self,
        id: SessionId,
        reply: Result<Reply, ApiError>,
        log: &mut NotificationLog,
    ) -> Vec<Effect> {
        let period = self.config.sample_period;
        let Some(active) = self.expecting(id, SessionState::AwaitingReady) else {
            return Vec::new();
        };
        let ready = reply
            .map_err(SessionError::from)
            .and_then(|r| r.readiness().map_err(SessionError::from));
        match ready {
            Ok(()) => {
                active.begin_sampling();
                info!(session = %id, "service ready, sampling");
                log.post(NotificationKind::Message, "Sensors connected, posture inference started");
                vec![Effect::StartSampleTimer {
                    session: id,
                    period,
                }]
            }
            Err(err) => self.fail(err, log),
        }
    }

    fn on_sample_reply(
        &mut self,
        id: SessionId,
        poll: u32,
        reply: Result<Reply, ApiError>,
        log: &mut NotificationLog,
    ) -> Vec<Effect> {
        let Some(active) = self.expecting(id, SessionState::Sampling) else {
            return Vec::new();
        };
        // Budget expiry wins over whatever this reply says.
        if active.budget_exceeded() {
            return self.complete(log);
        }
        // Only the most recent poll is outstanding; anything older was superseded.
        if !active.accept_reply(poll) {
            debug!(
                session = %id,
                poll,
                latest = active.elapsed_ticks(),
                "dropping superseded or repeated sample reply"
            );
            return Vec::new();
        }
        let verdict = reply
            .map_err(SessionError::from)
            .and_then(|r| r.sample_verdict().map_err(SessionError::from));
        match verdict {
            Ok(verdict) => {
                let counted = active.record(verdict);
                debug!(
                    session = %id,
                    elapsed = active.elapsed_secs(),
                    verdict,
                    counted,
                    score = active.running_score(),
                    "sample"
                );
                Vec::new()
            }
            Err(err) => self.fail(err, log),
        }
    }

    fn complete(&mut self, log: &mut NotificationLog) -> Vec<Effect> {
        let Some(session) = self.session.take() else {
            return Vec::new();
        };
        let summary = SessionSummary {
            finished_at: Local::now(),
            exercise: session.exercise.id.clone(),
            family: session.exercise.model_family,
            time_budget_secs: session.budget.secs(),
            score: session.running_score(),
            result: session.final_result(),
        };
        info!(
            session = %session.id,
            exercise = %summary.exercise,
            score = summary.score,
            result = %summary.result,
            "session completed"
        );
        log.post(NotificationKind::Complete, summary.result.clone());
        self.last_outcome = Some(Outcome::Completed(summary));
        vec![Effect::StopTimers]
    }

    /// The service refused, garbled or dropped a request
    fn fail(&mut self, error: SessionError, log: &mut NotificationLog) -> Vec<Effect> {
        let interrupted = self.state() == SessionState::Sampling;
        self.end_failed(error, interrupted, log)
    }

    fn end_failed(
        &mut self,
        error: SessionError,
        interrupted: bool,
        log: &mut NotificationLog,
    ) -> Vec<Effect> {
        let Some(session) = self.session.take() else {
            return Vec::new();
        };
        warn!(
            session = %session.id,
            exercise = %session.exercise.id,
            state = %session.state,
            %error,
            "session failed"
        );
        match &error {
            SessionError::RemoteRejected { kind, message } => {
                log.post(NotificationKind::from_wire(kind), message.clone());
            }
            other => {
                log.post(NotificationKind::Exception, other.to_string());
            }
        }
        self.last_outcome = Some(Outcome::Failed {
            exercise: session.exercise.id,
            error,
            interrupted,
        });
        vec![Effect::StopTimers]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::devices::Sensor;
    use assert_matches::assert_matches;
    use std::collections::HashMap;

    const ALL_SENSORS: [&str; 8] = ["A", "B", "C", "D", "E", "F", "G", "H"];

    fn registry(online: &[&str]) -> DeviceRegistry {
        let mut registry = DeviceRegistry::new();
        registry.replace(
            ALL_SENSORS
                .iter()
                .map(|n| Sensor::new(*n, format!("addr-{n}")))
                .collect(),
        );
        let scan: HashMap<String, bool> = ALL_SENSORS
            .iter()
            .map(|n| (format!("addr-{n}"), online.contains(n)))
            .collect();
        registry.apply_scan(&scan);
        registry
    }

    fn start(
        orchestrator: &mut Orchestrator,
        exercise: &str,
        budget: &str,
        log: &mut NotificationLog,
    ) -> Result<Vec<Effect>, SessionError> {
        let catalog = ExerciseCatalog::load().unwrap();
        orchestrator.start_exercise(&catalog, exercise, budget, &registry(&ALL_SENSORS), log)
    }

    /// Drive a session up to the point where sampling starts
    fn sampling(exercise: &str, budget: &str) -> (Orchestrator, SessionId, NotificationLog) {
        let mut orchestrator = Orchestrator::default();
        let mut log = NotificationLog::new();
        start(&mut orchestrator, exercise, budget, &mut log).unwrap();
        let id = orchestrator.session().unwrap().id;
        orchestrator.handle(SessionEvent::ReadinessDue { session: id }, &mut log);
        let effects = orchestrator.handle(
            SessionEvent::ReadinessReply {
                session: id,
                reply: Ok(Reply::message("complete", "wait_end")),
            },
            &mut log,
        );
        assert_matches!(effects.as_slice(), [Effect::StartSampleTimer { .. }]);
        (orchestrator, id, log)
    }

    fn sample(
        orchestrator: &mut Orchestrator,
        id: SessionId,
        verdict: bool,
        log: &mut NotificationLog,
    ) -> Vec<Effect> {
        let poll = tick(orchestrator, id, log);
        orchestrator.handle(
            SessionEvent::SampleReply {
                session: id,
                poll,
                reply: Ok(Reply::verdict(verdict)),
            },
            log,
        )
    }

    /// Fire one sample tick and return the poll it issued
    fn tick(orchestrator: &mut Orchestrator, id: SessionId, log: &mut NotificationLog) -> u32 {
        match orchestrator
            .handle(SessionEvent::SampleTick { session: id }, log)
            .as_slice()
        {
            [Effect::SendSamplePoll { poll, .. }] => *poll,
            other => panic!("expected a sample poll, got {other:?}"),
        }
    }

    fn completed_result(orchestrator: &Orchestrator) -> &str {
        match orchestrator.last_outcome() {
            Some(Outcome::Completed(summary)) => &summary.result,
            other => panic!("expected completion, got {other:?}"),
        }
    }

    #[test]
    fn start_with_all_sensors_online_enters_starting() {
        let mut orchestrator = Orchestrator::default();
        let mut log = NotificationLog::new();

        let effects = start(&mut orchestrator, "neck", "30", &mut log).unwrap();

        assert_eq!(orchestrator.state(), SessionState::Starting);
        assert!(!orchestrator.start_enabled());
        let id = orchestrator.session().unwrap().id;
        assert_eq!(
            effects,
            vec![
                Effect::SendStart {
                    session: id,
                    request: DeviceRequest::predict(
                        vec!["addr-A".into(), "addr-F".into()],
                        "neck",
                        30
                    ),
                },
                Effect::ScheduleReadinessPoll {
                    session: id,
                    delay: DEFAULT_READINESS_GRACE,
                },
            ]
        );
    }

    #[test]
    fn invalid_budget_sends_nothing() {
        for input in ["", "ten", "2.5", "0", "-3"] {
            let mut orchestrator = Orchestrator::default();
            let mut log = NotificationLog::new();
            let result = start(&mut orchestrator, "neck", input, &mut log);
            assert_matches!(result, Err(SessionError::InvalidInput(_)), "input {input:?}");
            assert!(orchestrator.session().is_none());
            assert_eq!(orchestrator.state(), SessionState::Idle);
            assert!(orchestrator.start_enabled());
            assert_eq!(
                log.latest().map(|n| n.kind),
                Some(NotificationKind::Exception)
            );
        }
    }

    #[test]
    fn bridge_with_d_offline_names_exactly_d() {
        let catalog = ExerciseCatalog::load().unwrap();
        let mut orchestrator = Orchestrator::default();
        let mut log = NotificationLog::new();

        let result = orchestrator.start_exercise(
            &catalog,
            "bridge",
            "30",
            &registry(&["A", "B", "C", "E", "F", "G", "H"]),
            &mut log,
        );

        assert_eq!(result, Err(SessionError::MissingSensors(vec!["D".into()])));
        assert_eq!(orchestrator.state(), SessionState::Failed);
        assert!(orchestrator.start_enabled());
    }

    #[test]
    fn unknown_exercise_is_refused() {
        let mut orchestrator = Orchestrator::default();
        let mut log = NotificationLog::new();
        assert_eq!(
            start(&mut orchestrator, "plank", "30", &mut log),
            Err(SessionError::UnknownExercise("plank".into()))
        );
    }

    #[test]
    fn second_start_while_active_is_refused() {
        let mut orchestrator = Orchestrator::default();
        let mut log = NotificationLog::new();
        start(&mut orchestrator, "neck", "30", &mut log).unwrap();
        let id = orchestrator.session().unwrap().id;

        assert_eq!(
            start(&mut orchestrator, "neck", "30", &mut log),
            Err(SessionError::SessionActive)
        );
        assert_eq!(orchestrator.session().unwrap().id, id);
        assert_eq!(orchestrator.state(), SessionState::Starting);
    }

    #[test]
    fn readiness_poll_waits_for_the_grace_timer() {
        let mut orchestrator = Orchestrator::default();
        let mut log = NotificationLog::new();
        start(&mut orchestrator, "neck", "30", &mut log).unwrap();
        let id = orchestrator.session().unwrap().id;

        // Early readiness reply is not expected yet
        let effects = orchestrator.handle(
            SessionEvent::ReadinessReply {
                session: id,
                reply: Ok(Reply::message("complete", "wait_end")),
            },
            &mut log,
        );
        assert!(effects.is_empty());
        assert_eq!(orchestrator.state(), SessionState::Starting);

        let effects = orchestrator.handle(SessionEvent::ReadinessDue { session: id }, &mut log);
        assert_eq!(effects, vec![Effect::SendReadinessPoll { session: id }]);
        assert_eq!(orchestrator.state(), SessionState::AwaitingReady);
    }

    #[test]
    fn readiness_rejection_fails_with_server_reason() {
        let mut orchestrator = Orchestrator::default();
        let mut log = NotificationLog::new();
        start(&mut orchestrator, "neck", "30", &mut log).unwrap();
        let id = orchestrator.session().unwrap().id;
        orchestrator.handle(SessionEvent::ReadinessDue { session: id }, &mut log);

        let effects = orchestrator.handle(
            SessionEvent::ReadinessReply {
                session: id,
                reply: Ok(Reply::message("message", "(/predict_get):sensor disconnected")),
            },
            &mut log,
        );

        assert_eq!(effects, vec![Effect::StopTimers]);
        assert_eq!(orchestrator.state(), SessionState::Failed);
        assert!(orchestrator.start_enabled());
        assert_eq!(
            log.latest().map(|n| n.message.as_str()),
            Some("(/predict_get):sensor disconnected")
        );
        assert_matches!(
            orchestrator.last_outcome(),
            Some(Outcome::Failed {
                error: SessionError::RemoteRejected { .. },
                ..
            })
        );
    }

    #[test]
    fn start_ack_gate_polls_after_start_reply() {
        let mut orchestrator = Orchestrator::new(OrchestratorConfig {
            readiness: ReadinessGate::StartAck,
            ..OrchestratorConfig::default()
        });
        let mut log = NotificationLog::new();

        let effects = start(&mut orchestrator, "neck", "30", &mut log).unwrap();
        assert_eq!(effects.len(), 1);
        let id = orchestrator.session().unwrap().id;

        let effects = orchestrator.handle(
            SessionEvent::StartReply {
                session: id,
                reply: Ok(Reply::message("message", "accepted")),
            },
            &mut log,
        );
        assert_eq!(effects, vec![Effect::SendReadinessPoll { session: id }]);
        assert_eq!(orchestrator.state(), SessionState::AwaitingReady);
    }

    #[test]
    fn delay_gate_treats_start_reply_as_informational() {
        let mut orchestrator = Orchestrator::default();
        let mut log = NotificationLog::new();
        start(&mut orchestrator, "neck", "30", &mut log).unwrap();
        let id = orchestrator.session().unwrap().id;

        let effects = orchestrator.handle(
            SessionEvent::StartReply {
                session: id,
                reply: Ok(Reply::message("complete", "inference finished")),
            },
            &mut log,
        );
        assert!(effects.is_empty());
        assert_eq!(orchestrator.state(), SessionState::Starting);
        assert_eq!(
            log.latest().map(|n| (n.kind, n.message.as_str())),
            Some((NotificationKind::Complete, "inference finished"))
        );
    }

    #[test]
    fn repetition_all_true_over_thirty_seconds_reports_three() {
        let (mut orchestrator, id, mut log) = sampling("shoulder", "30");
        for _ in 0..60 {
            assert!(sample(&mut orchestrator, id, true, &mut log).is_empty());
        }
        assert_eq!(orchestrator.session().unwrap().running_score(), 3);
        assert_eq!(orchestrator.session().unwrap().display(), " ...O ...O ...O");

        let effects = sample(&mut orchestrator, id, true, &mut log);
        assert_eq!(effects, vec![Effect::StopTimers]);
        assert_eq!(orchestrator.state(), SessionState::Completed);
        assert_eq!(completed_result(&orchestrator), "3 repetitions succeeded");
        assert!(orchestrator.start_enabled());
    }

    #[test]
    fn dwell_ratio_all_true_over_ten_seconds_is_full_marks() {
        let (mut orchestrator, id, mut log) = sampling("neck", "10");
        for _ in 0..20 {
            sample(&mut orchestrator, id, true, &mut log);
        }
        sample(&mut orchestrator, id, true, &mut log);
        assert_eq!(
            completed_result(&orchestrator),
            "100.00% of 10s at target posture"
        );
        assert_eq!(
            log.latest().map(|n| n.kind),
            Some(NotificationKind::Complete)
        );
    }

    #[test]
    fn reply_at_exact_budget_is_scored_and_next_tick_is_not() {
        let (mut orchestrator, id, mut log) = sampling("shoulder", "10");
        for _ in 0..19 {
            sample(&mut orchestrator, id, false, &mut log);
        }
        // elapsed == 10s, a repetition boundary at the very end of the budget
        sample(&mut orchestrator, id, true, &mut log);
        assert_eq!(orchestrator.session().unwrap().running_score(), 1);

        // 10.5s: completes, and the verdict carried by this reply is dropped
        let poll = tick(&mut orchestrator, id, &mut log);
        orchestrator.handle(
            SessionEvent::SampleReply {
                session: id,
                poll,
                reply: Ok(Reply::message("exception", "would have failed")),
            },
            &mut log,
        );
        assert_eq!(completed_result(&orchestrator), "1 repetitions succeeded");
    }

    #[test]
    fn sampling_failure_discards_partial_score() {
        let (mut orchestrator, id, mut log) = sampling("neck", "30");
        sample(&mut orchestrator, id, true, &mut log);

        let poll = tick(&mut orchestrator, id, &mut log);
        let effects = orchestrator.handle(
            SessionEvent::SampleReply {
                session: id,
                poll,
                reply: Ok(Reply::message("exception", "(/predict_get):boom")),
            },
            &mut log,
        );

        assert_eq!(effects, vec![Effect::StopTimers]);
        assert!(orchestrator.session().is_none());
        assert_eq!(orchestrator.state(), SessionState::Failed);
        assert_eq!(
            log.latest().map(|n| (n.kind, n.message.as_str())),
            Some((NotificationKind::Exception, "(/predict_get):boom"))
        );
    }

    #[test]
    fn only_service_failures_during_sampling_count_as_interrupted() {
        let interrupted = |orchestrator: &Orchestrator| match orchestrator.last_outcome() {
            Some(Outcome::Failed { interrupted, .. }) => *interrupted,
            other => panic!("expected failure, got {other:?}"),
        };

        let (mut orchestrator, id, mut log) = sampling("neck", "30");
        let poll = tick(&mut orchestrator, id, &mut log);
        orchestrator.handle(
            SessionEvent::SampleReply {
                session: id,
                poll,
                reply: Err(ApiError::Status(500)),
            },
            &mut log,
        );
        assert!(interrupted(&orchestrator));

        let (mut orchestrator, _, mut log) = sampling("neck", "30");
        orchestrator.stop(&mut log);
        assert!(!interrupted(&orchestrator));

        let mut orchestrator = Orchestrator::default();
        let mut log = NotificationLog::new();
        start(&mut orchestrator, "neck", "30", &mut log).unwrap();
        let id = orchestrator.session().unwrap().id;
        orchestrator.handle(SessionEvent::ReadinessDue { session: id }, &mut log);
        orchestrator.handle(
            SessionEvent::ReadinessReply {
                session: id,
                reply: Ok(Reply::message("exception", "(/predict_get):no sensors")),
            },
            &mut log,
        );
        assert!(!interrupted(&orchestrator));
    }

    #[test]
    fn malformed_sample_fails_the_session() {
        let (mut orchestrator, id, mut log) = sampling("neck", "30");
        let poll = tick(&mut orchestrator, id, &mut log);
        let reply = Reply {
            kind: "data".into(),
            ..Reply::default()
        };
        orchestrator.handle(
            SessionEvent::SampleReply {
                session: id,
                poll,
                reply: Ok(reply),
            },
            &mut log,
        );
        assert_matches!(
            orchestrator.last_outcome(),
            Some(Outcome::Failed {
                error: SessionError::MalformedResponse(_),
                ..
            })
        );
    }

    #[test]
    fn stray_events_from_an_old_session_are_ignored() {
        let (mut orchestrator, old, mut log) = sampling("neck", "1");
        for _ in 0..3 {
            sample(&mut orchestrator, old, true, &mut log);
        }
        assert_eq!(orchestrator.state(), SessionState::Completed);

        start(&mut orchestrator, "neck", "30", &mut log).unwrap();
        let current = orchestrator.session().unwrap().id;
        assert_ne!(current, old);

        assert!(orchestrator
            .handle(SessionEvent::SampleTick { session: old }, &mut log)
            .is_empty());
        assert!(orchestrator
            .handle(SessionEvent::ReadinessDue { session: old }, &mut log)
            .is_empty());
        assert_eq!(orchestrator.state(), SessionState::Starting);
    }

    #[test]
    fn overlapping_replies_on_a_boundary_count_once() {
        let (mut orchestrator, id, mut log) = sampling("shoulder", "10");
        for _ in 0..18 {
            sample(&mut orchestrator, id, false, &mut log);
        }
        // The 9.5s poll is slow and its reply lands after the 10s poll went out
        let slow = tick(&mut orchestrator, id, &mut log);
        let latest = tick(&mut orchestrator, id, &mut log);
        for poll in [slow, latest] {
            orchestrator.handle(
                SessionEvent::SampleReply {
                    session: id,
                    poll,
                    reply: Ok(Reply::verdict(true)),
                },
                &mut log,
            );
        }

        let session = orchestrator.session().unwrap();
        assert_eq!(session.running_score(), 1);
        assert_eq!(session.display(), " ...O");
    }

    #[test]
    fn superseded_reply_does_not_score_the_next_tick() {
        let (mut orchestrator, id, mut log) = sampling("bridge", "30");
        let first = tick(&mut orchestrator, id, &mut log);
        tick(&mut orchestrator, id, &mut log);

        let effects = orchestrator.handle(
            SessionEvent::SampleReply {
                session: id,
                poll: first,
                reply: Ok(Reply::verdict(true)),
            },
            &mut log,
        );
        assert!(effects.is_empty());
        assert_eq!(orchestrator.session().unwrap().running_score(), 0);
        assert_eq!(orchestrator.state(), SessionState::Sampling);
    }

    #[test]
    fn superseded_reply_never_fails_the_session() {
        let (mut orchestrator, id, mut log) = sampling("neck", "30");
        let first = tick(&mut orchestrator, id, &mut log);
        tick(&mut orchestrator, id, &mut log);

        orchestrator.handle(
            SessionEvent::SampleReply {
                session: id,
                poll: first,
                reply: Ok(Reply::message("exception", "(/predict_get):aborted")),
            },
            &mut log,
        );
        assert_eq!(orchestrator.state(), SessionState::Sampling);
    }

    #[test]
    fn reply_after_stop_timers_is_ignored() {
        let (mut orchestrator, id, mut log) = sampling("neck", "1");
        for _ in 0..2 {
            sample(&mut orchestrator, id, true, &mut log);
        }
        let last = tick(&mut orchestrator, id, &mut log);
        let in_flight = tick(&mut orchestrator, id, &mut log);
        let effects = orchestrator.handle(
            SessionEvent::SampleReply {
                session: id,
                poll: last,
                reply: Ok(Reply::verdict(true)),
            },
            &mut log,
        );
        assert_eq!(effects, vec![Effect::StopTimers]);
        let before = orchestrator.last_outcome().cloned();

        let effects = orchestrator.handle(
            SessionEvent::SampleReply {
                session: id,
                poll: in_flight,
                reply: Ok(Reply::message("exception", "late")),
            },
            &mut log,
        );
        assert!(effects.is_empty());
        assert_eq!(orchestrator.state(), SessionState::Completed);
        assert_eq!(orchestrator.last_outcome().cloned(), before);
    }

    #[test]
    fn late_readiness_reply_during_sampling_is_ignored() {
        let (mut orchestrator, id, mut log) = sampling("neck", "30");
        let effects = orchestrator.handle(
            SessionEvent::ReadinessReply {
                session: id,
                reply: Ok(Reply::message("exception", "late")),
            },
            &mut log,
        );
        assert!(effects.is_empty());
        assert_eq!(orchestrator.state(), SessionState::Sampling);
    }

    #[test]
    fn operator_stop_releases_timers() {
        let (mut orchestrator, _id, mut log) = sampling("neck", "30");
        assert_eq!(orchestrator.stop(&mut log), vec![Effect::StopTimers]);
        assert_eq!(orchestrator.state(), SessionState::Failed);
        assert!(orchestrator.start_enabled());
        assert!(orchestrator.stop(&mut log).is_empty());
    }
}
