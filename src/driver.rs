//! Carries out the orchestrator's effects.
//!
//! Each request runs on its own thread and its reply is sent back into the
//! application channel. The driver owns the session's timer handles, so
//! replacing or dropping them cancels the timers.

use std::sync::mpsc::Sender;
use std::sync::Arc;
use std::thread;

use tracing::{debug, warn};

use crate::api::{ApiError, InferenceApi};
use crate::orchestrator::{Effect, SessionEvent};
use crate::protocol::{DeviceRequest, Reply};
use crate::runtime::{spawn_delay, spawn_interval, AppEvent, TimerHandle};
use crate::session::SessionId;

pub struct EffectRunner<A: InferenceApi> {
    api: Arc<A>,
    events: Sender<AppEvent>,
    readiness_timer: Option<TimerHandle>,
    sample_timer: Option<TimerHandle>,
}

impl<A: InferenceApi> EffectRunner<A> {
    pub fn new(api: Arc<A>, events: Sender<AppEvent>) -> Self {
        Self {
            api,
            events,
            readiness_timer: None,
            sample_timer: None,
        }
    }

    pub fn api(&self) -> &Arc<A> {
        &self.api
    }

    /// Whether any session timer is still armed
    pub fn has_timers(&self) -> bool {
        self.readiness_timer.is_some() || self.sample_timer.is_some()
    }

    pub fn apply(&mut self, effects: Vec<Effect>) {
        for effect in effects {
            self.apply_one(effect);
        }
    }

    fn apply_one(&mut self, effect: Effect) {
        debug!(?effect, "effect");
        match effect {
            Effect::SendStart { session, request } => {
                self.request(session, move |api| api.predict_start(&request), |session, reply| {
                    SessionEvent::StartReply { session, reply }
                });
            }
            Effect::ScheduleReadinessPoll { session, delay } => {
                self.readiness_timer = Some(spawn_delay(delay, self.events.clone(), move || {
                    AppEvent::Session(SessionEvent::ReadinessDue { session })
                }));
            }
            Effect::SendReadinessPoll { session } => {
                self.readiness_timer = None;
                self.request(session, |api| api.predict_get(), |session, reply| {
                    SessionEvent::ReadinessReply { session, reply }
                });
            }
            Effect::StartSampleTimer { session, period } => {
                self.sample_timer = Some(spawn_interval(period, self.events.clone(), move || {
                    AppEvent::Session(SessionEvent::SampleTick { session })
                }));
            }
            Effect::SendSamplePoll { session, poll } => {
                self.request(session, |api| api.predict_get(), move |session, reply| {
                    SessionEvent::SampleReply {
                        session,
                        poll,
                        reply,
                    }
                });
            }
            Effect::StopTimers => {
                self.readiness_timer = None;
                self.sample_timer = None;
            }
        }
    }

    fn request<C, W>(&self, session: SessionId, call: C, wrap: W)
    where
        C: FnOnce(&A) -> Result<Reply, ApiError> + Send + 'static,
        W: FnOnce(SessionId, Result<Reply, ApiError>) -> SessionEvent + Send + 'static,
    {
        let api = Arc::clone(&self.api);
        let tx = self.events.clone();
        thread::spawn(move || {
            let reply = call(api.as_ref());
            if let Err(err) = &reply {
                warn!(%session, %err, "request failed");
            }
            let _ = tx.send(AppEvent::Session(wrap(session, reply)));
        });
    }

    /// Fetch the known sensor list
    pub fn fetch_devices(&self) {
        let api = Arc::clone(&self.api);
        let tx = self.events.clone();
        thread::spawn(move || {
            let _ = tx.send(AppEvent::Devices(api.devices()));
        });
    }

    /// Ask which of `addresses` are reachable
    pub fn scan(&self, addresses: Vec<String>) {
        let api = Arc::clone(&self.api);
        let tx = self.events.clone();
        thread::spawn(move || {
            let reply = api.scan(&DeviceRequest::scan(addresses.clone()));
            let _ = tx.send(AppEvent::Scan { addresses, reply });
        });
    }
}
