use crate::error::BudgetError;
use crate::exercise::Exercise;
use crate::scoring::Scorer;

/// Sample polls per second of session time
pub const TICKS_PER_SECOND: u32 = 2;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SessionId(pub u64);

impl std::fmt::Display for SessionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "#{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, strum_macros::Display)]
pub enum SessionState {
    Idle,
    Validating,
    Starting,
    AwaitingReady,
    Sampling,
    Completed,
    Failed,
}

impl SessionState {
    /// States that hold the single active-session slot
    pub fn is_active(&self) -> bool {
        matches!(
            self,
            SessionState::Starting | SessionState::AwaitingReady | SessionState::Sampling
        )
    }
}

/// Positive whole number of seconds to sample for
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimeBudget(u32);

impl TimeBudget {
    pub fn new(secs: u32) -> Result<Self, BudgetError> {
        if secs == 0 {
            return Err(BudgetError::NonPositive(0));
        }
        Ok(Self(secs))
    }

    /// Parse operator input, telling "not a number" apart from "not positive"
    pub fn parse(input: &str) -> Result<Self, BudgetError> {
        let trimmed = input.trim();
        let value: i64 = trimmed
            .parse()
            .map_err(|_| BudgetError::NotAnInteger(trimmed.to_string()))?;
        if value <= 0 {
            return Err(BudgetError::NonPositive(value));
        }
        u32::try_from(value)
            .map(Self)
            .map_err(|_| BudgetError::TooLarge(value))
    }

    pub fn secs(&self) -> u32 {
        self.0
    }

    pub fn ticks(&self) -> u32 {
        self.0.saturating_mul(TICKS_PER_SECOND)
    }
}

/// One inference run. Created on start, dropped once it completes or fails.
#[derive(Debug, Clone)]
pub struct Session {
    pub id: SessionId,
    pub exercise: Exercise,
    pub budget: TimeBudget,
    pub connected_addresses: Vec<String>,
    pub state: SessionState,
    elapsed_ticks: u32,
    answered: Option<u32>,
    scorer: Scorer,
}

impl Session {
    pub fn new(id: SessionId, exercise: Exercise, budget: TimeBudget) -> Self {
        let scorer = Scorer::new(exercise.model_family);
        Self {
            id,
            exercise,
            budget,
            connected_addresses: Vec::new(),
            state: SessionState::Validating,
            elapsed_ticks: 0,
            answered: None,
            scorer,
        }
    }

    /// Enter sampling with a fresh score
    pub fn begin_sampling(&mut self) {
        self.state = SessionState::Sampling;
        self.elapsed_ticks = 0;
        self.answered = None;
        self.scorer = Scorer::new(self.exercise.model_family);
    }

    /// Advance session time by one sample period. No-op outside sampling.
    pub fn tick(&mut self) {
        if self.state == SessionState::Sampling {
            self.elapsed_ticks += 1;
        }
    }

    /// Claim the answer to `poll`. Only the poll sent on the current tick can be
    /// answered, and only once.
    pub fn accept_reply(&mut self, poll: u32) -> bool {
        if poll != self.elapsed_ticks || self.answered == Some(poll) {
            return false;
        }
        self.answered = Some(poll);
        true
    }

    pub fn elapsed_ticks(&self) -> u32 {
        self.elapsed_ticks
    }

    pub fn elapsed_secs(&self) -> f64 {
        self.elapsed_ticks as f64 / TICKS_PER_SECOND as f64
    }

    pub fn budget_exceeded(&self) -> bool {
        self.elapsed_ticks > self.budget.ticks()
    }

    /// Width of the progress bar: `(elapsed mod 10 + 0.5) * 10` percent
    pub fn progress_percent(&self) -> f64 {
        let period_ticks = crate::scoring::REPETITION_PERIOD_SECS * TICKS_PER_SECOND;
        let within = (self.elapsed_ticks % period_ticks) as f64 / TICKS_PER_SECOND as f64;
        (within + 0.5) * 10.0
    }

    pub fn record(&mut self, verdict: bool) -> bool {
        self.scorer.record(verdict, self.elapsed_ticks)
    }

    pub fn running_score(&self) -> u32 {
        self.scorer.score()
    }

    pub fn display(&self) -> String {
        self.scorer.display()
    }

    pub fn final_result(&self) -> String {
        self.scorer.final_result(self.budget)
    }
}
