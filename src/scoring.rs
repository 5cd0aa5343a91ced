//! Turns the stream of per-sample verdicts into a score.
//!
//! Elapsed time is measured in sample ticks (two per second) so every
//! comparison stays in integers.

use serde::{Deserialize, Serialize};

use crate::session::{TimeBudget, TICKS_PER_SECOND};

/// Seconds between verdicts that count for the repetition family
pub const REPETITION_PERIOD_SECS: u32 = 10;

const SUCCESS_MARK: &str = " ...O";
const FAILURE_MARK: &str = " ...X";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, strum_macros::Display)]
#[serde(rename_all = "kebab-case")]
#[strum(serialize_all = "kebab-case")]
pub enum ModelFamily {
    /// Periodic movement, judged once per repetition period
    Repetition,
    /// Held posture, judged on every sample
    DwellRatio,
}

/// Scoring strategy for one session, chosen from the exercise's family
#[derive(Debug, Clone, PartialEq)]
pub enum Scorer {
    Repetition { score: u32, marks: Vec<bool> },
    DwellRatio { score: u32, at_target: Option<bool> },
}

impl Scorer {
    pub fn new(family: ModelFamily) -> Self {
        match family {
            ModelFamily::Repetition => Scorer::Repetition {
                score: 0,
                marks: Vec::new(),
            },
            ModelFamily::DwellRatio => Scorer::DwellRatio {
                score: 0,
                at_target: None,
            },
        }
    }

    pub fn family(&self) -> ModelFamily {
        match self {
            Scorer::Repetition { .. } => ModelFamily::Repetition,
            Scorer::DwellRatio { .. } => ModelFamily::DwellRatio,
        }
    }

    /// Feed one verdict observed at `elapsed_ticks`. Returns whether it counted.
    pub fn record(&mut self, verdict: bool, elapsed_ticks: u32) -> bool {
        match self {
            Scorer::Repetition { score, marks } => {
                if !is_repetition_boundary(elapsed_ticks) {
                    return false;
                }
                if verdict {
                    *score += 1;
                }
                marks.push(verdict);
                true
            }
            Scorer::DwellRatio { score, at_target } => {
                if verdict {
                    *score += 1;
                }
                *at_target = Some(verdict);
                true
            }
        }
    }

    pub fn score(&self) -> u32 {
        match self {
            Scorer::Repetition { score, .. } | Scorer::DwellRatio { score, .. } => *score,
        }
    }

    /// Live text shown while sampling
    pub fn display(&self) -> String {
        match self {
            Scorer::Repetition { marks, .. } => marks
                .iter()
                .map(|ok| if *ok { SUCCESS_MARK } else { FAILURE_MARK })
                .collect(),
            Scorer::DwellRatio { at_target, .. } => match at_target {
                Some(true) => "target reached".to_string(),
                Some(false) => "target not reached".to_string(),
                None => String::new(),
            },
        }
    }

    pub fn final_result(&self, budget: TimeBudget) -> String {
        match self {
            Scorer::Repetition { score, .. } => format!("{score} repetitions succeeded"),
            Scorer::DwellRatio { score, .. } => format!(
                "{:.2}% of {}s at target posture",
                dwell_percentage(*score, budget),
                budget.secs()
            ),
        }
    }
}

pub fn is_repetition_boundary(elapsed_ticks: u32) -> bool {
    elapsed_ticks % (REPETITION_PERIOD_SECS * TICKS_PER_SECOND) == 0
}

/// Share of the budget spent at the target posture, as a percentage
pub fn dwell_percentage(score: u32, budget: TimeBudget) -> f64 {
    (score as f64 / TICKS_PER_SECOND as f64) / budget.secs() as f64 * 100.0
}
