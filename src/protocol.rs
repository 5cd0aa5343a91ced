//! Wire types for the inference service.
//!
//! Every reply is a JSON object tagged by `type`. Which other fields are present
//! depends on the endpoint, so a single permissive [`Reply`] is decoded and then
//! classified by the caller that knows which endpoint it talked to.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::devices::Sensor;
use crate::error::ProtocolError;

pub const KIND_DATA: &str = "data";
pub const KIND_COMPLETE: &str = "complete";
pub const READY_MESSAGE: &str = "wait_end";

/// Body shared by `/scan` and `/predict_start`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeviceRequest {
    pub dev_list: Vec<String>,
    pub pos: String,
    pub time: u32,
}

impl DeviceRequest {
    pub fn scan(addresses: Vec<String>) -> Self {
        Self {
            dev_list: addresses,
            pos: "none".to_string(),
            time: 0,
        }
    }

    pub fn predict(addresses: Vec<String>, exercise_id: &str, time_budget_secs: u32) -> Self {
        Self {
            dev_list: addresses,
            pos: exercise_id.to_string(),
            time: time_budget_secs,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Reply {
    #[serde(rename = "type")]
    pub kind: String,
    pub message: Option<String>,
    pub dev_num: Option<usize>,
    pub dev_names: Option<Vec<String>>,
    pub dev_addrs: Option<Vec<String>>,
    pub dev_online: Option<Vec<bool>>,
    pub predict_result: Option<String>,
}

impl Reply {
    pub fn message(kind: &str, message: &str) -> Self {
        Self {
            kind: kind.to_string(),
            message: Some(message.to_string()),
            ..Self::default()
        }
    }

    pub fn verdict(result: bool) -> Self {
        Self {
            kind: KIND_DATA.to_string(),
            predict_result: Some(if result { "True" } else { "False" }.to_string()),
            ..Self::default()
        }
    }

    fn rejected(&self) -> ProtocolError {
        ProtocolError::Rejected {
            kind: self.kind.clone(),
            message: self
                .message
                .clone()
                .unwrap_or_else(|| "no reason given".to_string()),
        }
    }

    /// Readiness succeeds only on `{type: "complete", message: "wait_end"}`
    pub fn readiness(&self) -> Result<(), ProtocolError> {
        if self.kind == KIND_COMPLETE && self.message.as_deref() == Some(READY_MESSAGE) {
            Ok(())
        } else {
            Err(self.rejected())
        }
    }

    /// One sample verdict from `predict_result`
    pub fn sample_verdict(&self) -> Result<bool, ProtocolError> {
        if self.kind != KIND_DATA {
            return Err(self.rejected());
        }
        match self.predict_result.as_deref() {
            Some("True") => Ok(true),
            Some("False") => Ok(false),
            Some(other) => Err(ProtocolError::Malformed(format!(
                "unexpected predict_result `{other}`"
            ))),
            None => Err(ProtocolError::Malformed(
                "sample reply without predict_result".to_string(),
            )),
        }
    }

    /// Known sensors from a `/devices` reply, all marked offline
    pub fn device_listing(&self) -> Result<Vec<Sensor>, ProtocolError> {
        if self.kind != KIND_DATA {
            return Err(self.rejected());
        }
        let (Some(names), Some(addrs)) = (&self.dev_names, &self.dev_addrs) else {
            return Err(ProtocolError::Malformed(
                "device listing without dev_names/dev_addrs".to_string(),
            ));
        };
        if names.len() != addrs.len() {
            return Err(ProtocolError::Malformed(format!(
                "device listing has {} names but {} addresses",
                names.len(),
                addrs.len()
            )));
        }
        Ok(names
            .iter()
            .zip(addrs)
            .map(|(name, address)| Sensor::new(name, address))
            .collect())
    }

    /// Online flags from a `/scan` reply keyed by the addresses that were asked about
    pub fn scan_results(&self, requested: &[String]) -> Result<HashMap<String, bool>, ProtocolError> {
        if self.kind != KIND_DATA {
            return Err(self.rejected());
        }
        let Some(online) = &self.dev_online else {
            return Err(ProtocolError::Malformed(
                "scan reply without dev_online".to_string(),
            ));
        };
        if online.len() != requested.len() {
            return Err(ProtocolError::Malformed(format!(
                "scan asked about {} sensors but got {} results",
                requested.len(),
                online.len()
            )));
        }
        Ok(requested.iter().cloned().zip(online.iter().copied()).collect())
    }
}
