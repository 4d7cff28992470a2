//! Simulated oracle pool for demos
//!
//! Listens for `OracleRequest` events and answers every one of them from
//! each simulated oracle, on each of its indexes. One status is drawn per
//! request so that the pool agrees with itself and reaches quorum.

use std::sync::Arc;

use rand::seq::SliceRandom;
use thiserror::Error;
use tokio::sync::broadcast::error::RecvError;
use tracing::{debug, info, warn};

use crate::app::FlightSuretyApp;
use crate::events::SuretyEvent;
use crate::models::{Identity, RequestId, StatusCode};

#[derive(Error, Debug, PartialEq, Eq)]
pub enum SimulatorError {
    #[error("no simulated oracles configured")]
    NoOracles,
}

pub struct OracleSimulator {
    engine: Arc<FlightSuretyApp>,
    oracles: Vec<Identity>,
}

impl OracleSimulator {
    pub fn new(engine: Arc<FlightSuretyApp>, oracles: Vec<Identity>) -> Self {
        Self { engine, oracles }
    }

    /// Runs until the event feed closes.
    pub async fn start(self) -> Result<(), SimulatorError> {
        if self.oracles.is_empty() {
            return Err(SimulatorError::NoOracles);
        }

        let mut events = self.engine.subscribe();
        info!(oracles = self.oracles.len(), "oracle simulator started");

        loop {
            match events.recv().await {
                Ok(envelope) => {
                    if let SuretyEvent::OracleRequest { request_id, .. } = envelope.event {
                        let status = Self::draw_status();
                        self.answer(&request_id, status);
                    }
                }
                Err(RecvError::Lagged(skipped)) => {
                    warn!(skipped, "oracle simulator lagged behind the event feed");
                }
                Err(RecvError::Closed) => {
                    info!("event feed closed; oracle simulator stopping");
                    return Ok(());
                }
            }
        }
    }

    fn draw_status() -> StatusCode {
        let reportable: Vec<StatusCode> = StatusCode::ALL
            .into_iter()
            .filter(|status| status.is_resolved())
            .collect();
        reportable
            .choose(&mut rand::thread_rng())
            .copied()
            .unwrap_or(StatusCode::OnTime)
    }

    /// Submits `status` from every oracle on every index it holds. Returns
    /// the number of accepted reports.
    pub fn answer(&self, request_id: &RequestId, status: StatusCode) -> usize {
        let mut accepted = 0;

        for oracle in &self.oracles {
            let Some(indexes) = self.engine.indexes_of(oracle) else {
                continue;
            };
            for index in indexes {
                match self.engine.submit_response(request_id, index, status, oracle) {
                    Ok(true) => accepted += 1,
                    Ok(false) => {}
                    Err(err) => {
                        debug!(%oracle, index, error = %err, "simulated response rejected");
                    }
                }
            }
        }

        info!(request = %request_id, ?status, accepted, "simulated oracles answered");
        accepted
    }
}
