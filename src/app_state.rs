//! Application state shared across handlers

use std::sync::Arc;

use axum::extract::FromRef;

use crate::app::FlightSuretyApp;

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub engine: Arc<FlightSuretyApp>,
}

impl AppState {
    pub fn new(engine: Arc<FlightSuretyApp>) -> Self {
        Self { engine }
    }
}

impl FromRef<AppState> for Arc<FlightSuretyApp> {
    fn from_ref(app_state: &AppState) -> Self {
        app_state.engine.clone()
    }
}
