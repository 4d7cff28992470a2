//! Flight Surety Library
//!
//! Coordination engine for a flight-delay insurance marketplace. Airlines
//! join by consortium vote and fund a shared pool, customers insure flights,
//! and a quorum of independent oracles decides each flight's outcome.
//!
//! The core registries are synchronous. The HTTP surface and the demo
//! services wrap them for the server binary.

pub mod airlines;
pub mod app;
pub mod app_state;
pub mod config;
pub mod error;
pub mod events;
pub mod flights;
pub mod gate;
pub mod handlers;
pub mod insurance;
pub mod models;
pub mod oracles;
pub mod routes;
pub mod services;
pub mod settlement;
pub mod treasury;

pub use app::FlightSuretyApp;
pub use error::{Result, SuretyError};
