//! Background services run by the server binary

pub mod demo_seed;
pub mod oracle_simulator;

pub use demo_seed::{seed_demo, DemoRoster};
pub use oracle_simulator::{OracleSimulator, SimulatorError};
