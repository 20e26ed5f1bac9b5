//! Ride-Hailing Fleet Simulator
//!
//! Simulates independently operating vehicles and streams one status event per
//! vehicle per tick to a message broker.

pub mod publisher;
pub mod simulation;
