//! Error taxonomy of the simulation core

use std::path::PathBuf;

use super::types::VehicleState;

#[derive(Debug, thiserror::Error)]
pub enum SimError {
    /// Bad or missing configuration or POI data; aborts before the run starts
    #[error("configuration error: {0}")]
    Config(String),

    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Fewer than two POIs in a region; fatal for that region only
    #[error("region '{region}' has {found} point(s) of interest, at least 2 are required")]
    InsufficientData { region: String, found: usize },

    #[error("trip from '{origin}' to '{destination}' has zero length")]
    DegenerateTrip { origin: String, destination: String },

    #[error("vehicle {vehicle_id} cannot {action} while {state}")]
    InvalidTransition {
        vehicle_id: String,
        state: VehicleState,
        action: &'static str,
    },
}

impl SimError {
    pub fn config(message: impl Into<String>) -> Self {
        SimError::Config(message.into())
    }

    /// True for errors that must abort the run at startup
    pub fn is_fatal(&self) -> bool {
        matches!(self, SimError::Config(_) | SimError::Io { .. })
    }
}

pub type SimResult<T> = Result<T, SimError>;
