//! # Prosperity Core
//!
//! Data-enhancement pipeline behind the urban prosperity calculator.
//!
//! For a requested indicator the pipeline gathers readings from every registered
//! source, harmonizes them into one value with a quality score, and falls back to
//! proxy-based prediction when no direct reading exists.

pub mod benchmarks;
pub mod clock;
pub mod collector;
pub mod error;
pub mod harmonizer;
pub mod models;
pub mod orchestrator;
pub mod predictor;
pub mod provider;
pub mod quality;
pub mod registry;
pub mod settings;
pub mod store;

pub use clock::{Clock, FixedClock, SystemClock};
pub use collector::Collector;
pub use error::*;
pub use harmonizer::Harmonizer;
pub use models::*;
pub use orchestrator::Orchestrator;
pub use predictor::{ModelParameterStore, ModelParameters, Predictor, StaticParameterStore};
pub use provider::{DataProvider, ManualEntryProvider, ProviderSet, SimulatedProvider};
pub use quality::DataQuality;
pub use registry::SourceRegistry;
pub use settings::*;
pub use store::{InMemoryRecordStore, RecordStore};
