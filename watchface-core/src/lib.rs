//! Core library for the watch-face weather relay.
//!
//! This crate defines:
//! - The snapshot producer that runs next to the phone's weather store
//! - An abstraction over the device-to-device transport, with an in-process implementation
//! - The watch-face engine that applies snapshots and schedules repaints
//! - Configuration and display formatting shared by both sides
//!
//! It is used by `watchface-cli`, but can also be embedded by other hosts.

pub mod clock;
pub mod config;
pub mod format;
pub mod model;
pub mod producer;
pub mod source;
pub mod transport;
pub mod watchface;

pub use config::{Config, FaceDimensions, ScreenShape};
pub use format::{Units, WeatherIcon, format_temperature};
pub use model::{DataMap, SnapshotError, WEATHER_DATA_PATH, WeatherRow, WeatherSnapshot};
pub use producer::{ProducerService, PublishOutcome, SnapshotProducer, Trigger};
pub use source::{InMemoryWeatherSource, WeatherSource};
pub use transport::{Connection, DataEvent, LocalTransport, Transport, TransportError};
pub use watchface::{EngineHandle, WatchFaceEngine, WatchFaceEvent};
