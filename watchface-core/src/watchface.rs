//! Watch side: listens for weather snapshots and repaints a digital face.
//!
//! [`WatchFaceEngine`] owns all display state and handles one message at a
//! time. Host signals (visibility, ambient mode, taps, insets) arrive through
//! an [`EngineHandle`]; transport events and timer firings are posted into the
//! same inbox by helper tasks that never touch the state directly.

pub mod display;
pub mod engine;
pub mod layout;
pub mod render;
pub mod timer;

pub use display::{DisplayState, WeatherDisplay};
pub use engine::{EngineHandle, LinkStatus, TapType, WatchFaceEngine, WatchFaceEvent};
pub use layout::{FaceMetrics, FixedAdvance, TextMeasure, WeatherOffsets, center_weather_group};
pub use render::{Bounds, DrawOp, Frame};
