use chrono::{DateTime, FixedOffset};

use super::layout::{FaceMetrics, TextMeasure, WeatherOffsets, center_weather_group};
use crate::{format::WeatherIcon, model::WeatherSnapshot};

/// Weather as laid out for drawing, derived from one snapshot.
#[derive(Debug, Clone, PartialEq)]
pub struct WeatherDisplay {
    pub snapshot: WeatherSnapshot,
    pub icon: Option<WeatherIcon>,
    pub icon_size: u32,
    pub temp_max: String,
    pub temp_min: String,
    pub offsets: WeatherOffsets,
}

impl WeatherDisplay {
    pub fn layout(snapshot: WeatherSnapshot, metrics: &FaceMetrics, measure: &dyn TextMeasure) -> Self {
        let icon = WeatherIcon::from_condition(snapshot.condition_code());
        let icon_size = metrics.dimensions.image_size;

        // Max temperature is padded on both sides to separate it from icon and min.
        let temp_max = format!(" {} ", snapshot.max_temperature());
        let temp_min = snapshot.min_temperature().to_string();

        let max_width = measure.measure(&temp_max, metrics.dimensions.temp_max_text_size);
        let min_width = measure.measure(&temp_min, metrics.dimensions.temp_min_text_size);
        let offsets = center_weather_group(icon_size as f32, max_width, min_width);

        Self { snapshot, icon, icon_size, temp_max, temp_min, offsets }
    }
}

/// Everything the renderer reads. Owned and mutated by the engine only.
#[derive(Debug, Clone, PartialEq)]
pub struct DisplayState {
    pub time: DateTime<FixedOffset>,
    pub visible: bool,
    pub ambient: bool,
    pub low_bit_ambient: bool,
    pub tap_count: u32,
    pub metrics: FaceMetrics,
    pub weather: Option<WeatherDisplay>,
}

impl DisplayState {
    pub fn new(time: DateTime<FixedOffset>, metrics: FaceMetrics) -> Self {
        Self {
            time,
            visible: false,
            ambient: false,
            low_bit_ambient: false,
            tap_count: 0,
            metrics,
            weather: None,
        }
    }

    /// Replace the shown weather with `snapshot` in one step.
    pub fn apply_snapshot(&mut self, snapshot: WeatherSnapshot, measure: &dyn TextMeasure) {
        self.weather = Some(WeatherDisplay::layout(snapshot, &self.metrics, measure));
    }

    /// Switch geometry, re-laying out any weather already shown.
    pub fn apply_metrics(&mut self, metrics: FaceMetrics, measure: &dyn TextMeasure) {
        self.metrics = metrics;
        if let Some(current) = self.weather.take() {
            self.weather = Some(WeatherDisplay::layout(current.snapshot, &self.metrics, measure));
        }
    }

    pub fn temp_max(&self) -> Option<&str> {
        self.weather.as_ref().map(|w| w.temp_max.as_str())
    }

    pub fn temp_min(&self) -> Option<&str> {
        self.weather.as_ref().map(|w| w.temp_min.as_str())
    }
}
