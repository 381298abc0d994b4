use std::fmt::Debug;

use crate::config::{FaceDimensions, ScreenShape};

/// Measures the rendered width of a string.
pub trait TextMeasure: Send + Sync + Debug {
    fn measure(&self, text: &str, text_size: f32) -> f32;
}

/// Every character advances by `advance_ratio * text_size`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FixedAdvance {
    pub advance_ratio: f32,
}

impl Default for FixedAdvance {
    fn default() -> Self {
        Self { advance_ratio: 0.5 }
    }
}

impl TextMeasure for FixedAdvance {
    fn measure(&self, text: &str, text_size: f32) -> f32 {
        text.chars().count() as f32 * text_size * self.advance_ratio
    }
}

/// Distances left of the screen centre at which each weather element starts.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct WeatherOffsets {
    pub icon: f32,
    pub max: f32,
    pub min: f32,
}

/// Centre `[icon][max][min]` horizontally as one group.
pub fn center_weather_group(icon_width: f32, max_width: f32, min_width: f32) -> WeatherOffsets {
    let icon = (icon_width + max_width + min_width) / 2.0;
    WeatherOffsets { icon, max: icon - icon_width, min: icon - icon_width - max_width }
}

/// Fixed geometry for one screen shape.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FaceMetrics {
    pub shape: ScreenShape,
    pub dimensions: FaceDimensions,
    pub time_x_offset_interactive: f32,
    pub time_x_offset_ambient: f32,
    pub date_x_offset: f32,
    pub date_y_offset: f32,
    pub temp_max_y_offset: f32,
    pub temp_min_y_offset: f32,
}

impl FaceMetrics {
    pub fn compute(shape: ScreenShape, dimensions: FaceDimensions, measure: &dyn TextMeasure) -> Self {
        let image_size = dimensions.image_size as f32;

        Self {
            shape,
            dimensions,
            time_x_offset_interactive: measure
                .measure("00:00:00", dimensions.time_text_size_interactive)
                / 2.0,
            time_x_offset_ambient: measure.measure("00:00", dimensions.time_text_size_ambient)
                / 2.0,
            date_x_offset: measure.measure("000, 00 000", dimensions.date_text_size) / 2.0,
            date_y_offset: dimensions.time_text_size_interactive,
            temp_max_y_offset: image_size - dimensions.temp_max_text_size,
            temp_min_y_offset: image_size - dimensions.temp_min_text_size,
        }
    }
}
