use std::fmt;

use super::display::DisplayState;
use crate::format::WeatherIcon;

pub const INTERACTIVE_TIME_FORMAT: &str = "%H:%M:%S";
pub const AMBIENT_TIME_FORMAT: &str = "%H:%M";
pub const DATE_FORMAT: &str = "%a, %d %b";

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Bounds {
    pub width: f32,
    pub height: f32,
}

impl Default for Bounds {
    fn default() -> Self {
        Self { width: 320.0, height: 320.0 }
    }
}

impl Bounds {
    pub fn center_x(&self) -> f32 {
        self.width / 2.0
    }

    pub fn center_y(&self) -> f32 {
        self.height / 2.0
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Background {
    Interactive,
    Ambient,
}

#[derive(Debug, Clone, PartialEq)]
pub enum DrawOp {
    Text { text: String, x: f32, y: f32, size: f32, anti_alias: bool },
    Icon { icon: WeatherIcon, x: f32, y: f32, size: u32 },
}

/// One repaint, as a list of draw operations.
#[derive(Debug, Clone, PartialEq)]
pub struct Frame {
    pub sequence: u64,
    pub background: Background,
    pub ops: Vec<DrawOp>,
}

impl Frame {
    pub fn blank() -> Self {
        Self { sequence: 0, background: Background::Interactive, ops: Vec::new() }
    }

    pub fn texts(&self) -> impl Iterator<Item = &str> {
        self.ops.iter().filter_map(|op| match op {
            DrawOp::Text { text, .. } => Some(text.as_str()),
            DrawOp::Icon { .. } => None,
        })
    }

    pub fn icon(&self) -> Option<WeatherIcon> {
        self.ops.iter().find_map(|op| match op {
            DrawOp::Icon { icon, .. } => Some(*icon),
            DrawOp::Text { .. } => None,
        })
    }
}

impl fmt::Display for Frame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mode = match self.background {
            Background::Interactive => "interactive",
            Background::Ambient => "ambient",
        };
        write!(f, "#{:<4} [{mode}]", self.sequence)?;
        for op in &self.ops {
            match op {
                DrawOp::Text { text, .. } => write!(f, " {text:?}")?,
                DrawOp::Icon { icon, .. } => write!(f, " <{icon}>")?,
            }
        }
        Ok(())
    }
}

/// Paint `state` into `bounds`. Ambient frames carry only `HH:MM`.
pub fn render(state: &DisplayState, bounds: Bounds, sequence: u64) -> Frame {
    let m = &state.metrics;
    let cx = bounds.center_x();
    let cy = bounds.center_y();

    if state.ambient {
        let ops = vec![DrawOp::Text {
            text: state.time.format(AMBIENT_TIME_FORMAT).to_string(),
            x: cx - m.time_x_offset_ambient,
            y: cy,
            size: m.dimensions.time_text_size_ambient,
            anti_alias: !state.low_bit_ambient,
        }];
        return Frame { sequence, background: Background::Ambient, ops };
    }

    let mut ops = vec![
        DrawOp::Text {
            text: state.time.format(INTERACTIVE_TIME_FORMAT).to_string(),
            x: cx - m.time_x_offset_interactive,
            y: cy,
            size: m.dimensions.time_text_size_interactive,
            anti_alias: true,
        },
        DrawOp::Text {
            text: state.time.format(DATE_FORMAT).to_string(),
            x: cx - m.date_x_offset,
            y: cy - m.date_y_offset,
            size: m.dimensions.date_text_size,
            anti_alias: true,
        },
    ];

    if let Some(weather) = &state.weather {
        ops.push(DrawOp::Text {
            text: weather.temp_max.clone(),
            x: cx - weather.offsets.max,
            y: cy + m.temp_max_y_offset,
            size: m.dimensions.temp_max_text_size,
            anti_alias: true,
        });
        ops.push(DrawOp::Text {
            text: weather.temp_min.clone(),
            x: cx - weather.offsets.min,
            y: cy + m.temp_min_y_offset,
            size: m.dimensions.temp_min_text_size,
            anti_alias: true,
        });
        if let Some(icon) = weather.icon {
            ops.push(DrawOp::Icon {
                icon,
                x: cx - weather.offsets.icon,
                y: cy,
                size: weather.icon_size,
            });
        }
    }

    Frame { sequence, background: Background::Interactive, ops }
}
