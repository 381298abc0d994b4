//! Display formatting for weather values: temperature strings and the icon
//! chosen for a condition code.

use serde::{Deserialize, Serialize};

/// Unit system used when rendering temperatures.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Units {
    #[default]
    Metric,
    Imperial,
}

impl Units {
    pub fn as_str(&self) -> &'static str {
        match self {
            Units::Metric => "metric",
            Units::Imperial => "imperial",
        }
    }

    pub const fn all() -> &'static [Units] {
        &[Units::Metric, Units::Imperial]
    }
}

impl std::fmt::Display for Units {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl TryFrom<&str> for Units {
    type Error = anyhow::Error;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        match value.to_lowercase().as_str() {
            "metric" => Ok(Units::Metric),
            "imperial" => Ok(Units::Imperial),
            _ => Err(anyhow::anyhow!("Unknown units '{value}'. Supported units: metric, imperial.")),
        }
    }
}

/// Render a Celsius reading as a whole-degree string, e.g. `"25°"`.
pub fn format_temperature(celsius: f64, units: Units) -> String {
    let value = match units {
        Units::Metric => celsius,
        Units::Imperial => celsius * 1.8 + 32.0,
    };

    // f64::round is half-away-from-zero; adding 0.0 folds -0 into 0.
    let rounded = value.round() + 0.0;
    format!("{rounded:.0}\u{00B0}")
}

/// Art shown next to the temperatures on the watch face.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WeatherIcon {
    Storm,
    LightRain,
    Rain,
    Snow,
    Fog,
    Clear,
    LightClouds,
    Clouds,
}

impl WeatherIcon {
    /// Map an OpenWeatherMap condition code to its art. Unknown codes have none.
    pub fn from_condition(code: i32) -> Option<Self> {
        let icon = match code {
            200..=232 => WeatherIcon::Storm,
            300..=321 => WeatherIcon::LightRain,
            500..=504 => WeatherIcon::Rain,
            511 => WeatherIcon::Snow,
            520..=531 => WeatherIcon::Rain,
            600..=622 => WeatherIcon::Snow,
            701..=761 => WeatherIcon::Fog,
            781 => WeatherIcon::Storm,
            800 => WeatherIcon::Clear,
            801 => WeatherIcon::LightClouds,
            802..=804 => WeatherIcon::Clouds,
            _ => return None,
        };
        Some(icon)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            WeatherIcon::Storm => "storm",
            WeatherIcon::LightRain => "light_rain",
            WeatherIcon::Rain => "rain",
            WeatherIcon::Snow => "snow",
            WeatherIcon::Fog => "fog",
            WeatherIcon::Clear => "clear",
            WeatherIcon::LightClouds => "light_clouds",
            WeatherIcon::Clouds => "clouds",
        }
    }
}

impl std::fmt::Display for WeatherIcon {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
