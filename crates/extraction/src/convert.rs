//! Unit conversions applied to raw band samples before normalization.

use crate::config::ParameterConfig;

/// Metres per second to miles per hour.
pub const MS_TO_MPH: f64 = 2.23694;

/// Metres per second to kilometres per hour.
pub const MS_TO_KPH: f64 = 3.6;

pub fn celsius_to_fahrenheit(celsius: f64) -> f64 {
    celsius * 9.0 / 5.0 + 32.0
}

/// Target unit for speeds given in m/s.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SpeedUnit {
    Mph,
    Kph,
}

impl SpeedUnit {
    /// mph takes precedence when both flags are set.
    pub fn from_flags(to_mph: bool, to_kph: bool) -> Option<Self> {
        if to_mph {
            Some(SpeedUnit::Mph)
        } else if to_kph {
            Some(SpeedUnit::Kph)
        } else {
            None
        }
    }

    pub fn factor(&self) -> f64 {
        match self {
            SpeedUnit::Mph => MS_TO_MPH,
            SpeedUnit::Kph => MS_TO_KPH,
        }
    }
}

/// Conversions selected for one parameter.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Conversions {
    pub fahrenheit: bool,
    pub speed: Option<SpeedUnit>,
}

impl Conversions {
    pub fn from_config(config: &ParameterConfig) -> Self {
        Self {
            fahrenheit: config.to_fahrenheit,
            speed: SpeedUnit::from_flags(config.to_mph, config.to_kph),
        }
    }

    /// Convert samples of an explicitly selected band.
    pub fn apply(&self, values: &mut [f64]) {
        if self.fahrenheit {
            values.iter_mut().for_each(|v| *v = celsius_to_fahrenheit(*v));
        }
        self.apply_speed(values);
    }

    /// Convert a derived speed band. Fahrenheit never applies here.
    pub fn apply_speed(&self, values: &mut [f64]) {
        if let Some(unit) = self.speed {
            let factor = unit.factor();
            values.iter_mut().for_each(|v| *v *= factor);
        }
    }
}

/// Elementwise `sqrt(u² + v²)`.
pub fn vector_magnitude(u: &[f64], v: &[f64]) -> Vec<f64> {
    u.iter().zip(v).map(|(u, v)| (u * u + v * v).sqrt()).collect()
}
