//! External temperature sensor.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ThermoError {
    #[error("failed to read {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("invalid temperature reading {0:?}")]
    Parse(String),
}

/// Reads a temperature in degrees Celsius.
pub trait Thermometer: Send + Sync {
    fn read_temperature(&self) -> Result<f64, ThermoError>;
}

/// Thermocouple whose driver exposes the reading as a text file, e.g. a
/// MAX31855 behind an hwmon or a small userspace bridge.
#[derive(Debug, Clone)]
pub struct FileThermometer {
    path: PathBuf,
}

impl FileThermometer {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Thermometer for FileThermometer {
    fn read_temperature(&self) -> Result<f64, ThermoError> {
        let content = fs::read_to_string(&self.path).map_err(|source| ThermoError::Io {
            path: self.path.clone(),
            source,
        })?;
        let text = content.trim();
        let value: f64 = text
            .parse()
            .map_err(|_| ThermoError::Parse(text.to_string()))?;
        if !value.is_finite() {
            return Err(ThermoError::Parse(text.to_string()));
        }
        Ok(value)
    }
}
