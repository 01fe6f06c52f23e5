//! JSON configuration and report helpers.

use crate::aruco::builtins::{builtin_dictionary, ARUCALIB_5X5_50};
use crate::{
    CalibrationError, CalibrationResult, CalibrationSample, CameraModel, DetectError,
    DetectedMarker, MarkerDetector, MarkerDetectorParams,
};
use serde::{Deserialize, Serialize};
use std::{
    fs,
    path::{Path, PathBuf},
};

#[derive(thiserror::Error, Debug)]
pub enum IoError {
    #[error(transparent)]
    Io(#[from] std::io::Error),
    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

#[derive(thiserror::Error, Debug)]
pub enum ConfigError {
    #[error("unknown dictionary {0:?}")]
    UnknownDictionary(String),
    #[error(transparent)]
    Detector(#[from] DetectError),
}

fn default_dictionary() -> String {
    ARUCALIB_5X5_50.to_string()
}

fn default_marker_length() -> f64 {
    0.05
}

fn load<T: for<'de> Deserialize<'de>>(path: impl AsRef<Path>) -> Result<T, IoError> {
    let raw = fs::read_to_string(path)?;
    Ok(serde_json::from_str(&raw)?)
}

fn write<T: Serialize>(value: &T, path: impl AsRef<Path>) -> Result<(), IoError> {
    let json = serde_json::to_string_pretty(value)?;
    fs::write(path, json)?;
    Ok(())
}

/// Configuration for marker detection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DetectConfig {
    #[serde(default)]
    pub image_path: Option<String>,
    /// Name of a built-in dictionary.
    #[serde(default = "default_dictionary")]
    pub dictionary: String,
    #[serde(default)]
    pub detector: MarkerDetectorParams,
    /// With a camera, detection also estimates marker poses.
    #[serde(default)]
    pub camera: Option<CameraModel>,
    /// Marker side length, in the unit of the reported translations.
    #[serde(default = "default_marker_length")]
    pub marker_length: f64,
    #[serde(default)]
    pub output_path: Option<String>,
}

impl Default for DetectConfig {
    fn default() -> Self {
        Self {
            image_path: None,
            dictionary: default_dictionary(),
            detector: MarkerDetectorParams::default(),
            camera: None,
            marker_length: default_marker_length(),
            output_path: None,
        }
    }
}

impl DetectConfig {
    /// Load a JSON config from disk.
    pub fn load_json(path: impl AsRef<Path>) -> Result<Self, IoError> {
        load(path)
    }

    /// Write this config to disk as pretty JSON.
    pub fn write_json(&self, path: impl AsRef<Path>) -> Result<(), IoError> {
        write(self, path)
    }

    /// Resolve the output report path.
    pub fn output_path(&self) -> PathBuf {
        self.output_path
            .as_ref()
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from("marker_detect_report.json"))
    }

    /// Build a detector for the configured dictionary and parameters.
    pub fn build_detector(&self) -> Result<MarkerDetector, ConfigError> {
        let dict = builtin_dictionary(&self.dictionary)
            .ok_or_else(|| ConfigError::UnknownDictionary(self.dictionary.clone()))?;
        Ok(MarkerDetector::new(dict, self.detector.clone())?)
    }
}

/// Result of one detection run, for export.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DetectReport {
    #[serde(default)]
    pub image_path: Option<String>,
    pub dictionary: String,
    pub width: usize,
    pub height: usize,
    pub markers: Vec<DetectedMarker>,
    #[serde(default)]
    pub error: Option<String>,
}

impl DetectReport {
    /// Build a report from a detection outcome.
    pub fn new(
        config: &DetectConfig,
        width: usize,
        height: usize,
        outcome: Result<Vec<DetectedMarker>, DetectError>,
    ) -> Self {
        let (markers, error) = match outcome {
            Ok(markers) => (markers, None),
            Err(err) => (Vec::new(), Some(err.to_string())),
        };
        Self {
            image_path: config.image_path.clone(),
            dictionary: config.dictionary.clone(),
            width,
            height,
            markers,
            error,
        }
    }

    pub fn load_json(path: impl AsRef<Path>) -> Result<Self, IoError> {
        load(path)
    }

    pub fn write_json(&self, path: impl AsRef<Path>) -> Result<(), IoError> {
        write(self, path)
    }
}

/// Calibration outcome, for export. Either `result` or `error` is set.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CalibrationReport {
    pub num_samples: usize,
    pub num_points: usize,
    #[serde(default)]
    pub result: Option<CalibrationResult>,
    #[serde(default)]
    pub error: Option<String>,
}

impl CalibrationReport {
    pub fn new(
        samples: &[CalibrationSample],
        outcome: &Result<CalibrationResult, CalibrationError>,
    ) -> Self {
        let (result, error) = match outcome {
            Ok(result) => (Some(result.clone()), None),
            Err(err) => (None, Some(err.to_string())),
        };
        Self {
            num_samples: samples.len(),
            num_points: samples.iter().map(CalibrationSample::len).sum(),
            result,
            error,
        }
    }

    pub fn load_json(path: impl AsRef<Path>) -> Result<Self, IoError> {
        load(path)
    }

    pub fn write_json(&self, path: impl AsRef<Path>) -> Result<(), IoError> {
        write(self, path)
    }
}
