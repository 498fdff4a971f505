//! Core runtime configuration.
//!
//! # Responsibility
//! - Hold the tunables shared by validation, storage and route warnings.
//! - Load them from JSON with per-field defaults.
//!
//! # Invariants
//! - A config that passed `validate()` yields usable options and detectors.

use crate::logging::default_log_level;
use crate::model::tag::TagType;
use crate::route::{HazardTypes, ObstacleDetector, DEFAULT_CORRIDOR_M};
use crate::validation::{ValidationOptions, DEFAULT_SPATIAL_THRESHOLD_M};
use serde::{Deserialize, Serialize};
use std::error::Error;
use std::fmt::{Display, Formatter};

/// Namespace used when the caller does not pick one.
pub const DEFAULT_NAMESPACE: &str = "default";

#[derive(Debug)]
pub enum ConfigError {
    Parse(serde_json::Error),
    InvalidValue { field: &'static str, reason: String },
}

impl Display for ConfigError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Parse(err) => write!(f, "failed to parse config: {err}"),
            Self::InvalidValue { field, reason } => write!(f, "invalid config `{field}`: {reason}"),
        }
    }
}

impl Error for ConfigError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Parse(err) => Some(err),
            Self::InvalidValue { .. } => None,
        }
    }
}

impl From<serde_json::Error> for ConfigError {
    fn from(value: serde_json::Error) -> Self {
        Self::Parse(value)
    }
}

/// Tunables for one store/detector pairing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CoreConfig {
    /// Collection namespace (one per mapped location).
    pub namespace: String,
    /// Duplicate cutoff in meters.
    pub spatial_threshold_m: f64,
    /// Route corridor half-width in meters.
    pub corridor_m: f64,
    /// Closed type set; `null` opens it to any non-blank type.
    pub allowed_types: Option<Vec<TagType>>,
    pub hazard_types: Vec<TagType>,
    pub log_level: String,
}

impl Default for CoreConfig {
    fn default() -> Self {
        Self {
            namespace: DEFAULT_NAMESPACE.to_string(),
            spatial_threshold_m: DEFAULT_SPATIAL_THRESHOLD_M,
            corridor_m: DEFAULT_CORRIDOR_M,
            allowed_types: Some(TagType::standard()),
            hazard_types: vec![TagType::Obstacle],
            log_level: default_log_level().to_string(),
        }
    }
}

impl CoreConfig {
    /// Parses and validates a JSON config. Missing fields take defaults.
    pub fn from_json_str(raw: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(raw)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.namespace.trim().is_empty() {
            return Err(invalid("namespace", "must not be blank"));
        }
        check_distance("spatial_threshold_m", self.spatial_threshold_m)?;
        check_distance("corridor_m", self.corridor_m)?;
        if matches!(&self.allowed_types, Some(types) if types.is_empty()) {
            return Err(invalid(
                "allowed_types",
                "must list at least one type or be null",
            ));
        }
        if self.hazard_types.is_empty() {
            return Err(invalid("hazard_types", "must list at least one type"));
        }
        Ok(())
    }

    pub fn validation_options(&self) -> ValidationOptions {
        ValidationOptions {
            allowed_types: self.allowed_types.clone(),
            spatial_threshold_m: self.spatial_threshold_m,
            check_duplicates: true,
        }
    }

    pub fn hazards(&self) -> HazardTypes {
        HazardTypes::new(self.hazard_types.iter().cloned())
    }

    pub fn obstacle_detector(&self) -> ObstacleDetector {
        ObstacleDetector::new(self.hazards(), self.corridor_m)
    }
}

fn check_distance(field: &'static str, value: f64) -> Result<(), ConfigError> {
    if value.is_finite() && value >= 0.0 {
        Ok(())
    } else {
        Err(invalid(
            field,
            &format!("must be a finite, non-negative distance, got {value}"),
        ))
    }
}

fn invalid(field: &'static str, reason: &str) -> ConfigError {
    ConfigError::InvalidValue {
        field,
        reason: reason.to_string(),
    }
}
