//! # Physics Configuration
//!
//! Loaded once at startup from TOML. Every field has a default, so an empty
//! file is a valid configuration.
//!
//! ```toml
//! thread_count = 4
//! gravity = [0.0, -9.81, 0.0]
//!
//! [sleep]
//! time_to_sleep = 1.0
//!
//! [debug_link]
//! enabled = true
//! channel_capacity = 8
//! ```

use crate::error::{PhysicsError, PhysicsResult};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Thresholds that put a resting body to sleep.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SleepConfig {
    /// Linear speed below which a body counts as resting (m/s).
    pub linear_threshold: f32,
    /// Angular speed below which a body counts as resting (rad/s).
    pub angular_threshold: f32,
    /// Seconds a body must rest before it sleeps.
    pub time_to_sleep: f32,
}

impl Default for SleepConfig {
    fn default() -> Self {
        Self {
            linear_threshold: 0.4,
            angular_threshold: 0.5,
            time_to_sleep: 2.0,
        }
    }
}

/// Debug-visualization link settings.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DebugLinkConfig {
    /// Publish a frame snapshot after each step when a transport is attached.
    pub enabled: bool,
    /// Bounded channel depth for frames the viewer has not consumed yet.
    pub channel_capacity: usize,
}

impl Default for DebugLinkConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            channel_capacity: 4,
        }
    }
}

/// Physics world configuration.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PhysicsConfig {
    /// Worker threads in the dispatcher. Fixed at configure time.
    pub thread_count: usize,
    /// Request GPU acceleration. Not available in this build.
    pub gpu_enabled: bool,
    /// Gravity applied to dynamic bodies (m/s²).
    pub gravity: [f32; 3],
    /// Velocity solver passes per step.
    pub solver_iterations: u32,
    /// Sleep thresholds.
    pub sleep: SleepConfig,
    /// Debug-visualization link.
    pub debug_link: DebugLinkConfig,
}

impl Default for PhysicsConfig {
    fn default() -> Self {
        Self {
            thread_count: 8,
            gpu_enabled: false,
            gravity: [0.0, -9.81, 0.0],
            solver_iterations: 8,
            sleep: SleepConfig::default(),
            debug_link: DebugLinkConfig::default(),
        }
    }
}

impl PhysicsConfig {
    /// Parses and validates a configuration from TOML text.
    ///
    /// # Errors
    ///
    /// Returns `InvalidConfig` on malformed TOML or out-of-range values.
    pub fn from_toml_str(text: &str) -> PhysicsResult<Self> {
        let config: Self = toml::from_str(text)
            .map_err(|e| PhysicsError::InvalidConfig(format!("Failed to parse config: {e}")))?;
        config.validate()?;
        Ok(config)
    }

    /// Reads, parses and validates a configuration file.
    ///
    /// # Errors
    ///
    /// Returns `InvalidConfig` if the file cannot be read or parsed.
    pub fn load(path: impl AsRef<Path>) -> PhysicsResult<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|e| {
            PhysicsError::InvalidConfig(format!("Failed to read {}: {e}", path.display()))
        })?;
        Self::from_toml_str(&text)
    }

    /// Checks value ranges.
    ///
    /// # Errors
    ///
    /// Returns `InvalidConfig` naming the first offending field.
    pub fn validate(&self) -> PhysicsResult<()> {
        if self.thread_count == 0 {
            return Err(PhysicsError::InvalidConfig(
                "thread_count must be at least 1".to_string(),
            ));
        }
        if self.solver_iterations == 0 {
            return Err(PhysicsError::InvalidConfig(
                "solver_iterations must be at least 1".to_string(),
            ));
        }
        if self.gravity.iter().any(|g| !g.is_finite()) {
            return Err(PhysicsError::InvalidConfig(format!(
                "gravity must be finite, got {:?}",
                self.gravity
            )));
        }

        let sleep = &self.sleep;
        for (name, value) in [
            ("sleep.linear_threshold", sleep.linear_threshold),
            ("sleep.angular_threshold", sleep.angular_threshold),
            ("sleep.time_to_sleep", sleep.time_to_sleep),
        ] {
            if !value.is_finite() || value < 0.0 {
                return Err(PhysicsError::InvalidConfig(format!(
                    "{name} must be finite and non-negative, got {value}"
                )));
            }
        }

        if self.debug_link.channel_capacity == 0 {
            return Err(PhysicsError::InvalidConfig(
                "debug_link.channel_capacity must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}
