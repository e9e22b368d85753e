//! Engine configuration resolved once at process startup.
//!
//! This module defines configuration that should be resolved when the
//! process starts and then passed into the engine, so that no process-wide
//! environment is read during request handling. Per-deployment overrides of
//! the numeric thresholds arrive through the data store's global properties
//! instead (see the hypertension program); the values here are the
//! fallbacks used when no property is set.

/// Global property key overriding the systolic blood-pressure threshold.
pub const SYSTOLIC_THRESHOLD_PROPERTY: &str = "htn.systolic.threshold";

/// Global property key overriding the diastolic blood-pressure threshold.
pub const DIASTOLIC_THRESHOLD_PROPERTY: &str = "htn.diastolic.threshold";

/// Engine configuration shared read-only across evaluations.
#[derive(Clone, Debug)]
pub struct EngineConfig {
    systolic_threshold: i32,
    diastolic_threshold: i32,
    minor_age_years: i32,
}

impl EngineConfig {
    pub fn new(systolic_threshold: i32, diastolic_threshold: i32, minor_age_years: i32) -> Self {
        Self {
            systolic_threshold,
            diastolic_threshold,
            minor_age_years,
        }
    }

    /// Systolic reading above this is considered high, in mmHg.
    pub fn systolic_threshold(&self) -> i32 {
        self.systolic_threshold
    }

    /// Diastolic reading above this is considered high, in mmHg.
    pub fn diastolic_threshold(&self) -> i32 {
        self.diastolic_threshold
    }

    /// Patients strictly younger than this are routed through diagnosis
    /// before program registration.
    pub fn minor_age_years(&self) -> i32 {
        self.minor_age_years
    }
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self::new(140, 90, 18)
    }
}
