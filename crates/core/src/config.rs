//! Core runtime configuration.
//!
//! This module defines configuration that should be resolved once at process startup and then
//! passed into core services behind an `Arc`. The intent is to avoid reading process-wide
//! environment variables during request handling, which can lead to inconsistent behaviour in
//! multi-threaded runtimes and test harnesses.

use crate::{ClinicError, ClinicResult};
use chrono::Duration;

/// Default number of candidate schedule slots the allocator will attempt.
pub const DEFAULT_CANDIDATE_SCAN_LIMIT: usize = 20;

/// Default clock-skew tolerance when rejecting past booking times.
pub const DEFAULT_PAST_TIME_TOLERANCE_SECS: i64 = 30;

/// Core configuration resolved at startup.
#[derive(Clone, Debug)]
pub struct CoreConfig {
    candidate_scan_limit: usize,
    past_time_tolerance: Duration,
}

impl CoreConfig {
    /// Create a new `CoreConfig`.
    ///
    /// # Errors
    ///
    /// Returns `ClinicError::Validation` if the scan limit is zero or the
    /// tolerance is negative.
    pub fn new(candidate_scan_limit: usize, past_time_tolerance_secs: i64) -> ClinicResult<Self> {
        if candidate_scan_limit == 0 {
            return Err(ClinicError::validation(
                "candidate_scan_limit",
                "must be at least 1",
            ));
        }
        if past_time_tolerance_secs < 0 {
            return Err(ClinicError::validation(
                "past_time_tolerance_secs",
                "must not be negative",
            ));
        }

        Ok(Self {
            candidate_scan_limit,
            past_time_tolerance: Duration::seconds(past_time_tolerance_secs),
        })
    }

    /// Upper bound on the number of candidate slots one reservation scans.
    ///
    /// Bounding the scan bounds retry cost under heavy contention, at the
    /// cost of an occasional false `NoCapacity` when capacity exists in a
    /// slot outside the window.
    pub fn candidate_scan_limit(&self) -> usize {
        self.candidate_scan_limit
    }

    /// How far in the past a requested booking time may lie before it is
    /// rejected. Absorbs small clock differences between the caller and the
    /// server.
    pub fn past_time_tolerance(&self) -> Duration {
        self.past_time_tolerance
    }
}

impl Default for CoreConfig {
    fn default() -> Self {
        Self {
            candidate_scan_limit: DEFAULT_CANDIDATE_SCAN_LIMIT,
            past_time_tolerance: Duration::seconds(DEFAULT_PAST_TIME_TOLERANCE_SECS),
        }
    }
}
