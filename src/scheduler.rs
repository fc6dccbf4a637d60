//! Duty-cycle scheduling.
//!
//! Each wake cycle asks one question: which of the periodic fetches are due
//! right now? The answer only depends on the configured intervals, the wake
//! counter and the cycle marks of the last successful fetches, so the whole
//! decision is a pure function that can be exercised without hardware.

use crate::config::ConfigError;

/// Wake and refresh intervals, in minutes.
///
/// The refresh intervals should be integer multiples of the wake interval;
/// when they are not, a refresh runs on the first wake after it falls due.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScheduleConfig {
    pub wake_interval_min: u32,
    pub weather_interval_min: u32,
    pub image_interval_min: u32,
}

impl ScheduleConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.wake_interval_min == 0 {
            return Err(ConfigError::ZeroInterval("WAKE_INTERVAL_MIN"));
        }
        if self.weather_interval_min == 0 {
            return Err(ConfigError::ZeroInterval("WEATHER_INTERVAL_MIN"));
        }
        if self.image_interval_min == 0 {
            return Err(ConfigError::ZeroInterval("IMG_INTERVAL_MIN"));
        }
        if self.weather_interval_min < self.wake_interval_min {
            return Err(ConfigError::FasterThanWake("WEATHER_INTERVAL_MIN"));
        }
        if self.image_interval_min < self.wake_interval_min {
            return Err(ConfigError::FasterThanWake("IMG_INTERVAL_MIN"));
        }
        if self.weather_interval_min % self.wake_interval_min != 0 {
            log::warn!(
                "WEATHER_INTERVAL_MIN is not a multiple of WAKE_INTERVAL_MIN, refreshes run late"
            );
        }
        if self.image_interval_min % self.wake_interval_min != 0 {
            log::warn!("IMG_INTERVAL_MIN is not a multiple of WAKE_INTERVAL_MIN, refreshes run late");
        }
        Ok(())
    }
}

/// Wake-cycle marks of the last successful fetches.
///
/// Persisted across deep sleep, see the `state` module. Both marks start at
/// zero on first boot and only move forward after a fetch succeeds.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LastRunState {
    pub last_weather_mark: u32,
    pub last_image_mark: u32,
}

/// What this wake cycle has to do.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DueActions {
    pub fetch_weather: bool,
    pub fetch_image: bool,
}

impl DueActions {
    pub fn any(&self) -> bool {
        self.fetch_weather || self.fetch_image
    }
}

/// Decide which fetches are due at the given wake cycle.
///
/// Deterministic and free of side effects. A fetch is due once the minutes
/// elapsed since its mark reach its interval. The caller moves the mark to
/// `elapsed_wake_cycles` after a successful fetch and leaves it untouched on
/// failure, so a failed fetch stays due on the next wake.
///
/// Saturating arithmetic keeps a corrupt mark beyond the wake counter from
/// wrapping into "massively overdue".
pub fn decide_actions(
    config: &ScheduleConfig,
    state: &LastRunState,
    elapsed_wake_cycles: u32,
) -> DueActions {
    let minutes_since = |mark: u32| {
        elapsed_wake_cycles
            .saturating_sub(mark)
            .saturating_mul(config.wake_interval_min)
    };
    DueActions {
        fetch_weather: minutes_since(state.last_weather_mark) >= config.weather_interval_min,
        fetch_image: minutes_since(state.last_image_mark) >= config.image_interval_min,
    }
}
