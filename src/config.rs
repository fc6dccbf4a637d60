//! Build-time configuration.
//!
//! Secrets come from the build environment, e.g.
//! `WIFI_SSID=home WIFI_PASS=... OWM_API_KEY=... cargo build --release`.
//! Everything is assembled into one immutable [`Config`] at startup and
//! passed down explicitly; nothing below reads these constants directly.

use crate::scheduler::ScheduleConfig;
use crate::time::TzRule;

// WiFi credentials
pub const WIFI_SSID: &str = match option_env!("WIFI_SSID") {
    Some(ssid) => ssid,
    None => "",
};
pub const WIFI_PASS: &str = match option_env!("WIFI_PASS") {
    Some(pass) => pass,
    None => "",
};

// OpenWeatherMap
pub const OWM_API_KEY: &str = match option_env!("OWM_API_KEY") {
    Some(key) => key,
    None => "",
};
pub const LAT: &str = "45.0703";
pub const LON: &str = "7.6869";
pub const OWM_LANG: &str = "it";
pub const OWM_UNITS: &str = "metric"; // metric / imperial / standard

// Image endpoint (uncompressed BMP)
pub const IMG_URL: &str = "http://www.example.com/frame.bmp";

// Timezone rule with DST (Europe/Rome)
pub const TZ_INFO: &str = "CET-1CEST,M3.5.0/2,M10.5.0/3";

// Intervals (minutes)
pub const WAKE_INTERVAL_MIN: u32 = 1;
pub const WEATHER_INTERVAL_MIN: u32 = 20;
pub const IMG_INTERVAL_MIN: u32 = 12;

/// Immutable runtime configuration.
#[derive(Debug, Clone, Copy)]
pub struct Config {
    pub wifi_ssid: &'static str,
    pub wifi_pass: &'static str,
    pub owm_api_key: &'static str,
    pub latitude: &'static str,
    pub longitude: &'static str,
    pub owm_lang: &'static str,
    pub owm_units: &'static str,
    pub img_url: &'static str,
    pub tz_info: &'static str,
    pub schedule: ScheduleConfig,
}

impl Config {
    pub const fn from_build() -> Self {
        Self {
            wifi_ssid: WIFI_SSID,
            wifi_pass: WIFI_PASS,
            owm_api_key: OWM_API_KEY,
            latitude: LAT,
            longitude: LON,
            owm_lang: OWM_LANG,
            owm_units: OWM_UNITS,
            img_url: IMG_URL,
            tz_info: TZ_INFO,
            schedule: ScheduleConfig {
                wake_interval_min: WAKE_INTERVAL_MIN,
                weather_interval_min: WEATHER_INTERVAL_MIN,
                image_interval_min: IMG_INTERVAL_MIN,
            },
        }
    }

    /// Startup validation. An error here is a build problem, not a transient
    /// condition, so callers surface it and stop instead of retrying.
    ///
    /// Returns the parsed timezone rule so it is only parsed once.
    pub fn validate(&self) -> Result<TzRule, ConfigError> {
        self.schedule.validate()?;
        if self.wifi_ssid.is_empty() {
            return Err(ConfigError::MissingOption("WIFI_SSID"));
        }
        if self.owm_api_key.is_empty() {
            return Err(ConfigError::MissingOption("OWM_API_KEY"));
        }
        if !matches!(self.owm_units, "metric" | "imperial" | "standard") {
            return Err(ConfigError::BadUnits);
        }
        if crate::http::split_url(self.img_url).is_err() {
            return Err(ConfigError::BadImageUrl);
        }
        TzRule::parse(self.tz_info).ok_or(ConfigError::BadTimezone)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum ConfigError {
    #[error("{0} must be set at build time")]
    MissingOption(&'static str),
    #[error("{0} must be greater than zero")]
    ZeroInterval(&'static str),
    #[error("{0} must not be shorter than WAKE_INTERVAL_MIN")]
    FasterThanWake(&'static str),
    #[error("OWM_UNITS must be metric, imperial or standard")]
    BadUnits,
    #[error("IMG_URL must be a plain http:// URL")]
    BadImageUrl,
    #[error("TZ_INFO is not a supported POSIX timezone rule")]
    BadTimezone,
}
