//! Current-weather retrieval from OpenWeatherMap.

use crate::{config::Config, error::AppError, http};

use self::model::OwmResponse;

pub mod api;
pub mod model;

/// Fetch and parse the current weather for the configured location.
pub async fn fetch_current_weather(
    stack: embassy_net::Stack<'static>,
    config: &Config,
) -> Result<OwmResponse, AppError> {
    let buf = api::fetch_weather_data(stack, config).await?;
    let body = http::checked_body(&buf)?;

    let parsed = OwmResponse::try_from(body).map_err(|e| {
        log::error!("Failed to parse weather JSON: {:?}", e);
        AppError::JsonParse
    })?;

    match parsed.weather.first() {
        Some(condition) => log::info!(
            "Weather for {}: {} ({} {})",
            parsed.name,
            condition.description,
            parsed.main.temp,
            unit_labels(config.owm_units).0,
        ),
        None => log::warn!("Weather document for {} has no condition entry", parsed.name),
    }

    Ok(parsed)
}

/// Temperature and wind speed labels for the configured `OWM_UNITS` value.
pub fn unit_labels(units: &str) -> (&'static str, &'static str) {
    match units {
        "imperial" => ("F", "mph"),
        "standard" => ("K", "m/s"),
        _ => ("C", "m/s"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unit_labels_cover_all_owm_modes() {
        assert_eq!(unit_labels("metric"), ("C", "m/s"));
        assert_eq!(unit_labels("imperial"), ("F", "mph"));
        assert_eq!(unit_labels("standard"), ("K", "m/s"));
        // validation guarantees one of the three, default stays sane anyway
        assert_eq!(unit_labels(""), ("C", "m/s"));
    }
}
