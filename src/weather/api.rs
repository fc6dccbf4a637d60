use core::fmt::Write as _;

use heapless::String;

use crate::{
    config::Config,
    error::AppError,
    http::{http_get, url_encode_component},
};

use alloc::vec::Vec;

const HEADERS_STR: &str = "Accept: application/json";
pub const OWM_HOST: &str = "api.openweathermap.org";
const OWM_PORT: u16 = 80;

/// A current-weather document is well under a kilobyte; leave room for
/// headers and verbose descriptions.
const MAX_RESPONSE_BYTES: usize = 8 * 1024;

/// Build the OpenWeatherMap current-weather query for the configured
/// location, units and language.
///
/// Every component is percent-encoded according to RFC 3986 for characters
/// outside the unreserved set, so a free-form language tag or API key cannot
/// break the request line.
pub fn build_owm_query(config: &Config) -> Result<String<256>, AppError> {
    let lat: String<32> = url_encode_component(config.latitude)?;
    let lon: String<32> = url_encode_component(config.longitude)?;
    let units: String<16> = url_encode_component(config.owm_units)?;
    let lang: String<16> = url_encode_component(config.owm_lang)?;
    let key: String<64> = url_encode_component(config.owm_api_key)?;

    let mut query: String<256> = String::new();
    write!(
        query,
        "/data/2.5/weather?lat={}&lon={}&units={}&lang={}&appid={}",
        lat, lon, units, lang, key
    )
    .map_err(|_| AppError::HttpRequest)?;
    Ok(query)
}

/// Fetch the raw current-weather response for the configured location.
///
/// Returns the raw HTTP response bytes (headers + body).
pub async fn fetch_weather_data(
    stack: embassy_net::Stack<'static>,
    config: &Config,
) -> Result<Vec<u8>, AppError> {
    let query = build_owm_query(config)?;
    http_get(
        stack,
        OWM_HOST,
        OWM_PORT,
        &query,
        Some(HEADERS_STR),
        MAX_RESPONSE_BYTES,
    )
    .await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scheduler::ScheduleConfig;

    fn config() -> Config {
        Config {
            wifi_ssid: "net",
            wifi_pass: "pass",
            owm_api_key: "deadbeef01234567",
            latitude: "45.0703",
            longitude: "7.6869",
            owm_lang: "it",
            owm_units: "metric",
            img_url: "http://frames.example.com/today.bmp",
            tz_info: "CET-1CEST,M3.5.0/2,M10.5.0/3",
            schedule: ScheduleConfig {
                wake_interval_min: 1,
                weather_interval_min: 20,
                image_interval_min: 12,
            },
        }
    }

    #[test]
    fn builds_expected_query() {
        let query = build_owm_query(&config()).unwrap();
        assert_eq!(
            query.as_str(),
            "/data/2.5/weather?lat=45.0703&lon=7.6869&units=metric&lang=it&appid=deadbeef01234567"
        );
    }

    #[test]
    fn encodes_reserved_characters() {
        let mut config = config();
        config.owm_lang = "pt br";
        let query = build_owm_query(&config).unwrap();
        assert!(query.as_str().contains("lang=pt%20br"));
    }
}
