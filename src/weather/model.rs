use heapless::String;
use heapless::Vec;
use serde::Deserialize;
use serde_json_core::{self as json_core};

// Heapless sizing limits
const MAX_CONDITIONS: usize = 4;

// Heuristic string capacities
const BUF_LEN: usize = 32;
const DESC_LEN: usize = 64;

/// OpenWeatherMap current-weather document.
///
/// Fields mirror the full `/data/2.5/weather` response; the ones the service
/// omits depending on station and weather are `Option`s.
#[derive(Deserialize, Debug)]
pub struct OwmResponse {
    pub coord: Coord,
    pub weather: Vec<Condition, MAX_CONDITIONS>,
    pub base: String<BUF_LEN>,
    pub main: MainReadings,
    pub visibility: Option<u32>,
    pub wind: Wind,
    pub rain: Option<Precipitation>,
    pub snow: Option<Precipitation>,
    pub clouds: Option<Clouds>,
    pub dt: u32,
    pub sys: Sys,
    pub timezone: i32,
    pub id: u64,
    pub name: String<BUF_LEN>,
    pub cod: u16,
}

#[derive(Deserialize, Debug)]
pub struct Coord {
    pub lon: f32,
    pub lat: f32,
}

/// One weather condition entry. The first one is primary.
#[derive(Deserialize, Debug)]
pub struct Condition {
    pub id: u32,
    pub main: String<BUF_LEN>,
    pub description: String<DESC_LEN>,
    pub icon: String<8>,
}

#[derive(Deserialize, Debug)]
pub struct MainReadings {
    pub temp: f32,
    pub feels_like: f32,
    pub temp_min: f32,
    pub temp_max: f32,
    pub pressure: u32,
    pub humidity: u32,
    pub sea_level: Option<u32>,
    pub grnd_level: Option<u32>,
}

#[derive(Deserialize, Debug)]
pub struct Wind {
    pub speed: f32,
    pub deg: Option<u32>,
    pub gust: Option<f32>,
}

/// Rain or snow volume; the keys are literally "1h" and "3h".
#[derive(Deserialize, Debug)]
pub struct Precipitation {
    #[serde(rename = "1h")]
    pub one_hour: Option<f32>,
    #[serde(rename = "3h")]
    pub three_hours: Option<f32>,
}

#[derive(Deserialize, Debug)]
pub struct Clouds {
    pub all: u32,
}

#[derive(Deserialize, Debug)]
pub struct Sys {
    #[serde(rename = "type")]
    pub kind: Option<u32>,
    pub id: Option<u64>,
    pub country: Option<String<4>>,
    pub sunrise: u32,
    pub sunset: u32,
}

/// Parse the weather JSON response into an `OwmResponse`, usable in generic
/// contexts where a TryFrom impl is expected.
impl core::convert::TryFrom<&[u8]> for OwmResponse {
    type Error = json_core::de::Error;

    fn try_from(value: &[u8]) -> Result<Self, Self::Error> {
        // serde_json_core::from_slice returns (T, consumed)
        let (parsed, _consumed) = json_core::from_slice::<OwmResponse>(value)?;
        Ok(parsed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &[u8] = br#"{
        "coord":{"lon":7.6869,"lat":45.0703},
        "weather":[{"id":501,"main":"Rain","description":"pioggia moderata","icon":"10d"}],
        "base":"stations",
        "main":{"temp":14.2,"feels_like":13.6,"temp_min":12.1,"temp_max":16.8,"pressure":1021,"humidity":60,"sea_level":1021,"grnd_level":910},
        "visibility":10000,
        "wind":{"speed":4.09,"deg":121,"gust":6.2},
        "rain":{"1h":2.73},
        "clouds":{"all":83},
        "dt":1726660758,
        "sys":{"type":1,"id":6736,"country":"IT","sunrise":1726636384,"sunset":1726680975},
        "timezone":7200,
        "id":3165524,
        "name":"Torino",
        "cod":200
    }"#;

    #[test]
    fn parses_full_document() {
        let doc = OwmResponse::try_from(SAMPLE).unwrap();
        assert_eq!(doc.name.as_str(), "Torino");
        assert_eq!(doc.weather.len(), 1);
        assert_eq!(doc.weather[0].id, 501);
        assert_eq!(doc.weather[0].description.as_str(), "pioggia moderata");
        assert_eq!(doc.main.humidity, 60);
        assert_eq!(doc.wind.deg, Some(121));
        assert_eq!(doc.sys.sunrise, 1726636384);
        assert_eq!(doc.rain.as_ref().and_then(|r| r.one_hour), Some(2.73));
        assert_eq!(doc.cod, 200);
    }

    #[test]
    fn optional_sections_may_be_absent() {
        const MINIMAL: &[u8] = br#"{
            "coord":{"lon":0.0,"lat":0.0},
            "weather":[{"id":800,"main":"Clear","description":"clear sky","icon":"01d"}],
            "base":"stations",
            "main":{"temp":21.0,"feels_like":20.4,"temp_min":19.0,"temp_max":23.0,"pressure":1013,"humidity":40},
            "wind":{"speed":1.5},
            "dt":1726660758,
            "sys":{"sunrise":1726636384,"sunset":1726680975},
            "timezone":0,
            "id":0,
            "name":"Null Island",
            "cod":200
        }"#;
        let doc = OwmResponse::try_from(MINIMAL).unwrap();
        assert_eq!(doc.wind.deg, None);
        assert!(doc.rain.is_none());
        assert!(doc.clouds.is_none());
        assert!(doc.sys.country.is_none());
    }

    #[test]
    fn rejects_truncated_document() {
        assert!(OwmResponse::try_from(&SAMPLE[..SAMPLE.len() / 2]).is_err());
    }
}
