//! Geocoding and daily forecasts from Open-Meteo.
//!
//! Neither endpoint needs an API key. Dates outside the forecast window get a
//! fallback record marked unsuitable for outdoor filming.

use chrono::NaiveDate;
use once_cell::sync::Lazy;
use reqwest::Client;
use serde::Deserialize;
use std::collections::HashMap;
use std::error::Error;
use tracing::{info, instrument, warn};

use crate::models::DayWeather;

pub const GEOCODING_URL: &str = "https://geocoding-api.open-meteo.com/v1/search";
pub const FORECAST_URL: &str = "https://api.open-meteo.com/v1/forecast";

/// WMO weather interpretation codes.
static WMO_CODES: Lazy<HashMap<u32, &'static str>> = Lazy::new(|| {
    HashMap::from([
        (0, "clear sky"),
        (1, "mainly clear"),
        (2, "partly cloudy"),
        (3, "overcast"),
        (45, "fog"),
        (48, "rime fog"),
        (51, "light drizzle"),
        (53, "moderate drizzle"),
        (55, "dense drizzle"),
        (56, "light freezing drizzle"),
        (57, "dense freezing drizzle"),
        (61, "slight rain"),
        (63, "moderate rain"),
        (65, "heavy rain"),
        (66, "light freezing rain"),
        (67, "heavy freezing rain"),
        (71, "slight snow"),
        (73, "moderate snow"),
        (75, "heavy snow"),
        (77, "snow grains"),
        (80, "slight rain showers"),
        (81, "moderate rain showers"),
        (82, "violent rain showers"),
        (85, "slight snow showers"),
        (86, "heavy snow showers"),
        (95, "thunderstorm"),
        (96, "thunderstorm with slight hail"),
        (99, "thunderstorm with heavy hail"),
    ])
});

pub fn decode_wmo(code: u32) -> String {
    WMO_CODES
        .get(&code)
        .map_or_else(|| format!("unknown (WMO {code})"), |d| (*d).to_string())
}

#[derive(Debug, Deserialize)]
struct GeocodingResponse {
    #[serde(default)]
    results: Vec<GeocodingResult>,
}

#[derive(Debug, Deserialize)]
struct GeocodingResult {
    latitude: f64,
    longitude: f64,
}

#[derive(Debug, Deserialize)]
struct ForecastResponse {
    daily: Daily,
}

#[derive(Debug, Deserialize)]
struct Daily {
    time: Vec<String>,
    weathercode: Vec<Option<f64>>,
    temperature_2m_max: Vec<Option<f64>>,
    precipitation_sum: Vec<Option<f64>>,
}

/// Open-Meteo endpoints plus the rain threshold for outdoor filming.
#[derive(Debug, Clone)]
pub struct WeatherClient {
    http: Client,
    geocoding_url: String,
    forecast_url: String,
    rain_threshold_mm: f64,
}

impl WeatherClient {
    pub fn new(http: Client, rain_threshold_mm: f64) -> Self {
        Self {
            http,
            geocoding_url: GEOCODING_URL.to_string(),
            forecast_url: FORECAST_URL.to_string(),
            rain_threshold_mm,
        }
    }

    #[cfg(test)]
    pub fn with_urls(mut self, geocoding_url: &str, forecast_url: &str) -> Self {
        self.geocoding_url = geocoding_url.to_string();
        self.forecast_url = forecast_url.to_string();
        self
    }

    /// Resolve a place name to `(latitude, longitude)`.
    #[instrument(level = "info", skip(self))]
    pub async fn geocode_location(&self, location: &str) -> Result<(f64, f64), Box<dyn Error>> {
        let resp: GeocodingResponse = self
            .http
            .get(&self.geocoding_url)
            .query(&[("name", location), ("count", "1"), ("language", "en")])
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;

        let first = resp
            .results
            .first()
            .ok_or_else(|| format!("Geocoding found no results for '{location}'"))?;
        Ok((first.latitude, first.longitude))
    }

    /// One weather record per filming date, in the order given.
    #[instrument(level = "info", skip(self, dates))]
    pub async fn get_weekly_weather(
        &self,
        latitude: f64,
        longitude: f64,
        dates: &[NaiveDate],
    ) -> Result<Vec<DayWeather>, Box<dyn Error>> {
        let resp: ForecastResponse = self
            .http
            .get(&self.forecast_url)
            .query(&[
                ("latitude", latitude.to_string()),
                ("longitude", longitude.to_string()),
                (
                    "daily",
                    "precipitation_sum,weathercode,temperature_2m_max".to_string(),
                ),
                ("timezone", "auto".to_string()),
                ("forecast_days", "7".to_string()),
            ])
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;

        Ok(self.days_from_forecast(&resp.daily, dates))
    }

    fn days_from_forecast(&self, daily: &Daily, dates: &[NaiveDate]) -> Vec<DayWeather> {
        dates
            .iter()
            .map(|date| {
                let key = date.format("%Y-%m-%d").to_string();
                match daily.time.iter().position(|t| *t == key) {
                    Some(idx) => self.parse_day(key, daily, idx),
                    None => {
                        warn!(date = %key, "Date is outside the forecast window; using fallback weather");
                        fallback_weather(key)
                    }
                }
            })
            .collect()
    }

    fn parse_day(&self, date: String, daily: &Daily, idx: usize) -> DayWeather {
        let code = daily.weathercode.get(idx).copied().flatten().unwrap_or(0.0);
        let temp = daily.temperature_2m_max.get(idx).copied().flatten();
        let rain = daily
            .precipitation_sum
            .get(idx)
            .copied()
            .flatten()
            .unwrap_or(0.0);

        DayWeather {
            date,
            condition: decode_wmo(code as u32),
            temp_c: temp.map(round1),
            rain_mm: Some(round1(rain)),
            outdoor_ok: rain <= self.rain_threshold_mm,
        }
    }
}

fn round1(v: f64) -> f64 {
    (v * 10.0).round() / 10.0
}

pub fn fallback_weather(date: String) -> DayWeather {
    DayWeather {
        date,
        condition: "unknown".to_string(),
        temp_c: None,
        rain_mm: None,
        outdoor_ok: false,
    }
}

/// Pick the best single filming day.
///
/// Outdoor-suitable days win; among them the least rain, then the warmest.
/// When no day is suitable the least rainy one is chosen.
pub fn select_best_filming_day(days: &[DayWeather]) -> Option<&DayWeather> {
    let outdoor: Vec<&DayWeather> = days.iter().filter(|d| d.outdoor_ok).collect();
    let pool: Vec<&DayWeather> = if outdoor.is_empty() {
        days.iter().collect()
    } else {
        outdoor
    };

    let best = pool.into_iter().min_by(|a, b| {
        let rain = |d: &DayWeather| d.rain_mm.unwrap_or(999.0);
        let temp = |d: &DayWeather| d.temp_c.unwrap_or(0.0);
        rain(*a)
            .total_cmp(&rain(*b))
            .then_with(|| temp(*b).total_cmp(&temp(*a)))
    });
    if let Some(day) = best {
        info!(date = %day.date, condition = %day.condition, outdoor = day.outdoor_ok, "Selected filming day");
    }
    best
}
