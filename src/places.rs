use serde::Deserialize;
use serde_json::json;
use tracing::info;

use crate::error::{FetchError, PlacesError};
use crate::http::Fetcher;

pub const GEOLOCATE_URL: &str = "https://www.googleapis.com/geolocation/v1/geolocate";
pub const NEARBY_URL: &str = "https://maps.googleapis.com/maps/api/place/nearbysearch/json";

/// 5 miles.
pub const DEFAULT_RADIUS_M: u32 = 8047;

#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
pub struct Location {
    pub lat: f64,
    pub lng: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Restaurant {
    pub name: String,
    pub vicinity: Option<String>,
    pub rating: Option<f64>,
    pub ratings_total: Option<u32>,
    pub open_now: Option<bool>,
}

#[derive(Deserialize)]
struct GeolocateResponse {
    location: Option<Location>,
}

#[derive(Deserialize)]
struct NearbyResponse {
    status: String,
    error_message: Option<String>,
    #[serde(default)]
    results: Vec<Place>,
}

#[derive(Deserialize)]
struct Place {
    name: Option<String>,
    vicinity: Option<String>,
    rating: Option<f64>,
    user_ratings_total: Option<u32>,
    opening_hours: Option<OpeningHours>,
}

#[derive(Deserialize)]
struct OpeningHours {
    open_now: Option<bool>,
}

pub struct PlacesClient<F> {
    fetcher: F,
    api_key: String,
}

impl<F: Fetcher> PlacesClient<F> {
    pub fn new(fetcher: F, api_key: impl Into<String>) -> Self {
        PlacesClient {
            fetcher,
            api_key: api_key.into(),
        }
    }

    /// Approximate caller position from its IP address.
    pub fn current_location(&self) -> Result<Location, PlacesError> {
        let body = self.fetcher.post_json(
            GEOLOCATE_URL,
            &[("key", self.api_key.as_str())],
            &json!({ "considerIp": true }),
        )?;
        let resp: GeolocateResponse = decode(GEOLOCATE_URL, &body)?;
        let location = resp.location.ok_or(PlacesError::NoLocation)?;
        info!(lat = location.lat, lng = location.lng, "Geolocated");
        Ok(location)
    }

    pub fn nearby_restaurants(
        &self,
        location: Location,
        radius_m: u32,
    ) -> Result<Vec<Restaurant>, PlacesError> {
        let loc = format!("{},{}", location.lat, location.lng);
        let radius = radius_m.to_string();
        let body = self.fetcher.get(
            NEARBY_URL,
            &[
                ("location", loc.as_str()),
                ("radius", radius.as_str()),
                ("type", "restaurant"),
                ("key", self.api_key.as_str()),
            ],
        )?;
        parse_nearby(&body)
    }
}

fn decode<T: for<'de> Deserialize<'de>>(url: &str, body: &str) -> Result<T, FetchError> {
    serde_json::from_str(body)
        .map_err(|e| FetchError::unavailable(url, format!("malformed JSON: {}", e)))
}

fn parse_nearby(body: &str) -> Result<Vec<Restaurant>, PlacesError> {
    let resp: NearbyResponse = decode(NEARBY_URL, body)?;
    match resp.status.as_str() {
        "OK" | "ZERO_RESULTS" => {}
        _ => {
            return Err(PlacesError::Api {
                status: resp.status,
                message: resp.error_message.unwrap_or_default(),
            })
        }
    }
    Ok(resp
        .results
        .into_iter()
        .filter_map(|p| {
            Some(Restaurant {
                name: p.name?,
                vicinity: p.vicinity,
                rating: p.rating,
                ratings_total: p.user_ratings_total,
                open_now: p.opening_hours.and_then(|h| h.open_now),
            })
        })
        .collect())
}
