use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::FetchError;
use crate::http::Fetcher;

pub const USDA_SEARCH_URL: &str = "https://api.nal.usda.gov/fdc/v1/foods/search";

/// Version written into every stored blob.
pub const BLOB_VERSION: u32 = 1;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Nutrient {
    pub name: String,
    pub value: f64,
    pub unit: String,
}

/// First food record returned for an ingredient name.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FoodRecord {
    pub fdc_id: Option<i64>,
    pub description: Option<String>,
    pub nutrients: Vec<Nutrient>,
}

/// Result of one lookup as persisted. `food: None` is the "no data" marker.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NutritionData {
    pub version: u32,
    pub food: Option<FoodRecord>,
}

impl NutritionData {
    pub fn none() -> Self {
        NutritionData {
            version: BLOB_VERSION,
            food: None,
        }
    }

    pub fn found(food: FoodRecord) -> Self {
        NutritionData {
            version: BLOB_VERSION,
            food: Some(food),
        }
    }

    pub fn to_blob(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    pub fn from_blob(blob: &str) -> Result<Self, serde_json::Error> {
        let data: NutritionData = serde_json::from_str(blob)?;
        if data.version != BLOB_VERSION {
            return Err(serde::de::Error::custom(format!(
                "unsupported nutrition blob version {}",
                data.version
            )));
        }
        Ok(data)
    }
}

/// Nutrients whose integer part is positive. Fractions below 1 are dropped too.
pub fn significant_nutrients(food: &FoodRecord) -> Vec<&Nutrient> {
    food.nutrients
        .iter()
        .filter(|n| n.value.trunc() > 0.0)
        .collect()
}

pub trait NutritionLookup {
    fn lookup(&mut self, ingredient: &str) -> Result<NutritionData, FetchError>;
}

// ── USDA FoodData Central ──

#[derive(Deserialize)]
struct SearchResponse {
    #[serde(default)]
    foods: Vec<UsdaFood>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct UsdaFood {
    fdc_id: Option<i64>,
    description: Option<String>,
    #[serde(default)]
    food_nutrients: Vec<UsdaNutrient>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct UsdaNutrient {
    nutrient_name: Option<String>,
    value: Option<f64>,
    unit_name: Option<String>,
}

impl From<UsdaFood> for FoodRecord {
    fn from(food: UsdaFood) -> Self {
        let nutrients = food
            .food_nutrients
            .into_iter()
            .filter_map(|n| {
                Some(Nutrient {
                    name: n.nutrient_name?,
                    value: n.value.unwrap_or(0.0),
                    unit: n.unit_name.unwrap_or_default(),
                })
            })
            .collect();
        FoodRecord {
            fdc_id: food.fdc_id,
            description: food.description,
            nutrients,
        }
    }
}

/// Parse a foods/search body; zero foods is "no data".
pub fn parse_search_response(url: &str, body: &str) -> Result<NutritionData, FetchError> {
    let resp: SearchResponse = serde_json::from_str(body)
        .map_err(|e| FetchError::unavailable(url, format!("malformed JSON: {}", e)))?;
    Ok(match resp.foods.into_iter().next() {
        Some(food) => NutritionData::found(food.into()),
        None => NutritionData::none(),
    })
}

pub struct UsdaClient<F> {
    fetcher: F,
    api_key: String,
}

impl<F: Fetcher> UsdaClient<F> {
    pub fn new(fetcher: F, api_key: impl Into<String>) -> Self {
        UsdaClient {
            fetcher,
            api_key: api_key.into(),
        }
    }
}

impl<F: Fetcher> NutritionLookup for UsdaClient<F> {
    fn lookup(&mut self, ingredient: &str) -> Result<NutritionData, FetchError> {
        let body = self.fetcher.get(
            USDA_SEARCH_URL,
            &[
                ("query", ingredient),
                ("api_key", self.api_key.as_str()),
                ("pageSize", "1"),
            ],
        )?;
        let data = parse_search_response(USDA_SEARCH_URL, &body)?;
        debug!(ingredient, found = data.food.is_some(), "USDA lookup");
        Ok(data)
    }
}

/// Process-lifetime memo keyed by trimmed, lower-cased name. Errors are not cached.
pub struct CachedLookup<L> {
    inner: L,
    cache: HashMap<String, NutritionData>,
}

impl<L: NutritionLookup> CachedLookup<L> {
    pub fn new(inner: L) -> Self {
        CachedLookup {
            inner,
            cache: HashMap::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.cache.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cache.is_empty()
    }
}

fn normalize(ingredient: &str) -> String {
    ingredient.trim().to_lowercase()
}

impl<L: NutritionLookup> NutritionLookup for CachedLookup<L> {
    fn lookup(&mut self, ingredient: &str) -> Result<NutritionData, FetchError> {
        let key = normalize(ingredient);
        if let Some(hit) = self.cache.get(&key) {
            return Ok(hit.clone());
        }
        let data = self.inner.lookup(ingredient)?;
        self.cache.insert(key, data.clone());
        Ok(data)
    }
}
