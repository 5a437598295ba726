use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::json;
use thiserror::Error;
use tracing::{debug, warn};

use crate::error::ApiError;
use crate::nutrition::normalize::RawFoodItem;

/// Outcomes of the external lookup the engine needs to distinguish.
#[derive(Debug, Error)]
pub enum SearchError {
    #[error("no food matched the query")]
    NotFound,
    #[error("lookup timed out")]
    Timeout,
    #[error("lookup failed: {0}")]
    Transient(String),
}

impl From<SearchError> for ApiError {
    fn from(err: SearchError) -> Self {
        match err {
            SearchError::NotFound => ApiError::NotFound("food item"),
            SearchError::Timeout => ApiError::LookupTimeout,
            SearchError::Transient(msg) => ApiError::Transient(msg),
        }
    }
}

/// Free-text food resolution. The engine only ever sees this trait; the
/// HTTP client below is the production implementation.
#[async_trait]
pub trait NutritionSearch: Send + Sync {
    async fn natural_search(&self, query: &str) -> Result<RawFoodItem, SearchError>;
}

#[derive(Debug, Clone, Deserialize)]
pub struct NutritionixConfig {
    pub base_url: String,
    pub app_id: String,
    pub app_key: String,
    pub timeout_secs: u64,
}

impl Default for NutritionixConfig {
    fn default() -> Self {
        Self {
            base_url: "https://trackapi.nutritionix.com/v2".to_string(),
            app_id: String::new(),
            app_key: String::new(),
            timeout_secs: 10,
        }
    }
}

#[derive(Debug, Deserialize)]
struct NaturalNutrientsResponse {
    foods: Vec<RawFoodItem>,
}

/// Client for the Nutritionix natural-language nutrients endpoint.
///
/// No retries here: the API is billed per call, so retry policy stays with
/// the caller.
pub struct NutritionixClient {
    config: NutritionixConfig,
    http: reqwest::Client,
}

impl NutritionixClient {
    pub fn new(config: NutritionixConfig) -> anyhow::Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;
        Ok(Self { config, http })
    }
}

#[async_trait]
impl NutritionSearch for NutritionixClient {
    async fn natural_search(&self, query: &str) -> Result<RawFoodItem, SearchError> {
        let url = format!("{}/natural/nutrients", self.config.base_url);
        let response = self
            .http
            .post(&url)
            .header("x-app-id", &self.config.app_id)
            .header("x-app-key", &self.config.app_key)
            .json(&json!({ "query": query }))
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    SearchError::Timeout
                } else {
                    SearchError::Transient(e.to_string())
                }
            })?;

        let status = response.status();
        if status == reqwest::StatusCode::NOT_FOUND {
            debug!(query, "lookup returned no match");
            return Err(SearchError::NotFound);
        }
        if !status.is_success() {
            warn!(query, %status, "lookup request failed");
            return Err(SearchError::Transient(format!("HTTP {status}")));
        }

        let parsed: NaturalNutrientsResponse = response
            .json()
            .await
            .map_err(|e| SearchError::Transient(format!("bad response body: {e}")))?;

        parsed.foods.into_iter().next().ok_or(SearchError::NotFound)
    }
}

/// In-memory stand-in used by tests and `AppState::fake`. Returns the
/// configured item, or NotFound when there is none.
pub struct StubSearch {
    item: Option<RawFoodItem>,
}

impl StubSearch {
    pub fn with_item(item: RawFoodItem) -> Self {
        Self { item: Some(item) }
    }

    pub fn not_found() -> Self {
        Self { item: None }
    }
}

#[async_trait]
impl NutritionSearch for StubSearch {
    async fn natural_search(&self, _query: &str) -> Result<RawFoodItem, SearchError> {
        self.item.clone().ok_or(SearchError::NotFound)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn stub_returns_configured_item() {
        let item: RawFoodItem = serde_json::from_value(json!({
            "food_name": "egg",
            "serving_qty": 2,
            "nf_calories": 140,
            "nf_total_fat": 10,
            "nf_protein": 12,
            "nf_total_carbohydrate": 1
        }))
        .expect("raw item");
        let stub = StubSearch::with_item(item);
        let found = stub.natural_search("2 eggs").await.expect("search");
        assert_eq!(found.food_name.as_deref(), Some("egg"));
    }

    #[tokio::test]
    async fn stub_not_found_maps_to_not_found_error() {
        let stub = StubSearch::not_found();
        let err = stub.natural_search("gibberish").await.unwrap_err();
        assert!(matches!(err, SearchError::NotFound));
        let api: ApiError = err.into();
        assert_eq!(api.kind(), "not_found");
    }

    #[test]
    fn timeout_maps_to_lookup_timeout() {
        let api: ApiError = SearchError::Timeout.into();
        assert_eq!(api.kind(), "lookup_timeout");
    }
}
