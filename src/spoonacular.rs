use async_trait::async_trait;
use reqwest::{Client, StatusCode, Url};
use std::fmt;
use thiserror::Error;
use tracing::debug;

use crate::config::Config;
use crate::model::{AutocompleteHit, RecipeRecord, RecipeResponse};

pub const SPOONACULAR_API_BASE: &str = "https://api.spoonacular.com/";

/// Result count the autocomplete endpoint is always asked for.
const AUTOCOMPLETE_LIMIT: u32 = 8;

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("invalid url: {0}")]
    InvalidUrl(String),
    #[error("failed to reach recipe API: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("recipe API returned {status}: {body}")]
    Server { status: StatusCode, body: String },
    #[error("invalid recipe API response: {0}")]
    Decode(#[from] serde_json::Error),
}

/// Remote source of recipe batches.
#[async_trait]
pub trait RecipeSource: Send + Sync {
    /// Fetch up to `limit` recipes, narrowed by `query` when given.
    async fn fetch_recipes(
        &self,
        limit: u32,
        query: Option<&str>,
    ) -> Result<Vec<RecipeRecord>, ApiError>;
}

#[derive(Clone)]
pub struct SpoonacularClient {
    http: Client,
    base_url: Url,
    api_key: String,
}

impl fmt::Debug for SpoonacularClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SpoonacularClient")
            .field("base_url", &self.base_url)
            .finish_non_exhaustive()
    }
}

impl SpoonacularClient {
    pub fn new(api_key: String) -> Result<Self, ApiError> {
        let base_url = Url::parse(SPOONACULAR_API_BASE)
            .map_err(|e| ApiError::InvalidUrl(e.to_string()))?;
        Self::with_base_url(api_key, base_url)
    }

    /// `base_url` is treated as a directory; a missing trailing `/` is added
    /// so endpoint paths are resolved under it.
    pub fn with_base_url(api_key: String, mut base_url: Url) -> Result<Self, ApiError> {
        if !base_url.path().ends_with('/') {
            let path = format!("{}/", base_url.path());
            base_url.set_path(&path);
        }
        let http = Client::builder().user_agent("recipe-sync/0.1").build()?;
        Ok(Self {
            http,
            base_url,
            api_key,
        })
    }

    pub fn from_config(cfg: &Config) -> Result<Self, ApiError> {
        let base_url = Url::parse(&cfg.spoonacular.base_url)
            .map_err(|e| ApiError::InvalidUrl(e.to_string()))?;
        Self::with_base_url(cfg.spoonacular.api_key.clone(), base_url)
    }

    fn endpoint(&self, path: &str) -> Result<Url, ApiError> {
        self.base_url
            .join(path)
            .map_err(|e| ApiError::InvalidUrl(e.to_string()))
    }

    pub fn build_random_request(
        &self,
        limit: u32,
        query: Option<&str>,
    ) -> Result<reqwest::Request, ApiError> {
        let mut params = vec![
            ("apiKey", self.api_key.clone()),
            ("number", limit.to_string()),
        ];
        if let Some(q) = query.filter(|q| !q.trim().is_empty()) {
            params.push(("query", q.to_string()));
        }
        let request = self
            .http
            .get(self.endpoint("recipes/random")?)
            .query(&params)
            .build()?;
        Ok(request)
    }

    pub fn build_autocomplete_request(&self, query: &str) -> Result<reqwest::Request, ApiError> {
        let request = self
            .http
            .get(self.endpoint("recipes/autocomplete")?)
            .query(&[
                ("apiKey", self.api_key.clone()),
                ("number", AUTOCOMPLETE_LIMIT.to_string()),
                ("query", query.to_string()),
            ])
            .build()?;
        Ok(request)
    }

    async fn execute(&self, request: reqwest::Request) -> Result<String, ApiError> {
        debug!(path = %request.url().path(), "sending recipe API request");
        let res = self.http.execute(request).await?;
        let status = res.status();
        if !status.is_success() {
            let body = res.text().await.unwrap_or_default();
            return Err(ApiError::Server { status, body });
        }
        Ok(res.text().await?)
    }

    pub async fn random_recipes(
        &self,
        limit: u32,
        query: Option<&str>,
    ) -> Result<Vec<RecipeRecord>, ApiError> {
        let request = self.build_random_request(limit, query)?;
        let body = self.execute(request).await?;
        parse_recipe_response(&body)
    }

    pub async fn autocomplete(&self, query: &str) -> Result<Vec<AutocompleteHit>, ApiError> {
        let request = self.build_autocomplete_request(query)?;
        let body = self.execute(request).await?;
        Ok(serde_json::from_str(&body)?)
    }
}

#[async_trait]
impl RecipeSource for SpoonacularClient {
    async fn fetch_recipes(
        &self,
        limit: u32,
        query: Option<&str>,
    ) -> Result<Vec<RecipeRecord>, ApiError> {
        self.random_recipes(limit, query).await
    }
}

/// Decode a random-recipes body. A missing `recipes` field is an empty batch.
pub fn parse_recipe_response(body: &str) -> Result<Vec<RecipeRecord>, ApiError> {
    let resp: RecipeResponse = serde_json::from_str(body)?;
    Ok(resp.recipes.unwrap_or_default())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn client() -> SpoonacularClient {
        SpoonacularClient::new("secret".into()).unwrap()
    }

    fn query_pairs(request: &reqwest::Request) -> Vec<(String, String)> {
        request
            .url()
            .query_pairs()
            .map(|(k, v)| (k.into_owned(), v.into_owned()))
            .collect()
    }

    #[test]
    fn random_request_carries_key_and_number() {
        let request = client().build_random_request(5, None).unwrap();
        assert_eq!(request.method(), reqwest::Method::GET);
        assert_eq!(request.url().path(), "/recipes/random");
        assert_eq!(
            query_pairs(&request),
            vec![
                ("apiKey".to_string(), "secret".to_string()),
                ("number".to_string(), "5".to_string()),
            ]
        );
    }

    #[test]
    fn random_request_adds_query_when_present() {
        let request = client().build_random_request(8, Some("main course")).unwrap();
        let pairs = query_pairs(&request);
        assert!(pairs.contains(&("query".to_string(), "main course".to_string())));

        let request = client().build_random_request(8, Some("  ")).unwrap();
        assert!(query_pairs(&request).iter().all(|(k, _)| k != "query"));
    }

    #[test]
    fn autocomplete_request_asks_for_eight() {
        let request = client().build_autocomplete_request("pasta").unwrap();
        assert_eq!(request.url().path(), "/recipes/autocomplete");
        let pairs = query_pairs(&request);
        assert!(pairs.contains(&("number".to_string(), "8".to_string())));
        assert!(pairs.contains(&("query".to_string(), "pasta".to_string())));
    }

    #[test]
    fn base_url_with_path_prefix() {
        let base = Url::parse("http://localhost:8080/api/").unwrap();
        let client = SpoonacularClient::with_base_url("k".into(), base).unwrap();
        let request = client.build_random_request(1, None).unwrap();
        assert_eq!(request.url().path(), "/api/recipes/random");
    }

    #[test]
    fn base_url_without_trailing_slash_keeps_prefix() {
        let base = Url::parse("http://localhost:8080/api").unwrap();
        let client = SpoonacularClient::with_base_url("k".into(), base).unwrap();
        let request = client.build_random_request(1, None).unwrap();
        assert_eq!(request.url().path(), "/api/recipes/random");
        let request = client.build_autocomplete_request("pie").unwrap();
        assert_eq!(request.url().path(), "/api/recipes/autocomplete");
    }

    #[test]
    fn null_lists_do_not_fail_the_batch() {
        let body = r#"{"recipes":[{"title":"Soup","dishTypes":null,"analyzedInstructions":null,"extendedIngredients":null},{"title":"Cake"}]}"#;
        let recipes = parse_recipe_response(body).unwrap();
        assert_eq!(recipes.len(), 2);
        assert_eq!(recipes[0].title.as_deref(), Some("Soup"));
        assert!(recipes[0].instruction_steps().is_empty());
    }

    #[test]
    fn response_without_recipes_is_empty() {
        assert!(parse_recipe_response("{}").unwrap().is_empty());
        let recipes = parse_recipe_response(r#"{"recipes":[{"title":"Soup"}]}"#).unwrap();
        assert_eq!(recipes.len(), 1);
        assert!(matches!(
            parse_recipe_response("not json"),
            Err(ApiError::Decode(_))
        ));
    }
}
