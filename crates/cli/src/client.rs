//! API client for communicating with the waste agent

use anyhow::{Context, Result};
use reqwest::{Client, Response, StatusCode};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use url::Url;
use waste_lib::HealthResponse;

/// Error body returned by the agent: `{kind, message}`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiErrorBody {
    pub kind: String,
    pub message: String,
}

/// API client for the waste agent
pub struct ApiClient {
    client: Client,
    base_url: Url,
}

impl ApiClient {
    /// Create a new API client
    pub fn new(base_url: &str) -> Result<Self> {
        let client = Client::builder()
            .timeout(std::time::Duration::from_secs(30))
            .build()
            .context("Failed to create HTTP client")?;

        // Without a trailing slash `join` would replace the last path segment
        let normalized = if base_url.ends_with('/') {
            base_url.to_string()
        } else {
            format!("{}/", base_url)
        };
        let base_url = Url::parse(&normalized).context("Invalid API URL")?;

        Ok(Self { client, base_url })
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    /// Make a GET request with query parameters; `None` values are left out
    pub async fn get<T: DeserializeOwned>(
        &self,
        path: &str,
        query: &[(&str, Option<&str>)],
    ) -> Result<T> {
        let url = self.base_url.join(path).context("Invalid path")?;
        let query: Vec<(&str, &str)> = query
            .iter()
            .filter_map(|(key, value)| value.map(|v| (*key, v)))
            .collect();

        let response = self
            .client
            .get(url)
            .query(&query)
            .send()
            .await
            .context("Failed to send request")?;

        Self::parse(response).await
    }

    /// Make a POST request with JSON body
    pub async fn post<T: DeserializeOwned, B: Serialize>(&self, path: &str, body: &B) -> Result<T> {
        let url = self.base_url.join(path).context("Invalid path")?;

        let response = self
            .client
            .post(url)
            .json(body)
            .send()
            .await
            .context("Failed to send request")?;

        Self::parse(response).await
    }

    /// Fetch `/healthz`; an unhealthy agent answers 503 with the same body
    pub async fn health(&self) -> Result<HealthResponse> {
        let url = self.base_url.join("healthz").context("Invalid path")?;

        let response = self
            .client
            .get(url)
            .send()
            .await
            .context("Failed to send request")?;

        if response.status() == StatusCode::SERVICE_UNAVAILABLE {
            return response.json().await.context("Failed to parse response");
        }

        Self::parse(response).await
    }

    async fn parse<T: DeserializeOwned>(response: Response) -> Result<T> {
        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            match serde_json::from_str::<ApiErrorBody>(&body) {
                Ok(error) => anyhow::bail!("API error ({}): {}: {}", status, error.kind, error.message),
                Err(_) => anyhow::bail!("API error ({}): {}", status, body),
            }
        }

        response.json().await.context("Failed to parse response")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mockito::Matcher;
    use waste_lib::WasteRecommendation;

    #[test]
    fn test_base_url_gets_trailing_slash() {
        let client = ApiClient::new("http://detector:8080/prefix").unwrap();
        assert_eq!(client.base_url().as_str(), "http://detector:8080/prefix/");
        assert_eq!(
            client.base_url().join("api/v1/recommendations").unwrap().as_str(),
            "http://detector:8080/prefix/api/v1/recommendations"
        );
    }

    #[test]
    fn test_invalid_base_url() {
        assert!(ApiClient::new("not a url").is_err());
    }

    #[tokio::test]
    async fn test_get_sends_only_present_query_params() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("GET", "/api/v1/recommendations")
            .match_query(Matcher::UrlEncoded("priority".into(), "high".into()))
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body("[]")
            .create_async()
            .await;

        let client = ApiClient::new(&server.url()).unwrap();
        let recs: Vec<WasteRecommendation> = client
            .get(
                "api/v1/recommendations",
                &[("priority", Some("high")), ("status", None)],
            )
            .await
            .unwrap();

        assert!(recs.is_empty());
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_error_body_is_surfaced() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/api/v1/predictions/latest")
            .with_status(404)
            .with_header("content-type", "application/json")
            .with_body(r#"{"kind": "not_found", "message": "no ensemble forecast has been generated yet"}"#)
            .create_async()
            .await;

        let client = ApiClient::new(&server.url()).unwrap();
        let err = client
            .get::<serde_json::Value>("api/v1/predictions/latest", &[])
            .await
            .unwrap_err();

        let message = err.to_string();
        assert!(message.contains("404"));
        assert!(message.contains("not_found"));
    }

    #[tokio::test]
    async fn test_health_accepts_unhealthy_body() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/healthz")
            .with_status(503)
            .with_header("content-type", "application/json")
            .with_body(r#"{"status": "unhealthy", "components": {}}"#)
            .create_async()
            .await;

        let client = ApiClient::new(&server.url()).unwrap();
        let health = client.health().await.unwrap();

        assert_eq!(health.status, waste_lib::ComponentStatus::Unhealthy);
    }
}
