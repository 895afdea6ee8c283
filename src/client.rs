//! Prediction service client.

use crate::config::ApiConfig;
use crate::error::{PredictionFormError, Result};
use crate::schema::ParamSchema;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::time::Duration;
use tracing::{debug, info};

/// Normalized request body for `POST /predict`
pub type PredictionInput = BTreeMap<String, String>;

/// Body of a `POST /predict` response
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PredictResponse {
    pub prediction: Vec<Value>,
}

impl PredictResponse {
    /// The displayed prediction is the first element of the array
    pub fn first(&self) -> Result<f64> {
        let first = self
            .prediction
            .first()
            .ok_or_else(|| PredictionFormError::Response {
                message: "prediction array is empty".to_string(),
            })?;
        first.as_f64().ok_or_else(|| PredictionFormError::Response {
            message: format!("prediction[0] is not a number: {first}"),
        })
    }
}

#[async_trait]
pub trait PredictionApi: Send + Sync {
    async fn fetch_params(&self) -> Result<ParamSchema>;
    async fn predict(&self, input: &PredictionInput) -> Result<f64>;
}

/// reqwest-backed client for the prediction service
#[derive(Debug, Clone)]
pub struct HttpPredictionClient {
    client: reqwest::Client,
    base_url: String,
}

impl HttpPredictionClient {
    pub fn new(config: &ApiConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_millis(config.timeout_ms))
            .build()
            .map_err(|e| PredictionFormError::Config {
                message: format!("Failed to build HTTP client: {e}"),
            })?;
        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path)
    }
}

async fn error_for_status(response: reqwest::Response) -> Result<reqwest::Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    Err(PredictionFormError::Http {
        status: status.as_u16(),
        body,
    })
}

#[async_trait]
impl PredictionApi for HttpPredictionClient {
    async fn fetch_params(&self) -> Result<ParamSchema> {
        let url = self.url("params");
        debug!("GET {}", url);
        let response = error_for_status(self.client.get(&url).send().await?).await?;
        let body: Value = response.json().await.map_err(|e| PredictionFormError::Response {
            message: format!("params body is not JSON: {e}"),
        })?;
        let schema = ParamSchema::from_json(body)?;
        info!("Fetched parameter schema with {} fields", schema.len());
        Ok(schema)
    }

    async fn predict(&self, input: &PredictionInput) -> Result<f64> {
        let url = self.url("predict");
        debug!("POST {} ({} fields)", url, input.len());
        // .json() sets Content-Type: application/json
        let response =
            error_for_status(self.client.post(&url).json(input).send().await?).await?;
        let body: PredictResponse =
            response.json().await.map_err(|e| PredictionFormError::Response {
                message: format!("predict body lacks a prediction array: {e}"),
            })?;
        let prediction = body.first()?;
        info!("Received prediction {}", prediction);
        Ok(prediction)
    }
}
