//! Stub prediction service speaking the same contract as the real one.
//!
//! `GET /params` returns the parameter schema; `POST /predict` takes the
//! normalized field values and answers `{"prediction": [value]}`. Field names
//! arrive with underscores and are handed to the predictor with spaces, as the
//! upstream model expects its column names.

use axum::{
    Json, Router,
    extract::State,
    http::{Method, StatusCode, header},
    response::{IntoResponse, Response},
    routing::{get, post},
};
use serde_json::{Map, Value, json};
use std::collections::BTreeMap;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tower_http::cors::{Any, CorsLayer};

use crate::error::{PredictionFormError, Result};
use crate::schema::{FieldType, ParamSchema};

const QUANTITATIVE_FIELDS: [&str; 3] = ["GROSS SQUARE FEET", "LAND SQUARE FEET", "YEAR BUILT"];
const CATEGORICAL_FIELDS: [&str; 13] = [
    "NEIGHBORHOOD",
    "BUILDING CLASS CATEGORY",
    "TAX CLASS AT PRESENT",
    "BLOCK",
    "LOT",
    "BUILDING CLASS AT PRESENT",
    "ZIP CODE",
    "RESIDENTIAL UNITS",
    "COMMERCIAL UNITS",
    "TOTAL UNITS",
    "TAX CLASS AT TIME OF SALE",
    "BUILDING CLASS AT TIME OF SALE",
    "SALE DATE",
];

/// Feature row handed to a predictor: model column name → value
pub type Features = BTreeMap<String, Value>;

pub trait Predictor: Send + Sync {
    fn predict(&self, features: &Features) -> Result<f64>;
}

/// Always answers the same value
#[derive(Debug, Clone, Copy)]
pub struct ConstantPredictor(pub f64);

impl Predictor for ConstantPredictor {
    fn predict(&self, _features: &Features) -> Result<f64> {
        Ok(self.0)
    }
}

/// NYC rolling-sales schema: quantitative columns are `int`, the rest `str`
pub fn default_schema() -> ParamSchema {
    let quantitative = QUANTITATIVE_FIELDS.iter().map(|c| (c, FieldType::Int));
    let categorical = CATEGORICAL_FIELDS.iter().map(|c| (c, FieldType::Str));
    ParamSchema::new(
        quantitative
            .chain(categorical)
            .map(|(column, ty)| (column.replace(' ', "_"), ty)),
    )
}

/// Undo client-side normalization of field names for the model
pub fn denormalize_keys(payload: Map<String, Value>) -> Features {
    payload
        .into_iter()
        .map(|(key, value)| (key.replace('_', " "), value))
        .collect()
}

#[derive(Clone)]
pub struct ServiceState {
    pub schema: Arc<ParamSchema>,
    pub predictor: Arc<dyn Predictor>,
}

impl ServiceState {
    pub fn new(schema: ParamSchema, predictor: impl Predictor + 'static) -> Self {
        Self {
            schema: Arc::new(schema),
            predictor: Arc::new(predictor),
        }
    }
}

pub async fn params_handler(State(state): State<ServiceState>) -> impl IntoResponse {
    Json(state.schema.as_ref().clone())
}

pub async fn predict_handler(
    State(state): State<ServiceState>,
    Json(payload): Json<Map<String, Value>>,
) -> Response {
    let features = denormalize_keys(payload);
    tracing::debug!("predict request with {} features", features.len());
    match state.predictor.predict(&features) {
        Ok(value) => (StatusCode::OK, Json(json!({ "prediction": [value] }))).into_response(),
        Err(e) => {
            tracing::warn!("predictor failed: {}", e);
            (
                StatusCode::UNPROCESSABLE_ENTITY,
                Json(json!({ "detail": e.to_string() })),
            )
                .into_response()
        }
    }
}

fn cors_layer() -> CorsLayer {
    CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::DELETE,
            Method::OPTIONS,
        ])
        .allow_headers([
            header::ORIGIN,
            header::CONTENT_TYPE,
            header::ACCEPT,
            header::AUTHORIZATION,
        ])
}

pub fn router(state: ServiceState) -> Router {
    Router::new()
        .route("/params", get(params_handler))
        .route("/predict", post(predict_handler))
        .layer(cors_layer())
        .with_state(state)
}

/// Serve on an already-bound listener until the task is dropped
pub async fn serve(listener: TcpListener, state: ServiceState) -> Result<()> {
    axum::serve(listener, router(state))
        .await
        .map_err(|e| PredictionFormError::Network {
            message: format!("stub service error: {e}"),
        })
}

pub async fn bind_and_serve(addr: SocketAddr, state: ServiceState) -> Result<()> {
    let listener = TcpListener::bind(addr)
        .await
        .map_err(|e| PredictionFormError::Network {
            message: format!("Failed to bind {addr}: {e}"),
        })?;
    tracing::info!(
        "Stub prediction service listening on {} ({} fields)",
        addr,
        state.schema.len()
    );
    serve(listener, state).await
}
