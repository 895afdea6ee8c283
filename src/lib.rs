pub mod client;
pub mod config;
pub mod error;
pub mod form;
pub mod schema;
pub mod service;
pub mod submission;
pub mod tui;

pub use client::{HttpPredictionClient, PredictionApi, PredictionInput};
pub use error::{PredictionFormError, Result};
pub use form::{DynamicForm, FieldValue, FormControl};
pub use schema::{FieldType, ParamSchema};
pub use submission::{FormSession, SubmitOutcome};
