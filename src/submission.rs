//! Form component state: schema load, validation, normalization and submission.

use crate::client::{PredictionApi, PredictionInput};
use crate::error::{PredictionFormError, Result};
use crate::form::{DynamicForm, FieldValue};
use crate::schema::ParamSchema;
use tracing::{debug, info, warn};

/// Stringify a value and replace every space with an underscore
pub fn normalize_value(value: &FieldValue) -> String {
    value.to_string().replace(' ', "_")
}

/// Normalized body for every control that has a value
pub fn normalize(form: &DynamicForm) -> PredictionInput {
    form.value()
        .iter()
        .map(|(name, value)| (name.clone(), normalize_value(value)))
        .collect()
}

/// Result of the validation step of a submission
#[derive(Debug, Clone, PartialEq)]
pub enum Submission {
    /// Form was invalid; these controls were marked dirty and nothing was sent
    Invalid(Vec<String>),
    /// Form was valid; this body must be sent and the outcome passed to `complete_submit`
    Ready(PredictionInput),
}

#[derive(Debug, Clone, PartialEq)]
pub enum SubmitOutcome {
    Invalid(Vec<String>),
    Predicted(f64),
}

#[derive(Debug, Clone)]
pub struct FormSession {
    schema: ParamSchema,
    form: DynamicForm,
    prediction: Option<f64>,
    last_error: Option<String>,
    in_flight: bool,
}

impl FormSession {
    pub fn new(schema: ParamSchema) -> Self {
        let form = DynamicForm::from_schema(&schema);
        Self {
            schema,
            form,
            prediction: None,
            last_error: None,
            in_flight: false,
        }
    }

    /// Fetch the schema and build the form. No form exists if the fetch fails.
    pub async fn load(api: &dyn PredictionApi) -> Result<Self> {
        let schema = api.fetch_params().await.inspect_err(|e| {
            warn!("Failed to load parameter schema: {}", e);
        })?;
        debug!("Building form with {} controls", schema.len());
        Ok(Self::new(schema))
    }

    pub fn schema(&self) -> &ParamSchema {
        &self.schema
    }

    pub fn form(&self) -> &DynamicForm {
        &self.form
    }

    pub fn form_mut(&mut self) -> &mut DynamicForm {
        &mut self.form
    }

    pub fn prediction(&self) -> Option<f64> {
        self.prediction
    }

    pub fn last_error(&self) -> Option<&str> {
        self.last_error.as_deref()
    }

    pub fn is_in_flight(&self) -> bool {
        self.in_flight
    }

    /// Validate and normalize. A `Ready` result leaves the session in flight.
    pub fn prepare_submit(&mut self) -> Result<Submission> {
        if self.in_flight {
            return Err(PredictionFormError::Busy);
        }
        if !self.form.is_valid() {
            let invalid = self.form.mark_invalid_dirty();
            debug!("Form invalid, marked dirty: {:?}", invalid);
            return Ok(Submission::Invalid(invalid));
        }
        let input = normalize(&self.form);
        self.in_flight = true;
        Ok(Submission::Ready(input))
    }

    /// Record the outcome of the request started by `prepare_submit`
    pub fn complete_submit(&mut self, result: Result<f64>) -> Result<f64> {
        self.in_flight = false;
        match result {
            Ok(prediction) => {
                self.prediction = Some(prediction);
                self.last_error = None;
                Ok(prediction)
            }
            Err(e) => {
                warn!("Prediction request failed: {}", e);
                self.last_error = Some(e.to_string());
                Err(e)
            }
        }
    }

    pub async fn submit(&mut self, api: &dyn PredictionApi) -> Result<SubmitOutcome> {
        let input = match self.prepare_submit()? {
            Submission::Invalid(names) => return Ok(SubmitOutcome::Invalid(names)),
            Submission::Ready(input) => input,
        };
        info!("Submitting {} fields for prediction", input.len());
        let result = api.predict(&input).await;
        self.complete_submit(result).map(SubmitOutcome::Predicted)
    }
}
