//! Operation descriptors

use super::response::{OutputNaming, ResponseHandler};
use crate::form::{FormBuilder, FormPayload, StandardForm};
use crate::types::InputFile;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// How a batch of inputs is sent to the backend
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProcessingMode {
    /// One job per input, strictly one after another
    #[default]
    PerFile,
    /// One job for all inputs together (merge, combined conversion, ...)
    Combined,
}

/// A backend operation: endpoint, form encoding and output handling
///
/// The operation itself is opaque to the pipeline; it is identified by its
/// endpoint and encoded by its [`FormBuilder`].
#[derive(Clone)]
pub struct Operation {
    /// Short name used in logs and errors (e.g., "compress")
    pub name: String,
    /// Backend-relative endpoint, without the async flag
    pub endpoint: String,
    /// Per-file or combined submission
    pub mode: ProcessingMode,
    /// Output naming rules
    pub naming: OutputNaming,
    /// In combined mode, count every input as a success source
    pub consumes_all_inputs: bool,
    form: Arc<dyn FormBuilder>,
    handler: Option<Arc<dyn ResponseHandler>>,
}

impl std::fmt::Debug for Operation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Operation")
            .field("name", &self.name)
            .field("endpoint", &self.endpoint)
            .field("mode", &self.mode)
            .field("naming", &self.naming)
            .field("consumes_all_inputs", &self.consumes_all_inputs)
            .field("custom_handler", &self.handler.is_some())
            .finish()
    }
}

impl Operation {
    /// Per-file operation that uploads each input as `fileInput`
    pub fn new(name: impl Into<String>, endpoint: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            endpoint: endpoint.into(),
            mode: ProcessingMode::PerFile,
            naming: OutputNaming::default(),
            consumes_all_inputs: false,
            form: Arc::new(StandardForm::new()),
            handler: None,
        }
    }

    /// Send all inputs as one job
    pub fn combined(mut self) -> Self {
        self.mode = ProcessingMode::Combined;
        self
    }

    /// Prefix for output names
    pub fn with_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.naming.prefix = prefix.into();
        self
    }

    /// Prefer the server-provided filename for outputs
    pub fn preserve_backend_filename(mut self) -> Self {
        self.naming.preserve_backend_filename = true;
        self
    }

    /// Treat every input as consumed by a combined job
    pub fn consumes_all_inputs(mut self) -> Self {
        self.consumes_all_inputs = true;
        self
    }

    /// Use a custom form encoding
    pub fn with_form(mut self, form: impl FormBuilder + 'static) -> Self {
        self.form = Arc::new(form);
        self
    }

    /// Use a custom response handler
    pub fn with_handler(mut self, handler: impl ResponseHandler + 'static) -> Self {
        self.handler = Some(Arc::new(handler));
        self
    }

    /// Encode `inputs` for submission
    pub fn build_form(&self, inputs: &[InputFile]) -> FormPayload {
        self.form.build(inputs)
    }

    /// The custom response handler, if any
    pub fn handler(&self) -> Option<&dyn ResponseHandler> {
        self.handler.as_deref()
    }
}
