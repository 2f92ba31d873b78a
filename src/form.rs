//! Multipart form payloads for job submission

use crate::types::InputFile;

/// One file part of a multipart submission
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FormFile {
    /// Form field name (e.g., "fileInput")
    pub field: String,
    /// File name sent in the part's Content-Disposition
    pub file_name: String,
    /// MIME type of the part
    pub content_type: String,
    /// Part contents
    pub bytes: Vec<u8>,
}

/// Transport-agnostic description of a multipart form
///
/// Field and file order is preserved on the wire.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct FormPayload {
    /// Plain text fields
    pub fields: Vec<(String, String)>,
    /// File parts
    pub files: Vec<FormFile>,
}

impl FormPayload {
    /// Empty payload
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a text field
    pub fn text(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.fields.push((name.into(), value.into()));
        self
    }

    /// Add an input file under the given field name
    pub fn file(mut self, field: impl Into<String>, input: &InputFile) -> Self {
        self.files.push(FormFile {
            field: field.into(),
            file_name: input.name.clone(),
            content_type: input.content_type.clone(),
            bytes: input.bytes.clone(),
        });
        self
    }

    /// Add every input file under the same field name
    pub fn files<'a>(
        mut self,
        field: &str,
        inputs: impl IntoIterator<Item = &'a InputFile>,
    ) -> Self {
        for input in inputs {
            self = self.file(field, input);
        }
        self
    }

    /// Value of the first text field with this name
    pub fn field(&self, name: &str) -> Option<&str> {
        self.fields
            .iter()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v.as_str())
    }

    /// Total size of all file parts in bytes
    pub fn total_file_bytes(&self) -> usize {
        self.files.iter().map(|f| f.bytes.len()).sum()
    }
}

/// Builds the submission form for one run
///
/// In per-file mode this receives a single input; in combined mode it receives
/// every input of the batch. Closures `Fn(&[InputFile]) -> FormPayload` implement it.
pub trait FormBuilder: Send + Sync {
    /// Build the form for `inputs`
    fn build(&self, inputs: &[InputFile]) -> FormPayload;
}

impl<F> FormBuilder for F
where
    F: Fn(&[InputFile]) -> FormPayload + Send + Sync,
{
    fn build(&self, inputs: &[InputFile]) -> FormPayload {
        self(inputs)
    }
}

/// Form builder that sends each input as `fileInput` plus fixed text fields
#[derive(Clone, Debug, Default)]
pub struct StandardForm {
    fields: Vec<(String, String)>,
}

impl StandardForm {
    /// Field name the backend expects for uploaded documents
    pub const FILE_FIELD: &'static str = "fileInput";

    /// Builder with no extra fields
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a fixed text field sent with every submission
    pub fn with_field(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.fields.push((name.into(), value.into()));
        self
    }
}

impl FormBuilder for StandardForm {
    fn build(&self, inputs: &[InputFile]) -> FormPayload {
        let mut payload = FormPayload::new().files(Self::FILE_FIELD, inputs);
        payload.fields = self.fields.clone();
        payload
    }
}
