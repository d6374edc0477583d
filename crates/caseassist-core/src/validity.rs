//! Input validity checks across collaborating inputs.

/// An input that can check and report its own validity.
pub trait Validatable {
    /// Check validity, surfacing any message to the user. Returns whether
    /// the input is valid.
    fn report_validity(&mut self) -> bool;
}

/// Ask every collaborator to report, then return whether all are valid.
///
/// Every collaborator reports even after one fails, so all invalid inputs
/// show their messages at once.
pub fn all_valid(collaborators: &mut [&mut dyn Validatable]) -> bool {
    collaborators
        .iter_mut()
        .fold(true, |valid, input| input.report_validity() && valid)
}

/// A text input with an optional required flag.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TextInput {
    pub label: String,
    pub value: String,
    pub required: bool,
    /// Message shown after the last failed check.
    pub error: Option<String>,
}

impl TextInput {
    pub fn new(label: &str, value: &str, required: bool) -> Self {
        Self {
            label: label.to_string(),
            value: value.to_string(),
            required,
            error: None,
        }
    }
}

impl Validatable for TextInput {
    fn report_validity(&mut self) -> bool {
        if self.required && self.value.trim().is_empty() {
            self.error = Some(format!("{} is required", self.label));
            false
        } else {
            self.error = None;
            true
        }
    }
}
