/// Form descriptors and validation helpers
///
/// `GET` on a form route returns a [`Page`] describing the form: title,
/// fields with initial values, and the CAPTCHA widget key when the form is
/// protected. `POST` handlers collect every problem into [`FieldErrors`]
/// before touching storage, so a rejected submission never persists
/// anything.

use axum::{
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use validator::ValidationErrors;

use accounts_shared::captcha::CaptchaVerifier;

use crate::error::{ApiError, ApiResult, ValidationErrorDetail};

pub const REQUIRED: &str = "This field is required.";
pub const CAPTCHA_FAILED: &str = "Error verifying reCAPTCHA, please try again.";
pub const PASSWORD_MISMATCH: &str = "The two password fields didn't match.";

/// Field key for errors that belong to the whole form
pub const NON_FIELD: &str = "__all__";

/// One input of a form
#[derive(Debug, Clone, Serialize)]
pub struct FormField {
    pub name: &'static str,
    pub label: &'static str,
    pub input_type: &'static str,
    pub required: bool,
    pub disabled: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub value: Option<String>,
}

impl FormField {
    pub fn new(name: &'static str, label: &'static str, input_type: &'static str) -> Self {
        Self {
            name,
            label,
            input_type,
            required: true,
            disabled: false,
            value: None,
        }
    }

    pub fn optional(mut self) -> Self {
        self.required = false;
        self
    }

    /// Shown but never read back from submissions
    pub fn disabled(mut self) -> Self {
        self.disabled = true;
        self.required = false;
        self
    }

    pub fn value(mut self, value: impl Into<String>) -> Self {
        self.value = Some(value.into());
        self
    }
}

/// CAPTCHA widget settings for the client
#[derive(Debug, Clone, Serialize)]
pub struct CaptchaWidget {
    pub site_key: String,
    pub widget: &'static str,
}

/// Descriptor returned by `GET` on form and status routes
#[derive(Debug, Clone, Serialize)]
pub struct Page {
    pub title: &'static str,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub subtitle: Option<&'static str>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<&'static str>,

    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub fields: Vec<FormField>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub captcha: Option<CaptchaWidget>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub valid_link: Option<bool>,
}

impl Page {
    pub fn new(title: &'static str) -> Self {
        Self {
            title,
            subtitle: None,
            message: None,
            fields: Vec::new(),
            captcha: None,
            valid_link: None,
        }
    }

    pub fn subtitle(mut self, subtitle: &'static str) -> Self {
        self.subtitle = Some(subtitle);
        self
    }

    pub fn message(mut self, message: &'static str) -> Self {
        self.message = Some(message);
        self
    }

    pub fn field(mut self, field: FormField) -> Self {
        self.fields.push(field);
        self
    }

    pub fn with_captcha(mut self, verifier: &dyn CaptchaVerifier) -> Self {
        self.captcha = Some(CaptchaWidget {
            site_key: verifier.site_key().to_string(),
            widget: "invisible",
        });
        self.field(FormField::new("captcha", "Captcha", "captcha"))
    }

    pub fn valid_link(mut self, valid: bool) -> Self {
        self.valid_link = Some(valid);
        self
    }
}

impl IntoResponse for Page {
    fn into_response(self) -> Response {
        Json(self).into_response()
    }
}

/// Collects field errors in form order
#[derive(Debug)]
pub struct FieldErrors {
    order: &'static [&'static str],
    details: Vec<ValidationErrorDetail>,
}

impl FieldErrors {
    pub fn new(order: &'static [&'static str]) -> Self {
        Self {
            order,
            details: Vec::new(),
        }
    }

    /// Seeds the collection from `validator` results
    ///
    /// A field that failed its `required` rule reports only that, matching
    /// how an empty input should read to a user.
    pub fn from_validation(
        result: Result<(), ValidationErrors>,
        order: &'static [&'static str],
    ) -> Self {
        let mut errors = Self::new(order);

        if let Err(e) = result {
            for (field, field_errors) in e.field_errors() {
                let required = field_errors.iter().any(|err| err.code == "required");
                for err in field_errors.iter() {
                    if required && err.code != "required" {
                        continue;
                    }
                    let message = err
                        .message
                        .as_ref()
                        .map(|m| m.to_string())
                        .unwrap_or_else(|| "Enter a valid value.".to_string());
                    errors.add(field.to_string(), message);
                }
            }
        }

        errors
    }

    pub fn add(&mut self, field: impl Into<String>, message: impl Into<String>) {
        self.details.push(ValidationErrorDetail {
            field: field.into(),
            message: message.into(),
        });
    }

    pub fn has(&self, field: &str) -> bool {
        self.details.iter().any(|d| d.field == field)
    }

    pub fn is_empty(&self) -> bool {
        self.details.is_empty()
    }

    pub fn into_error(mut self) -> ApiError {
        let order = self.order;
        let rank = |field: &str| {
            order
                .iter()
                .position(|f| *f == field)
                .unwrap_or(order.len())
        };
        self.details.sort_by_key(|d| rank(&d.field));
        ApiError::ValidationError(self.details)
    }

    pub fn into_result(self) -> ApiResult<()> {
        if self.is_empty() {
            Ok(())
        } else {
            Err(self.into_error())
        }
    }
}

/// Verifies the CAPTCHA field unless it already failed validation
pub async fn check_captcha(verifier: &dyn CaptchaVerifier, response: &str, errors: &mut FieldErrors) {
    if response.is_empty() {
        if !errors.has("captcha") {
            errors.add("captcha", REQUIRED);
        }
        return;
    }

    match verifier.verify(response).await {
        Ok(true) => {}
        Ok(false) => errors.add("captcha", CAPTCHA_FAILED),
        Err(e) => {
            tracing::warn!(error = %e, "CAPTCHA verification unavailable");
            errors.add("captcha", CAPTCHA_FAILED);
        }
    }
}

/// Adds the mismatch error or the strength errors for a new password pair
pub fn check_new_password(
    errors: &mut FieldErrors,
    first: &str,
    second: &str,
    second_field: &'static str,
    email: &str,
) {
    if first.is_empty() || second.is_empty() {
        return;
    }

    if first != second {
        errors.add(second_field, PASSWORD_MISMATCH);
        return;
    }

    if let Err(messages) = accounts_shared::auth::password::validate_password(second, email) {
        for message in messages {
            errors.add(second_field, message);
        }
    }
}
