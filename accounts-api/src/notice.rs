/// Outcomes and notices
///
/// State-changing handlers answer with an [`Outcome`]: where the client
/// should go next plus a list of user-facing notices. Notices carry a stable
/// `code` for clients and the display `message`.
///
/// ```json
/// {
///   "redirect": "/login/",
///   "notices": [
///     {
///       "level": "success",
///       "code": "account_activated",
///       "message": "Your account has been activated. You can login now."
///     }
///   ]
/// }
/// ```

use axum::{
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};

/// Notice severity
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Level {
    Info,
    Success,
    Warning,
    Error,
}

/// A single user-facing message
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Notice {
    pub level: Level,
    pub code: String,
    pub message: String,
}

/// Result of a form submission or link visit
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Outcome {
    pub redirect: String,

    #[serde(default)]
    pub notices: Vec<Notice>,
}

impl Outcome {
    pub fn redirect(to: impl Into<String>) -> Self {
        Self {
            redirect: to.into(),
            notices: Vec::new(),
        }
    }

    pub fn notice(mut self, level: Level, code: &str, message: impl Into<String>) -> Self {
        self.notices.push(Notice {
            level,
            code: code.to_string(),
            message: message.into(),
        });
        self
    }

    pub fn info(self, code: &str, message: impl Into<String>) -> Self {
        self.notice(Level::Info, code, message)
    }

    pub fn success(self, code: &str, message: impl Into<String>) -> Self {
        self.notice(Level::Success, code, message)
    }

    pub fn error(self, code: &str, message: impl Into<String>) -> Self {
        self.notice(Level::Error, code, message)
    }
}

impl IntoResponse for Outcome {
    fn into_response(self) -> Response {
        Json(self).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_outcome_serialization() {
        let outcome = Outcome::redirect("/login/").success("logged_in", "Welcome");
        let json = serde_json::to_value(&outcome).unwrap();

        assert_eq!(json["redirect"], "/login/");
        assert_eq!(json["notices"][0]["level"], "success");
        assert_eq!(json["notices"][0]["code"], "logged_in");
        assert_eq!(json["notices"][0]["message"], "Welcome");
    }

    #[test]
    fn test_notices_keep_order() {
        let outcome = Outcome::redirect("/")
            .info("a", "first")
            .error("b", "second");

        let levels: Vec<Level> = outcome.notices.iter().map(|n| n.level).collect();
        assert_eq!(levels, vec![Level::Info, Level::Error]);
    }

    #[test]
    fn test_plain_redirect_has_no_notices() {
        let json = serde_json::to_value(Outcome::redirect("/password/reset/done/")).unwrap();
        assert_eq!(json["notices"].as_array().unwrap().len(), 0);
    }
}
