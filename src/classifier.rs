//! Failure classification
//!
//! Maps a failed request to the message shown to the user and to an
//! optional session side effect. The table is fixed:
//!
//! | failure            | message                              | side effect            |
//! |--------------------|--------------------------------------|------------------------|
//! | no response        | Connection error                     | -                      |
//! | status >= 500      | An unknown server error occurred     | -                      |
//! | 404                | Resource not found                   | -                      |
//! | 401, 403           | Unauthorized, please login again     | clear session (policy) |
//! | anything else      | server message, else generic         | -                      |

use serde_json::Value;

pub const CONNECTION_ERROR: &str = "Connection error";
pub const SERVER_ERROR: &str = "An unknown server error occurred";
pub const NOT_FOUND: &str = "Resource not found";
pub const UNAUTHORIZED: &str = "Unauthorized, please login again";
pub const GENERIC_ERROR: &str = "An error occurred";

/// A failure as seen by the classifier
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Failure<'a> {
    /// The request never produced a response (connect error, timeout)
    NoResponse,
    /// The server answered with a non-success status
    Status {
        status: u16,
        server_message: Option<&'a str>,
    },
}

/// Side effects the client applies after classification
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SideEffect {
    /// Wipe stored credentials
    ClearSession,
}

/// Outcome of classifying a failure
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Classification {
    pub message: String,
    pub side_effect: Option<SideEffect>,
}

/// Auth-failure policy. One value per client so a build never mixes both.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ClassifierPolicy {
    pub clear_credentials_on_auth_failure: bool,
}

/// Classify a failure
pub fn classify(failure: &Failure<'_>, policy: &ClassifierPolicy) -> Classification {
    match *failure {
        Failure::NoResponse => Classification {
            message: CONNECTION_ERROR.to_string(),
            side_effect: None,
        },
        Failure::Status { status, .. } if status >= 500 => Classification {
            message: SERVER_ERROR.to_string(),
            side_effect: None,
        },
        Failure::Status { status: 404, .. } => Classification {
            message: NOT_FOUND.to_string(),
            side_effect: None,
        },
        Failure::Status {
            status: 401 | 403, ..
        } => Classification {
            message: UNAUTHORIZED.to_string(),
            side_effect: policy
                .clear_credentials_on_auth_failure
                .then_some(SideEffect::ClearSession),
        },
        Failure::Status { server_message, .. } => Classification {
            message: server_message
                .map(str::trim)
                .filter(|m| !m.is_empty())
                .unwrap_or(GENERIC_ERROR)
                .to_string(),
            side_effect: None,
        },
    }
}

/// Pull the human-readable message out of an error body.
///
/// Looks at `message`, then `responseMessage`. Either may be a string or an
/// array of strings (validation errors); arrays are joined with ", ".
pub fn server_message(body: &Value) -> Option<String> {
    ["message", "responseMessage"]
        .iter()
        .filter_map(|field| body.get(field))
        .find_map(message_text)
}

fn message_text(value: &Value) -> Option<String> {
    match value {
        Value::String(s) if !s.trim().is_empty() => Some(s.trim().to_string()),
        Value::Array(items) => {
            let parts: Vec<&str> = items
                .iter()
                .filter_map(Value::as_str)
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .collect();
            if parts.is_empty() {
                None
            } else {
                Some(parts.join(", "))
            }
        }
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    const KEEP: ClassifierPolicy = ClassifierPolicy {
        clear_credentials_on_auth_failure: false,
    };
    const CLEAR: ClassifierPolicy = ClassifierPolicy {
        clear_credentials_on_auth_failure: true,
    };

    fn status(status: u16, server_message: Option<&str>) -> Failure<'_> {
        Failure::Status {
            status,
            server_message,
        }
    }

    #[test]
    fn test_no_response() {
        let c = classify(&Failure::NoResponse, &CLEAR);
        assert_eq!(c.message, CONNECTION_ERROR);
        assert_eq!(c.side_effect, None);
    }

    #[test]
    fn test_server_errors_never_clear_session() {
        for code in [500, 502, 503, 504, 599] {
            for policy in [KEEP, CLEAR] {
                let c = classify(&status(code, Some("db down")), &policy);
                assert_eq!(c.message, SERVER_ERROR, "status {code}");
                assert_eq!(c.side_effect, None, "status {code}");
            }
        }
    }

    #[test]
    fn test_not_found_ignores_server_message() {
        let c = classify(&status(404, Some("no such product")), &KEEP);
        assert_eq!(c.message, NOT_FOUND);
    }

    #[test]
    fn test_auth_failure_follows_policy() {
        for code in [401, 403] {
            let kept = classify(&status(code, None), &KEEP);
            assert_eq!(kept.message, UNAUTHORIZED);
            assert_eq!(kept.side_effect, None);

            let cleared = classify(&status(code, None), &CLEAR);
            assert_eq!(cleared.message, UNAUTHORIZED);
            assert_eq!(cleared.side_effect, Some(SideEffect::ClearSession));
        }
    }

    #[test]
    fn test_other_statuses_use_server_message() {
        let c = classify(&status(422, Some("Email already exists")), &CLEAR);
        assert_eq!(c.message, "Email already exists");
        assert_eq!(c.side_effect, None);

        let c = classify(&status(400, None), &KEEP);
        assert_eq!(c.message, GENERIC_ERROR);

        let c = classify(&status(409, Some("   ")), &KEEP);
        assert_eq!(c.message, GENERIC_ERROR);

        // Unlisted non-4xx statuses fall through to the same branch
        let c = classify(&status(302, Some("moved")), &KEEP);
        assert_eq!(c.message, "moved");
    }

    #[test]
    fn test_server_message_extraction() {
        assert_eq!(
            server_message(&json!({"message": "bad input"})).as_deref(),
            Some("bad input")
        );
        assert_eq!(
            server_message(&json!({"responseMessage": "legacy field"})).as_deref(),
            Some("legacy field")
        );
        assert_eq!(
            server_message(&json!({"message": ["name is required", "price must be positive"]}))
                .as_deref(),
            Some("name is required, price must be positive")
        );
        assert_eq!(
            server_message(&json!({"message": "", "responseMessage": "fallback"})).as_deref(),
            Some("fallback")
        );
        assert_eq!(server_message(&json!({"data": null})), None);
        assert_eq!(server_message(&json!("plain string body")), None);
    }
}
