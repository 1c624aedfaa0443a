use std::sync::OnceLock;

use regex::Regex;
use thiserror::Error;

/// Closed failure taxonomy for every call that crosses the wire.
///
/// Exactly one variant describes any failure. `Unauthorized` always tears
/// the session down: the pipeline clears the credential vault before
/// surfacing it, and the flows call `SessionStore::logout` when they see it.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum RequestError {
    /// The configured base endpoint, or a path joined against it, is not a
    /// valid absolute URL. A configuration bug, never a user problem.
    #[error("invalid endpoint configuration")]
    InvalidEndpoint,

    /// The request never produced an HTTP response.
    #[error("transport failure: {0}")]
    Transport(String),

    /// The response arrived but could not be read as an HTTP exchange.
    #[error("malformed response")]
    MalformedResponse,

    /// A 2xx body failed to decode into the declared shape. Carries the raw
    /// bytes for logs; never shown to the user verbatim.
    #[error("failed to decode response: {cause}")]
    Decoding { cause: String, body: Vec<u8> },

    /// Authentication is missing, empty, or was rejected by the server.
    #[error("unauthorized")]
    Unauthorized,

    /// Server-reported failure with a best-effort human message. The only
    /// variant whose text may reach the user, after [`RequestError::user_message`].
    #[error("{0}")]
    Domain(String),
}

pub type Result<T> = std::result::Result<T, RequestError>;

impl RequestError {
    /// Maps the error to a short sentence safe to show the user.
    ///
    /// Technical prefixes are stripped from domain messages and a structured
    /// validation payload is replaced wholesale rather than echoed raw.
    pub fn user_message(&self) -> String {
        match self {
            Self::InvalidEndpoint => {
                "Could not connect to the service. Please check the configuration.".to_string()
            }
            Self::Transport(_) => {
                "Could not connect to the network. Please check your internet connection and try again."
                    .to_string()
            }
            Self::MalformedResponse => {
                "Received an unexpected response from the server.".to_string()
            }
            Self::Decoding { .. } => {
                "Could not understand the response from the server.".to_string()
            }
            Self::Unauthorized => "Your session has expired. Please log in again.".to_string(),
            Self::Domain(message) => friendly_domain_message(message),
        }
    }
}

/// Prefixes the backend (or older client layers) prepend to otherwise
/// readable messages. Anchored and case-insensitive.
fn technical_prefixes() -> &'static [Regex] {
    static PREFIXES: OnceLock<Vec<Regex>> = OnceLock::new();
    PREFIXES.get_or_init(|| {
        [
            r"^(?i)error: ",
            r"^(?i)server error \(\d+\): ",
            r"^(?i)server returned status code \d+: ",
            r"^(?i)login error: ",
            r"^(?i)validation error: ",
            r"^(?i)failed to save note: ",
        ]
        .iter()
        .map(|pattern| Regex::new(pattern).expect("Invalid prefix pattern"))
        .collect()
    })
}

fn friendly_domain_message(message: &str) -> String {
    let trimmed = message.trim();
    // A raw structured-validation payload is never worth echoing.
    if trimmed.starts_with(r#"{"detail":["#) {
        return "Please check the information you entered and try again.".to_string();
    }
    for prefix in technical_prefixes() {
        if let Some(found) = prefix.find(trimmed) {
            let remainder = trimmed[found.end()..].trim();
            if remainder.is_empty() {
                return "An unknown error occurred.".to_string();
            }
            return capitalize(remainder);
        }
    }
    if trimmed.is_empty() {
        "An unknown error occurred.".to_string()
    } else {
        trimmed.to_string()
    }
}

fn capitalize(text: &str) -> String {
    let mut chars = text.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().collect::<String>() + chars.as_str(),
        None => String::new(),
    }
}
