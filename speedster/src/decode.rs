//! Strict JSON request-body decoding.
//!
//! Bodies are decoded into a target type with unknown fields rejected, and
//! every failure mode is classified so handlers can answer with a precise
//! message and status.

use serde::de::DeserializeOwned;
use serde_json::error::Category;

/// Upper bound on an accepted request body.
pub const MAX_BODY_BYTES: usize = 1_048_576;

#[derive(thiserror::Error, Debug, PartialEq)]
pub enum DecodeError {
    #[error("Request body must not be larger than 1MB")]
    TooLarge,

    #[error("Request body must not be empty")]
    Empty,

    #[error("Request body contains badly-formed JSON (at line {line} column {column})")]
    Malformed { line: usize, column: usize },

    #[error("Request body contains badly-formed JSON")]
    UnexpectedEnd,

    #[error("Request body contains an invalid value ({detail})")]
    InvalidValue { detail: String },

    #[error("Request body contains unknown field `{field}`")]
    UnknownField { field: String },

    #[error("Request body must only contain a single JSON object")]
    Multiple,
}

/// Decodes exactly one JSON value from `body` into `T`.
pub fn from_slice<T: DeserializeOwned>(body: &[u8]) -> Result<T, DecodeError> {
    if body.len() > MAX_BODY_BYTES {
        return Err(DecodeError::TooLarge);
    }

    let mut stream = serde_json::Deserializer::from_slice(body).into_iter::<T>();

    let value = match stream.next() {
        None => return Err(DecodeError::Empty),
        Some(result) => result.map_err(classify)?,
    };

    // Anything after the first value, well-formed or not, is rejected.
    if stream.next().is_some() {
        return Err(DecodeError::Multiple);
    }

    Ok(value)
}

fn classify(err: serde_json::Error) -> DecodeError {
    match err.classify() {
        Category::Eof => DecodeError::UnexpectedEnd,
        Category::Data => {
            let detail = err.to_string();
            match unknown_field(&detail) {
                Some(field) => DecodeError::UnknownField { field },
                None => DecodeError::InvalidValue { detail },
            }
        }
        Category::Syntax | Category::Io => DecodeError::Malformed {
            line: err.line(),
            column: err.column(),
        },
    }
}

// serde reports rejected fields as a data error with the field name
// backticked at the start of the message.
fn unknown_field(detail: &str) -> Option<String> {
    let rest = detail.strip_prefix("unknown field `")?;
    let (field, _) = rest.split_once('`')?;
    Some(field.to_string())
}
