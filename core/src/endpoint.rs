//! Full-URL construction from the base prefix, a relative path and an
//! optional query mapping.

use serde_json::{Number, Value};
use url::form_urlencoded;

use crate::error::ApiError;

/// Join `base` and `path` with exactly one `/`, then append the encoded
/// query, if any.
///
/// One trailing slash is stripped from `base`; `path` gets a leading slash
/// when it lacks one.
pub fn build_url(base: &str, path: &str, query: Option<&Value>) -> Result<String, ApiError> {
    let base = base.strip_suffix('/').unwrap_or(base);
    let mut url = String::with_capacity(base.len() + path.len() + 1);
    url.push_str(base);
    if !path.starts_with('/') {
        url.push('/');
    }
    url.push_str(path);

    if let Some(query) = query {
        url.push('?');
        url.push_str(&encode_query(query)?);
    }
    Ok(url)
}

/// Encode a JSON object as `application/x-www-form-urlencoded`, in key order.
pub fn encode_query(query: &Value) -> Result<String, ApiError> {
    let map = match query {
        Value::Object(map) => map,
        Value::Null => {
            return Err(ApiError::InvalidInput(
                "query parameters must be an object, got null".to_string(),
            ))
        }
        Value::Array(_) => {
            return Err(ApiError::InvalidInput(
                "query parameters must be an object, got an array".to_string(),
            ))
        }
        other => {
            return Err(ApiError::InvalidInput(format!(
                "query parameters must be an object, got {other}"
            )))
        }
    };

    let mut serializer = form_urlencoded::Serializer::new(String::new());
    for (key, value) in map {
        serializer.append_pair(key, &stringify(key, value)?);
    }
    Ok(serializer.finish())
}

fn stringify(key: &str, value: &Value) -> Result<String, ApiError> {
    match value {
        Value::String(s) => Ok(s.clone()),
        Value::Number(n) => Ok(number_to_string(n)),
        Value::Bool(b) => Ok(b.to_string()),
        Value::Array(items) => {
            let parts = items
                .iter()
                .map(|item| stringify(key, item))
                .collect::<Result<Vec<_>, _>>()?;
            Ok(parts.join(","))
        }
        Value::Null => Err(ApiError::InvalidInput(format!(
            "query parameter `{key}` is null"
        ))),
        Value::Object(_) => Err(ApiError::InvalidInput(format!(
            "query parameter `{key}` is a nested object"
        ))),
    }
}

/// Whole-valued floats lose their fraction, so `1.0` encodes as `1`.
fn number_to_string(n: &Number) -> String {
    match n.as_f64() {
        Some(f) if n.is_f64() && f.fract() == 0.0 && f.abs() < MAX_EXACT_FLOAT => {
            format!("{}", f as i64)
        }
        _ => n.to_string(),
    }
}

/// Largest magnitude below which every whole `f64` is an exact integer.
const MAX_EXACT_FLOAT: f64 = 9_007_199_254_740_992.0;
