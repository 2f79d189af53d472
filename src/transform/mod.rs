//! Pure helpers applied at the provider boundary.

use std::sync::LazyLock;

use regex::Regex;
use serde_json::{Map, Value};

pub const REDACTED_SUBDOMAIN: &str = "***";

static AZURE_ENDPOINT_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^([A-Za-z][A-Za-z0-9+.-]*://)([^./]+)(\.openai\.azure\.com/.*)$")
        .expect("valid endpoint pattern")
});

/// Masks the resource subdomain of an `<scheme>://<sub>.openai.azure.com/<path>`
/// URL. Anything else is returned unchanged.
pub fn redact_endpoint(url: &str) -> String {
    match AZURE_ENDPOINT_RE.captures(url) {
        Some(captures) => format!("{}{REDACTED_SUBDOMAIN}{}", &captures[1], &captures[3]),
        None => url.to_string(),
    }
}

/// Redacts a configured base URL. A bare `<scheme>://<host>` gets a trailing
/// slash first so the host still matches the endpoint shape.
pub fn redact_base_url(endpoint: &str) -> String {
    let has_path = endpoint
        .split_once("://")
        .is_some_and(|(_, rest)| rest.contains('/'));

    if has_path {
        redact_endpoint(endpoint)
    } else {
        redact_endpoint(&format!("{endpoint}/"))
    }
}

/// Rewrites every mapping key from snake_case to camelCase, recursing through
/// sequences and mappings. Scalars and sequence order are untouched.
pub fn camel_case_keys(value: Value) -> Value {
    match value {
        Value::Array(items) => Value::Array(items.into_iter().map(camel_case_keys).collect()),
        Value::Object(entries) => Value::Object(camel_case_map(entries)),
        scalar => scalar,
    }
}

pub fn camel_case_map(entries: Map<String, Value>) -> Map<String, Value> {
    let mut normalized = Map::with_capacity(entries.len());
    for (key, value) in entries {
        normalized.insert(to_camel_case(&key), camel_case_keys(value));
    }
    normalized
}

/// `_x` becomes `X` for every lowercase ASCII `x`; all other characters are kept.
pub fn to_camel_case(key: &str) -> String {
    let mut converted = String::with_capacity(key.len());
    let mut chars = key.chars().peekable();

    while let Some(current) = chars.next() {
        if current == '_' {
            if let Some(next) = chars.peek().copied().filter(char::is_ascii_lowercase) {
                converted.push(next.to_ascii_uppercase());
                chars.next();
                continue;
            }
        }
        converted.push(current);
    }

    converted
}
