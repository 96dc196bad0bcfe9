//! Query-string encoding for request parameters.
//!
//! # Design
//! `Params` is an insertion-ordered list of key/scalar pairs so the encoded
//! query reproduces the order the caller wrote. Encoding follows the
//! component-encoding rules of browser script engines: only
//! `A-Z a-z 0-9 - _ . ! ~ * ' ( )` pass through literally.
//!
//! `append_query` keeps a long-standing quirk: when the URL already has a
//! `?`, the encoded pairs are appended with no `&` in between. Callers that
//! need a separator must supply it in the base URL.

use std::fmt;

use percent_encoding::{percent_decode_str, utf8_percent_encode, AsciiSet, NON_ALPHANUMERIC};
use serde::ser::SerializeMap;
use serde::{Deserialize, Serialize, Serializer};

/// Characters escaped by component encoding.
const COMPONENT: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'_')
    .remove(b'.')
    .remove(b'!')
    .remove(b'~')
    .remove(b'*')
    .remove(b'\'')
    .remove(b'(')
    .remove(b')');

/// A single parameter value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Scalar {
    Str(String),
    Int(i64),
    Float(f64),
    Bool(bool),
    Null,
}

impl fmt::Display for Scalar {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Scalar::Str(s) => f.write_str(s),
            Scalar::Int(n) => write!(f, "{n}"),
            Scalar::Float(n) => write_number(*n, f),
            Scalar::Bool(b) => write!(f, "{b}"),
            Scalar::Null => f.write_str("null"),
        }
    }
}

/// Number-to-text the way script engines do it: shortest round-trip digits,
/// `0` for both zeros, exponent form outside `[1e-6, 1e21)`.
fn write_number(n: f64, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    if n.is_nan() {
        return f.write_str("NaN");
    }
    if n.is_infinite() {
        return f.write_str(if n > 0.0 { "Infinity" } else { "-Infinity" });
    }
    if n == 0.0 {
        return f.write_str("0");
    }
    let magnitude = n.abs();
    if (1e-6..1e21).contains(&magnitude) {
        return write!(f, "{n}");
    }
    let exponential = format!("{n:e}");
    match exponential.split_once('e') {
        Some((mantissa, power)) if !power.starts_with('-') => write!(f, "{mantissa}e+{power}"),
        _ => f.write_str(&exponential),
    }
}

impl From<&str> for Scalar {
    fn from(value: &str) -> Self {
        Scalar::Str(value.to_string())
    }
}

impl From<String> for Scalar {
    fn from(value: String) -> Self {
        Scalar::Str(value)
    }
}

impl From<i64> for Scalar {
    fn from(value: i64) -> Self {
        Scalar::Int(value)
    }
}

impl From<i32> for Scalar {
    fn from(value: i32) -> Self {
        Scalar::Int(value.into())
    }
}

impl From<u32> for Scalar {
    fn from(value: u32) -> Self {
        Scalar::Int(value.into())
    }
}

impl From<f64> for Scalar {
    fn from(value: f64) -> Self {
        Scalar::Float(value)
    }
}

impl From<bool> for Scalar {
    fn from(value: bool) -> Self {
        Scalar::Bool(value)
    }
}

impl<T: Into<Scalar>> From<Option<T>> for Scalar {
    fn from(value: Option<T>) -> Self {
        value.map_or(Scalar::Null, Into::into)
    }
}

/// Insertion-ordered key/value parameters.
///
/// Inserting an existing key replaces its value in place, keeping the key's
/// original position.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Params {
    pairs: Vec<(String, Scalar)>,
}

impl Params {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style `insert`.
    pub fn with(mut self, key: impl Into<String>, value: impl Into<Scalar>) -> Self {
        self.insert(key, value);
        self
    }

    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<Scalar>) {
        let key = key.into();
        let value = value.into();
        match self.pairs.iter_mut().find(|(k, _)| *k == key) {
            Some(slot) => slot.1 = value,
            None => self.pairs.push((key, value)),
        }
    }

    pub fn get(&self, key: &str) -> Option<&Scalar> {
        self.pairs.iter().find(|(k, _)| k == key).map(|(_, v)| v)
    }

    pub fn len(&self) -> usize {
        self.pairs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pairs.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Scalar)> {
        self.pairs.iter().map(|(k, v)| (k.as_str(), v))
    }
}

impl<K: Into<String>, V: Into<Scalar>> FromIterator<(K, V)> for Params {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut params = Params::new();
        for (k, v) in iter {
            params.insert(k, v);
        }
        params
    }
}

impl Serialize for Params {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.pairs.len()))?;
        for (k, v) in &self.pairs {
            map.serialize_entry(k, v)?;
        }
        map.end()
    }
}

/// Percent-encode a single key or value.
pub fn encode_component(input: &str) -> String {
    utf8_percent_encode(input, COMPONENT).to_string()
}

/// Reverse of [`encode_component`]. Invalid UTF-8 sequences are replaced.
pub fn decode_component(input: &str) -> String {
    percent_decode_str(input).decode_utf8_lossy().into_owned()
}

/// Encode `params` as `k1=v1&k2=v2`. Empty params yield an empty string.
pub fn encode(params: &Params) -> String {
    params
        .iter()
        .map(|(k, v)| format!("{}={}", encode_component(k), encode_component(&v.to_string())))
        .collect::<Vec<_>>()
        .join("&")
}

/// Merge `params` into `url`.
///
/// Returns `url` unchanged when there is nothing to encode. Uses `?` as the
/// separator when `url` has no query yet; otherwise appends directly.
pub fn append_query(url: &str, params: &Params) -> String {
    let encoded = encode(params);
    if encoded.is_empty() {
        return url.to_string();
    }
    if url.contains('?') {
        format!("{url}{encoded}")
    } else {
        format!("{url}?{encoded}")
    }
}

/// Look up the raw value of `name` in a URL or search string.
///
/// Only occurrences directly after `?` or `&` count. The value runs until
/// the next `#`, `?` or `&`; empty values are skipped. The value is returned
/// as it appears, without percent-decoding.
pub fn param(search: &str, name: &str) -> Option<String> {
    if name.is_empty() {
        return None;
    }
    let needle = format!("{name}=");
    search
        .match_indices(&needle)
        .filter(|(at, _)| *at > 0 && matches!(search.as_bytes()[at - 1], b'?' | b'&'))
        .map(|(at, _)| {
            let rest = &search[at + needle.len()..];
            let end = rest.find(|c: char| matches!(c, '#' | '?' | '&')).unwrap_or(rest.len());
            &rest[..end]
        })
        .find(|value| !value.is_empty())
        .map(str::to_string)
}
