//! Storage encoding for conference names.
//!
//! Names are percent-encoded before they are written. `/` and `@` stay
//! literal so `room@domain` and path-like names remain readable in the
//! store.

use std::borrow::Cow;

const KEEP_LITERAL: &[char] = &['/', '@'];

pub fn encode_conference(name: &str) -> String {
    let mut encoded = String::with_capacity(name.len());
    let mut rest = name;
    while let Some(index) = rest.find(KEEP_LITERAL) {
        encoded.push_str(&urlencoding::encode(&rest[..index]));
        // Both literal characters are single-byte.
        encoded.push_str(&rest[index..index + 1]);
        rest = &rest[index + 1..];
    }
    encoded.push_str(&urlencoding::encode(rest));
    encoded
}

/// Decodes a stored value. Values that do not decode to UTF-8 were not
/// written by this service and are returned untouched.
pub fn decode_conference(stored: &str) -> Cow<'_, str> {
    match urlencoding::decode(stored) {
        Ok(decoded) => decoded,
        Err(error) => {
            tracing::warn!(?error, "stored conference is not valid percent-encoded utf-8");
            Cow::Borrowed(stored)
        }
    }
}
