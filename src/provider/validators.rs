// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Validators for provider properties.
//!
//! Each validator returns a short human readable problem description on failure.
//! They are combined per property in [`super::checks::DnsHandlerAdapterChecks`].

use base64::Engine;
use regex::Regex;
use rustls::pki_types::pem::PemObject;
use rustls::pki_types::CertificateDer;
use std::sync::{Arc, LazyLock};

/// Checks one property value.
pub type PropertyValidator = Arc<dyn Fn(&str) -> Result<(), String> + Send + Sync>;

static ALPHA_NUM: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[a-zA-Z0-9]+$").expect("alphanumeric pattern must compile"));
static ALPHA_NUM_PUNCTUATION: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[a-zA-Z0-9._:-]+$").expect("punctuation pattern must compile")
});
static BASE64_CHARS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[a-zA-Z0-9=+/]+$").expect("base64 pattern must compile"));

fn validator(f: impl Fn(&str) -> Result<(), String> + Send + Sync + 'static) -> PropertyValidator {
    Arc::new(f)
}

#[must_use]
pub fn alpha_numeric() -> PropertyValidator {
    validator(|value| {
        if ALPHA_NUM.is_match(value) {
            Ok(())
        } else {
            Err("value must contain only alphanumeric characters".into())
        }
    })
}

#[must_use]
pub fn alpha_numeric_punctuation() -> PropertyValidator {
    validator(|value| {
        if ALPHA_NUM_PUNCTUATION.is_match(value) {
            Ok(())
        } else {
            Err("value must contain only alphanumeric characters, dots, hyphens, underscores, and colons".into())
        }
    })
}

#[must_use]
pub fn printable() -> PropertyValidator {
    validator(|value| match value.chars().find(|c| c.is_control()) {
        Some(c) => Err(format!(
            "value must contain only printable characters, found: rune {}",
            c as u32
        )),
        None => Ok(()),
    })
}

#[must_use]
pub fn base64_characters() -> PropertyValidator {
    validator(|value| {
        if BASE64_CHARS.is_match(value) {
            Ok(())
        } else {
            Err("value must contain only characters used for base64 encoding (A-Z, a-z, 0-9, +, /, and =)".into())
        }
    })
}

/// Parses booleans the way the property accessors do.
#[must_use]
pub fn parse_bool(value: &str) -> Option<bool> {
    match value {
        "1" | "t" | "T" | "true" | "TRUE" | "True" => Some(true),
        "0" | "f" | "F" | "false" | "FALSE" | "False" => Some(false),
        _ => None,
    }
}

#[must_use]
pub fn bool_value() -> PropertyValidator {
    validator(|value| {
        parse_bool(value)
            .map(|_| ())
            .ok_or_else(|| "value must be a boolean (true/false)".to_string())
    })
}

#[must_use]
pub fn regex(re: Regex) -> PropertyValidator {
    validator(move |value| {
        if re.is_match(value) {
            Ok(())
        } else {
            Err(format!("value must follow regular expression: {}", re.as_str()))
        }
    })
}

#[must_use]
pub fn max_length(max: usize) -> PropertyValidator {
    validator(move |value| {
        if value.len() > max {
            Err(format!("value exceeds maximum length of {max} characters"))
        } else {
            Ok(())
        }
    })
}

#[must_use]
pub fn predefined_values(values: &[&str]) -> PropertyValidator {
    let values: Vec<String> = values.iter().map(|v| (*v).to_string()).collect();
    validator(move |value| {
        if values.iter().any(|v| v == value) {
            Ok(())
        } else {
            Err(format!("value must be one of: {}", values.join(", ")))
        }
    })
}

#[must_use]
pub fn int_range(min: i64, max: i64) -> PropertyValidator {
    validator(move |value| {
        let v: i64 = value
            .parse()
            .map_err(|_| "value must be an integer".to_string())?;
        if v < min || v > max {
            Err(format!("value must be between {min} and {max}"))
        } else {
            Ok(())
        }
    })
}

#[must_use]
pub fn url_schemes(schemes: &[&str]) -> PropertyValidator {
    let schemes: Vec<String> = schemes.iter().map(|s| (*s).to_string()).collect();
    validator(move |value| {
        if !schemes.iter().any(|s| value.starts_with(&format!("{s}://"))) {
            return Err(format!(
                "value must start with one of the following schemes: {}",
                schemes.join(", ")
            ));
        }
        url::Url::parse(value)
            .map(|_| ())
            .map_err(|e| format!("value must be a valid URL, error: {e}"))
    })
}

/// Accepts PEM text holding at least one parseable X.509 certificate.
#[must_use]
pub fn ca_cert() -> PropertyValidator {
    validator(|value| {
        let certs: Vec<CertificateDer<'static>> = CertificateDer::pem_slice_iter(value.as_bytes())
            .collect::<Result<_, _>>()
            .map_err(|_| "cannot parse certificates from PEM format".to_string())?;
        if certs.is_empty() {
            return Err("cannot parse certificates from PEM format".into());
        }
        for cert in &certs {
            x509_parser::parse_x509_certificate(cert.as_ref())
                .map_err(|_| "cannot parse certificates from PEM format".to_string())?;
        }
        Ok(())
    })
}

/// Accepts text containing one well-formed PEM block of any label.
#[must_use]
pub fn pem() -> PropertyValidator {
    validator(|value| {
        if decode_first_pem_block(value).is_some() {
            Ok(())
        } else {
            Err("value must be a valid PEM encoded string".into())
        }
    })
}

fn decode_first_pem_block(value: &str) -> Option<Vec<u8>> {
    let begin = value.find("-----BEGIN ")?;
    let rest = &value[begin..];
    let header_end = rest.find('\n')?;
    let label = rest[..header_end]
        .trim()
        .strip_prefix("-----BEGIN ")?
        .strip_suffix("-----")?;
    let footer = format!("-----END {label}-----");
    let end = rest.find(&footer)?;
    let body: String = rest[header_end..end]
        .chars()
        .filter(|c| !c.is_whitespace())
        .collect();
    base64::engine::general_purpose::STANDARD.decode(body).ok()
}

#[must_use]
pub fn no_trailing_whitespace() -> PropertyValidator {
    validator(|value| {
        if value.trim() == value {
            Ok(())
        } else {
            Err("value must not contain trailing whitespace".into())
        }
    })
}

#[must_use]
pub fn no_trailing_newline() -> PropertyValidator {
    validator(|value| {
        if value.trim_matches(['\n', '\r']) == value {
            Ok(())
        } else {
            Err("value must not contain newlines".into())
        }
    })
}

#[cfg(test)]
#[path = "validators_tests.rs"]
mod validators_tests;
