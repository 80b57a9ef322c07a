//! Tenant resource mappings
//!
//! A tenant document maps resource names to destination URLs. Stored pairs
//! are re-validated on every read through [`Mapping::new`]; a malformed
//! binding is dropped by the store rather than failing the whole lookup.

use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum MappingError {
    #[error("resource name must not be empty")]
    EmptyResourceName,

    #[error("invalid url {url:?}: {reason}")]
    InvalidUrl { url: String, reason: String },
}

/// A validated binding from a resource name to a destination URL.
///
/// Path segments of the form `:param` are treated as path parameters and
/// collected at construction time so the gateway can substitute them when
/// dispatching.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Mapping {
    resource_name: String,
    url: String,
    path_params: Vec<String>,
}

impl Mapping {
    /// Validate a raw (name, url) pair into a `Mapping`.
    pub fn new(resource_name: &str, url: &str) -> Result<Self, MappingError> {
        if resource_name.is_empty() {
            return Err(MappingError::EmptyResourceName);
        }

        let rest = parse_scheme(url)?;
        let (host, path) = match rest.find('/') {
            Some(idx) => (&rest[..idx], &rest[idx..]),
            None => (rest, ""),
        };
        if host.is_empty() {
            return Err(MappingError::InvalidUrl {
                url: url.to_string(),
                reason: "missing host".to_string(),
            });
        }

        let path_params = path
            .split('/')
            .filter_map(|segment| segment.strip_prefix(':'))
            .filter(|name| !name.is_empty())
            .map(|name| name.to_string())
            .collect();

        Ok(Self {
            resource_name: resource_name.to_string(),
            url: url.to_string(),
            path_params,
        })
    }

    pub fn resource_name(&self) -> &str {
        &self.resource_name
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    pub fn path_params(&self) -> &[String] {
        &self.path_params
    }
}

fn parse_scheme(url: &str) -> Result<&str, MappingError> {
    let invalid = |reason: &str| MappingError::InvalidUrl {
        url: url.to_string(),
        reason: reason.to_string(),
    };

    let (scheme, rest) = url.split_once("://").ok_or_else(|| invalid("missing scheme"))?;
    if scheme.is_empty() || !scheme.chars().all(|c| c.is_ascii_alphanumeric() || c == '+' || c == '-') {
        return Err(invalid("malformed scheme"));
    }
    Ok(rest)
}
