// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Pre-flight validation of provider properties.
//!
//! A provider type declares which properties it accepts, which are required,
//! which aliases a key may use and how values are validated. Validation runs
//! before a handler is constructed and reports all problems at once.
//!
//! # Example
//!
//! ```
//! use dnsman::provider::checks::{DnsHandlerAdapterChecks, PropertyCheck};
//! use dnsman::provider::validators;
//! use std::collections::BTreeMap;
//!
//! let mut checks = DnsHandlerAdapterChecks::new();
//! checks.add(PropertyCheck::required("Server").validators([validators::no_trailing_whitespace()]));
//! checks.add(PropertyCheck::optional("TSIGSecret").hide_value());
//!
//! let mut props = BTreeMap::new();
//! props.insert("Server".to_string(), "10.0.0.1".to_string());
//! assert!(checks.validate_properties("rfc2136", &props).is_ok());
//! ```

use super::validators::PropertyValidator;
use super::Properties;
use crate::dns_errors::{DnsError, ValidationError};
use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;

/// Check of one property and its aliases.
#[derive(Clone)]
pub struct PropertyCheck {
    name: String,
    aliases: Vec<String>,
    required: bool,
    allow_empty: bool,
    hide: bool,
    validators: Vec<PropertyValidator>,
}

impl PropertyCheck {
    #[must_use]
    pub fn required(name: &str) -> Self {
        Self::new(name, true)
    }

    #[must_use]
    pub fn optional(name: &str) -> Self {
        Self::new(name, false)
    }

    fn new(name: &str, required: bool) -> Self {
        Self {
            name: name.to_string(),
            aliases: Vec::new(),
            required,
            allow_empty: false,
            hide: false,
            validators: Vec::new(),
        }
    }

    #[must_use]
    pub fn aliases(mut self, aliases: &[&str]) -> Self {
        self.aliases
            .extend(aliases.iter().map(|a| (*a).to_string()));
        self
    }

    #[must_use]
    pub fn validators(mut self, validators: impl IntoIterator<Item = PropertyValidator>) -> Self {
        self.validators.extend(validators);
        self
    }

    #[must_use]
    pub fn allow_empty_value(mut self) -> Self {
        self.allow_empty = true;
        self
    }

    /// Replaces the value by `(hidden)` in problem descriptions.
    #[must_use]
    pub fn hide_value(mut self) -> Self {
        self.hide = true;
        self
    }

    fn name_and_aliases(&self) -> String {
        if self.aliases.is_empty() {
            self.name.clone()
        } else {
            format!("{} (aliases [{}])", self.name, self.aliases.join(","))
        }
    }

    fn matches(&self, key: &str) -> bool {
        self.name == key || self.aliases.iter().any(|a| a == key)
    }
}

fn nice_name(preferred: &str, used: &str) -> String {
    if preferred == used {
        preferred.to_string()
    } else {
        format!("{used} (alias for {preferred})")
    }
}

/// The set of property checks of a provider type.
#[derive(Clone, Default)]
pub struct DnsHandlerAdapterChecks {
    checks: Vec<PropertyCheck>,
    disjunct_property_sets: Vec<Vec<String>>,
}

impl DnsHandlerAdapterChecks {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, check: PropertyCheck) {
        self.checks.push(check);
    }

    /// Declares groups of property names of which exactly one must be fully provided.
    pub fn set_disjunct_property_sets(&mut self, sets: &[&[&str]]) {
        self.disjunct_property_sets = sets
            .iter()
            .map(|set| set.iter().map(|s| (*s).to_string()).collect())
            .collect();
    }

    /// True if the property (by name or alias) is present in `properties`.
    #[must_use]
    pub fn has_property_name_or_alias(&self, properties: &Properties, name_or_alias: &str) -> bool {
        self.checks
            .iter()
            .find(|c| c.matches(name_or_alias))
            .is_some_and(|c| {
                properties.contains_key(&c.name) || c.aliases.iter().any(|a| properties.contains_key(a))
            })
    }

    /// Runs all checks and aggregates the problems.
    ///
    /// # Errors
    ///
    /// Returns a [`ValidationError`] listing every problem found.
    pub fn validate_properties(
        &self,
        provider_type: &str,
        properties: &Properties,
    ) -> Result<(), ValidationError> {
        let mut problems = Vec::new();
        let mut allowed_keys = BTreeSet::new();
        let mut duplicate_keys: HashMap<&str, usize> = HashMap::new();
        let mut found_properties = BTreeSet::new();

        for (idx, check) in self.checks.iter().enumerate() {
            let mut used = check.name.as_str();
            let mut value = properties.get(&check.name);
            for alias in &check.aliases {
                if value.is_some() {
                    duplicate_keys.insert(alias, idx);
                } else if let Some(v) = properties.get(alias) {
                    value = Some(v);
                    used = alias;
                }
            }
            allowed_keys.insert(used.to_string());

            let Some(value) = value else {
                if check.required {
                    problems.push(format!(
                        "property {:?} is required but not provided",
                        nice_name(&check.name, used)
                    ));
                }
                continue;
            };
            found_properties.insert(check.name.clone());

            if value.is_empty() && !check.allow_empty {
                if check.required {
                    problems.push(format!(
                        "property {:?} is required but empty",
                        nice_name(&check.name, used)
                    ));
                } else {
                    problems.push(format!(
                        "property {:?} is empty (please set non-empty value or drop the property)",
                        nice_name(&check.name, used)
                    ));
                }
                continue;
            }

            for validator in &check.validators {
                if let Err(reason) = validator(value) {
                    let mut msg = if check.hide {
                        format!(
                            "validation failed for property {}: {reason}",
                            nice_name(&check.name, used)
                        )
                    } else {
                        format!(
                            "validation failed for property {} with value {value:?}: {reason}",
                            nice_name(&check.name, used)
                        )
                    };
                    if check.hide && !value.is_empty() {
                        msg = msg.replace(value.as_str(), "(hidden)");
                    }
                    problems.push(msg);
                    break;
                }
            }
        }

        for (key, value) in properties {
            if allowed_keys.contains(key) {
                continue;
            }
            match duplicate_keys.get(key.as_str()) {
                Some(&idx) => {
                    let check = &self.checks[idx];
                    let mismatching = std::iter::once(&check.name)
                        .chain(check.aliases.iter())
                        .filter_map(|k| properties.get(k))
                        .any(|v| v != value);
                    if mismatching {
                        problems.push(format!(
                            "property {key:?} is defined multiple times by an alias of {}",
                            check.name_and_aliases()
                        ));
                    }
                }
                None => problems.push(format!("property {key:?} is not allowed")),
            }
        }

        if let Some(problem) = self.validate_disjunct_sets(&found_properties) {
            problems.push(problem);
        }

        if problems.is_empty() {
            Ok(())
        } else {
            Err(ValidationError {
                provider_type: provider_type.to_string(),
                problems,
            })
        }
    }

    fn validate_disjunct_sets(&self, found: &BTreeSet<String>) -> Option<String> {
        if self.disjunct_property_sets.is_empty() {
            return None;
        }
        let mut valid = 0;
        let mut partial = 0;
        for set in &self.disjunct_property_sets {
            let count = set.iter().filter(|name| found.contains(*name)).count();
            if count == set.len() {
                valid += 1;
            } else if count > 0 {
                partial += 1;
            }
        }
        if valid == 1 && partial == 0 {
            return None;
        }
        let sets: Vec<String> = self
            .disjunct_property_sets
            .iter()
            .map(|set| {
                let names: Vec<String> = set
                    .iter()
                    .map(|name| {
                        self.checks
                            .iter()
                            .find(|c| &c.name == name)
                            .map_or_else(|| name.clone(), PropertyCheck::name_and_aliases)
                    })
                    .collect();
                format!("[{}]", names.join(", "))
            })
            .collect();
        Some(format!(
            "at least one of the disjunct property sets must be fully provided: {}",
            sets.join(" or ")
        ))
    }
}

/// Validates provider inputs before a handler is built.
pub trait DnsHandlerAdapter: Send + Sync {
    fn provider_type(&self) -> &str;

    /// Checks secret properties and provider configuration without network calls.
    ///
    /// # Errors
    ///
    /// Returns the aggregated validation problems.
    fn validate_credentials_and_provider_config(
        &self,
        properties: &Properties,
        provider_config: Option<&serde_json::Value>,
    ) -> Result<(), DnsError>;
}

/// Validates provider configuration, returns a problem description on failure.
pub type ProviderConfigValidator =
    Arc<dyn Fn(&serde_json::Value) -> Result<(), String> + Send + Sync>;

/// Adapter backed by [`DnsHandlerAdapterChecks`].
#[derive(Clone)]
pub struct ChecksAdapter {
    provider_type: String,
    checks: DnsHandlerAdapterChecks,
    provider_config_validator: Option<ProviderConfigValidator>,
}

impl ChecksAdapter {
    pub fn new(provider_type: impl Into<String>, checks: DnsHandlerAdapterChecks) -> Self {
        Self {
            provider_type: provider_type.into(),
            checks,
            provider_config_validator: None,
        }
    }

    #[must_use]
    pub fn with_provider_config_validator(mut self, validator: ProviderConfigValidator) -> Self {
        self.provider_config_validator = Some(validator);
        self
    }
}

impl DnsHandlerAdapter for ChecksAdapter {
    fn provider_type(&self) -> &str {
        &self.provider_type
    }

    fn validate_credentials_and_provider_config(
        &self,
        properties: &Properties,
        provider_config: Option<&serde_json::Value>,
    ) -> Result<(), DnsError> {
        let mut problems = match self.checks.validate_properties(&self.provider_type, properties) {
            Ok(()) => Vec::new(),
            Err(err) => err.problems,
        };
        if let (Some(validator), Some(config)) = (&self.provider_config_validator, provider_config) {
            if let Err(problem) = validator(config) {
                problems.push(format!("invalid provider config: {problem}"));
            }
        }
        if problems.is_empty() {
            Ok(())
        } else {
            Err(ValidationError {
                provider_type: self.provider_type.clone(),
                problems,
            }
            .into())
        }
    }
}

#[cfg(test)]
#[path = "checks_tests.rs"]
mod checks_tests;
