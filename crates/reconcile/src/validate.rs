//! Name validation against cloud-provider constraints.
//!
//! Each cloud provider restricts application names with a pattern and a
//! length limit. The limits mirror Orca's application name validator. The
//! table is built once and handed to a [`Validator`], which compiles every
//! pattern up front.
//!
//! ```
//! use reconcile::{ConstraintSet, Validator};
//!
//! let validator = Validator::new(&ConstraintSet::builtin()).unwrap();
//! assert!(validator.validate("demo", "kubernetes").is_ok());
//! assert!(validator.validate("Invalid Name!", "kubernetes").is_err());
//! ```

use regex::Regex;
use std::collections::BTreeMap;

use crate::error::ValidationError;

/// Pattern and length limit for one provider.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NameConstraint {
    /// Maximum name length in characters.
    pub max_length: usize,
    /// Pattern the whole name must match.
    pub pattern: String,
}

/// Immutable provider tag to constraint table.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConstraintSet {
    constraints: BTreeMap<String, NameConstraint>,
}

impl ConstraintSet {
    /// Empty table.
    pub fn new() -> Self {
        Self::default()
    }

    /// The constraints Spinnaker applies per provider.
    pub fn builtin() -> Self {
        Self::new()
            .with("appengine", 58, r"^[a-z0-9]*$")
            .with("aws", 250, r"^[a-zA-Z_0-9.]*$")
            .with("dcos", 127, r"^[a-z0-9]*$")
            .with("kubernetes", 63, r"^([a-zA-Z][a-zA-Z0-9-]*)$")
            .with("gce", 63, r"^([a-zA-Z][a-zA-Z0-9]*)?$")
            .with("openstack", 250, r"^[a-zA-Z_0-9.]*$")
            .with("tencentcloud", 50, r"^[a-zA-Z_0-9.\x{4e00}-\x{9fa5}-]*$")
            .with("titus", 250, r"^[a-zA-Z_0-9.]*$")
    }

    /// Add or replace a provider constraint.
    #[must_use]
    pub fn with(mut self, provider: &str, max_length: usize, pattern: &str) -> Self {
        self.constraints.insert(
            provider.to_string(),
            NameConstraint {
                max_length,
                pattern: pattern.to_string(),
            },
        );
        self
    }

    /// Constraint for a provider.
    pub fn get(&self, provider: &str) -> Option<&NameConstraint> {
        self.constraints.get(provider)
    }

    /// Known provider tags, sorted.
    pub fn providers(&self) -> impl Iterator<Item = &str> {
        self.constraints.keys().map(String::as_str)
    }
}

#[derive(Debug, Clone)]
struct CompiledConstraint {
    max_length: usize,
    pattern: String,
    regex: Regex,
}

/// Validates names against a [`ConstraintSet`].
#[derive(Debug, Clone)]
pub struct Validator {
    rules: BTreeMap<String, CompiledConstraint>,
}

impl Validator {
    /// Compile every pattern in the set.
    pub fn new(constraints: &ConstraintSet) -> Result<Self, ValidationError> {
        let rules = constraints
            .constraints
            .iter()
            .map(|(provider, constraint)| {
                let regex = Regex::new(&constraint.pattern).map_err(|e| {
                    ValidationError::InvalidPattern {
                        provider: provider.clone(),
                        message: e.to_string(),
                    }
                })?;
                Ok((
                    provider.clone(),
                    CompiledConstraint {
                        max_length: constraint.max_length,
                        pattern: constraint.pattern.clone(),
                        regex,
                    },
                ))
            })
            .collect::<Result<_, ValidationError>>()?;

        Ok(Self { rules })
    }

    /// Validate a name for one provider.
    ///
    /// The pattern is checked before the length.
    pub fn validate(&self, name: &str, provider: &str) -> Result<(), ValidationError> {
        let rule = self
            .rules
            .get(provider)
            .ok_or_else(|| ValidationError::UnsupportedProvider {
                provider: provider.to_string(),
            })?;

        if !rule.regex.is_match(name) {
            return Err(ValidationError::NamePatternMismatch {
                name: name.to_string(),
                provider: provider.to_string(),
                pattern: rule.pattern.clone(),
            });
        }

        let length = name.chars().count();
        if length > rule.max_length {
            return Err(ValidationError::NameTooLong {
                name: name.to_string(),
                provider: provider.to_string(),
                length,
                max: rule.max_length,
            });
        }

        Ok(())
    }

    /// Validate a name for every provider; the first failure wins.
    pub fn validate_all<S: AsRef<str>>(
        &self,
        name: &str,
        providers: &[S],
    ) -> Result<(), ValidationError> {
        providers
            .iter()
            .try_for_each(|provider| self.validate(name, provider.as_ref()))
    }

    /// Validate an application name.
    ///
    /// With declared providers the provider rules apply; without any, the
    /// name must be a plain identifier.
    pub fn validate_application<S: AsRef<str>>(
        &self,
        name: &str,
        providers: &[S],
    ) -> Result<(), ValidationError> {
        if name.is_empty() {
            return Err(ValidationError::EmptyName);
        }
        if providers.is_empty() {
            validate_identifier(name)
        } else {
            self.validate_all(name, providers)
        }
    }
}

/// Validate a provider-agnostic identifier: ASCII alphanumerics and `-`.
pub fn validate_identifier(name: &str) -> Result<(), ValidationError> {
    if name.is_empty() {
        return Err(ValidationError::EmptyName);
    }
    if !name.chars().all(|c| c.is_ascii_alphanumeric() || c == '-') {
        return Err(ValidationError::InvalidIdentifier {
            name: name.to_string(),
        });
    }
    Ok(())
}
