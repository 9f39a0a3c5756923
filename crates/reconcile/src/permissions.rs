//! Permission set construction.
//!
//! Grants are declared per principal. Gate stores them per access level, so
//! they are inverted here into an ordered map of level to principals.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use crate::error::ValidationError;
use crate::types::PermissionGrant;

/// Access level on an application.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum AccessLevel {
    /// View the application.
    Read,
    /// Modify the application.
    Write,
    /// Trigger pipelines.
    Execute,
}

impl AccessLevel {
    /// Upper-case wire name.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Read => "READ",
            Self::Write => "WRITE",
            Self::Execute => "EXECUTE",
        }
    }
}

impl fmt::Display for AccessLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AccessLevel {
    type Err = ValidationError;

    /// Case-sensitive: `read` is rejected.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "READ" => Ok(Self::Read),
            "WRITE" => Ok(Self::Write),
            "EXECUTE" => Ok(Self::Execute),
            other => Err(ValidationError::UnsupportedAccessLevel {
                access: other.to_string(),
            }),
        }
    }
}

/// Canonical mapping of access level to principals.
///
/// Serializes as `{"READ": [...], "WRITE": [...]}` with only populated levels.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PermissionSet(BTreeMap<AccessLevel, Vec<String>>);

impl PermissionSet {
    /// Whether no level has any principal.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Principals holding a level, in declaration order.
    pub fn principals(&self, level: AccessLevel) -> &[String] {
        self.0.get(&level).map_or(&[], Vec::as_slice)
    }

    /// Iterate populated levels in order.
    pub fn iter(&self) -> impl Iterator<Item = (AccessLevel, &[String])> {
        self.0.iter().map(|(level, users)| (*level, users.as_slice()))
    }
}

/// Merge grants into a [`PermissionSet`].
///
/// Every access level of a grant is parsed before any of them is applied.
/// Grants with an empty principal are skipped.
pub fn build_permissions(grants: &[PermissionGrant]) -> Result<PermissionSet, ValidationError> {
    let mut levels: BTreeMap<AccessLevel, Vec<String>> = BTreeMap::new();

    for grant in grants {
        let parsed = grant
            .accesses
            .iter()
            .map(|access| access.parse::<AccessLevel>())
            .collect::<Result<Vec<_>, _>>()?;

        if grant.principal.is_empty() {
            continue;
        }

        for level in parsed {
            let principals = levels.entry(level).or_default();
            if principals.contains(&grant.principal) {
                return Err(ValidationError::DuplicatePermission {
                    principal: grant.principal.clone(),
                    access: level.to_string(),
                });
            }
            principals.push(grant.principal.clone());
        }
    }

    Ok(PermissionSet(levels))
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use serde_json::json;

    #[test]
    fn test_build_permissions_groups_by_level() {
        let grants = vec![
            PermissionGrant::new("ops", &["READ", "WRITE"]),
            PermissionGrant::new("dev", &["READ"]),
            PermissionGrant::new("ci", &["EXECUTE"]),
        ];
        let set = build_permissions(&grants).unwrap();

        assert_eq!(set.principals(AccessLevel::Read), ["ops", "dev"]);
        assert_eq!(set.principals(AccessLevel::Write), ["ops"]);
        assert_eq!(set.principals(AccessLevel::Execute), ["ci"]);
        assert_eq!(
            serde_json::to_value(&set).unwrap(),
            json!({"READ": ["ops", "dev"], "WRITE": ["ops"], "EXECUTE": ["ci"]})
        );
    }

    #[test]
    fn test_only_populated_levels_serialized() {
        let set = build_permissions(&[PermissionGrant::new("ops", &["WRITE"])]).unwrap();
        assert_eq!(serde_json::to_value(&set).unwrap(), json!({"WRITE": ["ops"]}));
    }

    #[test]
    fn test_unsupported_access_level() {
        let err = build_permissions(&[PermissionGrant::new("ops", &["ADMIN"])]).unwrap_err();
        assert_eq!(
            err,
            ValidationError::UnsupportedAccessLevel {
                access: "ADMIN".into()
            }
        );
    }

    #[test]
    fn test_access_level_is_case_sensitive() {
        assert!("read".parse::<AccessLevel>().is_err());
        assert_eq!("EXECUTE".parse::<AccessLevel>().unwrap(), AccessLevel::Execute);
    }

    #[test]
    fn test_duplicate_principal_rejected() {
        let grants = vec![
            PermissionGrant::new("ops", &["READ"]),
            PermissionGrant::new("ops", &["WRITE", "READ"]),
        ];
        let err = build_permissions(&grants).unwrap_err();
        assert_eq!(
            err,
            ValidationError::DuplicatePermission {
                principal: "ops".into(),
                access: "READ".into(),
            }
        );
    }

    #[test]
    fn test_invalid_level_rejected_before_any_applied() {
        // The bad level comes second, but nothing of this grant is applied.
        let grants = vec![PermissionGrant::new("ops", &["READ", "OWNER"])];
        assert!(matches!(
            build_permissions(&grants),
            Err(ValidationError::UnsupportedAccessLevel { .. })
        ));
    }

    #[test]
    fn test_empty_principal_skipped() {
        let grants = vec![
            PermissionGrant::new("", &["READ"]),
            PermissionGrant::new("", &["READ"]),
        ];
        let set = build_permissions(&grants).unwrap();
        assert!(set.is_empty());
    }

    #[test]
    fn test_empty_input() {
        assert!(build_permissions(&[]).unwrap().is_empty());
    }

    proptest! {
        #[test]
        fn prop_distinct_principals_all_land(names in proptest::collection::hash_set("[a-z]{1,8}", 1..10)) {
            let names: Vec<String> = names.into_iter().collect();
            let grants: Vec<PermissionGrant> = names
                .iter()
                .map(|n| PermissionGrant::new(n.clone(), &["READ", "EXECUTE"]))
                .collect();

            let set = build_permissions(&grants).unwrap();
            prop_assert_eq!(set.principals(AccessLevel::Read), names.as_slice());
            prop_assert_eq!(set.principals(AccessLevel::Execute), names.as_slice());
            prop_assert!(set.principals(AccessLevel::Write).is_empty());
        }

        #[test]
        fn prop_repeated_principal_always_fails(name in "[a-z]{1,8}", level in prop::sample::select(vec!["READ", "WRITE", "EXECUTE"])) {
            let grants = vec![
                PermissionGrant::new(name.clone(), &[level]),
                PermissionGrant::new(name, &[level]),
            ];
            let is_duplicate = matches!(
                build_permissions(&grants),
                Err(ValidationError::DuplicatePermission { .. })
            );
            prop_assert!(is_duplicate);
        }
    }
}
