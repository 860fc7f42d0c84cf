//! Static permission-scope catalog and matching rules.
//!
//! Scopes follow the `resource:action` grammar with a per-resource wildcard
//! `resource:*`. The catalog is immutable; key creation validates requested
//! scopes against it, and the catalog metadata backs the key-creation UI.

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::error::GatewayError;

/// Resources that API-key scopes can gate.
const SCOPE_RESOURCES: &[&str] = &[
    "tournaments",
    "quizzes",
    "questions",
    "players",
    "users",
    "api_keys",
    "webhooks",
];

/// Actions available on each resource.
const SCOPE_ACTIONS: &[&str] = &["read", "write"];

/// A validated permission scope.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(transparent)]
pub struct Scope(String);

impl Scope {
    /// Parse and validate a scope string against the catalog.
    pub fn parse(s: &str) -> Result<Self, GatewayError> {
        let Some((resource, action)) = s.split_once(':') else {
            return Err(GatewayError::UnknownScope(s.to_string()));
        };
        if !SCOPE_RESOURCES.contains(&resource) {
            return Err(GatewayError::UnknownScope(s.to_string()));
        }
        if action != "*" && !SCOPE_ACTIONS.contains(&action) {
            return Err(GatewayError::UnknownScope(s.to_string()));
        }
        Ok(Self(s.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Resource part of the scope.
    pub fn resource(&self) -> &str {
        self.0.split(':').next().unwrap_or(&self.0)
    }

    /// Whether this scope is a per-resource wildcard.
    pub fn is_wildcard(&self) -> bool {
        self.0.ends_with(":*")
    }

    /// Whether this granted scope satisfies a required scope.
    ///
    /// Exact match, or wildcard match when this scope is `resource:*` for the
    /// required scope's resource.
    pub fn satisfies(&self, required: &Scope) -> bool {
        self == required || (self.is_wildcard() && self.resource() == required.resource())
    }
}

impl std::fmt::Display for Scope {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Catalog metadata for one scope, exposed to key-creation UIs.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct ScopeInfo {
    pub scope: String,
    pub display_name: String,
    pub description: String,
}

/// The full scope catalog: every `resource:action` pair plus the wildcard
/// entry for each resource.
pub fn scope_catalog() -> Vec<ScopeInfo> {
    let mut catalog = Vec::new();
    for resource in SCOPE_RESOURCES {
        for action in SCOPE_ACTIONS {
            catalog.push(ScopeInfo {
                scope: format!("{resource}:{action}"),
                display_name: format!("{} {}", capitalize(action), resource.replace('_', " ")),
                description: match *action {
                    "read" => format!("Read access to {}", resource.replace('_', " ")),
                    _ => format!("Create, update, and delete {}", resource.replace('_', " ")),
                },
            });
        }
        catalog.push(ScopeInfo {
            scope: format!("{resource}:*"),
            display_name: format!("All {} actions", resource.replace('_', " ")),
            description: format!("Full access to {}", resource.replace('_', " ")),
        });
    }
    catalog
}

/// Parse a list of scope strings, rejecting empties, duplicates tolerated.
pub fn parse_scopes(scopes: &[String]) -> Result<Vec<Scope>, GatewayError> {
    if scopes.is_empty() {
        return Err(GatewayError::Validation(
            "At least one scope is required".to_string(),
        ));
    }
    scopes.iter().map(|s| Scope::parse(s)).collect()
}

/// Whether any granted scope satisfies the required scope.
pub fn is_authorized(granted: &[Scope], required: &Scope) -> bool {
    granted.iter().any(|g| g.satisfies(required))
}

fn capitalize(s: &str) -> String {
    let mut chars = s.chars();
    match chars.next() {
        Some(c) => c.to_uppercase().collect::<String>() + chars.as_str(),
        None => String::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_valid_scope() {
        assert!(Scope::parse("tournaments:read").is_ok());
        assert!(Scope::parse("users:write").is_ok());
        assert!(Scope::parse("webhooks:*").is_ok());
    }

    #[test]
    fn test_parse_rejects_unknown_resource() {
        assert!(Scope::parse("brackets:read").is_err());
    }

    #[test]
    fn test_parse_rejects_unknown_action() {
        assert!(Scope::parse("tournaments:delete").is_err());
    }

    #[test]
    fn test_parse_rejects_missing_colon() {
        assert!(Scope::parse("tournaments").is_err());
        assert!(Scope::parse("").is_err());
    }

    #[test]
    fn test_exact_match_satisfies() {
        let granted = Scope::parse("tournaments:read").unwrap();
        let required = Scope::parse("tournaments:read").unwrap();
        assert!(granted.satisfies(&required));
    }

    #[test]
    fn test_wildcard_satisfies_same_resource() {
        let granted = Scope::parse("tournaments:*").unwrap();
        assert!(granted.satisfies(&Scope::parse("tournaments:read").unwrap()));
        assert!(granted.satisfies(&Scope::parse("tournaments:write").unwrap()));
    }

    #[test]
    fn test_wildcard_does_not_cross_resources() {
        let granted = Scope::parse("tournaments:*").unwrap();
        assert!(!granted.satisfies(&Scope::parse("quizzes:read").unwrap()));
    }

    #[test]
    fn test_narrow_scope_does_not_satisfy_other_action() {
        let granted = Scope::parse("tournaments:read").unwrap();
        assert!(!granted.satisfies(&Scope::parse("tournaments:write").unwrap()));
    }

    #[test]
    fn test_is_authorized_over_set() {
        let granted = vec![
            Scope::parse("quizzes:read").unwrap(),
            Scope::parse("tournaments:*").unwrap(),
        ];
        assert!(is_authorized(
            &granted,
            &Scope::parse("tournaments:write").unwrap()
        ));
        assert!(!is_authorized(
            &granted,
            &Scope::parse("quizzes:write").unwrap()
        ));
    }

    #[test]
    fn test_parse_scopes_rejects_empty_set() {
        assert!(parse_scopes(&[]).is_err());
    }

    #[test]
    fn test_catalog_contains_wildcards_and_pairs() {
        let catalog = scope_catalog();
        assert!(catalog.iter().any(|s| s.scope == "tournaments:read"));
        assert!(catalog.iter().any(|s| s.scope == "tournaments:*"));
        // Every catalog entry must itself parse.
        for info in &catalog {
            assert!(Scope::parse(&info.scope).is_ok(), "bad entry {}", info.scope);
        }
    }
}
