//! Deterministic, salted, one-way pseudonyms for identifying names.
//!
//! `token = prefix(scope) + base64url(blake3(salt || "|" || value))[0..10]`
//!
//! The same `(salt, value)` always yields the same token, within a run and
//! across reruns. Ten encoded characters carry 60 bits, which is an accepted
//! collision risk for reporting and not a security boundary.

use base64::Engine as _;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use dashmap::DashMap;
use rand::Rng;
use rand::distr::Alphanumeric;
use serde::{Deserialize, Serialize};
use std::fmt;

const TOKEN_LEN: usize = 10;
const GENERATED_SALT_LEN: usize = 24;

/// Which kind of name is being replaced.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PseudonymScope {
    ResourceGroupName,
    ObjectName,
}

impl PseudonymScope {
    pub fn prefix(&self) -> &'static str {
        match self {
            Self::ResourceGroupName => "rg-",
            Self::ObjectName => "obj-",
        }
    }
}

/// Which scopes the operator asked to anonymize.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AnonymizeScope {
    #[default]
    None,
    ResourceGroups,
    Objects,
    All,
}

impl AnonymizeScope {
    /// Parse from string (case-insensitive, `-`/`_` tolerant).
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_lowercase().replace('-', "_").as_str() {
            "none" | "off" => Some(Self::None),
            "resource_groups" | "resourcegroups" | "rg" => Some(Self::ResourceGroups),
            "objects" | "object_names" => Some(Self::Objects),
            "all" => Some(Self::All),
            _ => None,
        }
    }

    pub fn enables(&self, scope: PseudonymScope) -> bool {
        match (self, scope) {
            (Self::All, _) => true,
            (Self::ResourceGroups, PseudonymScope::ResourceGroupName) => true,
            (Self::Objects, PseudonymScope::ObjectName) => true,
            _ => false,
        }
    }

    pub fn is_active(&self) -> bool {
        !matches!(self, Self::None)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::None => "none",
            Self::ResourceGroups => "resource-groups",
            Self::Objects => "objects",
            Self::All => "all",
        }
    }
}

impl fmt::Display for AnonymizeScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Compute a token without caching.
pub fn pseudonymize(scope: PseudonymScope, value: &str, salt: &str) -> String {
    let mut hasher = blake3::Hasher::new();
    hasher.update(salt.as_bytes());
    hasher.update(b"|");
    hasher.update(value.as_bytes());
    let digest = hasher.finalize();
    let encoded = URL_SAFE_NO_PAD.encode(digest.as_bytes());
    format!("{}{}", scope.prefix(), &encoded[..TOKEN_LEN])
}

/// Random alphanumeric salt for runs that did not supply one.
pub fn generate_salt() -> String {
    rand::rng()
        .sample_iter(&Alphanumeric)
        .take(GENERATED_SALT_LEN)
        .map(char::from)
        .collect()
}

/// Memoizing pseudonymizer bound to one run's scope and salt.
///
/// The cache lives in memory only. `Debug` prints neither the
/// salt nor cached entries.
pub struct Pseudonymizer {
    scope: AnonymizeScope,
    salt: String,
    generated: bool,
    cache: DashMap<(PseudonymScope, String), String>,
}

impl Pseudonymizer {
    /// Build for a run. When anonymization is active and no salt was given, a
    /// random one is generated and must be surfaced to the operator.
    pub fn new(scope: AnonymizeScope, salt: Option<&str>) -> Self {
        let supplied = salt.filter(|s| !s.is_empty());
        let (salt, generated) = match supplied {
            Some(s) => (s.to_string(), false),
            None if scope.is_active() => (generate_salt(), true),
            None => (String::new(), false),
        };
        Self {
            scope,
            salt,
            generated,
            cache: DashMap::new(),
        }
    }

    pub fn disabled() -> Self {
        Self::new(AnonymizeScope::None, None)
    }

    pub fn scope(&self) -> AnonymizeScope {
        self.scope
    }

    /// Salt generated for this run, if the operator did not supply one.
    pub fn generated_salt(&self) -> Option<&str> {
        self.generated.then_some(self.salt.as_str())
    }

    /// Replace `value` when `scope` is enabled; otherwise return it unchanged.
    pub fn apply(&self, scope: PseudonymScope, value: &str) -> String {
        if !self.scope.enables(scope) {
            return value.to_string();
        }
        self.memoized(scope, value)
    }

    fn memoized(&self, scope: PseudonymScope, value: &str) -> String {
        if let Some(token) = self.cache.get(&(scope, value.to_string())) {
            return token.clone();
        }
        self.cache
            .entry((scope, value.to_string()))
            .or_insert_with(|| pseudonymize(scope, value, &self.salt))
            .clone()
    }

    pub fn apply_opt(&self, scope: PseudonymScope, value: Option<&str>) -> Option<String> {
        value.map(|v| self.apply(scope, v))
    }

    /// Replace a full provider identity. Identities embed both the resource
    /// group and the object name, so any active scope replaces the whole path.
    pub fn apply_identity(&self, identity: &str) -> String {
        if !self.scope.is_active() {
            return identity.to_string();
        }
        self.memoized(PseudonymScope::ObjectName, identity)
    }

    /// Number of distinct names replaced so far.
    pub fn cached(&self) -> usize {
        self.cache.len()
    }
}

impl fmt::Debug for Pseudonymizer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Pseudonymizer")
            .field("scope", &self.scope)
            .field("generated_salt", &self.generated)
            .field("cached", &self.cache.len())
            .finish()
    }
}
