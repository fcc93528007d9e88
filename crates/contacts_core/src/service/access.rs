//! Permission checks consumed by the CRUD service.
//!
//! Tokens come from the registry (`ViewPermissions`); the policy only
//! answers whether the current caller holds one.

use std::collections::BTreeSet;

/// Decides whether the caller holds a permission token.
pub trait AccessPolicy: Send + Sync {
    fn allows(&self, token: &str) -> bool;
}

/// Grants every token. Used for trusted in-process callers.
#[derive(Debug, Clone, Copy, Default)]
pub struct AllowAll;

impl AccessPolicy for AllowAll {
    fn allows(&self, _token: &str) -> bool {
        true
    }
}

/// Grants exactly the tokens it was built with.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TokenPolicy {
    granted: BTreeSet<String>,
}

impl TokenPolicy {
    pub fn new<I, S>(tokens: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            granted: tokens.into_iter().map(Into::into).collect(),
        }
    }

    /// Read-only access to every built-in view.
    pub fn read_only() -> Self {
        Self::new([crate::schema::ViewPermissions::CONTACT.read])
    }

    pub fn grant(&mut self, token: impl Into<String>) {
        self.granted.insert(token.into());
    }

    pub fn revoke(&mut self, token: &str) -> bool {
        self.granted.remove(token)
    }
}

impl AccessPolicy for TokenPolicy {
    fn allows(&self, token: &str) -> bool {
        self.granted.contains(token)
    }
}
