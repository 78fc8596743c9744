use std::collections::BTreeSet;

use serde::Serialize;

pub const PRODUCTS_READ: &str = "products:read";
pub const PRODUCTS_WRITE: &str = "products:write";
pub const EMPLOYEES_WRITE: &str = "employees:write";
pub const PERMISSIONS_WRITE: &str = "permissions:write";

/// Codes the permission catalogue is seeded with.
pub const KNOWN_PERMISSIONS: &[&str] =
    &[PRODUCTS_READ, PRODUCTS_WRITE, EMPLOYEES_WRITE, PERMISSIONS_WRITE];

/// Codes granted to one employee. Membership only; order carries no meaning.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct PermissionSet(BTreeSet<String>);

impl PermissionSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn include(&self, code: &str) -> bool {
        self.0.contains(code)
    }

    pub fn insert(&mut self, code: impl Into<String>) -> bool {
        self.0.insert(code.into())
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.0.iter().map(String::as_str)
    }
}

impl<S: Into<String>> FromIterator<S> for PermissionSet {
    fn from_iter<I: IntoIterator<Item = S>>(iter: I) -> Self {
        Self(iter.into_iter().map(Into::into).collect())
    }
}
