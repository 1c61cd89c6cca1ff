use std::borrow::Cow;

use serde::{Deserialize, Serialize};

/// Permission identifier, e.g. `"admin.reports"`.
///
/// `"*"` grants everything; a trailing `".*"` grants a whole namespace
/// (`"admin.*"` covers `"admin.reports"`).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Permission(Cow<'static, str>);

impl Permission {
    pub const fn from_static(name: &'static str) -> Self {
        Self(Cow::Borrowed(name))
    }

    pub fn new(name: impl Into<Cow<'static, str>>) -> Self {
        Self(name.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_wildcard(&self) -> bool {
        self.as_str() == "*"
    }

    /// Whether holding `self` satisfies a requirement for `required`.
    pub fn grants(&self, required: &Permission) -> bool {
        if self.is_wildcard() || self == required {
            return true;
        }
        match self.as_str().strip_suffix(".*") {
            Some(ns) => required
                .as_str()
                .strip_prefix(ns)
                .is_some_and(|rest| rest.starts_with('.')),
            None => false,
        }
    }
}

impl core::fmt::Display for Permission {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(&self.0)
    }
}
