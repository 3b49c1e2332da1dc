// ── Test function types ──
//
// A test function is addressed by assembly, class, and method signature.
// The picker keys it by the full triple so same-named methods in
// different classes stay distinct.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Composite identifier of a test function.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct TestFunctionKey {
    pub assembly: String,
    pub class: String,
    pub method: String,
}

impl fmt::Display for TestFunctionKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}:{}", self.assembly, self.class, self.method)
    }
}

/// A test function offered by the editor plugin or a pasted export.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TestFunction {
    pub key: TestFunctionKey,
    /// Hub-side row id, when the function was loaded from a saved config.
    pub id: Option<u64>,
}

impl TestFunction {
    pub fn new(
        assembly: impl Into<String>,
        class: impl Into<String>,
        method: impl Into<String>,
    ) -> Self {
        Self {
            key: TestFunctionKey {
                assembly: assembly.into(),
                class: class.into(),
                method: method.into(),
            },
            id: None,
        }
    }

    /// Short label: last `.` segment of the class, then the last
    /// space-separated segment of the method signature.
    ///
    /// `Game.Tests.LoginTests` + `System.Void Succeeds()` renders as
    /// `LoginTests Succeeds()`.
    pub fn display_name(&self) -> String {
        let class = self.key.class.rsplit('.').next().unwrap_or_default();
        let method = self.key.method.rsplit(' ').next().unwrap_or_default();
        format!("{class} {method}")
    }
}
