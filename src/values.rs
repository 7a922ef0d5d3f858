//! Option values as bound to the generated form controls

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::constants::options::{DEFAULT_SENTINEL, FALSE, LIST_SEPARATOR, TRUE};

/// Scalar or list value of one option
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum OptionValue {
    Text(String),
    List(Vec<String>),
}

/// Explicitly set (non-default) options of one version
pub type OptionValueMap = BTreeMap<String, OptionValue>;

impl OptionValue {
    pub fn text(value: impl Into<String>) -> Self {
        Self::Text(value.into())
    }

    /// True when the value means "use the tool default"
    pub fn is_unset(&self) -> bool {
        match self {
            Self::Text(s) => {
                let s = s.trim();
                s.is_empty() || s == DEFAULT_SENTINEL
            }
            Self::List(items) => items.iter().all(|item| item.trim().is_empty()),
        }
    }

    /// String shown in a text control or matched against select choices
    pub fn display(&self) -> String {
        match self {
            Self::Text(s) => s.clone(),
            Self::List(items) => items.join(format!("{LIST_SEPARATOR} ").as_str()),
        }
    }

    /// Items of a list-typed option, accepting either representation
    pub fn list_items(&self) -> Vec<String> {
        let raw: Vec<&str> = match self {
            Self::Text(s) => s.split(LIST_SEPARATOR).collect(),
            Self::List(items) => items.iter().map(String::as_str).collect(),
        };
        raw.into_iter()
            .map(str::trim)
            .filter(|item| !item.is_empty())
            .map(str::to_string)
            .collect()
    }

    /// Canonical `true`/`false` spelling, if this reads as a boolean
    pub fn as_canonical_bool(&self) -> Option<&'static str> {
        match self {
            Self::Text(s) => match s.trim().to_ascii_lowercase().as_str() {
                "true" => Some(TRUE),
                "false" => Some(FALSE),
                _ => None,
            },
            Self::List(_) => None,
        }
    }
}
