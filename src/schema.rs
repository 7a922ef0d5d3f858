//! Versioned option schema as published by the format service's `/doc` endpoint
//!
//! The schema is parsed once and never mutated afterwards. Each version maps
//! option names to an [`OptionSpec`] describing the value type, the allowed
//! values for enumerations, and the upstream documentation string.

use std::collections::HashMap;

use indexmap::IndexMap;
use serde_json::Value;
use tracing::{debug, warn};

use crate::constants::options::{DEFAULT_SENTINEL, FALSE, TRUE};
use crate::error::SchemaError;

/// Opaque identifier of a clang-format release
pub type VersionId = String;

/// Value type of a single option
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OptionType {
    Bool,
    String,
    StringList,
    Int,
    UInt,
    /// One of a fixed list of values
    EnumSet,
}

impl OptionType {
    /// Map the service's C++ type names onto the closed set of kinds
    fn from_wire(type_name: &str) -> Option<Self> {
        match type_name {
            "bool" => Some(Self::Bool),
            "std::string" | "string" => Some(Self::String),
            "std::vector<std::string>" => Some(Self::StringList),
            "int" => Some(Self::Int),
            "unsigned" => Some(Self::UInt),
            _ => None,
        }
    }
}

/// Form control generated for an option
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ControlKind {
    /// Drop-down; the first entry is always the default sentinel
    Select(Vec<String>),
    /// Free text, empty means default
    Text,
    /// Numeric text input with an optional lower bound
    Number { min: Option<i64> },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OptionSpec {
    pub kind: OptionType,
    pub allowed_values: Vec<String>,
    pub documentation: String,
}

impl OptionSpec {
    /// Control used to edit this option
    pub fn control(&self) -> ControlKind {
        match self.kind {
            OptionType::EnumSet => {
                let mut choices = vec![DEFAULT_SENTINEL.to_string()];
                choices.extend(self.allowed_values.iter().cloned());
                ControlKind::Select(choices)
            }
            OptionType::Bool => ControlKind::Select(vec![
                DEFAULT_SENTINEL.to_string(),
                TRUE.to_string(),
                FALSE.to_string(),
            ]),
            OptionType::String | OptionType::StringList => ControlKind::Text,
            OptionType::Int => ControlKind::Number { min: None },
            OptionType::UInt => ControlKind::Number { min: Some(0) },
        }
    }

    fn from_json(version: &str, name: &str, raw: &Value) -> Result<Self, SchemaError> {
        let obj = raw.as_object().ok_or_else(|| {
            SchemaError::Format(format!("option {name} in version {version} is not an object"))
        })?;

        let documentation = obj
            .get("doc")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string();
        let type_name = obj.get("type").and_then(Value::as_str).unwrap_or_default();

        // An `options` array wins over the declared type, whatever it is
        if let Some(values) = obj.get("options").and_then(Value::as_array) {
            let allowed_values = values
                .iter()
                .map(|v| match v {
                    Value::String(s) => s.clone(),
                    other => other.to_string(),
                })
                .collect();
            return Ok(Self {
                kind: OptionType::EnumSet,
                allowed_values,
                documentation,
            });
        }

        let kind = OptionType::from_wire(type_name).unwrap_or_else(|| {
            warn!(option = %name, version = %version, type_name = %type_name, "Unrecognised option type, editing as text");
            OptionType::String
        });

        Ok(Self {
            kind,
            allowed_values: Vec::new(),
            documentation,
        })
    }
}

/// All options for all published versions
#[derive(Debug, Clone, PartialEq)]
pub struct OptionSchema {
    versions: Vec<VersionId>,
    /// Per version, in the order the service lists them
    options: HashMap<VersionId, IndexMap<String, OptionSpec>>,
}

impl OptionSchema {
    /// Parse the `/doc` payload
    pub fn from_json(doc: &Value) -> Result<Self, SchemaError> {
        let root = doc
            .as_object()
            .ok_or_else(|| SchemaError::Format("schema root is not an object".to_string()))?;

        let versions: Vec<VersionId> = root
            .get("versions")
            .and_then(Value::as_array)
            .ok_or_else(|| SchemaError::Format("missing 'versions' list".to_string()))?
            .iter()
            .map(|v| {
                v.as_str()
                    .map(str::to_string)
                    .ok_or_else(|| SchemaError::Format(format!("version entry {v} is not a string")))
            })
            .collect::<Result<_, _>>()?;

        if versions.is_empty() {
            return Err(SchemaError::Format("'versions' list is empty".to_string()));
        }

        let mut options = HashMap::with_capacity(versions.len());
        for version in &versions {
            let entry = root
                .get(version)
                .and_then(Value::as_object)
                .ok_or_else(|| SchemaError::Format(format!("version {version} has no option table")))?;

            if entry.is_empty() {
                return Err(SchemaError::Format(format!("version {version} defines no options")));
            }

            let specs = entry
                .iter()
                .map(|(name, raw)| Ok((name.clone(), OptionSpec::from_json(version, name, raw)?)))
                .collect::<Result<IndexMap<_, _>, SchemaError>>()?;

            debug!(version = %version, count = specs.len(), "Parsed option table");
            options.insert(version.clone(), specs);
        }

        Ok(Self { versions, options })
    }

    /// Versions in publication order
    pub fn versions(&self) -> &[VersionId] {
        &self.versions
    }

    pub fn contains_version(&self, version: &str) -> bool {
        self.options.contains_key(version)
    }

    /// Fallback version when nothing valid was persisted
    pub fn first_version(&self) -> &str {
        // from_json rejects an empty list
        &self.versions[0]
    }

    pub fn options_for(&self, version: &str) -> Option<&IndexMap<String, OptionSpec>> {
        self.options.get(version)
    }

    pub fn spec(&self, version: &str, option: &str) -> Option<&OptionSpec> {
        self.options.get(version).and_then(|specs| specs.get(option))
    }
}
