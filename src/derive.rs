//! Projection of form state onto the minimal wire configuration
//!
//! Only explicitly set options survive; anything unset or equal to the
//! `Default` sentinel is left out so the service applies its own default.

use std::collections::BTreeMap;

use serde_json::Value;

use crate::constants::editor::{
    COLUMN_LIMIT_OPTION, DEFAULT_COLUMN_LIMIT, DEFAULT_TAB_WIDTH, TAB_WIDTH_OPTION,
};
use crate::constants::options::{DEFAULT_SENTINEL, LIST_SEPARATOR};
use crate::error::UnknownOptionError;
use crate::schema::{OptionSchema, OptionSpec, OptionType};
use crate::values::{OptionValue, OptionValueMap};

/// Option name to wire string, ordered for stable output
pub type WireConfig = BTreeMap<String, String>;

/// Compute the wire config for `version` from the current option values
pub fn derive(
    version: &str,
    values: &OptionValueMap,
    schema: &OptionSchema,
) -> Result<WireConfig, UnknownOptionError> {
    let specs = schema.options_for(version).ok_or_else(|| UnknownOptionError {
        version: version.to_string(),
    })?;

    let mut wire = WireConfig::new();
    for (name, spec) in specs {
        let Some(value) = values.get(name) else {
            continue;
        };
        if value.is_unset() {
            continue;
        }
        let serialized = serialize_value(spec, value);
        if serialized.is_empty() || serialized == DEFAULT_SENTINEL {
            continue;
        }
        wire.insert(name.clone(), serialized);
    }
    Ok(wire)
}

/// Rebuild option values from a wire config
pub fn derive_inverse(
    version: &str,
    wire: &WireConfig,
    schema: &OptionSchema,
) -> Result<OptionValueMap, UnknownOptionError> {
    let specs = schema.options_for(version).ok_or_else(|| UnknownOptionError {
        version: version.to_string(),
    })?;

    Ok(wire
        .iter()
        .filter_map(|(name, raw)| {
            let spec = specs.get(name)?;
            let value = match spec.kind {
                OptionType::StringList => {
                    OptionValue::List(OptionValue::text(raw.as_str()).list_items())
                }
                _ => OptionValue::text(raw.as_str()),
            };
            Some((name.clone(), value))
        })
        .collect())
}

/// JSON object string sent as the `config` form field
pub fn wire_json(wire: &WireConfig) -> String {
    Value::Object(
        wire.iter()
            .map(|(k, v)| (k.clone(), Value::String(v.clone())))
            .collect(),
    )
    .to_string()
}

fn serialize_value(spec: &OptionSpec, value: &OptionValue) -> String {
    let separator = LIST_SEPARATOR.to_string();
    match spec.kind {
        OptionType::Bool => match value.as_canonical_bool() {
            Some(canonical) => canonical.to_string(),
            None => value.display().trim().to_string(),
        },
        OptionType::StringList => value.list_items().join(separator.as_str()),
        OptionType::String | OptionType::Int | OptionType::UInt | OptionType::EnumSet => {
            match value {
                OptionValue::Text(s) => s.trim().to_string(),
                OptionValue::List(_) => value.list_items().join(separator.as_str()),
            }
        }
    }
}

/// Editor presentation tied to the active config
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EditorHints {
    pub tab_width: usize,
    pub column_limit: usize,
}

impl EditorHints {
    pub fn from_wire(wire: &WireConfig) -> Self {
        let read = |key: &str, fallback: usize| {
            wire.get(key)
                .and_then(|v| v.parse::<usize>().ok())
                .filter(|v| *v > 0)
                .unwrap_or(fallback)
        };
        Self {
            tab_width: read(TAB_WIDTH_OPTION, DEFAULT_TAB_WIDTH),
            column_limit: read(COLUMN_LIMIT_OPTION, DEFAULT_COLUMN_LIMIT),
        }
    }
}

impl Default for EditorHints {
    fn default() -> Self {
        Self {
            tab_width: DEFAULT_TAB_WIDTH,
            column_limit: DEFAULT_COLUMN_LIMIT,
        }
    }
}
