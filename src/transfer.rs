//! `.clang-format` import and export
//!
//! Import turns YAML text into an option map for the reconciler. Export
//! writes the authoritative option map back out, typed per the schema.

use anyhow::Result;
use serde_yaml::{Mapping, Number, Value};
use tracing::warn;

use crate::constants::export::{DOCUMENT_END, DOCUMENT_START};
use crate::constants::options::TRUE;
use crate::error::{ImportParseError, UnknownOptionError};
use crate::schema::{OptionSchema, OptionType};
use crate::values::{OptionValue, OptionValueMap};

/// Parse a `.clang-format` style YAML document into option values
pub fn parse_import(contents: &str) -> Result<OptionValueMap, ImportParseError> {
    // Framing markers and comments only: nothing to import
    let blank = contents.lines().map(str::trim).all(|line| {
        matches!(line, "" | "---" | "...") || line.starts_with('#')
    });
    if blank {
        return Ok(OptionValueMap::new());
    }
    let document: Value = serde_yaml::from_str(contents)?;

    let mapping = match document {
        Value::Null => return Ok(OptionValueMap::new()),
        Value::Mapping(mapping) => mapping,
        Value::Sequence(_) => return Err(ImportParseError::NotAMapping("a list")),
        Value::Tagged(_) => return Err(ImportParseError::NotAMapping("a tagged value")),
        _ => return Err(ImportParseError::NotAMapping("a single value")),
    };

    let mut values = OptionValueMap::new();
    for (key, value) in mapping {
        let Some(name) = scalar_text(&key) else {
            warn!(key = ?key, "Skipping non-scalar key in imported file");
            continue;
        };
        match value {
            Value::Null => {}
            Value::Sequence(items) => {
                let items = items.iter().filter_map(scalar_text).collect();
                values.insert(name, OptionValue::List(items));
            }
            Value::Mapping(_) | Value::Tagged(_) => {
                warn!(option = %name, "Skipping nested value in imported file");
            }
            scalar => {
                if let Some(text) = scalar_text(&scalar) {
                    values.insert(name, OptionValue::Text(text));
                }
            }
        }
    }
    Ok(values)
}

fn scalar_text(value: &Value) -> Option<String> {
    match value {
        Value::Bool(b) => Some(b.to_string()),
        Value::Number(n) => Some(n.to_string()),
        Value::String(s) => Some(s.clone()),
        _ => None,
    }
}

/// Render `values` as a framed YAML document for `version`
pub fn export_yaml(version: &str, values: &OptionValueMap, schema: &OptionSchema) -> Result<String> {
    let specs = schema.options_for(version).ok_or_else(|| UnknownOptionError {
        version: version.to_string(),
    })?;

    let mut mapping = Mapping::new();
    for (name, value) in values {
        let Some(spec) = specs.get(name) else {
            continue;
        };
        if value.is_unset() {
            continue;
        }
        mapping.insert(Value::String(name.clone()), typed_value(spec.kind, value));
    }

    let body = if mapping.is_empty() {
        String::new()
    } else {
        serde_yaml::to_string(&Value::Mapping(mapping))?
    };
    Ok(format!("{DOCUMENT_START}{body}{DOCUMENT_END}"))
}

fn typed_value(kind: OptionType, value: &OptionValue) -> Value {
    let text = value.display().trim().to_string();
    match kind {
        OptionType::Bool => match value.as_canonical_bool() {
            Some(canonical) => Value::Bool(canonical == TRUE),
            None => Value::String(text),
        },
        OptionType::Int => text
            .parse::<i64>()
            .map(|n| Value::Number(Number::from(n)))
            .unwrap_or(Value::String(text)),
        OptionType::UInt => text
            .parse::<u64>()
            .map(|n| Value::Number(Number::from(n)))
            .unwrap_or(Value::String(text)),
        OptionType::StringList => {
            Value::Sequence(value.list_items().into_iter().map(Value::String).collect())
        }
        OptionType::String | OptionType::EnumSet => Value::String(text),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::tests::sample_schema;

    #[test]
    fn test_import_scalars_become_text() {
        let values = parse_import("---\nColumnLimit: 100\nUnknownOpt: true\nUseTab: Never\n...\n").unwrap();
        assert_eq!(values["ColumnLimit"], OptionValue::text("100"));
        assert_eq!(values["UnknownOpt"], OptionValue::text("true"));
        assert_eq!(values["UseTab"], OptionValue::text("Never"));
    }

    #[test]
    fn test_import_sequences_and_nested() {
        let yaml = "ForEachMacros: [foreach, Q_FOREACH]\nBraceWrapping:\n  AfterClass: true\nEmpty:\n";
        let values = parse_import(yaml).unwrap();
        assert_eq!(
            values["ForEachMacros"],
            OptionValue::List(vec!["foreach".into(), "Q_FOREACH".into()])
        );
        assert!(!values.contains_key("BraceWrapping"));
        assert!(!values.contains_key("Empty"));
    }

    #[test]
    fn test_import_empty_document() {
        assert!(parse_import("---\n\n...\n").unwrap().is_empty());
        assert!(parse_import("").unwrap().is_empty());
    }

    #[test]
    fn test_import_rejects_invalid_yaml() {
        assert!(matches!(
            parse_import("ColumnLimit: [100"),
            Err(ImportParseError::Yaml(_))
        ));
        assert!(matches!(
            parse_import("- a\n- b\n"),
            Err(ImportParseError::NotAMapping(_))
        ));
    }

    #[test]
    fn test_export_is_typed_and_framed() {
        let schema = sample_schema();
        let mut values = OptionValueMap::new();
        values.insert("ColumnLimit".into(), OptionValue::text("100"));
        values.insert("AllowShortLoopsOnASingleLine".into(), OptionValue::text("true"));
        values.insert("UseTab".into(), OptionValue::text("Always"));
        values.insert("TabWidth".into(), OptionValue::text("Default"));

        let yaml = export_yaml("v1", &values, &schema).unwrap();
        assert!(yaml.starts_with("---\n"));
        assert!(yaml.ends_with("\n...\n"));
        assert!(yaml.contains("ColumnLimit: 100\n"));
        assert!(yaml.contains("AllowShortLoopsOnASingleLine: true\n"));
        assert!(yaml.contains("UseTab: Always\n"));
        assert!(!yaml.contains("TabWidth"));
    }

    #[test]
    fn test_export_empty_map() {
        let schema = sample_schema();
        assert_eq!(
            export_yaml("v1", &OptionValueMap::new(), &schema).unwrap(),
            "---\n\n...\n"
        );
    }

    #[test]
    fn test_export_then_import_preserves_values() {
        let schema = sample_schema();
        let mut values = OptionValueMap::new();
        values.insert("ColumnLimit".into(), OptionValue::text("120"));
        values.insert("ForEachMacros".into(), OptionValue::text("foreach, Q_FOREACH"));

        let imported = parse_import(&export_yaml("v2", &values, &schema).unwrap()).unwrap();
        assert_eq!(imported["ColumnLimit"], OptionValue::text("120"));
        assert_eq!(
            imported["ForEachMacros"],
            OptionValue::List(vec!["foreach".into(), "Q_FOREACH".into()])
        );
    }
}
