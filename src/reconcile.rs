//! Reconciliation of option values from competing sources
//!
//! Merge order, later sources winning per option:
//! schema defaults (empty map) < persisted state (same version only)
//! < carried-over edits from the previous version < imported file.
//!
//! Also hosts the version-switch state machine.

use tracing::{debug, info, warn};

use crate::error::{UnknownOptionError, UnknownOptionWarning};
use crate::persistence::SavedConfig;
use crate::schema::{OptionSchema, OptionType, VersionId};
use crate::values::{OptionValue, OptionValueMap};

/// Inputs to one reconciliation pass
#[derive(Debug, Default, Clone, Copy)]
pub struct Sources<'a> {
    pub persisted: Option<&'a SavedConfig>,
    /// Edits made under the previously active version
    pub carry_over: Option<&'a OptionValueMap>,
    pub imported: Option<&'a OptionValueMap>,
}

/// Authoritative result of a reconciliation pass
#[derive(Debug, Clone, PartialEq)]
pub struct Reconciled {
    pub version: VersionId,
    pub values: OptionValueMap,
    pub warnings: Vec<UnknownOptionWarning>,
}

/// Version to start with: the persisted one if still published, else the first
pub fn initial_version(schema: &OptionSchema, persisted: Option<&SavedConfig>) -> VersionId {
    match persisted {
        Some(saved) if schema.contains_version(&saved.version) => saved.version.clone(),
        Some(saved) => {
            warn!(version = %saved.version, "Persisted version no longer offered, using first version");
            schema.first_version().to_string()
        }
        None => schema.first_version().to_string(),
    }
}

/// Merge all sources into a fresh option map for `target`
pub fn reconcile(
    schema: &OptionSchema,
    target: &str,
    sources: Sources<'_>,
) -> Result<Reconciled, UnknownOptionError> {
    let specs = schema.options_for(target).ok_or_else(|| UnknownOptionError {
        version: target.to_string(),
    })?;

    let mut values = OptionValueMap::new();
    let mut warnings = Vec::new();

    let mut overlay = |source: &OptionValueMap, warn_unknown: bool, values: &mut OptionValueMap| {
        for (name, value) in source {
            if !specs.contains_key(name) {
                if warn_unknown {
                    warnings.push(UnknownOptionWarning {
                        option: name.clone(),
                        version: target.to_string(),
                    });
                }
                continue;
            }
            if value.is_unset() {
                continue;
            }
            values.insert(name.clone(), value.clone());
        }
    };

    if let Some(saved) = sources.persisted.filter(|saved| saved.version == target) {
        debug!(version = %target, count = saved.options.len(), "Applying persisted options");
        overlay(&saved.options, true, &mut values);
    }

    if let Some(edits) = sources.carry_over {
        // Options the target lacks are dropped without a warning
        overlay(edits, false, &mut values);
    }

    if let Some(imported) = sources.imported {
        overlay(imported, true, &mut values);
    }

    for (name, value) in values.iter_mut() {
        let is_bool = specs
            .get(name)
            .is_some_and(|spec| spec.kind == OptionType::Bool);
        if is_bool {
            if let Some(canonical) = value.as_canonical_bool() {
                *value = OptionValue::text(canonical);
            }
        }
    }

    for warning in &warnings {
        warn!(option = %warning.option, version = %warning.version, "Ignoring unknown option");
    }

    Ok(Reconciled {
        version: target.to_string(),
        values,
        warnings,
    })
}

/// Which version is active and whether a switch is still settling
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum VersionState {
    #[default]
    Uninitialized,
    Ready(VersionId),
    /// Values already reconciled for `to`; waiting for its transform to finish
    Switching { from: VersionId, to: VersionId },
}

impl VersionState {
    /// Version whose options the form currently shows
    pub fn active(&self) -> Option<&str> {
        match self {
            Self::Uninitialized => None,
            Self::Ready(version) => Some(version),
            Self::Switching { to, .. } => Some(to),
        }
    }

    pub fn is_switching(&self) -> bool {
        matches!(self, Self::Switching { .. })
    }

    /// First schema load
    pub fn initialize(&mut self, version: VersionId) {
        info!(version = %version, "Version initialised");
        *self = Self::Ready(version);
    }

    /// Start a switch to `to`
    ///
    /// Returns the version whose edits should be carried over, or `None` when
    /// there is nothing to do. A switch during `Switching` replaces the pending
    /// target and keeps the original origin.
    pub fn begin_switch(&mut self, to: &str) -> Option<VersionId> {
        match self {
            Self::Uninitialized => {
                warn!(to = %to, "Version switch requested before schema load");
                None
            }
            Self::Ready(current) if current.as_str() == to => None,
            Self::Ready(current) => {
                let from = current.clone();
                info!(from = %from, to = %to, "Switching version");
                *self = Self::Switching {
                    from: from.clone(),
                    to: to.to_string(),
                };
                Some(from)
            }
            Self::Switching { to: pending, .. } if pending.as_str() == to => None,
            Self::Switching { from, to: pending } => {
                let previous = pending.clone();
                info!(from = %from, cancelled = %previous, to = %to, "Restarting pending version switch");
                *pending = to.to_string();
                Some(previous)
            }
        }
    }

    /// The switch's transform round trip has finished
    pub fn settle(&mut self) {
        if let Self::Switching { to, .. } = self {
            let to = std::mem::take(to);
            debug!(version = %to, "Version switch settled");
            *self = Self::Ready(to);
        }
    }
}
