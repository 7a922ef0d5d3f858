//! Application state shared by the GUI and the CLI
//!
//! Owns the schema, the version state machine, the authoritative option map,
//! the persisted-state store and the request orchestrator. Every mutation is
//! computed into a new value first and swapped in only on success.

use anyhow::Result;
use thiserror::Error;
use tracing::{debug, error, info};

use crate::constants::EXAMPLE_SOURCE;
use crate::derive::{self, EditorHints};
use crate::editor::Editor;
use crate::error::{ImportParseError, TransformRequestError, UnknownOptionError, UnknownOptionWarning};
use crate::orchestrator::{PendingRequest, UpdateOrchestrator, UpdateOutcome};
use crate::persistence::{ConfigStateStore, KeyValueStore, PersistedState, SavedConfig};
use crate::reconcile::{self, Reconciled, Sources, VersionState};
use crate::schema::{OptionSchema, OptionSpec, OptionType};
use crate::transfer;
use crate::values::{OptionValue, OptionValueMap};

#[derive(Error, Debug)]
pub enum SessionError {
    #[error(transparent)]
    Import(#[from] ImportParseError),

    #[error(transparent)]
    UnknownVersion(#[from] UnknownOptionError),

    #[error("session has no active version yet")]
    Uninitialized,
}

/// A reconciliation that was swapped in, plus the request it triggered
#[derive(Debug)]
pub struct Transition {
    pub pending: PendingRequest,
    pub warnings: Vec<UnknownOptionWarning>,
}

pub struct AppState<S: KeyValueStore> {
    schema: OptionSchema,
    version: VersionState,
    values: OptionValueMap,
    store: ConfigStateStore<S>,
    persisted: Option<SavedConfig>,
    orchestrator: UpdateOrchestrator,
    hints: EditorHints,
}

impl<S: KeyValueStore> AppState<S> {
    /// Build the initial state from a freshly loaded schema
    ///
    /// Returns the state, the source text to show, and any warnings about
    /// persisted options the chosen version no longer has.
    pub fn initialize(
        schema: OptionSchema,
        store: ConfigStateStore<S>,
    ) -> (Self, String, Vec<UnknownOptionWarning>) {
        let persisted = store.load_persisted();
        let saved = persisted.as_ref().map(|p| p.saved_config.clone());
        let source = persisted
            .map(|p| p.source_text)
            .filter(|s| !s.is_empty())
            .or_else(|| store.load_source())
            .unwrap_or_else(|| EXAMPLE_SOURCE.to_string());

        let version = reconcile::initial_version(&schema, saved.as_ref());
        let Reconciled { values, warnings, .. } = reconcile::reconcile(
            &schema,
            &version,
            Sources {
                persisted: saved.as_ref(),
                ..Default::default()
            },
        )
        // initial_version only yields published versions
        .unwrap_or_else(|_| Reconciled {
            version: version.clone(),
            values: OptionValueMap::new(),
            warnings: Vec::new(),
        });

        // Unknown persisted keys are reported once, here
        let saved = saved.map(|mut saved| {
            if let Some(specs) = schema.options_for(&saved.version) {
                saved.options.retain(|name, _| specs.contains_key(name));
            }
            saved
        });

        let mut state = VersionState::default();
        state.initialize(version);

        info!(
            version = ?state.active(),
            options = values.len(),
            restored = saved.is_some(),
            "Initialised configurator state"
        );

        (
            Self {
                schema,
                version: state,
                values,
                store,
                persisted: saved,
                orchestrator: UpdateOrchestrator::new(),
                hints: EditorHints::default(),
            },
            source,
            warnings,
        )
    }

    pub fn schema(&self) -> &OptionSchema {
        &self.schema
    }

    pub fn version_state(&self) -> &VersionState {
        &self.version
    }

    pub fn active_version(&self) -> Option<&str> {
        self.version.active()
    }

    pub fn values(&self) -> &OptionValueMap {
        &self.values
    }

    pub fn hints(&self) -> EditorHints {
        self.hints
    }

    pub fn is_update_pending(&self) -> bool {
        self.orchestrator.is_pending()
    }

    /// Option specs of the active version, in display order
    pub fn active_options(&self) -> impl Iterator<Item = (&String, &OptionSpec)> {
        self.active_version()
            .and_then(|v| self.schema.options_for(v))
            .into_iter()
            .flatten()
    }

    /// Edit one option of the active version; `Default` or empty unsets it
    ///
    /// Returns whether the map changed. Unknown names are rejected.
    pub fn set_option(&mut self, name: &str, value: OptionValue) -> bool {
        let Some(version) = self.version.active() else {
            return false;
        };
        let Some(spec) = self.schema.spec(version, name) else {
            debug!(option = %name, version = %version, "Ignoring edit of unknown option");
            return false;
        };

        let value = match (spec.kind, value.as_canonical_bool()) {
            (OptionType::Bool, Some(canonical)) => OptionValue::text(canonical),
            _ => value,
        };

        if value.is_unset() {
            self.values.remove(name).is_some()
        } else if self.values.get(name) == Some(&value) {
            false
        } else {
            self.values.insert(name.to_string(), value);
            true
        }
    }

    /// Issue a format request for the editor's current text and selection
    pub fn begin_update<E: Editor + ?Sized>(&mut self, editor: &E) -> Result<PendingRequest, SessionError> {
        let version = self.version.active().ok_or(SessionError::Uninitialized)?.to_string();
        let pending = self.orchestrator.begin(
            &version,
            &self.values,
            editor.text(),
            editor.selection(),
            &self.schema,
        )?;
        self.hints = pending.hints();
        Ok(pending)
    }

    /// Apply a completed request; persists on success
    pub fn complete_update<E: Editor + ?Sized>(
        &mut self,
        seq: u64,
        result: Result<String, TransformRequestError>,
        editor: &mut E,
    ) -> UpdateOutcome {
        let outcome = self.orchestrator.complete(seq, result, editor);
        if !matches!(outcome, UpdateOutcome::Superseded) {
            self.version.settle();
        }
        if matches!(outcome, UpdateOutcome::Applied) {
            if let Err(e) = self.persist(editor.text()) {
                error!(error = ?e, "Failed to persist state after update");
            }
        }
        outcome
    }

    /// Switch the active version, carrying over shared edits
    ///
    /// Returns `None` when `to` is already the active version.
    pub fn switch_version<E: Editor + ?Sized>(
        &mut self,
        to: &str,
        editor: &E,
    ) -> Result<Option<Transition>, SessionError> {
        if !self.schema.contains_version(to) {
            return Err(UnknownOptionError {
                version: to.to_string(),
            }
            .into());
        }

        let mut next_state = self.version.clone();
        if next_state.begin_switch(to).is_none() {
            return Ok(None);
        }

        let reconciled = reconcile::reconcile(
            &self.schema,
            to,
            Sources {
                persisted: self.persisted.as_ref(),
                carry_over: Some(&self.values),
                imported: None,
            },
        )?;

        let previous = std::mem::replace(&mut self.version, next_state);
        let previous_values = std::mem::replace(&mut self.values, reconciled.values);
        match self.begin_update(editor) {
            Ok(pending) => Ok(Some(Transition {
                pending,
                warnings: reconciled.warnings,
            })),
            Err(e) => {
                self.version = previous;
                self.values = previous_values;
                Err(e)
            }
        }
    }

    /// Merge an imported `.clang-format` into the active version
    pub fn import<E: Editor + ?Sized>(
        &mut self,
        contents: &str,
        editor: &E,
    ) -> Result<Transition, SessionError> {
        let version = self.version.active().ok_or(SessionError::Uninitialized)?.to_string();
        let imported = transfer::parse_import(contents)?;

        let reconciled = reconcile::reconcile(
            &self.schema,
            &version,
            Sources {
                persisted: None,
                carry_over: Some(&self.values),
                imported: Some(&imported),
            },
        )?;

        info!(
            version = %version,
            imported = imported.len(),
            warnings = reconciled.warnings.len(),
            "Imported configuration"
        );

        let previous_values = std::mem::replace(&mut self.values, reconciled.values);
        match self.begin_update(editor) {
            Ok(pending) => Ok(Transition {
                pending,
                warnings: reconciled.warnings,
            }),
            Err(e) => {
                self.values = previous_values;
                Err(e)
            }
        }
    }

    /// YAML export of the authoritative option map
    pub fn export(&self) -> Result<String> {
        let version = self
            .version
            .active()
            .ok_or(SessionError::Uninitialized)?;
        transfer::export_yaml(version, &self.values, &self.schema)
    }

    /// Persist `source` with the resolved option set
    pub fn persist(&mut self, source: String) -> Result<()> {
        let Some(version) = self.version.active() else {
            debug!("Skipping persist before a version is resolved");
            return Ok(());
        };
        let wire = derive::derive(version, &self.values, &self.schema)?;
        let saved_config = SavedConfig {
            version: version.to_string(),
            options: derive::derive_inverse(version, &wire, &self.schema)?,
        };
        self.store.save(&PersistedState {
            source_text: source,
            saved_config: saved_config.clone(),
        })?;
        self.persisted = Some(saved_config);
        Ok(())
    }

    /// Editor change hook
    ///
    /// A request in flight was built from older text; its result is dropped.
    pub fn on_text_changed<E: Editor + ?Sized>(&mut self, editor: &E) {
        if self.orchestrator.is_pending() {
            self.orchestrator.cancel();
            self.version.settle();
        }
        if let Err(e) = self.persist(editor.text()) {
            error!(error = ?e, "Failed to persist editor text");
        }
    }

    /// Forget persisted state and return to the example with default options
    pub fn reset<E: Editor + ?Sized>(&mut self, editor: &mut E) -> Result<PendingRequest> {
        self.orchestrator.cancel();
        self.store.clear()?;
        self.persisted = None;
        self.values = OptionValueMap::new();
        self.version.initialize(self.schema.first_version().to_string());
        editor.set_text(EXAMPLE_SOURCE.to_string());
        Ok(self.begin_update(&*editor)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::editor::{Selection, TextBuffer};
    use crate::persistence::MemoryStore;
    use crate::schema::tests::sample_schema;

    fn store_with(version: &str, options: &[(&str, &str)], source: &str) -> ConfigStateStore<MemoryStore> {
        let mut store = ConfigStateStore::new(MemoryStore::new());
        store
            .save(&PersistedState {
                source_text: source.to_string(),
                saved_config: SavedConfig {
                    version: version.to_string(),
                    options: options
                        .iter()
                        .map(|(k, v)| (k.to_string(), OptionValue::text(*v)))
                        .collect(),
                },
            })
            .unwrap();
        store
    }

    fn fresh() -> (AppState<MemoryStore>, TextBuffer) {
        let (state, source, _) =
            AppState::initialize(sample_schema(), ConfigStateStore::new(MemoryStore::new()));
        (state, TextBuffer::new(source))
    }

    #[test]
    fn test_fresh_start_uses_first_version_and_example() {
        let (state, editor) = fresh();
        assert_eq!(state.active_version(), Some("v1"));
        assert!(state.values().is_empty());
        assert_eq!(editor.text(), EXAMPLE_SOURCE);
    }

    #[test]
    fn test_restores_persisted_state() {
        let store = store_with("v2", &[("ColumnLimit", "120")], "int y;");
        let (state, source, warnings) = AppState::initialize(sample_schema(), store);
        assert_eq!(state.active_version(), Some("v2"));
        assert_eq!(state.values()["ColumnLimit"], OptionValue::text("120"));
        assert_eq!(source, "int y;");
        assert!(warnings.is_empty());
    }

    #[test]
    fn test_switch_drops_option_missing_in_target() {
        let store = store_with("v1", &[("TabWidth", "4")], "int x;");
        let (mut state, source, _) = AppState::initialize(sample_schema(), store);
        let editor = TextBuffer::new(source);
        assert_eq!(state.values()["TabWidth"], OptionValue::text("4"));

        let transition = state.switch_version("v2", &editor).unwrap().unwrap();
        assert_eq!(state.active_version(), Some("v2"));
        assert!(state.values().is_empty());
        assert!(transition.warnings.is_empty());
        assert_eq!(transition.pending.requested_version, "v2");
        assert!(state.version_state().is_switching());
    }

    #[test]
    fn test_switch_to_unknown_version_changes_nothing() {
        let (mut state, editor) = fresh();
        assert!(state.switch_version("v9", &editor).is_err());
        assert_eq!(state.active_version(), Some("v1"));
        assert!(!state.is_update_pending());
    }

    #[test]
    fn test_switch_to_active_version_is_noop() {
        let (mut state, editor) = fresh();
        assert!(state.switch_version("v1", &editor).unwrap().is_none());
    }

    #[test]
    fn test_switch_settles_after_completion() {
        let (mut state, mut editor) = fresh();
        state.set_option("ColumnLimit", OptionValue::text("100"));
        let transition = state.switch_version("v2", &editor).unwrap().unwrap();
        assert_eq!(state.values()["ColumnLimit"], OptionValue::text("100"));

        let outcome = state.complete_update(transition.pending.seq, Ok("formatted".into()), &mut editor);
        assert!(matches!(outcome, UpdateOutcome::Applied));
        assert_eq!(state.version_state(), &VersionState::Ready("v2".to_string()));
    }

    #[test]
    fn test_second_switch_supersedes_first() {
        let (mut state, mut editor) = fresh();
        let first = state.switch_version("v2", &editor).unwrap().unwrap();
        let second = state.switch_version("v1", &editor).unwrap().unwrap();

        assert!(matches!(
            state.complete_update(first.pending.seq, Ok("v2 output".into()), &mut editor),
            UpdateOutcome::Superseded
        ));
        assert!(state.version_state().is_switching());
        assert!(matches!(
            state.complete_update(second.pending.seq, Ok("v1 output".into()), &mut editor),
            UpdateOutcome::Applied
        ));
        assert_eq!(editor.text(), "v1 output");
        assert_eq!(state.active_version(), Some("v1"));
        assert!(!state.version_state().is_switching());
    }

    #[test]
    fn test_import_keeps_known_options_and_warns_once() {
        let store = store_with("v2", &[("Removed", "1")], "int x;");
        let (mut state, source, warnings) = AppState::initialize(sample_schema(), store);
        let mut editor = TextBuffer::new(source);
        assert_eq!(warnings.len(), 1);
        assert_eq!(warnings[0].option, "Removed");

        let transition = state
            .import("UnknownOpt: true\nColumnLimit: 100\n", &editor)
            .unwrap();

        let mut expected = OptionValueMap::new();
        expected.insert("ColumnLimit".to_string(), OptionValue::text("100"));
        assert_eq!(state.values(), &expected);
        assert_eq!(transition.warnings.len(), 1);
        assert_eq!(transition.warnings[0].option, "UnknownOpt");

        state.complete_update(transition.pending.seq, Ok("done".into()), &mut editor);
        assert_eq!(editor.text(), "done");
    }

    #[test]
    fn test_failed_import_leaves_state_untouched() {
        let (mut state, editor) = fresh();
        state.set_option("ColumnLimit", OptionValue::text("90"));
        let before = state.values().clone();

        assert!(matches!(
            state.import("ColumnLimit: [", &editor),
            Err(SessionError::Import(_))
        ));
        assert_eq!(state.values(), &before);
        assert!(!state.is_update_pending());
    }

    #[test]
    fn test_set_option_validates_and_unsets() {
        let (mut state, _) = fresh();
        assert!(!state.set_option("NoSuchOption", OptionValue::text("1")));
        assert!(state.set_option("AllowShortLoopsOnASingleLine", OptionValue::text("True")));
        assert_eq!(
            state.values()["AllowShortLoopsOnASingleLine"],
            OptionValue::text("true")
        );
        assert!(!state.set_option("AllowShortLoopsOnASingleLine", OptionValue::text("true")));
        assert!(state.set_option("AllowShortLoopsOnASingleLine", OptionValue::text("Default")));
        assert!(state.values().is_empty());
    }

    #[test]
    fn test_applied_update_persists_state() {
        let (mut state, mut editor) = fresh();
        state.set_option("ColumnLimit", OptionValue::text("100"));
        editor.set_selection(Selection::new(0, 0, 1, 0));

        let pending = state.begin_update(&editor).unwrap();
        assert_eq!(state.hints().column_limit, 100);
        state.complete_update(pending.seq, Ok("int z;\n".into()), &mut editor);

        let reloaded = state.store.load_persisted().unwrap();
        assert_eq!(reloaded.source_text, "int z;\n");
        assert_eq!(reloaded.saved_config.version, "v1");
        assert_eq!(
            reloaded.saved_config.options["ColumnLimit"],
            OptionValue::text("100")
        );
        assert_eq!(editor.selection(), Selection::new(0, 0, 1, 0));
    }

    #[test]
    fn test_failed_update_persists_nothing() {
        let (mut state, mut editor) = fresh();
        let pending = state.begin_update(&editor).unwrap();
        let outcome = state.complete_update(
            pending.seq,
            Err(TransformRequestError::Service("down".into())),
            &mut editor,
        );
        assert!(matches!(outcome, UpdateOutcome::Failed(_)));
        assert!(state.store.load_persisted().is_none());
    }

    #[test]
    fn test_reset_restores_defaults() {
        let store = store_with("v2", &[("ColumnLimit", "120")], "int y;");
        let (mut state, source, _) = AppState::initialize(sample_schema(), store);
        let mut editor = TextBuffer::new(source);

        let pending = state.reset(&mut editor).unwrap();
        assert_eq!(state.active_version(), Some("v1"));
        assert!(state.values().is_empty());
        assert_eq!(editor.text(), EXAMPLE_SOURCE);
        assert_eq!(pending.requested_version, "v1");
        assert!(state.store.load_persisted().is_none());
    }

    #[test]
    fn test_export_reflects_current_values() {
        let (mut state, _) = fresh();
        state.set_option("ColumnLimit", OptionValue::text("100"));
        assert_eq!(state.export().unwrap(), "---\nColumnLimit: 100\n\n...\n");
    }

    #[test]
    fn test_active_options_lists_version_specs() {
        let (state, _) = fresh();
        let names: Vec<&String> = state.active_options().map(|(name, _)| name).collect();
        assert!(names.iter().any(|n| n.as_str() == "TabWidth"));
        assert_eq!(names.len(), 5);
    }

    #[test]
    fn test_typing_during_update_keeps_new_text() {
        let (mut state, mut editor) = fresh();
        let pending = state.begin_update(&editor).unwrap();

        editor.set_text("int typed_after_request;".into());
        state.on_text_changed(&editor);
        assert!(!state.is_update_pending());

        let outcome = state.complete_update(pending.seq, Ok("formatted old snapshot".into()), &mut editor);
        assert!(matches!(outcome, UpdateOutcome::Superseded));
        assert_eq!(editor.text(), "int typed_after_request;");
        assert_eq!(
            state.store.load_persisted().unwrap().source_text,
            "int typed_after_request;"
        );
    }

    #[test]
    fn test_typing_during_switch_settles_version() {
        let (mut state, mut editor) = fresh();
        state.switch_version("v2", &editor).unwrap();
        assert!(state.version_state().is_switching());

        editor.set_text("int edited;".into());
        state.on_text_changed(&editor);
        assert_eq!(state.version_state(), &VersionState::Ready("v2".to_string()));
    }

    #[test]
    fn test_import_does_not_restore_unsaved_unset() {
        let store = store_with("v1", &[("ColumnLimit", "100")], "int x;");
        let (mut state, source, _) = AppState::initialize(sample_schema(), store);
        let mut editor = TextBuffer::new(source);

        assert!(state.set_option("ColumnLimit", OptionValue::text("Default")));
        let pending = state.begin_update(&editor).unwrap();
        state.complete_update(
            pending.seq,
            Err(TransformRequestError::Service("down".into())),
            &mut editor,
        );

        state.import("UseTab: Always\n", &editor).unwrap();
        let mut expected = OptionValueMap::new();
        expected.insert("UseTab".to_string(), OptionValue::text("Always"));
        assert_eq!(state.values(), &expected);
    }

    #[test]
    fn test_stale_persisted_key_not_reported_again_on_switch() {
        let store = store_with("v2", &[("Removed", "1"), ("ColumnLimit", "90")], "int x;");
        let (mut state, source, warnings) = AppState::initialize(sample_schema(), store);
        let editor = TextBuffer::new(source);
        assert_eq!(warnings.len(), 1);

        state.switch_version("v1", &editor).unwrap();
        let back = state.switch_version("v2", &editor).unwrap().unwrap();
        assert!(back.warnings.is_empty());
        assert_eq!(state.values()["ColumnLimit"], OptionValue::text("90"));
    }

    #[test]
    fn test_persist_stores_normalized_options() {
        let (mut state, editor) = fresh();
        state.set_option("ForEachMacros", OptionValue::text("foreach, Q_FOREACH,"));
        state.persist(editor.text()).unwrap();

        let saved = state.store.load_persisted().unwrap().saved_config;
        assert_eq!(
            saved.options["ForEachMacros"],
            OptionValue::List(vec!["foreach".into(), "Q_FOREACH".into()])
        );
    }
}
