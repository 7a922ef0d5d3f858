//! Configurator window implemented with egui/eframe
//!
//! All state lives on the UI thread. Network calls run on a tokio runtime and
//! report back through a channel that is drained at the start of every frame.

use std::fs;
use std::path::PathBuf;

use anyhow::{anyhow, Context, Result};
use eframe::{egui, CreationContext, NativeOptions};
use tokio::runtime::Runtime;
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};
use tracing::{error, info, warn};

use super::components::code_editor::CodeEditor;
use super::components::option_form::OptionForm;
use super::components::version_selector;
use super::constants::*;
use crate::config::Settings;
use crate::constants::export::DEFAULT_FILENAME;
use crate::editor::Editor;
use crate::error::{SchemaError, TransformRequestError, UnknownOptionWarning};
use crate::orchestrator::{PendingRequest, UpdateOutcome};
use crate::persistence::{self, ConfigStateStore, KeyValueStore};
use crate::schema::OptionSchema;
use crate::service::FormatClient;
use crate::session::{AppState, Transition};
use crate::values::OptionValue;

/// Completions delivered from the runtime to the UI thread
enum AppEvent {
    SchemaLoaded(Result<OptionSchema, SchemaError>),
    Formatted {
        seq: u64,
        result: Result<String, TransformRequestError>,
    },
}

struct StatusMessage {
    text: String,
    color: egui::Color32,
}

impl StatusMessage {
    fn new(text: impl Into<String>, color: egui::Color32) -> Self {
        Self {
            text: text.into(),
            color,
        }
    }
}

/// Everything that exists once the schema is known
struct Workspace {
    state: AppState<Box<dyn KeyValueStore>>,
    editor: CodeEditor,
    form: OptionForm,
}

enum Phase {
    Loading,
    /// Schema unusable; nothing else can be shown
    Failed(String),
    Ready(Box<Workspace>),
}

struct ConfiguratorApp {
    runtime: Runtime,
    client: FormatClient,
    /// `None` keeps state in memory only
    state_path: Option<PathBuf>,
    events_tx: UnboundedSender<AppEvent>,
    events_rx: UnboundedReceiver<AppEvent>,
    phase: Phase,
    transfer_path: String,
    status_message: Option<StatusMessage>,
}

impl ConfiguratorApp {
    fn new(cc: &CreationContext<'_>, settings: Settings, state_path: Option<PathBuf>) -> Result<Self> {
        info!(endpoint = %settings.endpoint(), "Initializing configurator window");

        let runtime = Runtime::new().context("Failed to start async runtime")?;
        let client = FormatClient::from_settings(&settings)?;
        let (events_tx, events_rx) = mpsc::unbounded_channel();

        let mut app = Self {
            runtime,
            client,
            state_path,
            events_tx,
            events_rx,
            phase: Phase::Loading,
            transfer_path: DEFAULT_FILENAME.to_string(),
            status_message: None,
        };
        app.load_schema(&cc.egui_ctx);
        Ok(app)
    }

    fn load_schema(&mut self, ctx: &egui::Context) {
        self.phase = Phase::Loading;
        let client = self.client.clone();
        let tx = self.events_tx.clone();
        let ctx = ctx.clone();
        self.runtime.spawn(async move {
            let result = client.fetch_schema().await;
            let _ = tx.send(AppEvent::SchemaLoaded(result));
            ctx.request_repaint();
        });
    }

    /// Send a request to the service; its completion arrives as an event
    fn dispatch(&self, ctx: &egui::Context, pending: PendingRequest) {
        let client = self.client.clone();
        let tx = self.events_tx.clone();
        let ctx = ctx.clone();
        let request = pending.format_request();
        let seq = pending.seq;
        self.runtime.spawn(async move {
            let result = client.format(&request).await;
            let _ = tx.send(AppEvent::Formatted { seq, result });
            ctx.request_repaint();
        });
    }

    fn process_events(&mut self, ctx: &egui::Context) {
        while let Ok(event) = self.events_rx.try_recv() {
            match event {
                AppEvent::SchemaLoaded(Ok(schema)) => self.on_schema_loaded(ctx, schema),
                AppEvent::SchemaLoaded(Err(err)) => {
                    error!(error = %err, "Failed to load option schema");
                    self.phase = Phase::Failed(err.to_string());
                }
                AppEvent::Formatted { seq, result } => self.on_formatted(seq, result),
            }
        }
    }

    fn on_schema_loaded(&mut self, ctx: &egui::Context, schema: OptionSchema) {
        let store = ConfigStateStore::new(persistence::open_store(self.state_path.clone()));
        let (state, source, warnings) = AppState::initialize(schema, store);

        let mut workspace = Workspace {
            state,
            editor: CodeEditor::new(source),
            form: OptionForm::new(),
        };
        workspace.form.sync(workspace.state.values());
        self.report_warnings(&warnings);

        match workspace.state.begin_update(&workspace.editor) {
            Ok(pending) => self.dispatch(ctx, pending),
            Err(err) => error!(error = %err, "Failed to issue initial format request"),
        }
        self.phase = Phase::Ready(Box::new(workspace));
    }

    fn on_formatted(&mut self, seq: u64, result: Result<String, TransformRequestError>) {
        let Phase::Ready(workspace) = &mut self.phase else {
            return;
        };
        let Workspace { state, editor, .. } = workspace.as_mut();
        match state.complete_update(seq, result, editor) {
            UpdateOutcome::Applied => {
                // Warnings stay visible; a stale error does not
                if self.status_message.as_ref().is_some_and(|m| m.color == STATUS_ERROR) {
                    self.status_message = None;
                }
            }
            UpdateOutcome::Superseded => {}
            UpdateOutcome::Failed(err) => {
                self.status_message = Some(StatusMessage::new(err.to_string(), STATUS_ERROR));
            }
        }
    }

    fn report_warnings(&mut self, warnings: &[UnknownOptionWarning]) {
        if warnings.is_empty() {
            return;
        }
        let names: Vec<&str> = warnings.iter().map(|w| w.option.as_str()).collect();
        self.status_message = Some(StatusMessage::new(
            format!("Ignored unknown option(s): {}", names.join(", ")),
            STATUS_WARNING,
        ));
    }

    fn apply_transition(&mut self, ctx: &egui::Context, transition: Transition) {
        self.report_warnings(&transition.warnings);
        if let Phase::Ready(workspace) = &mut self.phase {
            workspace.form.sync(workspace.state.values());
        }
        self.dispatch(ctx, transition.pending);
    }

    fn request_update(&mut self, ctx: &egui::Context) {
        let Phase::Ready(workspace) = &mut self.phase else {
            return;
        };
        match workspace.state.begin_update(&workspace.editor) {
            Ok(pending) => self.dispatch(ctx, pending),
            Err(err) => {
                self.status_message = Some(StatusMessage::new(err.to_string(), STATUS_ERROR));
            }
        }
    }

    fn switch_version(&mut self, ctx: &egui::Context, version: String) {
        let Phase::Ready(workspace) = &mut self.phase else {
            return;
        };
        match workspace.state.switch_version(&version, &workspace.editor) {
            Ok(Some(transition)) => self.apply_transition(ctx, transition),
            Ok(None) => {}
            Err(err) => {
                self.status_message = Some(StatusMessage::new(err.to_string(), STATUS_ERROR));
            }
        }
    }

    fn import_file(&mut self, ctx: &egui::Context) {
        let path = PathBuf::from(self.transfer_path.trim());
        let contents = match fs::read_to_string(&path) {
            Ok(contents) => contents,
            Err(err) => {
                warn!(path = %path.display(), error = %err, "Failed to read import file");
                self.status_message = Some(StatusMessage::new(
                    format!("Could not read {}: {err}", path.display()),
                    STATUS_ERROR,
                ));
                return;
            }
        };

        let Phase::Ready(workspace) = &mut self.phase else {
            return;
        };
        match workspace.state.import(&contents, &workspace.editor) {
            Ok(transition) => {
                self.status_message = Some(StatusMessage::new(
                    format!("Imported {}", path.display()),
                    STATUS_OK,
                ));
                self.apply_transition(ctx, transition);
            }
            Err(err) => {
                self.status_message = Some(StatusMessage::new(err.to_string(), STATUS_ERROR));
            }
        }
    }

    fn export_file(&mut self) {
        let Phase::Ready(workspace) = &self.phase else {
            return;
        };
        let path = PathBuf::from(self.transfer_path.trim());
        let result = workspace
            .state
            .export()
            .and_then(|yaml| fs::write(&path, yaml).with_context(|| format!("Failed to write {:?}", path)));

        self.status_message = Some(match result {
            Ok(()) => {
                info!(path = %path.display(), "Exported configuration");
                StatusMessage::new(format!("Saved {}", path.display()), STATUS_OK)
            }
            Err(err) => {
                error!(error = ?err, "Export failed");
                StatusMessage::new(format!("{err:#}"), STATUS_ERROR)
            }
        });
    }

    fn reset(&mut self, ctx: &egui::Context) {
        let Phase::Ready(workspace) = &mut self.phase else {
            return;
        };
        let Workspace { state, editor, form } = workspace.as_mut();
        match state.reset(editor) {
            Ok(pending) => {
                form.sync(state.values());
                self.status_message = None;
                self.dispatch(ctx, pending);
            }
            Err(err) => {
                error!(error = ?err, "Reset failed");
                self.status_message = Some(StatusMessage::new(format!("{err:#}"), STATUS_ERROR));
            }
        }
    }

    fn toolbar(&mut self, ctx: &egui::Context, ui: &mut egui::Ui) {
        let Phase::Ready(workspace) = &self.phase else {
            return;
        };
        let versions = workspace.state.schema().versions().to_vec();
        let active = workspace.state.active_version().map(str::to_string);

        ui.horizontal(|ui| {
            if let Some(version) = version_selector::ui(ui, &versions, active.as_deref()) {
                self.switch_version(ctx, version);
            }

            ui.separator();
            if ui.button("\u{21BB} Update").clicked() {
                self.request_update(ctx);
            }
            if ui.button("Reset").clicked() {
                self.reset(ctx);
            }

            ui.separator();
            ui.label("File:");
            ui.add(egui::TextEdit::singleline(&mut self.transfer_path).desired_width(220.0));
            if ui.button("Load").clicked() {
                self.import_file(ctx);
            }
            if ui.button("Save").clicked() {
                self.export_file();
            }
        });
    }
}

impl eframe::App for ConfiguratorApp {
    fn update(&mut self, ctx: &egui::Context, _frame: &mut eframe::Frame) {
        self.process_events(ctx);

        let failure = match &self.phase {
            Phase::Failed(message) => Some(message.clone()),
            _ => None,
        };
        if let Some(message) = failure {
            egui::CentralPanel::default().show(ctx, |_ui| {});
            egui::Window::new("Option schema unavailable")
                .collapsible(false)
                .resizable(false)
                .anchor(egui::Align2::CENTER_CENTER, [0.0, 0.0])
                .show(ctx, |ui| {
                    ui.colored_label(STATUS_ERROR, message.as_str());
                    ui.add_space(ITEM_SPACING);
                    if ui.button("Retry").clicked() {
                        self.load_schema(ctx);
                    }
                });
            return;
        }

        if matches!(self.phase, Phase::Loading) {
            egui::CentralPanel::default().show(ctx, |ui| {
                ui.add_space(SECTION_SPACING);
                ui.horizontal(|ui| {
                    ui.spinner();
                    ui.label(format!("Loading options from {}", self.client.base_url()));
                });
            });
            return;
        }

        egui::TopBottomPanel::top("toolbar").show(ctx, |ui| {
            ui.add_space(PADDING);
            self.toolbar(ctx, ui);
            ui.add_space(PADDING);
        });

        let busy = matches!(&self.phase, Phase::Ready(w) if w.state.is_update_pending());
        let switching = matches!(&self.phase, Phase::Ready(w) if w.state.version_state().is_switching());
        egui::TopBottomPanel::bottom("status").show(ctx, |ui| match &self.status_message {
            Some(message) => {
                ui.colored_label(message.color, message.text.as_str());
            }
            None if switching => {
                ui.colored_label(STATUS_BUSY, "Switching version...");
            }
            None if busy => {
                ui.colored_label(STATUS_BUSY, "Formatting...");
            }
            None => {
                ui.label(egui::RichText::new("Ready").weak());
            }
        });

        let mut commit = false;
        if let Phase::Ready(workspace) = &mut self.phase {
            let Workspace { state, editor, form } = workspace.as_mut();

            egui::SidePanel::left("options")
                .resizable(true)
                .default_width(OPTIONS_PANEL_WIDTH)
                .show(ctx, |ui| {
                    egui::ScrollArea::vertical().show(ui, |ui| {
                        let response = form.ui(ui, state.active_options());
                        for (name, raw) in response.edits {
                            state.set_option(&name, OptionValue::Text(raw));
                        }
                        commit = response.commit;
                    });
                });

            let mut text_changed = false;
            egui::CentralPanel::default().show(ctx, |ui| {
                text_changed = editor.ui(ui, state.hints(), busy);
            });

            if text_changed {
                state.on_text_changed(&*editor);
            }
        }

        if commit {
            self.request_update(ctx);
        }
    }

    fn on_exit(&mut self, _gl: Option<&eframe::glow::Context>) {
        if let Phase::Ready(workspace) = &mut self.phase {
            let text = workspace.editor.text();
            if let Err(err) = workspace.state.persist(text) {
                error!(error = ?err, "Failed to persist state during shutdown");
            }
        }
        info!("Configurator exiting");
    }
}

pub fn run_gui(settings: Settings, state_path: Option<PathBuf>) -> Result<()> {
    let options = NativeOptions {
        viewport: egui::ViewportBuilder::default()
            .with_inner_size([settings.window_width as f32, settings.window_height as f32])
            .with_min_inner_size([WINDOW_MIN_WIDTH, WINDOW_MIN_HEIGHT])
            .with_title("clang-format configurator"),
        ..Default::default()
    };

    eframe::run_native(
        "clang-format configurator",
        options,
        Box::new(move |cc| Ok(Box::new(ConfiguratorApp::new(cc, settings, state_path)?))),
    )
    .map_err(|err| anyhow!("Failed to launch configurator window: {err}"))
}
