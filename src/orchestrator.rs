//! Sequencing of format requests
//!
//! Every request gets a monotonically increasing sequence number. Only the
//! completion carrying the latest number may touch the editor; anything older
//! is discarded on arrival, whatever order the responses come back in.

use tracing::{debug, info, warn};

use crate::derive::{self, EditorHints, WireConfig};
use crate::editor::{Editor, Selection};
use crate::error::{TransformRequestError, UnknownOptionError};
use crate::schema::{OptionSchema, VersionId};
use crate::values::OptionValueMap;

/// Body of `POST /format`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FormatRequest {
    /// Wire config as a JSON object string
    pub config: String,
    pub version: VersionId,
    pub code: String,
    /// `startLine:endLine`, only for selections that span text
    pub range: Option<String>,
}

impl FormatRequest {
    pub fn form_fields(&self) -> Vec<(&'static str, String)> {
        let mut fields = vec![
            ("config", self.config.clone()),
            ("version", self.version.clone()),
            ("code", self.code.clone()),
        ];
        if let Some(range) = &self.range {
            fields.push(("range", range.clone()));
        }
        fields
    }
}

/// Snapshot of one issued request
#[derive(Debug, Clone)]
pub struct PendingRequest {
    pub seq: u64,
    pub requested_version: VersionId,
    pub config_snapshot: OptionValueMap,
    pub wire: WireConfig,
    pub source_snapshot: String,
    pub selection: Selection,
}

impl PendingRequest {
    pub fn format_request(&self) -> FormatRequest {
        FormatRequest {
            config: derive::wire_json(&self.wire),
            version: self.requested_version.clone(),
            code: self.source_snapshot.clone(),
            range: self
                .selection
                .spans_text()
                .then(|| self.selection.line_range()),
        }
    }

    pub fn hints(&self) -> EditorHints {
        EditorHints::from_wire(&self.wire)
    }
}

#[derive(Debug)]
pub enum UpdateOutcome {
    /// Editor text replaced and selection restored
    Applied,
    /// A newer request was issued; result dropped
    Superseded,
    /// Latest request failed; editor untouched
    Failed(TransformRequestError),
}

#[derive(Debug, Default)]
pub struct UpdateOrchestrator {
    next_seq: u64,
    /// The only request whose result may still be applied
    latest: Option<PendingRequest>,
}

impl UpdateOrchestrator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Derive the wire config and register a new latest request
    pub fn begin(
        &mut self,
        version: &str,
        values: &OptionValueMap,
        source: String,
        selection: Selection,
        schema: &OptionSchema,
    ) -> Result<PendingRequest, UnknownOptionError> {
        let wire = derive::derive(version, values, schema)?;

        self.next_seq += 1;
        let seq = self.next_seq;
        let pending = PendingRequest {
            seq,
            requested_version: version.to_string(),
            config_snapshot: values.clone(),
            wire,
            source_snapshot: source,
            selection,
        };
        if let Some(superseded) = self.latest.replace(pending.clone()) {
            debug!(superseded = superseded.seq, seq, "Superseding in-flight format request");
        }

        debug!(seq, version = %version, options = pending.wire.len(), "Issuing format request");
        Ok(pending)
    }

    /// A request is in flight whose result would still be applied
    pub fn is_pending(&self) -> bool {
        self.latest.is_some()
    }

    /// Suppress the effect of every in-flight request
    pub fn cancel(&mut self) {
        if let Some(pending) = self.latest.take() {
            debug!(seq = pending.seq, "Cancelled in-flight format request");
        }
    }

    /// Handle the completion of request `seq`
    pub fn complete<E: Editor + ?Sized>(
        &mut self,
        seq: u64,
        result: Result<String, TransformRequestError>,
        editor: &mut E,
    ) -> UpdateOutcome {
        let pending = match self.latest.take() {
            Some(pending) if pending.seq == seq => pending,
            latest => {
                debug!(seq, latest = ?latest.as_ref().map(|p| p.seq), "Discarding stale format response");
                self.latest = latest;
                return UpdateOutcome::Superseded;
            }
        };

        if editor.text() != pending.source_snapshot {
            debug!(seq, "Editor changed since the request was sent, discarding response");
            return UpdateOutcome::Superseded;
        }

        match result {
            Ok(text) => {
                editor.set_text(text);
                // No remapping: the transform is assumed to keep line/column addressing
                editor.set_selection(pending.selection);
                info!(
                    seq,
                    version = %pending.requested_version,
                    options = pending.config_snapshot.len(),
                    "Applied formatted code"
                );
                UpdateOutcome::Applied
            }
            Err(err) => {
                warn!(seq, error = %err, "Format request failed");
                UpdateOutcome::Failed(err)
            }
        }
    }
}
