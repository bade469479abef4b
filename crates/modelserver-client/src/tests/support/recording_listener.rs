//! Listener that records which callback fired.

use std::sync::{Mutex, PoisonError};

use serde_json::Value;

use crate::diagnostic::Diagnostic;
use crate::envelope::Envelope;
use crate::subscription::{
    CloseNotification, ErrorNotification, FullModel, IncrementalUpdate, SubscriptionListener,
};

/// One observed callback.
#[derive(Debug, Clone, PartialEq)]
pub(crate) enum ListenerEvent {
    Open(String),
    Close(CloseNotification),
    Error(ErrorNotification),
    Success { keep_alive: bool, data: Value },
    DirtyState { modeluri: String, is_dirty: bool },
    IncrementalUpdate(IncrementalUpdate),
    FullUpdate(FullModel),
    ValidationResult(Diagnostic),
    Unknown(Envelope),
}

#[derive(Debug, Default)]
pub(crate) struct RecordingListener {
    events: Mutex<Vec<ListenerEvent>>,
}

impl RecordingListener {
    pub(crate) fn events(&self) -> Vec<ListenerEvent> {
        self.events
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    fn record(&self, event: ListenerEvent) {
        self.events
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(event);
    }
}

impl SubscriptionListener for RecordingListener {
    fn on_open(&self, modeluri: &str) {
        self.record(ListenerEvent::Open(modeluri.to_owned()));
    }

    fn on_close(&self, close: &CloseNotification) {
        self.record(ListenerEvent::Close(close.clone()));
    }

    fn on_error(&self, error: &ErrorNotification) {
        self.record(ListenerEvent::Error(error.clone()));
    }

    fn on_success(&self, _modeluri: &str, keep_alive: bool, data: &Value) {
        self.record(ListenerEvent::Success {
            keep_alive,
            data: data.clone(),
        });
    }

    fn on_dirty_state(&self, modeluri: &str, is_dirty: bool) {
        self.record(ListenerEvent::DirtyState {
            modeluri: modeluri.to_owned(),
            is_dirty,
        });
    }

    fn on_incremental_update(&self, _modeluri: &str, update: &IncrementalUpdate) {
        self.record(ListenerEvent::IncrementalUpdate(update.clone()));
    }

    fn on_full_update(&self, _modeluri: &str, model: &FullModel) {
        self.record(ListenerEvent::FullUpdate(model.clone()));
    }

    fn on_validation_result(&self, _modeluri: &str, diagnostic: &Diagnostic) {
        self.record(ListenerEvent::ValidationResult(diagnostic.clone()));
    }

    fn on_unknown(&self, _modeluri: &str, envelope: &Envelope) {
        self.record(ListenerEvent::Unknown(envelope.clone()));
    }
}
