//! Callback interface for subscription notifications.

use serde_json::Value;

use super::notification::{
    CloseNotification, ErrorNotification, FullModel, IncrementalUpdate, Notification,
};
use crate::diagnostic::Diagnostic;
use crate::envelope::Envelope;

/// Receives notifications for one subscribed model.
///
/// Every method defaults to a no-op so listeners implement only what they
/// care about. Callbacks run on the thread that delivered the transport
/// event, never while the manager's lock is held.
pub trait SubscriptionListener: Send + Sync {
    /// The channel opened.
    fn on_open(&self, _modeluri: &str) {}

    /// The channel closed and the subscription ended.
    fn on_close(&self, _close: &CloseNotification) {}

    /// The channel failed or a message could not be decoded.
    fn on_error(&self, _error: &ErrorNotification) {}

    /// A `success` or `keepAlive` message arrived.
    fn on_success(&self, _modeluri: &str, _keep_alive: bool, _data: &Value) {}

    /// The model's dirty flag changed.
    fn on_dirty_state(&self, _modeluri: &str, _is_dirty: bool) {}

    /// The model changed.
    fn on_incremental_update(&self, _modeluri: &str, _update: &IncrementalUpdate) {}

    /// The model was replaced.
    fn on_full_update(&self, _modeluri: &str, _model: &FullModel) {}

    /// Live validation produced a result.
    fn on_validation_result(&self, _modeluri: &str, _diagnostic: &Diagnostic) {}

    /// A message type without a dedicated callback arrived.
    fn on_unknown(&self, _modeluri: &str, _envelope: &Envelope) {}

    /// Routes a notification to exactly one of the callbacks above.
    fn on_notification(&self, notification: &Notification) {
        match notification {
            Notification::Open { modeluri } => self.on_open(modeluri),
            Notification::Close(close) => self.on_close(close),
            Notification::Error(error) => self.on_error(error),
            Notification::Success {
                modeluri,
                keep_alive,
                data,
            } => self.on_success(modeluri, *keep_alive, data),
            Notification::DirtyState { modeluri, is_dirty } => {
                self.on_dirty_state(modeluri, *is_dirty);
            }
            Notification::IncrementalUpdate { modeluri, update } => {
                self.on_incremental_update(modeluri, update);
            }
            Notification::FullUpdate { modeluri, model } => self.on_full_update(modeluri, model),
            Notification::ValidationResult {
                modeluri,
                diagnostic,
            } => self.on_validation_result(modeluri, diagnostic),
            Notification::Unknown { modeluri, envelope } => self.on_unknown(modeluri, envelope),
        }
    }
}
