//! The editor's side of the runtime: commands, status buttons, views and focus changes.

use std::path::PathBuf;
use std::sync::Arc;

use async_trait::async_trait;
use serde::Serialize;
use serde_json::Value;

use crate::error::Result;

/// The file focused in the editor.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ActiveEditor {
    pub path: PathBuf,
    pub language: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ButtonId(pub u64);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ViewId(pub u64);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(pub u64);

/// A status bar button bound to a command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ButtonRequest {
    pub text: String,
    pub tooltip: String,
    pub color: Option<String>,
    pub command: String,
}

/// A view to open for an app.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ViewRequest {
    /// Key of the app the view belongs to.
    pub app: String,
    pub title: String,
    pub html: String,
    /// Render `html` as a component template rather than a plain document.
    pub component_mode: bool,
}

pub type EditorListener = Arc<dyn Fn(Option<ActiveEditor>) + Send + Sync>;

/// Everything the runtime needs from the editor it is embedded in.
///
/// Registration calls are synchronous; code evaluation and views may suspend.
#[async_trait]
pub trait EditorHost: Send + Sync {
    /// Registers `id` as a command. Fails with `RegistrationConflict` if it is taken.
    fn register_command(&self, id: &str) -> Result<()>;

    fn unregister_command(&self, id: &str);

    fn create_button(&self, request: ButtonRequest) -> Result<ButtonId>;

    fn set_button_visible(&self, button: ButtonId, visible: bool);

    fn dispose_button(&self, button: ButtonId);

    fn active_editor(&self) -> Option<ActiveEditor>;

    /// Calls `listener` whenever the active editor changes.
    fn subscribe_active_editor_changed(&self, listener: EditorListener) -> SubscriptionId;

    fn unsubscribe(&self, subscription: SubscriptionId);

    /// Operating system name in `std::env::consts::OS` form.
    fn platform(&self) -> String {
        std::env::consts::OS.to_string()
    }

    /// Evaluates an entry's filter condition.
    fn evaluate_filter(&self, code: &str) -> bool;

    /// Runs hook code (`onCreated`, `onDestroyed`, `onEditorChanged`) with `context`.
    async fn execute_code(&self, code: &str, context: &Value) -> Result<Value>;

    async fn open_view(&self, request: ViewRequest) -> Result<ViewId>;

    fn close_view(&self, view: ViewId);
}
