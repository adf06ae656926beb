//! An in-memory [`EditorHost`] for running entries without an editor.
//!
//! Commands, buttons and views are tracked in memory and every host call is appended to an
//! event log. Hook code is recorded rather than evaluated.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::{Mutex, MutexGuard};

use async_trait::async_trait;
use serde_json::Value;
use tracing::{debug, info};

use crate::error::{EngineError, Result};
use crate::host::{
    ActiveEditor, ButtonId, ButtonRequest, EditorHost, EditorListener, SubscriptionId, ViewId,
    ViewRequest,
};

/// One call made against the host.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HostEvent {
    CommandRegistered(String),
    CommandUnregistered(String),
    ButtonCreated(ButtonId),
    ButtonVisibility(ButtonId, bool),
    ButtonDisposed(ButtonId),
    CodeExecuted(String),
    ViewOpened(ViewId),
    ViewClosed(ViewId),
}

#[derive(Default)]
struct HostState {
    next_id: u64,
    commands: HashSet<String>,
    buttons: BTreeMap<u64, (ButtonRequest, bool)>,
    views: BTreeMap<u64, ViewRequest>,
    listeners: HashMap<u64, EditorListener>,
    active_editor: Option<ActiveEditor>,
    events: Vec<HostEvent>,
}

impl HostState {
    fn next_id(&mut self) -> u64 {
        self.next_id += 1;
        self.next_id
    }
}

#[derive(Default)]
pub struct HeadlessHost {
    state: Mutex<HostState>,
    platform: Option<String>,
}

impl HeadlessHost {
    pub fn new() -> Self {
        Self::default()
    }

    /// Reports `os` instead of the real operating system.
    pub fn with_platform(os: impl Into<String>) -> Self {
        Self {
            state: Mutex::default(),
            platform: Some(os.into()),
        }
    }

    fn lock(&self) -> MutexGuard<'_, HostState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Changes the active editor and notifies subscribers.
    pub fn set_active_editor(&self, editor: Option<ActiveEditor>) {
        let listeners: Vec<EditorListener> = {
            let mut state = self.lock();
            state.active_editor = editor.clone();
            state.listeners.values().cloned().collect()
        };

        for listener in listeners {
            listener(editor.clone());
        }
    }

    pub fn events(&self) -> Vec<HostEvent> {
        self.lock().events.clone()
    }

    pub fn clear_events(&self) {
        self.lock().events.clear();
    }

    pub fn has_command(&self, id: &str) -> bool {
        self.lock().commands.contains(id)
    }

    pub fn commands(&self) -> Vec<String> {
        let mut commands: Vec<String> = self.lock().commands.iter().cloned().collect();
        commands.sort();
        commands
    }

    /// A live button and whether it is shown.
    pub fn button(&self, id: ButtonId) -> Option<(ButtonRequest, bool)> {
        self.lock().buttons.get(&id.0).cloned()
    }

    pub fn buttons(&self) -> Vec<(ButtonId, ButtonRequest, bool)> {
        self.lock()
            .buttons
            .iter()
            .map(|(id, (request, visible))| (ButtonId(*id), request.clone(), *visible))
            .collect()
    }

    pub fn view(&self, id: ViewId) -> Option<ViewRequest> {
        self.lock().views.get(&id.0).cloned()
    }

    pub fn views(&self) -> Vec<(ViewId, ViewRequest)> {
        self.lock()
            .views
            .iter()
            .map(|(id, view)| (ViewId(*id), view.clone()))
            .collect()
    }

    pub fn subscriber_count(&self) -> usize {
        self.lock().listeners.len()
    }
}

#[async_trait]
impl EditorHost for HeadlessHost {
    fn register_command(&self, id: &str) -> Result<()> {
        let mut state = self.lock();
        if !state.commands.insert(id.to_string()) {
            return Err(EngineError::RegistrationConflict(id.to_string()));
        }
        state.events.push(HostEvent::CommandRegistered(id.to_string()));
        Ok(())
    }

    fn unregister_command(&self, id: &str) {
        let mut state = self.lock();
        if state.commands.remove(id) {
            state
                .events
                .push(HostEvent::CommandUnregistered(id.to_string()));
        }
    }

    fn create_button(&self, request: ButtonRequest) -> Result<ButtonId> {
        let mut state = self.lock();
        if !state.commands.contains(&request.command) {
            return Err(EngineError::Host(format!(
                "button bound to unknown command '{}'",
                request.command
            )));
        }

        let id = state.next_id();
        state.buttons.insert(id, (request, false));
        state.events.push(HostEvent::ButtonCreated(ButtonId(id)));
        Ok(ButtonId(id))
    }

    fn set_button_visible(&self, button: ButtonId, visible: bool) {
        let mut guard = self.lock();
        let state = &mut *guard;
        if let Some((_, shown)) = state.buttons.get_mut(&button.0) {
            *shown = visible;
            state.events.push(HostEvent::ButtonVisibility(button, visible));
        }
    }

    fn dispose_button(&self, button: ButtonId) {
        let mut state = self.lock();
        if state.buttons.remove(&button.0).is_some() {
            state.events.push(HostEvent::ButtonDisposed(button));
        }
    }

    fn active_editor(&self) -> Option<ActiveEditor> {
        self.lock().active_editor.clone()
    }

    fn subscribe_active_editor_changed(&self, listener: EditorListener) -> SubscriptionId {
        let mut state = self.lock();
        let id = state.next_id();
        state.listeners.insert(id, listener);
        SubscriptionId(id)
    }

    fn unsubscribe(&self, subscription: SubscriptionId) {
        self.lock().listeners.remove(&subscription.0);
    }

    fn platform(&self) -> String {
        self.platform
            .clone()
            .unwrap_or_else(|| std::env::consts::OS.to_string())
    }

    /// `false`, `0`, `no` and `off` are false; anything else is true.
    fn evaluate_filter(&self, code: &str) -> bool {
        !matches!(
            code.trim().to_lowercase().as_str(),
            "false" | "0" | "no" | "off"
        )
    }

    async fn execute_code(&self, code: &str, context: &Value) -> Result<Value> {
        debug!(code, key = %context["key"], "Hook code");
        self.lock()
            .events
            .push(HostEvent::CodeExecuted(code.to_string()));
        Ok(Value::Null)
    }

    async fn open_view(&self, request: ViewRequest) -> Result<ViewId> {
        let mut state = self.lock();
        let id = state.next_id();
        info!(app = %request.app, title = %request.title, "Opened view");
        state.views.insert(id, request);
        state.events.push(HostEvent::ViewOpened(ViewId(id)));
        Ok(ViewId(id))
    }

    fn close_view(&self, view: ViewId) {
        let mut state = self.lock();
        if state.views.remove(&view.0).is_some() {
            state.events.push(HostEvent::ViewClosed(view));
        }
    }
}
