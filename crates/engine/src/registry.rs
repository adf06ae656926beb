//! Turning declared entries into live commands, buttons and app views.
//!
//! Each [`reload`](LifecycleManager::reload) replaces the whole set of live bindings. Every
//! binding of the previous generation is released before the first binding of the next one
//! is created, so an id can be registered again right after a reload. Entries are bound one
//! at a time in declaration order; a failing entry is rolled back and logged without
//! affecting the others.

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, RwLock, Weak};

use regex::Regex;
use serde_json::{Value, json};
use tracing::{debug, error, info, warn};
use workbench_types::{EntriesDocument, Entry, VisibilityCondition, non_empty};

use crate::context::{ExecutionInfo, InvocationContext, split_host_arguments};
use crate::error::{EngineError, Result};
use crate::host::{
    ActiveEditor, ButtonId, ButtonRequest, EditorHost, EditorListener, SubscriptionId, ViewId,
    ViewRequest,
};
use crate::module::{
    EVENT_CREATE, EVENT_DESTROY, EVENT_EXECUTE, EVENT_MESSAGE, EVENT_RENDER, ModuleCache,
    ModuleLoader, ScriptModule,
};
use crate::state::{ScopedStateStore, StateCell, StateScope};
use crate::values::ValueContext;

/// Prefix of the command ids generated for app buttons.
pub const APP_BUTTON_COMMAND_PREFIX: &str = "workbench.buttons.appBtn";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EntryKind {
    Command,
    App,
}

/// Outcome of one reload, by entry key.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReloadReport {
    pub bound: Vec<String>,
    /// Entries whose platform or filter condition did not match.
    pub skipped: Vec<String>,
    pub failed: Vec<String>,
}

/// Settings for a [`LifecycleManager`].
#[derive(Debug, Clone, Default)]
pub struct ManagerOptions {
    /// Directory relative script paths are resolved against.
    pub script_root: PathBuf,
    /// Scope for state cells. `None` uses the store's default scope.
    pub state_scope: Option<StateScope>,
}

enum AppView {
    Closed,
    Opening,
    Open(ViewId),
}

struct Visibility {
    languages: Vec<String>,
    file_pattern: Option<Regex>,
    requires_editor: bool,
}

impl Visibility {
    fn compile(key: &str, condition: &VisibilityCondition) -> Self {
        let file_pattern = non_empty(condition.file_pattern.as_deref()).and_then(|pattern| {
            Regex::new(&pattern)
                .inspect_err(|e| warn!(entry = key, error = %e, "Ignoring invalid file pattern"))
                .ok()
        });

        Self {
            languages: condition
                .languages
                .iter()
                .filter_map(|l| non_empty(Some(l)))
                .map(|l| l.to_lowercase())
                .collect(),
            file_pattern,
            requires_editor: condition.requires_editor,
        }
    }

    fn matches(&self, editor: Option<&ActiveEditor>) -> bool {
        let Some(editor) = editor else {
            return !self.requires_editor && self.languages.is_empty() && self.file_pattern.is_none();
        };

        let language_ok = self.languages.is_empty()
            || self.languages.contains(&editor.language.to_lowercase());
        let path_ok = self
            .file_pattern
            .as_ref()
            .is_none_or(|p| p.is_match(&editor.path.to_string_lossy()));
        language_ok && path_ok
    }
}

struct BoundButton {
    id: ButtonId,
    visibility: Option<Visibility>,
    on_editor_changed: Option<String>,
}

struct LiveBinding {
    kind: EntryKind,
    key: String,
    /// Command registered with the host: the entry id, or an app's generated button command.
    command_id: Option<String>,
    entry: Entry,
    script: PathBuf,
    state: StateCell,
    button: Option<BoundButton>,
    module: Option<Arc<dyn ScriptModule>>,
    view: AppView,
}

/// A snapshot of what a handler call needs, taken so no lock is held while it runs.
struct Target {
    key: String,
    script: PathBuf,
    options: Value,
    state: StateCell,
    module: Option<Arc<dyn ScriptModule>>,
}

enum Dispatch {
    Command(Target),
    OpenApp(String),
}

/// Owns the live bindings of the current generation.
pub struct LifecycleManager {
    host: Arc<dyn EditorHost>,
    modules: ModuleCache,
    state: Arc<ScopedStateStore>,
    scope: Option<StateScope>,
    values: RwLock<ValueContext>,
    script_root: PathBuf,
    bindings: Mutex<Vec<LiveBinding>>,
    generation: AtomicU64,
    reload_lock: tokio::sync::Mutex<()>,
    subscription: Mutex<Option<SubscriptionId>>,
}

impl LifecycleManager {
    /// Creates the manager and subscribes it to active-editor changes.
    pub fn new(
        host: Arc<dyn EditorHost>,
        loader: Arc<dyn ModuleLoader>,
        state: Arc<ScopedStateStore>,
        options: ManagerOptions,
    ) -> Arc<Self> {
        Arc::new_cyclic(|weak: &Weak<Self>| {
            let weak = weak.clone();
            let listener: EditorListener = Arc::new(move |editor: Option<ActiveEditor>| {
                if let Some(manager) = weak.upgrade() {
                    manager.on_active_editor_changed(editor);
                }
            });
            let subscription = host.subscribe_active_editor_changed(listener);

            Self {
                host,
                modules: ModuleCache::new(loader),
                state,
                scope: options.state_scope,
                values: RwLock::new(ValueContext::new()),
                script_root: options.script_root,
                bindings: Mutex::new(Vec::new()),
                generation: AtomicU64::new(0),
                reload_lock: tokio::sync::Mutex::new(()),
                subscription: Mutex::new(Some(subscription)),
            }
        })
    }

    fn bindings(&self) -> MutexGuard<'_, Vec<LiveBinding>> {
        self.bindings.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Replaces the values placeholders resolve against.
    pub fn set_values(&self, values: ValueContext) {
        *self.values.write().unwrap_or_else(|e| e.into_inner()) = values;
    }

    fn resolve(&self, template: &str) -> String {
        self.values
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .resolve(template)
    }

    /// Number of completed reloads.
    pub fn generation(&self) -> u64 {
        self.generation.load(Ordering::SeqCst)
    }

    /// Releases the current generation and binds every entry of `document`.
    pub async fn reload(&self, document: &EntriesDocument) -> ReloadReport {
        let _reload = self.reload_lock.lock().await;

        let old: Vec<LiveBinding> = std::mem::take(&mut *self.bindings());
        if !old.is_empty() {
            debug!(count = old.len(), "Releasing previous generation");
        }
        for binding in old {
            self.release(binding).await;
        }
        self.modules.clear();

        let mut report = ReloadReport::default();
        let mut fresh: Vec<LiveBinding> = Vec::new();
        // Every key read so far, whether it was bound, skipped or failed.
        let mut seen: HashSet<(EntryKind, String)> = HashSet::new();
        let mut app_buttons = 0usize;

        let commands = document
            .commands
            .iter()
            .map(|(key, entry)| (EntryKind::Command, key.trim().to_string(), entry.clone()));
        let apps = document.apps.iter().map(|app| {
            let entry = app.clone().into_entry();
            (EntryKind::App, entry.script.trim().to_string(), entry)
        });

        for (kind, key, entry) in commands.chain(apps) {
            if key.is_empty() {
                warn!(?kind, "Ignoring entry without a key");
                continue;
            }
            if !seen.insert((kind, key.clone())) {
                warn!(entry = %key, "Ignoring duplicate entry");
                report.failed.push(key);
                continue;
            }

            match self.bind(kind, &key, entry, &mut app_buttons).await {
                Ok(Some(binding)) => {
                    report.bound.push(key);
                    fresh.push(binding);
                }
                Ok(None) => report.skipped.push(key),
                Err(e) => {
                    error!(entry = %key, error = %e, "Failed to bind entry");
                    report.failed.push(key);
                }
            }
        }

        *self.bindings() = fresh;
        self.generation.fetch_add(1, Ordering::SeqCst);
        info!(
            bound = report.bound.len(),
            skipped = report.skipped.len(),
            failed = report.failed.len(),
            "Entries reloaded"
        );
        report
    }

    async fn bind(
        &self,
        kind: EntryKind,
        key: &str,
        entry: Entry,
        app_buttons: &mut usize,
    ) -> Result<Option<LiveBinding>> {
        let platform = self.host.platform();
        if let Some(condition) = &entry.platform_condition {
            if !condition.matches(&platform) {
                debug!(entry = key, platform = %platform, "Skipping entry for other platform");
                return Ok(None);
            }
        }
        if let Some(filter) = non_empty(entry.filter_condition.as_deref()) {
            if !self.host.evaluate_filter(&filter) {
                debug!(entry = key, "Skipping entry, filter did not match");
                return Ok(None);
            }
        }

        let script_path = entry.script.trim();
        if script_path.is_empty() {
            return Err(EngineError::script_load(PathBuf::new(), "no script configured"));
        }
        let script = self.resolve_script(script_path);

        let command_id = match kind {
            EntryKind::Command => Some(key.to_string()),
            EntryKind::App if entry.button.is_some() => {
                *app_buttons += 1;
                Some(format!("{APP_BUTTON_COMMAND_PREFIX}{app_buttons}"))
            }
            EntryKind::App => None,
        };
        if let Some(id) = &command_id {
            self.host.register_command(id)?;
        }

        let button = match (&entry.button, &command_id) {
            (Some(declared), Some(id)) => {
                let request = ButtonRequest {
                    text: non_empty(declared.text.as_deref())
                        .map(|t| self.resolve(&t))
                        .unwrap_or_else(|| self.display_name(kind, key, &entry)),
                    tooltip: non_empty(declared.tooltip.as_deref())
                        .map(|t| self.resolve(&t))
                        .unwrap_or_else(|| self.resolve(key)),
                    color: non_empty(declared.color.as_deref()).map(|c| self.resolve(&c)),
                    command: id.clone(),
                };
                match self.host.create_button(request) {
                    Ok(id) => Some(BoundButton {
                        id,
                        visibility: declared.visibility.as_ref().map(|v| Visibility::compile(key, v)),
                        on_editor_changed: non_empty(declared.on_editor_changed.as_deref()),
                    }),
                    Err(e) => {
                        self.rollback(command_id.as_deref(), None);
                        return Err(e);
                    }
                }
            }
            _ => None,
        };

        let state = self.state.get_or_create(
            &script.to_string_lossy(),
            self.scope.as_ref(),
            entry.state.clone(),
        );

        let mut binding = LiveBinding {
            kind,
            key: key.to_string(),
            command_id,
            entry,
            script,
            state,
            button,
            module: None,
            view: AppView::Closed,
        };

        // Apps load their module on first open.
        if kind == EntryKind::Command {
            match self.load_module(&binding).await {
                Ok(module) => binding.module = Some(module),
                Err(e) => {
                    self.rollback(
                        binding.command_id.as_deref(),
                        binding.button.as_ref().map(|b| b.id),
                    );
                    return Err(e);
                }
            }
        }

        if let Some(code) = non_empty(binding.entry.on_created.as_deref()) {
            if let Err(e) = self.host.execute_code(&code, &self.hook_context(&binding)).await {
                warn!(entry = key, error = %e, "onCreated hook failed");
            }
        }

        if let Some(button) = &binding.button {
            let visible = button
                .visibility
                .as_ref()
                .is_none_or(|v| v.matches(self.host.active_editor().as_ref()));
            self.host.set_button_visible(button.id, visible);
        }

        Ok(Some(binding))
    }

    /// Loads the binding's module and runs its create handler.
    async fn load_module(&self, binding: &LiveBinding) -> Result<Arc<dyn ScriptModule>> {
        let module = self.modules.get_or_load(&binding.script).await?;
        if module.has_handler(EVENT_CREATE) {
            let ctx = self.context(&Self::target(binding), None, Vec::new(), None, None);
            module
                .call(EVENT_CREATE, ctx)
                .await
                .map_err(|e| EngineError::script_load(&binding.script, e))?;
        }
        Ok(module)
    }

    fn rollback(&self, command_id: Option<&str>, button: Option<ButtonId>) {
        if let Some(button) = button {
            self.host.set_button_visible(button, false);
            self.host.dispose_button(button);
        }
        if let Some(id) = command_id {
            self.host.unregister_command(id);
        }
    }

    async fn release(&self, binding: LiveBinding) {
        self.rollback(
            binding.command_id.as_deref(),
            binding.button.as_ref().map(|b| b.id),
        );
        if let AppView::Open(view) = binding.view {
            self.host.close_view(view);
        }

        if let Some(module) = &binding.module {
            if module.has_handler(EVENT_DESTROY) {
                let ctx = self.context(&Self::target(&binding), None, Vec::new(), None, None);
                if let Err(e) = module.call(EVENT_DESTROY, ctx).await {
                    warn!(entry = %binding.key, error = %e, "Destroy handler failed");
                }
            }
        }

        if let Some(code) = non_empty(binding.entry.on_destroyed.as_deref()) {
            if let Err(e) = self.host.execute_code(&code, &self.hook_context(&binding)).await {
                warn!(entry = %binding.key, error = %e, "onDestroyed hook failed");
            }
        }
    }

    fn resolve_script(&self, script: &str) -> PathBuf {
        let path = Path::new(script);
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.script_root.join(path)
        }
    }

    fn display_name(&self, kind: EntryKind, key: &str, entry: &Entry) -> String {
        match non_empty(entry.name.as_deref()) {
            Some(name) => self.resolve(&name),
            None if kind == EntryKind::App => entry.script.trim().to_string(),
            None => key.to_string(),
        }
    }

    fn target(binding: &LiveBinding) -> Target {
        Target {
            key: binding.key.clone(),
            script: binding.script.clone(),
            options: binding.entry.options.clone().unwrap_or(Value::Null),
            state: binding.state.clone(),
            module: binding.module.clone(),
        }
    }

    fn context(
        &self,
        target: &Target,
        host_context: Option<Value>,
        arguments: Vec<Value>,
        event: Option<String>,
        data: Option<Value>,
    ) -> InvocationContext {
        InvocationContext {
            key: target.key.clone(),
            script: target.script.clone(),
            arguments,
            options: target.options.clone(),
            execution: ExecutionInfo {
                host_context,
                active_editor: self.host.active_editor(),
                platform: self.host.platform(),
            },
            state: target.state.clone(),
            event,
            data,
        }
    }

    fn hook_context(&self, binding: &LiveBinding) -> Value {
        json!({
            "key": binding.key,
            "script": binding.script,
            "options": binding.entry.options,
            "state": binding.state.get(),
            "activeEditor": self.host.active_editor(),
        })
    }

    /// Commands and apps have separate key spaces, so lookups need both.
    fn with_binding<T>(
        &self,
        kind: EntryKind,
        key: &str,
        f: impl FnOnce(&LiveBinding) -> T,
    ) -> Option<T> {
        self.bindings()
            .iter()
            .find(|b| b.kind == kind && b.key == key)
            .map(f)
    }

    /// Keys of the live command bindings, in binding order.
    pub fn command_ids(&self) -> Vec<String> {
        self.keys(EntryKind::Command)
    }

    /// Keys of the live app bindings, in binding order.
    pub fn app_keys(&self) -> Vec<String> {
        self.keys(EntryKind::App)
    }

    fn keys(&self, kind: EntryKind) -> Vec<String> {
        self.bindings()
            .iter()
            .filter(|b| b.kind == kind)
            .map(|b| b.key.clone())
            .collect()
    }

    /// Command id an app's button triggers, if it has one.
    pub fn button_command(&self, key: &str) -> Option<String> {
        self.with_binding(EntryKind::App, key, |b| b.command_id.clone())
            .flatten()
    }

    /// Display name, resolved against the current values.
    pub fn name(&self, kind: EntryKind, key: &str) -> Option<String> {
        let entry = self.with_binding(kind, key, |b| b.entry.clone())?;
        Some(self.display_name(kind, key, &entry))
    }

    /// Description, resolved against the current values.
    pub fn description(&self, kind: EntryKind, key: &str) -> Option<String> {
        let description = self.with_binding(kind, key, |b| b.entry.description.clone())??;
        non_empty(Some(&description)).map(|d| self.resolve(&d))
    }

    /// Button text, resolved against the current values. Falls back to the name.
    pub fn button_text(&self, kind: EntryKind, key: &str) -> Option<String> {
        let text = self.with_binding(kind, key, |b| {
            b.button.as_ref()?;
            Some(b.entry.button.as_ref().and_then(|s| s.text.clone()))
        })??;
        match non_empty(text.as_deref()) {
            Some(text) => Some(self.resolve(&text)),
            None => self.name(kind, key),
        }
    }

    /// Resolved script path.
    pub fn detail(&self, kind: EntryKind, key: &str) -> Option<String> {
        self.with_binding(kind, key, |b| b.script.to_string_lossy().to_string())
    }

    /// Runs the command `id`.
    ///
    /// `args` are the arguments as the host delivers them: the first one is the host's own
    /// context and is not passed on as a caller argument. An app button command opens its
    /// app and returns whether a view was opened.
    pub async fn execute(&self, id: &str, args: Vec<Value>) -> Result<Value> {
        let (host_context, arguments) = split_host_arguments(args);

        let dispatch = {
            let bindings = self.bindings();
            let binding = bindings
                .iter()
                .find(|b| b.command_id.as_deref() == Some(id))
                .ok_or_else(|| EngineError::UnknownCommand(id.to_string()))?;
            match binding.kind {
                EntryKind::Command => Dispatch::Command(Self::target(binding)),
                EntryKind::App => Dispatch::OpenApp(binding.key.clone()),
            }
        };

        match dispatch {
            Dispatch::Command(target) => {
                let module = target
                    .module
                    .clone()
                    .ok_or_else(|| EngineError::UnknownCommand(id.to_string()))?;
                let ctx = self.context(&target, host_context, arguments, None, None);
                debug!(command = id, "Executing command");
                module.call(EVENT_EXECUTE, ctx).await
            }
            Dispatch::OpenApp(key) => self.open_app(&key).await.map(Value::Bool),
        }
    }

    /// Opens the app `key` in a view. Returns `false` if it is already open.
    pub async fn open_app(&self, key: &str) -> Result<bool> {
        let target = {
            let mut bindings = self.bindings();
            let binding = bindings
                .iter_mut()
                .find(|b| b.kind == EntryKind::App && b.key == key)
                .ok_or_else(|| EngineError::UnknownCommand(key.to_string()))?;
            if !matches!(binding.view, AppView::Closed) {
                return Ok(false);
            }
            binding.view = AppView::Opening;
            (Self::target(binding), binding.entry.clone())
        };
        let generation = self.generation();

        let opened = self.render_view(&target.0, &target.1).await;

        let mut bindings = self.bindings();
        let binding = bindings
            .iter_mut()
            .find(|b| b.kind == EntryKind::App && b.key == key)
            .filter(|_| self.generation() == generation);

        match (opened, binding) {
            (Ok((module, view)), Some(binding)) => {
                binding.module = Some(module);
                binding.view = AppView::Open(view);
                info!(app = key, "App opened");
                Ok(true)
            }
            (Ok((_, view)), None) => {
                // Reloaded while opening.
                self.host.close_view(view);
                Ok(false)
            }
            (Err(e), binding) => {
                if let Some(binding) = binding {
                    binding.view = AppView::Closed;
                }
                Err(e)
            }
        }
    }

    async fn render_view(
        &self,
        target: &Target,
        entry: &Entry,
    ) -> Result<(Arc<dyn ScriptModule>, ViewId)> {
        let module = match &target.module {
            Some(module) => module.clone(),
            None => {
                let module = self.modules.get_or_load(&target.script).await?;
                if module.has_handler(EVENT_CREATE) {
                    let ctx = self.context(target, None, Vec::new(), None, None);
                    module.call(EVENT_CREATE, ctx).await?;
                }
                module
            }
        };

        let ctx = self.context(target, None, Vec::new(), None, None);
        let html = match module.call(EVENT_RENDER, ctx).await? {
            Value::String(html) => html,
            Value::Null => String::new(),
            other => other.to_string(),
        };

        let view = self
            .host
            .open_view(ViewRequest {
                app: target.key.clone(),
                title: self.display_name(EntryKind::App, &target.key, entry),
                html,
                component_mode: entry.vue,
            })
            .await?;
        Ok((module, view))
    }

    /// Closes the app's view. Returns `false` if it was not open.
    pub fn close_app(&self, key: &str) -> bool {
        let mut bindings = self.bindings();
        let Some(binding) = bindings
            .iter_mut()
            .find(|b| b.kind == EntryKind::App && b.key == key)
        else {
            return false;
        };

        match std::mem::replace(&mut binding.view, AppView::Closed) {
            AppView::Open(view) => {
                self.host.close_view(view);
                true
            }
            other => {
                binding.view = other;
                false
            }
        }
    }

    /// Forwards a message from an open app view to the app's module.
    pub async fn post_message(&self, key: &str, event: &str, data: Value) -> Result<Value> {
        let target = self
            .with_binding(EntryKind::App, key, |b| {
                matches!(b.view, AppView::Open(_)).then(|| Self::target(b))
            })
            .flatten()
            .ok_or_else(|| EngineError::UnknownCommand(key.to_string()))?;
        let module = target
            .module
            .clone()
            .ok_or_else(|| EngineError::UnknownCommand(key.to_string()))?;

        let ctx = self.context(&target, None, Vec::new(), Some(event.to_string()), Some(data));
        module.call(EVENT_MESSAGE, ctx).await
    }

    fn on_active_editor_changed(self: Arc<Self>, editor: Option<ActiveEditor>) {
        let has_hooks = self.refresh_visibility(editor.as_ref());
        if !has_hooks {
            return;
        }

        match tokio::runtime::Handle::try_current() {
            Ok(handle) => {
                handle.spawn(async move { self.run_editor_changed_hooks().await });
            }
            Err(_) => debug!("No runtime, skipping onEditorChanged hooks"),
        }
    }

    /// Shows or hides every button according to its visibility condition. Returns true if any
    /// button has an `onEditorChanged` hook.
    pub fn refresh_visibility(&self, editor: Option<&ActiveEditor>) -> bool {
        let bindings = self.bindings();
        let mut has_hooks = false;
        for button in bindings.iter().filter_map(|b| b.button.as_ref()) {
            if let Some(visibility) = &button.visibility {
                self.host.set_button_visible(button.id, visibility.matches(editor));
            }
            has_hooks |= button.on_editor_changed.is_some();
        }
        has_hooks
    }

    /// Runs the `onEditorChanged` hook of every bound button, one after the other.
    pub async fn run_editor_changed_hooks(&self) {
        let hooks: Vec<(String, String, Value)> = {
            let bindings = self.bindings();
            bindings
                .iter()
                .filter_map(|b| {
                    let code = b.button.as_ref()?.on_editor_changed.clone()?;
                    Some((b.key.clone(), code, self.hook_context(b)))
                })
                .collect()
        };

        for (key, code, context) in hooks {
            if let Err(e) = self.host.execute_code(&code, &context).await {
                warn!(entry = %key, error = %e, "onEditorChanged hook failed");
            }
        }
    }

    /// Ends the editor subscription and releases every binding.
    pub async fn dispose(&self) {
        let _reload = self.reload_lock.lock().await;

        let subscription = self
            .subscription
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .take();
        if let Some(subscription) = subscription {
            self.host.unsubscribe(subscription);
        }

        let old: Vec<LiveBinding> = std::mem::take(&mut *self.bindings());
        for binding in old {
            self.release(binding).await;
        }
        self.modules.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::headless::{HeadlessHost, HostEvent};
    use crate::module::{FnModule, StaticModuleLoader};
    use crate::values::StaticValue;
    use serde_json::json;
    use std::sync::atomic::AtomicUsize;

    struct Fixture {
        host: Arc<HeadlessHost>,
        loader: Arc<StaticModuleLoader>,
        state: Arc<ScopedStateStore>,
        manager: Arc<LifecycleManager>,
    }

    fn fixture() -> Fixture {
        let host = Arc::new(HeadlessHost::with_platform("linux"));
        let loader = Arc::new(StaticModuleLoader::new());
        let state = Arc::new(ScopedStateStore::new());
        let manager = LifecycleManager::new(
            host.clone(),
            loader.clone(),
            state.clone(),
            ManagerOptions {
                script_root: PathBuf::from("/scripts"),
                state_scope: None,
            },
        );
        Fixture {
            host,
            loader,
            state,
            manager,
        }
    }

    fn echo_module(path: &str) -> FnModule {
        FnModule::new(path).on(EVENT_EXECUTE, |ctx| async move {
            Ok(json!({ "key": ctx.key, "args": ctx.arguments }))
        })
    }

    fn document(value: Value) -> EntriesDocument {
        serde_json::from_value(value).unwrap()
    }

    #[tokio::test]
    async fn registers_commands_and_executes_them() {
        let f = fixture();
        f.loader.register(echo_module("/scripts/a.sh"));

        let report = f
            .manager
            .reload(&document(json!({
                "commands": { " my.cmd ": { "script": "a.sh" } }
            })))
            .await;

        assert_eq!(report.bound, vec!["my.cmd"]);
        assert!(f.host.has_command("my.cmd"));

        let result = f
            .manager
            .execute("my.cmd", vec![json!({ "host": true }), json!(1), json!("two")])
            .await
            .unwrap();
        assert_eq!(result, json!({ "key": "my.cmd", "args": [1, "two"] }));
    }

    #[tokio::test]
    async fn reload_releases_before_registering_again() {
        let f = fixture();
        f.loader.register(echo_module("/scripts/a.sh"));
        let doc = document(json!({
            "commands": { "my.cmd": { "script": "a.sh", "button": { "text": "A" } } }
        }));

        f.manager.reload(&doc).await;
        f.host.clear_events();
        let report = f.manager.reload(&doc).await;

        assert_eq!(report.bound, vec!["my.cmd"]);
        let events = f.host.events();
        let unregistered = events
            .iter()
            .position(|e| *e == HostEvent::CommandUnregistered("my.cmd".into()))
            .unwrap();
        let registered = events
            .iter()
            .position(|e| *e == HostEvent::CommandRegistered("my.cmd".into()))
            .unwrap();
        assert!(unregistered < registered);
        assert_eq!(f.host.buttons().len(), 1);
        assert_eq!(f.manager.generation(), 2);
    }

    #[tokio::test]
    async fn failing_entry_is_rolled_back_and_others_continue() {
        let f = fixture();
        f.loader.register(echo_module("/scripts/ok.sh"));
        f.loader.register_failure("/scripts/broken.sh", "boom");

        let report = f
            .manager
            .reload(&document(json!({
                "commands": {
                    "broken": { "script": "broken.sh", "button": { "text": "B" }, "onCreated": "created()" },
                    "ok": { "script": "ok.sh" }
                }
            })))
            .await;

        assert_eq!(report.failed, vec!["broken"]);
        assert_eq!(report.bound, vec!["ok"]);
        assert!(!f.host.has_command("broken"));
        assert!(f.host.buttons().is_empty());
        assert!(!f.host.events().contains(&HostEvent::CodeExecuted("created()".into())));
    }

    #[tokio::test]
    async fn conflicting_id_fails_only_that_entry() {
        let f = fixture();
        f.loader.register(echo_module("/scripts/a.sh"));
        f.host.register_command("taken").unwrap();

        let report = f
            .manager
            .reload(&document(json!({
                "commands": {
                    "taken": { "script": "a.sh" },
                    "free": { "script": "a.sh" }
                }
            })))
            .await;

        assert_eq!(report.failed, vec!["taken"]);
        assert_eq!(report.bound, vec!["free"]);
    }

    #[tokio::test]
    async fn predicates_skip_entries() {
        let f = fixture();
        f.loader.register(echo_module("/scripts/a.sh"));

        let report = f
            .manager
            .reload(&document(json!({
                "commands": {
                    "win.only": { "script": "a.sh", "platformCondition": "win32" },
                    "filtered": { "script": "a.sh", "filterCondition": "false" },
                    "linux": { "script": "a.sh", "platformCondition": ["darwin", "linux"] }
                }
            })))
            .await;

        assert_eq!(report.skipped, vec!["win.only", "filtered"]);
        assert_eq!(report.bound, vec!["linux"]);
        assert!(report.failed.is_empty());
    }

    #[tokio::test]
    async fn hooks_run_after_creation_and_on_release() {
        let f = fixture();
        f.loader.register(echo_module("/scripts/a.sh"));
        let doc = document(json!({
            "commands": { "c": { "script": "a.sh", "onCreated": "up()", "onDestroyed": "down()" } }
        }));

        f.manager.reload(&doc).await;
        assert!(f.host.events().contains(&HostEvent::CodeExecuted("up()".into())));

        f.manager.dispose().await;
        let events = f.host.events();
        let unregistered = events
            .iter()
            .position(|e| *e == HostEvent::CommandUnregistered("c".into()))
            .unwrap();
        let destroyed = events
            .iter()
            .position(|e| *e == HostEvent::CodeExecuted("down()".into()))
            .unwrap();
        assert!(unregistered < destroyed);
        assert_eq!(f.host.subscriber_count(), 0);
    }

    #[tokio::test]
    async fn display_fields_are_recomputed_on_read() {
        let f = fixture();
        f.loader.register(echo_module("/scripts/a.sh"));
        f.manager
            .set_values(ValueContext::new().with(StaticValue::new("who", "first")));

        f.manager
            .reload(&document(json!({
                "commands": {
                    "c": {
                        "script": "a.sh",
                        "name": "Hello ${who}",
                        "description": "for ${who}",
                        "button": { "tooltip": "${who}" }
                    },
                    "plain": { "script": "a.sh" }
                }
            })))
            .await;

        assert_eq!(f.manager.name(EntryKind::Command, "c").as_deref(), Some("Hello first"));
        assert_eq!(f.manager.button_text(EntryKind::Command, "c").as_deref(), Some("Hello first"));

        f.manager
            .set_values(ValueContext::new().with(StaticValue::new("who", "second")));
        assert_eq!(f.manager.name(EntryKind::Command, "c").as_deref(), Some("Hello second"));
        assert_eq!(f.manager.description(EntryKind::Command, "c").as_deref(), Some("for second"));

        assert_eq!(f.manager.name(EntryKind::Command, "plain").as_deref(), Some("plain"));
        assert_eq!(f.manager.button_text(EntryKind::Command, "plain"), None);

        let (_, request, visible) = f.host.buttons().remove(0);
        assert_eq!(request.tooltip, "first");
        assert!(visible);
    }

    #[tokio::test]
    async fn button_tooltip_defaults_to_key() {
        let f = fixture();
        f.loader.register(echo_module("/scripts/a.sh"));

        f.manager
            .reload(&document(json!({
                "commands": { "my.cmd": { "script": "a.sh", "button": { "text": "Go" } } }
            })))
            .await;

        let (_, request, _) = f.host.buttons().remove(0);
        assert_eq!(request.text, "Go");
        assert_eq!(request.tooltip, "my.cmd");
        assert_eq!(request.command, "my.cmd");
    }

    #[tokio::test]
    async fn visibility_follows_active_editor() {
        let f = fixture();
        f.loader.register(echo_module("/scripts/a.sh"));

        f.manager
            .reload(&document(json!({
                "commands": {
                    "rust.only": {
                        "script": "a.sh",
                        "button": { "text": "R", "visibility": { "languages": "rust" } }
                    },
                    "always": { "script": "a.sh", "button": { "text": "A" } }
                }
            })))
            .await;

        let shown = |text: &str| {
            f.host
                .buttons()
                .into_iter()
                .find(|(_, r, _)| r.text == text)
                .map(|(_, _, visible)| visible)
                .unwrap()
        };
        assert!(!shown("R"));
        assert!(shown("A"));

        f.host.set_active_editor(Some(ActiveEditor {
            path: PathBuf::from("/src/main.rs"),
            language: "Rust".into(),
        }));
        assert!(shown("R"));

        f.host.set_active_editor(Some(ActiveEditor {
            path: PathBuf::from("/README.md"),
            language: "markdown".into(),
        }));
        assert!(!shown("R"));
        assert!(shown("A"));
    }

    #[tokio::test]
    async fn editor_changed_hooks_run_through_host() {
        let f = fixture();
        f.loader.register(echo_module("/scripts/a.sh"));
        f.manager
            .reload(&document(json!({
                "commands": {
                    "c": { "script": "a.sh", "button": { "text": "C", "onEditorChanged": "changed()" } }
                }
            })))
            .await;

        f.manager.run_editor_changed_hooks().await;
        assert!(f.host.events().contains(&HostEvent::CodeExecuted("changed()".into())));
    }

    #[tokio::test]
    async fn state_cell_is_shared_by_reference() {
        let f = fixture();
        f.loader.register(FnModule::new("/scripts/counter.sh").on(
            EVENT_EXECUTE,
            |ctx| async move {
                let n = ctx.state.get()["n"].as_i64().unwrap_or_default() + 1;
                ctx.state.set(json!({ "n": n }));
                Ok(json!(n))
            },
        ));

        f.manager
            .reload(&document(json!({
                "commands": { "count": { "script": "counter.sh", "state": { "n": 10 } } }
            })))
            .await;

        assert_eq!(f.manager.execute("count", vec![]).await.unwrap(), json!(11));
        assert_eq!(f.manager.execute("count", vec![]).await.unwrap(), json!(12));

        let cell = f.state.get_or_create("/scripts/counter.sh", None, None);
        assert_eq!(cell.get(), json!({ "n": 12 }));

        // State survives a reload.
        f.manager
            .reload(&document(json!({
                "commands": { "count": { "script": "counter.sh", "state": { "n": 0 } } }
            })))
            .await;
        assert_eq!(f.manager.execute("count", vec![]).await.unwrap(), json!(13));
    }

    #[tokio::test]
    async fn modules_are_reloaded_per_generation() {
        let f = fixture();
        f.loader.register(echo_module("/scripts/a.sh"));
        let doc = document(json!({
            "commands": { "one": { "script": "a.sh" }, "two": { "script": "a.sh" } }
        }));

        f.manager.reload(&doc).await;
        assert_eq!(f.loader.load_count(), 1);
        f.manager.reload(&doc).await;
        assert_eq!(f.loader.load_count(), 2);
    }

    #[tokio::test]
    async fn unknown_command_is_an_error() {
        let f = fixture();
        assert!(matches!(
            f.manager.execute("nope", vec![]).await,
            Err(EngineError::UnknownCommand(_))
        ));
    }

    fn app_module(path: &str, renders: Arc<AtomicUsize>) -> FnModule {
        FnModule::new(path)
            .on(EVENT_RENDER, move |ctx| {
                let renders = renders.clone();
                async move {
                    renders.fetch_add(1, Ordering::SeqCst);
                    Ok(json!(format!("<h1>{}</h1>", ctx.key)))
                }
            })
            .on(EVENT_MESSAGE, |ctx| async move {
                Ok(json!({ "event": ctx.event, "data": ctx.data }))
            })
    }

    #[tokio::test]
    async fn apps_load_lazily_and_open_once() {
        let f = fixture();
        let renders = Arc::new(AtomicUsize::new(0));
        f.loader
            .register(app_module("/scripts/hello.sh", renders.clone()));

        let report = f
            .manager
            .reload(&document(json!({
                "apps": [ "hello.sh", { "script": "other.sh", "name": "Other", "vue": true } ]
            })))
            .await;

        assert_eq!(report.bound, vec!["hello.sh", "other.sh"]);
        assert_eq!(f.loader.load_count(), 0);
        assert_eq!(f.manager.name(EntryKind::App, "hello.sh").as_deref(), Some("hello.sh"));
        assert_eq!(
            f.manager.detail(EntryKind::App, "hello.sh").as_deref(),
            Some("/scripts/hello.sh")
        );

        assert!(f.manager.open_app("hello.sh").await.unwrap());
        assert!(!f.manager.open_app("hello.sh").await.unwrap());
        assert_eq!(renders.load(Ordering::SeqCst), 1);

        let (_, view) = f.host.views().remove(0);
        assert_eq!(view.html, "<h1>hello.sh</h1>");
        assert!(!view.component_mode);

        let reply = f
            .manager
            .post_message("hello.sh", "clicked", json!({ "x": 1 }))
            .await
            .unwrap();
        assert_eq!(reply, json!({ "event": "clicked", "data": { "x": 1 } }));

        assert!(f.manager.close_app("hello.sh"));
        assert!(f.manager.open_app("hello.sh").await.unwrap());

        // Missing module fails the open, not the binding.
        assert!(f.manager.open_app("other.sh").await.is_err());
        assert_eq!(f.manager.app_keys(), vec!["hello.sh", "other.sh"]);
    }

    #[tokio::test]
    async fn default_tooltip_is_the_resolved_key() {
        let f = fixture();
        f.loader.register(echo_module("/scripts/a.sh"));
        f.manager
            .set_values(ValueContext::new().with(StaticValue::new("who", "first")));

        f.manager
            .reload(&document(json!({
                "commands": { "run.${who}": { "script": "a.sh", "button": { "text": "Go" } } }
            })))
            .await;

        let (_, request, _) = f.host.buttons().remove(0);
        assert_eq!(request.tooltip, "run.first");
    }

    #[tokio::test]
    async fn later_duplicate_of_a_skipped_entry_fails() {
        let f = fixture();
        f.loader
            .register(app_module("/scripts/a.sh", Arc::new(AtomicUsize::new(0))));

        let report = f
            .manager
            .reload(&document(json!({
                "apps": [
                    { "script": "a.sh", "platformCondition": "win32" },
                    { "script": "a.sh", "name": "Second" }
                ]
            })))
            .await;

        assert_eq!(report.skipped, vec!["a.sh"]);
        assert_eq!(report.failed, vec!["a.sh"]);
        assert!(report.bound.is_empty());
        assert!(f.manager.app_keys().is_empty());
    }

    #[tokio::test]
    async fn command_and_app_with_the_same_key_stay_apart() {
        let f = fixture();
        f.loader.register(echo_module("/scripts/cmd.sh"));
        f.loader
            .register(app_module("/scripts/a.sh", Arc::new(AtomicUsize::new(0))));

        f.manager
            .reload(&document(json!({
                "commands": { "a.sh": { "script": "cmd.sh", "name": "Command" } },
                "apps": [ { "script": "a.sh", "name": "App" } ]
            })))
            .await;

        assert_eq!(f.manager.name(EntryKind::Command, "a.sh").as_deref(), Some("Command"));
        assert_eq!(f.manager.name(EntryKind::App, "a.sh").as_deref(), Some("App"));
        assert_eq!(
            f.manager.detail(EntryKind::Command, "a.sh").as_deref(),
            Some("/scripts/cmd.sh")
        );
        assert_eq!(
            f.manager.detail(EntryKind::App, "a.sh").as_deref(),
            Some("/scripts/a.sh")
        );

        assert!(f.manager.open_app("a.sh").await.unwrap());
        let reply = f
            .manager
            .post_message("a.sh", "ping", json!(null))
            .await
            .unwrap();
        assert_eq!(reply, json!({ "event": "ping", "data": null }));
    }

    #[tokio::test]
    async fn app_buttons_get_generated_commands() {
        let f = fixture();
        f.loader
            .register(app_module("/scripts/hello.sh", Arc::new(AtomicUsize::new(0))));

        f.manager
            .reload(&document(json!({
                "apps": [
                    { "script": "hello.sh", "button": { "text": "Hello" } },
                    "plain.sh"
                ]
            })))
            .await;

        let command = f.manager.button_command("hello.sh").unwrap();
        assert_eq!(command, format!("{APP_BUTTON_COMMAND_PREFIX}1"));
        assert!(f.host.has_command(&command));
        assert_eq!(f.manager.button_command("plain.sh"), None);

        assert_eq!(f.manager.execute(&command, vec![]).await.unwrap(), json!(true));
        assert_eq!(f.host.views().len(), 1);

        f.manager.reload(&EntriesDocument::default()).await;
        assert!(f.host.views().is_empty());
        assert!(f.host.commands().is_empty());
    }
}
