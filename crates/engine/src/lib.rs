//! Script runtime for workbench.
//!
//! This crate binds user-declared commands and apps to script modules: it registers their
//! commands and status buttons with the host editor, loads and invokes their modules, keeps
//! per-script state, and tears everything down again on reload.

pub mod context;
pub mod error;
pub mod headless;
pub mod host;
pub mod module;
pub mod registry;
pub mod runtime;
pub mod state;
pub mod values;

pub use context::{ExecutionInfo, InvocationContext};
pub use error::{EngineError, Result};
pub use headless::{HeadlessHost, HostEvent};
pub use host::{
    ActiveEditor, ButtonId, ButtonRequest, EditorHost, EditorListener, SubscriptionId, ViewId,
    ViewRequest,
};
pub use module::{
    FnModule, ModuleCache, ModuleLoader, ProcessModuleLoader, ScriptModule, StaticModuleLoader,
};
pub use registry::{
    APP_BUTTON_COMMAND_PREFIX, EntryKind, LifecycleManager, ManagerOptions, ReloadReport,
};
pub use runtime::Runtime;
pub use state::{ScopedStateStore, StateCell, StateScope};
pub use values::{ClockValue, EnvValue, StaticValue, ValueContext, ValueProvider};
