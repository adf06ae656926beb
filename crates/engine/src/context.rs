use std::path::PathBuf;

use serde_json::{Value, json};

use crate::host::ActiveEditor;
use crate::state::StateCell;

/// The single argument every script handler receives.
#[derive(Debug, Clone)]
pub struct InvocationContext {
    /// Id of the command, or key of the app, being invoked.
    pub key: String,
    /// Resolved path of the script.
    pub script: PathBuf,
    /// Caller-supplied arguments, without the host's leading context argument.
    pub arguments: Vec<Value>,
    /// The entry's `options` value, `null` if unset.
    pub options: Value,
    pub execution: ExecutionInfo,
    /// The script's state cell. Writes go to the live cell.
    pub state: StateCell,
    /// Event name for view messages.
    pub event: Option<String>,
    /// Payload for view messages.
    pub data: Option<Value>,
}

/// Fields derived from how the host triggered the call.
#[derive(Debug, Clone, Default)]
pub struct ExecutionInfo {
    /// The leading argument the host passed, if any.
    pub host_context: Option<Value>,
    pub active_editor: Option<ActiveEditor>,
    pub platform: String,
}

impl InvocationContext {
    /// JSON form handed to out-of-process scripts. `state` is the cell's current value.
    pub fn to_json(&self) -> Value {
        json!({
            "key": self.key,
            "script": self.script,
            "arguments": self.arguments,
            "options": self.options,
            "state": self.state.get(),
            "event": self.event,
            "data": self.data,
            "execution": {
                "hostContext": self.execution.host_context,
                "activeEditor": self.execution.active_editor,
                "platform": self.execution.platform,
            },
        })
    }
}

/// Splits host-delivered arguments into the leading host context and the caller's arguments.
pub(crate) fn split_host_arguments(mut args: Vec<Value>) -> (Option<Value>, Vec<Value>) {
    if args.is_empty() {
        return (None, args);
    }
    let host = args.remove(0);
    (Some(host).filter(|v| !v.is_null()), args)
}
