use std::fmt;

/// Machine-readable error codes surfaced in logs and terminal output.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCode {
    ConfigParseError,
    ConfigWriteFailed,
    RecordNotFound,
    DuplicateAction,
    NoCurrentAction,
    UnknownAction,
    IndexOutOfRange,
    QueueChanged,
    SelectorProtocol,
    SelectorSpawnFailed,
    ListenerBindFailed,
    CallbackNotRegistered,
    RemoteRequestFailed,
    RemoteDecodeFailed,
    InternalUnexpected,
}

impl ErrorCode {
    /// Stable code identifier (`E####`) for machine parsing.
    #[must_use]
    pub const fn code(self) -> &'static str {
        match self {
            Self::ConfigParseError => "E1001",
            Self::ConfigWriteFailed => "E1002",
            Self::RecordNotFound => "E2001",
            Self::DuplicateAction => "E2002",
            Self::NoCurrentAction => "E2003",
            Self::UnknownAction => "E2004",
            Self::IndexOutOfRange => "E2005",
            Self::QueueChanged => "E2006",
            Self::SelectorProtocol => "E3001",
            Self::SelectorSpawnFailed => "E3002",
            Self::ListenerBindFailed => "E4001",
            Self::CallbackNotRegistered => "E4002",
            Self::RemoteRequestFailed => "E5001",
            Self::RemoteDecodeFailed => "E5002",
            Self::InternalUnexpected => "E9001",
        }
    }

    /// Short human-facing summary for logs and terminal output.
    #[must_use]
    pub const fn message(self) -> &'static str {
        match self {
            Self::ConfigParseError => "Config file parse error",
            Self::ConfigWriteFailed => "Could not write default config",
            Self::RecordNotFound => "Record not found",
            Self::DuplicateAction => "Action already exists",
            Self::NoCurrentAction => "No current action",
            Self::UnknownAction => "Unknown action id",
            Self::IndexOutOfRange => "Selected index out of range",
            Self::QueueChanged => "Queue changed during execution",
            Self::SelectorProtocol => "Selector output is corrupt",
            Self::SelectorSpawnFailed => "Selector could not be started",
            Self::ListenerBindFailed => "Callback listener could not bind",
            Self::CallbackNotRegistered => "No selection session is active",
            Self::RemoteRequestFailed => "Remote request failed",
            Self::RemoteDecodeFailed => "Remote response could not be decoded",
            Self::InternalUnexpected => "Internal unexpected error",
        }
    }

    /// Optional remediation hint for the operator.
    #[must_use]
    pub const fn hint(self) -> Option<&'static str> {
        match self {
            Self::ConfigParseError => Some("Fix syntax in ticketbench/config.toml and retry."),
            Self::ConfigWriteFailed => Some("Check write permissions on the config directory."),
            Self::RecordNotFound => None,
            Self::DuplicateAction => Some("Pick the existing action instead of adding it again."),
            Self::NoCurrentAction => Some("Choose or add an action before queueing issues."),
            Self::UnknownAction => None,
            Self::IndexOutOfRange | Self::SelectorProtocol => {
                Some("The selector returned rows it was never sent. Report a bug with logs.")
            }
            Self::QueueChanged => Some("Re-run execute; the queue was modified meanwhile."),
            Self::SelectorSpawnFailed => {
                Some("Install fzf or set [selector] command in the config file.")
            }
            Self::ListenerBindFailed => {
                Some("Another ticketbench may hold the port; set [selector] rpc_port.")
            }
            Self::CallbackNotRegistered => Some("Only call `tb _rpc` from within a selector."),
            Self::RemoteRequestFailed => Some("Check [client] url and token, then retry."),
            Self::RemoteDecodeFailed => Some("The server answered with an unexpected payload."),
            Self::InternalUnexpected => Some("Retry once. If persistent, report a bug with logs."),
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.code())
    }
}

/// User-initiated abort of an interactive step.
///
/// Never a fault: the main loop checks for it with [`is_cancelled`] and just
/// redraws the menu.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("cancelled")]
pub struct Cancelled;

/// Returns true when `err` (or anything in its chain) is a [`Cancelled`].
#[must_use]
pub fn is_cancelled(err: &anyhow::Error) -> bool {
    err.chain().any(|cause| cause.downcast_ref::<Cancelled>().is_some())
}
