//! Bridge to an external fuzzy selector (`fzf` by default).
//!
//! Rows are streamed to the selector's stdin as `"<index> <text>"` while the
//! fetcher is still producing them. The picked rows come back on stdout and
//! only their leading index is interpreted.
//!
//! Shutdown: once the selector's stdout reaches EOF the cancel channel is
//! disconnected. The feeder races the next row against that signal, so it
//! stops whether the stream closes first or the selector exits first.

use std::io::{self, BufWriter, Read, Write};
use std::net::SocketAddr;
use std::path::PathBuf;
use std::process::{Command, Stdio};
use std::sync::Arc;
use std::thread;

use crossbeam_channel::{Receiver, bounded, select, unbounded};
use tracing::{debug, error};

use crate::error::ErrorCode;
use crate::format::RowFormat;
use crate::record::Record;

/// Environment variable the callback client reads the listener address from.
pub const RPC_ADDR_ENV: &str = "TICKETBENCH_RPC_ADDR";

/// Options for one selection.
#[derive(Debug, Clone, Default)]
pub struct SelectOptions {
    pub prompt: String,
    /// Allow picking only one row.
    pub single: bool,
}

impl SelectOptions {
    #[must_use]
    pub fn new(prompt: impl Into<String>) -> Self {
        Self {
            prompt: prompt.into(),
            single: false,
        }
    }

    #[must_use]
    pub const fn single(mut self) -> Self {
        self.single = true;
        self
    }
}

/// Result of a selection that did not fail.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SelectOutcome {
    /// Picked row indices in the order the selector printed them.
    Selected(Vec<usize>),
    /// The user aborted or picked nothing.
    Cancelled,
}

impl SelectOutcome {
    /// The picked indices, or `None` if cancelled.
    #[must_use]
    pub fn into_selected(self) -> Option<Vec<usize>> {
        match self {
            Self::Selected(indices) => Some(indices),
            Self::Cancelled => None,
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum SelectError {
    #[error("could not start selector `{program}`: {source}")]
    Spawn {
        program: String,
        #[source]
        source: io::Error,
    },

    #[error("selector i/o failed: {0}")]
    Io(#[from] io::Error),

    /// The selector printed a row we never sent.
    #[error("selector returned an unparsable row: {line:?}")]
    Protocol { line: String },
}

impl SelectError {
    #[must_use]
    pub const fn code(&self) -> ErrorCode {
        match self {
            Self::Spawn { .. } => ErrorCode::SelectorSpawnFailed,
            Self::Io(_) => ErrorCode::InternalUnexpected,
            Self::Protocol { .. } => ErrorCode::SelectorProtocol,
        }
    }
}

/// Parse selector output into row indices.
///
/// # Errors
///
/// Returns [`SelectError::Protocol`] for a non-empty line whose first
/// whitespace-separated token is not an index.
pub fn parse_selection(output: &str) -> Result<Vec<usize>, SelectError> {
    output
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(|line| {
            line.split_whitespace()
                .next()
                .and_then(|token| token.parse::<usize>().ok())
                .ok_or_else(|| SelectError::Protocol {
                    line: line.to_string(),
                })
        })
        .collect()
}

/// A stream that yields `records` and then closes.
#[must_use]
pub fn stream_of<I>(records: I) -> Receiver<Arc<Record>>
where
    I: IntoIterator<Item = Arc<Record>>,
{
    let (tx, rx) = unbounded();
    for record in records {
        let _ = tx.send(record);
    }
    rx
}

/// The selector program and how to invoke it.
#[derive(Debug, Clone)]
pub struct Selector {
    command: String,
    args: Vec<String>,
    callback_exe: Option<PathBuf>,
}

impl Default for Selector {
    fn default() -> Self {
        Self::new("fzf", default_args())
    }
}

/// Arguments passed to `fzf` before per-selection flags.
#[must_use]
pub fn default_args() -> Vec<String> {
    vec!["--with-nth".into(), "2..".into(), "--reverse".into()]
}

impl Selector {
    #[must_use]
    pub fn new(command: impl Into<String>, args: Vec<String>) -> Self {
        Self {
            command: command.into(),
            args,
            callback_exe: None,
        }
    }

    /// Program the selector runs for preview and key-bound callbacks.
    #[must_use]
    pub fn with_callback_exe(mut self, exe: impl Into<PathBuf>) -> Self {
        self.callback_exe = Some(exe.into());
        self
    }

    /// Stream `records` into the selector and return the picked row indices.
    ///
    /// Row indices are positions in the stream, which for a fetch stream
    /// matches the controller's loaded cache. `rpc` is the address of an
    /// active callback session, if any.
    ///
    /// # Errors
    ///
    /// Fails when the selector cannot be started, when talking to it fails, or
    /// when it prints a row we never sent.
    pub fn select(
        &self,
        records: Receiver<Arc<Record>>,
        format: RowFormat,
        options: &SelectOptions,
        rpc: Option<SocketAddr>,
    ) -> Result<SelectOutcome, SelectError> {
        self.run(records, move |record| format.render_row(record), options, rpc)
    }

    /// Pick from a fixed list of strings.
    ///
    /// # Errors
    ///
    /// Same as [`Self::select`].
    pub fn select_strings<S: AsRef<str>>(
        &self,
        items: &[S],
        options: &SelectOptions,
    ) -> Result<SelectOutcome, SelectError> {
        let (tx, rx) = unbounded::<String>();
        for item in items {
            let _ = tx.send(item.as_ref().replace(['\r', '\n'], " "));
        }
        drop(tx);
        self.run(rx, |line: &String| line.clone(), options, None)
    }

    fn command_for(&self, options: &SelectOptions, rpc: Option<SocketAddr>) -> Command {
        let mut cmd = Command::new(&self.command);
        cmd.args(&self.args);
        cmd.arg(if options.single { "+m" } else { "-m" });
        if !options.prompt.is_empty() {
            cmd.arg(format!("--prompt={}", options.prompt));
        }
        if let (Some(addr), Some(exe)) = (rpc, &self.callback_exe) {
            let exe = exe.display();
            cmd.arg("--preview")
                .arg(format!("{exe} _rpc print {{}}"))
                .arg("--bind")
                .arg(format!("f1:execute-silent({exe} _rpc load)"))
                .env(RPC_ADDR_ENV, addr.to_string());
        }
        cmd.stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::inherit());
        cmd
    }

    fn run<T, F>(
        &self,
        rows: Receiver<T>,
        render: F,
        options: &SelectOptions,
        rpc: Option<SocketAddr>,
    ) -> Result<SelectOutcome, SelectError>
    where
        T: Send + 'static,
        F: Fn(&T) -> String + Send + 'static,
    {
        let mut child = self
            .command_for(options, rpc)
            .spawn()
            .map_err(|source| SelectError::Spawn {
                program: self.command.clone(),
                source,
            })?;
        debug!(program = %self.command, prompt = %options.prompt, "selector started");

        let stdin = child.stdin.take();
        let mut stdout = child
            .stdout
            .take()
            .ok_or_else(|| io::Error::other("selector stdout was not captured"))?;

        let (cancel_tx, cancel_rx) = bounded::<()>(0);
        let feeder = thread::Builder::new()
            .name("selector-feed".to_string())
            .spawn(move || {
                if let Some(stdin) = stdin {
                    feed(stdin, &rows, &render, &cancel_rx);
                }
            });
        let feeder = match feeder {
            Ok(feeder) => feeder,
            Err(err) => {
                let _ = child.kill();
                let _ = child.wait();
                return Err(err.into());
            }
        };

        let mut output = String::new();
        let read = stdout.read_to_string(&mut output);
        drop(cancel_tx);
        let status = child.wait();
        if feeder.join().is_err() {
            error!("selector feeder panicked");
        }
        read?;
        let status = status?;

        if !status.success() {
            debug!(?status, "selector exited without a selection");
            return Ok(SelectOutcome::Cancelled);
        }
        let indices = parse_selection(&output).inspect_err(|err| {
            error!(code = %err.code(), "{err}");
        })?;
        if indices.is_empty() {
            return Ok(SelectOutcome::Cancelled);
        }
        debug!(picked = indices.len(), "selector finished");
        Ok(SelectOutcome::Selected(indices))
    }
}

fn feed<T, W, F>(sink: W, rows: &Receiver<T>, render: &F, cancel: &Receiver<()>)
where
    W: Write,
    F: Fn(&T) -> String,
{
    let mut sink = BufWriter::new(sink);
    let mut index = 0_usize;
    loop {
        select! {
            recv(rows) -> row => {
                let Ok(row) = row else {
                    break;
                };
                let line = format!("{index} {}\n", render(&row));
                if sink.write_all(line.as_bytes()).and_then(|()| sink.flush()).is_err() {
                    debug!(index, "selector closed its input");
                    return;
                }
                index += 1;
            }
            recv(cancel) -> _ => {
                debug!(index, "selector finished before the stream closed");
                return;
            }
        }
    }
    let _ = sink.flush();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_leading_indices_and_skips_blank_lines() {
        let picked = parse_selection("3 10003 FOO-3 - c\n\n0 10000 FOO-0 - a\n").expect("parse");
        assert_eq!(picked, vec![3, 0]);
    }

    #[test]
    fn garbage_line_is_a_protocol_error() {
        let err = parse_selection("FOO-3 - c\n").unwrap_err();
        assert!(matches!(err, SelectError::Protocol { .. }));
        assert_eq!(err.code(), ErrorCode::SelectorProtocol);
    }

    #[test]
    fn feeder_writes_indexed_rows_until_stream_closes() {
        let records = stream_of(vec![
            Arc::new(Record::new("1", "FOO-1", "Alpha")),
            Arc::new(Record::new("2", "FOO-2", "Beta")),
        ]);
        let (_cancel_tx, cancel_rx) = bounded::<()>(0);
        let mut buf = Vec::new();
        let format = RowFormat::default();
        feed(&mut buf, &records, &|r: &Arc<Record>| format.render_row(r), &cancel_rx);
        assert_eq!(
            String::from_utf8(buf).expect("utf8"),
            "0 1 FOO-1 - Alpha\n1 2 FOO-2 - Beta\n"
        );
    }

    #[test]
    fn feeder_stops_on_cancel_with_stream_open() {
        let (_record_tx, records) = bounded::<Arc<Record>>(1);
        let (cancel_tx, cancel_rx) = bounded::<()>(0);
        drop(cancel_tx);
        let mut buf = Vec::new();
        feed(&mut buf, &records, &|r: &Arc<Record>| r.key.clone(), &cancel_rx);
        assert!(buf.is_empty());
    }

    #[test]
    fn missing_program_is_a_spawn_error() {
        let selector = Selector::new("ticketbench-no-such-selector", Vec::new());
        let err = selector
            .select_strings(&["a"], &SelectOptions::new("pick"))
            .unwrap_err();
        assert_eq!(err.code(), ErrorCode::SelectorSpawnFailed);
    }

    #[test]
    fn single_mode_and_callbacks_shape_the_command_line() {
        let selector = Selector::default().with_callback_exe("/usr/bin/tb");
        let addr: SocketAddr = "127.0.0.1:4378".parse().expect("addr");
        let cmd = selector.command_for(&SelectOptions::new("issue> ").single(), Some(addr));
        let args: Vec<String> = cmd
            .get_args()
            .map(|arg| arg.to_string_lossy().into_owned())
            .collect();
        assert_eq!(&args[..4], ["--with-nth", "2..", "--reverse", "+m"]);
        assert!(args.contains(&"--prompt=issue> ".to_string()));
        assert!(args.contains(&"/usr/bin/tb _rpc print {}".to_string()));
        assert!(args.contains(&"f1:execute-silent(/usr/bin/tb _rpc load)".to_string()));
    }
}
