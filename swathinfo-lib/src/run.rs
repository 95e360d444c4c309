//! Orchestration of one summarization per input file.
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use rayon::prelude::*;
use tracing::{debug, info, warn};

use crate::format::{FormatHint, Registry};
use crate::options::Options;
use crate::prelude::*;
use crate::record::SwathFile;
use crate::report::Report;
use crate::summary::Summary;

/// Cooperative cancellation shared between a controller and its runs.
///
/// Runs check the token between pings; once cancelled they drop their decoder, which closes
/// the file, and fail with [Error::Cancelled].
#[derive(Debug, Default, Clone)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Progress of a [Run].
///
/// ```text
/// Start -> FormatResolved -> Streaming -> Finalized -> Rendered
/// ```
/// Any non-terminal state may move to `Failed`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunState {
    Start,
    FormatResolved,
    Streaming,
    Finalized,
    Rendered,
    /// Carries the kind of the error that ended the run.
    Failed(ErrorKind),
}

impl RunState {
    #[must_use]
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Rendered | Self::Failed(_))
    }
}

/// Summarization of a single input file.
pub struct Run<'a> {
    registry: &'a Registry,
    options: &'a Options,
    cancel: CancelToken,
    state: RunState,
}

impl<'a> Run<'a> {
    #[must_use]
    pub fn new(registry: &'a Registry, options: &'a Options) -> Self {
        Self {
            registry,
            options,
            cancel: CancelToken::default(),
            state: RunState::Start,
        }
    }

    #[must_use]
    pub fn with_cancel(mut self, cancel: CancelToken) -> Self {
        self.cancel = cancel;
        self
    }

    #[must_use]
    pub fn state(&self) -> RunState {
        self.state
    }

    fn transition(&mut self, to: RunState) {
        debug!(from = ?self.state, ?to, "run state");
        self.state = to;
    }

    /// Misuse leaves the state as is.
    fn expect_state(&self, expected: RunState) -> Result<()> {
        if self.state == expected {
            Ok(())
        } else {
            Err(Error::InvalidState {
                state: format!("{:?}", self.state),
                expected: format!("{expected:?}"),
            })
        }
    }

    fn fail(&mut self, err: Error) -> Error {
        self.transition(RunState::Failed(err.kind()));
        err
    }

    /// Resolve the format of `path`, then decode and accumulate every ping.
    ///
    /// On success the run is `Finalized`. Any error leaves it `Failed` and the partial
    /// summary is discarded.
    ///
    /// # Errors
    /// [Error::UnsupportedFormat] or [Error::Io] if the file cannot be resolved or opened,
    /// [Error::Decode] for malformed data, and [Error::Cancelled] if cancelled.
    /// [Error::InvalidState] if the run has already started.
    pub fn summarize(&mut self, path: &Path, hint: FormatHint) -> Result<(SwathFile, Summary)> {
        self.expect_state(RunState::Start)?;

        let decoder = match self.registry.resolve(hint, path) {
            Ok(decoder) => decoder,
            Err(err) => return Err(self.fail(err)),
        };
        let file = SwathFile {
            path: path.to_path_buf(),
            format: decoder.info(),
        };
        self.transition(RunState::FormatResolved);

        let pings = match decoder.open(path, self.options.lonflip) {
            Ok(pings) => pings,
            Err(err) => return Err(self.fail(err)),
        };
        self.transition(RunState::Streaming);

        let mut summary = Summary::default();
        for zult in pings {
            if self.cancel.is_cancelled() {
                return Err(self.fail(Error::Cancelled {
                    path: path.to_path_buf(),
                }));
            }
            match zult {
                Ok(ping) => summary.add(&ping),
                Err(err) => return Err(self.fail(err)),
            }
        }
        self.transition(RunState::Finalized);
        info!(?path, format = file.format.id, records = summary.records, "summarized");
        Ok((file, summary))
    }

    /// Render a finalized summary with the configured style.
    ///
    /// # Errors
    /// [Error::Render] if the report cannot be rendered, [Error::InvalidState] if the run
    /// is not `Finalized`.
    pub fn render(&mut self, file: &SwathFile, summary: &Summary) -> Result<String> {
        self.expect_state(RunState::Finalized)?;
        match Report::new(file, summary).render(self.options.style) {
            Ok(doc) => {
                self.transition(RunState::Rendered);
                Ok(doc)
            }
            Err(err) => Err(self.fail(err)),
        }
    }
}

/// Resolve, decode and accumulate a single file.
///
/// # Errors
/// See [Run::summarize].
pub fn summarize_file(
    registry: &Registry,
    path: &Path,
    hint: FormatHint,
    options: &Options,
    cancel: &CancelToken,
) -> Result<(SwathFile, Summary)> {
    Run::new(registry, options)
        .with_cancel(cancel.clone())
        .summarize(path, hint)
}

/// One input of a multi-file batch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Entry {
    pub path: PathBuf,
    pub hint: FormatHint,
}

impl Entry {
    pub fn new<P: Into<PathBuf>>(path: P, hint: FormatHint) -> Self {
        Self {
            path: path.into(),
            hint,
        }
    }
}

/// The result of one batch entry.
#[derive(Debug)]
pub struct Outcome {
    pub entry: Entry,
    pub result: Result<(SwathFile, Summary)>,
}

/// Per-file outcomes of a batch in input order.
#[derive(Debug)]
pub struct Batch {
    pub outcomes: Vec<Outcome>,
}

impl Batch {
    /// Successful summaries merged in input order, or `None` if nothing succeeded.
    ///
    /// The merged file reports the first successful file.
    #[must_use]
    pub fn merged(&self) -> Option<(SwathFile, Summary)> {
        self.outcomes
            .iter()
            .filter_map(|o| o.result.as_ref().ok())
            .fold(None, |acc, (file, summary)| match acc {
                None => Some((file.clone(), summary.clone())),
                Some((first, merged)) => Some((first, merged.merge(summary.clone()))),
            })
    }

    pub fn failures(&self) -> impl Iterator<Item = (&Entry, &Error)> {
        self.outcomes
            .iter()
            .filter_map(|o| o.result.as_ref().err().map(|e| (&o.entry, e)))
    }

    /// 0 if every file succeeded, otherwise the exit code of the first failure.
    #[must_use]
    pub fn exit_code(&self) -> i32 {
        self.failures()
            .next()
            .map_or(0, |(_, err)| err.kind().exit_code())
    }
}

/// Summarize `entries` in parallel. A failed entry does not stop the others.
pub fn summarize_batch(
    registry: &Registry,
    entries: Vec<Entry>,
    options: &Options,
    cancel: &CancelToken,
) -> Batch {
    let work = || {
        entries
            .into_par_iter()
            .map(|entry| {
                let result = summarize_file(registry, &entry.path, entry.hint, options, cancel);
                if let Err(err) = &result {
                    warn!(path = ?entry.path, "{err}");
                }
                Outcome { entry, result }
            })
            .collect::<Vec<_>>()
    };

    let pool = {
        let mut pool = rayon::ThreadPoolBuilder::new();
        if let Some(num) = options.threads {
            pool = pool.num_threads(num);
        }
        pool
    }
    .build();
    let outcomes = match pool {
        Ok(pool) => pool.install(work),
        Err(err) => {
            warn!("failed to construct thread pool, using global pool: {err}");
            work()
        }
    };
    Batch { outcomes }
}
