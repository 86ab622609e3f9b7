//! Strategy-selectable concurrent task dispatch
//!
//! A [`TaskDispatcher`] runs one async task per work item and hands back the
//! results as a stream or, via [`TaskDispatcher::dispatch`], as a collected
//! `Vec`. The [`ExecutionStrategy`] decides where tasks run and in which order
//! results are delivered:
//!
//! | Strategy | Where | Result order |
//! |---|---|---|
//! | `Sequential` | caller's task, one at a time | input order |
//! | `PooledSingleArg` | spawned, at most `concurrency` in flight | input order |
//! | `PooledMultiArg` | spawned in batches of `concurrency` | input order, one batch at a time |
//!
//! The first task error ends the stream. Dropping the stream aborts every
//! spawned task that is still running.

mod progress;

pub use progress::ProgressState;

use crate::error::{Error, Result};
use futures::stream::{self, BoxStream, StreamExt, TryStreamExt};
use progress::ProgressReporter;
use std::future::Future;
use tokio::task::JoinError;
use tokio_util::task::AbortOnDropHandle;

/// How work items are distributed and results ordered
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ExecutionStrategy {
    /// One item at a time on the calling task, results in input order
    Sequential,
    /// Worker pool, results in input order
    #[default]
    PooledSingleArg,
    /// Worker pool fed contiguous batches, results in input order
    ///
    /// A batch starts only after every result of the previous batch has
    /// been delivered.
    ///
    /// Pair with [`spread`] to call a task taking the item's fields as
    /// separate arguments.
    PooledMultiArg,
}

/// Runs tasks over work items with a fixed concurrency
#[derive(Debug, Clone)]
pub struct TaskDispatcher {
    concurrency: usize,
    label: String,
    show_progress: bool,
}

impl TaskDispatcher {
    /// Create a dispatcher with `concurrency` workers
    pub fn new(concurrency: usize) -> Result<Self> {
        if concurrency == 0 {
            return Err(Error::config("concurrency", "must be at least 1"));
        }
        Ok(Self {
            concurrency,
            label: "tasks".to_string(),
            show_progress: true,
        })
    }

    /// Name shown next to the progress bar
    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = label.into();
        self
    }

    /// Draw progress bars on stderr (default) or keep them hidden
    ///
    /// Hidden bars still count; only the terminal output is suppressed.
    pub fn with_progress_display(mut self, visible: bool) -> Self {
        self.show_progress = visible;
        self
    }

    /// Worker pool size
    pub fn concurrency(&self) -> usize {
        self.concurrency
    }

    /// Lazily run `task` over `items`
    ///
    /// Nothing runs until the stream is polled, whatever `report_progress`
    /// says; the flag only wraps the stream in a progress counter that
    /// advances once per successful item and redraws every `concurrency`
    /// completions. Use [`TaskDispatcher::dispatch`] for call-then-block
    /// semantics.
    pub fn stream<W, F, Fut, R>(
        &self,
        items: Vec<W>,
        task: F,
        strategy: ExecutionStrategy,
        report_progress: bool,
    ) -> BoxStream<'static, Result<R>>
    where
        W: Send + 'static,
        F: Fn(W) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<R>> + Send + 'static,
        R: Send + 'static,
    {
        let total = items.len() as u64;
        tracing::debug!(
            label = %self.label,
            items = total,
            concurrency = self.concurrency,
            ?strategy,
            "dispatching"
        );

        let results = match strategy {
            ExecutionStrategy::Sequential => sequential(items, task),
            ExecutionStrategy::PooledSingleArg => pooled_ordered(items, task, self.concurrency),
            ExecutionStrategy::PooledMultiArg => pooled_batches(items, task, self.concurrency),
        };

        if !report_progress {
            return results;
        }

        let mut reporter = ProgressReporter::new(
            &self.label,
            total,
            self.concurrency as u64,
            self.show_progress,
        );
        results
            .inspect(move |result| {
                if result.is_ok() {
                    reporter.record_completion();
                }
            })
            .boxed()
    }

    /// Run `task` over every item and collect the results
    ///
    /// Always eager: returns once all items are done, or with the first
    /// error after every still-running task has been aborted. Pass
    /// `report_progress = false` for a plain blocking call with no progress
    /// output.
    pub async fn dispatch<W, F, Fut, R>(
        &self,
        items: Vec<W>,
        task: F,
        strategy: ExecutionStrategy,
        report_progress: bool,
    ) -> Result<Vec<R>>
    where
        W: Send + 'static,
        F: Fn(W) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<R>> + Send + 'static,
        R: Send + 'static,
    {
        self.stream(items, task, strategy, report_progress)
            .try_collect()
            .await
    }
}

fn sequential<W, F, Fut, R>(items: Vec<W>, task: F) -> BoxStream<'static, Result<R>>
where
    W: Send + 'static,
    F: Fn(W) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<R>> + Send + 'static,
    R: Send + 'static,
{
    stream::iter(items).then(move |item| task(item)).boxed()
}

fn pooled_ordered<W, F, Fut, R>(
    items: Vec<W>,
    task: F,
    concurrency: usize,
) -> BoxStream<'static, Result<R>>
where
    W: Send + 'static,
    F: Fn(W) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<R>> + Send + 'static,
    R: Send + 'static,
{
    stream::iter(items)
        .map(move |item| AbortOnDropHandle::new(tokio::spawn(task(item))))
        .buffered(concurrency)
        .map(joined)
        .boxed()
}

fn pooled_batches<W, F, Fut, R>(
    items: Vec<W>,
    task: F,
    concurrency: usize,
) -> BoxStream<'static, Result<R>>
where
    W: Send + 'static,
    F: Fn(W) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<R>> + Send + 'static,
    R: Send + 'static,
{
    stream::iter(into_batches(items, concurrency))
        .map(move |batch| {
            // the whole batch is spawned before its first result is awaited
            let handles: Vec<_> = batch
                .into_iter()
                .map(|item| AbortOnDropHandle::new(tokio::spawn(task(item))))
                .collect();
            stream::iter(handles).then(|handle| handle)
        })
        .flatten()
        .map(joined)
        .boxed()
}

fn joined<R>(outcome: std::result::Result<Result<R>, JoinError>) -> Result<R> {
    match outcome {
        Ok(result) => result,
        Err(e) => Err(e.into()),
    }
}

fn into_batches<W>(items: Vec<W>, size: usize) -> Vec<Vec<W>> {
    let mut batches = Vec::with_capacity(items.len().div_ceil(size));
    let mut items = items.into_iter().peekable();
    while items.peek().is_some() {
        batches.push(items.by_ref().take(size).collect());
    }
    batches
}

/// Tuples whose fields can be passed to `F` as separate arguments
pub trait Unpack<F> {
    /// What `F` returns
    type Output;

    /// Call `f` with this tuple's fields as positional arguments
    fn unpack_into(self, f: &F) -> Self::Output;
}

macro_rules! impl_unpack {
    ($($arg:ident),+) => {
        impl<F, R, $($arg),+> Unpack<F> for ($($arg,)+)
        where
            F: Fn($($arg),+) -> R,
        {
            type Output = R;

            #[allow(non_snake_case)]
            fn unpack_into(self, f: &F) -> R {
                let ($($arg,)+) = self;
                f($($arg),+)
            }
        }
    };
}

impl_unpack!(A);
impl_unpack!(A, B);
impl_unpack!(A, B, C);
impl_unpack!(A, B, C, D);
impl_unpack!(A, B, C, D, E);
impl_unpack!(A, B, C, D, E, G);

/// Adapt a multi-argument function into a task over argument tuples
///
/// ```
/// use genbank_dl::dispatch::spread;
///
/// let add = spread(|a: u32, b: u32| a + b);
/// assert_eq!(add((2u32, 3u32)), 5);
/// ```
pub fn spread<F, A>(f: F) -> impl Fn(A) -> <A as Unpack<F>>::Output + Send + Sync + 'static
where
    A: Unpack<F> + 'static,
    F: Send + Sync + 'static,
{
    move |args: A| args.unpack_into(&f)
}
