use std::fmt;
use std::pin::Pin;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, OnceLock};
use std::task::{Context, Poll};

use futures::future::{Either, Ready, ready};
use futures::stream::{FuturesOrdered, Stream, StreamExt};
use rowflow_bind::{FieldMap, Row, Shape};
use tokio::runtime::Handle;
use tokio::sync::mpsc::{self, error::TrySendError};
use tokio::sync::watch;
use tokio::task::{JoinError, JoinHandle};
use tracing::{debug, info, warn};

use crate::config::StageConfig;
use crate::error::StageError;
use crate::transform::{Layout, Materialize, NormalizedRows, Planned, RawRows, RowTransform};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StageState {
    /// Spawned without a layout; nothing can be pushed yet.
    Created,
    Accepting,
    /// No new input; queued rows are still being drained.
    Completing,
    Completed,
    Faulted,
    /// The consumer went away before the stage finished.
    Cancelled,
}

impl StageState {
    /// Still able to take input, possibly once a layout is established.
    pub fn is_alive(self) -> bool {
        matches!(self, StageState::Created | StageState::Accepting)
    }

    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            StageState::Completed | StageState::Faulted | StageState::Cancelled
        )
    }
}

/// A row the stage did not take, handed back to the caller.
#[derive(Debug)]
pub enum PushError {
    /// The input queue is at capacity.
    Full(Row),
    /// The stage no longer accepts input.
    Closed(Row),
    /// The layout has not been established yet.
    Unbound(Row),
}

impl PushError {
    pub fn into_row(self) -> Row {
        match self {
            PushError::Full(row) | PushError::Closed(row) | PushError::Unbound(row) => row,
        }
    }
}

impl fmt::Display for PushError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PushError::Full(_) => write!(f, "stage input is full"),
            PushError::Closed(_) => write!(f, "stage is not accepting input"),
            PushError::Unbound(_) => write!(f, "stage layout has not been established"),
        }
    }
}

impl std::error::Error for PushError {}

fn unbound() -> StageError {
    StageError::Usage("row pushed before the stage layout was established".into())
}

// ── Shared state ────────────────────────────────────────────

pub(crate) struct Shared<O> {
    layout: Box<dyn Layout<O>>,
    state: watch::Sender<StageState>,
    fault: OnceLock<String>,
    fault_delivered: AtomicBool,
    accepted: AtomicUsize,
    max_rows: Option<usize>,
}

impl<O> Shared<O> {
    fn state(&self) -> StageState {
        *self.state.borrow()
    }

    /// Move to `to` if the current state satisfies `from`.
    fn transition(&self, to: StageState, from: impl Fn(StageState) -> bool) -> bool {
        self.state.send_if_modified(|s| {
            if from(*s) {
                *s = to;
                true
            } else {
                false
            }
        })
    }

    fn fault(&self, message: String) -> bool {
        let mut message = Some(message);
        self.state.send_if_modified(|s| {
            if s.is_terminal() {
                return false;
            }
            if let Some(message) = message.take() {
                let _ = self.fault.set(message);
            }
            *s = StageState::Faulted;
            true
        })
    }
}

// ── Stage ───────────────────────────────────────────────────

/// Producer handle of a pipeline stage.
///
/// Cheap to clone; every clone pushes into the same bounded queue. Dropping
/// all handles ends input the same way `complete` does.
pub struct Stage<O> {
    shared: Arc<Shared<O>>,
    input: mpsc::Sender<Row>,
}

impl<O> Clone for Stage<O> {
    fn clone(&self) -> Self {
        Self {
            shared: Arc::clone(&self.shared),
            input: self.input.clone(),
        }
    }
}

impl<O> fmt::Debug for Stage<O> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Stage")
            .field("state", &self.state())
            .field("accepted", &self.accepted())
            .finish()
    }
}

impl<O> Stage<O> {
    pub fn state(&self) -> StageState {
        self.shared.state()
    }

    /// Whether a feeder should keep reading: not completing, completed,
    /// faulted or cancelled.
    pub fn is_alive(&self) -> bool {
        self.state().is_alive()
    }

    pub fn has_layout(&self) -> bool {
        self.shared.layout.is_established()
    }

    /// Rows taken into the input queue so far.
    pub fn accepted(&self) -> usize {
        self.shared.accepted.load(Ordering::SeqCst)
    }

    pub fn fault_message(&self) -> Option<&str> {
        self.shared.fault.get().map(String::as_str)
    }

    /// Establish the column layout of a stage spawned without one.
    ///
    /// Allowed exactly once; a stage spawned with a layout already has one.
    pub fn establish_layout<C: AsRef<str>>(&self, columns: &[C]) -> Result<(), StageError> {
        let columns: Vec<String> = columns.iter().map(|c| c.as_ref().to_string()).collect();
        self.shared.layout.establish(&columns)?;
        self.shared
            .transition(StageState::Accepting, |s| s == StageState::Created);
        debug!(columns = columns.len(), "stage layout established");
        Ok(())
    }

    fn check_accepting(&self, row: Row) -> Result<Row, PushError> {
        match self.state() {
            StageState::Created => Err(PushError::Unbound(row)),
            StageState::Accepting => Ok(row),
            _ => Err(PushError::Closed(row)),
        }
    }

    fn accept(&self) {
        let n = self.shared.accepted.fetch_add(1, Ordering::SeqCst) + 1;
        if self.shared.max_rows == Some(n) {
            debug!(max_rows = n, "row limit reached");
            self.complete();
        }
    }

    /// Queue `row` without waiting.
    pub fn try_push(&self, row: Row) -> Result<(), PushError> {
        let row = self.check_accepting(row)?;
        match self.input.try_send(row) {
            Ok(()) => {
                self.accept();
                Ok(())
            }
            Err(TrySendError::Full(row)) => Err(PushError::Full(row)),
            Err(TrySendError::Closed(row)) => Err(PushError::Closed(row)),
        }
    }

    /// Queue `row`, suspending while the queue is full.
    ///
    /// `Ok(false)` means the stage stopped accepting input; the row is
    /// dropped.
    pub async fn send(&self, row: Row) -> Result<bool, StageError> {
        let row = match self.check_accepting(row) {
            Ok(row) => row,
            Err(PushError::Unbound(_)) => return Err(unbound()),
            Err(_) => return Ok(false),
        };
        match self.input.send(row).await {
            Ok(()) => {
                self.accept();
                Ok(true)
            }
            Err(_) => Ok(false),
        }
    }

    /// Blocking [`send`](Self::send). Must not be called from async code.
    pub fn push(&self, row: Row) -> Result<bool, StageError> {
        let row = match self.check_accepting(row) {
            Ok(row) => row,
            Err(PushError::Unbound(_)) => return Err(unbound()),
            Err(_) => return Ok(false),
        };
        match self.input.blocking_send(row) {
            Ok(()) => {
                self.accept();
                Ok(true)
            }
            Err(_) => Ok(false),
        }
    }

    /// Blocking push for callers that expect the row to be taken.
    pub fn submit(&self, row: Row) -> Result<(), StageError> {
        if self.push(row)? {
            Ok(())
        } else {
            Err(StageError::Usage(format!(
                "stage is not accepting input ({:?})",
                self.state()
            )))
        }
    }

    /// Stop taking input; queued rows are still delivered. Idempotent.
    pub fn complete(&self) {
        if self.shared.transition(StageState::Completing, StageState::is_alive) {
            debug!(accepted = self.accepted(), "stage completion requested");
        }
    }

    /// Fail the stage. Records already emitted are still delivered, followed
    /// by a [`StageError::Faulted`] carrying `message`.
    pub fn fault(&self, message: impl Into<String>) {
        let message = message.into();
        if self.shared.fault(message.clone()) {
            warn!(%message, "stage faulted");
        }
    }

    /// Resolves with the terminal state once the stage has finished.
    pub async fn completion(&self) -> StageState {
        let mut rx = self.shared.state.subscribe();
        match rx.wait_for(|s| s.is_terminal()).await {
            Ok(state) => *state,
            Err(_) => self.state(),
        }
    }

    /// Blocking [`completion`](Self::completion). Must not be called from
    /// async code: it parks the calling thread, which would stall a runtime
    /// worker.
    pub fn wait(&self) -> StageState {
        futures::executor::block_on(self.completion())
    }

    pub(crate) fn subscribe(&self) -> watch::Receiver<StageState> {
        self.shared.state.subscribe()
    }
}

// ── Records ─────────────────────────────────────────────────

/// Consumer side of a stage, yielding outputs in input order.
///
/// Dropping it cancels the stage.
pub struct Records<O> {
    output: mpsc::Receiver<Result<O, StageError>>,
    shared: Arc<Shared<O>>,
}

impl<O> fmt::Debug for Records<O> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Records")
            .field("state", &self.state())
            .field("queued", &self.output.len())
            .finish()
    }
}

impl<O> Records<O> {
    pub fn state(&self) -> StageState {
        self.shared.state()
    }

    fn trailing_fault(&self) -> Option<Result<O, StageError>> {
        if self.shared.state() != StageState::Faulted
            || self.shared.fault_delivered.swap(true, Ordering::SeqCst)
        {
            return None;
        }
        let message = self.shared.fault.get().cloned().unwrap_or_default();
        Some(Err(StageError::Faulted(message)))
    }

    pub async fn recv_async(&mut self) -> Option<Result<O, StageError>> {
        match self.output.recv().await {
            Some(item) => Some(item),
            None => self.trailing_fault(),
        }
    }

    /// Blocking receive. Must not be called from async code.
    pub fn recv(&mut self) -> Option<Result<O, StageError>> {
        match self.output.blocking_recv() {
            Some(item) => Some(item),
            None => self.trailing_fault(),
        }
    }

    /// Iterate with [`recv`](Self::recv). Must not be used from async code.
    pub fn blocking_iter(self) -> BlockingRecords<O> {
        BlockingRecords { records: self }
    }
}

/// Blocking iterator over a stage's outputs; see [`Records::blocking_iter`].
pub struct BlockingRecords<O> {
    records: Records<O>,
}

impl<O> Iterator for BlockingRecords<O> {
    type Item = Result<O, StageError>;

    fn next(&mut self) -> Option<Self::Item> {
        self.records.recv()
    }
}

impl<O> Stream for Records<O> {
    type Item = Result<O, StageError>;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let this = self.get_mut();
        match this.output.poll_recv(cx) {
            Poll::Ready(Some(item)) => Poll::Ready(Some(item)),
            Poll::Ready(None) => Poll::Ready(this.trailing_fault()),
            Poll::Pending => Poll::Pending,
        }
    }
}

// ── Worker ──────────────────────────────────────────────────

type Job<O> = Either<Ready<Result<Result<O, StageError>, JoinError>>, JoinHandle<Result<O, StageError>>>;

fn job<O: Send + 'static>(
    shared: &Arc<Shared<O>>,
    row: Row,
    parallelism: usize,
    handle: &Handle,
) -> Job<O> {
    if parallelism == 1 {
        Either::Left(ready(Ok(shared.layout.apply(row))))
    } else {
        let shared = Arc::clone(shared);
        Either::Right(handle.spawn(async move { shared.layout.apply(row) }))
    }
}

/// Resolves with the state once it satisfies `pred`.
async fn reached(
    state: &mut watch::Receiver<StageState>,
    pred: impl Fn(StageState) -> bool,
) -> StageState {
    match state.wait_for(|s| pred(*s)).await {
        Ok(s) => *s,
        Err(_) => StageState::Faulted,
    }
}

async fn run<O: Send + 'static>(
    shared: Arc<Shared<O>>,
    mut input: mpsc::Receiver<Row>,
    output: mpsc::Sender<Result<O, StageError>>,
    parallelism: usize,
    handle: Handle,
) {
    let mut state = shared.state.subscribe();
    let mut in_flight: FuturesOrdered<Job<O>> = FuturesOrdered::new();
    let mut input_open = true;
    let mut closing = false;
    let mut emitted = 0usize;

    let end = loop {
        if !input_open && in_flight.is_empty() {
            break StageState::Completed;
        }

        tokio::select! {
            biased;

            // While completing only a fault interrupts the drain.
            now = reached(&mut state, move |s| {
                if closing { s == StageState::Faulted } else { !s.is_alive() }
            }) => {
                if now != StageState::Completing {
                    break now;
                }
                closing = true;
                input.close();
            }

            _ = output.closed() => break StageState::Cancelled,

            Some(joined) = in_flight.next(), if !in_flight.is_empty() => {
                let item = joined.unwrap_or_else(|e| Err(StageError::Join(e.to_string())));
                let failure = item.as_ref().err().map(ToString::to_string);
                if failure.is_some() {
                    shared.fault_delivered.store(true, Ordering::SeqCst);
                }
                let sent = tokio::select! {
                    biased;
                    _ = reached(&mut state, |s| s == StageState::Faulted) => None,
                    sent = output.send(item) => Some(sent.is_ok()),
                };
                match sent {
                    None => {
                        // Faulted from outside; that fault is what the consumer sees.
                        shared.fault_delivered.store(false, Ordering::SeqCst);
                        break StageState::Faulted;
                    }
                    Some(false) => break StageState::Cancelled,
                    Some(true) => {}
                }
                if let Some(message) = failure {
                    shared.fault(message.clone());
                    warn!(%message, position = emitted, "row failed, stage faulted");
                    break StageState::Faulted;
                }
                emitted += 1;
            }

            row = input.recv(), if input_open && in_flight.len() < parallelism => match row {
                Some(row) => in_flight.push_back(job(&shared, row, parallelism, &handle)),
                None => input_open = false,
            },
        }
    };

    input.close();
    shared.transition(end, |s| !s.is_terminal());
    info!(emitted, state = ?shared.state(), "stage worker exited");
}

// ── Builder ─────────────────────────────────────────────────

pub struct StageBuilder<X> {
    transform: X,
    config: StageConfig,
    layout: Option<Vec<String>>,
}

impl<T: Shape> StageBuilder<Materialize<T>> {
    /// A stage that materializes rows into records of `T`.
    pub fn records(map: Arc<FieldMap<T>>) -> Self {
        Self::new(Materialize::new(map))
    }
}

impl StageBuilder<RawRows> {
    pub fn raw() -> Self {
        Self::new(RawRows)
    }
}

impl StageBuilder<NormalizedRows> {
    pub fn normalized() -> Self {
        Self::new(NormalizedRows)
    }
}

impl<X: RowTransform> StageBuilder<X> {
    pub fn new(transform: X) -> Self {
        Self {
            transform,
            config: StageConfig::default(),
            layout: None,
        }
    }

    pub fn config(mut self, config: StageConfig) -> Self {
        self.config = config;
        self
    }

    pub fn capacity(mut self, capacity: usize) -> Self {
        self.config.capacity = capacity;
        self
    }

    pub fn parallelism(mut self, parallelism: usize) -> Self {
        self.config.parallelism = parallelism;
        self
    }

    pub fn max_rows(mut self, max_rows: usize) -> Self {
        self.config.max_rows = Some(max_rows);
        self
    }

    /// Bind eagerly. Without a layout the stage starts `Created` and waits
    /// for [`Stage::establish_layout`].
    pub fn layout<C: AsRef<str>>(mut self, columns: &[C]) -> Self {
        self.layout = Some(columns.iter().map(|c| c.as_ref().to_string()).collect());
        self
    }

    /// Spawn the stage's worker on the current tokio runtime.
    pub fn spawn(self) -> Result<(Stage<X::Output>, Records<X::Output>), StageError> {
        let handle = Handle::try_current()
            .map_err(|_| StageError::Usage("spawning a stage requires a tokio runtime".into()))?;
        self.spawn_on(&handle)
    }

    pub fn spawn_on(
        self,
        handle: &Handle,
    ) -> Result<(Stage<X::Output>, Records<X::Output>), StageError> {
        self.config.validate()?;

        let planned = Planned::new(self.transform);
        let initial = match &self.layout {
            Some(columns) => {
                planned.establish(columns)?;
                StageState::Accepting
            }
            None => StageState::Created,
        };
        let (state, _) = watch::channel(initial);
        let shared = Arc::new(Shared {
            layout: Box::new(planned),
            state,
            fault: OnceLock::new(),
            fault_delivered: AtomicBool::new(false),
            accepted: AtomicUsize::new(0),
            max_rows: self.config.max_rows,
        });

        let (input_tx, input_rx) = mpsc::channel(self.config.capacity);
        let (output_tx, output_rx) = mpsc::channel(self.config.capacity);
        debug!(
            capacity = self.config.capacity,
            parallelism = self.config.parallelism,
            deferred = self.layout.is_none(),
            "spawning stage"
        );
        handle.spawn(run(
            Arc::clone(&shared),
            input_rx,
            output_tx,
            self.config.parallelism,
            handle.clone(),
        ));

        let stage = Stage {
            shared: Arc::clone(&shared),
            input: input_tx,
        };
        if self.config.max_rows == Some(0) {
            stage.complete();
        }
        Ok((stage, Records { output: output_rx, shared }))
    }
}
