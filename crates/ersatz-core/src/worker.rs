//! Engine state shared with the worker thread, the cycle loop, and auxiliary
//! process threads.

use crate::clock::ProcessClock;
use crate::error::{Error, Result};
use crate::lockfree::Signal;
use crate::metering::DspLoadMeter;
use crate::port::PortHandle;
use crate::process::{Control, CyclePort, ProcessHandler, ProcessScope};
use crate::registry::PortRegistry;
use crossbeam_channel::{bounded, Receiver, Sender, TrySendError};
use parking_lot::{Mutex, RwLock};
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle, ThreadId};
use std::time::{Duration, Instant};
use thread_priority::ThreadPriority;

/// Pending connection notifications kept for the handler.
pub(crate) const NOTIFY_CAPACITY: usize = 1024;

/// How long `start` waits for the worker's readiness acknowledgement.
pub(crate) const STARTUP_TIMEOUT: Duration = Duration::from_secs(5);

/// Re-anchor the deadline schedule after this many cycles to keep the
/// multiplication in range.
const ANCHOR_SPAN: u32 = 1 << 20;

/// Lifecycle of the backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum EngineState {
    Stopped = 0,
    Starting = 1,
    Running = 2,
    Freewheeling = 3,
    /// The handler quit or the backend is shutting down; `stop()` completes
    /// the transition to `Stopped`.
    Stopping = 4,
}

impl EngineState {
    fn from_u8(value: u8) -> Self {
        match value {
            1 => Self::Starting,
            2 => Self::Running,
            3 => Self::Freewheeling,
            4 => Self::Stopping,
            _ => Self::Stopped,
        }
    }

    /// Cycles are being produced.
    pub fn is_running(self) -> bool {
        matches!(self, Self::Running | Self::Freewheeling)
    }
}

/// The single authoritative [`EngineState`].
#[derive(Debug)]
pub(crate) struct StateCell(AtomicU8);

impl StateCell {
    fn new() -> Self {
        Self(AtomicU8::new(EngineState::Stopped as u8))
    }

    #[inline]
    pub(crate) fn load(&self) -> EngineState {
        EngineState::from_u8(self.0.load(Ordering::Acquire))
    }

    #[inline]
    pub(crate) fn store(&self, state: EngineState) {
        self.0.store(state as u8, Ordering::Release);
    }

    /// Moves `from -> to`; on failure returns the actual state.
    pub(crate) fn transition(
        &self,
        from: EngineState,
        to: EngineState,
    ) -> core::result::Result<(), EngineState> {
        self.0
            .compare_exchange(from as u8, to as u8, Ordering::AcqRel, Ordering::Acquire)
            .map(|_| ())
            .map_err(EngineState::from_u8)
    }
}

#[derive(Debug, Clone, Copy)]
pub(crate) struct ConnectionEvent {
    a: PortHandle,
    b: PortHandle,
    connected: bool,
}

/// Auxiliary threads created through `create_process_thread`.
#[derive(Debug, Default)]
pub(crate) struct ProcessThreads {
    handles: Vec<JoinHandle<()>>,
    ids: Vec<ThreadId>,
}

/// Everything the control thread and the worker both reach.
pub(crate) struct Shared {
    pub(crate) registry: RwLock<PortRegistry>,
    pub(crate) state: StateCell,
    pub(crate) shutdown: Signal,
    pub(crate) clock: ProcessClock,
    pub(crate) meter: DspLoadMeter,
    pub(crate) ports_changed: Signal,
    pub(crate) latency_dirty: Signal,
    pub(crate) handler: Mutex<Option<Box<dyn ProcessHandler>>>,
    notify_tx: Sender<ConnectionEvent>,
    notify_rx: Receiver<ConnectionEvent>,
    threads: Mutex<ProcessThreads>,
    worker_id: Mutex<Option<ThreadId>>,
}

impl Shared {
    pub(crate) fn new() -> Self {
        let (notify_tx, notify_rx) = bounded(NOTIFY_CAPACITY);
        Self {
            registry: RwLock::new(PortRegistry::new()),
            state: StateCell::new(),
            shutdown: Signal::new(false),
            clock: ProcessClock::new(),
            meter: DspLoadMeter::new(),
            ports_changed: Signal::new(false),
            latency_dirty: Signal::new(false),
            handler: Mutex::new(None),
            notify_tx,
            notify_rx,
            threads: Mutex::new(ProcessThreads::default()),
            worker_id: Mutex::new(None),
        }
    }

    pub(crate) fn notify_connection(&self, a: PortHandle, b: PortHandle, connected: bool) {
        match self.notify_tx.try_send(ConnectionEvent { a, b, connected }) {
            Ok(()) => {}
            Err(TrySendError::Full(_)) => {
                tracing::warn!("Connection notification queue full, dropping {a:?} <-> {b:?}");
            }
            Err(TrySendError::Disconnected(_)) => {}
        }
    }

    /// Discards notifications left over from a previous run.
    pub(crate) fn drain_notifications(&self) -> usize {
        self.notify_rx.try_iter().count()
    }

    pub(crate) fn in_process_thread(&self) -> bool {
        let current = thread::current().id();
        if *self.worker_id.lock() == Some(current) {
            return true;
        }
        self.threads.lock().ids.contains(&current)
    }

    pub(crate) fn process_thread_count(&self) -> usize {
        self.threads.lock().handles.len()
    }

    /// Joins every auxiliary thread. All threads are joined even if some
    /// panicked; the first failure is reported.
    pub(crate) fn join_process_threads(&self) -> Result<()> {
        let handles = {
            let mut threads = self.threads.lock();
            threads.ids.clear();
            core::mem::take(&mut threads.handles)
        };
        let mut result = Ok(());
        for handle in handles {
            let name = handle.thread().name().unwrap_or("process").to_string();
            if handle.join().is_err() && result.is_ok() {
                result = Err(Error::ThreadJoin(format!("{name} panicked")));
            }
        }
        result
    }
}

/// Argument bundle for an auxiliary process thread.
pub(crate) struct ThreadData {
    shared: Arc<Shared>,
    func: Box<dyn FnOnce() + Send + 'static>,
    stack_size: usize,
}

impl ThreadData {
    pub(crate) fn new(
        shared: Arc<Shared>,
        func: Box<dyn FnOnce() + Send + 'static>,
        stack_size: usize,
    ) -> Self {
        Self {
            shared,
            func,
            stack_size,
        }
    }

    pub(crate) fn spawn(self, name: String) -> Result<()> {
        let shared = Arc::clone(&self.shared);
        let handle = thread::Builder::new()
            .name(name.clone())
            .stack_size(self.stack_size)
            .spawn(move || self.run())
            .map_err(|e| Error::ThreadSpawn(format!("{name}: {e}")))?;
        shared.threads.lock().handles.push(handle);
        tracing::debug!("Spawned process thread {name}");
        Ok(())
    }

    fn run(self) {
        let ThreadData { shared, func, .. } = self;
        shared.threads.lock().ids.push(thread::current().id());
        func();
    }
}

/// Fixed parameters of one run.
#[derive(Debug, Clone, Copy)]
pub(crate) struct CycleParams {
    pub(crate) nframes: u32,
    pub(crate) sample_rate: f32,
}

impl CycleParams {
    /// Nominal cycle duration.
    pub(crate) fn period(&self) -> Duration {
        Duration::from_secs_f64(self.nframes as f64 / self.sample_rate as f64)
    }
}

/// Spawns the worker and waits for it to report readiness.
pub(crate) fn spawn_worker(
    shared: &Arc<Shared>,
    params: CycleParams,
    name: String,
) -> Result<JoinHandle<()>> {
    let (ready_tx, ready_rx) = bounded::<Result<()>>(1);
    let worker_shared = Arc::clone(shared);
    let handle = thread::Builder::new()
        .name(name)
        .spawn(move || worker_main(worker_shared, params, ready_tx))
        .map_err(|e| Error::StartupFailed(format!("cannot spawn worker: {e}")))?;

    let ack = ready_rx.recv_timeout(STARTUP_TIMEOUT);
    match ack {
        Ok(Ok(())) => Ok(handle),
        Ok(Err(e)) => {
            let _ = handle.join();
            Err(e)
        }
        Err(_) => {
            shared.shutdown.raise();
            let _ = handle.join();
            Err(Error::StartupFailed(
                "worker did not acknowledge startup".to_string(),
            ))
        }
    }
}

fn worker_main(shared: Arc<Shared>, params: CycleParams, ready: Sender<Result<()>>) {
    let Some(mut handler) = shared.handler.lock().take() else {
        let _ = ready.send(Err(Error::StartupFailed(
            "no process handler installed".to_string(),
        )));
        return;
    };

    if let Err(e) = thread_priority::set_current_thread_priority(ThreadPriority::Max) {
        tracing::debug!("Worker priority not raised: {e:?}");
    }

    *shared.worker_id.lock() = Some(thread::current().id());
    shared.clock.set_paced(true);
    shared.state.store(EngineState::Running);
    let _ = ready.send(Ok(()));

    run_cycles(&shared, handler.as_mut(), params);

    shared.clock.set_paced(false);
    *shared.worker_id.lock() = None;
    *shared.handler.lock() = Some(handler);
}

/// Snapshots every port's buffer and clears its first `nframes` for the
/// coming cycle.
///
/// Holds the registry read lock only for the duration of this call.
fn prepare_cycle(shared: &Shared, snapshot: &mut Vec<Option<CyclePort>>, nframes: usize) {
    let registry = shared.registry.read();
    snapshot.clear();
    snapshot.resize_with(registry.slot_count(), || None);
    for (handle, port) in registry.iter() {
        port.buffer().clear(nframes);
        snapshot[handle.index()] = Some(CyclePort {
            generation: handle.generation(),
            flags: port.flags(),
            buffer: port.buffer().clone(),
        });
    }
}

fn dispatch_notifications(shared: &Shared, handler: &mut dyn ProcessHandler) {
    if shared.ports_changed.take() {
        handler.ports_changed();
    }
    for event in shared.notify_rx.try_iter() {
        handler.connection_changed(event.a, event.b, event.connected);
    }
    if shared.latency_dirty.take() {
        handler.latency_changed(false);
        handler.latency_changed(true);
    }
}

fn run_cycles(shared: &Shared, handler: &mut dyn ProcessHandler, params: CycleParams) {
    let period = params.period();
    let mut snapshot: Vec<Option<CyclePort>> = Vec::new();
    let mut anchor = Instant::now();
    let mut cycles: u32 = 0;
    let mut freewheeling = false;

    tracing::info!(
        "Worker running: {} frames @ {} Hz ({:?} per cycle)",
        params.nframes,
        params.sample_rate,
        period
    );

    while !shared.shutdown.is_raised() {
        let fw = shared.state.load() == EngineState::Freewheeling;
        if fw != freewheeling {
            freewheeling = fw;
            shared.clock.set_paced(!fw);
            handler.freewheel_changed(fw);
            anchor = Instant::now();
            cycles = 0;
        }

        dispatch_notifications(shared, handler);

        shared.clock.begin_cycle(Instant::now());
        prepare_cycle(shared, &mut snapshot, params.nframes as usize);

        let scope = ProcessScope::new(
            shared,
            &snapshot,
            params.nframes,
            shared.clock.sample_time_at_cycle_start(),
        );
        let callback_start = Instant::now();
        let outcome = panic::catch_unwind(AssertUnwindSafe(|| handler.process(&scope)));
        shared.meter.record(callback_start.elapsed(), period);

        cycles += 1;
        let deadline = anchor + period * cycles;
        shared.clock.end_cycle(deadline);
        if cycles == ANCHOR_SPAN {
            anchor = deadline;
            cycles = 0;
        }

        match outcome {
            Ok(Control::Continue) => {}
            Ok(Control::Quit) => {
                tracing::info!("Process handler requested quit");
                shared.state.store(EngineState::Stopping);
                break;
            }
            Err(_) => {
                tracing::error!("Process handler panicked; worker stopping");
                shared.state.store(EngineState::Stopping);
                break;
            }
        }

        if freewheeling {
            thread::yield_now();
            continue;
        }

        let now = Instant::now();
        if now > deadline + period {
            shared.meter.record_xrun();
            tracing::warn!(
                "Cycle overrun by {:?}, re-anchoring",
                now.saturating_duration_since(deadline)
            );
            anchor = now;
            cycles = 0;
        } else if let Some(wait) = deadline.checked_duration_since(now) {
            thread::sleep(wait);
        }
    }
}
