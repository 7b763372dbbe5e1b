//! The backend facade: configuration, lifecycle and the port-engine API.

use crate::catalog::{self, DeviceStatus};
use crate::config::{self, BackendConfig, MidiOption};
use crate::error::{Error, Result};
use crate::matcher::PortMatcher;
use crate::metering::DspMetrics;
use crate::port::{
    ChanCount, DataType, LatencyRange, PortBuffer, PortFlags, PortHandle, MAX_BUFFER_SIZE,
};
use crate::process::ProcessHandler;
use crate::worker::{self, CycleParams, EngineState, Shared, ThreadData};
use ersatz_midi::DEFAULT_MIDI_CAPACITY;
use parking_lot::{Mutex, MutexGuard};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;

/// Synthetic audio/MIDI backend.
///
/// Behaves like a hardware-driven backend without touching any device: it
/// owns a port registry and connection graph, creates `system:` ports on
/// start, and drives a [`ProcessHandler`] at `buffer_size / sample_rate`
/// cadence on a dedicated thread.
///
/// All methods take `&self`; the backend can be shared behind an `Arc`.
///
/// # Example
///
/// ```
/// use ersatz_core::{Backend, ClosureProcessHandler, Control};
///
/// let backend = Backend::builder().buffer_size(256).build()?;
/// backend.set_process_handler(ClosureProcessHandler::new(|_scope| Control::Continue))?;
/// backend.start(false)?;
/// assert_eq!(backend.n_physical_inputs().audio, 8);
/// backend.stop()?;
/// # Ok::<(), ersatz_core::Error>(())
/// ```
pub struct Backend {
    shared: Arc<Shared>,
    config: Mutex<BackendConfig>,
    worker: Mutex<Option<JoinHandle<()>>>,
    /// Serializes start/stop/configuration changes.
    lifecycle: Mutex<()>,
    physical: Mutex<Vec<PortHandle>>,
    thread_seq: AtomicUsize,
}

impl Backend {
    pub fn new(config: BackendConfig) -> Result<Self> {
        config.validate()?;
        tracing::debug!(
            "Backend '{}' created: {} Hz, {} frames",
            config.instance_name,
            config.sample_rate,
            config.buffer_size
        );
        Ok(Self {
            shared: Arc::new(Shared::new()),
            config: Mutex::new(config),
            worker: Mutex::new(None),
            lifecycle: Mutex::new(()),
            physical: Mutex::new(Vec::new()),
            thread_seq: AtomicUsize::new(0),
        })
    }

    pub fn builder() -> BackendBuilder {
        BackendBuilder::default()
    }

    // ==================== Catalog ====================

    pub fn name(&self) -> &'static str {
        catalog::BACKEND_NAME
    }

    pub fn is_realtime(&self) -> bool {
        false
    }

    pub fn enumerate_devices(&self) -> Vec<DeviceStatus> {
        catalog::enumerate_devices()
    }

    pub fn available_sample_rates(&self, _device: &str) -> Vec<f32> {
        catalog::SAMPLE_RATES.to_vec()
    }

    pub fn available_buffer_sizes(&self, _device: &str) -> Vec<u32> {
        catalog::BUFFER_SIZES.to_vec()
    }

    pub fn available_input_channel_count(&self, _device: &str) -> u32 {
        catalog::MAX_CHANNELS
    }

    pub fn available_output_channel_count(&self, _device: &str) -> u32 {
        catalog::MAX_CHANNELS
    }

    pub fn can_change_sample_rate_when_running(&self) -> bool {
        false
    }

    pub fn can_change_buffer_size_when_running(&self) -> bool {
        false
    }

    pub fn enumerate_midi_options(&self) -> Vec<String> {
        MidiOption::ALL.iter().map(|o| o.as_str().to_string()).collect()
    }

    /// There is no external control application.
    pub fn control_app_name(&self) -> Option<&str> {
        None
    }

    /// Instance name; prefix of every host-registered port.
    pub fn my_name(&self) -> String {
        self.config.lock().instance_name.clone()
    }

    /// True while the engine is producing cycles.
    pub fn available(&self) -> bool {
        self.state().is_running()
    }

    pub fn port_name_size(&self) -> usize {
        catalog::PORT_NAME_SIZE
    }

    // ==================== Configuration ====================

    /// Snapshot of the current configuration.
    pub fn config(&self) -> BackendConfig {
        self.config.lock().clone()
    }

    /// Lifecycle lock for an operation allowed only while stopped.
    ///
    /// Refused without blocking from the worker and process threads, since
    /// `stop()` may hold the lock while joining them.
    fn stopped_only(&self, what: &'static str) -> Result<MutexGuard<'_, ()>> {
        if self.shared.in_process_thread() || self.state() != EngineState::Stopped {
            return Err(Error::NotPermittedWhileRunning(what));
        }
        let guard = self.lifecycle.lock();
        if self.state() != EngineState::Stopped {
            return Err(Error::NotPermittedWhileRunning(what));
        }
        Ok(guard)
    }

    fn configure(
        &self,
        what: &'static str,
        apply: impl FnOnce(&mut BackendConfig) -> Result<()>,
    ) -> Result<()> {
        let _lifecycle = self.stopped_only(what)?;
        apply(&mut self.config.lock())
    }

    pub fn set_device_name(&self, name: &str) -> Result<()> {
        self.configure("set_device_name", |c| {
            config::validate_device_name(name)?;
            c.device_name = name.to_string();
            Ok(())
        })
    }

    pub fn set_sample_rate(&self, rate: f32) -> Result<()> {
        self.configure("set_sample_rate", |c| {
            config::validate_sample_rate(rate)?;
            c.sample_rate = rate;
            Ok(())
        })
    }

    pub fn set_buffer_size(&self, size: u32) -> Result<()> {
        self.configure("set_buffer_size", |c| {
            config::validate_buffer_size(size)?;
            c.buffer_size = size;
            Ok(())
        })
    }

    pub fn set_interleaved(&self, interleaved: bool) -> Result<()> {
        self.configure("set_interleaved", |c| {
            c.interleaved = interleaved;
            Ok(())
        })
    }

    pub fn set_input_channels(&self, n: u32) -> Result<()> {
        self.configure("set_input_channels", |c| {
            config::validate_channels(n)?;
            c.input_channels = n;
            Ok(())
        })
    }

    pub fn set_output_channels(&self, n: u32) -> Result<()> {
        self.configure("set_output_channels", |c| {
            config::validate_channels(n)?;
            c.output_channels = n;
            Ok(())
        })
    }

    pub fn set_systemic_input_latency(&self, samples: u32) -> Result<()> {
        self.configure("set_systemic_input_latency", |c| {
            c.systemic_input_latency = samples;
            Ok(())
        })
    }

    pub fn set_systemic_output_latency(&self, samples: u32) -> Result<()> {
        self.configure("set_systemic_output_latency", |c| {
            c.systemic_output_latency = samples;
            Ok(())
        })
    }

    /// Accepts one of [`enumerate_midi_options`](Self::enumerate_midi_options).
    pub fn set_midi_option(&self, option: &str) -> Result<()> {
        let option: MidiOption = option.parse()?;
        self.configure("set_midi_option", |c| {
            c.midi_option = option;
            Ok(())
        })
    }

    pub fn device_name(&self) -> String {
        self.config.lock().device_name.clone()
    }

    pub fn sample_rate(&self) -> f32 {
        self.config.lock().sample_rate
    }

    pub fn buffer_size(&self) -> u32 {
        self.config.lock().buffer_size
    }

    pub fn interleaved(&self) -> bool {
        self.config.lock().interleaved
    }

    pub fn input_channels(&self) -> u32 {
        self.config.lock().input_channels
    }

    pub fn output_channels(&self) -> u32 {
        self.config.lock().output_channels
    }

    pub fn systemic_input_latency(&self) -> u32 {
        self.config.lock().systemic_input_latency
    }

    pub fn systemic_output_latency(&self) -> u32 {
        self.config.lock().systemic_output_latency
    }

    pub fn midi_option(&self) -> MidiOption {
        self.config.lock().midi_option
    }

    /// Installs the cycle callback. Only while stopped.
    pub fn set_process_handler<H: ProcessHandler>(&self, handler: H) -> Result<()> {
        let _lifecycle = self.stopped_only("set_process_handler")?;
        *self.shared.handler.lock() = Some(Box::new(handler));
        Ok(())
    }

    /// Removes and returns the installed handler. Only while stopped.
    pub fn take_process_handler(&self) -> Result<Option<Box<dyn ProcessHandler>>> {
        let _lifecycle = self.stopped_only("take_process_handler")?;
        Ok(self.shared.handler.lock().take())
    }

    // ==================== Lifecycle ====================

    pub fn state(&self) -> EngineState {
        self.shared.state.load()
    }

    pub fn is_running(&self) -> bool {
        self.state().is_running()
    }

    pub fn is_freewheeling(&self) -> bool {
        self.state() == EngineState::Freewheeling
    }

    /// Creates the physical ports and starts the worker thread. Returns once
    /// the worker has acknowledged it is cycling.
    ///
    /// After the handler quits the backend stays `Stopping`; call
    /// [`stop`](Self::stop) before starting again.
    pub fn start(&self, for_latency_measurement: bool) -> Result<()> {
        if self.shared.in_process_thread() {
            return Err(Error::NotPermittedWhileRunning(
                "start from a process thread",
            ));
        }
        let _lifecycle = self.lifecycle.lock();
        self.shared
            .state
            .transition(EngineState::Stopped, EngineState::Starting)
            .map_err(|current| match current {
                EngineState::Stopping => Error::NotPermittedWhileRunning("stop() pending"),
                _ => Error::AlreadyRunning,
            })?;

        match self.launch(for_latency_measurement) {
            Ok(()) => Ok(()),
            Err(e) => {
                self.unregister_system_ports();
                self.shared.state.store(EngineState::Stopped);
                tracing::error!("Backend failed to start: {e}");
                Err(e)
            }
        }
    }

    fn launch(&self, for_latency_measurement: bool) -> Result<()> {
        if self.shared.handler.lock().is_none() {
            return Err(Error::StartupFailed(
                "no process handler installed".to_string(),
            ));
        }

        let config = self.config();
        self.register_system_ports(&config)
            .map_err(|e| Error::StartupFailed(format!("cannot create system ports: {e}")))?;

        self.shared.shutdown.set(false);
        self.shared.clock.reset(config.buffer_size, config.sample_rate);
        self.shared.meter.reset();
        let stale = self.shared.drain_notifications();
        if stale > 0 {
            tracing::debug!("Discarded {stale} stale connection notifications");
        }

        let params = CycleParams {
            nframes: config.buffer_size,
            sample_rate: config.sample_rate,
        };
        let handle = worker::spawn_worker(
            &self.shared,
            params,
            format!("{}-process", config.instance_name),
        )?;
        *self.worker.lock() = Some(handle);

        tracing::info!(
            "Backend '{}' started on '{}' ({} in / {} out{})",
            config.instance_name,
            config.device_name,
            config.effective_input_channels(),
            config.effective_output_channels(),
            if for_latency_measurement {
                ", latency measurement"
            } else {
                ""
            }
        );
        Ok(())
    }

    /// Joins the worker and every process thread, then removes the physical
    /// ports. No-op when already stopped.
    pub fn stop(&self) -> Result<()> {
        if self.shared.in_process_thread() {
            return Err(Error::NotPermittedWhileRunning(
                "stop from a process thread",
            ));
        }
        let _lifecycle = self.lifecycle.lock();
        if self.state() == EngineState::Stopped {
            return Ok(());
        }

        self.shared.state.store(EngineState::Stopping);
        self.shared.shutdown.raise();

        let mut result = Ok(());
        if let Some(handle) = self.worker.lock().take() {
            if handle.join().is_err() {
                result = Err(Error::ThreadJoin("worker thread panicked".to_string()));
            }
        }
        let threads = self.shared.join_process_threads();

        self.unregister_system_ports();
        self.shared.clock.set_paced(false);
        self.shared.state.store(EngineState::Stopped);
        tracing::info!("Backend stopped");

        result.and(threads)
    }

    /// Switches between paced cycles and back-to-back cycles.
    pub fn freewheel(&self, on: bool) -> Result<()> {
        let (from, to) = if on {
            (EngineState::Running, EngineState::Freewheeling)
        } else {
            (EngineState::Freewheeling, EngineState::Running)
        };
        match self.shared.state.transition(from, to) {
            Ok(()) => {
                tracing::debug!("Freewheel {}", if on { "on" } else { "off" });
                Ok(())
            }
            Err(current) if current == to => Ok(()),
            Err(_) => Err(Error::NotRunning),
        }
    }

    /// Smoothed callback time as a fraction of the nominal cycle time.
    pub fn dsp_load(&self) -> f32 {
        self.shared.meter.average()
    }

    pub fn dsp_metrics(&self) -> DspMetrics {
        self.shared.meter.metrics()
    }

    pub fn xruns(&self) -> u64 {
        self.shared.meter.xruns()
    }

    /// Byte capacity of one port buffer.
    pub fn raw_buffer_size(&self, data_type: DataType) -> usize {
        match data_type {
            DataType::Audio => MAX_BUFFER_SIZE * core::mem::size_of::<f32>(),
            DataType::Midi => DEFAULT_MIDI_CAPACITY,
        }
    }

    // ==================== Process time ====================

    pub fn sample_time(&self) -> u64 {
        self.shared.clock.sample_time()
    }

    pub fn sample_time_at_cycle_start(&self) -> u64 {
        self.shared.clock.sample_time_at_cycle_start()
    }

    pub fn samples_since_cycle_start(&self) -> u32 {
        self.shared.clock.samples_since_cycle_start()
    }

    // ==================== Process threads ====================

    /// Spawns an auxiliary thread with the configured stack size. It is
    /// joined by [`join_process_threads`](Self::join_process_threads) or
    /// [`stop`](Self::stop).
    pub fn create_process_thread<F>(&self, f: F) -> Result<()>
    where
        F: FnOnce() + Send + 'static,
    {
        let (instance, stack_size) = {
            let config = self.config.lock();
            (config.instance_name.clone(), config.process_thread_stack_size)
        };
        let seq = self.thread_seq.fetch_add(1, Ordering::Relaxed);
        ThreadData::new(Arc::clone(&self.shared), Box::new(f), stack_size)
            .spawn(format!("{instance}-proc-{seq}"))
    }

    pub fn join_process_threads(&self) -> Result<()> {
        self.shared.join_process_threads()
    }

    /// True on the worker thread or on a thread from
    /// [`create_process_thread`](Self::create_process_thread).
    pub fn in_process_thread(&self) -> bool {
        self.shared.in_process_thread()
    }

    pub fn process_thread_count(&self) -> usize {
        self.shared.process_thread_count()
    }

    // ==================== Latency ====================

    /// Asks the worker to deliver `latency_changed` to the handler before the
    /// next cycle.
    pub fn update_latencies(&self) {
        self.shared.latency_dirty.raise();
    }

    pub fn set_latency_range(
        &self,
        port: PortHandle,
        for_playback: bool,
        range: LatencyRange,
    ) -> Result<()> {
        self.shared
            .registry
            .write()
            .get_mut(port)?
            .set_latency_range(for_playback, range);
        Ok(())
    }

    pub fn get_latency_range(&self, port: PortHandle, for_playback: bool) -> Result<LatencyRange> {
        Ok(self
            .shared
            .registry
            .read()
            .get(port)?
            .latency_range(for_playback))
    }

    // ==================== Ports ====================

    /// Registers `"<instance>:<shortname>"`.
    pub fn register_port(
        &self,
        shortname: &str,
        data_type: DataType,
        flags: PortFlags,
    ) -> Result<PortHandle> {
        let name = format!("{}:{}", self.my_name(), shortname);
        if shortname.is_empty() {
            return Err(Error::InvalidPortName {
                name,
                reason: "empty port name",
            });
        }
        if name.len() > catalog::PORT_NAME_SIZE {
            return Err(Error::InvalidPortName {
                name,
                reason: "port name too long",
            });
        }
        if flags.is_input() == flags.is_output() {
            return Err(Error::InvalidFlags("exactly one of INPUT or OUTPUT is required"));
        }
        if flags.is_physical() {
            return Err(Error::InvalidFlags("physical ports are owned by the backend"));
        }

        let handle = self.add_port(name, data_type, flags)?;
        tracing::debug!("Registered port {handle:?} ({data_type:?}, {flags:?})");
        Ok(handle)
    }

    fn add_port(&self, name: String, data_type: DataType, flags: PortFlags) -> Result<PortHandle> {
        let buffer = PortBuffer::new(data_type, MAX_BUFFER_SIZE, DEFAULT_MIDI_CAPACITY);
        let handle = self.shared.registry.write().insert(name, flags, buffer)?;
        self.shared.ports_changed.raise();
        Ok(handle)
    }

    /// Disconnects then destroys the port.
    pub fn unregister_port(&self, port: PortHandle) -> Result<()> {
        let peers = {
            let mut registry = self.shared.registry.write();
            if registry.get(port)?.flags().is_physical() {
                return Err(Error::NotSupported(
                    "physical ports are owned by the backend",
                ));
            }
            let peers = registry.disconnect_all(port)?;
            let removed = registry.remove(port)?;
            tracing::debug!("Unregistered port {}", removed.name);
            peers
        };
        for peer in peers {
            self.notify_connection(port, peer, false);
        }
        self.shared.ports_changed.raise();
        Ok(())
    }

    pub fn get_port_by_name(&self, name: &str) -> Option<PortHandle> {
        self.shared.registry.read().lookup(name)
    }

    pub fn get_port_name(&self, port: PortHandle) -> Result<String> {
        Ok(self.shared.registry.read().get(port)?.name.clone())
    }

    /// Renames to a full port name. Renaming to the current name is a no-op.
    pub fn set_port_name(&self, port: PortHandle, name: &str) -> Result<()> {
        if name.is_empty() || name.len() > catalog::PORT_NAME_SIZE {
            return Err(Error::InvalidPortName {
                name: name.to_string(),
                reason: "port name must be 1 to 256 bytes",
            });
        }
        {
            let mut registry = self.shared.registry.write();
            if registry.get(port)?.flags().is_physical() {
                return Err(Error::NotSupported(
                    "physical ports are owned by the backend",
                ));
            }
            registry.rename(port, name.to_string())?;
        }
        self.shared.ports_changed.raise();
        Ok(())
    }

    /// Names of ports matching `pattern`, `data_type` (`None` = any) and
    /// carrying all of `flags`, in registration order.
    pub fn get_ports<M: PortMatcher>(
        &self,
        pattern: M,
        data_type: Option<DataType>,
        flags: PortFlags,
    ) -> Vec<String> {
        self.shared
            .registry
            .read()
            .find_ports(&pattern, data_type, flags)
    }

    pub fn port_data_type(&self, port: PortHandle) -> Result<DataType> {
        Ok(self.shared.registry.read().get(port)?.data_type())
    }

    pub fn port_flags(&self, port: PortHandle) -> Result<PortFlags> {
        Ok(self.shared.registry.read().get(port)?.flags())
    }

    pub fn port_is_physical(&self, port: PortHandle) -> Result<bool> {
        Ok(self.port_flags(port)?.is_physical())
    }

    // ==================== Connections ====================

    fn notify_connection(&self, a: PortHandle, b: PortHandle, connected: bool) {
        if self.is_running() {
            self.shared.notify_connection(a, b, connected);
        }
    }

    pub fn connect_handles(&self, a: PortHandle, b: PortHandle) -> Result<()> {
        self.shared.registry.write().connect(a, b)?;
        tracing::debug!("Connected {a:?} <-> {b:?}");
        self.notify_connection(a, b, true);
        Ok(())
    }

    /// Connects two ports by full name.
    pub fn connect(&self, src: &str, dst: &str) -> Result<()> {
        let (a, b) = self.resolve_pair(src, dst)?;
        self.connect_handles(a, b)
    }

    pub fn connect_port(&self, port: PortHandle, other: &str) -> Result<()> {
        let b = self.shared.registry.read().resolve(other)?;
        self.connect_handles(port, b)
    }

    /// Not connected is not an error.
    pub fn disconnect_handles(&self, a: PortHandle, b: PortHandle) -> Result<()> {
        if self.shared.registry.write().disconnect(a, b)? {
            tracing::debug!("Disconnected {a:?} <-> {b:?}");
            self.notify_connection(a, b, false);
        }
        Ok(())
    }

    pub fn disconnect(&self, src: &str, dst: &str) -> Result<()> {
        let (a, b) = self.resolve_pair(src, dst)?;
        self.disconnect_handles(a, b)
    }

    pub fn disconnect_port(&self, port: PortHandle, other: &str) -> Result<()> {
        let b = self.shared.registry.read().resolve(other)?;
        self.disconnect_handles(port, b)
    }

    pub fn disconnect_all(&self, port: PortHandle) -> Result<()> {
        let peers = self.shared.registry.write().disconnect_all(port)?;
        for peer in peers {
            self.notify_connection(port, peer, false);
        }
        Ok(())
    }

    fn resolve_pair(&self, src: &str, dst: &str) -> Result<(PortHandle, PortHandle)> {
        let registry = self.shared.registry.read();
        Ok((registry.resolve(src)?, registry.resolve(dst)?))
    }

    pub fn is_connected(&self, port: PortHandle) -> Result<bool> {
        self.shared.registry.read().is_connected(port)
    }

    pub fn is_connected_to(&self, a: PortHandle, b: PortHandle) -> Result<bool> {
        self.shared.registry.read().is_connected_to(a, b)
    }

    /// Like [`is_connected_to`](Self::is_connected_to) with the peer given by
    /// name; an unknown name is simply not connected.
    pub fn connected_to(&self, port: PortHandle, other: &str) -> Result<bool> {
        let registry = self.shared.registry.read();
        match registry.lookup(other) {
            Some(b) => registry.is_connected_to(port, b),
            None => {
                registry.get(port)?;
                Ok(false)
            }
        }
    }

    pub fn is_physically_connected(&self, port: PortHandle) -> Result<bool> {
        self.shared.registry.read().is_physically_connected(port)
    }

    /// Peer names.
    pub fn get_connections(&self, port: PortHandle) -> Result<Vec<String>> {
        self.shared.registry.read().connection_names(port)
    }

    // ==================== Monitoring ====================

    pub fn can_monitor_input(&self) -> bool {
        false
    }

    pub fn request_input_monitoring(&self, _port: PortHandle, _yn: bool) -> Result<()> {
        Err(Error::NotSupported("input monitoring"))
    }

    pub fn ensure_input_monitoring(&self, _port: PortHandle, _yn: bool) -> Result<()> {
        Err(Error::NotSupported("input monitoring"))
    }

    pub fn monitoring_input(&self, port: PortHandle) -> Result<bool> {
        self.shared.registry.read().get(port)?;
        Ok(false)
    }

    // ==================== Physical ports ====================

    fn register_system_ports(&self, config: &BackendConfig) -> Result<()> {
        let capture = PortFlags::OUTPUT | PortFlags::PHYSICAL | PortFlags::TERMINAL;
        let playback = PortFlags::INPUT | PortFlags::PHYSICAL | PortFlags::TERMINAL;
        let capture_latency =
            LatencyRange::fixed(config.buffer_size + config.systemic_input_latency);
        let playback_latency =
            LatencyRange::fixed(config.buffer_size + config.systemic_output_latency);
        let midi_ports = config.midi_option.ports();
        let sys = catalog::SYSTEM_PREFIX;

        let mut specs = Vec::new();
        for i in 1..=config.effective_input_channels() {
            specs.push((format!("{sys}:capture_{i}"), DataType::Audio, capture));
        }
        for i in 1..=config.effective_output_channels() {
            specs.push((format!("{sys}:playback_{i}"), DataType::Audio, playback));
        }
        for i in 1..=midi_ports {
            specs.push((format!("{sys}:midi_capture_{i}"), DataType::Midi, capture));
        }
        for i in 1..=midi_ports {
            specs.push((format!("{sys}:midi_playback_{i}"), DataType::Midi, playback));
        }

        for (name, data_type, flags) in specs {
            let handle = self.add_port(name, data_type, flags)?;
            self.physical.lock().push(handle);
            let mut registry = self.shared.registry.write();
            let port = registry.get_mut(handle)?;
            if flags.is_output() {
                port.set_latency_range(false, capture_latency);
            } else {
                port.set_latency_range(true, playback_latency);
            }
        }

        tracing::debug!(
            "Registered {} physical ports",
            self.physical.lock().len()
        );
        Ok(())
    }

    fn unregister_system_ports(&self) {
        let handles = core::mem::take(&mut *self.physical.lock());
        let mut registry = self.shared.registry.write();
        for handle in handles {
            if let Err(e) = registry.remove(handle) {
                tracing::warn!("Physical port {handle:?} already gone: {e}");
            }
        }
        drop(registry);
        self.shared.ports_changed.raise();
    }

    fn physical_names(&self, data_type: DataType, direction: PortFlags) -> Vec<String> {
        self.shared.registry.read().find_ports(
            &"",
            Some(data_type),
            PortFlags::PHYSICAL | direction,
        )
    }

    fn physical_count(&self, direction: PortFlags) -> ChanCount {
        let registry = self.shared.registry.read();
        let mut count = ChanCount::default();
        for (_, port) in registry.iter() {
            if port.flags().contains(PortFlags::PHYSICAL | direction) {
                match port.data_type() {
                    DataType::Audio => count.audio += 1,
                    DataType::Midi => count.midi += 1,
                }
            }
        }
        count
    }

    /// Physical playback ports: the graph's sinks toward the device.
    pub fn get_physical_outputs(&self, data_type: DataType) -> Vec<String> {
        self.physical_names(data_type, PortFlags::INPUT)
    }

    /// Physical capture ports: the graph's sources from the device.
    pub fn get_physical_inputs(&self, data_type: DataType) -> Vec<String> {
        self.physical_names(data_type, PortFlags::OUTPUT)
    }

    pub fn n_physical_outputs(&self) -> ChanCount {
        self.physical_count(PortFlags::INPUT)
    }

    pub fn n_physical_inputs(&self) -> ChanCount {
        self.physical_count(PortFlags::OUTPUT)
    }
}

/// Dropping the backend stops it. When the last handle goes away on the
/// worker or a process thread, joining is impossible: shutdown is signalled
/// and the threads are detached, finishing after their current cycle.
impl Drop for Backend {
    fn drop(&mut self) {
        if self.shared.in_process_thread() {
            self.shared.state.store(EngineState::Stopping);
            self.shared.shutdown.raise();
            drop(self.worker.lock().take());
            tracing::debug!("Backend dropped on a process thread; worker detached");
            return;
        }
        if let Err(e) = self.stop() {
            tracing::warn!("Backend stop on drop failed: {e}");
        }
    }
}

impl core::fmt::Debug for Backend {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Backend")
            .field("config", &*self.config.lock())
            .field("state", &self.state())
            .field("ports", &self.shared.registry.read().len())
            .finish()
    }
}

/// Chained construction of a [`Backend`].
///
/// ```
/// use ersatz_core::{Backend, MidiOption};
///
/// let backend = Backend::builder()
///     .instance_name("host")
///     .sample_rate(44100.0)
///     .buffer_size(128)
///     .channels(2, 2)
///     .midi_option(MidiOption::OneInOneOut)
///     .build()?;
/// assert_eq!(backend.my_name(), "host");
/// # Ok::<(), ersatz_core::Error>(())
/// ```
#[derive(Debug, Clone, Default)]
pub struct BackendBuilder {
    config: BackendConfig,
}

impl BackendBuilder {
    /// Start from an existing configuration.
    pub fn config(mut self, config: BackendConfig) -> Self {
        self.config = config;
        self
    }

    pub fn instance_name(mut self, name: impl Into<String>) -> Self {
        self.config.instance_name = name.into();
        self
    }

    pub fn device_name(mut self, name: impl Into<String>) -> Self {
        self.config.device_name = name.into();
        self
    }

    pub fn sample_rate(mut self, rate: f32) -> Self {
        self.config.sample_rate = rate;
        self
    }

    pub fn buffer_size(mut self, size: u32) -> Self {
        self.config.buffer_size = size;
        self
    }

    /// Physical audio ports per direction; 0 selects the default of 8.
    pub fn channels(mut self, inputs: u32, outputs: u32) -> Self {
        self.config.input_channels = inputs;
        self.config.output_channels = outputs;
        self
    }

    pub fn systemic_latency(mut self, input: u32, output: u32) -> Self {
        self.config.systemic_input_latency = input;
        self.config.systemic_output_latency = output;
        self
    }

    pub fn interleaved(mut self, interleaved: bool) -> Self {
        self.config.interleaved = interleaved;
        self
    }

    pub fn midi_option(mut self, option: MidiOption) -> Self {
        self.config.midi_option = option;
        self
    }

    pub fn process_thread_stack_size(mut self, bytes: usize) -> Self {
        self.config.process_thread_stack_size = bytes;
        self
    }

    pub fn build(self) -> Result<Backend> {
        Backend::new(self.config)
    }
}
