//! Worker lifecycle, cycle timing, sample clock and host notifications.

use approx::assert_abs_diff_eq;
use ersatz::prelude::*;
use ersatz::{EngineState, Error};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{mpsc, Arc, Mutex};
use std::time::{Duration, Instant};

mod helpers;
use helpers::*;

// =============================================================================
// Lifecycle
// =============================================================================

#[test]
fn test_start_then_immediate_stop_leaves_no_physical_ports() {
    let backend = test_backend();
    for _ in 0..20 {
        let (recorder, _) = Recorder::new();
        backend.set_process_handler(recorder).unwrap();
        backend.start(false).unwrap();
        assert!(backend.is_running());
        backend.stop().unwrap();

        assert_eq!(backend.state(), EngineState::Stopped);
        assert!(backend.get_ports("", None, PortFlags::PHYSICAL).is_empty());
        assert_eq!(backend.process_thread_count(), 0);
    }
}

#[test]
fn test_handler_survives_restart() {
    let backend = test_backend();
    let (recorder, observed) = Recorder::new();
    backend.set_process_handler(recorder).unwrap();

    backend.start(false).unwrap();
    assert!(wait_until(TEST_TIMEOUT, || observed.lock().unwrap().cycle_starts.len() >= 2));
    backend.stop().unwrap();

    backend.start(false).unwrap();
    assert!(wait_until(TEST_TIMEOUT, || backend.sample_time_at_cycle_start() > 0));
    backend.stop().unwrap();

    assert!(backend.take_process_handler().unwrap().is_some());
}

#[test]
fn test_quit_moves_to_stopping_until_stop() {
    let backend = test_backend();
    let (recorder, observed) = Recorder::new();
    backend.set_process_handler(recorder.quit_after(3)).unwrap();
    backend.start(false).unwrap();

    assert!(wait_for_state(&backend, EngineState::Stopping));
    assert!(matches!(backend.freewheel(true), Err(Error::NotRunning)));
    assert!(matches!(
        backend.start(false),
        Err(Error::NotPermittedWhileRunning(_))
    ));
    assert_eq!(observed.lock().unwrap().cycle_starts.len(), 3);

    backend.stop().unwrap();
    assert_eq!(backend.state(), EngineState::Stopped);
}

#[test]
fn test_stop_from_process_thread_is_refused() {
    let backend = Arc::new(test_backend());
    backend
        .set_process_handler(ClosureProcessHandler::new(|_| Control::Continue))
        .unwrap();
    backend.start(false).unwrap();

    let refused = Arc::new(AtomicBool::new(false));
    let (b, flag) = (Arc::clone(&backend), Arc::clone(&refused));
    backend
        .create_process_thread(move || {
            flag.store(b.stop().is_err(), Ordering::SeqCst);
        })
        .unwrap();
    backend.join_process_threads().unwrap();
    assert!(refused.load(Ordering::SeqCst));

    backend.stop().unwrap();
}

#[test]
fn test_config_change_from_callback_during_stop_is_refused() {
    let backend = Arc::new(test_backend());
    let entered = Arc::new(AtomicBool::new(false));
    let refused = Arc::new(AtomicBool::new(false));
    let weak = Arc::downgrade(&backend);
    let (seen, flag) = (Arc::clone(&entered), Arc::clone(&refused));
    backend
        .set_process_handler(ClosureProcessHandler::new(move |_| {
            seen.store(true, Ordering::SeqCst);
            std::thread::sleep(Duration::from_millis(50));
            if let Some(b) = weak.upgrade() {
                let result = b.set_buffer_size(512);
                flag.store(
                    matches!(result, Err(Error::NotPermittedWhileRunning(_))),
                    Ordering::SeqCst,
                );
            }
            Control::Continue
        }))
        .unwrap();
    backend.start(false).unwrap();
    assert!(wait_until(TEST_TIMEOUT, || entered.load(Ordering::SeqCst)));

    let (tx, rx) = mpsc::channel();
    let b = Arc::clone(&backend);
    std::thread::spawn(move || {
        let _ = tx.send(b.stop());
    });
    let stopped = rx.recv_timeout(Duration::from_secs(3));
    assert!(matches!(stopped, Ok(Ok(()))), "stop did not return: {stopped:?}");
    assert!(refused.load(Ordering::SeqCst));
    assert_eq!(backend.buffer_size(), TEST_BUFFER_SIZE);
}

/// Handler that reports when it is dropped.
struct DropSignal(mpsc::Sender<()>);

impl ProcessHandler for DropSignal {
    fn process(&mut self, _scope: &ProcessScope<'_>) -> Control {
        Control::Continue
    }
}

impl Drop for DropSignal {
    fn drop(&mut self) {
        let _ = self.0.send(());
    }
}

#[test]
fn test_last_handle_dropped_on_process_thread_shuts_worker_down() {
    let backend = Arc::new(test_backend());
    let (dropped_tx, dropped_rx) = mpsc::channel();
    backend.set_process_handler(DropSignal(dropped_tx)).unwrap();
    backend.start(false).unwrap();

    let (go_tx, go_rx) = mpsc::channel::<()>();
    let b = Arc::clone(&backend);
    backend
        .create_process_thread(move || {
            let _ = go_rx.recv();
            drop(b);
        })
        .unwrap();
    drop(backend);
    go_tx.send(()).unwrap();

    // The handler is only released once the detached worker has exited.
    assert!(dropped_rx.recv_timeout(TEST_TIMEOUT).is_ok());
}

// =============================================================================
// Sample clock
// =============================================================================

#[test]
fn test_running_cycles_advance_sample_time_exactly() {
    const CYCLES: usize = 12;
    let backend = test_backend();
    let (recorder, observed) = Recorder::new();
    backend.set_process_handler(recorder.quit_after(CYCLES)).unwrap();

    let start = Instant::now();
    backend.start(false).unwrap();
    assert!(wait_for_state(&backend, EngineState::Stopping));
    let elapsed = start.elapsed();
    backend.stop().unwrap();

    let s = TEST_BUFFER_SIZE as u64;
    let observed = observed.lock().unwrap();
    let expected: Vec<u64> = (0..CYCLES as u64).map(|i| i * s).collect();
    assert_eq!(observed.cycle_starts, expected);
    assert_eq!(backend.sample_time(), CYCLES as u64 * s);

    // Paced: cycles never run ahead of the nominal period.
    let period = Duration::from_secs_f64(TEST_BUFFER_SIZE as f64 / TEST_SAMPLE_RATE as f64);
    assert!(elapsed >= period * (CYCLES as u32 - 1));
}

#[test]
fn test_freewheel_cycles_advance_sample_time_exactly() {
    const CYCLES: usize = 400;
    // 400 paced cycles of 1024 @ 8 kHz would take ~51 s.
    let backend = Backend::builder()
        .sample_rate(8000.0)
        .buffer_size(1024)
        .build()
        .unwrap();
    let (recorder, observed) = Recorder::new();
    backend.set_process_handler(recorder.quit_after(CYCLES)).unwrap();

    let start = Instant::now();
    backend.start(false).unwrap();
    backend.freewheel(true).unwrap();
    assert!(wait_for_state(&backend, EngineState::Stopping));
    assert!(start.elapsed() < Duration::from_secs(10));
    backend.stop().unwrap();

    let observed = observed.lock().unwrap();
    assert_eq!(observed.cycle_starts.len(), CYCLES);
    for pair in observed.cycle_starts.windows(2) {
        assert_eq!(pair[1] - pair[0], 1024);
    }
    assert!(observed.freewheeling.iter().filter(|&&fw| fw).count() > CYCLES / 2);
    assert!(observed.notifications.contains(&Notification::Freewheel(true)));
    assert_eq!(backend.sample_time(), CYCLES as u64 * 1024);
}

#[test]
fn test_sample_time_monotonic_while_running() {
    let backend = test_backend();
    backend
        .set_process_handler(ClosureProcessHandler::new(|_| Control::Continue))
        .unwrap();
    backend.start(false).unwrap();

    let mut last = 0;
    let deadline = Instant::now() + Duration::from_millis(100);
    while Instant::now() < deadline {
        let now = backend.sample_time();
        assert!(now >= last);
        assert!(backend.samples_since_cycle_start() < TEST_BUFFER_SIZE);
        last = now;
    }
    backend.stop().unwrap();
    assert_eq!(backend.samples_since_cycle_start(), 0);
}

// =============================================================================
// DSP load
// =============================================================================

#[test]
fn test_freewheel_dsp_load_reflects_callback_time() {
    // Period is 1024 / 48000 = 21.3 ms; the callback costs ~2 ms.
    let backend = Backend::builder()
        .sample_rate(48000.0)
        .buffer_size(1024)
        .build()
        .unwrap();
    let (recorder, _) = Recorder::new();
    backend
        .set_process_handler(recorder.work(Duration::from_millis(2)).quit_after(60))
        .unwrap();

    backend.start(false).unwrap();
    backend.freewheel(true).unwrap();
    assert!(wait_for_state(&backend, EngineState::Stopping));

    // Back-to-back cycles would read ~1.0 if wall time per cycle were used.
    let load = backend.dsp_load();
    assert!(load > 0.05 && load < 0.6, "dsp load {load}");
    backend.stop().unwrap();
}

// =============================================================================
// Buffers
// =============================================================================

#[test]
fn test_inputs_read_as_silence_even_when_connected() {
    let backend = test_backend();
    let out = backend.register_port("out", DataType::Audio, PortFlags::OUTPUT).unwrap();
    let inp = backend.register_port("in", DataType::Audio, PortFlags::INPUT).unwrap();
    backend.connect_handles(out, inp).unwrap();

    let peaks = Arc::new(Mutex::new(Vec::new()));
    let log = Arc::clone(&peaks);
    let mut cycles = 0;
    backend
        .set_process_handler(ClosureProcessHandler::new(move |scope| {
            {
                let mut buf = scope.audio_buffer(out).unwrap();
                assert_eq!(buf.len(), scope.nframes() as usize);
                buf.fill(0.8);
            }
            let input = scope.audio_buffer(inp).unwrap();
            let peak = input.iter().fold(0.0f32, |m, s| m.max(s.abs()));
            log.lock().unwrap().push(peak);
            cycles += 1;
            if cycles == 5 {
                Control::Quit
            } else {
                Control::Continue
            }
        }))
        .unwrap();

    backend.start(false).unwrap();
    assert!(wait_for_state(&backend, EngineState::Stopping));
    backend.stop().unwrap();

    let peaks = peaks.lock().unwrap();
    assert_eq!(peaks.len(), 5);
    for &peak in peaks.iter() {
        assert_abs_diff_eq!(peak, 0.0, epsilon = SILENCE_THRESHOLD);
    }
}

#[test]
fn test_scope_rejects_wrong_type_and_double_borrow() {
    let backend = test_backend();
    let audio = backend.register_port("a", DataType::Audio, PortFlags::OUTPUT).unwrap();
    let midi = backend.register_port("m", DataType::Midi, PortFlags::OUTPUT).unwrap();

    let checks = Arc::new(AtomicUsize::new(0));
    let passed = Arc::clone(&checks);
    backend
        .set_process_handler(ClosureProcessHandler::new(move |scope| {
            if matches!(scope.midi_buffer(audio), Err(Error::DataTypeMismatch { .. })) {
                passed.fetch_add(1, Ordering::SeqCst);
            }
            if matches!(scope.audio_buffer(midi), Err(Error::DataTypeMismatch { .. })) {
                passed.fetch_add(1, Ordering::SeqCst);
            }
            let held = scope.audio_buffer(audio).unwrap();
            if matches!(scope.audio_buffer(audio), Err(Error::BufferBusy(_))) {
                passed.fetch_add(1, Ordering::SeqCst);
            }
            drop(held);
            Control::Quit
        }))
        .unwrap();

    backend.start(false).unwrap();
    assert!(wait_for_state(&backend, EngineState::Stopping));
    backend.stop().unwrap();
    assert_eq!(checks.load(Ordering::SeqCst), 3);
}

// =============================================================================
// Notifications
// =============================================================================

#[test]
fn test_notifications_reach_handler() {
    let backend = test_backend();
    let (recorder, observed) = Recorder::new();
    backend.set_process_handler(recorder).unwrap();
    backend.start(false).unwrap();

    let out = backend.register_port("out", DataType::Audio, PortFlags::OUTPUT).unwrap();
    let play = backend.get_port_by_name("system:playback_1").unwrap();
    backend.connect_handles(out, play).unwrap();
    backend.disconnect_handles(out, play).unwrap();
    backend.update_latencies();

    let expected = [
        Notification::Connection(out, play, true),
        Notification::Connection(out, play, false),
        Notification::Latency(false),
        Notification::Latency(true),
    ];
    let all_seen = wait_until(TEST_TIMEOUT, || {
        let observed = observed.lock().unwrap();
        expected.iter().all(|n| observed.notifications.contains(n))
    });
    backend.stop().unwrap();
    assert!(all_seen);

    let observed = observed.lock().unwrap();
    let notes = &observed.notifications;
    assert!(notes.contains(&Notification::PortsChanged));
    let pos = |n: &Notification| notes.iter().position(|x| x == n).unwrap();
    assert!(pos(&expected[0]) < pos(&expected[1]));
    assert!(pos(&expected[2]) < pos(&expected[3]));
}

// =============================================================================
// Process threads
// =============================================================================

#[test]
fn test_process_threads_join() {
    let backend = Arc::new(test_backend());
    let ran = Arc::new(AtomicUsize::new(0));
    for _ in 0..3 {
        let (b, ran) = (Arc::clone(&backend), Arc::clone(&ran));
        backend
            .create_process_thread(move || {
                if b.in_process_thread() {
                    ran.fetch_add(1, Ordering::SeqCst);
                }
            })
            .unwrap();
    }
    assert_eq!(backend.process_thread_count(), 3);
    assert!(!backend.in_process_thread());

    backend.join_process_threads().unwrap();
    assert_eq!(ran.load(Ordering::SeqCst), 3);
    assert_eq!(backend.process_thread_count(), 0);
}
