//! Periodic game-loop scheduler
//!
//! Runs four tasks on their own threads: logic update, physics update,
//! render notification and the millisecond clock. All four share one gate
//! (`running` + `paused` behind a mutex and condition variable):
//! - paused tasks block on the condition variable before their next callback
//! - sleeps wait on the same condition variable so `stop()` wakes them
//! - a failing or panicking callback is logged and the loop keeps going

use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Condvar, Mutex, MutexGuard, PoisonError};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use crate::consts::*;
use crate::settings::ClockPolicy;

/// Callbacks driven by the scheduler
pub trait GameLoop: Send + Sync + 'static {
    /// Called once, synchronously, from `start()`
    fn on_init(&self) -> anyhow::Result<()> {
        Ok(())
    }
    /// Game-logic tick
    fn on_update(&self) -> anyhow::Result<()>;
    /// Physics tick
    fn on_physics_update(&self) -> anyhow::Result<()>;
    /// Render notification
    fn on_render(&self) -> anyhow::Result<()> {
        Ok(())
    }
    /// Clock advanced by `ms`; `elapsed_ms` is the scheduler total since start
    fn on_time(&self, ms: u64, elapsed_ms: u64) -> anyhow::Result<()>;
}

/// Scheduler lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchedulerState {
    Stopped,
    Running,
    Paused,
}

#[derive(Debug, Default)]
struct GateState {
    running: bool,
    paused: bool,
}

/// Shared pause/stop gate
#[derive(Debug, Default)]
struct Gate {
    state: Mutex<GateState>,
    cond: Condvar,
    elapsed_ms: AtomicU64,
}

impl Gate {
    fn lock(&self) -> MutexGuard<'_, GateState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Block while paused. Returns false once the scheduler stops.
    fn wait_until_resumed(&self) -> bool {
        let guard = self.lock();
        let guard = self
            .cond
            .wait_while(guard, |s| s.running && s.paused)
            .unwrap_or_else(PoisonError::into_inner);
        guard.running
    }

    /// Sleep for `interval` unless stopped first. Returns false once stopped.
    fn sleep(&self, interval: Duration) -> bool {
        let deadline = Instant::now() + interval;
        let mut guard = self.lock();
        // Loop so spurious wakeups and pause toggles don't cut the sleep short
        while guard.running {
            let now = Instant::now();
            if now >= deadline {
                break;
            }
            guard = self
                .cond
                .wait_timeout(guard, deadline - now)
                .unwrap_or_else(PoisonError::into_inner)
                .0;
        }
        guard.running
    }

    fn is_running(&self) -> bool {
        self.lock().running
    }
}

/// Cloneable control handle, usable from inside callbacks
#[derive(Debug, Clone)]
pub struct SchedulerHandle {
    gate: Arc<Gate>,
}

impl SchedulerHandle {
    pub fn pause(&self) {
        self.gate.lock().paused = true;
        log::debug!("Scheduler paused");
    }

    pub fn resume(&self) {
        self.gate.lock().paused = false;
        self.gate.cond.notify_all();
        log::debug!("Scheduler resumed");
    }

    pub fn is_paused(&self) -> bool {
        self.gate.lock().paused
    }

    pub fn is_running(&self) -> bool {
        self.gate.is_running()
    }

    /// Ask every task to exit without waiting for them
    pub fn request_stop(&self) {
        self.gate.lock().running = false;
        self.gate.cond.notify_all();
    }

    /// Milliseconds counted by the clock task since `start()`
    pub fn elapsed_ms(&self) -> u64 {
        self.gate.elapsed_ms.load(Ordering::Relaxed)
    }

    pub fn state(&self) -> SchedulerState {
        let gate = self.gate.lock();
        match (gate.running, gate.paused) {
            (false, _) => SchedulerState::Stopped,
            (true, false) => SchedulerState::Running,
            (true, true) => SchedulerState::Paused,
        }
    }
}

/// Four-task periodic scheduler
pub struct Scheduler {
    gate: Arc<Gate>,
    interval: Duration,
    clock_policy: ClockPolicy,
    handles: Vec<JoinHandle<()>>,
}

impl Default for Scheduler {
    fn default() -> Self {
        Self::new()
    }
}

impl Scheduler {
    pub fn new() -> Self {
        let mut scheduler = Self {
            gate: Arc::new(Gate::default()),
            interval: Duration::ZERO,
            clock_policy: ClockPolicy::default(),
            handles: Vec::with_capacity(4),
        };
        scheduler.configure(DEFAULT_TICKS_PER_SECOND);
        scheduler
    }

    /// Set the update/physics/render rate; the clock always runs at 1 ms
    pub fn configure(&mut self, ticks_per_second: u32) {
        let tps = u64::from(ticks_per_second.max(1));
        self.interval = Duration::from_millis((1000 / tps).max(1));
    }

    /// Whether the clock task obeys the pause gate
    pub fn set_clock_policy(&mut self, policy: ClockPolicy) {
        self.clock_policy = policy;
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    pub fn handle(&self) -> SchedulerHandle {
        SchedulerHandle {
            gate: Arc::clone(&self.gate),
        }
    }

    /// Run `on_init`, then launch the four periodic tasks
    pub fn start(&mut self, actions: Arc<dyn GameLoop>) {
        if self.gate.is_running() {
            log::warn!("Scheduler already running");
            return;
        }
        // A previous run may have been stopped from inside a callback
        self.join_all();

        {
            let mut gate = self.gate.lock();
            gate.running = true;
            gate.paused = false;
        }
        self.gate.elapsed_ms.store(0, Ordering::Relaxed);

        run_guarded("init", || actions.on_init());

        let interval = self.interval;
        self.spawn_periodic("update", &actions, interval, |a| a.on_update());
        self.spawn_periodic("physics", &actions, interval, |a| a.on_physics_update());
        self.spawn_periodic("render", &actions, interval, |a| a.on_render());
        self.spawn_clock(&actions);

        log::info!(
            "Scheduler started ({} ms interval, clock {:?})",
            interval.as_millis(),
            self.clock_policy
        );
    }

    /// Stop all tasks and wait for them to exit
    pub fn stop(&mut self) {
        self.handle().request_stop();
        self.join_all();
        log::info!("Scheduler stopped after {} ms", self.handle().elapsed_ms());
    }

    fn join_all(&mut self) {
        let current = thread::current().id();
        for handle in self.handles.drain(..) {
            if handle.thread().id() == current {
                // Stopping from inside a task: it exits on its own
                continue;
            }
            if handle.join().is_err() {
                log::error!("Scheduler task terminated abnormally");
            }
        }
    }

    fn spawn_periodic(
        &mut self,
        name: &'static str,
        actions: &Arc<dyn GameLoop>,
        interval: Duration,
        callback: fn(&dyn GameLoop) -> anyhow::Result<()>,
    ) {
        let gate = Arc::clone(&self.gate);
        let actions = Arc::clone(actions);
        self.spawn(name, move || {
            while gate.wait_until_resumed() {
                run_guarded(name, || callback(actions.as_ref()));
                if !gate.sleep(interval) {
                    break;
                }
            }
        });
    }

    fn spawn_clock(&mut self, actions: &Arc<dyn GameLoop>) {
        let gate = Arc::clone(&self.gate);
        let actions = Arc::clone(actions);
        let pausable = self.clock_policy == ClockPolicy::Pausable;
        let tick = Duration::from_millis(TIME_TICK_MS);
        self.spawn("time", move || {
            loop {
                let running = if pausable {
                    gate.wait_until_resumed()
                } else {
                    gate.is_running()
                };
                if !running {
                    break;
                }
                let elapsed = gate.elapsed_ms.fetch_add(TIME_TICK_MS, Ordering::Relaxed) + TIME_TICK_MS;
                run_guarded("time", || actions.on_time(TIME_TICK_MS, elapsed));
                if !gate.sleep(tick) {
                    break;
                }
            }
        });
    }

    fn spawn<F>(&mut self, name: &'static str, body: F)
    where
        F: FnOnce() + Send + 'static,
    {
        match thread::Builder::new().name(format!("loop-{name}")).spawn(body) {
            Ok(handle) => self.handles.push(handle),
            Err(e) => log::error!("Failed to spawn {} task: {}", name, e),
        }
    }
}

impl Drop for Scheduler {
    fn drop(&mut self) {
        self.handle().request_stop();
        self.join_all();
    }
}

/// Invoke a callback, logging errors and panics instead of propagating them
fn run_guarded<F>(name: &str, callback: F)
where
    F: FnOnce() -> anyhow::Result<()>,
{
    match panic::catch_unwind(AssertUnwindSafe(callback)) {
        Ok(Ok(())) => {}
        Ok(Err(e)) => log::warn!("{} callback failed: {:#}", name, e),
        Err(_) => log::error!("{} callback panicked", name),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;

    #[derive(Default)]
    struct Counters {
        init: AtomicUsize,
        update: AtomicUsize,
        physics: AtomicUsize,
        render: AtomicUsize,
        time_ms: AtomicU64,
        fail_physics: bool,
    }

    impl GameLoop for Counters {
        fn on_init(&self) -> anyhow::Result<()> {
            self.init.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }

        fn on_update(&self) -> anyhow::Result<()> {
            self.update.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }

        fn on_physics_update(&self) -> anyhow::Result<()> {
            let n = self.physics.fetch_add(1, Ordering::SeqCst);
            if self.fail_physics {
                if n % 2 == 0 {
                    anyhow::bail!("physics tick {} failed", n);
                }
                panic!("physics tick {} panicked", n);
            }
            Ok(())
        }

        fn on_render(&self) -> anyhow::Result<()> {
            self.render.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }

        fn on_time(&self, ms: u64, _elapsed_ms: u64) -> anyhow::Result<()> {
            self.time_ms.fetch_add(ms, Ordering::SeqCst);
            Ok(())
        }
    }

    fn wait_for(mut condition: impl FnMut() -> bool) -> bool {
        let deadline = Instant::now() + Duration::from_secs(5);
        while Instant::now() < deadline {
            if condition() {
                return true;
            }
            thread::sleep(Duration::from_millis(2));
        }
        false
    }

    #[test]
    fn test_configure_interval() {
        let mut scheduler = Scheduler::new();
        assert_eq!(scheduler.interval(), Duration::from_millis(8));
        scheduler.configure(60);
        assert_eq!(scheduler.interval(), Duration::from_millis(16));
        scheduler.configure(5000);
        assert_eq!(scheduler.interval(), Duration::from_millis(1));
    }

    #[test]
    fn test_start_runs_all_tasks_and_stop_joins() {
        let counters = Arc::new(Counters::default());
        let mut scheduler = Scheduler::new();
        let handle = scheduler.handle();
        assert_eq!(handle.state(), SchedulerState::Stopped);

        scheduler.start(counters.clone());
        assert_eq!(counters.init.load(Ordering::SeqCst), 1);
        assert_eq!(handle.state(), SchedulerState::Running);

        assert!(wait_for(|| {
            counters.update.load(Ordering::SeqCst) > 2
                && counters.physics.load(Ordering::SeqCst) > 2
                && counters.render.load(Ordering::SeqCst) > 2
                && counters.time_ms.load(Ordering::SeqCst) > 5
        }));

        scheduler.stop();
        assert_eq!(handle.state(), SchedulerState::Stopped);
        let physics = counters.physics.load(Ordering::SeqCst);
        thread::sleep(Duration::from_millis(30));
        assert_eq!(counters.physics.load(Ordering::SeqCst), physics);
    }

    #[test]
    fn test_pause_blocks_callbacks() {
        let counters = Arc::new(Counters::default());
        let mut scheduler = Scheduler::new();
        let handle = scheduler.handle();
        scheduler.start(counters.clone());

        assert!(wait_for(|| counters.physics.load(Ordering::SeqCst) > 1));
        handle.pause();
        assert_eq!(handle.state(), SchedulerState::Paused);
        // Let any in-flight iteration finish
        thread::sleep(Duration::from_millis(30));

        let physics = counters.physics.load(Ordering::SeqCst);
        let time = counters.time_ms.load(Ordering::SeqCst);
        thread::sleep(Duration::from_millis(50));
        assert_eq!(counters.physics.load(Ordering::SeqCst), physics);
        assert_eq!(counters.time_ms.load(Ordering::SeqCst), time);

        handle.resume();
        assert!(wait_for(|| counters.physics.load(Ordering::SeqCst) > physics));
        scheduler.stop();
    }

    #[test]
    fn test_free_clock_ignores_pause() {
        let counters = Arc::new(Counters::default());
        let mut scheduler = Scheduler::new();
        scheduler.set_clock_policy(ClockPolicy::Free);
        let handle = scheduler.handle();
        scheduler.start(counters.clone());

        handle.pause();
        thread::sleep(Duration::from_millis(20));
        let time = counters.time_ms.load(Ordering::SeqCst);
        assert!(wait_for(|| counters.time_ms.load(Ordering::SeqCst) > time + 5));
        scheduler.stop();
    }

    #[test]
    fn test_stop_while_paused_returns() {
        let counters = Arc::new(Counters::default());
        let mut scheduler = Scheduler::new();
        let handle = scheduler.handle();
        scheduler.start(counters.clone());
        handle.pause();

        let started = Instant::now();
        scheduler.stop();
        assert!(started.elapsed() < Duration::from_secs(1));
        assert_eq!(handle.state(), SchedulerState::Stopped);
    }

    #[test]
    fn test_failing_callbacks_keep_loop_alive() {
        let counters = Arc::new(Counters {
            fail_physics: true,
            ..Default::default()
        });
        let mut scheduler = Scheduler::new();
        scheduler.start(counters.clone());
        assert!(wait_for(|| counters.physics.load(Ordering::SeqCst) > 4));
        scheduler.stop();
    }

    #[test]
    fn test_restart_after_stop() {
        let counters = Arc::new(Counters::default());
        let mut scheduler = Scheduler::new();
        let handle = scheduler.handle();

        scheduler.start(counters.clone());
        assert!(wait_for(|| handle.elapsed_ms() > 3));
        scheduler.stop();

        scheduler.start(counters.clone());
        assert_eq!(counters.init.load(Ordering::SeqCst), 2);
        assert!(handle.elapsed_ms() < 1000);
        scheduler.stop();
    }

    #[test]
    fn test_request_stop_from_handle() {
        let counters = Arc::new(Counters::default());
        let mut scheduler = Scheduler::new();
        let handle = scheduler.handle();
        scheduler.start(counters.clone());

        handle.request_stop();
        assert!(!handle.is_running());
        scheduler.stop();
    }
}
