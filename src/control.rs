// MORAT CONTROL LOOP SCHEDULER
// ONE THREAD PER DOMAIN. EACH THREAD: SLEEP, SAMPLE -> DECIDE -> GUARD -> ACT, REPEAT.
//
// CANCELLATION IS ONE SHARED FLAG PLUS A CONDVAR. A STOP REQUEST WAKES EVERY
// SLEEPING LOOP IMMEDIATELY. A LOOP THAT OBSERVES STOP NEVER ACTUATES AGAIN.
// WRITES ALREADY IN FLIGHT ARE ALLOWED TO FINISH. A CYCLE THAT RETURNS AN
// ERROR ENDS ITS OWN LOOP; THE OTHER LOOPS KEEP RUNNING.

use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::{Arc, Condvar, Mutex};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use log::{info, warn};

use crate::error::Result;

// --- STOP SIGNAL ---

pub struct StopSignal {
    stopped: Mutex<bool>,
    wake: Condvar,
}

impl StopSignal {
    pub fn new() -> Self {
        Self {
            stopped: Mutex::new(false),
            wake: Condvar::new(),
        }
    }

    pub fn request_stop(&self) {
        let mut stopped = self.stopped.lock().unwrap_or_else(|e| e.into_inner());
        *stopped = true;
        self.wake.notify_all();
    }

    pub fn is_stopped(&self) -> bool {
        *self.stopped.lock().unwrap_or_else(|e| e.into_inner())
    }

    // SLEEP FOR `timeout` OR UNTIL STOP. RETURNS TRUE IF STOP WAS REQUESTED.
    pub fn wait_timeout(&self, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        let mut stopped = self.stopped.lock().unwrap_or_else(|e| e.into_inner());
        // CONDVARS WAKE SPURIOUSLY: KEEP WAITING UNTIL THE DEADLINE
        while !*stopped {
            let now = Instant::now();
            if now >= deadline {
                break;
            }
            stopped = match self.wake.wait_timeout(stopped, deadline - now) {
                Ok((guard, _)) => guard,
                Err(e) => e.into_inner().0,
            };
        }
        *stopped
    }

    // BLOCK UNTIL STOP
    pub fn wait(&self) {
        let mut stopped = self.stopped.lock().unwrap_or_else(|e| e.into_inner());
        while !*stopped {
            stopped = match self.wake.wait(stopped) {
                Ok(guard) => guard,
                Err(e) => e.into_inner(),
            };
        }
    }
}

impl Default for StopSignal {
    fn default() -> Self {
        Self::new()
    }
}

// --- LOOP STATE ---

#[repr(u8)]
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum LoopState {
    Running = 0,
    Stopping = 1,
    Stopped = 2,
}

impl LoopState {
    pub fn from_u8(v: u8) -> Self {
        match v {
            0 => Self::Running,
            1 => Self::Stopping,
            _ => Self::Stopped,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Self::Running => "RUNNING",
            Self::Stopping => "STOPPING",
            Self::Stopped => "STOPPED",
        }
    }
}

// --- DOMAIN ---

pub trait Domain: Send {
    fn name(&self) -> &'static str;

    fn interval(&self) -> Duration;

    // ONE SAMPLE -> DECIDE -> GUARD -> ACT PASS. MUST NOT PANIC OR BLOCK
    // UNBOUNDEDLY. IN-CYCLE WAITS GO THROUGH `stop` SO THEY ARE INTERRUPTIBLE.
    // Err MEANS THE DOMAIN CAN NO LONGER ACT (Error::VetoDomain).
    fn cycle(&mut self, stop: &StopSignal) -> Result<()>;

    // SOME DOMAINS ACT ON START, OTHERS WAIT ONE INTERVAL FIRST
    fn run_immediately(&self) -> bool {
        false
    }
}

// DRIVE `domain` UNTIL STOP. RUNS ON THE CALLING THREAD.
pub fn run_loop(domain: &mut dyn Domain, stop: &StopSignal, state: &AtomicU8) {
    state.store(LoopState::Running as u8, Ordering::Release);
    let interval = domain.interval();
    let mut cycles: u64 = 0;

    let mut stopped = if domain.run_immediately() {
        stop.is_stopped()
    } else {
        stop.wait_timeout(interval)
    };

    while !stopped {
        let result = domain.cycle(stop);
        cycles += 1;
        if let Err(e) = result {
            warn!("{}: {}, loop ends", domain.name(), e);
            break;
        }
        stopped = stop.wait_timeout(interval);
    }

    state.store(LoopState::Stopping as u8, Ordering::Release);
    info!("{}: stopping after {} cycles", domain.name(), cycles);
    state.store(LoopState::Stopped as u8, Ordering::Release);
}

// --- LOOP HANDLE ---

pub struct LoopHandle {
    name: &'static str,
    state: Arc<AtomicU8>,
    thread: JoinHandle<()>,
}

impl LoopHandle {
    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn state(&self) -> LoopState {
        LoopState::from_u8(self.state.load(Ordering::Acquire))
    }

    // WAIT FOR THE THREAD AND REPORT THE STATE IT LEFT BEHIND
    pub fn join(self) -> LoopState {
        if self.thread.join().is_err() {
            warn!("{}: loop thread panicked", self.name);
        }
        let state = LoopState::from_u8(self.state.load(Ordering::Acquire));
        info!("{}: joined, {}", self.name, state.label());
        state
    }
}

pub fn spawn(mut domain: Box<dyn Domain>, stop: Arc<StopSignal>) -> Result<LoopHandle> {
    let name = domain.name();
    let state = Arc::new(AtomicU8::new(LoopState::Running as u8));
    let thread_state = state.clone();

    let thread = thread::Builder::new()
        .name(format!("morat-{}", name))
        .spawn(move || {
            info!("{}: started (interval {:?})", name, domain.interval());
            run_loop(domain.as_mut(), &stop, &thread_state);
        })?;

    Ok(LoopHandle {
        name,
        state,
        thread,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Counter {
        cycles: Arc<AtomicU8>,
        immediate: bool,
        // VETO ON THIS CYCLE NUMBER
        veto_at: Option<u8>,
    }

    impl Domain for Counter {
        fn name(&self) -> &'static str {
            "counter"
        }

        fn interval(&self) -> Duration {
            Duration::from_secs(3600)
        }

        fn cycle(&mut self, _stop: &StopSignal) -> Result<()> {
            let n = self.cycles.fetch_add(1, Ordering::SeqCst) + 1;
            match self.veto_at {
                Some(at) if n >= at => Err(crate::error::Error::veto("counter exhausted")),
                _ => Ok(()),
            }
        }

        fn run_immediately(&self) -> bool {
            self.immediate
        }
    }

    #[test]
    fn wait_timeout_elapses_without_stop() {
        let stop = StopSignal::new();
        let t0 = Instant::now();
        assert!(!stop.wait_timeout(Duration::from_millis(20)));
        assert!(t0.elapsed() >= Duration::from_millis(20));
    }

    #[test]
    fn wait_timeout_returns_immediately_when_stopped() {
        let stop = StopSignal::new();
        stop.request_stop();
        let t0 = Instant::now();
        assert!(stop.wait_timeout(Duration::from_secs(3600)));
        assert!(t0.elapsed() < Duration::from_secs(1));
    }

    #[test]
    fn stop_interrupts_long_sleep() {
        let stop = Arc::new(StopSignal::new());
        let cycles = Arc::new(AtomicU8::new(0));
        let handle = spawn(
            Box::new(Counter { cycles: cycles.clone(), immediate: false, veto_at: None }),
            stop.clone(),
        )
        .unwrap();

        std::thread::sleep(Duration::from_millis(50));
        assert_eq!(handle.state(), LoopState::Running);

        let t0 = Instant::now();
        stop.request_stop();
        assert_eq!(handle.join(), LoopState::Stopped);
        assert!(t0.elapsed() < Duration::from_secs(5));
        // 1-HOUR INTERVAL NEVER ELAPSED: ZERO CYCLES
        assert_eq!(cycles.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn immediate_domain_runs_once_before_sleeping() {
        let stop = StopSignal::new();
        let cycles = Arc::new(AtomicU8::new(0));
        let state = AtomicU8::new(0);
        let mut domain = Counter { cycles: cycles.clone(), immediate: true, veto_at: None };

        std::thread::scope(|s| {
            s.spawn(|| {
                std::thread::sleep(Duration::from_millis(50));
                stop.request_stop();
            });
            run_loop(&mut domain, &stop, &state);
        });
        assert_eq!(cycles.load(Ordering::SeqCst), 1);
        assert_eq!(LoopState::from_u8(state.load(Ordering::Acquire)), LoopState::Stopped);
    }

    #[test]
    fn stopped_before_start_never_cycles() {
        let stop = StopSignal::new();
        stop.request_stop();
        let cycles = Arc::new(AtomicU8::new(0));
        let state = AtomicU8::new(0);
        let mut domain = Counter { cycles: cycles.clone(), immediate: true, veto_at: None };
        run_loop(&mut domain, &stop, &state);
        assert_eq!(cycles.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn veto_ends_only_that_loop() {
        let stop = StopSignal::new();
        let vetoed = Arc::new(AtomicU8::new(0));
        let state = AtomicU8::new(0);
        let mut domain = Counter { cycles: vetoed.clone(), immediate: true, veto_at: Some(1) };

        // RETURNS WITHOUT ANY STOP REQUEST
        run_loop(&mut domain, &stop, &state);
        assert_eq!(vetoed.load(Ordering::SeqCst), 1);
        assert_eq!(LoopState::from_u8(state.load(Ordering::Acquire)), LoopState::Stopped);
        assert!(!stop.is_stopped());
    }

    #[test]
    fn vetoed_loop_leaves_siblings_running() {
        let stop = Arc::new(StopSignal::new());
        let vetoed = spawn(
            Box::new(Counter { cycles: Arc::new(AtomicU8::new(0)), immediate: true, veto_at: Some(1) }),
            stop.clone(),
        )
        .unwrap();
        let sibling = spawn(
            Box::new(Counter { cycles: Arc::new(AtomicU8::new(0)), immediate: true, veto_at: None }),
            stop.clone(),
        )
        .unwrap();

        std::thread::sleep(Duration::from_millis(50));
        assert_eq!(vetoed.state(), LoopState::Stopped);
        assert_eq!(sibling.state(), LoopState::Running);

        stop.request_stop();
        assert_eq!(vetoed.join(), LoopState::Stopped);
        assert_eq!(sibling.join(), LoopState::Stopped);
    }

    #[test]
    fn state_labels() {
        assert_eq!(LoopState::Running.label(), "RUNNING");
        assert_eq!(LoopState::from_u8(1).label(), "STOPPING");
        assert_eq!(LoopState::from_u8(9).label(), "STOPPED");
    }
}
