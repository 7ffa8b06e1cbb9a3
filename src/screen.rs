// MORAT SCREEN STATE
// BACKLIGHT WATCHER + THE SHARED CELL THE RECLAIMER READS.
//
// THE WATCHER POLLS bl_power (0 = ON, ANYTHING ELSE = OFF) ON ITS OWN LOOP
// AND FANS EVERY TRANSITION OUT TO REGISTERED CALLBACKS. THE FIRST READ IS
// ALWAYS REPORTED, SO A SCREEN THAT IS ALREADY OFF AT STARTUP IS TRACKED.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use log::{debug, info};

use crate::control::{Domain, StopSignal};
use crate::error::Result;
use crate::platform::{ScreenCallback, ScreenEvent, ScreenListener, ScreenState};

pub const NAME: &str = "screen";

// --- SHARED CELL ---

// LAST OBSERVED TRANSITION. WRITTEN BY THE WATCHER THREAD, READ BY THE RECLAIMER.
#[derive(Clone, Default)]
pub struct ScreenCell {
    inner: Arc<Mutex<Option<ScreenEvent>>>,
}

impl ScreenCell {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&self, event: ScreenEvent) {
        *self.inner.lock().unwrap_or_else(|e| e.into_inner()) = Some(event);
    }

    pub fn get(&self) -> Option<ScreenEvent> {
        *self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }

    // CALLBACK THAT KEEPS THIS CELL CURRENT
    pub fn updater(&self) -> ScreenCallback {
        let cell = self.clone();
        Box::new(move |event| cell.set(event))
    }
}

// --- BACKLIGHT LISTENER ---

pub struct BacklightListener {
    bl_power: PathBuf,
    callbacks: Mutex<Vec<ScreenCallback>>,
}

impl BacklightListener {
    pub fn new(bl_power: impl Into<PathBuf>) -> Self {
        Self {
            bl_power: bl_power.into(),
            callbacks: Mutex::new(Vec::new()),
        }
    }

    // FIRST PANEL UNDER <root>/sys/class/backlight THAT EXPOSES bl_power
    pub fn discover(root: &Path) -> Option<Self> {
        let class = root.join("sys/class/backlight");
        let mut panels: Vec<PathBuf> = fs::read_dir(&class)
            .ok()?
            .filter_map(|e| e.ok())
            .map(|e| e.path().join("bl_power"))
            .filter(|p| p.exists())
            .collect();
        panels.sort();
        panels.into_iter().next().map(Self::new)
    }

    pub fn path(&self) -> &Path {
        &self.bl_power
    }

    pub fn read_state(&self) -> Option<ScreenState> {
        let raw = fs::read_to_string(&self.bl_power).ok()?;
        let value: u32 = raw.trim().parse().ok()?;
        Some(if value == 0 { ScreenState::On } else { ScreenState::Off })
    }

    fn emit(&self, event: ScreenEvent) {
        let callbacks = self.callbacks.lock().unwrap_or_else(|e| e.into_inner());
        for cb in callbacks.iter() {
            cb(event);
        }
    }
}

impl ScreenListener for BacklightListener {
    fn register_screen_state_listener(&self, callback: ScreenCallback) {
        self.callbacks
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(callback);
    }
}

// --- WATCHER LOOP ---

pub struct ScreenWatcher {
    listener: Arc<BacklightListener>,
    interval: Duration,
    last: Option<ScreenState>,
}

impl ScreenWatcher {
    pub fn new(listener: Arc<BacklightListener>, interval: Duration) -> Self {
        Self {
            listener,
            interval,
            last: None,
        }
    }

    // Some(event) WHEN A TRANSITION WAS EMITTED
    pub fn step(&mut self) -> Option<ScreenEvent> {
        let state = match self.listener.read_state() {
            Some(s) => s,
            None => {
                debug!("{}: {} unreadable", NAME, self.listener.path().display());
                return None;
            }
        };
        if self.last == Some(state) {
            return None;
        }

        let event = ScreenEvent {
            state,
            at: Instant::now(),
        };
        if self.last.is_some() {
            info!("{}: {:?}", NAME, state);
        } else {
            info!("{}: initial state {:?}", NAME, state);
        }
        self.last = Some(state);
        self.listener.emit(event);
        Some(event)
    }
}

impl Domain for ScreenWatcher {
    fn name(&self) -> &'static str {
        NAME
    }

    fn interval(&self) -> Duration {
        self.interval
    }

    fn cycle(&mut self, _stop: &StopSignal) -> Result<()> {
        self.step();
        Ok(())
    }

    fn run_immediately(&self) -> bool {
        true
    }
}
