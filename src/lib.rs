//! # Segment Counter Core Library
//!
//! Drives a seven-segment display built from individually addressable LEDs and
//! keeps it in step with counters published by a remote stats endpoint.
//!
//! ## Design Philosophy
//!
//! ### Single Thread, No Locks
//! Everything runs on one thread under a cooperative [`scheduler`]. The
//! poller task is the only writer of [`CounterState`] and the renderer task
//! the only reader. A task body always runs to completion before another one
//! starts, so sharing the state through `Rc<RefCell<_>>` is enough.
//!
//! ### Whole-State Updates
//! A successful poll reassigns every counter in one pass
//! ([`CounterState::reassign`]). The renderer therefore never sees some
//! counters from the latest fetch and others from an older one.
//!
//! ### Data Flow
//! 1. **Poll**: fetch the stats document → read one numeric field per section
//!    → reassign all counters ([`counter_data`])
//! 2. **Render**: pick the view for the current time window → format glyphs →
//!    light segments through the [`layout`] → commit one frame ([`renderer`])
//! 3. **Schedule**: both run as periodic tasks with their own intervals
//!    ([`scheduler`])
//!
//! ## Core Types
//! - [`Counter`]: one named unsigned counter
//! - [`CounterState`]: the fixed set of counters plus the last update time
//! - [`SharedCounters`]: the handle the poller and renderer share

use chrono::{DateTime, Utc};
use std::cell::RefCell;
use std::rc::Rc;

// Module declarations
pub mod config;
pub mod counter_data;
pub mod font;
pub mod frame;
pub mod layout;
pub mod renderer;
pub mod scheduler;

/// A single named counter.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Counter {
    pub name: String,
    pub value: u64,
}

/// The fixed set of counters shown by the display.
///
/// Names are chosen once at startup and never change. Values start at zero
/// and are only ever replaced wholesale.
///
/// # Example
/// ```
/// use segment_counter_lib::CounterState;
///
/// let mut state = CounterState::new(["go_matches", "ffa_matches"]);
/// state.reassign(|name| if name == "go_matches" { 7 } else { 0 }, chrono::Utc::now());
///
/// assert_eq!(state.get("go_matches"), Some(7));
/// assert_eq!(state.get("ffa_matches"), Some(0));
/// assert_eq!(state.get("unknown"), None);
/// ```
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CounterState {
    counters: Vec<Counter>,
    /// Time of the last successful reassignment
    last_update: Option<DateTime<Utc>>,
}

impl CounterState {
    pub fn new<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            counters: names
                .into_iter()
                .map(|name| Counter {
                    name: name.into(),
                    value: 0,
                })
                .collect(),
            last_update: None,
        }
    }

    pub fn len(&self) -> usize {
        self.counters.len()
    }

    pub fn is_empty(&self) -> bool {
        self.counters.is_empty()
    }

    pub fn counters(&self) -> &[Counter] {
        &self.counters
    }

    pub fn get(&self, name: &str) -> Option<u64> {
        self.counters
            .iter()
            .find(|c| c.name == name)
            .map(|c| c.value)
    }

    /// Saturating sum of the named counters. Unknown names count as zero.
    pub fn sum<'a>(&self, names: impl IntoIterator<Item = &'a str>) -> u64 {
        names
            .into_iter()
            .filter_map(|name| self.get(name))
            .fold(0u64, u64::saturating_add)
    }

    pub fn last_update(&self) -> Option<DateTime<Utc>> {
        self.last_update
    }

    /// Replace every counter in one pass, asking `value_for` for each name.
    pub fn reassign(&mut self, mut value_for: impl FnMut(&str) -> u64, at: DateTime<Utc>) {
        for counter in &mut self.counters {
            counter.value = value_for(&counter.name);
        }
        self.last_update = Some(at);
    }

    /// Zero every counter. The last update time is left alone.
    pub fn reset_all(&mut self) {
        for counter in &mut self.counters {
            counter.value = 0;
        }
    }
}

/// Counter state shared between the poller and the renderer.
pub type SharedCounters = Rc<RefCell<CounterState>>;

/// Wrap a fresh state for sharing between tasks.
pub fn shared_counters(state: CounterState) -> SharedCounters {
    Rc::new(RefCell::new(state))
}
