//! # Cooperative Task Scheduler
//!
//! A minimal single-threaded scheduler for periodic work. Each [`Task`] is
//! plain data (interval, repeat policy, state) plus a boxed [`Work`]
//! capability; the scheduler never knows what a task actually does.
//!
//! ## Execution Model
//! - [`Scheduler::execute`] is one pass: every enabled task whose due time
//!   has passed runs to completion, in registration order.
//! - There is no preemption. A slow task body delays every other task,
//!   including its own next run.
//! - Tasks never sleep. After a run the scheduler stores the next due time
//!   (`now + interval`) and the run loop idles until the earliest one.
//!
//! Time comes from a [`Clock`], so tests drive the scheduler with a
//! [`ManualClock`] and never wait on real time.

use std::cell::Cell;
use std::rc::Rc;
use std::time::{Duration, Instant};

/// Milliseconds since the clock's origin.
pub type Millis = u64;

/// Monotonic time source.
pub trait Clock {
    fn now_ms(&self) -> Millis;
}

/// Wall clock measured from construction.
pub struct SystemClock {
    origin: Instant,
}

impl SystemClock {
    pub fn new() -> Self {
        Self {
            origin: Instant::now(),
        }
    }
}

impl Default for SystemClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for SystemClock {
    fn now_ms(&self) -> Millis {
        self.origin.elapsed().as_millis() as Millis
    }
}

/// Hand-driven clock. Clones share the same time.
#[derive(Clone, Debug, Default)]
pub struct ManualClock {
    now: Rc<Cell<Millis>>,
}

impl ManualClock {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&self, now: Millis) {
        self.now.set(now);
    }

    pub fn advance(&self, by: Millis) {
        self.now.set(self.now.get() + by);
    }
}

impl Clock for ManualClock {
    fn now_ms(&self) -> Millis {
        self.now.get()
    }
}

/// A unit of work run by a task.
pub trait Work {
    /// Run once. `now` is the scheduler time the run was started at.
    fn run(&mut self, now: Millis);
}

impl<F: FnMut(Millis)> Work for F {
    fn run(&mut self, now: Millis) {
        self(now)
    }
}

/// How many times a task runs per enable.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Repeat {
    Forever,
    Times(u32),
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TaskState {
    Disabled,
    /// Enabled and waiting for its due time
    Waiting,
    Running,
}

/// A periodic task.
pub struct Task {
    name: String,
    interval: Millis,
    repeat: Repeat,
    delay_first_run: bool,
    state: TaskState,
    next_due: Millis,
    runs: u32,
    work: Box<dyn Work>,
}

impl Task {
    /// A disabled task that runs immediately once enabled.
    pub fn new(
        name: impl Into<String>,
        interval: Duration,
        repeat: Repeat,
        work: impl Work + 'static,
    ) -> Self {
        Self {
            name: name.into(),
            interval: interval.as_millis() as Millis,
            repeat,
            delay_first_run: false,
            state: TaskState::Disabled,
            next_due: 0,
            runs: 0,
            work: Box::new(work),
        }
    }

    /// Wait one full interval after enabling before the first run.
    pub fn delayed(mut self) -> Self {
        self.delay_first_run = true;
        self
    }

    pub fn state(&self) -> TaskState {
        self.state
    }

    /// Runs completed since the task was last enabled.
    pub fn runs(&self) -> u32 {
        self.runs
    }

    pub fn next_due(&self) -> Option<Millis> {
        (self.state == TaskState::Waiting).then_some(self.next_due)
    }

    fn exhausted(&self) -> bool {
        match self.repeat {
            Repeat::Forever => false,
            Repeat::Times(n) => self.runs >= n,
        }
    }
}

/// Handle returned by [`Scheduler::add`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct TaskId(usize);

/// Drives a fixed set of tasks from one run loop.
pub struct Scheduler<C> {
    clock: C,
    tasks: Vec<Task>,
}

impl<C: Clock> Scheduler<C> {
    pub fn new(clock: C) -> Self {
        Self {
            clock,
            tasks: Vec::new(),
        }
    }

    /// Register a task. It stays disabled until [`enable`](Self::enable).
    pub fn add(&mut self, task: Task) -> TaskId {
        self.tasks.push(task);
        TaskId(self.tasks.len() - 1)
    }

    pub fn task(&self, id: TaskId) -> &Task {
        &self.tasks[id.0]
    }

    /// Move a task to waiting and schedule its first run.
    pub fn enable(&mut self, id: TaskId) {
        let now = self.clock.now_ms();
        let task = &mut self.tasks[id.0];
        task.runs = 0;
        if task.exhausted() {
            log::debug!("task {} has no runs to do; leaving it disabled", task.name);
            task.state = TaskState::Disabled;
            return;
        }

        task.next_due = if task.delay_first_run {
            now + task.interval
        } else {
            now
        };
        task.state = TaskState::Waiting;
        log::debug!("task {} enabled, first run at {}ms", task.name, task.next_due);
    }

    pub fn disable(&mut self, id: TaskId) {
        let task = &mut self.tasks[id.0];
        task.state = TaskState::Disabled;
        log::debug!("task {} disabled", task.name);
    }

    /// One pass: run every due task to completion. Returns how many ran.
    pub fn execute(&mut self) -> usize {
        let Self { clock, tasks } = self;
        let mut ran = 0;

        for task in tasks.iter_mut() {
            let now = clock.now_ms();
            if task.state != TaskState::Waiting || now < task.next_due {
                continue;
            }

            task.state = TaskState::Running;
            log::trace!("running task {} at {}ms", task.name, now);
            task.work.run(now);
            task.runs = task.runs.saturating_add(1);
            ran += 1;

            if task.exhausted() {
                task.state = TaskState::Disabled;
                log::debug!("task {} finished after {} runs", task.name, task.runs);
            } else {
                task.next_due = clock.now_ms() + task.interval;
                task.state = TaskState::Waiting;
            }
        }

        ran
    }

    /// Earliest due time among waiting tasks.
    pub fn next_due(&self) -> Option<Millis> {
        self.tasks.iter().filter_map(Task::next_due).min()
    }

    /// Time left until the next task is due, zero if one is overdue.
    pub fn idle_time(&self) -> Option<Duration> {
        let now = self.clock.now_ms();
        self.next_due()
            .map(|due| Duration::from_millis(due.saturating_sub(now)))
    }

    /// Run passes until `stop` returns true or no task is left enabled.
    ///
    /// Between passes `idle` is handed the time until the next due task; the
    /// production loop sleeps for it, tests advance a [`ManualClock`].
    pub fn run_until(
        &mut self,
        mut stop: impl FnMut(&Self) -> bool,
        mut idle: impl FnMut(Duration),
    ) {
        while !stop(self) {
            self.execute();
            match self.idle_time() {
                Some(wait) if !wait.is_zero() => idle(wait),
                Some(_) => {}
                None => break,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;

    fn recorder() -> (Rc<RefCell<Vec<Millis>>>, impl Work) {
        let log = Rc::new(RefCell::new(Vec::new()));
        let handle = log.clone();
        (log, move |now: Millis| handle.borrow_mut().push(now))
    }

    #[test]
    fn disabled_tasks_never_run() {
        let clock = ManualClock::new();
        let mut scheduler = Scheduler::new(clock.clone());
        let (log, work) = recorder();
        let id = scheduler.add(Task::new("t", Duration::from_millis(10), Repeat::Forever, work));

        clock.advance(100);
        assert_eq!(scheduler.execute(), 0);
        assert!(log.borrow().is_empty());
        assert_eq!(scheduler.task(id).state(), TaskState::Disabled);
    }

    #[test]
    fn immediate_task_runs_on_enable_then_every_interval() {
        let clock = ManualClock::new();
        let mut scheduler = Scheduler::new(clock.clone());
        let (log, work) = recorder();
        let id = scheduler.add(Task::new("t", Duration::from_millis(10), Repeat::Forever, work));
        scheduler.enable(id);

        for _ in 0..35 {
            scheduler.execute();
            clock.advance(1);
        }

        assert_eq!(*log.borrow(), vec![0, 10, 20, 30]);
        assert_eq!(scheduler.task(id).state(), TaskState::Waiting);
    }

    #[test]
    fn delayed_task_waits_one_interval() {
        let clock = ManualClock::new();
        let mut scheduler = Scheduler::new(clock.clone());
        let (log, work) = recorder();
        let task = Task::new("t", Duration::from_millis(50), Repeat::Forever, work).delayed();
        let id = scheduler.add(task);
        scheduler.enable(id);

        assert_eq!(scheduler.execute(), 0);
        clock.set(49);
        assert_eq!(scheduler.execute(), 0);
        clock.set(50);
        assert_eq!(scheduler.execute(), 1);
        assert_eq!(*log.borrow(), vec![50]);
    }

    #[test]
    fn finite_repeat_disables_itself() {
        let clock = ManualClock::new();
        let mut scheduler = Scheduler::new(clock.clone());
        let (log, work) = recorder();
        let id = scheduler.add(Task::new("t", Duration::ZERO, Repeat::Times(3), work));
        scheduler.enable(id);

        for _ in 0..10 {
            scheduler.execute();
        }

        assert_eq!(log.borrow().len(), 3);
        assert_eq!(scheduler.task(id).state(), TaskState::Disabled);
        assert_eq!(scheduler.next_due(), None);

        // re-enabling starts a fresh count
        scheduler.enable(id);
        scheduler.execute();
        assert_eq!(log.borrow().len(), 4);
    }

    #[test]
    fn slow_task_pushes_back_its_next_run() {
        let clock = ManualClock::new();
        let mut scheduler = Scheduler::new(clock.clone());
        let slow_clock = clock.clone();
        let (log, mut record) = recorder();
        let id = scheduler.add(Task::new(
            "slow",
            Duration::from_millis(10),
            Repeat::Forever,
            move |now: Millis| {
                record.run(now);
                slow_clock.advance(25);
            },
        ));
        scheduler.enable(id);

        scheduler.execute();
        assert_eq!(scheduler.next_due(), Some(35));
        assert_eq!(*log.borrow(), vec![0]);
    }

    #[test]
    fn one_pass_runs_tasks_in_registration_order() {
        let clock = ManualClock::new();
        let mut scheduler = Scheduler::new(clock.clone());
        let order = Rc::new(RefCell::new(Vec::new()));

        for name in ["render", "poll"] {
            let order = order.clone();
            let id = scheduler.add(Task::new(
                name,
                Duration::from_millis(100),
                Repeat::Forever,
                move |_now: Millis| order.borrow_mut().push(name),
            ));
            scheduler.enable(id);
        }

        assert_eq!(scheduler.execute(), 2);
        assert_eq!(*order.borrow(), vec!["render", "poll"]);
    }

    #[test]
    fn run_until_idles_between_due_times() {
        let clock = ManualClock::new();
        let mut scheduler = Scheduler::new(clock.clone());
        let (log, work) = recorder();
        let id = scheduler.add(Task::new("t", Duration::from_millis(40), Repeat::Times(3), work));
        scheduler.enable(id);

        let mut waits = Vec::new();
        scheduler.run_until(
            |_| false,
            |wait| {
                waits.push(wait);
                clock.advance(wait.as_millis() as Millis);
            },
        );

        assert_eq!(*log.borrow(), vec![0, 40, 80]);
        assert_eq!(waits, vec![Duration::from_millis(40); 2]);
    }
}
