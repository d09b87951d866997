//! Tick-driven completely fair scheduling simulator.
//!
//! This module provides [`CfsScheduler`], a deterministic simulation of a
//! completely-fair scheduler that uses [`TreeMultimap`] as its timeline: an
//! ordered index from virtual runtime to the tasks currently tracked.
//!
//! # Overview
//!
//! Each task carries a virtual runtime (`vruntime`) that grows as it runs.
//! Every tick the scheduler admits newly arrived tasks, picks the task with
//! the minimum `vruntime`, runs it for one tick, and re-indexes it under its
//! new `vruntime`. Tasks that tie on `vruntime` queue FIFO inside the
//! multimap, which is exactly why the timeline is a multimap rather than a
//! plain ordered map.
//!
//! # Examples
//!
//! ```rust
//! use timberline::scheduler::{CfsScheduler, Task, parse_tasks};
//!
//! let tasks = parse_tasks("A 0 2\nB 0 1\n".as_bytes()).unwrap();
//! let mut scheduler = CfsScheduler::new(tasks);
//! let reports: Vec<String> = scheduler
//!     .run()
//!     .iter()
//!     .map(ToString::to_string)
//!     .collect();
//!
//! assert_eq!(reports, vec!["0 [2]: A", "1 [2]: B*", "2 [1]: A*"]);
//! ```

use crate::multimap::TreeMultimap;
use std::fmt;
use std::io::{self, BufRead, BufReader, Read};

// =============================================================================
// Task Definition
// =============================================================================

/// A unit of work tracked by the scheduler.
///
/// Tasks are described by three fields: a one-character name, the tick at
/// which the task becomes runnable, and the number of ticks of CPU time it
/// needs before completing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Task {
    /// Single-character task name.
    pub name: char,
    /// Tick at which the task arrives.
    pub start: u64,
    /// Total ticks of CPU time the task needs.
    pub duration: u64,
    /// Virtual runtime; assigned at admission and grows while running.
    vruntime: u64,
    /// Ticks of CPU time consumed so far.
    runtime: u64,
}

impl Task {
    /// Creates a new task that has not yet run.
    #[must_use]
    pub const fn new(name: char, start: u64, duration: u64) -> Self {
        Self {
            name,
            start,
            duration,
            vruntime: 0,
            runtime: 0,
        }
    }
}

impl fmt::Display for Task {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(formatter, "{} {} {}", self.name, self.start, self.duration)
    }
}

// =============================================================================
// Error Definition
// =============================================================================

/// Errors produced while loading a task description.
///
/// # Examples
///
/// ```rust
/// use timberline::scheduler::{ScheduleError, parse_tasks};
///
/// let error = parse_tasks("A zero 5\n".as_bytes()).unwrap_err();
/// assert_eq!(format!("{error}"), "malformed task description on line 1");
/// ```
#[derive(Debug)]
pub enum ScheduleError {
    /// A line did not contain `name start duration` with a one-character
    /// name, two unsigned integers, and a non-zero duration.
    MalformedLine {
        /// One-based line number of the offending line.
        line: usize,
    },
    /// The underlying reader failed.
    Io(io::Error),
}

impl fmt::Display for ScheduleError {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::MalformedLine { line } => {
                write!(formatter, "malformed task description on line {line}")
            }
            Self::Io(error) => write!(formatter, "cannot read task descriptions: {error}"),
        }
    }
}

impl std::error::Error for ScheduleError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::MalformedLine { .. } => None,
            Self::Io(error) => Some(error),
        }
    }
}

impl From<io::Error> for ScheduleError {
    fn from(error: io::Error) -> Self {
        Self::Io(error)
    }
}

// =============================================================================
// Task-File Parser
// =============================================================================

/// Parses task descriptions from a reader, one task per line.
///
/// Each non-blank line holds three whitespace-separated fields:
/// `name start duration`, for example `A 0 5`. Blank lines are skipped.
/// A zero duration is rejected because such a task could never complete.
///
/// # Errors
///
/// Returns [`ScheduleError::MalformedLine`] for a line that does not match
/// the format, and [`ScheduleError::Io`] if the reader fails.
///
/// # Examples
///
/// ```rust
/// use timberline::scheduler::parse_tasks;
///
/// let tasks = parse_tasks("A 0 5\nB 2 3\n".as_bytes()).unwrap();
/// assert_eq!(tasks.len(), 2);
/// assert_eq!(tasks[1].name, 'B');
/// assert_eq!(tasks[1].start, 2);
/// ```
pub fn parse_tasks<R: Read>(reader: R) -> Result<Vec<Task>, ScheduleError> {
    let mut tasks = Vec::new();
    for (index, line) in BufReader::new(reader).lines().enumerate() {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }
        let task = parse_line(&line).ok_or(ScheduleError::MalformedLine { line: index + 1 })?;
        tasks.push(task);
    }
    Ok(tasks)
}

/// Parses a single `name start duration` line.
fn parse_line(line: &str) -> Option<Task> {
    let mut fields = line.split_whitespace();
    let name_field = fields.next()?;
    let start = fields.next()?.parse().ok()?;
    let duration: u64 = fields.next()?.parse().ok()?;
    if fields.next().is_some() || duration == 0 {
        return None;
    }
    let mut characters = name_field.chars();
    let name = characters.next()?;
    if characters.next().is_some() {
        return None;
    }
    Some(Task::new(name, start, duration))
}

// =============================================================================
// Tick Report
// =============================================================================

/// What the scheduler did during one tick.
///
/// Displays as `tick [queued]: name`, with `*` appended on the tick a task
/// completes and `_` standing in when no task was runnable:
///
/// ```rust
/// use timberline::scheduler::TickReport;
///
/// let report = TickReport { tick: 7, queued: 2, ran: Some('A'), completed: true };
/// assert_eq!(format!("{report}"), "7 [2]: A*");
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TickReport {
    /// The tick this report covers.
    pub tick: u64,
    /// Number of admitted, not-yet-completed tasks during this tick.
    pub queued: usize,
    /// Name of the task that ran, or `None` for an idle tick.
    pub ran: Option<char>,
    /// Whether the task that ran completed on this tick.
    pub completed: bool,
}

impl fmt::Display for TickReport {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(formatter, "{} [{}]: ", self.tick, self.queued)?;
        match self.ran {
            Some(name) if self.completed => write!(formatter, "{name}*"),
            Some(name) => write!(formatter, "{name}"),
            None => write!(formatter, "_"),
        }
    }
}

// =============================================================================
// CfsScheduler Definition
// =============================================================================

/// A deterministic completely-fair scheduler simulation.
///
/// The scheduler owns its tasks and a timeline multimap indexing runnable
/// tasks by virtual runtime. Its entire contract with the multimap is
/// insert, get-at-minimum, and remove-by-key; all scheduling policy lives
/// here.
///
/// # Examples
///
/// ```rust
/// use timberline::scheduler::{CfsScheduler, Task};
///
/// let mut scheduler = CfsScheduler::new(vec![Task::new('A', 0, 3)]);
/// let reports = scheduler.run();
///
/// assert_eq!(reports.len(), 3);
/// assert!(reports[2].completed);
/// ```
#[derive(Debug)]
pub struct CfsScheduler {
    /// All tasks, sorted by `(start, name)`; slots never move so the
    /// timeline can index into this vector.
    tasks: Vec<Task>,
    /// Runnable tasks indexed by vruntime. Ties queue FIFO.
    timeline: TreeMultimap<u64, usize>,
    /// Index of the next task (in `tasks`) still awaiting admission.
    next_admission: usize,
    /// Admitted tasks that have not completed.
    active: usize,
    /// Completed task count.
    completed: usize,
    /// Monotone floor for the vruntime assigned to late arrivals.
    min_vruntime: u64,
    /// Current tick.
    tick: u64,
}

impl CfsScheduler {
    /// Creates a scheduler over the given tasks.
    ///
    /// Tasks are admitted in `(start, name)` order regardless of the order
    /// they were supplied in.
    #[must_use]
    pub fn new(mut tasks: Vec<Task>) -> Self {
        tasks.sort_by_key(|task| (task.start, task.name));
        Self {
            tasks,
            timeline: TreeMultimap::new(),
            next_admission: 0,
            active: 0,
            completed: 0,
            min_vruntime: 0,
            tick: 0,
        }
    }

    /// Runs the simulation to completion and returns one report per tick.
    ///
    /// Ticks before the first arrival and gaps between arrivals show up as
    /// idle reports. An empty task list yields no reports.
    pub fn run(&mut self) -> Vec<TickReport> {
        let mut reports = Vec::new();
        while self.completed < self.tasks.len() {
            reports.push(self.step());
        }
        reports
    }

    /// Advances the simulation by one tick.
    fn step(&mut self) -> TickReport {
        self.admit_arrivals();
        let report = match self.pick_minimum() {
            None => TickReport {
                tick: self.tick,
                queued: 0,
                ran: None,
                completed: false,
            },
            Some((key, slot)) => {
                let queued = self.active;
                let task = &mut self.tasks[slot];
                task.runtime += 1;
                task.vruntime += 1;
                let name = task.name;
                let finished = task.runtime == task.duration;
                let new_vruntime = task.vruntime;

                // Re-index under the new vruntime; the prior key's oldest
                // entry is this task, so a keyed remove takes it out.
                self.timeline.remove(&key);
                if finished {
                    self.active -= 1;
                    self.completed += 1;
                } else {
                    self.timeline.insert(new_vruntime, slot);
                }
                if let Ok(&minimum) = self.timeline.min_key() {
                    self.min_vruntime = self.min_vruntime.max(minimum);
                }

                TickReport {
                    tick: self.tick,
                    queued,
                    ran: Some(name),
                    completed: finished,
                }
            }
        };
        self.tick += 1;
        report
    }

    /// Admits every task whose start tick has arrived, seeding its vruntime
    /// with the current floor so it cannot starve older tasks.
    fn admit_arrivals(&mut self) {
        while let Some(task) = self.tasks.get_mut(self.next_admission) {
            if task.start > self.tick {
                break;
            }
            task.vruntime = self.min_vruntime;
            self.timeline.insert(self.min_vruntime, self.next_admission);
            self.next_admission += 1;
            self.active += 1;
        }
    }

    /// Returns the minimum-vruntime entry of the timeline, if any.
    fn pick_minimum(&self) -> Option<(u64, usize)> {
        let key = self.timeline.min_key().copied().ok()?;
        let slot = self.timeline.get(&key).copied().ok()?;
        Some((key, slot))
    }
}

// =============================================================================
// Tests
// =============================================================================
