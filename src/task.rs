//! Task Scheduling System
//!
//! A fixed table of [`MAX_TASKS`] task control blocks and a priority
//! scheduler over it.
//!
//! # Slot Lifecycle
//! 1. Every slot starts inactive
//! 2. `spawn` / `activate` give a slot a priority and a saved context
//! 3. The timer charges the current slot one tick of its time slice
//! 4. `deactivate` removes a slot from selection immediately
//!
//! # Selection
//! The active slot with the highest priority runs. On a tie the current
//! slot keeps the CPU if it holds that priority, otherwise the lowest slot
//! index wins. With no active slot nothing happens.
//!
//! The time slice is bookkeeping only: an exhausted slice does not force a
//! switch, priorities are re-evaluated every loop iteration instead.

use core::fmt;

use crate::platform::{Platform, SavedContext};

pub const MAX_TASKS: usize = 64;
pub const DEFAULT_TIME_SLICE: u32 = 100;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TaskState {
    Inactive,
    Ready,
    Running,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SchedulerError {
    SlotOutOfRange(usize),
    SlotActive(usize),
    SlotInactive(usize),
    TableFull,
}

impl fmt::Display for SchedulerError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SchedulerError::SlotOutOfRange(slot) => write!(f, "task slot {} out of range", slot),
            SchedulerError::SlotActive(slot) => write!(f, "task slot {} already active", slot),
            SchedulerError::SlotInactive(slot) => write!(f, "task slot {} is not active", slot),
            SchedulerError::TableFull => write!(f, "all {} task slots in use", MAX_TASKS),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct TaskControlBlock {
    pub slot: usize,
    /// Stack pointer and address space; meaningless while inactive.
    pub context: SavedContext,
    pub active: bool,
    pub priority: u8,
    pub time_slice: u32,
}

impl TaskControlBlock {
    const EMPTY: TaskControlBlock = TaskControlBlock {
        slot: 0,
        context: SavedContext::EMPTY,
        active: false,
        priority: 0,
        time_slice: 0,
    };

    pub fn is_exhausted(&self) -> bool {
        self.time_slice == 0
    }
}

pub struct Scheduler {
    tasks: [TaskControlBlock; MAX_TASKS],
    current: usize,
    active_count: usize,
    initial_time_slice: u32,
}

impl Scheduler {
    pub const fn new(initial_time_slice: u32) -> Self {
        let mut tasks = [TaskControlBlock::EMPTY; MAX_TASKS];
        let mut slot = 0;
        while slot < MAX_TASKS {
            tasks[slot].slot = slot;
            tasks[slot].time_slice = initial_time_slice;
            slot += 1;
        }
        Self {
            tasks,
            current: 0,
            active_count: 0,
            initial_time_slice,
        }
    }

    /// Every slot back to inactive with a full time slice.
    pub fn reset(&mut self) {
        *self = Self::new(self.initial_time_slice);
    }

    /// Activate the first free slot.
    pub fn spawn(&mut self, priority: u8, context: SavedContext) -> Result<usize, SchedulerError> {
        let slot = self
            .tasks
            .iter()
            .position(|task| !task.active)
            .ok_or(SchedulerError::TableFull)?;
        self.activate(slot, priority, context)?;
        Ok(slot)
    }

    pub fn activate(
        &mut self,
        slot: usize,
        priority: u8,
        context: SavedContext,
    ) -> Result<(), SchedulerError> {
        let initial_time_slice = self.initial_time_slice;
        let task = self.slot_mut(slot)?;
        if task.active {
            return Err(SchedulerError::SlotActive(slot));
        }
        task.active = true;
        task.priority = priority;
        task.context = context;
        task.time_slice = initial_time_slice;
        self.active_count += 1;
        log_debug!("task {}: active, priority {}", slot, priority);
        Ok(())
    }

    /// Drop `slot` from selection. A deactivated current slot keeps running
    /// until the next `schedule`.
    pub fn deactivate(&mut self, slot: usize) -> Result<(), SchedulerError> {
        let task = self.slot_mut(slot)?;
        if !task.active {
            return Err(SchedulerError::SlotInactive(slot));
        }
        task.active = false;
        self.active_count -= 1;
        log_debug!("task {}: inactive", slot);
        Ok(())
    }

    pub fn set_priority(&mut self, slot: usize, priority: u8) -> Result<(), SchedulerError> {
        let task = self.slot_mut(slot)?;
        if !task.active {
            return Err(SchedulerError::SlotInactive(slot));
        }
        task.priority = priority;
        Ok(())
    }

    /// Slot that should run next, or `None` with no active slot.
    pub fn select_next(&self) -> Option<usize> {
        let best = self
            .tasks
            .iter()
            .filter(|task| task.active)
            .map(|task| task.priority)
            .max()?;

        let current = &self.tasks[self.current];
        if current.active && current.priority == best {
            return Some(self.current);
        }
        self.tasks
            .iter()
            .find(|task| task.active && task.priority == best)
            .map(|task| task.slot)
    }

    /// Switch to [`select_next`](Self::select_next) if it is not the
    /// current slot. Returns the `(from, to)` pair of a switch.
    ///
    /// On real hardware the call returns only once `from` is selected
    /// again.
    pub fn schedule<P: Platform>(&mut self, platform: &mut P) -> Option<(usize, usize)> {
        let next = self.select_next()?;
        let from = self.current;
        if next == from {
            return None;
        }

        self.current = next;
        let incoming = self.tasks[next].context;
        log_debug!("switch: task {} -> task {}", from, next);
        // SAFETY: `next` is active, so its context was either supplied at
        // activation or saved by an earlier switch away from it.
        unsafe { platform.switch_context(&mut self.tasks[from].context, &incoming) };
        Some((from, next))
    }

    /// Charge the current slot one tick, never below zero.
    pub fn tick(&mut self) {
        let task = &mut self.tasks[self.current];
        if task.active {
            task.time_slice = task.time_slice.saturating_sub(1);
        }
    }

    pub fn current(&self) -> usize {
        self.current
    }

    pub fn current_task(&self) -> Option<&TaskControlBlock> {
        Some(&self.tasks[self.current]).filter(|task| task.active)
    }

    pub fn task(&self, slot: usize) -> Option<&TaskControlBlock> {
        self.tasks.get(slot)
    }

    pub fn state(&self, slot: usize) -> TaskState {
        match self.tasks.get(slot) {
            Some(task) if task.active && slot == self.current => TaskState::Running,
            Some(task) if task.active => TaskState::Ready,
            _ => TaskState::Inactive,
        }
    }

    pub fn active_count(&self) -> usize {
        self.active_count
    }

    /// Recount active slots from the table itself and repair the cached
    /// count if the two disagree.
    pub fn recount_active(&mut self) -> usize {
        let counted = self.tasks.iter().filter(|task| task.active).count();
        if counted != self.active_count {
            log_warn!(
                "scheduler: active count {} but {} slots active",
                self.active_count,
                counted
            );
            self.active_count = counted;
        }
        counted
    }

    pub fn initial_time_slice(&self) -> u32 {
        self.initial_time_slice
    }

    fn slot_mut(&mut self, slot: usize) -> Result<&mut TaskControlBlock, SchedulerError> {
        self.tasks
            .get_mut(slot)
            .ok_or(SchedulerError::SlotOutOfRange(slot))
    }
}

impl Default for Scheduler {
    fn default() -> Self {
        Self::new(DEFAULT_TIME_SLICE)
    }
}
