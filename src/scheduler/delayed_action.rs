use std::cell::{Cell, RefCell};
use std::collections::HashMap;
use std::fmt::Debug;
use std::hash::Hash;
use tracing::{debug, info};

/// Host frame counter
pub type Tick = u64;

// Live entry for one task tag. Presence in the map means a waiter is pending.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
struct ScheduledEntry {
    deadline: Tick,
    scheduled_at: Tick,
    // Distinguishes a fresh entry from one cancelled and re-created
    generation: u64,
}

/// Coalesces repeated "run this soon" requests into a single execution.
///
/// Every task tag has at most one live entry. Re-scheduling an existing entry
/// can only move its deadline later. The scheduler never runs anything by
/// itself: [`run_due`](Self::run_due) hands due tags to the caller, after the
/// entry has been removed, so whatever the body does cannot leave stale
/// bookkeeping behind.
///
/// All methods take `&self`; the scheduler lives on the host's single frame
/// thread and is shared through `Rc`.
#[derive(Debug)]
pub struct DelayedActionScheduler<T> {
    now: Cell<Tick>,
    next_generation: Cell<u64>,
    entries: RefCell<HashMap<T, ScheduledEntry>>,
}

impl<T> Default for DelayedActionScheduler<T>
where
    T: Copy + Eq + Hash + Debug,
{
    fn default() -> Self {
        Self::new()
    }
}

impl<T> DelayedActionScheduler<T>
where
    T: Copy + Eq + Hash + Debug,
{
    pub fn new() -> Self {
        Self::starting_at(0)
    }

    /// Creates a scheduler whose frame counter starts at `tick`.
    pub fn starting_at(tick: Tick) -> Self {
        debug!("Creating DelayedActionScheduler at tick {}", tick);
        Self {
            now: Cell::new(tick),
            next_generation: Cell::new(0),
            entries: RefCell::new(HashMap::new()),
        }
    }

    /// Current frame.
    pub fn now(&self) -> Tick {
        self.now.get()
    }

    /// Moves the frame counter forward by one and returns the new frame.
    pub fn advance(&self) -> Tick {
        let next = self.now.get().saturating_add(1);
        self.now.set(next);
        next
    }

    /// Requests `task` to run `delay` frames from now.
    ///
    /// If `task` is already waiting its deadline becomes
    /// `max(existing, now + delay)`; no second waiter is created.
    pub fn schedule(&self, task: T, delay: Tick) {
        let now = self.now.get();
        let requested = now.saturating_add(delay);
        let mut entries = self.entries.borrow_mut();

        match entries.get_mut(&task) {
            Some(entry) => {
                let previous = entry.deadline;
                entry.deadline = entry.deadline.max(requested);
                debug!(
                    "Coalesced {:?}: deadline {} -> {} (requested {} at tick {})",
                    task, previous, entry.deadline, requested, now
                );
            }
            None => {
                debug!(
                    "Scheduled {:?} for tick {} (delay {} at tick {})",
                    task, requested, delay, now
                );
                let generation = self.next_generation.get();
                self.next_generation.set(generation.wrapping_add(1));
                entries.insert(
                    task,
                    ScheduledEntry {
                        deadline: requested,
                        scheduled_at: now,
                        generation,
                    },
                );
            }
        }
    }

    /// Drops the pending entry for `task`, if any. Returns whether one existed.
    pub fn cancel(&self, task: T) -> bool {
        let removed = self.entries.borrow_mut().remove(&task);
        if let Some(entry) = removed {
            info!(
                "Cancelled {:?} (deadline {}, scheduled at tick {})",
                task, entry.deadline, entry.scheduled_at
            );
            true
        } else {
            false
        }
    }

    /// Drops every pending entry.
    pub fn cancel_all(&self) {
        let count = {
            let mut entries = self.entries.borrow_mut();
            let count = entries.len();
            entries.clear();
            count
        };
        if count > 0 {
            info!("Cancelled {} pending delayed action(s)", count);
        }
    }

    pub fn is_pending(&self, task: T) -> bool {
        self.entries.borrow().contains_key(&task)
    }

    /// Deadline of the live entry for `task`.
    pub fn deadline(&self, task: T) -> Option<Tick> {
        self.entries.borrow().get(&task).map(|entry| entry.deadline)
    }

    pub fn pending_count(&self) -> usize {
        self.entries.borrow().len()
    }

    /// Runs every task whose deadline is `<= now`, earliest deadline first.
    ///
    /// The candidate set is fixed when the pass starts. Before each body runs
    /// the entry is looked up again, so a body that cancels (or pushes back)
    /// another candidate prevents it from running this frame. Entries created
    /// by a body, including a candidate cancelled and scheduled again, wait
    /// for the next pass. Returns the number of bodies run.
    pub fn run_due<F>(&self, mut body: F) -> usize
    where
        F: FnMut(T),
    {
        let now = self.now.get();
        let mut candidates: Vec<(Tick, u64, T)> = self
            .entries
            .borrow()
            .iter()
            .filter(|(_, entry)| entry.deadline <= now)
            .map(|(task, entry)| (entry.deadline, entry.generation, *task))
            .collect();
        candidates.sort_by_key(|(deadline, _, _)| *deadline);

        let mut fired = 0;
        for (_, generation, task) in candidates {
            let still_due = {
                let mut entries = self.entries.borrow_mut();
                match entries.get(&task) {
                    Some(entry) if entry.deadline <= now && entry.generation == generation => {
                        entries.remove(&task).is_some()
                    }
                    _ => false,
                }
            };

            if still_due {
                debug!("Firing {:?} at tick {}", task, now);
                body(task);
                fired += 1;
            } else {
                debug!("Skipping {:?}: cancelled or postponed during this pass", task);
            }
        }
        fired
    }
}
