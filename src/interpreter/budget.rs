use crate::interpreter::value::List;
use std::rc::{Rc, Weak};
use std::time::{Duration, Instant};

/// Limits applied to a single execution.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExecutionBudget {
    /// Wall-clock time the interpreter may spend on one program.
    pub timeout: Duration,
    /// Number of syntax tree nodes the interpreter may evaluate.
    pub max_steps: u64,
    /// Nested function calls (and `RUN` invocations).
    pub max_call_depth: usize,
    /// Nodes being evaluated at the same time, across every active call.
    /// Holds even when `max_call_depth` is raised.
    pub max_eval_depth: usize,
    /// Largest list, or longest string in bytes, a single operation may produce.
    pub max_collection_len: usize,
    /// Bytes of string data and list slots an execution may allocate, in total.
    pub max_allocated_bytes: usize,
    /// Combined size of the captured stdout and stderr.
    pub max_output_bytes: usize,
}

impl Default for ExecutionBudget {
    fn default() -> Self {
        Self {
            timeout: Duration::from_millis(2000),
            max_steps: 5_000_000,
            max_call_depth: 200,
            max_eval_depth: 10_000,
            max_collection_len: 1_000_000,
            max_allocated_bytes: 256 * 1024 * 1024,
            max_output_bytes: 1024 * 1024,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum BudgetExceeded {
    #[error("Execution exceeded the limit of {0} steps")]
    Steps(u64),
    #[error("Execution timed out after {0} ms")]
    Timeout(u128),
    #[error("Maximum call depth of {0} exceeded")]
    CallDepth(usize),
    #[error("Maximum evaluation depth of {0} exceeded")]
    EvalDepth(usize),
    #[error("Execution exceeded the memory limit of {0} bytes")]
    Memory(usize),
}

/// The clock is only read once every `CLOCK_INTERVAL` steps.
const CLOCK_INTERVAL: u64 = 1024;

/// Counts evaluation steps, nesting and allocations against an [`ExecutionBudget`].
///
/// The meter also keeps a handle on every list the execution creates. Lists can contain
/// themselves, which `Rc` alone never frees: dropping the meter empties all of them.
#[derive(Debug)]
pub(crate) struct Meter {
    started: Instant,
    timeout: Duration,
    steps: u64,
    max_steps: u64,
    depth: usize,
    max_depth: usize,
    allocated: usize,
    max_allocated: usize,
    max_collection_len: usize,
    lists: Vec<Weak<List>>,
}

impl Meter {
    pub fn start(budget: &ExecutionBudget) -> Self {
        Self {
            started: Instant::now(),
            timeout: budget.timeout,
            steps: 0,
            max_steps: budget.max_steps,
            depth: 0,
            max_depth: budget.max_eval_depth,
            allocated: 0,
            max_allocated: budget.max_allocated_bytes,
            max_collection_len: budget.max_collection_len,
            lists: Vec::new(),
        }
    }

    pub fn tick(&mut self) -> Result<(), BudgetExceeded> {
        self.steps += 1;
        if self.steps > self.max_steps {
            return Err(BudgetExceeded::Steps(self.max_steps));
        }
        if self.steps % CLOCK_INTERVAL == 0 && self.started.elapsed() >= self.timeout {
            return Err(BudgetExceeded::Timeout(self.timeout.as_millis()));
        }
        Ok(())
    }

    /// Enter a nested evaluation. Every successful call must be paired with [`Meter::ascend`].
    pub fn descend(&mut self) -> Result<(), BudgetExceeded> {
        if self.depth >= self.max_depth {
            return Err(BudgetExceeded::EvalDepth(self.max_depth));
        }
        self.depth += 1;
        Ok(())
    }

    pub fn ascend(&mut self) {
        self.depth = self.depth.saturating_sub(1);
    }

    /// Charge `bytes` against the allocation quota, before they are allocated.
    pub fn allocate(&mut self, bytes: usize) -> Result<(), BudgetExceeded> {
        self.allocated = self.allocated.saturating_add(bytes);
        if self.allocated > self.max_allocated {
            return Err(BudgetExceeded::Memory(self.max_allocated));
        }
        Ok(())
    }

    pub fn max_collection_len(&self) -> usize {
        self.max_collection_len
    }

    pub fn track(&mut self, list: &Rc<List>) {
        // Forget lists that are already gone before the handles would reallocate.
        if self.lists.len() == self.lists.capacity() {
            self.lists.retain(|list| list.strong_count() > 0);
        }
        self.lists.push(Rc::downgrade(list));
    }
}

impl Drop for Meter {
    fn drop(&mut self) {
        for list in self.lists.drain(..) {
            if let Some(list) = list.upgrade() {
                let elements = std::mem::take(&mut *list.borrow_mut());
                drop(elements);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{BudgetExceeded, ExecutionBudget, Meter};
    use crate::interpreter::value::{List, Value};
    use std::rc::Rc;
    use std::time::Duration;

    #[test]
    fn steps_are_capped() {
        let budget = ExecutionBudget {
            max_steps: 3,
            ..Default::default()
        };
        let mut meter = Meter::start(&budget);
        for _ in 0..3 {
            meter.tick().unwrap();
        }
        assert_eq!(meter.tick(), Err(BudgetExceeded::Steps(3)));
    }

    #[test]
    fn the_clock_is_checked_periodically() {
        let budget = ExecutionBudget {
            timeout: Duration::ZERO,
            ..Default::default()
        };
        let mut meter = Meter::start(&budget);
        let outcome = (0..2048).try_for_each(|_| meter.tick());
        assert_eq!(outcome, Err(BudgetExceeded::Timeout(0)));
    }

    #[test]
    fn nesting_is_capped_and_released() {
        let budget = ExecutionBudget {
            max_eval_depth: 2,
            ..Default::default()
        };
        let mut meter = Meter::start(&budget);
        meter.descend().unwrap();
        meter.descend().unwrap();
        assert_eq!(meter.descend(), Err(BudgetExceeded::EvalDepth(2)));
        meter.ascend();
        assert_eq!(meter.descend(), Ok(()));
    }

    #[test]
    fn allocations_add_up() {
        let budget = ExecutionBudget {
            max_allocated_bytes: 100,
            ..Default::default()
        };
        let mut meter = Meter::start(&budget);
        meter.allocate(60).unwrap();
        meter.allocate(40).unwrap();
        assert_eq!(meter.allocate(1), Err(BudgetExceeded::Memory(100)));
    }

    #[test]
    fn dropping_the_meter_breaks_list_cycles() {
        let mut meter = Meter::start(&ExecutionBudget::default());
        let list = Rc::new(List::new(vec![]));
        meter.track(&list);
        list.borrow_mut().push(Value::List(Rc::clone(&list)));
        let handle = Rc::downgrade(&list);
        drop(list);
        assert!(handle.upgrade().is_some());

        drop(meter);
        assert!(handle.upgrade().is_none());
    }
}
