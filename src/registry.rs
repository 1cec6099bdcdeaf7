use crate::calculator::{CancelToken, Calculator, Progress, ProgressHandle};
use crate::error::{HelmError, Result};
use crate::options::HelmOpt;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};

/// Opaque reference to a calculator owned by a [`Registry`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Handle(u64);

impl Handle {
    pub fn id(&self) -> u64 {
        self.0
    }
}

struct Entry {
    calculator: Arc<Mutex<Calculator>>,
    progress: ProgressHandle,
    cancel: CancelToken,
}

#[derive(Default)]
struct Calculators {
    next_id: u64,
    entries: HashMap<Handle, Entry>,
}

/// Thread-safe collection of calculators addressed by handle.
///
/// The registry lock is only held to create, look up or destroy entries.
/// Each calculator has its own lock, so calculations behind different
/// handles run concurrently, and progress is read without taking the
/// calculator lock.
#[derive(Default)]
pub struct Registry {
    calculators: Mutex<Calculators>,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    match mutex.lock() {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(),
    }
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn create(
        &self,
        opt: HelmOpt,
        node_count: usize,
        pq_count: usize,
        pv_count: usize,
    ) -> Result<Handle> {
        let calculator = Calculator::new(opt, node_count, pq_count, pv_count)?;
        let entry = Entry {
            progress: calculator.progress_handle(),
            cancel: calculator.cancel_token(),
            calculator: Arc::new(Mutex::new(calculator)),
        };

        let mut calculators = lock(&self.calculators);
        calculators.next_id += 1;
        let handle = Handle(calculators.next_id);
        calculators.entries.insert(handle, entry);
        log::debug!("created calculator {}", handle.0);
        Ok(handle)
    }

    pub fn get(&self, handle: Handle) -> Result<Arc<Mutex<Calculator>>> {
        let calculators = lock(&self.calculators);
        calculators
            .entries
            .get(&handle)
            .map(|e| e.calculator.clone())
            .ok_or(HelmError::InvalidHandle(handle.0))
    }

    /// Runs `f` on the calculator behind `handle` with the registry unlocked.
    pub fn with<T, F>(&self, handle: Handle, f: F) -> Result<T>
    where
        F: FnOnce(&mut Calculator) -> Result<T>,
    {
        let calculator = self.get(handle)?;
        let mut calculator = lock(&calculator);
        f(&mut calculator)
    }

    pub fn calculate(&self, handle: Handle) -> Result<f64> {
        self.with(handle, |c| c.calculate())
    }

    pub fn progress(&self, handle: Handle) -> Result<Progress> {
        let calculators = lock(&self.calculators);
        calculators
            .entries
            .get(&handle)
            .map(|e| e.progress.get())
            .ok_or(HelmError::InvalidHandle(handle.0))
    }

    pub fn cancel(&self, handle: Handle) -> Result<()> {
        let calculators = lock(&self.calculators);
        match calculators.entries.get(&handle) {
            Some(e) => {
                e.cancel.cancel();
                Ok(())
            }
            None => Err(HelmError::InvalidHandle(handle.0)),
        }
    }

    /// Removes the calculator. A calculation still running on it finishes
    /// and is then dropped.
    pub fn destroy(&self, handle: Handle) -> Result<()> {
        let mut calculators = lock(&self.calculators);
        match calculators.entries.remove(&handle) {
            Some(_) => {
                log::debug!("destroyed calculator {}", handle.0);
                Ok(())
            }
            None => Err(HelmError::InvalidHandle(handle.0)),
        }
    }

    pub fn len(&self) -> usize {
        lock(&self.calculators).entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
