//! Shared registry of simulated processes.
//!
//! The whole population sits behind a single reader/writer lock. A tick takes
//! the write side for the full batch, gauge samplers take the read side, so a
//! reader never observes a process that is halfway through an update.

use serde::Serialize;
use std::collections::BTreeMap;
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use crate::process::ProcessState;

/// Host name to processes, plus the number of completed ticks.
///
/// Hosts are kept in a sorted map so iteration order, and with it the order in
/// which random numbers are consumed, is stable for a given seed.
#[derive(Debug, Clone, Default, Serialize)]
pub struct Population {
    hosts: BTreeMap<String, Vec<ProcessState>>,
    ticks: u64,
}

impl Population {
    pub fn new(hosts: BTreeMap<String, Vec<ProcessState>>) -> Self {
        Self { hosts, ticks: 0 }
    }

    pub fn host_count(&self) -> usize {
        self.hosts.len()
    }

    pub fn process_count(&self) -> usize {
        self.hosts.values().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.process_count() == 0
    }

    /// Number of ticks applied so far.
    pub fn ticks(&self) -> u64 {
        self.ticks
    }

    pub fn host(&self, host_name: &str) -> Option<&[ProcessState]> {
        self.hosts.get(host_name).map(Vec::as_slice)
    }

    pub fn hosts(&self) -> impl Iterator<Item = (&str, &[ProcessState])> {
        self.hosts.iter().map(|(h, p)| (h.as_str(), p.as_slice()))
    }

    pub fn processes(&self) -> impl Iterator<Item = &ProcessState> {
        self.hosts.values().flatten()
    }

    pub fn processes_mut(&mut self) -> impl Iterator<Item = &mut ProcessState> {
        self.hosts.values_mut().flatten()
    }

    /// Starts the next tick and returns its number.
    pub(crate) fn begin_tick(&mut self) -> u64 {
        self.ticks += 1;
        self.ticks
    }
}

/// Lock-guarded population shared between the tick engine and samplers.
#[derive(Debug, Default)]
pub struct ProcessRegistry {
    inner: RwLock<Population>,
}

impl ProcessRegistry {
    pub fn new(population: Population) -> Self {
        Self {
            inner: RwLock::new(population),
        }
    }

    /// Shared access. Any number of readers may hold this at once.
    pub fn read(&self) -> RwLockReadGuard<'_, Population> {
        self.inner.read().expect("process registry read lock poisoned")
    }

    /// Exclusive access for a whole mutation batch.
    pub fn write(&self) -> RwLockWriteGuard<'_, Population> {
        self.inner
            .write()
            .expect("process registry write lock poisoned")
    }

    pub fn process_count(&self) -> usize {
        self.read().process_count()
    }

    pub fn ticks(&self) -> u64 {
        self.read().ticks()
    }

    /// Takes the population out of the registry, leaving it empty.
    pub fn into_population(self) -> Population {
        self.inner
            .into_inner()
            .expect("process registry lock poisoned")
    }
}
