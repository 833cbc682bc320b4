//! Best objective values across the whole search run, as opposed to the
//! tracer which only sees the current test execution.

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicU32, AtomicU64, Ordering};
use std::sync::{Arc, OnceLock};

use dashmap::DashMap;
use parking_lot::Mutex;
use serde::Serialize;

use crate::tracer::additional_info::ExternalServiceInfo;

#[derive(Debug, Default)]
pub struct ObjectiveRecorder {
    /// Best value ever seen, as f64 bits.
    best: DashMap<String, AtomicU64>,
    /// Objectives registered at instrumentation time.
    all_targets: DashMap<String, ()>,
    /// Objectives covered while the target was starting up, outside actions.
    reached_at_startup: DashMap<String, AtomicU64>,
    to_mapped: DashMap<String, u32>,
    to_descriptive: DashMap<u32, String>,
    next_id: AtomicU32,
    first_time_encountered: Mutex<Vec<String>>,
    first_time_seen: Mutex<HashSet<String>>,
    external_at_startup: Mutex<Vec<ExternalServiceInfo>>,
}

/// Per-prefix summary for progress reporting.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CoverageReport {
    pub prefix: String,
    pub total: usize,
    pub covered: usize,
    pub coverage: f64,
}

fn raise(cell: &AtomicU64, value: f64) -> bool {
    let mut current = cell.load(Ordering::Acquire);
    loop {
        if value <= f64::from_bits(current) {
            return false;
        }
        match cell.compare_exchange_weak(current, value.to_bits(), Ordering::AcqRel, Ordering::Acquire) {
            Ok(_) => return true,
            Err(actual) => current = actual,
        }
    }
}

impl ObjectiveRecorder {
    pub fn new() -> Self {
        ObjectiveRecorder::default()
    }

    pub fn global() -> Arc<ObjectiveRecorder> {
        static GLOBAL: OnceLock<Arc<ObjectiveRecorder>> = OnceLock::new();
        GLOBAL.get_or_init(|| Arc::new(ObjectiveRecorder::new())).clone()
    }

    /// Make a statically discovered objective part of the universe.
    pub fn register_target(&self, id: &str) {
        self.all_targets.insert(id.to_string(), ());
        self.mapped_id(id);
    }

    pub fn number_of_targets(&self) -> usize {
        self.all_targets.len()
    }

    pub fn update(&self, id: &str, value: f64, at_startup: bool) {
        if at_startup {
            match self.reached_at_startup.get(id) {
                Some(cell) => {
                    raise(&cell, value);
                }
                None => {
                    let cell = self.reached_at_startup.entry(id.to_string()).or_insert_with(|| AtomicU64::new(0));
                    raise(&cell, value);
                }
            }
        }
        if let Some(cell) = self.best.get(id) {
            raise(&cell, value);
            return;
        }
        {
            let cell = self.best.entry(id.to_string()).or_insert_with(|| AtomicU64::new(0));
            raise(&cell, value);
        }
        // two threads may both miss above; the seen set keeps the list unique
        if self.first_time_seen.lock().insert(id.to_string()) {
            self.mapped_id(id);
            self.first_time_encountered.lock().push(id.to_string());
        }
    }

    /// Numeric id of an objective, assigned on first request.
    pub fn mapped_id(&self, id: &str) -> u32 {
        if let Some(mapped) = self.to_mapped.get(id) {
            return *mapped;
        }
        let mapped = *self
            .to_mapped
            .entry(id.to_string())
            .or_insert_with(|| self.next_id.fetch_add(1, Ordering::Relaxed));
        self.to_descriptive.entry(mapped).or_insert_with(|| id.to_string());
        mapped
    }

    pub fn descriptive_id(&self, mapped: u32) -> Option<String> {
        self.to_descriptive.get(&mapped).map(|s| s.clone())
    }

    pub fn best_value(&self, id: &str) -> Option<f64> {
        self.best.get(id).map(|c| f64::from_bits(c.load(Ordering::Acquire)))
    }

    pub fn reached_at_startup(&self) -> HashMap<String, f64> {
        self.reached_at_startup
            .iter()
            .map(|e| (e.key().clone(), f64::from_bits(e.value().load(Ordering::Acquire))))
            .collect()
    }

    /// Objectives first seen since the last call to
    /// [`clear_first_time_encountered`](Self::clear_first_time_encountered).
    pub fn first_time_encountered(&self) -> Vec<String> {
        self.first_time_encountered.lock().clone()
    }

    pub fn clear_first_time_encountered(&self) {
        self.first_time_encountered.lock().clear();
    }

    pub fn register_external_service_at_startup(&self, info: ExternalServiceInfo) {
        let mut infos = self.external_at_startup.lock();
        if !infos.contains(&info) {
            infos.push(info);
        }
    }

    pub fn external_services_at_startup(&self) -> Vec<ExternalServiceInfo> {
        self.external_at_startup.lock().clone()
    }

    /// Share of registered objectives with `prefix` that were fully
    /// covered at least once. 1 when there is nothing to cover.
    pub fn compute_coverage(&self, prefix: &str) -> f64 {
        let report = self.coverage_report(prefix);
        report.coverage
    }

    pub fn coverage_report(&self, prefix: &str) -> CoverageReport {
        let mut total = 0;
        let mut covered = 0;
        for target in self.all_targets.iter() {
            let id = target.key();
            if !id.starts_with(prefix) {
                continue;
            }
            total += 1;
            if self.best_value(id).is_some_and(|v| v >= 1.0) {
                covered += 1;
            }
        }
        let coverage = if total == 0 { 1.0 } else { covered as f64 / total as f64 };
        CoverageReport { prefix: prefix.to_string(), total, covered, coverage }
    }

    /// Clear the run-wide values. With `all`, registered targets and id
    /// mappings go too.
    pub fn reset(&self, all: bool) {
        self.best.clear();
        self.reached_at_startup.clear();
        self.first_time_encountered.lock().clear();
        self.first_time_seen.lock().clear();
        self.external_at_startup.lock().clear();
        if all {
            self.all_targets.clear();
            self.to_mapped.clear();
            self.to_descriptive.clear();
            self.next_id.store(0, Ordering::Relaxed);
        }
    }
}
