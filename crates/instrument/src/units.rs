//! Static facts discovered while instrumenting, read at startup to size the
//! objective universe.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, OnceLock};

use dashmap::{DashMap, DashSet};
use serde::{Deserialize, Serialize};

#[derive(Debug, Default)]
pub struct UnitsInfoRecorder {
    unit_names: DashSet<String>,
    lines: AtomicUsize,
    branches: AtomicUsize,
    replaced_methods_in_sut: AtomicUsize,
    replaced_methods_in_third_party: AtomicUsize,
    tracked_methods: AtomicUsize,
    numeric_comparisons: AtomicUsize,
    success_calls: AtomicUsize,
    /// DTO schemas known from the class files themselves.
    known_schemas: DashMap<String, serde_json::Value>,
    /// DTO schemas of classes actually parsed from JSON at runtime.
    parsed_dtos: DashMap<String, serde_json::Value>,
    /// Branch objective to the branch objectives it is control dependent on.
    branch_dependencies: DashMap<String, BTreeSet<String>>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct UnitsInfo {
    pub unit_names: BTreeSet<String>,
    pub number_of_lines: usize,
    pub number_of_branches: usize,
    pub number_of_replaced_methods_in_sut: usize,
    pub number_of_replaced_methods_in_third_party: usize,
    pub number_of_tracked_methods: usize,
    pub number_of_numeric_comparisons: usize,
    pub number_of_success_calls: usize,
    pub known_schemas: BTreeMap<String, serde_json::Value>,
    pub parsed_dtos: BTreeMap<String, serde_json::Value>,
    pub branch_dependencies: BTreeMap<String, BTreeSet<String>>,
}

impl UnitsInfoRecorder {
    pub fn new() -> Self {
        UnitsInfoRecorder::default()
    }

    pub fn global() -> Arc<UnitsInfoRecorder> {
        static GLOBAL: OnceLock<Arc<UnitsInfoRecorder>> = OnceLock::new();
        GLOBAL.get_or_init(|| Arc::new(UnitsInfoRecorder::new())).clone()
    }

    pub fn mark_new_unit(&self, class_name: &str) {
        self.unit_names.insert(class_name.to_string());
    }

    pub fn mark_new_lines(&self, n: usize) {
        self.lines.fetch_add(n, Ordering::Relaxed);
    }

    /// Each instrumented jump has two sides.
    pub fn mark_new_branch_pair(&self) {
        self.branches.fetch_add(2, Ordering::Relaxed);
    }

    pub fn mark_new_replaced_method_in_sut(&self) {
        self.replaced_methods_in_sut.fetch_add(1, Ordering::Relaxed);
    }

    pub fn mark_new_replaced_method_in_third_party(&self) {
        self.replaced_methods_in_third_party.fetch_add(1, Ordering::Relaxed);
    }

    pub fn mark_new_tracked_method(&self) {
        self.tracked_methods.fetch_add(1, Ordering::Relaxed);
    }

    pub fn mark_new_numeric_comparison(&self) {
        self.numeric_comparisons.fetch_add(1, Ordering::Relaxed);
    }

    pub fn mark_new_success_call(&self) {
        self.success_calls.fetch_add(1, Ordering::Relaxed);
    }

    pub fn add_known_schema(&self, class_name: &str, schema: serde_json::Value) {
        self.known_schemas.insert(class_name.to_string(), schema);
    }

    pub fn known_schema(&self, class_name: &str) -> Option<serde_json::Value> {
        self.known_schemas.get(class_name).map(|s| s.clone())
    }

    /// Record that `class_name` was parsed from JSON. The schema falls back
    /// to the known one, or to an open object.
    pub fn register_parsed_dto(&self, class_name: &str, schema: Option<serde_json::Value>) {
        if self.parsed_dtos.contains_key(class_name) {
            return;
        }
        let schema = schema
            .or_else(|| self.known_schema(class_name))
            .unwrap_or_else(|| serde_json::json!({ "type": "object" }));
        self.parsed_dtos.insert(class_name.to_string(), schema);
    }

    pub fn add_branch_dependency(&self, branch: &str, parent: &str) {
        self.branch_dependencies
            .entry(branch.to_string())
            .or_default()
            .insert(parent.to_string());
    }

    pub fn number_of_branches(&self) -> usize {
        self.branches.load(Ordering::Relaxed)
    }

    pub fn snapshot(&self) -> UnitsInfo {
        UnitsInfo {
            unit_names: self.unit_names.iter().map(|e| e.key().clone()).collect(),
            number_of_lines: self.lines.load(Ordering::Relaxed),
            number_of_branches: self.branches.load(Ordering::Relaxed),
            number_of_replaced_methods_in_sut: self.replaced_methods_in_sut.load(Ordering::Relaxed),
            number_of_replaced_methods_in_third_party: self
                .replaced_methods_in_third_party
                .load(Ordering::Relaxed),
            number_of_tracked_methods: self.tracked_methods.load(Ordering::Relaxed),
            number_of_numeric_comparisons: self.numeric_comparisons.load(Ordering::Relaxed),
            number_of_success_calls: self.success_calls.load(Ordering::Relaxed),
            known_schemas: self.known_schemas.iter().map(|e| (e.key().clone(), e.value().clone())).collect(),
            parsed_dtos: self.parsed_dtos.iter().map(|e| (e.key().clone(), e.value().clone())).collect(),
            branch_dependencies: self
                .branch_dependencies
                .iter()
                .map(|e| (e.key().clone(), e.value().clone()))
                .collect(),
        }
    }

    pub fn reset(&self) {
        self.unit_names.clear();
        for counter in [
            &self.lines,
            &self.branches,
            &self.replaced_methods_in_sut,
            &self.replaced_methods_in_third_party,
            &self.tracked_methods,
            &self.numeric_comparisons,
            &self.success_calls,
        ] {
            counter.store(0, Ordering::Relaxed);
        }
        self.known_schemas.clear();
        self.parsed_dtos.clear();
        self.branch_dependencies.clear();
    }
}
