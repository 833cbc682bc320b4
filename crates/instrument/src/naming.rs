//! Stable, descriptive ids of coverage objectives.
//!
//! Ids are built from structural coordinates only (class, line, position),
//! never from runtime values, so a location always maps to the same id.
//! Prefixes double as categories for `non_covered_objectives(prefix)`.

use std::collections::hash_map::RandomState;
use std::hash::{BuildHasher, Hash};
use std::sync::{Arc, OnceLock};

use dashmap::DashMap;
use heurist_bytecode::ClassName;

use crate::category::ReplacementType;
use crate::error::TracerError;

/// A class is covered if at least one of its lines is executed.
pub const CLASS: &str = "Class";
pub const LINE: &str = "Line";
pub const BRANCH: &str = "Branch";
pub const TRUE_BRANCH: &str = "_trueBranch";
pub const FALSE_BRANCH: &str = "_falseBranch";
pub const METHOD_REPLACEMENT: &str = "MethodReplacement";
/// Method calls that complete without an exception.
pub const SUCCESS_CALL: &str = "Success_Call";
/// `lcmp`, `fcmp<op>` and `dcmp<op>`.
pub const NUMERIC_COMPARISON: &str = "NumericComparison";

pub fn pad_number(val: i64) -> Result<String, TracerError> {
    if val < 0 {
        return Err(TracerError::NegativePad(val));
    }
    Ok(format!("{val:05}"))
}

fn dots(class_name: &str) -> String {
    ClassName::new(class_name).full_name_with_dots()
}

/// Ids computed on every executed line or branch, interned by their coordinates.
/// A hit borrows the coordinates and allocates nothing.
struct Interned<K, V> {
    state: RandomState,
    buckets: DashMap<u64, Vec<(K, V)>>,
}

impl<K, V: Clone> Interned<K, V> {
    fn new() -> Self {
        Interned { state: RandomState::new(), buckets: DashMap::new() }
    }

    fn get_or_insert_with(
        &self,
        coordinates: impl Hash,
        is_key: impl Fn(&K) -> bool,
        make: impl FnOnce() -> (K, V),
    ) -> V {
        let hash = self.state.hash_one(coordinates);
        if let Some(bucket) = self.buckets.get(&hash) {
            if let Some((_, v)) = bucket.iter().find(|(k, _)| is_key(k)) {
                return v.clone();
            }
        }
        let mut bucket = self.buckets.entry(hash).or_default();
        if let Some((_, v)) = bucket.iter().find(|(k, _)| is_key(k)) {
            return v.clone();
        }
        let (k, v) = make();
        bucket.push((k, v.clone()));
        v
    }
}

fn class_ids() -> &'static Interned<String, Arc<str>> {
    static CACHE: OnceLock<Interned<String, Arc<str>>> = OnceLock::new();
    CACHE.get_or_init(Interned::new)
}

fn line_ids() -> &'static Interned<(String, u32), Arc<str>> {
    static CACHE: OnceLock<Interned<(String, u32), Arc<str>>> = OnceLock::new();
    CACHE.get_or_init(Interned::new)
}

type BranchKey = (String, u32, u32, bool);

fn branch_ids() -> &'static Interned<BranchKey, Arc<str>> {
    static CACHE: OnceLock<Interned<BranchKey, Arc<str>>> = OnceLock::new();
    CACHE.get_or_init(Interned::new)
}

type StatementKey = (String, String, String, u32);

fn statement_cache() -> &'static Interned<StatementKey, (Arc<str>, Arc<str>)> {
    static CACHE: OnceLock<Interned<StatementKey, (Arc<str>, Arc<str>)>> = OnceLock::new();
    CACHE.get_or_init(Interned::new)
}

pub fn class_objective_id(class_name: &str) -> Arc<str> {
    class_ids().get_or_insert_with(
        class_name,
        |c| c == class_name,
        || (class_name.to_string(), Arc::from(format!("{CLASS}_{}", dots(class_name)))),
    )
}

pub fn class_objective_name(class_name: &str) -> String {
    class_objective_id(class_name).to_string()
}

pub fn line_objective_id(class_name: &str, line: u32) -> Arc<str> {
    line_ids().get_or_insert_with(
        (class_name, line),
        |(c, l)| *l == line && c == class_name,
        || {
            let name = format!("{LINE}_at_{}_{line:05}", dots(class_name));
            ((class_name.to_string(), line), Arc::from(name))
        },
    )
}

pub fn line_objective_name(class_name: &str, line: u32) -> String {
    line_objective_id(class_name, line).to_string()
}

pub fn branch_objective_id(class_name: &str, line: u32, branch_id: u32, then_branch: bool) -> Arc<str> {
    branch_ids().get_or_insert_with(
        (class_name, line, branch_id, then_branch),
        |(c, l, b, t)| *l == line && *b == branch_id && *t == then_branch && c == class_name,
        || {
            let tag = if then_branch { TRUE_BRANCH } else { FALSE_BRANCH };
            let name = format!(
                "{BRANCH}_at_{}_at_line_{line:05}_position_{branch_id}{tag}",
                dots(class_name)
            );
            ((class_name.to_string(), line, branch_id, then_branch), Arc::from(name))
        },
    )
}

pub fn branch_objective_name(class_name: &str, line: u32, branch_id: u32, then_branch: bool) -> String {
    branch_objective_id(class_name, line, branch_id, then_branch).to_string()
}

/// `({class}_{line}_{method}, {class}_{method}_{descriptor})` for the
/// last-executed-statement stacks.
pub fn statement_ids(class_name: &str, method: &str, descriptor: &str, line: u32) -> (Arc<str>, Arc<str>) {
    statement_cache().get_or_insert_with(
        (class_name, method, descriptor, line),
        |(c, m, d, l)| *l == line && c == class_name && m == method && d == descriptor,
        || {
            let statement: Arc<str> = Arc::from(format!("{class_name}_{line}_{method}"));
            let method_id: Arc<str> = Arc::from(format!("{class_name}_{method}_{descriptor}"));
            (
                (class_name.to_string(), method.to_string(), descriptor.to_string(), line),
                (statement, method_id),
            )
        },
    )
}

pub fn success_call_objective_name(class_name: &str, line: u32, index: u32) -> String {
    format!("{SUCCESS_CALL}_at_{}_{line:05}_{index}", dots(class_name))
}

pub fn numeric_comparison_template(class_name: &str, line: u32, index: u32) -> String {
    format!("{NUMERIC_COMPARISON}_at_{}_{line:05}_{index}", dots(class_name))
}

/// `res` is the sign of the comparison outcome the objective stands for.
pub fn numeric_comparison_objective_name(template: &str, res: i64) -> String {
    let outcome = match res.signum() {
        0 => "EQ",
        -1 => "LT",
        _ => "GT",
    };
    format!("{template}_{outcome}")
}

pub fn method_replacement_template(class_name: &str, line: u32, index: u32) -> String {
    format!("{METHOD_REPLACEMENT}_at_{}_{line:05}_{index}", dots(class_name))
}

pub fn method_replacement_objective_name(
    template: &str,
    result: bool,
    kind: ReplacementType,
) -> Result<String, TracerError> {
    if !template.starts_with(METHOD_REPLACEMENT) {
        return Err(TracerError::InvalidTemplate(Some(template.to_string())));
    }
    Ok(format!("{template}_{kind}_{result}"))
}
