//! Side-channel observations of one action, besides objective coverage.

use std::cell::Cell;
use std::collections::{BTreeMap, BTreeSet};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use dashmap::{DashMap, DashSet};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::category::ReplacementCategory;

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum StringSpecialization {
    /// Compared for equality against a constant.
    Constant,
    ConstantIgnoreCase,
    /// Compared against another taint input.
    Equal,
    /// Must fully match a regex.
    RegexWhole,
    /// Must contain a match of a regex.
    RegexPartial,
    Integer,
    Long,
    Double,
    Uri,
    /// Parsed as JSON into the DTO named by the value.
    JsonObject,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct StringSpecializationInfo {
    pub specialization: StringSpecialization,
    pub value: String,
}

impl StringSpecializationInfo {
    pub fn new(specialization: StringSpecialization, value: impl Into<String>) -> Self {
        StringSpecializationInfo { specialization, value: value.into() }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct HostnameResolutionInfo {
    pub hostname: String,
    pub resolved: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ExternalServiceInfo {
    pub protocol: String,
    pub hostname: String,
    pub port: Option<u16>,
}

/// A command sent to a database or cache.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct StorageCommand {
    pub category: ReplacementCategory,
    pub command: String,
}

#[derive(Debug, Clone)]
struct StatementMethod {
    statement: Arc<str>,
    method: Arc<str>,
}

static NEXT_THREAD_KEY: AtomicU64 = AtomicU64::new(1);

thread_local! {
    static THREAD_KEY: Cell<u64> = const { Cell::new(0) };
}

fn thread_key() -> u64 {
    THREAD_KEY.with(|k| {
        if k.get() == 0 {
            k.set(NEXT_THREAD_KEY.fetch_add(1, Ordering::Relaxed));
        }
        k.get()
    })
}

#[derive(Debug, Default)]
pub struct AdditionalInfo {
    query_parameters: DashSet<String>,
    headers: DashSet<String>,
    string_specializations: DashMap<String, BTreeSet<StringSpecializationInfo>>,
    parsed_dto_names: DashSet<String>,
    hostnames: DashSet<HostnameResolutionInfo>,
    external_services: DashSet<ExternalServiceInfo>,
    storage_commands: Mutex<Vec<StorageCommand>>,
    /// Statement stacks per thread: a statement is known to start, but not
    /// to end, so nested calls push and returns pop.
    statement_stacks: DashMap<u64, Vec<StatementMethod>>,
    last_thread: AtomicU64,
    /// Last statement of a stack that was popped empty.
    no_exception_statement: Mutex<Option<Arc<str>>>,
}

impl AdditionalInfo {
    pub fn new() -> Self {
        AdditionalInfo::default()
    }

    pub fn add_query_parameter(&self, param: &str) {
        if !param.is_empty() {
            self.query_parameters.insert(param.to_string());
        }
    }

    pub fn add_header(&self, header: &str) {
        if !header.is_empty() {
            self.headers.insert(header.to_string());
        }
    }

    pub fn add_specialization(&self, taint_input: &str, info: StringSpecializationInfo) {
        self.string_specializations
            .entry(taint_input.to_string())
            .or_default()
            .insert(info);
    }

    pub fn add_parsed_dto_name(&self, name: &str) {
        self.parsed_dto_names.insert(name.to_string());
    }

    pub fn add_hostname_info(&self, info: HostnameResolutionInfo) {
        self.hostnames.insert(info);
    }

    pub fn add_external_service(&self, info: ExternalServiceInfo) {
        self.external_services.insert(info);
    }

    pub fn add_storage_command(&self, command: StorageCommand) {
        self.storage_commands.lock().push(command);
    }

    pub fn push_last_executed_statement(&self, statement: Arc<str>, method: Arc<str>) {
        let key = thread_key();
        self.last_thread.store(key, Ordering::Relaxed);
        let mut stack = self.statement_stacks.entry(key).or_default();
        // a new line of the same method replaces the top
        if stack.last().is_some_and(|top| top.method == method) {
            stack.pop();
        }
        stack.push(StatementMethod { statement, method });
    }

    pub fn pop_last_executed_statement(&self) {
        let key = thread_key();
        let popped = match self.statement_stacks.get_mut(&key) {
            Some(mut stack) => {
                let popped = stack.pop();
                match popped {
                    Some(top) if stack.is_empty() => Some(Some(top.statement)),
                    Some(_) => Some(None),
                    None => None,
                }
            }
            None => None,
        };
        match popped {
            Some(Some(last)) => *self.no_exception_statement.lock() = Some(last),
            Some(None) => {}
            None => warn!(
                "statement stack popped while empty; a thread kept executing \
                 instrumented code after its action completed"
            ),
        }
    }

    pub fn last_executed_statement(&self) -> Option<String> {
        let key = self.last_thread.load(Ordering::Relaxed);
        let top = self
            .statement_stacks
            .get(&key)
            .and_then(|stack| stack.last().map(|s| s.statement.clone()));
        top.or_else(|| self.no_exception_statement.lock().clone())
            .map(|s| s.to_string())
    }

    pub fn snapshot(&self) -> AdditionalInfoSnapshot {
        fn sorted<T: Ord + Clone + Eq + std::hash::Hash>(set: &DashSet<T>) -> Vec<T> {
            let mut items: Vec<T> = set.iter().map(|e| e.key().clone()).collect();
            items.sort();
            items
        }
        AdditionalInfoSnapshot {
            query_parameters: sorted(&self.query_parameters),
            headers: sorted(&self.headers),
            string_specializations: self
                .string_specializations
                .iter()
                .map(|e| (e.key().clone(), e.value().iter().cloned().collect()))
                .collect(),
            parsed_dto_names: sorted(&self.parsed_dto_names),
            hostnames: sorted(&self.hostnames),
            external_services: sorted(&self.external_services),
            storage_commands: self.storage_commands.lock().clone(),
            last_executed_statement: self.last_executed_statement(),
        }
    }
}

/// Serializable view of an [`AdditionalInfo`].
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AdditionalInfoSnapshot {
    pub query_parameters: Vec<String>,
    pub headers: Vec<String>,
    pub string_specializations: BTreeMap<String, Vec<StringSpecializationInfo>>,
    pub parsed_dto_names: Vec<String>,
    pub hostnames: Vec<HostnameResolutionInfo>,
    pub external_services: Vec<ExternalServiceInfo>,
    pub storage_commands: Vec<StorageCommand>,
    pub last_executed_statement: Option<String>,
}
