//! Trackers for database and cache commands. Scoring the commands against
//! stored data is left to the store-specific heuristics of the driver.

use std::sync::Arc;

use heurist_vm::NativeResult;

use super::{FnReplacement, MethodReplacement, ReplacementCall};
use crate::category::{ReplacementCategory, ReplacementType};
use crate::tracer::additional_info::StorageCommand;

pub const SQL_STATEMENT: &str = "java/sql/Statement";
pub const MONGO_COLLECTION: &str = "com/mongodb/client/MongoCollection";
pub const JEDIS: &str = "redis/clients/jedis/Jedis";

pub(super) fn replacements() -> Vec<Arc<dyn MethodReplacement>> {
    use ReplacementType::Tracker;
    vec![
        FnReplacement::new(
            (SQL_STATEMENT, "executeQuery", "(Ljava/lang/String;)Ljava/sql/ResultSet;"),
            Tracker,
            ReplacementCategory::Sql,
            false,
            sql_execute_query,
        ),
        FnReplacement::new(
            (MONGO_COLLECTION, "find", "(Lorg/bson/conversions/Bson;)Lcom/mongodb/client/FindIterable;"),
            Tracker,
            ReplacementCategory::Mongo,
            false,
            mongo_find,
        ),
        FnReplacement::new(
            (JEDIS, "get", "(Ljava/lang/String;)Ljava/lang/String;"),
            Tracker,
            ReplacementCategory::Redis,
            false,
            redis_get,
        ),
    ]
}

fn record(call: &ReplacementCall<'_>, category: ReplacementCategory, command: String) {
    call.tracer.add_storage_command(StorageCommand { category, command });
}

fn sql_execute_query(call: &ReplacementCall<'_>) -> NativeResult {
    if let Some(sql) = call.str_arg(1) {
        record(call, ReplacementCategory::Sql, sql.to_string());
    }
    call.call_original()
}

fn mongo_find(call: &ReplacementCall<'_>) -> NativeResult {
    if let Some(filter) = call.arg(1) {
        record(call, ReplacementCategory::Mongo, format!("find {}", filter.to_java_string()));
    }
    call.call_original()
}

fn redis_get(call: &ReplacementCall<'_>) -> NativeResult {
    if let Some(key) = call.str_arg(1) {
        record(call, ReplacementCategory::Redis, format!("GET {key}"));
    }
    call.call_original()
}
