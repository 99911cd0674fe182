//! Diff Engine - which file migrations are not yet in the ledger

use std::collections::HashSet;

/// Names in `file_names` that do not appear in `ledger_names`
///
/// Comparison is exact string equality; the order of `file_names` is kept.
/// Ledger names without a file are ignored.
pub fn pending_names(file_names: &[String], ledger_names: &[String]) -> Vec<String> {
    let applied: HashSet<&str> = ledger_names.iter().map(String::as_str).collect();

    file_names
        .iter()
        .filter(|name| !applied.contains(name.as_str()))
        .cloned()
        .collect()
}
