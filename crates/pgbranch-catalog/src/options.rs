//! Option lists (`key=value` settings on servers and user mappings) and the
//! environment-dependent filter.
//!
//! Option *values* on servers and user mappings are things like hostnames and
//! credentials, which legitimately differ between a main and a branch database.
//! Only the presence or absence of a key is treated as structural.

use indexmap::IndexMap;

/// One entry of an option-change list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OptionChange {
    /// Key present only in the target.
    Add { key: String, value: String },
    /// Key present in both, value differs.
    Set { key: String, value: String },
    /// Key present only in the source; `value` is the value being removed.
    Drop { key: String, value: String },
}

impl OptionChange {
    pub fn key(&self) -> &str {
        match self {
            OptionChange::Add { key, .. }
            | OptionChange::Set { key, .. }
            | OptionChange::Drop { key, .. } => key,
        }
    }
}

/// Compute the option-change list that turns `from` into `to`.
///
/// Entries come out sorted by key so the list is independent of extraction order.
pub fn option_changes(
    from: &IndexMap<String, String>,
    to: &IndexMap<String, String>,
) -> Vec<OptionChange> {
    let mut changes = Vec::new();

    for (key, value) in from {
        match to.get(key) {
            None => changes.push(OptionChange::Drop {
                key: key.clone(),
                value: value.clone(),
            }),
            Some(new_value) if new_value != value => changes.push(OptionChange::Set {
                key: key.clone(),
                value: new_value.clone(),
            }),
            Some(_) => {}
        }
    }

    for (key, value) in to {
        if !from.contains_key(key) {
            changes.push(OptionChange::Add {
                key: key.clone(),
                value: value.clone(),
            });
        }
    }

    changes.sort_by(|a, b| a.key().cmp(b.key()));
    changes
}

/// Drop every `Set` entry, keeping `Add` and `Drop` entries unchanged and in order.
pub fn filter_env_dependent(changes: impl IntoIterator<Item = OptionChange>) -> Vec<OptionChange> {
    changes
        .into_iter()
        .filter(|change| !matches!(change, OptionChange::Set { .. }))
        .collect()
}

/// Parse the engine's `{key=value,...}` option array into an ordered map.
///
/// Entries without `=` are kept with an empty value.
pub fn parse_options<S: AsRef<str>>(raw: &[S]) -> IndexMap<String, String> {
    raw.iter()
        .map(|entry| match entry.as_ref().split_once('=') {
            Some((key, value)) => (key.to_string(), value.to_string()),
            None => (entry.as_ref().to_string(), String::new()),
        })
        .collect()
}
