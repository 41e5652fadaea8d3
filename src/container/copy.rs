//! Selection of the bindings copied when a container is extended

use super::tree::BindingMap;
use crate::{
    error::Error,
    key::{Key, SearchSpecs},
};
use std::collections::HashSet;

/// Which bindings of an extended container get a fresh copy in the new one.
///
/// A copied singleton creates its own value in the new container; a binding
/// that is not copied is shared with the extended container, together with
/// whatever value it already holds.
#[derive(Debug, Clone, Default)]
pub enum CopyMode {
    /// Shares every binding
    #[default]
    None,
    /// Copies every binding
    All,
    /// Copies the listed keys
    Keys(Vec<Key>),
    /// Copies the bindings matching any of the specs
    Matching(Vec<SearchSpecs>),
    /// Copies every binding except those matching any of the specs
    AllBut(Vec<SearchSpecs>),
}

impl CopyMode {
    /// Keys to copy out of `bindings`.
    ///
    /// Fails with [`Error::NoResult`] when a listed key or spec selects nothing.
    pub(crate) fn keys(&self, bindings: &BindingMap) -> Result<HashSet<Key>, Error> {
        match self {
            CopyMode::None => Ok(HashSet::new()),
            CopyMode::All => Ok(bindings.keys().cloned().collect()),
            CopyMode::Keys(keys) => keys
                .iter()
                .map(|key| {
                    if bindings.contains_key(key) {
                        Ok(key.clone())
                    } else {
                        Err(Error::NoResult(format!("No binding found for {} to copy", key.description())))
                    }
                })
                .collect(),
            CopyMode::Matching(specs) => {
                let mut keys = HashSet::new();
                for spec in specs {
                    keys.extend(matching(bindings, spec)?);
                }
                Ok(keys)
            }
            CopyMode::AllBut(specs) => {
                let mut ignored = HashSet::new();
                for spec in specs {
                    ignored.extend(matching(bindings, spec)?);
                }
                Ok(bindings
                    .keys()
                    .filter(|key| !ignored.contains(*key))
                    .cloned()
                    .collect())
            }
        }
    }
}

fn matching(bindings: &BindingMap, spec: &SearchSpecs) -> Result<Vec<Key>, Error> {
    let keys: Vec<Key> = bindings
        .keys()
        .filter(|key| spec.matches(key))
        .cloned()
        .collect();
    if keys.is_empty() {
        return Err(Error::NoResult(format!("No binding found that match {spec}")));
    }
    Ok(keys)
}
