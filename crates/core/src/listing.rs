//! Directory emulation over flat key listings

use std::collections::BTreeSet;

use crate::backend::{DirectoryInference, ListedObject};
use crate::locator::DELIMITER;

/// Collapse the keys under `prefix` into the entries of one directory level.
///
/// Each key loses the prefix and is split at its first delimiter. The head is
/// the entry; it gets a trailing delimiter when more path follows it, or when
/// the backend flagged the key as a directory and `inference` trusts such
/// flags. Entries come back sorted and unique, whatever order the backend
/// produced them in. Keys outside the prefix and the directory's own marker
/// object are ignored.
pub fn collapse_listing<'a, I>(prefix: &str, objects: I, inference: DirectoryInference) -> Vec<String>
where
    I: IntoIterator<Item = &'a ListedObject>,
{
    let mut entries = BTreeSet::new();

    for object in objects {
        let Some(relative) = object.key.strip_prefix(prefix) else {
            continue;
        };

        let (head, nested) = match relative.split_once(DELIMITER) {
            Some((head, _)) => (head, true),
            None => (relative, false),
        };
        if head.is_empty() {
            continue;
        }

        let flagged = inference == DirectoryInference::Markers && object.is_dir;
        if nested || flagged {
            entries.insert(format!("{head}{DELIMITER}"));
        } else {
            entries.insert(head.to_string());
        }
    }

    entries.into_iter().collect()
}
