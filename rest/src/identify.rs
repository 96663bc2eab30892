//! Locating list entries by identity

use crate::config::Identity;
use crate::json::Id;
use serde_json::Value;

/// What to look for in a list
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Candidate<'a> {
    /// An entry carrying its own identity field
    Item(&'a Value),
    /// A bare identifier
    Id(&'a Id),
}

/// Position of the first entry matching `candidate`
///
/// With [`Identity::ByKey`] an entry matches when its key field is present
/// and equal to the candidate's key field (or to the bare id). An entry or
/// candidate without the key never matches, even if both lack it.
///
/// With [`Identity::ByPosition`] a numeric id is the position itself, and
/// item candidates never match.
///
/// Returns `None` for a missing or empty list.
#[must_use]
pub fn identify(items: Option<&[Value]>, candidate: Candidate<'_>, identity: &Identity) -> Option<usize> {
    let items = items.filter(|items| !items.is_empty())?;

    match identity {
        Identity::ByKey(key) => match candidate {
            Candidate::Item(item) => {
                let wanted = item.get(key.as_str())?;
                items
                    .iter()
                    .position(|entry| entry.get(key.as_str()) == Some(wanted))
            },
            Candidate::Id(id) => items
                .iter()
                .position(|entry| entry.get(key.as_str()).is_some_and(|value| id.matches(value))),
        },
        Identity::ByPosition => match candidate {
            Candidate::Id(Id::Number(index)) => usize::try_from(*index)
                .ok()
                .filter(|index| *index < items.len()),
            Candidate::Id(Id::Text(_)) | Candidate::Item(_) => None,
        },
    }
}
