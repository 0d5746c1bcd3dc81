//! Actors attached to accept states.
//!
//! An actor carries the identifiers of the dictionary entry (or entries) whose
//! pattern ends in a given accept state. When determinization folds several
//! accept states into one, their actors are combined with [`Actor::merge`],
//! which is a pure set union: the inputs are left untouched and the merged
//! state owns the result.

use std::fmt;
use std::sync::Arc;

/// Separator between identifiers in a joined identifier list.
pub const ID_SEPARATOR: char = ';';

/// Identifier payload of an accept state.
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Actor {
    /// No identifier attached.
    #[default]
    None,
    /// Exactly one identifier.
    Single(Arc<str>),
    /// Two or more identifiers, sorted and deduplicated.
    Merged(Arc<[Arc<str>]>),
}

impl Actor {
    /// Build an actor from one identifier or a `;`-joined identifier list.
    ///
    /// Empty segments are ignored, so `"G1;;G2;"` yields `{G1, G2}`.
    pub fn from_ids(ids: &str) -> Actor {
        Actor::from_id_list(ids.split(ID_SEPARATOR))
    }

    /// Build an actor from an iterator of identifiers.
    pub fn from_id_list<I, S>(ids: I) -> Actor
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let list: Vec<Arc<str>> = ids
            .into_iter()
            .map(|s| s.as_ref().trim().to_string())
            .filter(|s| !s.is_empty())
            .map(Arc::from)
            .collect();
        Actor::from_sorted(normalize(list))
    }

    fn from_sorted(mut list: Vec<Arc<str>>) -> Actor {
        match list.len() {
            0 => Actor::None,
            1 => Actor::Single(list.swap_remove(0)),
            _ => Actor::Merged(list.into()),
        }
    }

    #[inline]
    pub fn is_none(&self) -> bool {
        matches!(self, Actor::None)
    }

    /// The identifiers carried by this actor, sorted.
    pub fn ids(&self) -> &[Arc<str>] {
        match self {
            Actor::None => &[],
            Actor::Single(id) => std::slice::from_ref(id),
            Actor::Merged(ids) => &ids[..],
        }
    }

    /// Union of the identifier sets of `self` and `other`.
    pub fn merge(&self, other: &Actor) -> Actor {
        if self == other || other.is_none() {
            return self.clone();
        }
        if self.is_none() {
            return other.clone();
        }
        let list: Vec<Arc<str>> = self.ids().iter().chain(other.ids()).cloned().collect();
        Actor::from_sorted(normalize(list))
    }

    /// Identifiers joined with [`ID_SEPARATOR`].
    pub fn joined(&self) -> String {
        let mut out = String::new();
        for (i, id) in self.ids().iter().enumerate() {
            if i > 0 {
                out.push(ID_SEPARATOR);
            }
            out.push_str(id);
        }
        out
    }
}

fn normalize(mut list: Vec<Arc<str>>) -> Vec<Arc<str>> {
    list.sort();
    list.dedup();
    list
}

impl fmt::Display for Actor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.joined())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_ids_single_and_list() {
        assert_eq!(Actor::from_ids("G1"), Actor::Single(Arc::from("G1")));
        assert!(Actor::from_ids("").is_none());
        assert!(Actor::from_ids(" ; ").is_none());

        let actor = Actor::from_ids("G2;G1;G2");
        assert_eq!(actor.joined(), "G1;G2");
        assert!(matches!(actor, Actor::Merged(_)));
    }

    #[test]
    fn test_merge_is_union_without_duplicates() {
        let a = Actor::from_ids("3569");
        let b = Actor::from_ids("16193;3569");
        let merged = a.merge(&b);
        assert_eq!(merged.joined(), "16193;3569");

        // inputs are unchanged
        assert_eq!(a.joined(), "3569");
        assert_eq!(b.joined(), "16193;3569");
    }

    #[test]
    fn test_merge_with_none() {
        let a = Actor::from_ids("G1");
        assert_eq!(a.merge(&Actor::None), a);
        assert_eq!(Actor::None.merge(&a), a);
        assert!(Actor::None.merge(&Actor::None).is_none());
    }

    #[test]
    fn test_merge_is_commutative() {
        let a = Actor::from_ids("B;C");
        let b = Actor::from_ids("A");
        assert_eq!(a.merge(&b), b.merge(&a));
        assert_eq!(a.merge(&b).to_string(), "A;B;C");
    }
}
