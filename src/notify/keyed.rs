//! Identity-keyed upsert/delete over ordered collections
//!
//! Receivers and routes are plain YAML lists with no uniqueness guarantee of
//! their own. These helpers keep at most one element per key: upsert
//! replaces in place (or appends), delete removes and keeps the relative
//! order of everything else. Lists stay small, so a linear scan is enough.

use super::document::{Receiver, Route};

/// An element with an identity key
pub trait Keyed {
    fn identity(&self) -> Option<&str>;
}

impl Keyed for Receiver {
    fn identity(&self) -> Option<&str> {
        Some(&self.name)
    }
}

impl Keyed for Route {
    fn identity(&self) -> Option<&str> {
        self.receiver.as_deref()
    }
}

/// Where an upserted element ended up
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Upserted {
    Replaced(usize),
    Appended(usize),
}

/// Replace the element keyed `key` in place, or append `item`.
///
/// Any later duplicates of `key` are dropped so the list converges to one
/// element per key even if it was edited by hand.
pub fn upsert_keyed<T: Keyed>(items: &mut Vec<T>, key: &str, item: T) -> Upserted {
    match position(items, key) {
        Some(index) => {
            items[index] = item;
            let mut seen = 0;
            items.retain(|i| {
                if i.identity() != Some(key) {
                    return true;
                }
                seen += 1;
                seen == 1
            });
            Upserted::Replaced(index)
        }
        None => {
            items.push(item);
            Upserted::Appended(items.len() - 1)
        }
    }
}

/// Remove every element keyed `key`; returns how many were removed
pub fn remove_keyed<T: Keyed>(items: &mut Vec<T>, key: &str) -> usize {
    let before = items.len();
    items.retain(|i| i.identity() != Some(key));
    before - items.len()
}

fn position<T: Keyed>(items: &[T], key: &str) -> Option<usize> {
    items.iter().position(|i| i.identity() == Some(key))
}
