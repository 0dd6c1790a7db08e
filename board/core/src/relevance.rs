//! Relevance Selector
//!
//! Decides which siblings get screen space when there are more of them than
//! the display limit allows.
//!
//! Selection runs in two phases:
//!
//! 1. rank every candidate through a chain of preferences (first non-equal
//!    answer wins) and keep the top `limit`
//! 2. re-sort the kept set by id
//!
//! The second phase means rows never swap places between frames because of
//! progress changes; only membership changes.

use std::cmp::Ordering;

use crate::span::Span;

/// Something the selector can rank
pub trait Ranked {
    /// Creation-order key; higher is newer
    fn rank_id(&self) -> u64;

    /// Finished items rank below unfinished ones
    fn rank_finished(&self) -> bool;
}

impl Ranked for Span {
    fn rank_id(&self) -> u64 {
        self.id().map_or(0, |id| id.as_u64())
    }

    fn rank_finished(&self) -> bool {
        self.is_finished()
    }
}

/// Outcome of comparing two candidates
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Preference {
    First,
    Second,
    Equal,
}

/// Ranking keys, read once per candidate before sorting
#[derive(Clone, Copy, Debug)]
struct RankKey {
    id: u64,
    finished: bool,
}

type Filter = fn(&RankKey, &RankKey) -> Preference;

/// Applied in order; the first non-equal answer decides
const FILTERS: [Filter; 2] = [prefer_unfinished, prefer_newest];

fn prefer_unfinished(a: &RankKey, b: &RankKey) -> Preference {
    match (a.finished, b.finished) {
        (false, true) => Preference::First,
        (true, false) => Preference::Second,
        _ => Preference::Equal,
    }
}

fn prefer_newest(a: &RankKey, b: &RankKey) -> Preference {
    match a.id.cmp(&b.id) {
        Ordering::Greater => Preference::First,
        Ordering::Less => Preference::Second,
        Ordering::Equal => Preference::Equal,
    }
}

fn compare(a: &RankKey, b: &RankKey) -> Ordering {
    for filter in FILTERS {
        match filter(a, b) {
            Preference::First => return Ordering::Less,
            Preference::Second => return Ordering::Greater,
            Preference::Equal => {}
        }
    }
    Ordering::Equal
}

/// Pick the `limit` most relevant items, returned in ascending id order
///
/// When `items` already fits, it is returned unchanged (same order).
#[must_use]
pub fn most_relevant<T: Ranked + Clone>(items: &[T], limit: usize) -> Vec<T> {
    if items.len() <= limit {
        return items.to_vec();
    }

    // Keys are read up front so concurrent mutation cannot make the
    // comparison inconsistent mid-sort.
    let mut ranked: Vec<(RankKey, &T)> = items
        .iter()
        .map(|item| {
            let key = RankKey {
                id: item.rank_id(),
                finished: item.rank_finished(),
            };
            (key, item)
        })
        .collect();

    ranked.sort_by(|(a, _), (b, _)| compare(a, b));
    ranked.truncate(limit);
    ranked.sort_by_key(|(key, _)| key.id);

    ranked.into_iter().map(|(_, item)| item.clone()).collect()
}
