use std::collections::HashSet;

use url::Url;

use crate::ListingCandidate;

/// Canonical form of a listing URL used as its identity.
///
/// Absolute http(s) URLs only; the fragment is dropped, scheme and host are
/// lowercased by the parser. Returns `None` for anything else.
pub fn canonical_url(raw: &str) -> Option<String> {
    let mut url = Url::parse(raw.trim()).ok()?;
    if !matches!(url.scheme(), "http" | "https") {
        return None;
    }
    url.set_fragment(None);
    Some(url.into())
}

/// Insertion-ordered set of candidates keyed by canonical URL.
#[derive(Debug, Default)]
pub struct CandidateSet {
    seen: HashSet<String>,
    items: Vec<ListingCandidate>,
    duplicates: usize,
}

impl CandidateSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a candidate unless its URL is already present.
    ///
    /// Returns whether it was added. Candidates whose URL cannot be
    /// canonicalized are dropped and count as neither.
    pub fn insert(&mut self, mut candidate: ListingCandidate) -> bool {
        let Some(key) = canonical_url(&candidate.url) else {
            return false;
        };
        if !self.seen.insert(key.clone()) {
            self.duplicates += 1;
            return false;
        }
        candidate.url = key;
        self.items.push(candidate);
        true
    }

    pub fn extend(&mut self, candidates: impl IntoIterator<Item = ListingCandidate>) -> usize {
        candidates
            .into_iter()
            .map(|c| self.insert(c))
            .filter(|added| *added)
            .count()
    }

    pub fn contains(&self, url: &str) -> bool {
        canonical_url(url).is_some_and(|key| self.seen.contains(&key))
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Number of candidates dropped because their URL was already present.
    pub fn duplicates(&self) -> usize {
        self.duplicates
    }

    pub fn urls(&self) -> impl Iterator<Item = &str> {
        self.items.iter().map(|c| c.url.as_str())
    }

    pub fn into_vec(self) -> Vec<ListingCandidate> {
        self.items
    }
}
