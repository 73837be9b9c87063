//! Listing persistence keyed by canonical URL.
use std::collections::{BTreeMap, HashSet};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use engine_logging::{engine_debug, engine_info};
use roomscout_core::{EnrichedListing, Website};
use serde::{Deserialize, Serialize};

use crate::persist::{write_atomic, PersistError};

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("could not read store {path}: {source}")]
    Read { path: PathBuf, source: io::Error },
    #[error("store {path} is corrupt: {source}")]
    Corrupt {
        path: PathBuf,
        source: serde_json::Error,
    },
    #[error("could not encode store: {0}")]
    Encode(#[from] serde_json::Error),
    #[error(transparent)]
    Persist(#[from] PersistError),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ListingStatus {
    Active,
    Deleted,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoredListing {
    #[serde(flatten)]
    pub listing: EnrichedListing,
    pub status: ListingStatus,
    pub first_seen: DateTime<Utc>,
    pub last_seen: DateTime<Utc>,
}

/// Counts from one upsert.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct UpsertCounts {
    pub new: usize,
    pub updated: usize,
}

/// Where enriched listings end up.
pub trait ListingStore: Send {
    /// Stored listing for `url`, active or not.
    fn get(&self, url: &str) -> Option<&StoredListing>;

    fn upsert(
        &mut self,
        listings: &[EnrichedListing],
        now: DateTime<Utc>,
    ) -> Result<UpsertCounts, StoreError>;

    /// Marks every active listing of `websites` whose URL is not in `active` as deleted.
    fn mark_deleted_except(
        &mut self,
        websites: &[Website],
        active: &HashSet<String>,
    ) -> Result<usize, StoreError>;
}

/// All listings in one pretty-printed JSON array, rewritten atomically.
#[derive(Debug)]
pub struct JsonListingStore {
    path: PathBuf,
    listings: BTreeMap<String, StoredListing>,
}

impl JsonListingStore {
    /// Loads `path`, or starts empty when it does not exist yet.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let path = path.into();
        let listings = match fs::read_to_string(&path) {
            Ok(text) => {
                let stored: Vec<StoredListing> =
                    serde_json::from_str(&text).map_err(|source| StoreError::Corrupt {
                        path: path.clone(),
                        source,
                    })?;
                stored
                    .into_iter()
                    .map(|s| (s.listing.url().to_string(), s))
                    .collect()
            }
            Err(err) if err.kind() == io::ErrorKind::NotFound => BTreeMap::new(),
            Err(source) => return Err(StoreError::Read { path, source }),
        };
        engine_info!("listing store {} holds {} listing(s)", path.display(), listings.len());
        Ok(Self { path, listings })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn len(&self) -> usize {
        self.listings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.listings.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &StoredListing> {
        self.listings.values()
    }

    fn save(&self) -> Result<(), StoreError> {
        let stored: Vec<&StoredListing> = self.listings.values().collect();
        let json = serde_json::to_vec_pretty(&stored)?;
        write_atomic(&self.path, &json)?;
        engine_debug!("saved {} listing(s) to {}", stored.len(), self.path.display());
        Ok(())
    }
}

impl ListingStore for JsonListingStore {
    fn get(&self, url: &str) -> Option<&StoredListing> {
        self.listings.get(url)
    }

    fn upsert(
        &mut self,
        listings: &[EnrichedListing],
        now: DateTime<Utc>,
    ) -> Result<UpsertCounts, StoreError> {
        let mut counts = UpsertCounts::default();
        for listing in listings {
            match self.listings.get_mut(listing.url()) {
                Some(stored) => {
                    stored.listing = listing.clone();
                    stored.status = ListingStatus::Active;
                    stored.last_seen = now;
                    counts.updated += 1;
                }
                None => {
                    self.listings.insert(
                        listing.url().to_string(),
                        StoredListing {
                            listing: listing.clone(),
                            status: ListingStatus::Active,
                            first_seen: now,
                            last_seen: now,
                        },
                    );
                    counts.new += 1;
                }
            }
        }
        self.save()?;
        Ok(counts)
    }

    fn mark_deleted_except(
        &mut self,
        websites: &[Website],
        active: &HashSet<String>,
    ) -> Result<usize, StoreError> {
        let mut deleted = 0;
        for (url, stored) in self.listings.iter_mut() {
            if stored.status == ListingStatus::Active
                && websites.contains(&stored.listing.candidate.website)
                && !active.contains(url)
            {
                stored.status = ListingStatus::Deleted;
                deleted += 1;
            }
        }
        if deleted > 0 {
            self.save()?;
        }
        Ok(deleted)
    }
}
