use crate::error::Error;
use dashmap::DashMap;
use std::collections::BTreeSet;

/// Identity of a duplicate group: byte-identical content always shares both.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Fingerprint {
    pub hash: String,
    pub size: u64,
}

/// Objects sharing one fingerprint, members in identifier order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FingerprintGroup {
    pub fingerprint: Fingerprint,
    pub members: Vec<String>,
}

/// Content hash → object membership. Safe to populate from several hashing workers.
#[derive(Debug, Default)]
pub struct FingerprintIndex {
    by_fingerprint: DashMap<Fingerprint, BTreeSet<String>>,
    by_object: DashMap<String, Fingerprint>,
}

impl FingerprintIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert `object_id`, moving it out of its previous group if its fingerprint changed.
    pub fn record(&self, object_id: &str, hash: Option<&str>, size: Option<u64>) -> Result<(), Error> {
        let hash = match hash.map(str::trim) {
            Some(h) if !h.is_empty() => h,
            _ => {
                return Err(Error::InvalidInput(format!(
                    "object {} has no content hash",
                    object_id
                )))
            }
        };
        let size = size.ok_or_else(|| {
            Error::InvalidInput(format!("object {} has no size", object_id))
        })?;

        let fingerprint = Fingerprint {
            hash: hash.to_string(),
            size,
        };

        let previous = self
            .by_object
            .insert(object_id.to_string(), fingerprint.clone());
        if let Some(previous) = previous {
            if previous == fingerprint {
                return Ok(());
            }
            self.remove_member(&previous, object_id);
        }

        self.by_fingerprint
            .entry(fingerprint)
            .or_default()
            .insert(object_id.to_string());
        Ok(())
    }

    /// Drop `object_id` from the index. Returns whether it was present.
    pub fn remove(&self, object_id: &str) -> bool {
        match self.by_object.remove(object_id) {
            Some((_, fingerprint)) => {
                self.remove_member(&fingerprint, object_id);
                true
            }
            None => false,
        }
    }

    fn remove_member(&self, fingerprint: &Fingerprint, object_id: &str) {
        self.by_fingerprint.remove_if_mut(fingerprint, |_, members| {
            members.remove(object_id);
            members.is_empty()
        });
    }

    pub fn object_count(&self) -> usize {
        self.by_object.len()
    }

    pub fn clear(&self) {
        self.by_fingerprint.clear();
        self.by_object.clear();
    }

    /// Groups with more than one member, ordered by fingerprint.
    ///
    /// The candidate list is taken when called; each group's members are read from the
    /// live index as the iterator advances, so calling again reflects later mutations.
    pub fn groups_with_duplicates(&self) -> impl Iterator<Item = FingerprintGroup> + '_ {
        let mut candidates: Vec<Fingerprint> = self
            .by_fingerprint
            .iter()
            .filter(|entry| entry.value().len() > 1)
            .map(|entry| entry.key().clone())
            .collect();
        candidates.sort();

        candidates.into_iter().filter_map(move |fingerprint| {
            let members: Vec<String> = self
                .by_fingerprint
                .get(&fingerprint)?
                .iter()
                .cloned()
                .collect();
            (members.len() > 1).then_some(FingerprintGroup {
                fingerprint,
                members,
            })
        })
    }
}
