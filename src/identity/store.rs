use std::fs::File;
use std::io::BufReader;
use std::path::Path;

use crate::foundation::core::{ClusterId, Ordinal};
use crate::foundation::error::{PanelwaveError, PanelwaveResult};

/// Lifecycle of one cluster slot.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ClusterState {
    Active,
    /// Dissolved by a merge pass; members now belong to the target.
    MergedInto(ClusterId),
    /// Placeholder for an id absent from a loaded snapshot. Never matched.
    Retired,
}

/// One identity cluster.
#[derive(Clone, Debug, PartialEq)]
pub struct IdentityCluster {
    pub id: ClusterId,
    pub centroid: Vec<f32>,
    pub member_count: u32,
    /// Last panel this cluster was seen in during the current run. `None` for seeds.
    pub last_seen: Option<Ordinal>,
    pub state: ClusterState,
}

impl IdentityCluster {
    pub fn is_active(&self) -> bool {
        self.state == ClusterState::Active
    }
}

/// Persisted cluster entry (`{ id, centroid, member_count }`).
#[derive(Clone, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct ClusterSnapshot {
    pub id: ClusterId,
    pub centroid: Vec<f32>,
    pub member_count: u32,
}

/// Final cluster state of a chapter, used to seed later chapters of the same title.
#[derive(Clone, Debug, Default, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct IdentitySnapshot {
    pub clusters: Vec<ClusterSnapshot>,
}

impl IdentitySnapshot {
    pub fn from_reader<R: std::io::Read>(r: R) -> PanelwaveResult<Self> {
        serde_json::from_reader(r)
            .map_err(|e| PanelwaveError::validation(format!("parse identity snapshot JSON: {e}")))
    }

    pub fn from_path(path: impl AsRef<Path>) -> PanelwaveResult<Self> {
        let path = path.as_ref();
        let f = File::open(path).map_err(|e| {
            PanelwaveError::validation(format!(
                "open identity snapshot '{}': {e}",
                path.display()
            ))
        })?;
        Self::from_reader(BufReader::new(f))
    }

    pub fn to_json_pretty(&self) -> PanelwaveResult<String> {
        serde_json::to_string_pretty(self)
            .map_err(|e| PanelwaveError::serde(format!("serialize identity snapshot: {e}")))
    }
}

/// Arena of identity clusters. A [`ClusterId`] is the cluster's index in the arena.
///
/// Clusters are never removed, only redirected by merges, so ids handed out earlier stay valid
/// for the lifetime of the store.
#[derive(Clone, Debug, Default)]
pub struct IdentityStore {
    clusters: Vec<IdentityCluster>,
    dim: Option<usize>,
}

impl IdentityStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed a store from a prior chapter's snapshot. Ids are preserved.
    pub fn from_snapshot(snapshot: &IdentitySnapshot) -> PanelwaveResult<Self> {
        let mut store = Self::new();
        let mut entries: Vec<&ClusterSnapshot> = snapshot.clusters.iter().collect();
        entries.sort_by_key(|c| c.id);

        for entry in entries {
            if entry.id.index() < store.clusters.len() {
                return Err(PanelwaveError::validation(format!(
                    "identity snapshot repeats cluster id {}",
                    entry.id
                )));
            }
            if entry.centroid.is_empty() || entry.centroid.iter().any(|v| !v.is_finite()) {
                return Err(PanelwaveError::validation(format!(
                    "identity snapshot cluster {} has an invalid centroid",
                    entry.id
                )));
            }
            store.check_dim(entry.centroid.len())?;
            while store.clusters.len() < entry.id.index() {
                let id = ClusterId(store.clusters.len() as u32);
                store.clusters.push(IdentityCluster {
                    id,
                    centroid: Vec::new(),
                    member_count: 0,
                    last_seen: None,
                    state: ClusterState::Retired,
                });
            }
            store.clusters.push(IdentityCluster {
                id: entry.id,
                centroid: entry.centroid.clone(),
                member_count: entry.member_count.max(1),
                last_seen: None,
                state: ClusterState::Active,
            });
        }
        Ok(store)
    }

    /// Active clusters only, in id order.
    pub fn snapshot(&self) -> IdentitySnapshot {
        IdentitySnapshot {
            clusters: self
                .active()
                .map(|c| ClusterSnapshot {
                    id: c.id,
                    centroid: c.centroid.clone(),
                    member_count: c.member_count,
                })
                .collect(),
        }
    }

    pub fn len(&self) -> usize {
        self.clusters.len()
    }

    pub fn is_empty(&self) -> bool {
        self.clusters.is_empty()
    }

    pub fn dim(&self) -> Option<usize> {
        self.dim
    }

    pub fn get(&self, id: ClusterId) -> Option<&IdentityCluster> {
        self.clusters.get(id.index())
    }

    pub fn active(&self) -> impl Iterator<Item = &IdentityCluster> {
        self.clusters.iter().filter(|c| c.is_active())
    }

    pub fn active_count(&self) -> usize {
        self.active().count()
    }

    /// Follow merge redirects to the surviving cluster.
    pub fn resolve(&self, mut id: ClusterId) -> ClusterId {
        while let Some(c) = self.clusters.get(id.index()) {
            match c.state {
                ClusterState::MergedInto(target) => id = target,
                _ => break,
            }
        }
        id
    }

    pub(crate) fn check_dim(&mut self, len: usize) -> PanelwaveResult<()> {
        match self.dim {
            None => {
                self.dim = Some(len);
                Ok(())
            }
            Some(d) if d == len => Ok(()),
            Some(d) => Err(PanelwaveError::validation(format!(
                "embedding dimension {len} does not match identity store dimension {d}"
            ))),
        }
    }

    pub(crate) fn create(&mut self, embedding: &[f32], seen: Ordinal) -> ClusterId {
        let id = ClusterId(self.clusters.len() as u32);
        self.clusters.push(IdentityCluster {
            id,
            centroid: embedding.to_vec(),
            member_count: 1,
            last_seen: Some(seen),
            state: ClusterState::Active,
        });
        id
    }

    /// Add a member to an active cluster, updating its centroid.
    ///
    /// With `decay = Some(a)` the centroid moves as `c + a * (x - c)`; otherwise as a running mean.
    pub(crate) fn absorb(
        &mut self,
        id: ClusterId,
        embedding: &[f32],
        seen: Ordinal,
        decay: Option<f64>,
    ) {
        let c = &mut self.clusters[id.index()];
        c.member_count = c.member_count.saturating_add(1);
        let alpha = decay.unwrap_or(1.0 / f64::from(c.member_count)) as f32;
        for (dst, &x) in c.centroid.iter_mut().zip(embedding) {
            *dst += alpha * (x - *dst);
        }
        c.last_seen = Some(seen);
    }

    /// Dissolve `from` into `into`, combining centroids weighted by member count.
    pub(crate) fn merge(&mut self, into: ClusterId, from: ClusterId) {
        let (src_centroid, src_count, src_seen) = {
            let src = &self.clusters[from.index()];
            (src.centroid.clone(), src.member_count, src.last_seen)
        };
        let dst = &mut self.clusters[into.index()];
        let (wa, wb) = (dst.member_count as f32, src_count as f32);
        let total = (wa + wb).max(1.0);
        for (d, s) in dst.centroid.iter_mut().zip(&src_centroid) {
            *d = (*d * wa + *s * wb) / total;
        }
        dst.member_count = dst.member_count.saturating_add(src_count);
        dst.last_seen = dst.last_seen.max(src_seen);

        let src = &mut self.clusters[from.index()];
        src.state = ClusterState::MergedInto(into);
        src.centroid.clear();
        src.member_count = 0;
    }
}

#[cfg(test)]
#[path = "../../tests/unit/identity/store.rs"]
mod tests;
