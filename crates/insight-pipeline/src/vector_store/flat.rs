//! Flat in-process index with a payload side table.
//!
//! Vectors are L2-normalized on insert, so ranking is a plain inner product.
//! There is no native filtering: scoped searches post-filter a candidate
//! window that starts at `4·k` and doubles until `k` hits are found or the
//! index is exhausted.

use std::cmp::Ordering;
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::{Arc, RwLock};

use async_trait::async_trait;
use uuid::Uuid;

use super::flat_file::FlatFiles;
use super::{check_vector, normalized, VectorStore};
use crate::error::PipelineError;
use crate::types::{FeedbackPayload, IndexedPoint, ScoredPoint, SearchFilter};

const CANDIDATE_MULTIPLIER: usize = 4;

#[derive(Debug, Clone, PartialEq)]
pub(super) struct SlotEntry {
    pub(super) point_id: Uuid,
    pub(super) payload: FeedbackPayload,
}

/// Everything the store knows. Cloned for staging, swapped in whole.
#[derive(Debug, Clone, PartialEq)]
pub(super) struct FlatState {
    pub(super) dimension: usize,
    /// Slot-major, `slots.len() × dimension` unit vectors.
    pub(super) vectors: Vec<f32>,
    pub(super) slots: Vec<SlotEntry>,
    pub(super) by_id: HashMap<Uuid, usize>,
    pub(super) next_slot: usize,
}

impl FlatState {
    pub(super) fn empty(dimension: usize) -> Self {
        Self {
            dimension,
            vectors: Vec::new(),
            slots: Vec::new(),
            by_id: HashMap::new(),
            next_slot: 0,
        }
    }

    fn vector(&self, slot: usize) -> &[f32] {
        &self.vectors[slot * self.dimension..(slot + 1) * self.dimension]
    }

    fn apply(&mut self, point: IndexedPoint) {
        let unit = normalized(&point.embedding);
        let entry = SlotEntry {
            point_id: point.point_id,
            payload: point.payload,
        };
        if let Some(&slot) = self.by_id.get(&point.point_id) {
            let start = slot * self.dimension;
            self.vectors[start..start + self.dimension].copy_from_slice(&unit);
            self.slots[slot] = entry;
        } else {
            let slot = self.next_slot;
            self.vectors.extend_from_slice(&unit);
            self.slots.push(entry);
            self.by_id.insert(point.point_id, slot);
            self.next_slot += 1;
        }
    }

    /// Slots ordered by similarity to `query` (already unit length), best first.
    fn ranked(&self, query: &[f32], limit: usize) -> Vec<(usize, f32)> {
        let mut scored: Vec<(usize, f32)> = (0..self.slots.len())
            .map(|slot| (slot, dot(query, self.vector(slot))))
            .collect();
        let by_score = |a: &(usize, f32), b: &(usize, f32)| {
            b.1.partial_cmp(&a.1)
                .unwrap_or(Ordering::Equal)
                .then(a.0.cmp(&b.0))
        };
        if limit < scored.len() {
            scored.select_nth_unstable_by(limit, by_score);
            scored.truncate(limit);
        }
        scored.sort_by(by_score);
        scored
    }

    fn search(&self, query: &[f32], k: usize, filter: Option<&SearchFilter>) -> Vec<ScoredPoint> {
        let total = self.slots.len();
        if k == 0 || total == 0 {
            return Vec::new();
        }
        let query = normalized(query);
        let to_point = |(slot, score): (usize, f32)| {
            let entry = &self.slots[slot];
            ScoredPoint {
                point_id: entry.point_id,
                score,
                payload: entry.payload.clone(),
            }
        };

        let Some(filter) = filter else {
            return self.ranked(&query, k).into_iter().map(to_point).collect();
        };

        let mut window = k.saturating_mul(CANDIDATE_MULTIPLIER).min(total);
        loop {
            let hits: Vec<(usize, f32)> = self
                .ranked(&query, window)
                .into_iter()
                .filter(|(slot, _)| filter.matches(&self.slots[*slot].payload))
                .take(k)
                .collect();
            if hits.len() >= k || window >= total {
                return hits.into_iter().map(to_point).collect();
            }
            window = window.saturating_mul(2).min(total);
        }
    }
}

fn dot(a: &[f32], b: &[f32]) -> f32 {
    a.iter().zip(b).map(|(x, y)| x * y).sum()
}

/// File-backed flat vector store.
///
/// Readers take a snapshot `Arc` under a short read lock; writers are
/// serialized by `write_gate`, stage the batch on a copy, persist it and swap
/// the copy in. No lock is held while the files are written except the gate.
pub struct FlatFileStore {
    dimension: usize,
    files: Option<FlatFiles>,
    state: RwLock<Arc<FlatState>>,
    write_gate: tokio::sync::Mutex<()>,
}

impl FlatFileStore {
    /// Open the store in `dir`, loading `index.bin` + `mapping.json` when both
    /// exist and starting empty otherwise.
    ///
    /// # Errors
    ///
    /// - [`PipelineError::DimensionMismatch`] if the persisted index was built
    ///   with a different dimension
    /// - [`PipelineError::CorruptIndex`] if the artifacts are unreadable or
    ///   disagree with each other
    /// - [`PipelineError::Io`] if the directory cannot be created or read
    pub fn open(dir: impl Into<PathBuf>, dimension: usize) -> Result<Self, PipelineError> {
        if dimension == 0 {
            return Err(PipelineError::Configuration(
                "vector store dimension must be positive".to_string(),
            ));
        }
        let files = FlatFiles::new(dir.into());
        std::fs::create_dir_all(files.dir())?;
        let state = files.load(dimension)?.unwrap_or_else(|| FlatState::empty(dimension));
        tracing::info!(
            dir = %files.dir().display(),
            dimension,
            points = state.slots.len(),
            "opened flat vector store"
        );
        Ok(Self {
            dimension,
            files: Some(files),
            state: RwLock::new(Arc::new(state)),
            write_gate: tokio::sync::Mutex::new(()),
        })
    }

    /// A store that lives only in memory and is never persisted.
    #[must_use]
    pub fn in_memory(dimension: usize) -> Self {
        Self {
            dimension,
            files: None,
            state: RwLock::new(Arc::new(FlatState::empty(dimension))),
            write_gate: tokio::sync::Mutex::new(()),
        }
    }

    fn snapshot(&self) -> Result<Arc<FlatState>, PipelineError> {
        self.state
            .read()
            .map(|guard| Arc::clone(&*guard))
            .map_err(|_| PipelineError::StoreUnavailable("flat index lock poisoned".to_string()))
    }
}

#[async_trait]
impl VectorStore for FlatFileStore {
    fn dimension(&self) -> usize {
        self.dimension
    }

    async fn upsert_many(&self, points: Vec<IndexedPoint>) -> Result<(), PipelineError> {
        for point in &points {
            check_vector(&point.embedding, self.dimension)?;
        }
        if points.is_empty() {
            return Ok(());
        }

        let _gate = self.write_gate.lock().await;
        let current = self.snapshot()?;
        let mut staged = (*current).clone();
        drop(current);
        let batch_len = points.len();
        for point in points {
            staged.apply(point);
        }

        let staged = match &self.files {
            Some(files) => {
                let files = files.clone();
                tokio::task::spawn_blocking(move || files.save(&staged).map(|()| staged))
                    .await
                    .map_err(|e| {
                        PipelineError::StoreUnavailable(format!("flat index save task failed: {e}"))
                    })?
                    .map_err(|e| {
                        PipelineError::StoreUnavailable(format!("flat index save failed: {e}"))
                    })?
            }
            None => staged,
        };

        let total = staged.slots.len();
        let mut guard = self
            .state
            .write()
            .map_err(|_| PipelineError::StoreUnavailable("flat index lock poisoned".to_string()))?;
        *guard = Arc::new(staged);
        drop(guard);

        tracing::debug!(batch = batch_len, total, "flat index batch committed");
        Ok(())
    }

    async fn search(
        &self,
        query: &[f32],
        k: usize,
        filter: Option<&SearchFilter>,
    ) -> Result<Vec<ScoredPoint>, PipelineError> {
        if query.len() != self.dimension {
            return Err(PipelineError::DimensionMismatch {
                expected: self.dimension,
                got: query.len(),
            });
        }
        let state = self.snapshot()?;
        if state.slots.is_empty() {
            return Ok(Vec::new());
        }
        check_vector(query, self.dimension)?;
        Ok(state.search(query, k, filter))
    }

    async fn count(&self) -> Result<usize, PipelineError> {
        Ok(self.snapshot()?.slots.len())
    }
}

#[cfg(test)]
#[path = "flat_test.rs"]
mod tests;
