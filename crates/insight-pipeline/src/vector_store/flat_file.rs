//! On-disk format for the flat vector store.
//!
//! Two artifacts are written together after every committed batch:
//!
//! `index.bin`
//! - magic: `[u8; 4]` (`IFLT`)
//! - version: u16 (little-endian)
//! - dimension: u32 (little-endian)
//! - slot_count: u64 (little-endian)
//! - header checksum: u32 (CRC32 of the fields above)
//! - body: `slot_count × dimension` f32 (little-endian), slot order
//! - body checksum: u32 (CRC32 of the body bytes)
//!
//! `mapping.json`
//! - `{ version, dimension, next_slot, points: [{ slot, point_id, payload }] }`
//!
//! Each file is written to a temp file in the same directory and renamed into
//! place. A crash between the two renames can leave a mismatched pair. On load
//! such a pair is moved aside (`*.stale`) and the store starts empty, so the
//! lost points come back with the next ingestion run.

use std::collections::HashMap;
use std::fs::File;
use std::io::{BufReader, BufWriter, Read, Write};
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tempfile::NamedTempFile;
use uuid::Uuid;

use super::flat::{FlatState, SlotEntry};
use crate::error::PipelineError;
use crate::types::FeedbackPayload;

const INDEX_FILE: &str = "index.bin";
const MAPPING_FILE: &str = "mapping.json";
const STALE_SUFFIX: &str = "stale";

const MAGIC: [u8; 4] = *b"IFLT";
const FORMAT_VERSION: u16 = 1;
/// magic(4) + version(2) + dimension(4) + slot_count(8)
const HEADER_FIELDS: usize = 18;
const HEADER_SIZE: usize = HEADER_FIELDS + 4;

#[derive(Debug, Serialize, Deserialize)]
struct Mapping {
    version: u16,
    dimension: usize,
    next_slot: usize,
    points: Vec<MappedPoint>,
}

#[derive(Debug, Serialize, Deserialize)]
struct MappedPoint {
    slot: usize,
    point_id: Uuid,
    payload: FeedbackPayload,
}

/// Locations of the two artifacts for one store directory.
#[derive(Debug, Clone)]
pub(super) struct FlatFiles {
    dir: PathBuf,
}

impl FlatFiles {
    pub(super) fn new(dir: PathBuf) -> Self {
        Self { dir }
    }

    pub(super) fn dir(&self) -> &Path {
        &self.dir
    }

    fn index_path(&self) -> PathBuf {
        self.dir.join(INDEX_FILE)
    }

    fn mapping_path(&self) -> PathBuf {
        self.dir.join(MAPPING_FILE)
    }

    /// Load both artifacts. `Ok(None)` when either one is absent.
    pub(super) fn load(&self, expected_dimension: usize) -> Result<Option<FlatState>, PipelineError> {
        let index_path = self.index_path();
        let mapping_path = self.mapping_path();
        match (index_path.exists(), mapping_path.exists()) {
            (true, true) => {}
            (false, false) => return Ok(None),
            (index, mapping) => {
                tracing::warn!(
                    dir = %self.dir.display(),
                    index,
                    mapping,
                    "flat index artifacts incomplete, starting with an empty store"
                );
                return Ok(None);
            }
        }

        let (dimension, vectors) = read_index(&index_path)?;
        if dimension != expected_dimension {
            return Err(PipelineError::DimensionMismatch {
                expected: expected_dimension,
                got: dimension,
            });
        }

        let mapping: Mapping = serde_json::from_reader(BufReader::new(File::open(&mapping_path)?))
            .map_err(|e| PipelineError::CorruptIndex(format!("{MAPPING_FILE}: {e}")))?;
        if mapping.version > FORMAT_VERSION {
            return Err(PipelineError::CorruptIndex(format!(
                "{MAPPING_FILE}: unsupported version {}",
                mapping.version
            )));
        }
        if mapping.dimension != dimension {
            return self.set_aside(&format!(
                "{MAPPING_FILE} dimension {} disagrees with {INDEX_FILE} dimension {dimension}",
                mapping.dimension
            ));
        }

        let slot_count = vectors.len() / dimension;
        if mapping.next_slot != slot_count || mapping.points.len() != slot_count {
            return self.set_aside(&format!(
                "{MAPPING_FILE} lists {} points with next_slot {}, {INDEX_FILE} holds {slot_count} slots",
                mapping.points.len(),
                mapping.next_slot
            ));
        }

        let mut slots: Vec<Option<SlotEntry>> = vec![None; slot_count];
        let mut by_id = HashMap::with_capacity(slot_count);
        for point in mapping.points {
            let Some(cell) = slots.get_mut(point.slot) else {
                return Err(PipelineError::CorruptIndex(format!(
                    "slot {} out of range",
                    point.slot
                )));
            };
            if cell.is_some() || by_id.insert(point.point_id, point.slot).is_some() {
                return Err(PipelineError::CorruptIndex(format!(
                    "duplicate slot {} or point {}",
                    point.slot, point.point_id
                )));
            }
            *cell = Some(SlotEntry {
                point_id: point.point_id,
                payload: point.payload,
            });
        }
        // Every cell is filled: the count matched and duplicates were rejected.
        let slots: Vec<SlotEntry> = slots.into_iter().flatten().collect();

        Ok(Some(FlatState {
            dimension,
            vectors,
            slots,
            by_id,
            next_slot: mapping.next_slot,
        }))
    }

    /// Rename a mismatched artifact pair to `*.stale` and report an empty store.
    fn set_aside(&self, reason: &str) -> Result<Option<FlatState>, PipelineError> {
        let index_path = self.index_path();
        let mapping_path = self.mapping_path();
        std::fs::rename(&index_path, index_path.with_extension(STALE_SUFFIX))?;
        std::fs::rename(&mapping_path, mapping_path.with_extension(STALE_SUFFIX))?;
        tracing::warn!(
            dir = %self.dir.display(),
            reason,
            "flat index artifacts out of sync, moved aside and starting with an empty store"
        );
        Ok(None)
    }

    /// Write both artifacts, index first.
    pub(super) fn save(&self, state: &FlatState) -> Result<(), PipelineError> {
        let mut index_tmp = NamedTempFile::new_in(&self.dir)?;
        write_index(index_tmp.as_file_mut(), state)?;
        index_tmp.as_file().sync_all()?;

        let mapping = Mapping {
            version: FORMAT_VERSION,
            dimension: state.dimension,
            next_slot: state.next_slot,
            points: state
                .slots
                .iter()
                .enumerate()
                .map(|(slot, entry)| MappedPoint {
                    slot,
                    point_id: entry.point_id,
                    payload: entry.payload.clone(),
                })
                .collect(),
        };
        let mut mapping_tmp = NamedTempFile::new_in(&self.dir)?;
        {
            let mut writer = BufWriter::new(mapping_tmp.as_file_mut());
            serde_json::to_writer(&mut writer, &mapping)?;
            writer.flush()?;
        }
        mapping_tmp.as_file().sync_all()?;

        index_tmp
            .persist(self.index_path())
            .map_err(|e| PipelineError::Io(e.error))?;
        mapping_tmp
            .persist(self.mapping_path())
            .map_err(|e| PipelineError::Io(e.error))?;
        Ok(())
    }
}

fn write_index(file: &mut File, state: &FlatState) -> Result<(), PipelineError> {
    let dimension = u32::try_from(state.dimension)
        .map_err(|_| PipelineError::Configuration("dimension exceeds u32".to_string()))?;
    let slot_count = state.slots.len() as u64;

    let mut header = [0u8; HEADER_SIZE];
    header[0..4].copy_from_slice(&MAGIC);
    header[4..6].copy_from_slice(&FORMAT_VERSION.to_le_bytes());
    header[6..10].copy_from_slice(&dimension.to_le_bytes());
    header[10..18].copy_from_slice(&slot_count.to_le_bytes());
    let checksum = crc32fast::hash(&header[..HEADER_FIELDS]);
    header[HEADER_FIELDS..].copy_from_slice(&checksum.to_le_bytes());

    let mut writer = BufWriter::new(file);
    writer.write_all(&header)?;
    let mut hasher = crc32fast::Hasher::new();
    for value in &state.vectors {
        let bytes = value.to_le_bytes();
        hasher.update(&bytes);
        writer.write_all(&bytes)?;
    }
    writer.write_all(&hasher.finalize().to_le_bytes())?;
    writer.flush()?;
    Ok(())
}

fn read_index(path: &Path) -> Result<(usize, Vec<f32>), PipelineError> {
    let mut reader = BufReader::new(File::open(path)?);

    let mut header = [0u8; HEADER_SIZE];
    reader
        .read_exact(&mut header)
        .map_err(|e| PipelineError::CorruptIndex(format!("{INDEX_FILE} header: {e}")))?;
    if header[0..4] != MAGIC {
        return Err(PipelineError::CorruptIndex(format!(
            "{INDEX_FILE}: bad magic"
        )));
    }
    let stored = u32::from_le_bytes([header[18], header[19], header[20], header[21]]);
    if stored != crc32fast::hash(&header[..HEADER_FIELDS]) {
        return Err(PipelineError::CorruptIndex(format!(
            "{INDEX_FILE}: header checksum mismatch"
        )));
    }
    let version = u16::from_le_bytes([header[4], header[5]]);
    if version > FORMAT_VERSION {
        return Err(PipelineError::CorruptIndex(format!(
            "{INDEX_FILE}: unsupported version {version}"
        )));
    }
    let dimension = u32::from_le_bytes([header[6], header[7], header[8], header[9]]) as usize;
    let slot_count = u64::from_le_bytes([
        header[10], header[11], header[12], header[13], header[14], header[15], header[16],
        header[17],
    ]);
    let values = usize::try_from(slot_count)
        .ok()
        .and_then(|n| n.checked_mul(dimension))
        .ok_or_else(|| PipelineError::CorruptIndex(format!("{INDEX_FILE}: slot count overflow")))?;

    let mut body = vec![0u8; values * 4];
    reader
        .read_exact(&mut body)
        .map_err(|e| PipelineError::CorruptIndex(format!("{INDEX_FILE} body: {e}")))?;
    let mut trailer = [0u8; 4];
    reader
        .read_exact(&mut trailer)
        .map_err(|e| PipelineError::CorruptIndex(format!("{INDEX_FILE} trailer: {e}")))?;
    if u32::from_le_bytes(trailer) != crc32fast::hash(&body) {
        return Err(PipelineError::CorruptIndex(format!(
            "{INDEX_FILE}: body checksum mismatch"
        )));
    }

    let vectors = body
        .chunks_exact(4)
        .map(|b| f32::from_le_bytes([b[0], b[1], b[2], b[3]]))
        .collect();
    Ok((dimension, vectors))
}
