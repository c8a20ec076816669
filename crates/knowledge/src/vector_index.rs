//! Append-only vector index over normalized embeddings.
//!
//! Similarity is the inner product, which equals cosine similarity for unit
//! vectors. Positions are assigned in insertion order and are the only link
//! between a vector and its metadata, so the index never deletes in place:
//! removing anything means [`FlatIndex::rebuild`].

use ragdex_core::{AppError, AppResult};

const MAGIC: &[u8; 4] = b"RDXV";
const FORMAT_VERSION: u32 = 1;
const HEADER_LEN: usize = 4 + 4 + 4 + 8;

/// Exact (brute-force) inner-product index.
#[derive(Debug, Clone, PartialEq)]
pub struct FlatIndex {
    dimension: usize,
    /// Row-major, `len() * dimension` values
    data: Vec<f32>,
}

impl FlatIndex {
    /// Create an empty index for vectors of `dimension` values.
    pub fn new(dimension: usize) -> Self {
        Self {
            dimension,
            data: Vec::new(),
        }
    }

    pub fn dimension(&self) -> usize {
        self.dimension
    }

    /// Number of stored vectors.
    pub fn len(&self) -> usize {
        self.data.len() / self.dimension
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    fn check_dimension(&self, vector: &[f32]) -> AppResult<()> {
        if vector.len() != self.dimension {
            return Err(AppError::DimensionMismatch {
                expected: self.dimension,
                actual: vector.len(),
            });
        }
        Ok(())
    }

    /// Append vectors; they take positions `len()..len() + vectors.len()`.
    ///
    /// Validation happens before anything is written, so a bad vector leaves
    /// the index unchanged.
    pub fn add(&mut self, vectors: &[Vec<f32>]) -> AppResult<()> {
        for vector in vectors {
            self.check_dimension(vector)?;
        }

        self.data.reserve(vectors.len() * self.dimension);
        for vector in vectors {
            self.data.extend_from_slice(vector);
        }
        Ok(())
    }

    /// Replace the entire contents.
    pub fn rebuild(&mut self, vectors: &[Vec<f32>]) -> AppResult<()> {
        let mut fresh = FlatIndex::new(self.dimension);
        fresh.add(vectors)?;
        *self = fresh;
        Ok(())
    }

    /// Vector stored at `position`.
    pub fn vector(&self, position: usize) -> Option<&[f32]> {
        let start = position.checked_mul(self.dimension)?;
        self.data.get(start..start + self.dimension)
    }

    /// Up to `k` nearest neighbours as `(score, position)`.
    ///
    /// Ordered by descending score; equal scores keep the earlier position
    /// first.
    pub fn search(&self, query: &[f32], k: usize) -> AppResult<Vec<(f32, usize)>> {
        self.check_dimension(query)?;
        if k == 0 || self.is_empty() {
            return Ok(Vec::new());
        }

        let mut scored: Vec<(f32, usize)> = self
            .data
            .chunks_exact(self.dimension)
            .enumerate()
            .map(|(position, row)| {
                let score: f32 = row.iter().zip(query).map(|(a, b)| a * b).sum();
                // NaN ranks below every real score.
                let score = if score.is_nan() { f32::NEG_INFINITY } else { score };
                (score, position)
            })
            .collect();

        scored.sort_by(|a, b| b.0.total_cmp(&a.0).then(a.1.cmp(&b.1)));
        scored.truncate(k);

        Ok(scored)
    }

    /// Serialize as `RDXV | version | dim | count | f32 LE data`.
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut bytes = Vec::with_capacity(HEADER_LEN + self.data.len() * 4);
        bytes.extend_from_slice(MAGIC);
        bytes.extend_from_slice(&FORMAT_VERSION.to_le_bytes());
        bytes.extend_from_slice(&(self.dimension as u32).to_le_bytes());
        bytes.extend_from_slice(&(self.len() as u64).to_le_bytes());
        for value in &self.data {
            bytes.extend_from_slice(&value.to_le_bytes());
        }
        bytes
    }

    /// Parse bytes produced by [`to_bytes`](FlatIndex::to_bytes).
    pub fn from_bytes(bytes: &[u8]) -> AppResult<Self> {
        let corrupt = |msg: &str| AppError::SnapshotCorrupt(format!("vector index: {}", msg));

        if bytes.len() < HEADER_LEN || &bytes[0..4] != MAGIC {
            return Err(corrupt("missing header"));
        }

        let read_u32 = |at: usize| {
            u32::from_le_bytes([bytes[at], bytes[at + 1], bytes[at + 2], bytes[at + 3]])
        };
        let version = read_u32(4);
        if version != FORMAT_VERSION {
            return Err(corrupt(&format!("unsupported version {}", version)));
        }
        let dimension = read_u32(8) as usize;
        if dimension == 0 {
            return Err(corrupt("zero dimension"));
        }
        let mut count_bytes = [0u8; 8];
        count_bytes.copy_from_slice(&bytes[12..20]);
        let count = u64::from_le_bytes(count_bytes) as usize;

        let body = &bytes[HEADER_LEN..];
        let expected = count
            .checked_mul(dimension)
            .and_then(|n| n.checked_mul(4))
            .ok_or_else(|| corrupt("size overflow"))?;
        if body.len() != expected {
            return Err(corrupt(&format!(
                "expected {} data bytes, found {}",
                expected,
                body.len()
            )));
        }

        let data = body
            .chunks_exact(4)
            .map(|c| f32::from_le_bytes([c[0], c[1], c[2], c[3]]))
            .collect();

        Ok(Self { dimension, data })
    }
}
