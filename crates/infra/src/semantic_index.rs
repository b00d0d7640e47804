//! Nearest-neighbour retrieval over inventory item descriptions.
//!
//! The index only knows item ids and vectors; stock figures are read from the
//! ledger when hits are turned into [`RetrievedCandidate`]s, so a stale index
//! can never report stale quantities.
//!
//! Production wiring embeds with [`crate::embedder::SentenceEmbedder`].

use std::sync::Arc;

use thiserror::Error;
use tracing::{debug, warn};

use relief_core::{ItemId, RetrievedCandidate};
use relief_inventory::InventoryLedger;

#[derive(Debug, Error, PartialEq)]
pub enum IndexError {
    #[error("embedding dimension mismatch: index is {expected}, vector is {got}")]
    DimensionMismatch { expected: usize, got: usize },

    #[error("embedding failed: {0}")]
    Embedding(String),

    #[error("failed to load embedding model {model}: {reason}")]
    Model { model: String, reason: String },
}

/// One search result: which item, and how far it is from the query.
///
/// `distance` is ordering information only (smaller is closer).
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct IndexHit {
    pub item_id: ItemId,
    pub distance: f32,
}

pub trait Embedder: Send + Sync {
    fn dimension(&self) -> usize;

    fn embed(&self, text: &str) -> Result<Vec<f32>, IndexError>;

    fn embed_batch(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>, IndexError> {
        texts.iter().map(|t| self.embed(t)).collect()
    }
}

impl<E> Embedder for Arc<E>
where
    E: Embedder + ?Sized,
{
    fn dimension(&self) -> usize {
        (**self).dimension()
    }

    fn embed(&self, text: &str) -> Result<Vec<f32>, IndexError> {
        (**self).embed(text)
    }

    fn embed_batch(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>, IndexError> {
        (**self).embed_batch(texts)
    }
}

pub trait SemanticIndex: Send + Sync {
    /// Up to `k` hits ordered by ascending distance; `k` is clamped to the index size.
    fn search(&self, query: &str, k: usize) -> Result<Vec<IndexHit>, IndexError>;

    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Lexical test double: signed feature hashing of word tokens and character
/// trigrams, L2-normalised. Deterministic and offline, but not semantic.
#[cfg(any(test, feature = "test-util"))]
#[derive(Debug, Copy, Clone)]
pub struct HashingEmbedder {
    dimension: usize,
}

#[cfg(any(test, feature = "test-util"))]
impl Default for HashingEmbedder {
    fn default() -> Self {
        Self {
            dimension: crate::embedder::EMBEDDING_DIM,
        }
    }
}

#[cfg(any(test, feature = "test-util"))]
impl HashingEmbedder {
    pub fn new(dimension: usize) -> Self {
        Self {
            dimension: dimension.max(1),
        }
    }

    fn add(&self, v: &mut [f32], feature: &str, weight: f32) {
        let h = fnv1a(feature.as_bytes());
        let slot = (h % self.dimension as u64) as usize;
        let sign = if h & (1 << 63) == 0 { 1.0 } else { -1.0 };
        v[slot] += sign * weight;
    }
}

#[cfg(any(test, feature = "test-util"))]
impl Embedder for HashingEmbedder {
    fn dimension(&self) -> usize {
        self.dimension
    }

    fn embed(&self, text: &str) -> Result<Vec<f32>, IndexError> {
        let mut v = vec![0.0f32; self.dimension];
        let lowered = text.to_lowercase();

        for token in lowered.split(|c: char| !c.is_alphanumeric()).filter(|t| !t.is_empty()) {
            self.add(&mut v, token, 1.0);

            let padded: Vec<char> = format!("#{token}#").chars().collect();
            for window in padded.windows(3) {
                let gram: String = window.iter().collect();
                self.add(&mut v, &gram, 0.5);
            }
        }

        let norm = v.iter().map(|x| x * x).sum::<f32>().sqrt();
        if norm > 0.0 {
            v.iter_mut().for_each(|x| *x /= norm);
        }
        Ok(v)
    }
}

#[cfg(any(test, feature = "test-util"))]
fn fnv1a(bytes: &[u8]) -> u64 {
    const FNV_OFFSET: u64 = 0xcbf2_9ce4_8422_2325;
    const FNV_PRIME: u64 = 0x0000_0100_0000_01b3;
    bytes
        .iter()
        .fold(FNV_OFFSET, |h, b| (h ^ u64::from(*b)).wrapping_mul(FNV_PRIME))
}

/// Exhaustive squared-L2 index. Row order follows the ledger's id map, and ties
/// keep that order.
pub struct FlatL2Index<E> {
    embedder: E,
    rows: Vec<(ItemId, Vec<f32>)>,
}

impl<E: Embedder> FlatL2Index<E> {
    pub fn new(embedder: E) -> Self {
        Self {
            embedder,
            rows: Vec::new(),
        }
    }

    /// Embed every ledger item in one batch, in `id_map` order.
    pub fn build(embedder: E, ledger: &InventoryLedger) -> Result<Self, IndexError> {
        let mut index = Self::new(embedder);
        let (ids, texts): (Vec<ItemId>, Vec<String>) = ledger
            .id_map()
            .iter()
            .filter_map(|id| ledger.get_by_id(*id).map(|item| (*id, item.search_text())))
            .unzip();

        let refs: Vec<&str> = texts.iter().map(String::as_str).collect();
        let vectors = index.embedder.embed_batch(&refs)?;
        for (item_id, vector) in ids.into_iter().zip(vectors) {
            index.push(item_id, vector)?;
        }
        debug!(rows = index.rows.len(), "semantic index built");
        Ok(index)
    }

    pub fn insert(&mut self, item_id: ItemId, text: &str) -> Result<(), IndexError> {
        let vector = self.embedder.embed(text)?;
        self.push(item_id, vector)
    }

    fn push(&mut self, item_id: ItemId, vector: Vec<f32>) -> Result<(), IndexError> {
        if vector.len() != self.embedder.dimension() {
            return Err(IndexError::DimensionMismatch {
                expected: self.embedder.dimension(),
                got: vector.len(),
            });
        }
        self.rows.push((item_id, vector));
        Ok(())
    }
}

impl<E: Embedder> SemanticIndex for FlatL2Index<E> {
    fn search(&self, query: &str, k: usize) -> Result<Vec<IndexHit>, IndexError> {
        let k = k.min(self.rows.len());
        if k == 0 {
            return Ok(Vec::new());
        }

        let q = self.embedder.embed(query)?;
        let mut hits: Vec<IndexHit> = self
            .rows
            .iter()
            .map(|(item_id, v)| IndexHit {
                item_id: *item_id,
                distance: q.iter().zip(v).map(|(a, b)| (a - b) * (a - b)).sum(),
            })
            .collect();

        hits.sort_by(|a, b| a.distance.total_cmp(&b.distance));
        hits.truncate(k);
        Ok(hits)
    }

    fn len(&self) -> usize {
        self.rows.len()
    }
}

/// Join index hits with live ledger stock. Hits for ids the ledger no longer
/// knows are skipped.
pub fn candidates_from_hits(ledger: &InventoryLedger, hits: &[IndexHit]) -> Vec<RetrievedCandidate> {
    hits.iter()
        .filter_map(|hit| match ledger.get_by_id(hit.item_id) {
            Some(item) => Some(item.to_candidate(hit.distance)),
            None => {
                warn!(item_id = %hit.item_id, "index hit has no ledger item");
                None
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use relief_inventory::InventoryItem;
    use relief_core::Category;

    fn index() -> (InventoryLedger, FlatL2Index<HashingEmbedder>) {
        index_for(&InventoryLedger::relief_defaults())
    }

    fn index_for(ledger: &InventoryLedger) -> (InventoryLedger, FlatL2Index<HashingEmbedder>) {
        let index = FlatL2Index::build(HashingEmbedder::default(), ledger).unwrap();
        (ledger.clone(), index)
    }

    #[test]
    fn embeddings_are_unit_length_and_deterministic() {
        let e = HashingEmbedder::default();
        let a = e.embed("Water Bottles water emergency relief supply").unwrap();
        let b = e.embed("Water Bottles water emergency relief supply").unwrap();
        assert_eq!(a, b);
        let norm: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
        assert!((norm - 1.0).abs() < 1e-5);
    }

    #[test]
    fn results_are_sorted_and_clamped() {
        let (_, index) = index();
        let hits = index.search("disaster relief emergency: people need water", 50).unwrap();
        assert_eq!(hits.len(), 10);
        assert!(hits.windows(2).all(|w| w[0].distance <= w[1].distance));
    }

    #[test]
    fn obvious_query_ranks_matching_item_first() {
        let (ledger, index) = index();
        let hits = index.search("disaster relief emergency: we need tents", 3).unwrap();
        let first = ledger.get_by_id(hits[0].item_id).unwrap();
        assert_eq!(first.name(), "Tents");
    }

    #[test]
    fn empty_inventory_yields_no_hits() {
        let ledger = InventoryLedger::new(Vec::new()).unwrap();
        let index = FlatL2Index::build(HashingEmbedder::default(), &ledger).unwrap();
        assert!(index.is_empty());
        assert!(index.search("anything", 5).unwrap().is_empty());
    }

    /// Returns vectors of the wrong width.
    struct NarrowEmbedder;

    impl Embedder for NarrowEmbedder {
        fn dimension(&self) -> usize {
            4
        }

        fn embed(&self, _text: &str) -> Result<Vec<f32>, IndexError> {
            Ok(vec![0.5; 3])
        }
    }

    #[test]
    fn wrong_width_vectors_are_rejected() {
        let ledger = InventoryLedger::relief_defaults();
        let err = FlatL2Index::build(NarrowEmbedder, &ledger).err().unwrap();
        assert_eq!(err, IndexError::DimensionMismatch { expected: 4, got: 3 });
    }

    #[test]
    fn shared_embedder_behind_arc_builds_the_same_index() {
        let ledger = InventoryLedger::relief_defaults();
        let shared: Arc<dyn Embedder> = Arc::new(HashingEmbedder::default());
        let index = FlatL2Index::build(shared, &ledger).unwrap();
        let (_, direct) = index_for(&ledger);
        assert_eq!(
            index.search("water", 3).unwrap(),
            direct.search("water", 3).unwrap()
        );
    }

    #[test]
    fn zero_k_yields_no_hits() {
        let (_, index) = index();
        assert!(index.search("water", 0).unwrap().is_empty());
    }

    #[test]
    fn candidates_carry_live_stock() {
        let mut ledger = InventoryLedger::new(vec![
            InventoryItem::new(ItemId::new(1), "Blankets", 80, Category::Shelter).unwrap(),
        ])
        .unwrap();
        let index = FlatL2Index::build(HashingEmbedder::default(), &ledger).unwrap();

        ledger.decrement("Blankets", 30).unwrap();
        let hits = index.search("blankets", 1).unwrap();
        let candidates = candidates_from_hits(&ledger, &hits);
        assert_eq!(candidates[0].quantity, 50);

        let orphan = [IndexHit { item_id: ItemId::new(99), distance: 0.0 }];
        assert!(candidates_from_hits(&ledger, &orphan).is_empty());
    }
}
