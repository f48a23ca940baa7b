//! Similarity and centroid math over dense float32 vectors.
//!
//! Every function here is pure. Dimension mismatches never fail: they resolve
//! to defined fallback values (similarity 0, distance +inf, or a copy of the
//! newest vector for centroid updates).

pub mod centroid;
pub mod nearest;
pub mod similarity;

pub use centroid::{calculate_centroid, calculate_weighted_centroid};
pub use nearest::{BestMatch, HasCentroid, find_best_cluster};
pub use similarity::{cosine_similarity, euclidean_distance, magnitude, normalize_embedding};
