use crate::similarity::cosine_similarity;

/// Anything that can be matched by centroid.
pub trait HasCentroid {
    fn id(&self) -> &str;
    fn centroid(&self) -> &[f32];
}

/// Result of [`find_best_cluster`].
#[derive(Debug, Clone, PartialEq)]
pub struct BestMatch {
    /// Id of the best candidate, or None if nothing scored above 0.
    pub cluster_id: Option<String>,

    /// Position of the best candidate in the input slice.
    pub index: Option<usize>,

    /// Cosine similarity to the best candidate (0 if none).
    pub similarity: f32,
}

impl BestMatch {
    fn none() -> Self {
        Self {
            cluster_id: None,
            index: None,
            similarity: 0.0,
        }
    }
}

/// Linear scan for the candidate whose centroid is most similar to
/// `embedding`.
///
/// Candidates with an empty centroid are skipped. The best match is replaced
/// only on a strict improvement, starting from a baseline of 0, so a
/// candidate must score above 0 to be chosen and ties keep the earliest one.
pub fn find_best_cluster<C: HasCentroid>(embedding: &[f32], clusters: &[C]) -> BestMatch {
    let mut best = BestMatch::none();
    for (i, c) in clusters.iter().enumerate() {
        let centroid = c.centroid();
        if centroid.is_empty() {
            continue;
        }
        let sim = cosine_similarity(embedding, centroid);
        if sim > best.similarity {
            best.similarity = sim;
            best.index = Some(i);
        }
    }
    if let Some(i) = best.index {
        best.cluster_id = Some(clusters[i].id().to_string());
    }
    best
}
