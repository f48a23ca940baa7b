use tracing::warn;

/// Arithmetic mean of a set of vectors, per dimension.
///
/// The output dimension is taken from the first vector. Vectors of any other
/// length are skipped with a warning. An empty input yields an empty vector;
/// a single input yields an independent copy of it.
pub fn calculate_centroid<V: AsRef<[f32]>>(embeddings: &[V]) -> Vec<f32> {
    let Some(first) = embeddings.first() else {
        return Vec::new();
    };
    let first = first.as_ref();
    if embeddings.len() == 1 {
        return first.to_vec();
    }

    let dim = first.len();
    let mut sum = vec![0.0f64; dim];
    let mut count = 0usize;
    for (i, emb) in embeddings.iter().enumerate() {
        let emb = emb.as_ref();
        if emb.len() != dim {
            warn!(index = i, got = emb.len(), want = dim, "vecmath: skipping vector with mismatched dimension");
            continue;
        }
        for (s, &x) in sum.iter_mut().zip(emb) {
            *s += x as f64;
        }
        count += 1;
    }

    let n = count as f64;
    sum.into_iter().map(|s| (s / n) as f32).collect()
}

/// Fold one more vector into a running mean.
///
/// `new_i = (old_i * old_count + new_i) / (old_count + 1)`.
///
/// With `old_count == 0` or an empty `old_centroid`, the result is a copy of
/// `new_embedding`. A dimension mismatch also returns a copy of
/// `new_embedding`, discarding the accumulated centroid.
pub fn calculate_weighted_centroid(
    old_centroid: &[f32],
    old_count: usize,
    new_embedding: &[f32],
) -> Vec<f32> {
    if old_count == 0 || old_centroid.is_empty() {
        return new_embedding.to_vec();
    }
    if old_centroid.len() != new_embedding.len() {
        // FIXME: drops the cluster's accumulated history instead of failing.
        warn!(
            got = new_embedding.len(),
            want = old_centroid.len(),
            "vecmath: centroid dimension mismatch, resetting to new embedding"
        );
        return new_embedding.to_vec();
    }

    let n = old_count as f64;
    old_centroid
        .iter()
        .zip(new_embedding)
        .map(|(&c, &e)| ((c as f64 * n + e as f64) / (n + 1.0)) as f32)
        .collect()
}
