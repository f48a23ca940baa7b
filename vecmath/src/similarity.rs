/// Compute the cosine similarity between two vectors.
///
/// Returns a value in `[-1, 1]`. Uses f64 intermediate precision.
/// Returns exactly 0.0 for dimension mismatches, empty vectors, or when
/// either vector has zero magnitude.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }

    let mut dot: f64 = 0.0;
    let mut norm_a: f64 = 0.0;
    let mut norm_b: f64 = 0.0;

    for (&x, &y) in a.iter().zip(b) {
        let ai = x as f64;
        let bi = y as f64;
        dot += ai * bi;
        norm_a += ai * ai;
        norm_b += bi * bi;
    }

    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }

    let similarity = dot / (norm_a.sqrt() * norm_b.sqrt());
    // Clamp to [-1, 1] to handle floating point errors.
    similarity.clamp(-1.0, 1.0) as f32
}

/// Compute the Euclidean distance between two vectors.
///
/// Returns `f32::INFINITY` for dimension mismatches.
pub fn euclidean_distance(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() {
        return f32::INFINITY;
    }
    let sum: f64 = a
        .iter()
        .zip(b)
        .map(|(&x, &y)| {
            let d = x as f64 - y as f64;
            d * d
        })
        .sum();
    sum.sqrt() as f32
}

/// L2 magnitude of a vector.
pub fn magnitude(v: &[f32]) -> f32 {
    v.iter()
        .map(|&x| (x as f64) * (x as f64))
        .sum::<f64>()
        .sqrt() as f32
}

/// Scale a vector to unit length.
///
/// A zero-magnitude vector is returned unchanged.
pub fn normalize_embedding(v: &[f32]) -> Vec<f32> {
    let mag = magnitude(v);
    if mag == 0.0 {
        return v.to_vec();
    }
    v.iter().map(|&x| x / mag).collect()
}
