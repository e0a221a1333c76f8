//! Vector utilities shared by the index and its persistence layer.
//!
//! - [`cosine_similarity`]: ranking metric used by the index
//! - [`vec_to_blob`] / [`blob_to_vec`]: bit-exact little-endian `f32`
//!   encoding used when the index is written to disk
//!
//! Embedding providers themselves live in the `lexrag` application crate.

/// Compute cosine similarity between two vectors.
///
/// ```text
///            a · b
/// cos(θ) = ─────────
///          ‖a‖ × ‖b‖
/// ```
///
/// Returns `0.0` instead of `NaN` when either vector has zero norm, and for
/// empty or differently sized inputs. A zero-norm vector therefore ranks
/// below any positively correlated entry and ties with orthogonal ones.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }

    // f64 accumulation keeps very small components from underflowing to a
    // zero norm.
    let mut dot = 0.0f64;
    let mut norm_a = 0.0f64;
    let mut norm_b = 0.0f64;
    for (&x, &y) in a.iter().zip(b) {
        let (x, y) = (f64::from(x), f64::from(y));
        dot += x * y;
        norm_a += x * x;
        norm_b += y * y;
    }

    let denom = norm_a.sqrt() * norm_b.sqrt();
    if denom == 0.0 || !denom.is_finite() {
        return 0.0;
    }
    let sim = (dot / denom) as f32;
    if sim.is_nan() {
        0.0
    } else {
        sim
    }
}

/// Encode a vector as little-endian `f32` bytes (`4 × len` bytes).
///
/// ```rust
/// use lexrag_core::embedding::{blob_to_vec, vec_to_blob};
///
/// let v = vec![1.0f32, -2.5, 3.125];
/// let blob = vec_to_blob(&v);
/// assert_eq!(blob.len(), 12);
/// assert_eq!(blob_to_vec(&blob), Some(v));
/// ```
pub fn vec_to_blob(vec: &[f32]) -> Vec<u8> {
    vec.iter().flat_map(|v| v.to_le_bytes()).collect()
}

/// Decode bytes produced by [`vec_to_blob`].
///
/// Returns `None` when the length is not a multiple of four, which the
/// persistence layer reports as a corrupt index.
pub fn blob_to_vec(blob: &[u8]) -> Option<Vec<f32>> {
    if blob.len() % 4 != 0 {
        return None;
    }
    Some(
        blob.chunks_exact(4)
            .map(|b| f32::from_le_bytes([b[0], b[1], b[2], b[3]]))
            .collect(),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cosine_identical() {
        let v = [1.0, 2.0, 3.0];
        assert!((cosine_similarity(&v, &v) - 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_cosine_orthogonal_and_opposite() {
        assert!(cosine_similarity(&[1.0, 0.0], &[0.0, 1.0]).abs() < 1e-6);
        assert!((cosine_similarity(&[1.0, 0.0], &[-3.0, 0.0]) + 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_cosine_zero_norm_is_zero_not_nan() {
        let sim = cosine_similarity(&[0.0, 0.0, 0.0], &[1.0, 2.0, 3.0]);
        assert_eq!(sim, 0.0);
        assert_eq!(cosine_similarity(&[0.0; 4], &[0.0; 4]), 0.0);
    }

    #[test]
    fn test_cosine_small_vectors_are_not_zeroed() {
        let a = [1e-4f32, 0.0];
        let b = [2e-4f32, 0.0];
        assert!((cosine_similarity(&a, &b) - 1.0).abs() < 1e-6);

        let tiny = [1e-20f32, 1e-20];
        assert!((cosine_similarity(&tiny, &tiny) - 1.0).abs() < 1e-6);
        assert!(cosine_similarity(&tiny, &[-1e-20, -1e-20]) < -0.999);
    }

    #[test]
    fn test_cosine_mismatched_lengths() {
        assert_eq!(cosine_similarity(&[1.0, 2.0], &[1.0]), 0.0);
        assert_eq!(cosine_similarity(&[], &[]), 0.0);
    }

    #[test]
    fn test_blob_preserves_bits() {
        let v = vec![0.1f32, -0.0, f32::MIN_POSITIVE, 1e30, -7.25];
        let back = blob_to_vec(&vec_to_blob(&v)).unwrap();
        let bits = |xs: &[f32]| xs.iter().map(|x| x.to_bits()).collect::<Vec<_>>();
        assert_eq!(bits(&back), bits(&v));
    }

    #[test]
    fn test_blob_rejects_truncated_input() {
        assert_eq!(blob_to_vec(&[0, 0, 128]), None);
        assert_eq!(blob_to_vec(&[]), Some(vec![]));
    }
}
