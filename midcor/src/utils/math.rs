//! Small numeric helpers shared by the correction pipeline.
//!
//! Everything here operates on plain probability vectors (slices of f64).
//! The convolution is the workhorse: natural-abundance mass distribution
//! vectors are built by repeatedly convolving per-element isotope
//! abundance vectors, and correction-matrix columns are built the same
//! way from the purity and tracer vectors.

/// Full discrete convolution of two vectors.
///
/// `(u ⊛ v)[k] = Σ_{i+j=k} u[i] * v[j]`, output length `u.len() + v.len() - 1`.
///
/// # Example
///
/// ```
/// use midcor::utils::convolve;
///
/// let u = vec![0.25, 0.75];
/// let out = convolve(&u, &u);
/// assert!((out[0] - 0.0625).abs() < 1e-12);
/// assert!((out[1] - 0.375).abs() < 1e-12);
/// assert!((out[2] - 0.5625).abs() < 1e-12);
/// ```
pub fn convolve(u: &[f64], v: &[f64]) -> Vec<f64> {
    convolve_truncated(u, v, usize::MAX)
}

/// Discrete convolution keeping only the first `limit` entries.
///
/// Mass shifts past the measurement window are unobservable, so callers
/// that build matrix columns cut the output at the window length after
/// every convolution step. Truncation must NOT fold the removed mass back
/// into lower indices, hence this is a plain prefix of the full result.
pub fn convolve_truncated(u: &[f64], v: &[f64], limit: usize) -> Vec<f64> {
    if u.is_empty() || v.is_empty() {
        return Vec::new();
    }
    let full_len = u.len() + v.len() - 1;
    let out_len = full_len.min(limit);
    let mut out = vec![0.0; out_len];
    for (i, &ui) in u.iter().enumerate() {
        if i >= out_len {
            break;
        }
        if ui == 0.0 {
            continue;
        }
        let j_max = v.len().min(out_len - i);
        for (j, &vj) in v[..j_max].iter().enumerate() {
            out[i + j] += ui * vj;
        }
    }
    out
}

/// Compensated (Neumaier) summation.
///
/// Probability vectors are compared against 1.0 with tight tolerances, so
/// the naive running sum is not good enough for long vectors.
pub fn fsum(values: &[f64]) -> f64 {
    let mut sum = 0.0;
    let mut compensation = 0.0;
    for &value in values {
        let t = sum + value;
        if sum.abs() >= value.abs() {
            compensation += (sum - t) + value;
        } else {
            compensation += (value - t) + sum;
        }
        sum = t;
    }
    sum + compensation
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_convolve_lengths() {
        let u = vec![1.0];
        let v = vec![0.5, 0.5];
        assert_eq!(convolve(&u, &v), vec![0.5, 0.5]);
        assert_eq!(convolve(&v, &v).len(), 3);
    }

    #[test]
    fn test_convolve_commutes() {
        let u = vec![0.9, 0.08, 0.02];
        let v = vec![0.7, 0.3];
        let uv = convolve(&u, &v);
        let vu = convolve(&v, &u);
        for (a, b) in uv.iter().zip(vu.iter()) {
            assert!((a - b).abs() < 1e-15);
        }
    }

    #[test]
    fn test_convolve_preserves_mass() {
        let u = vec![0.9893, 0.0107];
        let mut acc = vec![1.0];
        for _ in 0..6 {
            acc = convolve(&acc, &u);
        }
        assert!((fsum(&acc) - 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_convolve_truncated_is_prefix() {
        let u = vec![0.5, 0.3, 0.2];
        let v = vec![0.6, 0.4];
        let full = convolve(&u, &v);
        let cut = convolve_truncated(&u, &v, 2);
        assert_eq!(cut.len(), 2);
        assert_eq!(cut[..], full[..2]);
    }

    #[test]
    fn test_convolve_empty() {
        assert!(convolve(&[], &[1.0]).is_empty());
        assert!(convolve(&[1.0], &[]).is_empty());
    }

    #[test]
    fn test_fsum_compensates() {
        // Naive summation of this pattern loses the small terms.
        let mut values = vec![1.0];
        values.extend(std::iter::repeat(1e-16).take(10_000));
        let expected = 1.0 + 1e-16 * 10_000.0;
        assert!((fsum(&values) - expected).abs() < 1e-15);
    }
}
