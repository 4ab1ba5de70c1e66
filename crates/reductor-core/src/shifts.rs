//! Shift (expansion point) handling.
//!
//! Shift vectors are sequences of complex frequencies, closed under complex
//! conjugation. The canonical form groups conjugate partners adjacently with
//! the nonnegative-imaginary member first, orders pairs by real part, and
//! places real shifts after the pairs (infinite shifts last). All reduction
//! entry points normalize their shift inputs through [`canonicalize`].

use num_complex::Complex;

use crate::error::{CoreError, Result};

/// Expand the (value, multiplicity) encoding into the plain vector form.
///
/// Each value is repeated according to its multiplicity; the result is not
/// yet canonically ordered.
pub fn expand_multiplicities(pairs: &[(Complex<f64>, usize)]) -> Vec<Complex<f64>> {
    let mut out = Vec::new();
    for &(s, k) in pairs {
        for _ in 0..k {
            out.push(s);
        }
    }
    out
}

/// Canonicalize a shift vector: snap near-real values onto the real axis,
/// pair complex conjugates (nonnegative imaginary part first), order pairs by
/// real then imaginary part, and append real shifts sorted ascending.
///
/// Fails when the vector is empty or not closed under conjugation.
pub fn canonicalize(shifts: &[Complex<f64>], tol: f64) -> Result<Vec<Complex<f64>>> {
    Ok(canonicalize_indexed(shifts, tol)?.0)
}

/// Like [`canonicalize`], additionally returning for each canonical position
/// the index of the originating entry in the input vector. Callers carrying
/// per-shift data (tangential directions) apply the same permutation.
///
/// For a conjugate pair both output slots map to the index of the member
/// with nonnegative imaginary part, since the partner's data is implied by
/// conjugation.
pub fn canonicalize_indexed(
    shifts: &[Complex<f64>],
    tol: f64,
) -> Result<(Vec<Complex<f64>>, Vec<usize>)> {
    if shifts.is_empty() {
        return Err(CoreError::MalformedShifts("empty shift vector"));
    }
    if shifts.iter().any(|s| s.re.is_nan() || s.im.is_nan()) {
        return Err(CoreError::MalformedShifts("NaN shift entry"));
    }

    let snapped: Vec<Complex<f64>> = shifts
        .iter()
        .map(|s| {
            if s.im.abs() <= tol * s.norm().max(1.0) {
                Complex::new(s.re, 0.0)
            } else {
                *s
            }
        })
        .collect();

    let mut pos: Vec<usize> = Vec::new();
    let mut neg: Vec<usize> = Vec::new();
    let mut real: Vec<usize> = Vec::new();
    for (i, s) in snapped.iter().enumerate() {
        if s.im > 0.0 {
            pos.push(i);
        } else if s.im < 0.0 {
            neg.push(i);
        } else {
            real.push(i);
        }
    }

    let by_value = |&i: &usize, &j: &usize| {
        let (a, b) = (snapped[i], snapped[j]);
        a.re.total_cmp(&b.re).then(a.im.abs().total_cmp(&b.im.abs()))
    };
    pos.sort_by(by_value);
    neg.sort_by(by_value);
    real.sort_by(|&i, &j| snapped[i].re.total_cmp(&snapped[j].re));

    if pos.len() != neg.len() {
        let lonely = if pos.len() > neg.len() { &pos } else { &neg };
        return Err(CoreError::UnpairedShift {
            shift: snapped[lonely[0]],
        });
    }

    let mut canonical = Vec::with_capacity(shifts.len());
    let mut perm = Vec::with_capacity(shifts.len());
    for (&ip, &in_) in pos.iter().zip(neg.iter()) {
        let s = snapped[ip];
        let partner = snapped[in_];
        if (partner - s.conj()).norm() > tol * s.norm().max(1.0) {
            return Err(CoreError::UnpairedShift { shift: s });
        }
        canonical.push(s);
        perm.push(ip);
        canonical.push(s.conj());
        perm.push(ip);
    }
    for &i in &real {
        canonical.push(snapped[i]);
        perm.push(i);
    }
    Ok((canonical, perm))
}

/// Reordering-tolerant distance between two shift vectors: both are brought
/// into a total order and compared entry-wise in the L2 sense. Vectors of
/// different length are incomparable (infinite distance).
pub fn set_distance(a: &[Complex<f64>], b: &[Complex<f64>]) -> f64 {
    if a.len() != b.len() {
        return f64::INFINITY;
    }
    let mut a: Vec<Complex<f64>> = a.to_vec();
    let mut b: Vec<Complex<f64>> = b.to_vec();
    let order = |x: &Complex<f64>, y: &Complex<f64>| {
        x.re.total_cmp(&y.re).then(x.im.total_cmp(&y.im))
    };
    a.sort_by(order);
    b.sort_by(order);
    a.iter()
        .zip(b.iter())
        .map(|(x, y)| (x - y).norm_sqr())
        .sum::<f64>()
        .sqrt()
}

/// L2 norm of a shift vector, for relative comparisons.
pub fn norm(shifts: &[Complex<f64>]) -> f64 {
    shifts.iter().map(|s| s.norm_sqr()).sum::<f64>().sqrt()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn c(re: f64, im: f64) -> Complex<f64> {
        Complex::new(re, im)
    }

    #[test]
    fn expand_repeats_values() {
        let expanded = expand_multiplicities(&[(c(0.0, 0.0), 2), (c(1.0, 0.0), 1)]);
        assert_eq!(expanded, vec![c(0.0, 0.0), c(0.0, 0.0), c(1.0, 0.0)]);
    }

    #[test]
    fn canonical_pairs_come_first_nonnegative_imag_leading() {
        let shifts = vec![c(3.0, 0.0), c(1.0, -2.0), c(1.0, 2.0)];
        let canonical = canonicalize(&shifts, 1e-6).unwrap();
        assert_eq!(canonical, vec![c(1.0, 2.0), c(1.0, -2.0), c(3.0, 0.0)]);
    }

    #[test]
    fn pairs_sorted_by_real_part() {
        let shifts = vec![c(5.0, 1.0), c(2.0, -3.0), c(5.0, -1.0), c(2.0, 3.0)];
        let canonical = canonicalize(&shifts, 1e-6).unwrap();
        assert_eq!(
            canonical,
            vec![c(2.0, 3.0), c(2.0, -3.0), c(5.0, 1.0), c(5.0, -1.0)]
        );
    }

    #[test]
    fn near_real_shifts_are_snapped() {
        let shifts = vec![c(1.0, 1e-9), c(1.0, -1e-9)];
        let canonical = canonicalize(&shifts, 1e-6).unwrap();
        assert_eq!(canonical, vec![c(1.0, 0.0), c(1.0, 0.0)]);
    }

    #[test]
    fn unpaired_shift_is_rejected() {
        let shifts = vec![c(1.0, 2.0), c(3.0, 0.0)];
        assert!(matches!(
            canonicalize(&shifts, 1e-6),
            Err(CoreError::UnpairedShift { .. })
        ));
    }

    #[test]
    fn mismatched_pair_is_rejected() {
        let shifts = vec![c(1.0, 2.0), c(1.5, -2.0)];
        assert!(matches!(
            canonicalize(&shifts, 1e-6),
            Err(CoreError::UnpairedShift { .. })
        ));
    }

    #[test]
    fn empty_vector_is_rejected() {
        assert!(matches!(
            canonicalize(&[], 1e-6),
            Err(CoreError::MalformedShifts(_))
        ));
    }

    #[test]
    fn permutation_tracks_sources() {
        let shifts = vec![c(3.0, 0.0), c(1.0, -2.0), c(1.0, 2.0)];
        let (canonical, perm) = canonicalize_indexed(&shifts, 1e-6).unwrap();
        assert_eq!(canonical[0], c(1.0, 2.0));
        // Both pair slots refer to the positive-imaginary source at index 2.
        assert_eq!(perm[0], 2);
        assert_eq!(perm[1], 2);
        assert_eq!(perm[2], 0);
    }

    #[test]
    fn set_distance_ignores_ordering() {
        let a = vec![c(1.0, 0.0), c(2.0, 0.0)];
        let b = vec![c(2.0, 0.0), c(1.0, 0.0)];
        assert!(set_distance(&a, &b) < 1e-15);
    }

    #[test]
    fn set_distance_of_different_lengths_is_infinite() {
        let a = vec![c(1.0, 0.0)];
        let b = vec![c(1.0, 0.0), c(2.0, 0.0)];
        assert!(set_distance(&a, &b).is_infinite());
    }

    #[test]
    fn infinite_shifts_sort_last() {
        let shifts = vec![c(f64::INFINITY, 0.0), c(1.0, 0.0)];
        let canonical = canonicalize(&shifts, 1e-6).unwrap();
        assert_eq!(canonical[0], c(1.0, 0.0));
        assert!(canonical[1].re.is_infinite());
    }
}
