//! Combinatorial counting used to predict and to verify enumeration.
//!
//! All counts are exact integers. Overflow is reported as an error
//! rather than wrapped, a wrapped count would defeat the self-check.

use crate::EnumerationError;
use crate::error::Result;

pub fn gcd(mut a: usize, mut b: usize) -> usize {
    while b != 0 {
        (a, b) = (b, a % b);
    }
    a
}

/// Euler's totient.
pub fn euler_phi(n: usize) -> usize {
    (1..=n).filter(|&k| gcd(k, n) == 1).count()
}

/// Binomial coefficient `n choose k`, or `None` on overflow.
pub fn binomial_coefficient(n: usize, k: usize) -> Option<usize> {
    if k > n {
        return Some(0);
    }
    let k = k.min(n - k);
    let mut acc: u128 = 1;
    for i in 0..k {
        // Exact at every step: acc is C(n, i) before the update.
        acc = acc.checked_mul((n - i) as u128)? / (i as u128 + 1);
    }
    usize::try_from(acc).ok()
}

/// Number of distinct multisets with 1..=max_size elements drawn from
/// `n_types` types, i.e. C(max_size + n_types, max_size) - 1.
pub fn multiset_count(n_types: usize, max_size: usize) -> Result<usize> {
    binomial_coefficient(max_size + n_types, max_size)
        .map(|c| c - 1)
        .ok_or(EnumerationError::Overflow("multisets"))
}

/// Number of necklaces of length `size` over `n_types` symbols:
/// (1/size) · Σ_{j=1..size} n_types^gcd(j, size).
pub fn necklace_count(n_types: usize, size: usize) -> Result<usize> {
    if size == 0 {
        return Ok(0);
    }
    let mut sum: u128 = 0;
    for j in 1..=size {
        let term = (n_types as u128)
            .checked_pow(gcd(j, size) as u32)
            .ok_or(EnumerationError::Overflow("necklaces"))?;
        sum = sum.checked_add(term).ok_or(EnumerationError::Overflow("necklaces"))?;
    }
    debug_assert_eq!(sum % size as u128, 0);
    usize::try_from(sum / size as u128).map_err(|_| EnumerationError::Overflow("necklaces"))
}

/// Total number of distinct strand orderings of all sizes 1..=max_size.
pub fn total_orderings(n_types: usize, max_size: usize) -> Result<usize> {
    (1..=max_size).try_fold(0usize, |acc, size| {
        acc.checked_add(necklace_count(n_types, size)?)
            .ok_or(EnumerationError::Overflow("necklaces"))
    })
}

/// Number of necklaces with a fixed content, where `composition[i]` is
/// the number of occurrences of symbol i:
/// (1/n) · Σ_{d | gcd(c)} φ(d) · (n/d)! / Π (c_i/d)!.
pub fn fixed_content_necklace_count(composition: &[u32]) -> Result<usize> {
    let n: usize = composition.iter().map(|&c| c as usize).sum();
    if n == 0 {
        return Ok(0);
    }
    let g = composition.iter().fold(0, |g, &c| gcd(g, c as usize));
    let mut sum: u128 = 0;
    for d in (1..=g).filter(|d| g % d == 0) {
        let parts: Vec<usize> = composition.iter().map(|&c| c as usize / d).collect();
        let term = multinomial(&parts)
            .and_then(|m| m.checked_mul(euler_phi(d) as u128))
            .ok_or(EnumerationError::Overflow("fixed-content necklaces"))?;
        sum = sum.checked_add(term)
            .ok_or(EnumerationError::Overflow("fixed-content necklaces"))?;
    }
    debug_assert_eq!(sum % n as u128, 0);
    usize::try_from(sum / n as u128)
        .map_err(|_| EnumerationError::Overflow("fixed-content necklaces"))
}

fn multinomial(parts: &[usize]) -> Option<u128> {
    let mut total = 0;
    let mut acc: u128 = 1;
    for &k in parts {
        total += k;
        acc = acc.checked_mul(binomial_coefficient(total, k)? as u128)?;
    }
    Some(acc)
}
