//! Entropy and combinatorics helpers shared by the scorer and the cube

/// Number of histogram bins used for measure distributions
pub const DEFAULT_BIN_NUM: usize = 16;

/// Shannon entropy (bits) of a frequency list.
///
/// Zero-frequency bins contribute nothing, so padding a distribution with
/// empty bins leaves the result unchanged. An empty or all-zero list has
/// entropy 0.
pub fn entropy_acc(frequencies: &[f64]) -> f64 {
    let total: f64 = frequencies.iter().sum();
    if total <= 0.0 {
        return 0.0;
    }
    let log_total = total.log2();
    let mut ent = 0.0;
    for &f in frequencies {
        if f > 0.0 {
            ent += f * (f.log2() - log_total) / total;
        }
    }
    -ent
}

/// KL divergence (bits) of `local` from the probability distribution `global`.
///
/// `local` holds raw counts and is normalized here; bins where either side is
/// zero are skipped. Returns 0 when `local` is empty.
pub fn kl_divergence(local: &[u64], global: &[f64]) -> f64 {
    let local_sum: u64 = local.iter().sum();
    if local_sum == 0 {
        return 0.0;
    }
    let mut kl = 0.0;
    for (count, &py) in local.iter().zip(global) {
        let px = *count as f64 / local_sum as f64;
        if px > 0.0 && py > 0.0 {
            kl += px * (px / py).log2();
        }
    }
    kl
}

/// Normalize counts into probabilities. All-zero input stays all-zero.
pub fn to_probabilities(counts: &[u64]) -> Vec<f64> {
    let total: u64 = counts.iter().sum();
    if total == 0 {
        return vec![0.0; counts.len()];
    }
    counts.iter().map(|&c| c as f64 / total as f64).collect()
}

/// All `size`-element combinations of `items`, preserving input order.
pub fn combinations<T: Clone>(items: &[T], size: usize) -> Vec<Vec<T>> {
    let mut out = Vec::new();
    if size == 0 || size > items.len() {
        return out;
    }
    let mut picked: Vec<T> = Vec::with_capacity(size);
    fn walk<T: Clone>(items: &[T], start: usize, size: usize, picked: &mut Vec<T>, out: &mut Vec<Vec<T>>) {
        if picked.len() == size {
            out.push(picked.clone());
            return;
        }
        let remaining = size - picked.len();
        for i in start..=items.len() - remaining {
            picked.push(items[i].clone());
            walk(items, i + 1, size, picked, out);
            picked.pop();
        }
    }
    walk(items, 0, size, &mut picked, &mut out);
    out
}

/// Combinations of every size in `min..=max`, smallest sizes first.
pub fn combinations_in_range<T: Clone>(items: &[T], min: usize, max: usize) -> Vec<Vec<T>> {
    let upper = max.min(items.len());
    let mut out = Vec::new();
    for size in min.max(1)..=upper {
        out.extend(combinations(items, size));
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    const EPS: f64 = 1e-12;

    #[test]
    fn test_entropy_uniform_is_log2_k() {
        for k in 1..=16u32 {
            let bins = vec![5.0f64; k as usize];
            assert!((entropy_acc(&bins) - (k as f64).log2()).abs() < EPS);
        }
    }

    #[test]
    fn test_entropy_single_bin_is_zero() {
        assert_eq!(entropy_acc(&[42.0]), 0.0);
        assert_eq!(entropy_acc(&[0.0, 7.0, 0.0]), 0.0);
    }

    #[test]
    fn test_entropy_ignores_zero_bins() {
        let dense = entropy_acc(&[3.0, 1.0, 4.0]);
        let padded = entropy_acc(&[0.0, 3.0, 0.0, 1.0, 0.0, 4.0, 0.0, 0.0]);
        assert!((dense - padded).abs() < EPS);
    }

    #[test]
    fn test_entropy_empty() {
        assert_eq!(entropy_acc(&[]), 0.0);
        assert_eq!(entropy_acc(&[0.0, 0.0]), 0.0);
    }

    #[test]
    fn test_kl_divergence() {
        let global = to_probabilities(&[5, 5]);
        assert!(kl_divergence(&[10, 10], &global).abs() < EPS);
        assert!((kl_divergence(&[10, 0], &global) - 1.0).abs() < EPS);
        assert_eq!(kl_divergence(&[0, 0], &global), 0.0);
    }

    #[test]
    fn test_combinations() {
        let items = ["a", "b", "c", "d"];
        let pairs = combinations(&items, 2);
        assert_eq!(pairs.len(), 6);
        assert_eq!(pairs[0], vec!["a", "b"]);
        assert_eq!(pairs[5], vec!["c", "d"]);
        assert_eq!(combinations(&items, 4).len(), 1);
        assert!(combinations(&items, 5).is_empty());
        assert!(combinations(&items, 0).is_empty());
    }

    #[test]
    fn test_combinations_in_range() {
        let items = [1, 2, 3];
        let all = combinations_in_range(&items, 1, 2);
        assert_eq!(all.len(), 6);
        assert_eq!(all[0], vec![1]);
        assert_eq!(all[3], vec![1, 2]);
    }
}
