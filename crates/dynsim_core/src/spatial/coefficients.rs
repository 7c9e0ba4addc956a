use std::cell::RefCell;
use std::collections::HashMap;

/// Memoized binomial coefficients and odd-order stencil weights.
///
/// Entries are never evicted; difference orders in practice stay small.
#[derive(Debug, Default)]
pub struct CoefficientCache {
    binomials: RefCell<HashMap<(u32, u32), u64>>,
    odd: RefCell<HashMap<(u32, u32), i64>>,
}

impl CoefficientCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// C(n, k); zero for k > n.
    pub fn binomial(&self, n: u32, k: u32) -> u64 {
        if k > n {
            return 0;
        }
        let k = k.min(n - k);
        if let Some(value) = self.binomials.borrow().get(&(n, k)) {
            return *value;
        }
        // Exact: every partial product is itself a binomial coefficient.
        let mut value: u128 = 1;
        for i in 0..u128::from(k) {
            value = value * (u128::from(n) - i) / (i + 1);
        }
        let value = u64::try_from(value).unwrap_or(u64::MAX);
        self.binomials.borrow_mut().insert((n, k), value);
        value
    }

    /// Weight of sample `k` (0..=n+1) in the central stencil of odd order `n`,
    /// before division by 2 dx^n.
    pub fn odd_coefficient(&self, n: u32, k: u32) -> i64 {
        debug_assert!(n % 2 == 1, "odd_coefficient needs an odd order, got {n}");
        if k == 0 {
            return -1;
        }
        if k == n + 1 {
            return 1;
        }
        if let Some(value) = self.odd.borrow().get(&(n, k)) {
            return *value;
        }
        let lower = if k >= 2 {
            self.binomial(n - 1, k - 2) as i64
        } else {
            0
        };
        let upper = self.binomial(n - 1, k) as i64;
        let sign = if k % 2 == 0 { 1 } else { -1 };
        let value = sign * (lower - upper);
        self.odd.borrow_mut().insert((n, k), value);
        value
    }

    /// Number of memoized entries.
    pub fn len(&self) -> usize {
        self.binomials.borrow().len() + self.odd.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
