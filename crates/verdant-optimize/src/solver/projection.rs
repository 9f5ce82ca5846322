//! Euclidean projection onto `{sum(x) = 1, lower <= x <= upper, [aᵀx = b]}`.
//!
//! The projection has the closed form `x_i = clip(v_i - α - β·a_i)`. For a
//! fixed `β` the budget multiplier `α` is found exactly on the piecewise
//! linear budget curve; `β` is then bisected on the equality residual, which
//! is non-increasing in `β`.

use super::LinearEquality;
use ndarray::{Array1, Zip};

const MAX_BRACKET_DOUBLINGS: usize = 200;
const MAX_BISECTIONS: usize = 200;

#[derive(Debug)]
pub(super) struct Projector<'a> {
    lower: f64,
    upper: f64,
    equality: Option<&'a LinearEquality>,
}

impl<'a> Projector<'a> {
    pub(super) const fn new(lower: f64, upper: f64, equality: Option<&'a LinearEquality>) -> Self {
        Self {
            lower,
            upper,
            equality,
        }
    }

    /// Whether the bounds admit a point with unit sum.
    pub(super) fn budget_feasible(&self, n: usize, tolerance: f64) -> bool {
        let n = n as f64;
        self.lower <= self.upper && self.lower * n <= 1.0 + tolerance && self.upper * n >= 1.0 - tolerance
    }

    /// Range of `aᵀx` over the budget-and-bounds set.
    ///
    /// Every variable starts at `lower`; the remaining budget fills the
    /// smallest (or largest) coefficients first.
    pub(super) fn equality_range(&self, coefficients: &Array1<f64>) -> (f64, f64) {
        let mut sorted: Vec<f64> = coefficients.to_vec();
        sorted.sort_by(f64::total_cmp);
        let n = sorted.len();
        (
            self.fill(sorted.iter().copied(), n),
            self.fill(sorted.iter().rev().copied(), n),
        )
    }

    fn fill(&self, ordered: impl Iterator<Item = f64>, n: usize) -> f64 {
        let mut remaining = 1.0 - self.lower * n as f64;
        let mut total = 0.0;
        for c in ordered {
            let extra = remaining.min(self.upper - self.lower).max(0.0);
            total += c * (self.lower + extra);
            remaining -= extra;
        }
        total
    }

    /// Nearest feasible point to `v`.
    pub(super) fn project(&self, v: &Array1<f64>) -> Array1<f64> {
        match self.equality {
            None => self.project_budget(v),
            Some(eq) => self.project_with_equality(v, eq),
        }
    }

    fn clip(&self, value: f64) -> f64 {
        value.clamp(self.lower, self.upper)
    }

    fn budget_sum(&self, u: &Array1<f64>, alpha: f64) -> f64 {
        u.iter().map(|&x| self.clip(x - alpha)).sum()
    }

    /// Solve `sum(clip(u - α)) = 1` for `α`.
    fn budget_shift(&self, u: &Array1<f64>) -> f64 {
        let mut breakpoints: Vec<f64> = u
            .iter()
            .flat_map(|&x| [x - self.upper, x - self.lower])
            .collect();
        breakpoints.sort_by(f64::total_cmp);
        breakpoints.dedup();

        // budget_sum is non-increasing in α; find the last breakpoint still
        // at or above the budget
        let idx = breakpoints.partition_point(|&a| self.budget_sum(u, a) >= 1.0);
        if idx == 0 {
            return breakpoints[0];
        }
        if idx == breakpoints.len() {
            return breakpoints[idx - 1];
        }

        let (a0, a1) = (breakpoints[idx - 1], breakpoints[idx]);
        let (s0, s1) = (self.budget_sum(u, a0), self.budget_sum(u, a1));
        if s0 - s1 <= 0.0 {
            return a0;
        }
        a0 + (s0 - 1.0) / (s0 - s1) * (a1 - a0)
    }

    fn project_budget(&self, v: &Array1<f64>) -> Array1<f64> {
        let alpha = self.budget_shift(v);
        v.mapv(|x| self.clip(x - alpha))
    }

    fn project_shifted(&self, v: &Array1<f64>, eq: &LinearEquality, beta: f64) -> Array1<f64> {
        let mut u = v.clone();
        Zip::from(&mut u)
            .and(&eq.coefficients)
            .for_each(|x, &c| *x -= beta * c);
        self.project_budget(&u)
    }

    fn project_with_equality(&self, v: &Array1<f64>, eq: &LinearEquality) -> Array1<f64> {
        let residual = |beta: f64| {
            let x = self.project_shifted(v, eq, beta);
            let r = eq.residual(&x);
            (x, r)
        };

        let mut lo = -1.0;
        let mut hi = 1.0;
        let (mut x_lo, mut r_lo) = residual(lo);
        let mut doublings = 0;
        while r_lo < 0.0 && doublings < MAX_BRACKET_DOUBLINGS {
            lo *= 2.0;
            (x_lo, r_lo) = residual(lo);
            doublings += 1;
        }
        let (mut x_hi, mut r_hi) = residual(hi);
        doublings = 0;
        while r_hi > 0.0 && doublings < MAX_BRACKET_DOUBLINGS {
            hi *= 2.0;
            (x_hi, r_hi) = residual(hi);
            doublings += 1;
        }

        // Target outside the reachable range: return the closest end
        if r_lo < 0.0 {
            return x_lo;
        }
        if r_hi > 0.0 {
            return x_hi;
        }

        for _ in 0..MAX_BISECTIONS {
            if r_lo == 0.0 {
                return x_lo;
            }
            if r_hi == 0.0 || hi - lo <= f64::EPSILON * lo.abs().max(hi.abs()) {
                break;
            }
            let mid = 0.5 * (lo + hi);
            let (x_mid, r_mid) = residual(mid);
            if r_mid >= 0.0 {
                lo = mid;
                x_lo = x_mid;
                r_lo = r_mid;
            } else {
                hi = mid;
                x_hi = x_mid;
                r_hi = r_mid;
            }
        }

        if r_lo.abs() <= r_hi.abs() { x_lo } else { x_hi }
    }
}
