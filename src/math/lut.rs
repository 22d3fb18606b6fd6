use crate::util::Interval;

/// A lookup table of evenly spaced samples, read back with linear interpolation.
#[derive(Clone, Debug)]
pub struct LookupTable {
    offset: f64,
    step: f64,
    values: Vec<f64>,
}

impl LookupTable {
    /// Creates a lookup table from a sample function.
    /// Both ends of the range are sampled.
    pub fn from_samples(range: Interval<f64>, step: f64, f: impl FnMut(f64) -> f64) -> Self {
        let offset = range.min;
        let num_steps = usize::max((range.length() / step).ceil() as usize, 1);
        let step = range.length() / num_steps as f64;
        let xs = (0..=num_steps).map(|i| offset + (i as f64) * step);
        let values = xs.map(f).collect();
        Self {
            offset,
            step,
            values,
        }
    }

    /// Creates a lookup table which inverts a monotonically increasing sequence of
    /// `(x, y)` pairs, so that sampling it at `y` gives the corresponding `x`.
    pub fn inverse_of(pairs: &[(f64, f64)], step: f64) -> Self {
        let first = pairs[0].1;
        let last = pairs[pairs.len() - 1].1;
        let mut idx = 0;
        Self::from_samples(Interval::new(first, last), step, |y| {
            while idx + 2 < pairs.len() && pairs[idx + 1].1 < y {
                idx += 1;
            }
            let (x0, y0) = pairs[idx];
            let (x1, y1) = pairs[idx + 1];
            if y1 > y0 {
                x0 + (x1 - x0) * (y - y0) / (y1 - y0)
            } else {
                x0
            }
        })
    }

    /// The range of x-values covered by the table.
    pub fn range(&self) -> Interval<f64> {
        Interval::new(
            self.offset,
            self.offset + self.step * (self.values.len() - 1) as f64,
        )
    }

    /// Samples the lookup table, clamping to its range.
    pub fn sample(&self, x: f64) -> f64 {
        let last = self.values.len() - 1;
        let idx = ((x - self.offset) / self.step).max(0.0);
        let lo = usize::min(idx as usize, last);
        let hi = usize::min(lo + 1, last);
        let frac = (idx - lo as f64).clamp(0.0, 1.0);
        self.values[lo] + frac * (self.values[hi] - self.values[lo])
    }
}
