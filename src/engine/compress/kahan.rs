/// Compensated accumulator. The pair is the unit of reduction: partial sums
/// must be merged through `merge`, never by adding bare `sum` fields.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct KahanPair {
    pub sum: f64,
    pub correction: f64,
}

impl KahanPair {
    pub fn new(sum: f64, correction: f64) -> Self {
        Self { sum, correction }
    }

    pub fn add(&mut self, value: f64) {
        let corrected = value + self.correction;
        let new_sum = self.sum + corrected;
        self.correction = corrected - (new_sum - self.sum);
        self.sum = new_sum;
    }

    pub fn add_sq(&mut self, value: f64) {
        self.add(value * value);
    }

    /// Folds another partial into this one, carrying its correction.
    pub fn merge(&mut self, other: KahanPair) {
        self.add(other.sum);
        self.add(other.correction);
    }

    pub fn value(&self) -> f64 {
        self.sum
    }
}
