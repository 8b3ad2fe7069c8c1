//! Utilities for working with probabilities and decimal prices.

pub trait SliceExt {
    fn sum(&self) -> f64;
    fn normalise(&mut self, target: f64) -> f64;
    fn scale(&mut self, factor: f64);
    fn mean(&self) -> f64;
    fn std_dev(&self) -> f64;
    fn coefficient_of_variation(&self) -> f64;
}
impl SliceExt for [f64] {
    fn sum(&self) -> f64 {
        self.iter().sum()
    }

    fn normalise(&mut self, target: f64) -> f64 {
        let sum = self.sum();
        self.scale(target / sum);
        sum
    }

    fn scale(&mut self, factor: f64) {
        for element in self {
            *element *= factor;
        }
    }

    fn mean(&self) -> f64 {
        if self.is_empty() {
            return 0.0;
        }
        self.sum() / self.len() as f64
    }

    fn std_dev(&self) -> f64 {
        if self.len() < 2 {
            return 0.0;
        }
        let mean = self.mean();
        let variance =
            self.iter().map(|value| (value - mean).powi(2)).sum::<f64>() / self.len() as f64;
        variance.sqrt()
    }

    fn coefficient_of_variation(&self) -> f64 {
        let mean = self.mean();
        if mean.abs() < f64::EPSILON {
            return 0.0;
        }
        self.std_dev() / mean.abs()
    }
}

/// Probability implied by a decimal price, vig included. The glossary's edge
/// is the model probability minus this quantity.
#[inline]
pub fn implied(price: f64) -> f64 {
    if price > 1.0 {
        1.0 / price
    } else {
        1.0
    }
}

/// Fair decimal price of a probability, bounded away from pathological quotes.
pub fn fair_price(prob: f64) -> f64 {
    const MIN_PRICE: f64 = 1.01;
    const MAX_PRICE: f64 = 1001.0;
    let price = 1.0 / prob;
    if price.is_finite() {
        price.clamp(MIN_PRICE, MAX_PRICE)
    } else {
        MAX_PRICE
    }
}
