// src/forecast/linear.rs
//! Least-squares line through (x, y) pairs.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LinearTrend {
    intercept: f64,
    slope: f64,
    r_squared: f64,
}

impl LinearTrend {
    /// Ordinary least squares. With a single distinct x the slope is 0 and
    /// the line passes through the mean.
    pub fn fit(xs: &[f64], ys: &[f64]) -> Self {
        let n = xs.len() as f64;
        if xs.is_empty() {
            return Self::default();
        }

        let sum_x: f64 = xs.iter().sum();
        let sum_y: f64 = ys.iter().sum();
        let sum_x2: f64 = xs.iter().map(|x| x * x).sum();
        let sum_xy: f64 = xs.iter().zip(ys).map(|(x, y)| x * y).sum();

        let denominator = n * sum_x2 - sum_x * sum_x;
        let slope = if denominator.abs() < 1e-10 {
            0.0
        } else {
            (n * sum_xy - sum_x * sum_y) / denominator
        };
        let intercept = (sum_y - slope * sum_x) / n;

        let mean_y = sum_y / n;
        let ss_tot: f64 = ys.iter().map(|y| (y - mean_y).powi(2)).sum();
        let ss_res: f64 = xs
            .iter()
            .zip(ys)
            .map(|(x, y)| (y - (intercept + slope * x)).powi(2))
            .sum();
        let r_squared = if ss_tot > 1e-10 {
            1.0 - ss_res / ss_tot
        } else {
            1.0
        };

        Self {
            intercept,
            slope,
            r_squared,
        }
    }

    pub fn predict(&self, x: f64) -> f64 {
        self.intercept + self.slope * x
    }

    pub fn slope(&self) -> f64 {
        self.slope
    }

    pub fn intercept(&self) -> f64 {
        self.intercept
    }

    pub fn r_squared(&self) -> f64 {
        self.r_squared
    }

    /// Mean squared error over the given pairs.
    pub fn mse(&self, xs: &[f64], ys: &[f64]) -> f64 {
        if xs.is_empty() {
            return 0.0;
        }
        xs.iter()
            .zip(ys)
            .map(|(x, y)| (self.predict(*x) - y).powi(2))
            .sum::<f64>()
            / xs.len() as f64
    }
}
