// src/forecast/mlp.rs
//! One-input, one-output network with a single ReLU hidden layer,
//! trained full-batch with Adam on mean squared error.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

const BETA1: f64 = 0.9;
const BETA2: f64 = 0.999;
const EPSILON: f64 = 1e-8;

#[derive(Debug, Clone)]
pub struct Mlp {
    w1: Vec<f64>,
    b1: Vec<f64>,
    w2: Vec<f64>,
    b2: f64,
}

/// Gradient (or Adam moment) buffer with the same shape as [`Mlp`].
#[derive(Debug, Clone)]
struct Params {
    w1: Vec<f64>,
    b1: Vec<f64>,
    w2: Vec<f64>,
    b2: f64,
}

impl Params {
    fn zeros(hidden: usize) -> Self {
        Self {
            w1: vec![0.0; hidden],
            b1: vec![0.0; hidden],
            w2: vec![0.0; hidden],
            b2: 0.0,
        }
    }
}

impl Mlp {
    /// He-uniform hidden weights, Glorot-uniform output weights.
    pub fn new(hidden: usize, seed: u64) -> Self {
        let mut rng = StdRng::seed_from_u64(seed);
        let he = 6.0_f64.sqrt();
        let glorot = (6.0 / (hidden as f64 + 1.0)).sqrt();
        Self {
            w1: (0..hidden).map(|_| rng.gen_range(-he..he)).collect(),
            b1: vec![0.1; hidden],
            w2: (0..hidden).map(|_| rng.gen_range(-glorot..glorot)).collect(),
            b2: 0.0,
        }
    }

    pub fn hidden(&self) -> usize {
        self.w1.len()
    }

    pub fn predict(&self, x: f64) -> f64 {
        self.w1
            .iter()
            .zip(&self.b1)
            .zip(&self.w2)
            .map(|((w1, b1), w2)| w2 * relu(w1 * x + b1))
            .sum::<f64>()
            + self.b2
    }

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

    /// Loss and its gradient over the whole batch.
    fn gradients(&self, xs: &[f64], ys: &[f64]) -> (f64, Params) {
        let h = self.hidden();
        let n = xs.len() as f64;
        let mut grad = Params::zeros(h);
        let mut loss = 0.0;
        let mut act = vec![0.0; h];

        for (&x, &y) in xs.iter().zip(ys) {
            let mut out = self.b2;
            for j in 0..h {
                act[j] = relu(self.w1[j] * x + self.b1[j]);
                out += self.w2[j] * act[j];
            }
            let err = out - y;
            loss += err * err;

            let d_out = 2.0 * err / n;
            grad.b2 += d_out;
            for j in 0..h {
                grad.w2[j] += d_out * act[j];
                if act[j] > 0.0 {
                    let d_z = d_out * self.w2[j];
                    grad.w1[j] += d_z * x;
                    grad.b1[j] += d_z;
                }
            }
        }
        (loss / n, grad)
    }
}

/// Adam state for one [`Mlp`].
#[derive(Debug, Clone)]
pub struct Adam {
    learning_rate: f64,
    step: i32,
    m: Params,
    v: Params,
}

impl Adam {
    pub fn new(model: &Mlp, learning_rate: f64) -> Self {
        Self {
            learning_rate,
            step: 0,
            m: Params::zeros(model.hidden()),
            v: Params::zeros(model.hidden()),
        }
    }

    /// One full-batch update. Returns the loss before the update.
    pub fn step(&mut self, model: &mut Mlp, xs: &[f64], ys: &[f64]) -> f64 {
        let (loss, grad) = model.gradients(xs, ys);
        self.step = self.step.saturating_add(1);
        let bc1 = 1.0 - BETA1.powi(self.step);
        let bc2 = 1.0 - BETA2.powi(self.step);
        let lr = self.learning_rate;

        let update = |p: &mut f64, g: f64, m: &mut f64, v: &mut f64| {
            *m = BETA1 * *m + (1.0 - BETA1) * g;
            *v = BETA2 * *v + (1.0 - BETA2) * g * g;
            let m_hat = *m / bc1;
            let v_hat = *v / bc2;
            *p -= lr * m_hat / (v_hat.sqrt() + EPSILON);
        };

        for j in 0..model.hidden() {
            update(&mut model.w1[j], grad.w1[j], &mut self.m.w1[j], &mut self.v.w1[j]);
            update(&mut model.b1[j], grad.b1[j], &mut self.m.b1[j], &mut self.v.b1[j]);
            update(&mut model.w2[j], grad.w2[j], &mut self.m.w2[j], &mut self.v.w2[j]);
        }
        update(&mut model.b2, grad.b2, &mut self.m.b2, &mut self.v.b2);
        loss
    }
}

fn relu(z: f64) -> f64 {
    z.max(0.0)
}
