//! Exact t-distributed stochastic neighbor embedding of a precomputed distance matrix.

use log::debug;
use ndarray::{Array2, ArrayView2};
use rand::SeedableRng;
use rand::rngs::StdRng;
use rand_distr::{Distribution, Normal};

use crate::errors::{MetaError, MetaResult};

const N_COMPONENTS: usize = 2;
const EXPLORATION_ITER: usize = 250;
const CHECK_EVERY: usize = 50;
const ITER_WITHOUT_PROGRESS: usize = 300;
const MIN_GRAD_NORM: f64 = 1e-7;
const MIN_GAIN: f64 = 0.01;
const INIT_STD: f64 = 1e-4;
const PERPLEXITY_STEPS: usize = 100;
const PERPLEXITY_TOLERANCE: f64 = 1e-5;
const MIN_ROW_SUM: f64 = 1e-8;

#[derive(Debug, Clone, PartialEq)]
pub struct TsneParams {
    pub perplexity: f64,
    pub early_exaggeration: f64,
    pub max_iter: usize,
    pub seed: u64,
}

///
/// Embed the points described by the symmetric distance matrix `distances` into 2D.
///
/// The distances are used as given (not squared) when calibrating the conditional
/// neighbor probabilities. Zero points yield an empty embedding and a single point
/// is placed at the origin.
///
pub fn embed_precomputed(distances: ArrayView2<f64>, params: &TsneParams) -> MetaResult<Array2<f64>> {
    let n = distances.nrows();
    if distances.ncols() != n {
        return Err(MetaError::Embedding(format!(
            "distance matrix must be square, got {}x{}",
            n,
            distances.ncols()
        )));
    }
    if distances.iter().any(|d| !d.is_finite() || *d < 0.0) {
        return Err(MetaError::Embedding(
            "distances must be finite and non-negative".to_string(),
        ));
    }
    if n < 2 {
        return Ok(Array2::zeros((n, N_COMPONENTS)));
    }

    let perplexity = params.perplexity.clamp(1.0, (n - 1) as f64);
    let joint = joint_probabilities(distances, perplexity);

    let mut rng = StdRng::seed_from_u64(params.seed);
    let normal = Normal::new(0.0, INIT_STD).map_err(|e| MetaError::Embedding(e.to_string()))?;
    let mut embedding =
        Array2::from_shape_simple_fn((n, N_COMPONENTS), || normal.sample(&mut rng));

    let learning_rate = (n as f64 / params.early_exaggeration / 4.0).max(50.0);
    let mut descent = GradientDescent::new(n, learning_rate);

    let exaggerated = &joint * params.early_exaggeration;
    let exploration = EXPLORATION_ITER.min(params.max_iter);
    descent.run(&mut embedding, &exaggerated, 0, exploration, 0.5);
    descent.run(&mut embedding, &joint, exploration, params.max_iter, 0.8);

    Ok(embedding)
}

///
/// Symmetrized neighbor probabilities `P = (P_j|i + P_i|j) / sum`, where every row's
/// conditional distribution is calibrated to entropy `ln(perplexity)`.
///
pub fn joint_probabilities(distances: ArrayView2<f64>, perplexity: f64) -> Array2<f64> {
    let n = distances.nrows();
    let desired_entropy = perplexity.ln();
    let mut conditional = Array2::<f64>::zeros((n, n));

    for i in 0..n {
        let mut beta = 1.0;
        let mut beta_min = f64::NEG_INFINITY;
        let mut beta_max = f64::INFINITY;

        for _ in 0..PERPLEXITY_STEPS {
            let mut row_sum = 0.0;
            for j in 0..n {
                let p = if i == j {
                    0.0
                } else {
                    (-distances[[i, j]] * beta).exp()
                };
                conditional[[i, j]] = p;
                row_sum += p;
            }
            if row_sum == 0.0 {
                row_sum = MIN_ROW_SUM;
            }

            let mut weighted_distance = 0.0;
            for j in 0..n {
                conditional[[i, j]] /= row_sum;
                weighted_distance += distances[[i, j]] * conditional[[i, j]];
            }

            let entropy = row_sum.ln() + beta * weighted_distance;
            let diff = entropy - desired_entropy;
            if diff.abs() <= PERPLEXITY_TOLERANCE {
                break;
            }

            if diff > 0.0 {
                beta_min = beta;
                beta = if beta_max == f64::INFINITY {
                    beta * 2.0
                } else {
                    (beta + beta_max) / 2.0
                };
            } else {
                beta_max = beta;
                beta = if beta_min == f64::NEG_INFINITY {
                    beta / 2.0
                } else {
                    (beta + beta_min) / 2.0
                };
            }
        }
    }

    let mut joint = &conditional + &conditional.t();
    let total = joint.sum().max(f64::EPSILON);
    joint.mapv_inplace(|p| (p / total).max(f64::EPSILON));
    joint.diag_mut().fill(0.0);
    joint
}

struct GradientDescent {
    update: Array2<f64>,
    gains: Array2<f64>,
    learning_rate: f64,
    best_error: f64,
    best_iter: usize,
}

impl GradientDescent {
    fn new(n: usize, learning_rate: f64) -> Self {
        GradientDescent {
            update: Array2::zeros((n, N_COMPONENTS)),
            gains: Array2::ones((n, N_COMPONENTS)),
            learning_rate,
            best_error: f64::INFINITY,
            best_iter: 0,
        }
    }

    /// Iterations `from..to` with the given momentum; stops early on convergence.
    fn run(&mut self, embedding: &mut Array2<f64>, p: &Array2<f64>, from: usize, to: usize, momentum: f64) {
        // progress tracking restarts with each stage
        self.best_error = f64::INFINITY;
        self.best_iter = from;

        for iteration in from..to {
            let (error, grad_norm) = self.step(embedding, p, momentum);

            if (iteration + 1) % CHECK_EVERY == 0 {
                debug!(
                    "t-SNE iteration {}: KL divergence {:.6}, gradient norm {:.3e}",
                    iteration + 1,
                    error,
                    grad_norm
                );
                if error < self.best_error {
                    self.best_error = error;
                    self.best_iter = iteration;
                } else if iteration - self.best_iter > ITER_WITHOUT_PROGRESS {
                    break;
                }
                if grad_norm <= MIN_GRAD_NORM {
                    break;
                }
            }
        }
    }

    /// One momentum update with adaptive gains. Returns the KL divergence before the
    /// update and the norm of the gain-scaled gradient.
    fn step(&mut self, embedding: &mut Array2<f64>, p: &Array2<f64>, momentum: f64) -> (f64, f64) {
        let (error, mut grad) = kl_divergence(embedding, p);

        ndarray::Zip::from(&mut self.gains)
            .and(&self.update)
            .and(&grad)
            .for_each(|gain, &update, &g| {
                if update * g < 0.0 {
                    *gain += 0.2;
                } else {
                    *gain *= 0.8;
                }
                *gain = gain.max(MIN_GAIN);
            });
        grad *= &self.gains;
        self.update = &self.update * momentum - &grad * self.learning_rate;
        *embedding += &self.update;

        (error, grad.iter().map(|g| g * g).sum::<f64>().sqrt())
    }
}

///
/// Kullback-Leibler divergence between `p` and the Student-t similarities of the
/// embedding, with its gradient.
///
fn kl_divergence(embedding: &Array2<f64>, p: &Array2<f64>) -> (f64, Array2<f64>) {
    let n = embedding.nrows();
    let mut kernel = Array2::<f64>::zeros((n, n));
    let mut total = 0.0;
    for i in 0..n {
        for j in (i + 1)..n {
            let dx = embedding[[i, 0]] - embedding[[j, 0]];
            let dy = embedding[[i, 1]] - embedding[[j, 1]];
            let value = 1.0 / (1.0 + dx * dx + dy * dy);
            kernel[[i, j]] = value;
            kernel[[j, i]] = value;
            total += 2.0 * value;
        }
    }

    let mut error = 0.0;
    let mut grad = Array2::<f64>::zeros((n, N_COMPONENTS));
    for i in 0..n {
        for j in 0..n {
            if i == j {
                continue;
            }
            let q = (kernel[[i, j]] / total).max(f64::EPSILON);
            let p_ij = p[[i, j]];
            error += p_ij * (p_ij.max(f64::EPSILON) / q).ln();

            let strength = 4.0 * (p_ij - q) * kernel[[i, j]];
            grad[[i, 0]] += strength * (embedding[[i, 0]] - embedding[[j, 0]]);
            grad[[i, 1]] += strength * (embedding[[i, 1]] - embedding[[j, 1]]);
        }
    }

    (error, grad)
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;
    use pretty_assertions::assert_eq;
    use rstest::*;

    #[fixture]
    fn params() -> TsneParams {
        TsneParams {
            perplexity: 2.0,
            early_exaggeration: 12.0,
            max_iter: 1000,
            seed: 0,
        }
    }

    fn two_groups() -> Array2<f64> {
        // points 0-2 close together, points 3-5 close together, groups far apart
        Array2::from_shape_fn((6, 6), |(i, j)| {
            if i == j {
                0.0
            } else if (i < 3) == (j < 3) {
                1.0
            } else {
                10.0
            }
        })
    }

    #[rstest]
    fn test_joint_probabilities_are_symmetric_and_normalized() {
        let joint = joint_probabilities(two_groups().view(), 2.0);
        let total: f64 = joint.sum();
        assert!((total - 1.0).abs() < 1e-6);
        for i in 0..6 {
            assert_eq!(joint[[i, i]], 0.0);
            for j in 0..6 {
                assert!((joint[[i, j]] - joint[[j, i]]).abs() < 1e-12);
            }
        }
        // near neighbors dominate far ones
        assert!(joint[[0, 1]] > joint[[0, 4]]);
    }

    #[rstest]
    fn test_embedding_keeps_groups_apart(params: TsneParams) {
        let embedding = embed_precomputed(two_groups().view(), &params).unwrap();
        assert_eq!(embedding.dim(), (6, 2));
        assert!(embedding.iter().all(|v| v.is_finite()));

        let dist = |a: usize, b: usize| {
            let dx = embedding[[a, 0]] - embedding[[b, 0]];
            let dy = embedding[[a, 1]] - embedding[[b, 1]];
            (dx * dx + dy * dy).sqrt()
        };
        let within = (dist(0, 1) + dist(1, 2) + dist(3, 4) + dist(4, 5)) / 4.0;
        let between = (dist(0, 3) + dist(1, 4) + dist(2, 5)) / 3.0;
        assert!(within < between);
    }

    #[rstest]
    fn test_embedding_is_deterministic(params: TsneParams) {
        let first = embed_precomputed(two_groups().view(), &params).unwrap();
        let second = embed_precomputed(two_groups().view(), &params).unwrap();
        assert_eq!(first, second);
    }

    #[rstest]
    fn test_degenerate_inputs(params: TsneParams) {
        let single = embed_precomputed(array![[0.0]].view(), &params).unwrap();
        assert_eq!(single, array![[0.0, 0.0]]);

        let empty = embed_precomputed(Array2::<f64>::zeros((0, 0)).view(), &params).unwrap();
        assert_eq!(empty.dim(), (0, 2));
    }

    #[rstest]
    fn test_two_points_have_finite_coordinates(params: TsneParams) {
        let embedding = embed_precomputed(array![[0.0, 1.0], [1.0, 0.0]].view(), &TsneParams {
            perplexity: 1.0,
            ..params
        })
        .unwrap();
        assert!(embedding.iter().all(|v| v.is_finite()));
    }

    #[rstest]
    fn test_gradient_norm_is_taken_after_gains() {
        let joint = joint_probabilities(two_groups().view(), 2.0);
        let mut embedding = Array2::from_shape_fn((6, 2), |(i, j)| (i as f64 * 0.3 + j as f64).sin());
        let (_, raw) = kl_divergence(&embedding, &joint);
        let raw_norm = raw.iter().map(|g| g * g).sum::<f64>().sqrt();

        // the first step starts from a zero update, so every gain decays to 0.8
        let mut descent = GradientDescent::new(6, 50.0);
        let (_, grad_norm) = descent.step(&mut embedding, &joint, 0.5);
        assert!(raw_norm > 0.0);
        assert!((grad_norm - 0.8 * raw_norm).abs() < 1e-12);
    }

    #[rstest]
    fn test_invalid_matrices_are_rejected(params: TsneParams) {
        let not_square = Array2::<f64>::zeros((2, 3));
        assert!(embed_precomputed(not_square.view(), &params).is_err());

        let negative = array![[0.0, -1.0], [-1.0, 0.0]];
        assert!(embed_precomputed(negative.view(), &params).is_err());
    }
}
