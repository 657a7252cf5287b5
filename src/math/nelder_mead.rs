// Nelder-Mead simplex optimizer used for model calibration

/// Simplex coefficients and stopping rule.
#[derive(Debug, Clone)]
pub struct NelderMeadConfig {
    pub max_iterations: usize,
    pub tolerance: f64,
    pub alpha: f64, // Reflection
    pub gamma: f64, // Expansion
    pub beta: f64,  // Contraction
    pub delta: f64, // Shrink
}

impl Default for NelderMeadConfig {
    fn default() -> Self {
        Self {
            max_iterations: 1000,
            tolerance: 1e-6,
            alpha: 1.0,
            gamma: 2.0,
            beta: 0.5,
            delta: 0.5,
        }
    }
}

/// Outcome of a minimization run.
#[derive(Debug, Clone)]
pub struct OptimizationResult {
    pub best_params: Vec<f64>,
    pub best_value: f64,
    pub iterations: usize,
    pub converged: bool,
}

/// Derivative-free simplex minimizer.
pub struct NelderMead {
    config: NelderMeadConfig,
}

impl NelderMead {
    pub fn new(config: NelderMeadConfig) -> Self {
        Self { config }
    }

    /// Minimize `objective` starting from `initial`. Terminates when the
    /// spread |f(worst) − f(best)| drops below the tolerance or the
    /// iteration cap is hit.
    pub fn minimize<F>(&self, objective: F, initial: Vec<f64>) -> OptimizationResult
    where
        F: Fn(&[f64]) -> f64,
    {
        let n = initial.len();
        let mut simplex = self.initial_simplex(&initial);
        let mut values: Vec<f64> = simplex.iter().map(|p| objective(p)).collect();

        let mut iteration = 0;
        let mut converged = false;

        while iteration < self.config.max_iterations {
            let mut order: Vec<usize> = (0..simplex.len()).collect();
            order.sort_by(|&a, &b| {
                values[a]
                    .partial_cmp(&values[b])
                    .unwrap_or(std::cmp::Ordering::Equal)
            });

            let best = order[0];
            let worst = order[n];
            let second_worst = order[n - 1];

            if (values[worst] - values[best]).abs() < self.config.tolerance {
                converged = true;
                break;
            }

            let centroid = centroid_of(&simplex, &order[..n]);

            let reflected = move_point(&simplex[worst], &centroid, self.config.alpha);
            let f_reflected = objective(&reflected);

            if f_reflected < values[second_worst] && f_reflected >= values[best] {
                simplex[worst] = reflected;
                values[worst] = f_reflected;
            } else if f_reflected < values[best] {
                let expanded = move_point(&simplex[worst], &centroid, self.config.gamma);
                let f_expanded = objective(&expanded);
                if f_expanded < f_reflected {
                    simplex[worst] = expanded;
                    values[worst] = f_expanded;
                } else {
                    simplex[worst] = reflected;
                    values[worst] = f_reflected;
                }
            } else {
                // Contract towards the centroid; shrink the whole simplex if
                // even that fails to improve on the worst vertex.
                let contracted = contract_point(&simplex[worst], &centroid, self.config.beta);
                let f_contracted = objective(&contracted);
                if f_contracted < values[worst] {
                    simplex[worst] = contracted;
                    values[worst] = f_contracted;
                } else {
                    let anchor = simplex[best].clone();
                    for vertex in simplex.iter_mut() {
                        for (v, &a) in vertex.iter_mut().zip(&anchor) {
                            *v = a + self.config.delta * (*v - a);
                        }
                    }
                    for (value, vertex) in values.iter_mut().zip(&simplex) {
                        *value = objective(vertex);
                    }
                }
            }

            iteration += 1;
        }

        let best = values
            .iter()
            .enumerate()
            .min_by(|(_, a), (_, b)| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal))
            .map(|(i, _)| i)
            .unwrap_or(0);

        OptimizationResult {
            best_params: simplex[best].clone(),
            best_value: values[best],
            iterations: iteration,
            converged,
        }
    }

    /// n+1 vertices: the start point plus one 5% perturbation per coordinate
    /// (2.5e-4 absolute when the coordinate is zero).
    fn initial_simplex(&self, initial: &[f64]) -> Vec<Vec<f64>> {
        let n = initial.len();
        let mut simplex = Vec::with_capacity(n + 1);
        simplex.push(initial.to_vec());
        for i in 0..n {
            let mut vertex = initial.to_vec();
            let step = if initial[i].abs() > 1e-10 {
                initial[i] * 0.05
            } else {
                2.5e-4
            };
            vertex[i] += step;
            simplex.push(vertex);
        }
        simplex
    }
}

fn centroid_of(simplex: &[Vec<f64>], indices: &[usize]) -> Vec<f64> {
    let dim = simplex[0].len();
    let mut centroid = vec![0.0; dim];
    for &idx in indices {
        for (c, &x) in centroid.iter_mut().zip(&simplex[idx]) {
            *c += x;
        }
    }
    for c in centroid.iter_mut() {
        *c /= indices.len() as f64;
    }
    centroid
}

/// Reflect/expand `point` through the centroid by `coeff`.
fn move_point(point: &[f64], centroid: &[f64], coeff: f64) -> Vec<f64> {
    point
        .iter()
        .zip(centroid)
        .map(|(p, c)| c + coeff * (c - p))
        .collect()
}

/// Pull `point` towards the centroid by `coeff`.
fn contract_point(point: &[f64], centroid: &[f64], coeff: f64) -> Vec<f64> {
    point
        .iter()
        .zip(centroid)
        .map(|(p, c)| c + coeff * (p - c))
        .collect()
}
