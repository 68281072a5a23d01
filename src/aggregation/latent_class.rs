//! Binary latent class model fitted by expectation maximization
//!
//! Each cell has an unobserved true label. Each worker `j` has a sensitivity
//! `alpha_j = Pr[+1 reported | true +1]` and a specificity
//! `beta_j = Pr[-1 reported | true -1]`, and the population has a prior
//! `p = Pr[true +1]`. All quantities are stored as natural logarithms.
//!
//! Fitting starts from the majority vote posteriors, runs one M-step to obtain
//! parameters consistent with them, then alternates E-step and M-step until
//! the expected complete-data log-likelihood (the Q-function) settles.

use crate::aggregation::majority::MajorityVote;
use crate::alignment::matrix::{Label, ResponseMatrix};
use crate::io::configuration::{DEFAULT_MAX_EM_ITERATIONS, Q_DECREASE_TOLERANCE};
use crate::io::error::{Result, computation_error, invalid_parameter};
use crate::math::logspace::{LN_HALF, log_sum_exp, normalize_pair};
use log::{debug, info, warn};
use ndarray::{Array2, ArrayView2};
use serde::{Deserialize, Serialize};

/// Class row of the positive true label in every log-probability table
const POSITIVE: usize = 0;
/// Class row of the negative true label
const NEGATIVE: usize = 1;

/// Run-time settings of the EM fit
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct EmConfig {
    /// Iteration cap; reaching it ends the fit as not converged
    pub max_iterations: usize,
    /// Fail on NaN parameters and on cells no true label can explain
    pub strict_validation: bool,
}

impl Default for EmConfig {
    fn default() -> Self {
        Self {
            max_iterations: DEFAULT_MAX_EM_ITERATIONS,
            strict_validation: false,
        }
    }
}

/// Outcome of [`LatentClassModel::run_em`]
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct EmSummary {
    /// Number of E/M iterations performed
    pub iterations: usize,
    /// Whether the relative Q change fell below the tolerance
    pub converged: bool,
    /// Q-function value after the last iteration
    pub final_q: f64,
    /// Relative Q change of the last iteration
    pub relative_change: f64,
    /// Updates skipped because their normalizer was zero
    pub degeneracies: usize,
    /// Iterations whose Q fell below the previous value beyond rounding noise
    pub q_decreases: usize,
}

/// Fitted parameters in probability space
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LatentClassParameters {
    /// Estimated `Pr[true +1]`
    pub prior: f64,
    /// Per-worker `Pr[+1 reported | true +1]`
    pub sensitivity: Vec<f64>,
    /// Per-worker `Pr[-1 reported | true -1]`
    pub specificity: Vec<f64>,
    /// Per-cell posterior `Pr[true +1 | judgments]`
    pub posteriors: Vec<f64>,
    /// Q-function value after every iteration
    pub q_history: Vec<f64>,
    /// Summary of the fit
    pub summary: EmSummary,
}

/// EM state over one response matrix
#[derive(Debug, Clone)]
pub struct LatentClassModel<'a> {
    matrix: &'a ResponseMatrix,
    config: EmConfig,
    by_cell: Vec<Vec<(usize, Label)>>,
    by_worker: Vec<Vec<(usize, Label)>>,
    /// `[class, cell]` posterior of the true label
    log_mu: Array2<f64>,
    log_prior: [f64; 2],
    /// `[0, j]` is `ln alpha_j`, `[1, j]` is `ln (1 - alpha_j)`
    log_alpha: Array2<f64>,
    /// `[0, j]` is `ln beta_j`, `[1, j]` is `ln (1 - beta_j)`
    log_beta: Array2<f64>,
    q_history: Vec<f64>,
    degeneracies: usize,
    q_decreases: usize,
    last_summary: Option<EmSummary>,
}

impl<'a> LatentClassModel<'a> {
    /// Initialize the model from majority vote posteriors
    ///
    /// Sensitivities, specificities and the prior start at one half and are
    /// immediately replaced by one M-step over the warm-start posteriors.
    ///
    /// # Errors
    ///
    /// Returns an error if the matrix has no cells or no workers, or if the
    /// initial M-step yields a NaN under strict validation
    pub fn new(matrix: &'a ResponseMatrix, config: EmConfig) -> Result<Self> {
        if matrix.num_cells() == 0 || matrix.num_workers() == 0 {
            return Err(invalid_parameter(
                "response matrix",
                &format!("{}x{}", matrix.num_cells(), matrix.num_workers()),
                &"needs at least one cell and one worker",
            ));
        }

        let by_cell = (0..matrix.num_cells())
            .map(|cell| matrix.cell_judgments(cell).collect())
            .collect();
        let by_worker = (0..matrix.num_workers())
            .map(|worker| matrix.worker_judgments(worker).collect())
            .collect();

        let mut model = Self {
            matrix,
            config,
            by_cell,
            by_worker,
            log_mu: MajorityVote::new(matrix).log_probabilities(),
            log_prior: [LN_HALF; 2],
            log_alpha: Array2::from_elem((2, matrix.num_workers()), LN_HALF),
            log_beta: Array2::from_elem((2, matrix.num_workers()), LN_HALF),
            q_history: Vec::new(),
            degeneracies: 0,
            q_decreases: 0,
            last_summary: None,
        };
        model.m_step()?;
        Ok(model)
    }

    /// Matrix the model is fitted to
    pub const fn matrix(&self) -> &'a ResponseMatrix {
        self.matrix
    }

    fn mu(&self, class: usize, cell: usize) -> f64 {
        self.log_mu
            .get([class, cell])
            .copied()
            .unwrap_or(f64::NEG_INFINITY)
    }

    fn alpha(&self, row: usize, worker: usize) -> f64 {
        self.log_alpha
            .get([row, worker])
            .copied()
            .unwrap_or(LN_HALF)
    }

    fn beta(&self, row: usize, worker: usize) -> f64 {
        self.log_beta.get([row, worker]).copied().unwrap_or(LN_HALF)
    }

    fn hold(&mut self, what: &str) {
        self.degeneracies += 1;
        debug!("{what} has a zero normalizer, keeping previous value");
    }

    fn check_not_nan(&self, stage: &str) -> Result<()> {
        let tables = [
            ("posterior", &self.log_mu),
            ("sensitivity", &self.log_alpha),
            ("specificity", &self.log_beta),
        ];
        for (name, table) in tables {
            if let Some(((row, column), _)) = table.indexed_iter().find(|(_, v)| v.is_nan()) {
                return Err(computation_error(
                    "latent class EM",
                    &format!("{stage} left a NaN {name} at [{row}, {column}]"),
                ));
            }
        }
        if self.log_prior.iter().any(|v| v.is_nan()) {
            return Err(computation_error(
                "latent class EM",
                &format!("{stage} left a NaN prior"),
            ));
        }
        Ok(())
    }

    /// Log joint probability of a cell's judgments with each true label
    fn log_joint(&self, cell: usize) -> [f64; 2] {
        let mut joint = self.log_prior;
        if let Some(judgments) = self.by_cell.get(cell) {
            for &(worker, label) in judgments {
                match label {
                    Label::Positive => {
                        joint[POSITIVE] += self.alpha(0, worker);
                        joint[NEGATIVE] += self.beta(1, worker);
                    }
                    Label::Negative => {
                        joint[POSITIVE] += self.alpha(1, worker);
                        joint[NEGATIVE] += self.beta(0, worker);
                    }
                }
            }
        }
        joint
    }

    /// Recompute every cell posterior from the current parameters
    ///
    /// # Errors
    ///
    /// Returns an error under strict validation if a cell's joint
    /// probabilities are both zero or a posterior turns NaN. Otherwise such a
    /// cell keeps its previous posterior.
    pub fn e_step(&mut self) -> Result<()> {
        for cell in 0..self.matrix.num_cells() {
            let [positive, negative] = self.log_joint(cell);
            match normalize_pair(positive, negative) {
                Some(posterior) => {
                    for (class, value) in posterior.into_iter().enumerate() {
                        if let Some(slot) = self.log_mu.get_mut([class, cell]) {
                            *slot = value;
                        }
                    }
                }
                None if self.config.strict_validation => {
                    return Err(computation_error(
                        "latent class E-step",
                        &format!("no true label can explain the judgments of cell {cell}"),
                    ));
                }
                None => self.hold(&format!("posterior of cell {cell}")),
            }
        }
        if self.config.strict_validation {
            self.check_not_nan("E-step")?;
        }
        Ok(())
    }

    /// Re-estimate the prior and every worker's parameters from the posteriors
    ///
    /// Workers without judgments keep their parameters untouched. A worker
    /// whose judged cells carry no posterior mass under a class keeps that
    /// class's parameter, and the hold is counted in [`Self::degeneracies`].
    ///
    /// # Errors
    ///
    /// Returns an error under strict validation if a parameter turns NaN
    pub fn m_step(&mut self) -> Result<()> {
        let positive_mass = log_sum_exp(self.log_mu.row(POSITIVE).iter().copied());
        let negative_mass = log_sum_exp(self.log_mu.row(NEGATIVE).iter().copied());
        match normalize_pair(positive_mass, negative_mass) {
            Some(prior) => self.log_prior = prior,
            None => self.hold("prior"),
        }

        for worker in 0..self.matrix.num_workers() {
            let Some(judgments) = self.by_worker.get(worker) else {
                continue;
            };
            if judgments.is_empty() {
                continue;
            }

            let class_mass = |class: usize, filter: Option<Label>| {
                log_sum_exp(
                    judgments
                        .iter()
                        .filter(|(_, label)| filter.is_none_or(|wanted| *label == wanted))
                        .map(|&(cell, _)| self.mu(class, cell)),
                )
            };

            let alpha_norm = class_mass(POSITIVE, None);
            let alpha_update = [
                class_mass(POSITIVE, Some(Label::Positive)) - alpha_norm,
                class_mass(POSITIVE, Some(Label::Negative)) - alpha_norm,
            ];
            let beta_norm = class_mass(NEGATIVE, None);
            let beta_update = [
                class_mass(NEGATIVE, Some(Label::Negative)) - beta_norm,
                class_mass(NEGATIVE, Some(Label::Positive)) - beta_norm,
            ];

            if alpha_norm == f64::NEG_INFINITY {
                self.hold(&format!("sensitivity of worker {worker}"));
            } else {
                for (row, value) in alpha_update.into_iter().enumerate() {
                    if let Some(slot) = self.log_alpha.get_mut([row, worker]) {
                        *slot = value;
                    }
                }
            }

            if beta_norm == f64::NEG_INFINITY {
                self.hold(&format!("specificity of worker {worker}"));
            } else {
                for (row, value) in beta_update.into_iter().enumerate() {
                    if let Some(slot) = self.log_beta.get_mut([row, worker]) {
                        *slot = value;
                    }
                }
            }
        }
        if self.config.strict_validation {
            self.check_not_nan("M-step")?;
        }
        Ok(())
    }

    /// Expected complete-data log-likelihood under the current posteriors
    ///
    /// Terms whose posterior weight is exactly zero contribute nothing, so an
    /// impossible class never turns the sum into `-inf · 0`.
    pub fn q_function(&self) -> f64 {
        (0..self.matrix.num_cells())
            .map(|cell| {
                let joint = self.log_joint(cell);
                [POSITIVE, NEGATIVE]
                    .into_iter()
                    .zip(joint)
                    .map(|(class, log_joint)| {
                        let weight = self.mu(class, cell).exp();
                        if weight > 0.0 { weight * log_joint } else { 0.0 }
                    })
                    .sum::<f64>()
            })
            .sum()
    }

    /// Alternate E-step and M-step until the relative Q change drops below
    /// `tolerance` or the iteration cap is reached
    ///
    /// Every Q value is appended to [`Self::q_history`]. A Q decrease beyond
    /// rounding noise is logged and counted in [`EmSummary::q_decreases`] in
    /// every mode.
    ///
    /// # Errors
    ///
    /// Returns an error if `tolerance` is negative or not finite, or if a step
    /// fails strict validation
    pub fn run_em(&mut self, tolerance: f64) -> Result<EmSummary> {
        if !tolerance.is_finite() || tolerance < 0.0 {
            return Err(invalid_parameter(
                "tolerance",
                &tolerance,
                &"must be finite and non-negative",
            ));
        }

        let mut q_new = f64::NEG_INFINITY;
        let mut iterations = 0;
        let (converged, relative_change) = loop {
            let q_old = q_new;
            self.e_step()?;
            self.m_step()?;
            q_new = self.q_function();
            self.q_history.push(q_new);
            iterations += 1;

            let relative_change = if q_old.is_finite() && q_new.is_finite() {
                let delta = (q_new - q_old).abs();
                if q_new == 0.0 { delta } else { delta / q_new.abs() }
            } else {
                f64::INFINITY
            };
            debug!("EM iteration {iterations}: Q = {q_new:.12}, relative change {relative_change:e}");

            if q_old.is_finite() && q_old - q_new > Q_DECREASE_TOLERANCE * q_old.abs() {
                self.q_decreases += 1;
                warn!("Q decreased from {q_old} to {q_new} at iteration {iterations}");
            }

            if relative_change < tolerance {
                break (true, relative_change);
            }
            if iterations >= self.config.max_iterations {
                warn!(
                    "EM stopped after {iterations} iterations without converging (relative change {relative_change:e})"
                );
                break (false, relative_change);
            }
        };

        if self.degeneracies > 0 {
            warn!(
                "EM skipped {} degenerate updates and kept their previous values",
                self.degeneracies
            );
        }

        let summary = EmSummary {
            iterations,
            converged,
            final_q: q_new,
            relative_change,
            degeneracies: self.degeneracies,
            q_decreases: self.q_decreases,
        };
        info!(
            "EM finished after {iterations} iterations (converged: {converged}, Q = {q_new:.6}, prior = {:.4})",
            self.prior()
        );
        self.last_summary = Some(summary);
        Ok(summary)
    }

    /// `+1` for every cell whose posterior exceeds `threshold`, `-1` otherwise
    pub fn estimated_labels(&self, threshold: f64) -> Vec<Label> {
        self.posteriors()
            .into_iter()
            .map(|posterior| {
                if posterior > threshold {
                    Label::Positive
                } else {
                    Label::Negative
                }
            })
            .collect()
    }

    /// Posterior `Pr[true +1]` of every cell
    pub fn posteriors(&self) -> Vec<f64> {
        self.log_mu.row(POSITIVE).iter().map(|v| v.exp()).collect()
    }

    /// Posterior log-probabilities, row 0 positive and row 1 negative
    pub fn log_posteriors(&self) -> ArrayView2<'_, f64> {
        self.log_mu.view()
    }

    /// Estimated `Pr[true +1]`
    pub fn prior(&self) -> f64 {
        self.log_prior[POSITIVE].exp()
    }

    /// Per-worker sensitivity `alpha_j`
    pub fn sensitivity(&self) -> Vec<f64> {
        self.log_alpha.row(0).iter().map(|v| v.exp()).collect()
    }

    /// Per-worker specificity `beta_j`
    pub fn specificity(&self) -> Vec<f64> {
        self.log_beta.row(0).iter().map(|v| v.exp()).collect()
    }

    /// Q-function value after every completed iteration
    pub fn q_history(&self) -> &[f64] {
        &self.q_history
    }

    /// Number of updates skipped so far because of a zero normalizer
    pub const fn degeneracies(&self) -> usize {
        self.degeneracies
    }

    /// Number of iterations so far whose Q decreased beyond rounding noise
    pub const fn q_decreases(&self) -> usize {
        self.q_decreases
    }

    /// Snapshot of the fitted parameters
    ///
    /// Returns `None` before [`Self::run_em`] has completed.
    pub fn parameters(&self) -> Option<LatentClassParameters> {
        self.last_summary.map(|summary| LatentClassParameters {
            prior: self.prior(),
            sensitivity: self.sensitivity(),
            specificity: self.specificity(),
            posteriors: self.posteriors(),
            q_history: self.q_history.clone(),
            summary,
        })
    }
}
