//! Smooth unconstrained minimization
//!
//! Contains:
//! - The `Objective` trait: a differentiable scalar function
//! - The `Minimizer` trait, so callers can swap the optimizer
//! - `Lbfgs`: argmin's limited-memory BFGS with a More-Thuente line search

use crate::{dot, MathError, Result};
use argmin::core::{
    CostFunction, Error as ArgminError, Executor, Gradient, State, TerminationReason,
};
use argmin::solver::linesearch::MoreThuenteLineSearch;
use argmin::solver::quasinewton::LBFGS;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// A differentiable function to minimize
pub trait Objective {
    /// Number of parameters
    fn dimension(&self) -> usize;

    /// Evaluate the function at `x`, writing the gradient into `gradient`
    fn evaluate(&self, x: &[f64], gradient: &mut [f64]) -> f64;
}

/// Why a minimizer stopped
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Termination {
    /// Gradient norm fell below the tolerance
    GradientTolerance,
    /// Change of the objective between iterations fell below the tolerance
    ObjectiveTolerance,
}

/// Result of a successful minimization
#[derive(Debug, Clone, PartialEq)]
pub struct Minimum {
    /// Minimizing point
    pub x: Vec<f64>,
    /// Objective value at `x`
    pub value: f64,
    /// Iterations used
    pub iterations: usize,
    /// Stopping reason
    pub termination: Termination,
}

/// Common interface for minimizers
pub trait Minimizer {
    /// Minimize `objective` starting from `start`
    fn minimize(&self, objective: &dyn Objective, start: Vec<f64>) -> Result<Minimum>;
}

/// Adapts an `Objective` to argmin's problem traits
struct Problem<'a> {
    objective: &'a dyn Objective,
}

impl CostFunction for Problem<'_> {
    type Param = Vec<f64>;
    type Output = f64;

    fn cost(&self, param: &Self::Param) -> std::result::Result<Self::Output, ArgminError> {
        let mut gradient = vec![0.0; param.len()];
        Ok(self.objective.evaluate(param, &mut gradient))
    }
}

impl Gradient for Problem<'_> {
    type Param = Vec<f64>;
    type Gradient = Vec<f64>;

    fn gradient(&self, param: &Self::Param) -> std::result::Result<Self::Gradient, ArgminError> {
        let mut gradient = vec![0.0; param.len()];
        self.objective.evaluate(param, &mut gradient);
        Ok(gradient)
    }
}

/// Limited-memory BFGS
#[derive(Debug, Clone, PartialEq)]
pub struct Lbfgs {
    memory: usize,
    max_iterations: usize,
    gradient_tolerance: f64,
    objective_tolerance: f64,
    time_limit: Option<Duration>,
}

impl Default for Lbfgs {
    fn default() -> Self {
        Self {
            memory: 10,
            max_iterations: 10_000,
            gradient_tolerance: 1e-8,
            objective_tolerance: 1e-12,
            time_limit: None,
        }
    }
}

fn optimizer_failed(err: ArgminError) -> MathError {
    MathError::OptimizerFailed(err.to_string())
}

impl Lbfgs {
    /// Create a minimizer with the given history size and iteration budget
    pub fn new(memory: usize, max_iterations: usize) -> Result<Self> {
        if memory == 0 {
            return Err(MathError::InvalidInput(
                "L-BFGS memory must be at least 1".to_string(),
            ));
        }
        if max_iterations == 0 {
            return Err(MathError::InvalidInput(
                "Iteration budget must be at least 1".to_string(),
            ));
        }
        Ok(Self {
            memory,
            max_iterations,
            ..Self::default()
        })
    }

    /// Set the objective change, relative to the starting value, that counts as converged
    pub fn with_objective_tolerance(mut self, tolerance: f64) -> Self {
        self.objective_tolerance = tolerance;
        self
    }

    /// Set the gradient norm that counts as converged
    pub fn with_gradient_tolerance(mut self, tolerance: f64) -> Self {
        self.gradient_tolerance = tolerance;
        self
    }

    /// Abort with `DidNotConverge` once this much wall-clock time has passed
    pub fn with_time_limit(mut self, limit: Duration) -> Self {
        self.time_limit = Some(limit);
        self
    }

    pub fn max_iterations(&self) -> usize {
        self.max_iterations
    }
}

impl Minimizer for Lbfgs {
    fn minimize(&self, objective: &dyn Objective, start: Vec<f64>) -> Result<Minimum> {
        let n = objective.dimension();
        if start.len() != n {
            return Err(MathError::InvalidInput(format!(
                "Start point has {} values, objective expects {}",
                start.len(),
                n
            )));
        }

        let mut gradient = vec![0.0; n];
        let initial = objective.evaluate(&start, &mut gradient);
        if !initial.is_finite() {
            return Err(MathError::CalculationError(
                "Objective is not finite at the start point".to_string(),
            ));
        }
        if n == 0 {
            return Ok(Minimum {
                x: start,
                value: initial,
                iterations: 0,
                termination: Termination::GradientTolerance,
            });
        }

        let cost_tolerance = self.objective_tolerance * initial.abs().max(1.0);
        let linesearch = MoreThuenteLineSearch::new()
            .with_c(1e-4, 0.9)
            .map_err(optimizer_failed)?;
        let solver = LBFGS::new(linesearch, self.memory)
            .with_tolerance_grad(self.gradient_tolerance)
            .map_err(optimizer_failed)?
            .with_tolerance_cost(cost_tolerance)
            .map_err(optimizer_failed)?;

        let max_iterations = self.max_iterations as u64;
        let mut executor = Executor::new(Problem { objective }, solver)
            .configure(|state| state.param(start).max_iters(max_iterations));
        if let Some(limit) = self.time_limit {
            executor = executor.timeout(limit);
        }
        let result = executor.run().map_err(optimizer_failed)?;

        let state = &result.state;
        let iterations = state.get_iter() as usize;
        match state.get_termination_reason() {
            Some(TerminationReason::MaxItersReached) => {
                return Err(MathError::DidNotConverge {
                    iterations,
                    reason: format!(
                        "iteration limit of {} reached at objective {:.6e}",
                        self.max_iterations,
                        state.get_best_cost()
                    ),
                });
            }
            Some(TerminationReason::Timeout) => {
                return Err(MathError::DidNotConverge {
                    iterations,
                    reason: format!("time limit of {:?} exceeded", self.time_limit),
                });
            }
            Some(TerminationReason::Interrupt) => {
                return Err(MathError::DidNotConverge {
                    iterations,
                    reason: "interrupted".to_string(),
                });
            }
            _ => {}
        }

        let x = state
            .get_best_param()
            .cloned()
            .ok_or_else(|| MathError::OptimizerFailed("no parameters returned".to_string()))?;
        let value = objective.evaluate(&x, &mut gradient);
        if !value.is_finite() {
            return Err(MathError::CalculationError(
                "Objective is not finite at the optimum".to_string(),
            ));
        }
        let termination = if dot(&gradient, &gradient).sqrt() <= self.gradient_tolerance {
            Termination::GradientTolerance
        } else {
            Termination::ObjectiveTolerance
        };

        Ok(Minimum {
            x,
            value,
            iterations,
            termination,
        })
    }
}
