use crate::error::{SelError, SelResult};
use argmin::core::{CostFunction, Error, Executor, State};
use argmin::solver::brent::BrentOpt;
use argmin::solver::neldermead::NelderMead;
use tracing::trace;

struct CostFunctionWrapper<F> {
    problem: F,
}

impl<F> CostFunction for CostFunctionWrapper<F>
where
    F: Fn(&[f64]) -> SelResult<f64>,
{
    type Param = Vec<f64>;
    type Output = f64;

    fn cost(&self, x: &Self::Param) -> Result<Self::Output, Error> {
        Ok((self.problem)(x.as_slice())?)
    }
}

struct ScalarCostWrapper<F> {
    problem: F,
}

impl<F> CostFunction for ScalarCostWrapper<F>
where
    F: Fn(f64) -> SelResult<f64>,
{
    type Param = f64;
    type Output = f64;

    fn cost(&self, x: &Self::Param) -> Result<Self::Output, Error> {
        Ok((self.problem)(*x)?)
    }
}

/// Errors raised inside a cost function come back as our own type.
fn into_sel_error(err: Error) -> SelError {
    match err.downcast::<SelError>() {
        Ok(e) => e,
        Err(other) => SelError::Optimizer(other.to_string()),
    }
}

/// Edge lengths of the initial simplex.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum SimplexStep {
    /// Same step along every axis.
    Fixed(f64),
    /// 5% of the coordinate, or 0.00025 for zero coordinates.
    Relative,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SimplexOptions {
    pub step: SimplexStep,
    pub max_iters: u64,
    /// Stop once the standard deviation of the vertex costs drops below this.
    pub tolerance: f64,
}

pub fn initial_simplex(start: &[f64], step: SimplexStep) -> Vec<Vec<f64>> {
    let mut simplex = Vec::with_capacity(start.len() + 1);
    simplex.push(start.to_vec());
    for k in 0..start.len() {
        let mut vertex = start.to_vec();
        vertex[k] += match step {
            SimplexStep::Fixed(h) => h,
            SimplexStep::Relative if start[k] != 0.0 => 0.05 * start[k],
            SimplexStep::Relative => 0.00025,
        };
        simplex.push(vertex);
    }
    simplex
}

/// Nelder-Mead minimisation of `problem` from `start`. Returns the best point
/// and its cost. A zero-dimensional problem is evaluated once.
pub fn minimize_simplex<F>(problem: F, start: &[f64], options: SimplexOptions) -> SelResult<(Vec<f64>, f64)>
where
    F: Fn(&[f64]) -> SelResult<f64>,
{
    if start.is_empty() {
        let cost = problem(start)?;
        return Ok((Vec::new(), cost));
    }

    let solver = NelderMead::<Vec<f64>, f64>::new(initial_simplex(start, options.step))
        .with_sd_tolerance(options.tolerance)
        .map_err(into_sel_error)?;
    let result = Executor::new(CostFunctionWrapper { problem }, solver)
        .configure(|state| state.max_iters(options.max_iters))
        .run()
        .map_err(into_sel_error)?;

    let state = result.state();
    let best = state
        .get_best_param()
        .cloned()
        .ok_or_else(|| SelError::Optimizer("simplex finished without a best point".to_string()))?;
    trace!(
        "Simplex finished after {} iterations at cost {}",
        state.get_iter(),
        state.get_best_cost()
    );
    Ok((best, state.get_best_cost()))
}

/// Bounded Brent minimisation of a scalar function.
pub fn minimize_scalar_brent_bounded<F>(problem: F, bounds: (f64, f64), max_iters: u64) -> SelResult<(f64, f64)>
where
    F: Fn(f64) -> SelResult<f64>,
{
    let solver = BrentOpt::new(bounds.0, bounds.1);
    let result = Executor::new(ScalarCostWrapper { problem }, solver)
        .configure(|state| state.max_iters(max_iters))
        .run()
        .map_err(into_sel_error)?;

    let state = result.state();
    let param = *state
        .get_best_param()
        .ok_or_else(|| SelError::Optimizer("Unable to get the best param".to_string()))?;
    Ok((param, state.get_best_cost()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_simplex_finds_quadratic_minimum() {
        let options = SimplexOptions {
            step: SimplexStep::Fixed(1.0),
            max_iters: 2000,
            tolerance: 1e-12,
        };
        let (x, cost) = minimize_simplex(
            |x: &[f64]| Ok((x[0] - 1.5).powi(2) + (x[1] + 0.5).powi(2) + 2.0),
            &[0.0, 0.0],
            options,
        )
        .unwrap();
        assert!((x[0] - 1.5).abs() < 1e-3);
        assert!((x[1] + 0.5).abs() < 1e-3);
        assert!((cost - 2.0).abs() < 1e-6);
    }

    #[test]
    fn test_zero_dimensional_problem_evaluated_once() {
        let options = SimplexOptions {
            step: SimplexStep::Relative,
            max_iters: 10,
            tolerance: 1e-6,
        };
        let (x, cost) = minimize_simplex(|_: &[f64]| Ok(4.0), &[], options).unwrap();
        assert!(x.is_empty());
        assert_eq!(cost, 4.0);
    }

    #[test]
    fn test_cost_errors_propagate_unchanged() {
        let options = SimplexOptions {
            step: SimplexStep::Fixed(1.0),
            max_iters: 10,
            tolerance: 1e-6,
        };
        let err = minimize_simplex(|_: &[f64]| Err(SelError::ZeroLikelihood), &[0.0], options).unwrap_err();
        assert!(matches!(err, SelError::ZeroLikelihood));
    }

    #[test]
    fn test_relative_simplex_steps() {
        let simplex = initial_simplex(&[2.0, 0.0], SimplexStep::Relative);
        assert_eq!(simplex.len(), 3);
        assert!((simplex[1][0] - 2.1).abs() < 1e-12);
        assert_eq!(simplex[1][1], 0.0);
        assert_eq!(simplex[2][0], 2.0);
        assert!((simplex[2][1] - 0.00025).abs() < 1e-15);
    }

    #[test]
    fn test_brent_bounded() {
        let (x, cost) = minimize_scalar_brent_bounded(|t| Ok((t - 0.3).powi(2)), (1e-7, 10.0), 1000).unwrap();
        assert!((x - 0.3).abs() < 1e-5);
        assert!(cost < 1e-9);

        // Minimum outside the interval lands on the boundary
        let (x, _) = minimize_scalar_brent_bounded(|t| Ok(t), (1e-7, 10.0), 1000).unwrap();
        assert!(x < 1e-4);
    }
}
