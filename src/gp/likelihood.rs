// [[file:../../otf.note::*header][header:1]]
//! Hyperparameter optimization by maximizing the marginal likelihood
// header:1 ends here

// [[file:../../otf.note::*imports][imports:1]]
use super::*;

use argmin::core::{CostFunction, Executor, Gradient, State, TerminationReason};
use argmin::solver::linesearch::MoreThuenteLineSearch;
use argmin::solver::neldermead::NelderMead;
use argmin::solver::quasinewton::LBFGS;
// imports:1 ends here

// [[file:../../otf.note::5a0b9e27][5a0b9e27]]
impl GaussianProcess {
    /// Return the negative log marginal likelihood of the training set with
    /// `hyps`, and its gradient with respect to all hyperparameters.
    pub fn likelihood_and_grad(&self, hyps: &[f64]) -> Result<(f64, Vec<f64>)> {
        check_hyps(&self.kernels, hyps)?;
        if !self.has_training_data() {
            bail!("GP model has no training data");
        }

        let n = self.store.nlabels();
        let sn = hyps[hyps.len() - 1];
        let (mut ky, dk) = self.covariance_grad(hyps);
        for i in 0..n {
            ky[(i, i)] += sn * sn;
        }

        let chol = ky
            .cholesky()
            .ok_or_else(|| format_err!("covariance matrix is not positive definite with hyps {:?}", hyps))?;
        let y = DVector::from_column_slice(self.store.labels());
        let alpha = chol.solve(&y);
        let kinv = chol.inverse();
        let nll = 0.5 * y.dot(&alpha)
            + chol.l().diagonal().iter().map(|x| x.ln()).sum::<f64>()
            + 0.5 * n as f64 * (2.0 * std::f64::consts::PI).ln();

        // dL/dh = -1/2 tr((alpha alpha^T - K^-1) dK/dh)
        let w = &alpha * alpha.transpose() - kinv;
        let mut grad: Vec<f64> = dk.iter().map(|dki| -0.5 * w.component_mul(dki).sum()).collect();
        // dK/dsn = 2 sn I
        grad.push(-sn * w.trace());

        Ok((nll, grad))
    }
}
// 5a0b9e27 ends here

// [[file:../../otf.note::f4c27a90][f4c27a90]]
struct Likelihood<'a> {
    gp: &'a GaussianProcess,
}

impl CostFunction for Likelihood<'_> {
    type Param = Vec<f64>;
    type Output = f64;

    fn cost(&self, hyps: &Self::Param) -> std::result::Result<Self::Output, argmin::core::Error> {
        let model = self.gp.factorize(hyps)?;
        Ok(model.nll)
    }
}

impl Gradient for Likelihood<'_> {
    type Param = Vec<f64>;
    type Gradient = Vec<f64>;

    fn gradient(&self, hyps: &Self::Param) -> std::result::Result<Self::Gradient, argmin::core::Error> {
        let (_, grad) = self.gp.likelihood_and_grad(hyps)?;
        Ok(grad)
    }
}

struct Optimized {
    hyps: Vec<f64>,
    iterations: u64,
    converged: bool,
    reason: String,
}

fn collect_state<S>(state: &S) -> Result<Optimized>
where
    S: State<Param = Vec<f64>>,
{
    let reason = state.get_termination_reason();
    let converged = matches!(
        reason,
        Some(TerminationReason::SolverConverged) | Some(TerminationReason::TargetCostReached)
    );
    let hyps = state
        .get_best_param()
        .cloned()
        .ok_or_else(|| format_err!("optimizer returned no parameters"))?;

    Ok(Optimized {
        hyps,
        iterations: state.get_iter(),
        converged,
        reason: format!("{:?}", reason),
    })
}

fn run_lbfgs(problem: Likelihood, init: Vec<f64>, maxiter: u64, grad_tol: f64) -> Result<Optimized> {
    let linesearch = MoreThuenteLineSearch::new();
    let solver = LBFGS::new(linesearch, 7).with_tolerance_grad(grad_tol)?;
    let res = Executor::new(problem, solver)
        .configure(|state| state.param(init).max_iters(maxiter))
        .run()?;
    collect_state(res.state())
}

// initial simplex: the starting point and one vertex per dimension, each
// displaced by 10%
fn initial_simplex(init: &[f64]) -> Vec<Vec<f64>> {
    let mut simplex = vec![init.to_vec()];
    for i in 0..init.len() {
        let mut v = init.to_vec();
        v[i] = if v[i] == 0.0 { 0.1 } else { v[i] * 1.1 };
        simplex.push(v);
    }
    simplex
}

fn run_nelder_mead(problem: Likelihood, init: Vec<f64>, maxiter: u64, sd_tol: f64) -> Result<Optimized> {
    let solver = NelderMead::new(initial_simplex(&init)).with_sd_tolerance(sd_tol)?;
    let res = Executor::new(problem, solver)
        .configure(|state| state.max_iters(maxiter))
        .run()?;
    collect_state(res.state())
}
// f4c27a90 ends here

// [[file:../../otf.note::1c7e5f30][1c7e5f30]]
impl GaussianProcess {
    /// Optimize hyperparameters in place. On failure the current
    /// hyperparameters are left untouched.
    pub(super) fn optimize_hyps(&mut self) -> TrainStatus {
        let init = self.hyps.clone();
        let maxiter = self.maxiter as u64;
        debug!("optimize {} hyperparameters with {} from {:?}", init.len(), self.algo, init);

        let problem = Likelihood { gp: &*self };
        let result = match self.algo {
            OptAlgorithm::Lbfgs => run_lbfgs(problem, init, maxiter, self.grad_tol),
            OptAlgorithm::NelderMead => run_nelder_mead(problem, init, maxiter, self.grad_tol),
        };

        let opt = match result {
            Ok(opt) => opt,
            Err(e) => {
                return TrainStatus::NotConverged {
                    reason: format!("optimizer error: {:?}", e),
                }
            }
        };
        if !opt.converged {
            return TrainStatus::NotConverged {
                reason: format!("{} stopped after {} iterations: {}", self.algo, opt.iterations, opt.reason),
            };
        }
        if let Err(e) = check_hyps(&self.kernels, &opt.hyps).and_then(|_| self.factorize(&opt.hyps)) {
            return TrainStatus::NotConverged {
                reason: format!("rejected optimized hyperparameters {:?}: {}", opt.hyps, e),
            };
        }

        self.hyps = opt.hyps;
        self.model = None;
        TrainStatus::Converged {
            iterations: opt.iterations,
        }
    }
}
// 1c7e5f30 ends here

// [[file:../../otf.note::8e3b6d92][8e3b6d92]]
#[cfg(test)]
mod tests {
    use super::*;
    use approx::*;

    fn trained_gp(algo: OptAlgorithm, maxiter: usize) -> GaussianProcess {
        let mol = Molecule::from_atoms(vec![
            ("H", [0.0, 0.0, 0.0]),
            ("H", [1.4, 0.0, 0.0]),
            ("H", [0.2, 1.3, 0.1]),
        ]);
        let mut s = Structure::from_molecule(&mol, crate::structure::h2_masses(), None).unwrap();
        let lj = LennardJones::default();
        let mut forces = vec![[0.0; 3]; 3];
        s.energy = Some(lj.evaluate(s.positions(), &mut forces));

        let mut gp = GaussianProcess::new(KernelSet::two_body(), vec![2.0, 0.9, 0.05], vec![3.0])
            .unwrap()
            .with_optimizer(algo, maxiter, 1e-4)
            .with_energy_labels(true);
        gp.update_db(&s, Some(&forces), None).unwrap();
        gp
    }

    #[test]
    fn test_likelihood_gradient() -> Result<()> {
        let gp = trained_gp(OptAlgorithm::Lbfgs, 0);
        let hyps = gp.hyps().to_vec();
        let (nll, grad) = gp.likelihood_and_grad(&hyps)?;
        assert!(nll.is_finite());
        assert_eq!(grad.len(), 3);

        let h = 1e-6;
        for i in 0..3 {
            let mut hp = hyps.clone();
            let mut hm = hyps.clone();
            hp[i] += h;
            hm[i] -= h;
            let fd = (gp.likelihood_and_grad(&hp)?.0 - gp.likelihood_and_grad(&hm)?.0) / (2.0 * h);
            assert_relative_eq!(grad[i], fd, epsilon = 1e-4, max_relative = 1e-4);
        }

        Ok(())
    }

    #[test]
    fn test_likelihood_matches_factorization() -> Result<()> {
        let mut gp = trained_gp(OptAlgorithm::Lbfgs, 0);
        gp.train()?;
        let (nll, _) = gp.likelihood_and_grad(gp.hyps())?;
        assert_relative_eq!(nll, gp.likelihood().unwrap(), epsilon = 1e-8);

        // the optimizer cost skips the gradient but agrees with it
        let problem = Likelihood { gp: &gp };
        let hyps = gp.hyps().to_vec();
        assert_relative_eq!(problem.cost(&hyps).unwrap(), nll, epsilon = 1e-8);
        let other = vec![hyps[0] * 1.2, hyps[1] * 0.9, hyps[2]];
        let (nll_other, _) = gp.likelihood_and_grad(&other)?;
        assert_relative_eq!(problem.cost(&other).unwrap(), nll_other, epsilon = 1e-8);
        Ok(())
    }

    #[test]
    fn test_not_converged_keeps_hyps() -> Result<()> {
        // a single iteration is not enough to reach the gradient tolerance
        let mut gp = trained_gp(OptAlgorithm::Lbfgs, 1);
        let old = gp.hyps().to_vec();
        let status = gp.train()?;
        assert!(matches!(status, TrainStatus::NotConverged { .. }));
        assert_eq!(gp.hyps(), &old[..]);
        assert!(gp.is_trained());
        Ok(())
    }

    #[test]
    fn test_optimization_improves_likelihood() -> Result<()> {
        for algo in [OptAlgorithm::Lbfgs, OptAlgorithm::NelderMead].iter() {
            let mut gp = trained_gp(*algo, 500);
            let (nll0, _) = gp.likelihood_and_grad(gp.hyps())?;
            match gp.train()? {
                TrainStatus::Converged { .. } => {
                    assert!(gp.likelihood().unwrap() <= nll0 + 1e-8);
                }
                TrainStatus::NotConverged { .. } => {
                    // hyperparameters untouched on failure
                    assert_eq!(gp.hyps(), &[2.0, 0.9, 0.05]);
                }
                TrainStatus::Fixed => unreachable!(),
            }
        }
        Ok(())
    }

    #[test]
    fn test_initial_simplex() {
        let s = initial_simplex(&[1.0, 0.0]);
        assert_eq!(s, vec![vec![1.0, 0.0], vec![1.1, 0.0], vec![1.0, 0.1]]);
    }
}
// 8e3b6d92 ends here
