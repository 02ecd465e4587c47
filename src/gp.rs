// [[file:../otf.note::*header][header:1]]
//! Gaussian process regression of forces and energies over atomic
//! environments
//!
//! # Usage
//!
//! ```ignore
//! use gosh_otf::*;
//!
//! let mut gp = GaussianProcess::new(KernelSet::two_body(), vec![1.0, 1.0, 0.05], vec![4.0])?;
//! gp.update_db(&structure, Some(&forces), None)?;
//! let status = gp.train()?;
//!
//! let env = AtomicEnvironment::new(&structure, 0, 4.0);
//! let (force_x, var_x) = gp.predict(&env, 0)?;
//! ```
// header:1 ends here

// [[file:../otf.note::c3765387][c3765387]]
use std::fmt;
use std::str::FromStr;

use super::*;

use nalgebra::{DMatrix, DVector};

mod likelihood;
mod store;

pub use self::store::{LabelPoint, TrainingStore, TrainingStructure};
// c3765387 ends here

// [[file:../otf.note::a90d3c55][a90d3c55]]
/// Local optimizer for hyperparameters
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum OptAlgorithm {
    #[serde(rename = "L-BFGS", alias = "BFGS", alias = "L-BFGS-B", alias = "lbfgs")]
    Lbfgs,
    #[serde(rename = "Nelder-Mead", alias = "nelder-mead")]
    NelderMead,
}

impl Default for OptAlgorithm {
    fn default() -> Self {
        OptAlgorithm::Lbfgs
    }
}

impl fmt::Display for OptAlgorithm {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            OptAlgorithm::Lbfgs => write!(f, "L-BFGS"),
            OptAlgorithm::NelderMead => write!(f, "Nelder-Mead"),
        }
    }
}

impl FromStr for OptAlgorithm {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_uppercase().as_str() {
            "L-BFGS" | "L-BFGS-B" | "BFGS" | "LBFGS" => Ok(OptAlgorithm::Lbfgs),
            "NELDER-MEAD" | "NELDERMEAD" => Ok(OptAlgorithm::NelderMead),
            _ => bail!("unknown hyperparameter optimizer: {}", s),
        }
    }
}

/// The outcome of hyperparameter training
#[derive(Debug, Clone, PartialEq)]
pub enum TrainStatus {
    /// Hyperparameters are kept fixed (`maxiter` is zero).
    Fixed,
    /// Optimizer converged; hyperparameters updated.
    Converged { iterations: u64 },
    /// Optimizer failed; previous hyperparameters are kept.
    NotConverged { reason: String },
}
// a90d3c55 ends here

// [[file:../otf.note::*base][base:1]]
/// The cached factorization of the training covariance.
#[derive(Debug, Clone)]
struct Factorized {
    /// Lower Cholesky factor of `K + sn^2 I`
    l: DMatrix<f64>,
    /// `(K + sn^2 I)^-1 y`
    alpha: DVector<f64>,
    /// Negative log marginal likelihood
    nll: f64,
}

/// GP model of atomic forces, with optional total energy labels
#[derive(Debug, Clone)]
pub struct GaussianProcess {
    kernels: KernelSet,
    /// Kernel hyperparameters, noise std last.
    hyps: Vec<f64>,
    cutoffs: Vec<f64>,

    algo: OptAlgorithm,
    maxiter: usize,
    grad_tol: f64,
    /// Accept total energy labels in the training set.
    energy_labels: bool,

    store: TrainingStore,
    // invalidated on any change of training data or hyperparameters
    model: Option<Factorized>,
}
// base:1 ends here

// [[file:../otf.note::0e2d6b8f][0e2d6b8f]]
impl GaussianProcess {
    /// Construct a GP with no training data.
    pub fn new(kernels: KernelSet, hyps: Vec<f64>, cutoffs: Vec<f64>) -> Result<Self> {
        check_hyps(&kernels, &hyps)?;
        if cutoffs.is_empty() || cutoffs.iter().any(|&r| !(r > 0.0)) {
            bail!("invalid cutoffs: {:?}", cutoffs);
        }

        Ok(Self {
            kernels,
            hyps,
            cutoffs,
            algo: OptAlgorithm::default(),
            maxiter: 10,
            grad_tol: 1e-4,
            energy_labels: false,
            store: TrainingStore::default(),
            model: None,
        })
    }

    /// Set the hyperparameter optimizer. `maxiter` of zero keeps
    /// hyperparameters fixed in training.
    pub fn with_optimizer(mut self, algo: OptAlgorithm, maxiter: usize, grad_tol: f64) -> Self {
        self.algo = algo;
        self.maxiter = maxiter;
        self.grad_tol = grad_tol;
        self
    }

    /// Enable or disable total energy labels.
    pub fn with_energy_labels(mut self, enabled: bool) -> Self {
        self.energy_labels = enabled;
        self
    }

    pub fn hyps(&self) -> &[f64] {
        &self.hyps
    }

    pub fn hyp_labels(&self) -> &[String] {
        &self.kernels.hyp_labels
    }

    pub fn cutoffs(&self) -> &[f64] {
        &self.cutoffs
    }

    pub fn kernel_name(&self) -> &str {
        self.kernels.name
    }

    pub fn algo(&self) -> OptAlgorithm {
        self.algo
    }

    pub fn maxiter(&self) -> usize {
        self.maxiter
    }

    pub fn supports_energy_labels(&self) -> bool {
        self.energy_labels
    }

    /// The noise std, i.e. the last hyperparameter.
    pub fn noise(&self) -> f64 {
        self.hyps[self.hyps.len() - 1]
    }

    pub fn training_set(&self) -> &TrainingStore {
        &self.store
    }

    /// Return true if there is at least one training label.
    pub fn has_training_data(&self) -> bool {
        !self.store.is_empty()
    }

    /// Return true if the model is ready for prediction.
    pub fn is_trained(&self) -> bool {
        self.model.is_some()
    }

    /// Replace hyperparameters. The model needs to be trained again.
    pub fn set_hyps(&mut self, hyps: Vec<f64>) -> Result<()> {
        check_hyps(&self.kernels, &hyps)?;
        self.hyps = hyps;
        self.model = None;
        Ok(())
    }

    /// Negative log marginal likelihood of the trained model.
    pub fn likelihood(&self) -> Option<f64> {
        self.model.as_ref().map(|m| m.nll)
    }
}

fn check_hyps(kernels: &KernelSet, hyps: &[f64]) -> Result<()> {
    if hyps.len() != kernels.nhyps() {
        bail!(
            "kernel {} expects {} hyperparameters, but found {}",
            kernels.name,
            kernels.nhyps(),
            hyps.len()
        );
    }
    if hyps.iter().any(|x| !x.is_finite()) {
        bail!("invalid hyperparameters: {:?}", hyps);
    }
    Ok(())
}
// 0e2d6b8f ends here

// [[file:../otf.note::5d8ac21e][5d8ac21e]]
impl GaussianProcess {
    /// Add a structure to the training set.
    ///
    /// # Parameters
    ///
    /// * structure: the structure with labels; its `energy` is used only when
    ///   energy labels are enabled
    /// * forces: force labels for all atoms, None for energy-only training
    /// * force_range: atoms whose forces are used; all atoms if None
    pub fn update_db(
        &mut self,
        structure: &Structure,
        forces: Option<&[[f64; 3]]>,
        force_range: Option<&[usize]>,
    ) -> Result<()> {
        let energy = match structure.energy {
            Some(_) if !self.energy_labels => {
                debug!("GP model does not support energy labels; energy ignored.");
                None
            }
            e => e,
        };

        let envs = AtomicEnvironment::all(structure, self.cutoffs[0]);
        self.store.add(envs, energy, forces, force_range)?;
        self.model = None;

        Ok(())
    }

    /// Optimize hyperparameters (unless fixed) and factorize the covariance
    /// matrix. Safe to call repeatedly as the training set grows.
    pub fn train(&mut self) -> Result<TrainStatus> {
        if !self.has_training_data() {
            bail!("GP model has no training data");
        }

        let status = if self.maxiter == 0 {
            TrainStatus::Fixed
        } else {
            self.optimize_hyps()
        };
        match &status {
            TrainStatus::Converged { iterations } => {
                info!("hyperparameters optimized in {} iterations: {:?}", iterations, self.hyps);
            }
            TrainStatus::NotConverged { reason } => {
                warn!("hyperparameter optimization failed: {}", reason);
                warn!("keep previous hyperparameters: {:?}", self.hyps);
            }
            TrainStatus::Fixed => {}
        }

        self.set_l_alpha()?;
        Ok(status)
    }

    /// Factorize the covariance of the current training set with the current
    /// hyperparameters.
    pub fn set_l_alpha(&mut self) -> Result<()> {
        self.model = Some(self.factorize(&self.hyps)?);
        Ok(())
    }

    fn factorize(&self, hyps: &[f64]) -> Result<Factorized> {
        let n = self.store.nlabels();
        let sn = hyps[hyps.len() - 1];
        let mut ky = self.covariance(hyps);
        for i in 0..n {
            ky[(i, i)] += sn * sn;
        }

        let chol = ky
            .cholesky()
            .ok_or_else(|| format_err!("covariance matrix is not positive definite with hyps {:?}", hyps))?;
        let y = DVector::from_column_slice(self.store.labels());
        let alpha = chol.solve(&y);
        let l = chol.unpack();
        let nll = 0.5 * y.dot(&alpha)
            + l.diagonal().iter().map(|x| x.ln()).sum::<f64>()
            + 0.5 * n as f64 * (2.0 * std::f64::consts::PI).ln();

        Ok(Factorized { l, alpha, nll })
    }

    fn model(&self) -> Result<&Factorized> {
        if !self.has_training_data() {
            bail!("GP model has no training data");
        }
        self.model
            .as_ref()
            .ok_or_else(|| format_err!("GP model is not trained since last update"))
    }
}
// 5d8ac21e ends here

// [[file:../otf.note::e7a4c9d1][e7a4c9d1]]
impl GaussianProcess {
    /// Predict force component `d` (0-based) of the central atom in `env`.
    /// Return the predicted force and its variance.
    pub fn predict(&self, env: &AtomicEnvironment, d: usize) -> Result<(f64, f64)> {
        let model = self.model()?;
        let kv = DVector::from_vec(self.get_kernel_vector(env, d));
        let self_kern = (self.kernels.force)(env, env, d, d, &self.hyps, &self.cutoffs);
        predict_with(model, &kv, self_kern)
    }

    /// Predict the local energy of `env`.
    pub fn predict_local_energy(&self, env: &AtomicEnvironment) -> Result<f64> {
        let model = self.model()?;
        let kv = DVector::from_vec(self.en_kern_vec(env));
        Ok(kv.dot(&model.alpha))
    }

    /// Predict the local energy of `env` and its variance.
    pub fn predict_local_energy_and_var(&self, env: &AtomicEnvironment) -> Result<(f64, f64)> {
        let model = self.model()?;
        let kv = DVector::from_vec(self.en_kern_vec(env));
        let self_kern = (self.kernels.energy)(env, env, &self.hyps, &self.cutoffs);
        predict_with(model, &kv, self_kern)
    }

    /// Prior mean and variance of force component `d`, for use before any
    /// training data exists.
    pub fn predict_prior(&self, env: &AtomicEnvironment, d: usize) -> (f64, f64) {
        let var = (self.kernels.force)(env, env, d, d, &self.hyps, &self.cutoffs);
        (0.0, var)
    }

    /// Kernel vector between force component `d` of `env` and the training
    /// set.
    pub fn get_kernel_vector(&self, env: &AtomicEnvironment, d: usize) -> Vec<f64> {
        self.force_kernel_vector(env, d, &self.hyps)
    }

    /// Kernel vector between the local energy of `env` and the training set.
    pub fn en_kern_vec(&self, env: &AtomicEnvironment) -> Vec<f64> {
        self.energy_kernel_vector(env, &self.hyps)
    }
}

fn predict_with(model: &Factorized, kv: &DVector<f64>, self_kern: f64) -> Result<(f64, f64)> {
    let mean = kv.dot(&model.alpha);
    let v = model
        .l
        .solve_lower_triangular(kv)
        .ok_or_else(|| format_err!("singular Cholesky factor"))?;
    Ok((mean, self_kern - v.dot(&v)))
}
// e7a4c9d1 ends here

// [[file:../otf.note::4c0f8b37][4c0f8b37]]
// kernel vectors and covariance with explicit hyperparameters
impl GaussianProcess {
    fn force_kernel_vector(&self, env: &AtomicEnvironment, d: usize, hyps: &[f64]) -> Vec<f64> {
        let k = &self.kernels;
        let cutoffs = &self.cutoffs;
        self.store.assemble(
            |envs| envs.iter().map(|x| (k.energy_force)(env, x, d, hyps, cutoffs)).sum(),
            |x, d2| (k.force)(env, x, d, d2, hyps, cutoffs),
        )
    }

    fn energy_kernel_vector(&self, env: &AtomicEnvironment, hyps: &[f64]) -> Vec<f64> {
        let k = &self.kernels;
        let cutoffs = &self.cutoffs;
        self.store.assemble(
            |envs| envs.iter().map(|x| (k.energy)(env, x, hyps, cutoffs)).sum(),
            |x, d2| (k.energy_force)(x, env, d2, hyps, cutoffs),
        )
    }

    fn force_kernel_vector_grad(&self, env: &AtomicEnvironment, d: usize, hyps: &[f64]) -> Vec<(f64, Vec<f64>)> {
        let k = &self.kernels;
        let ng = hyps.len() - 1;
        let cutoffs = &self.cutoffs;
        self.store.assemble(
            |envs| sum_grads(ng, envs.iter().map(|x| (k.energy_force_grad)(env, x, d, hyps, cutoffs))),
            |x, d2| (k.force_grad)(env, x, d, d2, hyps, cutoffs),
        )
    }

    fn energy_kernel_vector_grad(&self, env: &AtomicEnvironment, hyps: &[f64]) -> Vec<(f64, Vec<f64>)> {
        let k = &self.kernels;
        let ng = hyps.len() - 1;
        let cutoffs = &self.cutoffs;
        self.store.assemble(
            |envs| sum_grads(ng, envs.iter().map(|x| (k.energy_grad)(env, x, hyps, cutoffs))),
            |x, d2| (k.energy_force_grad)(x, env, d2, hyps, cutoffs),
        )
    }

    // one row of the training covariance
    fn kernel_row(&self, p: &LabelPoint, hyps: &[f64]) -> Vec<f64> {
        match *p {
            LabelPoint::Force(env, d) => self.force_kernel_vector(env, d, hyps),
            LabelPoint::Energy(envs) => {
                let mut row = vec![0.0; self.store.nlabels()];
                for env in envs {
                    for (r, x) in row.iter_mut().zip(self.energy_kernel_vector(env, hyps)) {
                        *r += x;
                    }
                }
                row
            }
        }
    }

    fn kernel_row_grad(&self, p: &LabelPoint, hyps: &[f64]) -> Vec<(f64, Vec<f64>)> {
        match *p {
            LabelPoint::Force(env, d) => self.force_kernel_vector_grad(env, d, hyps),
            LabelPoint::Energy(envs) => {
                let n = self.store.nlabels();
                let ng = hyps.len() - 1;
                let mut row = vec![(0.0, vec![0.0; ng]); n];
                for env in envs {
                    for (r, (x, g)) in row.iter_mut().zip(self.energy_kernel_vector_grad(env, hyps)) {
                        add_grad(r, x, &g);
                    }
                }
                row
            }
        }
    }

    /// Covariance matrix of the training labels, without noise.
    fn covariance(&self, hyps: &[f64]) -> DMatrix<f64> {
        let n = self.store.nlabels();
        let points = self.store.label_points();
        let rows: Vec<_> = points.par_iter().map(|p| self.kernel_row(p, hyps)).collect();
        DMatrix::from_fn(n, n, |i, j| rows[i][j])
    }

    /// Covariance matrix and its derivatives with respect to the kernel
    /// hyperparameters (all but the noise), without noise.
    fn covariance_grad(&self, hyps: &[f64]) -> (DMatrix<f64>, Vec<DMatrix<f64>>) {
        let n = self.store.nlabels();
        let ng = hyps.len() - 1;
        let points = self.store.label_points();
        let rows: Vec<_> = points.par_iter().map(|p| self.kernel_row_grad(p, hyps)).collect();
        let k = DMatrix::from_fn(n, n, |i, j| rows[i][j].0);
        let dk = (0..ng).map(|h| DMatrix::from_fn(n, n, |i, j| rows[i][j].1[h])).collect();
        (k, dk)
    }
}

fn add_grad(acc: &mut (f64, Vec<f64>), x: f64, g: &[f64]) {
    acc.0 += x;
    for (a, b) in acc.1.iter_mut().zip(g) {
        *a += b;
    }
}

fn sum_grads(ng: usize, parts: impl Iterator<Item = (f64, Vec<f64>)>) -> (f64, Vec<f64>) {
    let mut acc = (0.0, vec![0.0; ng]);
    for (x, g) in parts {
        add_grad(&mut acc, x, &g);
    }
    acc
}
// 4c0f8b37 ends here

// [[file:../otf.note::9b1f0e6a][9b1f0e6a]]
#[cfg(test)]
mod tests {
    use super::*;
    use approx::*;

    fn h3(dx: f64) -> Structure {
        let mol = Molecule::from_atoms(vec![
            ("H", [0.0, 0.0, 0.0]),
            ("H", [1.4 + dx, 0.0, 0.0]),
            ("H", [0.2, 1.3, 0.1]),
        ]);
        Structure::from_molecule(&mol, crate::structure::h2_masses(), None).unwrap()
    }

    fn lj_forces(s: &Structure) -> (f64, Vec<[f64; 3]>) {
        let lj = LennardJones::default();
        let mut forces = vec![[0.0; 3]; s.natoms()];
        let e = lj.evaluate(s.positions(), &mut forces);
        (e, forces)
    }

    fn new_gp() -> GaussianProcess {
        GaussianProcess::new(KernelSet::two_body(), vec![2.0, 0.9, 0.01], vec![3.0])
            .unwrap()
            .with_optimizer(OptAlgorithm::Lbfgs, 0, 1e-4)
    }

    #[test]
    fn test_predict_before_training() {
        let gp = new_gp();
        let s = h3(0.0);
        let env = AtomicEnvironment::new(&s, 0, 3.0);
        assert!(gp.predict(&env, 0).is_err());
        assert!(gp.predict_local_energy(&env).is_err());
        let (mean, var) = gp.predict_prior(&env, 0);
        assert_eq!(mean, 0.0);
        assert!(var > 0.0);

        let mut gp = gp;
        assert!(gp.train().is_err());
    }

    #[test]
    fn test_kernel_vector_length() -> Result<()> {
        let mut gp = new_gp().with_energy_labels(true);
        let mut s = h3(0.0);
        let (e, f) = lj_forces(&s);
        s.energy = Some(e);
        gp.update_db(&s, Some(&f), Some(&[0, 2]))?;
        let s2 = h3(0.1);
        let (_, f2) = lj_forces(&s2);
        gp.update_db(&s2, Some(&f2), None)?;

        let n = gp.training_set().nlabels();
        assert_eq!(n, 7 + 9);
        let env = AtomicEnvironment::new(&s, 1, 3.0);
        assert_eq!(gp.get_kernel_vector(&env, 2).len(), n);
        assert_eq!(gp.en_kern_vec(&env).len(), n);

        Ok(())
    }

    #[test]
    fn test_energy_labels_disabled() -> Result<()> {
        let mut gp = new_gp();
        let mut s = h3(0.0);
        let (e, f) = lj_forces(&s);
        s.energy = Some(e);
        gp.update_db(&s, Some(&f), None)?;
        assert_eq!(gp.training_set().nlabels(), 9);
        assert!(gp.training_set().structures()[0].energy().is_none());
        Ok(())
    }

    #[test]
    fn test_covariance_symmetric() -> Result<()> {
        let mut gp = new_gp().with_energy_labels(true);
        let mut s = h3(0.0);
        let (e, f) = lj_forces(&s);
        s.energy = Some(e);
        gp.update_db(&s, Some(&f), Some(&[1]))?;
        let mut s2 = h3(-0.1);
        let (e2, _) = lj_forces(&s2);
        s2.energy = Some(e2);
        gp.update_db(&s2, None, None)?;

        let k = gp.covariance(gp.hyps());
        assert_eq!(k.nrows(), 5);
        assert!((&k - k.transpose()).amax() < 1e-10);

        // the rows with gradients agree with plain rows
        let (k2, dk) = gp.covariance_grad(gp.hyps());
        assert!((&k - &k2).amax() < 1e-10);
        assert_eq!(dk.len(), 2);
        Ok(())
    }

    #[test]
    fn test_predict_training_point() -> Result<()> {
        let mut gp = new_gp();
        let s = h3(0.0);
        let (_, f) = lj_forces(&s);
        gp.update_db(&s, Some(&f), None)?;
        // training data changed, not ready for prediction
        let env = AtomicEnvironment::new(&s, 2, 3.0);
        assert!(gp.predict(&env, 0).is_err());

        assert_eq!(gp.train()?, TrainStatus::Fixed);
        assert!(gp.is_trained());
        assert!(gp.likelihood().is_some());
        for i in 0..s.natoms() {
            let env = AtomicEnvironment::new(&s, i, 3.0);
            for d in 0..3 {
                let (force, var) = gp.predict(&env, d)?;
                // nearly interpolating with small noise
                assert_relative_eq!(force, f[i][d], epsilon = 0.05 * f[i][d].abs().max(1.0));
                assert!(var.abs() < 1e-3);
            }
        }
        assert!(gp.predict_local_energy(&env)?.is_finite());
        let (_, var) = gp.predict_local_energy_and_var(&env)?;
        assert!(var.is_finite());

        Ok(())
    }

    #[test]
    fn test_predict_local_energy() -> Result<()> {
        let mut gp = GaussianProcess::new(KernelSet::two_body(), vec![2.0, 0.9, 1e-3], vec![3.0])?
            .with_optimizer(OptAlgorithm::Lbfgs, 0, 1e-4)
            .with_energy_labels(true);
        let mol = Molecule::from_atoms(vec![("H", [0.0, 0.0, 0.0]), ("H", [1.5, 0.0, 0.0])]);
        let mut s = Structure::from_molecule(&mol, crate::structure::h2_masses(), None)?;
        let (e, _) = lj_forces(&s);
        s.energy = Some(e);
        gp.update_db(&s, None, None)?;
        assert_eq!(gp.training_set().nlabels(), 1);
        assert_eq!(gp.train()?, TrainStatus::Fixed);

        // both atoms see the same environment and share the total energy
        let mut total = 0.0;
        for i in 0..s.natoms() {
            let env = AtomicEnvironment::new(&s, i, 3.0);
            let local = gp.predict_local_energy(&env)?;
            assert_relative_eq!(local, e / 2.0, epsilon = 1e-4);
            let (mean, var) = gp.predict_local_energy_and_var(&env)?;
            assert_relative_eq!(mean, local, epsilon = 1e-12);
            assert!(var.abs() < 1e-4, "variance {}", var);
            total += local;
        }
        assert_relative_eq!(total, e, epsilon = 1e-4);

        Ok(())
    }

    #[test]
    fn test_train_idempotent() -> Result<()> {
        let mut gp = new_gp();
        let s = h3(0.0);
        let (_, f) = lj_forces(&s);
        gp.update_db(&s, Some(&f), None)?;
        gp.train()?;
        let env = AtomicEnvironment::new(&s, 0, 3.0);
        let p1 = gp.predict(&env, 1)?;
        gp.train()?;
        let p2 = gp.predict(&env, 1)?;
        assert_eq!(p1, p2);
        Ok(())
    }

    #[test]
    fn test_set_hyps() {
        let mut gp = new_gp();
        assert!(gp.set_hyps(vec![1.0, 1.0]).is_err());
        assert!(gp.set_hyps(vec![1.0, f64::NAN, 0.1]).is_err());
        assert!(gp.set_hyps(vec![1.0, 1.0, 0.2]).is_ok());
        assert_eq!(gp.noise(), 0.2);
        assert!(GaussianProcess::new(KernelSet::two_body(), vec![1.0, 1.0, 0.1], vec![]).is_err());
    }

    #[test]
    fn test_opt_algorithm() -> Result<()> {
        assert_eq!("BFGS".parse::<OptAlgorithm>()?, OptAlgorithm::Lbfgs);
        assert_eq!("L-BFGS-B".parse::<OptAlgorithm>()?, OptAlgorithm::Lbfgs);
        assert_eq!("nelder-mead".parse::<OptAlgorithm>()?, OptAlgorithm::NelderMead);
        assert!("CG".parse::<OptAlgorithm>().is_err());
        assert_eq!(OptAlgorithm::Lbfgs.to_string(), "L-BFGS");
        let algo: OptAlgorithm = serde_json::from_str("\"BFGS\"")?;
        assert_eq!(algo, OptAlgorithm::Lbfgs);
        Ok(())
    }
}
// 9b1f0e6a ends here
