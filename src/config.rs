// [[file:../otf.note::*header][header:1]]
//! Configuration of an OTF run
// header:1 ends here

// [[file:../otf.note::*imports][imports:1]]
use std::collections::HashMap;
use std::path::{Path, PathBuf};

use super::*;
// imports:1 ends here

// [[file:../otf.note::0b7d3e58][0b7d3e58]]
/// Settings of an OTF run, usually read from a JSON file.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OtfConfig {
    /// Time step in ps
    pub dt: f64,
    /// Total number of MD steps
    pub number_of_steps: usize,
    /// Cutoff radius of atomic environments
    pub cutoff: f64,
    /// Uncertainty tolerance. Zero disables DFT calls; a negative value is
    /// an absolute cutoff; a positive value is a multiple of the noise
    /// hyperparameter.
    pub std_tolerance_factor: f64,

    /// Name of the kernel family
    pub kernel: String,
    /// Initial hyperparameters, noise std last
    pub hyps: Vec<f64>,
    /// Override the kernel's hyperparameter labels
    pub hyp_labels: Option<Vec<String>>,
    pub opt_algorithm: OptAlgorithm,
    /// Iteration cap of hyperparameter optimization. Zero keeps
    /// hyperparameters fixed.
    pub maxiter: usize,
    pub grad_tol: f64,
    /// Train on DFT total energies as well as forces
    pub energy_labels: bool,

    /// Atomic masses by element symbol
    pub masses: HashMap<String, f64>,
    /// Initial structure, in any format gchemol reads
    pub structure_file: Option<PathBuf>,
    /// Initial previous positions; the structure starts at rest if None
    pub prev_positions: Option<Vec<[f64; 3]>>,

    /// Solver directory with `.env`, run script and input template
    pub solver_dir: Option<PathBuf>,
    /// Solver run script, used when `solver_dir` is None
    pub solver_executable: Option<PathBuf>,
    /// Solver input template, used when `solver_dir` is None
    pub input_template: Option<PathBuf>,

    /// Trace file
    pub output_file: PathBuf,
}

impl Default for OtfConfig {
    fn default() -> Self {
        Self {
            dt: 0.001,
            number_of_steps: 100,
            cutoff: 5.0,
            std_tolerance_factor: 1.0,
            kernel: "two_body".into(),
            hyps: vec![1.0, 1.0, 0.05],
            hyp_labels: None,
            opt_algorithm: OptAlgorithm::default(),
            maxiter: 10,
            grad_tol: 1e-4,
            energy_labels: false,
            masses: HashMap::new(),
            structure_file: None,
            prev_positions: None,
            solver_dir: None,
            solver_executable: None,
            input_template: None,
            output_file: "otf_run.out".into(),
        }
    }
}
// 0b7d3e58 ends here

// [[file:../otf.note::6f2e91c4][6f2e91c4]]
impl OtfConfig {
    /// Read and validate settings from a JSON file.
    pub fn from_json_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let txt = gut::fs::read_file(path)?;
        let config: Self = serde_json::from_str(&txt).with_context(|| format!("parse OTF config from {:?}", path))?;
        config.validate().context("OTF configuration")?;
        Ok(config)
    }

    /// Check settings that do not depend on the structure.
    pub fn validate(&self) -> Result<()> {
        if !(self.dt.is_finite() && self.dt > 0.0) {
            bail!("invalid time step: {}", self.dt);
        }
        if !(self.cutoff.is_finite() && self.cutoff > 0.0) {
            bail!("invalid cutoff: {}", self.cutoff);
        }
        if !self.std_tolerance_factor.is_finite() {
            bail!("invalid uncertainty tolerance: {}", self.std_tolerance_factor);
        }
        if !(self.grad_tol.is_finite() && self.grad_tol > 0.0) {
            bail!("invalid gradient tolerance: {}", self.grad_tol);
        }
        for (k, m) in self.masses.iter() {
            if !(m.is_finite() && *m > 0.0) {
                bail!("invalid mass for {}: {}", k, m);
            }
        }

        let kernels = self.kernel_set()?;
        if self.hyps.len() != kernels.nhyps() {
            bail!(
                "kernel {} expects {} hyperparameters, but found {}",
                self.kernel,
                kernels.nhyps(),
                self.hyps.len()
            );
        }
        Ok(())
    }

    /// Resolve the kernel family with optional label overrides.
    pub fn kernel_set(&self) -> Result<KernelSet> {
        let mut kernels = KernelSet::from_name(&self.kernel)?;
        if let Some(labels) = &self.hyp_labels {
            if labels.len() != kernels.nhyps() {
                bail!("expect {} hyperparameter labels, but found {}", kernels.nhyps(), labels.len());
            }
            kernels.hyp_labels = labels.clone();
        }
        Ok(kernels)
    }

    /// Construct the GP model with these settings.
    pub fn gaussian_process(&self) -> Result<GaussianProcess> {
        let gp = GaussianProcess::new(self.kernel_set()?, self.hyps.clone(), vec![self.cutoff])?
            .with_optimizer(self.opt_algorithm, self.maxiter, self.grad_tol)
            .with_energy_labels(self.energy_labels);
        Ok(gp)
    }

    /// Read the initial structure.
    pub fn structure(&self) -> Result<Structure> {
        let path = self
            .structure_file
            .as_ref()
            .ok_or_else(|| format_err!("no structure file set"))?;
        Structure::from_file(path, self.masses.clone(), self.prev_positions.clone())
    }

    /// Construct the external solver.
    pub fn solver(&self) -> Result<BlackBoxModel> {
        match (&self.solver_dir, &self.solver_executable, &self.input_template) {
            (Some(dir), _, _) => BlackBoxModel::from_dir(dir),
            (None, Some(run_file), Some(tpl_file)) => BlackBoxModel::new(run_file, tpl_file),
            _ => bail!("solver not set: require solver_dir, or both solver_executable and input_template"),
        }
    }
}
// 6f2e91c4 ends here

// [[file:../otf.note::e51d0a7b][e51d0a7b]]
#[test]
fn test_otf_config() -> Result<()> {
    let config: OtfConfig = serde_json::from_str(
        r#"{
            "dt": 0.002,
            "number_of_steps": 5,
            "cutoff": 3.0,
            "std_tolerance_factor": -0.05,
            "hyps": [2.0, 0.9, 0.01],
            "opt_algorithm": "BFGS",
            "masses": {"H": 1.008},
            "solver_dir": "tests/files/bbm-pair"
        }"#,
    )?;
    config.validate()?;
    assert_eq!(config.opt_algorithm, OptAlgorithm::Lbfgs);
    assert_eq!(config.maxiter, 10);
    assert_eq!(config.kernel, "two_body");
    assert_eq!(config.output_file, PathBuf::from("otf_run.out"));
    assert!(!config.energy_labels);

    let gp = config.gaussian_process()?;
    assert_eq!(gp.cutoffs(), &[3.0]);
    assert_eq!(gp.hyp_labels().len(), 3);
    assert!(config.solver().is_ok());
    assert!(config.structure().is_err());

    let mut bad = config.clone();
    bad.hyps = vec![1.0, 0.1];
    assert!(bad.validate().is_err());
    let mut bad = config.clone();
    bad.dt = 0.0;
    assert!(bad.validate().is_err());
    let mut bad = config.clone();
    bad.kernel = "three_body".into();
    assert!(bad.validate().is_err());
    let mut bad = config.clone();
    bad.hyp_labels = Some(vec!["a".into()]);
    assert!(bad.validate().is_err());
    let mut bad = config;
    bad.solver_dir = None;
    assert!(bad.solver().is_err());

    Ok(())
}
// e51d0a7b ends here
