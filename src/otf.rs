// [[file:../otf.note::*header][header:1]]
//! The on-the-fly active learning loop
//!
//! # Usage
//!
//! ```ignore
//! use gosh_otf::*;
//!
//! let config = OtfConfig::from_json_file("otf.json")?;
//! let mut otf = OtfEngine::from_config(&config)?;
//! otf.run()?;
//! ```
// header:1 ends here

// [[file:../otf.note::*imports][imports:1]]
use std::time::Instant;

use super::*;
// imports:1 ends here

// [[file:../otf.note::9a3c5e71][9a3c5e71]]
/// States of the OTF loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OtfState {
    /// Predict forces and uncertainties with the GP model.
    Predict,
    /// Decide if predicted forces are trustworthy.
    CheckUncertainty,
    /// Call DFT and train the GP model. `target` is the atom with the
    /// largest uncertainty; `bootstrap` marks the call before the first
    /// step.
    Retrain { target: Option<usize>, bootstrap: bool },
    /// Move atoms one time step forward.
    Advance,
    Done,
}

/// The OTF molecular dynamics driver
pub struct OtfEngine<M: ChemicalModel> {
    config: OtfConfig,
    gp: GaussianProcess,
    structure: Structure,
    solver: M,
    recorder: RunRecorder,

    curr_step: usize,
    /// The structure of the last DFT calculation
    train_structure: Option<Structure>,
    start_time: Option<Instant>,
    dft_calls: usize,
}
// 9a3c5e71 ends here

// [[file:../otf.note::2c8f4b06][2c8f4b06]]
impl<M: ChemicalModel> OtfEngine<M> {
    /// Construct from validated settings, the initial structure and the
    /// ground-truth solver.
    pub fn new(config: OtfConfig, structure: Structure, solver: M) -> Result<Self> {
        config.validate().context("OTF configuration")?;
        let gp = config.gaussian_process().context("OTF configuration")?;
        let recorder = RunRecorder::new(&config.output_file);

        Ok(Self {
            config,
            gp,
            structure,
            solver,
            recorder,
            curr_step: 0,
            train_structure: None,
            start_time: None,
            dft_calls: 0,
        })
    }

    pub fn structure(&self) -> &Structure {
        &self.structure
    }

    pub fn gp(&self) -> &GaussianProcess {
        &self.gp
    }

    pub fn solver(&self) -> &M {
        &self.solver
    }

    pub fn recorder(&self) -> &RunRecorder {
        &self.recorder
    }

    pub fn curr_step(&self) -> usize {
        self.curr_step
    }

    /// Return the number of DFT calculations so far.
    pub fn dft_calls(&self) -> usize {
        self.dft_calls
    }

    /// The structure of the last DFT calculation, if any.
    pub fn train_structure(&self) -> Option<&Structure> {
        self.train_structure.as_ref()
    }

    /// Wall time in seconds since the run started.
    pub fn elapsed(&self) -> Option<f64> {
        self.start_time.map(|t| t.elapsed().as_secs_f64())
    }
}

impl OtfEngine<BlackBoxModel> {
    /// Assemble structure, GP model, solver and recorder from `config`.
    pub fn from_config(config: &OtfConfig) -> Result<Self> {
        let structure = config.structure().context("OTF configuration")?;
        let solver = config.solver().context("OTF configuration")?;
        Self::new(config.clone(), structure, solver)
    }
}
// 2c8f4b06 ends here

// [[file:../otf.note::5e0d7a92][5e0d7a92]]
/// Check uncertainties against the tolerance.
///
/// Return false together with the atom having the largest uncertainty (the
/// first one on ties) if out of bound. A zero `tol` is always in bound; a
/// negative `tol` is an absolute cutoff; a positive `tol` is a multiple of
/// the noise hyperparameter `noise`. NaN values are ignored.
pub fn std_in_bound(stds: &[[f64; 3]], tol: f64, noise: f64) -> (bool, Option<usize>) {
    if tol == 0.0 {
        return (true, None);
    }

    let atom_max = |s: &[f64; 3]| s.iter().fold(f64::NAN, |acc, &x| acc.max(x));
    let max_std = stds.iter().map(atom_max).fold(f64::NAN, f64::max);
    let tripped = if tol < 0.0 {
        max_std >= tol.abs()
    } else {
        max_std >= tol * noise.abs()
    };
    if !tripped {
        return (true, None);
    }

    let mut target = 0;
    let mut best = f64::NAN;
    for (i, s) in stds.iter().enumerate() {
        let m = atom_max(s);
        if best.is_nan() || m > best {
            target = i;
            best = m;
        }
    }
    (false, Some(target))
}

/// Standard deviation from a predicted variance, which may come out slightly
/// negative from round-off near training points.
fn std_from_variance(var: f64) -> f64 {
    var.abs().sqrt()
}

impl<M: ChemicalModel> OtfEngine<M> {
    /// Predict forces and uncertainties of all atoms with the GP model. The
    /// prior is used while the GP has no training data.
    pub fn predict_on_structure(&mut self) -> Result<()> {
        let envs = AtomicEnvironment::all(&self.structure, self.config.cutoff);
        let use_prior = !self.gp.has_training_data();
        for (i, env) in envs.iter().enumerate() {
            for d in 0..3 {
                let (force, var) = if use_prior {
                    self.gp.predict_prior(env, d)
                } else {
                    self.gp.predict(env, d)?
                };
                self.structure.forces[i][d] = force;
                self.structure.stds[i][d] = std_from_variance(var);
            }
        }
        self.structure.dft_forces = false;

        Ok(())
    }

    /// Check predicted uncertainties of the current structure.
    pub fn is_std_in_bound(&self) -> (bool, Option<usize>) {
        std_in_bound(&self.structure.stds, self.config.std_tolerance_factor, self.gp.noise())
    }

    /// Call DFT on the current structure, replace predicted forces with DFT
    /// forces, and train the GP model on the whole structure.
    pub fn run_and_train(&mut self, target_atom: Option<usize>) -> Result<TrainStatus> {
        let target_atom = target_atom.filter(|_| self.train_structure.is_some());
        self.recorder.write_dft_call(target_atom, &self.structure)?;
        match target_atom {
            Some(i) => info!("step {}: calling DFT due to atom {}", self.curr_step, i),
            None => info!("step {}: calling DFT", self.curr_step),
        }

        let natoms = self.structure.natoms();
        let mol = self.structure.to_molecule();
        let computed = self.solver.compute(&mol).context("DFT calculation")?;
        let forces = computed.validate_forces(natoms).context("DFT calculation")?.to_vec();
        self.dft_calls += 1;

        self.structure.forces = forces.clone();
        self.structure.stds = vec![[0.0; 3]; natoms];
        self.structure.dft_forces = true;
        self.structure.energy = computed.get_energy();
        self.recorder.write_last_dft_run(&self.structure)?;
        self.train_structure = Some(self.structure.clone());

        self.gp
            .update_db(&self.structure, Some(&forces), None)
            .context("GP training")?;
        let status = self.gp.train().context("GP training")?;
        self.recorder.write_hyps(self.gp.hyp_labels(), self.gp.hyps(), &status)?;

        Ok(status)
    }

    /// Advance positions by one leapfrog step.
    pub fn update_positions(&mut self) {
        self.structure.leapfrog(self.config.dt);
        self.structure.energy = None;
        self.curr_step += 1;
    }
}
// 5e0d7a92 ends here

// [[file:../otf.note::7b41d6e3][7b41d6e3]]
impl<M: ChemicalModel> OtfEngine<M> {
    /// The state a new run starts in.
    pub fn initial_state(&self) -> OtfState {
        if self.config.std_tolerance_factor != 0.0 {
            OtfState::Retrain {
                target: None,
                bootstrap: true,
            }
        } else {
            OtfState::Predict
        }
    }

    /// Carry out the work of `state`, and return the next state.
    pub fn transition(&mut self, state: OtfState) -> Result<OtfState> {
        let next = match state {
            OtfState::Predict => {
                if self.curr_step >= self.config.number_of_steps {
                    OtfState::Done
                } else {
                    self.predict_on_structure().context("OTF prediction")?;
                    OtfState::CheckUncertainty
                }
            }
            OtfState::CheckUncertainty => {
                let (in_bound, target) = self.is_std_in_bound();
                debug!(
                    "step {}: max std = {:.6e}, in bound: {}",
                    self.curr_step,
                    self.structure.max_std(),
                    in_bound
                );
                if in_bound {
                    OtfState::Advance
                } else {
                    // the frame with GP forces, before replaced by DFT
                    self.write_md_config()?;
                    OtfState::Retrain {
                        target,
                        bootstrap: false,
                    }
                }
            }
            OtfState::Retrain { target, bootstrap } => {
                self.run_and_train(target)?;
                if bootstrap {
                    self.write_md_config()?;
                    OtfState::Predict
                } else {
                    OtfState::Advance
                }
            }
            OtfState::Advance => {
                self.write_md_config()?;
                self.update_positions();
                OtfState::Predict
            }
            OtfState::Done => OtfState::Done,
        };

        Ok(next)
    }

    /// Run the OTF loop until all steps are done.
    pub fn run(&mut self) -> Result<()> {
        self.start_time = Some(Instant::now());
        self.write_header()?;
        info!(
            "OTF run started: {} steps, {} atoms, tolerance {}",
            self.config.number_of_steps,
            self.structure.natoms(),
            self.config.std_tolerance_factor
        );

        let mut state = self.initial_state();
        while state != OtfState::Done {
            state = self.transition(state)?;
        }

        let elapsed = self.elapsed().unwrap_or_default();
        self.recorder.write_footer(elapsed)?;
        info!(
            "OTF run completed in {:.3} s with {} DFT calls.",
            elapsed, self.dft_calls
        );

        Ok(())
    }

    fn write_header(&self) -> Result<()> {
        let header = RunHeader {
            cutoff: self.config.cutoff,
            kernel: self.gp.kernel_name(),
            nhyps: self.gp.hyps().len(),
            algo: self.gp.algo(),
            dt: self.config.dt,
            nsteps: self.config.number_of_steps,
        };
        self.recorder.write_header(&header, &self.structure)
    }

    fn write_md_config(&self) -> Result<()> {
        self.recorder
            .write_md_config(self.config.dt, self.curr_step, &self.structure)
    }
}
// 7b41d6e3 ends here

// [[file:../otf.note::c09f3d18][c09f3d18]]
#[cfg(test)]
mod tests {
    use super::*;
    use approx::*;
    use tempfile::TempDir;

    /// LJ potential counting its evaluations
    #[derive(Default)]
    struct CountingLj {
        lj: LennardJones,
        ncalls: usize,
    }

    impl ChemicalModel for CountingLj {
        fn compute(&mut self, mol: &Molecule) -> Result<Computed> {
            self.ncalls += 1;
            self.lj.compute(mol)
        }
    }

    struct BrokenSolver;

    impl ChemicalModel for BrokenSolver {
        fn compute(&mut self, _mol: &Molecule) -> Result<Computed> {
            bail!("pw.x exited with status 1")
        }
    }

    fn h2() -> Structure {
        let mol = Molecule::from_atoms(vec![("H", [0.0, 0.0, 0.0]), ("H", [1.5, 0.0, 0.0])]);
        Structure::from_molecule(&mol, crate::structure::h2_masses(), None).unwrap()
    }

    fn config(tdir: &TempDir, tol: f64) -> OtfConfig {
        let mut config = OtfConfig::default();
        config.dt = 0.001;
        config.number_of_steps = 5;
        config.cutoff = 3.0;
        config.std_tolerance_factor = tol;
        config.hyps = vec![2.0, 0.9, 0.01];
        config.maxiter = 0;
        config.masses = crate::structure::h2_masses();
        config.output_file = tdir.path().join("otf_run.out");
        config
    }

    #[test]
    fn test_std_from_variance() {
        assert_relative_eq!(std_from_variance(-4e-6), 2e-3, epsilon = 1e-12);
        assert_relative_eq!(std_from_variance(4e-6), 2e-3, epsilon = 1e-12);
        assert_eq!(std_from_variance(0.0), 0.0);
        assert_eq!(std_from_variance(-0.0), 0.0);
        assert!(std_from_variance(-1e-12).is_finite());
    }

    #[test]
    fn test_std_in_bound() {
        let stds = [[0.01, 0.02, 0.0], [0.05, 0.0, 0.03], [0.0, 0.05, f64::NAN]];

        // DFT is off
        assert_eq!(std_in_bound(&stds, 0.0, 0.01), (true, None));

        // hard cutoff, the boundary is out of bound
        assert_eq!(std_in_bound(&stds, -0.06, 0.01), (true, None));
        assert_eq!(std_in_bound(&stds, -0.05, 0.01), (false, Some(1)));
        assert_eq!(std_in_bound(&stds, -0.04, 0.01), (false, Some(1)));

        // relative to the noise
        assert_eq!(std_in_bound(&stds, 6.0, 0.01), (true, None));
        assert_eq!(std_in_bound(&stds, 4.0, -0.01), (false, Some(1)));

        // scaling both the uncertainties and the noise keeps the decision
        for &k in [0.5, 3.0, 100.0].iter() {
            let scaled: Vec<_> = stds.iter().map(|s| [s[0] * k, s[1] * k, s[2] * k]).collect();
            for &r in [2.0, 4.5, 6.0, 10.0].iter() {
                assert_eq!(std_in_bound(&scaled, r, 0.01 * k).0, std_in_bound(&stds, r, 0.01).0);
            }
        }

        // NaN values are ignored
        let stds = [[f64::NAN; 3], [f64::NAN; 3]];
        assert_eq!(std_in_bound(&stds, -0.05, 0.01), (true, None));
    }

    #[test]
    fn test_update_positions() -> Result<()> {
        let tdir = tempfile::tempdir()?;
        let mut otf = OtfEngine::new(config(&tdir, 0.0), h2(), CountingLj::default())?;
        otf.structure.forces = vec![[1.0, 0.0, 0.0], [-1.0, 0.5, 0.0]];
        let p = otf.structure().positions().to_vec();
        otf.update_positions();

        let dtdt = 0.001 * 0.001;
        assert_relative_eq!(otf.structure().positions()[0][0], p[0][0] + dtdt / 1.008, epsilon = 1e-12);
        assert_relative_eq!(otf.structure().positions()[1][1], p[1][1] + 0.5 * dtdt / 1.008, epsilon = 1e-12);
        assert_eq!(otf.structure().prev_positions(), &p[..]);
        assert_eq!(otf.curr_step(), 1);

        Ok(())
    }

    #[test]
    fn test_after_retrain() -> Result<()> {
        let tdir = tempfile::tempdir()?;
        let mut otf = OtfEngine::new(config(&tdir, -0.05), h2(), CountingLj::default())?;
        otf.predict_on_structure()?;
        assert!(!otf.structure().dft_forces);
        assert!(otf.structure().max_std() > 0.0);

        let status = otf.run_and_train(None)?;
        assert_eq!(status, TrainStatus::Fixed);
        assert!(otf.structure().dft_forces);
        assert!(otf.structure().stds.iter().flatten().all(|&x| x == 0.0));
        assert_eq!(otf.dft_calls(), 1);
        assert_eq!(otf.solver().ncalls, 1);
        assert!(otf.gp().is_trained());
        assert_eq!(otf.gp().training_set().nlabels(), 6);
        assert_eq!(otf.train_structure().unwrap().forces, otf.structure().forces);
        assert_eq!(otf.is_std_in_bound(), (true, None));

        Ok(())
    }

    #[test]
    fn test_run_with_bootstrap() -> Result<()> {
        let tdir = tempfile::tempdir()?;
        let mut otf = OtfEngine::new(config(&tdir, -0.05), h2(), CountingLj::default())?;
        assert_eq!(
            otf.initial_state(),
            OtfState::Retrain {
                target: None,
                bootstrap: true
            }
        );
        otf.run()?;

        assert_eq!(otf.curr_step(), 5);
        assert_eq!(otf.dft_calls(), 1);
        assert_eq!(otf.solver().ncalls, 1);
        assert!(!otf.structure().dft_forces);

        let txt = gut::fs::read_file(otf.recorder().path())?;
        assert_eq!(txt.matches("Calling DFT...").count(), 1);
        assert!(txt.contains("-*Frame: 0 Simulation Time: 0.0\n"));
        assert!(txt.contains("- Frame: 4 Simulation Time: 0.004\n"));
        assert!(!txt.contains("Frame: 5 "));
        assert!(txt.contains("Run complete. \n"));

        Ok(())
    }

    #[test]
    fn test_run_without_dft() -> Result<()> {
        let tdir = tempfile::tempdir()?;
        let mut otf = OtfEngine::new(config(&tdir, 0.0), h2(), CountingLj::default())?;
        assert_eq!(otf.initial_state(), OtfState::Predict);
        otf.run()?;

        assert_eq!(otf.curr_step(), 5);
        assert_eq!(otf.dft_calls(), 0);
        assert_eq!(otf.solver().ncalls, 0);
        assert!(!otf.gp().has_training_data());
        // prior mean forces do not move atoms
        assert_eq!(otf.structure().positions(), h2().positions());

        Ok(())
    }

    #[test]
    fn test_retrained_frame_written_twice() -> Result<()> {
        let tdir = tempfile::tempdir()?;
        let mut config = config(&tdir, -1e-12);
        config.number_of_steps = 2;
        let mut otf = OtfEngine::new(config, h2(), CountingLj::default())?;
        otf.run()?;

        // bootstrap and one call per step
        assert_eq!(otf.dft_calls(), 3);
        let txt = gut::fs::read_file(otf.recorder().path())?;
        assert_eq!(txt.matches("- Frame: 1 ").count(), 1);
        assert_eq!(txt.matches("-*Frame: 1 ").count(), 1);
        assert_eq!(txt.matches("Calling DFT due to atom ").count(), 2);

        Ok(())
    }

    #[test]
    fn test_solver_failure() -> Result<()> {
        let tdir = tempfile::tempdir()?;
        let mut otf = OtfEngine::new(config(&tdir, 1.0), h2(), BrokenSolver)?;
        let err = otf.run().unwrap_err();
        assert!(format!("{:?}", err).contains("DFT calculation"));
        assert_eq!(otf.dft_calls(), 0);

        // the trace written so far remains
        let txt = gut::fs::read_file(otf.recorder().path())?;
        assert!(txt.contains("Number of Atoms: 2"));
        assert!(!txt.contains("Run complete."));

        Ok(())
    }

    #[test]
    fn test_invalid_config() {
        let tdir = tempfile::tempdir().unwrap();
        let mut config = config(&tdir, 1.0);
        config.hyps = vec![1.0];
        assert!(OtfEngine::new(config, h2(), CountingLj::default()).is_err());
    }
}
// c09f3d18 ends here
