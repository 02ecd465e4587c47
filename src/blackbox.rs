// [[file:../otf.note::*header][header:1]]
//! An external ground-truth solver (DFT code or anything else) driven by
//! user scripts
//!
//! # Usage
//!
//! ```ignore
//! use gosh_otf::*;
//!
//! // initialize from a directory containing .env, submit.sh and input.hbs
//! let mut bbm = BlackBoxModel::from_dir("/share/apps/pw/sp")?;
//!
//! // calculate one molecule
//! let mp = bbm.compute(&mol)?;
//! ```
// header:1 ends here

// [[file:../otf.note::c3765387][c3765387]]
use std::path::{Path, PathBuf};
use tempfile::TempDir;

use super::*;

mod cmd;
// c3765387 ends here

// [[file:../otf.note::*base][base:1]]
pub struct BlackBoxModel {
    /// Set the run script file for calculation.
    run_file: PathBuf,

    /// Set the template file for rendering molecule.
    tpl_file: PathBuf,

    /// Set the root directory for scratch files.
    scr_dir: Option<PathBuf>,

    /// Job starting directory
    job_dir: PathBuf,

    /// unique temporary working directory
    temp_dir: Option<TempDir>,

    /// Record the number of potential evalulations.
    ncalls: usize,
}
// base:1 ends here

// [[file:../otf.note::6cc8ead1][6cc8ead1]]
mod env {
    use super::*;
    use tempfile::{tempdir, tempdir_in};

    /// Settings read from `.env` in the solver directory.
    #[derive(Debug, Deserialize)]
    struct DotEnv {
        #[serde(default = "default_run_file")]
        run_file: String,
        #[serde(default = "default_tpl_file")]
        tpl_file: String,
        scr_dir: Option<PathBuf>,
    }

    fn default_run_file() -> String {
        "submit.sh".into()
    }

    fn default_tpl_file() -> String {
        "input.hbs".into()
    }

    // read BBM_* variables from .env without touching the process environment
    fn read_dotenv(dir: &Path) -> Result<DotEnv> {
        let envfile = dir.join(".env");
        let mut vars = vec![];
        if envfile.exists() {
            for item in dotenv::from_path_iter(&envfile)? {
                let (key, value) = item.with_context(|| format!("invalid line in {:?}", envfile))?;
                info!("found env var from {:?}: {}={}", envfile, key, value);
                if key.starts_with("BBM_") {
                    vars.push((key, value));
                }
            }
        }
        let denv = envy::prefixed("BBM_")
            .from_iter(vars)
            .with_context(|| format!("invalid BBM settings in {:?}", envfile))?;
        Ok(denv)
    }

    /// Return a temporary directory under `scr_root` for safe calculation.
    fn new_scratch_directory(scr_root: Option<&Path>) -> Result<TempDir> {
        // create leading directories
        if let Some(d) = &scr_root {
            if !d.exists() {
                std::fs::create_dir_all(d).context("create scratch root dir")?;
            }
        }
        scr_root.map_or_else(
            || tempdir().context("create temp scratch dir"),
            |d| tempdir_in(d).with_context(|| format!("create temp scratch dir under {:?}", d)),
        )
    }

    impl BlackBoxModel {
        /// Create a temporary working directory and prepare running script
        pub(super) fn prepare_compute_env(&mut self) -> Result<PathBuf> {
            let run = "run";

            let runfile = if let Some(tdir) = &self.temp_dir {
                tdir.path().join(run)
            } else {
                let tdir = new_scratch_directory(self.scr_dir.as_deref())?;
                debug!("BBM scratching directory: {:?}", tdir.path());

                // copy run script to the scratch directory
                let dest = tdir.path().join(run);
                let txt = gut::fs::read_file(&self.run_file)?;
                gut::fs::write_script_file(&dest, &txt)?;

                self.temp_dir = tdir.into();
                dest.canonicalize()?
            };

            Ok(runfile)
        }

        pub(super) fn from_dotenv(dir: &Path) -> Result<Self> {
            let dir = dir
                .canonicalize()
                .with_context(|| format!("invalid template directory: {:?}", dir))?;
            let denv = read_dotenv(&dir)?;

            Self::new(dir.join(&denv.run_file), dir.join(&denv.tpl_file)).map(|bbm| bbm.with_scratch_dir(denv.scr_dir))
        }
    }

    #[test]
    fn test_env() -> Result<()> {
        let root = tempdir()?;
        let d = new_scratch_directory(Some(&root.path().join("scratch/test")))?;
        assert!(d.path().exists());
        let d = new_scratch_directory(None)?;
        assert!(d.path().exists());

        let denv = read_dotenv("tests/files/bbm-pair".as_ref())?;
        assert_eq!(denv.run_file, "submit.sh");
        assert_eq!(denv.tpl_file, "input.hbs");
        assert!(denv.scr_dir.is_none());

        // no .env at all
        let denv = read_dotenv(root.path())?;
        assert_eq!(denv.run_file, "submit.sh");

        Ok(())
    }
}
// 6cc8ead1 ends here

// [[file:../otf.note::360435b0][360435b0]]
impl BlackBoxModel {
    fn compute_normal(&mut self, mol: &Molecule) -> Result<Computed> {
        // 1. render input text with the template
        let txt = self.render_input(mol)?;

        // 2. call external engine
        let output = self.submit_cmd(&txt)?;

        // 3. collect model properties
        let mp: Computed = output
            .parse()
            .with_context(|| format!("failed to parse computed results: {:?}", output))?;
        mp.validate_forces(mol.natoms())?;

        self.ncalls += 1;
        Ok(mp)
    }
}
// 360435b0 ends here

// [[file:../otf.note::*pub/input][pub/input:1]]
impl BlackBoxModel {
    /// Render input using template
    pub fn render_input(&self, mol: &Molecule) -> Result<String> {
        for (i, p) in mol.positions().enumerate() {
            if p.iter().any(|x| !x.is_finite()) {
                error!("Invalid position of atom {}: {:?}", i, p);
                bail!("Molecule has invalid data in positions.");
            }
        }
        let txt = mol.render_with(&self.tpl_file)?;

        Ok(txt)
    }
}
// pub/input:1 ends here

// [[file:../otf.note::*pub/methods][pub/methods:1]]
impl BlackBoxModel {
    /// Construct from the solver executable and the input template.
    pub fn new<P: AsRef<Path>, Q: AsRef<Path>>(run_file: P, tpl_file: Q) -> Result<Self> {
        let run_file = run_file.as_ref();
        let tpl_file = tpl_file.as_ref();
        if !run_file.is_file() {
            bail!("solver executable not found: {:?}", run_file);
        }
        if !tpl_file.is_file() {
            bail!("input template not found: {:?}", tpl_file);
        }

        let bbm = Self {
            run_file: run_file.canonicalize()?,
            tpl_file: tpl_file.canonicalize()?,
            scr_dir: None,
            job_dir: std::env::current_dir()?,
            temp_dir: None,
            ncalls: 0,
        };
        Ok(bbm)
    }

    /// Construct BlackBoxModel model under directory context.
    pub fn from_dir<P: AsRef<Path>>(dir: P) -> Result<Self> {
        Self::from_dotenv(dir.as_ref()).context("Initialize BlackBoxModel failure.")
    }

    /// Put scratch directories under `scr_dir` instead of the system
    /// temporary directory.
    pub fn with_scratch_dir(mut self, scr_dir: Option<PathBuf>) -> Self {
        self.scr_dir = scr_dir;
        self
    }

    /// Keep scratch files for user inspection of failure. Return the kept
    /// directory, which is no longer removed on drop.
    pub fn keep_scratch_files(&mut self) -> Option<PathBuf> {
        if let Some(tdir) = self.temp_dir.take() {
            let path = tdir.into_path();
            info!("Directory for scratch files: {}", path.display());
            Some(path)
        } else {
            warn!("No temp dir found.");
            None
        }
    }

    /// Return the number of potentail evaluations
    pub fn number_of_evaluations(&self) -> usize {
        self.ncalls
    }
}
// pub/methods:1 ends here

// [[file:../otf.note::5ff4e3f1][5ff4e3f1]]
impl ChemicalModel for BlackBoxModel {
    fn compute(&mut self, mol: &Molecule) -> Result<Computed> {
        match self.compute_normal(mol) {
            Ok(mp) => Ok(mp),
            Err(e) => match self.keep_scratch_files() {
                Some(path) => Err(e.context(format!("scratch files kept in {}", path.display()))),
                None => Err(e),
            },
        }
    }
}
// 5ff4e3f1 ends here

// [[file:../otf.note::*test][test:1]]
#[test]
fn test_bbm() -> Result<()> {
    let mut bbm = BlackBoxModel::from_dir("tests/files/bbm-pair")?;
    assert!(bbm.tpl_file.ends_with("input.hbs"));
    assert!(bbm.run_file.ends_with("submit.sh"));

    let mol = Molecule::from_atoms(vec![("H", [0.0, 0.0, 0.0]), ("H", [1.5, 0.0, 0.0])]);
    let mp = bbm.compute(&mol)?;
    assert_eq!(mp.get_energy(), Some(-1.5));
    let forces = mp.validate_forces(2)?;
    assert_eq!(forces[0], [0.1, 0.0, 0.0]);
    assert_eq!(forces[1], [-0.1, 0.0, 0.0]);
    assert_eq!(bbm.number_of_evaluations(), 1);

    // the script reports two atoms only
    let mol3 = Molecule::from_atoms(vec![
        ("H", [0.0, 0.0, 0.0]),
        ("H", [1.5, 0.0, 0.0]),
        ("H", [0.0, 1.5, 0.0]),
    ]);
    assert!(bbm.compute(&mol3).is_err());
    assert_eq!(bbm.number_of_evaluations(), 1);

    assert!(BlackBoxModel::new("tests/files/bbm-pair/missing.sh", "tests/files/bbm-pair/input.hbs").is_err());

    Ok(())
}

#[test]
fn test_bbm_failure_keeps_scratch() -> Result<()> {
    let root = tempfile::tempdir()?;
    let mut bbm = BlackBoxModel::from_dir("tests/files/bbm-fail")?.with_scratch_dir(Some(root.path().to_owned()));

    let mol = Molecule::from_atoms(vec![("H", [0.0, 0.0, 0.0]), ("H", [1.5, 0.0, 0.0])]);
    let err = bbm.compute(&mol).unwrap_err();
    assert!(format!("{:?}", err).contains("scratch files kept in"));
    assert_eq!(bbm.number_of_evaluations(), 0);

    // the scratch directory survives with the rendered input
    let kept: Vec<_> = std::fs::read_dir(root.path())?.collect::<std::io::Result<_>>()?;
    assert_eq!(kept.len(), 1);
    assert!(kept[0].path().join("input.txt").exists());
    assert!(bbm.keep_scratch_files().is_none());

    Ok(())
}
// test:1 ends here
