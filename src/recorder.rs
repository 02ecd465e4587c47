// [[file:../otf.note::*header][header:1]]
//! Human-readable trace of an OTF run
// header:1 ends here

// [[file:../otf.note::*imports][imports:1]]
use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};

use super::*;
// imports:1 ends here

// [[file:../otf.note::4d2a7f10][4d2a7f10]]
/// Append-only text sink for the OTF trace.
#[derive(Debug, Clone)]
pub struct RunRecorder {
    path: PathBuf,
}

/// Run parameters written to the trace header.
#[derive(Debug, Clone)]
pub struct RunHeader<'a> {
    pub cutoff: f64,
    pub kernel: &'a str,
    pub nhyps: usize,
    pub algo: OptAlgorithm,
    pub dt: f64,
    pub nsteps: usize,
}

impl RunRecorder {
    pub fn new<P: AsRef<Path>>(path: P) -> Self {
        Self {
            path: path.as_ref().to_owned(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Append `text` to the trace file.
    pub fn append(&self, text: &str) -> Result<()> {
        let mut f = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .with_context(|| format!("open trace file {:?}", self.path))?;
        f.write_all(text.as_bytes())
            .with_context(|| format!("write to trace file {:?}", self.path))?;
        Ok(())
    }

    /// Start a new trace, truncating any existing file.
    pub fn write_header(&self, header: &RunHeader, structure: &Structure) -> Result<()> {
        let now = chrono::Local::now();
        gut::fs::write_to_file(&self.path, &format!("{}\n", now.format("%Y-%m-%d %H:%M:%S%.6f")))?;

        let species: Vec<_> = structure.species_set().into_iter().map(|s| format!("'{}'", s)).collect();
        let mut s = String::new();
        s += &format!("Structure Cutoff Radius: {:?}\n", header.cutoff);
        s += &format!("Kernel: {}\n", header.kernel);
        s += &format!("# Hyperparameters: {}\n", header.nhyps);
        s += &format!("Initial Hyperparameter Optimization Algorithm: {}\n", header.algo);
        s += &format!("Timestep (ps): {:?}\n", header.dt);
        s += &format!("Number of Frames: {}\n", header.nsteps);
        s += &format!("Number of Atoms: {}\n", structure.natoms());
        s += &format!("System Species: {{{}}}\n", species.join(", "));

        self.append(&s)
    }

    /// Write the current configuration of `structure` at frame `step`.
    /// Frames with DFT forces are marked with an asterisk.
    pub fn write_md_config(&self, dt: f64, step: usize, structure: &Structure) -> Result<()> {
        let mut s = String::from("-------------------- \n");
        let marker = if structure.dft_forces { '*' } else { ' ' };
        let time = (dt * step as f64 * 1e6).round() / 1e6;
        s += &format!("-{}Frame: {} Simulation Time: {:?}\n", marker, step, time);

        s += "El \t\t\t  Position (A) \t\t\t\t\t ";
        if structure.dft_forces {
            s += "DFT Force (ev/A) ";
        } else {
            s += "GP Force (ev/A) ";
        }
        s += "\t\t\t\t\t\t Std. Dev (ev/A) \n";

        for i in 0..structure.natoms() {
            s += &structure.species()[i];
            s += " ";
            for x in structure.positions()[i].iter() {
                s += &format!("{:.8} ", x);
            }
            s += "\t";
            for x in structure.forces[i].iter() {
                s += &format!("{:.8} ", x);
            }
            s += "\t";
            for &x in structure.stds[i].iter() {
                s += &sci(x);
                s += " ";
            }
            s += "\n";
        }

        self.append(&s)
    }

    /// Announce a DFT call, with the atom that triggered it if any.
    pub fn write_dft_call(&self, target: Option<usize>, structure: &Structure) -> Result<()> {
        let mut s = "=".repeat(20);
        s += "\n";
        match target {
            None => s += "Calling DFT...",
            Some(i) => {
                s += &format!(
                    "Calling DFT due to atom {} at position {:?} with uncertainties {:?}...",
                    i,
                    structure.positions()[i],
                    structure.stds[i]
                );
            }
        }
        self.append(&s)
    }

    /// Write the structure and forces of the last DFT calculation.
    pub fn write_last_dft_run(&self, structure: &Structure) -> Result<()> {
        let mut s = String::from("Done.\n");
        s += "El \t\t\t  Position (A) \t\t\t\t\t DFT Force (ev/A) \n";
        for i in 0..structure.natoms() {
            s += &structure.species()[i];
            s += ": ";
            for x in structure.positions()[i].iter() {
                s += &format!("{:.8}  ", x);
            }
            s += "\t ";
            for x in structure.forces[i].iter() {
                s += &format!("{:.8}  ", x);
            }
            s += "\n";
        }
        s += &"=".repeat(20);
        s += "\n";
        s += "Updating database hyperparameters...\n";

        self.append(&s)
    }

    /// Write hyperparameters after training, with a notice if the optimizer
    /// failed.
    pub fn write_hyps(&self, labels: &[String], hyps: &[f64], status: &TrainStatus) -> Result<()> {
        let mut s = String::new();
        if let TrainStatus::NotConverged { reason } = status {
            s += &format!("Hyperparameter optimization did not converge: {}\n", reason);
            s += "Previous hyperparameters are kept.\n";
        }
        s += "New GP Hyperparameters: \n";
        for (i, (label, hyp)) in labels.iter().zip(hyps).enumerate() {
            s += &format!("Hyp{} : {} = {:?}\n", i, label, hyp);
        }

        self.append(&s)
    }

    /// Close the trace with the total wall time in seconds.
    pub fn write_footer(&self, elapsed: f64) -> Result<()> {
        let mut s = "▬".repeat(20);
        s += "\n";
        s += "Run complete. \n";
        s += &format!("Elapsed time (s): {:.3}\n", elapsed);
        self.append(&s)
    }
}

/// Format like printf `%.6e`: a signed exponent of at least two digits.
fn sci(x: f64) -> String {
    if !x.is_finite() {
        return format!("{}", x).to_lowercase();
    }
    let s = format!("{:.6e}", x);
    match s.split_once('e') {
        Some((mantissa, exp)) => {
            let (sign, digits) = match exp.strip_prefix('-') {
                Some(d) => ('-', d),
                None => ('+', exp),
            };
            format!("{}e{}{:0>2}", mantissa, sign, digits)
        }
        None => s,
    }
}
// 4d2a7f10 ends here

// a6e1c2f9 ends here
