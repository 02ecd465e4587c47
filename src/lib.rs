// [[file:../otf.note::*header][header:1]]
//! On-the-fly active learning of Gaussian process force fields.
//!
//! Molecular dynamics is driven by forces predicted from a GP model. The
//! expensive ab initio solver is called only when the predicted
//! uncertainty exceeds a tolerance, and its results are fed back into the
//! GP training set.
// header:1 ends here

// [[file:../otf.note::*common][common:1]]
pub(crate) mod core {
    pub use gut::prelude::*;

    pub use serde::{Deserialize, Serialize};
}
// common:1 ends here

// [[file:../otf.note::*mods][mods:1]]
mod model_properties;

mod blackbox;
mod config;
mod env;
mod gp;
mod kernels;
mod lj;
mod otf;
mod recorder;
mod structure;
// mods:1 ends here

// [[file:../otf.note::bf8cc73b][bf8cc73b]]
use crate::core::*;

use gchemol::prelude::*;
use gchemol::Molecule;

/// Trait for ground-truth calculations of a structure, such as DFT.
pub trait ChemicalModel {
    /// Compute energy and forces of `mol`.
    fn compute(&mut self, mol: &Molecule) -> Result<Computed>;

    /// Compute the properties of a bunch of molecules, mainly for reducing
    /// IO costs of small molecule calculations.
    fn compute_bunch(&mut self, mols: &[Molecule]) -> Result<Vec<Computed>> {
        mols.iter().map(|mol| self.compute(mol)).collect()
    }
}
// bf8cc73b ends here

// [[file:../otf.note::*pub][pub:1]]
pub use crate::blackbox::BlackBoxModel;
pub use crate::config::OtfConfig;
pub use crate::env::{AtomicEnvironment, Bond};
pub use crate::gp::{GaussianProcess, LabelPoint, OptAlgorithm, TrainStatus, TrainingStore, TrainingStructure};
pub use crate::kernels::KernelSet;
pub use crate::lj::LennardJones;
pub use crate::model_properties::*;
pub use crate::otf::{std_in_bound, OtfEngine, OtfState};
pub use crate::recorder::{RunHeader, RunRecorder};
pub use crate::structure::Structure;
// pub:1 ends here
