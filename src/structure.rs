// [[file:../otf.note::*header][header:1]]
//! The atomic structure propagated by the OTF loop, together with its forces
//! and their uncertainties.
// header:1 ends here

// [[file:../otf.note::2f0c6e1a][2f0c6e1a]]
use std::collections::{BTreeSet, HashMap};
use std::path::Path;

use super::*;

use gchemol::Lattice;
// 2f0c6e1a ends here

// [[file:../otf.note::5b7a31d4][5b7a31d4]]
/// A structure snapshot in the OTF simulation
#[derive(Debug, Clone)]
pub struct Structure {
    species: Vec<String>,
    positions: Vec<[f64; 3]>,
    /// Positions in the previous step, for the leapfrog update.
    prev_positions: Vec<[f64; 3]>,
    lattice: Option<Lattice>,
    /// Atomic mass by element symbol
    masses: HashMap<String, f64>,

    /// Forces on atoms, GP predicted or from DFT
    pub forces: Vec<[f64; 3]>,
    /// Predicted uncertainty (standard deviation) of each force component
    pub stds: Vec<[f64; 3]>,
    /// True if `forces` are DFT-exact
    pub dft_forces: bool,
    /// Total energy from the last DFT calculation on this structure
    pub energy: Option<f64>,
}
// 5b7a31d4 ends here

// [[file:../otf.note::a4f9e0b7][a4f9e0b7]]
impl Structure {
    /// Construct from a molecule. `masses` must contain every element in
    /// `mol`. When `prev_positions` is None, previous positions are set to
    /// the current ones (starting at rest).
    pub fn from_molecule(
        mol: &Molecule,
        masses: HashMap<String, f64>,
        prev_positions: Option<Vec<[f64; 3]>>,
    ) -> Result<Self> {
        let n = mol.natoms();
        if n == 0 {
            bail!("structure contains no atoms");
        }

        let species: Vec<String> = mol.symbols().map(|s| s.to_string()).collect();
        let positions: Vec<[f64; 3]> = mol.positions().collect();
        for (i, p) in positions.iter().enumerate() {
            if p.iter().any(|x| !x.is_finite()) {
                bail!("Invalid position of atom {}: {:?}", i, p);
            }
        }
        for s in species.iter() {
            match masses.get(s) {
                Some(m) if *m > 0.0 => {}
                Some(m) => bail!("invalid mass for element {}: {}", s, m),
                None => bail!("no mass defined for element {}", s),
            }
        }

        let prev_positions = match prev_positions {
            Some(prev) if prev.len() != n => {
                bail!("expect {} previous positions, but found {}", n, prev.len());
            }
            Some(prev) => prev,
            None => positions.clone(),
        };

        Ok(Self {
            species,
            positions,
            prev_positions,
            lattice: mol.get_lattice().cloned(),
            masses,
            forces: vec![[0.0; 3]; n],
            stds: vec![[0.0; 3]; n],
            dft_forces: false,
            energy: None,
        })
    }

    /// Read structure from `path` in any format supported by gchemol.
    pub fn from_file<P: AsRef<Path>>(
        path: P,
        masses: HashMap<String, f64>,
        prev_positions: Option<Vec<[f64; 3]>>,
    ) -> Result<Self> {
        let path = path.as_ref();
        let mol = Molecule::from_file(path).with_context(|| format!("read structure from {:?}", path))?;
        Self::from_molecule(&mol, masses, prev_positions)
    }

    /// Return the number of atoms.
    pub fn natoms(&self) -> usize {
        self.positions.len()
    }

    pub fn positions(&self) -> &[[f64; 3]] {
        &self.positions
    }

    pub fn prev_positions(&self) -> &[[f64; 3]] {
        &self.prev_positions
    }

    pub fn species(&self) -> &[String] {
        &self.species
    }

    pub fn lattice(&self) -> Option<&Lattice> {
        self.lattice.as_ref()
    }

    /// Return the distinct elements in this structure.
    pub fn species_set(&self) -> BTreeSet<&str> {
        self.species.iter().map(|s| s.as_str()).collect()
    }

    /// Return the mass of atom `i`.
    pub fn mass(&self, i: usize) -> f64 {
        self.masses[&self.species[i]]
    }

    /// Convert to a gchemol Molecule, for rendering solver input.
    pub fn to_molecule(&self) -> Molecule {
        let atoms = self.species.iter().zip(self.positions.iter()).map(|(s, p)| (s.as_str(), *p));
        let mut mol = Molecule::from_atoms(atoms);
        if let Some(lat) = &self.lattice {
            mol.set_lattice(lat.clone());
        }
        mol
    }

    /// Advance positions with `r(t+dt) = 2 r(t) - r(t-dt) + dt^2 f(t) / m`,
    /// using current forces.
    pub fn leapfrog(&mut self, dt: f64) {
        let dtdt = dt * dt;
        for i in 0..self.natoms() {
            let mass = self.mass(i);
            let pos = self.positions[i];
            let pre_pos = self.prev_positions[i];
            let force = self.forces[i];
            for k in 0..3 {
                self.positions[i][k] = 2.0 * pos[k] - pre_pos[k] + dtdt * force[k] / mass;
            }
            self.prev_positions[i] = pos;
        }
    }

    /// Return the largest uncertainty over all atoms and components, NaN
    /// values ignored.
    pub fn max_std(&self) -> f64 {
        self.stds.iter().flatten().fold(f64::NAN, |acc, &x| acc.max(x))
    }
}
// a4f9e0b7 ends here

// [[file:../otf.note::d31c07aa][d31c07aa]]
#[cfg(test)]
pub(crate) fn h2_masses() -> HashMap<String, f64> {
    let mut masses = HashMap::new();
    masses.insert("H".to_string(), 1.008);
    masses
}

#[test]
fn test_structure_from_molecule() {
    let mol = Molecule::from_atoms(vec![("H", [0.0, 0.0, 0.0]), ("H", [1.5, 0.0, 0.0])]);
    let s = Structure::from_molecule(&mol, h2_masses(), None).unwrap();
    assert_eq!(s.natoms(), 2);
    assert_eq!(s.prev_positions(), s.positions());
    assert_eq!(s.species_set().len(), 1);
    assert!(!s.dft_forces);
    assert_eq!(s.to_molecule().natoms(), 2);

    // missing mass
    assert!(Structure::from_molecule(&mol, HashMap::new(), None).is_err());
    // wrong number of previous positions
    assert!(Structure::from_molecule(&mol, h2_masses(), Some(vec![[0.0; 3]])).is_err());
}

#[test]
fn test_leapfrog() {
    let mol = Molecule::from_atoms(vec![("H", [0.0, 0.0, 0.0]), ("H", [1.5, 0.0, 0.0])]);
    let prev = vec![[-0.01, 0.0, 0.0], [1.5, 0.02, 0.0]];
    let mut s = Structure::from_molecule(&mol, h2_masses(), Some(prev.clone())).unwrap();
    s.forces = vec![[1.0, 2.0, -3.0], [-1.0, 0.0, 0.5]];
    let dt = 0.1;
    let old = s.positions().to_vec();
    s.leapfrog(dt);

    let m = 1.008;
    for i in 0..2 {
        for k in 0..3 {
            let expected = 2.0 * old[i][k] - prev[i][k] + dt * dt * s.forces[i][k] / m;
            assert_eq!(s.positions()[i][k], expected);
        }
        assert_eq!(s.prev_positions()[i], old[i]);
    }
}

#[test]
fn test_max_std() {
    let mol = Molecule::from_atoms(vec![("H", [0.0, 0.0, 0.0]), ("H", [1.5, 0.0, 0.0])]);
    let mut s = Structure::from_molecule(&mol, h2_masses(), None).unwrap();
    s.stds = vec![[0.1, f64::NAN, 0.2], [0.05, 0.3, 0.0]];
    assert_eq!(s.max_std(), 0.3);
}
// d31c07aa ends here
