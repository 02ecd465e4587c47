// [[file:../../otf.note::*imports][imports:1]]
use super::*;
// imports:1 ends here

// [[file:../../otf.note::71c0e9d3][71c0e9d3]]
/// One labeled structure in the training set.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrainingStructure {
    natoms: usize,
    energy: Option<f64>,
    forces: Option<Vec<[f64; 3]>>,
    /// Atoms whose forces are included as labels, in label order.
    atoms: Vec<usize>,
    /// Position of the first label of this structure in the label vector.
    offset: usize,
    /// Environments of all atoms, including those without force labels.
    envs: Vec<AtomicEnvironment>,
}

impl TrainingStructure {
    pub fn natoms(&self) -> usize {
        self.natoms
    }

    pub fn energy(&self) -> Option<f64> {
        self.energy
    }

    pub fn forces(&self) -> Option<&[[f64; 3]]> {
        self.forces.as_deref()
    }

    /// Atoms with force labels.
    pub fn force_atoms(&self) -> &[usize] {
        &self.atoms
    }

    pub fn environments(&self) -> &[AtomicEnvironment] {
        &self.envs
    }

    /// Return the number of scalar labels this structure contributes.
    pub fn nlabels(&self) -> usize {
        let ne = if self.energy.is_some() { 1 } else { 0 };
        let nf = if self.forces.is_some() { 3 * self.atoms.len() } else { 0 };
        ne + nf
    }
}

/// A single scalar label in the training set, seen as a kernel query.
#[derive(Debug, Clone, Copy)]
pub enum LabelPoint<'a> {
    /// Total energy of a structure: sum of local energies of all its atoms.
    Energy(&'a [AtomicEnvironment]),
    /// One Cartesian force component on one atom.
    Force(&'a AtomicEnvironment, usize),
}
// 71c0e9d3 ends here

// [[file:../../otf.note::b28a6f14][b28a6f14]]
/// The growing training set of a GP model, with the flattened label vector.
///
/// Labels are laid out in insertion order. For each structure the energy
/// label (if any) comes first, followed by `[fx, fy, fz]` of each atom in
/// its force range. Every vector aligned with the training set must be
/// built through [`TrainingStore::assemble`], which walks the same layout.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TrainingStore {
    structures: Vec<TrainingStructure>,
    labels: Vec<f64>,
}

impl TrainingStore {
    /// Add one structure to the training set.
    ///
    /// # Parameters
    ///
    /// * envs: environments of all atoms in the structure
    /// * energy: total energy label
    /// * forces: force labels for all atoms
    /// * force_range: atoms whose forces are used as labels; all atoms if None
    pub fn add(
        &mut self,
        envs: Vec<AtomicEnvironment>,
        energy: Option<f64>,
        forces: Option<&[[f64; 3]]>,
        force_range: Option<&[usize]>,
    ) -> Result<()> {
        let natoms = envs.len();
        if let Some(forces) = forces {
            if forces.len() != natoms {
                bail!("expect forces of {} atoms, but found {}", natoms, forces.len());
            }
        }
        if let Some(e) = energy {
            if !e.is_finite() {
                bail!("invalid energy label: {}", e);
            }
        }

        let atoms: Vec<usize> = match (forces, force_range) {
            (None, _) => vec![],
            (Some(_), None) => (0..natoms).collect(),
            (Some(_), Some(range)) => {
                let mut seen = vec![false; natoms];
                for &i in range {
                    if i >= natoms {
                        bail!("atom index {} in force range out of bounds ({} atoms)", i, natoms);
                    }
                    if seen[i] {
                        bail!("duplicate atom index {} in force range", i);
                    }
                    seen[i] = true;
                }
                range.to_vec()
            }
        };

        let record = TrainingStructure {
            natoms,
            energy,
            forces: forces.map(|f| f.to_vec()),
            atoms,
            offset: self.labels.len(),
            envs,
        };

        self.labels.reserve(record.nlabels());
        if let Some(e) = record.energy {
            self.labels.push(e);
        }
        if let Some(forces) = &record.forces {
            for &i in record.atoms.iter() {
                self.labels.extend_from_slice(&forces[i]);
            }
        }
        assert_eq!(
            self.labels.len(),
            record.offset + record.nlabels(),
            "label vector out of sync with training structure"
        );
        self.structures.push(record);

        Ok(())
    }

    /// Walk the training set in label order, and collect one value per
    /// label. `energy_term` is called with all environments of a structure
    /// having an energy label, and `force_term` with the environment and
    /// Cartesian component of each force label.
    pub fn assemble<'a, T>(
        &'a self,
        mut energy_term: impl FnMut(&'a [AtomicEnvironment]) -> T,
        mut force_term: impl FnMut(&'a AtomicEnvironment, usize) -> T,
    ) -> Vec<T> {
        let mut values = Vec::with_capacity(self.labels.len());
        let mut index = 0;
        for s in self.structures.iter() {
            assert_eq!(index, s.offset, "kernel vector misaligned with training labels");
            if s.energy.is_some() {
                values.push(energy_term(&s.envs));
                index += 1;
            }
            if s.forces.is_some() {
                for &atom in s.atoms.iter() {
                    let env = &s.envs[atom];
                    for d in 0..3 {
                        values.push(force_term(env, d));
                    }
                    index += 3;
                }
            }
        }
        assert_eq!(index, self.labels.len(), "kernel vector misaligned with training labels");
        debug_assert_eq!(values.len(), index);

        values
    }

    /// Return all labels as kernel queries, in label order.
    pub fn label_points(&self) -> Vec<LabelPoint> {
        self.assemble(LabelPoint::Energy, LabelPoint::Force)
    }

    /// The flattened label vector.
    pub fn labels(&self) -> &[f64] {
        &self.labels
    }

    pub fn structures(&self) -> &[TrainingStructure] {
        &self.structures
    }

    /// Return the number of labels.
    pub fn nlabels(&self) -> usize {
        self.labels.len()
    }

    /// Return true if there is no label in the training set.
    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }
}
// b28a6f14 ends here

// [[file:../../otf.note::3f8d2e61][3f8d2e61]]
#[cfg(test)]
mod tests {
    use super::*;

    fn envs3() -> Vec<AtomicEnvironment> {
        let mol = Molecule::from_atoms(vec![
            ("H", [0.0, 0.0, 0.0]),
            ("H", [1.5, 0.0, 0.0]),
            ("H", [0.0, 1.2, 0.0]),
        ]);
        let s = Structure::from_molecule(&mol, crate::structure::h2_masses(), None).unwrap();
        AtomicEnvironment::all(&s, 3.0)
    }

    const FORCES: [[f64; 3]; 3] = [[0.1, 0.2, 0.3], [1.1, 1.2, 1.3], [2.1, 2.2, 2.3]];

    #[test]
    fn test_partial_force_labels() -> Result<()> {
        let mut store = TrainingStore::default();
        store.add(envs3(), Some(-1.5), Some(&FORCES), Some(&[0, 2]))?;
        assert_eq!(store.labels(), &[-1.5, 0.1, 0.2, 0.3, 2.1, 2.2, 2.3]);

        let s = &store.structures()[0];
        assert_eq!(s.nlabels(), 7);
        assert_eq!(s.force_atoms(), &[0, 2]);
        // descriptors are kept for every atom
        assert_eq!(s.environments().len(), 3);

        // the walk reproduces the layout
        let points = store.label_points();
        assert_eq!(points.len(), 7);
        assert!(matches!(points[0], LabelPoint::Energy(envs) if envs.len() == 3));
        assert!(matches!(points[4], LabelPoint::Force(env, 0) if env.atom == 2));
        assert!(matches!(points[6], LabelPoint::Force(env, 2) if env.atom == 2));

        Ok(())
    }

    #[test]
    fn test_insertion_order() -> Result<()> {
        let mut store = TrainingStore::default();
        // forces only, all atoms
        store.add(envs3(), None, Some(&FORCES), None)?;
        // energy only
        store.add(envs3(), Some(-3.0), None, Some(&[1]))?;
        // no labels at all
        store.add(envs3(), None, None, None)?;
        // both
        store.add(envs3(), Some(-2.0), Some(&FORCES), Some(&[1]))?;

        assert_eq!(store.structures().len(), 4);
        assert_eq!(store.nlabels(), 9 + 1 + 0 + 4);
        assert_eq!(store.labels()[8], 2.3);
        assert_eq!(store.labels()[9], -3.0);
        assert_eq!(&store.labels()[10..], &[-2.0, 1.1, 1.2, 1.3]);
        assert_eq!(store.structures()[2].nlabels(), 0);

        let values = store.assemble(|_| "e", |_, _| "f");
        assert_eq!(values.len(), store.nlabels());
        assert_eq!(values[9], "e");
        assert_eq!(values[10], "e");
        assert_eq!(values[11], "f");

        Ok(())
    }

    #[test]
    fn test_invalid_labels() {
        let mut store = TrainingStore::default();
        assert!(store.add(envs3(), None, Some(&FORCES[..2]), None).is_err());
        assert!(store.add(envs3(), None, Some(&FORCES), Some(&[3])).is_err());
        assert!(store.add(envs3(), None, Some(&FORCES), Some(&[0, 2, 0])).is_err());
        assert!(store.add(envs3(), Some(f64::NAN), None, None).is_err());
        assert!(store.is_empty());
        assert!(store.structures().is_empty());
    }
}
// 3f8d2e61 ends here
