// [[file:../otf.note::*header][header:1]]
//! Local atomic environments: the descriptor that GP kernels compare.
// header:1 ends here

// [[file:../otf.note::178e12ff][178e12ff]]
use super::*;

use gchemol::neighbors::Neighborhood;
// 178e12ff ends here

// [[file:../otf.note::c1f2b8d5][c1f2b8d5]]
/// A bond from the central atom to one neighbor within cutoff.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Bond {
    /// Element of the neighboring atom
    pub species: String,
    /// Bond length
    pub r: f64,
    /// Unit vector pointing from the central atom to the neighbor
    pub direction: [f64; 3],
}

/// The local environment of one atom within a cutoff radius.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AtomicEnvironment {
    /// Element of the central atom
    pub species: String,
    /// Index of the central atom in its structure
    pub atom: usize,
    pub cutoff: f64,
    pub bonds: Vec<Bond>,
}
// c1f2b8d5 ends here

// [[file:../otf.note::6e669f3b][6e669f3b]]
impl AtomicEnvironment {
    /// Build environments for all atoms in `structure`. Periodic images are
    /// taken into account if the structure has a lattice.
    pub fn all(structure: &Structure, cutoff: f64) -> Vec<AtomicEnvironment> {
        let positions = structure.positions();
        let species = structure.species();
        let lat = structure.lattice();

        let mut nh = Neighborhood::new();
        // use atom index (0-based) for node index
        nh.update(positions.iter().copied().enumerate());
        if let Some(lat) = lat {
            nh.set_lattice(lat.matrix().into());
        }

        (0..structure.natoms())
            .map(|i| {
                let pi = positions[i];
                let mut bonds = vec![];
                for x in nh.neighbors(i, cutoff) {
                    let j = x.node;
                    let pj = positions[j];
                    let d: [f64; 3] = match (x.image, lat) {
                        (Some(image), Some(lat)) => {
                            // translation periodic image
                            let t = lat.to_cart(image);
                            [pj[0] + t[0] - pi[0], pj[1] + t[1] - pi[1], pj[2] + t[2] - pi[2]]
                        }
                        _ => [pj[0] - pi[0], pj[1] - pi[1], pj[2] - pi[2]],
                    };
                    let r = d.iter().map(|x| x * x).sum::<f64>().sqrt();
                    // skip the atom itself and anything beyond cutoff
                    if r > 1e-8 && r < cutoff {
                        let direction = [d[0] / r, d[1] / r, d[2] / r];
                        bonds.push(Bond {
                            species: species[j].clone(),
                            r,
                            direction,
                        });
                    }
                }
                // make the descriptor independent of neighbor search order
                bonds.sort_by(|a, b| a.r.partial_cmp(&b.r).unwrap_or(std::cmp::Ordering::Equal));

                AtomicEnvironment {
                    species: species[i].clone(),
                    atom: i,
                    cutoff,
                    bonds,
                }
            })
            .collect()
    }

    /// Build the environment of atom `i` in `structure`.
    pub fn new(structure: &Structure, i: usize, cutoff: f64) -> Self {
        assert!(i < structure.natoms(), "atom index out of range: {}", i);
        Self::all(structure, cutoff).swap_remove(i)
    }

    /// Return the number of neighbors within cutoff.
    pub fn nbonds(&self) -> usize {
        self.bonds.len()
    }
}
// 6e669f3b ends here

// [[file:../otf.note::28122508][28122508]]
#[test]
fn test_atomic_environment() {
    use approx::*;

    let mol = Molecule::from_atoms(vec![
        ("H", [0.0, 0.0, 0.0]),
        ("H", [1.5, 0.0, 0.0]),
        ("H", [0.0, 4.0, 0.0]),
    ]);
    let s = Structure::from_molecule(&mol, structure::h2_masses(), None).unwrap();
    let envs = AtomicEnvironment::all(&s, 3.0);
    assert_eq!(envs.len(), 3);

    // atom 0 and 1 are bonded, atom 2 is isolated
    assert_eq!(envs[0].nbonds(), 1);
    assert_eq!(envs[1].nbonds(), 1);
    assert_eq!(envs[2].nbonds(), 0);
    assert_relative_eq!(envs[0].bonds[0].r, 1.5, epsilon = 1e-10);
    assert_relative_eq!(envs[0].bonds[0].direction[0], 1.0, epsilon = 1e-10);
    assert_relative_eq!(envs[1].bonds[0].direction[0], -1.0, epsilon = 1e-10);

    let env = AtomicEnvironment::new(&s, 1, 3.0);
    assert_eq!(env, envs[1]);
    assert_eq!(env.atom, 1);
}
// 28122508 ends here
