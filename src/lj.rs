// [[file:../otf.note::*header][header:1]]
//! The Lennard-Jones model as an in-process ground-truth solver, for tests
//! and dry runs
// header:1 ends here

// [[file:../otf.note::*imports][imports:1]]
use super::*;

use vecfx::*;
// imports:1 ends here

// [[file:../otf.note::*core][core:1]]
#[derive(Clone, Copy, Debug)]
pub struct LennardJones {
    /// Energy constant of the Lennard-Jones potential
    pub epsilon: f64,
    /// Distance constant of the Lennard-Jones potential
    pub sigma: f64,
}

impl Default for LennardJones {
    fn default() -> Self {
        LennardJones {
            epsilon: 1.0,
            sigma: 1.0,
        }
    }
}

impl LennardJones {
    // vij
    fn pair_energy(&self, r: f64) -> f64 {
        let s6 = f64::powi(self.sigma / r, 6);
        4.0 * self.epsilon * (f64::powi(s6, 2) - s6)
    }

    // dvij/dr
    fn pair_gradient(&self, r: f64) -> f64 {
        let s6 = f64::powi(self.sigma / r, 6);

        24.0 * self.epsilon * (s6 - 2.0 * f64::powi(s6, 2)) / r
    }

    /// Evaluate energy and forces
    pub fn evaluate(&self, positions: &[[f64; 3]], forces: &mut [[f64; 3]]) -> f64 {
        let n = positions.len();
        debug_assert_eq!(n, forces.len(), "positions.len() != forces.len()");

        for f in forces.iter_mut() {
            *f = [0.0; 3];
        }

        // collect pair terms in parallel
        let parts: Vec<_> = (0..n)
            .into_par_iter()
            .flat_map(|i| {
                (0..i).into_par_iter().map(move |j| {
                    let r = positions[i].vecdist(&positions[j]);
                    (self.pair_energy(r), self.pair_gradient(r) / r, (i, j))
                })
            })
            .collect();

        let energy: f64 = parts.iter().map(|(e, _, _)| *e).sum();
        for (_, g, (i, j)) in parts {
            for k in 0..3 {
                let dr = positions[j][k] - positions[i][k];
                forces[i][k] += g * dr;
                forces[j][k] -= g * dr;
            }
        }

        energy
    }
}
// core:1 ends here

// [[file:../otf.note::*entry][entry:1]]
impl ChemicalModel for LennardJones {
    fn compute(&mut self, mol: &Molecule) -> Result<Computed> {
        if mol.get_lattice().is_some() {
            warn!("LJ model: periodic lattice will be ignored!");
        }

        let positions: Vec<_> = mol.positions().collect();
        let mut forces = vec![[0.0; 3]; positions.len()];
        let energy = self.evaluate(&positions, &mut forces);

        let mut mp = Computed::default();
        mp.set_energy(energy);
        mp.set_forces(forces);
        Ok(mp)
    }
}
// entry:1 ends here

// [[file:../otf.note::*test][test:1]]
#[test]
fn test_lj_model() -> Result<()> {
    use ::approx::*;

    let mut lj = LennardJones::default();

    // dimer at the potential minimum
    let r0 = 2f64.powf(1.0 / 6.0);
    let mol = Molecule::from_atoms(vec![("Ar", [0.0, 0.0, 0.0]), ("Ar", [r0, 0.0, 0.0])]);
    let mp = lj.compute(&mol)?;
    assert_relative_eq!(-1.0, mp.get_energy().unwrap(), epsilon = 1e-8);
    for f in mp.validate_forces(2)? {
        for &x in f {
            assert_relative_eq!(0.0, x, epsilon = 1e-8);
        }
    }

    // forces are the negative energy gradient
    let positions = vec![[0.0, 0.0, 0.0], [1.3, 0.1, 0.0], [0.2, 1.2, -0.3]];
    let mut forces = vec![[0.0; 3]; 3];
    lj.evaluate(&positions, &mut forces);
    let h = 1e-6;
    let mut f = vec![[0.0; 3]; 3];
    for i in 0..3 {
        for k in 0..3 {
            let mut p = positions.clone();
            p[i][k] += h;
            let ep = lj.evaluate(&p, &mut f);
            p[i][k] -= 2.0 * h;
            let em = lj.evaluate(&p, &mut f);
            assert_relative_eq!(forces[i][k], -(ep - em) / (2.0 * h), epsilon = 1e-5);
        }
    }

    Ok(())
}
// test:1 ends here
