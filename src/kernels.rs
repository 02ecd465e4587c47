// [[file:../otf.note::*header][header:1]]
//! Kernel functions for GP regression of local energies and forces.
//!
//! The two-body kernel models the local energy of an atomic environment as
//! half the sum of pair terms over its bonds, `e(x) = 1/2 sum phi(r)`, where
//! `phi(r) = fc(r) g(r)`, `fc` is a quadratic cutoff and `g` is a Gaussian
//! process with a squared exponential kernel. The force on the central atom
//! is then `F_d(x) = sum phi'(r) c_d`, with `c` the bond unit vector, and all
//! kernels below are exact covariances between these quantities.
//!
//! Hyperparameters: `[signal std, length scale, noise std]`. Force
//! components are 0-based (0 = x, 1 = y, 2 = z).
// header:1 ends here

// [[file:../otf.note::4a7e19d2][4a7e19d2]]
use super::*;
// 4a7e19d2 ends here

// [[file:../otf.note::e3b1d0f6][e3b1d0f6]]
/// Covariance between force components `d1` of env1 and `d2` of env2.
pub type ForceKernel = fn(&AtomicEnvironment, &AtomicEnvironment, usize, usize, &[f64], &[f64]) -> f64;
/// Force/force covariance and its gradient with respect to the kernel
/// hyperparameters (all but the noise).
pub type ForceKernelGrad =
    fn(&AtomicEnvironment, &AtomicEnvironment, usize, usize, &[f64], &[f64]) -> (f64, Vec<f64>);
/// Covariance between the local energies of env1 and env2.
pub type EnergyKernel = fn(&AtomicEnvironment, &AtomicEnvironment, &[f64], &[f64]) -> f64;
pub type EnergyKernelGrad = fn(&AtomicEnvironment, &AtomicEnvironment, &[f64], &[f64]) -> (f64, Vec<f64>);
/// Covariance between force component `d` of env1 and the local energy of
/// env2.
pub type EnergyForceKernel = fn(&AtomicEnvironment, &AtomicEnvironment, usize, &[f64], &[f64]) -> f64;
pub type EnergyForceKernelGrad =
    fn(&AtomicEnvironment, &AtomicEnvironment, usize, &[f64], &[f64]) -> (f64, Vec<f64>);

/// A family of mutually consistent kernel functions.
#[derive(Clone)]
pub struct KernelSet {
    pub name: &'static str,
    /// Labels for all hyperparameters, noise last.
    pub hyp_labels: Vec<String>,
    pub force: ForceKernel,
    pub force_grad: ForceKernelGrad,
    pub energy: EnergyKernel,
    pub energy_grad: EnergyKernelGrad,
    pub energy_force: EnergyForceKernel,
    pub energy_force_grad: EnergyForceKernelGrad,
}

impl std::fmt::Debug for KernelSet {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        f.debug_struct("KernelSet")
            .field("name", &self.name)
            .field("hyp_labels", &self.hyp_labels)
            .finish()
    }
}

impl KernelSet {
    /// The two-body squared exponential kernel family.
    pub fn two_body() -> Self {
        Self {
            name: "two_body",
            hyp_labels: vec!["Signal Std".into(), "Length Scale".into(), "Noise Std".into()],
            force: two_body::force,
            force_grad: two_body::force_grad,
            energy: two_body::energy,
            energy_grad: two_body::energy_grad,
            energy_force: two_body::energy_force,
            energy_force_grad: two_body::energy_force_grad,
        }
    }

    /// Look up a kernel family by name.
    pub fn from_name(name: &str) -> Result<Self> {
        match name {
            "two_body" | "two-body" | "2body" => Ok(Self::two_body()),
            _ => bail!("unknown kernel: {}", name),
        }
    }

    /// Return the number of hyperparameters including the noise.
    pub fn nhyps(&self) -> usize {
        self.hyp_labels.len()
    }
}
// e3b1d0f6 ends here

// [[file:../otf.note::93c6f2ab][93c6f2ab]]
mod two_body {
    use super::*;

    fn bonds_match(c1: &str, e1: &str, c2: &str, e2: &str) -> bool {
        (c1 == c2 && e1 == e2) || (c1 == e2 && c2 == e1)
    }

    // quadratic cutoff function and its derivative with respect to r
    fn cutoff(rc: f64, r: f64) -> (f64, f64) {
        let x = rc - r;
        (x * x, -2.0 * x)
    }

    /// The scalar terms of one pair of matching bonds.
    struct Pair {
        // unit vectors of the two bonds
        c1: [f64; 3],
        c2: [f64; 3],
        // cutoff values and derivatives
        f1: f64,
        df1: f64,
        f2: f64,
        df2: f64,
        // r1 - r2
        u: f64,
        // squared exponential: sig^2 exp(-u^2 / (2 ls^2))
        k: f64,
    }

    // call `f` on every pair of matching bonds
    fn for_each_pair(
        env1: &AtomicEnvironment,
        env2: &AtomicEnvironment,
        hyps: &[f64],
        cutoffs: &[f64],
        mut f: impl FnMut(&Pair),
    ) {
        assert!(hyps.len() >= 2, "two-body kernel expects at least 2 hyperparameters");
        let sig2 = hyps[0] * hyps[0];
        let ls2 = hyps[1] * hyps[1];
        let rc = cutoffs[0];

        for b1 in env1.bonds.iter() {
            let (f1, df1) = cutoff(rc, b1.r);
            for b2 in env2.bonds.iter() {
                if !bonds_match(&env1.species, &b1.species, &env2.species, &b2.species) {
                    continue;
                }
                let (f2, df2) = cutoff(rc, b2.r);
                let u = b1.r - b2.r;
                let k = sig2 * (-u * u / (2.0 * ls2)).exp();
                f(&Pair {
                    c1: b1.direction,
                    c2: b2.direction,
                    f1,
                    df1,
                    f2,
                    df2,
                    u,
                    k,
                });
            }
        }
    }

    // d^2 [f1 f2 k] / dr1 dr2
    fn force_term(p: &Pair, ls: f64) -> f64 {
        let ls2 = ls * ls;
        let ls4 = ls2 * ls2;
        let u = p.u;
        p.k * (p.df1 * p.df2 + (p.df1 * p.f2 - p.f1 * p.df2) * u / ls2 + p.f1 * p.f2 * (1.0 / ls2 - u * u / ls4))
    }

    // d/dls of force_term
    fn force_term_dls(p: &Pair, ls: f64) -> f64 {
        let ls2 = ls * ls;
        let ls3 = ls2 * ls;
        let ls4 = ls2 * ls2;
        let ls5 = ls4 * ls;
        let u = p.u;
        let u2 = u * u;
        let dk = p.k * u2 / ls3;
        p.df1 * p.df2 * dk
            + (p.df1 * p.f2 - p.f1 * p.df2) * u * p.k * (u2 / ls5 - 2.0 / ls3)
            + p.f1 * p.f2 * (dk * (1.0 / ls2 - u2 / ls4) + p.k * (-2.0 / ls3 + 4.0 * u2 / ls5))
    }

    // d [f1 f2 k] / dr1
    fn energy_force_term(p: &Pair, ls: f64) -> f64 {
        p.f2 * p.k * (p.df1 - p.f1 * p.u / (ls * ls))
    }

    // d/dls of energy_force_term
    fn energy_force_term_dls(p: &Pair, ls: f64) -> f64 {
        let ls3 = ls * ls * ls;
        let ls5 = ls3 * ls * ls;
        let u = p.u;
        let u2 = u * u;
        p.f2 * p.k * (p.df1 * u2 / ls3 - p.f1 * u * (u2 / ls5 - 2.0 / ls3))
    }

    pub fn force(
        env1: &AtomicEnvironment,
        env2: &AtomicEnvironment,
        d1: usize,
        d2: usize,
        hyps: &[f64],
        cutoffs: &[f64],
    ) -> f64 {
        let ls = hyps[1];
        let mut kern = 0.0;
        for_each_pair(env1, env2, hyps, cutoffs, |p| {
            kern += p.c1[d1] * p.c2[d2] * force_term(p, ls);
        });
        kern
    }

    pub fn force_grad(
        env1: &AtomicEnvironment,
        env2: &AtomicEnvironment,
        d1: usize,
        d2: usize,
        hyps: &[f64],
        cutoffs: &[f64],
    ) -> (f64, Vec<f64>) {
        let (sig, ls) = (hyps[0], hyps[1]);
        let mut kern = 0.0;
        let mut dls = 0.0;
        for_each_pair(env1, env2, hyps, cutoffs, |p| {
            let a = p.c1[d1] * p.c2[d2];
            kern += a * force_term(p, ls);
            dls += a * force_term_dls(p, ls);
        });
        (kern, vec![2.0 * kern / sig, dls])
    }

    pub fn energy(env1: &AtomicEnvironment, env2: &AtomicEnvironment, hyps: &[f64], cutoffs: &[f64]) -> f64 {
        let mut kern = 0.0;
        for_each_pair(env1, env2, hyps, cutoffs, |p| {
            kern += p.f1 * p.f2 * p.k;
        });
        kern / 4.0
    }

    pub fn energy_grad(
        env1: &AtomicEnvironment,
        env2: &AtomicEnvironment,
        hyps: &[f64],
        cutoffs: &[f64],
    ) -> (f64, Vec<f64>) {
        let (sig, ls) = (hyps[0], hyps[1]);
        let ls3 = ls * ls * ls;
        let mut kern = 0.0;
        let mut dls = 0.0;
        for_each_pair(env1, env2, hyps, cutoffs, |p| {
            let x = p.f1 * p.f2 * p.k;
            kern += x;
            dls += x * p.u * p.u / ls3;
        });
        let kern = kern / 4.0;
        (kern, vec![2.0 * kern / sig, dls / 4.0])
    }

    pub fn energy_force(
        env1: &AtomicEnvironment,
        env2: &AtomicEnvironment,
        d: usize,
        hyps: &[f64],
        cutoffs: &[f64],
    ) -> f64 {
        let ls = hyps[1];
        let mut kern = 0.0;
        for_each_pair(env1, env2, hyps, cutoffs, |p| {
            kern += p.c1[d] * energy_force_term(p, ls);
        });
        kern / 2.0
    }

    pub fn energy_force_grad(
        env1: &AtomicEnvironment,
        env2: &AtomicEnvironment,
        d: usize,
        hyps: &[f64],
        cutoffs: &[f64],
    ) -> (f64, Vec<f64>) {
        let (sig, ls) = (hyps[0], hyps[1]);
        let mut kern = 0.0;
        let mut dls = 0.0;
        for_each_pair(env1, env2, hyps, cutoffs, |p| {
            kern += p.c1[d] * energy_force_term(p, ls);
            dls += p.c1[d] * energy_force_term_dls(p, ls);
        });
        let kern = kern / 2.0;
        (kern, vec![2.0 * kern / sig, dls / 2.0])
    }
}
// 93c6f2ab ends here

// [[file:../otf.note::0d5c7b42][0d5c7b42]]
#[cfg(test)]
mod tests {
    use super::*;
    use approx::*;

    const HYPS: [f64; 3] = [1.3, 0.8, 0.05];
    const CUTOFFS: [f64; 1] = [3.0];

    // environment of an "H" atom at `center` surrounded by `neighbors`
    fn env_from(center: [f64; 3], neighbors: &[[f64; 3]]) -> AtomicEnvironment {
        let bonds = neighbors
            .iter()
            .map(|p| {
                let d = [p[0] - center[0], p[1] - center[1], p[2] - center[2]];
                let r = d.iter().map(|x| x * x).sum::<f64>().sqrt();
                Bond {
                    species: "H".into(),
                    r,
                    direction: [d[0] / r, d[1] / r, d[2] / r],
                }
            })
            .collect();
        AtomicEnvironment {
            species: "H".into(),
            atom: 0,
            cutoff: CUTOFFS[0],
            bonds,
        }
    }

    fn shifted(p: [f64; 3], d: usize, h: f64) -> [f64; 3] {
        let mut p = p;
        p[d] += h;
        p
    }

    const C1: [f64; 3] = [0.1, -0.2, 0.05];
    const N1: [[f64; 3]; 2] = [[1.2, 0.3, -0.4], [-0.5, 1.1, 0.9]];
    const C2: [f64; 3] = [0.0, 0.0, 0.0];
    const N2: [[f64; 3]; 3] = [[1.0, 0.2, 0.1], [0.3, -1.4, 0.2], [-0.9, 0.4, -1.2]];

    #[test]
    fn test_force_kernel_symmetry() {
        let k = KernelSet::two_body();
        let env1 = env_from(C1, &N1);
        let env2 = env_from(C2, &N2);
        for d1 in 0..3 {
            for d2 in 0..3 {
                let k12 = (k.force)(&env1, &env2, d1, d2, &HYPS, &CUTOFFS);
                let k21 = (k.force)(&env2, &env1, d2, d1, &HYPS, &CUTOFFS);
                assert_relative_eq!(k12, k21, epsilon = 1e-12);
            }
        }
        let e12 = (k.energy)(&env1, &env2, &HYPS, &CUTOFFS);
        let e21 = (k.energy)(&env2, &env1, &HYPS, &CUTOFFS);
        assert_relative_eq!(e12, e21, epsilon = 1e-12);
    }

    // F_d(x) = -2 de(x)/dR_d when only the bonds of x move
    #[test]
    fn test_energy_force_kernel_derivative() {
        let k = KernelSet::two_body();
        let env2 = env_from(C2, &N2);
        let h = 1e-5;
        for d in 0..3 {
            let ep = (k.energy)(&env_from(shifted(C1, d, h), &N1), &env2, &HYPS, &CUTOFFS);
            let em = (k.energy)(&env_from(shifted(C1, d, -h), &N1), &env2, &HYPS, &CUTOFFS);
            let fd = -2.0 * (ep - em) / (2.0 * h);
            let ef = (k.energy_force)(&env_from(C1, &N1), &env2, d, &HYPS, &CUTOFFS);
            assert_relative_eq!(ef, fd, epsilon = 1e-6);
        }
    }

    #[test]
    fn test_force_kernel_derivative() {
        let k = KernelSet::two_body();
        let env1 = env_from(C1, &N1);
        let h = 1e-5;
        for d1 in 0..3 {
            for d2 in 0..3 {
                let ep = (k.energy_force)(&env1, &env_from(shifted(C2, d2, h), &N2), d1, &HYPS, &CUTOFFS);
                let em = (k.energy_force)(&env1, &env_from(shifted(C2, d2, -h), &N2), d1, &HYPS, &CUTOFFS);
                let fd = -2.0 * (ep - em) / (2.0 * h);
                let ff = (k.force)(&env1, &env_from(C2, &N2), d1, d2, &HYPS, &CUTOFFS);
                assert_relative_eq!(ff, fd, epsilon = 1e-6);
            }
        }
    }

    #[test]
    fn test_kernel_gradients() {
        let k = KernelSet::two_body();
        let env1 = env_from(C1, &N1);
        let env2 = env_from(C2, &N2);
        let h = 1e-6;
        for i in 0..2 {
            let mut hp = HYPS;
            let mut hm = HYPS;
            hp[i] += h;
            hm[i] -= h;

            let (kern, grad) = (k.force_grad)(&env1, &env2, 0, 1, &HYPS, &CUTOFFS);
            assert_relative_eq!(kern, (k.force)(&env1, &env2, 0, 1, &HYPS, &CUTOFFS), epsilon = 1e-12);
            let fd = ((k.force)(&env1, &env2, 0, 1, &hp, &CUTOFFS) - (k.force)(&env1, &env2, 0, 1, &hm, &CUTOFFS)) / (2.0 * h);
            assert_relative_eq!(grad[i], fd, epsilon = 1e-5);

            let (_, grad) = (k.energy_grad)(&env1, &env2, &HYPS, &CUTOFFS);
            let fd = ((k.energy)(&env1, &env2, &hp, &CUTOFFS) - (k.energy)(&env1, &env2, &hm, &CUTOFFS)) / (2.0 * h);
            assert_relative_eq!(grad[i], fd, epsilon = 1e-5);

            let (_, grad) = (k.energy_force_grad)(&env1, &env2, 2, &HYPS, &CUTOFFS);
            let fd = ((k.energy_force)(&env1, &env2, 2, &hp, &CUTOFFS)
                - (k.energy_force)(&env1, &env2, 2, &hm, &CUTOFFS))
                / (2.0 * h);
            assert_relative_eq!(grad[i], fd, epsilon = 1e-5);
        }
    }

    #[test]
    fn test_species_mismatch() {
        let k = KernelSet::two_body();
        let env1 = env_from(C1, &N1);
        let mut env2 = env_from(C2, &N2);
        env2.species = "O".into();
        for b in env2.bonds.iter_mut() {
            b.species = "O".into();
        }
        assert_eq!((k.energy)(&env1, &env2, &HYPS, &CUTOFFS), 0.0);
        assert_eq!((k.force)(&env1, &env2, 0, 0, &HYPS, &CUTOFFS), 0.0);
    }

    #[test]
    fn test_kernel_from_name() {
        assert_eq!(KernelSet::from_name("two_body").unwrap().nhyps(), 3);
        assert!(KernelSet::from_name("three_body").is_err());
    }
}
// 0d5c7b42 ends here
