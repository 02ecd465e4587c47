// [[file:../otf.note::b456354a][b456354a]]
use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

use super::*;
// b456354a ends here

// [[file:../otf.note::7de724a0][7de724a0]]
const MODEL_PROPERTIES_FORMAT_VERSION: &str = "0.1";

/// Ground-truth properties returned by an external solver for one structure
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Computed {
    energy: Option<f64>,
    forces: Option<Vec<[f64; 3]>>,
}
// 7de724a0 ends here

// [[file:../otf.note::3b493716][3b493716]]
/// Section header like `@forces unit_factor=-1`
#[derive(Debug, Clone)]
struct Header {
    name: String,
    unit_factor: f64,
}

impl FromStr for Header {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let s = s.trim();
        if !s.starts_with('@') {
            bail!("invalid solver output section header: {}", s);
        }

        let mut parts = s[1..].split_whitespace();
        let name = parts
            .next()
            .ok_or_else(|| format_err!("empty section header: {:?}", s))?
            .to_owned();
        let mut unit_factor = 1.0;
        for p in parts {
            if let Some(("unit_factor", v)) = p.split_once('=') {
                unit_factor = v
                    .parse()
                    .with_context(|| format!("invalid unit_factor in header: {:?}", s))?;
            }
        }
        Ok(Self { name, unit_factor })
    }
}

#[test]
fn test_header() {
    let h: Header = "@forces ".parse().unwrap();
    assert_eq!(h.name, "forces");
    assert_eq!(h.unit_factor, 1.0);

    let h: Header = "@energy unit_factor=27.211386 test=2".parse().unwrap();
    assert_eq!(h.name, "energy");
    assert_eq!(h.unit_factor, 27.211386);

    assert!("forces".parse::<Header>().is_err());
    assert!("@forces unit_factor=x".parse::<Header>().is_err());
}
// 3b493716 ends here

// [[file:../otf.note::37f15603][37f15603]]
impl Computed {
    /// Parse mulitple entries of Computed from solver output.
    pub fn parse_all(output: &str) -> Result<Vec<Computed>> {
        parse_model_results(output)
    }

    /// Return true if there is no useful properties
    pub fn is_empty(&self) -> bool {
        self.energy.is_none() && self.forces.is_none()
    }

    /// Check computed forces against a structure of `natoms` atoms. Missing
    /// forces, a wrong number of atoms or non-finite values are all treated
    /// as a malformed solver result.
    pub fn validate_forces(&self, natoms: usize) -> Result<&[[f64; 3]]> {
        let forces = self
            .forces
            .as_deref()
            .ok_or_else(|| format_err!("no forces found in solver results"))?;
        if forces.len() != natoms {
            bail!("expect forces for {} atoms, but found {}", natoms, forces.len());
        }
        if let Some(i) = forces.iter().position(|f| f.iter().any(|x| !x.is_finite())) {
            bail!("invalid force on atom {}: {:?}", i, forces[i]);
        }
        Ok(forces)
    }
}

impl fmt::Display for Computed {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        writeln!(f, "@model_properties_format_version {}", MODEL_PROPERTIES_FORMAT_VERSION)?;
        if let Some(energy) = &self.energy {
            writeln!(f, "@energy")?;
            writeln!(f, "{:-20.12E}", energy)?;
        }
        if let Some(forces) = &self.forces {
            writeln!(f, "@forces")?;
            for [fx, fy, fz] in forces {
                writeln!(f, "{:-20.12E} {:-20.12E} {:-20.12E}", fx, fy, fz)?;
            }
        }
        Ok(())
    }
}

impl FromStr for Computed {
    type Err = Error;

    /// Parse the last entry from solver output
    fn from_str(s: &str) -> Result<Self> {
        let mut all = parse_model_results(s)?;
        match all.pop() {
            Some(last) => Ok(last),
            None => bail!("no valid results found from:\n {:?}!", s),
        }
    }
}

fn parse_xyz(line: &str, unit_factor: f64) -> Result<[f64; 3]> {
    let parts: Vec<_> = line.split_whitespace().collect();
    if parts.len() != 3 {
        bail!("expect xyz components: {}", line);
    }
    let mut xyz = [0.0; 3];
    for (x, p) in xyz.iter_mut().zip(parts) {
        *x = p.parse::<f64>().with_context(|| format!("invalid number in line: {:?}", line))? * unit_factor;
    }
    Ok(xyz)
}

// parse a single entry of Computed
fn parse_model_results_single(part: &[&str]) -> Result<Computed> {
    // collect records as header separated lines
    let mut records: HashMap<&str, Vec<&str>> = HashMap::new();
    let mut header = None;
    for line in part {
        let line = line.trim();
        if line.starts_with('@') {
            header = Some(line);
        } else if let Some(k) = header {
            records.entry(k).or_default().push(line);
        }
    }

    if records.is_empty() {
        warn!("Collected no results. Please check if the stream is clean!");
        warn!("suspicious part: {:?}", part);
    }

    let mut results = Computed::default();
    for (k, lines) in records {
        let header: Header = k.parse()?;
        let unit_factor = header.unit_factor;
        match header.name.as_str() {
            "energy" => {
                if lines.len() != 1 {
                    bail!("expect one line containing energy, but found {}", lines.len());
                }
                let energy = lines[0]
                    .parse::<f64>()
                    .with_context(|| format!("invalid energy: {:?}", lines[0]))?;
                results.energy = Some(energy * unit_factor);
            }
            "forces" => {
                let forces: Result<Vec<_>> = lines.iter().map(|line| parse_xyz(line, unit_factor)).collect();
                results.forces = Some(forces?);
            }
            _ => {
                warn!("ignored record: {:?}", k);
            }
        }
    }

    Ok(results)
}

fn parse_model_results(stream: &str) -> Result<Vec<Computed>> {
    if stream.trim().is_empty() {
        bail!("Attemp to parse empty string!");
    }

    // ignore commenting lines or blank lines
    let lines: Vec<_> = stream
        .lines()
        .filter(|l| {
            let l = l.trim();
            !l.starts_with('#') && !l.is_empty()
        })
        .collect();

    let mut all_results = vec![];
    for part in lines.split(|l| l.starts_with("@model_properties_format_version")) {
        if !part.is_empty() {
            all_results.push(parse_model_results_single(part)?);
        }
    }

    Ok(all_results)
}
// 37f15603 ends here

// [[file:../otf.note::8a1de0c2][8a1de0c2]]
impl Computed {
    /// Set item energy.
    pub fn set_energy(&mut self, e: f64) {
        self.energy = Some(e);
    }

    /// Set item forces.
    pub fn set_forces(&mut self, f: Vec<[f64; 3]>) {
        self.forces = Some(f);
    }

    /// Get energy component.
    pub fn get_energy(&self) -> Option<f64> {
        self.energy
    }

    /// Get forces component.
    pub fn get_forces(&self) -> Option<&Vec<[f64; 3]>> {
        self.forces.as_ref()
    }
}
// 8a1de0c2 ends here

// [[file:../otf.note::6d51755f][6d51755f]]
#[test]
fn test_model_parse_results() -> Result<()> {
    use approx::*;

    let txt = gut::fs::read_file("tests/files/sample.txt")?;
    let r: Computed = txt.parse()?;
    let e = r.get_energy().expect("solver result: energy");
    assert_relative_eq!(-0.329336, e, epsilon = 1e-4);
    assert_eq!(r.validate_forces(3)?.len(), 3);
    assert!(r.validate_forces(2).is_err());

    // serializing and deserializing
    let serialized = serde_json::to_string(&r)?;
    let r2: Computed = serde_json::from_str(&serialized)?;
    assert_eq!(r, r2);

    // reformat and parse again
    let r3: Computed = r.to_string().parse()?;
    assert_relative_eq!(r3.get_energy().unwrap(), e, epsilon = 1e-10);

    Ok(())
}

#[test]
fn test_model_parse_results_multiple() -> Result<()> {
    let txt = "\
@model_properties_format_version 0.1
@energy unit_factor=2
-1.0
@forces unit_factor=-1
0.1 0.2 0.3
@model_properties_format_version 0.1
# the last one
@energy
-3.5
";
    let all = Computed::parse_all(txt)?;
    assert_eq!(all.len(), 2);
    assert_eq!(all[0].get_energy(), Some(-2.0));
    assert_eq!(all[0].get_forces().unwrap()[0], [-0.1, -0.2, -0.3]);
    assert!(all[1].get_forces().is_none());

    let last: Computed = txt.parse()?;
    assert_eq!(last.get_energy(), Some(-3.5));
    assert!(last.validate_forces(1).is_err());

    assert!("".parse::<Computed>().is_err());
    assert!("@model_properties_format_version 0.1\n@forces\n0.1 0.2\n"
        .parse::<Computed>()
        .is_err());

    Ok(())
}
// 6d51755f ends here
