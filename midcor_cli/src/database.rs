//! Flat-file surfaces of the CLI: the isotope table, the metabolite and
//! derivative databases and the measurements file.
//!
//! All files are tab separated. Database lookups are case sensitive and
//! duplicate names override earlier entries, so a user file can shadow
//! entries of a shared one by appending.

use std::collections::HashMap;
use std::path::Path;
use std::str::FromStr;

use midcor::IsotopeTable;
use serde::Deserialize;
use tracing::{
    debug,
    info,
};

use crate::errors::CliError;

/// Nominal mass number of the lightest isotope for the elements shipped
/// with the built-in table. Backs the tracer-code parser.
fn base_mass_number(element: &str) -> Option<u32> {
    let mass = match element {
        "H" => 1,
        "C" => 12,
        "N" => 14,
        "O" => 16,
        "Si" => 28,
        "P" => 31,
        "S" => 32,
        _ => return None,
    };
    Some(mass)
}

/// An isotopic tracer given as a code like "13C" or "15N".
///
/// The leading integer is the nominal mass number of the tracer isotope;
/// it resolves to a mass-shift index against the element's lightest
/// isotope (e.g. "13C" is shift 1 for carbon).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TracerCode {
    pub element: String,
    pub shift: usize,
}

impl FromStr for TracerCode {
    type Err = CliError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let code = s.trim();
        let split = code.find(|c: char| !c.is_ascii_digit()).unwrap_or(code.len());
        let (mass_chunk, element) = code.split_at(split);
        let mass = mass_chunk.parse::<u32>().map_err(|_| CliError::ParseError {
            msg: format!("Invalid tracer code '{}': missing isotope mass", code),
        })?;
        if element.is_empty() || !element.starts_with(|c: char| c.is_ascii_uppercase()) {
            return Err(CliError::ParseError {
                msg: format!("Invalid tracer code '{}': missing element symbol", code),
            });
        }
        let base = base_mass_number(element).ok_or_else(|| CliError::ParseError {
            msg: format!(
                "Unknown tracer element '{}' in '{}'; known elements: H, C, N, O, Si, P, S",
                element, code
            ),
        })?;
        if mass <= base {
            return Err(CliError::ParseError {
                msg: format!(
                    "Tracer code '{}' does not name a heavy isotope of {} (lightest is {})",
                    code, element, base
                ),
            });
        }
        Ok(Self {
            element: element.to_string(),
            shift: (mass - base) as usize,
        })
    }
}

impl TracerCode {
    /// A perfect-purity vector for this tracer: all substrate tracer
    /// atoms carry the named isotope.
    pub fn perfect_purity(&self, n_isotopes: usize) -> Result<Vec<f64>, CliError> {
        if self.shift >= n_isotopes {
            return Err(CliError::ParseError {
                msg: format!(
                    "Tracer isotope of {} at mass shift {} is outside the isotope \
                     table ({} isotopes known)",
                    self.element, self.shift, n_isotopes
                ),
            });
        }
        let mut purity = vec![0.0; n_isotopes];
        purity[self.shift] = 1.0;
        Ok(purity)
    }
}

/// Load an isotope table file: one element per line, symbol first, then
/// the abundance vector in ascending mass-shift order.
pub fn load_isotope_table(path: &Path) -> Result<IsotopeTable, CliError> {
    let file = std::fs::File::open(path).map_err(|source| CliError::Io {
        source,
        path: Some(path.to_path_buf()),
    })?;
    let mut rdr = csv::ReaderBuilder::new()
        .delimiter(b'\t')
        .has_headers(false)
        .flexible(true)
        .from_reader(file);

    let mut abundances = std::collections::BTreeMap::new();
    for record in rdr.records() {
        let record = record.map_err(|source| CliError::Csv {
            source,
            path: path.to_path_buf(),
        })?;
        let element = match record.get(0) {
            Some(el) if !el.trim().is_empty() => el.trim().to_string(),
            _ => continue,
        };
        let mut vector = Vec::with_capacity(record.len() - 1);
        for field in record.iter().skip(1) {
            let field = field.trim();
            if field.is_empty() {
                continue;
            }
            let value = field.parse::<f64>().map_err(|_| CliError::Database {
                msg: format!(
                    "Invalid abundance '{}' for element '{}' in the isotopes file",
                    field, element
                ),
                path: Some(path.to_path_buf()),
            })?;
            vector.push(value);
        }
        abundances.insert(element, vector);
    }
    info!(
        "Loaded isotope table with {} elements from {}",
        abundances.len(),
        path.display(),
    );
    Ok(IsotopeTable::new(abundances)?)
}

#[derive(Debug, Clone, Deserialize)]
struct MetaboliteRow {
    name: String,
    formula: String,
    #[serde(default)]
    charge: Option<String>,
    #[serde(default)]
    #[allow(dead_code)]
    inchi: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
struct DerivativeRow {
    name: String,
    formula: String,
}

/// Name -> formula resolution for metabolites and derivatives.
///
/// Either side can be absent; names then pass through as formulas, which
/// keeps the CLI usable without curated database files.
#[derive(Debug, Default)]
pub struct FormulaDatabases {
    metabolites: Option<HashMap<String, String>>,
    derivatives: Option<HashMap<String, String>>,
}

impl FormulaDatabases {
    pub fn load(
        metabolites_path: Option<&Path>,
        derivatives_path: Option<&Path>,
    ) -> Result<Self, CliError> {
        let metabolites = metabolites_path
            .map(load_metabolites)
            .transpose()?;
        let derivatives = derivatives_path
            .map(load_derivatives)
            .transpose()?;
        Ok(Self {
            metabolites,
            derivatives,
        })
    }

    pub fn metabolite_formula(&self, name: &str) -> Result<String, CliError> {
        match &self.metabolites {
            None => Ok(name.to_string()),
            Some(db) => db.get(name).cloned().ok_or_else(|| CliError::Database {
                msg: format!("No formula provided for metabolite '{}'", name),
                path: None,
            }),
        }
    }

    /// An empty derivative name always means "no derivative".
    pub fn derivative_formula(&self, name: &str) -> Result<String, CliError> {
        if name.is_empty() {
            return Ok(String::new());
        }
        match &self.derivatives {
            None => Ok(name.to_string()),
            Some(db) => db.get(name).cloned().ok_or_else(|| CliError::Database {
                msg: format!("No formula provided for derivative '{}'", name),
                path: None,
            }),
        }
    }
}

fn load_metabolites(path: &Path) -> Result<HashMap<String, String>, CliError> {
    let file = std::fs::File::open(path).map_err(|source| CliError::Io {
        source,
        path: Some(path.to_path_buf()),
    })?;
    let mut rdr = csv::ReaderBuilder::new()
        .delimiter(b'\t')
        .flexible(true)
        .from_reader(file);

    let mut db = HashMap::new();
    for row in rdr.deserialize() {
        let row: MetaboliteRow = row.map_err(|source| CliError::Csv {
            source,
            path: path.to_path_buf(),
        })?;
        if let Some(charge) = &row.charge {
            let charge = charge.trim();
            if !charge.is_empty() && charge.parse::<i32>().map_or(true, |c| c == 0) {
                return Err(CliError::Database {
                    msg: format!(
                        "Charge of metabolite '{}' should be a non-null integer ({})",
                        row.name, charge
                    ),
                    path: Some(path.to_path_buf()),
                });
            }
        }
        // Later entries win so user files can shadow shared ones.
        db.insert(row.name.trim().to_string(), row.formula.trim().to_string());
    }
    debug!("Loaded {} metabolites from {}", db.len(), path.display());
    Ok(db)
}

fn load_derivatives(path: &Path) -> Result<HashMap<String, String>, CliError> {
    let file = std::fs::File::open(path).map_err(|source| CliError::Io {
        source,
        path: Some(path.to_path_buf()),
    })?;
    let mut rdr = csv::ReaderBuilder::new()
        .delimiter(b'\t')
        .flexible(true)
        .from_reader(file);

    let mut db = HashMap::new();
    for row in rdr.deserialize() {
        let row: DerivativeRow = row.map_err(|source| CliError::Csv {
            source,
            path: path.to_path_buf(),
        })?;
        db.insert(row.name.trim().to_string(), row.formula.trim().to_string());
    }
    debug!("Loaded {} derivatives from {}", db.len(), path.display());
    Ok(db)
}

#[derive(Debug, Clone, Deserialize)]
struct MeasurementRow {
    sample: String,
    metabolite: String,
    #[serde(default)]
    derivative: String,
    area: f64,
    isotopologue: i64,
}

/// All areas measured for one (metabolite, derivative, sample) triple,
/// ordered by isotopologue index.
#[derive(Debug, Clone, PartialEq)]
pub struct MeasurementGroup {
    pub metabolite: String,
    pub derivative: String,
    pub sample: String,
    pub areas: Vec<f64>,
}

/// Read the measurements file and group it, keeping the input order of
/// first appearance.
///
/// Within a group the isotopologue indices must be exactly 0..M-1: the
/// correction has no notion of a missing mass fraction.
pub fn load_measurements(path: &Path) -> Result<Vec<MeasurementGroup>, CliError> {
    let file = std::fs::File::open(path).map_err(|source| CliError::Io {
        source,
        path: Some(path.to_path_buf()),
    })?;
    let mut rdr = csv::ReaderBuilder::new()
        .delimiter(b'\t')
        .from_reader(file);

    let mut order: Vec<(String, String, String)> = Vec::new();
    let mut collected: HashMap<(String, String, String), Vec<(i64, f64)>> =
        HashMap::new();
    for row in rdr.deserialize() {
        let row: MeasurementRow = row.map_err(|source| CliError::Csv {
            source,
            path: path.to_path_buf(),
        })?;
        let key = (
            row.metabolite.trim().to_string(),
            row.derivative.trim().to_string(),
            row.sample.trim().to_string(),
        );
        if !collected.contains_key(&key) {
            order.push(key.clone());
        }
        collected
            .entry(key)
            .or_default()
            .push((row.isotopologue, row.area));
    }
    if order.is_empty() {
        return Err(CliError::Database {
            msg: "Measurements file is empty".to_string(),
            path: Some(path.to_path_buf()),
        });
    }

    let mut groups = Vec::with_capacity(order.len());
    for key in order {
        let mut entries = collected.remove(&key).unwrap();
        entries.sort_by_key(|(isotopologue, _)| *isotopologue);
        for (expected, (isotopologue, _)) in entries.iter().enumerate() {
            if *isotopologue != expected as i64 {
                return Err(CliError::Database {
                    msg: format!(
                        "Incomplete isotopic cluster for {}/{} in sample {}: \
                         expected isotopologue {}, found {}",
                        key.0, key.1, key.2, expected, isotopologue
                    ),
                    path: Some(path.to_path_buf()),
                });
            }
        }
        groups.push(MeasurementGroup {
            metabolite: key.0,
            derivative: key.1,
            sample: key.2,
            areas: entries.into_iter().map(|(_, area)| area).collect(),
        });
    }
    info!(
        "Loaded {} measurement groups from {}",
        groups.len(),
        path.display(),
    );
    Ok(groups)
}
