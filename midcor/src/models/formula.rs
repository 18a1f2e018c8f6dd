use std::collections::BTreeMap;
use std::fmt::Display;
use std::str::FromStr;

use crate::errors::CorrectionError;

/// An elemental formula as a bag of atom counts.
///
/// Parsed from the usual compact notation: an element symbol is one
/// uppercase letter optionally followed by one lowercase letter, and an
/// optional decimal count (absent means 1). Repeated symbols accumulate,
/// so "CH3CH3" and "C2H6" parse to the same formula. The empty string is
/// a valid (empty) formula.
///
/// # Example
///
/// ```
/// use midcor::models::ChemicalFormula;
///
/// let formula: ChemicalFormula = "C3H7O6P".parse().unwrap();
/// assert_eq!(formula.count("C"), 3);
/// assert_eq!(formula.count("P"), 1);
/// assert_eq!(formula.count("Si"), 0);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ChemicalFormula {
    counts: BTreeMap<String, u32>,
}

impl ChemicalFormula {
    pub fn parse(input: &str) -> Result<Self, CorrectionError> {
        let mut counts: BTreeMap<String, u32> = BTreeMap::new();
        let bytes = input.as_bytes();
        let mut pos = 0;

        while pos < bytes.len() {
            if bytes[pos].is_ascii_whitespace() {
                pos += 1;
                continue;
            }
            if !bytes[pos].is_ascii_uppercase() {
                return Err(CorrectionError::MalformedFormula {
                    formula: input.to_string(),
                    position: pos,
                });
            }
            let start = pos;
            pos += 1;
            if pos < bytes.len() && bytes[pos].is_ascii_lowercase() {
                pos += 1;
            }
            let symbol = &input[start..pos];

            let digits_start = pos;
            while pos < bytes.len() && bytes[pos].is_ascii_digit() {
                pos += 1;
            }
            let count = if digits_start == pos {
                1
            } else {
                input[digits_start..pos].parse::<u32>().map_err(|_| {
                    CorrectionError::MalformedFormula {
                        formula: input.to_string(),
                        position: digits_start,
                    }
                })?
            };

            *counts.entry(symbol.to_string()).or_insert(0) += count;
        }

        Ok(Self { counts })
    }

    /// Atom count for an element, 0 when absent.
    pub fn count(&self, element: &str) -> u32 {
        self.counts.get(element).copied().unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.counts.is_empty()
    }

    /// Iterate over (symbol, count) pairs in symbol order.
    ///
    /// The order is deterministic but irrelevant to every consumer:
    /// mass-distribution construction is a product of convolutions, which
    /// commute.
    pub fn iter(&self) -> impl Iterator<Item = (&str, u32)> {
        self.counts.iter().map(|(el, n)| (el.as_str(), *n))
    }

    pub fn elements(&self) -> impl Iterator<Item = &str> {
        self.counts.keys().map(|el| el.as_str())
    }
}

impl FromStr for ChemicalFormula {
    type Err = CorrectionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl Display for ChemicalFormula {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        for (element, count) in self.counts.iter() {
            if *count == 1 {
                write!(f, "{}", element)?;
            } else {
                write!(f, "{}{}", element, count)?;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_simple() {
        let formula = ChemicalFormula::parse("C3H4O3").unwrap();
        assert_eq!(formula.count("C"), 3);
        assert_eq!(formula.count("H"), 4);
        assert_eq!(formula.count("O"), 3);
    }

    #[test]
    fn test_parse_implicit_count() {
        let formula = ChemicalFormula::parse("CH4").unwrap();
        assert_eq!(formula.count("C"), 1);
        assert_eq!(formula.count("H"), 4);
    }

    #[test]
    fn test_parse_two_letter_symbol() {
        let formula = ChemicalFormula::parse("Si2C8H21").unwrap();
        assert_eq!(formula.count("Si"), 2);
        assert_eq!(formula.count("C"), 8);
        assert_eq!(formula.count("H"), 21);
    }

    #[test]
    fn test_parse_accumulates_repeats() {
        let formula = ChemicalFormula::parse("CH3CH2OH").unwrap();
        assert_eq!(formula.count("C"), 2);
        assert_eq!(formula.count("H"), 6);
        assert_eq!(formula.count("O"), 1);
    }

    #[test]
    fn test_parse_empty_is_empty_formula() {
        let formula = ChemicalFormula::parse("").unwrap();
        assert!(formula.is_empty());
    }

    #[test]
    fn test_parse_ignores_whitespace() {
        let formula = ChemicalFormula::parse(" C6 H12 O6 ").unwrap();
        assert_eq!(formula.count("C"), 6);
        assert_eq!(formula.count("H"), 12);
        assert_eq!(formula.count("O"), 6);
    }

    #[test]
    fn test_parse_rejects_leading_lowercase() {
        let err = ChemicalFormula::parse("c3").unwrap_err();
        assert!(matches!(
            err,
            CorrectionError::MalformedFormula { position: 0, .. }
        ));
    }

    #[test]
    fn test_parse_rejects_garbage_mid_formula() {
        let err = ChemicalFormula::parse("C3-H4").unwrap_err();
        assert!(matches!(
            err,
            CorrectionError::MalformedFormula { position: 2, .. }
        ));
    }

    #[test]
    fn test_parse_zero_count_is_legal() {
        let formula = ChemicalFormula::parse("C3N0").unwrap();
        assert_eq!(formula.count("N"), 0);
    }

    #[test]
    fn test_display_roundtrip() {
        let formula = ChemicalFormula::parse("H12C6O6").unwrap();
        assert_eq!(formula.to_string(), "C6H12O6");
    }
}
