use std::fmt;
use std::str::FromStr;

use crate::error::{Error, Result};

/// Upper bound on how many timesteps one range may expand to.
pub const MAX_TIMESTEPS: u64 = 1_000_000;

/// A single simulation snapshot identifier.
///
/// Identifiers written out explicitly (a lone `42` on the command line, or a
/// `0042.trn` found on disk) keep their original text so that file names can
/// be reconstructed verbatim. Identifiers generated from a range are plain
/// integers.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Timestep {
    Literal(String),
    Index(u64),
}

impl Timestep {
    /// Name of the transient result file holding this timestep.
    pub fn trn_file_name(&self) -> String {
        format!("{}.trn", self)
    }

    /// Numeric value used for ordering discovered timesteps.
    pub fn numeric(&self) -> Option<u64> {
        match self {
            Timestep::Literal(s) => s.parse().ok(),
            Timestep::Index(n) => Some(*n),
        }
    }
}

impl fmt::Display for Timestep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Timestep::Literal(s) => write!(f, "{}", s),
            Timestep::Index(n) => write!(f, "{}", n),
        }
    }
}

/// A parsed timestep selection.
///
/// Supported formats:
/// - `*` - every timestep available (enumerated by the caller)
/// - `42` - a single timestep, kept as written
/// - `100-200` - inclusive range with stride 1
/// - `100-200-10` - inclusive range with stride 10
///
/// A range whose start lies after its end selects nothing.
#[derive(Debug, Clone, PartialEq)]
pub enum TimestepRange {
    All,
    Single(String),
    Stepped { start: u64, end: u64, step: u64 },
}

impl TimestepRange {
    /// Expands the selection into ordered timesteps.
    ///
    /// `All` expands to an empty list: the available timesteps are not known
    /// here and have to be discovered from the trn directory.
    pub fn timesteps(&self) -> Vec<Timestep> {
        match self {
            TimestepRange::All => Vec::new(),
            TimestepRange::Single(s) => vec![Timestep::Literal(s.clone())],
            TimestepRange::Stepped { start, end, step } => (*start..=*end)
                .step_by(*step as usize)
                .map(Timestep::Index)
                .collect(),
        }
    }

    pub fn is_all(&self) -> bool {
        matches!(self, TimestepRange::All)
    }
}

/// Parses `text` and expands it in one go.
pub fn resolve(text: &str) -> Result<Vec<Timestep>> {
    Ok(text.parse::<TimestepRange>()?.timesteps())
}

fn invalid(input: &str, reason: impl Into<String>) -> Error {
    Error::InvalidRangeFormat {
        input: input.to_string(),
        reason: reason.into(),
    }
}

fn is_decimal(field: &str) -> bool {
    !field.is_empty() && field.bytes().all(|b| b.is_ascii_digit())
}

fn parse_bound(input: &str, field: &str) -> Result<u64> {
    if !is_decimal(field) {
        return Err(invalid(
            input,
            format!("'{}' is not a non-negative integer", field),
        ));
    }
    field
        .parse()
        .map_err(|_| invalid(input, format!("'{}' is too large", field)))
}

impl FromStr for TimestepRange {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let fields: Vec<&str> = s.split('-').map(str::trim).collect();

        match fields.as_slice() {
            ["*"] => Ok(TimestepRange::All),
            [single] => {
                if is_decimal(single) {
                    Ok(TimestepRange::Single(single.to_string()))
                } else {
                    Err(invalid(s, "expected '*' or a timestep number"))
                }
            }
            [start, end] | [start, end, _] => {
                let start = parse_bound(s, start)?;
                let end = parse_bound(s, end)?;
                let step = match fields.get(2) {
                    Some(step) => parse_bound(s, step)?,
                    None => 1,
                };

                if step == 0 {
                    return Err(invalid(s, "stride must be positive"));
                }
                if usize::try_from(step).is_err() {
                    return Err(invalid(s, format!("stride {} is too large", step)));
                }
                if start <= end && (end - start) / step >= MAX_TIMESTEPS {
                    return Err(Error::Validation(format!(
                        "{} selects more than {} timesteps",
                        s.trim(),
                        MAX_TIMESTEPS
                    )));
                }

                Ok(TimestepRange::Stepped { start, end, step })
            }
            _ => Err(invalid(s, "at most three fields (start-end-stride) allowed")),
        }
    }
}

impl fmt::Display for TimestepRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TimestepRange::All => write!(f, "*"),
            TimestepRange::Single(s) => write!(f, "{}", s),
            TimestepRange::Stepped { start, end, step: 1 } => write!(f, "{}-{}", start, end),
            TimestepRange::Stepped { start, end, step } => {
                write!(f, "{}-{}-{}", start, end, step)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn indices(ts: &[Timestep]) -> Vec<u64> {
        ts.iter().map(|t| t.numeric().unwrap()).collect()
    }

    #[test]
    fn test_resolve_range() {
        let ts = resolve("100-103").unwrap();
        assert_eq!(indices(&ts), vec![100, 101, 102, 103]);
        assert!(ts.iter().all(|t| matches!(t, Timestep::Index(_))));
    }

    #[test]
    fn test_resolve_stepped_range() {
        assert_eq!(indices(&resolve("100-110-5").unwrap()), vec![100, 105, 110]);
        // Stride that does not land on the end bound stops below it
        assert_eq!(indices(&resolve("0-10-4").unwrap()), vec![0, 4, 8]);
    }

    #[test]
    fn test_resolve_all() {
        assert!(resolve("*").unwrap().is_empty());
        assert!(" * ".parse::<TimestepRange>().unwrap().is_all());
    }

    #[test]
    fn test_single_keeps_original_text() {
        assert_eq!(
            resolve("42").unwrap(),
            vec![Timestep::Literal("42".to_string())]
        );
        assert_eq!(resolve("007").unwrap()[0].to_string(), "007");
    }

    #[test]
    fn test_fields_are_trimmed() {
        assert_eq!(indices(&resolve(" 1 - 3 ").unwrap()), vec![1, 2, 3]);
    }

    #[test]
    fn test_invalid_formats() {
        for input in ["abc-10", "-5-10", "1-2-3-4", "", "abc", "1-", "1.5", "*-3"] {
            assert!(
                matches!(
                    resolve(input),
                    Err(Error::InvalidRangeFormat { .. })
                ),
                "{} should be rejected",
                input
            );
        }
    }

    #[test]
    fn test_reversed_range_is_empty() {
        assert!(resolve("5-1").unwrap().is_empty());
        assert!(resolve("10-2-3").unwrap().is_empty());
        assert!(!"5-1".parse::<TimestepRange>().unwrap().is_all());
    }

    #[test]
    fn test_oversized_range_rejected() {
        let err = resolve("0-18446744073709551615").unwrap_err();
        assert!(matches!(err, Error::Validation(_)));

        assert!(matches!(
            resolve("0-999999"),
            Ok(ts) if ts.len() as u64 == MAX_TIMESTEPS
        ));
        assert!(resolve("0-1000000").is_err());
        // a wide stride keeps the expansion small
        assert_eq!(resolve("0-18446744073709551615-9223372036854775808").unwrap().len(), 2);
    }

    #[test]
    fn test_zero_stride_rejected() {
        assert!(resolve("1-10-0").is_err());
    }

    #[test]
    fn test_display() {
        assert_eq!(TimestepRange::All.to_string(), "*");
        assert_eq!("1-10".parse::<TimestepRange>().unwrap().to_string(), "1-10");
        assert_eq!(
            "1-10-3".parse::<TimestepRange>().unwrap().to_string(),
            "1-10-3"
        );
    }

    #[test]
    fn test_trn_file_name() {
        assert_eq!(Timestep::Index(12).trn_file_name(), "12.trn");
        assert_eq!(
            Timestep::Literal("0012".to_string()).trn_file_name(),
            "0012.trn"
        );
    }
}
