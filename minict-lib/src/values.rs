use crate::constants::{COMMA_DELIMITER, TAB_DELIMITER};
use crate::error::MiniCtError;
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use strum_macros::Display;

/// Layout of the measurement lines the device emits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, Default, Serialize, Deserialize)]
pub enum OutputFormat {
    /// Three raw channels, tab separated
    #[default]
    #[strum(to_string = "3")]
    #[serde(rename = "3")]
    Raw3,
    #[strum(to_string = "SB")]
    #[serde(rename = "SB")]
    Sb,
    #[strum(to_string = "CSV")]
    #[serde(rename = "CSV")]
    Csv,
    #[strum(to_string = "RES")]
    #[serde(rename = "RES")]
    Res,
}

impl OutputFormat {
    /// Field delimiter the device switches to with this format.
    pub fn default_delimiter(self) -> &'static str {
        match self {
            OutputFormat::Raw3 => TAB_DELIMITER,
            OutputFormat::Sb | OutputFormat::Csv | OutputFormat::Res => COMMA_DELIMITER,
        }
    }
}

impl FromStr for OutputFormat {
    type Err = MiniCtError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "3" => Ok(OutputFormat::Raw3),
            "SB" => Ok(OutputFormat::Sb),
            "CSV" => Ok(OutputFormat::Csv),
            "RES" => Ok(OutputFormat::Res),
            other => Err(MiniCtError::InvalidArgument(format!(
                "output format must be one of [3, CSV, SB, RES], got '{other}'"
            ))),
        }
    }
}

/// Decode one measurement line into numbers.
///
/// Every field is parsed before any slicing happens, so a single bad field
/// rejects the whole line.
pub fn decode_values(line: &str, format: OutputFormat, delimiter: &str) -> Result<Vec<f64>, MiniCtError> {
    let delimiter = if delimiter.is_empty() {
        format.default_delimiter()
    } else {
        delimiter
    };

    let parsed = line
        .split(delimiter)
        .map(|field| {
            field
                .trim()
                .parse::<f64>()
                .map_err(|_| MiniCtError::Decode(format!("'{field}' is not a number in line '{line}'")))
        })
        .collect::<Result<Vec<_>, _>>()?;

    match format {
        OutputFormat::Raw3 | OutputFormat::Sb => Ok(parsed),
        OutputFormat::Csv => Ok(parsed.into_iter().step_by(3).collect()),
        OutputFormat::Res => parsed.get(2..4).map(<[f64]>::to_vec).ok_or_else(|| {
            MiniCtError::Decode(format!("RES line needs at least 4 fields, got {}", parsed.len()))
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_round_trip_names() {
        for format in [OutputFormat::Raw3, OutputFormat::Sb, OutputFormat::Csv, OutputFormat::Res] {
            assert_eq!(format.to_string().parse::<OutputFormat>().unwrap(), format);
        }
        assert!("4".parse::<OutputFormat>().is_err());
    }

    #[test]
    fn test_default_delimiters() {
        assert_eq!(OutputFormat::Raw3.default_delimiter(), "\t");
        assert_eq!(OutputFormat::Csv.default_delimiter(), ",");
        assert_eq!(OutputFormat::Sb.default_delimiter(), ",");
        assert_eq!(OutputFormat::Res.default_delimiter(), ",");
    }

    #[test]
    fn test_decode_per_format() {
        assert_eq!(decode_values("1.0\t2.0\t3.0", OutputFormat::Raw3, "\t").unwrap(), vec![1.0, 2.0, 3.0]);
        assert_eq!(decode_values("1,2,3,4,5,6", OutputFormat::Csv, ",").unwrap(), vec![1.0, 4.0]);
        assert_eq!(decode_values("1,2,3,4,5", OutputFormat::Res, ",").unwrap(), vec![3.0, 4.0]);
        assert_eq!(decode_values("9.5,1.5", OutputFormat::Sb, ",").unwrap(), vec![9.5, 1.5]);
    }

    #[test]
    fn test_bad_field_rejects_whole_line() {
        assert!(matches!(
            decode_values("1.0\tabc", OutputFormat::Raw3, "\t"),
            Err(MiniCtError::Decode(_))
        ));
        // Bad field outside the kept RES slice still counts
        assert!(decode_values("x,2,3,4", OutputFormat::Res, ",").is_err());
    }

    #[test]
    fn test_short_res_line() {
        assert!(matches!(
            decode_values("1,2,3", OutputFormat::Res, ","),
            Err(MiniCtError::Decode(_))
        ));
    }

    #[test]
    fn test_empty_delimiter_falls_back_to_format() {
        let values = decode_values("1,2,3", OutputFormat::Sb, "").unwrap();
        assert_eq!(values, vec![1.0, 2.0, 3.0]);
    }

    #[test]
    fn test_fields_are_trimmed() {
        let values = decode_values(" 1.5\t -2.25 \t3", OutputFormat::Raw3, "\t").unwrap();
        assert_eq!(values, vec![1.5, -2.25, 3.0]);
    }
}
