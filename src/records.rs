use std::collections::BTreeMap;
use std::fmt;
use std::fs::File;
use std::io::Read;

use anyhow::{Context, Result};
use csv::{ByteRecord, ReaderBuilder};
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::config::{Encoding, InputConfig};
use crate::error::InputError;

/// One row of tax revenue for a state in a year.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TaxRecord {
    pub state: String,
    pub year: i32,
    /// Category name to amount. Cells that are empty or not numeric are absent.
    pub amounts: BTreeMap<String, f64>,
}

impl TaxRecord {
    pub fn new(state: impl Into<String>, year: i32) -> Self {
        Self {
            state: state.into(),
            year,
            amounts: BTreeMap::new(),
        }
    }

    pub fn with_amount(mut self, category: impl Into<String>, amount: f64) -> Self {
        self.amounts.insert(category.into(), amount);
        self
    }

    pub fn amount(&self, category: &str) -> Option<f64> {
        self.amounts.get(category).copied()
    }
}

impl fmt::Display for TaxRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {}", self.state, self.year)?;
        for (category, amount) in &self.amounts {
            write!(f, ", {category}={amount}")?;
        }
        write!(f, ")")
    }
}

/// Records parsed from a file plus the rows that were rejected.
#[derive(Debug, Default)]
pub struct LoadedRecords {
    pub records: Vec<TaxRecord>,
    pub rejected: Vec<InputError>,
}

pub fn read_records(config: &InputConfig) -> Result<LoadedRecords> {
    let file = File::open(&config.path)
        .with_context(|| format!("opening input {}", config.path.display()))?;
    let loaded = parse_records(file, config)
        .with_context(|| format!("reading input {}", config.path.display()))?;

    info!(
        "Loaded {} records from {} ({} rejected)",
        loaded.records.len(),
        config.path.display(),
        loaded.rejected.len()
    );
    Ok(loaded)
}

pub fn parse_records<R: Read>(reader: R, config: &InputConfig) -> Result<LoadedRecords> {
    let mut reader = ReaderBuilder::new()
        .delimiter(config.delimiter_byte()?)
        .flexible(true)
        .from_reader(reader);

    let headers: Vec<String> = reader
        .byte_headers()?
        .iter()
        .map(|field| decode(field, config.encoding).trim().to_string())
        .collect();

    let state_idx = column_index(&headers, &config.state_column)?;
    let year_idx = column_index(&headers, &config.year_column)?;
    let categories: Vec<(usize, &str)> = headers
        .iter()
        .enumerate()
        .filter(|(idx, name)| {
            *idx != state_idx
                && *idx != year_idx
                && !name.is_empty()
                && !config.ignore_columns.iter().any(|c| c == *name)
        })
        .map(|(idx, name)| (idx, name.as_str()))
        .collect();

    let mut loaded = LoadedRecords::default();
    let mut row = ByteRecord::new();
    loop {
        match reader.read_byte_record(&mut row) {
            Ok(true) => {}
            Ok(false) => break,
            Err(err) if err.is_io_error() => return Err(err.into()),
            Err(err) => {
                let line = err.position().map(|p| p.line()).unwrap_or(0);
                warn!("Skipping unreadable row at line {line}: {err}");
                loaded.rejected.push(InputError::Malformed {
                    line,
                    reason: err.to_string(),
                });
                continue;
            }
        }
        let line = row.position().map(|p| p.line()).unwrap_or(0);

        match parse_row(&row, line, state_idx, year_idx, &categories, config) {
            Ok(record) => loaded.records.push(record),
            Err(err) => {
                warn!("Skipping record: {err}");
                loaded.rejected.push(err);
            }
        }
    }

    Ok(loaded)
}

fn column_index(headers: &[String], name: &str) -> Result<usize> {
    headers
        .iter()
        .position(|h| h == name)
        .with_context(|| format!("column '{name}' not found in header {headers:?}"))
}

fn parse_row(
    row: &ByteRecord,
    line: u64,
    state_idx: usize,
    year_idx: usize,
    categories: &[(usize, &str)],
    config: &InputConfig,
) -> Result<TaxRecord, InputError> {
    let field = |idx: usize, column: &str| -> Result<String, InputError> {
        let value = row
            .get(idx)
            .map(|raw| decode(raw, config.encoding).trim().to_string())
            .unwrap_or_default();
        if value.is_empty() {
            Err(InputError::MissingField {
                line,
                column: column.to_string(),
            })
        } else {
            Ok(value)
        }
    };

    let state = field(state_idx, &config.state_column)?;
    let year_text = field(year_idx, &config.year_column)?;
    let year = parse_year(&year_text).ok_or(InputError::InvalidYear {
        line,
        value: year_text.clone(),
    })?;

    let mut record = TaxRecord::new(state, year);
    for &(idx, category) in categories {
        let Some(raw) = row.get(idx) else { continue };
        let text = decode(raw, config.encoding);
        match parse_amount(&text, config.decimal_comma) {
            Some(amount) => {
                record.amounts.insert(category.to_string(), amount);
            }
            None if text.trim().is_empty() => {}
            None => debug!("line {line}: '{text}' in '{category}' is not numeric, ignoring"),
        }
    }
    Ok(record)
}

/// Accepts `2020` as well as `2020.0`, which spreadsheet exports produce.
fn parse_year(text: &str) -> Option<i32> {
    if let Ok(year) = text.parse::<i32>() {
        return Some(year);
    }
    let value = text.parse::<f64>().ok()?;
    if value.fract() == 0.0 && value.abs() < i32::MAX as f64 {
        Some(value as i32)
    } else {
        None
    }
}

pub fn parse_amount(text: &str, decimal_comma: bool) -> Option<f64> {
    let text = text.trim();
    if text.is_empty() {
        return None;
    }
    let value = if decimal_comma {
        text.replace('.', "").replace(',', ".").parse::<f64>().ok()?
    } else {
        text.parse::<f64>().ok()?
    };
    value.is_finite().then_some(value)
}

pub fn decode(raw: &[u8], encoding: Encoding) -> String {
    match encoding {
        Encoding::Utf8 => String::from_utf8_lossy(raw).into_owned(),
        // Latin-1 bytes map one-to-one onto the first 256 code points.
        Encoding::Latin1 => raw.iter().map(|&b| b as char).collect(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn utf8_config(delimiter: &str) -> InputConfig {
        InputConfig {
            delimiter: delimiter.to_string(),
            encoding: Encoding::Utf8,
            ..InputConfig::default()
        }
    }

    #[test]
    fn test_parse_records() {
        let data = "Ano;Mês;UF;IMPOSTO SOBRE IMPORTAÇÃO;IPI - FUMO\n\
                    2020;Janeiro;SP;100.5;10\n\
                    2020;Janeiro;RJ;50;\n\
                    2021;Março;SP;80;abc\n";
        let loaded = parse_records(data.as_bytes(), &utf8_config(";")).unwrap();

        assert!(loaded.rejected.is_empty());
        assert_eq!(loaded.records.len(), 3);
        let sp = &loaded.records[0];
        assert_eq!(sp.state, "SP");
        assert_eq!(sp.year, 2020);
        assert_eq!(sp.amount("IMPOSTO SOBRE IMPORTAÇÃO"), Some(100.5));
        assert_eq!(sp.amount("IPI - FUMO"), Some(10.0));
        assert_eq!(sp.amount("Mês"), None);
        assert_eq!(loaded.records[1].amount("IPI - FUMO"), None);
        assert_eq!(loaded.records[2].amount("IPI - FUMO"), None);
    }

    #[test]
    fn test_rejected_rows_are_reported() {
        let data = "Ano,UF,X\n2020,,1\nabc,SP,2\n2021,RJ,3\n";
        let config = InputConfig {
            ignore_columns: vec![],
            ..utf8_config(",")
        };
        let loaded = parse_records(data.as_bytes(), &config).unwrap();

        assert_eq!(loaded.records.len(), 1);
        assert_eq!(loaded.rejected.len(), 2);
        assert!(matches!(
            &loaded.rejected[0],
            InputError::MissingField { line: 2, column } if column == "UF"
        ));
        assert!(matches!(
            &loaded.rejected[1],
            InputError::InvalidYear { line: 3, value } if value == "abc"
        ));
    }

    #[test]
    fn test_latin1_header() {
        let mut data = b"Ano;UF;IMPOSTO SOBRE IMPORTA".to_vec();
        data.extend_from_slice(&[0xC7, 0xC3]);
        data.extend_from_slice(b"O\n2020;SP;1\n");
        let config = InputConfig {
            encoding: Encoding::Latin1,
            ..InputConfig::default()
        };
        let loaded = parse_records(data.as_slice(), &config).unwrap();
        assert_eq!(
            loaded.records[0].amount("IMPOSTO SOBRE IMPORTAÇÃO"),
            Some(1.0)
        );
    }

    #[test]
    fn test_missing_key_column_fails() {
        let data = "Ano,Estado\n2020,SP\n";
        assert!(parse_records(data.as_bytes(), &utf8_config(",")).is_err());
    }

    #[test]
    fn test_parse_amount() {
        assert_eq!(parse_amount(" 12.5 ", false), Some(12.5));
        assert_eq!(parse_amount("1.234,56", true), Some(1234.56));
        assert_eq!(parse_amount("-30", false), Some(-30.0));
        assert_eq!(parse_amount("", false), None);
        assert_eq!(parse_amount("NaN", false), None);
    }

    #[test]
    fn test_parse_year() {
        assert_eq!(parse_year("2020"), Some(2020));
        assert_eq!(parse_year("2020.0"), Some(2020));
        assert_eq!(parse_year("2020.5"), None);
    }
}
