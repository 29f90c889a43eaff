use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::analytics::AnalysisKind;
use crate::error::ConfigError;

pub const IMPORT_TAX_COLUMN: &str = "IMPOSTO SOBRE IMPORTAÇÃO";

/// Everything the pipeline needs; replaces hard-coded paths.
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    pub input: InputConfig,
    pub graph: GraphConfig,
    pub run: RunConfig,
    pub output: OutputConfig,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Encoding {
    Utf8,
    Latin1,
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default, deny_unknown_fields)]
pub struct InputConfig {
    pub path: PathBuf,
    pub delimiter: String,
    pub encoding: Encoding,
    /// Amounts are written as `1.234,56` instead of `1234.56`.
    pub decimal_comma: bool,
    pub state_column: String,
    pub year_column: String,
    pub ignore_columns: Vec<String>,
}

impl Default for InputConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from("data/arrecadacao-estado.csv"),
            delimiter: ";".to_string(),
            encoding: Encoding::Latin1,
            decimal_comma: false,
            state_column: "UF".to_string(),
            year_column: "Ano".to_string(),
            ignore_columns: vec!["Mês".to_string()],
        }
    }
}

impl InputConfig {
    pub fn delimiter_byte(&self) -> Result<u8, ConfigError> {
        match self.delimiter.as_bytes() {
            [b] => Ok(*b),
            _ => Err(ConfigError::Invalid(format!(
                "delimiter must be a single byte, got '{}'",
                self.delimiter
            ))),
        }
    }
}

/// What the second node class of the bipartite graph represents.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum GraphMode {
    StateYear,
    StateCategory,
}

/// Which amounts of a record make up an edge weight.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(tag = "kind", rename_all = "kebab-case")]
pub enum WeightSource {
    Column { column: String },
    Sum { columns: Vec<String> },
    AllNumeric,
}

impl Default for WeightSource {
    fn default() -> Self {
        WeightSource::Column {
            column: IMPORT_TAX_COLUMN.to_string(),
        }
    }
}

impl WeightSource {
    /// Whether `category` contributes to the weight.
    pub fn includes(&self, category: &str) -> bool {
        match self {
            WeightSource::Column { column } => column == category,
            WeightSource::Sum { columns } => columns.iter().any(|c| c == category),
            WeightSource::AllNumeric => true,
        }
    }
}

/// How negative amounts are treated before aggregation.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum NegativePolicy {
    /// Each record's contribution is clamped at zero.
    #[default]
    Clamp,
    Keep,
}

impl NegativePolicy {
    pub fn apply(self, amount: f64) -> f64 {
        match self {
            NegativePolicy::Clamp => amount.max(0.0),
            NegativePolicy::Keep => amount,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default, deny_unknown_fields)]
pub struct GraphConfig {
    pub mode: GraphMode,
    pub weight: WeightSource,
    pub negative: NegativePolicy,
}

impl Default for GraphConfig {
    fn default() -> Self {
        Self {
            mode: GraphMode::StateYear,
            weight: WeightSource::default(),
            negative: NegativePolicy::Clamp,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize, clap::ValueEnum)]
#[serde(rename_all = "kebab-case")]
pub enum ScopeSelection {
    All,
    PerYear,
    Both,
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default, deny_unknown_fields)]
pub struct RunConfig {
    pub scopes: ScopeSelection,
    /// Restricts per-year scopes; empty means every year in the input.
    pub years: Vec<i32>,
    pub analyses: Vec<AnalysisKind>,
    pub parallel: bool,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            scopes: ScopeSelection::Both,
            years: Vec::new(),
            analyses: AnalysisKind::ALL.to_vec(),
            parallel: false,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default, deny_unknown_fields)]
pub struct OutputConfig {
    pub dir: PathBuf,
    pub diagrams: bool,
    pub layout_iterations: usize,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            dir: PathBuf::from("output"),
            diagrams: true,
            layout_iterations: 200,
        }
    }
}

impl Config {
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let text = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let config: Config = toml::from_str(&text).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        self.input.delimiter_byte()?;
        if self.run.analyses.is_empty() {
            return Err(ConfigError::Invalid("no analyses selected".to_string()));
        }
        match &self.graph.weight {
            WeightSource::Sum { columns } if columns.is_empty() => Err(ConfigError::Invalid(
                "weight kind 'sum' needs at least one column".to_string(),
            )),
            WeightSource::Column { column } if column.trim().is_empty() => Err(
                ConfigError::Invalid("weight column name is empty".to_string()),
            ),
            _ => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_file_is_default() {
        let config: Config = toml::from_str("").unwrap();
        assert_eq!(config, Config::default());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_parse_full_config() {
        let text = r#"
            [input]
            path = "data/processed.csv"
            delimiter = ","
            encoding = "utf8"
            ignore_columns = []

            [graph]
            mode = "state-category"
            negative = "keep"
            weight = { kind = "sum", columns = ["IPI - FUMO", "IPI - BEBIDAS"] }

            [run]
            scopes = "per-year"
            years = [2020]
            analyses = ["degree", "communities"]
            parallel = true

            [output]
            dir = "out"
            diagrams = false
        "#;
        let config: Config = toml::from_str(text).unwrap();
        assert_eq!(config.input.encoding, Encoding::Utf8);
        assert_eq!(config.input.delimiter_byte().unwrap(), b',');
        assert_eq!(config.graph.mode, GraphMode::StateCategory);
        assert_eq!(config.graph.negative, NegativePolicy::Keep);
        assert!(config.graph.weight.includes("IPI - FUMO"));
        assert!(!config.graph.weight.includes("IPI - AUTOMÓVEIS"));
        assert_eq!(config.run.scopes, ScopeSelection::PerYear);
        assert_eq!(
            config.run.analyses,
            vec![AnalysisKind::Degree, AnalysisKind::Communities]
        );
        assert_eq!(config.output.layout_iterations, 200);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_bad_values() {
        let mut config = Config::default();
        config.input.delimiter = ";;".to_string();
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.run.analyses.clear();
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.graph.weight = WeightSource::Sum { columns: vec![] };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_bundled_config() {
        let config: Config = toml::from_str(include_str!("../config/arrecadacao.toml")).unwrap();
        assert!(config.validate().is_ok());
        assert_eq!(config.graph.weight, WeightSource::default());
        assert_eq!(config.run.analyses, AnalysisKind::ALL.to_vec());
        assert_eq!(config.input, InputConfig::default());
    }

    #[test]
    fn test_unknown_field_rejected() {
        assert!(toml::from_str::<Config>("[input]\nseparator = \";\"").is_err());
    }

    #[test]
    fn test_negative_policy() {
        assert_eq!(NegativePolicy::Clamp.apply(-30.0), 0.0);
        assert_eq!(NegativePolicy::Clamp.apply(12.5), 12.5);
        assert_eq!(NegativePolicy::Keep.apply(-30.0), -30.0);
    }
}
