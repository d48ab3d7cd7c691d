//! Run configurations and the plain-text configuration file handed to targets.

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::fs;
use std::path::Path;

/// Parameter names used when a configuration is given as bare values.
pub const DEFAULT_PARAMETER_NAMES: [&str; 3] = ["workers", "stations", "workers_per_station"];

/// Configurations benchmarked when none are given.
pub const DEFAULT_CONFIGURATIONS: [[i64; 3]; 3] = [[10, 3, 6], [100, 6, 3], [1000, 10, 8]];

/// A named integer parameter.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Parameter {
    pub name: String,
    pub value: i64,
}

/// An ordered set of integer parameters describing one benchmarked scenario.
///
/// The order is significant: it is the line order of the configuration file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunConfiguration {
    params: Vec<Parameter>,
}

impl RunConfiguration {
    #[must_use]
    pub fn new(params: Vec<Parameter>) -> Self {
        Self { params }
    }

    /// Build from values, naming them after `names` in order.
    ///
    /// Values beyond the provided names are called `param4`, `param5`, ...
    #[must_use]
    pub fn with_names<S: AsRef<str>>(values: &[i64], names: &[S]) -> Self {
        let params = values
            .iter()
            .enumerate()
            .map(|(i, &value)| Parameter {
                name: names
                    .get(i)
                    .map_or_else(|| format!("param{}", i + 1), |n| n.as_ref().to_string()),
                value,
            })
            .collect();
        Self { params }
    }

    /// Build from values using [`DEFAULT_PARAMETER_NAMES`].
    #[must_use]
    pub fn from_values(values: &[i64]) -> Self {
        Self::with_names(values, &DEFAULT_PARAMETER_NAMES)
    }

    #[must_use]
    pub fn params(&self) -> &[Parameter] {
        &self.params
    }

    pub fn values(&self) -> impl Iterator<Item = i64> + '_ {
        self.params.iter().map(|p| p.value)
    }

    /// Look up a parameter by name.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<i64> {
        self.params.iter().find(|p| p.name == name).map(|p| p.value)
    }

    /// Compact identifier, e.g. `10-3-6`.
    #[must_use]
    pub fn label(&self) -> String {
        self.values()
            .map(|v| v.to_string())
            .collect::<Vec<_>>()
            .join("-")
    }

    /// Configuration file content: one integer per line.
    #[must_use]
    pub fn render(&self) -> String {
        self.values().map(|v| format!("{v}\n")).collect()
    }

    /// Write the configuration file consumed by the target program.
    pub fn write_to(&self, path: &Path) -> Result<()> {
        fs::write(path, self.render())?;
        Ok(())
    }
}

impl fmt::Display for RunConfiguration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let parts: Vec<String> = self
            .params
            .iter()
            .map(|p| format!("{}={}", p.name, p.value))
            .collect();
        write!(f, "{}", parts.join(", "))
    }
}

/// Parse `10,3,6` (commas and/or whitespace) into values.
pub fn parse_values(input: &str) -> Result<Vec<i64>> {
    let values = input
        .split(|c: char| c == ',' || c.is_whitespace())
        .filter(|part| !part.is_empty())
        .map(|part| {
            part.parse::<i64>()
                .map_err(|_| Error::InvalidPlan(format!("`{part}` is not an integer in `{input}`")))
        })
        .collect::<Result<Vec<_>>>()?;

    if values.is_empty() {
        return Err(Error::InvalidPlan(format!("empty configuration `{input}`")));
    }
    Ok(values)
}

/// The default configuration set.
#[must_use]
pub fn default_configurations() -> Vec<RunConfiguration> {
    DEFAULT_CONFIGURATIONS
        .iter()
        .map(|values| RunConfiguration::from_values(values))
        .collect()
}
