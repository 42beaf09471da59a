//! Advisory tolerance checks
//!
//! Out-of-range pressure and flow readings never block submission or
//! approval. They come back as warnings shown next to the record.

use serde::{Deserialize, Serialize};

/// Allowed range for one numeric reading
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToleranceSpec {
    pub field: String,
    pub min: f64,
    pub max: f64,
    #[serde(default)]
    pub unit: String,
}

impl ToleranceSpec {
    pub fn new(field: &str, min: f64, max: f64, unit: &str) -> Self {
        Self {
            field: field.to_string(),
            min,
            max,
            unit: unit.to_string(),
        }
    }

    pub fn contains(&self, value: f64) -> bool {
        value >= self.min && value <= self.max
    }
}

/// Reading outside its tolerance range
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToleranceWarning {
    pub field: String,
    pub value: f64,
    pub min: f64,
    pub max: f64,
    pub message: String,
}

/// Field name used for every reading inside a subgroup
pub const SUBGROUP_READING_FIELD: &str = "subgroup_reading";

/// Built-in ranges used when the configuration does not override them
pub fn default_tolerances() -> Vec<ToleranceSpec> {
    vec![
        ToleranceSpec::new("line_pressure", 4.5, 5.5, "bar"),
        ToleranceSpec::new("uv_flow_input_pressure", 11.0, 15.0, "kPa"),
        ToleranceSpec::new("test_pressure_vacuum", 0.25, 0.30, "MPa"),
        ToleranceSpec::new("uv_flow_value", 30.0, 40.0, "LPM"),
    ]
}

/// Set of tolerance ranges keyed by field name
#[derive(Debug, Clone, PartialEq)]
pub struct ToleranceTable {
    specs: Vec<ToleranceSpec>,
}

impl Default for ToleranceTable {
    fn default() -> Self {
        Self::new(default_tolerances())
    }
}

impl ToleranceTable {
    /// Later entries for the same field replace earlier ones
    pub fn new(specs: Vec<ToleranceSpec>) -> Self {
        let mut merged: Vec<ToleranceSpec> = Vec::with_capacity(specs.len());
        for spec in specs {
            match merged.iter_mut().find(|s| s.field == spec.field) {
                Some(existing) => *existing = spec,
                None => merged.push(spec),
            }
        }
        Self { specs: merged }
    }

    /// Built-in ranges with configured overrides applied on top
    pub fn with_overrides(overrides: Vec<ToleranceSpec>) -> Self {
        let mut specs = default_tolerances();
        specs.extend(overrides);
        Self::new(specs)
    }

    pub fn get(&self, field: &str) -> Option<&ToleranceSpec> {
        self.specs.iter().find(|s| s.field == field)
    }

    pub fn specs(&self) -> &[ToleranceSpec] {
        &self.specs
    }

    /// Check named readings; missing values and unknown fields are skipped
    pub fn check<'a, I>(&self, readings: I) -> Vec<ToleranceWarning>
    where
        I: IntoIterator<Item = (&'a str, Option<f64>)>,
    {
        readings
            .into_iter()
            .filter_map(|(field, value)| {
                let value = value?;
                let spec = self.get(field)?;
                if spec.contains(value) {
                    return None;
                }
                Some(ToleranceWarning {
                    field: field.to_string(),
                    value,
                    min: spec.min,
                    max: spec.max,
                    message: format!(
                        "{} = {} {} is outside {}-{} {}",
                        field, value, spec.unit, spec.min, spec.max, spec.unit
                    ),
                })
            })
            .collect()
    }

    /// Check every reading of a subgroup against the subgroup range
    pub fn check_subgroup(&self, readings: &[f64]) -> Vec<ToleranceWarning> {
        self.check(readings.iter().map(|v| (SUBGROUP_READING_FIELD, Some(*v))))
    }
}
