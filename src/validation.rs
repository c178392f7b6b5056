//! Request validation.
//!
//! Raw JSON goes in, an immutable [`BuildingRecord`] comes out. Type checks
//! happen per field against the JSON value so every offending field can be
//! named; range constraints are declared on [`BuildingData`] with `validator`.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;
use validator::{Validate, ValidationErrors};

pub const PROPERTY_GFA_TOTAL: &str = "PropertyGFATotal";
pub const NUMBER_OF_FLOORS: &str = "NumberofFloors";
pub const BUILDING_AGE: &str = "BuildingAge";
pub const HAS_GAS: &str = "HasGas";
pub const ENERGY_STAR_SCORE: &str = "ENERGYSTARScore";

/// Wire order, also used to order reported violations.
pub const FIELDS: [&str; 5] = [
    PROPERTY_GFA_TOTAL,
    NUMBER_OF_FLOORS,
    BUILDING_AGE,
    HAS_GAS,
    ENERGY_STAR_SCORE,
];

pub const DEFAULT_ENERGY_STAR_SCORE: f64 = 50.0;

fn default_energy_star_score() -> f64 {
    DEFAULT_ENERGY_STAR_SCORE
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldViolation {
    pub field: String,
    pub rule: String,
}

impl FieldViolation {
    pub fn new(field: impl Into<String>, rule: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            rule: rule.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ValidationError {
    violations: Vec<FieldViolation>,
}

impl ValidationError {
    fn new(mut violations: Vec<FieldViolation>) -> Self {
        violations.sort_by_key(|v| {
            FIELDS
                .iter()
                .position(|f| *f == v.field)
                .unwrap_or(FIELDS.len())
        });
        Self { violations }
    }

    fn single(field: &str, rule: &str) -> Self {
        Self::new(vec![FieldViolation::new(field, rule)])
    }

    pub fn violations(&self) -> &[FieldViolation] {
        &self.violations
    }

    pub fn into_violations(self) -> Vec<FieldViolation> {
        self.violations
    }

    /// True when `field` failed at least one rule.
    pub fn has_field(&self, field: &str) -> bool {
        self.violations.iter().any(|v| v.field == field)
    }
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "invalid request")?;
        for (i, v) in self.violations.iter().enumerate() {
            let sep = if i == 0 { ": " } else { "; " };
            write!(f, "{}{} {}", sep, v.field, v.rule)?;
        }
        Ok(())
    }
}

impl std::error::Error for ValidationError {}

/// Typed request body. Holding one does not mean it passed validation; use
/// [`BuildingRecord::try_from`] or [`validate_payload`] for that.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Validate)]
pub struct BuildingData {
    /// Total gross floor area (sq ft).
    #[serde(rename = "PropertyGFATotal")]
    #[validate(range(exclusive_min = 0.0, message = "must be > 0"))]
    pub total_floor_area: f64,

    #[serde(rename = "NumberofFloors")]
    #[validate(range(min = 1, message = "must be >= 1"))]
    pub floor_count: i64,

    #[serde(rename = "BuildingAge")]
    #[validate(range(min = 0, message = "must be >= 0"))]
    pub building_age: i64,

    /// 1 when the building uses natural gas.
    #[serde(rename = "HasGas")]
    #[validate(range(min = 0, max = 1, message = "must be 0 or 1"))]
    pub has_gas: i64,

    #[serde(rename = "ENERGYSTARScore", default = "default_energy_star_score")]
    #[validate(range(min = 0.0, max = 100.0, message = "must be between 0 and 100"))]
    pub energy_star_score: f64,
}

impl BuildingData {
    pub fn example() -> Self {
        Self {
            total_floor_area: 50000.0,
            floor_count: 5,
            building_age: 25,
            has_gas: 1,
            energy_star_score: 65.0,
        }
    }
}

/// A request that satisfied every field constraint. Fields are private so
/// the only way to build one is through validation.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BuildingRecord {
    total_floor_area: f64,
    floor_count: i64,
    building_age: i64,
    has_gas: i64,
    energy_star_score: f64,
}

impl BuildingRecord {
    pub fn total_floor_area(&self) -> f64 {
        self.total_floor_area
    }

    pub fn floor_count(&self) -> i64 {
        self.floor_count
    }

    pub fn building_age(&self) -> i64 {
        self.building_age
    }

    pub fn has_gas(&self) -> i64 {
        self.has_gas
    }

    pub fn energy_star_score(&self) -> f64 {
        self.energy_star_score
    }
}

impl TryFrom<BuildingData> for BuildingRecord {
    type Error = ValidationError;

    fn try_from(data: BuildingData) -> Result<Self, Self::Error> {
        let mut violations = Vec::new();

        // validator's range checks let NaN through
        for (field, value) in [
            (PROPERTY_GFA_TOTAL, data.total_floor_area),
            (ENERGY_STAR_SCORE, data.energy_star_score),
        ] {
            if !value.is_finite() {
                violations.push(FieldViolation::new(field, "must be a finite number"));
            }
        }

        if let Err(errors) = data.validate() {
            for v in violations_from(&errors) {
                if !violations.iter().any(|seen| seen.field == v.field) {
                    violations.push(v);
                }
            }
        }

        if !violations.is_empty() {
            return Err(ValidationError::new(violations));
        }

        Ok(Self {
            total_floor_area: data.total_floor_area,
            floor_count: data.floor_count,
            building_age: data.building_age,
            has_gas: data.has_gas,
            energy_star_score: data.energy_star_score,
        })
    }
}

/// Parse and validate an untyped request payload.
///
/// Type problems (missing field, wrong JSON type) are collected for every
/// field first; range rules run once all fields are well-typed.
pub fn validate_payload(payload: &Value) -> Result<BuildingRecord, ValidationError> {
    let Some(fields) = payload.as_object() else {
        return Err(ValidationError::single("$", "expected a JSON object"));
    };

    let mut violations = Vec::new();
    let total_floor_area = required(fields, PROPERTY_GFA_TOTAL, &mut violations, as_number);
    let floor_count = required(fields, NUMBER_OF_FLOORS, &mut violations, as_integer);
    let building_age = required(fields, BUILDING_AGE, &mut violations, as_integer);
    let has_gas = required(fields, HAS_GAS, &mut violations, as_integer);
    let energy_star_score = match fields.get(ENERGY_STAR_SCORE) {
        None => Some(DEFAULT_ENERGY_STAR_SCORE),
        Some(value) => typed(ENERGY_STAR_SCORE, value, &mut violations, as_number),
    };

    let (
        Some(total_floor_area),
        Some(floor_count),
        Some(building_age),
        Some(has_gas),
        Some(energy_star_score),
    ) = (
        total_floor_area,
        floor_count,
        building_age,
        has_gas,
        energy_star_score,
    )
    else {
        return Err(ValidationError::new(violations));
    };

    BuildingRecord::try_from(BuildingData {
        total_floor_area,
        floor_count,
        building_age,
        has_gas,
        energy_star_score,
    })
}

fn as_number(value: &Value) -> Result<f64, &'static str> {
    value.as_f64().ok_or("expected number")
}

/// Whole-number floats such as `5.0` are accepted; `2.5` is not.
fn as_integer(value: &Value) -> Result<i64, &'static str> {
    if let Some(i) = value.as_i64() {
        return Ok(i);
    }
    match value.as_f64() {
        Some(f) if f.fract() == 0.0 && f >= i64::MIN as f64 && f < i64::MAX as f64 => {
            Ok(f as i64)
        }
        _ => Err("expected integer"),
    }
}

fn required<T>(
    fields: &Map<String, Value>,
    name: &str,
    violations: &mut Vec<FieldViolation>,
    convert: fn(&Value) -> Result<T, &'static str>,
) -> Option<T> {
    match fields.get(name) {
        None | Some(Value::Null) => {
            violations.push(FieldViolation::new(name, "required"));
            None
        }
        Some(value) => typed(name, value, violations, convert),
    }
}

fn typed<T>(
    name: &str,
    value: &Value,
    violations: &mut Vec<FieldViolation>,
    convert: fn(&Value) -> Result<T, &'static str>,
) -> Option<T> {
    match convert(value) {
        Ok(v) => Some(v),
        Err(rule) => {
            violations.push(FieldViolation::new(name, rule));
            None
        }
    }
}

fn wire_name(field: &str) -> &str {
    match field {
        "total_floor_area" => PROPERTY_GFA_TOTAL,
        "floor_count" => NUMBER_OF_FLOORS,
        "building_age" => BUILDING_AGE,
        "has_gas" => HAS_GAS,
        "energy_star_score" => ENERGY_STAR_SCORE,
        other => other,
    }
}

fn violations_from(errors: &ValidationErrors) -> Vec<FieldViolation> {
    let mut out = Vec::new();
    for (field, errs) in errors.field_errors() {
        for err in errs.iter() {
            let rule = err
                .message
                .as_ref()
                .map(|m| m.to_string())
                .unwrap_or_else(|| err.code.to_string());
            out.push(FieldViolation::new(wire_name(&field), rule));
        }
    }
    out
}
