//! # Image Requirement Evaluation
//!
//! Evaluates image-declared compatibility requirements (`NVIDIA_REQUIRE_*`)
//! against properties probed from the host.
//!
//! ## Expression Grammar
//!
//! ```text
//! requirement := alternative (WS alternative)*      any alternative may hold
//! alternative := constraint ("," constraint)*       every constraint must hold
//! constraint  := property operator value
//! property    := "cuda" | "arch" | "driver" | "brand"
//! operator    := "==" | "=" | "!=" | "<=" | ">=" | "<" | ">"
//! ```
//!
//! All requirements of an image must hold.
//!
//! ## Version Comparison
//!
//! `cuda`, `arch` and `driver` compare as dotted numeric versions, segment by
//! segment, with missing trailing segments equal to zero: `9.2 < 9.10` and
//! `9.0 == 9`. `brand` compares as a case-insensitive string and only
//! supports equality operators.
//!
//! ## Degraded Probing
//!
//! A constraint on a property that was never probed is skipped with a
//! warning rather than failed. Hosts without working version tooling still
//! start GPU containers.

use crate::constants::DISABLE_REQUIRE_ENVVAR;
use crate::error::{Error, Result};
use std::cmp::Ordering;
use std::collections::HashMap;
use std::str::FromStr;
use tracing::{debug, warn};

// =============================================================================
// Properties
// =============================================================================

/// Host property a constraint can refer to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Property {
    /// CUDA driver API version.
    Cuda,
    /// Compute capability of the probed device.
    Arch,
    /// Kernel driver version.
    Driver,
    /// GPU brand (e.g. `tesla`, `geforce`).
    Brand,
}

impl Property {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Cuda => "cuda",
            Self::Arch => "arch",
            Self::Driver => "driver",
            Self::Brand => "brand",
        }
    }

    fn is_version(&self) -> bool {
        !matches!(self, Self::Brand)
    }
}

impl FromStr for Property {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, String> {
        match s {
            "cuda" => Ok(Self::Cuda),
            "arch" => Ok(Self::Arch),
            "driver" => Ok(Self::Driver),
            "brand" => Ok(Self::Brand),
            other => Err(format!("unknown property '{}'", other)),
        }
    }
}

impl std::fmt::Display for Property {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Probed property value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PropertyValue {
    Version(Version),
    String(String),
}

// =============================================================================
// Versions
// =============================================================================

/// Dotted numeric version.
#[derive(Debug, Clone)]
pub struct Version(Vec<u64>);

impl Version {
    /// Returns the numeric segments.
    pub fn segments(&self) -> &[u64] {
        &self.0
    }

    pub fn major(&self) -> u64 {
        self.0.first().copied().unwrap_or(0)
    }

    pub fn minor(&self) -> u64 {
        self.0.get(1).copied().unwrap_or(0)
    }
}

impl FromStr for Version {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let trimmed = s.trim();
        if trimmed.is_empty() {
            return Err(Error::InvalidVersion(s.to_string()));
        }

        trimmed
            .split('.')
            .map(|segment| segment.parse::<u64>())
            .collect::<std::result::Result<Vec<_>, _>>()
            .map(Version)
            .map_err(|_| Error::InvalidVersion(s.to_string()))
    }
}

impl Ord for Version {
    fn cmp(&self, other: &Self) -> Ordering {
        let len = self.0.len().max(other.0.len());
        (0..len)
            .map(|i| {
                let a = self.0.get(i).copied().unwrap_or(0);
                let b = other.0.get(i).copied().unwrap_or(0);
                a.cmp(&b)
            })
            .find(|ord| *ord != Ordering::Equal)
            .unwrap_or(Ordering::Equal)
    }
}

impl PartialOrd for Version {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl PartialEq for Version {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for Version {}

impl std::fmt::Display for Version {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let segments: Vec<String> = self.0.iter().map(u64::to_string).collect();
        f.write_str(&segments.join("."))
    }
}

// =============================================================================
// Constraints
// =============================================================================

/// Comparison operator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operator {
    Equal,
    NotEqual,
    Less,
    LessEqual,
    Greater,
    GreaterEqual,
}

impl Operator {
    // Two-character operators first so `<=` is not read as `<`.
    const TOKENS: [(&'static str, Operator); 7] = [
        ("==", Operator::Equal),
        ("!=", Operator::NotEqual),
        ("<=", Operator::LessEqual),
        (">=", Operator::GreaterEqual),
        ("=", Operator::Equal),
        ("<", Operator::Less),
        (">", Operator::Greater),
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Equal => "==",
            Self::NotEqual => "!=",
            Self::Less => "<",
            Self::LessEqual => "<=",
            Self::Greater => ">",
            Self::GreaterEqual => ">=",
        }
    }

    /// Returns true if `probed <op> expected` holds given `probed.cmp(expected)`.
    pub fn holds(&self, ordering: Ordering) -> bool {
        match self {
            Self::Equal => ordering == Ordering::Equal,
            Self::NotEqual => ordering != Ordering::Equal,
            Self::Less => ordering == Ordering::Less,
            Self::LessEqual => ordering != Ordering::Greater,
            Self::Greater => ordering == Ordering::Greater,
            Self::GreaterEqual => ordering != Ordering::Less,
        }
    }
}

/// Outcome of evaluating one constraint.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Evaluation {
    Satisfied,
    Unsatisfied,
    /// The property was not probed.
    Unknown,
}

/// A single `property op value` comparison.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Constraint {
    pub property: Property,
    pub operator: Operator,
    pub value: String,
    version: Option<Version>,
}

impl Constraint {
    /// Parses a constraint such as `cuda>=11.0` or `brand=tesla`.
    pub fn parse(expression: &str) -> Result<Self> {
        let invalid = |reason: String| Error::InvalidRequirement {
            expression: expression.to_string(),
            reason,
        };

        let trimmed = expression.trim();
        let split = trimmed
            .find(|c| matches!(c, '<' | '>' | '=' | '!'))
            .ok_or_else(|| invalid("missing comparison operator".to_string()))?;
        let (name, rest) = trimmed.split_at(split);

        let property: Property = name.trim().parse().map_err(invalid)?;
        let (operator, value) = Operator::TOKENS
            .iter()
            .find_map(|(token, op)| rest.strip_prefix(token).map(|v| (*op, v.trim())))
            .ok_or_else(|| invalid(format!("invalid operator in '{}'", rest)))?;

        if value.is_empty() {
            return Err(invalid("missing value".to_string()));
        }

        let version = if property.is_version() {
            Some(
                value
                    .parse::<Version>()
                    .map_err(|e| invalid(e.to_string()))?,
            )
        } else {
            if !matches!(operator, Operator::Equal | Operator::NotEqual) {
                return Err(invalid(format!(
                    "operator '{}' not supported for {}",
                    operator.as_str(),
                    property
                )));
            }
            None
        };

        Ok(Self {
            property,
            operator,
            value: value.to_string(),
            version,
        })
    }

    /// Evaluates the constraint against probed properties.
    pub fn evaluate(&self, properties: &HashMap<Property, PropertyValue>) -> Evaluation {
        let ordering = match (properties.get(&self.property), &self.version) {
            (None, _) => return Evaluation::Unknown,
            (Some(PropertyValue::Version(probed)), Some(expected)) => probed.cmp(expected),
            (Some(PropertyValue::Version(probed)), None) => {
                probed.to_string().cmp(&self.value.to_lowercase())
            }
            (Some(PropertyValue::String(probed)), _) => {
                probed.to_lowercase().cmp(&self.value.to_lowercase())
            }
        };

        if self.operator.holds(ordering) {
            Evaluation::Satisfied
        } else {
            Evaluation::Unsatisfied
        }
    }
}

impl std::fmt::Display for Constraint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}{}{}", self.property, self.operator.as_str(), self.value)
    }
}

// =============================================================================
// Requirements
// =============================================================================

/// One image-declared requirement: alternatives of constraint conjunctions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Requirement {
    expression: String,
    alternatives: Vec<Vec<Constraint>>,
}

impl Requirement {
    pub fn parse(expression: &str) -> Result<Self> {
        let alternatives = expression
            .split_whitespace()
            .map(|alternative| {
                alternative
                    .split(',')
                    .filter(|c| !c.trim().is_empty())
                    .map(Constraint::parse)
                    .collect::<Result<Vec<_>>>()
            })
            .collect::<Result<Vec<_>>>()?;

        Ok(Self {
            expression: expression.to_string(),
            alternatives,
        })
    }

    pub fn expression(&self) -> &str {
        &self.expression
    }

    /// Returns the failing constraints if no alternative holds.
    fn evaluate(
        &self,
        properties: &HashMap<Property, PropertyValue>,
    ) -> std::result::Result<(), Vec<String>> {
        if self.alternatives.is_empty() {
            return Ok(());
        }

        let mut failed = Vec::new();
        for alternative in &self.alternatives {
            let mut alternative_failed = Vec::new();
            for constraint in alternative {
                match constraint.evaluate(properties) {
                    Evaluation::Satisfied => {}
                    Evaluation::Unsatisfied => alternative_failed.push(constraint.to_string()),
                    Evaluation::Unknown => warn!(
                        "Skipping requirement '{}': {} is not available",
                        constraint, constraint.property
                    ),
                }
            }
            if alternative_failed.is_empty() {
                return Ok(());
            }
            failed.extend(alternative_failed);
        }

        Err(failed)
    }
}

/// Set of requirements evaluated as a conjunction against probed properties.
#[derive(Debug, Clone, Default)]
pub struct Requirements {
    requirements: Vec<Requirement>,
    properties: HashMap<Property, PropertyValue>,
    checks_disabled: bool,
}

impl Requirements {
    /// Parses the given requirement expressions.
    pub fn new<I, S>(expressions: I) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let requirements = expressions
            .into_iter()
            .map(|e| Requirement::parse(e.as_ref()))
            .collect::<Result<Vec<_>>>()?;

        Ok(Self {
            requirements,
            ..Default::default()
        })
    }

    /// Bypasses evaluation entirely when `disabled` is true.
    pub fn with_checks_disabled(mut self, disabled: bool) -> Self {
        self.checks_disabled = disabled;
        self
    }

    pub fn requirements(&self) -> &[Requirement] {
        &self.requirements
    }

    /// Records a probed version property.
    ///
    /// Unparseable versions are dropped with a warning, leaving the property
    /// unprobed.
    pub fn add_version_property(&mut self, property: Property, value: &str) {
        match value.parse::<Version>() {
            Ok(version) => {
                debug!("Probed {}={}", property, version);
                self.properties
                    .insert(property, PropertyValue::Version(version));
            }
            Err(e) => warn!("Ignoring probed {}: {}", property, e),
        }
    }

    /// Records a probed string property.
    pub fn add_string_property(&mut self, property: Property, value: &str) {
        debug!("Probed {}={}", property, value);
        self.properties
            .insert(property, PropertyValue::String(value.to_string()));
    }

    /// Checks that every requirement holds.
    ///
    /// Returns [`Error::RequirementsNotMet`] listing each failing constraint.
    pub fn assert(&self) -> Result<()> {
        if self.checks_disabled {
            debug!("{}=true; skipping requirement checks", DISABLE_REQUIRE_ENVVAR);
            return Ok(());
        }

        let mut unmet = Vec::new();
        for requirement in &self.requirements {
            match requirement.evaluate(&self.properties) {
                Ok(()) => debug!("Requirement '{}' met", requirement.expression),
                Err(failed) => unmet.extend(failed),
            }
        }

        if unmet.is_empty() {
            Ok(())
        } else {
            Err(Error::RequirementsNotMet { unmet })
        }
    }
}
