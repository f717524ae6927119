//! Stop-condition expression types.
//!
//! A [`StopCondition`] is either a single comparison against a metric or an
//! AND/OR combination of nested conditions, to any depth. The same type is used
//! for phase stop conditions and quality-gate conditions.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Comparison applied by a simple condition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ComparisonOperator {
    #[serde(rename = ">")]
    GreaterThan,
    #[serde(rename = "<")]
    LessThan,
    #[serde(rename = ">=")]
    GreaterOrEqual,
    #[serde(rename = "<=")]
    LessOrEqual,
    #[serde(rename = "==")]
    Equal,
    #[serde(rename = "!=")]
    NotEqual,
}

impl ComparisonOperator {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::GreaterThan => ">",
            Self::LessThan => "<",
            Self::GreaterOrEqual => ">=",
            Self::LessOrEqual => "<=",
            Self::Equal => "==",
            Self::NotEqual => "!=",
        }
    }

    /// Exact comparison; `==` and `!=` compare floats by value.
    pub fn compare(&self, actual: f64, expected: f64) -> bool {
        match self {
            Self::GreaterThan => actual > expected,
            Self::LessThan => actual < expected,
            Self::GreaterOrEqual => actual >= expected,
            Self::LessOrEqual => actual <= expected,
            Self::Equal => actual == expected,
            Self::NotEqual => actual != expected,
        }
    }
}

impl fmt::Display for ComparisonOperator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for ComparisonOperator {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            ">" => Ok(Self::GreaterThan),
            "<" => Ok(Self::LessThan),
            ">=" => Ok(Self::GreaterOrEqual),
            "<=" => Ok(Self::LessOrEqual),
            "==" => Ok(Self::Equal),
            "!=" => Ok(Self::NotEqual),
            other => Err(format!(
                "Invalid comparison operator '{}'. Valid values: >, <, >=, <=, ==, !=",
                other
            )),
        }
    }
}

/// How a compound condition combines its subconditions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum LogicalOperator {
    And,
    Or,
}

impl LogicalOperator {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::And => "AND",
            Self::Or => "OR",
        }
    }
}

impl fmt::Display for LogicalOperator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for LogicalOperator {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_uppercase().as_str() {
            "AND" => Ok(Self::And),
            "OR" => Ok(Self::Or),
            other => Err(format!(
                "Invalid logical operator '{}'. Valid values: AND, OR",
                other
            )),
        }
    }
}

/// A boolean expression over a metrics snapshot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum StopCondition {
    Simple {
        metric: String,
        operator: ComparisonOperator,
        value: f64,
    },
    Compound {
        logical_operator: LogicalOperator,
        subconditions: Vec<StopCondition>,
    },
}

impl StopCondition {
    pub fn simple(metric: &str, operator: ComparisonOperator, value: f64) -> Self {
        Self::Simple {
            metric: metric.to_string(),
            operator,
            value,
        }
    }

    pub fn and(subconditions: Vec<StopCondition>) -> Self {
        Self::Compound {
            logical_operator: LogicalOperator::And,
            subconditions,
        }
    }

    pub fn or(subconditions: Vec<StopCondition>) -> Self {
        Self::Compound {
            logical_operator: LogicalOperator::Or,
            subconditions,
        }
    }

    /// Every metric name referenced anywhere in the expression, in order of appearance.
    pub fn referenced_metrics(&self) -> Vec<&str> {
        let mut out = Vec::new();
        self.collect_metrics(&mut out);
        out
    }

    fn collect_metrics<'a>(&'a self, out: &mut Vec<&'a str>) {
        match self {
            Self::Simple { metric, .. } => out.push(metric),
            Self::Compound { subconditions, .. } => {
                for sub in subconditions {
                    sub.collect_metrics(out);
                }
            }
        }
    }
}

impl fmt::Display for StopCondition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Simple {
                metric,
                operator,
                value,
            } => write!(f, "{} {} {}", metric, operator, value),
            Self::Compound {
                logical_operator,
                subconditions,
            } => {
                f.write_str("(")?;
                for (i, sub) in subconditions.iter().enumerate() {
                    if i > 0 {
                        write!(f, " {} ", logical_operator)?;
                    }
                    write!(f, "{}", sub)?;
                }
                f.write_str(")")
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_operator_compare() {
        assert!(ComparisonOperator::GreaterThan.compare(4.0, 3.0));
        assert!(!ComparisonOperator::GreaterThan.compare(3.0, 3.0));
        assert!(ComparisonOperator::GreaterOrEqual.compare(3.0, 3.0));
        assert!(ComparisonOperator::LessThan.compare(2.0, 3.0));
        assert!(ComparisonOperator::LessOrEqual.compare(3.0, 3.0));
        assert!(ComparisonOperator::Equal.compare(0.0, 0.0));
        assert!(ComparisonOperator::NotEqual.compare(0.1, 0.0));
    }

    #[test]
    fn test_float_equality_is_exact() {
        // 0.1 + 0.2 is not 0.3 in binary floating point; no tolerance is applied.
        assert!(!ComparisonOperator::Equal.compare(0.1 + 0.2, 0.3));
        assert!(ComparisonOperator::NotEqual.compare(0.1 + 0.2, 0.3));
    }

    #[test]
    fn test_operator_from_str() {
        assert_eq!(
            ">=".parse::<ComparisonOperator>().unwrap(),
            ComparisonOperator::GreaterOrEqual
        );
        assert!("=>".parse::<ComparisonOperator>().is_err());
        assert_eq!("or".parse::<LogicalOperator>().unwrap(), LogicalOperator::Or);
    }

    #[test]
    fn test_simple_condition_json() {
        let json = r#"{"type":"simple","metric":"loops","operator":">","value":3}"#;
        let cond: StopCondition = serde_json::from_str(json).unwrap();
        assert_eq!(
            cond,
            StopCondition::simple("loops", ComparisonOperator::GreaterThan, 3.0)
        );
    }

    #[test]
    fn test_compound_condition_json() {
        let json = r#"{
            "type": "compound",
            "logical_operator": "OR",
            "subconditions": [
                {"type": "simple", "metric": "tests_failed", "operator": "==", "value": 0},
                {"type": "compound", "logical_operator": "AND", "subconditions": [
                    {"type": "simple", "metric": "coverage_pct", "operator": ">=", "value": 80}
                ]}
            ]
        }"#;
        let cond: StopCondition = serde_json::from_str(json).unwrap();
        assert_eq!(cond.referenced_metrics(), vec!["tests_failed", "coverage_pct"]);
    }

    #[test]
    fn test_unknown_operator_is_rejected_by_serde() {
        let json = r#"{"type":"simple","metric":"loops","operator":"~","value":3}"#;
        assert!(serde_json::from_str::<StopCondition>(json).is_err());
    }

    #[test]
    fn test_display() {
        let cond = StopCondition::and(vec![
            StopCondition::simple("tests_failed", ComparisonOperator::Equal, 0.0),
            StopCondition::simple("coverage_pct", ComparisonOperator::GreaterOrEqual, 80.5),
        ]);
        assert_eq!(cond.to_string(), "(tests_failed == 0 AND coverage_pct >= 80.5)");
    }
}
