//! Operation planning
//!
//! Turns the loosely typed [`Operation`] received from the recommender into a
//! [`Step`]: one variant per supported (action, path, resource type)
//! combination, with every identifier and value already extracted. Anything
//! that cannot be planned is rejected here, before any side effect.

use crate::error::{RecoError, RecoResult};
use crate::path::{extract_segment, DiskRef, InstanceRef, INSTANCES, MACHINE_TYPES, PROJECTS, ZONES};
use crate::types::{Instance, Operation, Recommendation};
use regex::Regex;
use serde::Deserialize;

/// Only status a `replace /status` operation may set
pub const TERMINATED_STATUS: &str = "TERMINATED";

/// Resource type of `add` snapshot operations
pub const SNAPSHOT_RESOURCE_TYPE: &str = "compute.googleapis.com/Snapshot";

/// Resource type of `remove` disk operations
pub const DISK_RESOURCE_TYPE: &str = "compute.googleapis.com/Disk";

/// Instance field a `test` operation inspects
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum InstanceField {
    /// `/machineType`
    MachineType,
    /// `/status`
    Status,
}

impl InstanceField {
    /// Field addressed by an operation path
    #[must_use]
    pub fn from_path(path: &str) -> Option<Self> {
        match path {
            "/machineType" => Some(Self::MachineType),
            "/status" => Some(Self::Status),
            _ => None,
        }
    }

    /// Human-readable field name
    #[must_use]
    pub fn label(self) -> &'static str {
        match self {
            Self::MachineType => "machine type",
            Self::Status => "status",
        }
    }

    /// Current value of the field on a live instance
    #[must_use]
    pub fn read(self, instance: &Instance) -> &str {
        match self {
            Self::MachineType => &instance.machine_type,
            Self::Status => &instance.status,
        }
    }
}

/// Expected value of a tested field
///
/// A literal and a pattern may both be present, in which case both must
/// match. With neither present every value matches.
#[derive(Debug, Clone, Default)]
pub struct Expectation {
    literal: Option<String>,
    pattern: Option<Regex>,
}

impl Expectation {
    /// Expectation that matches anything
    #[must_use]
    pub fn any() -> Self {
        Self::default()
    }

    /// Build the expectation of a `test` operation
    ///
    /// # Errors
    /// - `RecoError::InvalidValue` if the literal value is not a string
    /// - `RecoError::InvalidPattern` if the matcher does not compile
    pub fn from_operation(operation: &Operation) -> RecoResult<Self> {
        let literal = match &operation.value {
            None | Some(serde_json::Value::Null) => None,
            Some(serde_json::Value::String(value)) => Some(value.clone()),
            Some(_) => return Err(RecoError::InvalidValue("test".to_string())),
        };
        let pattern = operation
            .value_matcher
            .as_ref()
            .map(|matcher| {
                Regex::new(&format!("^(?:{})$", matcher.matches_pattern))
                    .map_err(|e| RecoError::InvalidPattern(e.to_string()))
            })
            .transpose()?;
        Ok(Self { literal, pattern })
    }

    /// Whether `actual` satisfies the expectation
    #[must_use]
    pub fn matches(&self, actual: &str) -> bool {
        let literal_ok = self.literal.as_deref().map_or(true, |expected| expected == actual);
        let pattern_ok = self.pattern.as_ref().map_or(true, |re| re.is_match(actual));
        literal_ok && pattern_ok
    }
}

/// Structured value of an add-snapshot operation
#[derive(Debug, Deserialize)]
struct SnapshotValue {
    source_disk: String,
}

/// A fully resolved operation
#[derive(Debug, Clone)]
pub enum Step {
    /// Compare a field of a live instance
    Test {
        /// Instance to inspect
        target: InstanceRef,
        /// Field to compare
        field: InstanceField,
        /// Expected value
        expected: Expectation,
    },
    /// Stop, resize and restart an instance
    ReplaceMachineType {
        /// Instance to resize
        target: InstanceRef,
        /// New machine type name
        machine_type: String,
    },
    /// Stop an instance
    StopInstance {
        /// Instance to stop
        target: InstanceRef,
    },
    /// Snapshot a disk under a generated name
    AddSnapshot {
        /// Disk to snapshot
        disk: DiskRef,
    },
    /// Delete a disk
    RemoveDisk {
        /// Disk to delete
        disk: DiskRef,
    },
}

impl Step {
    /// Resolve an operation into a step
    ///
    /// # Errors
    /// - `RecoError::UnsupportedOperation` for unknown combinations
    /// - `RecoError::InvalidValue` for values of the wrong shape
    /// - `RecoError::MissingSegment` for incomplete resource paths
    /// - `RecoError::InvalidPattern` for matchers that do not compile
    pub fn plan(operation: &Operation) -> RecoResult<Self> {
        match operation.action.to_ascii_lowercase().as_str() {
            "test" => {
                let field =
                    InstanceField::from_path(&operation.path).ok_or_else(|| unsupported(operation))?;
                Ok(Self::Test {
                    target: InstanceRef::parse(&operation.resource)?,
                    field,
                    expected: Expectation::from_operation(operation)?,
                })
            }
            "replace" => match operation.path.as_str() {
                "/machineType" => {
                    let value = match &operation.value {
                        Some(serde_json::Value::String(value)) => value,
                        _ => return Err(RecoError::InvalidValue("replace machine type".to_string())),
                    };
                    Ok(Self::ReplaceMachineType {
                        target: InstanceRef {
                            project: extract_segment(&operation.resource, PROJECTS)?,
                            zone: extract_segment(value, ZONES)?,
                            instance: extract_segment(&operation.resource, INSTANCES)?,
                        },
                        machine_type: extract_segment(value, MACHINE_TYPES)?,
                    })
                }
                "/status" => {
                    match &operation.value {
                        None | Some(serde_json::Value::Null) => {}
                        Some(serde_json::Value::String(status)) if status == TERMINATED_STATUS => {}
                        Some(serde_json::Value::String(_)) => return Err(unsupported(operation)),
                        Some(_) => return Err(RecoError::InvalidValue("replace status".to_string())),
                    }
                    Ok(Self::StopInstance {
                        target: InstanceRef::parse(&operation.resource)?,
                    })
                }
                _ => Err(unsupported(operation)),
            },
            "add" if operation.resource_type == SNAPSHOT_RESOURCE_TYPE => {
                let value = operation
                    .value
                    .clone()
                    .ok_or_else(|| RecoError::InvalidValue("add snapshot".to_string()))?;
                let value: SnapshotValue = serde_json::from_value(value)
                    .map_err(|_| RecoError::InvalidValue("add snapshot".to_string()))?;
                Ok(Self::AddSnapshot {
                    disk: DiskRef::parse(&value.source_disk)?,
                })
            }
            "remove" if operation.resource_type == DISK_RESOURCE_TYPE => Ok(Self::RemoveDisk {
                disk: DiskRef::parse(&operation.resource)?,
            }),
            _ => Err(unsupported(operation)),
        }
    }
}

impl std::fmt::Display for Step {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Test { target, field, .. } => {
                write!(f, "test {} of {}", field.label(), target.instance)
            }
            Self::ReplaceMachineType {
                target,
                machine_type,
            } => write!(f, "resize {} to {}", target.instance, machine_type),
            Self::StopInstance { target } => write!(f, "stop {}", target.instance),
            Self::AddSnapshot { disk } => write!(f, "snapshot {}", disk.disk),
            Self::RemoveDisk { disk } => write!(f, "delete {}", disk.disk),
        }
    }
}

/// Resolve every operation of a recommendation, in application order
///
/// # Errors
/// The first operation that cannot be planned, see [`Step::plan`].
pub fn plan_recommendation(recommendation: &Recommendation) -> RecoResult<Vec<Step>> {
    recommendation.operations().map(Step::plan).collect()
}

/// Whether the resource type names `kind`, with or without a service prefix
fn unsupported(operation: &Operation) -> RecoError {
    RecoError::UnsupportedOperation {
        action: operation.action.clone(),
        path: operation.path.clone(),
        resource_type: operation.resource_type.clone(),
    }
}
