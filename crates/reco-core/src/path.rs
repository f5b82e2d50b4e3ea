//! Resource path parsing
//!
//! Resource identifiers look like
//! `//compute.googleapis.com/projects/<p>/zones/<z>/instances/<i>`; values of
//! machine-type replacements look like `zones/<z>/machineTypes/<m>`. A
//! parameter is the path segment following its name.

use crate::error::{RecoError, RecoResult};

/// Segment name preceding a project id
pub const PROJECTS: &str = "projects";
/// Segment name preceding a zone
pub const ZONES: &str = "zones";
/// Segment name preceding an instance name
pub const INSTANCES: &str = "instances";
/// Segment name preceding a disk name
pub const DISKS: &str = "disks";
/// Segment name preceding a machine type
pub const MACHINE_TYPES: &str = "machineTypes";

/// Value of the segment that follows `name` in `resource`
///
/// # Errors
/// `RecoError::MissingSegment` when `name` is absent or not followed by a
/// non-empty segment.
pub fn extract_segment(resource: &str, name: &str) -> RecoResult<String> {
    let mut segments = resource.split('/');
    while let Some(segment) = segments.next() {
        if segment == name {
            return match segments.next() {
                Some(value) if !value.is_empty() => Ok(value.to_string()),
                _ => Err(missing(resource, name)),
            };
        }
    }
    Err(missing(resource, name))
}

fn missing(resource: &str, name: &str) -> RecoError {
    RecoError::MissingSegment {
        resource: resource.to_string(),
        segment: name.to_string(),
    }
}

/// Fully qualified compute instance
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct InstanceRef {
    /// Project id
    pub project: String,
    /// Zone name
    pub zone: String,
    /// Instance name
    pub instance: String,
}

impl InstanceRef {
    /// Parse project, zone and instance from a resource path
    ///
    /// # Errors
    /// `RecoError::MissingSegment` if any of the three segments is missing.
    pub fn parse(resource: &str) -> RecoResult<Self> {
        Ok(Self {
            project: extract_segment(resource, PROJECTS)?,
            zone: extract_segment(resource, ZONES)?,
            instance: extract_segment(resource, INSTANCES)?,
        })
    }
}

/// Fully qualified persistent disk
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct DiskRef {
    /// Project id
    pub project: String,
    /// Zone name
    pub zone: String,
    /// Disk name
    pub disk: String,
}

impl DiskRef {
    /// Parse project, zone and disk from a resource path
    ///
    /// # Errors
    /// `RecoError::MissingSegment` if any of the three segments is missing.
    pub fn parse(resource: &str) -> RecoResult<Self> {
        Ok(Self {
            project: extract_segment(resource, PROJECTS)?,
            zone: extract_segment(resource, ZONES)?,
            disk: extract_segment(resource, DISKS)?,
        })
    }
}
