//! Results handed back by lifecycle operations

use super::config::PortMap;
use chrono::{DateTime, Utc};
use serde::ser::SerializeMap;
use serde::{Serialize, Serializer};

/// A container created and started by one `run` operation.
///
/// Not kept after the operation returns; later operations look the
/// container up by name again.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RunningContainer {
    /// Engine-assigned container id
    pub id: String,
    /// Container name
    pub name: String,
    /// Registry name of the service it belongs to
    pub service: String,
    /// Image reference
    pub image: String,
    /// Network joined after creation
    #[serde(skip_serializing_if = "Option::is_none")]
    pub network: Option<String>,
    /// When the container was started
    pub started_at: DateTime<Utc>,
}

/// Outcome of running a service: one container, or one entry per member of
/// a composite service, in declared order
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum Deployment {
    Single(RunningContainer),
    Group(Vec<Deployment>),
}

impl Deployment {
    /// All containers in this deployment, depth-first in declared order
    pub fn containers(&self) -> Vec<&RunningContainer> {
        match self {
            Deployment::Single(container) => vec![container],
            Deployment::Group(members) => members.iter().flat_map(|m| m.containers()).collect(),
        }
    }
}

/// Port mapping of a service: the engine's table for a concrete service,
/// or member name to member report for a composite one
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PortReport {
    Ports(PortMap),
    Members(Vec<(String, PortReport)>),
}

impl PortReport {
    /// Report for a member of a composite service
    pub fn member(&self, name: &str) -> Option<&PortReport> {
        match self {
            PortReport::Ports(_) => None,
            PortReport::Members(members) => members
                .iter()
                .find(|(member, _)| member == name)
                .map(|(_, report)| report),
        }
    }
}

impl Serialize for PortReport {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            PortReport::Ports(ports) => ports.serialize(serializer),
            // Members keep their declared order
            PortReport::Members(members) => {
                let mut map = serializer.serialize_map(Some(members.len()))?;
                for (name, report) in members {
                    map.serialize_entry(name, report)?;
                }
                map.end()
            }
        }
    }
}
