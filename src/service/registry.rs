//! Service registry

use super::descriptor::{RawDescriptor, ServiceDescriptor};
use crate::error::{LanzoError, Result};
use std::collections::{BTreeMap, HashSet};
use std::path::Path;

/// Built-in service catalogue
const BUILTIN_SERVICES: &str = include_str!("../../config/services.yaml");

/// Immutable table of service descriptors, validated on load
#[derive(Debug, Clone)]
pub struct ServiceRegistry {
    services: BTreeMap<String, ServiceDescriptor>,
}

impl ServiceRegistry {
    /// Load the built-in catalogue
    pub fn builtin() -> Result<Self> {
        Self::from_yaml_str(BUILTIN_SERVICES)
    }

    /// Load a registry file
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            LanzoError::InvalidRegistry(format!("Failed to read {}: {}", path.display(), e))
        })?;
        let registry = Self::from_yaml_str(&content)?;
        if registry.is_empty() {
            return Err(LanzoError::InvalidRegistry(format!(
                "No services declared in {}",
                path.display()
            )));
        }
        Ok(registry)
    }

    /// Parse a registry from YAML: a mapping of service name to descriptor
    pub fn from_yaml_str(content: &str) -> Result<Self> {
        let raw: BTreeMap<String, RawDescriptor> = serde_yaml::from_str(content)
            .map_err(|e| LanzoError::InvalidRegistry(format!("Failed to parse YAML: {}", e)))?;

        let descriptors = raw
            .into_iter()
            .map(|(name, raw)| raw.resolve(&name))
            .collect::<Result<Vec<_>>>()?;

        Self::from_descriptors(descriptors)
    }

    /// Build a registry from resolved descriptors
    pub fn from_descriptors(descriptors: impl IntoIterator<Item = ServiceDescriptor>) -> Result<Self> {
        let mut services = BTreeMap::new();
        for descriptor in descriptors {
            let name = descriptor.name().to_string();
            if services.insert(name.clone(), descriptor).is_some() {
                return Err(LanzoError::InvalidRegistry(format!(
                    "Duplicate service: {}",
                    name
                )));
            }
        }

        let registry = Self { services };
        registry.validate()?;
        Ok(registry)
    }

    /// Look up a service
    pub fn get(&self, name: &str) -> Result<&ServiceDescriptor> {
        self.services
            .get(name)
            .ok_or_else(|| LanzoError::UnknownService(name.to_string()))
    }

    /// Returns true if the service is registered
    pub fn contains(&self, name: &str) -> bool {
        self.services.contains_key(name)
    }

    /// Registered service names, sorted
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.services.keys().map(|s| s.as_str())
    }

    /// All descriptors, sorted by name
    pub fn iter(&self) -> impl Iterator<Item = &ServiceDescriptor> {
        self.services.values()
    }

    /// Number of registered services
    pub fn len(&self) -> usize {
        self.services.len()
    }

    /// Returns true if no services are registered
    pub fn is_empty(&self) -> bool {
        self.services.is_empty()
    }

    /// Check references and reject cycles through members or dependencies
    fn validate(&self) -> Result<()> {
        for descriptor in self.services.values() {
            for reference in descriptor.references() {
                if !self.services.contains_key(reference) {
                    return Err(LanzoError::InvalidRegistry(format!(
                        "{} refers to unknown service {}",
                        descriptor.name(),
                        reference
                    )));
                }
            }
        }

        let mut visited = HashSet::new();
        let mut path = Vec::new();
        for name in self.services.keys() {
            self.visit(name, &mut visited, &mut path)?;
        }

        Ok(())
    }

    /// Depth-first walk; `path` holds the services currently being visited
    fn visit<'a>(
        &'a self,
        service: &'a str,
        visited: &mut HashSet<&'a str>,
        path: &mut Vec<&'a str>,
    ) -> Result<()> {
        if visited.contains(service) {
            return Ok(());
        }

        if let Some(start) = path.iter().position(|s| *s == service) {
            let mut cycle: Vec<&str> = path[start..].to_vec();
            cycle.push(service);
            return Err(LanzoError::InvalidRegistry(format!(
                "Circular reference: {}",
                cycle.join(" -> ")
            )));
        }

        path.push(service);

        if let Some(descriptor) = self.services.get(service) {
            for reference in descriptor.references() {
                self.visit(reference, visited, path)?;
            }
        }

        path.pop();
        visited.insert(service);

        Ok(())
    }
}
