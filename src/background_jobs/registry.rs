//! Ordered, build-once set of job registrations.

use super::job::JobStarter;
use std::collections::HashSet;
use std::sync::Arc;
use thiserror::Error;

/// Errors raised while building a registry.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum RegistryError {
    #[error("Job registered twice: {0}")]
    DuplicateJob(String),

    #[error("Job name must not be empty")]
    EmptyName,
}

/// A named start-capable unit.
#[derive(Clone)]
pub struct JobRegistration {
    pub name: &'static str,
    pub starter: Arc<dyn JobStarter>,
}

impl std::fmt::Debug for JobRegistration {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JobRegistration")
            .field("name", &self.name)
            .field("schedule", &self.starter.schedule())
            .finish()
    }
}

/// Builder collecting registrations in declaration order.
#[derive(Default)]
pub struct JobRegistryBuilder {
    registrations: Vec<JobRegistration>,
}

impl JobRegistryBuilder {
    /// Append a starter. Start order is the order of these calls.
    pub fn register(mut self, starter: impl JobStarter + 'static) -> Self {
        self.registrations.push(JobRegistration {
            name: starter.name(),
            starter: Arc::new(starter),
        });
        self
    }

    /// Append an already shared starter.
    pub fn register_arc(mut self, starter: Arc<dyn JobStarter>) -> Self {
        self.registrations.push(JobRegistration {
            name: starter.name(),
            starter,
        });
        self
    }

    pub fn build(self) -> Result<JobRegistry, RegistryError> {
        let mut seen = HashSet::new();
        for registration in &self.registrations {
            if registration.name.is_empty() {
                return Err(RegistryError::EmptyName);
            }
            if !seen.insert(registration.name) {
                return Err(RegistryError::DuplicateJob(registration.name.to_string()));
            }
        }
        Ok(JobRegistry {
            registrations: self.registrations.into(),
        })
    }
}

/// The fixed registration set. There is no API to change it once built.
#[derive(Debug, Clone)]
pub struct JobRegistry {
    registrations: Arc<[JobRegistration]>,
}

impl JobRegistry {
    pub fn builder() -> JobRegistryBuilder {
        JobRegistryBuilder::default()
    }

    pub fn iter(&self) -> impl Iterator<Item = &JobRegistration> {
        self.registrations.iter()
    }

    pub fn get(&self, name: &str) -> Option<&JobRegistration> {
        self.registrations.iter().find(|r| r.name == name)
    }

    pub fn names(&self) -> Vec<&'static str> {
        self.registrations.iter().map(|r| r.name).collect()
    }

    pub fn len(&self) -> usize {
        self.registrations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.registrations.is_empty()
    }
}
