//! Driver capability model
//!
//! AI and messaging drivers advertise what they can do through an explicit
//! [`CapabilitySet`] and expose optional features through typed accessors on
//! [`Driver`]. Callers branch on the tagged [`Capability`] instead of probing
//! for methods at runtime.
//!
//! The AI and messaging drivers implement [`Driver`] in their own crates;
//! nothing in this workspace provides one.

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;

/// Something a driver may or may not support
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Capability {
    Completion,
    Streaming,
    Embeddings,
    Messaging,
}

/// Declared capabilities of one driver
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CapabilitySet(BTreeSet<Capability>);

impl CapabilitySet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, capability: Capability) -> Self {
        self.0.insert(capability);
        self
    }

    pub fn supports(&self, capability: Capability) -> bool {
        self.0.contains(&capability)
    }

    pub fn iter(&self) -> impl Iterator<Item = Capability> + '_ {
        self.0.iter().copied()
    }
}

impl FromIterator<Capability> for CapabilitySet {
    fn from_iter<I: IntoIterator<Item = Capability>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

/// Embedding generation, offered by some drivers
pub trait EmbeddingCapability: Send + Sync {
    /// Vector width produced by this driver
    fn dimensions(&self) -> usize;
}

/// A platform driver (AI model, messaging channel, ERP adapter)
pub trait Driver: Send + Sync + fmt::Debug {
    /// Stable driver name, used as the apparatus when tracing
    fn name(&self) -> &str;

    fn capabilities(&self) -> CapabilitySet;

    /// Typed access to embeddings; `None` unless the driver declares
    /// [`Capability::Embeddings`]
    fn embeddings(&self) -> Option<&dyn EmbeddingCapability> {
        None
    }

    fn supports(&self, capability: Capability) -> bool {
        self.capabilities().supports(capability)
    }
}
