//! Capability tags used to index tools for discovery
//!
//! A capability describes *what kind of work* a tool does. Tools declare one
//! or more capabilities in their metadata and the registry keeps a reverse
//! index so agents can ask for "every search tool" without knowing names.

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::str::FromStr;

/// Fixed set of capability tags
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Capability {
    /// Fetch documents or records from a knowledge source
    Retrieval,

    /// Produce new content (text, images, documents)
    Generation,

    /// Query a search engine
    Search,

    /// Load and interact with web pages
    WebBrowsing,

    /// Store or recall agent memories
    Memory,

    /// Multi-step reasoning or research
    Reasoning,

    /// Write, analyze or execute code
    Code,

    /// Image understanding and OCR
    Vision,

    /// Speech and audio processing
    Audio,

    /// Task decomposition and planning
    Planning,

    /// Tabular or statistical analysis
    DataAnalysis,
}

impl Capability {
    /// Get all defined capabilities
    pub fn all() -> &'static [Capability] {
        &[
            Capability::Retrieval,
            Capability::Generation,
            Capability::Search,
            Capability::WebBrowsing,
            Capability::Memory,
            Capability::Reasoning,
            Capability::Code,
            Capability::Vision,
            Capability::Audio,
            Capability::Planning,
            Capability::DataAnalysis,
        ]
    }

    /// Get the string name of this capability
    pub fn as_str(&self) -> &'static str {
        match self {
            Capability::Retrieval => "retrieval",
            Capability::Generation => "generation",
            Capability::Search => "search",
            Capability::WebBrowsing => "web_browsing",
            Capability::Memory => "memory",
            Capability::Reasoning => "reasoning",
            Capability::Code => "code",
            Capability::Vision => "vision",
            Capability::Audio => "audio",
            Capability::Planning => "planning",
            Capability::DataAnalysis => "data_analysis",
        }
    }
}

impl std::fmt::Display for Capability {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Error returned when parsing an unknown capability name
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown capability '{0}'")]
pub struct UnknownCapability(pub String);

impl FromStr for Capability {
    type Err = UnknownCapability;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_lowercase().replace('-', "_");
        Capability::all()
            .iter()
            .copied()
            .find(|cap| cap.as_str() == normalized)
            .ok_or_else(|| UnknownCapability(s.to_string()))
    }
}

/// An ordered set of capabilities
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CapabilitySet {
    capabilities: BTreeSet<Capability>,
}

impl CapabilitySet {
    /// Create an empty capability set
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a capability set from an iterator of capabilities
    pub fn from_capabilities(iter: impl IntoIterator<Item = Capability>) -> Self {
        Self {
            capabilities: iter.into_iter().collect(),
        }
    }

    /// Add a capability
    pub fn add(&mut self, cap: Capability) -> &mut Self {
        self.capabilities.insert(cap);
        self
    }

    /// Remove a capability
    pub fn remove(&mut self, cap: Capability) -> &mut Self {
        self.capabilities.remove(&cap);
        self
    }

    /// Check if capability is present
    pub fn contains(&self, cap: Capability) -> bool {
        self.capabilities.contains(&cap)
    }

    /// Number of capabilities in the set
    pub fn len(&self) -> usize {
        self.capabilities.len()
    }

    /// Check if empty
    pub fn is_empty(&self) -> bool {
        self.capabilities.is_empty()
    }

    /// Iterate in declaration order of [`Capability`]
    pub fn iter(&self) -> impl Iterator<Item = &Capability> {
        self.capabilities.iter()
    }
}

impl FromIterator<Capability> for CapabilitySet {
    fn from_iter<T: IntoIterator<Item = Capability>>(iter: T) -> Self {
        Self {
            capabilities: iter.into_iter().collect(),
        }
    }
}
