//! Assets and the events that act on them.

use std::fmt;

/// One synchronisable file.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Asset {
    /// Path relative to the project directory, `/`-separated.
    pub key: String,
    /// Version token (RFC3339 timestamp) or empty when unknown.
    pub version: String,
    /// File contents. Empty for remote listings.
    pub content: Vec<u8>,
}

impl Asset {
    /// Creates an asset with no version.
    pub fn new(key: impl Into<String>, content: impl Into<Vec<u8>>) -> Self {
        Self {
            key: key.into(),
            version: String::new(),
            content: content.into(),
        }
    }

    /// Creates a content-less asset as returned by a remote listing.
    pub fn listed(key: impl Into<String>, version: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            version: version.into(),
            content: Vec::new(),
        }
    }

    /// Sets the version token.
    #[must_use]
    pub fn with_version(mut self, version: impl Into<String>) -> Self {
        self.version = version.into();
        self
    }

    /// Returns true if the key can be synchronised at all.
    #[must_use]
    pub fn is_valid(&self) -> bool {
        !self.key.is_empty()
            && !self.key.starts_with('/')
            && !self.key.split('/').any(|part| part.is_empty() || part == "..")
    }
}

/// Kind of action an [`AssetEvent`] requests.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventType {
    /// Create the asset remotely.
    Create,
    /// Overwrite the remote asset.
    Update,
    /// Delete the remote asset.
    Remove,
    /// Fetch the remote asset into the local directory.
    Retrieve,
}

impl EventType {
    /// Returns true for events that change the remote store.
    #[must_use]
    pub fn is_mutation(&self) -> bool {
        matches!(self, EventType::Create | EventType::Update | EventType::Remove)
    }
}

impl fmt::Display for EventType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            EventType::Create => "Create",
            EventType::Update => "Update",
            EventType::Remove => "Remove",
            EventType::Retrieve => "Retrieve",
        };
        f.write_str(name)
    }
}

/// One intended mutation or fetch of one asset on one environment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AssetEvent {
    /// What to do.
    pub kind: EventType,
    /// The asset acted on.
    pub asset: Asset,
    /// Target environment name.
    pub environment: String,
}

impl AssetEvent {
    /// Creates an event.
    pub fn new(kind: EventType, asset: Asset, environment: impl Into<String>) -> Self {
        Self {
            kind,
            asset,
            environment: environment.into(),
        }
    }

    /// Upload (overwrite) event.
    pub fn upload(asset: Asset, environment: impl Into<String>) -> Self {
        Self::new(EventType::Update, asset, environment)
    }

    /// Create event.
    pub fn create(asset: Asset, environment: impl Into<String>) -> Self {
        Self::new(EventType::Create, asset, environment)
    }

    /// Removal event.
    pub fn removal(asset: Asset, environment: impl Into<String>) -> Self {
        Self::new(EventType::Remove, asset, environment)
    }

    /// Retrieve event.
    pub fn retrieve(asset: Asset, environment: impl Into<String>) -> Self {
        Self::new(EventType::Retrieve, asset, environment)
    }

    /// Key of the asset acted on.
    #[must_use]
    pub fn key(&self) -> &str {
        &self.asset.key
    }
}

/// Reply of a remote store to a successful [`AssetEvent`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Acknowledgement {
    /// Host (or location) that served the request.
    pub host: String,
    /// Version token the remote now reports for the asset. Empty after a
    /// removal.
    pub version: String,
}
