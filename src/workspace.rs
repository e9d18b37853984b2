//! The workspace: a shared, named blob store.
//!
//! A [`Workspace`] maps blob names to [`Blob`]s. Blobs are created on first
//! reference and handed out as `Arc<Blob>`, so operators keep stable handles
//! to their inputs and outputs for their whole lifetime.
//!
//! # Concurrency
//!
//! - The name-to-blob map sits behind a `parking_lot::RwLock`; creating a blob
//!   from any worker never races with lookups of existing entries.
//! - Each blob guards its own payload. Within a net, the scheduler guarantees
//!   that only one operator writes a given blob at a time.
//!
//! Blobs are never removed; the core runtime has no need for deletion.

use std::any::{type_name, Any};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use parking_lot::RwLock;

use crate::error::{Error, Result};

type Payload = Arc<dyn Any + Send + Sync>;

/// An opaque, typed value container.
#[derive(Default)]
pub struct Blob {
    value: RwLock<Option<(Payload, &'static str)>>,
}

impl Blob {
    /// Creates an empty blob.
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether nothing has been stored yet.
    pub fn is_empty(&self) -> bool {
        self.value.read().is_none()
    }

    /// Name of the stored type, if any.
    pub fn type_name(&self) -> Option<&'static str> {
        self.value.read().as_ref().map(|(_, name)| *name)
    }

    /// Stores `value`, replacing whatever the blob held.
    pub fn set<T: Any + Send + Sync>(&self, value: T) {
        *self.value.write() = Some((Arc::new(value), type_name::<T>()));
    }

    /// Whether the blob holds a `T`.
    pub fn is<T: Any + Send + Sync>(&self) -> bool {
        self.value
            .read()
            .as_ref()
            .is_some_and(|(payload, _)| payload.is::<T>())
    }

    /// Returns the stored value if it is a `T`.
    pub fn get<T: Any + Send + Sync>(&self) -> Option<Arc<T>> {
        let payload = self.value.read().as_ref()?.0.clone();
        payload.downcast::<T>().ok()
    }

    /// Clones the stored `T` out of the blob.
    pub fn get_cloned<T: Any + Send + Sync + Clone>(&self) -> Option<T> {
        self.get::<T>().map(|v| T::clone(&v))
    }

    /// Makes this blob share `other`'s payload without copying it.
    pub fn share_from(&self, other: &Blob) {
        let payload = other.value.read().clone();
        *self.value.write() = payload;
    }

    /// Drops the stored value, leaving the blob empty.
    pub fn reset(&self) {
        *self.value.write() = None;
    }
}

impl fmt::Debug for Blob {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Blob")
            .field("type_name", &self.type_name())
            .finish()
    }
}

/// The shared named-value store a net's operators read and write.
#[derive(Debug, Default)]
pub struct Workspace {
    blobs: RwLock<HashMap<String, Arc<Blob>>>,
}

impl Workspace {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the blob called `name`, creating an empty one if needed.
    pub fn create_blob(&self, name: &str) -> Arc<Blob> {
        if let Some(blob) = self.blobs.read().get(name) {
            return Arc::clone(blob);
        }
        let mut blobs = self.blobs.write();
        Arc::clone(blobs.entry(name.to_string()).or_insert_with(|| {
            tracing::trace!(blob = name, "creating blob");
            Arc::new(Blob::new())
        }))
    }

    pub fn has_blob(&self, name: &str) -> bool {
        self.blobs.read().contains_key(name)
    }

    /// Returns an existing blob.
    ///
    /// # Errors
    /// [`Error::BlobNotFound`] if nothing has created `name` yet.
    pub fn get_blob(&self, name: &str) -> Result<Arc<Blob>> {
        self.blobs
            .read()
            .get(name)
            .cloned()
            .ok_or_else(|| Error::BlobNotFound(name.to_string()))
    }

    /// Creates `name` and stores `value` in it.
    pub fn feed<T: Any + Send + Sync>(&self, name: &str, value: T) -> Arc<Blob> {
        let blob = self.create_blob(name);
        blob.set(value);
        blob
    }

    /// Reads a typed value out of an existing blob.
    ///
    /// # Errors
    /// - [`Error::BlobNotFound`] if the blob does not exist.
    /// - [`Error::BlobType`] if it is empty or holds another type.
    pub fn fetch<T: Any + Send + Sync>(&self, name: &str) -> Result<Arc<T>> {
        self.get_blob(name)?.get::<T>().ok_or_else(|| Error::BlobType {
            name: name.to_string(),
            expected: type_name::<T>(),
        })
    }

    /// All blob names, sorted.
    pub fn blob_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.blobs.read().keys().cloned().collect();
        names.sort_unstable();
        names
    }

    pub fn len(&self) -> usize {
        self.blobs.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.blobs.read().is_empty()
    }
}
