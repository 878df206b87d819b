//! Tracked-image set.
//!
//! The build/deploy pipeline registers the images it produced for the
//! current session; the pod forwarder only auto-forwards containers whose
//! image is a member. Consulted read-only by the forwarding logic.

use std::collections::HashSet;

use parking_lot::RwLock;

/// The set of container images belonging to the current session.
#[derive(Debug, Default)]
pub struct ImageList {
    images: RwLock<HashSet<String>>,
}

impl ImageList {
    /// Creates an empty image list.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers an image as belonging to the session.
    pub fn add(&self, image: impl Into<String>) {
        self.images.write().insert(image.into());
    }

    /// Removes an image from the session.
    pub fn remove(&self, image: &str) {
        self.images.write().remove(image);
    }

    /// Membership test used to decide whether a container is forwardable.
    pub fn contains(&self, image: &str) -> bool {
        self.images.read().contains(image)
    }
}
