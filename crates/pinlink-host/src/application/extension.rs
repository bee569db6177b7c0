//! Extension devices.
//!
//! An extension drives a device addressed by an id of 200 or above (a
//! NeoPixel strip, for instance) using its own action codes.  Extensions are
//! attached to a session under a name and looked up again by name and type:
//!
//! ```rust,no_run
//! # async fn demo() -> Result<(), pinlink_host::SessionError> {
//! use pinlink_host::{extensions::NeoPixel, Session};
//!
//! let session = Session::new(Default::default());
//! let strip = session.attach("strip", NeoPixel::new())?;
//! strip.lock().unwrap().init(6, 16);
//!
//! let same = session.extension::<NeoPixel>("strip").unwrap();
//! assert_eq!(same.lock().unwrap().num_pixels(), 16);
//! # Ok(()) }
//! ```
//!
//! An extension talks to the device through a [`SessionLink`], which holds
//! only a weak reference: extensions never keep a session alive.

use std::any::Any;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, Weak};

use pinlink_core::{PinId, Update};
use tracing::debug;

use super::error::SessionError;
use super::session::SessionInner;

/// A device driven through custom actions.
pub trait Extension: Send + 'static {
    /// Device id this extension addresses.
    fn device_id(&self) -> PinId;

    /// Receives the link to the session it was attached to.
    fn attached(&mut self, link: SessionLink);
}

/// Weak handle an extension sends through.
#[derive(Clone, Default)]
pub struct SessionLink {
    inner: Weak<SessionInner>,
}

impl SessionLink {
    pub(crate) fn new(inner: Weak<SessionInner>) -> Self {
        Self { inner }
    }

    /// A link to no session.  Every send is dropped.
    pub fn detached() -> Self {
        Self::default()
    }

    pub fn is_attached(&self) -> bool {
        self.inner.strong_count() > 0
    }

    /// Sends `updates` as one envelope, queued if the link is down.
    ///
    /// Returns `false` if the session no longer exists.
    pub fn send(&self, updates: Vec<Update>) -> bool {
        match self.inner.upgrade() {
            Some(inner) => {
                inner.lock_state().send(updates);
                true
            }
            None => {
                debug!("extension send dropped: session is gone");
                false
            }
        }
    }
}

/// Name → extension map with typed lookup.
#[derive(Default)]
pub struct ExtensionRegistry {
    entries: HashMap<String, Arc<dyn Any + Send + Sync>>,
}

impl ExtensionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.entries.contains_key(name)
    }

    /// # Errors
    ///
    /// [`SessionError::DuplicateExtension`] if `name` is taken.
    pub fn insert<E: Extension>(&mut self, name: &str, extension: Arc<Mutex<E>>) -> Result<(), SessionError> {
        if self.contains(name) {
            return Err(SessionError::DuplicateExtension(name.to_string()));
        }
        self.entries.insert(name.to_string(), extension);
        Ok(())
    }

    /// The extension attached as `name`, if it exists and is an `E`.
    pub fn get<E: Extension>(&self, name: &str) -> Option<Arc<Mutex<E>>> {
        let entry = Arc::clone(self.entries.get(name)?);
        entry.downcast::<Mutex<E>>().ok()
    }
}
