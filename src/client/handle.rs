//! Lazily constructed, process-wide client handle

use std::fmt;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use log::{debug, info};

use crate::error::Result;

type Factory<C> = Box<dyn Fn() -> Result<Arc<C>> + Send + Sync>;

/// Holds at most one client, built on first use.
///
/// Construction happens under the lock, so concurrent first callers see
/// exactly one factory invocation. A failed construction leaves the slot
/// empty and the next caller tries again.
pub struct ClientHandle<C: ?Sized> {
    slot: Mutex<Option<Arc<C>>>,
    factory: Factory<C>,
    constructions: AtomicUsize,
}

impl<C: ?Sized + Send + Sync> ClientHandle<C> {
    pub fn new<F>(factory: F) -> Self
    where
        F: Fn() -> Result<Arc<C>> + Send + Sync + 'static,
    {
        Self {
            slot: Mutex::new(None),
            factory: Box::new(factory),
            constructions: AtomicUsize::new(0),
        }
    }

    /// Wrap an already built client
    pub fn from_client(client: Arc<C>) -> Self
    where
        C: 'static,
    {
        let fallback = client.clone();
        Self {
            slot: Mutex::new(Some(client)),
            factory: Box::new(move || Ok(fallback.clone())),
            constructions: AtomicUsize::new(0),
        }
    }

    /// Return the shared client, constructing it if this is the first call
    pub fn get(&self) -> Result<Arc<C>> {
        // A panic in another caller can't leave the slot half-written
        let mut slot = self.slot.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(client) = slot.as_ref() {
            return Ok(client.clone());
        }

        debug!("Constructing workspace client");
        let client = (self.factory)()?;
        self.constructions.fetch_add(1, Ordering::SeqCst);
        info!("Workspace client initialized");
        *slot = Some(client.clone());
        Ok(client)
    }

    pub fn is_initialized(&self) -> bool {
        self.slot.lock().unwrap_or_else(PoisonError::into_inner).is_some()
    }

    /// Number of times the factory produced a client
    pub fn constructions(&self) -> usize {
        self.constructions.load(Ordering::SeqCst)
    }
}

impl<C: ?Sized> fmt::Debug for ClientHandle<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClientHandle")
            .field("constructions", &self.constructions.load(Ordering::SeqCst))
            .finish()
    }
}
