//! Shared delivery settings and the scoped single-destination override.
//!
//! The settings hold one primary recipient slot plus numbered override
//! slots. A mail client sends to the primary slot and every non-empty
//! override slot, so before each dispatch send the settings are narrowed
//! to exactly one destination and restored afterwards.
//!
//! Restoration is tied to a guard's `Drop`, which runs on success, on an
//! error, on panic, and when the send future is dropped mid-flight.
//!
//! Scopes must not overlap. Entering a scope while another is active
//! fails with [`DeliveryError::ScopeActive`].

use std::future::Future;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use crate::error::DeliveryError;

/// Number of numbered override slots (1..=10).
pub const OVERRIDE_SLOTS: usize = 10;

/// Snapshot of the delivery slots, passed explicitly to a mail client.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DeliveryContext {
    pub primary: Option<String>,
    pub overrides: [Option<String>; OVERRIDE_SLOTS],
}

impl DeliveryContext {
    /// Every address this context targets: primary first, then the
    /// non-empty override slots in slot order.
    pub fn recipients(&self) -> impl Iterator<Item = &str> {
        self.primary
            .iter()
            .chain(self.overrides.iter().flatten())
            .map(String::as_str)
            .filter(|addr| !addr.trim().is_empty())
    }

    fn narrowed_to(address: &str) -> Self {
        Self {
            primary: Some(address.to_string()),
            overrides: Default::default(),
        }
    }
}

#[derive(Debug, Default)]
struct SharedSlots {
    context: DeliveryContext,
    scope_active: bool,
}

/// Process-wide delivery settings handle.
///
/// Cloning shares the same underlying slots.
#[derive(Debug, Clone, Default)]
pub struct DeliverySettings {
    inner: Arc<Mutex<SharedSlots>>,
}

impl DeliverySettings {
    /// Create settings with a primary recipient and override slots.
    ///
    /// Entries beyond [`OVERRIDE_SLOTS`] are ignored with a warning.
    pub fn new(primary: Option<String>, overrides: Vec<String>) -> Self {
        if overrides.len() > OVERRIDE_SLOTS {
            tracing::warn!(
                configured = overrides.len(),
                max = OVERRIDE_SLOTS,
                "Too many delivery overrides, extra entries ignored"
            );
        }

        let mut context = DeliveryContext {
            primary,
            ..Default::default()
        };
        for (slot, address) in context.overrides.iter_mut().zip(overrides) {
            *slot = Some(address);
        }

        Self {
            inner: Arc::new(Mutex::new(SharedSlots {
                context,
                scope_active: false,
            })),
        }
    }

    fn lock(&self) -> MutexGuard<'_, SharedSlots> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Current value of every slot.
    pub fn snapshot(&self) -> DeliveryContext {
        self.lock().context.clone()
    }

    /// Set the primary recipient slot.
    pub fn set_primary(&self, address: Option<String>) {
        self.lock().context.primary = address;
    }

    /// Set numbered override slot `slot` (1-based).
    pub fn set_override(&self, slot: usize, address: Option<String>) -> Result<(), DeliveryError> {
        if !(1..=OVERRIDE_SLOTS).contains(&slot) {
            return Err(DeliveryError::SlotOutOfRange(slot));
        }
        self.lock().context.overrides[slot - 1] = address;
        Ok(())
    }

    /// Run `f` with the settings narrowed to `address`.
    ///
    /// The primary slot is set to `address` and every override slot is
    /// cleared for the duration of `f`; all captured values are restored
    /// when `f` completes, fails, panics or is dropped. `f` receives the
    /// narrowed context explicitly. The lock is never held across `f`.
    pub async fn with_scoped_destination<F, Fut, T>(
        &self,
        address: &str,
        f: F,
    ) -> Result<T, DeliveryError>
    where
        F: FnOnce(DeliveryContext) -> Fut,
        Fut: Future<Output = T>,
    {
        let guard = self.enter_scope(address)?;
        let output = f(guard.context.clone()).await;
        drop(guard);
        Ok(output)
    }

    fn enter_scope(&self, address: &str) -> Result<ScopeGuard<'_>, DeliveryError> {
        let mut slots = self.lock();
        if slots.scope_active {
            return Err(DeliveryError::ScopeActive);
        }

        let narrowed = DeliveryContext::narrowed_to(address);
        let saved = std::mem::replace(&mut slots.context, narrowed.clone());
        slots.scope_active = true;

        tracing::trace!(destination = %address, "Entered scoped destination");

        Ok(ScopeGuard {
            settings: self,
            saved: Some(saved),
            context: narrowed,
        })
    }
}

/// Restores the captured slots on drop.
struct ScopeGuard<'a> {
    settings: &'a DeliverySettings,
    saved: Option<DeliveryContext>,
    context: DeliveryContext,
}

impl Drop for ScopeGuard<'_> {
    fn drop(&mut self) {
        let mut slots = self.settings.lock();
        if let Some(saved) = self.saved.take() {
            slots.context = saved;
        }
        slots.scope_active = false;
        tracing::trace!("Restored delivery settings");
    }
}
