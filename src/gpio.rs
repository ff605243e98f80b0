//! GPIO edge-interrupt capability

use std::fmt;

use crate::error::TransportError;

/// Edge that fires the callback
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Edge {
    Rising,
    #[default]
    Falling,
    Both,
}

impl fmt::Display for Edge {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Edge::Rising => "rising",
            Edge::Falling => "falling",
            Edge::Both => "both",
        })
    }
}

/// Input bias for the interrupt pin
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Pull {
    None,
    #[default]
    Up,
    Down,
}

/// Callback run on every matching edge
///
/// May run on an arbitrary thread. It must not block.
pub type EdgeCallback = Box<dyn FnMut() + Send + 'static>;

/// Source of edge interrupts on GPIO input pins
pub trait EdgeSource: Send {
    /// Configure `pin` as an input with `pull` and invoke `callback` on `edge`
    fn subscribe(
        &mut self,
        pin: u8,
        edge: Edge,
        pull: Pull,
        callback: EdgeCallback,
    ) -> Result<EdgeSubscription, TransportError>;
}

impl<E: EdgeSource + ?Sized> EdgeSource for Box<E> {
    fn subscribe(
        &mut self,
        pin: u8,
        edge: Edge,
        pull: Pull,
        callback: EdgeCallback,
    ) -> Result<EdgeSubscription, TransportError> {
        (**self).subscribe(pin, edge, pull, callback)
    }
}

/// Handle to an active edge subscription
///
/// Dropping the handle revokes the subscription.
pub struct EdgeSubscription {
    pin: u8,
    revoke: Option<Box<dyn FnOnce() + Send>>,
}

impl EdgeSubscription {
    pub fn new(pin: u8, revoke: impl FnOnce() + Send + 'static) -> Self {
        Self {
            pin,
            revoke: Some(Box::new(revoke)),
        }
    }

    pub fn pin(&self) -> u8 {
        self.pin
    }

    pub fn is_active(&self) -> bool {
        self.revoke.is_some()
    }

    /// Stop delivering callbacks. Idempotent.
    pub fn revoke(&mut self) {
        if let Some(revoke) = self.revoke.take() {
            revoke();
        }
    }
}

impl fmt::Debug for EdgeSubscription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EdgeSubscription")
            .field("pin", &self.pin)
            .field("active", &self.is_active())
            .finish()
    }
}

impl Drop for EdgeSubscription {
    fn drop(&mut self) {
        self.revoke();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    #[test]
    fn test_revoke_runs_once() {
        let count = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&count);
        let mut sub = EdgeSubscription::new(17, move || {
            counter.fetch_add(1, Ordering::SeqCst);
        });

        assert!(sub.is_active());
        sub.revoke();
        sub.revoke();
        assert!(!sub.is_active());
        drop(sub);
        assert_eq!(count.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_drop_revokes() {
        let count = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&count);
        let sub = EdgeSubscription::new(4, move || {
            counter.fetch_add(1, Ordering::SeqCst);
        });
        assert_eq!(sub.pin(), 4);
        drop(sub);
        assert_eq!(count.load(Ordering::SeqCst), 1);
    }
}
