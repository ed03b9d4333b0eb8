//! Single-flight coordination for content fetches.
//!
//! A caller that needs content nobody else is fetching *claims* the key and
//! fetches it. A caller that finds the key already claimed waits for that
//! flight to land instead of issuing a duplicate request. Claims are released
//! when their [`FlightClaim`] is dropped, whether the fetch succeeded, failed,
//! or panicked.

use std::collections::HashMap;
use std::sync::{Arc, Condvar, Mutex, PoisonError};

/// One in-progress fetch.
#[derive(Debug, Default)]
pub(crate) struct Flight {
    landed: Mutex<bool>,
    signal: Condvar,
}

impl Flight {
    /// Block until the owning claim is released.
    pub(crate) fn wait(&self) {
        let mut landed = self.landed.lock().unwrap_or_else(PoisonError::into_inner);
        while !*landed {
            landed = self
                .signal
                .wait(landed)
                .unwrap_or_else(PoisonError::into_inner);
        }
    }

    fn land(&self) {
        *self.landed.lock().unwrap_or_else(PoisonError::into_inner) = true;
        self.signal.notify_all();
    }
}

/// Registry of keys currently being fetched.
#[derive(Debug, Default)]
pub(crate) struct FlightRegistry {
    flights: Mutex<HashMap<String, Arc<Flight>>>,
}

/// Result of [`FlightRegistry::claim`].
pub(crate) struct Claimed<T> {
    /// Guard over the keys this caller now owns.
    pub(crate) claim: FlightClaim,
    /// Items whose keys this caller owns and must fetch.
    pub(crate) owned: Vec<T>,
    /// Flights owned by other callers that cover the remaining items.
    pub(crate) waiting: Vec<Arc<Flight>>,
}

impl FlightRegistry {
    /// Claim every free key among `items`; report flights for the rest.
    pub(crate) fn claim<T>(
        self: &Arc<Self>,
        items: impl IntoIterator<Item = (String, T)>,
    ) -> Claimed<T> {
        let mut flights = self.flights.lock().unwrap_or_else(PoisonError::into_inner);
        let mut keys = Vec::new();
        let mut owned = Vec::new();
        let mut waiting = Vec::new();

        for (key, item) in items {
            if let Some(flight) = flights.get(&key) {
                waiting.push(Arc::clone(flight));
                continue;
            }
            let flight = Arc::new(Flight::default());
            flights.insert(key.clone(), Arc::clone(&flight));
            keys.push((key, flight));
            owned.push(item);
        }

        Claimed {
            claim: FlightClaim {
                registry: Arc::clone(self),
                keys,
            },
            owned,
            waiting,
        }
    }

    #[cfg(test)]
    fn in_flight(&self) -> usize {
        self.flights
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }
}

/// Ownership of a set of in-flight keys. Dropping it lands the flights.
pub(crate) struct FlightClaim {
    registry: Arc<FlightRegistry>,
    keys: Vec<(String, Arc<Flight>)>,
}

impl Drop for FlightClaim {
    fn drop(&mut self) {
        if self.keys.is_empty() {
            return;
        }
        let mut flights = self
            .registry
            .flights
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        for (key, flight) in self.keys.drain(..) {
            if flights.get(&key).is_some_and(|f| Arc::ptr_eq(f, &flight)) {
                flights.remove(&key);
            }
            flight.land();
        }
    }
}
