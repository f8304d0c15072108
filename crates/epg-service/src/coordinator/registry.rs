use std::collections::HashMap;
use std::fmt;
use std::hash::Hash;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use futures::channel::oneshot;
use futures::future::{FutureExt, Shared};

use crate::utils::futures::CallOnDrop;

type CompletionChannel<T> = Shared<oneshot::Receiver<T>>;
type FlightMap<K, T> = Arc<Mutex<HashMap<K, CompletionChannel<T>>>>;

/// Tracks the keys that currently have a computation in flight.
///
/// Every in-flight key has exactly one [`OwnerTicket`]. Everyone else interested in the key gets
/// a clone of its [`Completion`], which resolves once the owner completes (or drops) the ticket.
/// Notification is per key, so completing one key never wakes callers waiting on another.
pub struct InFlightRegistry<K, T> {
    flights: FlightMap<K, T>,
}

impl<K, T> Clone for InFlightRegistry<K, T> {
    fn clone(&self) -> Self {
        Self {
            flights: Arc::clone(&self.flights),
        }
    }
}

impl<K, T> Default for InFlightRegistry<K, T> {
    fn default() -> Self {
        Self {
            flights: Default::default(),
        }
    }
}

impl<K, T> fmt::Debug for InFlightRegistry<K, T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let in_flight = self.flights.try_lock().map(|f| f.len()).unwrap_or_default();
        f.debug_struct("InFlightRegistry")
            .field("in_flight", &in_flight)
            .finish()
    }
}

/// The result of [`InFlightRegistry::enter`].
pub enum Flight<T: Clone> {
    /// The key was not in flight, the caller is now responsible for completing it.
    Owner {
        ticket: OwnerTicket<T>,
        completion: Completion<T>,
    },
    /// The key was already in flight, the caller can wait for its completion.
    Follower(Completion<T>),
}

impl<K, T> InFlightRegistry<K, T>
where
    K: Eq + Hash + Clone + Send + 'static,
    T: Clone + Send + Sync + 'static,
{
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<K, CompletionChannel<T>>> {
        // A panic while holding the lock cannot leave the map half-updated.
        self.flights.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Atomically checks whether `key` is in flight and registers it if it is not.
    pub fn enter(&self, key: K) -> Flight<T> {
        let mut flights = self.lock();
        if let Some(channel) = flights.get(&key) {
            return Flight::Follower(Completion(channel.clone()));
        }

        let (sender, receiver) = oneshot::channel();
        let channel = receiver.shared();

        let release = {
            let flights = Arc::clone(&self.flights);
            let key = key.clone();
            CallOnDrop::new(move || {
                flights
                    .lock()
                    .unwrap_or_else(PoisonError::into_inner)
                    .remove(&key);
            })
        };

        let evicted = flights.insert(key, channel.clone());
        debug_assert!(evicted.is_none());

        Flight::Owner {
            ticket: OwnerTicket { release, sender },
            completion: Completion(channel),
        }
    }

    /// Returns `true` if `key` is currently in flight.
    pub fn contains(&self, key: &K) -> bool {
        self.lock().contains_key(key)
    }

    /// The number of keys currently in flight.
    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }
}

/// Proof of ownership of an in-flight key.
///
/// Completing the ticket removes the key from the registry and then wakes all waiters.
/// Dropping the ticket without completing it removes the key as well, and the waiters observe
/// an abandoned flight.
pub struct OwnerTicket<T> {
    // Fields drop in declaration order: the key must be gone before the sender wakes anyone.
    release: CallOnDrop,
    sender: oneshot::Sender<T>,
}

impl<T> OwnerTicket<T> {
    /// Finishes the flight with `value`.
    pub fn complete(self, value: T) {
        let Self { release, sender } = self;
        // Evict from the map before waking anyone. This ensures that callers either
        // get a channel that will receive data, or they create a new channel.
        drop(release);
        sender.send(value).ok();
    }
}

impl<T> fmt::Debug for OwnerTicket<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OwnerTicket").finish_non_exhaustive()
    }
}

/// Resolves once the flight for a key has completed.
#[derive(Clone)]
pub struct Completion<T: Clone>(CompletionChannel<T>);

impl<T: Clone> Completion<T> {
    /// Waits for the owner to complete the flight.
    ///
    /// Returns `None` if the owner dropped its ticket without completing it.
    pub async fn wait(self) -> Option<T> {
        self.0.await.ok()
    }
}

impl<T: Clone> fmt::Debug for Completion<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Completion").finish()
    }
}
