//! Asset trait and shared handles

use std::fmt;
use std::sync::{Arc, Condvar, Mutex, PoisonError};
use std::time::Duration;

use super::AssetError;

/// Something the loader can build from file bytes.
///
/// `parse` runs on a worker thread.
pub trait Asset: Send + Sync + Sized + 'static {
    /// Class name, half of the cache key
    const CLASS: &'static str;

    /// Build the asset from the bytes of `name`
    fn parse(name: &str, bytes: &[u8]) -> Result<Self, AssetError>;

    /// Placeholder used when the file does not exist. `None` makes a
    /// missing file an error.
    fn file_missing(_name: &str) -> Option<Self> {
        None
    }
}

type Outcome<T> = Result<Arc<T>, AssetError>;

pub(crate) struct Slot<T> {
    name: String,
    state: Mutex<Option<Outcome<T>>>,
    ready: Condvar,
}

/// Shared view of an asset that may still be loading.
///
/// Clones point at the same slot. The loader cache only holds weak
/// references, so the asset is dropped with its last handle.
pub struct AssetHandle<T> {
    slot: Arc<Slot<T>>,
}

impl<T> Clone for AssetHandle<T> {
    fn clone(&self) -> Self {
        Self {
            slot: Arc::clone(&self.slot),
        }
    }
}

impl<T: Asset> AssetHandle<T> {
    pub(crate) fn pending(name: &str) -> Self {
        Self {
            slot: Arc::new(Slot {
                name: name.to_owned(),
                state: Mutex::new(None),
                ready: Condvar::new(),
            }),
        }
    }

    /// Handle that is loaded already
    pub fn ready(name: &str, value: T) -> Self {
        let handle = Self::pending(name);
        handle.resolve(Ok(Arc::new(value)), || {});
        handle
    }

    pub(crate) fn from_slot(slot: Arc<Slot<T>>) -> Self {
        Self { slot }
    }

    pub(crate) fn slot(&self) -> Arc<Slot<T>> {
        Arc::clone(&self.slot)
    }

    /// File name
    pub fn name(&self) -> &str {
        &self.slot.name
    }

    /// Class name
    pub const fn class(&self) -> &'static str {
        T::CLASS
    }

    /// Whether loading finished, successfully or not
    pub fn is_loaded(&self) -> bool {
        self.slot
            .state
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .is_some()
    }

    /// The outcome if loading finished, without blocking
    pub fn get(&self) -> Option<Result<Arc<T>, AssetError>> {
        self.slot
            .state
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Block until loading finishes, or until `timeout` elapses.
    ///
    /// Parse failures are returned here.
    pub fn wait(&self, timeout: Option<Duration>) -> Result<Arc<T>, AssetError> {
        let guard = self.slot.state.lock().unwrap_or_else(PoisonError::into_inner);
        let guard = match timeout {
            None => self
                .slot
                .ready
                .wait_while(guard, |state| state.is_none())
                .unwrap_or_else(PoisonError::into_inner),
            Some(timeout) => {
                let (guard, result) = self
                    .slot
                    .ready
                    .wait_timeout_while(guard, timeout, |state| state.is_none())
                    .unwrap_or_else(PoisonError::into_inner);
                if result.timed_out() && guard.is_none() {
                    return Err(AssetError::Timeout(self.slot.name.clone()));
                }
                guard
            }
        };
        guard
            .clone()
            .unwrap_or_else(|| Err(AssetError::Timeout(self.slot.name.clone())))
    }

    /// Whether two handles share a slot
    pub fn ptr_eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.slot, &other.slot)
    }

    /// Store the outcome. `notify` runs before waiters wake up.
    pub(crate) fn resolve(&self, outcome: Outcome<T>, notify: impl FnOnce()) {
        let mut state = self.slot.state.lock().unwrap_or_else(PoisonError::into_inner);
        *state = Some(outcome);
        notify();
        self.slot.ready.notify_all();
    }
}

impl<T> fmt::Debug for AssetHandle<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let loaded = self
            .slot
            .state
            .try_lock()
            .map(|state| state.is_some())
            .unwrap_or(false);
        f.debug_struct("AssetHandle")
            .field("name", &self.slot.name)
            .field("loaded", &loaded)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Blob(Vec<u8>);

    impl Asset for Blob {
        const CLASS: &'static str = "Blob";

        fn parse(_name: &str, bytes: &[u8]) -> Result<Self, AssetError> {
            Ok(Self(bytes.to_vec()))
        }
    }

    #[test]
    fn test_ready_handle() {
        let handle = AssetHandle::ready("a", Blob(vec![1, 2]));
        assert!(handle.is_loaded());
        assert_eq!(handle.class(), "Blob");
        assert_eq!(handle.wait(None).map(|b| b.0.clone()), Ok(vec![1, 2]));
    }

    #[test]
    fn test_wait_times_out() {
        let handle = AssetHandle::<Blob>::pending("slow");
        assert!(!handle.is_loaded());
        assert_eq!(
            handle.wait(Some(Duration::from_millis(10))).err(),
            Some(AssetError::Timeout("slow".into()))
        );
    }

    #[test]
    fn test_wait_wakes_on_resolve() {
        let handle = AssetHandle::<Blob>::pending("later");
        let remote = handle.clone();
        let worker = std::thread::spawn(move || {
            remote.resolve(Err(AssetError::InvalidData("bad".into())), || {});
        });
        assert_eq!(
            handle.wait(Some(Duration::from_secs(5))).err(),
            Some(AssetError::InvalidData("bad".into()))
        );
        worker.join().expect("worker finished");
        assert!(handle.get().is_some());
    }
}
