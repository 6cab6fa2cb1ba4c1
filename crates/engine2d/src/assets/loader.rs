//! Background asset loader
//!
//! Reads and parses happen on the engine worker pool. Completions cross back
//! through a channel that [`AssetLoader::poll`] drains on the main thread,
//! turning each into a deferred `AssetLoaded` event.

use std::any::Any;
use std::collections::hash_map::Entry;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError, Weak};

use crossbeam_channel::{unbounded, Receiver, Sender};
use log::{debug, error, trace, warn};

use crate::engine::jobs::WorkerPool;
use crate::events::{EventBus, EventData};

use super::handle::{Asset, AssetHandle, Slot};
use super::vfs::Vfs;
use super::AssetError;

type CacheKey = (&'static str, String);
type Completion = Box<dyn FnOnce(&Result<Vec<u8>, AssetError>) + Send>;
type InFlight = Arc<Mutex<HashMap<String, Vec<Completion>>>>;

struct Finished {
    class: &'static str,
    name: String,
    error: Option<AssetError>,
}

/// Name-addressed asset cache backed by a [`Vfs`]
pub struct AssetLoader {
    vfs: Arc<dyn Vfs>,
    pool: Arc<WorkerPool>,
    cache: HashMap<CacheKey, Weak<dyn Any + Send + Sync>>,
    in_flight: InFlight,
    done_tx: Sender<Finished>,
    done_rx: Receiver<Finished>,
    queued: usize,
    loaded: usize,
    failed: usize,
}

impl AssetLoader {
    /// Loader reading from `vfs` on `pool`
    pub fn new(vfs: Arc<dyn Vfs>, pool: Arc<WorkerPool>) -> Self {
        let (done_tx, done_rx) = unbounded();
        Self {
            vfs,
            pool,
            cache: HashMap::new(),
            in_flight: Arc::new(Mutex::new(HashMap::new())),
            done_tx,
            done_rx,
            queued: 0,
            loaded: 0,
            failed: 0,
        }
    }

    /// Handle to `name` as a `T`.
    ///
    /// While a handle for the same class and name is alive it is returned
    /// again. Concurrent loads of one file share a single read.
    pub fn load<T: Asset>(&mut self, name: &str) -> AssetHandle<T> {
        if let Some(handle) = self.cached::<T>(name) {
            trace!("{}:{name} served from cache", T::CLASS);
            return handle;
        }

        let handle = AssetHandle::<T>::pending(name);
        let slot: Arc<dyn Any + Send + Sync> = handle.slot();
        self.cache.insert((T::CLASS, name.to_owned()), Arc::downgrade(&slot));
        self.queued += 1;

        let completion = Self::completion(handle.clone(), self.done_tx.clone());
        let first = {
            let mut in_flight = self.in_flight.lock().unwrap_or_else(PoisonError::into_inner);
            match in_flight.entry(name.to_owned()) {
                Entry::Occupied(mut waiting) => {
                    trace!("{}:{name} joins a read in progress", T::CLASS);
                    waiting.get_mut().push(completion);
                    false
                }
                Entry::Vacant(slot) => {
                    slot.insert(vec![completion]);
                    true
                }
            }
        };
        if first {
            self.fetch(name);
        }
        handle
    }

    /// Put an already built asset in the cache
    pub fn preload<T: Asset>(&mut self, name: &str, value: T) -> AssetHandle<T> {
        let handle = AssetHandle::ready(name, value);
        let slot: Arc<dyn Any + Send + Sync> = handle.slot();
        self.cache.insert((T::CLASS, name.to_owned()), Arc::downgrade(&slot));
        handle
    }

    /// Whether a live handle exists for `name` as a `T`
    pub fn is_cached<T: Asset>(&self, name: &str) -> bool {
        self.cached::<T>(name).is_some()
    }

    /// `(loaded, failed, queued)` totals
    pub const fn stats(&self) -> (usize, usize, usize) {
        (self.loaded, self.failed, self.queued)
    }

    /// Loads not finished yet
    pub const fn outstanding(&self) -> usize {
        self.queued - self.loaded - self.failed
    }

    /// Turn finished loads into deferred `AssetLoaded` events. Returns how
    /// many loads finished since the last call.
    pub fn poll(&mut self, bus: &mut EventBus) -> usize {
        let finished: Vec<Finished> = self.done_rx.try_iter().collect();
        for done in &finished {
            match &done.error {
                None => {
                    self.loaded += 1;
                    debug!("loaded {}:{}", done.class, done.name);
                    bus.dispatch(
                        EventData::AssetLoaded {
                            class: done.class,
                            name: done.name.clone(),
                            loaded: self.loaded,
                            queued: self.outstanding(),
                        },
                        false,
                    );
                }
                Some(err) => {
                    self.failed += 1;
                    warn!("failed to load {}:{}: {err}", done.class, done.name);
                }
            }
        }
        self.cache.retain(|_, weak| weak.strong_count() > 0);
        finished.len()
    }

    fn cached<T: Asset>(&self, name: &str) -> Option<AssetHandle<T>> {
        let key = (T::CLASS, name.to_owned());
        let slot = self.cache.get(&key)?.upgrade()?;
        slot.downcast::<Slot<T>>().ok().map(AssetHandle::from_slot)
    }

    fn completion<T: Asset>(handle: AssetHandle<T>, done: Sender<Finished>) -> Completion {
        Box::new(move |bytes: &Result<Vec<u8>, AssetError>| {
            let name = handle.name().to_owned();
            let outcome = match bytes {
                Ok(bytes) => T::parse(&name, bytes),
                Err(AssetError::NotFound(missing)) => {
                    T::file_missing(&name).ok_or_else(|| AssetError::NotFound(missing.clone()))
                }
                Err(err) => Err(err.clone()),
            };
            let error = outcome.as_ref().err().cloned();
            handle.resolve(outcome.map(Arc::new), || {
                // The receiver lives as long as the loader; a closed channel
                // only means the engine is shutting down.
                let _ = done.send(Finished {
                    class: T::CLASS,
                    name,
                    error,
                });
            });
        })
    }

    fn fetch(&self, name: &str) {
        let vfs = Arc::clone(&self.vfs);
        let in_flight = Arc::clone(&self.in_flight);
        let file = name.to_owned();
        let job = move || {
            let bytes = vfs.read(&file);
            let waiting = in_flight
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .remove(&file)
                .unwrap_or_default();
            for completion in waiting {
                completion(&bytes);
            }
        };
        if let Err(err) = self.pool.execute(job) {
            error!("cannot schedule read of '{name}': {err}");
            let waiting = self
                .in_flight
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .remove(name)
                .unwrap_or_default();
            let failure = Err(AssetError::LoadFailed(err.to_string()));
            for completion in waiting {
                completion(&failure);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::assets::kinds::{ImageAsset, SoundAsset, TextAsset};
    use crate::assets::vfs::MemoryVfs;
    use crate::events::EventKind;
    use crossbeam_channel::bounded;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    const TIMEOUT: Option<Duration> = Some(Duration::from_secs(5));

    fn loader(vfs: impl Vfs + 'static) -> AssetLoader {
        AssetLoader::new(Arc::new(vfs), Arc::new(WorkerPool::new(2)))
    }

    struct GatedVfs {
        inner: MemoryVfs,
        gate: Receiver<()>,
        reads: Arc<AtomicUsize>,
    }

    impl Vfs for GatedVfs {
        fn read(&self, name: &str) -> Result<Vec<u8>, AssetError> {
            self.reads.fetch_add(1, Ordering::SeqCst);
            let _ = self.gate.recv_timeout(Duration::from_secs(5));
            self.inner.read(name)
        }
    }

    #[test]
    fn test_load_and_poll() {
        let mut loader = loader(MemoryVfs::new().with_file("hello.txt", "hi"));
        let handle = loader.load::<TextAsset>("hello.txt");
        assert_eq!(handle.wait(TIMEOUT).map(|t| t.0.clone()), Ok("hi".to_owned()));

        let mut bus = EventBus::new();
        assert_eq!(loader.poll(&mut bus), 1);
        assert_eq!(bus.pending(), (0, 1));
        bus.promote();
        let event = bus.pop().expect("AssetLoaded queued");
        assert_eq!(event.kind(), EventKind::AssetLoaded);
        let EventData::AssetLoaded { class, name, loaded, queued } = event.data else {
            panic!("expected AssetLoaded");
        };
        assert_eq!((class, name.as_str(), loaded, queued), ("Text", "hello.txt", 1, 0));
    }

    #[test]
    fn test_live_handles_are_shared() {
        let mut loader = loader(MemoryVfs::new().with_file("a.txt", "a"));
        let first = loader.load::<TextAsset>("a.txt");
        let second = loader.load::<TextAsset>("a.txt");
        assert!(first.ptr_eq(&second));
        assert_eq!(loader.stats().2, 1);
        assert!(first.wait(TIMEOUT).is_ok());
    }

    #[test]
    fn test_cache_forgets_dropped_assets() {
        let mut loader = loader(MemoryVfs::new());
        let handle = loader.preload("intro", TextAsset("story".into()));
        assert!(loader.is_cached::<TextAsset>("intro"));
        assert!(!loader.is_cached::<SoundAsset>("intro"));
        drop(handle);
        loader.poll(&mut EventBus::new());
        assert!(!loader.is_cached::<TextAsset>("intro"));
    }

    #[test]
    fn test_concurrent_loads_share_one_read() {
        let (open, gate) = bounded(1);
        let reads = Arc::new(AtomicUsize::new(0));
        let mut loader = loader(GatedVfs {
            inner: MemoryVfs::new().with_file("beep", vec![1_u8, 2, 3]),
            gate,
            reads: Arc::clone(&reads),
        });
        let sound = loader.load::<SoundAsset>("beep");
        let text = loader.load::<TextAsset>("beep");
        open.send(()).expect("gate open");

        assert_eq!(sound.wait(TIMEOUT).map(|s| s.0.clone()), Ok(vec![1, 2, 3]));
        assert!(text.wait(TIMEOUT).is_ok());
        assert_eq!(reads.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_missing_files() {
        let mut loader = loader(MemoryVfs::new());
        let image = loader.load::<ImageAsset>("ghost.png");
        assert_eq!(image.wait(TIMEOUT).map(|i| i.width), Ok(64));

        let text = loader.load::<TextAsset>("ghost.txt");
        assert_eq!(text.wait(TIMEOUT).err(), Some(AssetError::NotFound("ghost.txt".into())));

        let mut bus = EventBus::new();
        assert_eq!(loader.poll(&mut bus), 2);
        assert_eq!(loader.stats(), (1, 1, 2));
        assert_eq!(bus.pending(), (0, 1));
    }

    #[test]
    fn test_parse_errors_surface_from_wait() {
        let mut loader = loader(MemoryVfs::new().with_file("bad.txt", vec![0xff_u8]));
        let text = loader.load::<TextAsset>("bad.txt");
        assert!(matches!(text.wait(TIMEOUT), Err(AssetError::InvalidData(_))));
    }

    #[test]
    fn test_preload() {
        let mut loader = loader(MemoryVfs::new());
        let preloaded = loader.preload("intro", TextAsset("story".into()));
        let loaded = loader.load::<TextAsset>("intro");
        assert!(preloaded.ptr_eq(&loaded));
        assert!(loaded.is_loaded());
    }
}
