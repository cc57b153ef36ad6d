//! Path-keyed memoization of whole imports.
//!
//! Every path is imported at most once at a time: concurrent requests share one
//! [`ImportFuture`], and a finished model is kept until it is invalidated. Imports run on a
//! [`TaskPool`] worker; the registry lock only guards the slot map, never the import.

use crate::importer::import_model;
use crate::model::ModelData;
use crate::settings::ImportSettings;
use crate::source::SceneImporter;
use crate::ImportError;
use futures::future::{self, AbortHandle, Aborted, BoxFuture, FutureExt, Shared};
use rfw_utils::log;
use rfw_utils::task::{Finish, TaskPool};
use std::collections::HashMap;
use std::fmt::{Debug, Formatter};
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

pub type ImportResult = Result<Arc<ModelData>, ImportError>;

/// Resolves once the import finishes. Clones share the same underlying import.
pub type ImportFuture = Shared<BoxFuture<'static, ImportResult>>;

enum Slot {
    Ready(Arc<ModelData>),
    Pending {
        ticket: u64,
        future: ImportFuture,
        cancel: Arc<AtomicBool>,
        abort: AbortHandle,
    },
}

impl Slot {
    fn ticket(&self) -> Option<u64> {
        match self {
            Slot::Ready(_) => None,
            Slot::Pending { ticket, .. } => Some(*ticket),
        }
    }
}

#[derive(Default)]
struct Registry {
    slots: HashMap<PathBuf, Slot>,
    next_ticket: u64,
}

impl Registry {
    /// Removes the slot for `key` if it still belongs to the import with `ticket`.
    fn release(&mut self, key: &Path, ticket: u64) -> bool {
        if self.slots.get(key).and_then(Slot::ticket) == Some(ticket) {
            self.slots.remove(key);
            true
        } else {
            false
        }
    }
}

/// Clears a pending slot if the worker unwinds before publishing.
struct PendingGuard {
    registry: Arc<Mutex<Registry>>,
    key: PathBuf,
    ticket: u64,
    armed: bool,
}

impl PendingGuard {
    /// Publishes a successful result or releases the slot on failure. Results of imports
    /// that were cancelled or invalidated meanwhile are not stored.
    fn complete(mut self, result: &ImportResult) {
        self.armed = false;

        let mut registry = match self.registry.lock() {
            Ok(registry) => registry,
            Err(_) => return,
        };

        match result {
            Ok(model) => {
                if registry.slots.get(&self.key).and_then(Slot::ticket) == Some(self.ticket) {
                    registry
                        .slots
                        .insert(self.key.clone(), Slot::Ready(model.clone()));
                    log::debug!("cached {}", self.key.display());
                }
            }
            Err(_) => {
                registry.release(&self.key, self.ticket);
            }
        }
    }
}

impl Drop for PendingGuard {
    fn drop(&mut self) {
        if !self.armed {
            return;
        }

        if let Ok(mut registry) = self.registry.lock() {
            registry.release(&self.key, self.ticket);
        }
    }
}

fn panic_message(payload: Box<dyn std::any::Any + Send>) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        String::from("importer panicked")
    }
}

fn run_import(
    importer: &dyn SceneImporter,
    path: &Path,
    settings: &ImportSettings,
    cancel: &AtomicBool,
) -> Result<ModelData, ImportError> {
    if cancel.load(Ordering::Acquire) {
        return Err(ImportError::Cancelled);
    }

    catch_unwind(AssertUnwindSafe(|| {
        let scene = importer.import(path)?;
        import_model(&scene, path, settings, cancel)
    }))
    .unwrap_or_else(|payload| Err(ImportError::Importer(panic_message(payload))))
}

fn cache_key(path: &Path) -> PathBuf {
    std::fs::canonicalize(path).unwrap_or_else(|_| path.to_path_buf())
}

fn resolved(result: ImportResult) -> ImportFuture {
    future::ready(result).boxed().shared()
}

/// Deduplicating, cancellable cache of imported models.
pub struct AssetCache {
    importer: Arc<dyn SceneImporter>,
    settings: ImportSettings,
    pool: TaskPool,
    registry: Arc<Mutex<Registry>>,
}

impl Debug for AssetCache {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AssetCache")
            .field("importer", &self.importer.to_string())
            .field("settings", &self.settings)
            .field("models", &self.len())
            .finish()
    }
}

impl AssetCache {
    pub fn new(importer: Arc<dyn SceneImporter>, settings: ImportSettings) -> Self {
        Self::with_pool(importer, settings, TaskPool::default())
    }

    pub fn with_pool(
        importer: Arc<dyn SceneImporter>,
        settings: ImportSettings,
        pool: TaskPool,
    ) -> Self {
        Self {
            importer,
            settings,
            pool,
            registry: Arc::new(Mutex::new(Registry::default())),
        }
    }

    pub fn settings(&self) -> &ImportSettings {
        &self.settings
    }

    /// Returns the cached model for `path` or joins/starts its import.
    ///
    /// Concurrent calls for the same path before the import finishes share a single import.
    pub fn get_or_import<P: AsRef<Path>>(&self, path: P) -> ImportFuture {
        let key = cache_key(path.as_ref());

        let mut registry = match self.registry.lock() {
            Ok(registry) => registry,
            Err(e) => return resolved(Err(e.into())),
        };

        match registry.slots.get(&key) {
            Some(Slot::Ready(model)) => {
                log::debug!("cache hit for {}", key.display());
                return resolved(Ok(model.clone()));
            }
            Some(Slot::Pending { future, .. }) => return future.clone(),
            None => {}
        }

        let ticket = registry.next_ticket;
        registry.next_ticket += 1;
        let cancel = Arc::new(AtomicBool::new(false));

        log::info!("importing {} with {}", key.display(), self.importer);

        // Enqueued while the lock is held, so the worker cannot publish before the slot exists.
        let signal = {
            let importer = self.importer.clone();
            let settings = self.settings;
            let registry = self.registry.clone();
            let cancel = cancel.clone();
            let key = key.clone();

            self.pool.push(move |finish: Finish<ImportResult>| {
                let guard = PendingGuard {
                    registry,
                    key: key.clone(),
                    ticket,
                    armed: true,
                };

                let result =
                    run_import(importer.as_ref(), &key, &settings, &cancel).map(Arc::new);
                if let Err(e) = &result {
                    log::warn!("import of {} failed: {}", key.display(), e);
                }

                guard.complete(&result);
                finish.send(result);
            })
        };

        let (signal, abort) = future::abortable(signal);
        let future: ImportFuture = signal
            .map(|result| match result {
                Ok(Some(result)) => result,
                Ok(None) => Err(ImportError::Importer(String::from(
                    "import worker stopped before finishing",
                ))),
                Err(Aborted) => Err(ImportError::Cancelled),
            })
            .boxed()
            .shared();

        registry.slots.insert(
            key,
            Slot::Pending {
                ticket,
                future: future.clone(),
                cancel,
                abort,
            },
        );

        future
    }

    /// Blocking variant of [`AssetCache::get_or_import`].
    pub fn get_or_import_blocking<P: AsRef<Path>>(&self, path: P) -> ImportResult {
        futures::executor::block_on(self.get_or_import(path))
    }

    /// The cached model for `path`, without starting an import.
    pub fn get<P: AsRef<Path>>(&self, path: P) -> Option<Arc<ModelData>> {
        let key = cache_key(path.as_ref());
        let registry = self.registry.lock().ok()?;
        match registry.slots.get(&key) {
            Some(Slot::Ready(model)) => Some(model.clone()),
            _ => None,
        }
    }

    /// Cancels an in-flight import. Every waiter receives [`ImportError::Cancelled`] and
    /// nothing is cached. Returns false if no import was pending for `path`.
    pub fn cancel<P: AsRef<Path>>(&self, path: P) -> bool {
        let key = cache_key(path.as_ref());
        let mut registry = match self.registry.lock() {
            Ok(registry) => registry,
            Err(_) => return false,
        };

        if !matches!(registry.slots.get(&key), Some(Slot::Pending { .. })) {
            return false;
        }

        if let Some(Slot::Pending { cancel, abort, .. }) = registry.slots.remove(&key) {
            cancel.store(true, Ordering::Release);
            abort.abort();
            log::info!("cancelled import of {}", key.display());
        }

        true
    }

    /// Forgets `path`. A pending import still completes for its waiters but is not cached.
    pub fn invalidate<P: AsRef<Path>>(&self, path: P) -> bool {
        let key = cache_key(path.as_ref());
        match self.registry.lock() {
            Ok(mut registry) => registry.slots.remove(&key).is_some(),
            Err(_) => false,
        }
    }

    pub fn invalidate_all(&self) {
        if let Ok(mut registry) = self.registry.lock() {
            registry.slots.clear();
        }
    }

    /// Whether a finished model is cached for `path`.
    pub fn contains<P: AsRef<Path>>(&self, path: P) -> bool {
        self.get(path).is_some()
    }

    pub fn is_pending<P: AsRef<Path>>(&self, path: P) -> bool {
        let key = cache_key(path.as_ref());
        match self.registry.lock() {
            Ok(registry) => matches!(registry.slots.get(&key), Some(Slot::Pending { .. })),
            Err(_) => false,
        }
    }

    /// Number of finished models held by the cache.
    pub fn len(&self) -> usize {
        match self.registry.lock() {
            Ok(registry) => registry
                .slots
                .values()
                .filter(|s| matches!(s, Slot::Ready(_)))
                .count(),
            Err(_) => 0,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
