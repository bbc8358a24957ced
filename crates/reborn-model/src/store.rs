#![forbid(unsafe_code)]

//! The model store: one live instance per model per application root.
//!
//! # State machine
//!
//! For each [`ModelId`] a store is in one of two states:
//!
//! ```text
//!          acquire (factory runs in a new scope, ref_count = 1)
//! ABSENT ─────────────────────────────────────────────────────► ACTIVE
//!    ▲                                                            │  ▲
//!    │  release at ref_count 1 (entry removed, scope disposed)    │  │ acquire / release
//!    └────────────────────────────────────────────────────────────┘  │ (ref_count ± 1)
//!                                                                    └─┘
//! ```
//!
//! # Invariants
//!
//! 1. At most one entry, and therefore one instance, per model.
//! 2. An entry's `ref_count` is at least 1 while it is in the map.
//! 3. The entry is removed, and its scope disposed, in the same `release`
//!    call that takes `ref_count` from 1 to 0.
//! 4. A factory that fails or panics leaves no entry and no live scope.
//! 5. No map borrow is held while user code (factories, scope cleanups) runs.
//!
//! # Failure Modes
//!
//! - **Unbalanced release**: releasing a model with no entry is reported as a
//!   warning and counted in [`StoreStats::unbalanced_releases`]; nothing else
//!   changes.
//! - **Reentrant acquire**: a factory acquiring its own model is not
//!   supported. The store does not panic; the first instance to be inserted
//!   wins and the other is disposed.

use std::any::Any;
use std::cell::{Cell, RefCell};
use std::fmt;
use std::rc::Rc;

use ahash::AHashMap;
use reborn_reactive::{EffectScope, ScopeId};

use crate::error::{ModelError, Result};
use crate::handle::ModelHandle;
use crate::model::{Model, ModelId};

/// Configuration for a [`Store`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoreConfig {
    /// Name used in logs.
    pub label: String,
    /// Force-dispose remaining entries when the application it is installed
    /// on unmounts.
    pub dispose_on_unmount: bool,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            label: "store".to_string(),
            dispose_on_unmount: true,
        }
    }
}

impl StoreConfig {
    #[must_use]
    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = label.into();
        self
    }

    #[must_use]
    pub fn with_dispose_on_unmount(mut self, enabled: bool) -> Self {
        self.dispose_on_unmount = enabled;
        self
    }
}

/// Lifetime counters for a [`Store`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StoreStats {
    /// Instances created by a factory.
    pub created: u64,
    /// Instances disposed (last release or forced).
    pub disposed: u64,
    /// Successful acquisitions, including the creating one.
    pub acquisitions: u64,
    /// Releases that found an entry.
    pub releases: u64,
    /// Releases that found no entry.
    pub unbalanced_releases: u64,
}

impl StoreStats {
    /// Instances currently alive.
    #[must_use]
    pub fn live(&self) -> u64 {
        self.created.saturating_sub(self.disposed)
    }
}

/// What a [`Store::release`] call did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReleaseOutcome {
    /// Other references remain.
    Retained { ref_count: usize },
    /// That was the last reference; the instance is gone.
    Disposed,
    /// The model had no entry in this store.
    NotActive,
}

/// Diagnostic view of one entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntrySnapshot {
    pub model: ModelId,
    pub label: String,
    pub ref_count: usize,
    pub scope: ScopeId,
}

struct Entry {
    label: String,
    instance: Rc<dyn Any>,
    scope: EffectScope,
    ref_count: usize,
}

struct StoreInner {
    config: StoreConfig,
    entries: RefCell<AHashMap<ModelId, Entry>>,
    stats: Cell<StoreStats>,
}

/// Registry of live model instances for one application root.
///
/// Cloning yields another handle to the same store.
#[derive(Clone)]
pub struct Store {
    inner: Rc<StoreInner>,
}

impl fmt::Debug for Store {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Store")
            .field("label", &self.inner.config.label)
            .field("entries", &self.len())
            .field("stats", &self.stats())
            .finish()
    }
}

impl Default for Store {
    fn default() -> Self {
        Self::new()
    }
}

/// Disposes a freshly opened scope unless creation completes.
struct ScopeGuard {
    scope: EffectScope,
    armed: bool,
}

impl ScopeGuard {
    fn open() -> Self {
        Self {
            scope: EffectScope::new(),
            armed: true,
        }
    }

    fn disarm(mut self) -> EffectScope {
        self.armed = false;
        self.scope.clone()
    }
}

impl Drop for ScopeGuard {
    fn drop(&mut self) {
        if self.armed {
            self.scope.dispose();
        }
    }
}

enum ReleaseStep {
    Missing,
    Retained(usize),
    Last(Entry),
}

impl Store {
    #[must_use]
    pub fn new() -> Self {
        Self::with_config(StoreConfig::default())
    }

    #[must_use]
    pub fn with_config(config: StoreConfig) -> Self {
        Self {
            inner: Rc::new(StoreInner {
                config,
                entries: RefCell::new(AHashMap::new()),
                stats: Cell::new(StoreStats::default()),
            }),
        }
    }

    #[must_use]
    pub fn config(&self) -> &StoreConfig {
        &self.inner.config
    }

    #[must_use]
    pub fn label(&self) -> &str {
        &self.inner.config.label
    }

    /// Whether both handles refer to the same store.
    #[must_use]
    pub fn ptr_eq(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.inner, &other.inner)
    }

    fn bump(&self, f: impl FnOnce(&mut StoreStats)) {
        let mut stats = self.inner.stats.get();
        f(&mut stats);
        self.inner.stats.set(stats);
    }

    /// Take a reference to `model`'s instance, creating it if absent.
    ///
    /// Every successful call must be matched by one [`release`](Self::release);
    /// prefer [`acquire_handle`](Self::acquire_handle), which does that on drop.
    ///
    /// # Errors
    ///
    /// [`ModelError::Factory`] if the factory fails; no entry is created.
    pub fn acquire<T: 'static>(&self, model: &Model<T>) -> Result<Rc<T>> {
        self.acquire_entry(model).map(|(instance, _)| instance)
    }

    /// Acquire and report the scope of the entry that was retained, which
    /// identifies this generation of the instance.
    fn acquire_entry<T: 'static>(&self, model: &Model<T>) -> Result<(Rc<T>, ScopeId)> {
        if let Some(retained) = self.retain(model) {
            return Ok(retained);
        }

        let guard = ScopeGuard::open();
        let built = guard.scope.run(|| model.build())?;
        let instance = Rc::new(built.map_err(|source| ModelError::Factory {
            model: model.label(),
            source,
        })?);
        let scope = guard.disarm();

        if let Some(existing) = self.retain(model) {
            tracing::warn!(
                store = %self.label(),
                model = %model.label(),
                "model acquired from inside its own factory; keeping the first instance"
            );
            scope.dispose();
            return Ok(existing);
        }

        let scope_id = scope.id();
        self.inner.entries.borrow_mut().insert(
            model.id(),
            Entry {
                label: model.label(),
                instance: Rc::clone(&instance) as Rc<dyn Any>,
                scope,
                ref_count: 1,
            },
        );
        self.bump(|s| {
            s.created += 1;
            s.acquisitions += 1;
        });
        tracing::debug!(
            store = %self.label(),
            model = %model.label(),
            scope = %scope_id,
            "model instance created"
        );
        Ok((instance, scope_id))
    }

    /// Increment an existing entry and return its instance.
    ///
    /// A `ModelId` is minted by exactly one `Model<T>`, so an entry under
    /// `model.id()` always holds a `T`.
    fn retain<T: 'static>(&self, model: &Model<T>) -> Option<(Rc<T>, ScopeId)> {
        let mut entries = self.inner.entries.borrow_mut();
        let entry = entries.get_mut(&model.id())?;
        let instance = Rc::clone(&entry.instance).downcast::<T>().ok()?;
        entry.ref_count += 1;
        let (ref_count, scope) = (entry.ref_count, entry.scope.id());
        drop(entries);

        self.bump(|s| s.acquisitions += 1);
        tracing::trace!(store = %self.label(), model = %model.label(), ref_count, "model retained");
        Some((instance, scope))
    }

    /// Like [`acquire`](Self::acquire), but the reference is released when
    /// the returned handle is dropped.
    ///
    /// The handle is bound to the entry it acquired: if that entry is
    /// force-disposed and the model is later acquired again, releasing the old
    /// handle does not touch the new entry.
    ///
    /// # Errors
    ///
    /// Same as [`acquire`](Self::acquire).
    pub fn acquire_handle<T: 'static>(&self, model: &Model<T>) -> Result<ModelHandle<T>> {
        let (instance, generation) = self.acquire_entry(model)?;
        Ok(ModelHandle::new(self.clone(), model.id(), generation, instance))
    }

    /// Drop one reference to `model`, disposing the instance on the last one.
    pub fn release(&self, model: ModelId) -> ReleaseOutcome {
        self.release_matching(model, None)
    }

    /// Release on behalf of a handle; only the entry with scope `generation`
    /// is affected.
    pub(crate) fn release_generation(&self, model: ModelId, generation: ScopeId) -> ReleaseOutcome {
        self.release_matching(model, Some(generation))
    }

    fn release_matching(&self, model: ModelId, generation: Option<ScopeId>) -> ReleaseOutcome {
        let step = {
            let mut entries = self.inner.entries.borrow_mut();
            let current = entries
                .get(&model)
                .filter(|entry| generation.is_none_or(|g| entry.scope.id() == g))
                .map(|entry| entry.ref_count);
            match current {
                None => ReleaseStep::Missing,
                Some(count) if count > 1 => {
                    if let Some(entry) = entries.get_mut(&model) {
                        entry.ref_count = count - 1;
                    }
                    ReleaseStep::Retained(count - 1)
                }
                Some(_) => entries
                    .remove(&model)
                    .map_or(ReleaseStep::Missing, ReleaseStep::Last),
            }
        };

        match step {
            ReleaseStep::Missing => {
                self.bump(|s| s.unbalanced_releases += 1);
                tracing::warn!(
                    store = %self.label(),
                    %model,
                    "release of a model with no live instance in this store"
                );
                ReleaseOutcome::NotActive
            }
            ReleaseStep::Retained(ref_count) => {
                self.bump(|s| s.releases += 1);
                tracing::trace!(store = %self.label(), %model, ref_count, "model released");
                ReleaseOutcome::Retained { ref_count }
            }
            ReleaseStep::Last(entry) => {
                self.bump(|s| s.releases += 1);
                self.dispose_entry(model, entry);
                ReleaseOutcome::Disposed
            }
        }
    }

    fn dispose_entry(&self, model: ModelId, entry: Entry) {
        let Entry {
            label,
            instance,
            scope,
            ..
        } = entry;
        scope.dispose();
        drop(instance);
        self.bump(|s| s.disposed += 1);
        tracing::debug!(store = %self.label(), %model, model_label = %label, "model instance disposed");
    }

    /// The live instance of `model`, if any. Does not change reference counts.
    #[must_use]
    pub fn lookup<T: 'static>(&self, model: &Model<T>) -> Option<Rc<T>> {
        let entries = self.inner.entries.borrow();
        let entry = entries.get(&model.id())?;
        Rc::clone(&entry.instance).downcast::<T>().ok()
    }

    /// Current reference count; 0 when absent.
    #[must_use]
    pub fn ref_count(&self, model: ModelId) -> usize {
        self.inner
            .entries
            .borrow()
            .get(&model)
            .map_or(0, |entry| entry.ref_count)
    }

    #[must_use]
    pub fn contains(&self, model: ModelId) -> bool {
        self.inner.entries.borrow().contains_key(&model)
    }

    /// Number of live entries.
    #[must_use]
    pub fn len(&self) -> usize {
        self.inner.entries.borrow().len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.inner.entries.borrow().is_empty()
    }

    /// Snapshot of every live entry, ordered by model id.
    #[must_use]
    pub fn entries(&self) -> Vec<EntrySnapshot> {
        let mut snapshots: Vec<EntrySnapshot> = self
            .inner
            .entries
            .borrow()
            .iter()
            .map(|(model, entry)| EntrySnapshot {
                model: *model,
                label: entry.label.clone(),
                ref_count: entry.ref_count,
                scope: entry.scope.id(),
            })
            .collect();
        snapshots.sort_by_key(|snapshot| snapshot.model);
        snapshots
    }

    #[must_use]
    pub fn stats(&self) -> StoreStats {
        self.inner.stats.get()
    }

    /// Dispose every entry regardless of reference count.
    ///
    /// Returns how many entries were disposed. Handles still held afterwards
    /// report [`ReleaseOutcome::NotActive`] when they release.
    pub fn dispose_all(&self) -> usize {
        let drained: Vec<(ModelId, Entry)> = self.inner.entries.borrow_mut().drain().collect();
        let count = drained.len();
        if count > 0 {
            tracing::warn!(store = %self.label(), count, "force-disposing live model instances");
        }
        for (model, entry) in drained {
            self.dispose_entry(model, entry);
        }
        count
    }
}
