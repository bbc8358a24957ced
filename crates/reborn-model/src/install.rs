//! Binding a [`Store`] to an application root.

use reborn_runtime::App;

use crate::store::{Store, StoreConfig};

impl Store {
    /// Make this store the one every component of `app` resolves.
    ///
    /// Installing again, this store or another, replaces the previous
    /// association. With [`StoreConfig::dispose_on_unmount`] set, the store
    /// force-disposes whatever is still live every time `app` unmounts.
    pub fn install(&self, app: &App) {
        if let Some(previous) = app.provide(self.clone()) {
            tracing::debug!(
                app = app.label(),
                previous = previous.label(),
                store = self.label(),
                "replacing installed store"
            );
        }
        if self.config().dispose_on_unmount {
            let store = self.clone();
            app.on_each_unmount(move || {
                store.dispose_all();
            });
        }
        tracing::debug!(app = app.label(), store = self.label(), "store installed");
    }
}

/// A store with the default configuration.
#[must_use]
pub fn create_store() -> Store {
    Store::with_config(StoreConfig::default())
}

/// The store currently installed on `app`, if any.
#[must_use]
pub fn store_of(app: &App) -> Option<Store> {
    app.context().inject::<Store>()
}

/// Method-call form of [`store_of`].
pub trait AppStoreExt {
    fn store(&self) -> Option<Store>;
}

impl AppStoreExt for App {
    fn store(&self) -> Option<Store> {
        store_of(self)
    }
}
