//! The application root.
//!
//! An [`App`] owns the root [`Context`], the update [`Scheduler`], and the
//! mounted component tree. Output is committed at mount and on each
//! [`tick`](App::tick); reactive mutations in between are not visible in
//! [`html`](App::html) until the next tick.
//!
//! # Example
//!
//! ```
//! use reborn_reactive::Observable;
//! use reborn_runtime::{App, Component, View};
//!
//! let count = Observable::new(0);
//! let c = count.clone();
//! let counter = Component::new("Counter", move |_| {
//!     let c = c.clone();
//!     Ok(View::text(move || format!("count: {}", c.get())))
//! });
//!
//! let app = App::new();
//! app.mount(&counter).unwrap();
//! assert_eq!(app.html(), "count: 0");
//!
//! count.set(1);
//! assert_eq!(app.html(), "count: 0");
//! app.tick().unwrap();
//! assert_eq!(app.html(), "count: 1");
//! ```

use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

use reborn_reactive::Scheduler;

use crate::component::{Component, ComponentInstance};
use crate::config::AppConfig;
use crate::context::Context;
use crate::error::{Result, RuntimeError};
use crate::view::{self, Node, View};

type Hook = Box<dyn FnOnce()>;
type RecurringHook = Rc<dyn Fn()>;

/// An application root.
pub struct App {
    config: AppConfig,
    context: Context,
    scheduler: Scheduler,
    root: RefCell<Option<Node>>,
    committed: RefCell<String>,
    unmount_hooks: RefCell<Vec<Hook>>,
    recurring_unmount_hooks: RefCell<Vec<RecurringHook>>,
}

impl fmt::Debug for App {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("App")
            .field("label", &self.config.label)
            .field("mounted", &self.is_mounted())
            .field("context", &self.context.id())
            .field("scheduler", &self.scheduler)
            .finish_non_exhaustive()
    }
}

impl Default for App {
    fn default() -> Self {
        Self::new()
    }
}

impl App {
    #[must_use]
    pub fn new() -> Self {
        Self::with_config(AppConfig::default())
    }

    #[must_use]
    pub fn with_config(config: AppConfig) -> Self {
        let scheduler = Scheduler::new(config.scheduler);
        Self {
            config,
            context: Context::root(),
            scheduler,
            root: RefCell::new(None),
            committed: RefCell::new(String::new()),
            unmount_hooks: RefCell::new(Vec::new()),
            recurring_unmount_hooks: RefCell::new(Vec::new()),
        }
    }

    #[must_use]
    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    #[must_use]
    pub fn label(&self) -> &str {
        &self.config.label
    }

    /// The root of the context chain every component descends from.
    #[must_use]
    pub fn context(&self) -> &Context {
        &self.context
    }

    #[must_use]
    pub fn scheduler(&self) -> &Scheduler {
        &self.scheduler
    }

    /// Provide a value to every component in this application.
    pub fn provide<T: Clone + 'static>(&self, value: T) -> Option<T> {
        self.context.provide(value)
    }

    #[must_use]
    pub fn is_mounted(&self) -> bool {
        self.root.borrow().is_some()
    }

    /// Mount `root` and commit its initial output.
    ///
    /// # Errors
    ///
    /// [`RuntimeError::AlreadyMounted`] if a tree is mounted; otherwise any
    /// setup failure in the tree, after the partially mounted tree has been
    /// torn down.
    pub fn mount(&self, root: &Component) -> Result<()> {
        if self.is_mounted() {
            return Err(RuntimeError::AlreadyMounted {
                label: self.config.label.clone(),
            });
        }
        let node = view::mount(&View::component(root), &self.context, &self.scheduler)?;
        *self.committed.borrow_mut() = view::render(&node);
        *self.root.borrow_mut() = Some(node);
        tracing::debug!(app = %self.config.label, root = root.name(), "application mounted");
        Ok(())
    }

    /// Run one update cycle: queued jobs, branch reconciliation, commit.
    ///
    /// Returns the number of queued jobs that ran.
    ///
    /// # Errors
    ///
    /// [`RuntimeError::NotMounted`] without a mounted tree, a scheduler
    /// overflow, or a setup failure of a newly shown branch.
    pub fn tick(&self) -> Result<usize> {
        if !self.is_mounted() {
            return Err(RuntimeError::NotMounted {
                label: self.config.label.clone(),
            });
        }
        let jobs = self.scheduler.flush()?;

        let mut root = self.root.borrow_mut();
        if let Some(node) = root.as_mut() {
            view::reconcile(node, &self.context, &self.scheduler)?;
            *self.committed.borrow_mut() = view::render(node);
        }
        tracing::trace!(app = %self.config.label, jobs, "tick");
        Ok(jobs)
    }

    /// Output committed by the last mount or tick.
    #[must_use]
    pub fn html(&self) -> String {
        self.committed.borrow().clone()
    }

    /// Queue `job` for the next tick.
    pub fn next_tick(&self, job: impl FnOnce() + 'static) {
        self.scheduler.next_tick(job);
    }

    /// Run `hook` once, after the next unmount of the tree.
    pub fn on_unmount(&self, hook: impl FnOnce() + 'static) {
        self.unmount_hooks.borrow_mut().push(Box::new(hook));
    }

    /// Run `hook` after every unmount of the tree, across remounts.
    ///
    /// Recurring hooks run after the one-shot [`on_unmount`](Self::on_unmount)
    /// hooks, in registration order.
    pub fn on_each_unmount(&self, hook: impl Fn() + 'static) {
        self.recurring_unmount_hooks.borrow_mut().push(Rc::new(hook));
    }

    /// Tear down the whole tree, then run the application's unmount hooks.
    ///
    /// # Errors
    ///
    /// [`RuntimeError::NotMounted`] if nothing is mounted.
    pub fn unmount(&self) -> Result<()> {
        let Some(node) = self.root.borrow_mut().take() else {
            return Err(RuntimeError::NotMounted {
                label: self.config.label.clone(),
            });
        };
        view::unmount(node);
        self.committed.borrow_mut().clear();

        let hooks = std::mem::take(&mut *self.unmount_hooks.borrow_mut());
        for hook in hooks {
            hook();
        }
        let recurring: Vec<RecurringHook> = self.recurring_unmount_hooks.borrow().clone();
        for hook in recurring {
            hook();
        }
        tracing::debug!(app = %self.config.label, "application unmounted");
        Ok(())
    }

    /// First mounted component with the given name, depth-first.
    #[must_use]
    pub fn find_component(&self, name: &str) -> Option<Rc<ComponentInstance>> {
        self.root.borrow().as_ref().and_then(|node| view::find(node, name))
    }

    /// Number of mounted component instances.
    #[must_use]
    pub fn mounted_components(&self) -> usize {
        self.root.borrow().as_ref().map_or(0, view::count)
    }
}
