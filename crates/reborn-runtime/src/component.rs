//! Component definitions, mounted instances, and the setup context.
//!
//! A [`Component`] is a named setup function. Mounting one creates a
//! [`ComponentInstance`] with its own child [`Context`] and [`EffectScope`];
//! setup runs inside that scope and returns the [`View`] to mount beneath it.
//!
//! # Lifecycle
//!
//! ```text
//! Setup ──(view mounted)──► Mounted ──(unmount)──► Unmounted
//!   └──────────(setup or child mount fails)──────────┘
//! ```
//!
//! Unmounting runs, in order: `on_unmount` hooks, unmount of the child tree,
//! release of component-local state, disposal of the component scope. A
//! component whose setup fails is torn down the same way, so anything it
//! acquired before failing is released exactly once.

use std::any::{Any, TypeId};
use std::cell::{Cell, RefCell};
use std::fmt;
use std::rc::Rc;
use std::sync::atomic::{AtomicU64, Ordering};

use ahash::AHashMap;
use reborn_reactive::{EffectScope, Scheduler};

use crate::context::Context;
use crate::error::{BoxError, Result, RuntimeError};
use crate::view::{self, Node, View};

static NEXT_COMPONENT_ID: AtomicU64 = AtomicU64::new(1);

/// Unique identifier of a mounted component instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ComponentId(u64);

impl ComponentId {
    #[must_use]
    pub const fn raw(self) -> u64 {
        self.0
    }
}

impl fmt::Display for ComponentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Where a component instance is in its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Lifecycle {
    /// Setup or initial child mount in progress.
    Setup,
    Mounted,
    Unmounted,
}

type SetupFn = dyn Fn(&SetupContext<'_>) -> std::result::Result<View, BoxError>;

/// A reusable component definition.
#[derive(Clone)]
pub struct Component {
    name: Rc<str>,
    setup: Rc<SetupFn>,
}

impl fmt::Debug for Component {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Component")
            .field("name", &self.name)
            .finish_non_exhaustive()
    }
}

impl Component {
    pub fn new(
        name: &str,
        setup: impl Fn(&SetupContext<'_>) -> std::result::Result<View, BoxError> + 'static,
    ) -> Self {
        Self {
            name: Rc::from(name),
            setup: Rc::new(setup),
        }
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }
}

type Hook = Box<dyn FnOnce()>;

/// A mounted component.
pub struct ComponentInstance {
    id: ComponentId,
    name: Rc<str>,
    context: Context,
    scope: EffectScope,
    scheduler: Scheduler,
    lifecycle: Cell<Lifecycle>,
    root: RefCell<Node>,
    state: RefCell<AHashMap<TypeId, Rc<dyn Any>>>,
    mounted_hooks: RefCell<Vec<Hook>>,
    unmount_hooks: RefCell<Vec<Hook>>,
}

impl fmt::Debug for ComponentInstance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ComponentInstance")
            .field("id", &self.id)
            .field("name", &self.name)
            .field("lifecycle", &self.lifecycle.get())
            .field("scope", &self.scope.id())
            .finish_non_exhaustive()
    }
}

impl ComponentInstance {
    #[must_use]
    pub fn id(&self) -> ComponentId {
        self.id
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[must_use]
    pub fn context(&self) -> &Context {
        &self.context
    }

    #[must_use]
    pub fn scope(&self) -> &EffectScope {
        &self.scope
    }

    #[must_use]
    pub fn lifecycle(&self) -> Lifecycle {
        self.lifecycle.get()
    }

    #[must_use]
    pub fn is_mounted(&self) -> bool {
        self.lifecycle.get() == Lifecycle::Mounted
    }

    /// Render this component's subtree from current state.
    ///
    /// Unlike [`App::html`](crate::App::html) this is not the committed
    /// output of the last tick.
    #[must_use]
    pub fn html(&self) -> String {
        view::render(&self.root.borrow())
    }

    /// First mounted descendant (or self) with the given name.
    #[must_use]
    pub fn find(self: &Rc<Self>, name: &str) -> Option<Rc<ComponentInstance>> {
        if *self.name == *name {
            return Some(Rc::clone(self));
        }
        view::find(&self.root.borrow(), name)
    }

    pub(crate) fn count_mounted(&self) -> usize {
        1 + view::count(&self.root.borrow())
    }

    pub(crate) fn reconcile(&self) -> Result<()> {
        view::reconcile(&mut self.root.borrow_mut(), &self.context, &self.scheduler)
    }

    /// Tear the instance down. Idempotent.
    pub(crate) fn unmount(&self) {
        if self.lifecycle.replace(Lifecycle::Unmounted) == Lifecycle::Unmounted {
            return;
        }

        let hooks = std::mem::take(&mut *self.unmount_hooks.borrow_mut());
        for hook in hooks {
            hook();
        }
        self.mounted_hooks.borrow_mut().clear();

        let root = std::mem::replace(&mut *self.root.borrow_mut(), Node::Empty);
        view::unmount(root);

        // Dropped outside the borrow: state values may run arbitrary drops.
        let state = std::mem::take(&mut *self.state.borrow_mut());
        drop(state);

        self.scope.dispose();
        tracing::debug!(component = %self.name, id = %self.id, "component unmounted");
    }
}

/// Mount `component` beneath `parent`.
pub(crate) fn mount(
    component: &Component,
    parent: &Context,
    scheduler: &Scheduler,
) -> Result<Rc<ComponentInstance>> {
    let instance = Rc::new(ComponentInstance {
        id: ComponentId(NEXT_COMPONENT_ID.fetch_add(1, Ordering::Relaxed)),
        name: Rc::clone(&component.name),
        context: parent.child(),
        scope: EffectScope::new(),
        scheduler: scheduler.clone(),
        lifecycle: Cell::new(Lifecycle::Setup),
        root: RefCell::new(Node::Empty),
        state: RefCell::new(AHashMap::new()),
        mounted_hooks: RefCell::new(Vec::new()),
        unmount_hooks: RefCell::new(Vec::new()),
    });

    let setup = Rc::clone(&component.setup);
    let outcome = instance.scope.run(|| {
        setup(&SetupContext {
            instance: &instance,
        })
    });
    let view = match outcome {
        Ok(Ok(view)) => view,
        Ok(Err(source)) => {
            instance.unmount();
            return Err(RuntimeError::Setup {
                component: component.name.to_string(),
                source,
            });
        }
        Err(err) => {
            instance.unmount();
            return Err(err.into());
        }
    };

    match view::mount(&view, &instance.context, scheduler) {
        Ok(node) => *instance.root.borrow_mut() = node,
        Err(err) => {
            instance.unmount();
            return Err(err);
        }
    }

    instance.lifecycle.set(Lifecycle::Mounted);
    let hooks = std::mem::take(&mut *instance.mounted_hooks.borrow_mut());
    for hook in hooks {
        hook();
    }
    tracing::debug!(component = %instance.name, id = %instance.id, "component mounted");
    Ok(instance)
}

/// Handle passed to a component's setup function.
pub struct SetupContext<'a> {
    instance: &'a ComponentInstance,
}

impl SetupContext<'_> {
    #[must_use]
    pub fn id(&self) -> ComponentId {
        self.instance.id
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.instance.name
    }

    /// This component's context (a child of its parent's).
    #[must_use]
    pub fn context(&self) -> &Context {
        &self.instance.context
    }

    /// The scope setup runs in; disposed when the component unmounts.
    #[must_use]
    pub fn scope(&self) -> &EffectScope {
        &self.instance.scope
    }

    #[must_use]
    pub fn scheduler(&self) -> &Scheduler {
        &self.instance.scheduler
    }

    /// Provide a value to this component's descendants.
    pub fn provide<T: Clone + 'static>(&self, value: T) -> Option<T> {
        self.instance.context.provide(value)
    }

    /// Find the nearest provided `T` from this component up to the root.
    #[must_use]
    pub fn inject<T: Clone + 'static>(&self) -> Option<T> {
        self.instance.context.inject()
    }

    /// Run `hook` once, after this component and its children have mounted.
    pub fn on_mounted(&self, hook: impl FnOnce() + 'static) {
        self.instance.mounted_hooks.borrow_mut().push(Box::new(hook));
    }

    /// Run `hook` once, before this component instance is destroyed.
    ///
    /// Also runs if setup fails after the hook was registered.
    pub fn on_unmount(&self, hook: impl FnOnce() + 'static) {
        self.instance.unmount_hooks.borrow_mut().push(Box::new(hook));
    }

    /// Queue `job` for the next update tick.
    pub fn next_tick(&self, job: impl FnOnce() + 'static) {
        self.instance.scheduler.next_tick(job);
    }

    /// Component-local state of type `T`, created with `T::default()` on
    /// first access. Dropped when the component unmounts.
    pub fn state<T: Default + 'static>(&self) -> Rc<T> {
        let mut state = self.instance.state.borrow_mut();
        let slot = state
            .entry(TypeId::of::<T>())
            .or_insert_with(|| Rc::new(T::default()) as Rc<dyn Any>);
        match Rc::clone(slot).downcast::<T>() {
            Ok(value) => value,
            Err(_) => {
                let value = Rc::new(T::default());
                *slot = Rc::clone(&value) as Rc<dyn Any>;
                value
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use reborn_reactive::{Computed, Observable};

    fn text(s: &'static str) -> View {
        View::text(move || s.to_string())
    }

    #[test]
    fn setup_runs_inside_component_scope() {
        let source = Observable::new(1);
        let src = source.clone();
        let component = Component::new("Doubler", move |_| {
            let doubled = Computed::from_observable(&src, |v| v * 2);
            Ok(View::text(move || doubled.get().to_string()))
        });

        let instance = mount(&component, &Context::root(), &Scheduler::default()).unwrap();
        assert_eq!(instance.html(), "2");
        assert_eq!(source.subscriber_count(), 1);

        instance.unmount();
        assert_eq!(source.subscriber_count(), 0);
        assert_eq!(instance.lifecycle(), Lifecycle::Unmounted);
    }

    #[test]
    fn hooks_run_in_lifecycle_order() {
        let log = Rc::new(RefCell::new(Vec::new()));
        let log_in = Rc::clone(&log);
        let component = Component::new("Hooks", move |cx| {
            let (m, u) = (Rc::clone(&log_in), Rc::clone(&log_in));
            cx.on_mounted(move || m.borrow_mut().push("mounted"));
            cx.on_unmount(move || u.borrow_mut().push("unmount"));
            log_in.borrow_mut().push("setup");
            Ok(text("x"))
        });

        let instance = mount(&component, &Context::root(), &Scheduler::default()).unwrap();
        instance.unmount();
        instance.unmount();
        assert_eq!(*log.borrow(), vec!["setup", "mounted", "unmount"]);
    }

    #[test]
    fn failed_setup_runs_unmount_hooks() {
        let released = Rc::new(Cell::new(0u32));
        let released_in = Rc::clone(&released);
        let component = Component::new("Broken", move |cx| {
            let r = Rc::clone(&released_in);
            cx.on_unmount(move || r.set(r.get() + 1));
            Err("boom".into())
        });

        let err = mount(&component, &Context::root(), &Scheduler::default()).unwrap_err();
        assert!(matches!(err, RuntimeError::Setup { ref component, .. } if component == "Broken"));
        assert_eq!(released.get(), 1);
    }

    #[test]
    fn state_is_shared_within_component() {
        #[derive(Default)]
        struct Clicks(Cell<u32>);

        let component = Component::new("Stateful", |cx| {
            cx.state::<Clicks>().0.set(3);
            let again = cx.state::<Clicks>();
            assert_eq!(again.0.get(), 3);
            Ok(View::empty())
        });
        mount(&component, &Context::root(), &Scheduler::default()).unwrap();
    }

    #[test]
    fn state_dropped_on_unmount() {
        struct DropFlag(Rc<Cell<bool>>);
        impl Drop for DropFlag {
            fn drop(&mut self) {
                self.0.set(true);
            }
        }
        #[derive(Default)]
        struct Holder(RefCell<Option<DropFlag>>);

        let dropped = Rc::new(Cell::new(false));
        let dropped_in = Rc::clone(&dropped);
        let component = Component::new("Holder", move |cx| {
            *cx.state::<Holder>().0.borrow_mut() = Some(DropFlag(Rc::clone(&dropped_in)));
            Ok(View::empty())
        });

        let instance = mount(&component, &Context::root(), &Scheduler::default()).unwrap();
        assert!(!dropped.get());
        instance.unmount();
        assert!(dropped.get());
    }

    #[test]
    fn context_is_child_of_parent() {
        let root = Context::root();
        root.provide(7u32);
        let component = Component::new("Reader", |cx| {
            assert_eq!(cx.inject::<u32>(), Some(7));
            assert_eq!(cx.context().depth(), 1);
            Ok(View::empty())
        });
        mount(&component, &root, &Scheduler::default()).unwrap();
    }
}
