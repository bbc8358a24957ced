//! Declarative view trees and their mounted counterparts.
//!
//! A [`View`] describes what a component renders. Mounting turns it into a
//! `Node` tree that owns the child component instances. On every tick the
//! tree is reconciled: `when` nodes re-evaluate their condition and swap
//! branches if it changed.
//!
//! # Invariants
//!
//! 1. A branch swap mounts the incoming branch before unmounting the outgoing
//!    one, so state shared by both (for example a model acquired by a
//!    component on each side) never drops to zero references mid-swap.
//! 2. If mounting the incoming branch fails, the outgoing branch stays
//!    mounted and the error propagates.
//! 3. A failed element mount unmounts the siblings it already mounted.

use std::borrow::Cow;
use std::fmt;
use std::rc::Rc;

use reborn_reactive::Scheduler;

use crate::component::{self, Component, ComponentInstance};
use crate::context::Context;
use crate::error::Result;

/// Description of rendered output.
#[derive(Clone, Default)]
pub enum View {
    #[default]
    Empty,
    /// Text produced by a closure each render.
    Text(Rc<dyn Fn() -> String>),
    Element {
        tag: Cow<'static, str>,
        children: Vec<View>,
    },
    Component(Component),
    /// `then` while `condition` holds, `otherwise` when it does not.
    When {
        condition: Rc<dyn Fn() -> bool>,
        then: Box<View>,
        otherwise: Box<View>,
    },
}

impl fmt::Debug for View {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Empty => f.write_str("Empty"),
            Self::Text(_) => f.write_str("Text(..)"),
            Self::Element { tag, children } => f
                .debug_struct("Element")
                .field("tag", tag)
                .field("children", children)
                .finish(),
            Self::Component(c) => f.debug_tuple("Component").field(&c.name()).finish(),
            Self::When {
                then, otherwise, ..
            } => f
                .debug_struct("When")
                .field("then", then)
                .field("otherwise", otherwise)
                .finish_non_exhaustive(),
        }
    }
}

impl View {
    #[must_use]
    pub fn empty() -> Self {
        Self::Empty
    }

    pub fn text(render: impl Fn() -> String + 'static) -> Self {
        Self::Text(Rc::new(render))
    }

    pub fn element(tag: impl Into<Cow<'static, str>>, children: Vec<View>) -> Self {
        Self::Element {
            tag: tag.into(),
            children,
        }
    }

    #[must_use]
    pub fn component(component: &Component) -> Self {
        Self::Component(component.clone())
    }

    pub fn when(condition: impl Fn() -> bool + 'static, then: View, otherwise: View) -> Self {
        Self::When {
            condition: Rc::new(condition),
            then: Box::new(then),
            otherwise: Box::new(otherwise),
        }
    }
}

/// A mounted view.
pub(crate) enum Node {
    Empty,
    Text(Rc<dyn Fn() -> String>),
    Element {
        tag: Cow<'static, str>,
        children: Vec<Node>,
    },
    Component(Rc<ComponentInstance>),
    When {
        condition: Rc<dyn Fn() -> bool>,
        then: View,
        otherwise: View,
        showing: bool,
        branch: Box<Node>,
    },
}

pub(crate) fn mount(view: &View, parent: &Context, scheduler: &Scheduler) -> Result<Node> {
    Ok(match view {
        View::Empty => Node::Empty,
        View::Text(render) => Node::Text(Rc::clone(render)),
        View::Element { tag, children } => {
            let mut mounted = Vec::with_capacity(children.len());
            for child in children {
                match mount(child, parent, scheduler) {
                    Ok(node) => mounted.push(node),
                    Err(err) => {
                        mounted.into_iter().for_each(unmount);
                        return Err(err);
                    }
                }
            }
            Node::Element {
                tag: tag.clone(),
                children: mounted,
            }
        }
        View::Component(definition) => {
            Node::Component(component::mount(definition, parent, scheduler)?)
        }
        View::When {
            condition,
            then,
            otherwise,
        } => {
            let showing = condition();
            let branch = mount(if showing { then } else { otherwise }, parent, scheduler)?;
            Node::When {
                condition: Rc::clone(condition),
                then: (**then).clone(),
                otherwise: (**otherwise).clone(),
                showing,
                branch: Box::new(branch),
            }
        }
    })
}

pub(crate) fn reconcile(node: &mut Node, parent: &Context, scheduler: &Scheduler) -> Result<()> {
    match node {
        Node::Empty | Node::Text(_) => Ok(()),
        Node::Element { children, .. } => children
            .iter_mut()
            .try_for_each(|child| reconcile(child, parent, scheduler)),
        Node::Component(instance) => instance.reconcile(),
        Node::When {
            condition,
            then,
            otherwise,
            showing,
            branch,
        } => {
            let want = condition();
            if want == *showing {
                return reconcile(branch, parent, scheduler);
            }
            let incoming = mount(if want { then } else { otherwise }, parent, scheduler)?;
            let outgoing = std::mem::replace(&mut **branch, incoming);
            *showing = want;
            unmount(outgoing);
            Ok(())
        }
    }
}

pub(crate) fn unmount(node: Node) {
    match node {
        Node::Empty | Node::Text(_) => {}
        Node::Element { children, .. } => children.into_iter().for_each(unmount),
        Node::Component(instance) => instance.unmount(),
        Node::When { branch, .. } => unmount(*branch),
    }
}

pub(crate) fn render(node: &Node) -> String {
    let mut out = String::new();
    render_into(node, &mut out);
    out
}

fn render_into(node: &Node, out: &mut String) {
    match node {
        Node::Empty => {}
        Node::Text(render) => out.push_str(&render()),
        Node::Element { tag, children } => {
            out.push('<');
            out.push_str(tag);
            out.push('>');
            for child in children {
                render_into(child, out);
            }
            out.push_str("</");
            out.push_str(tag);
            out.push('>');
        }
        Node::Component(instance) => out.push_str(&instance.html()),
        Node::When { branch, .. } => render_into(branch, out),
    }
}

pub(crate) fn find(node: &Node, name: &str) -> Option<Rc<ComponentInstance>> {
    match node {
        Node::Empty | Node::Text(_) => None,
        Node::Element { children, .. } => children.iter().find_map(|child| find(child, name)),
        Node::Component(instance) => instance.find(name),
        Node::When { branch, .. } => find(branch, name),
    }
}

/// Number of mounted component instances in the tree.
pub(crate) fn count(node: &Node) -> usize {
    match node {
        Node::Empty | Node::Text(_) => 0,
        Node::Element { children, .. } => children.iter().map(count).sum(),
        Node::Component(instance) => instance.count_mounted(),
        Node::When { branch, .. } => count(branch),
    }
}
