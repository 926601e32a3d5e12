//! SIMSET-style intrusive doubly-linked lists.
//!
//! The kernel's waiter queues need O(1) unlink of an arbitrary element
//! without a handle to the list it sits in. [`Head`] anchors a list and
//! keeps a running count; a [`Link`] knows its owning head, so
//! [`Link::out`] is always safe. A link is in at most one list at a time;
//! inserting an already-linked element unlinks it first.
//!
//! Lists do not own element identities: heads and links are cheap clonable
//! handles over shared nodes, and dropping a head merely unlinks whatever
//! it still anchors.

use std::cell::RefCell;
use std::rc::{Rc, Weak};

struct Node<T> {
    value: T,
    prev: Option<Weak<RefCell<Node<T>>>>,
    next: Option<Rc<RefCell<Node<T>>>>,
    owner: Option<Weak<RefCell<HeadInner<T>>>>,
}

struct HeadInner<T> {
    first: Option<Rc<RefCell<Node<T>>>>,
    last: Option<Weak<RefCell<Node<T>>>>,
    len: usize,
}

impl<T> Drop for HeadInner<T> {
    fn drop(&mut self) {
        // Break the forward Rc chain iteratively so long lists cannot
        // overflow the stack through recursive node drops.
        let mut cursor = self.first.take();
        while let Some(node) = cursor {
            cursor = node.borrow_mut().next.take();
        }
    }
}

/// Anchor of a doubly-linked list of [`Link`]s.
pub struct Head<T> {
    inner: Rc<RefCell<HeadInner<T>>>,
}

impl<T> Clone for Head<T> {
    fn clone(&self) -> Self {
        Head {
            inner: Rc::clone(&self.inner),
        }
    }
}

impl<T> Default for Head<T> {
    fn default() -> Self {
        Head::new()
    }
}

impl<T> Head<T> {
    /// Creates an empty list.
    pub fn new() -> Self {
        Head {
            inner: Rc::new(RefCell::new(HeadInner {
                first: None,
                last: None,
                len: 0,
            })),
        }
    }

    /// The first element, if any.
    pub fn first(&self) -> Option<Link<T>> {
        self.inner
            .borrow()
            .first
            .as_ref()
            .map(|node| Link { node: Rc::clone(node) })
    }

    /// The last element, if any.
    pub fn last(&self) -> Option<Link<T>> {
        self.inner
            .borrow()
            .last
            .as_ref()
            .and_then(Weak::upgrade)
            .map(|node| Link { node })
    }

    /// True when the list anchors no elements.
    pub fn is_empty(&self) -> bool {
        self.inner.borrow().len == 0
    }

    /// Number of elements in the list.
    pub fn cardinal(&self) -> usize {
        self.inner.borrow().len
    }

    /// Appends `link` at the end of the list, unlinking it first if needed.
    pub fn push_back(&self, link: &Link<T>) {
        link.out();
        let node = Rc::clone(&link.node);
        let mut head = self.inner.borrow_mut();
        {
            let mut n = node.borrow_mut();
            n.owner = Some(Rc::downgrade(&self.inner));
            n.prev = head.last.clone();
            n.next = None;
        }
        match head.last.take().and_then(|w| w.upgrade()) {
            Some(prev_last) => prev_last.borrow_mut().next = Some(Rc::clone(&node)),
            None => head.first = Some(Rc::clone(&node)),
        }
        head.last = Some(Rc::downgrade(&node));
        head.len += 1;
    }

    /// Inserts `link` at the front of the list, unlinking it first if needed.
    pub fn push_front(&self, link: &Link<T>) {
        link.out();
        let node = Rc::clone(&link.node);
        let mut head = self.inner.borrow_mut();
        {
            let mut n = node.borrow_mut();
            n.owner = Some(Rc::downgrade(&self.inner));
            n.prev = None;
            n.next = head.first.clone();
        }
        match head.first.take() {
            Some(prev_first) => {
                prev_first.borrow_mut().prev = Some(Rc::downgrade(&node));
                head.first = Some(Rc::clone(&node));
            }
            None => {
                head.first = Some(Rc::clone(&node));
                head.last = Some(Rc::downgrade(&node));
            }
        }
        head.len += 1;
    }

    /// Unlinks and returns the first element.
    pub fn pop_front(&self) -> Option<Link<T>> {
        let link = self.first()?;
        link.out();
        Some(link)
    }

    /// Unlinks every element.
    pub fn clear(&self) {
        while self.pop_front().is_some() {}
    }
}

impl<T: Clone> Head<T> {
    /// A snapshot of the element values, first to last.
    pub fn values(&self) -> Vec<T> {
        let mut out = Vec::with_capacity(self.cardinal());
        let mut cursor = self.first();
        while let Some(link) = cursor {
            out.push(link.value());
            cursor = link.suc();
        }
        out
    }
}

/// An element that can be threaded onto one [`Head`] at a time.
pub struct Link<T> {
    node: Rc<RefCell<Node<T>>>,
}

impl<T> Clone for Link<T> {
    fn clone(&self) -> Self {
        Link {
            node: Rc::clone(&self.node),
        }
    }
}

impl<T> Link<T> {
    /// Creates an unlinked element carrying `value`.
    pub fn new(value: T) -> Self {
        Link {
            node: Rc::new(RefCell::new(Node {
                value,
                prev: None,
                next: None,
                owner: None,
            })),
        }
    }

    /// True when this element currently sits in a list.
    pub fn in_list(&self) -> bool {
        self.node
            .borrow()
            .owner
            .as_ref()
            .is_some_and(|w| w.strong_count() > 0)
    }

    /// The successor in the owning list.
    pub fn suc(&self) -> Option<Link<T>> {
        self.node
            .borrow()
            .next
            .as_ref()
            .map(|node| Link { node: Rc::clone(node) })
    }

    /// The predecessor in the owning list.
    pub fn pred(&self) -> Option<Link<T>> {
        self.node
            .borrow()
            .prev
            .as_ref()
            .and_then(Weak::upgrade)
            .map(|node| Link { node })
    }

    /// Unlinks this element from whatever list holds it. O(1); a no-op when
    /// unlinked.
    pub fn out(&self) {
        let (prev, next, owner) = {
            let mut n = self.node.borrow_mut();
            (n.prev.take(), n.next.take(), n.owner.take())
        };
        let Some(head_rc) = owner.and_then(|w| w.upgrade()) else {
            return;
        };
        let mut head = head_rc.borrow_mut();
        match prev.as_ref().and_then(Weak::upgrade) {
            Some(p) => p.borrow_mut().next = next.clone(),
            None => head.first = next.clone(),
        }
        match next.as_ref() {
            Some(n) => n.borrow_mut().prev = prev.clone(),
            None => head.last = prev.clone(),
        }
        head.len -= 1;
    }

    /// Appends this element at the end of `head` (SIMULA `Into`).
    pub fn link_into(&self, head: &Head<T>) {
        head.push_back(self);
    }

    /// Inserts this element right after `other`. When `other` is not in a
    /// list, this element simply ends up unlinked.
    pub fn follow(&self, other: &Link<T>) {
        self.out();
        let Some(head_rc) = other
            .node
            .borrow()
            .owner
            .as_ref()
            .and_then(Weak::upgrade)
        else {
            return;
        };
        let node = Rc::clone(&self.node);
        let mut head = head_rc.borrow_mut();
        let next = other.node.borrow().next.clone();
        {
            let mut n = node.borrow_mut();
            n.owner = Some(Rc::downgrade(&head_rc));
            n.prev = Some(Rc::downgrade(&other.node));
            n.next = next.clone();
        }
        other.node.borrow_mut().next = Some(Rc::clone(&node));
        match next {
            Some(nx) => nx.borrow_mut().prev = Some(Rc::downgrade(&node)),
            None => head.last = Some(Rc::downgrade(&node)),
        }
        head.len += 1;
    }

    /// Inserts this element right before `other`. When `other` is not in a
    /// list, this element simply ends up unlinked.
    pub fn precede(&self, other: &Link<T>) {
        self.out();
        let Some(head_rc) = other
            .node
            .borrow()
            .owner
            .as_ref()
            .and_then(Weak::upgrade)
        else {
            return;
        };
        let node = Rc::clone(&self.node);
        let mut head = head_rc.borrow_mut();
        let prev = other.node.borrow().prev.clone();
        {
            let mut n = node.borrow_mut();
            n.owner = Some(Rc::downgrade(&head_rc));
            n.next = Some(Rc::clone(&other.node));
            n.prev = prev.clone();
        }
        other.node.borrow_mut().prev = Some(Rc::downgrade(&node));
        match prev.and_then(|w| w.upgrade()) {
            Some(p) => p.borrow_mut().next = Some(Rc::clone(&node)),
            None => head.first = Some(Rc::clone(&node)),
        }
        head.len += 1;
    }
}

impl<T: Clone> Link<T> {
    /// The carried value.
    pub fn value(&self) -> T {
        self.node.borrow().value.clone()
    }
}
