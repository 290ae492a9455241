// SPDX-License-Identifier: GPL-2.0

//! An owned, singly linked list.
//!
//! C header: [`include/linux/list.h`](srctree/include/linux/list.h)
//!
//! Every element lives in its own allocation, like a `kmalloc`ed struct
//! embedding a `list_head`. Allocating happens in [`ListEntry::new`], so
//! linking an entry into a [`List`] cannot fail.

use crate::alloc::{AllocError, Flags, KBox};
use core::fmt;
use core::marker::PhantomData;
use core::ops::{Deref, DerefMut};
use core::ptr::NonNull;

struct Node<T> {
    value: T,
    next: Option<NonNull<Node<T>>>,
}

/// An allocated element that is not linked into any [`List`].
pub struct ListEntry<T>(KBox<Node<T>>);

impl<T> ListEntry<T> {
    /// Allocates an unlinked entry holding `value`.
    pub fn new(value: T, flags: Flags) -> Result<Self, AllocError> {
        Ok(Self(KBox::new(Node { value, next: None }, flags)?))
    }

    /// Frees the entry and returns its value.
    pub fn into_inner(self) -> T {
        KBox::into_inner(self.0).value
    }
}

impl<T> Deref for ListEntry<T> {
    type Target = T;

    fn deref(&self) -> &T {
        &self.0.value
    }
}

impl<T> DerefMut for ListEntry<T> {
    fn deref_mut(&mut self) -> &mut T {
        &mut self.0.value
    }
}

/// A FIFO list that owns its elements.
///
/// # Invariants
///
/// Every node reachable from `head` was produced by [`KBox::into_raw`] and is owned by this list
/// alone. `tail` points to the last reachable node, and `len` is the number of reachable nodes.
pub struct List<T> {
    head: Option<NonNull<Node<T>>>,
    tail: Option<NonNull<Node<T>>>,
    len: usize,
    _owns: PhantomData<KBox<Node<T>>>,
}

// SAFETY: The list owns its nodes exclusively, so sending it sends the `T`s with it.
unsafe impl<T: Send> Send for List<T> {}

// SAFETY: A shared list only hands out `&T`.
unsafe impl<T: Sync> Sync for List<T> {}

impl<T> List<T> {
    /// Creates an empty list.
    pub const fn new() -> Self {
        Self {
            head: None,
            tail: None,
            len: 0,
            _owns: PhantomData,
        }
    }

    /// Returns the number of linked entries.
    pub fn len(&self) -> usize {
        self.len
    }

    /// Returns `true` if nothing is linked.
    pub fn is_empty(&self) -> bool {
        self.head.is_none()
    }

    /// Links `entry` after the last element.
    pub fn push_back(&mut self, entry: ListEntry<T>) {
        let mut node = entry.0;
        node.next = None;
        // SAFETY: `KBox::into_raw` never returns a null pointer.
        let ptr = unsafe { NonNull::new_unchecked(KBox::into_raw(node)) };

        match self.tail {
            // SAFETY: By the type invariants `tail` is a live node owned by this list, and `&mut self`
            // guarantees nobody else is looking at it.
            Some(mut tail) => unsafe { tail.as_mut().next = Some(ptr) },
            None => self.head = Some(ptr),
        }

        // INVARIANT: `ptr` is now the last reachable node and it came from `KBox::into_raw`.
        self.tail = Some(ptr);
        self.len += 1;
    }

    /// Allocates an entry for `value` and links it after the last element.
    pub fn try_push_back(&mut self, value: T, flags: Flags) -> Result<(), AllocError> {
        self.push_back(ListEntry::new(value, flags)?);
        Ok(())
    }

    /// Unlinks the first element and hands its ownership to the caller.
    pub fn pop_front(&mut self) -> Option<ListEntry<T>> {
        let head = self.head?;

        // SAFETY: By the type invariants `head` came from `KBox::into_raw` and is owned by this list.
        // It is unlinked below, so ownership moves back into a `KBox` exactly once.
        let mut node = unsafe { KBox::from_raw(head.as_ptr()) };

        self.head = node.next.take();
        if self.head.is_none() {
            self.tail = None;
        }
        self.len -= 1;

        Some(ListEntry(node))
    }

    /// Returns the first element, if any.
    pub fn front(&self) -> Option<&T> {
        // SAFETY: By the type invariants `head` is live while the list is borrowed.
        self.head.map(|head| unsafe { &(*head.as_ptr()).value })
    }

    /// Returns an iterator over the elements, oldest first.
    pub fn iter(&self) -> Iter<'_, T> {
        Iter {
            next: self.head,
            remaining: self.len,
            _list: PhantomData,
        }
    }
}

impl<T> Default for List<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> Drop for List<T> {
    fn drop(&mut self) {
        while self.pop_front().is_some() {}
    }
}

impl<T: fmt::Debug> fmt::Debug for List<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.iter()).finish()
    }
}

/// Iterator over the elements of a [`List`].
pub struct Iter<'a, T> {
    next: Option<NonNull<Node<T>>>,
    remaining: usize,
    _list: PhantomData<&'a List<T>>,
}

impl<'a, T> Iterator for Iter<'a, T> {
    type Item = &'a T;

    fn next(&mut self) -> Option<&'a T> {
        let node = self.next?;
        // SAFETY: The list is borrowed for `'a`, so its nodes are neither freed nor mutated.
        let node = unsafe { &*node.as_ptr() };
        self.next = node.next;
        self.remaining -= 1;
        Some(&node.value)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        (self.remaining, Some(self.remaining))
    }
}

impl<T> ExactSizeIterator for Iter<'_, T> {}

impl<'a, T> IntoIterator for &'a List<T> {
    type Item = &'a T;
    type IntoIter = Iter<'a, T>;

    fn into_iter(self) -> Iter<'a, T> {
        self.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::alloc::flags::GFP_KERNEL;
    use crate::fault_inject::FailNth;
    use std::cell::RefCell;
    use std::rc::Rc;

    struct Tracked {
        id: u32,
        dropped: Rc<RefCell<Vec<u32>>>,
    }

    impl Drop for Tracked {
        fn drop(&mut self) {
            self.dropped.borrow_mut().push(self.id);
        }
    }

    #[test]
    fn pops_in_insertion_order() {
        let mut list = List::new();
        for i in 0..5 {
            list.try_push_back(i, GFP_KERNEL).unwrap();
        }
        assert_eq!(list.len(), 5);
        assert_eq!(list.front(), Some(&0));
        assert_eq!(list.iter().copied().collect::<Vec<_>>(), [0, 1, 2, 3, 4]);

        let mut popped = Vec::new();
        while let Some(entry) = list.pop_front() {
            popped.push(entry.into_inner());
        }
        assert_eq!(popped, [0, 1, 2, 3, 4]);
        assert!(list.is_empty());
        assert_eq!(list.len(), 0);
        assert!(list.pop_front().is_none());
    }

    #[test]
    fn reusable_after_emptying() {
        let mut list = List::new();
        list.try_push_back("a", GFP_KERNEL).unwrap();
        drop(list.pop_front());
        list.try_push_back("b", GFP_KERNEL).unwrap();
        list.try_push_back("c", GFP_KERNEL).unwrap();
        assert_eq!(format!("{:?}", list), r#"["b", "c"]"#);
    }

    #[test]
    fn entry_can_be_modified_before_linking() {
        let mut entry = ListEntry::new(1, GFP_KERNEL).unwrap();
        *entry += 10;
        let mut list = List::new();
        list.push_back(entry);
        assert_eq!(list.front(), Some(&11));
    }

    #[test]
    fn drop_releases_every_entry_front_to_back() {
        let dropped = Rc::new(RefCell::new(Vec::new()));
        {
            let mut list = List::new();
            for id in 1..=3 {
                let value = Tracked {
                    id,
                    dropped: dropped.clone(),
                };
                list.try_push_back(value, GFP_KERNEL).unwrap();
            }
            assert!(dropped.borrow().is_empty());
        }
        assert_eq!(*dropped.borrow(), [1, 2, 3]);
    }

    #[test]
    fn failed_allocation_leaves_list_unchanged() {
        let mut list = List::new();
        list.try_push_back(1, GFP_KERNEL).unwrap();

        let _fail = FailNth::arm(1);
        assert_eq!(list.try_push_back(2, GFP_KERNEL), Err(AllocError));
        assert_eq!(list.len(), 1);
        assert_eq!(list.iter().copied().collect::<Vec<_>>(), [1]);
    }
}
