// Copyright 2025 eraflo
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Index-linked doubly linked list over a slab of nodes.
//!
//! Nodes are addressed by their slab index, so an entry keeps a stable
//! handle for its whole lifetime and can be moved to the front or unlinked
//! in O(1). Freed slots are recycled by later insertions.
//!
//! ```text
//!   head (MRU) ─► [3] ◄──► [0] ◄──► [2] ◄── tail (LRU)
//! ```

#[derive(Debug)]
struct Node<T> {
    value: T,
    prev: Option<usize>,
    next: Option<usize>,
}

/// Recency-ordered storage, most recently used first.
#[derive(Debug)]
pub(crate) struct RecencyList<T> {
    slots: Vec<Option<Node<T>>>,
    free: Vec<usize>,
    head: Option<usize>,
    tail: Option<usize>,
    len: usize,
}

impl<T> RecencyList<T> {
    pub(crate) fn with_capacity(capacity: usize) -> Self {
        Self {
            slots: Vec::with_capacity(capacity),
            free: Vec::new(),
            head: None,
            tail: None,
            len: 0,
        }
    }

    pub(crate) fn len(&self) -> usize {
        self.len
    }

    pub(crate) fn get(&self, id: usize) -> Option<&T> {
        self.slots.get(id)?.as_ref().map(|node| &node.value)
    }

    pub(crate) fn get_mut(&mut self, id: usize) -> Option<&mut T> {
        self.slots.get_mut(id)?.as_mut().map(|node| &mut node.value)
    }

    /// Inserts `value` at the head and returns its handle.
    pub(crate) fn push_front(&mut self, value: T) -> usize {
        let node = Node {
            value,
            prev: None,
            next: None,
        };
        let id = match self.free.pop() {
            Some(id) => {
                self.slots[id] = Some(node);
                id
            }
            None => {
                self.slots.push(Some(node));
                self.slots.len() - 1
            }
        };
        self.attach_front(id);
        self.len += 1;
        id
    }

    /// Moves an existing node to the head.
    pub(crate) fn move_to_front(&mut self, id: usize) {
        if self.head == Some(id) || self.get(id).is_none() {
            return;
        }
        self.detach(id);
        self.attach_front(id);
    }

    /// Unlinks a node and frees its slot.
    pub(crate) fn remove(&mut self, id: usize) -> Option<T> {
        self.get(id)?;
        self.detach(id);
        let node = self.slots[id].take()?;
        self.free.push(id);
        self.len -= 1;
        Some(node.value)
    }

    pub(crate) fn clear(&mut self) {
        self.slots.clear();
        self.free.clear();
        self.head = None;
        self.tail = None;
        self.len = 0;
    }

    /// Iterates `(handle, value)` from most to least recently used.
    pub(crate) fn iter(&self) -> Iter<'_, T> {
        Iter {
            list: self,
            current: self.head,
        }
    }

    fn attach_front(&mut self, id: usize) {
        let old_head = self.head;
        if let Some(node) = self.slots[id].as_mut() {
            node.prev = None;
            node.next = old_head;
        }
        match old_head {
            Some(h) => {
                if let Some(head) = self.slots[h].as_mut() {
                    head.prev = Some(id);
                }
            }
            None => self.tail = Some(id),
        }
        self.head = Some(id);
    }

    fn detach(&mut self, id: usize) {
        let (prev, next) = match self.slots[id].as_ref() {
            Some(node) => (node.prev, node.next),
            None => return,
        };
        match prev {
            Some(p) => {
                if let Some(node) = self.slots[p].as_mut() {
                    node.next = next;
                }
            }
            None => self.head = next,
        }
        match next {
            Some(n) => {
                if let Some(node) = self.slots[n].as_mut() {
                    node.prev = prev;
                }
            }
            None => self.tail = prev,
        }
        if let Some(node) = self.slots[id].as_mut() {
            node.prev = None;
            node.next = None;
        }
    }
}

pub(crate) struct Iter<'a, T> {
    list: &'a RecencyList<T>,
    current: Option<usize>,
}

impl<'a, T> Iterator for Iter<'a, T> {
    type Item = (usize, &'a T);

    fn next(&mut self) -> Option<Self::Item> {
        let id = self.current?;
        let node = self.list.slots.get(id)?.as_ref()?;
        self.current = node.next;
        Some((id, &node.value))
    }
}
