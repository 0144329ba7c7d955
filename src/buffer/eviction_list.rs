use slab::Slab;

use crate::common::PageAddress;

/// Stable handle to a node of an [`EvictionList`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct NodeRef(usize);

#[derive(Debug)]
struct Node {
    /// None only for the sentinel
    address: Option<PageAddress>,
    prev: usize,
    next: usize,
}

/// Doubly linked list of unpinned pages, oldest at the front.
///
/// Nodes live in a slab and link to each other by slab key. A sentinel node
/// closes the ring, so the first node is `sentinel.next`, the last is
/// `sentinel.prev`, and no link is ever empty.
#[derive(Debug)]
pub struct EvictionList {
    nodes: Slab<Node>,
    sentinel: usize,
}

impl EvictionList {
    /// Creates an empty list.
    pub fn new() -> Self {
        Self::with_capacity(0)
    }

    /// Creates an empty list with room for `capacity` nodes.
    pub fn with_capacity(capacity: usize) -> Self {
        let mut nodes = Slab::with_capacity(capacity + 1);
        let entry = nodes.vacant_entry();
        let sentinel = entry.key();
        entry.insert(Node {
            address: None,
            prev: sentinel,
            next: sentinel,
        });
        Self { nodes, sentinel }
    }

    /// Appends a page at the back of the list.
    pub fn push_back(&mut self, address: PageAddress) -> NodeRef {
        let last = self.nodes[self.sentinel].prev;
        let key = self.nodes.insert(Node {
            address: Some(address),
            prev: last,
            next: self.sentinel,
        });
        self.nodes[last].next = key;
        self.nodes[self.sentinel].prev = key;
        NodeRef(key)
    }

    /// Unlinks a node and returns its page. Returns None for a stale handle.
    pub fn remove(&mut self, node: NodeRef) -> Option<PageAddress> {
        if node.0 == self.sentinel || !self.nodes.contains(node.0) {
            return None;
        }
        let removed = self.nodes.remove(node.0);
        self.nodes[removed.prev].next = removed.next;
        self.nodes[removed.next].prev = removed.prev;
        removed.address
    }

    /// Removes and returns the oldest page.
    pub fn pop_front(&mut self) -> Option<PageAddress> {
        let first = self.nodes[self.sentinel].next;
        self.remove(NodeRef(first))
    }

    /// Removes and returns the newest page.
    pub fn pop_back(&mut self) -> Option<PageAddress> {
        let last = self.nodes[self.sentinel].prev;
        self.remove(NodeRef(last))
    }

    /// Returns the oldest page and its handle without removing it.
    pub fn front(&self) -> Option<(NodeRef, PageAddress)> {
        let first = self.nodes[self.sentinel].next;
        self.nodes[first].address.map(|a| (NodeRef(first), a))
    }

    /// Returns the newest page and its handle without removing it.
    pub fn back(&self) -> Option<(NodeRef, PageAddress)> {
        let last = self.nodes[self.sentinel].prev;
        self.nodes[last].address.map(|a| (NodeRef(last), a))
    }

    pub fn len(&self) -> usize {
        self.nodes.len() - 1
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Drops every node, keeping the sentinel.
    pub fn clear(&mut self) {
        let sentinel = self.sentinel;
        self.nodes.retain(|key, _| key == sentinel);
        self.nodes[sentinel].prev = sentinel;
        self.nodes[sentinel].next = sentinel;
    }

    /// Iterates pages from front (oldest) to back (newest).
    pub fn iter(&self) -> Iter<'_> {
        Iter {
            list: self,
            cursor: self.nodes[self.sentinel].next,
        }
    }
}

impl Default for EvictionList {
    fn default() -> Self {
        Self::new()
    }
}

pub struct Iter<'a> {
    list: &'a EvictionList,
    cursor: usize,
}

impl Iterator for Iter<'_> {
    type Item = PageAddress;

    fn next(&mut self) -> Option<PageAddress> {
        let node = &self.list.nodes[self.cursor];
        let address = node.address?;
        self.cursor = node.next;
        Some(address)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn page(i: i32) -> PageAddress {
        PageAddress::new(0, i)
    }

    #[test]
    fn test_empty_list() {
        let mut list = EvictionList::new();
        assert!(list.is_empty());
        assert_eq!(list.pop_front(), None);
        assert_eq!(list.pop_back(), None);
        assert_eq!(list.front(), None);
        assert_eq!(list.iter().count(), 0);
    }

    #[test]
    fn test_push_and_pop_both_ends() {
        let mut list = EvictionList::new();
        for i in 0..4 {
            list.push_back(page(i));
        }
        assert_eq!(list.len(), 4);
        assert_eq!(list.pop_front(), Some(page(0)));
        assert_eq!(list.pop_back(), Some(page(3)));
        assert_eq!(list.iter().collect::<Vec<_>>(), vec![page(1), page(2)]);
    }

    #[test]
    fn test_remove_middle() {
        let mut list = EvictionList::new();
        let _a = list.push_back(page(0));
        let b = list.push_back(page(1));
        let _c = list.push_back(page(2));

        assert_eq!(list.remove(b), Some(page(1)));
        assert_eq!(list.remove(b), None);
        assert_eq!(list.iter().collect::<Vec<_>>(), vec![page(0), page(2)]);
        assert_eq!(list.back().map(|(_, a)| a), Some(page(2)));
    }

    #[test]
    fn test_remove_only_node() {
        let mut list = EvictionList::new();
        let a = list.push_back(page(7));
        assert_eq!(list.remove(a), Some(page(7)));
        assert!(list.is_empty());

        list.push_back(page(8));
        assert_eq!(list.pop_front(), Some(page(8)));
    }

    #[test]
    fn test_clear() {
        let mut list = EvictionList::with_capacity(4);
        for i in 0..4 {
            list.push_back(page(i));
        }
        list.clear();
        assert!(list.is_empty());
        list.push_back(page(9));
        assert_eq!(list.iter().collect::<Vec<_>>(), vec![page(9)]);
    }
}
