use std::cmp::{self, Ordering};
use std::mem;

use crate::common::{PageAddress, Result};

use super::Frame;

type Link = Option<Box<Node>>;

#[derive(Debug)]
struct Node {
    frame: Frame,
    height: i32,
    left: Link,
    right: Link,
}

impl Node {
    fn leaf(frame: Frame) -> Self {
        Self {
            frame,
            height: 1,
            left: None,
            right: None,
        }
    }

    fn key(&self) -> PageAddress {
        self.frame.address()
    }

    fn update_height(&mut self) {
        self.height = 1 + cmp::max(height(&self.left), height(&self.right));
    }

    fn balance_factor(&self) -> i32 {
        height(&self.left) - height(&self.right)
    }
}

fn height(link: &Link) -> i32 {
    link.as_ref().map_or(0, |node| node.height)
}

/// AVL tree mapping page addresses to their cached frames.
///
/// Keys are ordered by `(file_index, page_index)`. Every insert and delete
/// rebalances on the way back up, so lookups stay O(log n) no matter how
/// addresses are distributed.
#[derive(Debug, Default)]
pub struct FrameIndex {
    root: Link,
    len: usize,
}

impl FrameIndex {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Height of the tree; 0 when empty.
    pub fn height(&self) -> i32 {
        height(&self.root)
    }

    pub fn contains(&self, address: &PageAddress) -> bool {
        self.search(address).is_some()
    }

    pub fn search(&self, address: &PageAddress) -> Option<&Frame> {
        let mut cursor = self.root.as_deref();
        while let Some(node) = cursor {
            cursor = match address.cmp(&node.key()) {
                Ordering::Equal => return Some(&node.frame),
                Ordering::Less => node.left.as_deref(),
                Ordering::Greater => node.right.as_deref(),
            };
        }
        None
    }

    pub fn search_mut(&mut self, address: &PageAddress) -> Option<&mut Frame> {
        let mut cursor = self.root.as_deref_mut();
        while let Some(node) = cursor {
            cursor = match address.cmp(&node.key()) {
                Ordering::Equal => return Some(&mut node.frame),
                Ordering::Less => node.left.as_deref_mut(),
                Ordering::Greater => node.right.as_deref_mut(),
            };
        }
        None
    }

    /// Inserts a frame under its own address. A frame already stored under
    /// that address is replaced and returned.
    pub fn insert(&mut self, frame: Frame) -> Option<Frame> {
        let mut replaced = None;
        self.root = Some(insert(self.root.take(), frame, &mut replaced));
        if replaced.is_none() {
            self.len += 1;
        }
        replaced
    }

    /// Removes and returns the frame for `address`, buffer included.
    pub fn delete(&mut self, address: &PageAddress) -> Option<Frame> {
        let mut removed = None;
        self.root = delete(self.root.take(), address, &mut removed);
        if removed.is_some() {
            self.len -= 1;
        }
        removed
    }

    /// Visits every frame in address order.
    pub fn for_each<F: FnMut(&Frame)>(&self, mut visit: F) {
        fn walk<F: FnMut(&Frame)>(link: &Link, visit: &mut F) {
            if let Some(node) = link {
                walk(&node.left, visit);
                visit(&node.frame);
                walk(&node.right, visit);
            }
        }
        walk(&self.root, &mut visit);
    }

    /// Visits every frame in address order, stopping at the first error.
    pub fn try_for_each_mut<F>(&mut self, mut visit: F) -> Result<()>
    where
        F: FnMut(&mut Frame) -> Result<()>,
    {
        fn walk<F>(link: &mut Link, visit: &mut F) -> Result<()>
        where
            F: FnMut(&mut Frame) -> Result<()>,
        {
            if let Some(node) = link {
                walk(&mut node.left, visit)?;
                visit(&mut node.frame)?;
                walk(&mut node.right, visit)?;
            }
            Ok(())
        }
        walk(&mut self.root, &mut visit)
    }

    /// Empties the tree, returning its frames in address order.
    pub fn drain(&mut self) -> Vec<Frame> {
        fn collect(link: Link, out: &mut Vec<Frame>) {
            if let Some(node) = link {
                let Node {
                    frame, left, right, ..
                } = *node;
                collect(left, out);
                out.push(frame);
                collect(right, out);
            }
        }
        let mut frames = Vec::with_capacity(self.len);
        collect(self.root.take(), &mut frames);
        self.len = 0;
        frames
    }

    /// Checks ordering, stored heights and the AVL balance of every node.
    #[cfg(test)]
    fn is_valid_avl(&self) -> bool {
        fn check(
            link: &Link,
            low: Option<PageAddress>,
            high: Option<PageAddress>,
        ) -> Option<i32> {
            let Some(node) = link else { return Some(0) };
            let key = node.key();
            if low.is_some_and(|l| key <= l) || high.is_some_and(|h| key >= h) {
                return None;
            }
            let lh = check(&node.left, low, Some(key))?;
            let rh = check(&node.right, Some(key), high)?;
            if (lh - rh).abs() > 1 || node.height != 1 + cmp::max(lh, rh) {
                return None;
            }
            Some(node.height)
        }
        check(&self.root, None, None).is_some()
    }
}

fn rotate_right(mut node: Box<Node>) -> Box<Node> {
    let Some(mut pivot) = node.left.take() else {
        return node;
    };
    node.left = pivot.right.take();
    node.update_height();
    pivot.right = Some(node);
    pivot.update_height();
    pivot
}

fn rotate_left(mut node: Box<Node>) -> Box<Node> {
    let Some(mut pivot) = node.right.take() else {
        return node;
    };
    node.right = pivot.left.take();
    node.update_height();
    pivot.left = Some(node);
    pivot.update_height();
    pivot
}

/// Restores the AVL property at `node`, whose subtrees are already balanced.
fn rebalance(mut node: Box<Node>) -> Box<Node> {
    node.update_height();
    let balance = node.balance_factor();

    if balance > 1 {
        // left-right case: straighten the left child first
        if let Some(left) = node.left.take() {
            node.left = Some(if left.balance_factor() < 0 {
                rotate_left(left)
            } else {
                left
            });
        }
        return rotate_right(node);
    }

    if balance < -1 {
        if let Some(right) = node.right.take() {
            node.right = Some(if right.balance_factor() > 0 {
                rotate_right(right)
            } else {
                right
            });
        }
        return rotate_left(node);
    }

    node
}

fn insert(link: Link, frame: Frame, replaced: &mut Option<Frame>) -> Box<Node> {
    let Some(mut node) = link else {
        return Box::new(Node::leaf(frame));
    };

    match frame.address().cmp(&node.key()) {
        Ordering::Less => node.left = Some(insert(node.left.take(), frame, replaced)),
        Ordering::Greater => node.right = Some(insert(node.right.take(), frame, replaced)),
        Ordering::Equal => {
            *replaced = Some(mem::replace(&mut node.frame, frame));
            return node;
        }
    }

    rebalance(node)
}

fn delete(link: Link, key: &PageAddress, removed: &mut Option<Frame>) -> Link {
    let mut node = link?;

    match key.cmp(&node.key()) {
        Ordering::Less => node.left = delete(node.left.take(), key, removed),
        Ordering::Greater => node.right = delete(node.right.take(), key, removed),
        Ordering::Equal => match (node.left.take(), node.right.take()) {
            (None, None) => {
                *removed = Some(node.frame);
                return None;
            }
            (Some(child), None) | (None, Some(child)) => {
                *removed = Some(node.frame);
                return Some(child);
            }
            (Some(left), Some(right)) => {
                let (rest, successor) = take_min(right);
                node.left = Some(left);
                node.right = rest;
                *removed = Some(mem::replace(&mut node.frame, successor));
            }
        },
    }

    Some(rebalance(node))
}

/// Detaches the smallest frame of a subtree, rebalancing what remains.
fn take_min(mut node: Box<Node>) -> (Link, Frame) {
    match node.left.take() {
        None => {
            let Node { frame, right, .. } = *node;
            (right, frame)
        }
        Some(left) => {
            let (rest, min) = take_min(left);
            node.left = rest;
            (Some(rebalance(node)), min)
        }
    }
}
