use std::cmp::Ordering;

use rand::Rng;

use crate::core::error::{Error, ErrorKind, Result};
use crate::core::types::{DocMptr, DocumentRef};
use crate::shape::compare::compare_shaped;
use crate::shape::shaped::{ShapedJson, ShapedSub};

pub(crate) const HEAD: usize = 0;
pub(crate) const TAIL: usize = 1;
pub(crate) const MAX_HEIGHT: usize = 32;

#[derive(Debug, Clone)]
pub struct SkiplistElement {
    pub doc: DocumentRef,
    pub subs: Vec<ShapedSub>,
}

impl SkiplistElement {
    fn value(&self, i: usize) -> &[u8] {
        self.doc.shaped.sub_bytes(&self.subs[i])
    }
}

struct Node {
    element: Option<SkiplistElement>,
    next: Vec<usize>,
    prev: usize,
}

/// Arena skiplist ordered by the shaped-value total order of the element's
/// sub-objects. Non-unique lists break ties by revision so every element has exactly
/// one position. Nodes are addressed by index; `HEAD` and `TAIL` are sentinels.
pub struct Skiplist {
    nodes: Vec<Node>,
    free: Vec<usize>,
    height: usize,
    len: usize,
    unique: bool,
}

impl Skiplist {
    pub fn new(unique: bool) -> Self {
        let head = Node {
            element: None,
            next: vec![TAIL; MAX_HEIGHT],
            prev: HEAD,
        };
        let tail = Node {
            element: None,
            next: Vec::new(),
            prev: HEAD,
        };
        Skiplist {
            nodes: vec![head, tail],
            free: Vec::new(),
            height: 1,
            len: 0,
            unique,
        }
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn memory_usage(&self) -> usize {
        self.nodes
            .iter()
            .map(|n| {
                std::mem::size_of::<Node>()
                    + n.next.capacity() * std::mem::size_of::<usize>()
                    + n.element.as_ref().map_or(0, |e| e.subs.len() * std::mem::size_of::<ShapedSub>())
            })
            .sum()
    }

    #[inline]
    pub(crate) fn next(&self, node: usize) -> usize {
        self.nodes[node].next.first().copied().unwrap_or(TAIL)
    }

    #[inline]
    pub(crate) fn prev(&self, node: usize) -> usize {
        self.nodes[node].prev
    }

    pub(crate) fn get(&self, node: usize) -> Option<&SkiplistElement> {
        self.nodes.get(node).and_then(|n| n.element.as_ref())
    }

    fn values_cmp(left: &SkiplistElement, right: &SkiplistElement) -> Ordering {
        for i in 0..left.subs.len().min(right.subs.len()) {
            let ord = compare_shaped(left.value(i), right.value(i));
            if ord != Ordering::Equal {
                return ord;
            }
        }
        left.subs.len().cmp(&right.subs.len())
    }

    pub(crate) fn cmp_elements(&self, left: &SkiplistElement, right: &SkiplistElement) -> Ordering {
        let ord = Self::values_cmp(left, right);
        if ord != Ordering::Equal || self.unique {
            return ord;
        }
        left.doc.rid.cmp(&right.doc.rid)
    }

    /// Compares a key prefix with the leading values of an element.
    pub(crate) fn cmp_key(key: &[ShapedJson], element: &SkiplistElement) -> Ordering {
        for (i, value) in key.iter().enumerate().take(element.subs.len()) {
            let ord = compare_shaped(value.bytes(), element.value(i));
            if ord != Ordering::Equal {
                return ord;
            }
        }
        Ordering::Equal
    }

    /// Position order of two nodes, sentinels included.
    pub(crate) fn cmp_nodes(&self, left: usize, right: usize) -> Ordering {
        if left == right {
            return Ordering::Equal;
        }
        match (left, right) {
            (HEAD, _) | (_, TAIL) => Ordering::Less,
            (TAIL, _) | (_, HEAD) => Ordering::Greater,
            _ => match (self.get(left), self.get(right)) {
                (Some(l), Some(r)) => self.cmp_elements(l, r),
                _ => Ordering::Equal,
            },
        }
    }

    /// Last node on each level whose element satisfies `before`.
    fn predecessors(&self, before: impl Fn(&SkiplistElement) -> bool) -> [usize; MAX_HEIGHT] {
        let mut preds = [HEAD; MAX_HEIGHT];
        let mut x = HEAD;
        for level in (0..self.height).rev() {
            loop {
                let n = self.nodes[x].next[level];
                match self.get(n) {
                    Some(element) if before(element) => x = n,
                    _ => break,
                }
            }
            preds[level] = x;
        }
        preds
    }

    fn random_height() -> usize {
        let mut rng = rand::thread_rng();
        let mut height = 1;
        while height < MAX_HEIGHT && rng.gen_bool(0.5) {
            height += 1;
        }
        height
    }

    pub fn insert(&mut self, element: SkiplistElement) -> Result<()> {
        let preds = self.predecessors(|e| self.cmp_elements(e, &element) == Ordering::Less);
        if let Some(existing) = self.get(self.next(preds[0])) {
            if self.cmp_elements(existing, &element) == Ordering::Equal {
                return Err(if self.unique {
                    Error::new(ErrorKind::UniqueConstraintViolated, format!(
                        "unique skiplist constraint violated by '{}'", element.doc.key
                    ))
                } else {
                    Error::new(ErrorKind::ElementExists, "document already in skiplist")
                });
            }
        }

        let height = Self::random_height();
        let node = Node {
            element: Some(element),
            next: vec![TAIL; height],
            prev: preds[0],
        };
        let id = match self.free.pop() {
            Some(id) => {
                self.nodes[id] = node;
                id
            }
            None => {
                self.nodes.push(node);
                self.nodes.len() - 1
            }
        };

        for (level, pred) in preds.iter().enumerate().take(height) {
            self.nodes[id].next[level] = self.nodes[*pred].next[level];
            self.nodes[*pred].next[level] = id;
        }
        let successor = self.nodes[id].next[0];
        self.nodes[successor].prev = id;

        self.height = self.height.max(height);
        self.len += 1;
        Ok(())
    }

    /// Removes the entry of `element.doc`.
    pub fn remove(&mut self, element: &SkiplistElement) -> Result<()> {
        let preds = self.predecessors(|e| self.cmp_elements(e, element) == Ordering::Less);
        let target = self.next(preds[0]);
        match self.get(target) {
            Some(found) if DocMptr::same(&found.doc, &element.doc) => {}
            _ => return Err(Error::new(ErrorKind::ElementNotFound, "document not in skiplist")),
        }

        let next = std::mem::take(&mut self.nodes[target].next);
        for (level, successor) in next.iter().enumerate() {
            if self.nodes[preds[level]].next[level] == target {
                self.nodes[preds[level]].next[level] = *successor;
            }
        }
        self.nodes[next[0]].prev = preds[0];
        self.nodes[target].element = None;
        self.free.push(target);
        self.len -= 1;
        Ok(())
    }

    /// Last node strictly before `key`, `HEAD` if none.
    pub(crate) fn last_less(&self, key: &[ShapedJson]) -> usize {
        self.predecessors(|e| Self::cmp_key(key, e) == Ordering::Greater)[0]
    }

    /// Last node before or equal to `key`, `HEAD` if none.
    pub(crate) fn last_less_or_equal(&self, key: &[ShapedJson]) -> usize {
        self.predecessors(|e| Self::cmp_key(key, e) != Ordering::Less)[0]
    }
}
