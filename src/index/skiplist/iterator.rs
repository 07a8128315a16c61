use std::cmp::Ordering;

use crate::core::types::DocumentRef;
use crate::index::operator::{FilledOperator, LogicalOp, RelationOp};
use crate::index::skiplist::list::{HEAD, Skiplist, TAIL};

/// Open range of list positions: the nodes strictly between `left` and `right`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct Interval {
    pub left: usize,
    pub right: usize,
}

fn is_empty(list: &Skiplist, iv: &Interval) -> bool {
    list.cmp_nodes(iv.left, iv.right) != Ordering::Less || list.next(iv.left) == iv.right
}

/// Sorted, disjoint, non-empty form of an interval set.
fn normalize(list: &Skiplist, mut intervals: Vec<Interval>) -> Vec<Interval> {
    intervals.retain(|iv| !is_empty(list, iv));
    intervals.sort_by(|a, b| list.cmp_nodes(a.left, b.left));

    let mut merged: Vec<Interval> = Vec::with_capacity(intervals.len());
    for iv in intervals {
        match merged.last_mut() {
            Some(last) if list.cmp_nodes(iv.left, last.right) == Ordering::Less => {
                if list.cmp_nodes(iv.right, last.right) == Ordering::Greater {
                    last.right = iv.right;
                }
            }
            _ => merged.push(iv),
        }
    }
    merged
}

fn intersect(list: &Skiplist, a: &[Interval], b: &[Interval]) -> Vec<Interval> {
    let mut result = Vec::new();
    for x in a {
        for y in b {
            let left = if list.cmp_nodes(x.left, y.left) == Ordering::Less { y.left } else { x.left };
            let right = if list.cmp_nodes(x.right, y.right) == Ordering::Less { x.right } else { y.right };
            result.push(Interval { left, right });
        }
    }
    normalize(list, result)
}

fn complement(list: &Skiplist, intervals: &[Interval]) -> Vec<Interval> {
    let mut result = Vec::new();
    let mut start = HEAD;
    for iv in intervals {
        result.push(Interval {
            left: start,
            right: list.next(iv.left),
        });
        if iv.right == TAIL {
            return normalize(list, result);
        }
        start = list.prev(iv.right);
    }
    result.push(Interval { left: start, right: TAIL });
    normalize(list, result)
}

/// Translates an operator tree into the set of matching list ranges.
pub(crate) fn evaluate(list: &Skiplist, op: &FilledOperator) -> Vec<Interval> {
    match op {
        FilledOperator::Relation { op, values } => {
            let key = values.as_slice();
            let intervals = match op {
                RelationOp::Eq => vec![Interval {
                    left: list.last_less(key),
                    right: list.next(list.last_less_or_equal(key)),
                }],
                RelationOp::Lt => vec![Interval {
                    left: HEAD,
                    right: list.next(list.last_less(key)),
                }],
                RelationOp::Le => vec![Interval {
                    left: HEAD,
                    right: list.next(list.last_less_or_equal(key)),
                }],
                RelationOp::Gt => vec![Interval {
                    left: list.last_less_or_equal(key),
                    right: TAIL,
                }],
                RelationOp::Ge => vec![Interval {
                    left: list.last_less(key),
                    right: TAIL,
                }],
                RelationOp::Ne => vec![
                    Interval {
                        left: HEAD,
                        right: list.next(list.last_less(key)),
                    },
                    Interval {
                        left: list.last_less_or_equal(key),
                        right: TAIL,
                    },
                ],
            };
            normalize(list, intervals)
        }
        FilledOperator::Logical { op, left, right } => {
            let left = evaluate(list, left);
            match (op, right) {
                (LogicalOp::And, Some(right)) => intersect(list, &left, &evaluate(list, right)),
                (LogicalOp::Or, Some(right)) => {
                    let mut all = left;
                    all.extend(evaluate(list, right));
                    normalize(list, all)
                }
                _ => complement(list, &left),
            }
        }
    }
}

/// Lazy, restartable walk over the documents of a lookup result.
pub struct SkiplistIterator<'a> {
    list: &'a Skiplist,
    intervals: Vec<Interval>,
    current: usize,
    cursor: Option<usize>,
}

impl<'a> SkiplistIterator<'a> {
    pub(crate) fn new(list: &'a Skiplist, intervals: Vec<Interval>) -> Self {
        SkiplistIterator {
            list,
            intervals,
            current: 0,
            cursor: None,
        }
    }

    fn peek_position(&self) -> Option<(usize, usize)> {
        let mut current = self.current;
        let mut cursor = self.cursor;
        while let Some(iv) = self.intervals.get(current) {
            let node = self.list.next(cursor.unwrap_or(iv.left));
            if node != iv.right && node != TAIL {
                return Some((current, node));
            }
            current += 1;
            cursor = None;
        }
        None
    }

    pub fn has_next(&self) -> bool {
        self.peek_position().is_some()
    }

    /// Starts over from the first match.
    pub fn reset(&mut self) {
        self.current = 0;
        self.cursor = None;
    }
}

impl<'a> Iterator for SkiplistIterator<'a> {
    type Item = &'a DocumentRef;

    fn next(&mut self) -> Option<Self::Item> {
        let (current, node) = self.peek_position()?;
        self.current = current;
        self.cursor = Some(node);
        let list: &'a Skiplist = self.list;
        list.get(node).map(|e| &e.doc)
    }
}
