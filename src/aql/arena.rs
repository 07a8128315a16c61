use std::mem;
use std::sync::Arc;

use crate::core::error::Result;
use crate::memory::zone::{MemoryZone, ZoneReservation};

/// Nodes are charged to the zone this many at a time.
const NODE_CHUNK: usize = 16;

/// Handle of a node in a [`NodeArena`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct NodeId(pub(crate) usize);

/// Handle of a string in a [`StringArena`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct StrId(pub(crate) usize);

/// Append-only node storage. Nodes refer to each other by [`NodeId`] and are all
/// freed together with the arena.
pub struct NodeArena<T> {
    zone: Arc<MemoryZone>,
    nodes: Vec<T>,
    memory: Vec<ZoneReservation>,
}

impl<T> NodeArena<T> {
    pub fn new(zone: Arc<MemoryZone>) -> Self {
        NodeArena {
            zone,
            nodes: Vec::new(),
            memory: Vec::new(),
        }
    }

    pub fn alloc(&mut self, node: T) -> Result<NodeId> {
        if self.nodes.len() == self.memory.len() * NODE_CHUNK {
            self.memory.push(self.zone.allocate(NODE_CHUNK * mem::size_of::<T>())?);
            self.nodes.reserve(NODE_CHUNK);
        }
        self.nodes.push(node);
        Ok(NodeId(self.nodes.len() - 1))
    }

    pub fn get(&self, id: NodeId) -> Option<&T> {
        self.nodes.get(id.0)
    }

    pub fn get_mut(&mut self, id: NodeId) -> Option<&mut T> {
        self.nodes.get_mut(id.0)
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn ids(&self) -> impl Iterator<Item = NodeId> + use<T> {
        (0..self.nodes.len()).map(NodeId)
    }

    /// Bytes charged to the zone.
    pub fn memory(&self) -> usize {
        self.memory.iter().map(ZoneReservation::size).sum()
    }
}

/// Interned query strings: identifiers, attribute names, literals.
pub struct StringArena {
    zone: Arc<MemoryZone>,
    strings: Vec<Box<str>>,
    memory: Vec<ZoneReservation>,
}

impl StringArena {
    pub fn new(zone: Arc<MemoryZone>) -> Self {
        StringArena {
            zone,
            strings: Vec::new(),
            memory: Vec::new(),
        }
    }

    /// Copies `value` into the arena, unescaping backslash sequences if asked to.
    pub fn register(&mut self, value: &str, unescape: bool) -> Result<StrId> {
        let copy = if unescape { unescape_string(value) } else { value.to_string() };
        self.push(copy)
    }

    pub fn register2(&mut self, a: &str, b: &str) -> Result<StrId> {
        self.push([a, b].concat())
    }

    pub fn register3(&mut self, a: &str, b: &str, c: &str) -> Result<StrId> {
        self.push([a, b, c].concat())
    }

    fn push(&mut self, value: String) -> Result<StrId> {
        let reservation = self.zone.allocate(value.len().max(1))?;
        self.memory.push(reservation);
        self.strings.push(value.into_boxed_str());
        Ok(StrId(self.strings.len() - 1))
    }

    pub fn get(&self, id: StrId) -> &str {
        self.strings.get(id.0).map_or("", |s| &**s)
    }

    pub fn len(&self) -> usize {
        self.strings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.strings.is_empty()
    }

    pub fn memory(&self) -> usize {
        self.memory.iter().map(ZoneReservation::size).sum()
    }
}

/// Resolves `\n`, `\t`, `\r`, `\b`, `\f`, `\uXXXX` and escaped characters.
fn unescape_string(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    let mut chars = value.chars();
    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        match chars.next() {
            Some('n') => out.push('\n'),
            Some('t') => out.push('\t'),
            Some('r') => out.push('\r'),
            Some('b') => out.push('\u{8}'),
            Some('f') => out.push('\u{c}'),
            Some('u') => {
                let hex: String = chars.by_ref().take(4).collect();
                match u32::from_str_radix(&hex, 16).ok().and_then(char::from_u32) {
                    Some(decoded) => out.push(decoded),
                    None => {
                        out.push_str("\\u");
                        out.push_str(&hex);
                    }
                }
            }
            Some(other) => out.push(other),
            None => out.push('\\'),
        }
    }
    out
}
