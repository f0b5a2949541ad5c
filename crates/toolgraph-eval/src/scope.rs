//! Name-resolution scope.
//!
//! Path lookup is performed against an explicit scope object threaded
//! through the compiler and every reference evaluation; there is no
//! ambient "current tool" global. A path is dotted (`a.b.c`) with
//! optional leading markers: `.` anchors at the current tool, `/` at the
//! root, `^` at the parent. An unmarked path searches for its first
//! segment among the children of the current tool, then of each ancestor
//! in turn.

use std::rc::Rc;

use toolgraph_common::Value;

use crate::traits::{ToolRc, root_of};

#[derive(Clone)]
pub struct Scope {
    pub current: ToolRc,
    pub root: ToolRc,
}

enum Anchor {
    Tool(ToolRc),
    UpwardSearch,
}

impl Scope {
    pub fn new(current: ToolRc, root: ToolRc) -> Self {
        Scope { current, root }
    }

    /// Scope rooted automatically at the tool's topmost ancestor.
    pub fn for_tool(current: ToolRc) -> Self {
        let root = root_of(&current);
        Scope { current, root }
    }

    fn split(&self, path: &str) -> (Anchor, Vec<String>) {
        let (anchor, rest) = match path.chars().next() {
            Some('.') => (Anchor::Tool(Rc::clone(&self.current)), &path[1..]),
            Some('/') => (Anchor::Tool(Rc::clone(&self.root)), &path[1..]),
            Some('^') => (
                match self.current.parent() {
                    Some(parent) => Anchor::Tool(parent),
                    None => Anchor::Tool(Rc::clone(&self.root)),
                },
                &path[1..],
            ),
            _ => (Anchor::UpwardSearch, path),
        };
        let segments = rest
            .split('.')
            .filter(|s| !s.is_empty())
            .map(String::from)
            .collect();
        (anchor, segments)
    }

    /// Tool whose children (or self) are searched for the first segment.
    fn anchor_tool(&self, anchor: Anchor, first_segment: &str) -> Option<ToolRc> {
        match anchor {
            Anchor::Tool(tool) => Some(tool),
            Anchor::UpwardSearch => {
                let mut walk = Rc::clone(&self.current);
                loop {
                    if walk.child_named(first_segment).is_some() {
                        return Some(walk);
                    }
                    walk = walk.parent()?;
                }
            }
        }
    }

    /// Resolve a path to a value, registering `requestor` with the
    /// providing tool. Descends child links while segments name children;
    /// the first segment that does not is handed to the last tool reached
    /// as a value name.
    pub fn resolve_value(&self, path: &str, requestor: Option<&ToolRc>) -> Option<Value> {
        let (anchor, segments) = self.split(path);
        let first = segments.first()?;
        let mut tool = self.anchor_tool(anchor, first)?;
        for (index, segment) in segments.iter().enumerate() {
            match tool.child_named(segment) {
                Some(child) => tool = child,
                None => {
                    let rest = segments[index..].join(".");
                    return tool.value_described_by(&rest, requestor);
                }
            }
        }
        tool.value_described_by("", requestor)
    }

    /// Resolve a path to the tool that would provide its value, without
    /// evaluating anything. Used to collect input sources.
    pub fn resolve_tool(&self, path: &str) -> Option<ToolRc> {
        let (anchor, segments) = self.split(path);
        let first = segments.first()?;
        let mut tool = self.anchor_tool(anchor, first)?;
        for segment in &segments {
            match tool.child_named(segment) {
                Some(child) => tool = child,
                None => break,
            }
        }
        Some(tool)
    }
}
