//! The grammar arena.
//!
//! Nodes live in a flat `Vec` addressed by [`NodeId`]; the root is always
//! [`NodeId::ROOT`]. Registration happens during a startup phase; afterwards
//! the arena is shared read-only (typically behind an `Arc`) and only
//! administrative patches such as [`CommandDispatcher::replace_requirement`]
//! touch it, on a private copy.

use std::collections::HashSet;
use std::fmt;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;

use indexmap::{IndexMap, IndexSet};
use tracing::{debug, warn};

use crate::arguments::ArgumentTypeRegistry;
use crate::builder::{literal, ArgumentBuilder, BuilderKind};
use crate::error::GrammarError;
use crate::node::{Command, CommandNode, NodeId, NodeKind, Requirement};
use crate::reader::StringReader;
use crate::ARGUMENT_SEPARATOR;

const USAGE_OPTIONAL_OPEN: &str = "[";
const USAGE_OPTIONAL_CLOSE: &str = "]";
const USAGE_REQUIRED_OPEN: &str = "(";
const USAGE_REQUIRED_CLOSE: &str = ")";
const USAGE_OR: &str = "|";

/// Why a registration could not be merged into an existing sibling.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CollisionKind {
    /// A literal and an argument share the name.
    MixedKinds,
    /// The incoming node forwards somewhere the existing one does not.
    ConflictingRedirect,
}

/// A sibling whose name was already taken by an incompatible node.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NameCollision {
    pub parent: NodeId,
    pub name: String,
    pub kind: CollisionKind,
}

/// Two siblings that both accept some sample input.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Ambiguity {
    pub parent: NodeId,
    pub child: NodeId,
    pub sibling: NodeId,
    pub inputs: Vec<String>,
}

/// Startup self-check results. Only redirect cycles are hard errors.
#[derive(Debug, Clone, Default)]
pub struct ValidationReport {
    pub redirect_cycles: Vec<GrammarError>,
    pub collisions: Vec<String>,
    pub ambiguities: Vec<String>,
    pub unregistered_types: Vec<String>,
}

impl ValidationReport {
    pub fn has_errors(&self) -> bool {
        !self.redirect_cycles.is_empty()
    }

    pub fn is_clean(&self) -> bool {
        !self.has_errors()
            && self.collisions.is_empty()
            && self.ambiguities.is_empty()
            && self.unregistered_types.is_empty()
    }

    pub fn lines(&self) -> Vec<String> {
        let mut lines = Vec::new();
        lines.extend(self.redirect_cycles.iter().map(|e| format!("error: {e}")));
        lines.extend(self.collisions.iter().map(|c| format!("warning: {c}")));
        lines.extend(self.ambiguities.iter().map(|a| format!("warning: {a}")));
        lines.extend(self.unregistered_types.iter().map(|u| format!("warning: {u}")));
        lines
    }
}

impl fmt::Display for ValidationReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for line in self.lines() {
            writeln!(f, "{line}")?;
        }
        Ok(())
    }
}

/// The command grammar for sources of type `S`.
pub struct CommandDispatcher<S> {
    pub(crate) nodes: Vec<CommandNode<S>>,
    collisions: Vec<NameCollision>,
}

impl<S> Clone for CommandDispatcher<S> {
    fn clone(&self) -> Self {
        Self {
            nodes: self.nodes.clone(),
            collisions: self.collisions.clone(),
        }
    }
}

impl<S: Clone + 'static> Default for CommandDispatcher<S> {
    fn default() -> Self {
        Self::new()
    }
}

impl<S: Clone + 'static> CommandDispatcher<S> {
    pub fn new() -> Self {
        Self {
            nodes: vec![CommandNode::new(NodeKind::Root, None)],
            collisions: Vec::new(),
        }
    }

    pub fn root(&self) -> NodeId {
        NodeId::ROOT
    }

    pub fn node(&self, id: NodeId) -> Option<&CommandNode<S>> {
        self.nodes.get(id.index())
    }

    pub(crate) fn node_ref(&self, id: NodeId) -> &CommandNode<S> {
        &self.nodes[id.index()]
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.len() == 1
    }

    fn check_exists(&self, id: NodeId) -> Result<(), GrammarError> {
        if id.index() < self.nodes.len() {
            Ok(())
        } else {
            Err(GrammarError::UnknownNode(id))
        }
    }

    /// Insert a subtree under the root.
    pub fn register(&mut self, builder: ArgumentBuilder<S>) -> Result<NodeId, GrammarError> {
        self.register_under(NodeId::ROOT, builder)
    }

    /// Insert a subtree under `parent`, merging into same-name siblings.
    pub fn register_under(
        &mut self,
        parent: NodeId,
        builder: ArgumentBuilder<S>,
    ) -> Result<NodeId, GrammarError> {
        self.check_exists(parent)?;
        self.check_builder(&builder)?;
        self.check_merge(parent, &builder)?;
        Ok(self.insert(parent, builder))
    }

    /// A node that redirects never gains children by merging.
    fn check_merge(&self, parent: NodeId, builder: &ArgumentBuilder<S>) -> Result<(), GrammarError> {
        let Some(existing) = self.node_ref(parent).child(builder.name()) else {
            return Ok(());
        };
        let node = self.node_ref(existing);
        if node.is_literal() != matches!(builder.kind, BuilderKind::Literal(_)) {
            return Ok(());
        }
        if node.redirect.is_some() && !builder.children.is_empty() {
            return Err(GrammarError::ChildrenOnRedirect(builder.name().to_string()));
        }
        builder
            .children
            .iter()
            .try_for_each(|child| self.check_merge(existing, child))
    }

    fn check_builder(&self, builder: &ArgumentBuilder<S>) -> Result<(), GrammarError> {
        if let Some(err) = &builder.error {
            return Err(err.clone());
        }
        if let Some(target) = builder.target {
            self.check_exists(target)?;
        }
        builder
            .children
            .iter()
            .try_for_each(|child| self.check_builder(child))
    }

    fn insert(&mut self, parent: NodeId, builder: ArgumentBuilder<S>) -> NodeId {
        let ArgumentBuilder {
            kind,
            children,
            requirement,
            command,
            target,
            modifier,
            forks,
            ..
        } = builder;
        let (name, node_kind) = match kind {
            BuilderKind::Literal(literal) => (literal.clone(), NodeKind::Literal { literal }),
            BuilderKind::Argument {
                name,
                ty,
                suggestions,
            } => (
                name.clone(),
                NodeKind::Argument {
                    name,
                    ty,
                    suggestions,
                },
            ),
        };
        let is_literal = matches!(node_kind, NodeKind::Literal { .. });

        let id = match self.nodes[parent.index()].children.get(&name).copied() {
            Some(existing) => {
                let node = &self.nodes[existing.index()];
                if node.is_literal() != is_literal {
                    debug!(%parent, name = %name, "name collision between literal and argument");
                    self.collisions.push(NameCollision {
                        parent,
                        name,
                        kind: CollisionKind::MixedKinds,
                    });
                    return existing;
                }
                let same_modifier = match (&modifier, &node.modifier) {
                    (None, _) => true,
                    (Some(incoming), Some(current)) => Arc::ptr_eq(incoming, current),
                    (Some(_), None) => false,
                };
                let redirect_differs = target.is_some() && target != node.redirect;
                if redirect_differs || !same_modifier || (forks && !node.forks) {
                    debug!(%parent, name = %name, "merge would change an existing redirect");
                    self.collisions.push(NameCollision {
                        parent,
                        name: name.clone(),
                        kind: CollisionKind::ConflictingRedirect,
                    });
                }
                if command.is_some() {
                    self.nodes[existing.index()].command = command;
                }
                existing
            }
            None => {
                let id = NodeId(self.nodes.len() as u32);
                let mut node = CommandNode::new(node_kind, Some(parent));
                node.requirement = requirement;
                node.command = command;
                node.redirect = target;
                node.modifier = modifier;
                node.forks = forks;
                self.nodes.push(node);
                let parent_node = &mut self.nodes[parent.index()];
                parent_node.children.insert(name.clone(), id);
                if is_literal {
                    parent_node.literals.insert(name, id);
                } else {
                    parent_node.arguments.insert(name, id);
                }
                id
            }
        };
        for child in children {
            self.insert(id, child);
        }
        id
    }

    /// Register `name` as a top-level literal behaving exactly like `target`.
    ///
    /// Requirement and command are looked up on the target whenever they are
    /// needed, so later patches to the target apply to the alias too.
    pub fn register_alias(&mut self, name: &str, target: NodeId) -> Result<NodeId, GrammarError> {
        if target == NodeId::ROOT {
            return Err(GrammarError::RootMisuse);
        }
        self.check_exists(target)?;
        if let Some(existing) = self.nodes[NodeId::ROOT.index()].child(name) {
            warn!(name, "alias name already taken");
            self.collisions.push(NameCollision {
                parent: NodeId::ROOT,
                name: name.to_string(),
                kind: CollisionKind::ConflictingRedirect,
            });
            return Ok(existing);
        }
        let id = self.register(literal(name).redirect(target))?;
        self.nodes[id.index()].alias = true;
        Ok(id)
    }

    pub fn replace_requirement(
        &mut self,
        node: NodeId,
        predicate: impl Fn(&S) -> bool + Send + Sync + 'static,
    ) -> Result<(), GrammarError> {
        self.set_requirement(node, Requirement::Predicate(Arc::new(predicate)))
    }

    pub fn set_requirement(&mut self, node: NodeId, requirement: Requirement<S>) -> Result<(), GrammarError> {
        self.check_exists(node)?;
        self.nodes[node.index()].requirement = requirement;
        Ok(())
    }

    /// Follow redirects to the first node that does not redirect.
    pub fn resolve_redirects(&self, node: NodeId) -> Result<NodeId, GrammarError> {
        self.check_exists(node)?;
        let mut current = node;
        let mut seen = HashSet::new();
        while let Some(next) = self.nodes[current.index()].redirect {
            if !seen.insert(current) {
                return Err(GrammarError::RedirectCycle(self.path_string(node)));
            }
            self.check_exists(next)?;
            current = next;
        }
        Ok(current)
    }

    /// Node whose requirement and command apply to `node`.
    fn effective(&self, node: NodeId) -> Option<&CommandNode<S>> {
        let n = self.node(node)?;
        if !n.alias {
            return Some(n);
        }
        self.resolve_redirects(node).ok().and_then(|target| self.node(target))
    }

    /// Evaluate the node's requirement. A panicking predicate counts as unmet.
    pub fn can_use(&self, node: NodeId, source: &S) -> bool {
        let Some(n) = self.effective(node) else {
            return false;
        };
        match &n.requirement {
            Requirement::Always => true,
            Requirement::Predicate(predicate) => {
                match catch_unwind(AssertUnwindSafe(|| predicate(source))) {
                    Ok(allowed) => allowed,
                    Err(_) => {
                        warn!(%node, path = %self.path_string(node), "requirement predicate panicked");
                        false
                    }
                }
            }
        }
    }

    /// The executable action bound to `node`, looking through aliases.
    pub fn command_of(&self, node: NodeId) -> Option<&Command<S>> {
        self.effective(node).and_then(|n| n.command.as_ref())
    }

    pub fn get_path(&self, node: NodeId) -> Vec<String> {
        let mut path = Vec::new();
        let mut current = self.node(node);
        while let Some(n) = current {
            if matches!(n.kind, NodeKind::Root) {
                break;
            }
            path.push(n.name().to_string());
            current = n.parent.and_then(|p| self.node(p));
        }
        path.reverse();
        path
    }

    fn path_string(&self, node: NodeId) -> String {
        let path = self.get_path(node);
        if path.is_empty() {
            "<root>".to_string()
        } else {
            path.join(" ")
        }
    }

    pub fn find_node<I, T>(&self, path: I) -> Option<NodeId>
    where
        I: IntoIterator<Item = T>,
        T: AsRef<str>,
    {
        let mut current = NodeId::ROOT;
        for name in path {
            current = self.node(current)?.child(name.as_ref())?;
        }
        Some(current)
    }

    /// Every executable usage line reachable from `node`.
    pub fn get_all_usage(&self, node: NodeId, source: &S, restricted: bool) -> Vec<String> {
        let mut result = Vec::new();
        self.collect_all_usage(node, source, &mut result, "", restricted);
        result
    }

    fn collect_all_usage(
        &self,
        node: NodeId,
        source: &S,
        result: &mut Vec<String>,
        prefix: &str,
        restricted: bool,
    ) {
        if restricted && !self.can_use(node, source) {
            return;
        }
        let n = self.node_ref(node);
        if self.command_of(node).is_some() {
            result.push(prefix.to_string());
        }
        if let Some(target) = n.redirect {
            let redirect = self.redirect_usage(target);
            if prefix.is_empty() {
                result.push(format!("{}{ARGUMENT_SEPARATOR}{redirect}", n.usage_text()));
            } else {
                result.push(format!("{prefix}{ARGUMENT_SEPARATOR}{redirect}"));
            }
        } else {
            for child in n.children() {
                let child_usage = self.node_ref(child).usage_text();
                let next = if prefix.is_empty() {
                    child_usage
                } else {
                    format!("{prefix}{ARGUMENT_SEPARATOR}{child_usage}")
                };
                self.collect_all_usage(child, source, result, &next, restricted);
            }
        }
    }

    fn redirect_usage(&self, target: NodeId) -> String {
        if target == NodeId::ROOT {
            "...".to_string()
        } else {
            format!("-> {}", self.node_ref(target).usage_text())
        }
    }

    /// Condensed usage per visible child of `node`, e.g. `time (set|add|query)`.
    pub fn get_smart_usage(&self, node: NodeId, source: &S) -> IndexMap<NodeId, String> {
        let mut result = IndexMap::new();
        let Some(n) = self.node(node) else {
            return result;
        };
        let optional = self.command_of(node).is_some();
        for child in n.children() {
            if let Some(usage) = self.smart_usage(child, source, optional, false) {
                result.insert(child, usage);
            }
        }
        result
    }

    fn smart_usage(&self, node: NodeId, source: &S, optional: bool, deep: bool) -> Option<String> {
        if !self.can_use(node, source) {
            return None;
        }
        let n = self.node_ref(node);
        let this = if optional {
            format!("{USAGE_OPTIONAL_OPEN}{}{USAGE_OPTIONAL_CLOSE}", n.usage_text())
        } else {
            n.usage_text()
        };
        let child_optional = self.command_of(node).is_some();
        let (open, close) = if child_optional {
            (USAGE_OPTIONAL_OPEN, USAGE_OPTIONAL_CLOSE)
        } else {
            (USAGE_REQUIRED_OPEN, USAGE_REQUIRED_CLOSE)
        };
        if deep {
            return Some(this);
        }
        if let Some(target) = n.redirect {
            return Some(format!("{this}{ARGUMENT_SEPARATOR}{}", self.redirect_usage(target)));
        }
        let children: Vec<NodeId> = n.children().filter(|c| self.can_use(*c, source)).collect();
        if children.len() == 1 {
            if let Some(usage) = self.smart_usage(children[0], source, child_optional, child_optional) {
                return Some(format!("{this}{ARGUMENT_SEPARATOR}{usage}"));
            }
        } else if children.len() > 1 {
            let child_usage: IndexSet<String> = children
                .iter()
                .filter_map(|c| self.smart_usage(*c, source, child_optional, true))
                .collect();
            if child_usage.len() == 1 {
                let usage = &child_usage[0];
                let usage = if child_optional {
                    format!("{USAGE_OPTIONAL_OPEN}{usage}{USAGE_OPTIONAL_CLOSE}")
                } else {
                    usage.clone()
                };
                return Some(format!("{this}{ARGUMENT_SEPARATOR}{usage}"));
            } else if child_usage.len() > 1 {
                let alternatives: Vec<String> = children
                    .iter()
                    .map(|c| self.node_ref(*c).usage_text())
                    .collect();
                return Some(format!(
                    "{this}{ARGUMENT_SEPARATOR}{open}{}{close}",
                    alternatives.join(USAGE_OR)
                ));
            }
        }
        Some(this)
    }

    /// Whether `input` on its own would be accepted by `node`.
    pub fn is_valid_input(&self, node: NodeId, input: &str) -> bool {
        let Some(n) = self.node(node) else {
            return false;
        };
        match &n.kind {
            NodeKind::Root => false,
            NodeKind::Literal { literal } => crate::node::literal_end(literal, input).is_some(),
            NodeKind::Argument { ty, .. } => {
                let mut reader = StringReader::new(input);
                let parsed = catch_unwind(AssertUnwindSafe(|| ty.parse(&mut reader)));
                matches!(parsed, Ok(Ok(_)))
                    && (!reader.can_read() || reader.peek() == Some(ARGUMENT_SEPARATOR))
            }
        }
    }

    /// Report sibling pairs whose accepted inputs overlap.
    pub fn find_ambiguities(&self, mut consumer: impl FnMut(&Ambiguity)) {
        self.find_ambiguities_under(NodeId::ROOT, &mut consumer);
    }

    fn find_ambiguities_under(&self, parent: NodeId, consumer: &mut dyn FnMut(&Ambiguity)) {
        let children: Vec<NodeId> = self.node_ref(parent).children().collect();
        for &child in &children {
            for &sibling in &children {
                if child == sibling {
                    continue;
                }
                let inputs: Vec<String> = self
                    .node_ref(child)
                    .examples()
                    .into_iter()
                    .filter(|input| self.is_valid_input(sibling, input))
                    .collect();
                if !inputs.is_empty() {
                    consumer(&Ambiguity {
                        parent,
                        child,
                        sibling,
                        inputs,
                    });
                }
            }
            self.find_ambiguities_under(child, consumer);
        }
    }

    pub fn collisions(&self) -> &[NameCollision] {
        &self.collisions
    }

    /// Startup self-check over the whole grammar.
    pub fn validate(&self, registry: &ArgumentTypeRegistry) -> ValidationReport {
        let mut report = ValidationReport::default();
        for (index, node) in self.nodes.iter().enumerate() {
            let id = NodeId(index as u32);
            if node.redirect.is_some() {
                if let Err(err) = self.resolve_redirects(id) {
                    report.redirect_cycles.push(err);
                }
            }
            if let NodeKind::Argument { ty, .. } = &node.kind {
                let key = ty.type_key();
                if !registry.contains(key) {
                    report.unregistered_types.push(format!(
                        "argument '{}' uses unregistered type {key}",
                        self.path_string(id)
                    ));
                }
            }
        }
        for collision in &self.collisions {
            let parent = self.path_string(collision.parent);
            let name = &collision.name;
            report.collisions.push(match collision.kind {
                CollisionKind::MixedKinds => format!(
                    "'{name}' under {parent} is registered both as a literal and as an argument"
                ),
                CollisionKind::ConflictingRedirect => format!(
                    "'{name}' under {parent} is registered again with a different redirect"
                ),
            });
        }
        self.find_ambiguities(|ambiguity| {
            report.ambiguities.push(format!(
                "Ambiguity between arguments [{}] and [{}] with inputs: {}",
                self.path_string(ambiguity.child),
                self.path_string(ambiguity.sibling),
                ambiguity.inputs.join(", ")
            ));
        });
        report
    }

    /// Copy of the grammar restricted to what `source` may use.
    ///
    /// Requirements become unconditional, commands become no-ops and source
    /// modifiers are dropped, so the copy is safe to hand to a session for
    /// completion without running any real action. Redirects are remapped to
    /// the copied targets; redirects into invisible parts are dropped.
    pub fn project_for(&self, source: &S) -> CommandDispatcher<S> {
        let mut projected = CommandDispatcher::new();
        let mut mapping: IndexMap<NodeId, NodeId> = IndexMap::new();
        mapping.insert(NodeId::ROOT, NodeId::ROOT);
        self.project_children(NodeId::ROOT, NodeId::ROOT, source, &mut projected, &mut mapping);
        for (&old, &new) in &mapping {
            let redirect = self.node_ref(old).redirect;
            let remapped = redirect.and_then(|target| mapping.get(&target).copied());
            projected.nodes[new.index()].redirect = remapped;
            if remapped.is_none() {
                projected.nodes[new.index()].alias = false;
            }
        }
        projected
    }

    fn project_children(
        &self,
        old_parent: NodeId,
        new_parent: NodeId,
        source: &S,
        projected: &mut CommandDispatcher<S>,
        mapping: &mut IndexMap<NodeId, NodeId>,
    ) {
        for child in self.node_ref(old_parent).children() {
            if !self.can_use(child, source) {
                continue;
            }
            let old = self.node_ref(child);
            let new_id = NodeId(projected.nodes.len() as u32);
            let mut node = CommandNode::new(old.kind.clone(), Some(new_parent));
            if self.command_of(child).is_some() {
                node.command = Some(Command::Simple(Arc::new(|_| Ok(0))));
            }
            node.forks = old.forks;
            node.alias = old.alias;
            projected.nodes.push(node);
            let parent = &mut projected.nodes[new_parent.index()];
            let name = old.name().to_string();
            parent.children.insert(name.clone(), new_id);
            if old.is_literal() {
                parent.literals.insert(name, new_id);
            } else {
                parent.arguments.insert(name, new_id);
            }
            mapping.insert(child, new_id);
            self.project_children(child, new_id, source, projected, mapping);
        }
    }
}
