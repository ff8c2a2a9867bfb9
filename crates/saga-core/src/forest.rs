//! The event forest arena.
//!
//! Trees arrive fully built from the loader. The scheduler flattens them
//! into a single id-keyed node arena plus per-tree metadata, so branches
//! can name follow-on events in any tree without owning pointers.

use std::cmp::Reverse;
use std::collections::{BTreeMap, BTreeSet, btree_map::Entry};

use saga_types::{EventId, EventNode, EventTree, EventType, TreeId};
use tracing::warn;

/// Tree metadata kept after its nodes move into the arena.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TreeInfo {
    /// Tree id.
    pub id: TreeId,
    /// Display name.
    pub name: String,
    /// Narrative category.
    pub tree_type: EventType,
    /// Scan priority; higher first.
    pub priority: i32,
    /// Whether the story needs this tree to settle.
    pub is_required: bool,
    /// The root node id.
    pub root_event: EventId,
    /// Every node id of the tree, root first.
    pub events: Vec<EventId>,
    /// Advisory dependency hints; never enforced by the scheduler.
    pub event_dependencies: BTreeMap<EventId, Vec<EventId>>,
}

impl TreeInfo {
    /// Advisory dependencies declared for `event_id`.
    pub fn dependencies_of(&self, event_id: &EventId) -> &[EventId] {
        self.event_dependencies
            .get(event_id)
            .map(Vec::as_slice)
            .unwrap_or_default()
    }
}

/// All trees and their nodes, flattened.
#[derive(Debug, Clone, Default)]
pub struct Forest {
    trees: BTreeMap<TreeId, TreeInfo>,
    nodes: BTreeMap<EventId, EventNode>,
    owner: BTreeMap<EventId, TreeId>,
    /// Node ids in activation scan order: trees by priority (desc) then id,
    /// nodes in tree order.
    scan_order: Vec<EventId>,
    /// Ids named by some branch's `next_events`.
    branch_targets: BTreeSet<EventId>,
}

impl Forest {
    /// Flatten `trees` into an arena.
    ///
    /// A duplicate tree id drops the later tree, and so does a root id
    /// already claimed by an earlier tree. Any other node id seen in an
    /// earlier tree is skipped; the root repeated inside its own tree's
    /// event list is expected and skipped silently.
    pub fn build(trees: impl IntoIterator<Item = EventTree>) -> Self {
        let mut ordered: Vec<EventTree> = trees.into_iter().collect();
        ordered.sort_by(|a, b| (Reverse(a.priority), &a.id).cmp(&(Reverse(b.priority), &b.id)));

        let mut forest = Self::default();
        for tree in ordered {
            if forest.trees.contains_key(&tree.id) {
                warn!(tree_id = %tree.id, "Duplicate tree id, skipping tree");
                continue;
            }

            let root_id = tree.root_event.id.clone();
            if forest.nodes.contains_key(&root_id) {
                warn!(
                    tree_id = %tree.id,
                    event_id = %root_id,
                    owner = ?forest.owner.get(&root_id).map(TreeId::as_str),
                    "Root event id already taken, skipping tree"
                );
                continue;
            }
            let mut events = Vec::new();
            forest.insert_node(&tree.id, tree.root_event, &mut events);
            for node in tree.all_events {
                if node.id == root_id {
                    continue;
                }
                forest.insert_node(&tree.id, node, &mut events);
            }

            forest.trees.insert(
                tree.id.clone(),
                TreeInfo {
                    id: tree.id,
                    name: tree.name,
                    tree_type: tree.tree_type,
                    priority: tree.priority,
                    is_required: tree.is_required,
                    root_event: root_id,
                    events,
                    event_dependencies: tree.event_dependencies,
                },
            );
        }
        forest
    }

    fn insert_node(&mut self, tree_id: &TreeId, node: EventNode, events: &mut Vec<EventId>) {
        match self.nodes.entry(node.id.clone()) {
            Entry::Occupied(_) => {
                warn!(
                    tree_id = %tree_id,
                    event_id = %node.id,
                    owner = ?self.owner.get(&node.id).map(TreeId::as_str),
                    "Duplicate event id, keeping the first occurrence"
                );
            }
            Entry::Vacant(slot) => {
                let id = node.id.clone();
                self.branch_targets.extend(
                    node.branches
                        .iter()
                        .flat_map(|b| b.next_events.iter().map(|n| n.event_id.clone())),
                );
                slot.insert(node);
                self.owner.insert(id.clone(), tree_id.clone());
                self.scan_order.push(id.clone());
                events.push(id);
            }
        }
    }

    /// Look up a node.
    pub fn node(&self, event_id: &EventId) -> Option<&EventNode> {
        self.nodes.get(event_id)
    }

    /// Look up a node mutably.
    pub fn node_mut(&mut self, event_id: &EventId) -> Option<&mut EventNode> {
        self.nodes.get_mut(event_id)
    }

    /// Look up tree metadata.
    pub fn tree(&self, tree_id: &TreeId) -> Option<&TreeInfo> {
        self.trees.get(tree_id)
    }

    /// The tree that owns `event_id`.
    pub fn tree_of(&self, event_id: &EventId) -> Option<&TreeInfo> {
        self.owner.get(event_id).and_then(|t| self.trees.get(t))
    }

    /// Every tree, keyed by id.
    pub const fn trees(&self) -> &BTreeMap<TreeId, TreeInfo> {
        &self.trees
    }

    /// Root ids in scan order.
    pub fn roots(&self) -> Vec<EventId> {
        let mut trees: Vec<&TreeInfo> = self.trees.values().collect();
        trees.sort_by(|a, b| (Reverse(a.priority), &a.id).cmp(&(Reverse(b.priority), &b.id)));
        trees.into_iter().map(|t| t.root_event.clone()).collect()
    }

    /// Whether some branch schedules `event_id` as a follow-on.
    pub fn is_branch_target(&self, event_id: &EventId) -> bool {
        self.branch_targets.contains(event_id)
    }

    /// Node ids in scan order.
    pub fn scan_order(&self) -> &[EventId] {
        &self.scan_order
    }

    /// Number of nodes.
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// Whether the forest holds no nodes.
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }
}
