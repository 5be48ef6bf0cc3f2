//! Per-node listener registry.
//!
//! Listeners are owned by the registry and keyed by node identity. They run
//! synchronously, after the node they watch has been fully updated. A
//! listener only ever sees a shared reference to the payload and cannot reach
//! the graph that owns it, so notification cannot re-enter a mutation.

use crate::NodeId;
use std::collections::HashMap;

pub type Listener<T> = Box<dyn FnMut(NodeId, &T)>;

/// Handle returned by `subscribe`, used to unsubscribe later.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId {
    node: NodeId,
    seq: u64,
}

pub(crate) struct ObserverRegistry<T> {
    next_seq: u64,
    listeners: HashMap<NodeId, Vec<(u64, Listener<T>)>>,
}

impl<T> ObserverRegistry<T> {
    pub(crate) fn new() -> Self {
        Self {
            next_seq: 0,
            listeners: HashMap::new(),
        }
    }

    pub(crate) fn subscribe(&mut self, node: NodeId, listener: Listener<T>) -> SubscriptionId {
        let seq = self.next_seq;
        self.next_seq += 1;
        self.listeners.entry(node).or_default().push((seq, listener));
        SubscriptionId { node, seq }
    }

    pub(crate) fn unsubscribe(&mut self, subscription: SubscriptionId) -> bool {
        let Some(entries) = self.listeners.get_mut(&subscription.node) else {
            return false;
        };
        let before = entries.len();
        entries.retain(|(seq, _)| *seq != subscription.seq);
        let removed = entries.len() != before;
        if entries.is_empty() {
            self.listeners.remove(&subscription.node);
        }
        removed
    }

    /// Invoke every listener of `node`, in subscription order.
    pub(crate) fn notify(&mut self, node: NodeId, data: &T) {
        if let Some(entries) = self.listeners.get_mut(&node) {
            for (_, listener) in entries.iter_mut() {
                listener(node, data);
            }
        }
    }

    pub(crate) fn len(&self) -> usize {
        self.listeners.values().map(Vec::len).sum()
    }
}
