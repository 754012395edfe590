use std::sync::{Arc, Weak};
use vacation_stm::TVar;

/// Red-black colors. `None` child links are treated as black leaves
/// (the standard CLRS sentinel-free convention) rather than allocating
/// an actual nil node per `TVar`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Color {
    Red,
    Black,
}

pub(crate) type Link<V> = Option<Arc<Node<V>>>;
pub(crate) type ParentLink<V> = Option<Weak<Node<V>>>;

/// One tree node. Every field but `key` is a shared transactional
/// word: color, value, and the three links are each a `TVar`, so a
/// traversal step or a rotation is built entirely out of
/// `Transaction::read`/`write` calls, matching spec.md §4.2's "Node
/// fields ... are shared words" requirement. `key` never changes after
/// a node is created, so wrapping it in a `TVar` would add validation
/// overhead the algorithm never needs.
pub(crate) struct Node<V: Clone + Send + Sync + 'static> {
    pub(crate) key: i64,
    pub(crate) color: Arc<TVar<Color>>,
    pub(crate) value: Arc<TVar<V>>,
    pub(crate) left: Arc<TVar<Link<V>>>,
    pub(crate) right: Arc<TVar<Link<V>>>,
    pub(crate) parent: Arc<TVar<ParentLink<V>>>,
}

impl<V: Clone + Send + Sync + 'static> Node<V> {
    pub(crate) fn leaf(key: i64, value: V) -> Self {
        Self {
            key,
            color: TVar::new(Color::Red),
            value: TVar::new(value),
            left: TVar::new(None),
            right: TVar::new(None),
            parent: TVar::new(None),
        }
    }
}
