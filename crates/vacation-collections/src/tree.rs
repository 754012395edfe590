use crate::access::Access;
use crate::node::{Color, Link, Node, ParentLink};
use std::cmp::Ordering;
use std::sync::Arc;
use vacation_stm::{Aborted, TVar, Transaction};

/// Which child of its parent a node occupies. Threaded explicitly
/// through the delete fixup rather than inferred from pointer
/// comparisons, because the node being fixed up is frequently `None`
/// (the red-black "nil" in the sentinel-free translation this tree
/// uses) and a `None` child can't be told apart from an unrelated
/// `None` sibling by looking at the parent alone.
#[derive(Clone, Copy, PartialEq, Eq)]
enum Side {
    Left,
    Right,
}

/// A transactional, ordered, red-black-tree-backed map keyed by `i64`.
///
/// Every operation accepts `tx: Option<&mut Transaction<'_>>`: `Some`
/// runs the traversal/rotation through the STM (the parallel workload
/// path spec.md describes), `None` runs it directly against the
/// `TVar`s with no validation (the sequential setup/cleanup path, safe
/// only because no other thread touches the tree while it runs).
pub struct TxMap<V: Clone + Send + Sync + 'static> {
    root: Arc<TVar<Link<V>>>,
}

impl<V: Clone + Send + Sync + 'static> Clone for TxMap<V> {
    /// Cloning a `TxMap` shares the same backing tree (clones the
    /// `Arc` root pointer) rather than copying entries — the same
    /// convention as cloning an `Arc<Mutex<_>>`. This is what lets a
    /// `Customer`'s reservation-info set live inside a `Customer` value
    /// that the outer relation tables themselves clone on every read.
    fn clone(&self) -> Self {
        Self { root: self.root.clone() }
    }
}

impl<V: Clone + Send + Sync + 'static> TxMap<V> {
    pub fn new() -> Self {
        Self { root: TVar::new(None) }
    }

    pub fn find(&self, tx: Option<&mut Transaction<'_>>, key: i64) -> Result<Option<V>, Aborted> {
        let mut access = Access::new(tx);
        let node = locate(&mut access, &self.root, key)?;
        match node {
            Some(node) => Ok(Some(access.read(&node.value)?)),
            None => Ok(None),
        }
    }

    pub fn contains(&self, tx: Option<&mut Transaction<'_>>, key: i64) -> Result<bool, Aborted> {
        Ok(self.find(tx, key)?.is_some())
    }

    /// Returns the `TVar` backing `key`'s value, if present, without
    /// reading it. Lets a caller that needs to read-modify-write a
    /// value (the reservation operations in `vacation-reservation`) do
    /// so with a single tree lookup instead of a `find` followed by a
    /// separate `update` traversal.
    pub fn value_cell(
        &self,
        tx: Option<&mut Transaction<'_>>,
        key: i64,
    ) -> Result<Option<Arc<TVar<V>>>, Aborted> {
        let mut access = Access::new(tx);
        Ok(locate(&mut access, &self.root, key)?.map(|node| node.value.clone()))
    }

    /// Inserts `key -> value`. Returns `false` without modifying the
    /// tree if `key` is already present (spec.md's
    /// `insert(k, v) -> bool` contract; overwriting an existing key is
    /// [`TxMap::update`]'s job, not this one's).
    pub fn insert(&self, tx: Option<&mut Transaction<'_>>, key: i64, value: V) -> Result<bool, Aborted> {
        let mut access = Access::new(tx);

        let mut parent: Link<V> = None;
        let mut current = access.read(&self.root)?;
        while let Some(node) = current {
            match key.cmp(&node.key) {
                Ordering::Equal => return Ok(false),
                Ordering::Less => {
                    current = access.read(&node.left)?;
                    parent = Some(node);
                }
                Ordering::Greater => {
                    current = access.read(&node.right)?;
                    parent = Some(node);
                }
            }
        }

        let new_node = access.alloc(Node::leaf(key, value));
        set_parent(&mut access, &new_node, &parent);
        match &parent {
            None => access.write(&self.root, Some(new_node.clone())),
            Some(p) => {
                if key < p.key {
                    access.write(&p.left, Some(new_node.clone()));
                } else {
                    access.write(&p.right, Some(new_node.clone()));
                }
            }
        }

        insert_fixup(&mut access, &self.root, new_node)?;
        Ok(true)
    }

    /// Overwrites the value stored at `key`. Returns `false` without
    /// modifying the tree if `key` is absent.
    pub fn update(&self, tx: Option<&mut Transaction<'_>>, key: i64, value: V) -> Result<bool, Aborted> {
        let mut access = Access::new(tx);
        match locate(&mut access, &self.root, key)? {
            Some(node) => {
                access.write(&node.value, value);
                Ok(true)
            }
            None => Ok(false),
        }
    }

    pub fn remove(&self, tx: Option<&mut Transaction<'_>>, key: i64) -> Result<bool, Aborted> {
        let mut access = Access::new(tx);
        match locate(&mut access, &self.root, key)? {
            Some(node) => {
                delete_node(&mut access, &self.root, node)?;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    /// Snapshots every `(key, value)` pair in ascending key order.
    ///
    /// Not part of spec.md §4.2's minimal find/insert/remove/update/
    /// contains contract, but §4.4's `deleteCustomer` needs to walk a
    /// customer's whole reservation-info set to decrement every
    /// referenced relation's `numUsed` before removing the customer,
    /// and no narrower primitive expresses that — so the ordered map
    /// gains one traversal operation to make that possible. Every
    /// visited node is still read through `Transaction::read`, so a
    /// concurrent structural change to the set invalidates the
    /// snapshot's transaction at commit exactly as any other read
    /// would.
    pub fn entries(&self, tx: Option<&mut Transaction<'_>>) -> Result<Vec<(i64, V)>, Aborted> {
        let mut access = Access::new(tx);
        let mut out = Vec::new();
        let root = access.read(&self.root)?;
        walk_in_order(&mut access, &root, &mut out)?;
        Ok(out)
    }
}

fn walk_in_order<V: Clone + Send + Sync + 'static>(
    access: &mut Access<'_, '_>,
    link: &Link<V>,
    out: &mut Vec<(i64, V)>,
) -> Result<(), Aborted> {
    let Some(node) = link else { return Ok(()) };
    let left = access.read(&node.left)?;
    walk_in_order(access, &left, out)?;
    let value = access.read(&node.value)?;
    out.push((node.key, value));
    let right = access.read(&node.right)?;
    walk_in_order(access, &right, out)?;
    Ok(())
}

impl<V: Clone + Send + Sync + 'static> Default for TxMap<V> {
    fn default() -> Self {
        Self::new()
    }
}

fn locate<V: Clone + Send + Sync + 'static>(
    access: &mut Access<'_, '_>,
    root: &Arc<TVar<Link<V>>>,
    key: i64,
) -> Result<Link<V>, Aborted> {
    let mut current = access.read(root)?;
    while let Some(node) = current {
        match key.cmp(&node.key) {
            Ordering::Equal => return Ok(Some(node)),
            Ordering::Less => current = access.read(&node.left)?,
            Ordering::Greater => current = access.read(&node.right)?,
        }
    }
    Ok(None)
}

fn color_of<V: Clone + Send + Sync + 'static>(
    access: &mut Access<'_, '_>,
    link: &Link<V>,
) -> Result<Color, Aborted> {
    match link {
        None => Ok(Color::Black),
        Some(node) => access.read(&node.color),
    }
}

fn parent_of<V: Clone + Send + Sync + 'static>(
    access: &mut Access<'_, '_>,
    node: &Arc<Node<V>>,
) -> Result<Link<V>, Aborted> {
    let parent: ParentLink<V> = access.read(&node.parent)?;
    Ok(parent.and_then(|weak| weak.upgrade()))
}

fn set_parent<V: Clone + Send + Sync + 'static>(
    access: &mut Access<'_, '_>,
    node: &Arc<Node<V>>,
    parent: &Link<V>,
) {
    access.write(&node.parent, parent.as_ref().map(Arc::downgrade));
}

fn side_of<V: Clone + Send + Sync + 'static>(
    access: &mut Access<'_, '_>,
    node: &Arc<Node<V>>,
) -> Result<Side, Aborted> {
    match parent_of(access, node)? {
        None => Ok(Side::Left), // root: caller never inspects this
        Some(parent) => {
            let left = access.read(&parent.left)?;
            if left.as_ref().map(Arc::as_ptr) == Some(Arc::as_ptr(node)) {
                Ok(Side::Left)
            } else {
                Ok(Side::Right)
            }
        }
    }
}

fn rotate_left<V: Clone + Send + Sync + 'static>(
    access: &mut Access<'_, '_>,
    root: &Arc<TVar<Link<V>>>,
    x: &Arc<Node<V>>,
) -> Result<(), Aborted> {
    let y = access
        .read(&x.right)?
        .expect("rotate_left requires x to have a right child");
    let y_left = access.read(&y.left)?;
    access.write(&x.right, y_left.clone());
    if let Some(ref yl) = y_left {
        set_parent(access, yl, &Some(x.clone()));
    }
    let x_parent = parent_of(access, x)?;
    set_parent(access, &y, &x_parent);
    match &x_parent {
        None => access.write(root, Some(y.clone())),
        Some(p) => {
            let p_left = access.read(&p.left)?;
            if p_left.as_ref().map(Arc::as_ptr) == Some(Arc::as_ptr(x)) {
                access.write(&p.left, Some(y.clone()));
            } else {
                access.write(&p.right, Some(y.clone()));
            }
        }
    }
    access.write(&y.left, Some(x.clone()));
    set_parent(access, x, &Some(y));
    Ok(())
}

fn rotate_right<V: Clone + Send + Sync + 'static>(
    access: &mut Access<'_, '_>,
    root: &Arc<TVar<Link<V>>>,
    x: &Arc<Node<V>>,
) -> Result<(), Aborted> {
    let y = access
        .read(&x.left)?
        .expect("rotate_right requires x to have a left child");
    let y_right = access.read(&y.right)?;
    access.write(&x.left, y_right.clone());
    if let Some(ref yr) = y_right {
        set_parent(access, yr, &Some(x.clone()));
    }
    let x_parent = parent_of(access, x)?;
    set_parent(access, &y, &x_parent);
    match &x_parent {
        None => access.write(root, Some(y.clone())),
        Some(p) => {
            let p_left = access.read(&p.left)?;
            if p_left.as_ref().map(Arc::as_ptr) == Some(Arc::as_ptr(x)) {
                access.write(&p.left, Some(y.clone()));
            } else {
                access.write(&p.right, Some(y.clone()));
            }
        }
    }
    access.write(&y.right, Some(x.clone()));
    set_parent(access, x, &Some(y));
    Ok(())
}

fn insert_fixup<V: Clone + Send + Sync + 'static>(
    access: &mut Access<'_, '_>,
    root: &Arc<TVar<Link<V>>>,
    mut z: Arc<Node<V>>,
) -> Result<(), Aborted> {
    loop {
        let z_parent = match parent_of(access, &z)? {
            Some(p) => p,
            None => break,
        };
        if access.read(&z_parent.color)? != Color::Red {
            break;
        }
        let z_grandparent = match parent_of(access, &z_parent)? {
            Some(g) => g,
            None => break, // a red root's parent can't exist; defensive only
        };
        let gp_left = access.read(&z_grandparent.left)?;
        let parent_is_left = gp_left.as_ref().map(Arc::as_ptr) == Some(Arc::as_ptr(&z_parent));

        if parent_is_left {
            let uncle = access.read(&z_grandparent.right)?;
            if color_of(access, &uncle)? == Color::Red {
                access.write(&z_parent.color, Color::Black);
                access.write(&uncle.unwrap().color, Color::Black);
                access.write(&z_grandparent.color, Color::Red);
                z = z_grandparent;
            } else {
                let p_right = access.read(&z_parent.right)?;
                if p_right.as_ref().map(Arc::as_ptr) == Some(Arc::as_ptr(&z)) {
                    z = z_parent.clone();
                    rotate_left(access, root, &z)?;
                }
                let z_parent = parent_of(access, &z)?.expect("z keeps a parent after a same-side rotation");
                let z_grandparent =
                    parent_of(access, &z_parent)?.expect("z keeps a grandparent after a same-side rotation");
                access.write(&z_parent.color, Color::Black);
                access.write(&z_grandparent.color, Color::Red);
                rotate_right(access, root, &z_grandparent)?;
            }
        } else {
            let uncle = access.read(&z_grandparent.left)?;
            if color_of(access, &uncle)? == Color::Red {
                access.write(&z_parent.color, Color::Black);
                access.write(&uncle.unwrap().color, Color::Black);
                access.write(&z_grandparent.color, Color::Red);
                z = z_grandparent;
            } else {
                let p_left = access.read(&z_parent.left)?;
                if p_left.as_ref().map(Arc::as_ptr) == Some(Arc::as_ptr(&z)) {
                    z = z_parent.clone();
                    rotate_right(access, root, &z)?;
                }
                let z_parent = parent_of(access, &z)?.expect("z keeps a parent after a same-side rotation");
                let z_grandparent =
                    parent_of(access, &z_parent)?.expect("z keeps a grandparent after a same-side rotation");
                access.write(&z_parent.color, Color::Black);
                access.write(&z_grandparent.color, Color::Red);
                rotate_left(access, root, &z_grandparent)?;
            }
        }
    }

    let root_node = access.read(root)?.expect("tree is non-empty immediately after an insert");
    access.write(&root_node.color, Color::Black);
    Ok(())
}

fn minimum<V: Clone + Send + Sync + 'static>(
    access: &mut Access<'_, '_>,
    mut node: Arc<Node<V>>,
) -> Result<Arc<Node<V>>, Aborted> {
    loop {
        match access.read(&node.left)? {
            Some(left) => node = left,
            None => return Ok(node),
        }
    }
}

fn transplant<V: Clone + Send + Sync + 'static>(
    access: &mut Access<'_, '_>,
    root: &Arc<TVar<Link<V>>>,
    u: &Arc<Node<V>>,
    v: &Link<V>,
) -> Result<(), Aborted> {
    let u_parent = parent_of(access, u)?;
    match &u_parent {
        None => access.write(root, v.clone()),
        Some(p) => {
            let p_left = access.read(&p.left)?;
            if p_left.as_ref().map(Arc::as_ptr) == Some(Arc::as_ptr(u)) {
                access.write(&p.left, v.clone());
            } else {
                access.write(&p.right, v.clone());
            }
        }
    }
    if let Some(vn) = v {
        set_parent(access, vn, &u_parent);
    }
    Ok(())
}

fn delete_node<V: Clone + Send + Sync + 'static>(
    access: &mut Access<'_, '_>,
    root: &Arc<TVar<Link<V>>>,
    z: Arc<Node<V>>,
) -> Result<(), Aborted> {
    let mut y = z.clone();
    let mut y_original_color = access.read(&y.color)?;
    let x: Link<V>;
    let x_parent: Link<V>;
    let x_side: Side;

    let z_left = access.read(&z.left)?;
    let z_right = access.read(&z.right)?;

    if z_left.is_none() {
        x = z_right.clone();
        x_side = side_of(access, &z)?;
        x_parent = parent_of(access, &z)?;
        transplant(access, root, &z, &z_right)?;
    } else if z_right.is_none() {
        x = z_left.clone();
        x_side = side_of(access, &z)?;
        x_parent = parent_of(access, &z)?;
        transplant(access, root, &z, &z_left)?;
    } else {
        let successor = minimum(access, z_right.clone().unwrap())?;
        y = successor.clone();
        y_original_color = access.read(&y.color)?;
        x = access.read(&y.right)?;

        let y_parent_is_z = parent_of(access, &y)?
            .map(|p| Arc::ptr_eq(&p, &z))
            .unwrap_or(false);

        if y_parent_is_z {
            x_parent = Some(y.clone());
            x_side = Side::Right; // y is minimum(z.right) so y has no left child; x is always y's right child
            if let Some(ref xn) = x {
                set_parent(access, xn, &Some(y.clone()));
            }
        } else {
            x_side = side_of(access, &y)?;
            x_parent = parent_of(access, &y)?;
            transplant(access, root, &y, &x)?;
            let z_right_now = access.read(&z.right)?.unwrap();
            access.write(&y.right, Some(z_right_now.clone()));
            set_parent(access, &z_right_now, &Some(y.clone()));
        }

        transplant(access, root, &z, &Some(y.clone()))?;
        let z_left_now = access.read(&z.left)?.unwrap();
        access.write(&y.left, Some(z_left_now.clone()));
        set_parent(access, &z_left_now, &Some(y.clone()));
        let z_color = access.read(&z.color)?;
        access.write(&y.color, z_color);
    }

    access.free(z);

    if y_original_color == Color::Black {
        delete_fixup(access, root, x, x_parent, x_side)?;
    }
    Ok(())
}

fn delete_fixup<V: Clone + Send + Sync + 'static>(
    access: &mut Access<'_, '_>,
    root: &Arc<TVar<Link<V>>>,
    mut x: Link<V>,
    mut x_parent: Link<V>,
    mut x_side: Side,
) -> Result<(), Aborted> {
    loop {
        let parent = match &x_parent {
            Some(p) => p.clone(),
            None => break,
        };
        if color_of(access, &x)? != Color::Black {
            break;
        }

        match x_side {
            Side::Left => {
                let mut w = access
                    .read(&parent.right)?
                    .expect("x's sibling cannot be nil while x is a black non-root node");
                if access.read(&w.color)? == Color::Red {
                    access.write(&w.color, Color::Black);
                    access.write(&parent.color, Color::Red);
                    rotate_left(access, root, &parent)?;
                    w = access.read(&parent.right)?.expect("sibling exists after rotation");
                }
                let w_left = access.read(&w.left)?;
                let w_right = access.read(&w.right)?;
                if color_of(access, &w_left)? == Color::Black && color_of(access, &w_right)? == Color::Black {
                    access.write(&w.color, Color::Red);
                    x_side = side_of(access, &parent)?;
                    x = Some(parent.clone());
                    x_parent = parent_of(access, &parent)?;
                } else {
                    if color_of(access, &w_right)? == Color::Black {
                        if let Some(wl) = access.read(&w.left)? {
                            access.write(&wl.color, Color::Black);
                        }
                        access.write(&w.color, Color::Red);
                        rotate_right(access, root, &w)?;
                        w = access.read(&parent.right)?.expect("sibling exists after rotation");
                    }
                    let parent_color = access.read(&parent.color)?;
                    access.write(&w.color, parent_color);
                    access.write(&parent.color, Color::Black);
                    if let Some(wr) = access.read(&w.right)? {
                        access.write(&wr.color, Color::Black);
                    }
                    rotate_left(access, root, &parent)?;
                    x = access.read(root)?;
                    x_parent = None;
                    break;
                }
            }
            Side::Right => {
                let mut w = access
                    .read(&parent.left)?
                    .expect("x's sibling cannot be nil while x is a black non-root node");
                if access.read(&w.color)? == Color::Red {
                    access.write(&w.color, Color::Black);
                    access.write(&parent.color, Color::Red);
                    rotate_right(access, root, &parent)?;
                    w = access.read(&parent.left)?.expect("sibling exists after rotation");
                }
                let w_left = access.read(&w.left)?;
                let w_right = access.read(&w.right)?;
                if color_of(access, &w_left)? == Color::Black && color_of(access, &w_right)? == Color::Black {
                    access.write(&w.color, Color::Red);
                    x_side = side_of(access, &parent)?;
                    x = Some(parent.clone());
                    x_parent = parent_of(access, &parent)?;
                } else {
                    if color_of(access, &w_left)? == Color::Black {
                        if let Some(wr) = access.read(&w.right)? {
                            access.write(&wr.color, Color::Black);
                        }
                        access.write(&w.color, Color::Red);
                        rotate_left(access, root, &w)?;
                        w = access.read(&parent.left)?.expect("sibling exists after rotation");
                    }
                    let parent_color = access.read(&parent.color)?;
                    access.write(&w.color, parent_color);
                    access.write(&parent.color, Color::Black);
                    if let Some(wl) = access.read(&w.left)? {
                        access.write(&wl.color, Color::Black);
                    }
                    rotate_right(access, root, &parent)?;
                    x = access.read(root)?;
                    x_parent = None;
                    break;
                }
            }
        }
    }

    if let Some(ref xn) = x {
        access.write(&xn.color, Color::Black);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn assert_rb_invariants<V: Clone + Send + Sync + 'static>(map: &TxMap<V>) {
        // Returns (subtree min key, subtree max key, black-height), so
        // BST order can be checked against the true bounds of each
        // subtree rather than just its root.
        fn check<V: Clone + Send + Sync + 'static>(
            access: &mut Access<'_, '_>,
            node: &Link<V>,
        ) -> Result<(i64, i64, u32), Aborted> {
            match node {
                None => Ok((i64::MAX, i64::MIN, 1)), // empty range; black-height of a nil leaf is 1
                Some(n) => {
                    let color = access.read(&n.color)?;
                    let left = access.read(&n.left)?;
                    let right = access.read(&n.right)?;
                    if color == Color::Red {
                        assert_eq!(color_of(access, &left).unwrap(), Color::Black, "red node with red child");
                        assert_eq!(color_of(access, &right).unwrap(), Color::Black, "red node with red child");
                    }
                    let (left_min, left_max, left_bh) = check(access, &left)?;
                    let (right_min, right_max, right_bh) = check(access, &right)?;
                    if left.is_some() {
                        assert!(left_max < n.key, "BST order violated on the left");
                    }
                    if right.is_some() {
                        assert!(right_min > n.key, "BST order violated on the right");
                    }
                    assert_eq!(left_bh, right_bh, "black-height mismatch");
                    let bh = left_bh + if color == Color::Black { 1 } else { 0 };
                    let min = if left.is_some() { left_min } else { n.key };
                    let max = if right.is_some() { right_max } else { n.key };
                    Ok((min, max, bh))
                }
            }
        }
        let mut access = Access::new(None);
        let root = access.read(&map.root).unwrap();
        assert_eq!(
            color_of(&mut access, &root).unwrap(),
            Color::Black,
            "root must be black"
        );
        check(&mut access, &root).unwrap();
    }

    #[test]
    fn insert_find_and_contains() {
        let map: TxMap<i64> = TxMap::new();
        assert!(map.insert(None, 5, 50).unwrap());
        assert!(map.insert(None, 3, 30).unwrap());
        assert!(map.insert(None, 8, 80).unwrap());
        assert!(!map.insert(None, 5, 999).unwrap()); // duplicate key

        assert_eq!(map.find(None, 5).unwrap(), Some(50));
        assert_eq!(map.find(None, 3).unwrap(), Some(30));
        assert_eq!(map.find(None, 99).unwrap(), None);
        assert!(map.contains(None, 8).unwrap());
        assert!(!map.contains(None, 99).unwrap());
        assert_rb_invariants(&map);
    }

    #[test]
    fn update_only_touches_existing_keys() {
        let map: TxMap<i64> = TxMap::new();
        map.insert(None, 1, 10).unwrap();
        assert!(map.update(None, 1, 11).unwrap());
        assert_eq!(map.find(None, 1).unwrap(), Some(11));
        assert!(!map.update(None, 2, 20).unwrap());
        assert_eq!(map.find(None, 2).unwrap(), None);
    }

    #[test]
    fn remove_absent_key_returns_false() {
        let map: TxMap<i64> = TxMap::new();
        map.insert(None, 1, 10).unwrap();
        assert!(!map.remove(None, 2).unwrap());
        assert!(map.remove(None, 1).unwrap());
        assert_eq!(map.find(None, 1).unwrap(), None);
    }

    #[test]
    fn insertion_preserves_red_black_invariants_under_many_keys() {
        let map: TxMap<i64> = TxMap::new();
        // Ascending insert order is the classic red-black stress case.
        for k in 0..500 {
            assert!(map.insert(None, k, k * 10).unwrap());
            assert_rb_invariants(&map);
        }
        for k in 0..500 {
            assert_eq!(map.find(None, k).unwrap(), Some(k * 10));
        }
    }

    #[test]
    fn deletion_preserves_red_black_invariants_under_many_keys() {
        let map: TxMap<i64> = TxMap::new();
        for k in 0..300 {
            map.insert(None, k, k).unwrap();
        }
        // Remove every third key, then every remaining even key.
        for k in (0..300).step_by(3) {
            assert!(map.remove(None, k).unwrap());
            assert_rb_invariants(&map);
        }
        for k in (1..300).step_by(2) {
            if map.contains(None, k).unwrap() {
                map.remove(None, k).unwrap();
                assert_rb_invariants(&map);
            }
        }
    }

    #[test]
    fn concurrent_inserts_from_many_clients_all_land() {
        let stm = vacation_stm::Stm::new();
        let map: Arc<TxMap<i64>> = Arc::new(TxMap::new());
        std::thread::scope(|scope| {
            for t in 0..8i64 {
                let stm = stm.clone();
                let map = map.clone();
                scope.spawn(move || {
                    for i in 0..50i64 {
                        let key = t * 1000 + i;
                        stm.atomically(false, |tx| map.insert(Some(tx), key, key));
                    }
                });
            }
        });
        for t in 0..8i64 {
            for i in 0..50i64 {
                let key = t * 1000 + i;
                assert_eq!(map.find(None, key).unwrap(), Some(key));
            }
        }
        assert_rb_invariants(&map);
    }
}
