//! Ordered discovery index: a balanced search tree over (bucket key,
//! request id) pairs, backed by an explicit arena of nodes addressed by
//! `u32` handles so the whole structure round-trips through contract
//! storage as one value.
//!
//! Entries are totally ordered by `(key, id)`. Ids are allocated in
//! creation order, so equal keys tie-break deterministically and replaying
//! the same insert/remove sequence rebuilds the identical tree shape on any
//! observer.

use soroban_sdk::{contracttype, Env, Vec};

/// Null handle. Marks an empty root and absent children.
pub const NIL: u32 = u32::MAX;

#[contracttype]
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct IndexNode {
    pub key: u64,
    pub id: u32,
    pub left: u32,
    pub right: u32,
    pub height: u32,
}

/// One (key, id) pair, as returned by neighbor queries.
#[contracttype]
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct IndexEntry {
    pub key: u64,
    pub id: u32,
}

#[contracttype]
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct ScheduleIndex {
    pub root: u32,
    pub nodes: Vec<IndexNode>,
    pub free: Vec<u32>,
}

impl ScheduleIndex {
    pub fn new(env: &Env) -> Self {
        ScheduleIndex {
            root: NIL,
            nodes: Vec::new(env),
            free: Vec::new(env),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.root == NIL
    }

    /// Live entry count (arena slots minus recycled ones).
    pub fn len(&self) -> u32 {
        self.nodes.len() - self.free.len()
    }

    /// Inserts an entry. Inserting a pair that is already present is a
    /// no-op, keeping replays idempotent.
    pub fn insert(&mut self, key: u64, id: u32) {
        let root = self.root;
        self.root = self.insert_at(root, key, id);
    }

    /// Removes an entry, reporting whether it was present.
    pub fn remove(&mut self, key: u64, id: u32) -> bool {
        let root = self.root;
        let (new_root, removed) = self.remove_at(root, key, id);
        self.root = new_root;
        removed
    }

    /// Least entry strictly after `key`, ignoring ids at `key` itself.
    pub fn next_after(&self, key: u64) -> Option<IndexEntry> {
        let mut h = self.root;
        let mut best: Option<IndexEntry> = None;
        while h != NIL {
            let n = self.node(h);
            if n.key > key {
                best = Some(IndexEntry { key: n.key, id: n.id });
                h = n.left;
            } else {
                h = n.right;
            }
        }
        best
    }

    /// Greatest entry strictly before `key`.
    pub fn previous_before(&self, key: u64) -> Option<IndexEntry> {
        let mut h = self.root;
        let mut best: Option<IndexEntry> = None;
        while h != NIL {
            let n = self.node(h);
            if n.key < key {
                best = Some(IndexEntry { key: n.key, id: n.id });
                h = n.right;
            } else {
                h = n.left;
            }
        }
        best
    }

    /// All ids filed under `key`, ascending.
    pub fn ids_at(&self, env: &Env, key: u64) -> Vec<u32> {
        let mut out = Vec::new(env);
        self.collect_at(self.root, key, &mut out);
        out
    }

    fn node(&self, h: u32) -> IndexNode {
        self.nodes.get_unchecked(h)
    }

    fn put(&mut self, h: u32, n: IndexNode) {
        self.nodes.set(h, n);
    }

    fn height(&self, h: u32) -> u32 {
        if h == NIL {
            0
        } else {
            self.node(h).height
        }
    }

    fn alloc(&mut self, key: u64, id: u32) -> u32 {
        let fresh = IndexNode {
            key,
            id,
            left: NIL,
            right: NIL,
            height: 1,
        };
        match self.free.pop_back() {
            Some(slot) => {
                self.nodes.set(slot, fresh);
                slot
            }
            None => {
                self.nodes.push_back(fresh);
                self.nodes.len() - 1
            }
        }
    }

    fn insert_at(&mut self, h: u32, key: u64, id: u32) -> u32 {
        if h == NIL {
            return self.alloc(key, id);
        }
        let mut n = self.node(h);
        if (key, id) < (n.key, n.id) {
            n.left = self.insert_at(n.left, key, id);
        } else if (key, id) > (n.key, n.id) {
            n.right = self.insert_at(n.right, key, id);
        } else {
            return h;
        }
        self.put(h, n);
        self.rebalance(h)
    }

    fn remove_at(&mut self, h: u32, key: u64, id: u32) -> (u32, bool) {
        if h == NIL {
            return (NIL, false);
        }
        let mut n = self.node(h);
        let removed;
        if (key, id) < (n.key, n.id) {
            let (child, hit) = self.remove_at(n.left, key, id);
            n.left = child;
            removed = hit;
            self.put(h, n);
        } else if (key, id) > (n.key, n.id) {
            let (child, hit) = self.remove_at(n.right, key, id);
            n.right = child;
            removed = hit;
            self.put(h, n);
        } else if n.left == NIL || n.right == NIL {
            let child = if n.left != NIL { n.left } else { n.right };
            self.free.push_back(h);
            return (child, true);
        } else {
            // Two children: take over the in-order successor's entry, then
            // delete that entry from the right subtree.
            let succ = self.min_entry(n.right);
            let (child, _) = self.remove_at(n.right, succ.key, succ.id);
            n.right = child;
            n.key = succ.key;
            n.id = succ.id;
            self.put(h, n);
            removed = true;
        }
        if !removed {
            return (h, false);
        }
        (self.rebalance(h), true)
    }

    fn min_entry(&self, start: u32) -> IndexEntry {
        let mut h = start;
        loop {
            let n = self.node(h);
            if n.left == NIL {
                return IndexEntry { key: n.key, id: n.id };
            }
            h = n.left;
        }
    }

    fn collect_at(&self, h: u32, key: u64, out: &mut Vec<u32>) {
        if h == NIL {
            return;
        }
        let n = self.node(h);
        if n.key >= key {
            self.collect_at(n.left, key, out);
        }
        if n.key == key {
            out.push_back(n.id);
        }
        if n.key <= key {
            self.collect_at(n.right, key, out);
        }
    }

    fn fix_height(&mut self, h: u32) {
        let mut n = self.node(h);
        let lh = self.height(n.left);
        let rh = self.height(n.right);
        n.height = 1 + if lh > rh { lh } else { rh };
        self.put(h, n);
    }

    fn balance_factor(&self, h: u32) -> i64 {
        let n = self.node(h);
        self.height(n.left) as i64 - self.height(n.right) as i64
    }

    fn rotate_right(&mut self, h: u32) -> u32 {
        let mut n = self.node(h);
        let pivot = n.left;
        let mut p = self.node(pivot);
        n.left = p.right;
        p.right = h;
        self.put(h, n);
        self.put(pivot, p);
        self.fix_height(h);
        self.fix_height(pivot);
        pivot
    }

    fn rotate_left(&mut self, h: u32) -> u32 {
        let mut n = self.node(h);
        let pivot = n.right;
        let mut p = self.node(pivot);
        n.right = p.left;
        p.left = h;
        self.put(h, n);
        self.put(pivot, p);
        self.fix_height(h);
        self.fix_height(pivot);
        pivot
    }

    /// Standard AVL restore: the rotation applied depends only on stored
    /// heights, so rebalancing is deterministic across replays.
    fn rebalance(&mut self, h: u32) -> u32 {
        self.fix_height(h);
        let factor = self.balance_factor(h);
        if factor > 1 {
            let mut n = self.node(h);
            if self.balance_factor(n.left) < 0 {
                n.left = self.rotate_left(n.left);
                self.put(h, n);
            }
            return self.rotate_right(h);
        }
        if factor < -1 {
            let mut n = self.node(h);
            if self.balance_factor(n.right) > 0 {
                n.right = self.rotate_right(n.right);
                self.put(h, n);
            }
            return self.rotate_left(h);
        }
        h
    }
}
