// NetDP: Data Plane Computation for Network Configurations
// Copyright (C) 2021  Tibor Schneider
//
// This program is free software; you can redistribute it and/or modify
// it under the terms of the GNU General Public License as published by
// the Free Software Foundation; either version 2 of the License, or
// (at your option) any later version.
//
// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
// GNU General Public License for more details.
//
// You should have received a copy of the GNU General Public License along
// with this program; if not, write to the Free Software Foundation, Inc.,
// 51 Franklin Street, Fifth Floor, Boston, MA 02110-1301 USA.

//! # Binary Decision Diagrams
//!
//! Reduced ordered binary decision diagrams over a fixed number of boolean variables. Every node is
//! hash-consed in a unique table which is shared by all [`Bdd`] handles created from the same
//! [`BddFactory`]. Two handles therefore represent the same boolean function if and only if they
//! point to the same node, and equality is a simple id comparison.
//!
//! Variable `0` is at the root of every diagram. Multi-bit values are encoded most significant bit
//! first, i.e., bit `i` of a `w`-bit field starting at variable `v` is variable `v + i`, counting
//! from the most significant bit.
//!
//! The unique table and the operation cache are protected by [`RwLock`]s. Lookups take the read
//! lock, insertion takes the write lock and checks again before inserting, so constructing the same
//! node from multiple threads always yields the same id.

use std::collections::{HashMap, HashSet};
use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::{Arc, PoisonError, RwLock};

use log::*;

type NodeId = u32;

const ZERO: NodeId = 0;
const ONE: NodeId = 1;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
struct Node {
    var: u32,
    lo: NodeId,
    hi: NodeId,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
enum Op {
    And,
    Or,
    Xor,
}

#[derive(Debug)]
struct NodeTable {
    nodes: Vec<Node>,
    unique: HashMap<Node, NodeId>,
}

#[derive(Debug)]
struct Table {
    num_vars: u32,
    nodes: RwLock<NodeTable>,
    cache: RwLock<HashMap<(Op, NodeId, NodeId), NodeId>>,
}

impl Table {
    fn new(num_vars: u32) -> Self {
        // terminals sit below every variable
        let terminal = |id| Node { var: num_vars, lo: id, hi: id };
        Self {
            num_vars,
            nodes: RwLock::new(NodeTable {
                nodes: vec![terminal(ZERO), terminal(ONE)],
                unique: HashMap::new(),
            }),
            cache: RwLock::new(HashMap::new()),
        }
    }

    fn node(&self, id: NodeId) -> Node {
        self.nodes.read().unwrap_or_else(PoisonError::into_inner).nodes[id as usize]
    }

    fn len(&self) -> usize {
        self.nodes.read().unwrap_or_else(PoisonError::into_inner).nodes.len()
    }

    fn mk(&self, var: u32, lo: NodeId, hi: NodeId) -> NodeId {
        if lo == hi {
            return lo;
        }
        let node = Node { var, lo, hi };
        let existing = self
            .nodes
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .unique
            .get(&node)
            .copied();
        if let Some(id) = existing {
            return id;
        }
        let mut table = self.nodes.write().unwrap_or_else(PoisonError::into_inner);
        // another thread might have inserted the node in the meantime
        if let Some(id) = table.unique.get(&node) {
            return *id;
        }
        let id = table.nodes.len() as NodeId;
        table.nodes.push(node);
        table.unique.insert(node, id);
        id
    }

    fn apply(&self, op: Op, a: NodeId, b: NodeId) -> NodeId {
        match op {
            Op::And => {
                if a == ZERO || b == ZERO {
                    return ZERO;
                }
                if a == ONE || a == b {
                    return b;
                }
                if b == ONE {
                    return a;
                }
            }
            Op::Or => {
                if a == ONE || b == ONE {
                    return ONE;
                }
                if a == ZERO || a == b {
                    return b;
                }
                if b == ZERO {
                    return a;
                }
            }
            Op::Xor => {
                if a == b {
                    return ZERO;
                }
                if a == ZERO {
                    return b;
                }
                if b == ZERO {
                    return a;
                }
            }
        }

        // all operations are commutative
        let (a, b) = if a <= b { (a, b) } else { (b, a) };
        let key = (op, a, b);
        let cached = self.cache.read().unwrap_or_else(PoisonError::into_inner).get(&key).copied();
        if let Some(result) = cached {
            return result;
        }

        let na = self.node(a);
        let nb = self.node(b);
        let var = na.var.min(nb.var);
        let (a_lo, a_hi) = if na.var == var { (na.lo, na.hi) } else { (a, a) };
        let (b_lo, b_hi) = if nb.var == var { (nb.lo, nb.hi) } else { (b, b) };
        let lo = self.apply(op, a_lo, b_lo);
        let hi = self.apply(op, a_hi, b_hi);
        let result = self.mk(var, lo, hi);

        self.cache.write().unwrap_or_else(PoisonError::into_inner).insert(key, result);
        result
    }
}

/// Factory for [`Bdd`]s sharing one unique table. Cloning the factory is cheap, all clones operate
/// on the same table.
#[derive(Clone)]
pub struct BddFactory {
    table: Arc<Table>,
}

impl fmt::Debug for BddFactory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "BddFactory({} vars, {} nodes)", self.table.num_vars, self.table.len())
    }
}

impl BddFactory {
    /// Create a new factory with `num_vars` boolean variables.
    pub fn new(num_vars: u32) -> Self {
        trace!("Create BDD factory with {} variables", num_vars);
        Self { table: Arc::new(Table::new(num_vars)) }
    }

    /// Number of variables of this factory
    pub fn num_vars(&self) -> u32 {
        self.table.num_vars
    }

    /// Total number of nodes allocated in the unique table (including both terminals).
    pub fn num_nodes(&self) -> usize {
        self.table.len()
    }

    fn wrap(&self, id: NodeId) -> Bdd {
        Bdd { id, table: self.table.clone() }
    }

    /// The constant `false`.
    pub fn zero(&self) -> Bdd {
        self.wrap(ZERO)
    }

    /// The constant `true`.
    pub fn one(&self) -> Bdd {
        self.wrap(ONE)
    }

    /// The function which is true iff variable `var` is set.
    pub fn var(&self, var: u32) -> Bdd {
        assert!(var < self.table.num_vars, "Variable {} out of range", var);
        self.wrap(self.table.mk(var, ZERO, ONE))
    }

    /// The function which is true iff variable `var` is not set.
    pub fn nvar(&self, var: u32) -> Bdd {
        assert!(var < self.table.num_vars, "Variable {} out of range", var);
        self.wrap(self.table.mk(var, ONE, ZERO))
    }

    /// Conjunction of all given BDDs (`true` for an empty iterator).
    pub fn and_all<'a, I: IntoIterator<Item = &'a Bdd>>(&self, iter: I) -> Bdd {
        iter.into_iter().fold(self.one(), |acc, x| acc.and(x))
    }

    /// Disjunction of all given BDDs (`false` for an empty iterator).
    pub fn or_all<'a, I: IntoIterator<Item = &'a Bdd>>(&self, iter: I) -> Bdd {
        iter.into_iter().fold(self.zero(), |acc, x| acc.or(x))
    }

    fn check_field(&self, first_var: u32, width: u32) {
        assert!(width <= 64, "Fields are at most 64 bits wide");
        assert!(first_var + width <= self.table.num_vars, "Field out of range");
    }

    /// The function matching a `width`-bit field starting at `first_var` against `value`, ignoring
    /// every bit which is set in `dont_care`.
    pub fn wildcard(&self, first_var: u32, width: u32, value: u64, dont_care: u64) -> Bdd {
        self.check_field(first_var, width);
        let mut acc = ONE;
        for i in (0..width).rev() {
            let shift = width - 1 - i;
            if (dont_care >> shift) & 1 == 1 {
                continue;
            }
            let var = first_var + i;
            acc = if (value >> shift) & 1 == 1 {
                self.table.mk(var, ZERO, acc)
            } else {
                self.table.mk(var, acc, ZERO)
            };
        }
        self.wrap(acc)
    }

    /// The function which is true iff the field equals `value`.
    pub fn value(&self, first_var: u32, width: u32, value: u64) -> Bdd {
        self.wildcard(first_var, width, value, 0)
    }

    /// The function which is true iff the first `len` bits of the field equal those of `value`.
    pub fn prefix(&self, first_var: u32, width: u32, value: u64, len: u32) -> Bdd {
        assert!(len <= width, "Prefix length larger than the field");
        let dont_care = if len == 0 {
            u64::MAX
        } else if width - len >= 64 {
            u64::MAX
        } else {
            (1u64 << (width - len)) - 1
        };
        self.wildcard(first_var, width, value, dont_care)
    }

    /// The function which is true iff `lo <= field <= hi`.
    pub fn range(&self, first_var: u32, width: u32, lo: u64, hi: u64) -> Bdd {
        if lo > hi {
            return self.zero();
        }
        self.geq(first_var, width, lo).and(&self.leq(first_var, width, hi))
    }

    fn geq(&self, first_var: u32, width: u32, lo: u64) -> Bdd {
        self.check_field(first_var, width);
        let mut acc = ONE;
        for i in (0..width).rev() {
            let var = first_var + i;
            acc = if (lo >> (width - 1 - i)) & 1 == 1 {
                self.table.mk(var, ZERO, acc)
            } else {
                self.table.mk(var, acc, ONE)
            };
        }
        self.wrap(acc)
    }

    fn leq(&self, first_var: u32, width: u32, hi: u64) -> Bdd {
        self.check_field(first_var, width);
        let mut acc = ONE;
        for i in (0..width).rev() {
            let var = first_var + i;
            acc = if (hi >> (width - 1 - i)) & 1 == 1 {
                self.table.mk(var, ONE, acc)
            } else {
                self.table.mk(var, acc, ZERO)
            };
        }
        self.wrap(acc)
    }
}

/// Handle to a canonical BDD node. Handles are cheap to clone and compare.
#[derive(Clone)]
pub struct Bdd {
    id: NodeId,
    table: Arc<Table>,
}

impl PartialEq for Bdd {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id && Arc::ptr_eq(&self.table, &other.table)
    }
}

impl Eq for Bdd {}

impl Hash for Bdd {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.id.hash(state)
    }
}

impl fmt::Debug for Bdd {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.id {
            ZERO => write!(f, "Bdd(false)"),
            ONE => write!(f, "Bdd(true)"),
            id => write!(f, "Bdd(#{}, {} nodes)", id, self.node_count()),
        }
    }
}

impl Bdd {
    fn same(&self, id: NodeId) -> Bdd {
        Bdd { id, table: self.table.clone() }
    }

    fn binary(&self, op: Op, other: &Bdd) -> Bdd {
        assert!(Arc::ptr_eq(&self.table, &other.table), "BDDs from different factories");
        self.same(self.table.apply(op, self.id, other.id))
    }

    /// Returns the factory owning this BDD.
    pub fn factory(&self) -> BddFactory {
        BddFactory { table: self.table.clone() }
    }

    /// Conjunction
    pub fn and(&self, other: &Bdd) -> Bdd {
        self.binary(Op::And, other)
    }

    /// Disjunction
    pub fn or(&self, other: &Bdd) -> Bdd {
        self.binary(Op::Or, other)
    }

    /// Exclusive or
    pub fn xor(&self, other: &Bdd) -> Bdd {
        self.binary(Op::Xor, other)
    }

    /// Negation
    pub fn not(&self) -> Bdd {
        self.same(self.table.apply(Op::Xor, ONE, self.id))
    }

    /// Set difference, `self AND NOT other`.
    pub fn diff(&self, other: &Bdd) -> Bdd {
        self.and(&other.not())
    }

    /// If-then-else: `(self AND then) OR (NOT self AND otherwise)`.
    pub fn ite(&self, then: &Bdd, otherwise: &Bdd) -> Bdd {
        self.and(then).or(&self.not().and(otherwise))
    }

    /// Returns `true` if `self` implies `other`.
    pub fn implies(&self, other: &Bdd) -> bool {
        self.diff(other).is_zero()
    }

    /// Returns `true` if both functions share a satisfying assignment.
    pub fn intersects(&self, other: &Bdd) -> bool {
        !self.and(other).is_zero()
    }

    /// Returns `true` for the constant `false`.
    pub fn is_zero(&self) -> bool {
        self.id == ZERO
    }

    /// Returns `true` for the constant `true`.
    pub fn is_one(&self) -> bool {
        self.id == ONE
    }

    /// Evaluate the function for the assignment given by `value`, which maps each variable index to
    /// its value.
    pub fn eval<F: Fn(u32) -> bool>(&self, value: F) -> bool {
        let mut id = self.id;
        while id != ZERO && id != ONE {
            let node = self.table.node(id);
            id = if value(node.var) { node.hi } else { node.lo };
        }
        id == ONE
    }

    /// Returns one satisfying assignment as a list of `(variable, value)` pairs, or `None` if the
    /// function is unsatisfiable. Variables which do not appear in the list are unconstrained.
    /// Whenever there is a choice, the assignment prefers `false`.
    pub fn satisfying_assignment(&self) -> Option<Vec<(u32, bool)>> {
        if self.is_zero() {
            return None;
        }
        let mut result = Vec::new();
        let mut id = self.id;
        while id != ONE {
            let node = self.table.node(id);
            // every non-zero node of a reduced diagram reaches ONE
            if node.lo != ZERO {
                result.push((node.var, false));
                id = node.lo;
            } else {
                result.push((node.var, true));
                id = node.hi;
            }
        }
        Some(result)
    }

    /// Enumerate all paths to the `true` terminal. Each path is a list of `(variable, value)`
    /// pairs. The paths are pairwise disjoint, and their union is exactly the function.
    pub fn paths(&self) -> Vec<Vec<(u32, bool)>> {
        let mut result = Vec::new();
        let mut current = Vec::new();
        self.paths_rec(self.id, &mut current, &mut result);
        result
    }

    fn paths_rec(
        &self,
        id: NodeId,
        current: &mut Vec<(u32, bool)>,
        result: &mut Vec<Vec<(u32, bool)>>,
    ) {
        match id {
            ZERO => {}
            ONE => result.push(current.clone()),
            id => {
                let node = self.table.node(id);
                current.push((node.var, false));
                self.paths_rec(node.lo, current, result);
                current.pop();
                current.push((node.var, true));
                self.paths_rec(node.hi, current, result);
                current.pop();
            }
        }
    }

    /// Number of nodes reachable from this BDD, including the terminals.
    pub fn node_count(&self) -> usize {
        let mut seen = HashSet::new();
        let mut stack = vec![self.id];
        while let Some(id) = stack.pop() {
            if !seen.insert(id) {
                continue;
            }
            if id != ZERO && id != ONE {
                let node = self.table.node(id);
                stack.push(node.lo);
                stack.push(node.hi);
            }
        }
        seen.len()
    }

    /// Returns the smallest variable index the function depends on, or `None` for constants.
    pub fn top_var(&self) -> Option<u32> {
        match self.id {
            ZERO | ONE => None,
            id => Some(self.table.node(id).var),
        }
    }
}
