//! Basic blocks, dominator trees and control dependence of a method body.
//!
//! Blocks live in a flat vector and refer to each other by index. The last
//! node is a virtual exit that every `ret`/`throw` block flows into.

use heurist_bytecode::Op;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BasicBlock {
    /// First instruction index.
    pub start: usize,
    /// One past the last instruction index.
    pub end: usize,
    pub succs: Vec<usize>,
    pub preds: Vec<usize>,
}

#[derive(Debug, Clone)]
pub struct ControlFlowGraph {
    blocks: Vec<BasicBlock>,
    block_of: Vec<usize>,
}

/// Immediate dominators, `None` for nodes not connected to the root.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DominatorTree {
    root: usize,
    idom: Vec<Option<usize>>,
}

impl DominatorTree {
    pub fn root(&self) -> usize {
        self.root
    }

    /// The immediate dominator. The root has none.
    pub fn idom(&self, node: usize) -> Option<usize> {
        match self.idom.get(node).copied().flatten() {
            Some(d) if node != self.root => Some(d),
            _ => None,
        }
    }

    pub fn contains(&self, node: usize) -> bool {
        self.idom.get(node).is_some_and(Option::is_some)
    }

    pub fn dominates(&self, a: usize, b: usize) -> bool {
        if !self.contains(a) || !self.contains(b) {
            return false;
        }
        let mut cur = b;
        loop {
            if cur == a {
                return true;
            }
            match self.idom(cur) {
                Some(d) => cur = d,
                None => return false,
            }
        }
    }
}

impl ControlFlowGraph {
    pub fn build(code: &[Op]) -> Self {
        let n = code.len();
        let mut leader = vec![false; n];
        if n > 0 {
            leader[0] = true;
        }
        for (ip, op) in code.iter().enumerate() {
            if let Some(t) = op.jump_target() {
                if (t as usize) < n {
                    leader[t as usize] = true;
                }
            }
            if (op.jump_target().is_some() || op.ends_flow()) && ip + 1 < n {
                leader[ip + 1] = true;
            }
        }

        let mut blocks = Vec::new();
        let mut block_of = vec![0; n];
        for ip in 0..n {
            if leader[ip] {
                blocks.push(BasicBlock { start: ip, end: ip, succs: Vec::new(), preds: Vec::new() });
            }
            let current = blocks.len() - 1;
            blocks[current].end = ip + 1;
            block_of[ip] = current;
        }

        let exit = blocks.len();
        blocks.push(BasicBlock { start: n, end: n, succs: Vec::new(), preds: Vec::new() });

        for b in 0..exit {
            let last = &code[blocks[b].end - 1];
            let mut succs = Vec::new();
            match last {
                Op::Ret | Op::Throw(_) => succs.push(exit),
                _ => {
                    if !last.ends_flow() {
                        succs.push(block_of.get(blocks[b].end).copied().unwrap_or(exit));
                    }
                    if let Some(t) = last.jump_target() {
                        let target = block_of.get(t as usize).copied().unwrap_or(exit);
                        if !succs.contains(&target) {
                            succs.push(target);
                        }
                    }
                }
            }
            for &s in &succs {
                blocks[s].preds.push(b);
            }
            blocks[b].succs = succs;
        }

        ControlFlowGraph { blocks, block_of }
    }

    pub fn blocks(&self) -> &[BasicBlock] {
        &self.blocks
    }

    pub fn entry(&self) -> usize {
        0
    }

    pub fn exit(&self) -> usize {
        self.blocks.len() - 1
    }

    /// Block containing instruction `ip`.
    pub fn block_of(&self, ip: usize) -> Option<usize> {
        self.block_of.get(ip).copied()
    }

    /// Whether each block can be reached from the entry.
    pub fn reachable(&self) -> Vec<bool> {
        let mut seen = vec![false; self.blocks.len()];
        if self.blocks.len() <= 1 {
            return seen;
        }
        let mut work = vec![self.entry()];
        while let Some(b) = work.pop() {
            if std::mem::replace(&mut seen[b], true) {
                continue;
            }
            work.extend(self.blocks[b].succs.iter().copied().filter(|s| !seen[*s]));
        }
        seen
    }

    pub fn is_reachable(&self, ip: usize) -> bool {
        self.block_of(ip).is_some_and(|b| self.reachable()[b])
    }

    pub fn dominators(&self) -> DominatorTree {
        compute_idoms(self.entry(), self.blocks.len(), |b| &self.blocks[b].succs, |b| {
            &self.blocks[b].preds
        })
    }

    pub fn post_dominators(&self) -> DominatorTree {
        compute_idoms(self.exit(), self.blocks.len(), |b| &self.blocks[b].preds, |b| {
            &self.blocks[b].succs
        })
    }

    /// For each block, the edges `(branch block, successor)` it is control
    /// dependent on: taking that edge decides whether the block runs.
    pub fn control_dependences(&self) -> Vec<Vec<(usize, usize)>> {
        let pdom = self.post_dominators();
        let mut deps = vec![Vec::new(); self.blocks.len()];
        for (a, block) in self.blocks.iter().enumerate() {
            if block.succs.len() < 2 || !pdom.contains(a) {
                continue;
            }
            let stop = pdom.idom(a);
            for &s in &block.succs {
                let mut runner = Some(s);
                while let Some(r) = runner {
                    if Some(r) == stop || !pdom.contains(r) {
                        break;
                    }
                    deps[r].push((a, s));
                    runner = pdom.idom(r);
                }
            }
        }
        deps
    }
}

/// Cooper, Harvey and Kennedy, "A Simple, Fast Dominance Algorithm".
fn compute_idoms<'a>(
    root: usize,
    n: usize,
    succs: impl Fn(usize) -> &'a Vec<usize>,
    preds: impl Fn(usize) -> &'a Vec<usize>,
) -> DominatorTree {
    // reverse post order from the root
    let mut order = Vec::with_capacity(n);
    let mut visited = vec![false; n];
    let mut stack = vec![(root, 0usize)];
    visited[root] = true;
    while let Some((node, child)) = stack.pop() {
        match succs(node).get(child) {
            Some(&next) => {
                stack.push((node, child + 1));
                if !visited[next] {
                    visited[next] = true;
                    stack.push((next, 0));
                }
            }
            None => order.push(node),
        }
    }
    order.reverse();

    let mut rpo_index = vec![usize::MAX; n];
    for (i, &node) in order.iter().enumerate() {
        rpo_index[node] = i;
    }

    let mut idom: Vec<Option<usize>> = vec![None; n];
    idom[root] = Some(root);
    let mut changed = true;
    while changed {
        changed = false;
        for &b in order.iter().skip(1) {
            let mut new_idom: Option<usize> = None;
            for &p in preds(b) {
                if idom[p].is_none() {
                    continue;
                }
                new_idom = Some(match new_idom {
                    None => p,
                    Some(cur) => intersect(&idom, &rpo_index, p, cur),
                });
            }
            if new_idom.is_some() && idom[b] != new_idom {
                idom[b] = new_idom;
                changed = true;
            }
        }
    }

    DominatorTree { root, idom }
}

fn intersect(idom: &[Option<usize>], rpo_index: &[usize], mut a: usize, mut b: usize) -> usize {
    while a != b {
        while rpo_index[a] > rpo_index[b] {
            match idom[a] {
                Some(d) => a = d,
                None => return b,
            }
        }
        while rpo_index[b] > rpo_index[a] {
            match idom[b] {
                Some(d) => b = d,
                None => return a,
            }
        }
    }
    a
}
