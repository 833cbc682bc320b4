//! Edit distance from a string to the language of a regular expression.
//!
//! The pattern is compiled into a Thompson NFA from its `regex-syntax` HIR.
//! The distance is the cheapest path from (position 0, start state) to
//! (end of input, accepting state) in the product graph where each input
//! character is either consumed by a matching transition (free), replaced
//! (cost depends on how far the character is from the transition's class),
//! deleted (1), or a transition's character is inserted (1).
//! The match is anchored at both ends, like `String.matches`.

use std::cmp::Ordering;
use std::collections::BinaryHeap;

use regex_syntax::hir::{Class, Hir, HirKind};

use crate::error::DistanceError;

/// Bounded repetitions are expanded at most this many times.
const MAX_REPEAT: u32 = 32;
/// Upper bound on NFA states times input length.
const MAX_SEARCH_SPACE: usize = 4_000_000;

const DELETE_COST: f64 = 1.0;
const INSERT_COST: f64 = 1.0;

#[derive(Debug, Default, Clone)]
struct State {
    eps: Vec<usize>,
    /// Inclusive character ranges and the state reached on a match.
    step: Option<(Vec<(char, char)>, usize)>,
}

#[derive(Debug)]
struct Nfa {
    states: Vec<State>,
    start: usize,
    accept: usize,
}

impl Nfa {
    fn compile(hir: &Hir) -> Nfa {
        let mut nfa = Nfa {
            states: Vec::new(),
            start: 0,
            accept: 0,
        };
        let (start, accept) = nfa.fragment(hir);
        nfa.start = start;
        nfa.accept = accept;
        nfa
    }

    fn add(&mut self) -> usize {
        self.states.push(State::default());
        self.states.len() - 1
    }

    fn eps(&mut self, from: usize, to: usize) {
        self.states[from].eps.push(to);
    }

    fn step(&mut self, ranges: Vec<(char, char)>) -> (usize, usize) {
        let from = self.add();
        let to = self.add();
        self.states[from].step = Some((ranges, to));
        (from, to)
    }

    /// Returns (entry, exit) of a fresh fragment for `hir`.
    fn fragment(&mut self, hir: &Hir) -> (usize, usize) {
        match hir.kind() {
            HirKind::Empty | HirKind::Look(_) => {
                let s = self.add();
                (s, s)
            }
            HirKind::Literal(lit) => {
                let chars: Vec<char> = match std::str::from_utf8(&lit.0) {
                    Ok(s) => s.chars().collect(),
                    Err(_) => lit.0.iter().map(|b| *b as char).collect(),
                };
                let entry = self.add();
                let mut cur = entry;
                for c in chars {
                    let (from, to) = self.step(vec![(c, c)]);
                    self.eps(cur, from);
                    cur = to;
                }
                (entry, cur)
            }
            HirKind::Class(Class::Unicode(cls)) => {
                self.step(cls.iter().map(|r| (r.start(), r.end())).collect())
            }
            HirKind::Class(Class::Bytes(cls)) => {
                self.step(cls.iter().map(|r| (r.start() as char, r.end() as char)).collect())
            }
            HirKind::Capture(cap) => self.fragment(&cap.sub),
            HirKind::Concat(parts) => {
                let entry = self.add();
                let mut cur = entry;
                for part in parts {
                    let (s, e) = self.fragment(part);
                    self.eps(cur, s);
                    cur = e;
                }
                (entry, cur)
            }
            HirKind::Alternation(alts) => {
                let entry = self.add();
                let exit = self.add();
                for alt in alts {
                    let (s, e) = self.fragment(alt);
                    self.eps(entry, s);
                    self.eps(e, exit);
                }
                (entry, exit)
            }
            HirKind::Repetition(rep) => {
                let min = rep.min.min(MAX_REPEAT);
                let entry = self.add();
                let mut cur = entry;
                for _ in 0..min {
                    let (s, e) = self.fragment(&rep.sub);
                    self.eps(cur, s);
                    cur = e;
                }
                match rep.max {
                    None => {
                        let (s, e) = self.fragment(&rep.sub);
                        let exit = self.add();
                        self.eps(cur, s);
                        self.eps(e, cur);
                        self.eps(cur, exit);
                        (entry, exit)
                    }
                    Some(max) => {
                        let optional = max.min(MAX_REPEAT).saturating_sub(min);
                        let exit = self.add();
                        for _ in 0..optional {
                            let (s, e) = self.fragment(&rep.sub);
                            self.eps(cur, exit);
                            self.eps(cur, s);
                            cur = e;
                        }
                        self.eps(cur, exit);
                        (entry, exit)
                    }
                }
            }
        }
    }
}

/// Cost of replacing `c` by some character of the given class, in (0, 1].
fn replacement_cost(c: char, ranges: &[(char, char)]) -> f64 {
    let gap = ranges
        .iter()
        .map(|(lo, hi)| {
            let v = c as i64;
            if v < *lo as i64 {
                (*lo as i64 - v) as f64
            } else if v > *hi as i64 {
                (v - *hi as i64) as f64
            } else {
                0.0
            }
        })
        .fold(f64::MAX, f64::min);
    // grade the gap into (0.5, 1] so replacing stays cheaper than delete+insert
    0.5 + 0.5 * (gap / (gap + 1.0))
}

#[derive(PartialEq)]
struct Entry {
    cost: f64,
    pos: usize,
    state: usize,
}

impl Eq for Entry {}

impl Ord for Entry {
    fn cmp(&self, other: &Self) -> Ordering {
        other
            .cost
            .partial_cmp(&self.cost)
            .unwrap_or(Ordering::Equal)
            .then_with(|| self.pos.cmp(&other.pos))
    }
}

impl PartialOrd for Entry {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// 0 when `input` matches the whole `pattern`, otherwise a positive edit
/// distance.
pub fn regex_distance(input: &str, pattern: &str) -> Result<f64, DistanceError> {
    let hir = regex_syntax::Parser::new()
        .parse(pattern)
        .map_err(|e| DistanceError::InvalidRegex(e.to_string()))?;
    let nfa = Nfa::compile(&hir);
    let text: Vec<char> = input.chars().collect();

    let width = nfa.states.len();
    let space = width.saturating_mul(text.len() + 1);
    if space > MAX_SEARCH_SPACE {
        return Err(DistanceError::RegexTooComplex(width));
    }

    let idx = |pos: usize, state: usize| pos * width + state;
    let mut best = vec![f64::INFINITY; space];
    let mut heap = BinaryHeap::new();
    best[idx(0, nfa.start)] = 0.0;
    heap.push(Entry { cost: 0.0, pos: 0, state: nfa.start });

    while let Some(Entry { cost, pos, state }) = heap.pop() {
        if cost > best[idx(pos, state)] {
            continue;
        }
        if pos == text.len() && state == nfa.accept {
            return Ok(cost);
        }

        let mut relax = |pos: usize, state: usize, c: f64, heap: &mut BinaryHeap<Entry>| {
            let slot = &mut best[idx(pos, state)];
            if c < *slot {
                *slot = c;
                heap.push(Entry { cost: c, pos, state });
            }
        };

        for &next in &nfa.states[state].eps {
            relax(pos, next, cost, &mut heap);
        }
        if let Some((ranges, next)) = &nfa.states[state].step {
            if let Some(&ch) = text.get(pos) {
                let hit = ranges.iter().any(|(lo, hi)| *lo <= ch && ch <= *hi);
                let c = if hit { 0.0 } else { replacement_cost(ch, ranges) };
                relax(pos + 1, *next, cost + c, &mut heap);
            }
            relax(pos, *next, cost + INSERT_COST, &mut heap);
        }
        if pos < text.len() {
            relax(pos + 1, state, cost + DELETE_COST, &mut heap);
        }
    }

    // accept is always reachable through insertions and deletions
    Err(DistanceError::RegexTooComplex(width))
}
