//! Order a trace's spans along their `CHILD_OF` tree.
//!
//! The resulting order is parent-first depth-first: every span comes after
//! the span it is a child of, and siblings appear by start time. Classification
//! relies on this, since it reads fixed positions (the client's root span at 0,
//! its outgoing call at 1).
//!
//! The order is a function of the span set alone, not of the order spans
//! arrived in, so resolving an already-resolved trace changes nothing.

use std::collections::HashMap;

use rayon::prelude::*;

use super::ingest::TraceSet;
use super::model::{Span, Trace};

impl Trace {
    /// Reorder spans in place. See the module docs for the ordering.
    pub fn resolve(&mut self) {
        let order = resolved_order(&mut self.spans);
        let mut slots: Vec<Option<Span>> = std::mem::take(&mut self.spans)
            .into_iter()
            .map(Some)
            .collect();
        self.spans = order
            .into_iter()
            .filter_map(|index| slots[index].take())
            .collect();
    }
}

impl TraceSet {
    /// Resolve every trace. Traces are independent, so this runs in parallel.
    pub fn resolve_all(&mut self) {
        self.par_iter_mut().for_each(Trace::resolve);
    }
}

/// Sort `spans` into the baseline order and return the traversal as indices
/// into that order.
fn resolved_order(spans: &mut [Span]) -> Vec<usize> {
    spans.sort_by(|a, b| {
        a.start_time
            .cmp(&b.start_time)
            .then_with(|| a.span_id.cmp(&b.span_id))
    });

    let mut position: HashMap<&str, usize> = HashMap::with_capacity(spans.len());
    for (index, span) in spans.iter().enumerate() {
        position.entry(span.span_id.as_str()).or_insert(index);
    }

    // children[p] lists spans naming p as parent; the sort above keeps them in start order
    let mut children: Vec<Vec<usize>> = vec![Vec::new(); spans.len()];
    let mut has_parent = vec![false; spans.len()];
    for (index, span) in spans.iter().enumerate() {
        for parent_id in span.parent_ids() {
            match position.get(parent_id) {
                Some(&parent) if parent != index => {
                    if !children[parent].contains(&index) {
                        children[parent].push(index);
                    }
                    has_parent[index] = true;
                }
                // Self-references and dangling parents don't anchor the span
                _ => {}
            }
        }
    }

    let mut visited = vec![false; spans.len()];
    let mut order = Vec::with_capacity(spans.len());
    let mut stack = Vec::new();

    let roots = (0..spans.len()).filter(|&i| !has_parent[i]);
    // Anything still unvisited after the real roots sits on a parentless cycle
    let stragglers = 0..spans.len();

    for start in roots.chain(stragglers) {
        if visited[start] {
            continue;
        }
        stack.push(start);
        while let Some(current) = stack.pop() {
            if visited[current] {
                continue;
            }
            visited[current] = true;
            order.push(current);
            stack.extend(children[current].iter().rev().filter(|&&c| !visited[c]));
        }
    }

    order
}
