//! Reset release ordering across dependent clock domains.

use std::collections::{BTreeSet, HashMap};

use log::debug;

use crate::domain::{ClockDomain, ResetGate};
use crate::error::{ClockError, Result};

/// Order in which domains leave reset.
///
/// Constraints, in addition to each domain's explicit `depends_on` list:
/// - every power-on-settle domain is released before every PLL-lock domain;
/// - both are released before every primary domain.
///
/// Uses Kahn's algorithm with declaration order breaking ties, so the result
/// is deterministic. A cycle yields [`ClockError::CyclicDependency`] with the
/// full cycle path.
pub fn sequence_resets(domains: &[ClockDomain]) -> Result<Vec<String>> {
    let mut index: HashMap<&str, usize> = HashMap::with_capacity(domains.len());
    for (i, d) in domains.iter().enumerate() {
        if index.insert(d.name.as_str(), i).is_some() {
            return Err(ClockError::DuplicateName {
                name: d.name.clone(),
            });
        }
    }

    let mut edges: BTreeSet<(usize, usize)> = BTreeSet::new();
    for (i, d) in domains.iter().enumerate() {
        for dep in &d.depends_on {
            let &j = index
                .get(dep.as_str())
                .ok_or_else(|| ClockError::UnknownDomain {
                    domain: d.name.clone(),
                    dependency: dep.clone(),
                })?;
            edges.insert((j, i));
        }
    }

    let settle = gated(domains, |g| matches!(g, ResetGate::PowerOnSettle { .. }));
    let lock = gated(domains, |g| matches!(g, ResetGate::PllLock));
    let primary = gated(domains, |g| matches!(g, ResetGate::Primary));

    for &s in &settle {
        for &l in &lock {
            edges.insert((s, l));
        }
    }
    for &g in settle.iter().chain(&lock) {
        for &p in &primary {
            edges.insert((g, p));
        }
    }

    let mut successors: Vec<Vec<usize>> = vec![Vec::new(); domains.len()];
    let mut in_degree = vec![0usize; domains.len()];
    for &(from, to) in &edges {
        successors[from].push(to);
        in_degree[to] += 1;
    }

    let mut ready: BTreeSet<usize> = (0..domains.len()).filter(|&i| in_degree[i] == 0).collect();
    let mut order = Vec::with_capacity(domains.len());
    while let Some(next) = ready.pop_first() {
        order.push(next);
        for &to in &successors[next] {
            in_degree[to] -= 1;
            if in_degree[to] == 0 {
                ready.insert(to);
            }
        }
    }

    if order.len() < domains.len() {
        let cycle = find_cycle(&edges, &in_degree)
            .into_iter()
            .map(|i| domains[i].name.clone())
            .collect();
        return Err(ClockError::CyclicDependency { cycle });
    }

    let names: Vec<String> = order.into_iter().map(|i| domains[i].name.clone()).collect();
    debug!("reset release order: {}", names.join(", "));
    Ok(names)
}

fn gated(domains: &[ClockDomain], pred: impl Fn(&ResetGate) -> bool) -> Vec<usize> {
    domains
        .iter()
        .enumerate()
        .filter(|(_, d)| pred(&d.reset.gate))
        .map(|(i, _)| i)
        .collect()
}

/// Extract one cycle from the nodes Kahn's algorithm could not release.
///
/// Every stuck node has a stuck predecessor, so walking predecessors must
/// revisit a node. The result is in release order with the first node
/// repeated at the end.
fn find_cycle(edges: &BTreeSet<(usize, usize)>, in_degree: &[usize]) -> Vec<usize> {
    let stuck = |i: usize| in_degree[i] > 0;
    let Some(start) = (0..in_degree.len()).find(|&i| stuck(i)) else {
        return Vec::new();
    };

    let mut path = vec![start];
    let mut seen: HashMap<usize, usize> = HashMap::from([(start, 0)]);
    let mut current = start;
    loop {
        let Some(&(pred, _)) = edges
            .iter()
            .find(|&&(from, to)| to == current && stuck(from))
        else {
            return path;
        };
        if let Some(&pos) = seen.get(&pred) {
            let mut cycle: Vec<usize> = path[pos..].iter().rev().copied().collect();
            cycle.push(current);
            return cycle;
        }
        seen.insert(pred, path.len());
        path.push(pred);
        current = pred;
    }
}
