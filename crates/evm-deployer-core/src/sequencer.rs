//! Deployment wave computation.
//!
//! Unit A depends on library L when A's bytecode carries L's placeholder.
//! Waves are dependency layers: wave 0 holds units whose references are all
//! satisfied by the [`LinkMap`], wave k holds units whose references are
//! satisfied by the `LinkMap` or by waves `0..k`. Units in one wave do not
//! depend on each other and may be submitted concurrently.

use std::collections::{BTreeSet, HashMap};

use evm_deployer_types::{CompiledUnit, UnitId};
use evm_linker::{find_placeholders, placeholder_for, LinkMap, PlaceholderToken};
use serde::Serialize;

use crate::errors::DeployError;

/// A unit that cannot be deployed until missing library addresses are recorded.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BlockedUnit {
    pub unit: UnitId,
    /// Placeholders neither in the deployment set nor the `LinkMap`, directly
    /// or through a blocked dependency.
    pub missing: Vec<PlaceholderToken>,
}

/// Ordered deployment layers.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct WavePlan {
    /// Each wave sorted by identity.
    pub waves: Vec<Vec<UnitId>>,
    pub blocked: Vec<BlockedUnit>,
    /// Units already in the `LinkMap`; placed in no wave.
    pub already_deployed: Vec<UnitId>,
}

impl WavePlan {
    /// True when every pending unit has a wave.
    pub fn is_complete(&self) -> bool {
        self.blocked.is_empty()
    }

    pub fn pending_count(&self) -> usize {
        self.waves.iter().map(Vec::len).sum()
    }

    pub fn wave_of(&self, unit: &UnitId) -> Option<usize> {
        self.waves.iter().position(|wave| wave.contains(unit))
    }
}

/// Per-unit edges among the pending units plus unsatisfiable references.
struct DependencyGraph {
    ids: Vec<UnitId>,
    deps: Vec<BTreeSet<usize>>,
    missing: Vec<Vec<PlaceholderToken>>,
}

fn compute_dependency_graph(pending: &[&CompiledUnit], links: &LinkMap) -> DependencyGraph {
    let by_token: HashMap<PlaceholderToken, usize> = pending
        .iter()
        .enumerate()
        .map(|(idx, unit)| (placeholder_for(&unit.id), idx))
        .collect();

    let mut deps = vec![BTreeSet::new(); pending.len()];
    let mut missing = vec![Vec::new(); pending.len()];

    for (idx, unit) in pending.iter().enumerate() {
        for token in find_placeholders(&unit.bytecode) {
            let normalized = token.normalized();
            if let Some(&dep) = by_token.get(&normalized) {
                deps[idx].insert(dep);
            } else if links.library_for_token(&normalized).is_none() {
                missing[idx].push(token);
            }
        }
    }

    DependencyGraph {
        ids: pending.iter().map(|u| u.id.clone()).collect(),
        deps,
        missing,
    }
}

/// Depth-first order with dependencies first, or the first cycle found.
fn topological_sort(graph: &DependencyGraph) -> Result<Vec<usize>, Vec<usize>> {
    let n = graph.ids.len();

    // States: 0 = unvisited, 1 = visiting, 2 = visited
    let mut state = vec![0u8; n];
    let mut order = Vec::with_capacity(n);
    let mut path = Vec::new();

    fn visit(
        node: usize,
        deps: &[BTreeSet<usize>],
        state: &mut [u8],
        order: &mut Vec<usize>,
        path: &mut Vec<usize>,
    ) -> Result<(), Vec<usize>> {
        if state[node] == 2 {
            return Ok(());
        }
        if state[node] == 1 {
            // Cut the path down to the cycle itself
            let start = path.iter().position(|&p| p == node).unwrap_or(0);
            let mut cycle = path[start..].to_vec();
            cycle.push(node);
            return Err(cycle);
        }

        state[node] = 1;
        path.push(node);
        for &dep in &deps[node] {
            visit(dep, deps, state, order, path)?;
        }
        state[node] = 2;
        path.pop();
        order.push(node);
        Ok(())
    }

    for i in 0..n {
        path.clear();
        visit(i, &graph.deps, &mut state, &mut order, &mut path)?;
    }
    Ok(order)
}

/// Partition `units` into deployment waves.
///
/// Fails with [`DeployError::CyclicDependency`] when units reference each
/// other in a cycle (a unit carrying its own placeholder included). Units with
/// references that nothing can satisfy are reported in [`WavePlan::blocked`]
/// together with every unit that depends on them.
pub fn compute_waves(units: &[CompiledUnit], links: &LinkMap) -> Result<WavePlan, DeployError> {
    let mut sorted: Vec<&CompiledUnit> = units.iter().collect();
    sorted.sort_by(|a, b| a.id.cmp(&b.id));
    if let Some(pair) = sorted.windows(2).find(|pair| pair[0].id == pair[1].id) {
        return Err(DeployError::invalid(
            "deployment set",
            format!("unit {} listed twice", pair[0].id),
        ));
    }

    let (deployed, pending): (Vec<&CompiledUnit>, Vec<&CompiledUnit>) =
        sorted.into_iter().partition(|u| links.contains(&u.id));

    let graph = compute_dependency_graph(&pending, links);
    let order = topological_sort(&graph).map_err(|cycle| DeployError::CyclicDependency {
        cycle: cycle.into_iter().map(|i| graph.ids[i].clone()).collect(),
    })?;

    // Dependencies precede dependents in `order`, so one pass settles
    // both blocking and layer depth.
    let mut blocked: Vec<Option<Vec<PlaceholderToken>>> = vec![None; graph.ids.len()];
    let mut level = vec![0usize; graph.ids.len()];
    for &node in &order {
        let mut missing = graph.missing[node].clone();
        for &dep in &graph.deps[node] {
            if let Some(inherited) = &blocked[dep] {
                for token in inherited {
                    if !missing.contains(token) {
                        missing.push(token.clone());
                    }
                }
            }
            level[node] = level[node].max(level[dep] + 1);
        }
        if !missing.is_empty() {
            blocked[node] = Some(missing);
        }
    }

    let mut plan = WavePlan {
        already_deployed: deployed.iter().map(|u| u.id.clone()).collect(),
        ..WavePlan::default()
    };
    for (idx, id) in graph.ids.iter().enumerate() {
        match &blocked[idx] {
            Some(missing) => plan.blocked.push(BlockedUnit {
                unit: id.clone(),
                missing: missing.clone(),
            }),
            None => {
                let depth = level[idx];
                if plan.waves.len() <= depth {
                    plan.waves.resize_with(depth + 1, Vec::new);
                }
                plan.waves[depth].push(id.clone());
            }
        }
    }
    Ok(plan)
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloy_primitives::Address;
    use evm_deployer_types::{Bytecode, InterfaceDescriptor};

    fn id(name: &str) -> UnitId {
        UnitId::new(&format!("contracts/{name}.sol"), name)
    }

    /// A unit whose bytecode references each of `refs`.
    fn unit(name: &str, refs: &[&str]) -> CompiledUnit {
        let mut code = String::from("0x6080");
        for r in refs {
            code.push_str(placeholder_for(&id(r)).as_str());
            code.push_str("00");
        }
        CompiledUnit::new(id(name), InterfaceDescriptor::default(), Bytecode::new(code))
    }

    fn ids(names: &[&str]) -> Vec<UnitId> {
        names.iter().map(|n| id(n)).collect()
    }

    #[test]
    fn test_chain_of_three() {
        let units = vec![unit("C", &["B"]), unit("A", &[]), unit("B", &["A"])];
        let plan = compute_waves(&units, &LinkMap::new()).unwrap();
        assert_eq!(plan.waves, vec![ids(&["A"]), ids(&["B"]), ids(&["C"])]);
        assert!(plan.is_complete());
    }

    #[test]
    fn test_independent_units_share_a_wave() {
        let units = vec![unit("Pool", &["Math", "Types"]), unit("Types", &[]), unit("Math", &[])];
        let plan = compute_waves(&units, &LinkMap::new()).unwrap();
        assert_eq!(plan.waves, vec![ids(&["Math", "Types"]), ids(&["Pool"])]);
    }

    #[test]
    fn test_diamond_layers_by_longest_path() {
        // D -> B -> A, D -> A
        let units = vec![unit("A", &[]), unit("B", &["A"]), unit("D", &["A", "B"])];
        let plan = compute_waves(&units, &LinkMap::new()).unwrap();
        assert_eq!(plan.wave_of(&id("D")), Some(2));
    }

    #[test]
    fn test_linkmap_satisfies_references() {
        let mut links = LinkMap::new();
        links.record(id("A"), Address::repeat_byte(1)).unwrap();
        let units = vec![unit("B", &["A"])];
        let plan = compute_waves(&units, &links).unwrap();
        assert_eq!(plan.waves, vec![ids(&["B"])]);
    }

    #[test]
    fn test_already_deployed_units_are_skipped() {
        let mut links = LinkMap::new();
        links.record(id("A"), Address::repeat_byte(1)).unwrap();
        let units = vec![unit("A", &[]), unit("B", &["A"])];
        let plan = compute_waves(&units, &links).unwrap();
        assert_eq!(plan.already_deployed, ids(&["A"]));
        assert_eq!(plan.waves, vec![ids(&["B"])]);
    }

    #[test]
    fn test_missing_library_blocks_transitively() {
        let units = vec![unit("B", &["Ghost"]), unit("C", &["B"]), unit("D", &[])];
        let plan = compute_waves(&units, &LinkMap::new()).unwrap();
        assert_eq!(plan.waves, vec![ids(&["D"])]);
        assert_eq!(plan.blocked.len(), 2);
        let ghost = placeholder_for(&id("Ghost"));
        assert!(plan.blocked.iter().all(|b| b.missing == vec![ghost.clone()]));

        // Recording the address unblocks them
        let mut links = LinkMap::new();
        links.record(id("Ghost"), Address::repeat_byte(7)).unwrap();
        let plan = compute_waves(&units, &links).unwrap();
        assert!(plan.is_complete());
        assert_eq!(plan.waves, vec![ids(&["B", "D"]), ids(&["C"])]);
    }

    #[test]
    fn test_cycle_is_reported_with_path() {
        let units = vec![unit("A", &["B"]), unit("B", &["A"])];
        match compute_waves(&units, &LinkMap::new()) {
            Err(DeployError::CyclicDependency { cycle }) => {
                assert_eq!(cycle, ids(&["A", "B", "A"]));
            }
            other => panic!("expected cycle, got {:?}", other),
        }
    }

    #[test]
    fn test_three_unit_cycle() {
        let units = vec![unit("C", &["A"]), unit("B", &["C"]), unit("A", &["B"])];
        match compute_waves(&units, &LinkMap::new()) {
            Err(DeployError::CyclicDependency { cycle }) => {
                assert_eq!(cycle, ids(&["A", "B", "C", "A"]));
            }
            other => panic!("expected cycle, got {:?}", other),
        }
    }

    #[test]
    fn test_partially_linked_unit_waits_for_last_library() {
        let mut links = LinkMap::new();
        links.record(id("MathLib"), Address::repeat_byte(1)).unwrap();
        links.record(id("TypesLib"), Address::repeat_byte(2)).unwrap();
        let units = vec![unit("Pool", &["MathLib", "TypesLib", "RateLib"])];

        let plan = compute_waves(&units, &links).unwrap();
        assert!(plan.waves.is_empty());
        assert_eq!(
            plan.blocked,
            vec![BlockedUnit {
                unit: id("Pool"),
                missing: vec![placeholder_for(&id("RateLib"))],
            }]
        );

        links.record(id("RateLib"), Address::repeat_byte(3)).unwrap();
        let plan = compute_waves(&units, &links).unwrap();
        assert!(plan.is_complete());
        assert_eq!(plan.waves, vec![ids(&["Pool"])]);
    }

    #[test]
    fn test_self_reference_is_a_cycle() {
        let units = vec![unit("A", &["A"])];
        match compute_waves(&units, &LinkMap::new()) {
            Err(DeployError::CyclicDependency { cycle }) => {
                assert_eq!(cycle, ids(&["A", "A"]));
            }
            other => panic!("expected cycle, got {:?}", other),
        }
    }

    #[test]
    fn test_duplicate_unit_rejected() {
        let units = vec![unit("A", &[]), unit("A", &[])];
        assert!(matches!(
            compute_waves(&units, &LinkMap::new()),
            Err(DeployError::InvalidValue { .. })
        ));
    }

    #[test]
    fn test_empty_set() {
        let plan = compute_waves(&[], &LinkMap::new()).unwrap();
        assert!(plan.waves.is_empty());
        assert_eq!(plan.pending_count(), 0);
    }
}
