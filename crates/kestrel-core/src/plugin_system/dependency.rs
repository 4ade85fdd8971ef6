use std::collections::{HashMap, HashSet};

use thiserror::Error;

/// Errors produced while resolving the plugin load order. Both variants are
/// fatal configuration errors and abort startup.
#[derive(Debug, Error)]
pub enum DependencyError {
    #[error("Plugin '{plugin}' depends on unknown plugin '{dependency}'")]
    MissingDependency { plugin: String, dependency: String },

    /// Cycle detected; names the participating plugins.
    #[error("Circular dependency detected involving: {}", .0.join(" -> "))]
    CyclicDependency(Vec<String>),
}

/// One node of the ordering problem.
#[derive(Debug, Clone)]
pub struct LoadOrderInput {
    pub name: String,
    pub weight: i32,
    /// Position in factory registration order; final tie-break.
    pub registration_order: usize,
    /// Names this plugin requires, already evaluated against its
    /// configuration.
    pub dependencies: Vec<String>,
}

/// Compute a deterministic load order: a layered topological sort where
/// every dependency precedes its dependents, and each layer of
/// mutually-independent plugins is ordered by ascending weight, ties broken
/// by registration order.
pub fn resolve_load_order(inputs: &[LoadOrderInput]) -> Result<Vec<String>, DependencyError> {
    let known: HashSet<&str> = inputs.iter().map(|i| i.name.as_str()).collect();
    for input in inputs {
        for dep in &input.dependencies {
            if !known.contains(dep.as_str()) {
                return Err(DependencyError::MissingDependency {
                    plugin: input.name.clone(),
                    dependency: dep.clone(),
                });
            }
        }
    }

    // dependents[d] lists plugins waiting on d; in_degree counts each
    // plugin's unsatisfied dependencies.
    let mut dependents: HashMap<&str, Vec<&str>> = HashMap::new();
    let mut in_degree: HashMap<&str, usize> = HashMap::new();
    let by_name: HashMap<&str, &LoadOrderInput> =
        inputs.iter().map(|i| (i.name.as_str(), i)).collect();

    for input in inputs {
        let unique_deps: HashSet<&str> = input.dependencies.iter().map(String::as_str).collect();
        in_degree.insert(input.name.as_str(), unique_deps.len());
        for dep in unique_deps {
            dependents.entry(dep).or_default().push(input.name.as_str());
        }
    }

    let mut order = Vec::with_capacity(inputs.len());
    let mut layer: Vec<&str> = in_degree
        .iter()
        .filter(|(_, degree)| **degree == 0)
        .map(|(name, _)| *name)
        .collect();

    while !layer.is_empty() {
        layer.sort_by_key(|name| {
            let input = by_name[name];
            (input.weight, input.registration_order)
        });

        let mut next_layer = Vec::new();
        for name in layer {
            order.push(name.to_string());
            if let Some(waiting) = dependents.get(name) {
                for dependent in waiting {
                    if let Some(degree) = in_degree.get_mut(dependent) {
                        *degree -= 1;
                        if *degree == 0 {
                            next_layer.push(*dependent);
                        }
                    }
                }
            }
        }
        layer = next_layer;
    }

    if order.len() == inputs.len() {
        Ok(order)
    } else {
        // Everything left over participates in (or depends on) a cycle.
        let placed: HashSet<&str> = order.iter().map(String::as_str).collect();
        let mut cycle: Vec<String> = inputs
            .iter()
            .map(|i| i.name.clone())
            .filter(|name| !placed.contains(name.as_str()))
            .collect();
        cycle.sort();
        Err(DependencyError::CyclicDependency(cycle))
    }
}
