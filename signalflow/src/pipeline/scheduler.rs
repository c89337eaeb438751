//! Execution-plan computation.
//!
//! The plan is derived purely from resolved field dependencies: to place a
//! stage, first place the producer of each of its input fields, then append
//! the stage itself. The declared `follows` topology plays no part here.
//! Traversal runs in definition order so the same configuration always
//! yields the same plan.

use super::node::{ExecutionPlan, NodeId, StageNode};
use crate::errors::BuildError;

/// Computes the serial execution plan over the node arena.
///
/// Nodes must already carry their resolved `input_sources`. Marks each node
/// scheduled as it is placed. A stage found on the active recursion path
/// fails with [`BuildError::CyclicDependency`] carrying the cycle.
pub(crate) fn compute_plan(nodes: &mut [StageNode]) -> Result<ExecutionPlan, BuildError> {
    let mut plan = Vec::with_capacity(nodes.len());
    let mut visiting: Vec<usize> = Vec::new();

    for index in 0..nodes.len() {
        visit(index, nodes, &mut visiting, &mut plan)?;
    }

    Ok(plan)
}

fn visit(
    index: usize,
    nodes: &mut [StageNode],
    visiting: &mut Vec<usize>,
    plan: &mut ExecutionPlan,
) -> Result<(), BuildError> {
    if nodes[index].scheduled {
        return Ok(());
    }

    if let Some(start) = visiting.iter().position(|&i| i == index) {
        let mut path: Vec<String> = visiting[start..]
            .iter()
            .map(|&i| nodes[i].name().to_string())
            .collect();
        path.push(nodes[index].name().to_string());
        return Err(BuildError::CyclicDependency { path });
    }

    visiting.push(index);

    let producers: Vec<NodeId> = nodes[index].input_sources.iter().map(|&(id, _)| id).collect();
    for producer in producers {
        if !nodes[producer.index()].scheduled {
            visit(producer.index(), nodes, visiting, plan)?;
        }
    }

    visiting.pop();

    plan.push(NodeId(index));
    nodes[index].scheduled = true;
    Ok(())
}
