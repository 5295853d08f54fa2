use crate::cues::{has_force_cue, scan_cue, OrderCue};
use crate::error::{PlanError, Result};
use petgraph::algo::toposort;
use petgraph::graph::{DiGraph, NodeIndex};
use petgraph::visit::{Dfs, EdgeRef};
use petgraph::Direction;
use router_protocol::{ActionId, ExecutionPlan, PlanStage, StepDescriptor, Urgency};
use serde_json::json;
use std::collections::HashSet;

/// One resolved action, as the plan builder needs to see it.
#[derive(Debug, Clone, PartialEq)]
pub struct PlanIntent {
    pub action: ActionId,
    /// Token index where the request mentions this action.
    pub position: usize,
    /// Workflow phase of the action's family; lower phases run first on shared resources.
    pub phase: u8,
    pub resources: Vec<String>,
    /// Downstream of success only: anything upstream becomes blocking.
    pub gated: bool,
    pub destructive: bool,
    pub writes_git: bool,
    pub matched: Vec<String>,
}

/// Everything the builder reads from the request besides the intents.
#[derive(Debug, Clone, Default)]
pub struct PlanRequest {
    pub text: String,
    pub tokens: Vec<String>,
    pub paths: Vec<String>,
    pub urgency: Urgency,
    pub intents: Vec<PlanIntent>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum EdgeKind {
    Cue,
    Phase,
}

#[derive(Debug, Default, Clone, Copy)]
pub struct PlanBuilder;

impl PlanBuilder {
    pub fn new() -> Self {
        Self
    }

    pub fn build(&self, request: &PlanRequest) -> Result<ExecutionPlan> {
        if request.intents.is_empty() {
            return Err(PlanError::Empty);
        }
        let mut seen = HashSet::new();
        for intent in &request.intents {
            if !seen.insert(&intent.action) {
                return Err(PlanError::DuplicateAction(intent.action.to_string()));
            }
        }

        // Appearance order: by position, then by the order the caller listed them.
        let mut order: Vec<usize> = (0..request.intents.len()).collect();
        order.sort_by_key(|&i| (request.intents[i].position, i));

        let mut graph: DiGraph<usize, EdgeKind> = DiGraph::new();
        let nodes: Vec<NodeIndex> = (0..request.intents.len()).map(|i| graph.add_node(i)).collect();

        add_cue_edges(&mut graph, &nodes, &order, request);
        add_phase_edges(&mut graph, &nodes, &request.intents);
        let cue_edges = graph
            .edge_weights()
            .filter(|kind| **kind == EdgeKind::Cue)
            .count();
        log::debug!(
            "plan graph: {} cue edges, {} phase edges",
            cue_edges,
            graph.edge_count() - cue_edges
        );

        let (graph, sequential_fallback) = match toposort(&graph, None) {
            Ok(_) => (graph, false),
            Err(cycle) => {
                let action = &request.intents[graph[cycle.node_id()]].action;
                log::warn!(
                    "ordering cues form a cycle through '{action}'; falling back to a sequential plan"
                );
                (sequential_chain(&nodes, &order), true)
            }
        };

        let plan = assemble(&graph, &order, request, sequential_fallback);
        log::info!(
            "plan: {} steps in {} stages{}",
            plan.step_count(),
            plan.stages.len(),
            if sequential_fallback { " (sequential fallback)" } else { "" }
        );
        Ok(plan)
    }
}

fn add_edge_once(graph: &mut DiGraph<usize, EdgeKind>, from: NodeIndex, to: NodeIndex, kind: EdgeKind) {
    if from != to && graph.find_edge(from, to).is_none() {
        graph.add_edge(from, to, kind);
    }
}

/// Mentions sharing a position (one generic verb expanded to several actions) form a group;
/// a cue between two consecutive groups orders every pair across them.
fn add_cue_edges(
    graph: &mut DiGraph<usize, EdgeKind>,
    nodes: &[NodeIndex],
    order: &[usize],
    request: &PlanRequest,
) {
    let mut groups: Vec<(usize, Vec<usize>)> = Vec::new();
    for &i in order {
        let position = request.intents[i].position;
        match groups.last_mut() {
            Some((pos, members)) if *pos == position => members.push(i),
            _ => groups.push((position, vec![i])),
        }
    }

    for pair in groups.windows(2) {
        let (earlier_pos, earlier) = &pair[0];
        let (later_pos, later) = &pair[1];
        let start = (*earlier_pos + 1).min(request.tokens.len());
        let end = (*later_pos).min(request.tokens.len());
        let Some(cue) = scan_cue(&request.tokens[start..end.max(start)]) else {
            continue;
        };
        for &a in earlier {
            for &b in later {
                let (from, to) = match cue {
                    OrderCue::Forward => (nodes[a], nodes[b]),
                    OrderCue::Reverse => (nodes[b], nodes[a]),
                };
                add_edge_once(graph, from, to, EdgeKind::Cue);
            }
        }
    }
}

fn add_phase_edges(graph: &mut DiGraph<usize, EdgeKind>, nodes: &[NodeIndex], intents: &[PlanIntent]) {
    for (i, a) in intents.iter().enumerate() {
        for (j, b) in intents.iter().enumerate().skip(i + 1) {
            if a.phase == b.phase {
                continue;
            }
            let cued = graph.find_edge(nodes[i], nodes[j]).is_some()
                || graph.find_edge(nodes[j], nodes[i]).is_some();
            if cued || !a.resources.iter().any(|r| b.resources.contains(r)) {
                continue;
            }
            let (from, to) = if a.phase < b.phase { (i, j) } else { (j, i) };
            add_edge_once(graph, nodes[from], nodes[to], EdgeKind::Phase);
        }
    }
}

fn sequential_chain(nodes: &[NodeIndex], order: &[usize]) -> DiGraph<usize, EdgeKind> {
    let mut graph: DiGraph<usize, EdgeKind> = DiGraph::new();
    let fresh: Vec<NodeIndex> = (0..nodes.len()).map(|i| graph.add_node(i)).collect();
    for pair in order.windows(2) {
        graph.add_edge(fresh[pair[0]], fresh[pair[1]], EdgeKind::Cue);
    }
    graph
}

/// Longest-path layering over an acyclic graph; node weights are intent indices and node
/// indices match them.
fn assemble(
    graph: &DiGraph<usize, EdgeKind>,
    order: &[usize],
    request: &PlanRequest,
    sequential_fallback: bool,
) -> ExecutionPlan {
    let topo = toposort(graph, None).unwrap_or_else(|_| graph.node_indices().collect());
    let mut stage = vec![0usize; graph.node_count()];
    for node in &topo {
        let level = graph
            .edges_directed(*node, Direction::Incoming)
            .map(|edge| stage[edge.source().index()] + 1)
            .max()
            .unwrap_or(0);
        stage[node.index()] = level;
    }

    let force = has_force_cue(&request.tokens);
    let stage_count = stage.iter().copied().max().map_or(0, |max| max + 1);
    let mut stages: Vec<PlanStage> = (0..stage_count)
        .map(|index| PlanStage {
            index,
            steps: Vec::new(),
        })
        .collect();

    for &i in order {
        let node = NodeIndex::new(i);
        let intent = &request.intents[graph[node]];

        let mut depends_on: Vec<(usize, usize)> = graph
            .edges_directed(node, Direction::Incoming)
            .map(|edge| edge.source().index())
            .map(|pred| (stage[pred], pred))
            .collect();
        depends_on.sort_unstable();

        let blocking = downstream_gated(graph, node, &request.intents);
        let requires_confirmation = intent.destructive || (force && intent.writes_git);

        stages[stage[i]].steps.push(StepDescriptor {
            action_id: intent.action.clone(),
            params: json!({
                "request": request.text,
                "paths": request.paths,
                "urgency": request.urgency.as_str(),
                "matched": intent.matched,
            }),
            blocking,
            requires_confirmation,
            stage: stage[i],
            depends_on: depends_on
                .into_iter()
                .map(|(_, pred)| request.intents[pred].action.clone())
                .collect(),
        });
    }

    ExecutionPlan {
        stages,
        sequential_fallback,
    }
}

fn downstream_gated(graph: &DiGraph<usize, EdgeKind>, start: NodeIndex, intents: &[PlanIntent]) -> bool {
    let mut dfs = Dfs::new(graph, start);
    while let Some(node) = dfs.next(graph) {
        if node != start && intents[graph[node]].gated {
            return true;
        }
    }
    false
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn intent(action: &str, position: usize, phase: u8, resources: &[&str]) -> PlanIntent {
        PlanIntent {
            action: ActionId::from(action),
            position,
            phase,
            resources: resources.iter().map(|r| r.to_string()).collect(),
            gated: false,
            destructive: false,
            writes_git: false,
            matched: Vec::new(),
        }
    }

    fn request(text: &str, intents: Vec<PlanIntent>) -> PlanRequest {
        PlanRequest {
            text: text.to_string(),
            tokens: text.split_whitespace().map(str::to_string).collect(),
            intents,
            ..PlanRequest::default()
        }
    }

    fn stage_actions(plan: &ExecutionPlan) -> Vec<Vec<String>> {
        plan.stages
            .iter()
            .map(|s| s.steps.iter().map(|st| st.action_id.to_string()).collect())
            .collect()
    }

    #[test]
    fn single_intent_is_one_stage() {
        let plan = PlanBuilder::new()
            .build(&request("fix typescript errors", vec![intent("fix-types", 0, 1, &["worktree"])]))
            .unwrap();
        assert_eq!(stage_actions(&plan), vec![vec!["fix-types"]]);
        let step = &plan.stages[0].steps[0];
        assert!(!step.blocking);
        assert!(step.depends_on.is_empty());
        assert_eq!(step.params["request"], "fix typescript errors");
    }

    #[test]
    fn shared_resource_orders_by_phase() {
        let mut commit = intent("git-commit", 4, 4, &["worktree", "git"]);
        commit.gated = true;
        let plan = PlanBuilder::new()
            .build(&request(
                "fix , review , and commit",
                vec![
                    intent("fix-types", 0, 1, &["worktree"]),
                    intent("fix-lint", 0, 1, &["worktree"]),
                    intent("code-review", 2, 3, &["worktree"]),
                    commit,
                ],
            ))
            .unwrap();

        assert_eq!(
            stage_actions(&plan),
            vec![
                vec!["fix-types", "fix-lint"],
                vec!["code-review"],
                vec!["git-commit"]
            ]
        );
        assert!(plan.stages[1].steps[0].blocking);
        assert!(plan.stages[0].steps.iter().all(|s| s.blocking));
        assert!(!plan.stages[2].steps[0].blocking);
        assert_eq!(
            plan.stages[2].steps[0].depends_on,
            vec![
                ActionId::from("fix-types"),
                ActionId::from("fix-lint"),
                ActionId::from("code-review")
            ]
        );
        assert!(!plan.sequential_fallback);
    }

    #[test]
    fn unrelated_actions_run_in_parallel() {
        let plan = PlanBuilder::new()
            .build(&request(
                "document the api and optimize the query",
                vec![
                    intent("write-docs", 0, 3, &["docs"]),
                    intent("optimize-performance", 4, 1, &["worktree"]),
                ],
            ))
            .unwrap();
        assert_eq!(plan.stages.len(), 1);
        assert_eq!(plan.step_count(), 2);
    }

    #[test]
    fn after_reverses_direction() {
        let plan = PlanBuilder::new()
            .build(&request(
                "deploy after tests",
                vec![
                    intent("deploy-service", 0, 5, &[]),
                    intent("run-tests", 2, 2, &[]),
                ],
            ))
            .unwrap();
        assert_eq!(
            stage_actions(&plan),
            vec![vec!["run-tests"], vec!["deploy-service"]]
        );
    }

    #[test]
    fn cue_beats_phase_order() {
        // the review phase normally follows build; the cue says otherwise
        let plan = PlanBuilder::new()
            .build(&request(
                "review then build",
                vec![
                    intent("code-review", 0, 3, &["worktree"]),
                    intent("build-project", 2, 2, &["worktree"]),
                ],
            ))
            .unwrap();
        assert_eq!(
            stage_actions(&plan),
            vec![vec!["code-review"], vec!["build-project"]]
        );
    }

    #[test]
    fn cycle_falls_back_to_request_order() {
        // cues give a -> b -> c; the shared resource adds c -> a (phase 1 before phase 5)
        let plan = PlanBuilder::new()
            .build(&request(
                "a then b then c",
                vec![
                    intent("a", 0, 5, &["git"]),
                    intent("b", 2, 0, &[]),
                    intent("c", 4, 1, &["git"]),
                ],
            ))
            .unwrap();
        assert!(plan.sequential_fallback);
        assert_eq!(stage_actions(&plan), vec![vec!["a"], vec!["b"], vec!["c"]]);
        assert_eq!(plan.stages[2].steps[0].depends_on, vec![ActionId::from("b")]);
    }

    #[test]
    fn confirmation_for_destructive_and_forced_git_writes() {
        let mut push = intent("git-push", 0, 4, &["git"]);
        push.writes_git = true;
        let mut deploy = intent("deploy-service", 3, 5, &[]);
        deploy.destructive = true;

        let plan = PlanBuilder::new()
            .build(&request("push --force then deploy", vec![push.clone(), deploy.clone()]))
            .unwrap();
        assert!(plan.steps().all(|s| s.requires_confirmation));

        let plain = PlanBuilder::new()
            .build(&request("push then deploy", vec![push, deploy]))
            .unwrap();
        let flags: Vec<bool> = plain.steps().map(|s| s.requires_confirmation).collect();
        assert_eq!(flags, vec![false, true]);
    }

    #[test]
    fn empty_and_duplicate_inputs_are_rejected() {
        assert!(matches!(
            PlanBuilder::new().build(&request("nothing", Vec::new())),
            Err(PlanError::Empty)
        ));
        assert!(matches!(
            PlanBuilder::new().build(&request(
                "fix fix",
                vec![intent("fix-types", 0, 1, &[]), intent("fix-types", 1, 1, &[])]
            )),
            Err(PlanError::DuplicateAction(_))
        ));
    }
}
