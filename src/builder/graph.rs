//! Build graph IR.
//!
//! A [`BuildGraph`] is the backend-neutral description of everything the
//! external executor has to do: rule declarations, edges, and default
//! targets. It knows nothing about file syntax; see
//! [`crate::builder::ninja`] for rendering.
//!
//! Invariants enforced here:
//! - every edge target is unique in the graph
//! - every input of a non-phony edge is a declared source or another
//!   edge's target
//! - phony edges only alias other edges' targets
//! - the dependency graph is acyclic

use std::collections::{BTreeSet, HashMap};

use miette::Diagnostic;
use petgraph::algo::toposort;
use petgraph::graph::DiGraph;
use thiserror::Error;

/// Errors raised while assembling or validating a build graph.
#[derive(Debug, Error, Diagnostic, PartialEq, Eq)]
pub enum GraphError {
    #[error("duplicate build target `{target}`")]
    #[diagnostic(code(kiln::graph::duplicate_target))]
    DuplicateTarget { target: String },

    #[error("edge `{target}` depends on `{input}`, which is neither a source nor a target")]
    #[diagnostic(code(kiln::graph::dangling_input))]
    DanglingInput { target: String, input: String },

    #[error("edge `{target}` uses undeclared rule `{rule}`")]
    #[diagnostic(code(kiln::graph::unknown_rule))]
    UnknownRule { target: String, rule: String },

    #[error("dependency cycle through `{target}`")]
    #[diagnostic(code(kiln::graph::cycle))]
    Cycle { target: String },
}

/// Name of the built-in alias rule.
pub const PHONY: &str = "phony";

/// A rule declaration: a name plus variable bindings (`command`, `deps`...).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Rule {
    pub name: String,
    pub variables: Vec<(String, String)>,
}

impl Rule {
    pub fn new(name: impl Into<String>) -> Self {
        Rule {
            name: name.into(),
            variables: Vec::new(),
        }
    }

    /// Bind a variable.
    pub fn var(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.variables.push((key.into(), value.into()));
        self
    }

    /// Look up a bound variable.
    pub fn get(&self, key: &str) -> Option<&str> {
        self.variables
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }
}

/// A single build edge.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Edge {
    /// Output path or alias name
    pub target: String,
    /// Rule name (`compile`, `link`, `run`, `phony`...)
    pub rule: String,
    /// Explicit inputs, in order
    pub inputs: Vec<String>,
    /// Per-edge variable bindings (`flags`, `run_wrapper`)
    pub bindings: Vec<(String, String)>,
}

impl Edge {
    pub fn new(target: impl Into<String>, rule: impl Into<String>) -> Self {
        Edge {
            target: target.into(),
            rule: rule.into(),
            inputs: Vec::new(),
            bindings: Vec::new(),
        }
    }

    /// An alias for other targets.
    pub fn phony(target: impl Into<String>, inputs: impl IntoIterator<Item = String>) -> Self {
        Edge::new(target, PHONY).inputs(inputs)
    }

    pub fn input(mut self, input: impl Into<String>) -> Self {
        self.inputs.push(input.into());
        self
    }

    pub fn inputs(mut self, inputs: impl IntoIterator<Item = String>) -> Self {
        self.inputs.extend(inputs);
        self
    }

    pub fn bind(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.bindings.push((key.into(), value.into()));
        self
    }

    /// Look up a per-edge binding.
    pub fn binding(&self, key: &str) -> Option<&str> {
        self.bindings
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    pub fn is_phony(&self) -> bool {
        self.rule == PHONY
    }
}

/// The complete build graph.
#[derive(Debug, Clone, Default)]
pub struct BuildGraph {
    /// File-scope variables (name, default value)
    pub globals: Vec<(String, String)>,
    pub rules: Vec<Rule>,
    edges: Vec<Edge>,
    index: HashMap<String, usize>,
    sources: BTreeSet<String>,
    defaults: Vec<String>,
}

impl BuildGraph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Declare a file-scope variable.
    pub fn add_global(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.globals.push((key.into(), value.into()));
    }

    /// Declare a rule.
    pub fn add_rule(&mut self, rule: Rule) {
        self.rules.push(rule);
    }

    /// Declare a source file that edges may consume.
    pub fn add_source(&mut self, path: impl Into<String>) {
        self.sources.insert(path.into());
    }

    /// Append an edge. Targets must be unique.
    pub fn add_edge(&mut self, edge: Edge) -> Result<(), GraphError> {
        if self.index.contains_key(&edge.target) {
            return Err(GraphError::DuplicateTarget {
                target: edge.target,
            });
        }
        self.index.insert(edge.target.clone(), self.edges.len());
        self.edges.push(edge);
        Ok(())
    }

    /// Mark a target as built by default.
    pub fn add_default(&mut self, target: impl Into<String>) {
        self.defaults.push(target.into());
    }

    pub fn edges(&self) -> &[Edge] {
        &self.edges
    }

    pub fn defaults(&self) -> &[String] {
        &self.defaults
    }

    /// Find the edge producing `target`.
    pub fn edge(&self, target: &str) -> Option<&Edge> {
        self.index.get(target).map(|&i| &self.edges[i])
    }

    /// Edges using a given rule, in insertion order.
    pub fn edges_with_rule<'a>(&'a self, rule: &'a str) -> impl Iterator<Item = &'a Edge> + 'a {
        self.edges.iter().filter(move |e| e.rule == rule)
    }

    /// Check the graph invariants.
    pub fn validate(&self) -> Result<(), GraphError> {
        let rules: BTreeSet<&str> = self.rules.iter().map(|r| r.name.as_str()).collect();

        let mut dag: DiGraph<&str, ()> = DiGraph::new();
        let nodes: Vec<_> = self
            .edges
            .iter()
            .map(|e| dag.add_node(e.target.as_str()))
            .collect();

        for (i, edge) in self.edges.iter().enumerate() {
            if !edge.is_phony() && !rules.contains(edge.rule.as_str()) {
                return Err(GraphError::UnknownRule {
                    target: edge.target.clone(),
                    rule: edge.rule.clone(),
                });
            }

            for input in &edge.inputs {
                match self.index.get(input) {
                    Some(&dep) => {
                        dag.add_edge(nodes[dep], nodes[i], ());
                    }
                    None if !edge.is_phony() && self.sources.contains(input) => {}
                    None => {
                        return Err(GraphError::DanglingInput {
                            target: edge.target.clone(),
                            input: input.clone(),
                        });
                    }
                }
            }
        }

        for default in &self.defaults {
            if !self.index.contains_key(default) {
                return Err(GraphError::DanglingInput {
                    target: "default".to_string(),
                    input: default.clone(),
                });
            }
        }

        toposort(&dag, None).map_err(|cycle| GraphError::Cycle {
            target: dag[cycle.node_id()].to_string(),
        })?;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn graph_with_rules() -> BuildGraph {
        let mut g = BuildGraph::new();
        g.add_rule(Rule::new("compile").var("command", "cc -c $in -o $out"));
        g.add_rule(Rule::new("link").var("command", "cc $in -o $out"));
        g
    }

    #[test]
    fn test_duplicate_target_rejected() {
        let mut g = graph_with_rules();
        g.add_edge(Edge::new("a.o", "compile").input("a.c")).unwrap();
        let err = g.add_edge(Edge::new("a.o", "compile").input("b.c")).unwrap_err();
        assert_eq!(
            err,
            GraphError::DuplicateTarget {
                target: "a.o".to_string()
            }
        );
        assert_eq!(g.edges().len(), 1);
    }

    #[test]
    fn test_well_formed_graph_validates() {
        let mut g = graph_with_rules();
        g.add_source("a.c");
        g.add_edge(Edge::new("a.o", "compile").input("a.c")).unwrap();
        g.add_edge(Edge::new("runner", "link").input("a.o")).unwrap();
        g.add_edge(Edge::phony("all", vec!["runner".to_string()])).unwrap();
        g.add_default("all");

        assert_eq!(g.validate(), Ok(()));
        assert_eq!(g.edge("runner").map(|e| e.rule.as_str()), Some("link"));
    }

    #[test]
    fn test_dangling_input_rejected() {
        let mut g = graph_with_rules();
        g.add_edge(Edge::new("a.o", "compile").input("missing.c")).unwrap();

        assert!(matches!(
            g.validate(),
            Err(GraphError::DanglingInput { ref input, .. }) if input == "missing.c"
        ));
    }

    #[test]
    fn test_phony_must_alias_targets() {
        let mut g = graph_with_rules();
        g.add_source("a.c");
        g.add_edge(Edge::phony("all", vec!["a.c".to_string()])).unwrap();
        assert!(g.validate().is_err());
    }

    #[test]
    fn test_unknown_rule_rejected() {
        let mut g = graph_with_rules();
        g.add_source("a.c");
        g.add_edge(Edge::new("a.o", "assemble").input("a.c")).unwrap();
        assert!(matches!(g.validate(), Err(GraphError::UnknownRule { .. })));
    }

    #[test]
    fn test_cycle_rejected() {
        let mut g = graph_with_rules();
        g.add_edge(Edge::phony("a", vec!["b".to_string()])).unwrap();
        g.add_edge(Edge::phony("b", vec!["a".to_string()])).unwrap();
        assert!(matches!(g.validate(), Err(GraphError::Cycle { .. })));
    }

    #[test]
    fn test_edge_bindings() {
        let edge = Edge::new("run-x", "run")
            .input("x/runner")
            .bind("run_wrapper", "valgrind ");
        assert_eq!(edge.binding("run_wrapper"), Some("valgrind "));
        assert_eq!(edge.binding("flags"), None);
        assert!(!edge.is_phony());
    }
}
