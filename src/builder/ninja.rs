//! Ninja file rendering.
//!
//! The output is regenerated in full on every run; it is never patched.

use crate::builder::graph::{BuildGraph, Edge, Rule};

/// Version 1.3 is the first with `deps = gcc`.
pub const NINJA_REQUIRED_VERSION: &str = "1.3";

/// Escape a path for a `build` line.
pub fn escape_path(path: &str) -> String {
    let mut out = String::with_capacity(path.len());
    for c in path.chars() {
        match c {
            '$' => out.push_str("$$"),
            ' ' => out.push_str("$ "),
            ':' => out.push_str("$:"),
            _ => out.push(c),
        }
    }
    out
}

/// Escape a literal variable value (per-edge flags).
pub fn escape_value(value: &str) -> String {
    value.replace('$', "$$")
}

fn write_rule(out: &mut String, rule: &Rule) {
    out.push_str(&format!("rule {}\n", rule.name));
    for (key, value) in &rule.variables {
        out.push_str(&format!("  {} = {}\n", key, value));
    }
    out.push('\n');
}

fn write_edge(out: &mut String, edge: &Edge) {
    out.push_str(&format!("build {}: {}", escape_path(&edge.target), edge.rule));
    for input in &edge.inputs {
        out.push_str(&format!(" {}", escape_path(input)));
    }
    out.push('\n');
    for (key, value) in &edge.bindings {
        out.push_str(&format!("  {} = {}\n", key, escape_value(value)));
    }
}

/// Render the whole graph as a ninja file.
pub fn render(graph: &BuildGraph) -> String {
    let mut out = String::new();
    out.push_str("# This file is auto-generated by kiln.\n");
    out.push_str("# Do not edit it; your changes will be erased.\n\n");
    out.push_str(&format!("ninja_required_version = {}\n\n", NINJA_REQUIRED_VERSION));

    for (key, value) in &graph.globals {
        if value.is_empty() {
            out.push_str(&format!("{} =\n", key));
        } else {
            out.push_str(&format!("{} = {}\n", key, value));
        }
    }
    if !graph.globals.is_empty() {
        out.push('\n');
    }

    for rule in &graph.rules {
        write_rule(&mut out, rule);
    }

    let mut previous_phony = false;
    for edge in graph.edges() {
        write_edge(&mut out, edge);
        // Blank line after each variant's alias for readability
        if edge.is_phony() && !previous_phony {
            out.push('\n');
        }
        previous_phony = edge.is_phony();
    }

    if !graph.defaults().is_empty() {
        out.push('\n');
        let defaults: Vec<String> = graph.defaults().iter().map(|d| escape_path(d)).collect();
        out.push_str(&format!("default {}\n", defaults.join(" ")));
    }

    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> BuildGraph {
        let mut g = BuildGraph::new();
        g.add_global("run_wrapper", "");
        g.add_rule(Rule::new("run").var("command", "$run_wrapper$in"));
        g.add_rule(
            Rule::new("compile")
                .var("command", "cc $flags -c $in -o $out")
                .var("deps", "gcc")
                .var("depfile", "$out.d"),
        );
        g.add_rule(Rule::new("link").var("command", "cc $in $flags -o $out"));
        g.add_source("src/a.c");
        g.add_edge(
            Edge::new("b/default-debug/objs/src/a.o", "compile")
                .input("src/a.c")
                .bind("flags", "-O0 -DDEBUG"),
        )
        .unwrap();
        g.add_edge(
            Edge::new("b/default-debug/runner", "link")
                .input("b/default-debug/objs/src/a.o")
                .bind("flags", ""),
        )
        .unwrap();
        g.add_edge(Edge::phony("default-debug", vec!["b/default-debug/runner".to_string()]))
            .unwrap();
        g.add_edge(Edge::new("run-default-debug", "run").input("b/default-debug/runner"))
            .unwrap();
        g.add_default("run-default-debug");
        g
    }

    #[test]
    fn test_render_layout() {
        let text = render(&sample());

        assert!(text.starts_with("# This file is auto-generated"));
        assert!(text.contains("ninja_required_version = 1.3\n"));
        assert!(text.contains("run_wrapper =\n"));
        assert!(text.contains("rule run\n  command = $run_wrapper$in\n"));
        assert!(text.contains("rule compile\n  command = cc $flags -c $in -o $out\n  deps = gcc\n  depfile = $out.d\n"));
        assert!(text.contains(
            "build b/default-debug/objs/src/a.o: compile src/a.c\n  flags = -O0 -DDEBUG\n"
        ));
        assert!(text.contains("build default-debug: phony b/default-debug/runner\n"));
        assert!(text.contains("build run-default-debug: run b/default-debug/runner\n"));
        assert!(text.ends_with("default run-default-debug\n"));

        // Rules are declared before any edge uses them
        let rule = text.find("rule compile").unwrap();
        let edge = text.find("build b/default-debug/objs").unwrap();
        assert!(rule < edge);
    }

    #[test]
    fn test_render_exact_text() {
        let mut g = BuildGraph::new();
        g.add_global("run_wrapper", "");
        g.add_rule(Rule::new("run").var("command", "$run_wrapper$in"));
        g.add_rule(Rule::new("link").var("command", "cc $in $flags -o $out"));
        g.add_edge(Edge::new("b/runner", "link").bind("flags", "-lm"))
            .unwrap();
        g.add_edge(Edge::new("run-x", "run").input("b/runner")).unwrap();
        g.add_default("run-x");

        assert_eq!(
            render(&g),
            "# This file is auto-generated by kiln.\n\
             # Do not edit it; your changes will be erased.\n\n\
             ninja_required_version = 1.3\n\n\
             run_wrapper =\n\n\
             rule run\n  command = $run_wrapper$in\n\n\
             rule link\n  command = cc $in $flags -o $out\n\n\
             build b/runner: link\n  flags = -lm\n\
             build run-x: run b/runner\n\
             \ndefault run-x\n"
        );
    }

    #[test]
    fn test_escaping() {
        assert_eq!(escape_path("C:/dir with space/$x"), "C$:/dir$ with$ space/$$x");
        assert_eq!(escape_value("-DVAL=$HOME"), "-DVAL=$$HOME");
        assert_eq!(escape_value("valgrind --x "), "valgrind --x ");
    }

    #[test]
    fn test_render_is_stable() {
        assert_eq!(render(&sample()), render(&sample()));
    }
}
