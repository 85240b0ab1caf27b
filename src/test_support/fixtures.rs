//! Test fixtures for common test scenarios.
//!
//! [`SourceTree`] lays out a miniature project in a temporary directory,
//! shaped like the test suite kiln configures: unit tests, utilities and
//! example programs, plus a benchmark that must never be compiled.

use std::path::{Path, PathBuf};

use tempfile::TempDir;

/// An example program whose entry point takes no arguments.
pub const EXAMPLE_MAIN_VOID: &str = "#include <stdio.h>\n\nint main(void) {\n    puts(\"hi\");\n    return 0;\n}\n";

/// An example program with the usual `argc`/`argv` entry point.
pub const EXAMPLE_MAIN_ARGS: &str =
    "int main(int argc, char** argv) {\n    (void)argv;\n    return argc - 1;\n}\n";

/// A unit-test translation unit.
pub const UNIT_TEST_C: &str = "#include \"pottery/unit/test_pottery_framework.h\"\n\nPOTTERY_TEST(sample) {\n    pottery_test_assert(1);\n}\n";

/// Files to lay out, relative to the project root.
#[derive(Debug, Clone, Default)]
pub struct SourceTree {
    files: Vec<(PathBuf, String)>,
}

impl SourceTree {
    /// An empty tree.
    pub fn new() -> Self {
        Self::default()
    }

    /// The standard sample project.
    pub fn sample() -> Self {
        SourceTree::new()
            .file("include/pottery/pottery.h", "#pragma once\n")
            .file("test/src/pottery/unit/test_array.c", UNIT_TEST_C)
            .file("test/src/pottery/unit/test_cxx.cxx", UNIT_TEST_C)
            .file("test/src/pottery/benchmark/benchmark_sort.c", UNIT_TEST_C)
            .file("test/src/pottery/unit/README.md", "not a source\n")
            .file("util/pottery/util_alloc.c", "int util_alloc;\n")
            .file("examples/pottery/hello/hello.c", EXAMPLE_MAIN_VOID)
            .file("examples/pottery/args/args.c", EXAMPLE_MAIN_ARGS)
    }

    /// Add a file.
    pub fn file(mut self, path: impl Into<PathBuf>, content: impl Into<String>) -> Self {
        self.files.push((path.into(), content.into()));
        self
    }

    /// Paths in the tree, as given.
    pub fn paths(&self) -> impl Iterator<Item = &Path> {
        self.files.iter().map(|(p, _)| p.as_path())
    }

    /// Write every file below `root`.
    pub fn write_to(&self, root: &Path) -> std::io::Result<()> {
        for (path, content) in &self.files {
            let full = root.join(path);
            if let Some(parent) = full.parent() {
                std::fs::create_dir_all(parent)?;
            }
            std::fs::write(full, content)?;
        }
        Ok(())
    }

    /// Write the tree into a fresh temporary directory.
    pub fn create(&self) -> TempDir {
        let tmp = TempDir::new().expect("failed to create temp dir");
        self.write_to(tmp.path()).expect("failed to write fixture");
        tmp
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sample_tree_is_written() {
        let tree = SourceTree::sample();
        let tmp = tree.create();
        for path in tree.paths() {
            assert!(tmp.path().join(path).is_file(), "{} missing", path.display());
        }
    }
}
