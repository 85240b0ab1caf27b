//! MSVC toolchain implementation.

use std::path::Path;

use crate::builder::graph::Rule;
use crate::util::process::ProcessBuilder;

use super::{Capabilities, CompilerIdentity, Toolchain};

/// Microsoft Visual C++ toolchain (Windows).
#[derive(Debug, Clone)]
pub struct MsvcToolchain {
    identity: CompilerIdentity,
    caps: Capabilities,
}

impl MsvcToolchain {
    /// Create a new MSVC toolchain.
    pub fn new(identity: CompilerIdentity) -> Self {
        let caps = identity.family.capabilities();
        MsvcToolchain { identity, caps }
    }
}

/// MSVC wants backslashes in `/FI` paths.
fn to_backslashes(path: &str) -> String {
    path.replace('/', "\\")
}

impl Toolchain for MsvcToolchain {
    fn identity(&self) -> &CompilerIdentity {
        &self.identity
    }

    fn capabilities(&self) -> &Capabilities {
        &self.caps
    }

    fn probe_command(&self, source: &Path, exe: &Path, flags: &[String]) -> ProcessBuilder {
        ProcessBuilder::new(&self.identity.path)
            .args(["/W4", "/WX"])
            .args(flags)
            .arg(source)
            .arg(format!("/Fe{}", exe.display()))
            .arg(format!("/Fo{}.obj", source.display()))
    }

    fn depfile_probe(&self, _depfile: &Path) -> Option<Vec<String>> {
        // Dependencies come from /showIncludes instead
        None
    }

    fn compile_rule(&self, _launcher: Option<&str>, _depfile: bool) -> Rule {
        Rule::new("compile")
            .var(
                "command",
                format!("{} /showIncludes $flags /c $in /Fo$out", self.identity.cc),
            )
            .var("deps", "msvc")
    }

    fn link_rule(&self) -> Rule {
        Rule::new("link")
            .var("command", "link @$out.rsp /OUT:$out")
            .var("rspfile", "$out.rsp")
            .var("rspfile_content", "$flags $in")
    }

    fn warning_flags(&self) -> Vec<String> {
        // Synchronous PDB writes (/FS) since compiles run in parallel
        ["/W4", "/WX", "/Zi", "/FS"]
            .iter()
            .map(|s| s.to_string())
            .collect()
    }

    fn base_link_flags(&self) -> Vec<String> {
        vec!["/DEBUG".to_string()]
    }

    fn debug_opt_flags(&self, _use_og: bool) -> Vec<String> {
        vec!["/Od".to_string(), "/MDd".to_string()]
    }

    fn release_opt_flags(&self) -> Vec<String> {
        vec!["/O2".to_string(), "/MD".to_string()]
    }

    fn c_language_flags(&self) -> Vec<String> {
        vec!["/TC".to_string()]
    }

    fn cxx_language_flags(&self) -> Vec<String> {
        vec!["/TP".to_string(), "/EHsc".to_string()]
    }

    fn include_flag(&self, dir: &Path) -> String {
        format!("/I{}", dir.display())
    }

    fn define_flag(&self, name: &str, value: Option<&str>) -> String {
        match value {
            Some(v) => format!("-D{}={}", name, v),
            None => format!("-D{}", name),
        }
    }

    fn forced_include_flags(&self, header: &str) -> Vec<String> {
        vec![format!("/FI{}", to_backslashes(header))]
    }

    fn variant_dir_flags(&self, dir: &Path) -> Vec<String> {
        // Per-variant PDB so a link never races a PDB write from another variant
        vec![format!("/Fd{}/", dir.display())]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builder::toolchain::CompilerFamily;

    fn msvc() -> MsvcToolchain {
        MsvcToolchain::new(CompilerIdentity::new(
            CompilerFamily::Msvc,
            "cl",
            "C:/VS/bin/cl.exe",
        ))
    }

    #[test]
    fn test_probe_command() {
        let cmd = msvc().probe_command(
            Path::new("b/flagtest.c"),
            Path::new("b/flagtest.exe"),
            &["/std:c++17".to_string()],
        );
        let args = cmd.get_args();
        assert_eq!(&args[..3], &["/W4", "/WX", "/std:c++17"]);
        assert!(args.contains(&"/Feb/flagtest.exe".to_string()));
        assert!(args.contains(&"/Fob/flagtest.c.obj".to_string()));
    }

    #[test]
    fn test_rules() {
        let tc = msvc();
        let compile = tc.compile_rule(Some("ccache"), true);
        assert_eq!(
            compile.get("command"),
            Some("cl /showIncludes $flags /c $in /Fo$out")
        );
        assert_eq!(compile.get("deps"), Some("msvc"));
        assert_eq!(compile.get("depfile"), None);

        let link = tc.link_rule();
        assert_eq!(link.get("rspfile_content"), Some("$flags $in"));
    }

    #[test]
    fn test_flag_spelling() {
        let tc = msvc();
        assert_eq!(tc.include_flag(Path::new("include")), "/Iinclude");
        assert_eq!(
            tc.forced_include_flags("pottery/unit/example.h"),
            vec!["/FIpottery\\unit\\example.h"]
        );
        assert_eq!(tc.variant_dir_flags(Path::new("b/default-debug")), vec!["/Fdb/default-debug/"]);
        assert!(tc.depfile_probe(Path::new("x.d")).is_none());
    }
}
