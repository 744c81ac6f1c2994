//! Import resolution and per-module export tables.
//!
//! The resolver only answers "which file does this specifier mean" and
//! "what does that file export". It never type-checks the module it
//! opens; export tables are computed from top-level `export` statements.

use std::collections::{BTreeSet, HashMap};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::ast::{ExportDecl, Program, StmtKind};
use crate::builtins::{StdModule, find_std_module};
use crate::error::CoreError;
use crate::parser::parse_source;
use crate::stdlib::std_module_name;

/// Where an import specifier points.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResolvedModule {
    Std(String),
    /// `exists` is false when no candidate was found; `path` is then the
    /// `.lj` guess, for the diagnostic.
    File { path: PathBuf, exists: bool },
}

/// Resolve `specifier` as written in `importer`.
pub fn resolve(specifier: &str, importer: &Path) -> ResolvedModule {
    if let Some(name) = std_module_name(specifier) {
        return ResolvedModule::Std(name.to_string());
    }
    let base = importer.parent().unwrap_or_else(|| Path::new(""));
    let literal = base.join(specifier);
    let candidates = [
        literal.clone(),
        with_suffix(&literal, ".lj"),
        with_suffix(&literal, ".js"),
    ];
    for candidate in &candidates {
        if candidate.is_file() {
            return ResolvedModule::File {
                path: candidate.clone(),
                exists: true,
            };
        }
    }
    let guess = if literal.extension().is_some_and(|ext| ext == "lj") {
        literal
    } else {
        with_suffix(&literal, ".lj")
    };
    ResolvedModule::File {
        path: guess,
        exists: false,
    }
}

fn with_suffix(path: &Path, suffix: &str) -> PathBuf {
    let mut raw = path.as_os_str().to_os_string();
    raw.push(suffix);
    PathBuf::from(raw)
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExportTable {
    pub exports: BTreeSet<String>,
    pub has_default: bool,
}

impl ExportTable {
    pub fn from_program(program: &Program) -> Self {
        let mut table = ExportTable::default();
        for stmt in &program.body {
            let StmtKind::Export(export) = &stmt.kind else {
                continue;
            };
            match export {
                ExportDecl::Decl(inner) => {
                    let name = match &inner.kind {
                        StmtKind::Var(decl) => Some(&decl.name),
                        StmtKind::Function(func) => Some(&func.name),
                        StmtKind::Class(class) => Some(&class.name),
                        StmtKind::Enum(decl) => Some(&decl.name),
                        _ => None,
                    };
                    if let Some(name) = name {
                        table.exports.insert(name.name.clone());
                    }
                }
                ExportDecl::Default(_) => table.has_default = true,
                ExportDecl::Named(names) => {
                    for name in names {
                        // `export { a as b }` exports `b`
                        table.exports.insert(name.local().name.clone());
                    }
                }
            }
        }
        table
    }

    pub fn from_std(module: &StdModule) -> Self {
        ExportTable {
            exports: module.export_names().map(str::to_string).collect(),
            has_default: false,
        }
    }

    pub fn contains(&self, name: &str) -> bool {
        self.exports.contains(name)
    }
}

/// Export tables of every module one compiler has opened, keyed by path.
#[derive(Debug, Default)]
pub struct ModuleCache {
    tables: HashMap<PathBuf, Arc<ExportTable>>,
}

impl ModuleCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Export table of a Ljos source file, parsed on first request.
    pub fn exports(&mut self, path: &Path) -> Result<Arc<ExportTable>, CoreError> {
        if let Some(table) = self.tables.get(path) {
            return Ok(Arc::clone(table));
        }
        let source = fs::read_to_string(path)?;
        let program = parse_source(&source)?;
        let table = Arc::new(ExportTable::from_program(&program));
        self.tables.insert(path.to_path_buf(), Arc::clone(&table));
        Ok(table)
    }

    /// Export table behind a resolved import, when one can be known.
    ///
    /// Plain `.js` files and files that fail to parse have no table; their
    /// imports are taken on trust.
    pub fn exports_of(&mut self, module: &ResolvedModule) -> Option<Arc<ExportTable>> {
        match module {
            ResolvedModule::Std(name) => {
                find_std_module(name).map(|m| Arc::new(ExportTable::from_std(m)))
            }
            ResolvedModule::File { path, exists: true }
                if path.extension().is_some_and(|ext| ext == "lj") =>
            {
                self.exports(path).ok()
            }
            ResolvedModule::File { .. } => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn std_specifiers_skip_the_filesystem() {
        assert_eq!(
            resolve("std:io", Path::new("src/main.lj")),
            ResolvedModule::Std("io".into())
        );
    }

    #[test]
    fn tries_literal_then_lj_then_js() {
        let dir = tempdir().expect("tempdir");
        let importer = dir.path().join("main.lj");
        fs::write(dir.path().join("util.js"), "").expect("write js");
        assert_eq!(
            resolve("./util", &importer),
            ResolvedModule::File {
                path: dir.path().join("./util.js"),
                exists: true
            }
        );

        fs::write(dir.path().join("util.lj"), "").expect("write lj");
        assert_eq!(
            resolve("./util", &importer),
            ResolvedModule::File {
                path: dir.path().join("./util.lj"),
                exists: true
            }
        );
    }

    #[test]
    fn missing_modules_report_the_lj_guess() {
        let dir = tempdir().expect("tempdir");
        let importer = dir.path().join("main.lj");
        let ResolvedModule::File { path, exists } = resolve("./nowhere", &importer) else {
            panic!("expected a file");
        };
        assert!(!exists);
        assert!(path.ends_with("nowhere.lj"));
    }

    #[test]
    fn export_tables_cover_every_export_form() {
        let program = parse_source(
            "export const a = 1\nexport fn b() {}\nexport class C {}\nconst d = 2\nconst e = 3\nexport { d, e as f }\nexport default d",
        )
        .expect("parse");
        let table = ExportTable::from_program(&program);
        let names: Vec<&str> = table.exports.iter().map(String::as_str).collect();
        assert_eq!(names, vec!["C", "a", "b", "d", "f"]);
        assert!(table.has_default);
    }

    #[test]
    fn cache_parses_each_file_once() {
        let dir = tempdir().expect("tempdir");
        let path = dir.path().join("lib.lj");
        fs::write(&path, "export fn helper() {}").expect("write");
        let mut cache = ModuleCache::new();
        let first = cache.exports(&path).expect("exports");
        fs::write(&path, "export fn other() {}").expect("rewrite");
        let second = cache.exports(&path).expect("exports");
        assert!(Arc::ptr_eq(&first, &second));
        assert!(second.contains("helper"));
    }

    #[test]
    fn std_modules_have_fixed_tables() {
        let mut cache = ModuleCache::new();
        let table = cache
            .exports_of(&ResolvedModule::Std("str".into()))
            .expect("std table");
        assert!(table.contains("trim"));
        assert!(!table.has_default);
    }
}
