//! Per-file compilation pipeline.
//!
//! source -> tokens -> AST -> import validation -> checker -> JS or C++.
//! Every stage reports [`Diagnostic`]s instead of failing, so one call
//! surfaces everything that is wrong with a file. Code is produced only
//! when no errors remain.

use std::fs;
use std::path::{Path, PathBuf};

use walkdir::WalkDir;

use crate::ast::{ImportDecl, Program, StmtKind};
use crate::builtins::find_std_module;
use crate::codegen_js::generate;
use crate::codegen_native::generate_native;
use crate::config::{CompilerOptions, Target};
use crate::diagnostic::Diagnostic;
use crate::lexer::tokenize;
use crate::module_graph::{ModuleCache, ResolvedModule, resolve};
use crate::parser::parse;
use crate::span::Span;
use crate::typecheck::{ImportTypes, TypeTable, check};
use crate::types::Type;

#[derive(Debug, Clone, Default)]
pub struct CompileResult {
    pub success: bool,
    pub code: Option<String>,
    /// Present whenever the file parsed.
    pub ast: Option<Program>,
    pub errors: Vec<Diagnostic>,
    pub warnings: Vec<Diagnostic>,
    pub types: TypeTable,
}

impl CompileResult {
    fn failed(errors: Vec<Diagnostic>) -> Self {
        CompileResult {
            errors,
            ..CompileResult::default()
        }
    }

    /// Errors followed by warnings.
    pub fn diagnostics(&self) -> impl Iterator<Item = &Diagnostic> {
        self.errors.iter().chain(self.warnings.iter())
    }
}

/// A compiler instance. It owns the export tables of the modules it has
/// opened, so parallel compiles should each use their own instance.
#[derive(Debug)]
pub struct Compiler {
    options: CompilerOptions,
    modules: ModuleCache,
}

impl Compiler {
    pub fn new(options: CompilerOptions) -> Self {
        Compiler {
            options,
            modules: ModuleCache::new(),
        }
    }

    pub fn options(&self) -> &CompilerOptions {
        &self.options
    }

    /// Compile one source text. `filename` locates relative imports and
    /// labels diagnostics.
    pub fn compile(&mut self, source: &str, filename: impl AsRef<Path>) -> CompileResult {
        let filename = filename.as_ref();

        let tokens = match tokenize(source) {
            Ok(tokens) => tokens,
            Err(error) => {
                let span = Span::new(0, 0, error.line, error.column);
                return CompileResult::failed(vec![
                    Diagnostic::error(error.message, span).with_file(filename),
                ]);
            }
        };
        let program = match parse(tokens) {
            Ok(program) => program,
            Err(errors) => {
                return CompileResult::failed(
                    errors
                        .into_iter()
                        .map(|e| Diagnostic::error(e.message, e.token.span).with_file(filename))
                        .collect(),
                );
            }
        };

        let mut errors = Vec::new();
        let mut warnings = Vec::new();
        let mut imports = ImportTypes::new();
        for stmt in &program.body {
            if let StmtKind::Import(import) = &stmt.kind {
                self.validate_import(import, filename, &mut imports, &mut errors);
            }
        }

        let checked = check(&program, &imports);
        for diagnostic in checked.diagnostics {
            let diagnostic = diagnostic.with_file(filename);
            if !diagnostic.is_error() {
                warnings.push(diagnostic);
            } else if self.options.strict {
                errors.push(diagnostic);
            } else {
                warnings.push(diagnostic.demoted());
            }
        }

        let mut code = None;
        if errors.is_empty() {
            match self.options.target {
                Target::Js => code = Some(generate(&program, &self.options)),
                Target::Native => match generate_native(&program) {
                    Ok(text) => code = Some(text),
                    Err(unsupported) => {
                        errors.extend(unsupported.into_iter().map(|d| d.with_file(filename)))
                    }
                },
            }
        }

        CompileResult {
            success: errors.is_empty(),
            code,
            ast: Some(program),
            errors,
            warnings,
            types: checked.types,
        }
    }

    /// Check one import against what its module exports, recording the
    /// types of the names it binds.
    fn validate_import(
        &mut self,
        import: &ImportDecl,
        importer: &Path,
        imports: &mut ImportTypes,
        errors: &mut Vec<Diagnostic>,
    ) {
        let span = import.source_span;
        bind_unknown(import, imports);

        let module = resolve(&import.source, importer);
        match &module {
            ResolvedModule::Std(name) if find_std_module(name).is_none() => {
                errors.push(
                    Diagnostic::error(format!("module '{}' not found", import.source), span)
                        .with_code("E0301")
                        .with_file(importer),
                );
                return;
            }
            ResolvedModule::File {
                path,
                exists: false,
            } => {
                errors.push(
                    Diagnostic::error(
                        format!(
                            "module '{}' not found (tried '{}')",
                            import.source,
                            path.display()
                        ),
                        span,
                    )
                    .with_code("E0301")
                    .with_file(importer),
                );
                return;
            }
            _ => {}
        }

        let Some(table) = self.modules.exports_of(&module) else {
            return;
        };
        for name in &import.named {
            if !table.contains(&name.name.name) {
                errors.push(
                    Diagnostic::error(
                        format!(
                            "module '{}' has no export named '{}'",
                            import.source, name.name.name
                        ),
                        name.name.span,
                    )
                    .with_code("E0302")
                    .with_file(importer),
                );
            }
        }
        if let Some(default) = &import.default
            && !table.has_default
        {
            errors.push(
                Diagnostic::error(
                    format!("module '{}' has no default export", import.source),
                    default.span,
                )
                .with_code("E0303")
                .with_file(importer),
            );
        }

        if let ResolvedModule::Std(name) = &module
            && let Some(std) = find_std_module(name)
        {
            for name in &import.named {
                if let Some(descriptor) = std.export(&name.name.name) {
                    imports.insert(name.local().name.clone(), descriptor.ty());
                }
            }
        }
    }

    /// Compile a file and write the output, only on success.
    ///
    /// Without an explicit `output` the file lands at
    /// [`CompilerOptions::output_path_for`]. I/O failures are reported as
    /// diagnostics on the result.
    pub fn compile_to_file(&mut self, input: &Path, output: Option<&Path>) -> CompileResult {
        let source = match fs::read_to_string(input) {
            Ok(source) => source,
            Err(error) => {
                return CompileResult::failed(vec![
                    Diagnostic::error(
                        format!("failed to read {}: {error}", input.display()),
                        Span::default(),
                    )
                    .with_file(input),
                ]);
            }
        };
        let mut result = self.compile(&source, input);
        let Some(code) = result.code.as_deref().filter(|_| result.success) else {
            return result;
        };

        let output = output
            .map(Path::to_path_buf)
            .unwrap_or_else(|| self.options.output_path_for(input));
        if let Err(error) = write_output(&output, code) {
            result.success = false;
            result.errors.push(
                Diagnostic::error(
                    format!("failed to write {}: {error}", output.display()),
                    Span::default(),
                )
                .with_file(input),
            );
        }
        result
    }

    /// Compile every `.lj` file under `root`, mirroring the tree into
    /// `out_dir`. Files are compiled independently; one failure does not
    /// stop the rest.
    pub fn compile_tree(&mut self, root: &Path) -> Vec<(PathBuf, CompileResult)> {
        let files: Vec<PathBuf> = WalkDir::new(root)
            .sort_by_file_name()
            .into_iter()
            .filter_map(Result::ok)
            .filter(|entry| entry.file_type().is_file())
            .map(|entry| entry.into_path())
            .filter(|path| path.extension().is_some_and(|ext| ext == "lj"))
            .collect();

        files
            .into_iter()
            .map(|path| {
                let relative = path.strip_prefix(root).unwrap_or(path.as_path());
                let output = self
                    .options
                    .out_dir
                    .join(relative)
                    .with_extension(self.options.target.extension());
                let result = self.compile_to_file(&path, Some(&output));
                (path, result)
            })
            .collect()
    }
}

/// Bind every name an import introduces as `Unknown`. Std names are
/// refined afterwards.
fn bind_unknown(import: &ImportDecl, imports: &mut ImportTypes) {
    for ident in import.default.iter().chain(import.namespace.iter()) {
        imports.insert(ident.name.clone(), Type::Unknown);
    }
    for name in &import.named {
        imports.insert(name.local().name.clone(), Type::Unknown);
    }
}

fn write_output(path: &Path, code: &str) -> std::io::Result<()> {
    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
    {
        fs::create_dir_all(parent)?;
    }
    fs::write(path, code)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn compile(source: &str) -> CompileResult {
        Compiler::new(CompilerOptions::default()).compile(source, "main.lj")
    }

    fn codes(result: &CompileResult) -> Vec<&'static str> {
        result.errors.iter().filter_map(|d| d.code).collect()
    }

    #[test]
    fn successful_compile_produces_code_and_types() {
        let result = compile("const x: Int = 1 + 2\nprintln(x)");
        assert!(result.success, "{:?}", result.errors);
        let code = result.code.expect("code");
        assert!(code.contains("const x = 1 + 2;"));
        assert!(code.contains("console.log(x);"));
        assert!(result.types.values().any(|t| *t == Type::INT));
        assert!(result.ast.is_some());
    }

    #[test]
    fn undefined_identifiers_block_codegen() {
        let result = compile("println(a)\nprintln(b)\nprintln(c)");
        assert!(!result.success);
        assert_eq!(result.errors.len(), 3);
        assert!(result.code.is_none());
        assert!(result.errors.iter().all(|d| d.file.as_deref() == Some(Path::new("main.lj"))));
    }

    #[test]
    fn lexical_errors_are_one_diagnostic() {
        let result = compile("const s = \"open\nconst t = 1");
        assert_eq!(result.errors.len(), 1);
        assert!(result.ast.is_none());
    }

    #[test]
    fn every_syntax_error_is_reported() {
        let result = compile("const = 1\nconst ok = 2\nconst y = )\n");
        assert_eq!(result.errors.len(), 2, "{:?}", result.errors);
    }

    #[test]
    fn non_strict_mode_demotes_checker_errors() {
        let options = CompilerOptions {
            strict: false,
            ..CompilerOptions::default()
        };
        let result = Compiler::new(options).compile("const x: Int = \"no\"", "main.lj");
        assert!(result.success);
        assert!(result.code.is_some());
        assert_eq!(result.warnings.len(), 1);
        assert_eq!(result.warnings[0].code, Some("E0203"));
    }

    #[test]
    fn std_imports_are_validated_and_typed() {
        let result = compile("import { trim, nope } from \"std:str\"\nconst s: Int = trim(\" a \")");
        let codes = codes(&result);
        assert!(codes.contains(&"E0302"), "{codes:?}");
        assert!(codes.contains(&"E0203"), "{codes:?}");

        let missing = compile("import { x } from \"std:nothing\"");
        assert_eq!(self::codes(&missing), vec!["E0301"]);

        let default = compile("import io from \"std:io\"");
        assert_eq!(self::codes(&default), vec!["E0303"]);
    }

    #[test]
    fn file_imports_are_checked_against_exports() {
        let dir = tempdir().expect("tempdir");
        fs::write(dir.path().join("lib.lj"), "export fn helper() {}\nexport default helper")
            .expect("write lib");
        fs::write(dir.path().join("plain.lj"), "export const a = 1").expect("write plain");
        let main = dir.path().join("main.lj");
        let mut compiler = Compiler::new(CompilerOptions::default());

        let ok = compiler.compile(
            "import run, { helper } from \"./lib\"\nhelper()\nrun()",
            &main,
        );
        assert!(ok.success, "{:?}", ok.errors);
        assert!(ok.code.expect("code").contains("from \"./lib.js\""));

        let bad = compiler.compile(
            "import { missing } from \"./lib.lj\"\nimport d from \"./plain\"\nimport { x } from \"./gone\"",
            &main,
        );
        let codes = codes(&bad);
        assert_eq!(codes, vec!["E0302", "E0303", "E0301"]);
        assert!(bad.errors[2].message.contains("gone.lj"));
    }

    #[test]
    fn native_target_reports_unsupported_constructs() {
        let options = CompilerOptions {
            target: Target::Native,
            ..CompilerOptions::default()
        };
        let mut compiler = Compiler::new(options);
        let ok = compiler.compile("println(\"hi\")", "main.lj");
        assert!(ok.code.expect("code").contains("int main()"));

        let bad = compiler.compile("const ch = chan Int(1)", "main.lj");
        assert!(!bad.success);
        assert_eq!(codes(&bad), vec!["E0401"]);
    }

    #[test]
    fn compile_to_file_writes_only_on_success() {
        let dir = tempdir().expect("tempdir");
        let good = dir.path().join("good.lj");
        let bad = dir.path().join("bad.lj");
        fs::write(&good, "println(1)").expect("write good");
        fs::write(&bad, "println(nope)").expect("write bad");
        let mut compiler = Compiler::new(CompilerOptions::default());

        let out = dir.path().join("out/nested/good.js");
        assert!(compiler.compile_to_file(&good, Some(&out)).success);
        assert!(fs::read_to_string(&out).expect("output").contains("console.log(1);"));

        let bad_out = dir.path().join("out/bad.js");
        assert!(!compiler.compile_to_file(&bad, Some(&bad_out)).success);
        assert!(!bad_out.exists());

        let missing = compiler.compile_to_file(&dir.path().join("missing.lj"), None);
        assert!(!missing.success);
        assert!(missing.errors[0].message.contains("failed to read"));
    }

    #[test]
    fn compile_tree_compiles_files_independently() {
        let dir = tempdir().expect("tempdir");
        let src = dir.path().join("src");
        fs::create_dir_all(src.join("app")).expect("mkdir");
        fs::write(src.join("app/a.lj"), "println(1)").expect("write a");
        fs::write(src.join("b.lj"), "println(missing)").expect("write b");
        fs::write(src.join("notes.txt"), "ignored").expect("write txt");

        let options = CompilerOptions {
            out_dir: dir.path().join("dist"),
            ..CompilerOptions::default()
        };
        let results = Compiler::new(options).compile_tree(&src);
        assert_eq!(results.len(), 2);
        let ok: Vec<bool> = results.iter().map(|(_, r)| r.success).collect();
        assert_eq!(ok, vec![true, false]);
        assert!(dir.path().join("dist/app/a.js").exists());
        assert!(!dir.path().join("dist/b.js").exists());
    }
}
