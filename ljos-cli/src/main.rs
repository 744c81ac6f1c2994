use std::fs;
use std::io::{self, Read};
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};
use clap::{Parser, ValueEnum};
use ljos_core::{CompileResult, Compiler, CompilerOptions, Target, load_config};

/// Compile Ljos sources to JavaScript or C++.
#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
struct Cli {
    /// Source file; read from stdin when omitted.
    #[arg(short, long)]
    input: Option<String>,

    /// Output file; generated code goes to stdout when omitted.
    #[arg(short, long)]
    output: Option<String>,

    #[arg(long, value_enum, help = "Code generation target (overrides the config)")]
    target: Option<TargetArg>,

    #[arg(long, value_name = "PATH", help = "Path to a JSON project config")]
    config: Option<String>,

    #[arg(long, help = "Report diagnostics without writing any output")]
    check: bool,

    #[arg(
        long,
        value_name = "DIR",
        conflicts_with_all = ["input", "output"],
        help = "Compile every .lj file under DIR into the configured outDir"
    )]
    tree: Option<String>,
}

#[derive(ValueEnum, Clone, Copy, Debug)]
enum TargetArg {
    Js,
    Native,
}

impl From<TargetArg> for Target {
    fn from(arg: TargetArg) -> Self {
        match arg {
            TargetArg::Js => Target::Js,
            TargetArg::Native => Target::Native,
        }
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    execute(cli)
}

fn execute(cli: Cli) -> Result<()> {
    let mut options = match &cli.config {
        Some(path) => load_config(path).with_context(|| format!("failed to load config {path}"))?,
        None => CompilerOptions::default(),
    };
    if let Some(target) = cli.target {
        options.target = target.into();
    }
    let mut compiler = Compiler::new(options);

    if let Some(root) = &cli.tree {
        return compile_tree(&mut compiler, Path::new(root));
    }

    let (source, filename) = match &cli.input {
        Some(path) => (
            fs::read_to_string(path).with_context(|| format!("failed to read input file {path}"))?,
            PathBuf::from(path),
        ),
        None => {
            let mut buffer = String::new();
            io::stdin()
                .read_to_string(&mut buffer)
                .context("failed to read stdin")?;
            (buffer, PathBuf::from("<stdin>"))
        }
    };

    let result = compiler.compile(&source, &filename);
    report(&result);
    let Some(code) = result.code.as_deref().filter(|_| result.success) else {
        bail!("compilation failed with {} error(s)", result.errors.len());
    };
    if cli.check {
        return Ok(());
    }

    match &cli.output {
        Some(path) => write_output(path, code)?,
        None => print!("{code}"),
    }
    Ok(())
}

fn compile_tree(compiler: &mut Compiler, root: &Path) -> Result<()> {
    if !root.is_dir() {
        bail!("{} is not a directory", root.display());
    }
    let results = compiler.compile_tree(root);
    let mut failed = 0;
    for (_, result) in &results {
        report(result);
        if !result.success {
            failed += 1;
        }
    }
    if failed > 0 {
        bail!("{failed} of {} file(s) failed to compile", results.len());
    }
    eprintln!("compiled {} file(s)", results.len());
    Ok(())
}

fn report(result: &CompileResult) {
    for diagnostic in result.diagnostics() {
        eprintln!("{diagnostic}");
    }
}

fn write_output(path: &str, code: &str) -> Result<()> {
    if let Some(parent) = PathBuf::from(path).parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)
                .with_context(|| format!("failed to create directory {parent:?}"))?;
        }
    }
    fs::write(path, code).with_context(|| format!("failed to write output file {path}"))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_cmd::Command;
    use predicates::prelude::*;
    use tempfile::tempdir;

    #[test]
    fn compiles_a_file_to_javascript() {
        let dir = tempdir().expect("tempdir");
        let input_path = dir.path().join("main.lj");
        fs::write(&input_path, "const greeting = \"hi\"\nprintln(greeting)").expect("write input");
        let output_path = dir.path().join("out/main.js");

        Command::cargo_bin("ljos-cli")
            .expect("binary exists")
            .arg("--input")
            .arg(&input_path)
            .arg("--output")
            .arg(&output_path)
            .assert()
            .success();

        let js = fs::read_to_string(&output_path).expect("read output");
        assert!(js.contains("const greeting = \"hi\";"));
        assert!(js.contains("console.log(greeting);"));
    }

    #[test]
    fn reads_stdin_and_writes_stdout() {
        Command::cargo_bin("ljos-cli")
            .expect("binary exists")
            .write_stdin("const n = 0x10\nprintln(n)")
            .assert()
            .success()
            .stdout(predicate::str::contains("const n = 16;"));
    }

    #[test]
    fn reports_diagnostics_with_locations() {
        let dir = tempdir().expect("tempdir");
        let input_path = dir.path().join("main.lj");
        fs::write(&input_path, "println(missing)").expect("write input");
        let output_path = dir.path().join("main.js");

        Command::cargo_bin("ljos-cli")
            .expect("binary exists")
            .arg("--input")
            .arg(&input_path)
            .arg("--output")
            .arg(&output_path)
            .assert()
            .failure()
            .stderr(predicate::str::contains("main.lj:1:9: error[E0201]"))
            .stderr(predicate::str::contains("compilation failed with 1 error(s)"));

        assert!(!output_path.exists(), "output written despite errors");
    }

    #[test]
    fn native_target_emits_cpp() {
        Command::cargo_bin("ljos-cli")
            .expect("binary exists")
            .arg("--target")
            .arg("native")
            .write_stdin("println(\"hello\")")
            .assert()
            .success()
            .stdout(predicate::str::contains("int main() {"))
            .stdout(predicate::str::contains("ljos::io::println(\"hello\");"));
    }

    #[test]
    fn config_file_selects_the_target() {
        let dir = tempdir().expect("tempdir");
        let config_path = dir.path().join("ljos.json");
        fs::write(&config_path, r#"{ "target": "native" }"#).expect("write config");

        Command::cargo_bin("ljos-cli")
            .expect("binary exists")
            .arg("--config")
            .arg(&config_path)
            .write_stdin("println(1)")
            .assert()
            .success()
            .stdout(predicate::str::contains("#include"));
    }

    #[test]
    fn reports_broken_config() {
        let dir = tempdir().expect("tempdir");
        let config_path = dir.path().join("ljos.json");
        fs::write(&config_path, r#"{ "extends": "./ljos.json" }"#).expect("write config");

        Command::cargo_bin("ljos-cli")
            .expect("binary exists")
            .arg("--config")
            .arg(&config_path)
            .write_stdin("println(1)")
            .assert()
            .failure()
            .stderr(predicate::str::contains("failed to load config"));
    }

    #[test]
    fn check_mode_writes_nothing() {
        let dir = tempdir().expect("tempdir");
        let input_path = dir.path().join("main.lj");
        fs::write(&input_path, "println(1)").expect("write input");
        let output_path = dir.path().join("main.js");

        Command::cargo_bin("ljos-cli")
            .expect("binary exists")
            .arg("--input")
            .arg(&input_path)
            .arg("--output")
            .arg(&output_path)
            .arg("--check")
            .assert()
            .success()
            .stdout(predicate::str::is_empty());

        assert!(!output_path.exists());
    }

    #[test]
    fn compiles_a_whole_tree() {
        let dir = tempdir().expect("tempdir");
        let src = dir.path().join("src");
        fs::create_dir_all(src.join("lib")).expect("mkdir");
        fs::write(src.join("main.lj"), "import { twice } from \"./lib/math\"\nprintln(twice(2))")
            .expect("write main");
        fs::write(src.join("lib/math.lj"), "export fn twice(n: Int): Int { return n * 2 }")
            .expect("write lib");
        let config_path = dir.path().join("ljos.json");
        let out_dir = dir.path().join("dist");
        fs::write(
            &config_path,
            format!("{{ \"outDir\": {:?} }}", out_dir.display().to_string()),
        )
        .expect("write config");

        Command::cargo_bin("ljos-cli")
            .expect("binary exists")
            .arg("--config")
            .arg(&config_path)
            .arg("--tree")
            .arg(&src)
            .assert()
            .success()
            .stderr(predicate::str::contains("compiled 2 file(s)"));

        let main = fs::read_to_string(out_dir.join("main.js")).expect("main output");
        assert!(main.contains("from \"./lib/math.js\""));
        assert!(out_dir.join("lib/math.js").exists());
    }
}
