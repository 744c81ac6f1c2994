use std::fs;

use ljos_core::error::ConfigError;
use ljos_core::{CompileResult, Compiler, CompilerOptions, Target, load_config};
use tempfile::tempdir;

fn compile(source: &str) -> CompileResult {
    Compiler::new(CompilerOptions::default()).compile(source, "main.lj")
}

fn js(source: &str) -> String {
    let result = compile(source);
    assert!(result.success, "{:?}", result.errors);
    result.code.expect("code on success")
}

fn error_codes(result: &CompileResult) -> Vec<&'static str> {
    result.errors.iter().filter_map(|d| d.code).collect()
}

#[test]
fn numeric_literals_lower_to_decimal() {
    let out = js("const a = 1_000_000\nconst b = 0b1010_1100\nconst c = 0xDEAD_BEEF\nprintln(a + b + c)");
    assert!(out.contains("const a = 1000000;"), "{out}");
    assert!(out.contains("const b = 172;"), "{out}");
    assert!(out.contains("const c = 3735928559;"), "{out}");
}

#[test]
fn nested_comments_leave_no_trace() {
    let out = js("/* outer /* inner /* deeper */ */ still comment */\nconst x = 1 /* trailing */");
    assert!(!out.contains("comment"), "{out}");
    assert!(out.contains("const x = 1;"), "{out}");
}

#[test]
fn arrow_functions_and_groups_are_told_apart() {
    let out = js("const a = 2\nconst b = 3\nconst f = (x, y) => x * y\nconst g = (a + b) * 2");
    assert!(out.contains("const f = (x, y) => x * y;"), "{out}");
    assert!(out.contains("const g = (a + b) * 2;"), "{out}");
}

/// Positions of `needles` in `haystack`, in the order given.
fn positions(haystack: &str, needles: &[&str]) -> Vec<usize> {
    needles
        .iter()
        .map(|needle| {
            haystack
                .find(needle)
                .unwrap_or_else(|| panic!("{needle:?} missing from {haystack}"))
        })
        .collect()
}

fn is_increasing(positions: &[usize]) -> bool {
    positions.windows(2).all(|pair| pair[0] < pair[1])
}

#[test]
fn subject_when_and_if_chain_keep_the_same_clause_order() {
    let header = "fn a() {}\nfn b(n: Int) {}\nfn c() {}\nconst v = 7\n";
    let bodies = ["a();", "b(n);", "c();"];

    let switch = js(&format!("{header}when (v) {{\n 1 | 2 => a()\n n if n > 5 => b(n)\n else => c()\n}}"));
    assert!(switch.contains("switch (__w"), "{switch}");
    assert!(is_increasing(&positions(&switch, &bodies)), "{switch}");

    let chain = js(&format!("{header}when {{\n v < 3 => a()\n v > 5 => b(v)\n else => c()\n}}"));
    assert!(chain.contains("if (v < 3) {"), "{chain}");
    assert!(is_increasing(&positions(&chain, &["a();", "b(v);", "c();"])), "{chain}");
}

#[test]
fn mixed_when_clauses_run_in_source_order() {
    let header = "fn first(x: Int) {}\nfn second() {}\nfn third() {}\nfn fourth() {}\nconst v = 1\n";
    let out = js(&format!(
        "{header}when (v) {{\n 0 => fourth()\n x if x > 3 => first(x)\n 1 => second()\n is Int => third()\n else => fourth()\n}}"
    ));
    let order = positions(&out, &["case 0:", "first(x);", "__w0 === 1", "second();", "third();"]);
    assert!(is_increasing(&order), "{out}");
    assert!(!out.contains("case 1:"), "{out}");
}

#[test]
fn private_fields_of_another_instance_stay_reachable() {
    let out = js(
        "class Account {\n private mut balance: Int = 0\n fn same(other: Account): Bool {\n return this.balance == other.balance\n }\n}",
    );
    assert!(out.contains("this.#balance === other.#balance"), "{out}");
}

#[test]
fn syntax_errors_inside_template_blocks_fail_the_compile() {
    let result = compile("const s = `${(() => { const = 1 })()}`");
    assert!(!result.success);
    assert!(result.code.is_none());
    assert_eq!(result.errors.len(), 1, "{:?}", result.errors);
}

#[test]
fn every_undefined_identifier_is_reported() {
    let source = (0..5).map(|i| format!("println(missing{i})")).collect::<Vec<_>>().join("\n");
    let result = compile(&source);
    assert!(!result.success);
    assert_eq!(error_codes(&result), vec!["E0201"; 5]);
    for (i, diagnostic) in result.errors.iter().enumerate() {
        assert_eq!(diagnostic.line() as usize, i + 1);
    }
}

#[test]
fn abstract_classes_are_guarded_and_rejected() {
    let source = "abstract class Shape {\n abstract fn area(): Float\n}\nclass Square extends Shape {\n fn area(): Float { return 1.0 }\n}\n";
    let out = js(source);
    assert_eq!(out.matches("new.target").count(), 1, "{out}");

    let result = compile(&format!("{source}const s = new Shape()"));
    assert_eq!(error_codes(&result), vec!["E0206"]);
}

#[test]
fn private_members_become_hash_names() {
    let out = js("class Counter {\n private mut count: Int = 0\n fn bump() { this.count += 1 }\n}");
    assert!(out.contains("#count = 0;"), "{out}");
    assert!(out.contains("this.#count += 1;"), "{out}");

    let result = compile("class Counter {\n private mut count: Int = 0\n}\nconst c = new Counter()\nprintln(c.count)");
    assert_eq!(error_codes(&result), vec!["E0202"]);
}

#[test]
fn import_diagnostics_name_the_module() {
    let dir = tempdir().expect("tempdir");
    fs::write(dir.path().join("shapes.lj"), "export class Circle {}").expect("write");
    let main = dir.path().join("main.lj");
    let mut compiler = Compiler::new(CompilerOptions::default());

    let result = compiler.compile(
        "import { Square } from \"./shapes\"\nimport Default from \"./shapes\"\nimport { x } from \"./absent\"\nimport { y } from \"std:nope\"",
        &main,
    );
    assert_eq!(error_codes(&result), vec!["E0302", "E0303", "E0301", "E0301"]);
    assert!(result.errors[0].message.contains("Square"));
    assert!(result.errors[2].message.contains("absent"));
}

#[test]
fn config_extends_cycles_fail_cleanly() {
    let dir = tempdir().expect("tempdir");
    fs::write(dir.path().join("a.json"), r#"{ "extends": "./b.json" }"#).expect("write a");
    fs::write(dir.path().join("b.json"), r#"{ "extends": "./c.json", "target": "native" }"#).expect("write b");
    fs::write(dir.path().join("c.json"), r#"{ "extends": "./a.json" }"#).expect("write c");
    let err = load_config(dir.path().join("a.json")).expect_err("cycle");
    assert!(matches!(err, ConfigError::CircularExtends(_)));
}

#[test]
fn loaded_config_drives_the_target() {
    let dir = tempdir().expect("tempdir");
    let config = dir.path().join("ljos.json");
    fs::write(&config, r#"{ "target": "native", "outDir": "build" }"#).expect("write");
    let options = load_config(&config).expect("load");
    assert_eq!(options.target, Target::Native);

    let result = Compiler::new(options).compile("const n: Int = 2\nprintln(\"n = \" + n)", "main.lj");
    assert!(result.success, "{:?}", result.errors);
    let code = result.code.expect("code");
    assert!(code.contains("int main() {"), "{code}");
    assert!(code.contains("__ljos_str(n)"), "{code}");
}
