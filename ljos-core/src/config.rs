//! Compiler options and the JSON project config.
//!
//! A config file is a JSON object whose keys mirror [`CompilerOptions`]
//! in camelCase. `"extends": "<relative path>"` pulls in a parent config;
//! keys in the child win, nested objects merge key by key.

use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::ConfigError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Target {
    #[default]
    Js,
    Native,
}

impl Target {
    /// File extension of generated code.
    pub fn extension(self) -> &'static str {
        match self {
            Target::Js => "js",
            Target::Native => "cpp",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ModuleKind {
    #[default]
    Esm,
    CommonJs,
}

/// When generated JavaScript imports the runtime module.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Prelude {
    /// Never; the runtime must be provided some other way.
    None,
    /// Only when the program uses a runtime helper.
    #[default]
    Core,
    /// Always.
    Full,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BuildKind {
    #[default]
    Js,
    Pkg,
    Bundle,
}

/// Packaging settings, passed through for external tooling.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct BuildOptions {
    pub kind: BuildKind,
    pub entry: Option<String>,
    pub executable_name: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct CompilerOptions {
    pub out_dir: PathBuf,
    pub root_dir: PathBuf,
    pub target: Target,
    pub module: ModuleKind,
    /// `sourceMap` and `minify` are carried for the packaging layer; code
    /// generation ignores them.
    pub source_map: bool,
    pub minify: bool,
    pub prelude: Prelude,
    /// Checker errors block code generation. When false they are reported
    /// as warnings instead.
    pub strict: bool,
    /// Specifier of the runtime helper module in generated imports.
    pub runtime_module: String,
    /// Directory `std:` imports are rewritten into.
    pub runtime_dir: String,
    pub build: BuildOptions,
}

impl Default for CompilerOptions {
    fn default() -> Self {
        CompilerOptions {
            out_dir: PathBuf::from("dist"),
            root_dir: PathBuf::from("src"),
            target: Target::Js,
            module: ModuleKind::Esm,
            source_map: false,
            minify: false,
            prelude: Prelude::Core,
            strict: true,
            runtime_module: "ljos/runtime".to_string(),
            runtime_dir: "ljos/runtime".to_string(),
            build: BuildOptions::default(),
        }
    }
}

impl CompilerOptions {
    /// Where `compile_to_file` writes the output for `input` when no
    /// explicit path is given.
    pub fn output_path_for(&self, input: &Path) -> PathBuf {
        let relative = input.strip_prefix(&self.root_dir).unwrap_or(input);
        let relative = match relative.file_name() {
            Some(_) => relative.to_path_buf(),
            None => PathBuf::from("out"),
        };
        self.out_dir
            .join(relative)
            .with_extension(self.target.extension())
    }
}

/// Load a config file, following its `extends` chain.
pub fn load_config(path: impl AsRef<Path>) -> Result<CompilerOptions, ConfigError> {
    let mut visited = HashSet::new();
    let merged = load_merged(path.as_ref(), &mut visited)?;
    serde_json::from_value(Value::Object(merged)).map_err(|source| ConfigError::Json {
        path: path.as_ref().to_path_buf(),
        source,
    })
}

fn load_merged(path: &Path, visited: &mut HashSet<PathBuf>) -> Result<Map<String, Value>, ConfigError> {
    let key = fs::canonicalize(path).unwrap_or_else(|_| path.to_path_buf());
    if !visited.insert(key) {
        return Err(ConfigError::CircularExtends(path.to_path_buf()));
    }

    let text = fs::read_to_string(path).map_err(|source| ConfigError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    let mut object = match serde_json::from_str::<Value>(&text) {
        Ok(Value::Object(object)) => object,
        Ok(_) => {
            return Err(ConfigError::Json {
                path: path.to_path_buf(),
                source: serde::de::Error::custom("config must be a JSON object"),
            });
        }
        Err(source) => {
            return Err(ConfigError::Json {
                path: path.to_path_buf(),
                source,
            });
        }
    };

    let Some(parent) = object.remove("extends") else {
        return Ok(object);
    };
    let Value::String(parent) = parent else {
        return Err(ConfigError::Json {
            path: path.to_path_buf(),
            source: serde::de::Error::custom("'extends' must be a string"),
        });
    };
    let base_dir = path.parent().unwrap_or_else(|| Path::new(""));
    let mut merged = load_merged(&base_dir.join(parent), visited)?;
    merge_into(&mut merged, object);
    Ok(merged)
}

fn merge_into(base: &mut Map<String, Value>, overlay: Map<String, Value>) {
    for (key, value) in overlay {
        match (base.get_mut(&key), value) {
            (Some(Value::Object(existing)), Value::Object(nested)) => merge_into(existing, nested),
            (_, value) => {
                base.insert(key, value);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn missing_keys_take_defaults() {
        let options: CompilerOptions =
            serde_json::from_str(r#"{ "target": "native" }"#).expect("parse");
        assert_eq!(options.target, Target::Native);
        assert_eq!(options.module, ModuleKind::Esm);
        assert!(options.strict);
    }

    #[test]
    fn packaging_flags_pass_through() {
        let options: CompilerOptions =
            serde_json::from_str(r#"{ "sourceMap": true, "minify": true }"#).expect("parse");
        assert!(options.source_map);
        assert!(options.minify);
        assert!(!CompilerOptions::default().minify);
    }

    #[test]
    fn module_kinds_use_their_lowercase_names() {
        let options: CompilerOptions =
            serde_json::from_str(r#"{ "module": "commonjs", "prelude": "none" }"#).expect("parse");
        assert_eq!(options.module, ModuleKind::CommonJs);
        assert_eq!(options.prelude, Prelude::None);
    }

    #[test]
    fn child_keys_override_parent_keys() {
        let dir = tempdir().expect("tempdir");
        fs::write(
            dir.path().join("base.json"),
            r#"{ "outDir": "build", "strict": false, "build": { "kind": "bundle", "entry": "main.lj" } }"#,
        )
        .expect("write base");
        fs::write(
            dir.path().join("ljos.json"),
            r#"{ "extends": "./base.json", "strict": true, "build": { "entry": "app.lj" } }"#,
        )
        .expect("write child");

        let options = load_config(dir.path().join("ljos.json")).expect("load");
        assert_eq!(options.out_dir, PathBuf::from("build"));
        assert!(options.strict);
        assert_eq!(options.build.kind, BuildKind::Bundle);
        assert_eq!(options.build.entry.as_deref(), Some("app.lj"));
    }

    #[test]
    fn extends_cycles_are_rejected() {
        let dir = tempdir().expect("tempdir");
        fs::write(dir.path().join("a.json"), r#"{ "extends": "b.json" }"#).expect("write a");
        fs::write(dir.path().join("b.json"), r#"{ "extends": "a.json" }"#).expect("write b");
        let err = load_config(dir.path().join("a.json")).expect_err("cycle");
        assert!(matches!(err, ConfigError::CircularExtends(_)));
    }

    #[test]
    fn output_path_mirrors_the_source_tree() {
        let options = CompilerOptions::default();
        assert_eq!(
            options.output_path_for(Path::new("src/app/main.lj")),
            PathBuf::from("dist/app/main.js")
        );
        let native = CompilerOptions {
            target: Target::Native,
            ..CompilerOptions::default()
        };
        assert_eq!(
            native.output_path_for(Path::new("tool.lj")),
            PathBuf::from("dist/tool.cpp")
        );
    }
}
