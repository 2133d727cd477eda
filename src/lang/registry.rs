//! Language registry: extension mapping and parser construction.

use std::path::Path;

use tree_sitter::Language;

use crate::core::errors::{ReadinessError, Result};

/// Metadata describing one of the built-in language grammars.
#[derive(Debug, Clone, Copy)]
pub struct LanguageInfo {
    /// Canonical short key (matches config usage, e.g. "py")
    pub key: &'static str,
    /// Human-friendly display name
    pub name: &'static str,
    /// Supported file extensions (without leading dots)
    pub extensions: &'static [&'static str],
    /// Whether the type system is enforced by the compiler
    pub statically_typed: bool,
}

const REGISTERED_LANGUAGES: &[LanguageInfo] = &[
    LanguageInfo {
        key: "py",
        name: "Python",
        extensions: &["py", "pyi"],
        statically_typed: false,
    },
    LanguageInfo {
        key: "js",
        name: "JavaScript",
        extensions: &["js", "jsx", "mjs", "cjs"],
        statically_typed: false,
    },
    LanguageInfo {
        key: "ts",
        name: "TypeScript",
        extensions: &["ts", "tsx", "cts", "mts"],
        statically_typed: false,
    },
    LanguageInfo {
        key: "rs",
        name: "Rust",
        extensions: &["rs"],
        statically_typed: true,
    },
    LanguageInfo {
        key: "go",
        name: "Go",
        extensions: &["go"],
        statically_typed: true,
    },
];

/// Return the languages compiled into this build.
pub fn registered_languages() -> &'static [LanguageInfo] {
    REGISTERED_LANGUAGES
}

/// Look up language metadata by canonical key.
pub fn language_by_key(key: &str) -> Option<&'static LanguageInfo> {
    registered_languages().iter().find(|info| info.key == key)
}

/// Identify the language for a file path by extension.
pub fn language_for_path(path: &Path) -> Option<&'static LanguageInfo> {
    let ext = path.extension()?.to_string_lossy().to_ascii_lowercase();
    registered_languages().iter().find(|info| {
        info.extensions
            .iter()
            .any(|candidate| candidate.eq_ignore_ascii_case(&ext))
    })
}

/// Get the tree-sitter grammar for a language key.
pub fn grammar_for(key: &str) -> Result<Language> {
    match key {
        "py" => Ok(tree_sitter_python::LANGUAGE.into()),
        "js" => Ok(tree_sitter_javascript::LANGUAGE.into()),
        "ts" => Ok(tree_sitter_typescript::LANGUAGE_TYPESCRIPT.into()),
        "rs" => Ok(tree_sitter_rust::LANGUAGE.into()),
        "go" => Ok(tree_sitter_go::LANGUAGE.into()),
        other => Err(ReadinessError::parse(
            "registry",
            format!("no tree-sitter grammar for language key '{other}'"),
        )),
    }
}

/// Create a parser configured for the given language key.
pub fn parser_for(key: &str) -> Result<tree_sitter::Parser> {
    let mut parser = tree_sitter::Parser::new();
    let grammar = grammar_for(key)?;
    parser.set_language(&grammar).map_err(|e| {
        ReadinessError::parse(key, format!("failed to set parser language: {e}"))
    })?;
    Ok(parser)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extension_mapping() {
        assert_eq!(language_for_path(Path::new("a/b.py")).unwrap().key, "py");
        assert_eq!(language_for_path(Path::new("x.tsx")).unwrap().key, "ts");
        assert_eq!(language_for_path(Path::new("x.mjs")).unwrap().key, "js");
        assert_eq!(language_for_path(Path::new("m.go")).unwrap().key, "go");
        assert!(language_for_path(Path::new("README")).is_none());
        assert!(language_for_path(Path::new("style.css")).is_none());
    }

    #[test]
    fn parsers_construct_for_all_languages() {
        for info in registered_languages() {
            assert!(parser_for(info.key).is_ok(), "parser for {}", info.key);
        }
    }

    #[test]
    fn static_typing_flags() {
        assert!(language_by_key("go").unwrap().statically_typed);
        assert!(language_by_key("rs").unwrap().statically_typed);
        assert!(!language_by_key("py").unwrap().statically_typed);
    }
}
