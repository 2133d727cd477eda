//! Per-language syntax profiles.
//!
//! A profile names the node kinds and token vocabularies one grammar uses
//! for the constructs the analyzers care about, so the analyzers themselves
//! stay language-generic. Kind names follow the upstream tree-sitter
//! grammars exactly.

use serde::{Deserialize, Serialize};
use tree_sitter::Node;

use crate::lang::common::{named_children, walk, ParsedUnit};

/// Identifier casing convention.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum NamingStyle {
    /// lower_snake_case
    Snake,
    /// lowerCamelCase
    Camel,
    /// UpperCamelCase
    Pascal,
    /// camelCase or PascalCase, underscores disallowed (Go convention)
    MixedCaps,
}

impl NamingStyle {
    /// Whether an identifier conforms to this style.
    ///
    /// Reserved dunder names and single-character names are the caller's
    /// concern; this only checks shape.
    pub fn matches(self, name: &str) -> bool {
        if name.is_empty() {
            return false;
        }
        let has_underscore = name.contains('_');
        let first_upper = name.chars().next().is_some_and(char::is_uppercase);
        let all_lower_or_digit_or_underscore = name
            .chars()
            .all(|c| c.is_lowercase() || c.is_ascii_digit() || c == '_');

        match self {
            NamingStyle::Snake => all_lower_or_digit_or_underscore,
            NamingStyle::Camel => !has_underscore && !first_upper,
            NamingStyle::Pascal => !has_underscore && first_upper,
            NamingStyle::MixedCaps => !has_underscore,
        }
    }
}

/// One resolved import statement.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Import {
    /// Import specifier as written (quotes stripped)
    pub specifier: String,
    /// 1-based line of the import
    pub line: usize,
}

/// One syntactically exported symbol.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExportedSymbol {
    /// Symbol name
    pub name: String,
    /// 1-based line of the declaration
    pub line: usize,
}

/// Node kinds and vocabularies for one grammar.
#[derive(Debug)]
pub struct LanguageProfile {
    /// Canonical language key
    pub key: &'static str,
    /// Function definition node kinds
    pub function_kinds: &'static [&'static str],
    /// Class-like container node kinds (for qualified names)
    pub class_kinds: &'static [&'static str],
    /// Decision-point node kinds counted for cyclomatic complexity
    pub decision_kinds: &'static [&'static str],
    /// Short-circuit operator spellings counted for complexity
    pub boolean_operators: &'static [&'static str],
    /// Grammar kinds that are themselves boolean operator nodes
    pub boolean_operator_kinds: &'static [&'static str],
    /// Comment node kinds
    pub comment_kinds: &'static [&'static str],
    /// Numeric literal node kinds
    pub number_kinds: &'static [&'static str],
    /// String literal node kinds
    pub string_kinds: &'static [&'static str],
    /// Import statement node kinds
    pub import_kinds: &'static [&'static str],
    /// Statement-sequence container node kinds
    pub block_kinds: &'static [&'static str],
    /// Constant-declaration ancestor kinds (magic-number exclusion)
    pub const_kinds: &'static [&'static str],
    /// Index/subscript node kinds (magic-number exclusion)
    pub index_kinds: &'static [&'static str],
    /// Casing convention for functions and variables
    pub function_style: NamingStyle,
    /// Casing convention for types and classes
    pub type_style: NamingStyle,
    /// Assertion-call prefixes for test analysis
    pub assertion_markers: &'static [&'static str],
    /// Import specifiers that mark a test as non-isolated
    pub external_dep_markers: &'static [&'static str],
    /// Doc comments are docstrings (first statement in body)
    pub uses_docstrings: bool,
    /// Doc comment prefixes, when doc comments precede declarations
    pub doc_comment_prefixes: &'static [&'static str],
}

static PYTHON: LanguageProfile = LanguageProfile {
    key: "py",
    function_kinds: &["function_definition"],
    class_kinds: &["class_definition"],
    decision_kinds: &[
        "if_statement",
        "elif_clause",
        "for_statement",
        "while_statement",
        "except_clause",
        "conditional_expression",
        "case_clause",
    ],
    boolean_operators: &["and", "or"],
    boolean_operator_kinds: &["boolean_operator"],
    comment_kinds: &["comment"],
    number_kinds: &["integer", "float"],
    string_kinds: &["string"],
    import_kinds: &["import_statement", "import_from_statement"],
    block_kinds: &["block", "module"],
    const_kinds: &[],
    index_kinds: &["subscript"],
    function_style: NamingStyle::Snake,
    type_style: NamingStyle::Pascal,
    assertion_markers: &["assert", "pytest.raises", "self.assert"],
    external_dep_markers: &[
        "requests",
        "httpx",
        "sqlalchemy",
        "psycopg2",
        "pymongo",
        "boto3",
        "subprocess",
        "socket",
        "urllib.request",
    ],
    uses_docstrings: true,
    doc_comment_prefixes: &[],
};

static GO: LanguageProfile = LanguageProfile {
    key: "go",
    function_kinds: &["function_declaration", "method_declaration", "func_literal"],
    class_kinds: &[],
    decision_kinds: &[
        "if_statement",
        "for_statement",
        "expression_case",
        "type_case",
        "communication_case",
    ],
    boolean_operators: &["&&", "||"],
    boolean_operator_kinds: &[],
    comment_kinds: &["comment"],
    number_kinds: &["int_literal", "float_literal"],
    string_kinds: &["interpreted_string_literal", "raw_string_literal"],
    import_kinds: &["import_spec"],
    block_kinds: &["block", "source_file"],
    const_kinds: &["const_declaration"],
    index_kinds: &["index_expression"],
    function_style: NamingStyle::MixedCaps,
    type_style: NamingStyle::MixedCaps,
    assertion_markers: &[
        "t.Error",
        "t.Fatal",
        "t.Fail",
        "assert.",
        "require.",
        "Expect(",
    ],
    external_dep_markers: &[
        "net/http",
        "net/",
        "database/sql",
        "os/exec",
        "syscall",
        "io/ioutil",
    ],
    uses_docstrings: false,
    doc_comment_prefixes: &["//"],
};

static JAVASCRIPT: LanguageProfile = LanguageProfile {
    key: "js",
    function_kinds: &[
        "function_declaration",
        "function_expression",
        "arrow_function",
        "method_definition",
        "generator_function_declaration",
    ],
    class_kinds: &["class_declaration"],
    decision_kinds: &[
        "if_statement",
        "for_statement",
        "for_in_statement",
        "while_statement",
        "do_statement",
        "switch_case",
        "catch_clause",
        "ternary_expression",
    ],
    boolean_operators: &["&&", "||", "??"],
    boolean_operator_kinds: &[],
    comment_kinds: &["comment"],
    number_kinds: &["number"],
    string_kinds: &["string", "template_string"],
    import_kinds: &["import_statement"],
    block_kinds: &["statement_block", "program", "class_body"],
    const_kinds: &[],
    index_kinds: &["subscript_expression"],
    function_style: NamingStyle::Camel,
    type_style: NamingStyle::Pascal,
    assertion_markers: &["expect(", "assert.", "assert("],
    external_dep_markers: &[
        "axios",
        "node-fetch",
        "pg",
        "mysql",
        "mongodb",
        "child_process",
        "fs",
        "http",
        "net",
    ],
    uses_docstrings: false,
    doc_comment_prefixes: &["/**"],
};

static TYPESCRIPT: LanguageProfile = LanguageProfile {
    key: "ts",
    function_kinds: &[
        "function_declaration",
        "function_expression",
        "arrow_function",
        "method_definition",
        "generator_function_declaration",
    ],
    class_kinds: &["class_declaration"],
    decision_kinds: &[
        "if_statement",
        "for_statement",
        "for_in_statement",
        "while_statement",
        "do_statement",
        "switch_case",
        "catch_clause",
        "ternary_expression",
    ],
    boolean_operators: &["&&", "||", "??"],
    boolean_operator_kinds: &[],
    comment_kinds: &["comment"],
    number_kinds: &["number"],
    string_kinds: &["string", "template_string"],
    import_kinds: &["import_statement"],
    block_kinds: &["statement_block", "program", "class_body"],
    const_kinds: &[],
    index_kinds: &["subscript_expression"],
    function_style: NamingStyle::Camel,
    type_style: NamingStyle::Pascal,
    assertion_markers: &["expect(", "assert.", "assert("],
    external_dep_markers: &[
        "axios",
        "node-fetch",
        "pg",
        "mysql",
        "mongodb",
        "child_process",
        "fs",
        "http",
        "net",
    ],
    uses_docstrings: false,
    doc_comment_prefixes: &["/**"],
};

static RUST: LanguageProfile = LanguageProfile {
    key: "rs",
    function_kinds: &["function_item"],
    class_kinds: &["impl_item", "struct_item", "enum_item", "trait_item"],
    decision_kinds: &[
        "if_expression",
        "match_arm",
        "for_expression",
        "while_expression",
    ],
    boolean_operators: &["&&", "||"],
    boolean_operator_kinds: &[],
    comment_kinds: &["line_comment", "block_comment"],
    number_kinds: &["integer_literal", "float_literal"],
    string_kinds: &["string_literal", "raw_string_literal"],
    import_kinds: &["use_declaration"],
    block_kinds: &["block", "source_file", "declaration_list"],
    const_kinds: &["const_item", "static_item"],
    index_kinds: &["index_expression"],
    function_style: NamingStyle::Snake,
    type_style: NamingStyle::Pascal,
    assertion_markers: &["assert!", "assert_eq!", "assert_ne!", "debug_assert"],
    external_dep_markers: &[
        "reqwest",
        "sqlx",
        "std::process",
        "std::net",
        "tokio::net",
        "tokio::process",
    ],
    uses_docstrings: false,
    doc_comment_prefixes: &["///", "//!"],
};

impl LanguageProfile {
    /// Look up the profile for a language key.
    pub fn for_key(key: &str) -> Option<&'static LanguageProfile> {
        match key {
            "py" => Some(&PYTHON),
            "go" => Some(&GO),
            "js" => Some(&JAVASCRIPT),
            "ts" => Some(&TYPESCRIPT),
            "rs" => Some(&RUST),
            _ => None,
        }
    }

    /// Whether a node kind starts a function definition.
    pub fn is_function(&self, kind: &str) -> bool {
        self.function_kinds.contains(&kind)
    }

    /// Extract every import specifier in a parsed unit.
    pub fn imports(&self, unit: &ParsedUnit) -> Vec<Import> {
        let mut imports = Vec::new();
        let mut visit = |node: Node<'_>| {
            if !self.import_kinds.contains(&node.kind()) {
                return;
            }
            let line = node.start_position().row + 1;
            match self.key {
                "py" => collect_python_import(unit, &node, line, &mut imports),
                "go" => {
                    if let Some(path) = node.child_by_field_name("path") {
                        imports.push(Import {
                            specifier: strip_quotes(unit.text_of(&path)),
                            line,
                        });
                    }
                }
                "js" | "ts" => {
                    if let Some(source) = node.child_by_field_name("source") {
                        imports.push(Import {
                            specifier: strip_quotes(unit.text_of(&source)),
                            line,
                        });
                    }
                }
                "rs" => {
                    if let Some(argument) = node.child_by_field_name("argument") {
                        imports.push(Import {
                            specifier: unit.text_of(&argument).to_string(),
                            line,
                        });
                    }
                }
                _ => {}
            }
        };
        walk(unit.root(), &mut visit);
        imports
    }

    /// Extract syntactically determinable exported symbols.
    pub fn exports(&self, unit: &ParsedUnit) -> Vec<ExportedSymbol> {
        match self.key {
            "py" => python_exports(unit),
            "go" => go_exports(unit),
            "js" | "ts" => ecma_exports(unit),
            "rs" => rust_exports(unit),
            _ => Vec::new(),
        }
    }
}

fn strip_quotes(text: &str) -> String {
    text.trim_matches(|c| c == '"' || c == '\'' || c == '`')
        .to_string()
}

fn collect_python_import(
    unit: &ParsedUnit,
    node: &Node<'_>,
    line: usize,
    imports: &mut Vec<Import>,
) {
    if node.kind() == "import_from_statement" {
        let Some(module) = node.child_by_field_name("module_name") else {
            return;
        };
        let module_text = unit.text_of(&module).to_string();

        // Imported names may themselves be submodules; record both forms.
        let mut cursor = node.walk();
        for name in node.children_by_field_name("name", &mut cursor) {
            let name_node = if name.kind() == "aliased_import" {
                name.child_by_field_name("name").unwrap_or(name)
            } else {
                name
            };
            let name_text = unit.text_of(&name_node);
            let specifier = if module_text.ends_with('.') {
                format!("{module_text}{name_text}")
            } else {
                format!("{module_text}.{name_text}")
            };
            imports.push(Import { specifier, line });
        }
        imports.push(Import {
            specifier: module_text,
            line,
        });
        return;
    }

    for child in named_children(node) {
        match child.kind() {
            "dotted_name" => imports.push(Import {
                specifier: unit.text_of(&child).to_string(),
                line,
            }),
            "aliased_import" => {
                if let Some(name) = child.child_by_field_name("name") {
                    imports.push(Import {
                        specifier: unit.text_of(&name).to_string(),
                        line,
                    });
                }
            }
            _ => {}
        }
    }
}

fn declaration_name(unit: &ParsedUnit, node: &Node<'_>) -> Option<ExportedSymbol> {
    let name = node.child_by_field_name("name")?;
    Some(ExportedSymbol {
        name: unit.text_of(&name).to_string(),
        line: node.start_position().row + 1,
    })
}

fn python_exports(unit: &ParsedUnit) -> Vec<ExportedSymbol> {
    let mut exports = Vec::new();
    for child in named_children(&unit.root()) {
        let target = if child.kind() == "decorated_definition" {
            child.child_by_field_name("definition").unwrap_or(child)
        } else {
            child
        };
        if matches!(target.kind(), "function_definition" | "class_definition") {
            if let Some(symbol) = declaration_name(unit, &target) {
                if !symbol.name.starts_with('_') {
                    exports.push(symbol);
                }
            }
        }
    }
    exports
}

fn go_exports(unit: &ParsedUnit) -> Vec<ExportedSymbol> {
    let mut exports = Vec::new();
    let mut visit = |node: Node<'_>| {
        let symbol = match node.kind() {
            "function_declaration" | "type_spec" => declaration_name(unit, &node),
            _ => None,
        };
        if let Some(symbol) = symbol {
            if symbol.name.chars().next().is_some_and(char::is_uppercase) {
                exports.push(symbol);
            }
        }
    };
    walk(unit.root(), &mut visit);
    exports
}

fn ecma_exports(unit: &ParsedUnit) -> Vec<ExportedSymbol> {
    let mut exports = Vec::new();
    let mut visit = |node: Node<'_>| {
        if node.kind() != "export_statement" {
            return;
        }
        for child in named_children(&node) {
            match child.kind() {
                "function_declaration" | "class_declaration" => {
                    if let Some(symbol) = declaration_name(unit, &child) {
                        exports.push(symbol);
                    }
                }
                "lexical_declaration" | "variable_declaration" => {
                    for declarator in named_children(&child) {
                        if declarator.kind() == "variable_declarator" {
                            if let Some(symbol) = declaration_name(unit, &declarator) {
                                exports.push(symbol);
                            }
                        }
                    }
                }
                "export_clause" => {
                    for specifier in named_children(&child) {
                        if specifier.kind() == "export_specifier" {
                            if let Some(symbol) = declaration_name(unit, &specifier) {
                                exports.push(symbol);
                            }
                        }
                    }
                }
                _ => {}
            }
        }
    };
    walk(unit.root(), &mut visit);
    exports
}

fn rust_exports(unit: &ParsedUnit) -> Vec<ExportedSymbol> {
    let mut exports = Vec::new();
    let mut visit = |node: Node<'_>| {
        if !matches!(
            node.kind(),
            "function_item"
                | "struct_item"
                | "enum_item"
                | "trait_item"
                | "const_item"
                | "static_item"
                | "type_item"
                | "mod_item"
        ) {
            return;
        }
        let is_pub = named_children(&node)
            .iter()
            .any(|c| c.kind() == "visibility_modifier");
        if is_pub {
            if let Some(symbol) = declaration_name(unit, &node) {
                exports.push(symbol);
            }
        }
    };
    walk(unit.root(), &mut visit);
    exports
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn naming_style_shapes() {
        assert!(NamingStyle::Snake.matches("parse_header"));
        assert!(!NamingStyle::Snake.matches("parseHeader"));
        assert!(NamingStyle::Camel.matches("parseHeader"));
        assert!(!NamingStyle::Camel.matches("ParseHeader"));
        assert!(NamingStyle::Pascal.matches("HttpServer"));
        assert!(NamingStyle::MixedCaps.matches("parseHeader"));
        assert!(NamingStyle::MixedCaps.matches("ParseHeader"));
        assert!(!NamingStyle::MixedCaps.matches("parse_header"));
    }

    #[test]
    fn python_imports_extracted() {
        let unit = ParsedUnit::parse(
            "py",
            "import os\nimport os.path\nfrom collections import OrderedDict\n".to_string(),
            "m.py",
        )
        .unwrap();
        let imports = PYTHON.imports(&unit);
        let specs: Vec<&str> = imports.iter().map(|i| i.specifier.as_str()).collect();
        assert!(specs.contains(&"os"));
        assert!(specs.contains(&"os.path"));
        assert!(specs.contains(&"collections"));
    }

    #[test]
    fn go_imports_strip_quotes() {
        let unit = ParsedUnit::parse(
            "go",
            "package m\n\nimport (\n\t\"fmt\"\n\t\"net/http\"\n)\n".to_string(),
            "m.go",
        )
        .unwrap();
        let imports = GO.imports(&unit);
        let specs: Vec<&str> = imports.iter().map(|i| i.specifier.as_str()).collect();
        assert_eq!(specs, vec!["fmt", "net/http"]);
    }

    #[test]
    fn typescript_imports_use_source() {
        let unit = ParsedUnit::parse(
            "ts",
            "import { join } from './util/paths';\nimport fs from 'fs';\n".to_string(),
            "m.ts",
        )
        .unwrap();
        let imports = TYPESCRIPT.imports(&unit);
        let specs: Vec<&str> = imports.iter().map(|i| i.specifier.as_str()).collect();
        assert_eq!(specs, vec!["./util/paths", "fs"]);
    }

    #[test]
    fn go_exports_require_uppercase() {
        let unit = ParsedUnit::parse(
            "go",
            "package m\n\nfunc Public() {}\nfunc private() {}\ntype Config struct{}\n"
                .to_string(),
            "m.go",
        )
        .unwrap();
        let names: Vec<String> = GO.exports(&unit).into_iter().map(|e| e.name).collect();
        assert_eq!(names, vec!["Public", "Config"]);
    }

    #[test]
    fn python_exports_skip_private() {
        let unit = ParsedUnit::parse(
            "py",
            "def handler():\n    pass\n\ndef _internal():\n    pass\n\nclass Widget:\n    pass\n"
                .to_string(),
            "m.py",
        )
        .unwrap();
        let names: Vec<String> = PYTHON.exports(&unit).into_iter().map(|e| e.name).collect();
        assert_eq!(names, vec!["handler", "Widget"]);
    }

    #[test]
    fn ecma_exports_cover_declarations_and_clauses() {
        let unit = ParsedUnit::parse(
            "ts",
            "export function run() {}\nexport const limit = 3;\nconst hidden = 1;\nexport { hidden };\n"
                .to_string(),
            "m.ts",
        )
        .unwrap();
        let names: Vec<String> = TYPESCRIPT.exports(&unit).into_iter().map(|e| e.name).collect();
        assert!(names.contains(&"run".to_string()));
        assert!(names.contains(&"limit".to_string()));
        assert!(names.contains(&"hidden".to_string()));
    }

    #[test]
    fn rust_exports_require_pub() {
        let unit = ParsedUnit::parse(
            "rs",
            "pub fn visible() {}\nfn hidden() {}\npub struct Widget;\n".to_string(),
            "m.rs",
        )
        .unwrap();
        let names: Vec<String> = RUST.exports(&unit).into_iter().map(|e| e.name).collect();
        assert_eq!(names, vec!["visible", "Widget"]);
    }
}
