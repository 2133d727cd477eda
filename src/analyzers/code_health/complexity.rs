//! Per-function extraction: qualified names, spans, McCabe complexity.

use serde::{Deserialize, Serialize};
use tree_sitter::Node;

use crate::lang::common::{nearest_ancestor, walk, ParsedUnit, SourceSpan};
use crate::lang::profile::LanguageProfile;

/// One function definition's measurements.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FunctionRecord {
    /// Receiver/class-prefixed name
    pub qualified_name: String,
    /// Repository-relative file path
    pub file: String,
    /// 1-based start line
    pub start_line: usize,
    /// End line - start line + 1
    pub line_count: usize,
    /// McCabe cyclomatic complexity
    pub complexity: usize,
}

/// Extract a record for every function definition in the unit.
///
/// Nested definitions do not contribute to their enclosing function; each is
/// recorded independently.
pub fn extract_functions(unit: &ParsedUnit) -> Vec<FunctionRecord> {
    let profile = unit.profile();
    let mut records = Vec::new();
    let mut anonymous_counter = 0usize;

    let mut visit = |node: Node<'_>| {
        if !profile.is_function(node.kind()) {
            return;
        }
        let span = SourceSpan::of(&node);
        let qualified_name = qualified_name(unit, &node, &mut anonymous_counter);

        records.push(FunctionRecord {
            qualified_name,
            file: unit.rel_path().to_string(),
            start_line: span.start_line,
            line_count: span.line_count(),
            complexity: cyclomatic_complexity(unit, &node),
        });
    };
    walk(unit.root(), &mut visit);

    records.sort_by(|a, b| a.start_line.cmp(&b.start_line));
    records
}

/// McCabe complexity of one function: base 1 plus one per decision point.
///
/// The walk stops at nested function definitions, which are scored on their
/// own records.
pub fn cyclomatic_complexity(unit: &ParsedUnit, function: &Node<'_>) -> usize {
    let profile = unit.profile();
    let mut decisions = 0usize;
    count_decisions(unit, profile, *function, true, &mut decisions);
    1 + decisions
}

fn count_decisions(
    unit: &ParsedUnit,
    profile: &LanguageProfile,
    node: Node<'_>,
    is_root: bool,
    decisions: &mut usize,
) {
    if !is_root && profile.is_function(node.kind()) {
        return;
    }

    if !is_root && profile.decision_kinds.contains(&node.kind()) {
        *decisions += 1;
    }

    if profile.boolean_operator_kinds.contains(&node.kind()) {
        *decisions += 1;
    } else if node.kind() == "binary_expression" {
        if let Some(operator) = node.child_by_field_name("operator") {
            if profile.boolean_operators.contains(&unit.text_of(&operator)) {
                *decisions += 1;
            }
        }
    }

    let mut cursor = node.walk();
    for child in node.children(&mut cursor) {
        count_decisions(unit, profile, child, false, decisions);
    }
}

fn qualified_name(unit: &ParsedUnit, node: &Node<'_>, anonymous_counter: &mut usize) -> String {
    let profile = unit.profile();

    let base = node
        .child_by_field_name("name")
        .map(|n| unit.text_of(&n).to_string())
        .unwrap_or_else(|| {
            *anonymous_counter += 1;
            format!("anonymous_{anonymous_counter}")
        });

    // Go methods carry their receiver type as the prefix.
    if node.kind() == "method_declaration" {
        if let Some(receiver) = node.child_by_field_name("receiver") {
            if let Some(type_name) = receiver_type_name(unit, &receiver) {
                return format!("{type_name}.{base}");
            }
        }
    }

    // Class-scoped definitions carry the class name.
    if let Some(class_node) = nearest_ancestor(node, profile.class_kinds) {
        let class_name = class_node
            .child_by_field_name("name")
            .or_else(|| class_node.child_by_field_name("type"))
            .map(|n| unit.text_of(&n).to_string());
        if let Some(class_name) = class_name {
            return format!("{class_name}.{base}");
        }
    }

    base
}

fn receiver_type_name(unit: &ParsedUnit, receiver: &Node<'_>) -> Option<String> {
    let mut name = None;
    let mut visit = |node: Node<'_>| {
        if node.kind() == "type_identifier" && name.is_none() {
            name = Some(unit.text_of(&node).to_string());
        }
    };
    walk(*receiver, &mut visit);
    name
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(key: &str, source: &str) -> ParsedUnit {
        ParsedUnit::parse(key, source.to_string(), "test_input").unwrap()
    }

    #[test]
    fn straight_line_function_is_one() {
        let unit = parse("py", "def f():\n    return 1\n");
        let records = extract_functions(&unit);
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].complexity, 1);
    }

    #[test]
    fn branches_loops_and_handlers_count() {
        let source = r#"
def f(x):
    if x > 0:
        pass
    elif x < 0:
        pass
    for i in range(3):
        while i:
            i -= 1
    try:
        g()
    except ValueError:
        pass
    return x if x else 0
"#;
        let unit = parse("py", source);
        let records = extract_functions(&unit);
        // if + elif + for + while + except + ternary = 6 decisions.
        assert_eq!(records[0].complexity, 7);
    }

    #[test]
    fn short_circuit_operators_count() {
        let unit = parse("py", "def f(a, b, c):\n    return a and b or c\n");
        assert_eq!(extract_functions(&unit)[0].complexity, 3);

        let unit = parse(
            "go",
            "package m\n\nfunc F(a, b bool) bool {\n\treturn a && b || !a\n}\n",
        );
        assert_eq!(extract_functions(&unit)[0].complexity, 3);
    }

    #[test]
    fn nested_functions_are_independent() {
        let source = r#"
def outer(x):
    if x:
        pass
    def inner(y):
        if y:
            pass
        if y > 1:
            pass
    return inner
"#;
        let unit = parse("py", source);
        let records = extract_functions(&unit);
        assert_eq!(records.len(), 2);

        let outer = records.iter().find(|r| r.qualified_name == "outer").unwrap();
        let inner = records.iter().find(|r| r.qualified_name == "inner").unwrap();
        assert_eq!(outer.complexity, 2);
        assert_eq!(inner.complexity, 3);
    }

    #[test]
    fn go_methods_are_receiver_prefixed() {
        let source = "package m\n\ntype Server struct{}\n\nfunc (s *Server) Start() {}\n";
        let unit = parse("go", source);
        let records = extract_functions(&unit);
        assert_eq!(records[0].qualified_name, "Server.Start");
    }

    #[test]
    fn python_methods_are_class_prefixed() {
        let source = "class Parser:\n    def advance(self):\n        pass\n";
        let unit = parse("py", source);
        let records = extract_functions(&unit);
        assert_eq!(records[0].qualified_name, "Parser.advance");
    }

    #[test]
    fn switch_cases_count_but_default_does_not() {
        let source = r#"package m

func Classify(n int) string {
	switch n {
	case 1:
		return "one"
	case 2:
		return "two"
	default:
		return "many"
	}
}
"#;
        let unit = parse("go", source);
        // Two expression cases; the default case is not a decision.
        assert_eq!(extract_functions(&unit)[0].complexity, 3);
    }

    #[test]
    fn line_counts_are_inclusive() {
        let unit = parse("py", "def f():\n    a = 1\n    return a\n");
        assert_eq!(extract_functions(&unit)[0].line_count, 3);
    }
}
