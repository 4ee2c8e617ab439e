//! Tree-sitter based parser for C language
//!
//! Parses a source file, interns the syntax tree into the arena, and
//! extracts the macro directive table and the macro occurrences in the
//! code.

use macroscope_core::config::EngineConfig;
use macroscope_core::{Location, MacroBinding, Result, SourceRegion};
use tracing::debug;
use tree_sitter::{Node, Parser as TSParser, Tree};

use crate::arena::SyntaxArena;
use crate::cache::hash_content;
use crate::directives::{MacroDef, MacroTable};
use crate::expand;
use crate::{MacroOccurrence, ParsedUnit};

const IDENT_KINDS: [&str; 4] = [
    "identifier",
    "type_identifier",
    "field_identifier",
    "statement_identifier",
];

const BUILTIN_NAMES: [&str; 3] = ["__LINE__", "__FILE__", "__COUNTER__"];

/// Tree-sitter based parser
pub struct CParser {
    parser: TSParser,
    engine_config: EngineConfig,
}

impl CParser {
    /// Create a new parser for C
    pub fn new() -> Self {
        Self::with_config(EngineConfig::default())
    }

    /// Create a parser with a custom expansion engine configuration
    pub fn with_config(engine_config: EngineConfig) -> Self {
        let mut parser = TSParser::new();
        parser
            .set_language(&tree_sitter_c::language())
            .expect("Failed to load C grammar");
        Self {
            parser,
            engine_config,
        }
    }

    /// Parse source text into a `ParsedUnit`
    pub fn parse_source(&mut self, source: &str, filename: &str) -> Result<ParsedUnit> {
        let tree = self
            .parser
            .parse(source, None)
            .ok_or_else(|| macroscope_core::Error::Parse("Failed to parse source".into()))?;

        let arena = SyntaxArena::from_tree(&tree);
        let macros = self.extract_directives(&tree, source, filename);
        let occurrences = self.find_occurrences(&tree, source, &arena, &macros);

        debug!(
            "Parsed {}: {} macro names, {} occurrences",
            filename,
            macros.len(),
            occurrences.len()
        );

        Ok(ParsedUnit {
            file: filename.to_string(),
            content_hash: hash_content(source),
            source: source.to_string(),
            arena,
            macros,
            occurrences,
            engine_config: self.engine_config.clone(),
        })
    }

    fn extract_directives(&self, tree: &Tree, source: &str, filename: &str) -> MacroTable {
        let mut table = MacroTable::new();
        self.visit_directives(tree.root_node(), source, filename, &mut table);
        table
    }

    fn visit_directives(&self, node: Node, source: &str, filename: &str, table: &mut MacroTable) {
        match node.kind() {
            "preproc_def" => {
                if let Some(def) = self.extract_define(node, source, filename, None) {
                    debug!("Found macro: {}", def.binding.name);
                    table.add_define(def);
                }
            }
            "preproc_function_def" => {
                let params = node
                    .child_by_field_name("parameters")
                    .map(|p| parse_params(node_text(p, source)));
                if let Some(def) = self.extract_define(node, source, filename, params) {
                    debug!("Found macro: {}", def.binding.signature());
                    table.add_define(def);
                }
            }
            "preproc_call" => {
                let directive = node
                    .child_by_field_name("directive")
                    .map(|d| node_text(d, source))
                    .unwrap_or_default();
                if directive == "#undef" {
                    if let Some(arg) = node.child_by_field_name("argument") {
                        let name = node_text(arg, source).trim().to_string();
                        if !name.is_empty() {
                            table.add_undef(&name, node.end_byte());
                        }
                    }
                }
            }
            _ => {}
        }

        let mut cursor = node.walk();
        for child in node.children(&mut cursor) {
            self.visit_directives(child, source, filename, table);
        }
    }

    fn extract_define(
        &self,
        node: Node,
        source: &str,
        filename: &str,
        params: Option<(Vec<String>, bool)>,
    ) -> Option<MacroDef> {
        let name_node = node.child_by_field_name("name")?;
        let name = node_text(name_node, source);

        let body = node
            .child_by_field_name("value")
            .map(|v| normalize_body(node_text(v, source)))
            .unwrap_or_default();

        let binding = match params {
            Some((params, is_variadic)) => MacroBinding::function(&name, params, is_variadic),
            None => MacroBinding::object(&name),
        };

        Some(MacroDef {
            binding,
            body,
            location: Location::new(
                filename,
                node.start_byte(),
                node.end_byte() - node.start_byte(),
            ),
            name_region: SourceRegion::new(
                name_node.start_byte(),
                name_node.end_byte() - name_node.start_byte(),
            ),
        })
    }

    fn find_occurrences(
        &self,
        tree: &Tree,
        source: &str,
        arena: &SyntaxArena,
        table: &MacroTable,
    ) -> Vec<MacroOccurrence> {
        let mut occurrences = Vec::new();
        self.visit_occurrences(tree.root_node(), source, arena, table, &mut occurrences);
        occurrences.sort_by_key(|occ| occ.region.offset);
        occurrences
    }

    fn visit_occurrences(
        &self,
        node: Node,
        source: &str,
        arena: &SyntaxArena,
        table: &MacroTable,
        occurrences: &mut Vec<MacroOccurrence>,
    ) {
        if IDENT_KINDS.contains(&node.kind()) && !in_directive_position(node) {
            let name = node_text(node, source);
            let offset = node.start_byte();
            let builtin = self.engine_config.builtins && BUILTIN_NAMES.contains(&name.as_str());
            let def = table.effective_at(&name, offset);

            if builtin || def.is_some() {
                let name_region = SourceRegion::new(offset, node.end_byte() - offset);
                let region = match def {
                    Some(d) if d.binding.is_function_like() => {
                        // The invocation spans the argument list; a bare
                        // name is not an invocation of a function-like
                        // macro.
                        match expand::parse_arguments(source, node.end_byte()) {
                            Some((_, end)) => Some(SourceRegion::new(offset, end - offset)),
                            None => None,
                        }
                    }
                    _ => Some(name_region),
                };
                if let Some(region) = region {
                    occurrences.push(MacroOccurrence {
                        name,
                        name_region,
                        region,
                        node: arena.smallest_covering(name_region),
                    });
                }
            }
        }

        let mut cursor = node.walk();
        for child in node.children(&mut cursor) {
            self.visit_occurrences(child, source, arena, table, occurrences);
        }
    }
}

impl Default for CParser {
    fn default() -> Self {
        Self::new()
    }
}

impl crate::Parser for CParser {
    fn parse(&self, source: &str, filename: &str) -> Result<ParsedUnit> {
        let mut parser = CParser::with_config(self.engine_config.clone());
        parser.parse_source(source, filename)
    }

    fn name(&self) -> &str {
        "tree-sitter"
    }
}

/// Whether an identifier sits in a directive position where it names a
/// macro rather than references one: the defined name, a parameter, an
/// `#ifdef`/`#ifndef` condition, or the operand of `defined`.
fn in_directive_position(node: Node) -> bool {
    match node.parent() {
        Some(parent) => matches!(
            parent.kind(),
            "preproc_def" | "preproc_function_def" | "preproc_params" | "preproc_ifdef" | "preproc_defined"
        ),
        None => false,
    }
}

/// Parse a `preproc_params` text like `(x, y, ...)`
fn parse_params(text: String) -> (Vec<String>, bool) {
    let inner = text
        .trim()
        .trim_start_matches('(')
        .trim_end_matches(')')
        .trim();
    let mut params = Vec::new();
    let mut is_variadic = false;
    for part in inner.split(',') {
        let part = part.trim();
        if part.is_empty() {
            continue;
        }
        if part == "..." {
            is_variadic = true;
        } else {
            params.push(part.to_string());
        }
    }
    (params, is_variadic)
}

/// Join line continuations and trim a directive body
fn normalize_body(text: String) -> String {
    text.replace("\\\r\n", " ")
        .replace("\\\n", " ")
        .trim()
        .to_string()
}

fn node_text(node: Node, source: &str) -> String {
    node.utf8_text(source.as_bytes()).unwrap_or("").to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(source: &str) -> ParsedUnit {
        let mut parser = CParser::new();
        parser.parse_source(source, "test.c").unwrap()
    }

    #[test]
    fn test_object_like_define() {
        let unit = parse("#define BUFSIZE 128\nint buf[BUFSIZE];\n");

        let def = unit.macros.effective_at("BUFSIZE", 40).unwrap();
        assert_eq!(def.body, "128");
        assert!(!def.binding.is_function_like());
    }

    #[test]
    fn test_function_like_define() {
        let unit = parse("#define SQ(x) ((x)*(x))\nint y = SQ(3);\n");

        let def = unit.macros.effective_at("SQ", 40).unwrap();
        assert_eq!(def.binding.params, Some(vec!["x".to_string()]));
        assert_eq!(def.body, "((x)*(x))");
    }

    #[test]
    fn test_variadic_define() {
        let unit = parse("#define LOG(fmt, ...) printf(fmt, __VA_ARGS__)\n");

        let def = unit.macros.effective_at("LOG", 60).unwrap();
        assert!(def.binding.is_variadic);
        assert_eq!(def.binding.params, Some(vec!["fmt".to_string()]));
    }

    #[test]
    fn test_undef_recorded() {
        let source = "#define FOO 1\nint a = FOO;\n#undef FOO\nint b = FOO;\n";
        let unit = parse(source);

        let undef_end = source.find("int b").unwrap();
        assert!(unit.macros.effective_at("FOO", 20).is_some());
        assert!(unit.macros.effective_at("FOO", undef_end).is_none());
    }

    #[test]
    fn test_occurrence_regions() {
        let source = "#define SQ(x) ((x)*(x))\nint y = SQ(3);\n";
        let unit = parse(source);

        assert_eq!(unit.occurrences.len(), 1);
        let occ = &unit.occurrences[0];
        assert_eq!(occ.name, "SQ");
        assert_eq!(unit.region_text(occ.region), "SQ(3)");
        assert_eq!(unit.region_text(occ.name_region), "SQ");
    }

    #[test]
    fn test_definition_name_is_not_an_occurrence() {
        let source = "#define FOO 1\n";
        let unit = parse(source);

        assert!(unit.occurrences.is_empty());
    }

    #[test]
    fn test_function_like_name_without_args_is_not_an_occurrence() {
        let source = "#define SQ(x) ((x)*(x))\nvoid *f = SQ;\n";
        let unit = parse(source);

        assert!(unit.occurrences.is_empty());
    }

    #[test]
    fn test_occurrence_respects_undef() {
        let source = "#define FOO 1\n#undef FOO\nint b = FOO;\n";
        let unit = parse(source);

        assert!(unit.occurrences.is_empty());
    }

    #[test]
    fn test_resolve_macro_reference_by_caret() {
        let source = "#define SQ(x) ((x)*(x))\nint y = SQ(3);\n";
        let unit = parse(source);

        let name_offset = source.rfind("SQ").unwrap();
        let occ = unit
            .resolve_macro_reference(SourceRegion::point(name_offset + 1))
            .unwrap();
        assert_eq!(occ.name, "SQ");

        // A caret outside any name token resolves to nothing.
        assert!(unit.resolve_macro_reference(SourceRegion::point(0)).is_none());
    }

    #[test]
    fn test_expansion_history_for_occurrence() {
        let source = "#define A 1\n#define B (A+1)\nint z = B;\n";
        let unit = parse(source);

        let occ = &unit.occurrences[0];
        let history = unit.expansion_history(occ.region);

        assert_eq!(history.original, "B");
        assert_eq!(history.step_count(), 2);
        assert_eq!(history.full, "(1+1)");
    }

    #[test]
    fn test_builtin_occurrence() {
        let source = "int line = __LINE__;\n";
        let unit = parse(source);

        assert_eq!(unit.occurrences.len(), 1);
        assert_eq!(unit.occurrences[0].name, "__LINE__");
    }
}
