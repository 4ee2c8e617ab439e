//! Single-step macro expansion engine
//!
//! Produces the expansion bookkeeping the explorer replays: an ordered
//! sequence of substitutions, each expanding exactly one macro
//! invocation by one level, from the region text as written down to the
//! fully expanded text.
//!
//! The step ordering rule is fixed here and nowhere else: the first
//! eligible invocation by byte offset in the current text expands next.
//! Re-expansion of a macro inside its own expansion is suppressed with
//! painted intervals, the textual equivalent of preprocessor hide sets.

use crate::directives::{MacroDef, MacroTable};
use macroscope_core::config::EngineConfig;
use macroscope_core::{apply_replacements, Location, MacroBinding, TextReplacement};
use regex::Regex;

/// One recorded substitution
#[derive(Debug, Clone)]
pub struct RecordedStep {
    /// The macro expanded by this step
    pub binding: MacroBinding,
    /// Edits applied by this step, in increasing offset order
    pub replacements: Vec<TextReplacement>,
    /// Region text before the substitution
    pub code_before: String,
    /// Region text after the substitution
    pub code_after: String,
    /// Defining directive, when the macro has one
    pub definition_location: Option<Location>,
    /// Literal replacement body, when the macro has one
    pub body_image: Option<String>,
}

/// Expansion bookkeeping for one region
#[derive(Debug, Clone, Default)]
pub struct ExpansionHistory {
    /// Region text exactly as written
    pub original: String,
    /// Recorded substitutions, one macro level each
    pub steps: Vec<RecordedStep>,
    /// Region text with all macros fully expanded
    pub full: String,
    /// Whether the step ceiling cut the history short
    pub truncated: bool,
}

impl ExpansionHistory {
    /// Number of recorded steps
    pub fn step_count(&self) -> usize {
        self.steps.len()
    }
}

/// A painted interval: text inserted by expanding `name`, within which
/// `name` must not expand again
struct PaintSpan {
    start: usize,
    end: usize,
    name: String,
}

/// An eligible invocation found in the current text
struct Invocation<'a> {
    name: String,
    offset: usize,
    length: usize,
    args: Option<Vec<String>>,
    def: Option<&'a MacroDef>,
}

const BUILTINS: [&str; 3] = ["__LINE__", "__FILE__", "__COUNTER__"];

/// Single-step expansion engine over one region of one unit
pub struct ExpansionEngine<'a> {
    table: &'a MacroTable,
    config: &'a EngineConfig,
    file: &'a str,
    base_offset: usize,
    base_line: usize,
    ident_re: Regex,
}

impl<'a> ExpansionEngine<'a> {
    /// Create an engine for a region starting at `base_offset` (byte
    /// offset in the unit, used for definition-timeline lookups) on
    /// `base_line` (1-based, used for `__LINE__`).
    pub fn new(
        table: &'a MacroTable,
        config: &'a EngineConfig,
        file: &'a str,
        base_offset: usize,
        base_line: usize,
    ) -> Self {
        Self {
            table,
            config,
            file,
            base_offset,
            base_line,
            ident_re: Regex::new(r"[A-Za-z_][A-Za-z0-9_]*").expect("identifier pattern"),
        }
    }

    /// Run the engine over the region text
    pub fn explore(&self, original: &str) -> ExpansionHistory {
        let mut text = original.to_string();
        let mut steps: Vec<RecordedStep> = Vec::new();
        let mut paints: Vec<PaintSpan> = Vec::new();
        let mut counter = 0usize;
        let mut truncated = false;

        loop {
            if steps.len() >= self.config.max_steps {
                truncated = self.next_invocation(&text, &paints).is_some();
                break;
            }

            let Some(inv) = self.next_invocation(&text, &paints) else {
                break;
            };

            let inserted = match inv.def {
                Some(def) => match &inv.args {
                    Some(args) => self.substitute(&def.binding, &def.body, args),
                    None => def.body.clone(),
                },
                None => self.builtin_expansion(&inv.name, &text, inv.offset, &mut counter),
            };

            let replacement = TextReplacement::new(inv.offset, inv.length, inserted.clone());
            let after = apply_replacements(&text, std::slice::from_ref(&replacement));

            let binding = match inv.def {
                Some(def) => def.binding.clone(),
                None => MacroBinding::dynamic(&inv.name),
            };
            steps.push(RecordedStep {
                binding,
                replacements: vec![replacement],
                code_before: text.clone(),
                code_after: after.clone(),
                definition_location: inv.def.map(|d| d.location.clone()),
                body_image: inv.def.map(|d| d.body.clone()),
            });

            shift_paints(&mut paints, inv.offset, inv.length, inserted.len());
            paints.push(PaintSpan {
                start: inv.offset,
                end: inv.offset + inserted.len(),
                name: inv.name.clone(),
            });
            text = after;
        }

        ExpansionHistory {
            original: original.to_string(),
            steps,
            full: text,
            truncated,
        }
    }

    /// First eligible invocation by byte offset, or `None` when the
    /// text is fully expanded.
    fn next_invocation<'t>(&'t self, text: &str, paints: &[PaintSpan]) -> Option<Invocation<'t>> {
        let mask = literal_mask(text);

        for m in self.ident_re.find_iter(text) {
            let start = m.start();
            if mask[start] {
                continue;
            }
            let name = m.as_str();
            if paints
                .iter()
                .any(|p| p.name == name && p.start <= start && start < p.end)
            {
                continue;
            }

            if self.config.builtins && BUILTINS.contains(&name) {
                return Some(Invocation {
                    name: name.to_string(),
                    offset: start,
                    length: m.len(),
                    args: None,
                    def: None,
                });
            }

            let Some(def) = self.table.effective_at(name, self.base_offset) else {
                continue;
            };

            if def.binding.is_function_like() {
                let Some((mut args, end)) = parse_arguments(text, m.end()) else {
                    // Function-like name without an argument list is
                    // not an invocation.
                    continue;
                };
                let params = def.binding.params.as_deref().unwrap_or_default();
                if args.is_empty() && params.len() == 1 {
                    // F() passes one empty argument to a single-parameter macro.
                    args.push(String::new());
                }
                let arity_ok = if def.binding.is_variadic {
                    args.len() >= params.len()
                } else {
                    args.len() == params.len()
                };
                if !arity_ok {
                    continue;
                }
                return Some(Invocation {
                    name: name.to_string(),
                    offset: start,
                    length: end - start,
                    args: Some(args),
                    def: Some(def),
                });
            }

            return Some(Invocation {
                name: name.to_string(),
                offset: start,
                length: m.len(),
                args: None,
                def: Some(def),
            });
        }

        None
    }

    fn builtin_expansion(
        &self,
        name: &str,
        text: &str,
        offset: usize,
        counter: &mut usize,
    ) -> String {
        match name {
            "__LINE__" => {
                // Line is computed relative to the exploration region.
                let newlines = text[..offset].bytes().filter(|&b| b == b'\n').count();
                (self.base_line + newlines).to_string()
            }
            "__FILE__" => format!("\"{}\"", self.file),
            "__COUNTER__" => {
                let value = *counter;
                *counter += 1;
                value.to_string()
            }
            _ => String::new(),
        }
    }

    /// Substitute arguments into a function-like macro body:
    /// `#param` stringification, then `##` pasting, then plain
    /// identifier-boundary parameter replacement.
    fn substitute(&self, binding: &MacroBinding, body: &str, args: &[String]) -> String {
        let params = binding.params.as_deref().unwrap_or_default();

        let mut names: Vec<String> = params.to_vec();
        let mut values: Vec<String> = args[..params.len().min(args.len())].to_vec();
        values.resize(names.len(), String::new());
        if binding.is_variadic {
            let extra = if args.len() > params.len() {
                args[params.len()..].join(", ")
            } else {
                String::new()
            };
            names.push("__VA_ARGS__".to_string());
            values.push(extra);
        }

        let mut result = self.stringify_params(body, &names, &values);
        result = paste_tokens(&result, &names, &values);
        for (name, value) in names.iter().zip(values.iter()) {
            result = self.replace_identifier(&result, name, value);
        }
        result
    }

    fn stringify_params(&self, body: &str, names: &[String], values: &[String]) -> String {
        let mut result = body.to_string();
        for (name, value) in names.iter().zip(values.iter()) {
            let pattern = format!("#{}", name);
            let quoted = format!("\"{}\"", value);

            let mut out = String::with_capacity(result.len());
            let mut rest = result.as_str();
            while let Some(pos) = rest.find(&pattern) {
                let preceded_by_hash = (pos > 0 && rest.as_bytes()[pos - 1] == b'#')
                    || (pos == 0 && out.ends_with('#'));
                let followed_by_ident = rest[pos + pattern.len()..]
                    .chars()
                    .next()
                    .is_some_and(|c| c.is_alphanumeric() || c == '_');

                out.push_str(&rest[..pos]);
                if preceded_by_hash || followed_by_ident {
                    // `##name` pastes, `#names` is a longer identifier.
                    out.push_str(&pattern);
                } else {
                    out.push_str(&quoted);
                }
                rest = &rest[pos + pattern.len()..];
            }
            out.push_str(rest);
            result = out;
        }
        result
    }

    /// Replace whole-identifier occurrences of `ident` with `value`,
    /// leaving string literals untouched
    fn replace_identifier(&self, text: &str, ident: &str, value: &str) -> String {
        let mask = literal_mask(text);
        let mut out = String::with_capacity(text.len());
        let mut last = 0;
        for m in self.ident_re.find_iter(text) {
            out.push_str(&text[last..m.start()]);
            if m.as_str() == ident && !mask[m.start()] {
                out.push_str(value);
            } else {
                out.push_str(m.as_str());
            }
            last = m.end();
        }
        out.push_str(&text[last..]);
        out
    }
}

/// Process `##` token pasting, substituting parameter operands
fn paste_tokens(body: &str, names: &[String], values: &[String]) -> String {
    let is_ident_char = |c: char| c.is_alphanumeric() || c == '_';
    let param_value = |token: &str| -> Option<String> {
        names
            .iter()
            .position(|n| n == token)
            .map(|i| values[i].clone())
    };

    let mut result = body.to_string();
    while let Some(pos) = result.find("##") {
        let left_end = result[..pos].trim_end().len();
        let left_start = result[..left_end]
            .char_indices()
            .rev()
            .take_while(|(_, c)| is_ident_char(*c))
            .last()
            .map(|(i, _)| i)
            .unwrap_or(left_end);

        let after = pos + 2;
        let ws = result[after..].len() - result[after..].trim_start().len();
        let right_start = after + ws;
        let mut right_end = right_start
            + result[right_start..]
                .chars()
                .take_while(|c| is_ident_char(*c))
                .map(|c| c.len_utf8())
                .sum::<usize>();
        if right_end == right_start {
            // Paste against a single punctuation character so the
            // operator is always consumed.
            if let Some(ch) = result[right_start..].chars().next() {
                right_end = right_start + ch.len_utf8();
            }
        }

        let left_token = &result[left_start..left_end];
        let right_token = &result[right_start..right_end];
        let left_value = param_value(left_token).unwrap_or_else(|| left_token.to_string());
        let right_value = param_value(right_token).unwrap_or_else(|| right_token.to_string());

        let mut next = String::with_capacity(result.len());
        next.push_str(&result[..left_start]);
        next.push_str(&left_value);
        next.push_str(&right_value);
        next.push_str(&result[right_end..]);
        result = next;
    }
    result
}

/// Parse a parenthesized argument list starting at or after `from`.
/// Returns the top-level comma-separated arguments and the offset just
/// past the closing parenthesis.
pub(crate) fn parse_arguments(text: &str, from: usize) -> Option<(Vec<String>, usize)> {
    let bytes = text.as_bytes();
    let mut pos = from;
    while pos < bytes.len() && bytes[pos].is_ascii_whitespace() {
        pos += 1;
    }
    if pos >= bytes.len() || bytes[pos] != b'(' {
        return None;
    }

    let mut args = Vec::new();
    let mut current = String::new();
    let mut depth = 0usize;
    let mut in_str = false;
    let mut in_char = false;
    let mut escape = false;

    for (rel, ch) in text[pos + 1..].char_indices() {
        let abs = pos + 1 + rel;
        if escape {
            current.push(ch);
            escape = false;
            continue;
        }
        if in_str || in_char {
            if ch == '\\' {
                escape = true;
            } else if (in_str && ch == '"') || (in_char && ch == '\'') {
                in_str = false;
                in_char = false;
            }
            current.push(ch);
            continue;
        }
        match ch {
            '"' => {
                in_str = true;
                current.push(ch);
            }
            '\'' => {
                in_char = true;
                current.push(ch);
            }
            '(' => {
                depth += 1;
                current.push(ch);
            }
            ')' => {
                if depth == 0 {
                    if !current.trim().is_empty() || !args.is_empty() {
                        args.push(current.trim().to_string());
                    }
                    return Some((args, abs + 1));
                }
                depth -= 1;
                current.push(ch);
            }
            ',' if depth == 0 => {
                args.push(current.trim().to_string());
                current.clear();
            }
            _ => current.push(ch),
        }
    }

    // Unclosed argument list.
    None
}

/// Byte mask marking string literals, character literals, and comments
fn literal_mask(text: &str) -> Vec<bool> {
    let bytes = text.as_bytes();
    let mut mask = vec![false; bytes.len()];
    let mut i = 0;

    while i < bytes.len() {
        match bytes[i] {
            b'"' | b'\'' => {
                let quote = bytes[i];
                mask[i] = true;
                i += 1;
                while i < bytes.len() {
                    mask[i] = true;
                    if bytes[i] == b'\\' && i + 1 < bytes.len() {
                        mask[i + 1] = true;
                        i += 2;
                        continue;
                    }
                    if bytes[i] == quote {
                        i += 1;
                        break;
                    }
                    i += 1;
                }
            }
            b'/' if i + 1 < bytes.len() && bytes[i + 1] == b'/' => {
                while i < bytes.len() && bytes[i] != b'\n' {
                    mask[i] = true;
                    i += 1;
                }
            }
            b'/' if i + 1 < bytes.len() && bytes[i + 1] == b'*' => {
                mask[i] = true;
                mask[i + 1] = true;
                i += 2;
                while i < bytes.len() {
                    mask[i] = true;
                    if bytes[i] == b'*' && i + 1 < bytes.len() && bytes[i + 1] == b'/' {
                        mask[i + 1] = true;
                        i += 2;
                        break;
                    }
                    i += 1;
                }
            }
            _ => i += 1,
        }
    }

    mask
}

/// Shift painted intervals after an edit replaced `deleted` bytes at
/// `offset` with `inserted` bytes.
fn shift_paints(paints: &mut [PaintSpan], offset: usize, deleted: usize, inserted: usize) {
    let delta = inserted as isize - deleted as isize;
    let edit_end = offset + deleted;

    for paint in paints.iter_mut() {
        if paint.end <= offset {
            continue;
        }
        if paint.start >= edit_end {
            paint.start = (paint.start as isize + delta) as usize;
            paint.end = (paint.end as isize + delta) as usize;
        } else if paint.start <= offset && paint.end >= edit_end {
            // Edit landed inside the paint; the paint grows with it.
            paint.end = (paint.end as isize + delta) as usize;
        } else {
            // Partial overlap: widen to keep the paint covering the
            // edited range.
            paint.start = paint.start.min(offset);
            paint.end = ((paint.end as isize + delta).max(edit_end as isize + delta)) as usize;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use macroscope_core::SourceRegion;
    use pretty_assertions::assert_eq;

    fn object(name: &str, body: &str) -> MacroDef {
        MacroDef {
            binding: MacroBinding::object(name),
            body: body.to_string(),
            location: Location::new("test.c", 0, 0),
            name_region: SourceRegion::new(0, name.len()),
        }
    }

    fn function(name: &str, params: &[&str], variadic: bool, body: &str) -> MacroDef {
        MacroDef {
            binding: MacroBinding::function(
                name,
                params.iter().map(|p| p.to_string()).collect(),
                variadic,
            ),
            body: body.to_string(),
            location: Location::new("test.c", 0, 0),
            name_region: SourceRegion::new(0, name.len()),
        }
    }

    fn table(defs: Vec<MacroDef>) -> MacroTable {
        let mut table = MacroTable::new();
        for def in defs {
            table.add_define(def);
        }
        table
    }

    fn engine<'a>(table: &'a MacroTable, config: &'a EngineConfig) -> ExpansionEngine<'a> {
        ExpansionEngine::new(table, config, "test.c", 100, 1)
    }

    #[test]
    fn test_function_like_expansion() {
        let table = table(vec![function("SQ", &["x"], false, "((x)*(x))")]);
        let config = EngineConfig::default();
        let history = engine(&table, &config).explore("SQ(3)");

        assert_eq!(history.step_count(), 1);
        assert_eq!(history.steps[0].code_before, "SQ(3)");
        assert_eq!(history.steps[0].code_after, "((3)*(3))");
        assert_eq!(history.full, "((3)*(3))");
    }

    #[test]
    fn test_nested_expansion_order() {
        let table = table(vec![object("A", "1"), object("B", "(A+1)")]);
        let config = EngineConfig::default();
        let history = engine(&table, &config).explore("B");

        assert_eq!(history.step_count(), 2);
        assert_eq!(history.steps[0].code_before, "B");
        assert_eq!(history.steps[1].code_before, "(A+1)");
        assert_eq!(history.full, "(1+1)");
    }

    #[test]
    fn test_leftmost_invocation_expands_first() {
        let table = table(vec![object("A", "1"), object("B", "2")]);
        let config = EngineConfig::default();
        let history = engine(&table, &config).explore("A + B");

        assert_eq!(history.step_count(), 2);
        assert_eq!(history.steps[0].binding.name, "A");
        assert_eq!(history.steps[1].binding.name, "B");
        assert_eq!(history.full, "1 + 2");
    }

    #[test]
    fn test_self_reference_terminates() {
        let table = table(vec![object("X", "X")]);
        let config = EngineConfig::default();
        let history = engine(&table, &config).explore("X");

        assert_eq!(history.step_count(), 1);
        assert_eq!(history.full, "X");
        assert!(!history.truncated);
    }

    #[test]
    fn test_mutual_reference_terminates() {
        let table = table(vec![object("A", "B"), object("B", "A")]);
        let config = EngineConfig::default();
        let history = engine(&table, &config).explore("A");

        assert_eq!(history.step_count(), 2);
        assert_eq!(history.full, "A");
    }

    #[test]
    fn test_function_like_without_parens_does_not_expand() {
        let table = table(vec![function("SQ", &["x"], false, "((x)*(x))")]);
        let config = EngineConfig::default();
        let history = engine(&table, &config).explore("f = SQ;");

        assert_eq!(history.step_count(), 0);
        assert_eq!(history.full, "f = SQ;");
    }

    #[test]
    fn test_stringify() {
        let table = table(vec![function("STR", &["s"], false, "#s")]);
        let config = EngineConfig::default();
        let history = engine(&table, &config).explore("STR(abc)");

        assert_eq!(history.full, "\"abc\"");
    }

    #[test]
    fn test_token_paste() {
        let table = table(vec![function("GLUE", &["a", "b"], false, "a##b")]);
        let config = EngineConfig::default();
        let history = engine(&table, &config).explore("GLUE(x, 1)");

        assert_eq!(history.full, "x1");
    }

    #[test]
    fn test_token_paste_with_spaces() {
        let table = table(vec![function("GLUE", &["a", "b"], false, "a ## b")]);
        let config = EngineConfig::default();
        let history = engine(&table, &config).explore("GLUE(x, 1)");

        assert_eq!(history.full, "x1");
    }

    #[test]
    fn test_variadic_macro() {
        let table = table(vec![function(
            "LOG",
            &["fmt"],
            true,
            "printf(fmt, __VA_ARGS__)",
        )]);
        let config = EngineConfig::default();
        let history = engine(&table, &config).explore("LOG(\"%d\", 1, 2)");

        assert_eq!(history.full, "printf(\"%d\", 1, 2)");
    }

    #[test]
    fn test_nested_arguments() {
        let table = table(vec![function("SQ", &["x"], false, "((x)*(x))")]);
        let config = EngineConfig::default();
        let history = engine(&table, &config).explore("SQ(f(a, b))");

        assert_eq!(history.steps[0].code_after, "((f(a, b))*(f(a, b)))");
    }

    #[test]
    fn test_macro_name_in_string_literal_is_ignored() {
        let table = table(vec![object("A", "1")]);
        let config = EngineConfig::default();
        let history = engine(&table, &config).explore("puts(\"A\") + A");

        assert_eq!(history.step_count(), 1);
        assert_eq!(history.full, "puts(\"A\") + 1");
    }

    #[test]
    fn test_builtin_line_and_counter() {
        let table = MacroTable::new();
        let config = EngineConfig::default();
        let eng = ExpansionEngine::new(&table, &config, "main.c", 0, 7);

        let history = eng.explore("__LINE__ + __COUNTER__ + __COUNTER__");
        assert_eq!(history.full, "7 + 0 + 1");
        assert_eq!(history.steps[0].binding.name, "__LINE__");
        assert!(history.steps[0].body_image.is_none());
    }

    #[test]
    fn test_builtin_file() {
        let table = MacroTable::new();
        let config = EngineConfig::default();
        let eng = ExpansionEngine::new(&table, &config, "main.c", 0, 1);

        let history = eng.explore("__FILE__");
        assert_eq!(history.full, "\"main.c\"");
    }

    #[test]
    fn test_step_ceiling_truncates() {
        let table = table(vec![object("A", "1"), object("B", "2")]);
        let config = EngineConfig {
            max_steps: 1,
            builtins: true,
        };
        let history = engine(&table, &config).explore("A + B");

        assert_eq!(history.step_count(), 1);
        assert!(history.truncated);
        assert_eq!(history.full, "1 + B");
    }

    #[test]
    fn test_ceiling_reached_without_remainder_is_not_truncated() {
        let table = table(vec![object("A", "1")]);
        let config = EngineConfig {
            max_steps: 1,
            builtins: true,
        };
        let history = engine(&table, &config).explore("A");

        assert_eq!(history.step_count(), 1);
        assert!(!history.truncated);
    }

    #[test]
    fn test_replacement_roundtrip() {
        let table = table(vec![object("A", "1"), object("B", "(A+1)")]);
        let config = EngineConfig::default();
        let history = engine(&table, &config).explore("B + B");

        for step in &history.steps {
            assert_eq!(
                apply_replacements(&step.code_before, &step.replacements),
                step.code_after
            );
        }
    }
}
