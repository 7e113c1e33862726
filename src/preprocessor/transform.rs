use super::error::ParseError;
use super::expr::Evaluator;
use super::keywords::{Directive, KeywordRegistry, Keywords};
use super::vars::Variables;

/// State of one open if/elseif/else block
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Frame {
    /// Whether the branch currently being read is selected
    current: bool,
    /// Whether an `else` has been seen in this block
    else_found: bool,
    /// Whether any branch of this block has been selected so far
    ever_true: bool,
}

impl Frame {
    fn opened(result: bool) -> Self {
        Self {
            current: result,
            else_found: false,
            ever_true: result,
        }
    }
}

/// Open blocks together with the indentation of their latest directive line
#[derive(Debug, Default)]
struct BlockStack {
    frames: Vec<Frame>,
    indents: Vec<usize>,
}

impl BlockStack {
    fn push(&mut self, frame: Frame, indent: usize) {
        self.frames.push(frame);
        self.indents.push(indent);
    }

    fn top(&self) -> Option<Frame> {
        self.frames.last().copied()
    }

    fn replace_top(&mut self, frame: Frame, indent: usize) {
        self.frames.pop();
        self.indents.pop();
        self.push(frame, indent);
    }

    fn pop(&mut self) -> Option<Frame> {
        self.indents.pop();
        self.frames.pop()
    }

    fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }

    /// True when every enclosing branch is selected
    fn is_active(&self) -> bool {
        self.frames.iter().all(|f| f.current)
    }

    fn indent(&self) -> usize {
        self.indents.last().copied().unwrap_or(0)
    }
}

/// Resolves the conditional directives of a file.
///
/// Directive lines stay in place, lines of selected branches are uncommented
/// and lines of unselected branches are tagged with the eval keyword, so
/// running the preprocessor over its own output changes nothing.
#[derive(Debug, Clone, Copy)]
pub struct Preprocessor<'a> {
    vars: &'a Variables,
    keywords: &'a KeywordRegistry,
    remove_comments: bool,
}

impl<'a> Preprocessor<'a> {
    pub fn new(vars: &'a Variables, keywords: &'a KeywordRegistry) -> Self {
        Self {
            vars,
            keywords,
            remove_comments: false,
        }
    }

    /// Drop directive lines and unselected lines instead of tagging them
    pub fn with_remove_comments(mut self, remove_comments: bool) -> Self {
        self.remove_comments = remove_comments;
        self
    }

    pub fn evaluator(&self) -> Evaluator<'a> {
        Evaluator::new(self.vars)
    }

    /// Convert the lines of a file; `file_name` selects the keywords and is
    /// reported in errors
    pub fn convert_source<S: AsRef<str>>(&self, lines: &[S], file_name: Option<&str>) -> Result<Vec<String>, ParseError> {
        let keywords = self.keywords.for_file(file_name);
        let mut stack = BlockStack::default();
        let mut output = Vec::with_capacity(lines.len());
        let mut n = 0;

        for line in lines {
            n += 1;
            let line = line.as_ref();
            let trimmed = line.trim();
            let indent = indentation(line);

            match keywords.classify(trimmed) {
                Directive::If(rest) => {
                    let result = self.condition(rest, n, file_name)?;
                    stack.push(Frame::opened(result), indent);
                }
                Directive::ElseIf(rest) => {
                    let top = stack
                        .top()
                        .ok_or_else(|| ParseError::structural("elseif without if").at(Some(n), file_name))?;
                    if top.else_found {
                        return Err(ParseError::structural("elseif after else").at(Some(n), file_name));
                    }

                    let frame = if top.ever_true {
                        Frame { current: false, ..top }
                    } else {
                        Frame::opened(self.condition(rest, n, file_name)?)
                    };
                    stack.replace_top(frame, indent);
                }
                Directive::Else => {
                    let top = stack
                        .top()
                        .ok_or_else(|| ParseError::structural("Unexpected else").at(Some(n), file_name))?;
                    let frame = Frame {
                        current: !top.ever_true,
                        else_found: true,
                        ever_true: top.ever_true,
                    };
                    stack.replace_top(frame, indent);
                }
                Directive::EndIf => {
                    stack
                        .pop()
                        .ok_or_else(|| ParseError::structural("endif without if").at(Some(n), file_name))?;
                }
                Directive::Code => {
                    if let Some(mapped) = self.convert_line(line, trimmed, indent, &stack, keywords) {
                        output.push(mapped);
                    }
                    continue;
                }
            }

            if !self.remove_comments {
                output.push(line.to_string());
            }
        }

        if !stack.is_empty() {
            return Err(ParseError::structural("Missing endif").at(Some(n), file_name));
        }

        Ok(output)
    }

    fn condition(&self, rest: &str, line: usize, file_name: Option<&str>) -> Result<bool, ParseError> {
        if !rest.starts_with(' ') {
            return Err(ParseError::syntax("Expected space before condition").at(Some(line), file_name));
        }
        self.evaluator().evaluate_at(rest.trim(), Some(line), file_name)
    }

    /// Render an ordinary line; `None` drops it from the output
    fn convert_line(
        &self,
        line: &str,
        trimmed: &str,
        indent: usize,
        stack: &BlockStack,
        keywords: &Keywords,
    ) -> Option<String> {
        let eval = keywords.eval.as_str();

        if stack.is_active() {
            if trimmed.starts_with(eval) {
                return Some(uncomment(line, eval));
            }
            return Some(line.to_string());
        }

        if self.remove_comments {
            return None;
        }

        let block_indent = stack.indent();
        let mapped = if trimmed.is_empty() {
            format!("{}{}", " ".repeat(block_indent), eval)
        } else if !trimmed.starts_with(eval) && block_indent <= indent {
            format!("{}{} {}", " ".repeat(block_indent), eval, skip_chars(line, block_indent))
        } else {
            line.to_string()
        };
        Some(mapped)
    }
}

/// Number of leading whitespace characters
fn indentation(line: &str) -> usize {
    line.chars().take_while(|c| c.is_whitespace()).count()
}

fn skip_chars(line: &str, count: usize) -> &str {
    match line.char_indices().nth(count) {
        Some((i, _)) => &line[i..],
        None => "",
    }
}

/// Remove the eval tag, and one space after it, keeping the indentation
fn uncomment(line: &str, eval: &str) -> String {
    let start = line.len() - line.trim_start().len();
    let rest = &line[start + eval.len()..];
    let rest = rest.strip_prefix(' ').unwrap_or(rest);
    format!("{}{}", &line[..start], rest)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::preprocessor::error::ParseErrorKind;
    use pretty_assertions::assert_eq;

    fn vars() -> Variables {
        [("zero", "0"), ("one", "1"), ("two", "2"), ("test", "hello")]
            .into_iter()
            .collect()
    }

    fn convert(lines: &[&str]) -> Result<Vec<String>, ParseError> {
        let vars = vars();
        let keywords = KeywordRegistry::new();
        Preprocessor::new(&vars, &keywords).convert_source(lines, None)
    }

    fn converted(lines: &[&str]) -> Vec<String> {
        convert(lines).expect("conversion failed")
    }

    fn stripped(lines: &[&str]) -> Vec<String> {
        let vars = vars();
        let keywords = KeywordRegistry::new();
        Preprocessor::new(&vars, &keywords)
            .with_remove_comments(true)
            .convert_source(lines, None)
            .expect("conversion failed")
    }

    fn assert_error(lines: &[&str], kind: ParseErrorKind, message: &str) {
        let err = convert(lines).unwrap_err();
        assert_eq!(err.kind, kind);
        assert!(
            err.message.to_lowercase().contains(message),
            "expected '{}' in '{}'",
            message,
            err.message
        );
    }

    #[test]
    fn test_structural_errors() {
        assert_error(&["//#endif"], ParseErrorKind::Structural, "endif without if");
        assert_error(&["//#else"], ParseErrorKind::Structural, "unexpected else");
        assert_error(&["//#elseif"], ParseErrorKind::Structural, "elseif without if");
        assert_error(
            &["//#if one", "//#else", "//#elseif one", "//#endif"],
            ParseErrorKind::Structural,
            "elseif after else",
        );
        assert_error(&["//#if one"], ParseErrorKind::Structural, "missing endif");
        assert_error(
            &["//#if one", "//#if one", "//#if one", "//#endif"],
            ParseErrorKind::Structural,
            "missing endif",
        );
    }

    #[test]
    fn test_missing_endif_reports_last_line() {
        let err = convert(&["//#if one", "code", "more"]).unwrap_err();
        assert_eq!(err.line, Some(3));
    }

    #[test]
    fn test_syntax_errors() {
        assert_error(&["//#ifone", "//#endif"], ParseErrorKind::Syntax, "expected space");
        assert_error(&["//#if zero", "//#elseiftwo", "//#endif"], ParseErrorKind::Syntax, "expected space");
        assert_error(&["//#if", "//#endif"], ParseErrorKind::Syntax, "expected space");
    }

    #[test]
    fn test_error_carries_position() {
        let vars = vars();
        let keywords = KeywordRegistry::new();
        let err = Preprocessor::new(&vars, &keywords)
            .convert_source(&["a", "b", "//#endif"], Some("Main.java"))
            .unwrap_err();
        assert_eq!(err.to_string(), "endif without if In line: 3 of file: Main.java");
    }

    #[test]
    fn test_evaluation_error_propagates() {
        assert_error(&["//#if test > 1", "//#endif"], ParseErrorKind::Evaluation, "hello");
    }

    #[test]
    fn test_if_true() {
        assert_eq!(converted(&["//#if one", "code", "//#endif"]), ["//#if one", "code", "//#endif"]);
        assert_eq!(converted(&["//#if one", "//$$ code", "//#endif"]), ["//#if one", "code", "//#endif"]);
    }

    #[test]
    fn test_if_false() {
        assert_eq!(converted(&["//#if zero", "//$$ code", "//#endif"]), ["//#if zero", "//$$ code", "//#endif"]);
        assert_eq!(converted(&["//#if zero", "code", "//#endif"]), ["//#if zero", "//$$ code", "//#endif"]);
    }

    #[test]
    fn test_if_else() {
        let expected = ["//#if one", "code", "//#else", "//$$ code", "//#endif"];
        assert_eq!(converted(&["//#if one", "code", "//#else", "//$$ code", "//#endif"]), expected);
        assert_eq!(converted(&["//#if one", "//$$ code", "//#else", "code", "//#endif"]), expected);

        let expected = ["//#if zero", "//$$ code", "//#else", "code", "//#endif"];
        assert_eq!(converted(&["//#if zero", "code", "//#else", "//$$ code", "//#endif"]), expected);
        assert_eq!(converted(&["//#if zero", "//$$ code", "//#else", "code", "//#endif"]), expected);
    }

    #[test]
    fn test_if_elseif() {
        let expected = ["//#if one", "code", "//#elseif zero", "//$$ code", "//#endif"];
        assert_eq!(converted(&["//#if one", "//$$ code", "//#elseif zero", "code", "//#endif"]), expected);
        assert_eq!(converted(&["//#if one", "code", "//#elseif zero", "code", "//#endif"]), expected);

        let expected = ["//#if zero", "//$$ code", "//#elseif one", "code", "//#endif"];
        assert_eq!(converted(&["//#if zero", "code", "//#elseif one", "//$$ code", "//#endif"]), expected);
        assert_eq!(converted(&["//#if zero", "//$$ code", "//#elseif one", "//$$ code", "//#endif"]), expected);
    }

    #[test]
    fn test_chain_is_inert_after_first_match() {
        let input = [
            "//#if one",
            "first",
            "//#elseif two",
            "second",
            "//#elseif one == 1",
            "third",
            "//#else",
            "fourth",
            "//#endif",
        ];
        let expected = [
            "//#if one",
            "first",
            "//#elseif two",
            "//$$ second",
            "//#elseif one == 1",
            "//$$ third",
            "//#else",
            "//$$ fourth",
            "//#endif",
        ];
        assert_eq!(converted(&input), expected);
    }

    #[test]
    fn test_inert_elseif_is_not_evaluated() {
        // the condition would fail to parse if it were evaluated
        let input = ["//#if one", "a", "//#elseif test > 1", "b", "//#endif"];
        assert_eq!(converted(&input), ["//#if one", "a", "//#elseif test > 1", "//$$ b", "//#endif"]);
    }

    #[test]
    fn test_later_elseif_selected() {
        let input = [
            "//#if zero",
            "a",
            "//#elseif one == 2",
            "b",
            "//#elseif two",
            "//$$ c",
            "//#else",
            "d",
            "//#endif",
        ];
        let expected = [
            "//#if zero",
            "//$$ a",
            "//#elseif one == 2",
            "//$$ b",
            "//#elseif two",
            "c",
            "//#else",
            "//$$ d",
            "//#endif",
        ];
        assert_eq!(converted(&input), expected);
    }

    #[test]
    fn test_nested_blocks() {
        let input = [
            "//#if one",
            "outer",
            "//#if zero",
            "inner",
            "//#else",
            "//$$ other",
            "//#endif",
            "//#endif",
            "//#if zero",
            "//#if one",
            "hidden",
            "//#endif",
            "//#endif",
        ];
        let expected = [
            "//#if one",
            "outer",
            "//#if zero",
            "//$$ inner",
            "//#else",
            "other",
            "//#endif",
            "//#endif",
            "//#if zero",
            "//#if one",
            "//$$ hidden",
            "//#endif",
            "//#endif",
        ];
        assert_eq!(converted(&input), expected);
    }

    #[test]
    fn test_indented_block_is_tagged_at_directive_column() {
        let input = [
            "class A {",
            "    //#if zero",
            "    void a() {",
            "        body();",
            "    }",
            "",
            "    //#endif",
            "}",
        ];
        let expected = [
            "class A {",
            "    //#if zero",
            "    //$$ void a() {",
            "    //$$     body();",
            "    //$$ }",
            "    //$$",
            "    //#endif",
            "}",
        ];
        assert_eq!(converted(&input), expected);
    }

    #[test]
    fn test_reactivating_indented_block() {
        let input = [
            "    //#if one",
            "    //$$ void a() {",
            "    //$$     body();",
            "    //$$",
            "    //#endif",
        ];
        let expected = ["    //#if one", "    void a() {", "        body();", "    ", "    //#endif"];
        assert_eq!(converted(&input), expected);
    }

    #[test]
    fn test_misaligned_line_is_left_alone() {
        let input = ["    //#if zero", "  shallow", "    deep", "    //#endif"];
        let expected = ["    //#if zero", "  shallow", "    //$$ deep", "    //#endif"];
        assert_eq!(converted(&input), expected);
    }

    #[test]
    fn test_else_indentation_replaces_if_indentation() {
        let input = ["//#if one", "a", "  //#else", "  b", "b2", "//#endif"];
        let expected = ["//#if one", "a", "  //#else", "  //$$ b", "b2", "//#endif"];
        assert_eq!(converted(&input), expected);
    }

    #[test]
    fn test_eval_tag_without_space() {
        assert_eq!(converted(&["//#if one", "//$$code", "//#endif"]), ["//#if one", "code", "//#endif"]);
    }

    #[test]
    fn test_lines_outside_blocks_untouched() {
        let input = ["//$$ keep", "plain", "", "  indented"];
        assert_eq!(converted(&input), ["keep", "plain", "", "  indented"]);
    }

    #[test]
    fn test_line_count_preserved() {
        let input = [
            "a",
            "//#if zero",
            "b",
            "",
            "//#elseif one",
            "//$$ c",
            "//#else",
            "d",
            "//#endif",
        ];
        assert_eq!(converted(&input).len(), input.len());
    }

    #[test]
    fn test_idempotent() {
        let input = [
            "class A {",
            "    //#if zero",
            "    void a() {",
            "",
            "        body();",
            "    }",
            "    //#elseif one",
            "    //$$ void b();",
            "    //#else",
            "  misaligned();",
            "    //#endif",
            "}",
        ];
        let once = converted(&input);
        let once_refs: Vec<&str> = once.iter().map(String::as_str).collect();
        let twice = converted(&once_refs);
        assert_eq!(once, twice);
    }

    #[test]
    fn test_remove_comments() {
        let input = [
            "head",
            "//#if one",
            "//$$ live",
            "//#else",
            "dead",
            "",
            "//#endif",
            "tail",
        ];
        assert_eq!(stripped(&input), ["head", "live", "tail"]);
    }

    #[test]
    fn test_remove_comments_never_grows() {
        let input = ["//#if zero", "a", "//#elseif one", "b", "//#endif"];
        let output = stripped(&input);
        assert!(output.len() <= input.len());
        assert_eq!(output, ["b"]);
    }

    #[test]
    fn test_custom_keywords_by_extension() {
        let vars = vars();
        let mut keywords = KeywordRegistry::new();
        keywords.register("yml", Keywords::new("#if", "#elseif", "#else", "#endif", "#$$"));
        let preprocessor = Preprocessor::new(&vars, &keywords);

        let input = ["#if zero", "key: a", "#else", "#$$ key: b", "#endif"];
        let output = preprocessor.convert_source(&input, Some("config.yml")).expect("conversion failed");
        assert_eq!(output, ["#if zero", "#$$ key: a", "#else", "key: b", "#endif"]);

        // default keywords leave the same lines alone in other files
        let output = preprocessor.convert_source(&input, Some("config.txt")).expect("conversion failed");
        assert_eq!(output, input);
    }
}
