//! Display-only re-indenter.
//!
//! Breaks lines on braces and statement terminators and re-indents, without
//! parsing. Good enough to eyeball a freshly unpacked one-liner; the AST
//! passes are responsible for real output formatting.

pub fn beautify(code: &str) -> String {
    let mut out = String::with_capacity(code.len() + code.len() / 4);
    let mut indent = 0usize;
    let mut in_string: Option<char> = None;
    let mut escaped = false;
    let mut at_line_start = false;

    for c in code.chars() {
        if let Some(quote) = in_string {
            out.push(c);
            if escaped {
                escaped = false;
            } else if c == '\\' {
                escaped = true;
            } else if c == quote {
                in_string = None;
            }
            continue;
        }
        match c {
            '\'' | '"' | '`' => {
                if at_line_start {
                    push_indent(&mut out, indent);
                    at_line_start = false;
                }
                in_string = Some(c);
                out.push(c);
            }
            '{' => {
                if at_line_start {
                    push_indent(&mut out, indent);
                }
                out.push('{');
                out.push('\n');
                indent += 1;
                at_line_start = true;
            }
            '}' => {
                if !at_line_start {
                    out.push('\n');
                }
                indent = indent.saturating_sub(1);
                push_indent(&mut out, indent);
                out.push('}');
                out.push('\n');
                at_line_start = true;
            }
            ';' => {
                if at_line_start {
                    push_indent(&mut out, indent);
                }
                out.push(';');
                out.push('\n');
                at_line_start = true;
            }
            '\n' => {
                if !at_line_start {
                    out.push('\n');
                    at_line_start = true;
                }
            }
            ' ' | '\t' if at_line_start => {}
            _ => {
                if at_line_start {
                    push_indent(&mut out, indent);
                    at_line_start = false;
                }
                out.push(c);
            }
        }
    }
    while out.ends_with('\n') {
        out.pop();
    }
    out.push('\n');
    out
}

fn push_indent(out: &mut String, indent: usize) {
    for _ in 0..indent {
        out.push_str("  ");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn breaks_braces_and_statements() {
        let pretty = beautify("function f(){var a=1;return a;}");
        assert_eq!(pretty, "function f(){\n  var a=1;\n  return a;\n}\n");
    }

    #[test]
    fn leaves_string_contents_alone() {
        let pretty = beautify("var s='a;b{c}';");
        assert!(pretty.contains("'a;b{c}'"));
    }

    #[test]
    fn nested_blocks_indent_twice() {
        let pretty = beautify("if(a){if(b){x();}}");
        assert!(pretty.contains("\n    x();"));
    }
}
