use rustyline::DefaultEditor;
use rustyline::error::ReadlineError;

use crate::runner::Runner;

/// Run the interactive REPL. Definitions persist across lines.
pub fn run_repl() -> rustyline::Result<()> {
    let mut editor = DefaultEditor::new()?;
    let mut runner = Runner::new(Box::new(std::io::stdout()), Box::new(std::io::stderr()));

    loop {
        match editor.readline("> ") {
            Ok(line) => {
                let trimmed = line.trim();
                if trimmed.is_empty() {
                    continue;
                }
                let _ = editor.add_history_entry(trimmed);

                // Auto-wrap bare expressions so the user sees the result.
                let source = if is_bare_expression(trimmed) {
                    format!("print {trimmed};")
                } else {
                    trimmed.to_string()
                };
                runner.run(&source);
            }
            Err(ReadlineError::Interrupted) => continue,
            Err(ReadlineError::Eof) => break,
            Err(err) => {
                eprintln!("read error: {err}");
                break;
            }
        }
    }

    Ok(())
}

/// Heuristic: treat the line as a bare expression if it doesn't end with
/// ';' or '}' and doesn't start with a keyword that begins a statement.
fn is_bare_expression(line: &str) -> bool {
    if line.ends_with(';') || line.ends_with('}') {
        return false;
    }
    let first_word = line.split_whitespace().next().unwrap_or("");
    !matches!(
        first_word,
        "var"
            | "fun"
            | "class"
            | "if"
            | "while"
            | "for"
            | "print"
            | "return"
            | "break"
            | "continue"
            | "{"
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bare_expression_detection() {
        assert!(is_bare_expression("1 + 2"));
        assert!(is_bare_expression("x"));
        assert!(is_bare_expression("a ? b : c"));
        assert!(!is_bare_expression("var x = 1;"));
        assert!(!is_bare_expression("print 1;"));
        assert!(!is_bare_expression("{ var x = 1; }"));
        assert!(!is_bare_expression("if (true) print 1;"));
        assert!(!is_bare_expression("fun foo() {}"));
        assert!(!is_bare_expression("break"));
    }
}
