use std::io::Write;

use log::debug;

use crate::error::CompileError;
use crate::interpreter::Interpreter;
use crate::interpreter::resolver::Resolver;
use crate::parser::Parser;
use crate::scanner;

/// The driver: feeds one source text through scan → parse → resolve →
/// interpret, writing program output to the output sink and every diagnostic
/// to the error sink. Returns the stringified value of the last top-level
/// expression statement, or `"nil"` when any stage failed.
///
/// The interpreter persists across `run` calls, so a REPL keeps its
/// definitions between lines.
pub struct Runner {
    interpreter: Interpreter,
    err: Box<dyn Write>,
}

impl Runner {
    pub fn new(out: Box<dyn Write>, err: Box<dyn Write>) -> Self {
        Self {
            interpreter: Interpreter::with_writer(out),
            err,
        }
    }

    pub fn run(&mut self, source: &str) -> String {
        debug!("scanning {} bytes", source.len());
        let (tokens, scan_errors) = scanner::scan(source);
        self.report(&scan_errors);

        debug!("parsing {} tokens", tokens.len());
        let program = match Parser::new(tokens).parse() {
            Ok(program) => program,
            Err(errors) => {
                self.report(&errors);
                return "nil".to_string();
            }
        };

        // Lexical errors never stop the scanner, but they do stop the run
        // before anything executes.
        if !scan_errors.is_empty() {
            return "nil".to_string();
        }

        debug!("resolving {} statements", program.statements.len());
        let locals = match Resolver::new(source).resolve(&program) {
            Ok(locals) => locals,
            Err(errors) => {
                self.report(&errors);
                return "nil".to_string();
            }
        };

        debug!("interpreting");
        self.interpreter.set_source(source);
        match self.interpreter.interpret(&program, locals) {
            Ok(value) => value.to_string(),
            Err(error) => {
                writeln!(self.err, "{}", error.display_with_line(source))
                    .expect("write to error sink should succeed");
                "nil".to_string()
            }
        }
    }

    fn report(&mut self, errors: &[CompileError]) {
        for error in errors {
            writeln!(self.err, "{error}").expect("write to error sink should succeed");
        }
    }
}
