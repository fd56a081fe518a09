use std::path::PathBuf;

use anyhow::{Context, Result, bail};
use clap::Parser;

use arbor_lox::ast::printer;
use arbor_lox::parser::Parser as LoxParser;
use arbor_lox::runner::Runner;
use arbor_lox::scanner;

#[derive(Parser, Debug)]
#[command(name = "arbor-lox", about = "A tree-walking Lox-dialect interpreter")]
struct Cli {
    /// Lox source file to run (omit for REPL)
    file: Option<PathBuf>,

    /// Dump tokens and exit
    #[arg(long)]
    dump_tokens: bool,

    /// Dump AST and exit
    #[arg(long)]
    dump_ast: bool,

    /// AST output format
    #[arg(long, default_value = "sexp", value_parser = ["sexp", "json"])]
    ast_format: String,
}

fn read_source(cli: &Cli) -> Result<String> {
    match &cli.file {
        Some(path) => std::fs::read_to_string(path)
            .with_context(|| format!("read source file '{}'", path.display())),
        None => bail!("source file required for this operation"),
    }
}

fn report_errors(errors: &[arbor_lox::CompileError]) -> anyhow::Error {
    for error in errors {
        eprintln!("{error}");
    }
    anyhow::anyhow!("{} error(s)", errors.len())
}

fn main() -> Result<()> {
    env_logger::init();
    let cli = Cli::parse();

    if cli.dump_tokens {
        let source = read_source(&cli)?;
        let (tokens, errors) = scanner::scan(&source);
        if !errors.is_empty() {
            return Err(report_errors(&errors));
        }
        for token in &tokens {
            println!("{token}");
        }
        return Ok(());
    }

    if cli.dump_ast {
        let source = read_source(&cli)?;
        let (tokens, errors) = scanner::scan(&source);
        if !errors.is_empty() {
            return Err(report_errors(&errors));
        }
        let program = LoxParser::new(tokens)
            .parse()
            .map_err(|e| report_errors(&e))?;
        match cli.ast_format.as_str() {
            "json" => print!("{}", printer::to_json(&program)),
            _ => print!("{}", printer::to_sexp(&program)),
        }
        return Ok(());
    }

    match cli.file {
        Some(_) => {
            let source = read_source(&cli)?;
            let mut runner = Runner::new(Box::new(std::io::stdout()), Box::new(std::io::stderr()));
            runner.run(&source);
            Ok(())
        }
        None => {
            arbor_lox::repl::run_repl()?;
            Ok(())
        }
    }
}
