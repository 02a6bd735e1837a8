//! minilisp REPL entry point

use anyhow::{Context, Result};
use clap::Parser;
use minilisp::ast::Tag;
use minilisp::evaluator::{self, Environment};
use minilisp::reader::ParseConfig;
use rustyline::DefaultEditor;
use rustyline::error::ReadlineError;
use std::fs;
use std::path::PathBuf;
use tracing::{debug, info};

/// Interactive interpreter for a minimal Lisp
#[derive(Parser, Debug)]
#[command(name = "minilisp-repl", version, about)]
struct Args {
    /// Source file to evaluate instead of starting the interactive loop
    file: Option<PathBuf>,

    /// Evaluate SOURCE, print the last result and exit
    #[arg(short, long, value_name = "SOURCE", conflicts_with = "file")]
    eval: Option<String>,

    /// Read `;` as an ordinary atom character instead of a comment start
    #[arg(long)]
    no_comments: bool,

    /// Prompt shown before each input line
    #[arg(long, default_value = ">  ")]
    prompt: String,

    /// Verbose output (debug logging)
    #[arg(short, long)]
    verbose: bool,
}

fn main() -> Result<()> {
    let args = Args::parse();

    let default_level = if args.verbose {
        tracing::Level::DEBUG
    } else {
        tracing::Level::WARN
    };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env().add_directive(default_level.into()),
        )
        .with_writer(std::io::stderr)
        .init();

    let config = ParseConfig {
        handle_comments: !args.no_comments,
    };
    let mut env = evaluator::create_global_env();
    info!(?config, "environment initialized");

    if let Some(source) = &args.eval {
        return run_source(&mut env, source, config);
    }

    if let Some(path) = &args.file {
        debug!("Loading source: {}", path.display());
        let source = fs::read_to_string(path)
            .with_context(|| format!("Failed to read {}", path.display()))?;
        return run_source(&mut env, &source, config);
    }

    run_repl(&mut env, &args.prompt, config)
}

/// Evaluate a whole source buffer and print the final value
fn run_source(env: &mut Environment, source: &str, config: ParseConfig) -> Result<()> {
    let result = env
        .eval_str_with_config(source, config)
        .context("Evaluation failed")?;
    println!("{}", env.display(&result));
    Ok(())
}

fn run_repl(env: &mut Environment, prompt: &str, config: ParseConfig) -> Result<()> {
    println!("minilisp {}", env!("CARGO_PKG_VERSION"));
    println!("Enter S-expressions like: (+ 1 2)");
    println!("Type :help for more commands, or exit to leave.");
    println!();

    let mut rl = DefaultEditor::new().context("Could not initialize line editor")?;

    loop {
        match rl.readline(prompt) {
            Ok(line) => {
                let line = line.trim();
                if line.is_empty() {
                    continue;
                }

                let _ = rl.add_history_entry(line);

                match line {
                    ":help" => {
                        print_help();
                        continue;
                    }
                    ":env" => {
                        print_environment(env);
                        continue;
                    }
                    "exit" | ":quit" | ":exit" => {
                        println!("exiting...");
                        break;
                    }
                    _ => {}
                }

                match env.eval_str_with_config(line, config) {
                    Ok(result) => println!("{}", env.display(&result)),
                    Err(e) => println!("Error: {e}"),
                }
            }

            Err(ReadlineError::Eof) | Err(ReadlineError::Interrupted) => {
                println!("exiting...");
                break;
            }
            Err(err) => {
                return Err(err).context("Failed to read input line");
            }
        }
    }

    Ok(())
}

fn print_help() {
    println!("minilisp REPL commands:");
    println!("  :help      - Show this help message");
    println!("  :env       - Show current environment bindings");
    println!("  exit       - Exit the interpreter (also :quit, :exit)");
    println!("  Ctrl+C/D   - Exit the interpreter");
    println!();
    println!("Language:");
    println!("  Integers: 42, 007 (digits only; -5 is a symbol)");
    println!("  Lists: (1 2 3), improper (1 . 2)");
    println!("  Arithmetic: + - * / over any number of integers");
    println!("  Conditionals: (if test then else), only nil is false");
    println!("  Definitions: (define name value)");
    println!("  Comments: ; to end of line");
    println!();
    println!("Examples:");
    println!("  (define x 5)");
    println!("  (* x (+ 1 2))");
    println!("  (if nil 1 2)");
    println!();
}

fn print_environment(env: &Environment) {
    print!("{}", format_environment(env));
}

/// Render the bindings of `env`: primitives on one line, then one
/// `name = value` line per other binding.
fn format_environment(env: &Environment) -> String {
    let (functions, values): (Vec<_>, Vec<_>) = env
        .get_all_bindings()
        .into_iter()
        .partition(|(_, value)| value.tag() == Tag::Function);

    let mut out = format!("{} bindings\n", functions.len() + values.len());
    if !functions.is_empty() {
        let names: Vec<_> = functions.iter().map(|(name, _)| name.as_str()).collect();
        out.push_str(&format!("functions: {}\n", names.join(" ")));
    }
    for (name, value) in &values {
        out.push_str(&format!("{name} = {}\n", env.display(value)));
    }
    out
}
