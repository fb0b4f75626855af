use std::fs::File;
use std::io::{self, BufRead, BufReader, Read, Write};
use std::path::PathBuf;
use std::process;

use anyhow::{Context, Result};
use clap::Parser as ClapParser;
use clap::Subcommand;
use env_logger::Builder;
use log::{debug, info};

use rlox_tree as lox;

use lox::ast_printer::AstPrinter;
use lox::error::{Reporter, StreamReporter};
use lox::interpreter::{Interpreter, InterpreterConfig};
use lox::parser::Parser;
use lox::scanner::Scanner;
use lox::session::{Session, Status};

#[derive(ClapParser, Debug)]
#[command(version, about = "Lox language interpreter", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    commands: Commands,

    /// Enable logging to app.log
    #[arg(long, global = true)]
    log: bool,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Tokenizes input from a file, printing each token
    Tokenize {
        filename: PathBuf,

        /// Print the token list as JSON
        #[arg(long)]
        json: bool,
    },

    /// Parses input from a file as a single expression and prints its AST
    Parse { filename: PathBuf },

    /// Evaluates input from a file as a single expression and prints the result
    Evaluate { filename: PathBuf },

    /// Runs a Lox program, or starts a prompt when no file is given
    Run {
        filename: Option<PathBuf>,

        /// Maximum nesting of function and class calls
        #[arg(long, default_value_t = 255)]
        max_call_depth: usize,
    },
}

/// Reads a source file into a String
fn read_file(filename: &PathBuf) -> Result<String> {
    info!("Reading file: {:?}", filename);
    let file = File::open(filename).context(format!("Failed to open file {:?}", filename))?;
    let mut reader = BufReader::new(file);
    let mut buf = String::new();

    let bytes = reader
        .read_to_string(&mut buf)
        .context(format!("Failed to read file {:?}", filename))?;

    info!("Read {} bytes from {:?}", bytes, filename);

    Ok(buf)
}

fn init_logger() -> Result<()> {
    let log_file = File::create("app.log").context("Failed to create app.log")?;

    Builder::new()
        .format(|buf, record| {
            let module = record
                .module_path()
                .unwrap_or("<unnamed>")
                .strip_prefix("rlox_tree::")
                .unwrap_or(record.module_path().unwrap_or("<unnamed>"));
            writeln!(
                buf,
                "[{}:{}] - {}",
                module,
                record.line().unwrap_or(0),
                record.args()
            )
        })
        .target(env_logger::Target::Pipe(Box::new(log_file)))
        .filter(None, log::LevelFilter::Debug) // Default to Debug, override with RUST_LOG
        .init();

    info!("Logger initialized, writing to app.log");
    Ok(())
}

fn tokenize(filename: &PathBuf, json: bool) -> Result<Status> {
    let source = read_file(filename)?;
    let (tokens, errors) = Scanner::new(&source).scan_tokens();

    let mut reporter = StreamReporter::new(io::stderr());
    for e in &errors {
        debug!("Tokenization debug: {}", e);
        e.report_to(&mut reporter);
    }

    if json {
        let rendered =
            serde_json::to_string_pretty(&tokens).context("Failed to serialize tokens")?;
        println!("{}", rendered);
    } else {
        for token in &tokens {
            println!("{}", token);
        }
    }

    Ok(if errors.is_empty() {
        Status::Ok
    } else {
        Status::StaticError
    })
}

fn parse(filename: &PathBuf) -> Result<Status> {
    let source = read_file(filename)?;
    let (tokens, mut errors) = Scanner::new(&source).scan_tokens();

    let parsed = Parser::new(tokens).parse_expression();

    let mut reporter = StreamReporter::new(io::stderr());
    match parsed {
        Ok(expr) if errors.is_empty() => {
            let ast = AstPrinter::print(&expr);
            debug!("AST: {}", ast);
            println!("{}", ast);
            Ok(Status::Ok)
        }
        Ok(_) => {
            for e in &errors {
                e.report_to(&mut reporter);
            }
            Ok(Status::StaticError)
        }
        Err(parse_errors) => {
            errors.extend(parse_errors);
            for e in &errors {
                debug!("Parse debug: {}", e);
                e.report_to(&mut reporter);
            }
            Ok(Status::StaticError)
        }
    }
}

fn evaluate(filename: &PathBuf) -> Result<Status> {
    let source = read_file(filename)?;
    let (tokens, errors) = Scanner::new(&source).scan_tokens();

    let mut reporter = StreamReporter::new(io::stderr());

    let expr = match Parser::new(tokens).parse_expression() {
        Ok(expr) if errors.is_empty() => expr,
        Ok(_) => {
            errors.iter().for_each(|e| e.report_to(&mut reporter));
            return Ok(Status::StaticError);
        }
        Err(parse_errors) => {
            errors
                .iter()
                .chain(parse_errors.iter())
                .for_each(|e| e.report_to(&mut reporter));
            return Ok(Status::StaticError);
        }
    };

    let mut interpreter = Interpreter::new();
    match interpreter.evaluate(&expr) {
        Ok(value) => {
            debug!("Evaluated to: {}", value);
            println!("{}", value);
            Ok(Status::Ok)
        }
        Err(e) => {
            debug!("Evaluation debug: {}", e);
            reporter.runtime_error(&e);
            Ok(Status::RuntimeError)
        }
    }
}

fn run_file(filename: &PathBuf, config: InterpreterConfig) -> Result<Status> {
    let source = read_file(filename)?;
    info!("Provided input:\n {}", source);

    let mut session = Session::stdio(config);
    Ok(session.run(&source))
}

/// Reads lines from stdin and runs each against one session. Errors are
/// reported and the prompt continues.
fn run_prompt(config: InterpreterConfig) -> Result<Status> {
    info!("Starting prompt");

    let mut session = Session::stdio(config);
    let stdin = io::stdin();
    let mut lines = stdin.lock().lines();

    loop {
        print!("> ");
        io::stdout().flush().context("Failed to flush stdout")?;

        let Some(line) = lines.next() else {
            println!();
            break;
        };
        let line = line.context("Failed to read from stdin")?;

        let status = session.run(&line);
        debug!("Prompt line finished with {:?}", status);
    }

    Ok(Status::Ok)
}

fn main() -> Result<()> {
    let args: Cli = Cli::parse();

    // Initialize logger only if --log flag is provided
    if args.log {
        init_logger()?;
    } else {
        // Initialize a minimal logger to avoid "no logger" errors
        env_logger::Builder::new()
            .filter_level(log::LevelFilter::Off)
            .init();
    }

    info!("CLI arguments: {:?}", args);

    let status = match &args.commands {
        Commands::Tokenize { filename, json } => tokenize(filename, *json)?,
        Commands::Parse { filename } => parse(filename)?,
        Commands::Evaluate { filename } => evaluate(filename)?,
        Commands::Run {
            filename,
            max_call_depth,
        } => {
            let config = InterpreterConfig {
                max_call_depth: *max_call_depth,
            };

            match filename {
                Some(filename) => run_file(filename, config)?,
                None => run_prompt(config)?,
            }
        }
    };

    info!("Finished with {:?}", status);

    if status != Status::Ok {
        process::exit(status.exit_code());
    }

    Ok(())
}
