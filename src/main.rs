use std::fs::File;
use std::io::{self, BufRead, Write};
use std::path::{Path, PathBuf};
use std::process;

use anyhow::{Context, Result};
use clap::Parser as ClapParser;
use clap::Subcommand;
use env_logger::Builder;
use log::{debug, info};
use memmap2::Mmap;

use sparklecode::ast_printer::AstPrinter;
use sparklecode::error::{Diagnostics, RunError};
use sparklecode::scanner::scan_tokens;
use sparklecode::session::{parse_source, Session};

/// Exit status for lexical, syntax and resolution errors.
const EXIT_STATIC: i32 = 65;

/// Exit status for a runtime error.
const EXIT_RUNTIME: i32 = 70;

#[derive(ClapParser, Debug)]
#[command(version, about = "SparkleCode interpreter", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    commands: Commands,

    /// Enable logging to app.log
    #[arg(long, global = true)]
    log: bool,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Tokenizes a file, printing each token
    Tokenize {
        filename: PathBuf,

        /// Print the tokens as a JSON array
        #[arg(long)]
        json: bool,
    },

    /// Parses a file and prints its syntax tree
    Parse { filename: PathBuf },

    /// Runs a file as a SparkleCode program, or starts the REPL without one
    Run { filename: Option<PathBuf> },

    /// Starts an interactive session
    Repl,
}

/// Maps a source file and validates it as UTF-8.
fn read_file(filename: &Path) -> Result<String> {
    info!("Reading file: {:?}", filename);

    let file = File::open(filename).context(format!("Failed to open file {:?}", filename))?;

    let len = file
        .metadata()
        .context(format!("Failed to stat file {:?}", filename))?
        .len();

    // Mapping a zero-length file fails on some platforms.
    if len == 0 {
        return Ok(String::new());
    }

    // SAFETY: the map is read-only and outlives every borrow of it below.  A
    // concurrent truncation by another process is outside our control.
    let map = unsafe { Mmap::map(&file) }.context(format!("Failed to map file {:?}", filename))?;

    // Validate in place; the only copy is the owned source handed back.
    let text: String = std::str::from_utf8(&map)
        .context(format!("File {:?} is not valid UTF-8", filename))?
        .to_owned();

    info!("Read {} bytes from {:?}", text.len(), filename);

    Ok(text)
}

fn init_logger() -> Result<()> {
    let log_file = File::create("app.log").context("Failed to create app.log")?;

    Builder::new()
        .format(|buf, record| {
            let module = record
                .module_path()
                .unwrap_or("<unnamed>")
                .strip_prefix("sparklecode::")
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
        .parse_default_env()
        .init();

    info!("Logger initialized, writing to app.log");
    Ok(())
}

fn report_static(diagnostics: &Diagnostics) -> ! {
    eprintln!("{}", diagnostics);
    debug!("Static errors, exiting with code {}", EXIT_STATIC);
    process::exit(EXIT_STATIC);
}

fn tokenize(filename: &Path, json: bool) -> Result<()> {
    info!("Running Tokenize subcommand");

    let source = read_file(filename)?;
    let mut diagnostics = Diagnostics::new();
    let tokens = scan_tokens(&source, &mut diagnostics);

    // Tokens go to stdout even when some lines failed to scan.
    if json {
        println!("{}", serde_json::to_string_pretty(&tokens)?);
    } else {
        for token in &tokens {
            println!("{}", token);
        }
    }

    if diagnostics.has_errors() {
        report_static(&diagnostics);
    }

    info!("Tokenization completed successfully");
    Ok(())
}

fn parse(filename: &Path) -> Result<()> {
    info!("Running Parse subcommand");

    let source = read_file(filename)?;

    match parse_source(&source) {
        Ok(statements) => {
            info!("Parsed {} statement(s)", statements.len());

            for stmt in &statements {
                let ast = AstPrinter::print_stmt(stmt);
                debug!("AST: {}", ast);
                println!("{}", ast);
            }
        }
        Err(diagnostics) => report_static(&diagnostics),
    }

    Ok(())
}

fn run_file(filename: &Path) -> Result<()> {
    info!("Running Run subcommand");

    let source = read_file(filename)?;
    let mut session = Session::new();

    match session.run(&source) {
        Ok(()) => {
            info!("Program executed successfully");
            Ok(())
        }
        Err(RunError::Static(diagnostics)) => report_static(&diagnostics),
        Err(RunError::Runtime(e)) => {
            // Anything printed before the failure must reach stdout first.
            io::stdout().flush()?;
            debug!("Runtime debug: {:?}", e);
            eprintln!("{}", e);
            process::exit(EXIT_RUNTIME);
        }
    }
}

fn repl() -> Result<()> {
    info!("Starting REPL");

    let mut session = Session::new();
    let stdin = io::stdin();
    let mut lines = stdin.lock().lines();

    loop {
        print!("> ");
        io::stdout().flush()?;

        let Some(line) = lines.next() else {
            // Ctrl-D: finish the prompt line.
            println!();
            break;
        };
        let line = line.context("Failed to read from stdin")?;

        if let Err(e) = session.run_repl_line(&line) {
            io::stdout().flush()?;
            debug!("REPL line failed: {:?}", e);
            eprintln!("{}", e);
        }
    }

    info!("REPL finished");
    Ok(())
}

fn main() -> Result<()> {
    let args: Cli = Cli::parse();

    if args.log {
        init_logger()?;
    } else {
        env_logger::Builder::new()
            .filter_level(log::LevelFilter::Off)
            .init();
    }

    info!("CLI arguments: {:?}", args);

    match args.commands {
        Commands::Tokenize { filename, json } => tokenize(&filename, json),
        Commands::Parse { filename } => parse(&filename),
        Commands::Run {
            filename: Some(filename),
        } => run_file(&filename),
        Commands::Run { filename: None } | Commands::Repl => repl(),
    }
}
