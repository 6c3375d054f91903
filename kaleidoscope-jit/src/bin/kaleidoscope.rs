use std::{
    fs::File,
    io::{self, IsTerminal, Read, Write},
    path::PathBuf,
    process::ExitCode,
};

use clap::{Parser, ValueEnum};
use kaleidoscope::{
    lex_error,
    lexer::{LexErr, Lexer},
    location::Location,
    result::Result,
    session::{Outcome, Session},
};
use kaleidoscope_jit::{CraneliftJit, JitConfig};

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
enum Emit {
    /// Print the IR generated for each item
    Ir,
    /// Print the value of each top-level expression
    Result,
}

#[derive(Parser)]
#[command(version, about = "Kaleidoscope JIT compiler", long_about = None)]
struct Cli {
    /// Source file. Reads stdin if absent
    #[arg(value_name = "FILE")]
    input: Option<PathBuf>,

    /// What to print on stdout
    #[arg(long, value_enum, default_value_t = Emit::Result)]
    emit: Emit,

    /// Compile without Cranelift's optimizations
    #[arg(long, default_value_t = false)]
    no_opt: bool,
}

fn run(cli: Cli) -> Result<()> {
    let (reader, interactive): (Box<dyn Read>, bool) = match &cli.input {
        Some(path) => {
            let file = File::open(path)
                .map_err(|e| lex_error!(Location::Unknown, LexErr::Io(e)))?;
            (Box::new(file), false)
        }
        None => (Box::new(io::stdin().lock()), io::stdin().is_terminal()),
    };

    let jit = CraneliftJit::with_config(JitConfig {
        optimize: !cli.no_opt,
        ..JitConfig::default()
    })?;
    let mut session = Session::new(jit);
    let mut lexer = Lexer::new(reader);

    loop {
        if interactive {
            eprint!("ready> ");
            let _ = io::stderr().flush();
        }
        let item = match session.parse_item(&mut lexer) {
            Ok(Some(item)) => item,
            Ok(None) => break,
            Err(err) => {
                eprintln!("Error: {}", err);
                if let Err(err) = lexer.skip_token() {
                    eprintln!("Error: {}", err);
                    break;
                }
                continue;
            }
        };
        match (session.handle_item(item), cli.emit) {
            (Ok(outcome), Emit::Ir) => println!("{}", outcome.ir()),
            (Ok(Outcome::Evaluated { value, .. }), Emit::Result) => {
                println!("Evaluated to {:.6}", value)
            }
            (Ok(_), Emit::Result) => (),
            (Err(err), _) => eprintln!("Error: {}", err),
        }
    }

    if cli.emit == Emit::Ir && !session.module().is_empty() {
        eprint!("{}", session.dump());
    }
    Ok(())
}

pub fn main() -> ExitCode {
    env_logger::init();
    let cli = Cli::parse();
    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {}", e.report());
            ExitCode::FAILURE
        }
    }
}
