use clap::Parser;
use std::{fs, process};

use brisk::repl::Repl;
use brisk::runtime::Runtime;

const VERSION: &str = env!("CARGO_PKG_VERSION");

#[derive(Parser)]
#[command(name = "brisk")]
#[command(about = "A minimal interpreted language with native C interop", long_about = None)]
#[command(disable_version_flag = true)]
struct Cli {
    /// Path to a Brisk source file; starts the REPL when omitted
    file: Option<String>,

    /// Show version information and exit
    #[arg(short = 'v', long = "version")]
    version: bool,
}

fn run_file(path: &str) -> i32 {
    let source = match fs::read_to_string(path) {
        Ok(source) => source,
        Err(error) => {
            eprintln!("Error: Could not open file '{}': {}", path, error);
            return 1;
        }
    };

    let mut runtime = Runtime::new();
    match runtime.run_script(&source) {
        Ok(()) => 0,
        Err(error) => {
            eprintln!("{}", error);
            1
        }
    }
}

fn main() {
    let cli = Cli::parse();

    if cli.version {
        println!("Brisk version {}", VERSION);
        println!("A minimal interpreted language with native C interop");
        return;
    }

    match cli.file {
        Some(file) => process::exit(run_file(&file)),
        None => {
            let mut repl = Repl::new();
            repl.run();
        }
    }
}
