//! alanc CLI
//!
//! Command-line driver for the ALAN-2022 compiler: parse the arguments,
//! resolve the external assembler from `JASMIN_JAR`, compile, and report
//! fatal diagnostics on stderr with a non-zero exit status.

use alanc::{compile_file, CompileError, CompilerConfig};
use clap::Parser as ClapParser;
use std::env;
use std::path::PathBuf;
use std::process;

#[derive(ClapParser)]
#[command(name = "alanc")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "ALAN-2022 compiler - compile .alan programs to JVM class files", long_about = None)]
struct Cli {
    /// Input .alan source file
    input: PathBuf,

    /// Stop after writing the .jasmin listing (do not run the assembler)
    #[arg(long)]
    listing_only: bool,
}

fn main() {
    let cli = Cli::parse();

    // The assembler must be resolvable before any parsing starts.
    let jasmin_jar = if cli.listing_only {
        None
    } else {
        match env::var_os("JASMIN_JAR") {
            Some(jar) => Some(PathBuf::from(jar)),
            None => {
                eprintln!("alanc: JASMIN_JAR is not set");
                process::exit(1);
            }
        }
    };

    let config = CompilerConfig {
        jasmin_jar,
        listing_only: cli.listing_only,
        output_dir: None,
    };

    match compile_file(&cli.input, &config) {
        Ok(listing_path) => {
            if cli.listing_only {
                println!("Compiled {} -> {}", cli.input.display(), listing_path.display());
            } else {
                println!("Compiled {}", cli.input.display());
            }
        }
        Err(e) => {
            report(&cli.input, &e);
            process::exit(1);
        }
    }
}

/// Print a diagnostic as `alanc: <source>:<line>:<col>: <message>`, leaving
/// the position out for system errors that have none.
fn report(input: &std::path::Path, e: &CompileError) {
    match e.pos {
        Some(pos) => eprintln!("alanc: {}:{}: {}", input.display(), pos, e.message),
        None => eprintln!("alanc: {}", e.message),
    }
}
