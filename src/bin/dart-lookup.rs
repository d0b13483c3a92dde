//! Interactive dictionary lookup: reads query lines from standard input and
//! prints every stored key that prefixes each line.

use std::error::Error;
use std::io::{self, BufRead};
use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;
use dart_trie::{DoubleArray, PrefixMatch};

/// Query a double-array dictionary built by mkdart.
#[derive(Parser)]
#[command(version, about)]
struct Args {
    /// Dictionary file to open.
    index_file: PathBuf,
}

fn run(args: &Args) -> Result<(), Box<dyn Error>> {
    let da = DoubleArray::load(&args.index_file)?;
    for line in io::stdin().lock().lines() {
        let line = line?;
        let matches: Vec<PrefixMatch> = da.common_prefix_search(line.as_bytes()).collect();
        if matches.is_empty() {
            println!("{line}: not found");
        } else {
            print!("{line}: found, num = {}", matches.len());
            for m in &matches {
                print!(" {}:{}", m.value, m.len);
            }
            println!();
        }
    }
    Ok(())
}

fn main() -> ExitCode {
    let args = Args::parse();
    match run(&args) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("error: {err}");
            ExitCode::FAILURE
        }
    }
}
