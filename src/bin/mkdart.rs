//! Builds a double-array dictionary file from a sorted key list.

use std::error::Error;
use std::fs::File;
use std::io::{self, BufRead, BufReader};
use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;
use dart_trie::DoubleArray;

/// Build a double-array dictionary from newline-separated keys.
///
/// Keys must be sorted in ascending byte order; duplicates are dropped.
#[derive(Parser)]
#[command(version, about)]
struct Args {
    /// Assign the value 0 to every key instead of its position.
    #[arg(short = 'n', long)]
    no_value: bool,
    /// Key file, one key per line (`-` reads standard input).
    key_file: PathBuf,
    /// Output dictionary file.
    index_file: PathBuf,
}

fn read_keys(args: &Args) -> io::Result<Vec<Vec<u8>>> {
    let reader: Box<dyn BufRead> = if args.key_file.as_os_str() == "-" {
        Box::new(BufReader::new(io::stdin()))
    } else {
        Box::new(BufReader::new(File::open(&args.key_file)?))
    };
    let mut keys = Vec::new();
    for line in reader.lines() {
        let line = line?;
        if !line.is_empty() {
            keys.push(line.into_bytes());
        }
    }
    Ok(keys)
}

fn run(args: &Args) -> Result<(), Box<dyn Error>> {
    let keys = read_keys(args)?;
    let zero_values = args.no_value.then(|| vec![0i32; keys.len()]);
    let values = zero_values.as_deref();

    let mut prev = usize::MAX;
    let da = DoubleArray::build_with(&keys, values, |done, total| {
        let percent = done * 100 / total.max(1);
        if percent != prev {
            prev = percent;
            eprint!("\rbuilding: {percent:3}%");
            if percent == 100 {
                eprintln!();
            }
        }
    })?;

    da.save(&args.index_file)?;
    println!(
        "done: {} keys, {} units, {} bytes",
        keys.len(),
        da.num_units(),
        da.total_size()
    );
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
