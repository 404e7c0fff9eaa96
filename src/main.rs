//! Codesheet - evaluate code-cell spreadsheets from the command line

mod config;

use anyhow::{Context, Result, anyhow, bail};
use codesheet_core::{CellIndex, CodeArray, Dynamic, EvalError, Key, Settings, format_dynamic};
use std::env;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

fn print_usage() {
    eprintln!("Usage: codesheet [OPTIONS] [FILE]");
    eprintln!();
    eprintln!("Arguments:");
    eprintln!("  [FILE]                    Sheet file to load");
    eprintln!();
    eprintln!("Options:");
    eprintln!("  -c, --command <CODE>      Evaluate CODE as cell (0, 0, 0) and print the result");
    eprintln!("  --cell <ROW,COL[,TABLE]>  Print the value of a cell (can be repeated)");
    eprintln!("  -m, --macros              Run the sheet's macros first");
    eprintln!("  --safe                    Load FILE without evaluating its code");
    eprintln!("  --timeout <SECS>          Evaluation timeout in seconds");
    eprintln!("  --config <FILE>           Read settings from FILE");
    eprintln!("  --no-config               Ignore the config file in the config dir");
    eprintln!("  -o, --output <FILE>       Save the sheet to FILE afterwards");
    eprintln!("  -h, --help                Print help");
}

#[derive(Debug, Default)]
struct Options {
    file: Option<PathBuf>,
    command: Option<String>,
    cells: Vec<Key>,
    run_macros: bool,
    safe: bool,
    timeout: Option<f64>,
    config: Option<PathBuf>,
    no_config: bool,
    output: Option<PathBuf>,
}

fn parse_key(text: &str) -> Option<Key> {
    let parts: Vec<usize> = text
        .split(',')
        .map(|p| p.trim().parse().ok())
        .collect::<Option<_>>()?;
    match parts.as_slice() {
        [row, col] => Some(Key::new(*row, *col, 0)),
        [row, col, table] => Some(Key::new(*row, *col, *table)),
        _ => None,
    }
}

/// Parsed options, or `None` when help was requested.
fn parse_args(args: &[String]) -> Result<Option<Options>> {
    let mut options = Options::default();
    let mut i = 0;
    let value = |i: &mut usize, flag: &str| -> Result<String> {
        *i += 1;
        args.get(*i)
            .cloned()
            .ok_or_else(|| anyhow!("{} requires a value", flag))
    };

    while i < args.len() {
        match args[i].as_str() {
            "-h" | "--help" => return Ok(None),
            "-c" | "--command" => options.command = Some(value(&mut i, "--command")?),
            "--cell" => {
                let text = value(&mut i, "--cell")?;
                let key = parse_key(&text).ok_or_else(|| anyhow!("invalid cell {:?}", text))?;
                options.cells.push(key);
            }
            "-m" | "--macros" => options.run_macros = true,
            "--safe" => options.safe = true,
            "--timeout" => {
                let text = value(&mut i, "--timeout")?;
                let secs: f64 = text
                    .parse()
                    .with_context(|| format!("invalid timeout {:?}", text))?;
                options.timeout = Some(secs);
            }
            "--config" => options.config = Some(PathBuf::from(value(&mut i, "--config")?)),
            "--no-config" => options.no_config = true,
            "-o" | "--output" => options.output = Some(PathBuf::from(value(&mut i, "--output")?)),
            arg if arg.starts_with('-') => bail!("unknown option: {}", arg),
            arg => {
                if options.file.is_some() {
                    bail!("unexpected argument: {}", arg);
                }
                options.file = Some(PathBuf::from(arg));
            }
        }
        i += 1;
    }
    Ok(Some(options))
}

/// Print `value`; returns true if it is an evaluation failure.
fn print_value(value: &Dynamic) -> bool {
    if let Some(err) = value.clone().try_cast::<EvalError>() {
        println!("#ERR {}", err);
        return true;
    }
    if value.is_array() {
        for item in value.clone().into_array().unwrap_or_default() {
            println!("{}", format_dynamic(&item));
        }
        return false;
    }
    println!("{}", format_dynamic(value));
    false
}

fn run(options: Options) -> Result<i32> {
    let mut settings = if options.no_config {
        Settings::default()
    } else {
        config::load_settings(options.config.as_deref())?
    };
    if let Some(timeout) = options.timeout {
        settings.timeout = timeout;
    }

    let mut sheet = CodeArray::with_settings(settings.grid_shape(), settings);
    if let Some(path) = &options.file {
        sheet
            .load_file(path, options.safe)
            .with_context(|| format!("loading {}", path.display()))?;
    }

    let mut failed = false;
    if options.run_macros {
        let (out, err) = sheet.execute_macros();
        print!("{}", out);
        eprint!("{}", err);
    }

    if let Some(code) = &options.command {
        let code = code.strip_prefix('=').unwrap_or(code);
        failed |= print_value(&sheet.eval_code(Key::new(0, 0, 0), code));
    }

    for key in &options.cells {
        let value = sheet.get(&CellIndex::from(*key))?;
        failed |= print_value(&value);
    }

    if options.command.is_none() && options.cells.is_empty() && !options.run_macros {
        for key in sheet.with_data(|d| d.keys()) {
            let value = sheet.value(key);
            failed |= value.is::<EvalError>();
            println!(
                "{}\t{}\t{}\t{}",
                key.row,
                key.col,
                key.table,
                format_dynamic(&value)
            );
        }
    }

    if let Some(path) = &options.output {
        sheet
            .save_file(path)
            .with_context(|| format!("saving {}", path.display()))?;
        eprintln!("Saved to {}", path.display());
    }

    Ok(if failed { 1 } else { 0 })
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let args: Vec<String> = env::args().skip(1).collect();
    let options = match parse_args(&args) {
        Ok(Some(options)) => options,
        Ok(None) => {
            print_usage();
            return;
        }
        Err(e) => {
            eprintln!("Error: {}", e);
            print_usage();
            std::process::exit(1);
        }
    };

    match run(options) {
        Ok(code) => std::process::exit(code),
        Err(e) => {
            eprintln!("Error: {:#}", e);
            std::process::exit(1);
        }
    }
}
