extern crate weft;

use clap::Parser as CParser;
use log::error;
use weft::{config::VmConfig, do_file, do_string, error::RuntimeException, vm::Vm};

#[derive(CParser, Debug)]
#[command(author, version, about)]
struct Cli {
    /// Source file to run.
    file: Option<std::path::PathBuf>,

    /// Evaluate a source string instead of a file.
    #[arg(short, long)]
    eval: Option<String>,

    /// VM configuration file (TOML).
    #[arg(short, long)]
    config: Option<std::path::PathBuf>,

    /// Log level: off, error, warn, info, debug, trace.
    #[arg(short, long, default_value = "warn")]
    log_level: log::LevelFilter,
}

fn main() {
    let args = Cli::parse();
    simple_logger::init_with_level(args.log_level.to_level().unwrap_or(log::Level::Warn))
        .expect("failed to initialize logger");

    let config = match &args.config {
        Some(path) => VmConfig::from_toml_file(path).unwrap_or_else(|err| {
            error!("{err}");
            std::process::exit(2);
        }),
        None => VmConfig::default(),
    };
    let vm = Vm::new(config);

    let result = match (&args.eval, &args.file) {
        (Some(src), _) => do_string(&vm, src),
        (None, Some(path)) => do_file(&vm, path),
        (None, None) => {
            error!("no input: pass a file or -e <source>");
            std::process::exit(2);
        }
    };

    match result {
        Ok((value, signal)) => {
            if signal.is_normal() {
                std::process::exit(0);
            }
            error!("uncaught exception: {}", RuntimeException::from_object(&vm, &value));
            std::process::exit(1);
        }
        Err(err) => {
            error!("{err}");
            std::process::exit(2);
        }
    }
}
