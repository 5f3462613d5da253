use anyhow::Context;
use compbench::cli::{init_logging, parse_args, run_cli_mode, Error};

fn main() -> anyhow::Result<()> {
    let args = match parse_args(std::env::args()) {
        Ok(args) => args,
        // help, version and usage errors print themselves
        Err(Error::Usage(e)) => e.exit(),
        Err(e) => {
            eprintln!("Error: {}", e);
            std::process::exit(e.exit_code());
        }
    };

    let guard = init_logging(
        args.log_level.as_deref(),
        args.json_logs,
        args.log_file.as_deref(),
    )
    .context("failed to initialise logging")?;

    let code = run_cli_mode(args);
    // flush buffered file logs before exiting
    drop(guard);
    std::process::exit(code);
}
