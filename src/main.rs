use std::io::IsTerminal;
use std::process::ExitCode;

use clap::Parser;

use switchbot::{Args, HardwareBackend, OutputFormat, fake_backend, run_with_log_level};

#[tokio::main]
async fn main() -> ExitCode {
    let args = Args::parse();
    let mut stdout = std::io::stdout();

    let run_result = async {
        let log_level = args.log_level();
        let default_output = if stdout.is_terminal() {
            OutputFormat::Pretty
        } else {
            OutputFormat::Json
        };
        let (command, options, maybe_fake_args) = args.into_parts(default_output)?;
        let backend = match maybe_fake_args {
            Some(fake_args) => fake_backend(fake_args),
            None => HardwareBackend::Real,
        };

        run_with_log_level(command, &options, &mut stdout, backend, log_level).await
    }
    .await;

    match run_result {
        Ok(()) => ExitCode::SUCCESS,
        Err(error) => {
            eprintln!("error: {error:#}");
            ExitCode::from(1)
        }
    }
}
