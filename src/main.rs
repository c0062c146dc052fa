use clap::Parser;
use s3_backup::cli::{self, Cli, EXIT_ERROR, EXIT_INTERRUPTED};

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();

    let cli = Cli::parse();

    let code = tokio::select! {
        result = cli::run(cli) => match result {
            Ok(code) => code,
            Err(e) => {
                eprintln!("Error: {e:#}");
                EXIT_ERROR
            }
        },
        _ = tokio::signal::ctrl_c() => {
            eprintln!("Interrupted.");
            EXIT_INTERRUPTED
        }
    };

    std::process::exit(code);
}
