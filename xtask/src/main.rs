use std::process::Command;

use anyhow::Result;
use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(name = "xtask", about = "Workspace gates for the entity renderer")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run every gate in order: fmt, clippy, test, doc
    Check,
    /// Fail on any rustfmt diff
    Fmt,
    /// Clippy over all targets with warnings denied
    Clippy,
    /// Run the workspace tests
    Test {
        /// Only run tests whose name contains this filter
        filter: Option<String>,
    },
    /// Build rustdoc without dependencies
    Doc,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Check => {
            fmt()?;
            clippy()?;
            test(None)?;
            doc()?;
        }
        Commands::Fmt => fmt()?,
        Commands::Clippy => clippy()?,
        Commands::Test { filter } => test(filter.as_deref())?,
        Commands::Doc => doc()?,
    }

    Ok(())
}

/// Runs `cargo <args>` and fails with `gate` in the message on a non-zero exit.
fn cargo(gate: &str, args: &[&str]) -> Result<()> {
    println!("==> {gate}: cargo {}", args.join(" "));
    let status = Command::new("cargo").args(args).status()?;
    if !status.success() {
        anyhow::bail!("{gate} failed ({status})");
    }
    Ok(())
}

fn fmt() -> Result<()> {
    cargo("fmt", &["fmt", "--all", "--", "--check"])
}

fn clippy() -> Result<()> {
    let args = ["clippy", "--workspace", "--all-targets", "--", "-D", "warnings"];
    cargo("clippy", &args)
}

fn test(filter: Option<&str>) -> Result<()> {
    let mut args = vec!["test", "--workspace"];
    args.extend(filter);
    cargo("test", &args)
}

fn doc() -> Result<()> {
    cargo("doc", &["doc", "--workspace", "--no-deps"])
}
