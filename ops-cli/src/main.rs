use clap::Parser;

use ops_cli::Cli;

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let output = ops_cli::run(cli.command)?;
    println!("{}", output);
    Ok(())
}
