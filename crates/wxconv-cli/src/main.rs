use anyhow::Context;
use clap::Parser;
use wxconv_cli::Cli;

fn main() -> anyhow::Result<()> {
    // Observability
    wxconv_obs::init("wxconv");

    let cli = Cli::parse();
    let cfg = wxconv_config::AppConfig::load().context("failed to load configuration")?;

    let output = wxconv_cli::run(&cli, &cfg)?;
    println!("{output}");
    Ok(())
}
