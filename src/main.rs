use clap::Parser;
use gold_dashboard_lib::CliArgs;

fn main() -> anyhow::Result<()> {
    gold_dashboard_lib::run(CliArgs::parse())
}
