fn main() -> anyhow::Result<()> {
    pixbridge::cli::run_cli()
}
