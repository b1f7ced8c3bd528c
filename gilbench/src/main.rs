fn main() -> anyhow::Result<()> {
    gilbench::run()
}
