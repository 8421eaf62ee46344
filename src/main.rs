fn main() -> anyhow::Result<()> {
    synapse_bg::run()
}
