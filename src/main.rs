fn main() -> anyhow::Result<()> {
    show_timeline::run()
}
