use anyhow::Result;

fn main() -> Result<()> {
    arena_kiosk::cli::run()
}
