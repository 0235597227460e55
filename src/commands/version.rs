use anyhow::Result;

pub fn execute() -> Result<()> {
    println!("hostfacts version {}", env!("CARGO_PKG_VERSION"));
    Ok(())
}
