use anyhow::Result;
use prebuilt_schema::Platform;

/// Print the current platform's release targets, most preferred first.
pub fn targets() -> Result<()> {
    let platform = Platform::current();
    let targets = platform.targets()?;
    for target in targets.iter() {
        println!("{target}");
    }
    Ok(())
}
