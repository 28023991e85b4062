use anyhow::Result;
use prebuilt_core::{DirectoryCache, ToolCache};

use crate::GlobalArgs;

/// Print the cached directory for `name`. Returns `false` when nothing matches.
pub fn find(global: &GlobalArgs, name: &str, version: Option<&str>) -> Result<bool> {
    let cache = DirectoryCache::new(global.cache_root()?);
    let spec = version.map(str::trim).filter(|v| !v.is_empty()).unwrap_or("*");

    match cache.find(name, spec)? {
        Some(dir) => {
            println!("{}", dir.display());
            Ok(true)
        }
        None => {
            if !global.quiet {
                eprintln!("{name} ({spec}) is not in the cache");
            }
            Ok(false)
        }
    }
}
