use anyhow::{Context, Result};
use cadence_core::load_seed;
use std::path::Path;

/// Execute `cadence validate <seed-file>`
pub fn execute(seed_file: &Path) -> Result<()> {
    let seed = load_seed(seed_file).with_context(|| format!("{} is not a valid seed", seed_file.display()))?;
    let bands = seed.ai_ratio_bands();

    println!("{}: ok", seed_file.display());
    println!("  Developers:   {}", seed.developers.len());
    println!("  Repositories: {}", seed.repositories.len());
    println!(
        "  AI-ratio bands: low <{:.2}, medium <{:.2}, high ≤{:.2}",
        bands.low.max, bands.medium.max, bands.high.max
    );
    Ok(())
}
