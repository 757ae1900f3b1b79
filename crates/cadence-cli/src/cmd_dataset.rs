use crate::cmd_generate::write_jsonl;
use crate::RunArgs;
use anyhow::{Context, Result};
use cadence_gen::Simulation;
use cadence_store::MemoryStore;
use std::io::{BufWriter, Write};
use tokio_util::sync::CancellationToken;
use tracing::info;

/// Execute `cadence dataset`
pub fn execute(run: &RunArgs, cancel: &CancellationToken) -> Result<()> {
    let (seed, config) = run.prepare()?;
    let store = MemoryStore::new(seed.clone());
    let sim = Simulation::new(&seed, config);

    let summary = sim.run(&store, cancel).context("simulation run")?;
    let rows = sim.dataset(&store, cancel).context("research dataset")?;
    info!(rng_seed = summary.rng_seed, rows = rows.len(), "dataset ready");

    let stdout = std::io::stdout();
    let mut w = BufWriter::new(stdout.lock());
    write_jsonl(&mut w, &rows)?;
    w.flush()?;
    Ok(())
}
