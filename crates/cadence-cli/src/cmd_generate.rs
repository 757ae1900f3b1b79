use crate::RunArgs;
use anyhow::{Context, Result};
use cadence_gen::Simulation;
use cadence_store::MemoryStore;
use serde::Serialize;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;
use tokio_util::sync::CancellationToken;

/// Execute `cadence generate`
pub fn execute(run: &RunArgs, out: &Path, cancel: &CancellationToken) -> Result<()> {
    let (seed, config) = run.prepare()?;
    let store = MemoryStore::new(seed.clone());
    let sim = Simulation::new(&seed, config);

    let summary = sim.run(&store, cancel).context("simulation run")?;
    let rows = sim.dataset(&store, cancel).context("research dataset")?;

    std::fs::create_dir_all(out).with_context(|| format!("creating {}", out.display()))?;
    write_file(&out.join("commits.jsonl"), &store.all_commits()?)?;
    write_file(&out.join("pull_requests.jsonl"), &store.all_pull_requests()?)?;
    write_file(&out.join("review_comments.jsonl"), &store.all_review_comments()?)?;
    write_file(&out.join("research.jsonl"), &rows)?;

    println!("Generated history (rng seed {})", summary.rng_seed);
    println!("  Commits:         {}", summary.commits);
    println!("  Pull requests:   {}", summary.pull_requests);
    println!("  Review comments: {}", summary.review_comments);
    println!("  Reverted:        {}/{}", summary.reverted, summary.quality_processed);
    println!("  Research rows:   {}", rows.len());
    println!("Wrote {}", out.display());
    Ok(())
}

fn write_file<T: Serialize>(path: &Path, items: &[T]) -> Result<()> {
    let file = File::create(path).with_context(|| format!("creating {}", path.display()))?;
    let mut w = BufWriter::new(file);
    write_jsonl(&mut w, items)?;
    w.flush()?;
    Ok(())
}

/// One JSON object per line.
pub(crate) fn write_jsonl<W: Write, T: Serialize>(w: &mut W, items: &[T]) -> Result<()> {
    for item in items {
        writeln!(w, "{}", serde_json::to_string(item)?)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    const SEED: &str = r#"
developers:
  - { user_id: u1, email: a@x.io, team: core }
  - { user_id: u2, email: b@x.io, team: core }
repositories:
  - { repo_name: acme/core, teams: [core] }
"#;

    fn run_args(dir: &Path) -> RunArgs {
        let seed_file = dir.join("seed.yaml");
        std::fs::write(&seed_file, SEED).unwrap();
        RunArgs {
            seed_file,
            days: 14,
            velocity: "high".into(),
            rng_seed: Some(42),
            max_commits: 0,
            now: Some("2026-05-01T00:00:00Z".into()),
        }
    }

    fn line_count(path: PathBuf) -> usize {
        std::fs::read_to_string(path).unwrap().lines().count()
    }

    #[test]
    fn writes_all_exports() {
        let dir = tempfile::tempdir().unwrap();
        let out = dir.path().join("out");
        execute(&run_args(dir.path()), &out, &CancellationToken::new()).unwrap();

        let commits = line_count(out.join("commits.jsonl"));
        assert!(commits > 0);
        assert!(line_count(out.join("pull_requests.jsonl")) > 0);
        assert!(line_count(out.join("review_comments.jsonl")) > 0);
        assert_eq!(line_count(out.join("research.jsonl")), commits);

        let first = std::fs::read_to_string(out.join("research.jsonl")).unwrap();
        let row: serde_json::Value = serde_json::from_str(first.lines().next().unwrap()).unwrap();
        assert!(row["commit_hash"].is_string());
        assert_eq!(row["repo_name"], "acme/core");
    }

    #[test]
    fn jsonl_has_one_object_per_line() {
        let mut buf = Vec::new();
        write_jsonl(&mut buf, &[1, 2, 3]).unwrap();
        assert_eq!(String::from_utf8(buf).unwrap(), "1\n2\n3\n");
    }
}
