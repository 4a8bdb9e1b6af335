//! Experiment Tracking Example
//!
//! Runs a fake training loop against the process trial, mirrors it to a
//! second directory, then reads everything back through `Project`.
//!
//! Run with: cargo run --example experiment_tracking

use std::time::Duration;

use anyhow::Context;
use serde::{Deserialize, Serialize};
use track_ml::{Fields, ParamMap, Project, TrialConfig};

#[derive(Debug, Serialize, Deserialize)]
struct Checkpoint {
    epoch: u64,
    weights: Vec<f64>,
}

fn main() -> anyhow::Result<()> {
    println!("=== track-ml Experiment Tracking ===\n");

    let root = std::env::temp_dir().join("track-ml-demo");
    let log_dir = root.join("runs");
    let upload_dir = root.join("mirror");

    // -------------------------------------------------------------------------
    // 1. Start the process trial
    // -------------------------------------------------------------------------
    println!("1. Starting trial...");

    let params = ParamMap::new()
        .with("model", "mlp")
        .with("learning_rate", 0.001)
        .with("epochs", 10);

    track_ml::init(
        TrialConfig::builder()
            .log_dir(&log_dir)
            .upload_dir(&upload_dir)
            .sync_period(Duration::from_millis(200))
            .trial_prefix("mlp-")
            .param_map(params)
            .reporter(|iteration: u64, fields: &Fields| -> anyhow::Result<()> {
                println!("   [reporter] iteration {iteration}: {} field(s)", fields.len());
                Ok(())
            })
            .build(),
    )
    .context("init trial")?;

    let trial_id = track_ml::trial_id()?;
    println!("   Trial ID: {trial_id}");
    println!("   Directory: {}", track_ml::trial_dir()?.display());

    // -------------------------------------------------------------------------
    // 2. Training loop with metrics and checkpoints
    // -------------------------------------------------------------------------
    println!("\n2. Simulating training (10 epochs)...");

    let mut weights = vec![0.0_f64; 4];
    for epoch in 0..10_u64 {
        let loss = 2.5 / (epoch as f64 + 1.0) + 0.1;
        let accuracy = 0.5 + 0.05 * epoch as f64;
        track_ml::metric(Some(epoch), [("loss", loss), ("accuracy", accuracy)])?;

        for w in &mut weights {
            *w += 0.01;
        }
        if epoch % 5 == 4 {
            let path = track_ml::save(&Checkpoint { epoch, weights: weights.clone() }, "checkpoint", Some(epoch))?;
            println!("   Saved {}", path.display());
        }
    }

    let restored: Checkpoint = track_ml::load("checkpoint", None)?;
    println!("   Latest checkpoint is epoch {}", restored.epoch);

    // -------------------------------------------------------------------------
    // 3. Shutdown (final sync)
    // -------------------------------------------------------------------------
    println!("\n3. Shutting down...");
    track_ml::shutdown().context("final sync")?;
    println!("   Mirrored to {}", upload_dir.join(&trial_id).display());

    // -------------------------------------------------------------------------
    // 4. Read back through Project
    // -------------------------------------------------------------------------
    println!("\n4. Querying project...");
    let project = Project::open(&log_dir)?;
    let metrics = project.metrics(&trial_id)?;
    println!("   Trials under log dir: {}", project.trial_ids()?.len());
    println!(
        "   Loss: {:.4} → {:.4}",
        metrics.first().and_then(|m| m.scalar("loss")).unwrap_or_default(),
        metrics.last().and_then(|m| m.scalar("loss")).unwrap_or_default()
    );
    for artifact in project.artifacts(&trial_id)? {
        println!(
            "   Artifact {} v{} ({} bytes, sha256 {}…)",
            artifact.obj_name(),
            artifact.version(),
            artifact.size_bytes(),
            &artifact.sha256()[..12]
        );
    }

    println!("\n=== Experiment Tracking Complete ===");
    Ok(())
}
