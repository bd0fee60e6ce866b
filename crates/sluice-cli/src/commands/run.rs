//! Pipeline execution command.

#![allow(clippy::print_literal)] // Table headers use literal strings

use anyhow::Context;
use clap::Args;
use indicatif::{ProgressBar, ProgressStyle};
use sluice_config::PipelineConfig;
use sluice_core::{BlockId, ExecutionState, ExecutorStats, GraphExecutor};
use std::collections::BTreeMap;
use std::path::PathBuf;

#[derive(Args)]
pub struct RunArgs {
    /// Pipeline file (TOML)
    #[arg(value_name = "PIPELINE")]
    pipeline: PathBuf,

    /// Stop after this many iterations (overrides the file)
    #[arg(short = 'n', long)]
    iterations: Option<u64>,

    /// Idle iterations before giving up (overrides the file)
    #[arg(long)]
    stall_limit: Option<u32>,

    /// Executor floor on items per work call (overrides the file)
    #[arg(long)]
    min_items: Option<usize>,

    /// Print every tag collected by vector sinks
    #[arg(long)]
    tags: bool,

    /// Hide the progress bar
    #[arg(short, long)]
    quiet: bool,
}

/// Why [`drive`] returned.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopReason {
    /// Every block reported done.
    AllDone,
    /// Progress stopped after at least one block finished.
    Drained,
    /// Progress stopped with no block finished.
    Stalled,
    /// The iteration bound was reached.
    IterationLimit,
}

/// Result of driving an executor.
#[derive(Debug)]
pub struct RunOutcome {
    /// Iterations executed.
    pub iterations: u64,
    /// Why the loop ended.
    pub reason: StopReason,
    /// Block states from the final iteration.
    pub states: BTreeMap<BlockId, ExecutionState>,
}

/// Calls `run_one_iteration` until every block is done, the iteration bound
/// is reached, or `stall_limit` consecutive iterations move no items.
pub fn drive(
    executor: &mut GraphExecutor,
    limit: Option<u64>,
    stall_limit: u32,
    mut on_iteration: impl FnMut(u64, &ExecutorStats),
) -> RunOutcome {
    let stall_limit = stall_limit.max(1);
    let mut idle = 0;
    let mut iterations = 0;
    let mut last = executor.stats();
    let mut states = BTreeMap::new();

    let reason = loop {
        if limit.is_some_and(|n| iterations >= n) {
            break StopReason::IterationLimit;
        }

        states = executor.run_one_iteration();
        iterations += 1;
        let stats = executor.stats();
        on_iteration(iterations, &stats);

        if states
            .values()
            .all(|s| matches!(s, ExecutionState::Done | ExecutionState::MsgOnly))
        {
            break StopReason::AllDone;
        }

        let moved = stats.items_produced != last.items_produced
            || stats.items_consumed != last.items_consumed;
        last = stats;
        if moved {
            idle = 0;
            continue;
        }
        idle += 1;
        if idle >= stall_limit {
            let any_done = states.values().any(|s| *s == ExecutionState::Done);
            break if any_done {
                StopReason::Drained
            } else {
                StopReason::Stalled
            };
        }
    };

    tracing::debug!(iterations, ?reason, "run_stopped");
    RunOutcome {
        iterations,
        reason,
        states,
    }
}

pub fn run(args: RunArgs) -> anyhow::Result<()> {
    let mut pipeline = PipelineConfig::load(&args.pipeline)
        .with_context(|| format!("loading {}", args.pipeline.display()))?;
    if let Some(n) = args.min_items {
        pipeline.min_items_to_process = Some(n);
    }

    let mut built = pipeline.build()?;
    let limit = args.iterations.or(built.iterations);
    let stall_limit = args.stall_limit.unwrap_or(built.stall_limit);
    tracing::info!(
        pipeline = %pipeline.name,
        blocks = built.blocks.len(),
        ?limit,
        stall_limit,
        "starting"
    );

    let pb = if args.quiet {
        ProgressBar::hidden()
    } else if let Some(n) = limit {
        let pb = ProgressBar::new(n);
        pb.set_style(
            ProgressStyle::default_bar()
                .template("[{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} {msg}")?
                .progress_chars("##-"),
        );
        pb
    } else {
        let pb = ProgressBar::new_spinner();
        pb.set_style(
            ProgressStyle::default_spinner().template("{spinner} {pos} iterations {msg}")?,
        );
        pb
    };

    let outcome = drive(&mut built.executor, limit, stall_limit, |i, stats| {
        pb.set_position(i);
        pb.set_message(format!("{} items", stats.items_produced));
    });
    pb.finish_and_clear();

    let stats = built.executor.stats();
    println!(
        "{}: {} iterations, {:?}",
        pipeline.name, outcome.iterations, outcome.reason
    );
    println!(
        "  {} work calls, {} items produced, {} items consumed",
        stats.work_calls, stats.items_produced, stats.items_consumed
    );

    println!();
    println!("  {:4}  {:16}  {}", "Id", "Block", "State");
    for (id, name) in &built.blocks {
        let state = outcome
            .states
            .get(id)
            .map_or_else(|| "-".to_string(), ToString::to_string);
        println!("  {:4}  {:16}  {}", id.index(), name, state);
    }

    for (id, sink) in &built.sinks {
        let tags = sink.tags();
        println!();
        println!("Sink {}: {} items, {} tags", id, sink.len(), tags.len());
        if args.tags {
            for tag in &tags {
                println!("  {tag}");
            }
        }
    }

    if outcome.reason == StopReason::Stalled {
        anyhow::bail!(
            "pipeline stalled after {} iterations with no block finished",
            outcome.iterations
        );
    }
    Ok(())
}
