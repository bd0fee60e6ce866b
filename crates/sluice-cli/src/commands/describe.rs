//! Pipeline inspection command.

#![allow(clippy::print_literal)] // Table headers use literal strings

use anyhow::Context;
use clap::Args;
use sluice_config::PipelineConfig;
use std::path::PathBuf;

#[derive(Args)]
pub struct DescribeArgs {
    /// Pipeline file (TOML)
    #[arg(value_name = "PIPELINE")]
    pipeline: PathBuf,
}

pub fn run(args: DescribeArgs) -> anyhow::Result<()> {
    let pipeline = PipelineConfig::load(&args.pipeline)
        .with_context(|| format!("loading {}", args.pipeline.display()))?;
    let built = pipeline.build()?;
    let exec = &built.executor;

    println!("{}", pipeline.name);
    println!("{}", "=".repeat(pipeline.name.len()));
    if let Some(description) = &pipeline.description {
        println!();
        println!("{description}");
    }
    println!();
    match pipeline.iterations {
        Some(n) => println!("Iterations:  {n}"),
        None => println!("Iterations:  until done"),
    }
    println!("Stall limit: {}", pipeline.stall_limit);
    println!("Min items:   {}", exec.min_items_to_process());

    println!();
    println!("Blocks:");
    println!();
    println!("  {:4}  {:16}  {:10}  {}", "Id", "Type", "Ports", "Params");
    println!("  {:4}  {:16}  {:10}  {}", "--", "----", "-----", "------");
    for ((id, name), config) in built.blocks.iter().zip(&pipeline.blocks) {
        let ports = exec
            .block(*id)
            .map(|block| block.ports())
            .map_or_else(String::new, |p| format!("{} in/{} out", p.inputs.len(), p.outputs.len()));
        let params: Vec<String> = config
            .params
            .iter()
            .map(|(k, v)| format!("{k}={v}"))
            .collect();
        println!("  {:4}  {:16}  {:10}  {}", id.index(), name, ports, params.join(" "));
    }

    println!();
    println!("Buffers:");
    println!();
    println!(
        "  {:10}  {:8}  {:10}  {:11}  {:8}  {}",
        "Buffer", "Writer", "Capacity", "Write limit", "Readers", "Bytes"
    );
    println!(
        "  {:10}  {:8}  {:10}  {:11}  {:8}  {}",
        "------", "------", "--------", "-----------", "-------", "-----"
    );
    for (id, _) in &built.blocks {
        if let Some(buffer) = exec.output_buffer(*id, 0) {
            println!(
                "  {:10}  {:8}  {:10}  {:11}  {:8}  {}",
                buffer.id().to_string(),
                id.to_string(),
                buffer.capacity(),
                buffer.write_limit(),
                buffer.reader_count(),
                buffer.capacity() * buffer.item_size()
            );
        }
    }

    let context = exec.context();
    println!();
    println!(
        "Context '{}': {} buffers, {} readers, {} bytes allocated",
        context.name(),
        context.live_buffers(),
        context.live_readers(),
        context.allocated_bytes()
    );
    Ok(())
}
