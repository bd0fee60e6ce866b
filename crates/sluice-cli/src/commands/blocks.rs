//! Block catalog listing command.

#![allow(clippy::print_literal)] // Table headers use literal strings

use clap::Args;
use sluice_config::{BLOCKS, find_block};

#[derive(Args)]
pub struct BlocksArgs {
    /// Show details for a specific block type
    #[arg(value_name = "BLOCK")]
    block: Option<String>,
}

pub fn run(args: BlocksArgs) -> anyhow::Result<()> {
    if let Some(name) = &args.block {
        let info = find_block(name).ok_or_else(|| anyhow::anyhow!("Unknown block: {}", name))?;

        println!("{} ({})", info.name, info.role);
        println!("{}", "=".repeat(info.name.len()));
        println!();
        println!("{}", info.description);
        println!();

        if info.params.is_empty() {
            println!("No parameters.");
            return Ok(());
        }

        println!("Parameters:");
        println!();
        println!("  {:16}  {:14}  {:10}  {}", "Name", "Kind", "Default", "Description");
        println!("  {:16}  {:14}  {:10}  {}", "----", "----", "-------", "-----------");
        for param in info.params {
            let default = if param.required {
                "required"
            } else {
                param.default.unwrap_or("-")
            };
            println!(
                "  {:16}  {:14}  {:10}  {}",
                param.name,
                format!("{:?}", param.kind),
                default,
                param.description
            );
        }
        return Ok(());
    }

    println!("Available blocks:");
    println!();
    println!("  {:16}  {:10}  {}", "Name", "Role", "Description");
    println!("  {:16}  {:10}  {}", "----", "----", "-----------");
    for info in BLOCKS {
        println!(
            "  {:16}  {:10}  {}",
            info.name,
            info.role.to_string(),
            info.description
        );
    }
    println!();
    println!("Use 'sluice blocks <BLOCK>' for parameter details.");
    Ok(())
}
