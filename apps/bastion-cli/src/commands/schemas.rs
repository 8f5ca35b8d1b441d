// schemas.rs — Schema subcommands: export.

use std::path::PathBuf;

use clap::Subcommand;

use bastion_artifacts::export_schemas;

#[derive(Subcommand)]
pub enum SchemaCommands {
    /// Write JSON Schemas for phase outputs, the index, manifest and status.
    Export {
        /// Directory to write `<Name>.json` files into.
        #[arg(long, default_value = "schemas")]
        out: PathBuf,
    },
}

pub fn execute(cmd: &SchemaCommands) -> anyhow::Result<()> {
    match cmd {
        SchemaCommands::Export { out } => {
            for path in export_schemas(out)? {
                println!("{}", path.display());
            }
        }
    }
    Ok(())
}
