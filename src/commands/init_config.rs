use anyhow::{Result, bail};
use tracing::info;

use crate::cli::InitConfigArgs;
use crate::config::write_template;

pub fn run(args: InitConfigArgs) -> Result<()> {
    if args.path.exists() && !args.force {
        bail!(
            "{} already exists; pass --force to overwrite it",
            args.path.display()
        );
    }

    write_template(&args.path)?;
    info!(path = %args.path.display(), "wrote default configuration");

    Ok(())
}
