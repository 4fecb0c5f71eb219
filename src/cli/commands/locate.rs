//! locate command - find where a blob lives in history

use anyhow::{Context as _, Result};

use super::{load_config, probe_timeouts, runtime};
use crate::cli::Context;
use crate::core::types::Oid;
use crate::git::GitProbe;
use crate::ui::output;

pub fn locate(ctx: &Context, sha: &str, json: bool) -> Result<()> {
    let oid = Oid::new(sha).with_context(|| format!("'{sha}' is not a full object id"))?;
    let config = load_config(ctx)?;
    let probe = GitProbe::new(ctx.repo_path()?, probe_timeouts(&config.timeouts()));

    let location = runtime()?.block_on(probe.locate_blob(&oid))?;

    if json {
        println!("{}", serde_json::to_string_pretty(&location)?);
    } else {
        output::print(output::format_blob_location(&location), ctx.verbosity());
    }
    Ok(())
}
