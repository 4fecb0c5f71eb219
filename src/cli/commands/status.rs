//! status command - classify and suggest fixes

use anyhow::Result;

use super::{detector, runtime};
use crate::cli::args::DetectArgs;
use crate::cli::Context;
use crate::doctor::Diagnosis;
use crate::ui::output;

pub fn status(ctx: &Context, json: bool, args: &DetectArgs) -> Result<()> {
    let detector = detector(ctx, args)?;
    let state = runtime()?.block_on(detector.detect())?;
    let diagnosis = Diagnosis::new(state)?;

    if json {
        println!("{}", serde_json::to_string_pretty(&diagnosis)?);
        return Ok(());
    }

    let verbosity = ctx.verbosity();
    output::print(output::format_state(&diagnosis.state), verbosity);
    output::print(output::format_fixes(&diagnosis.fixes), verbosity);
    tracing::debug!(fingerprint = %diagnosis.fingerprint, "state fingerprint");
    Ok(())
}
