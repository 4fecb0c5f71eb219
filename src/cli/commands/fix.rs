//! fix command - apply auto-fixable fixes

use anyhow::{bail, Result};

use super::{detector, runtime};
use crate::cli::args::DetectArgs;
use crate::cli::Context;
use crate::doctor::{auto_fix, select_fixes, AutoFixOptions, FixId};
use crate::ui::output;

pub fn fix(
    ctx: &Context,
    fix_id: Option<&str>,
    skip: &[String],
    dry_run: bool,
    stop_on_error: bool,
    args: &DetectArgs,
) -> Result<()> {
    let options = AutoFixOptions {
        fix_id: fix_id.map(str::parse::<FixId>).transpose()?,
        skip_ids: skip
            .iter()
            .map(|s| s.parse::<FixId>())
            .collect::<Result<_, _>>()?,
        stop_on_error,
    };
    let detector = detector(ctx, args)?;
    let verbosity = ctx.verbosity();

    runtime()?.block_on(async {
        let state = detector.detect().await?;

        if dry_run {
            let selected = select_fixes(&state, &options)?;
            if selected.is_empty() {
                output::print("Nothing to apply.", verbosity);
            } else {
                output::print("Would apply:", verbosity);
                for fix in &selected {
                    output::print(format!("  {}: {}", fix.id, fix.description), verbosity);
                }
            }
            return Ok(());
        }

        let report = auto_fix(&detector, &state, &options).await?;
        output::print(output::format_report(&report), verbosity);
        if !report.errors.is_empty() {
            bail!("{} fix(es) failed", report.errors.len());
        }
        if !report.converged {
            output::warn(
                "some applied fixes are still suggested; run 'trisync status'",
                verbosity,
            );
        }
        Ok(())
    })
}
