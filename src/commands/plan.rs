use anyhow::Result;

use super::{Context, convert, generate, import};

/// generate-json, then json-to-ics, then import-ics.
pub async fn run(ctx: &Context, continue_on_error: bool) -> Result<()> {
    generate::run(ctx).await?;
    convert::run(ctx)?;
    import::run(ctx, continue_on_error).await
}
