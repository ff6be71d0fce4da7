use anyhow::Result;
use calplan_provider_google::Session;
use owo_colors::OwoColorize;

use super::Context;

pub async fn run(ctx: &Context) -> Result<()> {
    let settings = &ctx.settings;

    println!("Authenticating with Google...");

    let session =
        Session::authorize(&settings.client_secrets_path(), &settings.token_cache_path()).await?;

    println!(
        "\n{} token cached at {}",
        "✅ Authorized:".green(),
        session.cache_path().display()
    );
    println!(
        "{}",
        format!("   (access token valid until {})", session.expires_at()).dimmed()
    );
    println!("\nNow run `calplan import-ics` or `calplan plan`.");

    Ok(())
}
