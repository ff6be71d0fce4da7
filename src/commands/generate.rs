use anyhow::Result;
use calplan_core::prompt::render_prompt;
use owo_colors::OwoColorize;

use super::{Context, read_input, write_output};
use crate::generator::GeminiClient;
use crate::render::create_spinner;

/// Render the prompt for the configured week, ask the model and save its reply.
pub async fn run(ctx: &Context) -> Result<()> {
    let settings = &ctx.settings;
    let (week_start, week_end) = settings.week()?;

    let template = read_input(&ctx.prompt)?;
    let prompt = render_prompt(&template, &week_start, &week_end, &settings.schedule.work)?;

    let client = GeminiClient::new(settings.api_key(), &settings.model.name)?;
    let json_path = ctx.json_path()?;

    let spinner = create_spinner(format!("Generating plan for {} to {}", week_start, week_end));
    let reply = client.generate(&prompt).await;
    spinner.finish_and_clear();

    write_output(&json_path, &reply?)?;
    println!("{} {}", "✅ JSON generated:".green(), json_path.display());

    Ok(())
}
