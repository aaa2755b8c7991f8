//! Run the translation pipeline once for a single case study
//!
//! Usage:
//!   cargo run --bin translate -- --id 1 --language fr
//!
//! Uses the same environment as the server (DATABASE_URL, TRANSLATION_BACKEND,
//! OPENAI_API_KEY, ...). Prints the translated record as JSON. Exits non-zero
//! when the translation could not be written back to the store.

use anyhow::{bail, Context, Result};
use case_study_api::{
    config::Config,
    routes::AppState,
    translation::{translate_case_study, TranslationRequest},
};
use tracing::{info, warn};

struct Args {
    id: String,
    language: String,
}

fn parse_args(args: impl Iterator<Item = String>) -> Result<Args> {
    let mut id = None;
    let mut language = None;

    let mut args = args.peekable();
    while let Some(arg) = args.next() {
        match arg.as_str() {
            "--id" => id = args.next(),
            "--language" => language = args.next(),
            other => bail!("Unknown argument '{}'", other),
        }
    }

    Ok(Args {
        id: id.context("Usage: translate --id <caseStudyId> --language <code>")?,
        language: language.context("Usage: translate --id <caseStudyId> --language <code>")?,
    })
}

#[tokio::main]
async fn main() -> Result<()> {
    let _ = dotenvy::dotenv();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("case_study_api=info".parse()?)
                .add_directive("translate=info".parse()?),
        )
        .init();

    let args = parse_args(std::env::args().skip(1))?;
    let config = Config::from_env()?;
    if config.database_url.is_none() {
        warn!("No DATABASE_URL configured; the in-memory store starts empty");
    }

    let state = AppState::from_config(&config).await?;
    let request = TranslationRequest::parse(Some(&args.id), Some(&args.language))?;

    info!(
        "Translating '{}' of case study {} to {}",
        state.text_attribute, request.case_study_id, request.language
    );

    let outcome = translate_case_study(
        state.case_studies.as_ref(),
        state.translator.as_ref(),
        &state.text_attribute,
        &request,
    )
    .await?;

    println!("{}", serde_json::to_string_pretty(&outcome.to_payload()?)?);

    if let Some(e) = outcome.persist_error {
        return Err(e.context(format!(
            "Translation of case study {} was not cached",
            request.case_study_id
        )));
    }

    info!(
        "✓ Done ({})",
        if outcome.cached { "cache hit" } else { "translated and cached" }
    );
    Ok(())
}
