//! `hrdesk ask`: One question, answer streamed to stdout.

use std::io::Write;
use std::path::Path;

use hrdesk_chat::TurnOutcome;
use hrdesk_chat::turn::submit_error_message;
use hrdesk_core::History;

pub async fn run(config_path: Option<&Path>, question: &str) -> anyhow::Result<()> {
    let config = super::load_config(config_path)?;
    let runtime = super::bootstrap(config)?;

    let mut history = History::new();
    let mut printed = 0usize;

    let outcome = runtime
        .engine
        .ask(&mut history, question, |answer| {
            print!("{}", &answer[printed..]);
            printed = answer.len();
            let _ = std::io::stdout().flush();
        })
        .await;

    match outcome {
        TurnOutcome::Completed { .. } => println!(),
        TurnOutcome::StreamError { answer, .. } => {
            println!("{}", &answer[printed..]);
            anyhow::bail!("the answer was cut short");
        }
        TurnOutcome::SubmitError(e) => anyhow::bail!(submit_error_message(&e)),
        TurnOutcome::Duplicate | TurnOutcome::Blank => anyhow::bail!("nothing to ask"),
    }

    Ok(())
}
