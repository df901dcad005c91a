//! `civic ask` and `civic chat`.

use std::io::Write;

use anyhow::Result;
use futures_util::StreamExt;
use tokio::io::{AsyncBufReadExt, BufReader};

use crate::assistant::Assistant;
use crate::config::Config;
use crate::index_store::IndexOutcome;
use crate::progress::ProgressMode;
use crate::session::{Session, Turn};

/// `civic ask "<question>"`: answer once and exit.
pub async fn run_ask(
    config: &Config,
    api_key: Option<&str>,
    question: &str,
    stream: bool,
    show_sources: bool,
    progress: ProgressMode,
) -> Result<()> {
    let reporter = progress.reporter();
    let assistant = Assistant::open(config.clone(), api_key, false, reporter.as_ref()).await?;

    let (_, citations, forms) = respond(&assistant, question, stream).await?;
    if show_sources {
        print_sources(&citations, &forms);
    }
    Ok(())
}

/// `civic chat`: interactive loop over one [`Session`].
///
/// `/sources` reprints the last answer's citations, `/clear` forgets the
/// history, `/quit` (or EOF) exits. A failed question is reported and the
/// loop continues.
pub async fn run_chat(config: &Config, api_key: Option<&str>, progress: ProgressMode) -> Result<()> {
    let reporter = progress.reporter();
    let assistant = Assistant::open(config.clone(), api_key, false, reporter.as_ref()).await?;
    let mut session = Session::new();
    tracing::info!(
        session = %session.id(),
        index = assistant.index_outcome().as_str(),
        stamp = %assistant.stamp(),
        "chat session started"
    );

    eprintln!(
        "{}",
        banner(
            &display_documents(config),
            assistant.index().len(),
            assistant.index_outcome()
        )
    );

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        print!("> ");
        let _ = std::io::stdout().flush();
        let Some(line) = lines.next_line().await? else {
            break;
        };
        let input = line.trim();
        match input {
            "" => continue,
            "/quit" | "/exit" => break,
            "/clear" => {
                session.clear();
                println!("History cleared.");
                continue;
            }
            "/sources" => {
                if session.last_citations().is_empty() {
                    println!("No sources yet.");
                } else {
                    print_sources(session.last_citations(), &[]);
                }
                continue;
            }
            _ => {}
        }

        match respond(&assistant, input, true).await {
            Ok((answer, citations, _)) => session.record(Turn {
                question: input.to_string(),
                answer,
                citations,
            }),
            Err(e) => eprintln!("Error: {:#}", e),
        }
    }

    tracing::info!(
        session = %session.id(),
        questions = session.question_count(),
        "chat session ended"
    );
    Ok(())
}

/// Print an answer to stdout, streaming it if asked. Returns the text and
/// its sources.
async fn respond(
    assistant: &Assistant,
    question: &str,
    stream: bool,
) -> Result<(String, Vec<String>, Vec<String>)> {
    if !stream {
        let answer = assistant.answer(question).await?;
        println!("{}", answer.text);
        return Ok((answer.text, answer.citations, answer.forms));
    }

    let mut streaming = assistant.answer_stream(question).await?;
    let mut text = String::new();
    let mut stdout = std::io::stdout();
    while let Some(fragment) = streaming.stream.next().await {
        let fragment = fragment?;
        let _ = stdout.write_all(fragment.as_bytes());
        let _ = stdout.flush();
        text.push_str(&fragment);
    }
    println!();
    Ok((text, streaming.citations, streaming.forms))
}

fn print_sources(citations: &[String], forms: &[String]) {
    if !citations.is_empty() {
        println!();
        println!("Sources:");
        for c in citations {
            println!("  - {}", c);
        }
    }
    if !forms.is_empty() {
        println!();
        println!("Related forms:");
        for f in forms {
            println!("  - {}", f);
        }
    }
}

fn display_documents(config: &Config) -> String {
    config
        .document
        .sources()
        .into_iter()
        .map(|(_, name)| name)
        .collect::<Vec<_>>()
        .join(", ")
}

fn banner(documents: &str, passages: usize, outcome: IndexOutcome) -> String {
    let source = match outcome {
        IndexOutcome::Loaded => "cached index",
        IndexOutcome::Built => "freshly built index",
    };
    format!(
        "Ask a question about {} ({} passages, {}). /sources, /clear, /quit.",
        documents, passages, source
    )
}
