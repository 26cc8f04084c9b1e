//! Terminal interaction: picking a knowledge base and the interactive query loop.

use std::io::{self, BufRead, Write};

use kb_ingest_core::contract::{AnswerGenerator, Chooser, KnowledgeBase};
use kb_ingest_core::error::InputError;
use kb_ingest_core::query::{query_knowledge_base, render_answer, QuerySettings};
use kb_ingest_core::select::render_knowledge_bases;

/// Typed at the query prompt to leave the loop.
pub const QUIT: &str = "quit";

/// [`Chooser`] reading the selection from stdin.
#[derive(Debug, Default, Clone, Copy)]
pub struct ConsoleChooser;

impl Chooser for ConsoleChooser {
    fn choose(&self, knowledge_bases: &[KnowledgeBase]) -> Result<usize, InputError> {
        let mut stdout = io::stdout().lock();
        let _ = write!(
            stdout,
            "\nAvailable Knowledge Bases:\n{}\nSelect a knowledge base (enter number): ",
            render_knowledge_bases(knowledge_bases)
        );
        let _ = stdout.flush();

        let mut line = String::new();
        match io::stdin().lock().read_line(&mut line) {
            Ok(0) => Err(InputError::NoInput),
            Ok(_) => parse_selection(&line),
            Err(e) => {
                tracing::error!(error = ?e, "Failed to read selection from stdin");
                Err(InputError::NoInput)
            }
        }
    }
}

pub fn parse_selection(line: &str) -> Result<usize, InputError> {
    let trimmed = line.trim();
    if trimmed.is_empty() {
        return Err(InputError::NoInput);
    }
    trimmed
        .parse::<usize>()
        .map_err(|_| InputError::NotANumber(trimmed.to_string()))
}

/// Reads queries from `input` until `quit` or end of input, answering each
/// against `knowledge_base_id`. Returns how many queries were sent.
pub async fn interactive_queries<R, W, G>(
    mut input: R,
    output: &mut W,
    generator: &G,
    settings: &QuerySettings,
    knowledge_base_id: &str,
) -> io::Result<usize>
where
    R: BufRead,
    W: Write,
    G: AnswerGenerator + ?Sized,
{
    let mut asked = 0;
    loop {
        write!(output, "\nEnter your query (or '{QUIT}' to exit): ")?;
        output.flush()?;

        let mut line = String::new();
        if input.read_line(&mut line)? == 0 {
            tracing::info!("End of input, leaving query loop");
            break;
        }
        let query = line.trim();
        if query.eq_ignore_ascii_case(QUIT) {
            break;
        }
        if query.is_empty() {
            continue;
        }

        asked += 1;
        match query_knowledge_base(generator, settings, knowledge_base_id, query).await {
            Some(answer) => write!(output, "\n{}", render_answer(&answer))?,
            None => writeln!(output, "\nNo answer could be generated for this query.")?,
        }
    }
    Ok(asked)
}
