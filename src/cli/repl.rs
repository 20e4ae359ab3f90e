use std::future::Future;
use std::io::{self, Write};
use std::sync::Arc;
use std::time::Duration;

use tokio::io::{AsyncBufRead, AsyncBufReadExt, BufReader, Lines};
use tokio::sync::oneshot;

use crate::cli::commands::ChatArgs;
use crate::cli::CliError;
use crate::client::prefs::PreferenceStore;
use crate::client::session::{ChatSession, SamplingDefaults, SendOptions, StreamUpdate};
use crate::client::transport::HttpRelay;
use crate::client::{ClientError, Role};
use crate::config::AppConfig;
use crate::render::runner::{self, RunnerConfig};
use crate::render::{self, Segment};
use crate::voice::{AudioFileCapture, Dictation, DictationSink, RelayTranscriber};

const HELP: &str = "\
Commands:
  /help              show this help
  /exit, /quit       leave the chat (Ctrl-C at the prompt also exits)
  /clear             start a new conversation
  /history           list sent messages (most recent first)
  /recall N          resend history entry N
  /expand N          show message N in full
  /run N             run code block N of the last reply
  /model NAME        switch and store the model
  /key KEY           store a new API key
  /dictate PATH      transcribe a webm or wav recording and send it (Ctrl-C dismisses)";

fn flush() {
    let _ = io::stdout().flush();
}

fn sender_prefix(role: Role) -> String {
    let attrs = role.display();
    format!("\x1b[{}m{} {}\x1b[0m", attrs.accent, attrs.avatar, attrs.label)
}

fn print_update(update: StreamUpdate<'_>) {
    match update {
        StreamUpdate::UserMessage(message) => {
            let rendered = render::render_message(message, false);
            if rendered.truncated {
                println!("{}", render::to_terminal(&rendered));
            }
        }
        StreamUpdate::Started(message) => {
            print!("\n{}> ", sender_prefix(message.role));
            flush();
        }
        StreamUpdate::Metadata(message) => {
            print!("\x1b[2m[{}]\x1b[0m ", message.model);
            flush();
        }
        StreamUpdate::Delta { delta, .. } => {
            print!("{}", delta);
            flush();
        }
        StreamUpdate::Finished(message) => {
            println!();
            let code: Vec<Segment> = render::render_message(message, false)
                .segments
                .into_iter()
                .filter(Segment::is_code)
                .collect();
            if !code.is_empty() {
                let rendered = render::RenderedMessage {
                    segments: code,
                    truncated: false,
                    hidden_lines: 0,
                };
                println!("{}", render::to_terminal(&rendered));
            }
        }
    }
}

struct TerminalSink;

impl DictationSink for TerminalSink {
    fn on_transcript(&mut self, partial: &str) {
        print!("\r\x1b[2K🎤 {}", partial);
        flush();
    }

    fn on_level(&mut self, level: f32) {
        let bars = (level * 10.0).round() as usize;
        print!("\r\x1b[2K🎤 {}", "▮".repeat(bars));
        flush();
    }
}

/// What the prompt produced.
#[derive(Debug, PartialEq, Eq)]
enum Input {
    Line(String),
    Eof,
    Interrupted,
}

/// Reads one prompt line unless `interrupt` fires first.
async fn next_input<R, I>(lines: &mut Lines<R>, interrupt: I) -> io::Result<Input>
where
    R: AsyncBufRead + Unpin,
    I: Future<Output = ()>,
{
    tokio::select! {
        line = lines.next_line() => Ok(match line? {
            Some(line) => Input::Line(line),
            None => Input::Eof,
        }),
        _ = interrupt => Ok(Input::Interrupted),
    }
}

/// Resolves on Ctrl-C. Registering a listener replaces the default SIGINT exit.
async fn ctrl_c() {
    if tokio::signal::ctrl_c().await.is_err() {
        std::future::pending::<()>().await;
    }
}

async fn send_and_print(session: &mut ChatSession, text: &str, options: &SendOptions) {
    match session.send(text, options, print_update).await {
        Ok(_) => {}
        Err(ClientError::MissingApiKey) => {
            eprintln!("No API key set. Enter one with /key <KEY> (or `prattle config set-key`).");
        }
        Err(e) => eprintln!("Error: {}", e),
    }
}

async fn run_block(session: &ChatSession, index: usize, timeout: Duration) {
    let Some(reply) = session
        .conversation()
        .iter()
        .filter(|m| m.role == Role::Assistant)
        .last()
    else {
        println!("No reply to run code from.");
        return;
    };
    let blocks = render::code_blocks(reply);
    let Some((language, code)) = index.checked_sub(1).and_then(|i| blocks.get(i)) else {
        println!("No code block {} in the last reply ({} available).", index, blocks.len());
        return;
    };

    let config = RunnerConfig {
        timeout,
        ..Default::default()
    };
    match runner::run_code(language, code, config).await {
        Ok(output) => {
            if !output.stdout.is_empty() {
                print!("{}", output.stdout);
            }
            if !output.stderr.is_empty() {
                eprint!("\x1b[31m{}\x1b[0m", output.stderr);
            }
            if output.truncated {
                println!("\n(output truncated)");
            }
            match output.exit_code {
                Some(code) => println!("\n[exit {}]", code),
                None => println!("\n[terminated by signal]"),
            }
        }
        Err(e) => eprintln!("Error: {}", e),
    }
}

async fn dictate(transcriber: RelayTranscriber, path: &str) -> Option<String> {
    let capture = AudioFileCapture::new(transcriber, path);
    let (tx, rx) = oneshot::channel();
    let watcher = tokio::spawn(async move {
        ctrl_c().await;
        let _ = tx.send(());
    });

    let mut sink = TerminalSink;
    let transcript = Dictation::default().run(&capture, &mut sink, rx).await;
    watcher.abort();
    println!();
    transcript
}

pub async fn run_repl(
    config: AppConfig,
    store: Arc<dyn PreferenceStore>,
    args: ChatArgs,
) -> Result<(), CliError> {
    let relay_url = args
        .relay_url
        .clone()
        .unwrap_or_else(|| config.client.relay_url.clone());
    let transport = Arc::new(HttpRelay::new(relay_url.clone()));
    let sampling = SamplingDefaults {
        temperature: config.client.temperature,
        max_tokens: config.client.max_tokens,
    };
    let mut session = ChatSession::new(transport, store, sampling)?;
    let mut options = SendOptions {
        api_key: args.api_key.clone(),
        model: args.model.clone(),
        temperature: args.temperature,
        max_tokens: args.max_tokens,
    };
    let run_timeout = Duration::from_secs(config.client.run_timeout_secs);

    println!("--- Prattle Terminal Chat ---");
    println!("Relay: {}", relay_url);
    println!(
        "Model: {}",
        options
            .model
            .as_deref()
            .unwrap_or(&session.preferences().model_name)
    );
    if options.api_key.is_none() && session.preferences().api_key.is_none() {
        println!("No API key stored. Use /key <KEY> before sending.");
    }
    println!("Type /help for commands, /exit to quit.");
    println!("----------------------------");

    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    loop {
        print!("\n{}> ", sender_prefix(Role::User));
        flush();

        let input = match next_input(&mut lines, ctrl_c()).await? {
            Input::Line(line) => line,
            Input::Eof => break,
            Input::Interrupted => {
                println!();
                break;
            }
        };
        let text = input.trim();
        if text.is_empty() {
            continue;
        }

        let (command, arg) = match text.split_once(char::is_whitespace) {
            Some((c, a)) => (c, a.trim()),
            None => (text, ""),
        };

        match command {
            "/exit" | "/quit" => break,
            "/help" => println!("{}", HELP),
            "/clear" => {
                session.clear()?;
                println!("Conversation cleared.");
            }
            "/history" => {
                for (i, entry) in session.composer().history().iter().enumerate() {
                    println!("{:>3} | {}", i, entry.lines().next().unwrap_or_default());
                }
            }
            "/recall" => match arg.parse::<usize>().ok().and_then(|i| session.composer().recall(i)) {
                Some(entry) => {
                    let entry = entry.to_string();
                    println!("{}", entry);
                    send_and_print(&mut session, &entry, &options).await;
                }
                None => println!("No history entry {:?}.", arg),
            },
            "/expand" => {
                let found = arg
                    .parse::<usize>()
                    .ok()
                    .and_then(|n| n.checked_sub(1))
                    .and_then(|i| session.conversation().iter().nth(i));
                match found {
                    Some(message) => {
                        println!("{}>", sender_prefix(message.role));
                        println!("{}", render::to_terminal(&render::render_message(message, true)));
                    }
                    None => println!("No message {:?} ({} in conversation).", arg, session.conversation().len()),
                }
            }
            "/run" => match arg.parse::<usize>() {
                Ok(n) => run_block(&session, n, run_timeout).await,
                Err(_) => println!("Usage: /run N"),
            },
            "/model" if !arg.is_empty() => {
                session.set_model(arg)?;
                options.model = None;
                println!("Model set to {}.", arg);
            }
            "/key" if !arg.is_empty() => {
                session.set_api_key(Some(arg.to_string()))?;
                options.api_key = None;
                println!("API key saved.");
            }
            "/dictate" if !arg.is_empty() => {
                let api_key = options
                    .api_key
                    .clone()
                    .or_else(|| session.preferences().api_key.clone());
                let transcriber =
                    RelayTranscriber::new(relay_url.clone(), config.transcription.model.clone(), api_key);
                match dictate(transcriber, arg).await {
                    Some(transcript) => {
                        println!("{}", transcript);
                        send_and_print(&mut session, &transcript, &options).await;
                    }
                    None => println!("Nothing transcribed."),
                }
            }
            c if c.starts_with('/') => println!("Unknown command {}. Type /help.", c),
            _ => send_and_print(&mut session, text, &options).await,
        }
    }

    Ok(())
}
