use anyhow::{Context, Result};
use chitty::ChatClient;
use chitty_protocol::{ServerFrame, MAX_CONTENT_CHARS};
use tokio::{
    io::{self, AsyncBufRead, AsyncBufReadExt, AsyncWriteExt, BufReader, Lines},
    select,
};
use tracing::{info, warn};

use crate::cli::ClientArgs;

/// Typing this leaves the chat.
const EXIT_COMMAND: &str = "exit";

/// What to do with one line of user input.
#[derive(Debug, PartialEq, Eq)]
enum Input<'a> {
    Skip,
    Exit,
    TooLong(usize),
    Send(&'a str),
}

/// What to show for one frame from the server.
#[derive(Debug, PartialEq, Eq)]
enum Output {
    Stdout(String),
    Stderr(String),
}

/// Why the input loop stopped.
#[derive(Debug, PartialEq, Eq)]
enum Stop {
    Leave,
    ServerClosed,
}

pub async fn run(args: ClientArgs) -> Result<()> {
    let addr = args.server_addr();
    let client = ChatClient::connect(&addr, args.name.as_str())
        .await
        .with_context(|| format!("failed to join {addr} as {}", args.name))?;

    info!(%addr, identity = %args.name, "connected");
    write_stdout(&format!(
        "*** joined as {} (session {}, logical time {})",
        client.identity(),
        client.session_id().0,
        client.joined_at()
    ))
    .await?;

    // One reader for the whole session: `next_line` keeps partial input
    // buffered when another `select!` branch wins.
    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    match run_client_loop(&client, &mut lines).await? {
        Stop::Leave => {
            client.leave().await.context("failed to leave cleanly")?;
            write_stdout("*** left the chat").await?;
        }
        Stop::ServerClosed => {
            write_stdout("*** server closed the connection").await?;
        }
    }

    Ok(())
}

async fn run_client_loop<R: AsyncBufRead + Unpin>(
    client: &ChatClient,
    lines: &mut Lines<R>,
) -> Result<Stop> {
    loop {
        select! {
            frame = client.recv() => {
                let Some(frame) = frame? else {
                    return Ok(Stop::ServerClosed);
                };
                match render(&frame, client.identity()) {
                    Some(Output::Stdout(line)) => write_stdout(&line).await?,
                    Some(Output::Stderr(line)) => write_stderr(&line).await?,
                    None => {}
                }
            }
            line = lines.next_line() => {
                let Some(line) = line? else {
                    return Ok(Stop::Leave);
                };
                match classify(&line) {
                    Input::Skip => {}
                    Input::Exit => return Ok(Stop::Leave),
                    Input::TooLong(len) => {
                        warn!(len, "message too long, not sent");
                        write_stderr(&format!(
                            "!!! message is {len} characters, limit is {MAX_CONTENT_CHARS}"
                        ))
                        .await?;
                    }
                    Input::Send(text) => client.send(text).await?,
                }
            }
            ctrl_c = tokio::signal::ctrl_c() => {
                if let Err(error) = ctrl_c {
                    warn!(?error, "ctrl-c handler failed");
                }
                return Ok(Stop::Leave);
            }
        }
    }
}

fn classify(line: &str) -> Input<'_> {
    let text = line.trim();
    if text.is_empty() {
        return Input::Skip;
    }
    if text == EXIT_COMMAND {
        return Input::Exit;
    }
    let len = text.chars().count();
    if len > MAX_CONTENT_CHARS {
        return Input::TooLong(len);
    }
    Input::Send(text)
}

fn render(frame: &ServerFrame, me: &str) -> Option<Output> {
    match frame {
        ServerFrame::Chat(msg) if msg.sender == me => None,
        ServerFrame::Chat(msg) => {
            Some(Output::Stdout(format!("{}: {}", msg.sender, msg.content)))
        }
        ServerFrame::Error { code, message } => {
            Some(Output::Stderr(format!("!!! {message} ({code})")))
        }
        ServerFrame::JoinAck { .. } | ServerFrame::LeaveAck { .. } => None,
    }
}

async fn write_stdout(line: &str) -> io::Result<()> {
    let mut stdout = tokio::io::stdout();
    stdout.write_all(line.as_bytes()).await?;
    stdout.write_all(b"\n").await?;
    stdout.flush().await
}

async fn write_stderr(line: &str) -> io::Result<()> {
    let mut stderr = tokio::io::stderr();
    stderr.write_all(line.as_bytes()).await?;
    stderr.write_all(b"\n").await?;
    stderr.flush().await
}

#[cfg(test)]
mod tests {
    use chitty_protocol::ChatMessage;

    use super::*;

    #[test]
    fn test_classify_trims_and_skips_blank() {
        assert_eq!(classify("   \n"), Input::Skip);
        assert_eq!(classify("  hello  \n"), Input::Send("hello"));
    }

    #[test]
    fn test_classify_exit() {
        assert_eq!(classify("exit\n"), Input::Exit);
        assert_eq!(classify("exit now\n"), Input::Send("exit now"));
    }

    #[test]
    fn test_classify_too_long() {
        let line = format!("{}\n", "z".repeat(MAX_CONTENT_CHARS + 1));
        assert_eq!(classify(&line), Input::TooLong(MAX_CONTENT_CHARS + 1));

        let line = "z".repeat(MAX_CONTENT_CHARS);
        assert_eq!(classify(&line), Input::Send(line.as_str()));
    }

    #[tokio::test]
    async fn test_next_line_keeps_partial_input_across_cancelled_select() {
        let (mut writer, reader) = tokio::io::duplex(64);
        let mut lines = BufReader::new(reader).lines();

        writer.write_all(b"hel").await.unwrap();
        select! {
            line = lines.next_line() => panic!("line not finished yet: {line:?}"),
            _ = tokio::time::sleep(std::time::Duration::from_millis(20)) => {}
        }

        writer.write_all(b"lo\n").await.unwrap();
        let line = lines.next_line().await.unwrap();
        assert_eq!(line.as_deref(), Some("hello"));
        assert_eq!(classify(line.as_deref().unwrap()), Input::Send("hello"));
    }

    #[test]
    fn test_render_hides_own_messages() {
        let own = ServerFrame::Chat(ChatMessage::new("alice", "hi"));
        assert_eq!(render(&own, "alice"), None);
    }

    #[test]
    fn test_render_others_and_server() {
        let other = ServerFrame::Chat(ChatMessage::new("bob", "hi"));
        assert_eq!(
            render(&other, "alice"),
            Some(Output::Stdout("bob: hi".into()))
        );

        let notice = ServerFrame::Chat(ChatMessage::system(
            "bob connected at logical time 2",
            2,
        ));
        assert_eq!(
            render(&notice, "alice"),
            Some(Output::Stdout("Server: bob connected at logical time 2".into()))
        );
    }

    #[test]
    fn test_render_error_goes_to_stderr() {
        let err = ServerFrame::Error {
            code: 413,
            message: "too long".into(),
        };
        assert_eq!(
            render(&err, "alice"),
            Some(Output::Stderr("!!! too long (413)".into()))
        );
    }
}
