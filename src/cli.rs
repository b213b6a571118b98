use std::path::PathBuf;
use std::sync::Arc;

use bytes::Bytes;
use clap::{Parser, Subcommand, ValueEnum};
use tokio::io::{AsyncBufReadExt, BufReader, Lines, Stdin};
use tracing::debug;

use recclient::capture::ffmpeg::FfmpegBackend;
use recclient::capture::synthetic::SyntheticBackend;
use recclient::capture::CaptureBackend;
use recclient::format::{format_elapsed, human_size};
use recclient::gallery::{Gallery, DEFAULT_PAGE_SIZE};
use recclient::session::{Session, SessionUpdate};
use recclient::ApiClient;

#[derive(Parser)]
#[command(version, about = "Record the screen and manage uploaded recordings")]
struct Args {
    /// Server base URL [default: $SCREENREC_API_URL or http://localhost:3001]
    #[arg(short, long)]
    server: Option<String>,

    /// Recordings per gallery page
    #[arg(long, default_value_t = DEFAULT_PAGE_SIZE)]
    page_size: usize,

    /// Where downloads are saved
    #[arg(short, long, default_value = ".")]
    output_dir: PathBuf,

    #[arg(long, default_value = "info")]
    log_level: String,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Record the screen; press Enter to stop
    Record {
        #[arg(long, value_enum, default_value_t = Source::Ffmpeg)]
        source: Source,
    },
    /// Show one page of uploaded recordings
    List {
        #[arg(short, long, default_value_t = 1)]
        page: usize,
    },
    /// Show a single recording
    Show { id: i64 },
    /// Upload an existing file
    Upload {
        file: PathBuf,
        #[arg(long, default_value = "video/webm")]
        mime: String,
    },
}

#[derive(Clone, Copy, ValueEnum)]
enum Source {
    Ffmpeg,
    Synthetic,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    utils::set_log(&utils::log_filter(&args.log_level));

    let client = ApiClient::from_env(args.server.clone());
    debug!("Using server {}", client.base_url());
    let mut gallery = Gallery::new(args.page_size);

    match args.command {
        Command::Record { source } => {
            let backend: Arc<dyn CaptureBackend> = match source {
                Source::Ffmpeg => Arc::new(FfmpegBackend::probe().await),
                Source::Synthetic => Arc::new(SyntheticBackend::new()),
            };
            record(backend, &client, &mut gallery, &args.output_dir).await?;
        }
        Command::List { page } => {
            gallery.refresh(&client).await;
            if let Some(e) = gallery.error() {
                anyhow::bail!("Failed to fetch recordings: {e}");
            }
            gallery.set_page(page);
            print_gallery(&gallery, &client);
        }
        Command::Show { id } => {
            let r = client.get(id).await?;
            println!("#{} {}", r.id, r.filename);
            println!("  size:    {}", human_size(r.size.max(0) as u64));
            println!("  created: {}", r.created_at.to_rfc3339());
            println!("  url:     {}", client.url(&r.url));
        }
        Command::Upload { file, mime } => {
            let data = Bytes::from(tokio::fs::read(&file).await?);
            let name = file
                .file_name()
                .and_then(|n| n.to_str())
                .unwrap_or("recording.webm");
            let r = client.upload(data, name, &mime).await?;
            println!("Uploaded #{} as {}", r.id, client.url(&r.url));
        }
    }
    Ok(())
}

async fn record(
    backend: Arc<dyn CaptureBackend>,
    client: &ApiClient,
    gallery: &mut Gallery,
    output_dir: &std::path::Path,
) -> anyhow::Result<()> {
    let mut session = Session::new(backend);
    let mut stdin = BufReader::new(tokio::io::stdin()).lines();

    if let Err(e) = session.start().await {
        println!("{}", session.status().unwrap_or_default());
        return Err(e.into());
    }
    println!(
        "Recording... press Enter to stop (limit {})",
        format_elapsed(session.limit())
    );

    let mut stdin_open = true;
    loop {
        tokio::select! {
            update = session.next_event() => match update {
                Some(SessionUpdate::Tick(secs)) => println!("Timer: {}", format_elapsed(secs)),
                Some(SessionUpdate::Stopped { elapsed, reason }) => {
                    println!("Stopped at {} ({:?})", format_elapsed(elapsed), reason);
                    break;
                }
                Some(SessionUpdate::Chunk(_)) => {}
                None => break,
            },
            line = stdin.next_line(), if stdin_open => {
                if is_stop_request(&line) {
                    session.stop().await;
                    break;
                }
                // Closed stdin leaves the recording to the time limit
                stdin_open = false;
            }
        }
    }

    if let Some(status) = session.status() {
        println!("{status}");
    }
    if let Some(recorded) = session.recorded() {
        println!(
            "Preview {} ({})",
            recorded.preview.url,
            human_size(recorded.blob.len() as u64)
        );
    }

    while session.recorded().is_some() {
        let Some(choice) = prompt(&mut stdin, "[d]ownload, [u]pload, [c]lear? ").await? else {
            break;
        };
        match choice.trim() {
            "d" | "download" => match session.download(output_dir).await {
                Ok(path) => println!("Saved {}", path.display()),
                Err(e) => println!("Download failed: {e}"),
            },
            "u" | "upload" => {
                let result = session.upload(client, gallery).await;
                if let Some(status) = session.status() {
                    println!("{status}");
                }
                if result.is_ok() {
                    print_gallery(gallery, client);
                }
            }
            "c" | "clear" => session.clear()?,
            other => println!("Unknown choice: {other}"),
        }
    }
    Ok(())
}

/// Only an entered line stops a recording, not EOF or a read error
fn is_stop_request(line: &std::io::Result<Option<String>>) -> bool {
    matches!(line, Ok(Some(_)))
}

async fn prompt(stdin: &mut Lines<BufReader<Stdin>>, text: &str) -> anyhow::Result<Option<String>> {
    print!("{text}");
    std::io::Write::flush(&mut std::io::stdout())?;
    Ok(stdin.next_line().await?)
}

fn print_gallery(gallery: &Gallery, client: &ApiClient) {
    let view = gallery.view(client.base_url());
    if view.items.is_empty() {
        println!("No recordings yet.");
        return;
    }
    for item in &view.items {
        println!(
            "{:<14} {:>10}  {}  {}",
            item.title, item.size, item.created, item.stream_url
        );
    }
    println!(
        "{} Page {} of {} {}",
        if view.has_prev { "< Prev" } else { "      " },
        view.page,
        view.total_pages,
        if view.has_next { "Next >" } else { "" }
    );
}
