use bytesize::ByteSize;
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;
use vidfetch::{
    Session,
    client::{ApiClient, HistoryRecord, VideoMetadata},
    config::Config,
    save::DirectorySink,
    task::TaskState,
};

#[derive(Parser, Debug)]
#[command(version, about = "Parse and download videos through a vidfetch backend")]
struct Cli {
    #[command(subcommand)]
    command: Command,

    #[clap(flatten)]
    config: Config,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Show the metadata the backend extracts for a video URL
    Parse { url: String },
    /// Download a video and save it to the output directory
    Download { url: String },
    /// List previously completed downloads
    History,
}

fn print_metadata(metadata: &VideoMetadata) {
    let width = metadata
        .iter()
        .map(|(name, _)| name.chars().count())
        .max()
        .unwrap_or(0);
    for (name, value) in metadata.iter() {
        let pad = width - name.chars().count();
        println!("{name}{:pad$}  {value}", "");
    }
}

fn print_history(records: &[HistoryRecord]) {
    if records.is_empty() {
        println!("No downloads yet");
        return;
    }
    for record in records {
        println!(
            "{}  {:>10}  {}  {}",
            record.downloaded_at,
            ByteSize::b(record.file_size).to_string(),
            record.file_name,
            record.title
        );
    }
}

async fn download(
    session: &Session<ApiClient>,
    url: &str,
    sink: &DirectorySink,
) -> vidfetch::Result<()> {
    let mut rx = session.subscribe();
    let download = session.download(url, sink);
    let ctrl_c = tokio::signal::ctrl_c();
    tokio::pin!(download, ctrl_c);

    let mut interrupted = false;
    let mut last_progress = None;
    let result = loop {
        tokio::select! {
            result = &mut download => break result,
            Ok(()) = rx.changed() => {
                let task = rx.borrow_and_update().clone();
                match task.state {
                    TaskState::Polling if last_progress != Some(task.progress) => {
                        last_progress = Some(task.progress);
                        println!("Downloading... {:>3}%", task.progress);
                    }
                    TaskState::Fetching => println!("Retrieving file..."),
                    _ => {}
                }
            }
            _ = &mut ctrl_c, if !interrupted => {
                interrupted = true;
                tracing::info!("Interrupted, tearing down");
                session.teardown();
            }
        }
    };

    let saved = result?;
    println!("Saved {} ({})", saved.path.display(), ByteSize::b(saved.bytes));
    print_history(&session.history());
    Ok(())
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> color_eyre::Result<()> {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();
    color_eyre::install()?;

    let cli = Cli::parse();
    let config = cli.config;
    tracing::debug!(?config, "Loaded configuration");

    let api = config.backend.client()?;
    tracing::info!("Using backend at {}", api.base_url());
    let session = Session::new(api, config.task.poller());

    let result = match cli.command {
        Command::Parse { url } => session.parse(&url).await.map(|metadata| {
            print_metadata(&metadata);
        }),
        Command::Download { url } => {
            let sink = DirectorySink::new(config.task.output_dir());
            session.refresh_history().await;
            download(&session, &url, &sink).await
        }
        Command::History => {
            session.refresh_history().await;
            print_history(&session.history());
            Ok(())
        }
    };

    if let Err(e) = result {
        eprintln!("{}", e.user_message());
        return Err(e.into());
    }

    Ok(())
}
