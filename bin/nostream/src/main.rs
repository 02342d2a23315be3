mod config;

use std::path::PathBuf;

use anyhow::bail;
use clap::Parser;
use nostream::{
    Bytes, ChannelSink, JsonLinesSubscriber, SegmentLoader, SinkEvent, StreamReference,
    SubscriptionFilter,
};
use tokio::io::{AsyncRead, AsyncWrite, AsyncWriteExt};

use crate::config::Config;

/// Reassemble a Nostr live stream from its NIP-94 segment announcements.
///
/// Relay output is read as JSON lines, either bare events or
/// `["EVENT", <sub>, <event>]` frames, and the stream is written in order.
#[derive(Parser, Debug, Clone)]
#[clap(version, about)]
pub struct NostreamArgs {
    /// Stream to play, `<kind>:<pubkey>:<identifier>` or an event id
    reference: String,

    /// Relay output to read file headers from. Defaults to stdin.
    #[clap(short, long)]
    input: Option<PathBuf>,

    /// Where to write the stream. Defaults to stdout.
    #[clap(short, long)]
    output: Option<PathBuf>,

    /// TOML config file with a `[loader]` table
    #[clap(short, long, env = "NOSTREAM_CONFIG")]
    config: Option<PathBuf>,

    /// Stream this variant instead of the first one announced
    #[clap(long)]
    variant: Option<String>,

    /// Drop a segment after this many failed fetches
    #[clap(long)]
    max_attempts: Option<u32>,

    /// Check every segment against its content hash
    #[clap(long)]
    verify_hash: bool,

    /// HTTP timeout in seconds
    #[clap(long)]
    timeout: Option<u64>,

    /// Print the relay REQ frame for this stream and exit
    #[clap(long)]
    print_filter: bool,

    /// Debug output
    #[clap(long, alias = "debug")]
    verbose: bool,
}

impl NostreamArgs {
    fn config(&self) -> anyhow::Result<Config> {
        let mut config = match &self.config {
            Some(path) => Config::load(path)?,
            None => Config::default(),
        };

        let loader = &mut config.loader;
        if let Some(variant) = &self.variant {
            loader.variant = Some(variant.clone());
        }
        if let Some(max_attempts) = self.max_attempts {
            loader.max_attempts = Some(max_attempts);
        }
        if self.verify_hash {
            loader.verify_hash = true;
        }
        if let Some(timeout) = self.timeout {
            loader.timeout_secs = Some(timeout);
        }
        Ok(config)
    }

    async fn input(&self) -> anyhow::Result<Box<dyn AsyncRead + Unpin + Send>> {
        Ok(match &self.input {
            Some(path) => Box::new(tokio::fs::File::open(path).await?),
            None => Box::new(tokio::io::stdin()),
        })
    }

    async fn output(&self) -> anyhow::Result<Box<dyn AsyncWrite + Unpin + Send>> {
        Ok(match &self.output {
            Some(path) => Box::new(tokio::fs::File::create(path).await?),
            None => Box::new(tokio::io::stdout()),
        })
    }
}

struct Output {
    writer: Box<dyn AsyncWrite + Unpin + Send>,
    written: u64,
}

impl Output {
    async fn write(&mut self, chunk: Bytes, byte_offset: u64) -> anyhow::Result<()> {
        if byte_offset != self.written {
            bail!(
                "Chunk at offset {byte_offset} does not follow the {} bytes written",
                self.written
            );
        }
        self.writer.write_all(&chunk).await?;
        self.written += chunk.len() as u64;
        Ok(())
    }
}

/// The `REQ` frame the loader issues for `reference`.
fn request_frame(reference: &str, config: &Config) -> anyhow::Result<String> {
    let reference: StreamReference = reference.parse()?;
    let filter = SubscriptionFilter::for_stream(&reference, config.loader.batch_limit);
    Ok(filter.to_request("nostream")?)
}

async fn run(args: NostreamArgs) -> anyhow::Result<()> {
    let config = args.config()?;

    if args.print_filter {
        println!("{}", request_frame(&args.reference, &config)?);
        return Ok(());
    }

    let subscriber = JsonLinesSubscriber::new(args.input().await?);
    let (sink, mut events) = ChannelSink::new();
    let mut loader = SegmentLoader::http(subscriber, sink, config.loader)?;
    let mut output = Output {
        writer: args.output().await?,
        written: 0,
    };

    loader.open(&args.reference)?;

    loop {
        tokio::select! {
            event = events.recv() => match event {
                Some(SinkEvent::Data { chunk, byte_offset, .. }) => {
                    if let Err(e) = output.write(chunk, byte_offset).await {
                        loader.abort();
                        loader.finished().await;
                        return Err(e);
                    }
                }
                Some(SinkEvent::Complete { total_bytes }) => {
                    tracing::info!("Stream finished, {total_bytes} bytes written.");
                    break;
                }
                Some(SinkEvent::Error { kind, info }) => {
                    loader.finished().await;
                    bail!("Loader failed ({kind}): {}", info.msg);
                }
                None => break,
            },
            _ = tokio::signal::ctrl_c() => {
                tracing::info!("Ctrl-C received, stopping loader.");
                loader.abort();
                loader.finished().await;

                // keep what was already in flight
                while let Ok(event) = events.try_recv() {
                    if let SinkEvent::Data { chunk, byte_offset, .. } = event {
                        output.write(chunk, byte_offset).await?;
                    }
                }
                break;
            }
        }
    }

    loader.finished().await;
    output.writer.flush().await?;
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = NostreamArgs::parse();

    let default_level = if args.verbose {
        tracing_subscriber::filter::LevelFilter::DEBUG
    } else {
        tracing_subscriber::filter::LevelFilter::INFO
    };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::builder()
                .with_default_directive(default_level.into())
                .from_env_lossy(),
        )
        .with_writer(std::io::stderr)
        .init();

    run(args).await
}
