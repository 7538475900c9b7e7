use std::{num::NonZeroU32, path::PathBuf, str::FromStr, sync::Arc, time::Duration};

use clap::Parser;
use fake_user_agent::get_chrome_rua;
use hlsget::{
    resolve, resolve_key, CounterIv, HttpClient, IvSource, MediaSequenceIv, SegmentPipeline,
    SequentialDownloader,
};
use reqwest::{
    header::{HeaderMap, HeaderName, HeaderValue},
    ClientBuilder, Url,
};
use tokio::io::AsyncWrite;
use tokio_util::sync::CancellationToken;

#[derive(Parser, Debug, Clone)]
#[clap(name = "hlsget", about = "An HLS stream downloader")]
pub struct HlsgetArgs {
    /// Input url for the stream
    #[clap(short, long)]
    input: String,

    /// Output file to which the stream is to be downloaded. Use "-" for
    /// stdout.
    #[clap(short, long, default_value = "./output.ts")]
    output: PathBuf,

    /// Preferred quality for downloading, as a vertical resolution ceiling
    #[clap(short = 'q', long, default_value = "1080")]
    preferred_quality: u32,

    /// HTTP header used to download
    ///
    /// Custom header. eg. "User-Agent: xxxxx". Accepts one "Key: Value"
    /// pair, several newline-separated pairs, or comma-joined pairs.
    /// Duplicate keys overwrite.
    #[clap(short = 'H', long)]
    headers: Vec<String>,

    /// Cookies used to download, "name=value; name2=value2"
    #[clap(long)]
    cookies: Option<String>,

    /// Request timeout in seconds
    #[clap(long, default_value = "60")]
    timeout: u64,

    /// Skip TLS certificate verification
    #[clap(short = 'k', long)]
    insecure: bool,

    /// Derive missing segment IVs from the media sequence number instead
    /// of the process-wide counter
    #[clap(long)]
    iv_media_sequence: bool,

    /// Per-segment fetch attempts. Unbounded when omitted.
    #[clap(long)]
    max_attempts: Option<NonZeroU32>,

    /// Suppress per-segment progress output
    #[clap(long)]
    quiet: bool,

    /// Debug output
    #[clap(long, alias = "debug")]
    verbose: bool,
}

impl HlsgetArgs {
    fn client(&self) -> anyhow::Result<HttpClient> {
        let mut builder = ClientBuilder::new()
            .default_headers(parse_headers(&self.headers)?)
            .user_agent(get_chrome_rua())
            .timeout(Duration::from_secs(self.timeout));
        if self.insecure {
            builder = builder.danger_accept_invalid_certs(true);
        }
        Ok(HttpClient::new(builder)?)
    }

    fn log_level(&self) -> log::LevelFilter {
        if self.verbose {
            log::LevelFilter::Debug
        } else if self.quiet {
            log::LevelFilter::Warn
        } else {
            log::LevelFilter::Info
        }
    }

    async fn writer(&self) -> anyhow::Result<Box<dyn AsyncWrite + Unpin + Send>> {
        Ok(if self.output.as_os_str() == "-" {
            Box::new(tokio::io::stdout())
        } else {
            Box::new(
                tokio::fs::OpenOptions::new()
                    .create(true)
                    .append(true)
                    .open(&self.output)
                    .await?,
            )
        })
    }
}

/// Parses header strings into a `HeaderMap`. Each argument holds one
/// `Key: Value` pair, newline-separated pairs, or comma-joined pairs;
/// duplicate keys overwrite.
fn parse_headers(raw: &[String]) -> anyhow::Result<HeaderMap> {
    let mut headers = HeaderMap::new();
    for chunk in raw {
        for pair in split_header_pairs(chunk) {
            let Some((name, value)) = pair.split_once(':') else {
                continue;
            };
            headers.insert(
                HeaderName::from_str(name.trim())?,
                HeaderValue::from_str(value.trim())?,
            );
        }
    }
    Ok(headers)
}

fn split_header_pairs(chunk: &str) -> Vec<&str> {
    let lines: Vec<&str> = chunk.lines().filter(|line| !line.trim().is_empty()).collect();
    // A single line carrying several pairs is comma-joined only when every
    // piece looks like a pair of its own; commas inside a value, as in
    // "(KHTML, like Gecko)", stay untouched.
    if let [line] = lines.as_slice() {
        if line.matches(':').count() > 1 && line.split(',').all(|piece| piece.contains(':')) {
            return line.split(',').collect();
        }
    }
    lines
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = HlsgetArgs::parse();
    pretty_env_logger::formatted_builder()
        .filter_level(args.log_level())
        .init();

    let client = args.client()?;
    let input: Url = args.input.parse()?;
    if let Some(cookies) = &args.cookies {
        client.add_cookies(
            cookies.split(';').map(|c| c.trim().to_string()).collect(),
            input.clone(),
        );
    }

    let cancel = CancellationToken::new();
    {
        let cancel = cancel.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                log::warn!("Interrupt received, canceling the download.");
                cancel.cancel();
            }
        });
    }

    let (playlist_url, playlist) =
        resolve(&client, input, args.preferred_quality, &cancel).await?;
    let encryption = resolve_key(&client, &playlist, &playlist_url, &cancel).await?;

    let iv_source: Arc<dyn IvSource> = if args.iv_media_sequence {
        Arc::new(MediaSequenceIv)
    } else {
        Arc::new(CounterIv)
    };

    let pipeline = SegmentPipeline::new(client, playlist_url, playlist, encryption)
        .with_iv_source(iv_source)
        .with_max_attempts(args.max_attempts)
        .with_cancellation(cancel);

    let mut downloader = SequentialDownloader::new(pipeline, args.writer().await?);
    if !args.quiet {
        let name = args.output.display().to_string();
        downloader = downloader.with_progress(move |current, total| {
            log::info!("[HLS] {name}: segment {current}/{total}");
        });
    }

    let written = downloader.download().await?;
    log::info!("Download finished, {written} bytes written.");

    Ok(())
}
