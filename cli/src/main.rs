use anyhow::Context;
use clap::Parser;
use colored::*;
use log::{debug, warn};
use std::future::Future;
use std::io;
use std::process;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use parafuzz_core::{dry_run, run_fuzz, ConsoleSink, FuzzConfig, FuzzError, SinkRef};

#[derive(Parser, Debug)]
#[command(
    name = "parafuzz",
    version,
    about = "Query-parameter fuzzer: every payload into every target parameter",
    after_help = "\x1b[1;36mEXAMPLES:\x1b[0m
  Defaults (target.txt, payload.txt):  parafuzz
  Custom corpus + output:             parafuzz -t targets.txt -p xss.txt -o xss_results.json
  Slower, longer timeout:             parafuzz --delay 500 --timeout 30
  From a config file:                 parafuzz --config fuzz.json
  Preview without sending:            parafuzz --dry-run

Target file format: one 'host_path,parameter' per line, e.g. 'example.com/search,q'"
)]
pub struct Args {
    #[arg(short = 't', long = "targets", default_value = "target.txt", help = "File of 'host_path,parameter' rows")]
    pub targets: String,

    #[arg(short = 'p', long = "payloads", default_value = "payload.txt", help = "File of literal payloads, one per line")]
    pub payloads: String,

    #[arg(short = 'o', long, default_value = "fuzzing_results.json", help = "Output file path for results")]
    pub output: String,

    #[arg(long, default_value_t = 10, help = "Request timeout in seconds")]
    pub timeout: u64,

    #[arg(long, default_value_t = 100, help = "Delay after each request in milliseconds")]
    pub delay: u64,

    #[arg(long, default_value = parafuzz_core::DEFAULT_USER_AGENT, help = "User-Agent sent with every request")]
    pub user_agent: String,

    #[arg(long, default_value = "https",
        value_parser = clap::builder::PossibleValuesParser::new(["https", "http"]),
        help = "URL scheme prepended to every target")]
    pub scheme: String,

    #[arg(long, help = "JSON config file; replaces all corpus/request flags")]
    pub config: Option<String>,

    #[arg(long, help = "Print the URLs that would be requested without sending them")]
    pub dry_run: bool,

    #[arg(short = 'v', long, default_value_t = false, help = "Debug logging")]
    pub verbose: bool,
}

impl Args {
    fn to_config(&self) -> anyhow::Result<FuzzConfig> {
        if let Some(ref path) = self.config {
            return FuzzConfig::from_file(path)
                .with_context(|| format!("failed to load config file '{}'", path));
        }
        Ok(FuzzConfig {
            target_file: self.targets.clone(),
            payload_file: self.payloads.clone(),
            output_file: self.output.clone(),
            request_timeout: self.timeout,
            rate_limit_delay: self.delay,
            user_agent: self.user_agent.clone(),
            scheme: self.scheme.clone(),
            ..FuzzConfig::default()
        })
    }
}

#[tokio::main]
async fn main() {
    #[cfg(windows)]
    colored::control::set_virtual_terminal(true).ok();

    let args = Args::parse();
    init_logger(args.verbose);

    let sink = ConsoleSink::new_ref();
    if let Err(e) = run(&args, Arc::clone(&sink)).await {
        // Missing corpus files get the bare diagnostic.
        match e.downcast_ref::<FuzzError>() {
            Some(err) if matches!(err, FuzzError::CorpusMissing { .. }) => {
                sink.on_log("error", &err.to_string())
            }
            _ => sink.on_log("error", &format!("[!] {:#}", e)),
        }
        process::exit(1);
    }
}

async fn run(args: &Args, sink: SinkRef) -> anyhow::Result<()> {
    let config = args.to_config()?;
    debug!("config: {:?}", config);

    if args.dry_run {
        dry_run(&config, sink)?;
        return Ok(());
    }

    print_run_config(&config);

    let cancel = Arc::new(AtomicBool::new(false));
    let flag = Arc::clone(&cancel);
    tokio::spawn(async move {
        if watch_interrupts(tokio::signal::ctrl_c, flag).await {
            process::exit(130);
        }
    });

    run_fuzz(&config, sink, Some(cancel)).await?;
    Ok(())
}

/// First interrupt raises `flag` so the run stops after the current target.
/// Returns true on a second interrupt, meaning exit now.
async fn watch_interrupts<F, Fut>(mut next_interrupt: F, flag: Arc<AtomicBool>) -> bool
where
    F: FnMut() -> Fut,
    Fut: Future<Output = io::Result<()>>,
{
    let mut received = 0u32;
    while next_interrupt().await.is_ok() {
        received += 1;
        if received == 1 {
            warn!("Ctrl-C received, stopping after the current target (press again to abort)");
            flag.store(true, Ordering::Relaxed);
        } else {
            warn!("second Ctrl-C, aborting");
            return true;
        }
    }
    false
}

fn init_logger(verbose: bool) {
    let default_filter = if verbose { "debug" } else { "warn" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_filter))
        .format_timestamp(None)
        .init();
}

fn print_run_config(config: &FuzzConfig) {
    println!("{}", format!("[+] Targets:    {}", config.target_file).green().bold());
    println!("{}", format!("[+] Payloads:   {}", config.payload_file).green().bold());
    println!("{}", format!("[+] Timeout:    {}s", config.request_timeout).blue());
    println!("{}", format!("[+] Delay:      {}ms", config.rate_limit_delay).blue());
    println!("{}", format!("[+] Output:     {}", config.output_file).blue());
    if config.scheme != "https" {
        println!("{}", format!("[+] Scheme:     {}", config.scheme).yellow());
    }
    println!("{}", "──────────────────────────────────────────────────".dimmed());
}
