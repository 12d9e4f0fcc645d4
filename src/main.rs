/*
 * The contents of this file are subject to the terms of the
 * Common Development and Distribution License, Version 1.0 only
 * (the "License").  You may not use this file except in compliance
 * with the License.
 *
 * See the file LICENSE in this distribution for details.
 * A copy of the CDDL is also available via the Internet at
 * http://www.opensource.org/licenses/cddl1.txt
 *
 * When distributing Covered Code, include this CDDL HEADER in each
 * file and include the contents of the LICENSE file from this
 * distribution.
 */

// Viggle Down Loader
// - main.rs file -

use anyhow::Result;
use clap::Parser;
use std::{env, process};
use tracing::{debug, info};

mod agent;
mod definitions;
mod errors;
mod ffprobe;
mod handlers;
mod helpers;
mod info;
mod logger;

use crate::definitions::ExtractContext;
use crate::errors::ViggleError;
use crate::info::InfoDict;

const DEFAULT_USER_AGENT: &str = concat!("viggle-dl/", env!("CARGO_PKG_VERSION"));

#[derive(Parser)]
#[clap(version, about = "Viggle Down Loader", long_about = None)]
struct Args {
    #[clap(
        long = "user-agent",
        short = 'A',
        help = "Sets the User-Agent for API requests and ffprobe.\nFalls back to $VIGGLE_DL_USER_AGENT."
    )]
    useragent: Option<String>,

    #[clap(
        long,
        help = "Path to the ffprobe binary.\nFalls back to $VIGGLE_DL_FFPROBE, then to ffprobe in your PATH."
    )]
    ffprobe: Option<String>,

    #[clap(
        long = "dump-json",
        short = 'j',
        help = "Prints the extracted information as JSON"
    )]
    dumpjson: bool,

    #[clap(long, short = 'v', help = "Talks more while the URL is processed")]
    verbose: bool,

    #[clap(help = "Sets the input URL to use", index = 1)]
    url: String,
}

// The command line wins, then the environment, then the default.
fn setting(arg: Option<String>, env_name: &str, default: &str) -> String {
    arg.filter(|v| !v.is_empty())
        .or_else(|| env::var(env_name).ok().filter(|v| !v.is_empty()))
        .unwrap_or_else(|| default.to_string())
}

fn human_size(bytes: i64) -> String {
    let units = ["B", "KiB", "MiB", "GiB"];
    let mut size = bytes as f64;
    let mut unit = 0;
    while size >= 1024.0 && unit < units.len() - 1 {
        size /= 1024.0;
        unit += 1;
    }
    format!("{:.2}{}", size, units[unit])
}

fn print_summary(video: &InfoDict) {
    println!("Title: {}", video.title);
    if let Some(uploader) = &video.uploader {
        println!("Uploader: {}", uploader);
    }
    if let Some(duration) = video.duration {
        println!("Duration: {:.1}s", duration);
    }

    let best = video.best_format().map(|f| f.format_id.as_str());

    println!();
    println!(
        "{:<32} {:<6} {:<12} {:<10} {:<10} {:>3} {:>10}",
        "ID", "EXT", "RESOLUTION", "VCODEC", "ACODEC", "Q", "SIZE"
    );
    for f in &video.formats {
        println!(
            "{:<32} {:<6} {:<12} {:<10} {:<10} {:>3} {:>10}{}",
            f.format_id,
            f.ext,
            f.resolution(),
            f.vcodec,
            f.acodec,
            f.quality,
            f.filesize.map(human_size).unwrap_or_default(),
            if Some(f.format_id.as_str()) == best {
                " (best)"
            } else {
                ""
            }
        );
    }

    if !video.thumbnails.is_empty() {
        println!();
        println!("Thumbnails:");
        for t in &video.thumbnails {
            println!("  {:<30} {}", t.id, t.url);
        }
    }
}

fn run(args: Args) -> Result<()> {
    let in_url = &args.url;

    // Find a known handler for <in_url>:
    let handler = definitions::find_handler(in_url)
        .ok_or_else(|| ViggleError::UnsupportedUrl(in_url.to_string()))?;
    info!("Fetching from {}.", handler.display_name());

    let user_agent = setting(args.useragent, "VIGGLE_DL_USER_AGENT", DEFAULT_USER_AGENT);
    let ffprobe_path = setting(args.ffprobe, "VIGGLE_DL_FFPROBE", "ffprobe");
    debug!(%user_agent, ffprobe = %ffprobe_path, "settings");

    let http = agent::HttpJsonSource;
    let prober = ffprobe::FfprobeCommand::new(ffprobe_path);
    let ctx = ExtractContext {
        user_agent: &user_agent,
        http: &http,
        prober: &prober,
    };

    let video = handler.extract(in_url, &ctx)?;
    info!(
        "Found {} format(s) and {} thumbnail(s).",
        video.formats.len(),
        video.thumbnails.len()
    );

    if args.dumpjson {
        println!("{}", serde_json::to_string_pretty(&video)?);
    } else {
        print_summary(&video);
    }

    Ok(())
}

fn main() -> Result<()> {
    // Argument parsing:
    let args = Args::parse();
    logger::init(args.verbose)?;

    if let Err(e) = run(args) {
        // Nothing we could do better - no need for a debug trace.
        if let Some(expected) = e.downcast_ref::<ViggleError>().filter(|v| v.is_expected()) {
            eprintln!("ERROR: {}", expected);
            process::exit(1);
        }
        return Err(e);
    }

    Ok(())
}
