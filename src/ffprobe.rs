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
// - ffprobe.rs file -

use serde::Deserialize;
use serde_json::Value;
use std::{io, process::Command};
use thiserror::Error;
use tracing::debug;

// It makes very little sense to link ffmpeg statically with viggle-dl.
// Just use the system's ffprobe (or tell the user if there isn't one).

#[derive(Debug, Error)]
pub enum ProbeError {
    #[error("could not run {binary}: {source}")]
    Io {
        binary: String,
        #[source]
        source: io::Error,
    },
    #[error("ffprobe error:\n{0}")]
    Status(String),
    #[error("unreadable ffprobe output: {0}")]
    Deserialize(#[from] serde_json::Error),
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ProbeResult {
    // Left as None when ffprobe did not report a "streams" key at all.
    pub streams: Option<Vec<Stream>>,
    pub format: Option<Format>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Stream {
    pub codec_type: Option<String>,
    pub codec_name: Option<String>,
    pub width: Option<Value>,
    pub height: Option<Value>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Format {
    pub format_name: Option<String>,
    pub duration: Option<Value>,
    pub size: Option<Value>,
}

pub trait Prober {
    fn probe(&self, url: &str, user_agent: &str) -> Result<ProbeResult, ProbeError>;
}

pub struct FfprobeCommand {
    binary: String,
}

impl FfprobeCommand {
    pub fn new(binary: impl Into<String>) -> Self {
        Self {
            binary: binary.into(),
        }
    }

    pub fn args(url: &str, user_agent: &str) -> Vec<String> {
        let mut args: Vec<String> = [
            "-v",
            "error",
            "-print_format",
            "json",
            "-show_format",
            "-show_streams",
        ]
        .iter()
        .map(|a| a.to_string())
        .collect();

        if !user_agent.is_empty() {
            // ffprobe expects CRLF-terminated raw header lines here.
            args.push("-headers".to_string());
            args.push(format!("User-Agent: {}\r\n", user_agent));
        }

        args.push(url.to_string());
        args
    }
}

impl Prober for FfprobeCommand {
    fn probe(&self, url: &str, user_agent: &str) -> Result<ProbeResult, ProbeError> {
        debug!(binary = %self.binary, %url, "probing");

        let out = Command::new(&self.binary)
            .args(Self::args(url, user_agent))
            .output()
            .map_err(|source| ProbeError::Io {
                binary: self.binary.clone(),
                source,
            })?;

        if !out.status.success() {
            let stderr = String::from_utf8_lossy(&out.stderr).trim().to_string();
            return Err(ProbeError::Status(if stderr.is_empty() {
                "no stderr".to_string()
            } else {
                stderr
            }));
        }

        parse_output(&out.stdout)
    }
}

pub fn parse_output(stdout: &[u8]) -> Result<ProbeResult, ProbeError> {
    Ok(serde_json::from_slice::<ProbeResult>(stdout)?)
}
