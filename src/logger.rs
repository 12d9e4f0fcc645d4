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
// - logger.rs file -

use anyhow::Result;
use std::{env, io};
use tracing::Level;
use tracing_subscriber::{filter::Directive, fmt, prelude::*, EnvFilter};

pub const LOG_LEVEL_ENV: &str = "VIGGLE_DL_LOG_LEVEL";

// Builds the filter: warnings for everyone, more for us, plus whatever
// the user put into VIGGLE_DL_LOG_LEVEL (e.g. "ureq=debug").
fn build_filter(verbose: bool, extra: &str) -> EnvFilter {
    let own_level = if verbose { Level::DEBUG } else { Level::INFO };

    let mut filter = EnvFilter::builder()
        .with_default_directive(Level::WARN.into())
        .parse_lossy(format!("viggle_dl={}", own_level));

    let directives = extra
        .split(',')
        .filter(|s| !s.is_empty())
        .filter_map(|s| match s.parse::<Directive>() {
            Ok(d) => Some(d),
            Err(e) => {
                eprintln!("Failed to parse log level directive {s:?}: {e:?}");
                None
            }
        })
        .collect::<Vec<_>>();

    for d in directives {
        filter = filter.add_directive(d);
    }

    filter
}

// Installs the global subscriber. Logs go to stderr so that
// --dump-json output stays machine-readable.
pub fn init(verbose: bool) -> Result<()> {
    let extra = env::var(LOG_LEVEL_ENV).unwrap_or_default();

    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(io::stderr).with_target(false))
        .with(build_filter(verbose, &extra))
        .try_init()?;

    Ok(())
}
