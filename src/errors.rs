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
// - errors.rs file -

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ViggleError {
    #[error("Unsupported URL: {0}")]
    UnsupportedUrl(String),

    #[error("API request to {url} failed: {reason}")]
    Api { url: String, reason: String },

    #[error("No playable formats found in the API response.")]
    NoPlayableFormats,
}

impl ViggleError {
    // Expected errors are the user's problem, not ours: report them
    // without a backtrace or context chain.
    pub fn is_expected(&self) -> bool {
        matches!(self, Self::UnsupportedUrl(_) | Self::NoPlayableFormats)
    }
}
