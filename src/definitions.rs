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
// - definitions.rs file -

use crate::agent::JsonSource;
use crate::ffprobe::Prober;
use crate::info::InfoDict;

use anyhow::Result;

// Everything a handler may touch from the outside world.
pub struct ExtractContext<'a> {
    pub user_agent: &'a str,
    pub http: &'a dyn JsonSource,
    pub prober: &'a dyn Prober,
}

// Define the public interface for site definitions:
pub trait SiteDefinition: Sync {
    // true, if this site can handle <url>.
    fn can_handle_url<'a>(&'a self, url: &'a str) -> bool;

    // returns the name of the site (e.g. "Viggle").
    fn display_name<'a>(&'a self) -> String;

    // resolves <url> into its formats, thumbnails and metadata.
    fn extract<'a>(&'a self, url: &'a str, ctx: &ExtractContext<'_>) -> Result<InfoDict>;
}

inventory::collect!(&'static dyn SiteDefinition);

// Returns the first known handler for <url>, if any.
pub fn find_handler(url: &str) -> Option<&'static dyn SiteDefinition> {
    inventory::iter::<&'static dyn SiteDefinition>
        .into_iter()
        .find(|handler| handler.can_handle_url(url))
        .copied()
}
