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
// - agent.rs file -

use crate::errors::ViggleError;

use anyhow::Result;
use serde_json::Value;
use tracing::debug;
use ureq::{Agent, AgentBuilder, Proxy};
use url::Url;

// Default HTTP agent for viggle-dl. Sets a proxy or not.
pub fn init(url: &Url) -> Result<Agent> {
    let mut builder = AgentBuilder::new();

    if let Some(env_proxy) = env_proxy::for_url(url).host_port() {
        // Use a proxy:
        debug!(host = %env_proxy.0, port = env_proxy.1, "using proxy");
        let proxy = Proxy::new(format!("{}:{}", env_proxy.0, env_proxy.1))?;
        builder = builder.proxy(proxy);
    }

    Ok(builder.build())
}

pub trait JsonSource {
    fn get_json(&self, url: &str, user_agent: &str) -> Result<Value>;
}

pub struct HttpJsonSource;
impl JsonSource for HttpJsonSource {
    fn get_json(&self, url: &str, user_agent: &str) -> Result<Value> {
        let url_p = Url::parse(url)?;
        let agent = init(&url_p)?;

        debug!(%url, "fetching JSON");
        let resp = agent
            .get(url_p.as_str())
            .set("User-Agent", user_agent)
            .call()
            .map_err(|e| ViggleError::Api {
                url: url.to_string(),
                reason: match e {
                    ureq::Error::Status(code, _) => format!("HTTP status {}", code),
                    ureq::Error::Transport(t) => t.to_string(),
                },
            })?;

        let body: Value = resp.into_json().map_err(|e| ViggleError::Api {
            url: url.to_string(),
            reason: format!("invalid JSON: {}", e),
        })?;

        Ok(body)
    }
}
