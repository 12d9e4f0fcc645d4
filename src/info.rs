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
// - info.rs file -

use serde::Serialize;

// Everything a downloader needs to know about one video.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct InfoDict {
    pub id: String,
    pub title: String,
    pub formats: Vec<Format>,
    pub thumbnails: Vec<Thumbnail>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub duration: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub uploader: Option<String>,
    pub extractor: String,
    pub webpage_url: String,
}

impl InfoDict {
    // The format with the highest quality. The first one wins on ties.
    pub fn best_format(&self) -> Option<&Format> {
        self.formats
            .iter()
            .fold(None, |best: Option<&Format>, f| match best {
                Some(b) if b.quality >= f.quality => Some(b),
                _ => Some(f),
            })
    }
}

// One probed media URL.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Format {
    pub format_id: String,
    pub url: String,
    pub ext: String,
    pub quality: i32,
    pub vcodec: String,
    pub acodec: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub width: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub height: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub duration: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub filesize: Option<i64>,
}

impl Format {
    pub fn resolution(&self) -> String {
        match (self.width, self.height) {
            (Some(w), Some(h)) => format!("{}x{}", w, h),
            _ if self.vcodec == "none" => "audio only".to_string(),
            _ => "unknown".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Thumbnail {
    pub id: String,
    pub url: String,
}
