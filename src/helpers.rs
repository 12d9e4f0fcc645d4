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
// - helpers.rs file -

use serde_json::Value;
use url::Url;

const IMAGE_EXTENSIONS: &[&str] = &[
    ".jpg", ".jpeg", ".png", ".gif", ".bmp", ".webp", ".tiff", ".svg", ".ico",
];

// Media extensions that sometimes show up in image-ish fields.
const MEDIA_EXTENSIONS: &[&str] = &[
    ".mp4", ".mkv", ".webm", ".mp3", ".aac", ".flac", ".wav", ".3gp", ".mov",
];

// Reads an integer from a JSON number or a numeric string.
pub fn int_or_none(value: Option<&Value>) -> Option<i64> {
    match value? {
        Value::Number(n) => n.as_i64().or_else(|| n.as_f64().map(|f| f as i64)),
        Value::String(s) => s.trim().parse::<i64>().ok(),
        _ => None,
    }
}

// Reads a float from a JSON number or a numeric string.
pub fn float_or_none(value: Option<&Value>) -> Option<f64> {
    match value? {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    }
}

// Guesses the file extension from the last path segment of <url>.
// Returns None if there is nothing that looks like an extension.
pub fn determine_ext(url: &str) -> Option<String> {
    let path = match Url::parse(url) {
        Ok(parsed) => parsed.path().to_string(),
        Err(_) => url
            .split(|c: char| c == '?' || c == '#')
            .next()
            .unwrap_or_default()
            .to_string(),
    };

    // "x.mp4/" still counts as mp4.
    let path = path.strip_suffix('/').unwrap_or(path.as_str());
    let segment = path.rsplit('/').next()?;
    let (_, ext) = segment.rsplit_once('.')?;

    if !ext.is_empty() && ext.chars().all(|c| c.is_ascii_alphanumeric()) {
        Some(ext.to_string())
    } else {
        None
    }
}

pub fn is_image_url(url: &str) -> bool {
    let url = url.to_lowercase();
    IMAGE_EXTENSIONS.iter().any(|ext| url.ends_with(ext))
        && !MEDIA_EXTENSIONS.iter().any(|ext| url.ends_with(ext))
}

// "template.videos[2]" -> "template_videos_2"
pub fn format_id_from_path(key_path: &str) -> String {
    key_path.replace('.', "_").replace('[', "_").replace(']', "")
}

pub fn thumbnail_id_from_path(key_path: &str) -> String {
    key_path.replace('.', "_")
}
