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
// - Viggle handler -

use crate::definitions::{ExtractContext, SiteDefinition};
use crate::errors::ViggleError;
use crate::ffprobe::{ProbeError, ProbeResult};
use crate::helpers::{
    determine_ext, float_or_none, format_id_from_path, int_or_none, is_image_url,
    thumbnail_id_from_path,
};
use crate::info::{Format, InfoDict, Thumbnail};

use anyhow::Result;
use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::{json, Value};
use std::collections::HashSet;
use tracing::{debug, warn};

const API_URL: &str = "https://viggle.ai/api/share/video-task?id=";

// Format ids that point to the rendered (HD) result of a task.
const PREFERRED_FORMAT_IDS: &[&str] = &["result", "template_processedHdURL"];

// Containers ffprobe lists next to mp4 that we'd rather not name a file after.
const UNDESIRED_CONTAINERS: &[&str] = &["mov", "m4a", "3gp", "3g2", "mj2"];

static VALID_URL: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^https?://viggle\.ai/(?:[^/]+/)?(?P<id>[0-9a-f\-]+)").unwrap()
});

static MEDIA_URL: Lazy<Regex> = Lazy::new(|| Regex::new(r#"^https?://[^\s"'<>]+"#).unwrap());

fn match_id(url: &str) -> Option<String> {
    VALID_URL
        .captures(url)
        .and_then(|c| c.name("id"))
        .map(|m| m.as_str().to_string())
}

// Walks <value> depth-first and records every string that looks like a URL
// together with its key path ("a.b[0].c").
pub fn collect_urls(value: &Value, prefix: &str, out: &mut Vec<(String, String)>) {
    match value {
        Value::Object(map) => {
            for (k, v) in map {
                let nk = if prefix.is_empty() {
                    k.to_string()
                } else {
                    format!("{}.{}", prefix, k)
                };
                collect_urls(v, &nk, out);
            }
        }
        Value::Array(items) => {
            for (i, v) in items.iter().enumerate() {
                let nk = if prefix.is_empty() {
                    i.to_string()
                } else {
                    format!("{}[{}]", prefix, i)
                };
                collect_urls(v, &nk, out);
            }
        }
        Value::String(s) if MEDIA_URL.is_match(s) => {
            out.push((prefix.to_string(), s.to_string()));
        }
        _ => {}
    }
}

// Picks a file extension from what ffprobe found, falling back to
// the URL and then to the codecs.
pub fn choose_extension(info: &ProbeResult, vcodec: &str, acodec: &str, media_url: &str) -> String {
    let format_name = info
        .format
        .as_ref()
        .and_then(|f| f.format_name.as_deref())
        .unwrap_or_default();
    let candidates: Vec<String> = format_name
        .split(',')
        .map(|c| c.trim().to_lowercase())
        .filter(|c| !c.is_empty())
        .collect();

    let has_video = vcodec != "none";
    let has_audio = acodec != "none";

    // ffprobe reports "mov,mp4,m4a,3gp,3g2,mj2" for the whole ISO family.
    // With both video and audio, mp4 is what people expect.
    if has_video && has_audio && !candidates.is_empty() {
        if candidates.iter().any(|c| c == "mp4") {
            return "mp4".to_string();
        }
        if let Some(c) = candidates
            .iter()
            .find(|c| !UNDESIRED_CONTAINERS.contains(&c.as_str()))
        {
            return c.to_string();
        }
        return candidates[0].to_string();
    }

    if let Some(c) = candidates.first() {
        return c.to_string();
    }

    if let Some(ext) = determine_ext(media_url) {
        if ext != "bin" {
            return ext;
        }
    }

    if has_video {
        "mp4".to_string()
    } else if has_audio {
        "mp3".to_string()
    } else {
        "bin".to_string()
    }
}

fn probe_warning(media_url: &str, err: &ProbeError) -> String {
    format!("ffprobe failed on {}: {}", media_url, err)
}

fn quality_for(format_id: &str) -> i32 {
    if PREFERRED_FORMAT_IDS.contains(&format_id) {
        1
    } else {
        0
    }
}

// Builds a format entry from a probe result. None if ffprobe saw no streams.
fn build_format(key_path: &str, media_url: &str, info: &ProbeResult) -> Option<Format> {
    let streams = info.streams.as_ref()?;

    let mut vcodec = "none".to_string();
    let mut acodec = "none".to_string();
    let mut width = None;
    let mut height = None;

    for s in streams {
        match s.codec_type.as_deref() {
            Some("video") => {
                if let Some(name) = s.codec_name.as_deref().filter(|n| !n.is_empty()) {
                    vcodec = name.to_string();
                }
                width = int_or_none(s.width.as_ref());
                height = int_or_none(s.height.as_ref());
            }
            Some("audio") => {
                if let Some(name) = s.codec_name.as_deref().filter(|n| !n.is_empty()) {
                    acodec = name.to_string();
                }
            }
            _ => {}
        }
    }

    let format_id = format_id_from_path(key_path);
    let ext = choose_extension(info, &vcodec, &acodec, media_url);

    Some(Format {
        quality: quality_for(&format_id),
        format_id,
        url: media_url.to_string(),
        ext,
        vcodec,
        acodec,
        width,
        height,
        duration: float_or_none(info.format.as_ref().and_then(|f| f.duration.as_ref())),
        filesize: int_or_none(info.format.as_ref().and_then(|f| f.size.as_ref())),
    })
}

fn collect_thumbnails(data: &Value, url_list: &[(String, String)]) -> Vec<Thumbnail> {
    let mut thumbnails = Vec::new();
    let mut seen = HashSet::new();

    let mut add_thumb = |id: String, url: &str| {
        if is_image_url(url) && seen.insert(url.to_string()) {
            thumbnails.push(Thumbnail {
                id,
                url: url.to_string(),
            });
        }
    };

    for (key_path, image_url) in url_list {
        add_thumb(thumbnail_id_from_path(key_path), image_url.as_str());
    }

    if let Some(cover) = data["resultCover"].as_str() {
        add_thumb("result_cover".to_string(), cover);
    }

    thumbnails
}

fn first_text<'v>(candidates: &[&'v Value]) -> Option<&'v str> {
    candidates
        .iter()
        .copied()
        .filter_map(Value::as_str)
        .find(|s| !s.is_empty())
}

fn pick_title(data: &Value, video_id: &str) -> String {
    first_text(&[
        &data["name"],
        &data["template"]["webCommand"],
        &data["template"]["command"],
        &data["rap"]["title"],
        &data["user"]["nickname"],
    ])
    .unwrap_or(video_id)
    .to_string()
}

// Implement the site definition:
struct ViggleHandler;
impl SiteDefinition for ViggleHandler {
    fn can_handle_url<'a>(&'a self, url: &'a str) -> bool {
        VALID_URL.is_match(url)
    }

    fn display_name<'a>(&'a self) -> String {
        "Viggle".to_string()
    }

    fn extract<'a>(&'a self, url: &'a str, ctx: &ExtractContext<'_>) -> Result<InfoDict> {
        let video_id = match_id(url).ok_or_else(|| ViggleError::UnsupportedUrl(url.to_string()))?;

        // 1. Ask the share API about this task.
        let api_url = format!("{}{}", API_URL, urlencoding::encode(&video_id));
        let json_data = ctx.http.get_json(&api_url, ctx.user_agent)?;
        let data = match json_data.get("data") {
            Some(d) if !d.is_null() => d.clone(),
            _ => json!({}),
        };

        // 2. The response hides media all over the place. Grab every URL.
        let mut url_list = Vec::new();
        collect_urls(&data, "", &mut url_list);
        debug!(count = url_list.len(), "collected URLs");

        // 3. Let ffprobe decide what each of them actually is.
        let mut formats = Vec::new();
        let mut processed_urls = HashSet::new();

        for (key_path, media_url) in &url_list {
            if !processed_urls.insert(media_url.as_str()) {
                continue;
            }

            let info = match ctx.prober.probe(media_url, ctx.user_agent) {
                Ok(info) => info,
                Err(e) => {
                    warn!("{}", probe_warning(media_url, &e));
                    continue;
                }
            };

            if let Some(format) = build_format(key_path, media_url, &info) {
                formats.push(format);
            }
        }

        if formats.is_empty() {
            return Err(ViggleError::NoPlayableFormats.into());
        }

        // 4. Thumbnails.
        let thumbnails = collect_thumbnails(&data, &url_list);

        // 5. Title and the rest.
        let title = pick_title(&data, &video_id);
        let description = first_text(&[&data["description"], &data["rap"]["lyrics"]])
            .map(str::to_string);
        let uploader = first_text(&[&data["user"]["nickname"]]).map(str::to_string);

        Ok(InfoDict {
            id: video_id,
            title,
            formats,
            thumbnails,
            description,
            duration: float_or_none(data.get("videoDuration")),
            uploader,
            extractor: self.display_name(),
            webpage_url: url.to_string(),
        })
    }
}

// Push the site definition to the list of known handlers:
inventory::submit! {
    &ViggleHandler as &dyn SiteDefinition
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agent::JsonSource;
    use crate::ffprobe::{parse_output, Prober};
    use std::cell::RefCell;
    use std::collections::HashMap;

    const ID: &str = "0a1b2c3d-4e5f-6789-abcd-ef0123456789";

    struct FakeHttp {
        body: Value,
        requested: RefCell<Vec<(String, String)>>,
    }

    impl FakeHttp {
        fn new(body: Value) -> Self {
            Self {
                body,
                requested: RefCell::new(Vec::new()),
            }
        }
    }

    impl JsonSource for FakeHttp {
        fn get_json(&self, url: &str, user_agent: &str) -> Result<Value> {
            self.requested
                .borrow_mut()
                .push((url.to_string(), user_agent.to_string()));
            Ok(self.body.clone())
        }
    }

    // Answers with canned ffprobe output; unknown URLs fail like ffprobe would.
    struct FakeProber {
        outputs: HashMap<String, Value>,
        calls: RefCell<Vec<(String, String)>>,
    }

    impl FakeProber {
        fn new(outputs: &[(&str, Value)]) -> Self {
            Self {
                outputs: outputs
                    .iter()
                    .map(|(u, v)| (u.to_string(), v.clone()))
                    .collect(),
                calls: RefCell::new(Vec::new()),
            }
        }
    }

    impl Prober for FakeProber {
        fn probe(&self, url: &str, user_agent: &str) -> Result<ProbeResult, ProbeError> {
            self.calls
                .borrow_mut()
                .push((url.to_string(), user_agent.to_string()));
            match self.outputs.get(url) {
                Some(v) => parse_output(v.to_string().as_bytes()),
                None => Err(ProbeError::Status("HTTP error 404 Not Found".to_string())),
            }
        }
    }

    fn av_probe() -> Value {
        json!({
            "streams": [
                {"codec_type": "video", "codec_name": "h264", "width": 720, "height": 1280},
                {"codec_type": "audio", "codec_name": "aac"}
            ],
            "format": {"format_name": "mov,mp4,m4a,3gp,3g2,mj2", "duration": "8.5", "size": "1000"}
        })
    }

    fn probe_of(format_name: &str, streams: Value) -> ProbeResult {
        parse_output(
            json!({"streams": streams, "format": {"format_name": format_name}})
                .to_string()
                .as_bytes(),
        )
        .unwrap()
    }

    fn run(body: Value, prober: &FakeProber) -> Result<InfoDict> {
        let http = FakeHttp::new(body);
        let ctx = ExtractContext {
            user_agent: "test-agent",
            http: &http,
            prober,
        };
        ViggleHandler.extract(&format!("https://viggle.ai/share/{}", ID), &ctx)
    }

    #[test]
    fn matches_share_urls() {
        assert!(ViggleHandler.can_handle_url(&format!("https://viggle.ai/share/{}", ID)));
        assert!(ViggleHandler.can_handle_url(&format!("http://viggle.ai/{}", ID)));
        assert!(!ViggleHandler.can_handle_url("https://notviggle.ai/share/abc"));
        assert!(!ViggleHandler.can_handle_url("https://youtube.com/watch?v=abc"));
        assert_eq!(match_id(&format!("https://viggle.ai/share/{}", ID)).as_deref(), Some(ID));
        assert_eq!(match_id(&format!("https://viggle.ai/{}?x=1", ID)).as_deref(), Some(ID));
    }

    #[test]
    fn collects_urls_with_key_paths() {
        let data = json!({
            "result": "https://cdn.viggle.ai/r.mp4",
            "name": "not a url",
            "template": {"processedHdURL": "https://cdn.viggle.ai/hd.mp4", "id": 7},
            "covers": ["https://cdn.viggle.ai/a.jpg", {"url": "http://cdn.viggle.ai/b.png"}],
            "embedded": "see https://cdn.viggle.ai/x.mp4",
            "empty": "https://"
        });
        let mut out = Vec::new();
        collect_urls(&data, "", &mut out);
        assert_eq!(
            out,
            vec![
                ("result".to_string(), "https://cdn.viggle.ai/r.mp4".to_string()),
                ("template.processedHdURL".to_string(), "https://cdn.viggle.ai/hd.mp4".to_string()),
                ("covers[0]".to_string(), "https://cdn.viggle.ai/a.jpg".to_string()),
                ("covers[1].url".to_string(), "http://cdn.viggle.ai/b.png".to_string()),
            ]
        );
    }

    #[test]
    fn collects_urls_from_top_level_array() {
        let mut out = Vec::new();
        collect_urls(&json!(["https://a.example/1.mp4", ["https://a.example/2.mp4"]]), "", &mut out);
        assert_eq!(out[0].0, "0");
        assert_eq!(out[1].0, "1[0]");
    }

    #[test]
    fn extension_prefers_mp4_for_audio_and_video() {
        let info = probe_of("mov,mp4,m4a,3gp,3g2,mj2", json!([]));
        assert_eq!(choose_extension(&info, "h264", "aac", "https://a/x"), "mp4");

        let info = probe_of("mov,m4a,matroska", json!([]));
        assert_eq!(choose_extension(&info, "h264", "aac", "https://a/x"), "matroska");

        let info = probe_of("mov,m4a", json!([]));
        assert_eq!(choose_extension(&info, "h264", "aac", "https://a/x"), "mov");
    }

    #[test]
    fn extension_for_single_stream_takes_first_candidate() {
        let info = probe_of("MOV, mp4", json!([]));
        assert_eq!(choose_extension(&info, "h264", "none", "https://a/x"), "mov");
        let info = probe_of("png_pipe", json!([]));
        assert_eq!(choose_extension(&info, "png", "none", "https://a/x.png"), "png_pipe");
    }

    #[test]
    fn extension_fallbacks() {
        let info = ProbeResult::default();
        assert_eq!(choose_extension(&info, "none", "none", "https://a/clip.webm?sig=1"), "webm");
        assert_eq!(choose_extension(&info, "none", "none", "https://a/clip.bin"), "bin");
        assert_eq!(choose_extension(&info, "h264", "none", "https://a/clip"), "mp4");
        assert_eq!(choose_extension(&info, "none", "opus", "https://a/clip"), "mp3");
        assert_eq!(choose_extension(&info, "none", "none", "https://a/clip"), "bin");
    }

    #[test]
    fn quality_marks_result_and_hd() {
        assert_eq!(quality_for("result"), 1);
        assert_eq!(quality_for("template_processedHdURL"), 1);
        assert_eq!(quality_for("template_processedURL"), 0);
    }

    #[test]
    fn stream_summary_uses_last_video_stream() {
        let info = probe_of(
            "mp4",
            json!([
                {"codec_type": "video", "codec_name": "h264", "width": 100, "height": 200},
                {"codec_type": "video", "codec_name": "mjpeg"},
                {"codec_type": "data"}
            ]),
        );
        let f = build_format("result", "https://a/r.mp4", &info).unwrap();
        assert_eq!(f.vcodec, "mjpeg");
        assert_eq!(f.acodec, "none");
        assert_eq!(f.width, None);
        assert_eq!(f.quality, 1);
    }

    #[test]
    fn extracts_formats_thumbnails_and_metadata() {
        let body = json!({
            "code": 0,
            "data": {
                "result": "https://cdn.viggle.ai/result.mp4",
                "resultCover": "https://cdn.viggle.ai/cover.jpg",
                "videoDuration": "8.5",
                "name": "",
                "template": {
                    "webCommand": "dance like nobody is watching",
                    "processedHdURL": "https://cdn.viggle.ai/hd.mp4",
                    "cover": "https://cdn.viggle.ai/cover.jpg"
                },
                "rap": {"lyrics": "la la la"},
                "user": {"nickname": "mover", "avatar": "https://cdn.viggle.ai/avatar.png"},
                "mirror": "https://cdn.viggle.ai/result.mp4"
            }
        });
        let prober = FakeProber::new(&[
            ("https://cdn.viggle.ai/result.mp4", av_probe()),
            ("https://cdn.viggle.ai/hd.mp4", av_probe()),
        ]);

        let http = FakeHttp::new(body);
        let ctx = ExtractContext {
            user_agent: "test-agent",
            http: &http,
            prober: &prober,
        };
        let info = ViggleHandler
            .extract(&format!("https://viggle.ai/share/{}", ID), &ctx)
            .unwrap();

        assert_eq!(
            http.requested.borrow()[0],
            (format!("{}{}", API_URL, ID), "test-agent".to_string())
        );

        // Every distinct URL is probed once, with our User-Agent.
        let calls = prober.calls.borrow();
        assert_eq!(calls.len(), 4);
        assert!(calls.iter().all(|(_, ua)| ua == "test-agent"));

        assert_eq!(info.id, ID);
        assert_eq!(info.title, "dance like nobody is watching");
        assert_eq!(info.formats.len(), 2);
        assert_eq!(info.formats[0].format_id, "result");
        assert_eq!(info.formats[0].ext, "mp4");
        assert_eq!(info.formats[0].quality, 1);
        assert_eq!(info.formats[0].duration, Some(8.5));
        assert_eq!(info.formats[0].filesize, Some(1000));
        assert_eq!(info.formats[1].format_id, "template_processedHdURL");
        assert_eq!(info.formats[1].quality, 1);

        let thumbs: Vec<(&str, &str)> = info
            .thumbnails
            .iter()
            .map(|t| (t.id.as_str(), t.url.as_str()))
            .collect();
        assert_eq!(
            thumbs,
            vec![
                ("resultCover", "https://cdn.viggle.ai/cover.jpg"),
                ("user_avatar", "https://cdn.viggle.ai/avatar.png"),
            ]
        );

        assert_eq!(info.description.as_deref(), Some("la la la"));
        assert_eq!(info.uploader.as_deref(), Some("mover"));
        assert_eq!(info.duration, Some(8.5));
        assert_eq!(info.extractor, "Viggle");
    }

    #[test]
    fn failed_probes_are_skipped() {
        let body = json!({"data": {
            "broken": "https://cdn.viggle.ai/gone.mp4",
            "result": "https://cdn.viggle.ai/result.mp4"
        }});
        let prober = FakeProber::new(&[("https://cdn.viggle.ai/result.mp4", av_probe())]);
        let info = run(body, &prober).unwrap();
        assert_eq!(info.formats.len(), 1);
        assert_eq!(info.formats[0].format_id, "result");
        assert_eq!(prober.calls.borrow().len(), 2);
    }

    #[test]
    fn failed_probe_warning_names_url_and_stderr() {
        let err = FakeProber::new(&[])
            .probe("https://cdn.viggle.ai/gone.mp4", "test-agent")
            .unwrap_err();
        assert_eq!(
            probe_warning("https://cdn.viggle.ai/gone.mp4", &err),
            "ffprobe failed on https://cdn.viggle.ai/gone.mp4: ffprobe error:\nHTTP error 404 Not Found"
        );

        let err = ProbeError::Status("no stderr".to_string());
        assert!(probe_warning("https://a/x", &err).ends_with("ffprobe error:\nno stderr"));
    }

    #[test]
    fn probe_without_streams_is_skipped() {
        let body = json!({"data": {"a": "https://cdn.viggle.ai/a.mp4"}});
        let prober = FakeProber::new(&[("https://cdn.viggle.ai/a.mp4", json!({"format": {}}))]);
        let err = run(body, &prober).unwrap_err();
        assert!(matches!(
            err.downcast_ref::<ViggleError>(),
            Some(ViggleError::NoPlayableFormats)
        ));
    }

    #[test]
    fn no_playable_formats_is_an_expected_error() {
        let prober = FakeProber::new(&[]);
        let err = run(json!({"data": null}), &prober).unwrap_err();
        let err = err.downcast_ref::<ViggleError>().unwrap();
        assert!(err.is_expected());
        assert!(prober.calls.borrow().is_empty());
    }

    #[test]
    fn cover_is_added_when_not_harvested_as_image() {
        let data = json!({"resultCover": "https://cdn.viggle.ai/cover.webp"});
        let thumbs = collect_thumbnails(&data, &[]);
        assert_eq!(
            thumbs,
            vec![Thumbnail {
                id: "result_cover".to_string(),
                url: "https://cdn.viggle.ai/cover.webp".to_string()
            }]
        );
        let data = json!({"resultCover": "https://cdn.viggle.ai/cover.mp4"});
        assert!(collect_thumbnails(&data, &[]).is_empty());
    }

    #[test]
    fn title_falls_back_in_order() {
        assert_eq!(pick_title(&json!({"name": "Named"}), ID), "Named");
        assert_eq!(pick_title(&json!({"template": {"command": "cmd"}}), ID), "cmd");
        assert_eq!(pick_title(&json!({"rap": {"title": "Song"}}), ID), "Song");
        assert_eq!(pick_title(&json!({"user": {"nickname": "nick"}}), ID), "nick");
        assert_eq!(pick_title(&json!({"name": 42}), ID), ID);
        assert_eq!(pick_title(&json!({}), ID), ID);
    }
}
