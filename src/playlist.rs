//! Sliding-window HLS media playlist.

use std::collections::VecDeque;
use std::fmt::Write as _;
use std::fs;
use std::path::PathBuf;

use url::Url;

use crate::error::{PipelineError, SegmentIssue};
use crate::segment::{Segment, segment_file_name};

/// Segments advertised at any one time.
pub const WINDOW_CAPACITY: usize = 3;

/// The most recent segments, oldest first.
#[derive(Debug, Clone, Default)]
pub struct PlaylistWindow {
    segments: VecDeque<Segment>,
}

impl PlaylistWindow {
    pub fn new() -> Self {
        Self {
            segments: VecDeque::with_capacity(WINDOW_CAPACITY),
        }
    }

    /// Append the newest segment, forgetting the oldest when full.
    pub fn push(&mut self, segment: Segment) {
        if self.segments.len() == WINDOW_CAPACITY {
            self.segments.pop_front();
        }
        self.segments.push_back(segment);
    }

    /// Sequence number of the oldest advertised segment, 0 while empty.
    pub fn media_sequence(&self) -> u64 {
        self.segments
            .front()
            .map(|s| s.sequence_number)
            .unwrap_or(0)
    }

    pub fn segments(&self) -> impl Iterator<Item = &Segment> {
        self.segments.iter()
    }

    pub fn len(&self) -> usize {
        self.segments.len()
    }

    pub fn is_empty(&self) -> bool {
        self.segments.is_empty()
    }
}

/// Renders a [`PlaylistWindow`] and publishes it into the output directory.
#[derive(Debug, Clone)]
pub struct PlaylistBuilder {
    base_url: Url,
    name_template: String,
    extension: String,
    target_duration: u64,
    path: PathBuf,
}

impl PlaylistBuilder {
    pub fn new(
        base_url: &str,
        name_template: &str,
        extension: &str,
        segment_seconds: f64,
        path: PathBuf,
    ) -> Result<Self, PipelineError> {
        let mut base_url = Url::parse(base_url).map_err(|e| {
            PipelineError::InvalidConfiguration(format!("invalid base URL '{base_url}': {e}"))
        })?;
        if base_url.cannot_be_a_base() {
            return Err(PipelineError::InvalidConfiguration(format!(
                "base URL '{base_url}' cannot hold segment paths"
            )));
        }
        // Url::join replaces the last path component unless it ends with '/'
        if !base_url.path().ends_with('/') {
            let path = format!("{}/", base_url.path());
            base_url.set_path(&path);
        }

        Ok(Self {
            base_url,
            name_template: name_template.to_string(),
            extension: extension.to_string(),
            target_duration: segment_seconds.ceil() as u64,
            path,
        })
    }

    /// Duration of a segment may only change through a reconfigure.
    pub fn set_target_duration(&mut self, segment_seconds: f64) {
        self.target_duration = segment_seconds.ceil() as u64;
    }

    pub fn segment_uri(&self, sequence_number: u64) -> String {
        let name = segment_file_name(&self.name_template, sequence_number, &self.extension);
        match self.base_url.join(&name) {
            Ok(url) => url.to_string(),
            // join only fails on malformed relative input, which a plain
            // file name is not
            Err(_) => format!("{}{}", self.base_url, name),
        }
    }

    /// Render the manifest. Same window in, same bytes out.
    pub fn render(&self, window: &PlaylistWindow) -> String {
        let mut out = String::with_capacity(128 + window.len() * 64);
        out.push_str("#EXTM3U\n");
        out.push_str("#EXT-X-VERSION:3\n");
        let _ = writeln!(out, "#EXT-X-TARGETDURATION:{}", self.target_duration);
        let _ = writeln!(out, "#EXT-X-MEDIA-SEQUENCE:{}", window.media_sequence());
        for segment in window.segments() {
            let _ = writeln!(out, "#EXTINF:{},", segment.duration_seconds);
            out.push_str(&self.segment_uri(segment.sequence_number));
            out.push('\n');
        }
        out
    }

    /// Write the manifest to a sibling temp file, then rename it over the
    /// published path so readers never see a partial file.
    pub fn publish(&self, window: &PlaylistWindow) -> Result<(), SegmentIssue> {
        let manifest = self.render(window);
        let tmp_path = self.tmp_path();

        let result = fs::write(&tmp_path, manifest.as_bytes())
            .and_then(|()| fs::rename(&tmp_path, &self.path));
        if let Err(source) = result {
            let _ = fs::remove_file(&tmp_path);
            return Err(SegmentIssue::PlaylistWriteFailure {
                path: self.path.clone(),
                source,
            });
        }
        Ok(())
    }

    fn tmp_path(&self) -> PathBuf {
        let mut name = self
            .path
            .file_name()
            .map(|n| n.to_os_string())
            .unwrap_or_default();
        name.push(".tmp");
        self.path.with_file_name(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    fn segment(seq: u64) -> Segment {
        Segment {
            sequence_number: seq,
            sample_count: 220_500,
            duration_seconds: 5.0,
            file_path: PathBuf::from(format!("/var/www/test-{seq}.mp3")),
        }
    }

    fn builder(path: PathBuf) -> PlaylistBuilder {
        PlaylistBuilder::new("http://192.168.1.146", "test", "mp3", 5.0, path).unwrap()
    }

    fn window_of(seqs: impl IntoIterator<Item = u64>) -> PlaylistWindow {
        let mut window = PlaylistWindow::new();
        for seq in seqs {
            window.push(segment(seq));
        }
        window
    }

    fn sequences(window: &PlaylistWindow) -> Vec<u64> {
        window.segments().map(|s| s.sequence_number).collect()
    }

    #[test]
    fn window_fills_then_slides() {
        let mut window = window_of(0..3);
        assert_eq!(sequences(&window), vec![0, 1, 2]);
        assert_eq!(window.media_sequence(), 0);

        window.push(segment(3));
        assert_eq!(sequences(&window), vec![1, 2, 3]);
        assert_eq!(window.media_sequence(), 1);
    }

    #[test]
    fn window_never_exceeds_capacity() {
        let mut window = PlaylistWindow::new();
        for n in 0..20u64 {
            window.push(segment(n));
            assert!(window.len() <= WINDOW_CAPACITY);
            assert_eq!(window.segments().last().unwrap().sequence_number, n);
            if n >= 2 {
                assert_eq!(sequences(&window), vec![n - 2, n - 1, n]);
                assert_eq!(window.media_sequence(), n - 2);
            }
        }
    }

    #[test]
    fn renders_full_manifest() {
        let text = builder(PathBuf::from("index.m3u8")).render(&window_of(4..7));
        assert_eq!(
            text,
            "#EXTM3U\n\
             #EXT-X-VERSION:3\n\
             #EXT-X-TARGETDURATION:5\n\
             #EXT-X-MEDIA-SEQUENCE:4\n\
             #EXTINF:5,\n\
             http://192.168.1.146/test-4.mp3\n\
             #EXTINF:5,\n\
             http://192.168.1.146/test-5.mp3\n\
             #EXTINF:5,\n\
             http://192.168.1.146/test-6.mp3\n"
        );
    }

    #[test]
    fn render_is_idempotent() {
        let b = builder(PathBuf::from("index.m3u8"));
        let window = window_of(0..2);
        assert_eq!(b.render(&window), b.render(&window));
    }

    #[test]
    fn target_duration_rounds_up() {
        let b = PlaylistBuilder::new("http://host/", "s", "mp3", 2.5, PathBuf::from("i")).unwrap();
        assert!(b.render(&PlaylistWindow::new()).contains("#EXT-X-TARGETDURATION:3\n"));
    }

    #[test]
    fn uris_keep_base_path() {
        let b = PlaylistBuilder::new(
            "https://example.org/live/nursery",
            "room a",
            "mp3",
            5.0,
            PathBuf::from("index.m3u8"),
        )
        .unwrap();
        assert_eq!(
            b.segment_uri(9),
            "https://example.org/live/nursery/room%20a-9.mp3"
        );
    }

    #[test]
    fn rejects_unusable_base_url() {
        assert!(PlaylistBuilder::new("not a url", "s", "mp3", 5.0, PathBuf::new()).is_err());
        assert!(PlaylistBuilder::new("mailto:a@b", "s", "mp3", 5.0, PathBuf::new()).is_err());
    }

    #[test]
    fn publish_replaces_index_file() {
        let dir = std::env::temp_dir().join(format!("hlsrec-playlist-{}", Uuid::new_v4()));
        fs::create_dir_all(&dir).unwrap();
        let path = dir.join("index.m3u8");
        let b = builder(path.clone());

        b.publish(&window_of(0..1)).unwrap();
        b.publish(&window_of(0..4)).unwrap();

        let text = fs::read_to_string(&path).unwrap();
        assert_eq!(text, b.render(&window_of(1..4)));
        assert!(!dir.join("index.m3u8.tmp").exists());
        fs::remove_dir_all(&dir).unwrap();
    }

    #[test]
    fn publish_reports_missing_directory() {
        let dir = std::env::temp_dir().join(format!("hlsrec-missing-{}", Uuid::new_v4()));
        let b = builder(dir.join("index.m3u8"));
        assert!(matches!(
            b.publish(&window_of(0..1)),
            Err(SegmentIssue::PlaylistWriteFailure { .. })
        ));
    }
}
