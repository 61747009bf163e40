use std::fs;
use std::path::Path;
use serde::Deserialize;

#[derive(Deserialize)]
struct Config {
    application: Application,
    capture: Capture,
    segment: Segment,
    detector: Detector,
    encoder: Encoder,
    publish: Publish,
}

#[derive(Deserialize)]
struct Application {
    name: String,
    version: String,
}

#[derive(Deserialize)]
struct Capture {
    device: String,
    sample_rate: u32,
    channels: u32,
}

#[derive(Deserialize)]
struct Segment {
    seconds: f64,
    limit: u64,
}

#[derive(Deserialize)]
struct Detector {
    level: i32,
    intensity: u32,
    stride: usize,
    positive_only: bool,
}

#[derive(Deserialize)]
struct Encoder {
    bitrate_kbps: u32,
    quality: u8,
}

#[derive(Deserialize)]
struct Publish {
    output_dir: String,
    base_url: String,
    name: String,
    playlist: String,
}

// Reads config.toml at compile time and exports the defaults as env vars
fn main() {
    println!("cargo:rerun-if-changed=config.toml");

    let config_path = Path::new("config.toml");
    if !config_path.exists() {
        panic!("config.toml not found!");
    }

    let config_str = fs::read_to_string(config_path).expect("Failed to read config.toml");
    let config: Config = toml::from_str(&config_str).expect("Failed to parse config.toml");

    println!("cargo:rustc-env=APP_NAME={}", config.application.name);
    println!("cargo:rustc-env=APP_VERSION={}", config.application.version);

    // Capture
    println!("cargo:rustc-env=CAPTURE_DEVICE={}", config.capture.device);
    println!("cargo:rustc-env=CAPTURE_SAMPLE_RATE={}", config.capture.sample_rate);
    println!("cargo:rustc-env=CAPTURE_CHANNELS={}", config.capture.channels);

    // Segmenting
    println!("cargo:rustc-env=SEGMENT_SECONDS={}", config.segment.seconds);
    println!("cargo:rustc-env=SEGMENT_LIMIT={}", config.segment.limit);

    // Loudness detector
    println!("cargo:rustc-env=DETECTOR_LEVEL={}", config.detector.level);
    println!("cargo:rustc-env=DETECTOR_INTENSITY={}", config.detector.intensity);
    println!("cargo:rustc-env=DETECTOR_STRIDE={}", config.detector.stride);
    println!("cargo:rustc-env=DETECTOR_POSITIVE_ONLY={}", config.detector.positive_only);

    // Encoder
    println!("cargo:rustc-env=ENCODER_BITRATE_KBPS={}", config.encoder.bitrate_kbps);
    println!("cargo:rustc-env=ENCODER_QUALITY={}", config.encoder.quality);

    // Publishing
    println!("cargo:rustc-env=PUBLISH_OUTPUT_DIR={}", config.publish.output_dir);
    println!("cargo:rustc-env=PUBLISH_BASE_URL={}", config.publish.base_url);
    println!("cargo:rustc-env=PUBLISH_NAME={}", config.publish.name);
    println!("cargo:rustc-env=PUBLISH_PLAYLIST={}", config.publish.playlist);
}
