mod common;

use common::Harness;
use speechbot_core::{AudioFormat, SpeechBot};
use std::fs::File;
use std::sync::Arc;
use std::time::{Duration, SystemTime};

fn backdate(path: &std::path::Path, age: Duration) {
    let file = File::options().write(true).open(path).unwrap();
    file.set_modified(SystemTime::now() - age).unwrap();
}

#[tokio::test]
async fn start_sweeps_leftovers_and_shutdown_empties_the_directory() {
    let h = Harness::new();
    let bot = SpeechBot::new(Arc::clone(&h.dispatcher), Arc::clone(&h.artifacts));

    std::fs::create_dir_all(h.audio_dir()).unwrap();
    let stale = h.audio_dir().join("audio_leftover.mp3");
    std::fs::write(&stale, b"old").unwrap();
    backdate(&stale, Duration::from_secs(2 * 3600));
    let recent = h
        .artifacts
        .save(b"new", &h.artifacts.generate_name(AudioFormat::Mp3))
        .await
        .unwrap();

    bot.start().await.unwrap();
    assert!(!stale.exists());
    assert!(recent.exists());

    bot.shutdown().await.unwrap();
    assert!(h.audio_files().is_empty());
}

#[tokio::test]
async fn periodic_sweep_uses_max_age() {
    let h = Harness::new();
    let bot = SpeechBot::new(Arc::clone(&h.dispatcher), Arc::clone(&h.artifacts));
    bot.start().await.unwrap();

    let day_old = h.artifacts.save(b"x", "audio_day_old.mp3").await.unwrap();
    let hour_old = h.artifacts.save(b"x", "audio_hour_old.mp3").await.unwrap();
    backdate(&day_old, Duration::from_secs(25 * 3600));
    backdate(&hour_old, Duration::from_secs(2 * 3600));

    assert_eq!(bot.sweep_stale().await.unwrap(), 1);
    assert!(!day_old.exists());
    assert!(hour_old.exists());
}
