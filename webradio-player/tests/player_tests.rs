//! Directory navigation, file playback and directory sequencing

mod helpers;

use helpers::{eventually, next_event, TestRadio};
use webradio_common::persist::PersistedState;
use webradio_common::RadioEvent;
use webradio_player::player::SEQUENCER_ID;
use webradio_player::Error;

#[tokio::test]
async fn test_initial_listing() {
    let radio = TestRadio::start().await;

    let listing = radio.app.player.select_directory(None).await.unwrap();
    assert_eq!(listing.cur_dir, "/");
    assert_eq!(listing.dirs, vec!["sub"]);
    assert_eq!(listing.files, vec!["a.mp3", "b.mp3", "c.mp3"]);
    assert_eq!(listing.dur[0], (185, "03:05".to_string()));
    assert_eq!(listing.cur_file.as_deref(), Some("a.mp3"));
}

#[tokio::test]
async fn test_navigation_stays_below_root() {
    let radio = TestRadio::start().await;
    let events = radio.observe("test").await;

    let listing = radio.app.player.select_directory(Some("sub")).await.unwrap();
    assert_eq!(listing.cur_dir, "/sub/");
    assert_eq!(listing.dirs, vec![".."]);
    assert_eq!(listing.files, vec!["d.mp3"]);
    assert_eq!(
        next_event(&events, "dir_select").await.event,
        RadioEvent::DirSelect("/sub/".to_string())
    );

    let listing = radio.app.player.select_directory(Some("..")).await.unwrap();
    assert_eq!(listing.cur_dir, "/");

    for escape in ["../../etc", "..", "/../.."] {
        let result = radio.app.player.select_directory(Some(escape)).await;
        assert!(
            matches!(result, Err(Error::InvalidDirectory(_))),
            "{} escaped the root",
            escape
        );
    }

    // "/" is the root itself
    radio.app.player.select_directory(Some("sub")).await.unwrap();
    let listing = radio.app.player.select_directory(Some("/")).await.unwrap();
    assert_eq!(listing.cur_dir, "/");
    assert!(!listing.dirs.contains(&"..".to_string()));
}

#[tokio::test]
async fn test_missing_directory_is_rejected() {
    let radio = TestRadio::start().await;
    let result = radio.app.player.select_directory(Some("missing")).await;
    assert!(matches!(result, Err(Error::InvalidDirectory(_))));

    // The current directory is unchanged
    let listing = radio.app.player.select_directory(None).await.unwrap();
    assert_eq!(listing.cur_dir, "/");
}

#[tokio::test]
async fn test_play_file() {
    let radio = TestRadio::start().await;
    let events = radio.observe("test").await;

    let info = radio.app.player.play_file(Some("b.mp3"), true).await.unwrap();
    assert_eq!(info.name, "b.mp3");
    assert_eq!(info.total_pretty, "03:05");

    assert_eq!(next_event(&events, "file_info").await.text, "b.mp3: 03:05");
    next_event(&events, "play").await;
    assert_eq!(radio.decoder.loads(), 1);

    let listing = radio.app.player.select_directory(None).await.unwrap();
    assert_eq!(listing.cur_file.as_deref(), Some("b.mp3"));

    let persisted = radio.app.persisted_state().await;
    assert_eq!(persisted.player.player_file, Some(radio.root.join("b.mp3")));
}

#[tokio::test]
async fn test_play_invalid_file() {
    let radio = TestRadio::start().await;

    for file in ["missing.mp3", "../outside.mp3", "sub"] {
        let result = radio.app.player.play_file(Some(file), true).await;
        assert!(matches!(result, Err(Error::InvalidFile(_))), "{}", file);
    }
    assert_eq!(radio.decoder.loads(), 0);
}

#[tokio::test]
async fn test_restore_drops_stale_selection() {
    let mut persisted = PersistedState::default();
    persisted.player.player_dir = Some("sub".into());
    persisted.player.player_file = Some("sub/gone.mp3".into());
    let radio = TestRadio::with_state(persisted).await;

    let listing = radio.app.player.select_directory(None).await.unwrap();
    assert_eq!(listing.cur_dir, "/sub/");
    assert_eq!(listing.cur_file.as_deref(), Some("d.mp3"));
}

#[tokio::test]
async fn test_restore_falls_back_to_root() {
    let mut persisted = PersistedState::default();
    persisted.player.player_dir = Some("vanished".into());
    let radio = TestRadio::with_state(persisted).await;

    let listing = radio.app.player.select_directory(None).await.unwrap();
    assert_eq!(listing.cur_dir, "/");
}

#[tokio::test]
async fn test_play_directory_in_order() {
    let radio = TestRadio::start().await;
    let events = radio.observe("test").await;

    radio.app.player.play_directory(None).await.unwrap();
    assert!(radio.app.player.is_sequencing().await);

    let mut finished = Vec::new();
    for expected in ["a.mp3", "b.mp3", "c.mp3"] {
        let info = next_event(&events, "file_info").await;
        assert!(info.text.starts_with(expected));
        next_event(&events, "play").await;
        radio.decoder.finish_track();

        match next_event(&events, "eof").await.event.clone() {
            RadioEvent::Eof(eof) => finished.push((eof.name.unwrap_or_default(), eof.last)),
            other => panic!("Unexpected event {:?}", other),
        }
    }

    assert_eq!(
        finished,
        vec![
            ("a.mp3".to_string(), false),
            ("b.mp3".to_string(), false),
            ("c.mp3".to_string(), true),
        ]
    );

    let bus = &radio.app.bus;
    eventually("sequence end", || !bus.is_subscribed(SEQUENCER_ID)).await;
    assert!(!radio.app.player.is_sequencing().await);
    assert_eq!(radio.decoder.loads(), 3);
}

#[tokio::test]
async fn test_play_directory_from_start_file() {
    let radio = TestRadio::start().await;
    let events = radio.observe("test").await;

    let result = radio.app.player.play_directory(Some("nope.mp3")).await;
    assert!(matches!(result, Err(Error::UnknownStartFile(_))));

    radio.app.player.play_directory(Some("c.mp3")).await.unwrap();
    let info = next_event(&events, "file_info").await;
    match &info.event {
        RadioEvent::FileInfo(info) => {
            assert_eq!(info.name, "c.mp3");
            assert!(info.last);
        }
        other => panic!("Unexpected event {:?}", other),
    }
}

#[tokio::test]
async fn test_stop_cancels_sequence() {
    let radio = TestRadio::start().await;
    let events = radio.observe("test").await;

    radio.app.player.play_directory(None).await.unwrap();
    next_event(&events, "play").await;
    assert!(radio.app.bus.is_subscribed(SEQUENCER_ID));

    radio.app.player.stop().await.unwrap();

    assert!(!radio.app.player.is_sequencing().await);
    assert!(!radio.app.bus.is_subscribed(SEQUENCER_ID));
    match next_event(&events, "eof").await.event.clone() {
        RadioEvent::Eof(eof) => {
            assert_eq!(eof.name.as_deref(), Some("a.mp3"));
            assert!(eof.last);
        }
        other => panic!("Unexpected event {:?}", other),
    }
    assert_eq!(radio.decoder.loads(), 1);
}

#[tokio::test]
async fn test_new_sequence_replaces_running_one() {
    let radio = TestRadio::start().await;
    let events = radio.observe("test").await;

    radio.app.player.play_directory(None).await.unwrap();
    next_event(&events, "play").await;

    radio.app.player.play_directory(Some("b.mp3")).await.unwrap();
    let info = next_event(&events, "file_info").await;
    assert!(info.text.starts_with("b.mp3"));
    next_event(&events, "play").await;

    assert!(radio.app.player.is_sequencing().await);
    assert_eq!(radio.app.bus.subscriber_count(), 2);
    // a from the first sequence, b from the second
    assert_eq!(radio.decoder.loads(), 2);
}

#[tokio::test]
async fn test_radio_takes_over_from_sequence() {
    let radio = TestRadio::start().await;
    let events = radio.observe("test").await;

    radio.app.player.play_directory(None).await.unwrap();
    next_event(&events, "play").await;

    let mut args = webradio_player::api::Args::new();
    args.insert("nr".to_string(), "2".to_string());
    radio.app.exec("radio_play_channel", args).await.unwrap();

    assert!(!radio.app.player.is_sequencing().await);
    assert_eq!(
        radio.app.decoder.track().as_deref(),
        Some("http://radio.example/2")
    );
}

#[tokio::test]
async fn test_selection_survives_directory_without_music() {
    let radio = TestRadio::start().await;
    std::fs::create_dir(radio.root.join("docs")).unwrap();
    std::fs::write(radio.root.join("docs/readme.txt"), b"text").unwrap();

    radio.app.player.play_file(Some("b.mp3"), true).await.unwrap();
    let listing = radio.app.player.select_directory(Some("docs")).await.unwrap();
    assert!(listing.files.is_empty());
    assert_eq!(listing.cur_file, None);

    let persisted = radio.app.persisted_state().await;
    assert_eq!(persisted.player.player_file, Some(radio.root.join("b.mp3")));

    // Playing without a name still finds the last file
    radio.app.player.stop().await.unwrap();
    let info = radio.app.player.play_file(None, true).await.unwrap();
    assert_eq!(info.name, "b.mp3");
    assert_eq!(radio.decoder.loads(), 2);
}
