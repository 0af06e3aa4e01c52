//! Smoke test wiring configuration loading to a running finder

use ndifind_core::AppConfig;
use ndifind_discovery::{Finder, MemoryBackend, RawSource, SourceEventKind};
use std::io::Write;
use std::time::Duration;

#[tokio::test(flavor = "multi_thread")]
async fn test_config_file_to_running_finder() {
    let mut file = tempfile::Builder::new().suffix(".yaml").tempfile().unwrap();
    writeln!(
        file,
        "finder:\n  show_local_sources: true\n  groups: [public]\n  event_buffer: 8"
    )
    .unwrap();

    let config = AppConfig::from_config_builder(file.path()).unwrap();
    config.validate().unwrap();

    let backend = MemoryBackend::new();
    let finder = Finder::with_backend(config.finder.clone(), &backend).unwrap();
    let events = finder.subscribe().unwrap();

    let settings = backend.last_settings().unwrap();
    assert!(settings.show_local_sources);
    assert_eq!(settings.groups.as_deref(), Some("public"));
    assert_eq!(settings.extra_ips, None);

    backend.set_sources(vec![RawSource::new(
        "STUDIO-PC (Camera 1)",
        "192.168.1.20:5961",
    )]);

    let event = tokio::time::timeout(Duration::from_secs(5), events.recv())
        .await
        .expect("timed out waiting for discovery")
        .unwrap();
    assert_eq!(event.kind, SourceEventKind::Found);
    assert_eq!(event.source.machine_name(), Some("STUDIO-PC"));

    // Events go out before the snapshot is published
    let deadline = tokio::time::Instant::now() + Duration::from_secs(5);
    while finder.sources().len() != 1 && tokio::time::Instant::now() < deadline {
        tokio::time::sleep(Duration::from_millis(10)).await;
    }

    let sources = finder.sources();
    assert_eq!(sources.len(), 1);
    assert_eq!(
        sources[0].socket_addr(),
        Some("192.168.1.20:5961".parse().unwrap())
    );

    tokio::task::spawn_blocking(move || finder.close())
        .await
        .unwrap();
    assert_eq!(backend.open_sessions(), 0);
}
