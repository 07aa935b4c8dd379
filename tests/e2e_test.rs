mod support;

use moodbot::config::Settings;
use moodbot::content::PlaylistCurator;
use moodbot::gateway::{InMemoryBroker, InMemoryCatalog};
use moodbot::mood::{derive_mood, Mood};
use moodbot::*;
use std::sync::Arc;
use std::time::Duration;
use support::{closed_clock, open_clock, tracks, RecordingScheduler};

#[tokio::test]
async fn test_e2e_paper_session() {
    // Initialize logging
    let _ = tracing_subscriber::fmt::try_init();

    println!("=== Starting E2E Test ===\n");

    // 1. Mood of the default observations
    println!("1. Deriving mood...");
    let settings = Settings::default();
    let mood = derive_mood(&settings.observations);
    assert_eq!(mood, Some(Mood::Happy));
    println!("   ✓ Mood: happy");

    // 2. Paper backends: a closed morning, three trading ticks, then the closing window
    println!("\n2. Building paper broker and catalog...");
    let broker = Arc::new(
        InMemoryBroker::scripted(vec![
            closed_clock(),
            open_clock(180),
            open_clock(120),
            open_clock(60),
            open_clock(19),
        ])
        .with_position("MSFT", 4),
    );
    let catalog = Arc::new(InMemoryCatalog::new("listener").with_fallback_items(tracks(25)));

    let curator = PlaylistCurator::connect(
        catalog.clone(),
        settings.observations.clone(),
        Duration::from_secs(1),
    )
    .await
    .expect("content account should resolve")
    .with_seed(3);
    println!("   ✓ Curator connected");

    // 3. Run the loop until the closing sweep ends it
    println!("\n3. Running control loop...");
    let (scheduler, sleeps) = RecordingScheduler::unbounded();
    let mut control = ControlLoop::new(
        &settings,
        broker.clone(),
        broker.clone(),
        Some(curator),
        Box::new(scheduler),
    );

    let report = match control.run().await {
        LoopExit::SweepCompleted(report) => report,
        other => panic!("loop ended without a sweep: {:?}", other),
    };
    println!(
        "   ✓ Sweep: {} closed, {} failed",
        report.closed.len(),
        report.failed.len()
    );

    // 4. Check what happened along the way
    println!("\n4. Verifying session...");
    assert_eq!(control.phase(), LoopPhase::Stopped);
    assert_eq!(control.ticks(), 5);
    assert_eq!(
        sleeps.durations(),
        vec![
            Duration::from_secs(300),
            Duration::from_secs(60),
            Duration::from_secs(60),
            Duration::from_secs(60),
        ]
    );

    let aapl_sides: Vec<OrderSide> = broker
        .submitted_orders()
        .iter()
        .filter(|o| o.symbol == "AAPL")
        .map(|o| o.side)
        .collect();
    assert_eq!(
        aapl_sides,
        vec![OrderSide::Buy, OrderSide::Sell, OrderSide::Buy, OrderSide::Sell]
    );
    println!("   ✓ AAPL toggled buy/sell/buy and was flattened by the sweep");

    // The sweep also closed the position the bot never opened itself
    assert!(report.is_clean());
    assert_eq!(report.closed.len(), 2);
    assert!(broker.positions().is_empty());
    println!("   ✓ All positions closed");

    let playlists = catalog.playlists();
    assert_eq!(playlists.len(), 3);
    for (playlist, uris) in &playlists {
        let category = playlist
            .name
            .strip_prefix("My Playlist based on ")
            .expect("playlist name carries its category");
        assert!(Mood::Happy.categories().contains(&category));
        assert_eq!(uris.len(), 10);
    }
    println!("   ✓ {} playlists created", playlists.len());

    println!("\n=== E2E Test Complete ===");
}
