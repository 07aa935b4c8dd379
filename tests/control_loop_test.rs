mod support;

use moodbot::config::Settings;
use moodbot::content::PlaylistCurator;
use moodbot::execution::TradeOutcome;
use moodbot::gateway::{InMemoryBroker, InMemoryCatalog};
use moodbot::scheduler::TokioScheduler;
use moodbot::*;
use std::sync::Arc;
use std::time::{Duration, Instant};
use support::{closed_clock, open_clock, tracks, HungClock, RecordingScheduler};
use tokio_test::{assert_err, assert_ok};

const STANDARD_TICK: Duration = Duration::from_secs(60);
const CLOSED_BACKOFF: Duration = Duration::from_secs(300);

fn control_loop(
    broker: Arc<InMemoryBroker>,
    curator: Option<PlaylistCurator>,
    scheduler: RecordingScheduler,
) -> ControlLoop {
    ControlLoop::new(
        &Settings::default(),
        broker.clone(),
        broker,
        curator,
        Box::new(scheduler),
    )
}

fn curator(catalog: Arc<InMemoryCatalog>) -> PlaylistCurator {
    PlaylistCurator::new(
        catalog,
        "listener",
        Settings::default().observations,
        Duration::from_secs(1),
    )
    .with_seed(11)
}

#[tokio::test]
async fn test_clock_failure_retries_after_standard_interval() {
    let broker = Arc::new(InMemoryBroker::new(open_clock(180)));
    broker.fail_clock_polls(1);
    let (scheduler, sleeps) = RecordingScheduler::stopping_after(2);
    let mut control = control_loop(broker.clone(), None, scheduler);

    let exit = control.run().await;

    assert!(matches!(exit, LoopExit::StopRequested));
    assert_eq!(sleeps.durations(), vec![STANDARD_TICK, STANDARD_TICK]);
    assert_eq!(broker.clock_polls(), 2);
    // Tick 2 traded normally after the failed poll
    assert_eq!(broker.submitted_orders().len(), 1);
    assert_eq!(control.phase(), LoopPhase::Stopped);
}

#[tokio::test]
async fn test_sweep_continues_past_rejection_and_stops() {
    let broker = Arc::new(
        InMemoryBroker::new(open_clock(10))
            .with_position("AAPL", 10)
            .with_position("GOOGL", 5)
            .with_position("TSLA", -2)
            .reject_orders_for("GOOGL", "asset halted"),
    );
    let (scheduler, sleeps) = RecordingScheduler::unbounded();
    let mut control = control_loop(broker.clone(), None, scheduler);

    let report = match control.run().await {
        LoopExit::SweepCompleted(report) => report,
        other => panic!("expected sweep, got {:?}", other),
    };

    assert_eq!(report.attempted(), 3);
    assert_eq!(report.closed.len(), 2);
    assert_eq!(report.failed.len(), 1);
    assert_eq!(report.failed[0].position.symbol, "GOOGL");
    assert!(report.failed[0].error.contains("asset halted"));

    let closed: Vec<&str> = report.closed.iter().map(|(p, _)| p.symbol.as_str()).collect();
    assert_eq!(closed, vec!["AAPL", "TSLA"]);

    let tsla = &report.closed[1].1;
    assert_eq!((tsla.side, tsla.quantity), (OrderSide::Buy, 2));

    assert_eq!(
        broker.positions(),
        vec![Position {
            symbol: "GOOGL".to_string(),
            quantity: 5,
        }]
    );
    assert_eq!(control.phase(), LoopPhase::Stopped);
    assert!(sleeps.durations().is_empty());
}

#[tokio::test]
async fn test_session_trades_until_closing_window() {
    let broker = Arc::new(InMemoryBroker::scripted(vec![
        open_clock(180),
        open_clock(120),
        open_clock(60),
        open_clock(15),
    ]));
    let (scheduler, sleeps) = RecordingScheduler::unbounded();
    let mut control = control_loop(broker.clone(), None, scheduler);

    let exit = control.run().await;

    let orders = broker.submitted_orders();
    let sides: Vec<OrderSide> = orders.iter().map(|o| o.side).collect();
    // buy, sell, buy, then the sweep sells the last buy
    assert_eq!(
        sides,
        vec![OrderSide::Buy, OrderSide::Sell, OrderSide::Buy, OrderSide::Sell]
    );
    assert!(matches!(exit, LoopExit::SweepCompleted(ref r) if r.closed.len() == 1));
    assert_eq!(sleeps.durations(), vec![STANDARD_TICK; 3]);
    assert!(broker.positions().is_empty());
}

#[tokio::test]
async fn test_closed_market_uses_backoff() {
    let broker = Arc::new(InMemoryBroker::new(closed_clock()));
    let (scheduler, sleeps) = RecordingScheduler::stopping_after(2);
    let mut control = control_loop(broker.clone(), None, scheduler);

    control.run().await;

    assert_eq!(sleeps.durations(), vec![CLOSED_BACKOFF, CLOSED_BACKOFF]);
    assert!(broker.submitted_orders().is_empty());
}

#[tokio::test]
async fn test_unfilled_buy_is_not_duplicated() {
    let broker = Arc::new(InMemoryBroker::new(open_clock(180)).with_deferred_fills());
    let (scheduler, _) = RecordingScheduler::unbounded();
    let mut control = control_loop(broker.clone(), None, scheduler);

    let first = control.tick().await;
    assert!(matches!(
        first,
        TickOutcome::Traded {
            trade: Ok(TradeOutcome::Submitted { decision: ActionDecision::Buy, .. }),
            ..
        }
    ));

    let second = control.tick().await;
    assert!(matches!(
        second,
        TickOutcome::Traded {
            trade: Ok(TradeOutcome::Skipped { decision: ActionDecision::Buy, .. }),
            ..
        }
    ));
    assert_eq!(broker.submitted_orders().len(), 1);

    assert_eq!(broker.fill_open_orders(), 1);
    let third = control.tick().await;
    match third {
        TickOutcome::Traded {
            trade: Ok(TradeOutcome::Submitted { receipt, .. }),
            ..
        } => assert_eq!((receipt.side, receipt.quantity), (OrderSide::Sell, 1)),
        other => panic!("expected sell, got {:?}", other),
    }
}

#[tokio::test]
async fn test_hung_clock_times_out() {
    let broker = Arc::new(InMemoryBroker::new(open_clock(180)));
    let settings = Settings {
        gateway_timeout_secs: 1,
        ..Settings::default()
    };
    let (scheduler, _) = RecordingScheduler::unbounded();
    let mut control = ControlLoop::new(
        &settings,
        Arc::new(HungClock),
        broker.clone(),
        None,
        Box::new(scheduler),
    );

    let started = Instant::now();
    let outcome = control.tick().await;

    match outcome {
        TickOutcome::ClockUnavailable(BotError::UpstreamUnavailable { operation, reason }) => {
            assert_eq!(operation, "clock snapshot");
            assert!(reason.contains("timed out"));
        }
        other => panic!("expected timeout, got {:?}", other),
    }
    assert!(started.elapsed() < Duration::from_secs(5));
    assert!(broker.submitted_orders().is_empty());
}

#[tokio::test]
async fn test_content_outage_does_not_affect_trade() {
    let broker = Arc::new(InMemoryBroker::new(open_clock(180)));
    let catalog = Arc::new(InMemoryCatalog::new("listener").with_fallback_items(tracks(10)));
    catalog.set_unavailable(true);
    let (scheduler, _) = RecordingScheduler::unbounded();
    let mut control = control_loop(broker.clone(), Some(curator(catalog.clone())), scheduler);

    match control.tick().await {
        TickOutcome::Traded {
            trade,
            playlist: Some(playlist),
        } => {
            let trade = assert_ok!(trade);
            assert!(matches!(trade, TradeOutcome::Submitted { .. }));
            let err = assert_err!(playlist);
            assert!(err.is_transient());
        }
        other => panic!("expected trade, got {:?}", other),
    }
    assert_eq!(broker.positions().len(), 1);
    assert!(catalog.playlists().is_empty());
}

#[tokio::test]
async fn test_empty_search_is_reported_and_tick_completes() {
    let broker = Arc::new(InMemoryBroker::new(open_clock(180)));
    let catalog = Arc::new(InMemoryCatalog::new("listener"));
    let (scheduler, _) = RecordingScheduler::unbounded();
    let mut control = control_loop(broker.clone(), Some(curator(catalog.clone())), scheduler);

    let outcome = control.tick().await;

    assert!(matches!(
        outcome,
        TickOutcome::Traded {
            trade: Ok(_),
            playlist: Some(Err(BotError::NoResults(_)))
        }
    ));
    assert_eq!(control.phase(), LoopPhase::Trading);
    assert_eq!(catalog.searches().len(), 1);
}

#[tokio::test]
async fn test_playlist_built_each_trading_tick() {
    let broker = Arc::new(InMemoryBroker::new(open_clock(180)));
    let catalog = Arc::new(InMemoryCatalog::new("listener").with_fallback_items(tracks(10)));
    let (scheduler, _) = RecordingScheduler::stopping_after(2);
    let mut control = control_loop(broker, Some(curator(catalog.clone())), scheduler);

    control.run().await;

    let playlists = catalog.playlists();
    assert_eq!(playlists.len(), 2);
    for (playlist, uris) in playlists {
        assert!(playlist.name.starts_with("My Playlist based on "));
        assert_eq!(uris.len(), 10);
    }
}

#[tokio::test]
async fn test_stop_signal_interrupts_sleep() {
    let broker = Arc::new(InMemoryBroker::new(open_clock(180)));
    let (scheduler, stop) = TokioScheduler::new();
    let mut control = ControlLoop::new(
        &Settings::default(),
        broker.clone(),
        broker.clone(),
        None,
        Box::new(scheduler),
    );

    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(50)).await;
        stop.stop();
    });

    let exit = tokio::time::timeout(Duration::from_secs(5), control.run())
        .await
        .expect("stop should interrupt the 60s tick sleep");

    assert!(matches!(exit, LoopExit::StopRequested));
    assert_eq!(control.phase(), LoopPhase::Stopped);
    assert_eq!(control.ticks(), 1);
    assert_eq!(broker.submitted_orders().len(), 1);
}
