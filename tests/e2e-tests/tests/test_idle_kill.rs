//! E2E: idle games are closed, active and exited games are not.
//!
//! Runs real child processes, so these tests are Linux-only.

#![cfg(target_os = "linux")]

use arcade_common::MonitorKey;
use arcade_launcher::Launcher;
use arcade_monitoring::{KillStatus, MonitorSettings};
use e2e_tests::{collect_kill_statuses, wait_until, StagedGame};
use std::time::Duration;

fn fast_settings(idle_limit: Duration) -> MonitorSettings {
    MonitorSettings {
        idle_limit,
        grace_delay: Duration::from_millis(500),
        watch_interval: Duration::from_millis(200),
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_exit_unregisters_monitor() {
    let game = StagedGame::exiting_after(1);
    let launcher = Launcher::new(fast_settings(Duration::from_secs(60)));

    let launched = launcher.launch(&game.path).await.unwrap();
    assert!(matches!(launched.key, MonitorKey::Pid(_)));
    assert_eq!(launcher.monitor_count().await.unwrap(), 1);

    let launcher = &launcher;
    let cleared = wait_until(Duration::from_secs(10), move || async move {
        launcher.monitor_count().await.unwrap() == 0
    })
    .await;
    assert!(cleared, "monitor still registered after the game exited");
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_idle_game_is_force_killed() {
    let game = StagedGame::stubborn();
    let launcher = Launcher::new(fast_settings(Duration::from_secs(1)));
    let mut events = launcher.events("e2e");

    launcher.launch(&game.path).await.unwrap();
    let (game, launcher) = (&game, &launcher);
    assert!(
        wait_until(Duration::from_secs(5), move || async move { game.is_running() }).await,
        "game never showed up in the process table"
    );

    let statuses = collect_kill_statuses(&mut events, Duration::from_secs(15)).await;
    assert_eq!(statuses, vec![KillStatus::Attempting, KillStatus::Killed]);

    let gone = wait_until(Duration::from_secs(5), move || async move { !game.is_running() }).await;
    assert!(gone, "game survived the forced kill");
    assert!(
        wait_until(Duration::from_secs(5), move || async move {
            launcher.monitor_count().await.unwrap() == 0
        })
        .await
    );
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_activity_keeps_game_alive() {
    let game = StagedGame::stubborn();
    let launcher = Launcher::new(fast_settings(Duration::from_secs(1)));
    let mut events = launcher.events("e2e");

    launcher.launch(&game.path).await.unwrap();

    for _ in 0..10 {
        tokio::time::sleep(Duration::from_millis(300)).await;
        launcher.report_activity().await.unwrap();
    }

    assert!(game.is_running());
    assert_eq!(launcher.monitor_count().await.unwrap(), 1);
    while let Ok(event) = events.try_recv() {
        assert!(
            !matches!(event, arcade_monitoring::LauncherEvent::Kill(_)),
            "unexpected kill notification {:?}",
            event
        );
    }

    assert_eq!(launcher.shutdown().await.unwrap(), 1);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_spawn_failure_is_reported() {
    let launcher = Launcher::new(fast_settings(Duration::from_secs(60)));

    let err = launcher
        .launch("/nonexistent/arcade/game.exe")
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        arcade_common::ProcessError::SpawnFailed { .. }
    ));
    assert_eq!(launcher.monitor_count().await.unwrap(), 0);
}
