//! Integration tests for tunnel establishment and ordered teardown.

mod support;

use std::sync::Arc;
use std::time::Duration;

use sailing_release::{KubernetesContext, Release, ReleaseError, TargetKind, TunnelTarget};
use support::{AfterOutput, Event, Script, ScriptedLauncher};

fn release_with(launcher: &Arc<ScriptedLauncher>) -> Release {
    Release::new("my-app", launcher.clone(), None)
}

fn is_uninstall(event: &Event) -> bool {
    matches!(event, Event::RanToEnd { args, .. } if args.starts_with("uninstall "))
}

#[tokio::test]
async fn test_service_tunnel_then_teardown() {
    let launcher = ScriptedLauncher::new(vec![Script::forwarding(54321, 8080)]);
    let release = release_with(&launcher);

    let port = release
        .start_tunnel_for_service("svc-a", 8080, None)
        .await
        .unwrap();
    assert_eq!(port, 54321);
    assert_eq!(release.tunnel_count().await, 1);

    let report = release.tear_down().await.unwrap();
    assert_eq!(report.cancelled, 1);
    assert!(report.is_clean());

    assert_eq!(
        launcher.trace(),
        vec![
            Event::Launched {
                program: "kubectl".to_string(),
                args: "port-forward service/svc-a :8080 ".to_string(),
            },
            Event::Cancelled {
                args: "port-forward service/svc-a :8080 ".to_string(),
            },
            Event::StreamEnded {
                args: "port-forward service/svc-a :8080 ".to_string(),
            },
            Event::RanToEnd {
                program: "helm".to_string(),
                args: "uninstall my-app ".to_string(),
            },
        ]
    );
}

#[tokio::test]
async fn test_pod_tunnel_failure_returns_zero() {
    let launcher = ScriptedLauncher::new(vec![Script::failing("Error: pod not found")]);
    let release = release_with(&launcher);

    let port = release.start_tunnel_for_pod("web-0", 80, None).await.unwrap();
    assert_eq!(port, 0);
    assert_eq!(release.tunnel_count().await, 0);

    // The failed forwarder was drained to its end before returning.
    assert!(launcher
        .position(|e| matches!(e, Event::StreamEnded { .. }))
        .is_some());

    let report = release.tear_down().await.unwrap();
    assert_eq!(report.cancelled, 0);

    let trace = launcher.trace();
    assert!(!trace.iter().any(|e| matches!(e, Event::Cancelled { .. })));
    assert!(is_uninstall(trace.last().unwrap()));
}

#[tokio::test]
async fn test_silent_forwarder_returns_zero() {
    let launcher = ScriptedLauncher::new(vec![Script::silent()]);
    let release = release_with(&launcher);

    let port = release.start_tunnel_for_pod("web-0", 80, None).await.unwrap();
    assert_eq!(port, 0);
    assert_eq!(release.tunnel_count().await, 0);
}

#[tokio::test]
async fn test_malformed_success_line_is_an_error() {
    let launcher = ScriptedLauncher::new(vec![Script {
        lines: vec!["Forwarding from somewhere".to_string()],
        after: AfterOutput::HoldUntilCancelled,
    }]);
    let release = release_with(&launcher);

    let result = release.start_tunnel_for_service("svc-a", 8080, None).await;
    assert!(matches!(
        result,
        Err(ReleaseError::MalformedForwardingLine(line)) if line == "Forwarding from somewhere"
    ));
    assert_eq!(release.tunnel_count().await, 0);
}

#[tokio::test]
async fn test_local_port_and_context_in_arguments() {
    let launcher = ScriptedLauncher::new(vec![Script::forwarding(9000, 80)]);
    let context = KubernetesContext::new()
        .with_namespace("qa")
        .with_context("kind-qa");
    let release = Release::new("my-app", launcher.clone(), Some(context));

    let port = release
        .start_tunnel(TunnelTarget::new(TargetKind::Service, "web", 80).with_local_port(9000))
        .await
        .unwrap();
    assert_eq!(port, 9000);

    release.tear_down().await.unwrap();

    assert_eq!(
        launcher.launches(),
        vec!["port-forward service/web 9000:80 --namespace qa --context kind-qa".to_string()]
    );
    assert!(launcher.trace().contains(&Event::RanToEnd {
        program: "helm".to_string(),
        args: "uninstall my-app --namespace qa --kube-context kind-qa".to_string(),
    }));
}

#[tokio::test]
async fn test_teardown_cancels_and_awaits_all_before_uninstall() {
    let launcher = ScriptedLauncher::new(vec![
        Script::forwarding(10001, 80),
        Script::forwarding(10002, 81),
        Script::forwarding(10003, 82),
    ]);
    let release = release_with(&launcher);

    let (a, b, c) = tokio::join!(
        release.start_tunnel_for_service("a", 80, None),
        release.start_tunnel_for_service("b", 81, None),
        release.start_tunnel_for_pod("c", 82, None),
    );
    let mut ports = vec![a.unwrap(), b.unwrap(), c.unwrap()];
    ports.sort_unstable();
    assert_eq!(ports, vec![10001, 10002, 10003]);
    assert_eq!(release.tunnel_count().await, 3);

    let report = tokio::time::timeout(Duration::from_secs(5), release.tear_down())
        .await
        .expect("teardown must cancel every tunnel before awaiting any")
        .unwrap();
    assert_eq!(report.cancelled, 3);
    assert!(report.is_clean());

    let trace = launcher.trace();
    let uninstall = trace.iter().position(is_uninstall).unwrap();
    assert_eq!(uninstall, trace.len() - 1);

    let cancelled: Vec<_> = trace
        .iter()
        .enumerate()
        .filter(|(_, e)| matches!(e, Event::Cancelled { .. }))
        .map(|(i, _)| i)
        .collect();
    let ended: Vec<_> = trace
        .iter()
        .enumerate()
        .filter(|(_, e)| matches!(e, Event::StreamEnded { .. }))
        .map(|(i, _)| i)
        .collect();

    assert_eq!(cancelled.len(), 3, "each tunnel cancelled exactly once");
    assert_eq!(ended.len(), 3);
    assert!(cancelled.iter().chain(ended.iter()).all(|&i| i < uninstall));
    let last_cancelled = *cancelled.iter().max().unwrap();
    let first_ended = *ended.iter().min().unwrap();
    assert!(
        last_cancelled < first_ended,
        "a tunnel finished before all tunnels were cancelled"
    );
}

#[tokio::test]
async fn test_drain_failure_does_not_fail_teardown() {
    let launcher = ScriptedLauncher::new(vec![
        Script::forwarding(20001, 80).then(AfterOutput::FailOnCancel),
        Script::forwarding(20002, 81),
    ]);
    let release = release_with(&launcher);

    release.start_tunnel_for_service("flaky", 80, None).await.unwrap();
    release.start_tunnel_for_service("steady", 81, None).await.unwrap();

    let report = release.tear_down().await.unwrap();
    assert_eq!(report.cancelled, 2);
    assert_eq!(report.failures.len(), 1);
    assert_eq!(report.failures[0].tunnel, "service/flaky:80");
    assert!(report.failures[0].error.contains("connection reset"));

    let trace = launcher.trace();
    assert!(is_uninstall(trace.last().unwrap()));
    assert_eq!(
        trace
            .iter()
            .filter(|e| matches!(e, Event::StreamEnded { .. }))
            .count(),
        2
    );
}

#[tokio::test]
async fn test_panicking_drain_task_is_reported() {
    let launcher = ScriptedLauncher::new(vec![
        Script::forwarding(30001, 80).then(AfterOutput::PanicOnCancel),
    ]);
    let release = release_with(&launcher);

    release.start_tunnel_for_pod("crashy", 80, None).await.unwrap();

    let report = release.tear_down().await.unwrap();
    assert_eq!(report.failures.len(), 1);
    assert!(report.failures[0].error.starts_with("drain task aborted"));
    assert!(is_uninstall(launcher.trace().last().unwrap()));
}

#[tokio::test]
async fn test_uninstall_failure_propagates() {
    let launcher = ScriptedLauncher::new(vec![
        Script::forwarding(40001, 80).then(AfterOutput::FailOnCancel),
    ]);
    launcher.fail_uninstall("Error: uninstall: Release not loaded: my-app: release: not found");
    let release = release_with(&launcher);

    release.start_tunnel_for_service("web", 80, None).await.unwrap();

    let err = release.tear_down().await.unwrap_err();
    match err {
        ReleaseError::Process(inner) => {
            assert!(inner.to_string().contains("release: not found"));
        }
        other => panic!("expected uninstall failure, got {other:?}"),
    }
}

#[tokio::test]
async fn test_drop_without_teardown_cancels_tunnels() {
    let launcher = ScriptedLauncher::new(vec![Script::forwarding(50001, 80)]);
    let release = release_with(&launcher);

    release.start_tunnel_for_service("web", 80, None).await.unwrap();
    drop(release);

    // Give the orphaned drain task a chance to observe cancellation.
    for _ in 0..10 {
        if launcher
            .position(|e| matches!(e, Event::StreamEnded { .. }))
            .is_some()
        {
            break;
        }
        tokio::task::yield_now().await;
    }

    let trace = launcher.trace();
    assert!(trace.iter().any(|e| matches!(e, Event::Cancelled { .. })));
    assert!(!trace.iter().any(is_uninstall));
}
