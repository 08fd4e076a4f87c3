use async_trait::async_trait;
use std::net::IpAddr;
use std::sync::Arc;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;

use probescope::network::{parse_ports, TargetResolver};
use probescope::scanner::{IdentificationSource, PortState};
use probescope::{Engine, EngineConfig, EngineError, ScanStatus, ScanTask};

fn test_config() -> EngineConfig {
    EngineConfig {
        connect_timeout_ms: 500,
        write_timeout_ms: 300,
        read_timeout_ms: 300,
        politeness_delay_ms: 0,
        ..EngineConfig::in_memory()
    }
}

/// Accepts forever and greets every connection with `banner`.
async fn banner_server(banner: &'static [u8]) -> u16 {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();
    tokio::spawn(async move {
        while let Ok((mut socket, _)) = listener.accept().await {
            tokio::spawn(async move {
                let _ = socket.write_all(banner).await;
                let mut buf = [0u8; 256];
                let _ = socket.read(&mut buf).await;
            });
        }
    });
    port
}

/// Answers an MQTT CONNECT with a CONNACK and hangs up on anything else.
async fn mqtt_broker() -> u16 {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();
    tokio::spawn(async move {
        while let Ok((mut socket, _)) = listener.accept().await {
            tokio::spawn(async move {
                let mut buf = [0u8; 512];
                if let Ok(n) = socket.read(&mut buf).await {
                    if n > 0 && buf[0] == 0x10 {
                        let _ = socket.write_all(&[0x20, 0x02, 0x00, 0x00]).await;
                        let _ = socket.read(&mut buf).await;
                    }
                }
            });
        }
    });
    port
}

async fn closed_port() -> u16 {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    listener.local_addr().unwrap().port()
}

fn localhost_task(ports: Vec<u16>) -> ScanTask {
    ScanTask::new("it", vec!["127.0.0.1".to_string()], ports)
}

#[test]
fn test_parse_port_spec() {
    assert_eq!(parse_ports("80,443,8000-8002").unwrap(), vec![80, 443, 8000, 8001, 8002]);
    assert!(parse_ports("100-50").is_err());
    assert!(parse_ports("abc").is_err());
}

#[tokio::test]
async fn test_ssh_banner_identified() {
    let port = banner_server(b"SSH-2.0-OpenSSH_8.2p1 Ubuntu-4ubuntu0.5\r\n").await;
    let engine = Engine::new(test_config()).unwrap();

    let results = engine
        .execute(&localhost_task(vec![port]), &CancellationToken::new())
        .await;

    assert_eq!(results.len(), 1);
    let result = &results[0];
    assert_eq!(result.status, ScanStatus::Success);
    assert_eq!(result.ports.len(), 1);

    let ssh = &result.ports[0];
    assert_eq!(ssh.state, PortState::Open);
    assert_eq!(ssh.service, "ssh");
    assert_eq!(ssh.product, "OpenSSH");
    assert!(ssh.version.contains("8.2p1"));
    assert!(ssh.os.contains("Ubuntu"));
    assert!(ssh.confidence >= 90);
    assert_eq!(ssh.source, IdentificationSource::Parser);
    assert_eq!(ssh.probe.as_deref(), Some("NULL"));

    let null = engine.statistics().get("NULL").unwrap();
    assert_eq!(null.sent, 1);
    assert_eq!(null.successful, 1);
}

#[tokio::test]
async fn test_refused_port_absent_from_results() {
    let open = banner_server(b"SSH-2.0-OpenSSH_9.6\r\n").await;
    let closed = closed_port().await;
    let engine = Engine::new(test_config()).unwrap();

    let results = engine
        .execute(&localhost_task(vec![closed, open]), &CancellationToken::new())
        .await;

    let ports: Vec<u16> = results[0].ports.iter().map(|p| p.port).collect();
    assert_eq!(ports, vec![open]);
    assert_eq!(results[0].status, ScanStatus::Success);
}

#[tokio::test]
async fn test_deep_scan_finds_mqtt_and_learns() {
    let port = mqtt_broker().await;
    let engine = Engine::new(test_config()).unwrap();
    let task = localhost_task(vec![port]).deep(0);

    let results = engine.execute(&task, &CancellationToken::new()).await;
    let mqtt = &results[0].ports[0];
    assert_eq!(mqtt.service, "mqtt");
    assert_eq!(mqtt.product, "MQTT Broker");
    assert_eq!(mqtt.confidence, 95);
    assert_eq!(mqtt.probe.as_deref(), Some("MQTTConnect"));

    let connect = engine.statistics().get("MQTTConnect").unwrap();
    assert_eq!((connect.sent, connect.successful), (1, 1));
    let null = engine.statistics().get("NULL").unwrap();
    assert_eq!((null.sent, null.successful), (1, 0));

    // the learned hit rate puts MQTTConnect first, so the second run stops after one probe
    let results = engine.execute(&task, &CancellationToken::new()).await;
    assert_eq!(results[0].ports[0].service, "mqtt");
    let connect = engine.statistics().get("MQTTConnect").unwrap();
    assert_eq!((connect.sent, connect.successful), (2, 2));
    assert_eq!(engine.statistics().get("NULL").unwrap().sent, 1);
    assert_eq!(engine.statistics().ranked()[0].name, "MQTTConnect");
}

#[tokio::test]
async fn test_deep_scan_depth_limits_probes() {
    let port = mqtt_broker().await;
    let engine = Engine::new(test_config()).unwrap();
    let leading: Vec<&str> = engine.catalog().names().take(2).collect();
    assert_eq!(leading, vec!["NULL", "GetRequest"]);

    // NULL and GetRequest come first in catalog order; neither reaches the broker's CONNACK
    let results = engine
        .execute(&localhost_task(vec![port]).deep(2), &CancellationToken::new())
        .await;
    let result = &results[0].ports[0];
    assert_ne!(result.service, "mqtt");

    let sent: u64 = engine.statistics().snapshot().values().map(|s| s.sent).sum();
    assert_eq!(sent, 2);
}

#[tokio::test]
async fn test_silent_service_on_unknown_port() {
    let port = banner_server(b"").await;
    let engine = Engine::new(test_config()).unwrap();

    let results = engine
        .execute(&localhost_task(vec![port]), &CancellationToken::new())
        .await;
    let silent = &results[0].ports[0];
    assert_eq!(silent.state, PortState::Open);
    assert!(silent.banner.is_empty());
    if probescope::scanner::ports::service_for_port(port).is_none() {
        assert_eq!(silent.service, "unknown");
        assert_eq!(silent.confidence, 0);
    }
    assert_eq!(engine.statistics().get("NULL").unwrap().successful, 0);
}

#[tokio::test]
async fn test_empty_target_list_fails_task() {
    let engine = Engine::new(test_config()).unwrap();
    let task = ScanTask::new("empty", Vec::new(), vec![22]);

    let results = engine.execute(&task, &CancellationToken::new()).await;
    assert_eq!(results.len(), 1);
    assert_eq!(results[0].status, ScanStatus::Failed);
    assert!(results[0].error_message.as_deref().unwrap().contains("no targets"));
}

struct FixedResolver;

#[async_trait]
impl TargetResolver for FixedResolver {
    async fn resolve(&self, host: &str) -> probescope::Result<IpAddr> {
        match host {
            "good.test" => Ok("127.0.0.1".parse().unwrap()),
            _ => Err(EngineError::Resolve {
                host: host.to_string(),
                reason: "no such host".into(),
            }),
        }
    }
}

#[tokio::test]
async fn test_unresolvable_target_does_not_stop_siblings() {
    let port = banner_server(b"SSH-2.0-dropbear_2022.83\r\n").await;
    let engine = Engine::new(test_config())
        .unwrap()
        .with_resolver(Arc::new(FixedResolver));
    let task = ScanTask::new(
        "mixed",
        vec!["bad.test".to_string(), "good.test".to_string()],
        vec![port],
    );

    let results = engine.execute(&task, &CancellationToken::new()).await;
    assert_eq!(results.len(), 2);

    let bad = results.iter().find(|r| r.target == "bad.test").unwrap();
    assert_eq!(bad.status, ScanStatus::Failed);
    assert!(bad.error_message.as_deref().unwrap().contains("bad.test"));
    assert!(bad.ports.is_empty());

    let good = results.iter().find(|r| r.target == "good.test").unwrap();
    assert_eq!(good.status, ScanStatus::Success);
    assert_eq!(good.ports[0].service, "ssh");
}

#[tokio::test]
async fn test_cancelled_task_reports_cancelled() {
    let port = banner_server(b"SSH-2.0-OpenSSH_9.6\r\n").await;
    let engine = Engine::new(test_config()).unwrap();
    let cancel = CancellationToken::new();
    cancel.cancel();

    let results = engine.execute(&localhost_task(vec![port]), &cancel).await;
    assert_eq!(results[0].status, ScanStatus::Cancelled);
    assert!(results[0].ports.is_empty());
}

#[tokio::test]
async fn test_statistics_survive_engine_restart() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("stats").join("probe_stats.json");
    let config = EngineConfig {
        stats_path: Some(path.clone()),
        ..test_config()
    };

    let port = banner_server(b"SSH-2.0-OpenSSH_9.6\r\n").await;
    let engine = Engine::new(config.clone()).unwrap();
    engine
        .execute(&localhost_task(vec![port]), &CancellationToken::new())
        .await;
    engine.statistics().save().unwrap();

    let content: serde_json::Value =
        serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
    assert!(content.get("last_save").is_some());
    assert_eq!(content["stats"]["NULL"]["sent"], 1);

    let restarted = Engine::new(config).unwrap();
    let null = restarted.statistics().get("NULL").unwrap();
    assert_eq!(null.sent, 1);
    assert_eq!(null.successful, 1);
    assert!((null.hit_rate - 1.0).abs() < f64::EPSILON);
}

#[tokio::test]
async fn test_corrupt_statistics_file_is_not_fatal() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("probe_stats.json");
    std::fs::write(&path, "{ not json").unwrap();

    let engine = Engine::new(EngineConfig {
        stats_path: Some(path),
        ..test_config()
    })
    .unwrap();
    assert_eq!(engine.statistics().get("NULL").unwrap().sent, 0);
}

#[tokio::test]
async fn test_results_serialize_to_json() {
    let port = banner_server(b"SSH-2.0-OpenSSH_9.6\r\n").await;
    let engine = Engine::new(test_config()).unwrap();
    let results = engine
        .execute(&localhost_task(vec![port]), &CancellationToken::new())
        .await;

    let json = serde_json::to_value(&results).unwrap();
    assert_eq!(json[0]["status"], "success");
    assert_eq!(json[0]["ports"][0]["state"], "open");
    assert_eq!(json[0]["ports"][0]["source"], "parser");
    assert!(json[0]["started_at"].as_str().unwrap().contains('T'));
}
