// tests/session_tests.rs
use async_trait::async_trait;
use std::io::Cursor;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::AsyncWriteExt;
use tokio::sync::watch;

use logcat_color::{
    DeviceSelector, FilterStage, LayoutMode, LogInput, PipelineConfig, Producer, ReconnectPolicy,
    SessionController, SessionState, SpawnError,
};

const BRIEF: &str = "--------- beginning of main\n\
                     I/Tag1(  123): message\n\
                     I/Tag2(  234): message 2\n\
                     I/Tag3(  567): message 3\n\
                     I/Tag4(  890): message 4\n";

/// Records every invocation as `(command, selector)` and replays a fixed log
struct FakeProducer {
    device: DeviceSelector,
    log: &'static str,
    calls: Vec<(String, Option<String>)>,
}

impl FakeProducer {
    fn new(device: DeviceSelector, log: &'static str) -> Self {
        Self {
            device,
            log,
            calls: Vec::new(),
        }
    }

    fn count(&self, command: &str) -> usize {
        self.calls.iter().filter(|(c, _)| c == command).count()
    }

    fn record(&mut self, command: &str) {
        let selector = self.device.describe().map(str::to_string);
        self.calls.push((command.to_string(), selector));
    }
}

#[async_trait]
impl Producer for FakeProducer {
    async fn start(&mut self) -> Result<LogInput, SpawnError> {
        self.record("logcat");
        Ok(Box::new(Cursor::new(self.log.as_bytes().to_vec())))
    }

    async fn wait_for_device(&mut self) -> Result<(), SpawnError> {
        self.record("wait-for-device");
        Ok(())
    }

    fn device(&self) -> &DeviceSelector {
        &self.device
    }
}

fn plain_config() -> PipelineConfig {
    PipelineConfig {
        layout: LayoutMode::Plain,
        ..PipelineConfig::default()
    }
}

fn controller(
    producer: FakeProducer,
    config: PipelineConfig,
    policy: ReconnectPolicy,
) -> SessionController<FakeProducer> {
    SessionController::new(producer, config, Arc::new(FilterStage::new()), policy)
}

fn capped(max_waits: usize) -> ReconnectPolicy {
    ReconnectPolicy {
        stay_connected: true,
        max_waits: Some(max_waits),
    }
}

#[tokio::test]
async fn test_piped_first_session_reconnect_counts() {
    let producer = FakeProducer::new(DeviceSelector::Serial("serial123".into()), BRIEF);
    let mut ctl = controller(producer, plain_config(), capped(3));
    let (_tx, rx) = watch::channel(false);
    let mut out = Vec::new();

    let piped: LogInput = Box::new(Cursor::new(BRIEF.as_bytes().to_vec()));
    let stats = ctl.run(Some(piped), &mut out, rx).await.unwrap();

    assert_eq!(ctl.producer().count("logcat"), 2);
    assert_eq!(ctl.producer().count("wait-for-device"), 3);
    assert_eq!(ctl.starts(), 2);
    assert_eq!(ctl.waits(), 3);
    assert_eq!(ctl.state(), SessionState::Stopped);
    for (_, selector) in &ctl.producer().calls {
        assert_eq!(selector.as_deref(), Some("serial123"));
    }

    assert_eq!(stats.sessions, 3);
    assert_eq!(String::from_utf8(out).unwrap(), BRIEF.repeat(3));
}

#[tokio::test]
async fn test_spawned_first_session_reconnect_counts() {
    let producer = FakeProducer::new(DeviceSelector::Serial("serial123".into()), BRIEF);
    let mut ctl = controller(producer, plain_config(), capped(3));
    let (_tx, rx) = watch::channel(false);
    let mut out = Vec::new();

    ctl.run(None, &mut out, rx).await.unwrap();

    assert_eq!(ctl.producer().count("logcat"), 3);
    assert_eq!(ctl.producer().count("wait-for-device"), 3);
    let order: Vec<&str> = ctl.producer().calls.iter().map(|(c, _)| c.as_str()).collect();
    assert_eq!(
        order,
        vec!["logcat", "wait-for-device", "logcat", "wait-for-device", "logcat", "wait-for-device"]
    );
}

#[tokio::test]
async fn test_without_stay_connected_stops_after_first_session() {
    let producer = FakeProducer::new(DeviceSelector::Any, BRIEF);
    let mut ctl = controller(producer, plain_config(), ReconnectPolicy::default());
    let (_tx, rx) = watch::channel(false);
    let mut out = Vec::new();

    let stats = ctl.run(None, &mut out, rx).await.unwrap();
    assert_eq!(ctl.producer().count("logcat"), 1);
    assert_eq!(ctl.producer().count("wait-for-device"), 0);
    assert_eq!(stats.records_output, 4);
    assert_eq!(out, BRIEF.as_bytes());
}

#[tokio::test]
async fn test_short_session_flushed_with_default_format() {
    let producer = FakeProducer::new(DeviceSelector::Any, "I/Only(  1): one line\n");
    let mut ctl = controller(producer, plain_config(), ReconnectPolicy::default());
    let (_tx, rx) = watch::channel(false);
    let mut out = Vec::new();

    ctl.run(None, &mut out, rx).await.unwrap();
    assert_eq!(out, b"I/Only(  1): one line\n");
}

#[tokio::test]
async fn test_interrupt_discards_undetected_lines() {
    let producer = FakeProducer::new(DeviceSelector::Any, BRIEF);
    let mut ctl = controller(producer, plain_config(), capped(3));
    let (tx, rx) = watch::channel(false);
    let (client, mut server) = tokio::io::duplex(256);
    let mut out = Vec::new();

    let feeder = async move {
        server
            .write_all(b"I/A(  1): first\nI/B(  2): second\n")
            .await
            .unwrap();
        tokio::time::sleep(Duration::from_millis(50)).await;
        tx.send(true).unwrap();
        // keep the stream open until after the interrupt
        tokio::time::sleep(Duration::from_millis(50)).await;
        drop(server);
    };

    let (result, _) = tokio::join!(ctl.run(Some(Box::new(client)), &mut out, rx), feeder);
    result.unwrap();

    assert!(out.is_empty());
    assert_eq!(ctl.state(), SessionState::Stopped);
    assert_eq!(ctl.producer().count("wait-for-device"), 0);
    assert_eq!(ctl.producer().count("logcat"), 0);
}

#[tokio::test]
async fn test_format_redetected_each_session_by_default() {
    // second and later sessions produce threadtime lines
    const THREADTIME: &str = "01-02 03:04:05.678  100  101 I Zygote  : one\n\
                              01-02 03:04:05.679  100  102 I Zygote  : two\n\
                              01-02 03:04:05.680  100  103 I Zygote  : three\n";
    let producer = FakeProducer::new(DeviceSelector::Any, THREADTIME);
    let mut ctl = controller(producer, plain_config(), capped(1));
    let (_tx, rx) = watch::channel(false);
    let mut out = Vec::new();

    let piped: LogInput = Box::new(Cursor::new(BRIEF.as_bytes().to_vec()));
    ctl.run(Some(piped), &mut out, rx).await.unwrap();

    // cap of one wait means no restart after the first session
    assert_eq!(String::from_utf8(out).unwrap(), BRIEF);

    let producer = FakeProducer::new(DeviceSelector::Any, THREADTIME);
    let mut ctl = controller(producer, plain_config(), capped(2));
    let (_tx, rx) = watch::channel(false);
    let mut out = Vec::new();
    let piped: LogInput = Box::new(Cursor::new(BRIEF.as_bytes().to_vec()));
    ctl.run(Some(piped), &mut out, rx).await.unwrap();
    assert_eq!(String::from_utf8(out).unwrap(), format!("{}{}", BRIEF, THREADTIME));
}

#[tokio::test]
async fn test_keep_format_reuses_committed_format() {
    let producer = FakeProducer::new(DeviceSelector::Any, BRIEF);
    let config = PipelineConfig {
        reuse_format: true,
        ..plain_config()
    };
    let mut ctl = controller(producer, config, capped(2));
    let (_tx, rx) = watch::channel(false);
    let mut out = Vec::new();

    // first session commits threadtime; the brief replay that follows no
    // longer matches it, so only its marker line survives
    const THREADTIME: &str = "01-02 03:04:05.678  100  101 I Zygote  : one\n\
                              01-02 03:04:05.679  100  102 I Zygote  : two\n\
                              01-02 03:04:05.680  100  103 I Zygote  : three\n";
    let piped: LogInput = Box::new(Cursor::new(THREADTIME.as_bytes().to_vec()));
    ctl.run(Some(piped), &mut out, rx).await.unwrap();

    assert_eq!(
        String::from_utf8(out).unwrap(),
        format!("{}--------- beginning of main\n", THREADTIME)
    );
}

/// Serves one session, then the device never comes back
struct VanishingDevice {
    device: DeviceSelector,
    starts: usize,
}

#[async_trait]
impl Producer for VanishingDevice {
    async fn start(&mut self) -> Result<LogInput, SpawnError> {
        self.starts += 1;
        Ok(Box::new(Cursor::new(BRIEF.as_bytes().to_vec())))
    }

    async fn wait_for_device(&mut self) -> Result<(), SpawnError> {
        std::future::pending::<Result<(), SpawnError>>().await
    }

    fn device(&self) -> &DeviceSelector {
        &self.device
    }
}

#[tokio::test]
async fn test_interrupt_while_waiting_for_device() {
    let producer = VanishingDevice {
        device: DeviceSelector::Emulator,
        starts: 0,
    };
    let policy = ReconnectPolicy {
        stay_connected: true,
        max_waits: None,
    };
    let mut ctl = SessionController::new(producer, plain_config(), Arc::new(FilterStage::new()), policy);
    let (tx, rx) = watch::channel(false);
    let mut out = Vec::new();

    let interrupt = async move {
        tokio::time::sleep(Duration::from_millis(50)).await;
        tx.send(true).unwrap();
        // keep the sender alive until the controller has stopped
        tokio::time::sleep(Duration::from_millis(50)).await;
    };

    let (result, _) = tokio::join!(ctl.run(None, &mut out, rx), interrupt);
    let stats = result.unwrap();

    assert_eq!(ctl.state(), SessionState::Stopped);
    assert_eq!(ctl.producer().starts, 1);
    assert_eq!(ctl.starts(), 1);
    assert_eq!(ctl.waits(), 0);
    assert_eq!(stats.sessions, 1);
    assert_eq!(out, BRIEF.as_bytes());
}
