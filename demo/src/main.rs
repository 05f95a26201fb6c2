use eventbus::{DeadEvent, EventBus};
use eventbus_macros::{Event, subscriber};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;
use tokio::runtime::Handle;
use tracing::info;
use tracing_subscriber::{EnvFilter, FmtSubscriber};

pub trait Severity: Send + Sync {
    fn level(&self) -> u8;
}

#[derive(Debug, Event)]
#[event(implements(Severity))]
struct Alert {
    source: String,
    level: u8,
}

impl Severity for Alert {
    fn level(&self) -> u8 {
        self.level
    }
}

#[derive(Debug, Event)]
struct DiskAlert {
    #[event(parent)]
    alert: Alert,
    mount: String,
    used_percent: u8,
}

#[derive(Debug, Event)]
struct Heartbeat {
    node: String,
}

#[derive(Default)]
struct Pager {
    pages: AtomicUsize,
}

#[subscriber]
impl Pager {
    #[subscribe]
    fn on_alert(&self, alert: &Alert) -> anyhow::Result<()> {
        anyhow::ensure!(!alert.source.is_empty(), "alert without source");
        self.pages.fetch_add(1, Ordering::SeqCst);
        info!(source = %alert.source, level = alert.level, "paging on-call");
        Ok(())
    }
}

#[derive(Default)]
struct Capacity {
    full_disks: AtomicUsize,
}

#[subscriber]
impl Capacity {
    #[subscribe]
    fn on_disk(&self, disk: &DiskAlert) {
        if disk.used_percent >= 90 {
            self.full_disks.fetch_add(1, Ordering::SeqCst);
        }
        info!(mount = %disk.mount, used = disk.used_percent, "disk usage reported");
    }
}

#[derive(Default)]
struct Metrics {
    by_severity: AtomicUsize,
}

#[subscriber]
impl Metrics {
    #[subscribe(concurrent)]
    fn on_severity(&self, severity: &dyn Severity) {
        self.by_severity
            .fetch_add(severity.level() as usize, Ordering::SeqCst);
    }

    #[subscribe]
    fn on_dead(&self, dead: &DeadEvent) {
        match dead.downcast_ref::<Heartbeat>() {
            Some(beat) => info!(node = %beat.node, bus = dead.source(), "heartbeat had no listeners"),
            None => info!(event_type = %dead.event_type(), bus = dead.source(), "event had no listeners"),
        }
    }
}

fn disk_alert(mount: &str, used_percent: u8) -> DiskAlert {
    DiskAlert {
        alert: Alert {
            source: format!("disk:{mount}"),
            level: if used_percent >= 90 { 3 } else { 1 },
        },
        mount: mount.to_string(),
        used_percent,
    }
}

fn run(bus: &EventBus) -> anyhow::Result<(Arc<Pager>, Arc<Capacity>, Arc<Metrics>)> {
    let pager = Arc::new(Pager::default());
    let capacity = Arc::new(Capacity::default());
    let metrics = Arc::new(Metrics::default());
    bus.register(&pager)?;
    bus.register(&capacity)?;
    bus.register(&metrics)?;

    bus.post(Alert {
        source: "api".to_string(),
        level: 2,
    });
    bus.post(disk_alert("/var", 95));
    bus.post(disk_alert("/home", 40));
    bus.post(Heartbeat {
        node: "edge-1".to_string(),
    });

    Ok((pager, capacity, metrics))
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let subscriber = FmtSubscriber::builder()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    // 同步总线：post 返回时处理器已执行完毕
    let sync_bus = EventBus::new("sync");
    let (pager, capacity, metrics) = run(&sync_bus)?;
    info!(
        pages = pager.pages.load(Ordering::SeqCst),
        full_disks = capacity.full_disks.load(Ordering::SeqCst),
        severity_total = metrics.by_severity.load(Ordering::SeqCst),
        "synchronous bus finished"
    );
    sync_bus.unregister(&pager)?;

    // 异步总线：处理器在 tokio 阻塞线程池上执行
    let async_bus = EventBus::with_executor("async", Handle::current());
    let (pager, capacity, metrics) = run(&async_bus)?;
    tokio::time::sleep(Duration::from_millis(100)).await;
    info!(
        pages = pager.pages.load(Ordering::SeqCst),
        full_disks = capacity.full_disks.load(Ordering::SeqCst),
        severity_total = metrics.by_severity.load(Ordering::SeqCst),
        heartbeat_listeners = async_bus.bindings_for::<Heartbeat>(),
        "asynchronous bus finished"
    );

    Ok(())
}
