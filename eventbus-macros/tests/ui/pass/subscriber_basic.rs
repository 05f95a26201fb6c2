use eventbus::{BusError, EventBus};
use eventbus_macros::{Event, subscriber};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

pub trait Severity: Send + Sync {
    fn level(&self) -> u8;
}

#[derive(Event)]
#[event(implements(Severity))]
struct Alert {
    level: u8,
}

impl Severity for Alert {
    fn level(&self) -> u8 {
        self.level
    }
}

#[derive(Default)]
struct Pager {
    alerts: AtomicUsize,
    severe: AtomicUsize,
}

#[subscriber]
impl Pager {
    #[subscribe]
    fn on_alert(&self, _alert: &Alert) {
        self.alerts.fetch_add(1, Ordering::SeqCst);
    }

    #[subscribe(concurrent)]
    fn on_severity(&self, severity: &dyn Severity) -> anyhow::Result<()> {
        anyhow::ensure!(severity.level() < 10, "level out of range");
        self.severe.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    fn helper(&self) -> usize {
        self.alerts.load(Ordering::SeqCst)
    }
}

struct Pairwise;

#[subscriber]
impl Pairwise {
    #[subscribe]
    fn on_pair(&self, _first: &Alert, _second: &Alert) {}
}

struct Idle;

#[subscriber]
impl Idle {
    fn not_a_handler(&self) {}
}

fn main() {
    let bus = EventBus::new("ui");
    let pager = Arc::new(Pager::default());
    assert_eq!(bus.register(&pager).unwrap(), 2);
    assert_eq!(bus.post(Alert { level: 4 }), 2);
    assert_eq!(pager.helper(), 1);
    assert_eq!(pager.severe.load(Ordering::SeqCst), 1);

    let err = bus.register(&Arc::new(Pairwise)).unwrap_err();
    assert!(matches!(err, BusError::MultiParameterHandler { arity: 2, .. }));

    let err = bus.register(&Arc::new(Idle)).unwrap_err();
    assert!(matches!(err, BusError::NoEligibleHandlers { .. }));
    Idle.not_a_handler();
}
