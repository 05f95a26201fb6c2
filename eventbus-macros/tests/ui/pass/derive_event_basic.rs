use eventbus::EventType;
use eventbus::resolver::{TypeKind, closure_of};
use eventbus_macros::Event;

pub trait Severity: Send + Sync {
    fn level(&self) -> u8;
}

pub trait Audited {}

#[derive(Event)]
#[event(implements(dyn Severity, Audited))]
struct Alert {
    level: u8,
}

impl Severity for Alert {
    fn level(&self) -> u8 {
        self.level
    }
}

impl Audited for Alert {}

#[derive(Event)]
struct DiskAlert {
    #[event(parent)]
    alert: Alert,
    mount: String,
}

#[derive(Event)]
struct Heartbeat(#[event(parent)] Alert, u64);

#[derive(Event)]
enum Lifecycle {
    Started,
    Stopped { code: i32 },
}

fn main() {
    let types = closure_of::<DiskAlert>();
    let kinds: Vec<TypeKind> = types.iter().map(|t| t.kind()).collect();
    assert_eq!(
        kinds,
        vec![
            TypeKind::Own,
            TypeKind::Ancestor,
            TypeKind::Interface,
            TypeKind::Interface,
        ]
    );
    assert_eq!(types[1].ty(), EventType::of::<Alert>());
    assert_eq!(types[2].ty(), EventType::of::<dyn Severity>());
    assert_eq!(types[3].ty(), EventType::of::<dyn Audited>());

    assert_eq!(closure_of::<Heartbeat>().len(), 4);
    assert_eq!(closure_of::<Lifecycle>().len(), 1);

    let disk = DiskAlert {
        alert: Alert { level: 3 },
        mount: "/var".to_string(),
    };
    assert_eq!(disk.alert.level(), 3);
    assert_eq!(disk.mount, "/var");
    let beat = Heartbeat(Alert { level: 1 }, 9);
    assert_eq!(beat.1, 9);
    let _ = Lifecycle::Stopped { code: 0 };
    let _ = Lifecycle::Started;
}
