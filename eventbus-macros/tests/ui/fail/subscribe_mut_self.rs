use eventbus_macros::subscriber;

struct Clock;

#[subscriber]
impl Clock {
    #[subscribe]
    fn on_tick(&mut self, _tick: &u32) {}
}

fn main() {
    let _ = Clock;
}
