use eventbus_macros::subscriber;

struct Clock;

#[subscriber]
impl Clock {
    #[subscribe]
    async fn on_tick(&self, _tick: &u32) {}
}

fn main() {
    let _ = Clock;
}
