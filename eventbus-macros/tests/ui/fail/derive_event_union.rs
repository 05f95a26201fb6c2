use eventbus_macros::Event;

#[derive(Event)]
union Bits {
    raw: u32,
}

fn main() {
    let bits = Bits { raw: 1 };
    assert_eq!(unsafe { bits.raw }, 1);
}
