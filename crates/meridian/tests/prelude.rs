//! Smoke test for the umbrella crate's prelude.

use meridian::prelude::*;

#[derive(Object)]
#[object(no_factory)]
struct Dial {
    base: ObjectBase,

    #[property(write)]
    level: Property<i32>,
}

impl Dial {
    fn new() -> Self {
        Self {
            base: ObjectBase::new::<Self>(),
            level: Property::new(0),
        }
    }
}

#[test]
fn test_prelude_covers_the_common_surface() {
    init_global_registry();

    let dial = Dial::new();
    let meta = dial.meta_object().unwrap();
    assert_eq!(meta.type_name(), "Dial");
    assert_eq!(meta.property_count(), 1);

    dial.set_level(7);
    assert_eq!(dial.level.get(), 7);

    let reply = meta.meta_call(&dial, MetaCall::ReadProperty { index: 0 });
    let value = reply.into_value().unwrap();
    assert_eq!(value.downcast_ref::<i32>(), Some(&7));

    assert_eq!(Dial::level_changed().index(), Some(0));
}
