#![no_main]

use ferrous_beans::{BeanDefinition, BeanReference, Container};
use libfuzzer_sys::fuzz_target;

#[derive(Default)]
struct Part;

const NAMES: [&str; 6] = ["a", "b", "c", "d", "e", "f"];

fuzz_target!(|data: &[u8]| {
    let container = Container::new();

    // Each pair of bytes is one operation on a small name space
    for chunk in data.chunks_exact(2) {
        let name = NAMES[(chunk[0] as usize) % NAMES.len()];
        let other = NAMES[(chunk[1] as usize) % NAMES.len()];
        match chunk[0] % 5 {
            0 => {
                let _ = container.register_definition(name, BeanDefinition::builder::<Part>().default_constructor().build());
            }
            1 => {
                let definition = BeanDefinition::builder::<Part>()
                    .constructor([BeanReference::to(other).into()], |_| Ok(Part))
                    .build();
                let _ = container.register_definition(name, definition);
            }
            2 => {
                let _ = container.register_alias(name, other);
            }
            3 => {
                let _ = container.remove_definition(name);
            }
            _ => {
                // Cycles and missing names must surface as errors, never hang
                let _ = container.get_instance(name);
            }
        }
    }

    let _ = container.close();
});
