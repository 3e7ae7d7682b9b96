#![no_main]

use ferrous_beans::{ConfigProvider, ExpressionEvaluator, MapConfigSource, PlaceholderEvaluator, Value};
use libfuzzer_sys::fuzz_target;
use std::sync::Arc;

fuzz_target!(|data: &[u8]| {
    let Ok(expression) = std::str::from_utf8(data) else {
        return;
    };

    let provider = ConfigProvider::new().with_source(
        MapConfigSource::new()
            .with("db.host", "localhost")
            .with("db.port", 5432)
            .with("debug", true),
    );
    let evaluator = PlaceholderEvaluator::new(Arc::new(provider));

    // Must never panic; errors are fine
    if let Ok(value) = evaluator.evaluate(expression, None) {
        if !expression.contains("${") {
            assert_eq!(value, Value::String(expression.to_string()));
        }
    }
});
