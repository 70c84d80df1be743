use serde_json::{json, Value};
use std::sync::LazyLock;

pub static CONFIG_SCHEMA: LazyLock<Value> = LazyLock::new(|| {
    json!({
        "$schema": "http://json-schema.org/draft-07/schema#",
        "type": "object",
        "properties": {
            "database": {
                "type": "object",
                "properties": {
                    "path": { "type": "string", "minLength": 1 },
                    "rebuild_strategy": { "type": "string", "enum": ["transactional", "journaled"] }
                },
                "additionalProperties": false
            },
            "log": {
                "type": "object",
                "properties": {
                    "level": { "type": "string" },
                    "format": { "type": "string", "enum": ["pretty", "json"] }
                },
                "additionalProperties": false
            }
        },
        "additionalProperties": false
    })
});
