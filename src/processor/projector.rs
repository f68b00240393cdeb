use serde_json::{Map, Value};

use crate::models::{
    Guitar, SharedFields, CONDITION_REPORT_FIELD, PURCHASE_DATE_FIELD, PURCHASE_PRICE_FIELD,
};

/// Returns the subset of `guitar` that `fields` marks public.
///
/// Values are copied verbatim; absent attributes stay absent. Condition
/// documentation and purchase details only come through their dedicated flags.
pub fn project(guitar: &Guitar, fields: &SharedFields) -> Map<String, Value> {
    let source = match serde_json::to_value(guitar) {
        Ok(Value::Object(map)) => map,
        _ => return Map::new(),
    };

    let mut output = Map::new();

    for (name, visible) in fields.iter() {
        if !visible || is_composite(name) {
            continue;
        }
        if let Some(value) = source.get(name).filter(|value| !value.is_null()) {
            output.insert(name.to_string(), value.clone());
        }
    }

    if fields.is_shared(CONDITION_REPORT_FIELD) {
        if let Some(ref diagram) = guitar.body_diagram {
            output.insert("bodyDiagram".to_string(), diagram.clone());
        }
        if let Some(ref markers) = guitar.condition_markers {
            output.insert("conditionMarkers".to_string(), Value::from(markers.clone()));
        }
    }

    if let Some(ref private) = guitar.private_info {
        if fields.is_shared(PURCHASE_PRICE_FIELD) {
            if let Some(price) = private.purchase_price {
                output.insert(PURCHASE_PRICE_FIELD.to_string(), Value::from(price));
            }
        }
        if fields.is_shared(PURCHASE_DATE_FIELD) {
            if let Some(ref date) = private.purchase_date {
                output.insert(PURCHASE_DATE_FIELD.to_string(), Value::from(date.clone()));
            }
        }
    }

    output
}

fn is_composite(name: &str) -> bool {
    matches!(
        name,
        CONDITION_REPORT_FIELD | PURCHASE_PRICE_FIELD | PURCHASE_DATE_FIELD
    )
}
