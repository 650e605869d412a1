//! Variable bindings.
//!
//! Every host gets its own copy of the play's variables when the play starts.
//! Facts set by a task (`set_fact`, `setup`, `register`) are written into that
//! host's copy only, so no host can ever observe another host's mutations.

use indexmap::IndexMap;
use serde_json::Value;

/// Variable name to structured value (scalar, mapping or sequence).
pub type Vars = IndexMap<String, Value>;

/// Build an independent copy of `vars` for one host.
///
/// Mappings and sequences are copied recursively; nothing is shared with the
/// source afterwards.
pub fn host_copy(vars: &Vars) -> Vars {
    vars.iter()
        .map(|(k, v)| (k.clone(), deep_copy(v)))
        .collect()
}

fn deep_copy(value: &Value) -> Value {
    match value {
        Value::Object(map) => Value::Object(
            map.iter()
                .map(|(k, v)| (k.clone(), deep_copy(v)))
                .collect(),
        ),
        Value::Array(items) => Value::Array(items.iter().map(deep_copy).collect()),
        scalar => scalar.clone(),
    }
}

/// Merge facts into a host's bindings, later values winning.
pub fn merge_facts(vars: &mut Vars, facts: &Vars) {
    for (k, v) in facts {
        vars.insert(k.clone(), deep_copy(v));
    }
}

/// Look up a dotted path such as `pkg.version` through nested mappings.
pub fn lookup<'a>(vars: &'a Vars, path: &str) -> Option<&'a Value> {
    let mut parts = path.split('.');
    let mut current = vars.get(parts.next()?)?;
    for part in parts {
        current = match current {
            Value::Object(map) => map.get(part)?,
            Value::Array(items) => items.get(part.parse::<usize>().ok()?)?,
            _ => return None,
        };
    }
    Some(current)
}

/// Convert play variables into a template rendering context.
pub fn to_context(vars: &Vars) -> Value {
    Value::Object(vars.iter().map(|(k, v)| (k.clone(), v.clone())).collect())
}
