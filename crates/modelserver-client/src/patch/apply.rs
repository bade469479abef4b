//! Local application of patch operations.

use serde_json::Value;

use super::{PatchError, PatchOperation};
use crate::model::ID_KEY;

const APPEND_TOKEN: &str = "-";

/// Location within a document after resolving an operation path.
struct Resolved {
    tokens: Vec<String>,
    model_addressed: bool,
}

/// Applies `operations` in order to a copy of `model`.
///
/// `model` itself is left untouched. Model-addressed paths locate
/// `#elementId` by a depth-first search for the object whose `$id` matches;
/// an empty fragment or one starting with `/` addresses the root. Adding to
/// an existing array through a model-addressed feature path appends.
///
/// # Errors
///
/// Returns [`PatchError`] for the first operation that cannot be applied.
pub fn apply_patch(model: &Value, operations: &[PatchOperation]) -> Result<Value, PatchError> {
    let mut document = model.clone();
    for operation in operations {
        apply_operation(&mut document, operation)?;
    }
    Ok(document)
}

fn apply_operation(document: &mut Value, operation: &PatchOperation) -> Result<(), PatchError> {
    let path = operation.path();
    let resolved = resolve(document, path)?;
    match operation {
        PatchOperation::Add { value, .. } => apply_add(document, &resolved, value.clone(), path),
        PatchOperation::Remove { .. } => apply_remove(document, &resolved.tokens, path),
        PatchOperation::Replace { value, .. } => {
            apply_replace(document, &resolved, value.clone(), path)
        }
    }
}

fn resolve(document: &Value, path: &str) -> Result<Resolved, PatchError> {
    // JSON pointers start with `/` and may contain `#` in their keys.
    let model_address = path
        .split_once('#')
        .filter(|_| !path.is_empty() && !path.starts_with('/'));
    let Some((_, fragment)) = model_address else {
        return pointer_tokens(path).map(|tokens| Resolved {
            tokens,
            model_addressed: false,
        });
    };

    let (element_id, rest) = fragment.split_once('/').unwrap_or((fragment, ""));
    let mut tokens = if element_id.is_empty() {
        Vec::new()
    } else {
        locate(document, element_id).ok_or_else(|| PatchError::ElementNotFound {
            element_id: element_id.to_owned(),
        })?
    };
    tokens.extend(
        rest.split('/')
            .filter(|segment| !segment.is_empty())
            .flat_map(expand_segment),
    );
    Ok(Resolved {
        tokens,
        model_addressed: true,
    })
}

fn pointer_tokens(path: &str) -> Result<Vec<String>, PatchError> {
    if path.is_empty() {
        return Ok(Vec::new());
    }
    let Some(pointer) = path.strip_prefix('/') else {
        return Err(PatchError::InvalidPath {
            path: path.to_owned(),
        });
    };
    Ok(pointer.split('/').map(unescape).collect())
}

fn unescape(token: &str) -> String {
    token.replace("~1", "/").replace("~0", "~")
}

/// `@feature.3` fragments address position 3 of `feature`.
fn expand_segment(segment: &str) -> Vec<String> {
    match segment
        .strip_prefix('@')
        .and_then(|feature| feature.split_once('.'))
    {
        Some((feature, index)) => vec![feature.to_owned(), index.to_owned()],
        None => vec![unescape(segment)],
    }
}

fn locate(value: &Value, element_id: &str) -> Option<Vec<String>> {
    let prefixed = |key: String, mut tokens: Vec<String>| {
        tokens.insert(0, key);
        tokens
    };
    match value {
        Value::Object(object) => {
            if object.get(ID_KEY).and_then(Value::as_str) == Some(element_id) {
                return Some(Vec::new());
            }
            object.iter().find_map(|(key, child)| {
                locate(child, element_id).map(|tokens| prefixed(key.clone(), tokens))
            })
        }
        Value::Array(items) => items.iter().enumerate().find_map(|(index, child)| {
            locate(child, element_id).map(|tokens| prefixed(index.to_string(), tokens))
        }),
        _ => None,
    }
}

fn get<'a>(document: &'a Value, tokens: &[String]) -> Option<&'a Value> {
    tokens.iter().try_fold(document, |current, token| match current {
        Value::Object(object) => object.get(token),
        Value::Array(items) => token.parse::<usize>().ok().and_then(|index| items.get(index)),
        _ => None,
    })
}

fn get_mut<'a>(
    document: &'a mut Value,
    tokens: &[String],
    path: &str,
) -> Result<&'a mut Value, PatchError> {
    let mut current = document;
    for token in tokens {
        current = match current {
            Value::Object(object) => object.get_mut(token),
            Value::Array(items) => token
                .parse::<usize>()
                .ok()
                .and_then(|index| items.get_mut(index)),
            _ => None,
        }
        .ok_or_else(|| not_found(path))?;
    }
    Ok(current)
}

fn apply_add(
    document: &mut Value,
    resolved: &Resolved,
    value: Value,
    path: &str,
) -> Result<(), PatchError> {
    let appends_to_feature =
        resolved.model_addressed && get(document, &resolved.tokens).is_some_and(Value::is_array);
    if appends_to_feature {
        if let Value::Array(items) = get_mut(document, &resolved.tokens, path)? {
            items.push(value);
        }
        return Ok(());
    }

    let Some((key, parent_tokens)) = resolved.tokens.split_last() else {
        *document = value;
        return Ok(());
    };
    match get_mut(document, parent_tokens, path)? {
        Value::Object(object) => {
            object.insert(key.clone(), value);
            Ok(())
        }
        Value::Array(items) if key == APPEND_TOKEN => {
            items.push(value);
            Ok(())
        }
        Value::Array(items) => {
            let index = parse_index(key, path)?;
            if index > items.len() {
                return Err(invalid_index(key, path));
            }
            items.insert(index, value);
            Ok(())
        }
        _ => Err(invalid_target(path)),
    }
}

fn apply_remove(document: &mut Value, tokens: &[String], path: &str) -> Result<(), PatchError> {
    let Some((key, parent_tokens)) = tokens.split_last() else {
        return Err(invalid_target(path));
    };
    match get_mut(document, parent_tokens, path)? {
        Value::Object(object) => object
            .remove(key)
            .map(|_| ())
            .ok_or_else(|| not_found(path)),
        Value::Array(items) => {
            let index = parse_index(key, path)?;
            if index >= items.len() {
                return Err(invalid_index(key, path));
            }
            items.remove(index);
            Ok(())
        }
        _ => Err(invalid_target(path)),
    }
}

fn apply_replace(
    document: &mut Value,
    resolved: &Resolved,
    value: Value,
    path: &str,
) -> Result<(), PatchError> {
    let Some((key, parent_tokens)) = resolved.tokens.split_last() else {
        *document = value;
        return Ok(());
    };
    match get_mut(document, parent_tokens, path)? {
        // Model features may be absent while unset, so replacing one creates it.
        Value::Object(object) if resolved.model_addressed || object.contains_key(key) => {
            object.insert(key.clone(), value);
            Ok(())
        }
        Value::Object(_) => Err(not_found(path)),
        Value::Array(items) => {
            let index = parse_index(key, path)?;
            let slot = items
                .get_mut(index)
                .ok_or_else(|| invalid_index(key, path))?;
            *slot = value;
            Ok(())
        }
        _ => Err(invalid_target(path)),
    }
}

fn parse_index(token: &str, path: &str) -> Result<usize, PatchError> {
    token
        .parse::<usize>()
        .map_err(|_| invalid_index(token, path))
}

fn not_found(path: &str) -> PatchError {
    PatchError::NotFound {
        path: path.to_owned(),
    }
}

fn invalid_index(token: &str, path: &str) -> PatchError {
    PatchError::InvalidIndex {
        path: path.to_owned(),
        index: token.to_owned(),
    }
}

fn invalid_target(path: &str) -> PatchError {
    PatchError::InvalidTarget {
        path: path.to_owned(),
    }
}
