//! Conversion of script values into plain JSON.
//!
//! Arbitrary script values (cycles, functions, getters that throw, exotic
//! numbers) are turned into a `serde_json::Value` that is always finite and
//! always serializable.
//!
//! Visited values are tracked for the whole walk, not just the current path.
//! A value reachable twice without a cycle (`const s = {}; [s, s]`) renders
//! its second occurrence as [`CIRCULAR_MARKER`]. Nesting deeper than
//! [`MAX_DEPTH`] is cut off with [`DEPTH_MARKER`], which keeps both the walk
//! and the resulting JSON within a fixed stack depth.

use rquickjs::function::This;
use rquickjs::{Array, Coerced, Ctx, Object, Value};
use serde_json::Value as JsonValue;
use std::collections::HashSet;
use std::time::Instant;

/// Placeholder for a structured value that was already visited
pub const CIRCULAR_MARKER: &str = "[Circular Reference]";

/// Placeholder for a value whose read raised an exception
pub const UNREADABLE_MARKER: &str = "[Unreadable]";

/// Placeholder for a structured value nested past [`MAX_DEPTH`]
pub const DEPTH_MARKER: &str = "[Max Depth]";

/// Deepest array or object nesting that is converted.
///
/// Stays below `serde_json`'s parse recursion limit so stored records can be
/// read back.
pub const MAX_DEPTH: usize = 100;

/// Largest float converted to a JSON integer (2^53)
const MAX_SAFE_INTEGER: f64 = 9_007_199_254_740_992.0;

/// Walks a script value graph and produces JSON
pub struct Sanitizer<'js> {
    ctx: Ctx<'js>,
    seen: HashSet<Value<'js>>,
    depth: usize,
    deadline: Option<Instant>,
    expired: bool,
}

impl<'js> Sanitizer<'js> {
    /// Create a sanitizer bound to a context
    #[must_use]
    pub fn new(ctx: Ctx<'js>) -> Self {
        Self {
            ctx,
            seen: HashSet::new(),
            depth: 0,
            deadline: None,
            expired: false,
        }
    }

    /// Stop walking once `deadline` passes; remaining values become `null`
    #[must_use]
    pub fn with_deadline(mut self, deadline: Instant) -> Self {
        self.deadline = Some(deadline);
        self
    }

    /// Whether the walk was cut short by the deadline
    #[must_use]
    pub fn expired(&self) -> bool {
        self.expired
    }

    /// Convert a value to JSON
    pub fn sanitize(&mut self, value: &Value<'js>) -> JsonValue {
        if self.past_deadline() {
            return JsonValue::Null;
        }
        if value.is_undefined() || value.is_null() {
            return JsonValue::Null;
        }
        if let Some(b) = value.as_bool() {
            return JsonValue::Bool(b);
        }
        if let Some(i) = value.as_int() {
            return JsonValue::from(i);
        }
        if let Some(f) = value.as_float() {
            return number(f);
        }
        if let Some(s) = value.as_string() {
            return match s.to_string() {
                Ok(s) => JsonValue::String(s),
                Err(err) => self.unreadable(err),
            };
        }
        if value.is_function() {
            return JsonValue::String(self.describe_function(value));
        }
        if let Some(array) = value.as_array() {
            return self.descend(value, |this| this.array(array));
        }
        if let Some(object) = value.as_object() {
            return self.descend(value, |this| this.object(object));
        }
        self.text(value)
    }

    /// Render a value the way a console line shows it
    pub fn render(&mut self, value: &Value<'js>) -> String {
        if let Some(s) = value.as_string() {
            return s.to_string().unwrap_or_else(|err| {
                self.discard(err);
                UNREADABLE_MARKER.to_string()
            });
        }
        if value.is_function() || value.is_object() {
            return match self.sanitize(value) {
                JsonValue::String(s) => s,
                other => other.to_string(),
            };
        }
        match self.text(value) {
            JsonValue::String(s) => s,
            other => other.to_string(),
        }
    }

    fn past_deadline(&mut self) -> bool {
        if !self.expired && self.deadline.is_some_and(|d| Instant::now() >= d) {
            self.expired = true;
        }
        self.expired
    }

    /// Walk one level down, unless `value` was seen or the depth cap is hit
    fn descend(&mut self, value: &Value<'js>, walk: impl FnOnce(&mut Self) -> JsonValue) -> JsonValue {
        if self.seen.contains(value) {
            return JsonValue::String(CIRCULAR_MARKER.to_string());
        }
        if self.depth >= MAX_DEPTH {
            return JsonValue::String(DEPTH_MARKER.to_string());
        }
        self.seen.insert(value.clone());
        self.depth += 1;
        let out = walk(self);
        self.depth -= 1;
        out
    }

    fn array(&mut self, array: &Array<'js>) -> JsonValue {
        let len = array.len();
        let mut items = Vec::with_capacity(len.min(1024));
        for index in 0..len {
            if self.past_deadline() {
                break;
            }
            let item = match array.get::<Value<'js>>(index) {
                Ok(item) => self.sanitize(&item),
                Err(err) => self.unreadable(err),
            };
            items.push(item);
        }
        JsonValue::Array(items)
    }

    fn object(&mut self, object: &Object<'js>) -> JsonValue {
        match object.get::<_, Value<'js>>("toJSON") {
            Ok(to_json) => {
                if let Some(func) = to_json.as_function() {
                    return match func.call::<_, Value<'js>>((This(object.clone()),)) {
                        Ok(replaced) => self.sanitize(&replaced),
                        Err(err) => self.unreadable(err),
                    };
                }
            }
            Err(err) => return self.unreadable(err),
        }

        let mut map = serde_json::Map::new();
        for key in object.keys::<String>() {
            if self.past_deadline() {
                break;
            }
            let key = match key {
                Ok(key) => key,
                Err(err) => {
                    self.discard(err);
                    continue;
                }
            };
            match object.get::<_, Value<'js>>(key.as_str()) {
                Ok(value) if value.is_undefined() => {}
                Ok(value) => {
                    let value = self.sanitize(&value);
                    map.insert(key, value);
                }
                Err(err) => {
                    let value = self.unreadable(err);
                    map.insert(key, value);
                }
            }
        }
        JsonValue::Object(map)
    }

    fn describe_function(&mut self, value: &Value<'js>) -> String {
        let name = match value.as_object().map(|o| o.get::<_, Option<String>>("name")) {
            Some(Ok(name)) => name,
            Some(Err(err)) => {
                self.discard(err);
                None
            }
            None => None,
        };
        match name.filter(|n| !n.is_empty()) {
            Some(name) => format!("[Function: {}]", name),
            None => "[Function: anonymous]".to_string(),
        }
    }

    fn text(&mut self, value: &Value<'js>) -> JsonValue {
        if value.is_symbol() {
            return JsonValue::String("[Symbol]".to_string());
        }
        match value.get::<Coerced<String>>() {
            Ok(Coerced(s)) => JsonValue::String(s),
            Err(err) => self.unreadable(err),
        }
    }

    fn unreadable(&mut self, err: rquickjs::Error) -> JsonValue {
        self.discard(err);
        JsonValue::String(UNREADABLE_MARKER.to_string())
    }

    /// Clear a pending exception so later reads start clean
    fn discard(&mut self, err: rquickjs::Error) {
        if matches!(err, rquickjs::Error::Exception) {
            let _ = self.ctx.catch();
        }
    }
}

fn number(f: f64) -> JsonValue {
    if !f.is_finite() {
        return JsonValue::Null;
    }
    if f.fract() == 0.0 && f.abs() <= MAX_SAFE_INTEGER {
        return JsonValue::from(f as i64);
    }
    serde_json::Number::from_f64(f).map_or(JsonValue::Null, JsonValue::Number)
}
