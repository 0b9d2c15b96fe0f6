//! Capability context construction.
//!
//! A context starts from the full QuickJS intrinsic set and is then cut down
//! to an allow-list of pure globals. The only host capability added back is
//! a frozen `console` whose every method is charged against the call budget.

use crate::budget::CallBudget;
use crate::context::{ContextHandle, Stream};
use crate::sanitize::Sanitizer;
use rquickjs::function::Rest;
use rquickjs::{Context, Ctx, Exception, Function, Object, Runtime, Value};
use std::time::Instant;

/// Console methods and the stream each writes to
pub const CONSOLE_METHODS: [(&str, Stream); 4] = [
    ("log", Stream::Log),
    ("info", Stream::Log),
    ("error", Stream::Error),
    ("warn", Stream::Error),
];

/// Globals a script may see after lockdown
pub const ALLOWED_GLOBALS: &[&str] = &[
    "Object",
    "Array",
    "Number",
    "Boolean",
    "String",
    "Symbol",
    "Math",
    "JSON",
    "Date",
    "RegExp",
    "Map",
    "Set",
    "WeakMap",
    "WeakSet",
    "Error",
    "EvalError",
    "RangeError",
    "ReferenceError",
    "SyntaxError",
    "TypeError",
    "URIError",
    "AggregateError",
    "InternalError",
    "parseInt",
    "parseFloat",
    "isNaN",
    "isFinite",
    "encodeURI",
    "encodeURIComponent",
    "decodeURI",
    "decodeURIComponent",
    "NaN",
    "Infinity",
    "undefined",
    "console",
];

/// Removes every global outside the allow-list, then pins `console`.
/// Runs as host code before the script; `eval` and `Function` go with it.
const LOCKDOWN: &str = r#"
(function (global, allowed) {
    var keep = {};
    for (var i = 0; i < allowed.length; i++) {
        keep[allowed[i]] = true;
    }
    var names = Object.getOwnPropertyNames(global);
    for (var j = 0; j < names.length; j++) {
        if (!Object.prototype.hasOwnProperty.call(keep, names[j])) {
            delete global[names[j]];
        }
    }
    Object.defineProperty(global, "console", {
        value: Object.freeze(global.console),
        writable: false,
        enumerable: false,
        configurable: false
    });
})
"#;

/// The fixed set of host bindings for one run
#[derive(Debug, Clone)]
pub struct HostBindings {
    context: ContextHandle,
    budget: CallBudget,
    deadline: Option<Instant>,
}

impl HostBindings {
    /// Bind console output to `context`, charged against `budget`
    #[must_use]
    pub fn new(context: ContextHandle, budget: CallBudget) -> Self {
        Self {
            context,
            budget,
            deadline: None,
        }
    }

    /// Stop rendering console arguments once `deadline` passes
    #[must_use]
    pub fn with_deadline(mut self, deadline: Instant) -> Self {
        self.deadline = Some(deadline);
        self
    }

    /// Context receiving console output
    #[must_use]
    pub fn context(&self) -> &ContextHandle {
        &self.context
    }

    /// Call budget applied to every console method
    #[must_use]
    pub fn budget(&self) -> CallBudget {
        self.budget
    }

    /// Build a locked-down context on `runtime`
    ///
    /// # Errors
    ///
    /// Returns error if the engine fails to create or prepare the context
    pub fn build(&self, runtime: &Runtime) -> rquickjs::Result<Context> {
        let context = Context::full(runtime)?;
        context.with(|ctx| self.install(&ctx))?;
        Ok(context)
    }

    fn install<'js>(&self, ctx: &Ctx<'js>) -> rquickjs::Result<()> {
        let console = Object::new(ctx.clone())?;
        for (name, stream) in CONSOLE_METHODS {
            console.set(name, self.console_method(ctx, stream)?)?;
        }
        ctx.globals().set("console", console)?;

        let lockdown: Function<'js> = ctx.eval(LOCKDOWN)?;
        lockdown.call::<_, ()>((ctx.globals(), ALLOWED_GLOBALS.to_vec()))?;
        Ok(())
    }

    fn console_method<'js>(&self, ctx: &Ctx<'js>, stream: Stream) -> rquickjs::Result<Function<'js>> {
        let handle = self.context.clone();
        let budget = self.budget;
        let deadline = self.deadline;
        Function::new(
            ctx.clone(),
            move |ctx: Ctx<'js>, args: Rest<Value<'js>>| -> rquickjs::Result<()> {
                if let Err(err) = handle.charge(&budget) {
                    return Err(Exception::throw_message(&ctx, &err.to_string()));
                }
                let mut sanitizer = Sanitizer::new(ctx.clone());
                if let Some(deadline) = deadline {
                    sanitizer = sanitizer.with_deadline(deadline);
                }
                let line = args
                    .0
                    .iter()
                    .map(|arg| sanitizer.render(arg))
                    .collect::<Vec<_>>()
                    .join(" ");
                handle.push(stream, line);
                Ok(())
            },
        )
    }
}
