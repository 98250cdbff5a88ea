use std::{cell::RefCell, ffi::OsStr};

#[derive(Clone, Copy)]
struct Env {
    step_limit: Option<usize>,
    trace_enabled: bool,
}

thread_local! {
    /// Must only be mutated within `set_env`
    static ENV: RefCell<Option<Env>> = const { RefCell::new(None) };
}

pub fn init() {
    let value = Env {
        step_limit: var_parsed("I8085_STEP_LIMIT"),
        trace_enabled: var_is("I8085_TRACE", "1"),
    };
    set_env(value);
}

/// Maximum number of instructions to drive before giving up.
pub fn step_limit() -> Option<usize> {
    with_env(|env| env.step_limit)
}

/// Print every change notification while running.
pub fn is_trace_enabled() -> bool {
    with_env(|env| env.trace_enabled)
}

fn set_env(value: Env) {
    ENV.with(|env| {
        let mut env = env.borrow_mut();
        assert!(
            env.is_none(),
            "tried to initialize environment state multiple times"
        );
        *env = Some(value);
    });
}

fn with_env<F, R>(callback: F) -> R
where
    F: Fn(&Env) -> R,
{
    ENV.with(|env| {
        let env = env.borrow();
        let env = env.unwrap_or_else(|| {
            panic!("tried to access environment state before initialization");
        });
        callback(&env)
    })
}

fn var_is(name: impl AsRef<OsStr>, value: impl AsRef<str>) -> bool {
    std::env::var(name.as_ref()).is_ok_and(|v| v == value.as_ref())
}

// Unset or unparseable values are ignored
fn var_parsed(name: impl AsRef<OsStr>) -> Option<usize> {
    std::env::var(name.as_ref())
        .ok()
        .and_then(|v| v.trim().parse().ok())
}
