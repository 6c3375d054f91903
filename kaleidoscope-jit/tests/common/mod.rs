//! Common utils for tests
#![allow(dead_code)]

use kaleidoscope::session::{Outcome, Session};
use kaleidoscope_jit::CraneliftJit;

/// Initialize the logger for tests
pub fn init_env_logger() {
    let _ = env_logger::builder().is_test(true).try_init();
}

pub fn jit_session() -> Session<CraneliftJit> {
    init_env_logger();
    Session::new(CraneliftJit::new().expect("host machine should be supported"))
}

/// Run `src`, expecting every item to succeed, and return the evaluated values.
pub fn eval_all(session: &mut Session<CraneliftJit>, src: &str) -> Vec<f64> {
    session
        .run_source(src)
        .into_iter()
        .filter_map(|outcome| match outcome {
            Ok(Outcome::Evaluated { value, .. }) => Some(value),
            Ok(_) => None,
            Err(err) => panic!("unexpected error: {}", err.report()),
        })
        .collect()
}
