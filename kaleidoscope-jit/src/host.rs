//! Functions of the host process that compiled code can call by name.
//!
//! Host functions are collected at link time: any crate linked into the
//! final binary can add one with [host_function!](crate::host_function).

use std::{
    io::{self, Write},
    sync::LazyLock,
};

use rustc_hash::FxHashMap;

/// Host functions take and return doubles, like everything in Kaleidoscope.
#[derive(Clone, Copy, Debug)]
pub enum HostFn {
    Unary(extern "C" fn(f64) -> f64),
    Binary(extern "C" fn(f64, f64) -> f64),
}

impl HostFn {
    pub fn arity(&self) -> usize {
        match self {
            HostFn::Unary(_) => 1,
            HostFn::Binary(_) => 2,
        }
    }

    pub fn address(&self) -> usize {
        match self {
            HostFn::Unary(f) => *f as usize,
            HostFn::Binary(f) => *f as usize,
        }
    }
}

#[derive(Debug)]
pub struct HostFunction {
    pub name: &'static str,
    pub func: HostFn,
}

#[linkme::distributed_slice]
pub static HOST_FUNCTIONS: [HostFunction] = [..];

static HOST_FUNCTIONS_MAP: LazyLock<FxHashMap<&'static str, &'static HostFunction>> =
    LazyLock::new(|| HOST_FUNCTIONS.iter().map(|h| (h.name, h)).collect());

/// Find a host function by name.
pub fn lookup(name: &str) -> Option<&'static HostFunction> {
    HOST_FUNCTIONS_MAP.get(name).copied()
}

/// All registered host functions.
pub fn host_functions() -> impl Iterator<Item = &'static HostFunction> {
    HOST_FUNCTIONS.iter()
}

/// Register a host function.
/// ```
/// extern "C" fn twice(x: f64) -> f64 {
///     x * 2.0
/// }
/// kaleidoscope_jit::host_function!(TWICE, "twice", Unary(twice));
///
/// fn main() {
///     let twice = kaleidoscope_jit::host::lookup("twice").unwrap();
///     assert_eq!(twice.func.arity(), 1);
/// }
/// ```
#[macro_export]
macro_rules! host_function {
    ($static_name: ident, $name: expr, $kind: ident($func: expr)) => {
        #[$crate::linkme::distributed_slice($crate::host::HOST_FUNCTIONS)]
        #[linkme(crate = $crate::linkme)]
        static $static_name: $crate::host::HostFunction = $crate::host::HostFunction {
            name: $name,
            func: $crate::host::HostFn::$kind($func),
        };
    };
}

extern "C" fn putchard(x: f64) -> f64 {
    let mut stderr = io::stderr().lock();
    let _ = stderr.write_all(&[x as u8]);
    let _ = stderr.flush();
    0.0
}
host_function!(PUTCHARD, "putchard", Unary(putchard));

extern "C" fn printd(x: f64) -> f64 {
    eprintln!("{:.6}", x);
    0.0
}
host_function!(PRINTD, "printd", Unary(printd));

macro_rules! libm_unary {
    ($static_name: ident, $name: ident) => {
        const _: () = {
            extern "C" fn $name(x: f64) -> f64 {
                x.$name()
            }
            host_function!($static_name, stringify!($name), Unary($name));
        };
    };
}

libm_unary!(SIN, sin);
libm_unary!(COS, cos);
libm_unary!(TAN, tan);
libm_unary!(SQRT, sqrt);
libm_unary!(EXP, exp);
libm_unary!(FLOOR, floor);
libm_unary!(CEIL, ceil);

extern "C" fn log(x: f64) -> f64 {
    x.ln()
}
host_function!(LOG, "log", Unary(log));

extern "C" fn fabs(x: f64) -> f64 {
    x.abs()
}
host_function!(FABS, "fabs", Unary(fabs));

extern "C" fn pow(x: f64, y: f64) -> f64 {
    x.powf(y)
}
host_function!(POW, "pow", Binary(pow));

extern "C" fn fmod(x: f64, y: f64) -> f64 {
    x % y
}
host_function!(FMOD, "fmod", Binary(fmod));
