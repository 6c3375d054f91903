//! SSA values and the types they can have.

use std::fmt;

use crate::instruction::Inst;

/// The IR has a single numeric type plus the result of comparisons.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Type {
    Double,
    Bool,
}

impl fmt::Display for Type {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Type::Double => write!(f, "double"),
            Type::Bool => write!(f, "i1"),
        }
    }
}

/// An `f64` compared and hashed by its bit pattern.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct Ieee64(u64);

impl From<f64> for Ieee64 {
    fn from(value: f64) -> Self {
        Ieee64(value.to_bits())
    }
}

impl From<Ieee64> for f64 {
    fn from(value: Ieee64) -> Self {
        f64::from_bits(value.0)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Constant {
    Double(Ieee64),
    Bool(bool),
}

impl Constant {
    pub fn get_type(&self) -> Type {
        match self {
            Constant::Double(_) => Type::Double,
            Constant::Bool(_) => Type::Bool,
        }
    }
}

impl fmt::Display for Constant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Constant::Double(d) => write!(f, "{}", fmt_double((*d).into())),
            Constant::Bool(b) => write!(f, "{}", b),
        }
    }
}

/// Format a double the way LLVM's textual IR does: `%e` with six digits
/// when that reads back exactly, the hex bit pattern otherwise.
pub fn fmt_double(value: f64) -> String {
    if value.is_finite() {
        let sci = format!("{:.6e}", value);
        if let Some((mantissa, exp)) = sci.split_once('e') {
            if let Ok(exp) = exp.parse::<i32>() {
                let sign = if exp < 0 { '-' } else { '+' };
                let text = format!("{}e{}{:02}", mantissa, sign, exp.abs());
                if text.parse::<f64>().map(f64::to_bits) == Ok(value.to_bits()) {
                    return text;
                }
            }
        }
    }
    format!("0x{:016X}", value.to_bits())
}

/// An SSA value: a function parameter, an instruction result or a constant.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Value {
    /// The n-th parameter of the enclosing function.
    Param(usize),
    /// The result of an instruction.
    Inst(Inst),
    Const(Constant),
}

impl Value {
    pub fn double(value: f64) -> Self {
        Value::Const(Constant::Double(value.into()))
    }

    pub fn bool(value: bool) -> Self {
        Value::Const(Constant::Bool(value))
    }

    /// The value of a double constant.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Const(Constant::Double(d)) => Some((*d).into()),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Const(Constant::Bool(b)) => Some(*b),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::fmt_double;

    #[test]
    fn double_formatting() {
        assert_eq!(fmt_double(10.0), "1.000000e+01");
        assert_eq!(fmt_double(0.0), "0.000000e+00");
        assert_eq!(fmt_double(-2.5), "-2.500000e+00");
        assert_eq!(fmt_double(1e-7), "1.000000e-07");
        assert_eq!(fmt_double(0.1), "1.000000e-01");
        assert_eq!(fmt_double(1.0 / 3.0), "0x3FD5555555555555");
        assert_eq!(fmt_double(f64::INFINITY), "0x7FF0000000000000");
    }
}
