//! Built-in generators and default cases for well-known types.
//!
//! Every generator here is a pure function of its complexity and the random
//! source, and the expected magnitude of what it produces grows with
//! complexity.

use crate::model::{TypeRef, Value};
use rand::Rng;
use rand_chacha::ChaCha8Rng;

/// Largest chance that a generated `char` leaves ASCII.
const MAX_UNICODE_CHANCE: f64 = 0.15;

/// Printable code point ranges outside ASCII that generated text may use.
const UNICODE_BLOCKS: [(u32, u32); 4] = [
    (0x00A1, 0x00FF),
    (0x0391, 0x03C9),
    (0x0410, 0x044F),
    (0x3041, 0x3096),
];

/// Whether a built-in generator exists for this scalar type.
pub fn has_scalar(ty: &TypeRef) -> bool {
    ty.is_primitive() || *ty == TypeRef::String
}

/// Generate a scalar value, or `None` if `ty` is not a built-in scalar.
pub fn scalar(ty: &TypeRef, complexity: u32, max_length: u32, rng: &mut ChaCha8Rng) -> Option<Value> {
    let value = match ty {
        TypeRef::Boolean => Value::Bool(rng.gen()),
        TypeRef::Byte => {
            let bound = complexity.min(i8::MAX as u32) as i8;
            Value::Byte(rng.gen_range(-bound..=bound))
        }
        TypeRef::Short => {
            let bound = complexity.min(i16::MAX as u32) as i16;
            Value::Short(rng.gen_range(-bound..=bound))
        }
        TypeRef::Int => Value::Int(int(complexity, rng)),
        TypeRef::Long => {
            let c = i64::from(complexity);
            let bound = c.saturating_mul(c).saturating_mul(2);
            Value::Long(rng.gen_range(-bound..=bound))
        }
        TypeRef::Float => Value::Float(double(complexity, rng) as f32),
        TypeRef::Double => Value::Double(double(complexity, rng)),
        TypeRef::Char => Value::Char(character(complexity, rng)),
        TypeRef::String => Value::Str(string(complexity, max_length, rng)),
        _ => return None,
    };
    Some(value)
}

/// Uniform in `[-c, c]`, with `c` kept far from overflow.
pub fn int(complexity: u32, rng: &mut ChaCha8Rng) -> i32 {
    let bound = complexity.min((i32::MAX / 2) as u32) as i32;
    rng.gen_range(-bound..=bound)
}

/// Uniform in `[-c, c]`; always finite.
pub fn double(complexity: u32, rng: &mut ChaCha8Rng) -> f64 {
    if complexity == 0 {
        return 0.0;
    }
    let bound = f64::from(complexity);
    rng.gen::<f64>() * 2.0 * bound - bound
}

/// Printable ASCII, occasionally (more often as complexity grows) a
/// printable character from a few other scripts.
pub fn character(complexity: u32, rng: &mut ChaCha8Rng) -> char {
    let unicode_chance = (f64::from(complexity) * MAX_UNICODE_CHANCE / 32.0).min(MAX_UNICODE_CHANCE);
    if rng.gen_bool(unicode_chance) {
        let (low, high) = UNICODE_BLOCKS[rng.gen_range(0..UNICODE_BLOCKS.len())];
        if let Some(c) = char::from_u32(rng.gen_range(low..=high)) {
            return c;
        }
    }
    ascii(rng)
}

/// Printable ASCII only.
pub fn ascii(rng: &mut ChaCha8Rng) -> char {
    char::from(rng.gen_range(32u8..=126))
}

/// Length drawn from `0..=min(c, max_length)`.
pub fn string(complexity: u32, max_length: u32, rng: &mut ChaCha8Rng) -> String {
    let len = rng.gen_range(0..=complexity.min(max_length));
    (0..len).map(|_| character(complexity, rng)).collect()
}

/// Array length for a complexity: zero at complexity zero, otherwise
/// `1..=min(c, max_length)`.
pub fn array_length(complexity: u32, max_length: u32, rng: &mut ChaCha8Rng) -> usize {
    let cap = complexity.min(max_length);
    if cap == 0 {
        0
    } else {
        rng.gen_range(1..=cap) as usize
    }
}

/// Built-in boundary inputs for a type.
pub fn edge_cases(ty: &TypeRef) -> Option<Vec<Value>> {
    let cases = match ty {
        TypeRef::Int => vec![Value::Int(0)],
        TypeRef::Byte => vec![Value::Byte(0)],
        TypeRef::Short => vec![Value::Short(0)],
        TypeRef::Long => vec![Value::Long(0)],
        TypeRef::Float => vec![Value::Float(0.0)],
        TypeRef::Double => vec![Value::Double(0.0)],
        TypeRef::Char => vec![Value::Char(' ')],
        _ => return None,
    };
    Some(cases)
}

/// Built-in representative inputs for a type.
pub fn simple_cases(ty: &TypeRef) -> Option<Vec<Value>> {
    let cases = match ty {
        TypeRef::Int => vec![Value::Int(-1), Value::Int(1)],
        TypeRef::Byte => vec![Value::Byte(-1), Value::Byte(1)],
        TypeRef::Short => vec![Value::Short(-1), Value::Short(1)],
        TypeRef::Long => vec![Value::Long(-1), Value::Long(1)],
        TypeRef::Float => vec![Value::Float(-1.0), Value::Float(1.0)],
        TypeRef::Double => vec![Value::Double(-1.0), Value::Double(1.0)],
        TypeRef::Char => vec![Value::Char('a'), Value::Char('A'), Value::Char('0')],
        TypeRef::String => vec![Value::from("a"), Value::from("A"), Value::from("0")],
        TypeRef::Array(element) => match element.as_ref() {
            TypeRef::Char => vec![Value::Array(vec![Value::Char(' ')])],
            TypeRef::String => vec![Value::Array(vec![Value::from("")])],
            other if other.is_primitive() && *other != TypeRef::Boolean => {
                vec![Value::Array(vec![zero(other)])]
            }
            _ => return None,
        },
        _ => return None,
    };
    Some(cases)
}

fn zero(ty: &TypeRef) -> Value {
    crate::model::zero_value(ty)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;

    fn rng() -> ChaCha8Rng {
        ChaCha8Rng::seed_from_u64(0x0403)
    }

    #[test]
    fn test_complexity_zero_is_quiet() {
        let mut rng = rng();
        for _ in 0..100 {
            assert_eq!(int(0, &mut rng), 0);
            assert_eq!(double(0, &mut rng), 0.0);
            assert_eq!(string(0, 256, &mut rng), "");
            assert_eq!(array_length(0, 256, &mut rng), 0);
        }
    }

    #[test]
    fn test_bounds() {
        let mut rng = rng();
        for c in [1u32, 5, 50, 1000] {
            for _ in 0..200 {
                assert!(int(c, &mut rng).unsigned_abs() <= c);
                assert!(double(c, &mut rng).abs() <= f64::from(c));
                let len = array_length(c, 8, &mut rng);
                assert!((1..=8usize.min(c as usize)).contains(&len));
            }
        }
    }

    #[test]
    fn test_ascii_is_printable() {
        let mut rng = rng();
        for _ in 0..1000 {
            let c = ascii(&mut rng);
            assert!((' '..='~').contains(&c));
        }
    }

    #[test]
    fn test_byte_clamps() {
        let mut rng = rng();
        for _ in 0..100 {
            assert!(matches!(
                scalar(&TypeRef::Byte, 10_000, 256, &mut rng),
                Some(Value::Byte(_))
            ));
        }
    }

    fn magnitude(value: &Value) -> f64 {
        match value {
            Value::Byte(v) => f64::from(v.unsigned_abs()),
            Value::Short(v) => f64::from(v.unsigned_abs()),
            Value::Int(v) => f64::from(v.unsigned_abs()),
            Value::Long(v) => v.unsigned_abs() as f64,
            Value::Float(v) => f64::from(v.abs()),
            Value::Double(v) => v.abs(),
            Value::Char(c) => f64::from(u32::from(*c)),
            Value::Str(s) => s.chars().count() as f64,
            other => panic!("no magnitude for {:?}", other),
        }
    }

    fn mean_magnitude(ty: &TypeRef, complexity: u32, rng: &mut ChaCha8Rng) -> f64 {
        const DRAWS: u32 = 4000;
        let total: f64 = (0..DRAWS)
            .map(|_| magnitude(&scalar(ty, complexity, 256, rng).unwrap()))
            .sum();
        total / f64::from(DRAWS)
    }

    #[test]
    fn test_magnitude_grows_with_complexity() {
        // Growth stops at the range limits: byte at 127, short at 32767,
        // and char once the non-ASCII chance plateaus at complexity 32.
        let mut rng = rng();
        let cases = [
            (TypeRef::Byte, 5, 50),
            (TypeRef::Short, 5, 50),
            (TypeRef::Int, 5, 50),
            (TypeRef::Long, 5, 50),
            (TypeRef::Float, 5, 50),
            (TypeRef::Double, 5, 50),
            (TypeRef::Char, 2, 30),
            (TypeRef::String, 5, 50),
        ];
        for (ty, low, high) in cases {
            let small = mean_magnitude(&ty, low, &mut rng);
            let large = mean_magnitude(&ty, high, &mut rng);
            assert!(large > small, "{:?}: mean {} at {} vs {} at {}", ty, small, low, large, high);
        }
    }

    #[test]
    fn test_default_cases() {
        assert_eq!(edge_cases(&TypeRef::Int), Some(vec![Value::Int(0)]));
        assert_eq!(edge_cases(&TypeRef::Boolean), None);
        assert_eq!(
            simple_cases(&TypeRef::array(TypeRef::Int)),
            Some(vec![Value::Array(vec![Value::Int(0)])])
        );
        assert_eq!(
            simple_cases(&TypeRef::array(TypeRef::String)),
            Some(vec![Value::Array(vec![Value::from("")])])
        );
    }
}
