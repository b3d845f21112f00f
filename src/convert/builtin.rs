//! Built-in invariant converters
//!
//! Every parser here is culture-invariant: no locale-dependent separators,
//! no ambient formatting state.

use serde_json::Value;

use super::TypeConverter;
use crate::constants::convert::{FALSE_WORDS, HEX_PREFIX, TRUE_WORDS};
use crate::schema::IntKind;

pub struct BoolConverter;

impl TypeConverter for BoolConverter {
    fn parse(&self, raw: &str) -> Result<Value, String> {
        let lowered = raw.trim().to_lowercase();
        if TRUE_WORDS.contains(&lowered.as_str()) {
            Ok(Value::Bool(true))
        } else if FALSE_WORDS.contains(&lowered.as_str()) {
            Ok(Value::Bool(false))
        } else {
            Err(format!(
                "expected one of {} or {}",
                TRUE_WORDS.join("/"),
                FALSE_WORDS.join("/")
            ))
        }
    }
}

pub struct IntegerConverter(pub IntKind);

impl TypeConverter for IntegerConverter {
    fn parse(&self, raw: &str) -> Result<Value, String> {
        let trimmed = raw.trim();
        let (negative, unsigned) = match trimmed.strip_prefix('-') {
            Some(rest) => (true, rest),
            None => (false, trimmed.strip_prefix('+').unwrap_or(trimmed)),
        };

        let (digits, radix) = match unsigned
            .strip_prefix(HEX_PREFIX)
            .or_else(|| unsigned.strip_prefix("0X"))
        {
            Some(hex) => (hex, 16),
            None => (unsigned, 10),
        };
        // Only one leading sign is accepted
        if digits.starts_with(['+', '-']) {
            return Err("invalid digit found in string".to_string());
        }
        let magnitude = i128::from_str_radix(digits, radix).map_err(|e| e.to_string())?;

        let value = if negative { -magnitude } else { magnitude };
        let (min, max) = self.0.range();
        if value < min || value > max {
            return Err(format!("{} is out of range [{}, {}]", value, min, max));
        }

        // In range, so the narrowing below cannot truncate
        Ok(if self.0.is_signed() {
            Value::from(value as i64)
        } else {
            Value::from(value as u64)
        })
    }
}

pub struct FloatConverter;

impl TypeConverter for FloatConverter {
    fn parse(&self, raw: &str) -> Result<Value, String> {
        let value: f64 = raw.trim().parse().map_err(|e: std::num::ParseFloatError| e.to_string())?;
        if !value.is_finite() {
            return Err("non-finite values are not supported".to_string());
        }
        Ok(Value::from(value))
    }
}

pub struct CharConverter;

impl TypeConverter for CharConverter {
    fn parse(&self, raw: &str) -> Result<Value, String> {
        let mut chars = raw.chars();
        match (chars.next(), chars.next()) {
            (Some(c), None) => Ok(Value::String(c.to_string())),
            _ => Err("expected exactly one character".to_string()),
        }
    }
}

/// Text and paths are taken verbatim
pub struct TextConverter;

impl TypeConverter for TextConverter {
    fn parse(&self, raw: &str) -> Result<Value, String> {
        Ok(Value::String(raw.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_bool_spellings() {
        for raw in ["true", "True", "TRUE", "1", "yes", " on "] {
            assert_eq!(BoolConverter.parse(raw), Ok(json!(true)), "{raw}");
        }
        for raw in ["false", "False", "0", "no", "off"] {
            assert_eq!(BoolConverter.parse(raw), Ok(json!(false)), "{raw}");
        }
        assert!(BoolConverter.parse("maybe").is_err());
    }

    #[test]
    fn test_integer_parsing() {
        let i32c = IntegerConverter(IntKind::I32);
        assert_eq!(i32c.parse("43"), Ok(json!(43)));
        assert_eq!(i32c.parse(" -17 "), Ok(json!(-17)));
        assert_eq!(i32c.parse("+5"), Ok(json!(5)));
        assert_eq!(i32c.parse("0x1F"), Ok(json!(31)));
        assert!(i32c.parse("NOT_INTEGER").is_err());
        assert!(i32c.parse("1,000").is_err());
        assert!(i32c.parse("--5").is_err());
        assert!(i32c.parse("+-5").is_err());
    }

    #[test]
    fn test_integer_ranges() {
        assert!(IntegerConverter(IntKind::U8).parse("256").is_err());
        assert!(IntegerConverter(IntKind::U32).parse("-1").is_err());
        assert_eq!(
            IntegerConverter(IntKind::U64).parse("18446744073709551615"),
            Ok(json!(u64::MAX))
        );
        assert_eq!(
            IntegerConverter(IntKind::I64).parse("-9223372036854775808"),
            Ok(json!(i64::MIN))
        );
    }

    #[test]
    fn test_float_is_invariant() {
        assert_eq!(FloatConverter.parse("1.5"), Ok(json!(1.5)));
        assert_eq!(FloatConverter.parse("-2e3"), Ok(json!(-2000.0)));
        // Comma decimal separators are locale-specific and rejected
        assert!(FloatConverter.parse("1,5").is_err());
        assert!(FloatConverter.parse("NaN").is_err());
        assert!(FloatConverter.parse("inf").is_err());
    }

    #[test]
    fn test_char() {
        assert_eq!(CharConverter.parse("x"), Ok(json!("x")));
        assert!(CharConverter.parse("xy").is_err());
    }

    #[test]
    fn test_text_is_verbatim() {
        assert_eq!(TextConverter.parse("  spaced  "), Ok(json!("  spaced  ")));
    }
}
