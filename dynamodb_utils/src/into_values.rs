use crate::sdk::{primitives::Blob, types::AttributeValue};

/// DynamoDbの[`AttributeValue`]に変換できる値
pub trait IntoValue {
    fn into_value(self) -> AttributeValue;
}

impl IntoValue for AttributeValue {
    fn into_value(self) -> AttributeValue {
        self
    }
}

impl IntoValue for &AttributeValue {
    fn into_value(self) -> AttributeValue {
        self.clone()
    }
}

impl IntoValue for String {
    fn into_value(self) -> AttributeValue {
        AttributeValue::S(self)
    }
}

impl IntoValue for &String {
    fn into_value(self) -> AttributeValue {
        AttributeValue::S(self.clone())
    }
}

impl IntoValue for &str {
    fn into_value(self) -> AttributeValue {
        AttributeValue::S(self.into())
    }
}

impl IntoValue for bool {
    fn into_value(self) -> AttributeValue {
        AttributeValue::Bool(self)
    }
}

macro_rules! num_into_value {
($($t: ty),*) => {
    $(
        impl IntoValue for $t {
            fn into_value(self) -> AttributeValue {
                AttributeValue::N(self.to_string())
            }
        }
    )*
};
}

num_into_value!(i8, i16, i32, i64, i128, u8, u16, u32, u64, u128, f32, f64);

impl IntoValue for Vec<u8> {
    fn into_value(self) -> AttributeValue {
        AttributeValue::B(Blob::new(self))
    }
}

/// `None`は`NULL`になります
impl<T: IntoValue> IntoValue for Option<T> {
    fn into_value(self) -> AttributeValue {
        match self {
            Some(value) => value.into_value(),
            None => AttributeValue::Null(true),
        }
    }
}
