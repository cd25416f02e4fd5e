pub use client::{condition, delete_value, put_value, Client, Error, Item};
pub use into_values::IntoValue;

mod client;
mod into_values;
mod mock;

pub mod sdk {
    pub use aws_sdk_dynamodb::*;
}

pub mod sdk_config {
    pub use aws_config::*;
}
