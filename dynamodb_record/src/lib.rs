//! DynamoDbのitemをactive record風に扱います
//!
//! `Scan`/`GetItem`/`PutItem`/`UpdateItem`/`DeleteItem`だけを使う、テーブル1つ単位の薄いCRUDです。

pub use dynamodb_utils::{sdk, Client, IntoValue, Item};
pub use error::{BulkError, Error};
pub use filter::{Filter, Operator, OPERATORS};
pub use model::{Deletion, HardDeletes, Model, Mutator, SoftDeletes};
pub use query::Query;
pub use record::Record;
pub use table::table_name_for;

mod error;
mod filter;
mod model;
mod query;
mod record;
mod table;
