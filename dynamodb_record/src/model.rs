use crate::{
    query::Query,
    table::{short_type_name, table_name_for},
};
use dynamodb_utils::{sdk::types::AttributeValue, Client};
use serde::{de::DeserializeOwned, Serialize};

/// DynamoDbのテーブル1つに対応するrecordの型
///
/// ```no_run
/// # use dynamodb_record::*;
/// #[derive(Debug, Default, serde::Serialize, serde::Deserialize)]
/// struct Order {
///     id: Option<String>,
///     status: String,
/// }
///
/// impl Model for Order {
///     type Deletion = HardDeletes;
/// }
///
/// # async fn run() -> Result<(), Error> {
/// let client = Client::from_env().await;
/// let paid = Order::query(&client).where_op("status", "=", "paid")?.get().await?;
/// # Ok(())
/// # }
/// ```
///
/// `None`のフィールドは項目なしとして保存します。
pub trait Model: Serialize + DeserializeOwned + Send + Sync + 'static {
    /// 削除の仕方。[`HardDeletes`]か[`SoftDeletes`]
    type Deletion: Deletion;

    /// テーブル名。`None`なら型名を複数形のsnake_caseにしたもの
    const TABLE: Option<&'static str> = None;
    const PRIMARY_KEY: &'static str = "id";
    const CREATED_AT: &'static str = "created_at";
    const UPDATED_AT: &'static str = "updated_at";
    const DELETED_AT: &'static str = "deleted_at";
    /// `false`なら`created_at`/`updated_at`を付けません
    const TIMESTAMPS: bool = true;
    /// 保存する前に項目の値を変換します
    const SET_MUTATORS: &'static [Mutator] = &[];
    /// 取得した後に項目の値を変換します
    const GET_MUTATORS: &'static [Mutator] = &[];

    /// エラーに載せる型名
    fn name() -> &'static str {
        short_type_name::<Self>()
    }

    fn table() -> String {
        Self::TABLE
            .map(str::to_owned)
            .unwrap_or_else(|| table_name_for(Self::name()))
    }

    /// このテーブルへの問い合わせを始めます
    fn query(client: &Client) -> Query<Self>
    where
        Self: Sized,
    {
        Query::new(client)
    }
}

/// 項目名と変換関数の組
#[derive(Debug, Clone, Copy)]
pub struct Mutator {
    pub attribute: &'static str,
    pub transform: fn(AttributeValue) -> AttributeValue,
}

impl Mutator {
    pub const fn new(attribute: &'static str, transform: fn(AttributeValue) -> AttributeValue) -> Self {
        Self {
            attribute,
            transform,
        }
    }
}

pub(crate) fn apply_mutators(mutators: &[Mutator], item: &mut dynamodb_utils::Item) {
    for mutator in mutators {
        if let Some(value) = item.remove(mutator.attribute) {
            item.insert(mutator.attribute.to_owned(), (mutator.transform)(value));
        }
    }
}

/// 削除の仕方
pub trait Deletion: Send + Sync + 'static {
    /// `true`なら削除は`deleted_at`を付けるだけになります
    const SOFT: bool;
}

/// 削除するとitemが消えます
#[derive(Debug)]
pub enum HardDeletes {}

impl Deletion for HardDeletes {
    const SOFT: bool = false;
}

/// 削除すると`deleted_at`が付きます。
/// 普通の取得からは外れ、`restore`で戻せます
#[derive(Debug)]
pub enum SoftDeletes {}

impl Deletion for SoftDeletes {
    const SOFT: bool = true;
}
