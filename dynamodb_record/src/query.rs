use crate::{
    error::BulkError,
    filter::{Filter, Operator},
    model::{Deletion, Model, SoftDeletes},
    record::{key_string, BulkAction, Record},
    Error,
};
use dynamodb_utils::{
    sdk::types::{AttributeValue, Condition},
    Client, IntoValue, Item,
};
use futures_util::TryStreamExt;
use serde::Serialize;
use serde_dynamo::aws_sdk_dynamodb_1::{from_item, to_item};
use std::{collections::HashMap, fmt, marker::PhantomData};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
enum Trashed {
    #[default]
    Without,
    With,
    Only,
}

/// `Scan`の条件を組み立てます
///
/// 条件はカラムごとに1つで、同じカラムに付け直すと上書きされます。
pub struct Query<M> {
    client: Client,
    filters: HashMap<String, Filter>,
    columns: Option<Vec<String>>,
    trashed: Trashed,
    _model: PhantomData<fn() -> M>,
}

impl<M> fmt::Debug for Query<M> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Query")
            .field("filters", &self.filters)
            .field("columns", &self.columns)
            .field("trashed", &self.trashed)
            .finish_non_exhaustive()
    }
}

impl<M> Clone for Query<M> {
    fn clone(&self) -> Self {
        Self {
            client: self.client.clone(),
            filters: self.filters.clone(),
            columns: self.columns.clone(),
            trashed: self.trashed,
            _model: PhantomData,
        }
    }
}

impl<M: Model> Query<M> {
    pub fn new(client: &Client) -> Self {
        Self {
            client: client.clone(),
            filters: HashMap::new(),
            columns: None,
            trashed: Trashed::default(),
            _model: PhantomData,
        }
    }

    /// テーブルの全件を取得します
    pub async fn all(client: &Client) -> Result<Vec<Record<M>>, Error> {
        Self::new(client).get().await
    }

    /// 積み上げた条件
    pub fn filters(&self) -> &HashMap<String, Filter> {
        &self.filters
    }

    fn push(mut self, column: impl Into<String>, filter: Filter) -> Self {
        self.filters.insert(column.into(), filter);
        self
    }

    /// `column = value`
    pub fn where_eq(self, column: impl Into<String>, value: impl IntoValue) -> Self {
        self.push(column, Filter::new(Operator::Eq, vec![value.into_value()]))
    }

    /// `column <operator> value`
    ///
    /// `operator`は`=, !=, <>, <=, <, >=, >, like, not like`のどれかです。
    /// それ以外は[`Error::InvalidOperator`]になります
    pub fn where_op(
        self,
        column: impl Into<String>,
        operator: &str,
        value: impl IntoValue,
    ) -> Result<Self, Error> {
        let operator: Operator = operator.parse()?;
        Ok(self.push(column, Filter::new(operator, vec![value.into_value()])))
    }

    /// 項目がないもの
    pub fn where_null(self, column: impl Into<String>) -> Self {
        self.push(column, Filter::new(Operator::Null, Vec::new()))
    }

    /// 項目があるもの
    pub fn where_not_null(self, column: impl Into<String>) -> Self {
        self.push(column, Filter::new(Operator::NotNull, Vec::new()))
    }

    /// `column`が`values`のどれか。
    /// `values`が空だと、取得するときに[`Error::Client`]になります(リクエストは送られません)
    pub fn where_in<V: IntoValue>(
        self,
        column: impl Into<String>,
        values: impl IntoIterator<Item = V>,
    ) -> Self {
        let values = values.into_iter().map(IntoValue::into_value).collect();
        self.push(column, Filter::new(Operator::In, values))
    }

    /// `low <= column <= high`
    pub fn where_between(
        self,
        column: impl Into<String>,
        low: impl IntoValue,
        high: impl IntoValue,
    ) -> Self {
        self.push(
            column,
            Filter::new(Operator::Between, vec![low.into_value(), high.into_value()]),
        )
    }

    pub fn where_begins_with(self, column: impl Into<String>, prefix: impl IntoValue) -> Self {
        self.push(column, Filter::new(Operator::BeginsWith, vec![prefix.into_value()]))
    }

    /// 取得する項目を絞ります。`*`か空なら全部
    pub fn select<C: Into<String>>(mut self, columns: impl IntoIterator<Item = C>) -> Self {
        let columns: Vec<String> = columns.into_iter().map(Into::into).collect();
        self.columns = match columns.first().map(String::as_str) {
            None | Some("*") => None,
            Some(_) => Some(columns),
        };
        self
    }

    /// 絞っているときでもprimary keyは必ず取得します
    fn projection(&self) -> Option<Vec<String>> {
        self.columns.clone().map(|mut columns| {
            if !columns.iter().any(|c| c == M::PRIMARY_KEY) {
                columns.push(M::PRIMARY_KEY.to_owned());
            }
            columns
        })
    }

    fn scan_filter(&self) -> Result<HashMap<String, Condition>, Error> {
        let mut filters = self.filters.clone();
        if <M::Deletion as Deletion>::SOFT && self.trashed == Trashed::Without {
            filters
                .entry(M::DELETED_AT.to_owned())
                .or_insert_with(|| Filter::new(Operator::Null, Vec::new()));
        }
        filters
            .iter()
            .map(|(column, filter)| Ok((column.clone(), filter.to_condition()?)))
            .collect()
    }

    /// 条件でscanして、全ページ分のrecordを返します
    pub async fn get(&self) -> Result<Vec<Record<M>>, Error> {
        let items: Vec<Item> = self
            .client
            .scan_raw(M::table(), self.scan_filter()?, self.projection())
            .try_collect()
            .await?;
        items
            .into_iter()
            .map(|item| Record::from_item(&self.client, item))
            .collect()
    }

    pub async fn first(&self) -> Result<Option<Record<M>>, Error> {
        Ok(self.get().await?.into_iter().next())
    }

    pub async fn last(&self) -> Result<Option<Record<M>>, Error> {
        Ok(self.get().await?.pop())
    }

    pub async fn first_or_fail(&self) -> Result<Record<M>, Error> {
        self.first().await?.ok_or(Error::ModelNotFound {
            model: M::name(),
            key: None,
        })
    }

    /// primary keyで取得します。なければ`None`
    pub async fn find(&self, id: impl IntoValue) -> Result<Option<Record<M>>, Error> {
        let output = self
            .client
            .get_item_raw(M::table(), M::PRIMARY_KEY, id, self.projection())
            .await?;
        output
            .item
            .map(|item| Record::from_item(&self.client, item))
            .transpose()
    }

    pub async fn find_or_fail(&self, id: impl IntoValue) -> Result<Record<M>, Error> {
        let id = id.into_value();
        self.find(&id).await?.ok_or_else(|| Error::ModelNotFound {
            model: M::name(),
            key: Some(key_string(&id)),
        })
    }

    /// `attributes`に一致する最初のrecordを返します。
    /// なければ`attributes`と`values`から作って保存します。重なる項目は`attributes`が勝ちます
    pub async fn first_or_create(
        self,
        attributes: impl Serialize,
        values: impl Serialize,
    ) -> Result<Record<M>, Error> {
        let attributes: Item = to_item(attributes)?;
        let mut query = self;
        for (column, value) in &attributes {
            query = match value {
                AttributeValue::Null(_) => query.where_null(column.clone()),
                value => query.where_eq(column.clone(), value),
            };
        }
        if let Some(found) = query.first().await? {
            return Ok(found);
        }

        let mut merged: Item = to_item(values)?;
        merged.extend(attributes);
        Record::create(&query.client, from_item(merged)?).await
    }

    /// 条件に合うものを1件ずつ削除します
    /// [`SoftDeletes`]なら`deleted_at`を付けます
    pub async fn delete(self) -> Result<usize, Error> {
        self.for_each(BulkAction::Delete).await
    }

    async fn for_each(&self, action: BulkAction) -> Result<usize, Error> {
        let table = M::table();
        let mut succeeded = 0;
        let mut failures = Vec::new();
        for mut record in self.get().await? {
            let key = record.key().map(key_string).unwrap_or_default();
            match record.perform(action).await {
                Ok(()) => succeeded += 1,
                Err(e) => {
                    tracing::warn!(table = %table, key = %key, action = ?action, error = %e, "bulk operation failed");
                    failures.push((key, e));
                }
            }
        }
        if failures.is_empty() {
            Ok(succeeded)
        } else {
            Err(Error::Bulk(BulkError {
                succeeded,
                failures,
            }))
        }
    }
}

impl<M: Model<Deletion = SoftDeletes>> Query<M> {
    /// 削除済みも含めます
    pub fn with_trashed(mut self) -> Self {
        self.trashed = Trashed::With;
        self
    }

    /// 削除済みだけにします
    pub fn only_trashed(mut self) -> Self {
        self.trashed = Trashed::Only;
        self.where_not_null(M::DELETED_AT)
    }

    /// 条件に合う削除済みのものを1件ずつ戻します
    pub async fn restore(self) -> Result<usize, Error> {
        let query = match self.trashed {
            Trashed::Without => self.only_trashed(),
            _ => self,
        };
        query.for_each(BulkAction::Restore).await
    }

    /// 条件に合うものを1件ずつ本当に削除します。
    /// 削除済みも対象にするなら[`with_trashed`](`Self::with_trashed`)を付けてください
    pub async fn force_delete(self) -> Result<usize, Error> {
        self.for_each(BulkAction::ForceDelete).await
    }
}
