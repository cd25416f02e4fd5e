use crate::{
    mock::MockTables,
    sdk::{
        operation::{
            delete_item::DeleteItemOutput, get_item::GetItemOutput, put_item::PutItemOutput,
            update_item::UpdateItemOutput,
        },
        types::{AttributeAction, AttributeValue, AttributeValueUpdate, ComparisonOperator, Condition},
    },
    IntoValue,
};
use aws_smithy_types_convert::stream::PaginationStreamExt;
use futures_util::{StreamExt, TryStream, TryStreamExt};
use std::collections::HashMap;

/// DynamoDbのitem
pub type Item = HashMap<String, AttributeValue>;

/// awsのDynamoDbの高レベルなClient.
/// 低レベルな操作は[`raw_client`](`Client::raw_client`)を使って取得したものを使ってください
///
/// リクエストはすべて旧形式のパラメータ(`ScanFilter`, `AttributesToGet`, `AttributeUpdates`)で組み立てます。
#[derive(Debug, Clone)]
pub struct Client {
    dynamodb: Option<aws_sdk_dynamodb::Client>,
    mock: MockTables,
}

impl Client {
    /// [`aws_sdk_dynamodb::Client`]から[`Client`]を作ります
    pub fn from_dynamodb_client(dynamo: aws_sdk_dynamodb::Client) -> Self {
        Self {
            dynamodb: Some(dynamo),
            mock: MockTables::default(),
        }
    }

    /// 環境変数から作ります
    ///
    /// `AWS_ENDPOINT_URL_DYNAMODB`を設定するとローカルのDynamoDbにも向けられます。
    pub async fn from_env() -> Self {
        let config = aws_config::from_env().load().await;
        Client::from_conf(&config)
    }

    /// コンフィグから作ります
    pub fn from_conf<C: Into<aws_sdk_dynamodb::Config>>(conf: C) -> Self {
        Self::from_dynamodb_client(aws_sdk_dynamodb::Client::from_conf(conf.into()))
    }

    /// Mock用のClientを作ります。
    /// このモードでは、メモリ上のテーブルに対して操作します。
    /// テーブルがないので、[`mock_table`](`Self::mock_table`)で追加してください。
    pub fn mock() -> Self {
        Self {
            dynamodb: None,
            mock: MockTables::default(),
        }
    }

    /// テーブル名とkeyの項目名の組からMock用のClientを作ります。
    pub fn mock_with_tables<T, K>(tables: impl IntoIterator<Item = (T, K)>) -> Self
    where
        T: Into<String>,
        K: Into<String>,
    {
        let client = Self::mock();
        for (table_name, key_name) in tables {
            client.mock_table(table_name, key_name);
        }
        client
    }

    /// Mockにテーブルを追加します。すでにあれば中身を空にします。
    /// mockでなければ何もしません。
    pub fn mock_table(&self, table_name: impl Into<String>, key_name: impl Into<String>) {
        if self.is_mock() {
            self.mock.create_table(table_name.into(), key_name.into());
        }
    }

    /// mockかどうか。
    pub fn is_mock(&self) -> bool {
        self.dynamodb.is_none()
    }

    /// 内側のclientを取得する
    /// mockだと`None`です。
    pub fn raw_client(&self) -> Option<&aws_sdk_dynamodb::Client> {
        self.dynamodb.as_ref()
    }
}

impl Client {
    /// itemを取得します
    ///
    /// `attributes_to_get`を渡すと、その項目だけを取得します
    pub async fn get_item_raw(
        &self,
        table_name: impl Into<String>,
        key_name: impl Into<String>,
        key_value: impl IntoValue,
        attributes_to_get: Option<Vec<String>>,
    ) -> Result<GetItemOutput, Error> {
        let (table_name, key_name, key_value) =
            (table_name.into(), key_name.into(), key_value.into_value());
        tracing::debug!(table = %table_name, key = %key_name, "get_item");
        let Some(dynamodb) = &self.dynamodb else {
            let item = self.mock.get_item(
                &table_name,
                &key_name,
                &key_value,
                attributes_to_get.as_deref(),
            )?;
            return Ok(GetItemOutput::builder().set_item(item).build());
        };
        dynamodb
            .get_item()
            .table_name(table_name)
            .key(key_name, key_value)
            .set_attributes_to_get(attributes_to_get)
            .send()
            .await
            .map_err(from_aws_sdk_dynamodb_error)
    }

    /// itemを登録します
    /// 生のitemを登録します。同じkeyのitemがあれば置き換わります。
    pub async fn put_item_raw(
        &self,
        table_name: impl Into<String>,
        item: Item,
    ) -> Result<PutItemOutput, Error> {
        let table_name = table_name.into();
        tracing::debug!(table = %table_name, attributes = item.len(), "put_item");
        let Some(dynamodb) = &self.dynamodb else {
            self.mock.put_item(&table_name, item)?;
            return Ok(PutItemOutput::builder().build());
        };
        dynamodb
            .put_item()
            .table_name(table_name)
            .set_item(Some(item))
            .send()
            .await
            .map_err(from_aws_sdk_dynamodb_error)
    }

    /// itemを削除します。
    pub async fn delete_item(
        &self,
        table_name: impl Into<String>,
        key_name: impl Into<String>,
        key_value: impl IntoValue,
    ) -> Result<DeleteItemOutput, Error> {
        let (table_name, key_name, key_value) =
            (table_name.into(), key_name.into(), key_value.into_value());
        tracing::debug!(table = %table_name, key = %key_name, "delete_item");
        let Some(dynamodb) = &self.dynamodb else {
            self.mock.delete_item(&table_name, &key_name, &key_value)?;
            return Ok(DeleteItemOutput::builder().build());
        };
        dynamodb
            .delete_item()
            .table_name(table_name)
            .key(key_name, key_value)
            .send()
            .await
            .map_err(from_aws_sdk_dynamodb_error)
    }

    /// 特定のアイテムの項目をまとめて更新します
    ///
    /// - `key_name` 更新対象のitemの、keyの項目名
    /// - `key_value` 更新対象のitemの、keyの値
    /// - `updates` 項目名ごとの更新内容。[`put_value`]か[`delete_value`]で作ります
    pub async fn update_attributes(
        &self,
        table_name: impl Into<String>,
        key_name: impl Into<String>,
        key_value: impl IntoValue,
        updates: HashMap<String, AttributeValueUpdate>,
    ) -> Result<UpdateItemOutput, Error> {
        let (table_name, key_name, key_value) =
            (table_name.into(), key_name.into(), key_value.into_value());
        tracing::debug!(
            table = %table_name,
            key = %key_name,
            attributes = updates.len(),
            "update_item"
        );
        let Some(dynamodb) = &self.dynamodb else {
            self.mock
                .update_item(&table_name, &key_name, key_value, &updates)?;
            return Ok(UpdateItemOutput::builder().build());
        };
        dynamodb
            .update_item()
            .table_name(table_name)
            .key(key_name, key_value)
            .set_attribute_updates(Some(updates))
            .send()
            .await
            .map_err(from_aws_sdk_dynamodb_error)
    }

    /// scanを掛けます
    ///
    /// `scan_filter`の条件はすべてANDで評価されます。ページングは中でやります。
    pub fn scan_raw(
        &self,
        table_name: impl Into<String>,
        scan_filter: HashMap<String, Condition>,
        attributes_to_get: Option<Vec<String>>,
    ) -> impl TryStream<Ok = Item, Error = Error> {
        let table_name = table_name.into();
        tracing::debug!(table = %table_name, filters = scan_filter.len(), "scan");
        match &self.dynamodb {
            Some(dynamodb) => dynamodb
                .scan()
                .table_name(table_name)
                .set_scan_filter((!scan_filter.is_empty()).then_some(scan_filter))
                .set_attributes_to_get(attributes_to_get)
                .into_paginator()
                .items()
                .send()
                .into_stream_03x()
                .map_err(from_aws_sdk_dynamodb_error)
                .left_stream(),
            None => {
                let items: Vec<Result<Item, Error>> = match self.mock.scan(
                    &table_name,
                    &scan_filter,
                    attributes_to_get.as_deref(),
                ) {
                    Ok(items) => items.into_iter().map(Ok).collect(),
                    Err(e) => vec![Err(e)],
                };
                futures_util::stream::iter(items).right_stream()
            }
        }
    }
}

/// `ScanFilter`の条件を作ります
///
/// `NULL`と`NOT_NULL`は値を取らないので、`values`は空にしてください。
/// `IN`が空だとDynamoDbに拒否されるので、送る前にエラーにします
pub fn condition(
    comparison_operator: ComparisonOperator,
    values: Vec<AttributeValue>,
) -> Result<Condition, Error> {
    if comparison_operator == ComparisonOperator::In && values.is_empty() {
        return Err(Error::Validation(
            "One or more parameter values were invalid: Invalid number of argument(s) for the IN ComparisonOperator".to_owned(),
        ));
    }
    Condition::builder()
        .comparison_operator(comparison_operator)
        .set_attribute_value_list((!values.is_empty()).then_some(values))
        .build()
        .map_err(from_aws_sdk_dynamodb_error)
}

/// 項目の値を置き換える`AttributeUpdates`
pub fn put_value(value: impl IntoValue) -> AttributeValueUpdate {
    AttributeValueUpdate::builder()
        .action(AttributeAction::Put)
        .value(value.into_value())
        .build()
}

/// 項目を消す`AttributeUpdates`
pub fn delete_value() -> AttributeValueUpdate {
    AttributeValueUpdate::builder()
        .action(AttributeAction::Delete)
        .build()
}

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error(transparent)]
    DynamoDb(#[from] aws_sdk_dynamodb::Error),
    #[error("Requested resource not found: Table: {0} not found")]
    ResourceNotFound(String),
    #[error("{0}")]
    Validation(String),
}

pub(crate) fn from_aws_sdk_dynamodb_error(e: impl Into<aws_sdk_dynamodb::Error>) -> Error {
    Error::DynamoDb(e.into())
}
