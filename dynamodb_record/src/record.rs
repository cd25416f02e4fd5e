use crate::{
    model::{apply_mutators, Deletion, Model, SoftDeletes},
    Error,
};
use dynamodb_utils::{
    delete_value, put_value, sdk::types::AttributeValue, Client, IntoValue, Item,
};
use serde_dynamo::aws_sdk_dynamodb_1::{from_item, to_item};
use std::{
    collections::HashMap,
    ops::{Deref, DerefMut},
};

/// DynamoDbのitem 1つ分のrecord
///
/// [`Deref`]で中のモデルのフィールドをそのまま読み書きできます。
#[derive(Debug)]
pub struct Record<M: Model> {
    client: Client,
    model: M,
    key: Option<AttributeValue>,
    // 最後に保存・取得したときの項目
    original: Item,
    // 最後に保存・取得したときのモデルをitemにしたもの。変更の検出に使います
    baseline: Item,
    exists: bool,
}

#[derive(Debug, Clone, Copy)]
pub(crate) enum BulkAction {
    Delete,
    Restore,
    ForceDelete,
}

impl<M: Model> Record<M> {
    /// まだ保存していないrecordを作ります
    pub fn new(client: &Client, model: M) -> Self {
        Self {
            client: client.clone(),
            model,
            key: None,
            original: Item::new(),
            baseline: Item::new(),
            exists: false,
        }
    }

    /// recordを作って保存します
    pub async fn create(client: &Client, model: M) -> Result<Self, Error> {
        let mut record = Self::new(client, model);
        record.save().await?;
        Ok(record)
    }

    pub(crate) fn from_item(client: &Client, mut item: Item) -> Result<Self, Error> {
        apply_mutators(M::GET_MUTATORS, &mut item);
        let model: M = from_item(item.clone())?;
        Ok(Self {
            client: client.clone(),
            baseline: to_item(&model)?,
            model,
            key: item.get(M::PRIMARY_KEY).cloned(),
            original: item,
            exists: true,
        })
    }

    /// 保存済みか、DynamoDbから取得したものならtrue
    pub fn exists(&self) -> bool {
        self.exists
    }

    /// primary keyの値。保存するまでは`None`です
    pub fn key(&self) -> Option<&AttributeValue> {
        self.key.as_ref()
    }

    /// 最後に保存・取得したときの項目
    pub fn original(&self) -> &Item {
        &self.original
    }

    /// 最後に保存・取得してから変更された項目があるか
    pub fn is_dirty(&self) -> Result<bool, Error> {
        Ok(!self.changes()?.is_empty())
    }

    /// 最後に保存・取得してから変わった項目。消えた項目は`NULL`になります
    fn changes(&self) -> Result<Item, Error> {
        let current = self.marshal()?;
        let mut changes: Item = current
            .iter()
            .filter(|(name, value)| !same_value(self.baseline.get(*name), Some(*value)))
            .map(|(name, value)| (name.clone(), value.clone()))
            .collect();
        for (name, value) in &self.baseline {
            if !current.contains_key(name) && !same_value(Some(value), None) {
                changes.insert(name.clone(), AttributeValue::Null(true));
            }
        }
        Ok(changes)
    }

    /// 保存される形のitemにします
    pub fn to_item(&self) -> Result<Item, Error> {
        let mut item = strip_nulls(self.marshal()?);
        if let Some(key) = &self.key {
            item.insert(M::PRIMARY_KEY.to_owned(), key.clone());
        }
        Ok(item)
    }

    pub fn into_inner(self) -> M {
        self.model
    }

    /// 保存します。
    /// 新しいrecordならkeyと`created_at`を付けてputし、
    /// 既存のrecordなら`updated_at`を付けて、変更した項目だけを更新します。
    /// 取得していない項目や、他で付けられた`deleted_at`には触りません
    pub async fn save(&mut self) -> Result<(), Error> {
        if self.exists {
            let mut changes = self.changes()?;
            apply_mutators(M::SET_MUTATORS, &mut changes);
            self.perform_update(changes).await
        } else {
            let mut item = self.marshal()?;
            apply_mutators(M::SET_MUTATORS, &mut item);
            self.perform_insert(item).await
        }
    }

    /// 削除します。
    /// [`SoftDeletes`]なら`deleted_at`を付けるだけです
    pub async fn delete(&mut self) -> Result<(), Error> {
        if <M::Deletion as Deletion>::SOFT {
            self.perform_soft_delete().await
        } else {
            self.perform_delete().await
        }
    }

    pub(crate) async fn perform(&mut self, action: BulkAction) -> Result<(), Error> {
        match action {
            BulkAction::Delete => self.delete().await,
            BulkAction::Restore => self.perform_restore().await,
            BulkAction::ForceDelete => self.perform_delete().await,
        }
    }

    fn marshal(&self) -> Result<Item, Error> {
        Ok(to_item(&self.model)?)
    }

    fn persisted_key(&self) -> Result<AttributeValue, Error> {
        match (&self.key, self.exists) {
            (Some(key), true) => Ok(key.clone()),
            _ => Err(Error::NotPersisted { model: M::name() }),
        }
    }

    async fn perform_insert(&mut self, item: Item) -> Result<(), Error> {
        let mut item = strip_nulls(item);
        let key = uuid::Uuid::new_v4().to_string().into_value();
        item.insert(M::PRIMARY_KEY.to_owned(), key.clone());
        if M::TIMESTAMPS {
            item.insert(M::CREATED_AT.to_owned(), fresh_timestamp());
        }

        self.client.put_item_raw(M::table(), item.clone()).await?;

        // putできたら保存済み
        self.key = Some(key);
        self.exists = true;
        self.original = item.clone();
        self.refresh(item)
    }

    async fn perform_update(&mut self, mut changes: Item) -> Result<(), Error> {
        let key = self.persisted_key()?;
        changes.remove(M::PRIMARY_KEY);
        if M::TIMESTAMPS {
            changes.remove(M::CREATED_AT);
        }
        if changes.is_empty() {
            return Ok(());
        }
        if M::TIMESTAMPS {
            changes.insert(M::UPDATED_AT.to_owned(), fresh_timestamp());
        }

        let updates = changes
            .iter()
            .map(|(name, value)| {
                let update = match value {
                    AttributeValue::Null(_) => delete_value(),
                    value => put_value(value),
                };
                (name.clone(), update)
            })
            .collect::<HashMap<_, _>>();
        self.client
            .update_attributes(M::table(), M::PRIMARY_KEY, key, updates)
            .await?;

        for (name, value) in changes {
            match value {
                AttributeValue::Null(_) => self.original.remove(&name),
                value => self.original.insert(name, value),
            };
        }
        self.refresh(self.original.clone())
    }

    /// 保存した項目からモデルを作り直します
    fn refresh(&mut self, item: Item) -> Result<(), Error> {
        self.model = from_item(item)?;
        self.baseline = self.marshal()?;
        Ok(())
    }

    async fn perform_delete(&mut self) -> Result<(), Error> {
        let key = self.persisted_key()?;
        self.client
            .delete_item(M::table(), M::PRIMARY_KEY, key)
            .await?;
        self.exists = false;
        Ok(())
    }

    async fn perform_soft_delete(&mut self) -> Result<(), Error> {
        let key = self.persisted_key()?;
        let deleted_at = fresh_timestamp();
        self.client
            .update_attributes(
                M::table(),
                M::PRIMARY_KEY,
                key,
                HashMap::from([(M::DELETED_AT.to_owned(), put_value(&deleted_at))]),
            )
            .await?;
        self.set_persisted(M::DELETED_AT, Some(deleted_at))
    }

    async fn perform_restore(&mut self) -> Result<(), Error> {
        let key = self.persisted_key()?;
        self.client
            .update_attributes(
                M::table(),
                M::PRIMARY_KEY,
                key,
                HashMap::from([(M::DELETED_AT.to_owned(), delete_value())]),
            )
            .await?;
        self.set_persisted(M::DELETED_AT, None)
    }

    /// 保存済みの値を1つだけ書き換えます。未保存の変更は残ります
    fn set_persisted(&mut self, name: &str, value: Option<AttributeValue>) -> Result<(), Error> {
        let mut current = self.marshal()?;
        match value {
            Some(value) => {
                current.insert(name.to_owned(), value.clone());
                self.baseline.insert(name.to_owned(), value.clone());
                self.original.insert(name.to_owned(), value);
            }
            None => {
                current.remove(name);
                self.baseline.remove(name);
                self.original.remove(name);
            }
        }
        self.model = from_item(current)?;
        Ok(())
    }
}

impl<M: Model<Deletion = SoftDeletes>> Record<M> {
    /// `deleted_at`が付いているか
    pub fn trashed(&self) -> bool {
        self.original.contains_key(M::DELETED_AT)
    }

    /// `deleted_at`を消して普通の取得に戻します
    pub async fn restore(&mut self) -> Result<(), Error> {
        self.perform_restore().await
    }

    /// 本当に削除します
    pub async fn force_delete(&mut self) -> Result<(), Error> {
        self.perform_delete().await
    }
}

impl<M: Model> Deref for Record<M> {
    type Target = M;

    fn deref(&self) -> &Self::Target {
        &self.model
    }
}

impl<M: Model> DerefMut for Record<M> {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.model
    }
}

/// `Option::None`は`NULL`ではなく項目なしとして扱います
fn strip_nulls(mut item: Item) -> Item {
    item.retain(|_, value| !matches!(value, AttributeValue::Null(_)));
    item
}

fn fresh_timestamp() -> AttributeValue {
    chrono::Utc::now()
        .format("%Y-%m-%d %H:%M:%S")
        .to_string()
        .into_value()
}

/// `NULL`と項目なしは同じものとして比べます
fn same_value(a: Option<&AttributeValue>, b: Option<&AttributeValue>) -> bool {
    fn present(v: Option<&AttributeValue>) -> Option<&AttributeValue> {
        v.filter(|v| !matches!(v, AttributeValue::Null(_)))
    }
    present(a) == present(b)
}

/// エラーに載せるためのkeyの文字列
pub(crate) fn key_string(key: &AttributeValue) -> String {
    match key {
        AttributeValue::S(s) | AttributeValue::N(s) => s.clone(),
        other => format!("{other:?}"),
    }
}
