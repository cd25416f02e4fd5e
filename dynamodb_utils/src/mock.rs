use crate::{
    client::Item,
    sdk::types::{AttributeAction, AttributeValue, AttributeValueUpdate, ComparisonOperator, Condition},
    Error,
};
use std::{
    cmp::Ordering,
    collections::HashMap,
    sync::{Arc, PoisonError, RwLock},
};

/// Mock用のメモリ上のテーブル群
#[derive(Debug, Clone, Default)]
pub(crate) struct MockTables(Arc<RwLock<HashMap<String, MockTable>>>);

#[derive(Debug)]
struct MockTable {
    key_name: String,
    // scanの順番は登録順
    items: Vec<Item>,
}

impl MockTable {
    fn position(&self, key_name: &str, key_value: &AttributeValue) -> Result<Option<usize>, Error> {
        if key_name != self.key_name {
            return Err(key_mismatch());
        }
        Ok(self
            .items
            .iter()
            .position(|item| item.get(key_name) == Some(key_value)))
    }
}

impl MockTables {
    pub(crate) fn create_table(&self, table_name: String, key_name: String) {
        let mut tables = self.0.write().unwrap_or_else(PoisonError::into_inner);
        tables.insert(
            table_name,
            MockTable {
                key_name,
                items: Vec::new(),
            },
        );
    }

    fn read<T>(
        &self,
        table_name: &str,
        f: impl FnOnce(&MockTable) -> Result<T, Error>,
    ) -> Result<T, Error> {
        let tables = self.0.read().unwrap_or_else(PoisonError::into_inner);
        let table = tables
            .get(table_name)
            .ok_or_else(|| Error::ResourceNotFound(table_name.to_owned()))?;
        f(table)
    }

    fn write<T>(
        &self,
        table_name: &str,
        f: impl FnOnce(&mut MockTable) -> Result<T, Error>,
    ) -> Result<T, Error> {
        let mut tables = self.0.write().unwrap_or_else(PoisonError::into_inner);
        let table = tables
            .get_mut(table_name)
            .ok_or_else(|| Error::ResourceNotFound(table_name.to_owned()))?;
        f(table)
    }

    pub(crate) fn get_item(
        &self,
        table_name: &str,
        key_name: &str,
        key_value: &AttributeValue,
        attributes_to_get: Option<&[String]>,
    ) -> Result<Option<Item>, Error> {
        self.read(table_name, |table| {
            Ok(table
                .position(key_name, key_value)?
                .map(|i| project(&table.items[i], attributes_to_get)))
        })
    }

    pub(crate) fn put_item(&self, table_name: &str, item: Item) -> Result<(), Error> {
        self.write(table_name, |table| {
            let Some(key_value) = item.get(&table.key_name).cloned() else {
                return Err(Error::Validation(
                    "One of the required keys was not given a value".to_owned(),
                ));
            };
            check_item_size(&item)?;
            let key_name = table.key_name.clone();
            match table.position(&key_name, &key_value)? {
                Some(i) => table.items[i] = item,
                None => table.items.push(item),
            }
            Ok(())
        })
    }

    pub(crate) fn delete_item(
        &self,
        table_name: &str,
        key_name: &str,
        key_value: &AttributeValue,
    ) -> Result<(), Error> {
        self.write(table_name, |table| {
            if let Some(i) = table.position(key_name, key_value)? {
                table.items.remove(i);
            }
            Ok(())
        })
    }

    /// itemがなければ作ります
    pub(crate) fn update_item(
        &self,
        table_name: &str,
        key_name: &str,
        key_value: AttributeValue,
        updates: &HashMap<String, AttributeValueUpdate>,
    ) -> Result<(), Error> {
        if updates.contains_key(key_name) {
            return Err(Error::Validation(format!(
                "Cannot update attribute {key_name}. This attribute is part of the key"
            )));
        }
        self.write(table_name, |table| {
            let position = table.position(key_name, &key_value)?;
            let mut item = match position {
                Some(i) => table.items[i].clone(),
                None => HashMap::from([(key_name.to_owned(), key_value)]),
            };
            for (name, update) in updates {
                apply_update(&mut item, name, update)?;
            }
            check_item_size(&item)?;
            match position {
                Some(i) => table.items[i] = item,
                None => table.items.push(item),
            }
            Ok(())
        })
    }

    pub(crate) fn scan(
        &self,
        table_name: &str,
        scan_filter: &HashMap<String, Condition>,
        attributes_to_get: Option<&[String]>,
    ) -> Result<Vec<Item>, Error> {
        self.read(table_name, |table| {
            let mut items = Vec::new();
            for item in &table.items {
                if matches_all(item, scan_filter)? {
                    items.push(project(item, attributes_to_get));
                }
            }
            Ok(items)
        })
    }
}

/// 1 itemの上限(400KB)
pub(crate) const MAX_ITEM_SIZE_BYTES: u64 = 400 * 1024;

fn check_item_size(item: &Item) -> Result<(), Error> {
    if item_size(item) > MAX_ITEM_SIZE_BYTES {
        return Err(Error::Validation(format!(
            "Item size has exceeded the maximum allowed size of {MAX_ITEM_SIZE_BYTES} bytes"
        )));
    }
    Ok(())
}

/// DynamoDbの数え方でのitemのバイト数。項目名の長さ + 値の大きさ
pub(crate) fn item_size(item: &Item) -> u64 {
    item.iter()
        .map(|(name, value)| name.len() as u64 + value_size(value))
        .sum()
}

fn value_size(value: &AttributeValue) -> u64 {
    let number = |n: &String| (n.len().div_ceil(2) + 1) as u64;
    match value {
        AttributeValue::S(s) => s.len() as u64,
        AttributeValue::N(n) => number(n),
        AttributeValue::B(b) => b.as_ref().len() as u64,
        AttributeValue::Ss(set) => set.iter().map(|s| s.len() as u64).sum(),
        AttributeValue::Ns(set) => set.iter().map(number).sum(),
        AttributeValue::Bs(set) => set.iter().map(|b| b.as_ref().len() as u64).sum(),
        AttributeValue::L(list) => 3 + list.iter().map(|v| 1 + value_size(v)).sum::<u64>(),
        AttributeValue::M(map) => {
            3 + map
                .iter()
                .map(|(k, v)| k.len() as u64 + 1 + value_size(v))
                .sum::<u64>()
        }
        _ => 1,
    }
}

fn key_mismatch() -> Error {
    Error::Validation("The provided key element does not match the schema".to_owned())
}

fn project(item: &Item, attributes_to_get: Option<&[String]>) -> Item {
    match attributes_to_get {
        Some(names) => item
            .iter()
            .filter(|(name, _)| names.contains(*name))
            .map(|(name, value)| (name.clone(), value.clone()))
            .collect(),
        None => item.clone(),
    }
}

fn apply_update(item: &mut Item, name: &str, update: &AttributeValueUpdate) -> Result<(), Error> {
    let action = update.action().unwrap_or(&AttributeAction::Put);
    match (action, update.value()) {
        (AttributeAction::Put, Some(value)) => {
            item.insert(name.to_owned(), value.clone());
        }
        (AttributeAction::Delete, None) => {
            item.remove(name);
        }
        (AttributeAction::Delete, Some(value)) => {
            let remaining = match (item.get(name), value) {
                (Some(AttributeValue::Ss(set)), AttributeValue::Ss(remove)) => {
                    AttributeValue::Ss(set.iter().filter(|v| !remove.contains(v)).cloned().collect())
                }
                (Some(AttributeValue::Ns(set)), AttributeValue::Ns(remove)) => {
                    AttributeValue::Ns(set.iter().filter(|v| !remove.contains(v)).cloned().collect())
                }
                (None, _) => return Ok(()),
                _ => return Err(type_mismatch("DELETE")),
            };
            item.insert(name.to_owned(), remaining);
        }
        (AttributeAction::Add, Some(value)) => {
            let added = match (item.get(name), value) {
                (None, value) => value.clone(),
                (Some(AttributeValue::N(current)), AttributeValue::N(delta)) => {
                    AttributeValue::N(format_number(parse_number(current)? + parse_number(delta)?))
                }
                (Some(AttributeValue::Ss(set)), AttributeValue::Ss(add)) => {
                    AttributeValue::Ss(union(set, add))
                }
                (Some(AttributeValue::Ns(set)), AttributeValue::Ns(add)) => {
                    AttributeValue::Ns(union(set, add))
                }
                _ => return Err(type_mismatch("ADD")),
            };
            item.insert(name.to_owned(), added);
        }
        _ => {
            return Err(Error::Validation(format!(
                "Invalid attribute update for attribute {name}"
            )))
        }
    }
    Ok(())
}

fn union(set: &[String], add: &[String]) -> Vec<String> {
    let mut merged = set.to_vec();
    merged.extend(add.iter().filter(|v| !set.contains(v)).cloned());
    merged
}

fn type_mismatch(action: &str) -> Error {
    Error::Validation(format!(
        "Type mismatch for attribute to update in {action} action"
    ))
}

fn matches_all(item: &Item, scan_filter: &HashMap<String, Condition>) -> Result<bool, Error> {
    for (name, condition) in scan_filter {
        if !matches(item.get(name), condition)? {
            return Ok(false);
        }
    }
    Ok(true)
}

/// 旧形式の`ComparisonOperator`を評価します
fn matches(attribute: Option<&AttributeValue>, condition: &Condition) -> Result<bool, Error> {
    let values = condition.attribute_value_list();
    let operator = condition.comparison_operator();
    let arity = |expected: usize| {
        if values.len() == expected {
            Ok(())
        } else {
            Err(Error::Validation(format!(
                "One or more parameter values were invalid: Invalid number of argument(s) for the {} ComparisonOperator",
                operator.as_str()
            )))
        }
    };
    Ok(match operator {
        ComparisonOperator::Null => attribute.is_none(),
        ComparisonOperator::NotNull => attribute.is_some(),
        ComparisonOperator::In => {
            if values.is_empty() {
                arity(1)?;
            }
            attribute.is_some_and(|a| values.contains(a))
        }
        ComparisonOperator::Between => {
            arity(2)?;
            is_ordered(compare(attribute, &values[0])?, true)
                && is_ordered(compare(attribute, &values[1])?, false)
        }
        single => {
            arity(1)?;
            let value = &values[0];
            match single {
                ComparisonOperator::Eq => attribute == Some(value),
                ComparisonOperator::Ne => attribute != Some(value),
                ComparisonOperator::Lt => compare(attribute, value)? == Some(Ordering::Less),
                ComparisonOperator::Le => is_ordered(compare(attribute, value)?, false),
                ComparisonOperator::Gt => compare(attribute, value)? == Some(Ordering::Greater),
                ComparisonOperator::Ge => is_ordered(compare(attribute, value)?, true),
                ComparisonOperator::Contains => contains(attribute, value),
                ComparisonOperator::NotContains => !contains(attribute, value),
                ComparisonOperator::BeginsWith => match (attribute, value) {
                    (Some(AttributeValue::S(s)), AttributeValue::S(prefix)) => {
                        s.starts_with(prefix.as_str())
                    }
                    (Some(AttributeValue::B(b)), AttributeValue::B(prefix)) => {
                        b.as_ref().starts_with(prefix.as_ref())
                    }
                    _ => false,
                },
                other => {
                    return Err(Error::Validation(format!(
                        "Unsupported ComparisonOperator: {}",
                        other.as_str()
                    )))
                }
            }
        }
    })
}

/// `at_least`なら`>=`、そうでなければ`<=`
fn is_ordered(ordering: Option<Ordering>, at_least: bool) -> bool {
    match ordering {
        Some(Ordering::Equal) => true,
        Some(Ordering::Greater) => at_least,
        Some(Ordering::Less) => !at_least,
        None => false,
    }
}

/// 型が違うか順序のない型なら`None`
fn compare(
    attribute: Option<&AttributeValue>,
    value: &AttributeValue,
) -> Result<Option<Ordering>, Error> {
    Ok(match (attribute, value) {
        (Some(AttributeValue::S(a)), AttributeValue::S(b)) => Some(a.cmp(b)),
        (Some(AttributeValue::N(a)), AttributeValue::N(b)) => {
            parse_number(a)?.partial_cmp(&parse_number(b)?)
        }
        (Some(AttributeValue::B(a)), AttributeValue::B(b)) => Some(a.as_ref().cmp(b.as_ref())),
        _ => None,
    })
}

fn contains(attribute: Option<&AttributeValue>, value: &AttributeValue) -> bool {
    match (attribute, value) {
        (Some(AttributeValue::S(s)), AttributeValue::S(sub)) => s.contains(sub.as_str()),
        (Some(AttributeValue::Ss(set)), AttributeValue::S(v))
        | (Some(AttributeValue::Ns(set)), AttributeValue::N(v)) => set.contains(v),
        (Some(AttributeValue::Bs(set)), AttributeValue::B(v)) => set.contains(v),
        (Some(AttributeValue::L(list)), v) => list.contains(v),
        _ => false,
    }
}

fn parse_number(s: &str) -> Result<f64, Error> {
    s.parse::<f64>()
        .map_err(|_| Error::Validation(format!("'{s}' is not a valid number")))
}

fn format_number(v: f64) -> String {
    if v.fract() == 0.0 && v.abs() < 1e15 {
        format!("{}", v as i64)
    } else {
        v.to_string()
    }
}
