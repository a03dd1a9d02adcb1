use super::conf::StorageConf;
use super::query::{ParsedQuery, scalar_text};
use super::record::RecordStorage;
use crate::core::{FormError, Result};
use crate::record::{FieldKind, FieldPlan, IdKind, TypeDescriptor};
use crate::schema::ValidationOutcome;
use serde_json::Value;
use std::collections::{BTreeMap, HashMap};
use tracing::{debug, info};

/// Records of one record type, ordered by id
struct RecordTable {
    descriptor: TypeDescriptor,
    id_field: String,
    id_kind: IdKind,
    records: BTreeMap<i128, Value>,
}

impl RecordTable {
    fn new(descriptor: &TypeDescriptor) -> Result<Option<Self>> {
        let plan = FieldPlan::resolve(descriptor)?;
        let Some(id) = plan.id_field() else {
            return Ok(None);
        };
        let FieldKind::Id(id_kind) = id.kind else {
            return Ok(None);
        };
        Ok(Some(Self {
            descriptor: descriptor.clone(),
            id_field: id.name.clone(),
            id_kind,
            records: BTreeMap::new(),
        }))
    }

    fn type_id(&self) -> &str {
        &self.descriptor.type_id
    }

    /// Id of `record`; `None` when the id is absent or null
    fn key_of(&self, record: &Value) -> Result<Option<i128>> {
        let object = record.as_object().ok_or_else(|| {
            FormError::storage(
                format!("store record of '{}'", self.type_id()),
                "record must be a JSON object",
            )
        })?;

        let key = match object.get(&self.id_field) {
            None | Some(Value::Null) => return Ok(None),
            Some(Value::Number(n)) => n
                .as_i64()
                .map(i128::from)
                .or_else(|| n.as_u64().map(i128::from)),
            Some(_) => None,
        };

        match key {
            Some(key) if self.id_value(key).is_some() => Ok(Some(key)),
            _ => Err(self.invalid_id(record)),
        }
    }

    /// `key` as a JSON number of the id field's own integer type
    fn id_value(&self, key: i128) -> Option<Value> {
        match self.id_kind {
            IdKind::Signed => i64::try_from(key).ok().map(Value::from),
            IdKind::Unsigned => u64::try_from(key).ok().map(Value::from),
        }
    }

    fn invalid_id(&self, record: &Value) -> FormError {
        FormError::storage(
            format!("store record of '{}'", self.type_id()),
            format!(
                "id field '{}' holds an invalid value: {}",
                self.id_field,
                record.get(&self.id_field).unwrap_or(&Value::Null)
            ),
        )
    }

    fn next_key(&self) -> i128 {
        self.records
            .last_key_value()
            .map(|(key, _)| key + 1)
            .unwrap_or(1)
            .max(1)
    }

    /// Fills in a generated id when `record` has none.
    fn assign_key(&self, mut record: Value) -> Result<(i128, Value)> {
        if let Some(key) = self.key_of(&record)? {
            return Ok((key, record));
        }
        let key = self.next_key();
        let id = self.id_value(key).ok_or_else(|| {
            FormError::storage(format!("generate id for '{}'", self.type_id()), "id space exhausted")
        })?;
        if let Some(object) = record.as_object_mut() {
            object.insert(self.id_field.clone(), id);
        }
        Ok((key, record))
    }

    fn require_field(&self, field: &str) -> Result<()> {
        match self.descriptor.member(field) {
            Some(member) if member.is_field() => Ok(()),
            _ => Err(FormError::Query(format!(
                "'{}' has no field '{}'",
                self.descriptor.simple_name, field
            ))),
        }
    }
}

/// In-memory record storage
///
/// Manages every record type of its [`StorageConf`] that declares an id
/// field. The schema snapshot is validated when the storage is opened.
pub struct MemoryRecordStorage {
    conf: StorageConf,
    tables: HashMap<String, RecordTable>,
    validation: ValidationOutcome,
    open: bool,
}

impl MemoryRecordStorage {
    pub fn open(conf: StorageConf) -> Result<Self> {
        let validation = conf.validate()?;

        let mut tables = HashMap::new();
        for descriptor in conf.record_types.iter() {
            if let Some(table) = RecordTable::new(descriptor)? {
                tables.insert(descriptor.type_id.clone(), table);
            }
        }

        info!(
            url = %conf.connection_url(),
            record_types = tables.len(),
            ?validation,
            "opened record storage"
        );
        Ok(Self {
            conf,
            tables,
            validation,
            open: true,
        })
    }

    /// Result of the schema check performed by [`Self::open`]
    pub fn validation(&self) -> ValidationOutcome {
        self.validation
    }

    pub fn len(&self, type_id: &str) -> usize {
        self.tables.get(type_id).map_or(0, |table| table.records.len())
    }

    fn ensure_open(&self) -> Result<()> {
        if self.open {
            Ok(())
        } else {
            Err(FormError::Config("record storage has been shut down".to_string()))
        }
    }

    fn table(&self, type_id: &str) -> Result<&RecordTable> {
        self.ensure_open()?;
        self.tables.get(type_id).ok_or_else(|| unsupported(type_id))
    }

    fn table_mut(&mut self, type_id: &str) -> Result<&mut RecordTable> {
        self.ensure_open()?;
        self.tables.get_mut(type_id).ok_or_else(|| unsupported(type_id))
    }
}

fn unsupported(type_id: &str) -> FormError {
    FormError::Config(format!("record type '{type_id}' is not managed by this storage"))
}

impl RecordStorage for MemoryRecordStorage {
    fn store(&mut self, type_id: &str, record: Value) -> Result<Value> {
        let table = self.table_mut(type_id)?;
        let (key, record) = table.assign_key(record)?;
        if table.records.contains_key(&key) {
            return Err(FormError::storage(
                format!("store record of '{type_id}'"),
                format!("a record with id {key} already exists"),
            ));
        }
        table.records.insert(key, record.clone());
        debug!(type_id, id = %key, "stored record");
        Ok(record)
    }

    fn update(&mut self, type_id: &str, record: Value) -> Result<Value> {
        let table = self.table_mut(type_id)?;
        let (key, record) = table.assign_key(record)?;
        table.records.insert(key, record.clone());
        debug!(type_id, id = %key, "merged record");
        Ok(record)
    }

    fn delete(&mut self, type_id: &str, record: &Value) -> Result<()> {
        let table = self.table_mut(type_id)?;
        let key = table.key_of(record)?.ok_or_else(|| {
            FormError::NotFound(format!("{type_id} without id"))
        })?;
        if table.records.remove(&key).is_none() {
            return Err(FormError::NotFound(format!("{type_id}#{key}")));
        }
        debug!(type_id, id = %key, "deleted record");
        Ok(())
    }

    fn retrieve(&self, type_id: &str, id: &Value) -> Result<Option<Value>> {
        let table = self.table(type_id)?;
        let probe = Value::Object([(table.id_field.clone(), id.clone())].into_iter().collect());
        Ok(match table.key_of(&probe)? {
            Some(key) => table.records.get(&key).cloned(),
            None => None,
        })
    }

    fn run_query(&self, query_text: &str, limit: usize) -> Result<Vec<Value>> {
        self.ensure_open()?;
        let query = ParsedQuery::parse(query_text)?;
        let table = self
            .tables
            .values()
            .find(|table| table.descriptor.simple_name == query.type_name)
            .ok_or_else(|| FormError::Query(format!("unknown record type '{}'", query.type_name)))?;

        if let Some(filter) = &query.filter {
            table.require_field(&filter.field)?;
        }

        let results: Vec<Value> = table
            .records
            .values()
            .filter(|record| query.filter.as_ref().is_none_or(|filter| filter.matches(record)))
            .take(limit)
            .cloned()
            .collect();
        debug!(query = query_text, limit, results = results.len(), "ran query");
        Ok(results)
    }

    fn run_query_by_attribute(&self, type_id: &str, attribute: &str, value: &str) -> Result<Vec<Value>> {
        let table = self.table(type_id)?;
        table.require_field(attribute)?;
        Ok(table
            .records
            .values()
            .filter(|record| {
                record
                    .get(attribute)
                    .and_then(scalar_text)
                    .is_some_and(|text| text == value)
            })
            .cloned()
            .collect())
    }

    fn run_query_all(&self, type_id: &str) -> Result<Vec<Value>> {
        Ok(self.table(type_id)?.records.values().cloned().collect())
    }

    fn is_record_supported(&self, type_id: &str) -> bool {
        self.tables.contains_key(type_id)
    }

    fn storage_conf(&self) -> &StorageConf {
        &self.conf
    }

    fn shutdown(&mut self) {
        if self.open {
            self.open = false;
            info!(url = %self.conf.connection_url(), "record storage shut down");
        }
    }
}
