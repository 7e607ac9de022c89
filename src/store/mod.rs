//! Path-addressed config store with value masking and change tracking
//!
//! [`ConfigStore`] is the in-memory document behind every persisted file:
//! auth info, aliases, org metadata and project settings. Values are
//! addressed with [path expressions](crate::path), masked leaves are
//! encrypted through an injected [`Crypto`], and every mutation is recorded
//! in a [`ChangeSet`] that the persistence layer consults.
//!
//! # Reference semantics
//!
//! [`ConfigStore::get`] returns a live reference to the at-rest value
//! (masked leaves are ciphertext) and [`ConfigStore::get_mut`] allows
//! nested edits in place. [`ConfigStore::get_decrypted`] always returns an
//! owned deep copy, so decrypted secrets can never be written back into the
//! store by accident.

mod masking;
mod tracking;

pub use masking::{DEFAULT_ENCRYPTED_KEYS, EncryptedKey, KeyMatcher, MaskingPolicy};
pub use tracking::ChangeSet;

use crate::crypto::Crypto;
use crate::error::{Error, Result};
use crate::path::{self, IntoPath, Path, Segment};
use log::debug;
use serde::de::DeserializeOwned;
use serde_json::{Map, Value};
use std::future::Future;
use std::marker::PhantomData;
use std::sync::Arc;
use tracking::ChangeTracker;

/// The whole document held by a store, in insertion order
pub type ConfigContents = Map<String, Value>;

/// Static description of a store subtype
///
/// # Example
///
/// ```
/// use crmkit::{ConfigSchema, ConfigStore, Crypto, EncryptedKey};
/// use std::sync::Arc;
///
/// struct ConnectedApp;
///
/// impl ConfigSchema for ConnectedApp {
///     const ENCRYPTED_KEYS: &'static [EncryptedKey] = &[
///         EncryptedKey::Exact("consumerKey"),
///         EncryptedKey::Pattern("token"),
///     ];
/// }
///
/// let crypto = Arc::new(Crypto::in_memory());
/// crypto.init()?;
///
/// let mut store = ConfigStore::<ConnectedApp>::with_crypto(crypto)?;
/// store.set("app.consumerKey", "3MVG9...")?;
/// assert_ne!(store.get("app.consumerKey").unwrap(), "3MVG9...");
/// assert_eq!(store.get_decrypted("app.consumerKey")?.unwrap(), "3MVG9...");
/// # Ok::<(), crmkit::Error>(())
/// ```
pub trait ConfigSchema {
    /// Keys whose string values are encrypted at rest, on top of
    /// [`DEFAULT_ENCRYPTED_KEYS`]
    const ENCRYPTED_KEYS: &'static [EncryptedKey] = &[];
}

/// Schema-less store: only the default keys are masked
impl ConfigSchema for () {}

/// Key-value document with encrypted fields and dirty tracking
pub struct ConfigStore<Schema: ConfigSchema = ()> {
    contents: ConfigContents,
    policy: MaskingPolicy,
    tracker: ChangeTracker,
    crypto: Option<Arc<Crypto>>,
    _schema: PhantomData<fn() -> Schema>,
}

impl<Schema: ConfigSchema> ConfigStore<Schema> {
    /// Create an empty store
    ///
    /// Without a crypto provider, writing a masked key fails with
    /// `Error::CryptoNotInitialized`.
    ///
    /// # Errors
    ///
    /// Returns `Error::InvalidPattern` if the schema declares a bad pattern.
    pub fn new(crypto: Option<Arc<Crypto>>) -> Result<Self> {
        Ok(Self {
            contents: ConfigContents::new(),
            policy: MaskingPolicy::new(Schema::ENCRYPTED_KEYS)?,
            tracker: ChangeTracker::default(),
            crypto,
            _schema: PhantomData,
        })
    }

    /// Create an empty store that encrypts through `crypto`
    ///
    /// # Errors
    ///
    /// Returns `Error::InvalidPattern` if the schema declares a bad pattern.
    pub fn with_crypto(crypto: Arc<Crypto>) -> Result<Self> {
        Self::new(Some(crypto))
    }

    /// Create a store over already-persisted (at-rest) contents, untracked
    ///
    /// # Errors
    ///
    /// Returns `Error::InvalidPattern` if the schema declares a bad pattern.
    pub fn with_contents(contents: ConfigContents, crypto: Option<Arc<Crypto>>) -> Result<Self> {
        let mut store = Self::new(crypto)?;
        store.contents = contents;
        Ok(store)
    }

    pub fn policy(&self) -> &MaskingPolicy {
        &self.policy
    }

    pub fn crypto(&self) -> Option<&Arc<Crypto>> {
        self.crypto.as_ref()
    }

    /// Whether a crypto provider is attached (it may not be ready yet)
    pub fn has_encryption(&self) -> bool {
        self.crypto.is_some()
    }

    // =========================================================================
    // Reads
    // =========================================================================

    /// Live reference to the at-rest value at `path`
    ///
    /// Masked leaves come back as ciphertext. Missing segments and
    /// unparseable expressions yield `None`.
    pub fn get(&self, path: impl IntoPath) -> Option<&Value> {
        let path = path.into_path().ok()?;
        path::lookup(&self.contents, &path)
    }

    /// Mutable live reference for in-place nested edits
    ///
    /// Edits made through it bypass masking and change tracking.
    pub fn get_mut(&mut self, path: impl IntoPath) -> Option<&mut Value> {
        let path = path.into_path().ok()?;
        path::lookup_mut(&mut self.contents, &path)
    }

    pub fn has(&self, path: impl IntoPath) -> bool {
        self.get(path).is_some()
    }

    /// Owned copy of the value at `path` with masked leaves decrypted
    ///
    /// Objects and arrays are deep-cloned and every masked string leaf
    /// inside them is decrypted, judged by its own key.
    ///
    /// # Errors
    ///
    /// Returns `Error::InvalidPath` for a malformed expression,
    /// `Error::CryptoNotInitialized` if a masked value is found but no
    /// ready crypto provider is attached, and `Error::Decryption` if a
    /// masked value does not decrypt.
    pub fn get_decrypted(&self, path: impl IntoPath) -> Result<Option<Value>> {
        let path = path.into_path()?;
        let Some(value) = path::lookup(&self.contents, &path) else {
            return Ok(None);
        };

        let revealed = match value {
            Value::String(ciphertext) if self.policy.should_mask(&path) => {
                Value::String(self.decrypt_str(&path.to_string(), ciphertext)?)
            }
            Value::Object(_) | Value::Array(_) => {
                self.map_masked(value.clone(), &|key, ciphertext| {
                    self.decrypt_str(key, ciphertext)
                })?
            }
            other => other.clone(),
        };
        Ok(Some(revealed))
    }

    /// Decrypted value at `path` deserialized into `T`
    ///
    /// # Errors
    ///
    /// Same as [`get_decrypted`](Self::get_decrypted), plus `Error::Parse`
    /// if the value does not deserialize into `T`.
    pub fn get_as<T: DeserializeOwned>(&self, path: impl IntoPath) -> Result<Option<T>> {
        self.get_decrypted(path)?
            .map(|value| serde_json::from_value(value).map_err(|e| Error::Parse(e.to_string())))
            .transpose()
    }

    pub fn keys(&self) -> impl Iterator<Item = &String> {
        self.contents.keys()
    }

    pub fn values(&self) -> impl Iterator<Item = &Value> {
        self.contents.values()
    }

    pub fn entries(&self) -> impl Iterator<Item = (&String, &Value)> {
        self.contents.iter()
    }

    pub fn len(&self) -> usize {
        self.contents.len()
    }

    pub fn is_empty(&self) -> bool {
        self.contents.is_empty()
    }

    /// Visit top-level entries in insertion order
    pub fn for_each<F>(&self, mut f: F)
    where
        F: FnMut(&str, &Value),
    {
        for (key, value) in &self.contents {
            f(key, value);
        }
    }

    /// Visit top-level entries in insertion order, awaiting each callback
    /// before starting the next
    ///
    /// Callbacks receive owned copies taken before the traversal starts.
    ///
    /// # Errors
    ///
    /// Stops at and returns the first callback error.
    pub async fn await_each<F, Fut>(&self, mut f: F) -> Result<()>
    where
        F: FnMut(String, Value) -> Fut,
        Fut: Future<Output = Result<()>>,
    {
        let snapshot: Vec<(String, Value)> = self
            .contents
            .iter()
            .map(|(key, value)| (key.clone(), value.clone()))
            .collect();

        for (key, value) in snapshot {
            f(key, value).await?;
        }
        Ok(())
    }

    /// Live reference to the whole at-rest document
    pub fn contents(&self) -> &ConfigContents {
        &self.contents
    }

    /// Deep copy of the document with every masked leaf decrypted
    ///
    /// # Errors
    ///
    /// Same as [`get_decrypted`](Self::get_decrypted).
    pub fn contents_decrypted(&self) -> Result<ConfigContents> {
        self.map_masked_object(self.contents.clone(), &|key, ciphertext| {
            self.decrypt_str(key, ciphertext)
        })
    }

    // =========================================================================
    // Writes
    // =========================================================================

    /// Store `value` at `path`, creating intermediate containers
    ///
    /// A string at a masked path is encrypted. An object value has each of
    /// its masked string leaves encrypted, at any depth. The value is fully
    /// prepared before the document is touched, so on error the store is
    /// unchanged.
    ///
    /// # Errors
    ///
    /// - `Error::InvalidPath` for a malformed expression, or an index more
    ///   than [`MAX_ARRAY_PADDING`](path::MAX_ARRAY_PADDING) past the end of
    ///   an array
    /// - `Error::InvalidCryptoValue` for a non-string, non-object value at a
    ///   masked path
    /// - `Error::CryptoNotInitialized` if encryption is needed but no ready
    ///   crypto provider is attached
    pub fn set(&mut self, path: impl IntoPath, value: impl Into<Value>) -> Result<()> {
        let path = path.into_path()?;
        let value = self.conceal(&path, value.into())?;

        *path::slot_mut(&mut self.contents, &path)? = value;
        self.tracker.record_set(&path);
        debug!("Set config value: {path}");
        Ok(())
    }

    /// Shallow-merge `partial` into the object at `path`
    ///
    /// Existing fields that `partial` does not name are kept. A missing or
    /// non-object value at `path` is replaced by a new object. Only the
    /// fields of `partial` are encrypted; existing fields stay as stored.
    ///
    /// # Errors
    ///
    /// Same as [`set`](Self::set), for each field of `partial`.
    pub fn update(&mut self, path: impl IntoPath, partial: ConfigContents) -> Result<()> {
        let path = path.into_path()?;

        let mut fields = Vec::with_capacity(partial.len());
        for (key, value) in partial {
            let field_path = path.child(Segment::Key(key.clone()));
            fields.push((key, self.conceal(&field_path, value)?));
        }

        let slot = path::slot_mut(&mut self.contents, &path)?;
        if !slot.is_object() {
            *slot = Value::Object(Map::new());
        }
        if let Value::Object(existing) = slot {
            existing.extend(fields);
        }

        self.tracker.record_set(&path);
        debug!("Updated config value: {path}");
        Ok(())
    }

    /// Remove the value at `path`
    ///
    /// Returns whether anything was removed. The removal is tracked either
    /// way, so a later write drops the key from disk too.
    ///
    /// # Errors
    ///
    /// Returns `Error::InvalidPath` for a malformed expression.
    pub fn unset(&mut self, path: impl IntoPath) -> Result<bool> {
        let path = path.into_path()?;
        let removed = path::remove(&mut self.contents, &path).is_some();
        self.tracker.record_unset(&path);
        Ok(removed)
    }

    /// Remove several paths
    ///
    /// # Errors
    ///
    /// Returns the first `Error::InvalidPath`; earlier paths stay removed.
    pub fn unset_all<I, P>(&mut self, paths: I) -> Result<()>
    where
        I: IntoIterator<Item = P>,
        P: IntoPath,
    {
        for path in paths {
            self.unset(path)?;
        }
        Ok(())
    }

    /// Remove every top-level entry
    pub fn clear(&mut self) {
        let keys: Vec<String> = self.contents.keys().cloned().collect();
        for key in keys {
            self.contents.shift_remove(&key);
            self.tracker.record_unset(&Path::top_level(&key));
        }
    }

    /// Replace the whole document with at-rest `contents`
    ///
    /// Values are taken verbatim (already-encrypted fields are not
    /// encrypted again). Every new key becomes updated and every previous
    /// key that is now absent becomes deleted.
    pub fn set_contents(&mut self, contents: ConfigContents) {
        let old_keys: Vec<String> = self.contents.keys().cloned().collect();
        let new_keys: Vec<String> = contents.keys().cloned().collect();
        self.contents = contents;
        self.tracker.reset(&old_keys, &new_keys);
    }

    // =========================================================================
    // Change tracking
    // =========================================================================

    /// Changes since tracking was last cleared
    pub fn changes(&self) -> &ChangeSet {
        self.tracker.changes()
    }

    pub fn has_changes(&self) -> bool {
        !self.tracker.changes().is_empty()
    }

    /// Forget recorded changes; contents are untouched
    pub fn clear_tracking(&mut self) {
        self.tracker.clear();
    }

    // =========================================================================
    // Masking
    // =========================================================================

    /// Prepare `value` for storage at `path`
    fn conceal(&self, path: &Path, value: Value) -> Result<Value> {
        let masked = self.policy.should_mask(path);
        match value {
            Value::Object(_) => self.map_masked(value, &|key, plaintext| {
                self.encrypt_str(key, plaintext)
            }),
            Value::String(plaintext) if masked => {
                Ok(Value::String(self.encrypt_str(&path.to_string(), &plaintext)?))
            }
            other if masked => Err(Error::InvalidCryptoValue {
                path: path.to_string(),
                found: json_type(&other).to_string(),
            }),
            Value::Array(_) => self.map_masked(value, &|key, plaintext| {
                self.encrypt_str(key, plaintext)
            }),
            other => Ok(other),
        }
    }

    /// Apply `f` to every masked string leaf in `value`, keyed by the
    /// leaf's own key (or array index)
    fn map_masked<F>(&self, value: Value, f: &F) -> Result<Value>
    where
        F: Fn(&str, &str) -> Result<String>,
    {
        match value {
            Value::Object(map) => self.map_masked_object(map, f).map(Value::Object),
            Value::Array(items) => items
                .into_iter()
                .enumerate()
                .map(|(index, item)| self.map_masked_entry(&index.to_string(), item, f))
                .collect::<Result<Vec<_>>>()
                .map(Value::Array),
            other => Ok(other),
        }
    }

    fn map_masked_object<F>(&self, map: ConfigContents, f: &F) -> Result<ConfigContents>
    where
        F: Fn(&str, &str) -> Result<String>,
    {
        map.into_iter()
            .map(|(key, child)| {
                let child = self.map_masked_entry(&key, child, f)?;
                Ok((key, child))
            })
            .collect()
    }

    fn map_masked_entry<F>(&self, key: &str, value: Value, f: &F) -> Result<Value>
    where
        F: Fn(&str, &str) -> Result<String>,
    {
        match value {
            Value::String(text) if self.policy.matches_key(key) => Ok(Value::String(f(key, &text)?)),
            other => self.map_masked(other, f),
        }
    }

    fn ready_crypto(&self, label: &str) -> Result<&Crypto> {
        match &self.crypto {
            Some(crypto) if crypto.is_ready() => Ok(crypto),
            _ => Err(Error::CryptoNotInitialized(label.to_string())),
        }
    }

    fn encrypt_str(&self, label: &str, plaintext: &str) -> Result<String> {
        self.ready_crypto(label)?.encrypt(plaintext)
    }

    fn decrypt_str(&self, label: &str, ciphertext: &str) -> Result<String> {
        self.ready_crypto(label)?.decrypt(ciphertext)
    }
}

fn json_type(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::collections::BTreeSet;

    struct CardSchema;

    impl ConfigSchema for CardSchema {
        const ENCRYPTED_KEYS: &'static [EncryptedKey] = &[
            EncryptedKey::Exact("creditCardNumber"),
            EncryptedKey::Exact("credit"),
            EncryptedKey::Pattern("password"),
        ];
    }

    fn ready_crypto() -> Arc<Crypto> {
        let crypto = Arc::new(Crypto::in_memory());
        crypto.init().unwrap();
        crypto
    }

    fn card_store() -> ConfigStore<CardSchema> {
        ConfigStore::with_crypto(ready_crypto()).unwrap()
    }

    fn keys(items: &[&str]) -> BTreeSet<String> {
        items.iter().map(|s| (*s).to_string()).collect()
    }

    #[test]
    fn test_set_and_get_plain_values() {
        let mut store = ConfigStore::<()>::new(None).unwrap();
        store.set("1", "a").unwrap();
        store.set("owner.name", "Ada").unwrap();
        store.set("owner.age", 36).unwrap();

        assert_eq!(store.get("1"), Some(&json!("a")));
        assert_eq!(store.get("owner.name"), Some(&json!("Ada")));
        assert_eq!(store.get("owner"), Some(&json!({"name": "Ada", "age": 36})));
        assert_eq!(store.get("owner.missing.deep"), None);
        assert_eq!(store.get("owner['unterminated"), None);
    }

    #[test]
    fn test_masked_round_trip() {
        let mut store = card_store();
        store.set("owner.creditCardNumber", "4111111111111111").unwrap();

        let at_rest = store.get("owner.creditCardNumber").unwrap();
        assert_ne!(at_rest, "4111111111111111");
        assert!(Crypto::is_encrypted(at_rest.as_str().unwrap()));
        assert_eq!(
            store.get_decrypted("owner.creditCardNumber").unwrap(),
            Some(json!("4111111111111111"))
        );
    }

    #[test]
    fn test_bracket_quotes_address_same_slot() {
        let mut store = card_store();
        store.set("owner['credit']", "1234").unwrap();
        let single = store.get_decrypted("owner['credit']").unwrap();
        let double = store.get_decrypted("owner[\"credit\"]").unwrap();
        assert_eq!(single, Some(json!("1234")));
        assert_eq!(single, double);

        store.set("owner[\"credit\"]", "5678").unwrap();
        assert_eq!(store.get_decrypted("owner.credit").unwrap(), Some(json!("5678")));
        assert_eq!(store.get("owner").unwrap().as_object().unwrap().len(), 1);
    }

    #[test]
    fn test_far_index_is_rejected_without_partial_write() {
        let mut store = ConfigStore::<()>::new(None).unwrap();
        let err = store.set("a.18446744073709551615", 1).unwrap_err();
        assert!(matches!(err, Error::InvalidPath { .. }));
        let err = store.update("list[5000]", Map::new()).unwrap_err();
        assert!(matches!(err, Error::InvalidPath { .. }));
        assert!(store.is_empty());
        assert!(!store.has_changes());

        store.set("list[2]", "c").unwrap();
        assert_eq!(store.get("list"), Some(&json!([null, null, "c"])));
    }

    #[test]
    fn test_with_contents_is_untracked_and_stays_at_rest() {
        let crypto = ready_crypto();
        let mut source = ConfigStore::<CardSchema>::with_crypto(crypto.clone()).unwrap();
        source.set("owner.creditCardNumber", "4111").unwrap();

        let store =
            ConfigStore::<CardSchema>::with_contents(source.contents().clone(), Some(crypto))
                .unwrap();
        assert!(!store.has_changes());
        assert_eq!(store.contents(), source.contents());
        assert_eq!(
            store.get_decrypted("owner.creditCardNumber").unwrap(),
            Some(json!("4111"))
        );
    }

    #[test]
    fn test_set_object_masks_nested_leaves() {
        let mut store = card_store();
        store
            .set(
                "owner",
                json!({
                    "name": "Ada",
                    "creditCardNumber": "4111",
                    "accounts": [{"password": "hunter2", "pin": 1234}],
                    "profile": {"superPassword": "p@ss", "passwordLength": 12}
                }),
            )
            .unwrap();

        assert_eq!(store.get("owner.name"), Some(&json!("Ada")));
        assert_ne!(store.get("owner.creditCardNumber"), Some(&json!("4111")));
        assert_ne!(store.get("owner.accounts.0.password"), Some(&json!("hunter2")));
        assert_ne!(store.get("owner.profile.superPassword"), Some(&json!("p@ss")));
        // Masked key holding a number is left alone inside objects
        assert_eq!(store.get("owner.profile.passwordLength"), Some(&json!(12)));

        let decrypted = store.get_decrypted("owner").unwrap().unwrap();
        assert_eq!(
            decrypted,
            json!({
                "name": "Ada",
                "creditCardNumber": "4111",
                "accounts": [{"password": "hunter2", "pin": 1234}],
                "profile": {"superPassword": "p@ss", "passwordLength": 12}
            })
        );
    }

    #[test]
    fn test_decrypted_object_is_a_copy() {
        let mut store = card_store();
        store.set("owner", json!({"creditCardNumber": "4111"})).unwrap();
        let before = store.get("owner.creditCardNumber").cloned();

        let mut copy = store.get_decrypted("owner").unwrap().unwrap();
        copy["creditCardNumber"] = json!("tampered");

        assert_eq!(store.get("owner.creditCardNumber").cloned(), before);
        assert_eq!(
            store.get_decrypted("owner.creditCardNumber").unwrap(),
            Some(json!("4111"))
        );
    }

    #[test]
    fn test_get_mut_is_live() {
        let mut store = ConfigStore::<()>::new(None).unwrap();
        store.set("owner", json!({"name": "Ada"})).unwrap();

        if let Some(Value::Object(owner)) = store.get_mut("owner") {
            owner.insert("email".into(), json!("ada@example.com"));
        }
        assert_eq!(store.get("owner.email"), Some(&json!("ada@example.com")));
    }

    #[test]
    fn test_masked_non_string_is_rejected_without_partial_write() {
        let mut store = card_store();
        store.set("owner.name", "Ada").unwrap();
        store.clear_tracking();

        for value in [json!(4111), json!(true), json!(null), json!(["a"])] {
            let err = store.set("owner.creditCardNumber", value).unwrap_err();
            assert!(matches!(err, Error::InvalidCryptoValue { .. }));
        }
        assert_eq!(store.get("owner"), Some(&json!({"name": "Ada"})));
        assert!(!store.has_changes());
    }

    #[test]
    fn test_masked_write_without_crypto() {
        let mut store = ConfigStore::<CardSchema>::new(None).unwrap();
        let err = store.set("owner.creditCardNumber", "4111").unwrap_err();
        assert!(matches!(err, Error::CryptoNotInitialized(_)));
        assert!(store.is_empty());

        let uninitialized = Arc::new(Crypto::in_memory());
        let mut store = ConfigStore::<CardSchema>::with_crypto(uninitialized).unwrap();
        assert!(store.has_encryption());
        let err = store.set("credit", "4111").unwrap_err();
        assert!(matches!(err, Error::CryptoNotInitialized(_)));

        // Unmasked writes never need crypto
        store.set("owner.name", "Ada").unwrap();
    }

    #[test]
    fn test_default_keys_apply_to_plain_store() {
        let mut store = ConfigStore::<()>::with_crypto(ready_crypto()).unwrap();
        store.set("clientSecret", "s3cr3t").unwrap();
        assert_ne!(store.get("clientSecret"), Some(&json!("s3cr3t")));
        assert_eq!(store.get_decrypted("clientSecret").unwrap(), Some(json!("s3cr3t")));
    }

    #[test]
    fn test_update_merges_and_keeps_ciphertext() {
        let mut store = card_store();
        store
            .set("owner", json!({"name": "Ada", "creditCardNumber": "4111"}))
            .unwrap();
        let stored_card = store.get("owner.creditCardNumber").cloned();

        let partial = json!({"email": "ada@example.com", "password": "hunter2"});
        store
            .update("owner", partial.as_object().unwrap().clone())
            .unwrap();

        // Untouched masked field is not encrypted a second time
        assert_eq!(store.get("owner.creditCardNumber").cloned(), stored_card);
        assert_ne!(store.get("owner.password"), Some(&json!("hunter2")));
        assert_eq!(
            store.get_decrypted("owner").unwrap(),
            Some(json!({
                "name": "Ada",
                "creditCardNumber": "4111",
                "email": "ada@example.com",
                "password": "hunter2"
            }))
        );
    }

    #[test]
    fn test_update_creates_missing_object() {
        let mut store = ConfigStore::<()>::new(None).unwrap();
        store.set("scalar", 1).unwrap();
        store
            .update("org.settings", json!({"a": 1}).as_object().unwrap().clone())
            .unwrap();
        store
            .update("scalar", json!({"b": 2}).as_object().unwrap().clone())
            .unwrap();

        assert_eq!(store.get("org.settings"), Some(&json!({"a": 1})));
        assert_eq!(store.get("scalar"), Some(&json!({"b": 2})));
        assert_eq!(store.changes().updated, keys(&["org", "org.settings", "scalar"]));
    }

    #[test]
    fn test_update_rejects_bad_field_atomically() {
        let mut store = card_store();
        store.set("owner", json!({"name": "Ada"})).unwrap();

        let partial = json!({"email": "x", "creditCardNumber": 4111});
        let err = store
            .update("owner", partial.as_object().unwrap().clone())
            .unwrap_err();
        assert!(matches!(err, Error::InvalidCryptoValue { .. }));
        assert_eq!(store.get("owner"), Some(&json!({"name": "Ada"})));
    }

    #[test]
    fn test_idempotent_set_tracking() {
        let mut store = ConfigStore::<()>::new(None).unwrap();
        store.set("1", "a").unwrap();
        store.set("1", "a").unwrap();
        assert_eq!(store.changes().updated, keys(&["1"]));
        assert!(store.changes().deleted.is_empty());
    }

    #[test]
    fn test_unset_tracking_is_exclusive() {
        let mut store = ConfigStore::<()>::new(None).unwrap();
        store.set("1", "a").unwrap();
        assert!(store.unset("1").unwrap());
        assert!(store.changes().updated.is_empty());
        assert_eq!(store.changes().deleted, keys(&["1"]));

        store.set("1", "b").unwrap();
        assert_eq!(store.changes().updated, keys(&["1"]));
        assert!(store.changes().deleted.is_empty());
    }

    #[test]
    fn test_unset_missing_still_records_deletion() {
        let mut store = ConfigStore::<()>::new(None).unwrap();
        assert!(!store.unset("ghost").unwrap());
        assert_eq!(store.changes().deleted, keys(&["ghost"]));
        assert!(store.unset("bad..path").is_err());
    }

    #[test]
    fn test_nested_tracking() {
        let mut store = ConfigStore::<()>::new(None).unwrap();
        store.set("1", json!({})).unwrap();
        store.set("1.a", "x").unwrap();
        assert_eq!(store.changes().updated, keys(&["1", "1.a"]));

        store.clear_tracking();
        store.unset("1.a").unwrap();
        assert_eq!(store.changes().updated, keys(&["1"]));
        assert_eq!(store.changes().deleted, keys(&["1.a"]));
        assert_eq!(store.get("1"), Some(&json!({})));
    }

    #[test]
    fn test_set_contents_diff() {
        let mut store = ConfigStore::<()>::new(None).unwrap();
        store.set("a", 0).unwrap();
        store.set("b", 0).unwrap();

        store.set_contents(json!({"a": 1}).as_object().unwrap().clone());
        assert_eq!(store.changes().updated, keys(&["a"]));
        assert_eq!(store.changes().deleted, keys(&["b"]));
        assert_eq!(store.get("a"), Some(&json!(1)));
        assert_eq!(store.get("b"), None);
    }

    #[test]
    fn test_set_contents_does_not_reencrypt() {
        let mut writer = card_store();
        writer.set("credit", "4111").unwrap();
        let at_rest = writer.contents().clone();

        let mut reader =
            ConfigStore::<CardSchema>::with_crypto(writer.crypto().unwrap().clone()).unwrap();
        reader.set_contents(at_rest.clone());
        assert_eq!(reader.contents(), &at_rest);
        assert_eq!(reader.get_decrypted("credit").unwrap(), Some(json!("4111")));
    }

    #[test]
    fn test_contents_decrypted_and_clear() {
        let mut store = card_store();
        store.set("credit", "4111").unwrap();
        store.set("name", "Ada").unwrap();

        let plain = store.contents_decrypted().unwrap();
        assert_eq!(Value::Object(plain), json!({"credit": "4111", "name": "Ada"}));

        store.clear_tracking();
        store.clear();
        assert!(store.is_empty());
        assert_eq!(store.changes().deleted, keys(&["credit", "name"]));
    }

    #[test]
    fn test_for_each_preserves_insertion_order() {
        let mut store = ConfigStore::<()>::new(None).unwrap();
        store.set("2", "b").unwrap();
        store.set("1", "a").unwrap();
        store.set("3", "c").unwrap();
        store.unset("2").unwrap();
        store.set("2", "again").unwrap();

        let mut seen = Vec::new();
        store.for_each(|key, _| seen.push(key.to_string()));
        assert_eq!(seen, vec!["1", "3", "2"]);
    }

    #[test]
    fn test_get_as_typed() {
        #[derive(serde::Deserialize, Debug, PartialEq)]
        struct Owner {
            name: String,
            credit: String,
        }

        let mut store = card_store();
        store.set("owner", json!({"name": "Ada", "credit": "4111"})).unwrap();

        let owner: Owner = store.get_as("owner").unwrap().unwrap();
        assert_eq!(
            owner,
            Owner {
                name: "Ada".into(),
                credit: "4111".into()
            }
        );
        assert!(store.get_as::<Owner>("missing").unwrap().is_none());
        assert!(matches!(
            store.get_as::<u32>("owner.name").unwrap_err(),
            Error::Parse(_)
        ));
    }

    #[test]
    fn test_decrypt_error_propagates() {
        let mut store = card_store();
        store.set_contents(json!({"credit": "not ciphertext"}).as_object().unwrap().clone());
        assert!(matches!(
            store.get_decrypted("credit").unwrap_err(),
            Error::Decryption(_)
        ));
    }
}
