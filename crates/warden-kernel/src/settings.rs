//! Per-suite settings and their persisted record.
//!
//! # Record format
//!
//! ```text
//! "WSS1"                      magic
//! u8                          trusted (0 or 1)
//! u8                          push-interrupt level byte
//! u16 len + utf-8             domain name
//! u16 len + level bytes       current[]
//! u16 len + level bytes       maximum[]
//! ```
//!
//! Integers are big-endian. The level arrays may be shorter or longer than
//! the capability space of this build; see
//! [`PermissionVector::from_levels`].

use std::sync::Arc;

use tracing::{debug, warn};
use warden_approval::SecurityContext;
use warden_capabilities::{Capability, DomainPermissions, PermissionLevel, PermissionVector};
use warden_storage::{KvStore, ScopedKvStore};

use crate::error::{KernelError, KernelResult};
use crate::suite::SuiteId;

const MAGIC: &[u8; 4] = b"WSS1";

/// Storage namespace of settings records.
pub const SETTINGS_NAMESPACE: &str = "suites:settings";

/// Everything remembered about an installed suite's permissions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SuiteSettings {
    /// Suite the record belongs to.
    pub suite_id: SuiteId,
    /// Domain the suite was bound to at install.
    pub domain: String,
    /// Whether the suite was verified at install.
    pub trusted: bool,
    /// Mirror of `current[push.interrupt]`.
    pub push_interrupt: PermissionLevel,
    /// Live levels.
    pub current: [PermissionLevel; Capability::COUNT],
    /// Ceilings.
    pub maximum: [PermissionLevel; Capability::COUNT],
}

impl SuiteSettings {
    /// Fresh settings for a suite installed into `domain`.
    #[must_use]
    pub fn new(suite_id: SuiteId, domain: &DomainPermissions, trusted: bool) -> Self {
        let current = *domain.default_levels();
        Self {
            suite_id,
            domain: domain.name().to_string(),
            trusted,
            push_interrupt: current[Capability::PushInterrupt.index()],
            current,
            maximum: *domain.maximum_levels(),
        }
    }

    /// Permission vector to seed a run's security context with. Session
    /// answers start out fresh.
    #[must_use]
    pub fn vector(&self) -> PermissionVector {
        PermissionVector::from_levels(&self.current, &self.maximum)
    }

    /// Take over the levels a security context ended up with.
    pub fn update_from(&mut self, context: &SecurityContext) {
        let (current, maximum) = context.snapshot();
        self.current = current;
        self.maximum = maximum;
        self.push_interrupt = current[Capability::PushInterrupt.index()];
    }

    /// Serialize into the persisted record.
    ///
    /// # Errors
    ///
    /// Returns [`KernelError::EncodeSettings`] if the domain name does not fit
    /// a 16-bit length prefix.
    pub fn encode(&self) -> KernelResult<Vec<u8>> {
        let current: Vec<u8> = self.current.iter().map(|l| l.to_byte()).collect();
        let maximum: Vec<u8> = self.maximum.iter().map(|l| l.to_byte()).collect();

        let mut out = Vec::with_capacity(
            12_usize
                .saturating_add(self.domain.len())
                .saturating_add(current.len())
                .saturating_add(maximum.len()),
        );
        out.extend_from_slice(MAGIC);
        out.push(u8::from(self.trusted));
        out.push(self.push_interrupt.to_byte());
        self.put_field(&mut out, "domain", self.domain.as_bytes())?;
        self.put_field(&mut out, "current", &current)?;
        self.put_field(&mut out, "maximum", &maximum)?;
        Ok(out)
    }

    fn put_field(&self, out: &mut Vec<u8>, name: &str, bytes: &[u8]) -> KernelResult<()> {
        let len = u16::try_from(bytes.len()).map_err(|_| KernelError::EncodeSettings {
            suite: self.suite_id.to_string(),
            message: format!("{name} is {} bytes long", bytes.len()),
        })?;
        out.extend_from_slice(&len.to_be_bytes());
        out.extend_from_slice(bytes);
        Ok(())
    }

    /// Parse a persisted record.
    ///
    /// The stored push-interrupt byte wins over `current[push.interrupt]`.
    ///
    /// # Errors
    ///
    /// Returns [`KernelError::CorruptSettings`] for a bad magic, truncated
    /// fields, trailing bytes, non-UTF-8 domain or unknown level bytes.
    pub fn decode(suite_id: &SuiteId, bytes: &[u8]) -> KernelResult<Self> {
        let corrupt = |message: String| KernelError::CorruptSettings {
            suite: suite_id.to_string(),
            message,
        };
        let mut reader = Reader { buf: bytes, pos: 0 };

        let magic = reader.take(MAGIC.len()).map_err(&corrupt)?;
        if magic != MAGIC {
            return Err(corrupt("bad magic".to_string()));
        }
        let trusted = match reader.byte().map_err(&corrupt)? {
            0 => false,
            1 => true,
            other => return Err(corrupt(format!("trusted flag is {other:#04x}"))),
        };
        let push_interrupt = PermissionLevel::from_byte(reader.byte().map_err(&corrupt)?)
            .map_err(|e| corrupt(e.to_string()))?;
        let domain = std::str::from_utf8(reader.field().map_err(&corrupt)?)
            .map_err(|e| corrupt(format!("domain: {e}")))?
            .to_string();
        let current = levels(reader.field().map_err(&corrupt)?).map_err(&corrupt)?;
        let maximum = levels(reader.field().map_err(&corrupt)?).map_err(&corrupt)?;
        if reader.remaining() != 0 {
            return Err(corrupt(format!("{} trailing bytes", reader.remaining())));
        }

        let mut vector = PermissionVector::from_levels(&current, &maximum);
        vector.set_current(Capability::PushInterrupt, push_interrupt);
        Ok(Self {
            suite_id: suite_id.clone(),
            domain,
            trusted,
            push_interrupt,
            current: *vector.current_levels(),
            maximum: *vector.maximum_levels(),
        })
    }
}

fn levels(bytes: &[u8]) -> Result<Vec<PermissionLevel>, String> {
    bytes
        .iter()
        .map(|b| PermissionLevel::from_byte(*b).map_err(|e| e.to_string()))
        .collect()
}

struct Reader<'a> {
    buf: &'a [u8],
    pos: usize,
}

impl<'a> Reader<'a> {
    fn take(&mut self, n: usize) -> Result<&'a [u8], String> {
        let end = self
            .pos
            .checked_add(n)
            .filter(|end| *end <= self.buf.len())
            .ok_or_else(|| format!("truncated at byte {}", self.pos))?;
        let slice = self.buf.get(self.pos..end).unwrap_or_default();
        self.pos = end;
        Ok(slice)
    }

    fn byte(&mut self) -> Result<u8, String> {
        let bytes = self.take(1)?;
        bytes.first().copied().ok_or_else(|| "truncated".to_string())
    }

    fn field(&mut self) -> Result<&'a [u8], String> {
        let len = self.take(2)?;
        let len = u16::from_be_bytes([
            len.first().copied().unwrap_or_default(),
            len.get(1).copied().unwrap_or_default(),
        ]);
        self.take(usize::from(len))
    }

    fn remaining(&self) -> usize {
        self.buf.len().saturating_sub(self.pos)
    }
}

/// Settings records keyed by suite id.
#[derive(Debug, Clone)]
pub struct SettingsStore {
    kv: ScopedKvStore,
}

impl SettingsStore {
    /// Keep settings in `store`.
    ///
    /// # Errors
    ///
    /// Returns a storage error if the namespace is rejected.
    pub fn new(store: Arc<dyn KvStore>) -> KernelResult<Self> {
        Ok(Self {
            kv: ScopedKvStore::new(store, SETTINGS_NAMESPACE)?,
        })
    }

    /// Settings of `suite`, `None` if it is not installed.
    ///
    /// # Errors
    ///
    /// Returns a storage error or [`KernelError::CorruptSettings`].
    pub async fn load(&self, suite: &SuiteId) -> KernelResult<Option<SuiteSettings>> {
        match self.kv.get(suite.as_str()).await? {
            Some(bytes) => SuiteSettings::decode(suite, &bytes).map(Some),
            None => Ok(None),
        }
    }

    /// Write `settings`, replacing any previous record.
    ///
    /// # Errors
    ///
    /// Returns a storage or encoding error.
    pub async fn save(&self, settings: &SuiteSettings) -> KernelResult<()> {
        let bytes = settings.encode()?;
        self.kv.set(settings.suite_id.as_str(), bytes).await?;
        debug!(suite = %settings.suite_id, "Suite settings saved");
        Ok(())
    }

    /// Delete the record of `suite`. Returns `true` if there was one.
    ///
    /// # Errors
    ///
    /// Returns a storage error.
    pub async fn remove(&self, suite: &SuiteId) -> KernelResult<bool> {
        Ok(self.kv.delete(suite.as_str()).await?)
    }

    /// Every suite with a settings record, sorted.
    ///
    /// # Errors
    ///
    /// Returns a storage error.
    pub async fn list(&self) -> KernelResult<Vec<SuiteId>> {
        let mut ids: Vec<SuiteId> = self
            .kv
            .list_keys()
            .await?
            .into_iter()
            .filter_map(|key| match SuiteId::new(key.clone()) {
                Ok(id) => Some(id),
                Err(e) => {
                    warn!(key = %key, error = %e, "Skipping settings record with invalid key");
                    None
                },
            })
            .collect();
        ids.sort();
        Ok(ids)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use warden_capabilities::DomainPolicyStore;
    use warden_storage::MemoryKvStore;

    fn untrusted(id: &str) -> SuiteSettings {
        let policy = DomainPolicyStore::embedded();
        let domain = policy.for_domain("untrusted").unwrap();
        SuiteSettings::new(SuiteId::new(id).unwrap(), &domain, false)
    }

    #[test]
    fn test_record_layout() {
        let settings = untrusted("chess");
        let bytes = settings.encode().unwrap();

        assert_eq!(&bytes[..4], b"WSS1");
        assert_eq!(bytes[4], 0);
        assert_eq!(bytes[5], settings.push_interrupt.to_byte());
        assert_eq!(&bytes[6..8], &9_u16.to_be_bytes());
        assert_eq!(&bytes[8..17], b"untrusted");
        let count = u16::try_from(Capability::COUNT).unwrap();
        assert_eq!(&bytes[17..19], &count.to_be_bytes());
        assert_eq!(bytes.len(), 17 + 2 + Capability::COUNT + 2 + Capability::COUNT);

        let decoded = SuiteSettings::decode(&settings.suite_id, &bytes).unwrap();
        assert_eq!(decoded, settings);
    }

    #[test]
    fn test_push_interrupt_byte_applied_on_load() {
        let mut settings = untrusted("chess");
        settings.push_interrupt = PermissionLevel::BlanketGranted;
        let bytes = settings.encode().unwrap();

        let decoded = SuiteSettings::decode(&settings.suite_id, &bytes).unwrap();
        assert_eq!(
            decoded.current[Capability::PushInterrupt.index()],
            PermissionLevel::BlanketGranted
        );
    }

    #[test]
    fn test_short_arrays_are_padded() {
        let settings = untrusted("old");
        let mut bytes = Vec::new();
        bytes.extend_from_slice(b"WSS1");
        bytes.extend_from_slice(&[1, settings.push_interrupt.to_byte()]);
        bytes.extend_from_slice(&9_u16.to_be_bytes());
        bytes.extend_from_slice(b"untrusted");
        bytes.extend_from_slice(&2_u16.to_be_bytes());
        bytes.extend_from_slice(&[0x08, 0x08]);
        bytes.extend_from_slice(&2_u16.to_be_bytes());
        bytes.extend_from_slice(&[0x04, 0x04]);

        let decoded = SuiteSettings::decode(&settings.suite_id, &bytes).unwrap();
        assert!(decoded.trusted);
        assert_eq!(decoded.current[0], PermissionLevel::Session);
        assert_eq!(decoded.maximum[1], PermissionLevel::Blanket);
        assert_eq!(decoded.maximum[Capability::FileWrite.index()], PermissionLevel::Never);
    }

    #[test]
    fn test_corrupt_records_rejected() {
        let settings = untrusted("chess");
        let good = settings.encode().unwrap();
        let id = &settings.suite_id;

        let mut bad_magic = good.clone();
        bad_magic[0] = b'X';
        let mut bad_flag = good.clone();
        bad_flag[4] = 7;
        let mut bad_level = good.clone();
        bad_level[19] = 0x03;
        let mut trailing = good.clone();
        trailing.push(0);

        for bytes in [&bad_magic, &bad_flag, &bad_level, &trailing, &good[..10].to_vec()] {
            assert!(matches!(
                SuiteSettings::decode(id, bytes),
                Err(KernelError::CorruptSettings { .. })
            ));
        }
    }

    #[tokio::test]
    async fn test_store_roundtrip_and_list() {
        let store = SettingsStore::new(Arc::new(MemoryKvStore::new())).unwrap();
        let chess = untrusted("chess");
        let mail = untrusted("mail");

        assert!(store.load(&chess.suite_id).await.unwrap().is_none());
        store.save(&mail).await.unwrap();
        store.save(&chess).await.unwrap();

        assert_eq!(store.load(&chess.suite_id).await.unwrap(), Some(chess.clone()));
        assert_eq!(
            store.list().await.unwrap(),
            vec![chess.suite_id.clone(), mail.suite_id.clone()]
        );

        assert!(store.remove(&chess.suite_id).await.unwrap());
        assert!(!store.remove(&chess.suite_id).await.unwrap());
        assert_eq!(store.list().await.unwrap(), vec![mail.suite_id]);
    }
}
